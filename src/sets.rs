use std::collections::BTreeMap;

use crate::grammar::Grammar;
use crate::symbol::{SymbolId, TokenSet, ACCEPT_SYMBOL, END_SYMBOL};

/// Nullable, FIRST and FOLLOW data for a grammar, computed once by monotone
/// fixed-point iteration and immutable thereafter.
///
/// FIRST sets contain terminals only; the possibility of deriving ε is
/// carried by the nullable flag rather than a sentinel symbol.
#[derive(Debug)]
pub struct GrammarSets {
    nullable: BTreeMap<SymbolId, bool>,
    firsts: BTreeMap<SymbolId, TokenSet>,
    follows: BTreeMap<SymbolId, TokenSet>,
}

impl GrammarSets {
    pub fn new(grammar: &Grammar) -> Self {
        let mut sets = Self {
            nullable: BTreeMap::new(),
            firsts: BTreeMap::new(),
            follows: BTreeMap::new(),
        };
        for non_terminal in grammar.symbol_table().non_terminal_ids() {
            sets.nullable.insert(non_terminal, false);
            sets.firsts.insert(non_terminal, TokenSet::new());
            sets.follows.insert(non_terminal, TokenSet::new());
        }
        sets.solve_nullable(grammar);
        sets.solve_firsts(grammar);
        sets.solve_follows(grammar);
        sets
    }

    pub fn is_nullable(&self, symbol: SymbolId) -> bool {
        *self.nullable.get(&symbol).unwrap_or(&false)
    }

    /// FIRST of a single symbol; a terminal's FIRST is itself.
    pub fn first(&self, symbol: SymbolId) -> TokenSet {
        match self.firsts.get(&symbol) {
            Some(set) => set.clone(),
            None => TokenSet::singleton(symbol),
        }
    }

    pub fn follow(&self, non_terminal: SymbolId) -> &TokenSet {
        self.follows
            .get(&non_terminal)
            .expect("FOLLOW is only defined for nonterminals")
    }

    /// FIRST of a symbol string together with whether the whole string can
    /// derive ε.
    pub fn first_of_string(&self, symbols: &[SymbolId]) -> (TokenSet, bool) {
        let mut set = TokenSet::new();
        for symbol in symbols.iter() {
            set |= &self.first(*symbol);
            if !self.is_nullable(*symbol) {
                return (set, false);
            }
        }
        (set, true)
    }

    fn solve_nullable(&mut self, grammar: &Grammar) {
        let mut additions_made = true;
        while additions_made {
            additions_made = false;
            for production in grammar.productions() {
                if self.is_nullable(production.left_hand_side()) {
                    continue;
                }
                if production
                    .right_hand_side()
                    .iter()
                    .all(|symbol| self.is_nullable(*symbol))
                {
                    self.nullable.insert(production.left_hand_side(), true);
                    additions_made = true;
                }
            }
        }
    }

    fn solve_firsts(&mut self, grammar: &Grammar) {
        let mut additions_made = true;
        while additions_made {
            additions_made = false;
            for production in grammar.productions() {
                let mut addition = TokenSet::new();
                for symbol in production.right_hand_side().iter() {
                    addition |= &self.first(*symbol);
                    if !self.is_nullable(*symbol) {
                        break;
                    }
                }
                let set = self
                    .firsts
                    .get_mut(&production.left_hand_side())
                    .expect("left hand sides are nonterminals");
                let len = set.len();
                *set |= &addition;
                additions_made = additions_made || set.len() > len;
            }
        }
    }

    fn solve_follows(&mut self, grammar: &Grammar) {
        self.follows
            .get_mut(&ACCEPT_SYMBOL)
            .expect("augmented start is present")
            .insert(END_SYMBOL);
        let mut additions_made = true;
        while additions_made {
            additions_made = false;
            for production in grammar.productions() {
                let rhs = production.right_hand_side();
                for (index, symbol) in rhs.iter().enumerate() {
                    if !grammar.symbol_table().is_non_terminal(*symbol) {
                        continue;
                    }
                    let (mut addition, tail_nullable) = self.first_of_string(&rhs[index + 1..]);
                    if tail_nullable {
                        addition |= self.follow(production.left_hand_side());
                    }
                    let set = self.follows.get_mut(symbol).expect("nonterminal");
                    let len = set.len();
                    *set |= &addition;
                    additions_made = additions_made || set.len() > len;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::GrammarSpec;

    fn matched_pairs_grammar() -> Grammar {
        // S: a S b | <empty>
        Grammar::new(
            GrammarSpec::new("S")
                .tokens(&["a", "b"])
                .rule("S", &["a", "S", "b"])
                .rule("S", &[]),
        )
        .unwrap()
    }

    #[test]
    fn nullable_propagates_through_productions() {
        let grammar = matched_pairs_grammar();
        let sets = GrammarSets::new(&grammar);
        let s = grammar.symbol_table().lookup("S").unwrap();
        assert!(sets.is_nullable(s));
        assert!(sets.is_nullable(ACCEPT_SYMBOL));
        let a = grammar.symbol_table().lookup("a").unwrap();
        assert!(!sets.is_nullable(a));
    }

    #[test]
    fn firsts_contain_terminals_only() {
        let grammar = matched_pairs_grammar();
        let sets = GrammarSets::new(&grammar);
        let s = grammar.symbol_table().lookup("S").unwrap();
        let a = grammar.symbol_table().lookup("a").unwrap();
        assert_eq!(sets.first(s), TokenSet::singleton(a));
        assert_eq!(sets.first(a), TokenSet::singleton(a));
    }

    #[test]
    fn follows_seeded_from_augmented_start() {
        let grammar = matched_pairs_grammar();
        let sets = GrammarSets::new(&grammar);
        let s = grammar.symbol_table().lookup("S").unwrap();
        let b = grammar.symbol_table().lookup("b").unwrap();
        let expected: TokenSet = [b, END_SYMBOL].into_iter().collect();
        assert_eq!(*sets.follow(s), expected);
        assert_eq!(*sets.follow(ACCEPT_SYMBOL), TokenSet::singleton(END_SYMBOL));
    }

    #[test]
    fn first_of_string_reports_nullability() {
        let grammar = matched_pairs_grammar();
        let sets = GrammarSets::new(&grammar);
        let table = grammar.symbol_table();
        let s = table.lookup("S").unwrap();
        let a = table.lookup("a").unwrap();
        let b = table.lookup("b").unwrap();

        let (set, nullable) = sets.first_of_string(&[s, b]);
        let expected: TokenSet = [a, b].into_iter().collect();
        assert_eq!(set, expected);
        assert!(!nullable);

        let (set, nullable) = sets.first_of_string(&[s]);
        assert_eq!(set, TokenSet::singleton(a));
        assert!(nullable);

        let (set, nullable) = sets.first_of_string(&[]);
        assert!(set.is_empty());
        assert!(nullable);
    }

    #[test]
    fn left_recursion_terminates() {
        // E: E plus T | T; T: id
        let grammar = Grammar::new(
            GrammarSpec::new("E")
                .tokens(&["plus", "id"])
                .rule("E", &["E", "plus", "T"])
                .rule("E", &["T"])
                .rule("T", &["id"]),
        )
        .unwrap();
        let sets = GrammarSets::new(&grammar);
        let table = grammar.symbol_table();
        let e = table.lookup("E").unwrap();
        let id = table.lookup("id").unwrap();
        let plus = table.lookup("plus").unwrap();
        assert_eq!(sets.first(e), TokenSet::singleton(id));
        let expected: TokenSet = [plus, END_SYMBOL].into_iter().collect();
        assert_eq!(*sets.follow(e), expected);
    }
}
