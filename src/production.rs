// Copyright 2022 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Index;

use crate::grammar::Grammar;
use crate::symbol::{Associativity, AssociativePrecedence, SymbolId, TokenSet, ACCEPT_SYMBOL};

/// A grammar rule `lhs → rhs`.  `ident` is the rule's index in declaration
/// order; production 0 is the synthetic augmentation rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Production {
    ident: u32,
    left_hand_side: SymbolId,
    right_hand_side: Vec<SymbolId>,
    associative_precedence: AssociativePrecedence,
}

impl Production {
    pub fn new(
        ident: u32,
        left_hand_side: SymbolId,
        right_hand_side: Vec<SymbolId>,
        associative_precedence: AssociativePrecedence,
    ) -> Self {
        Self {
            ident,
            left_hand_side,
            right_hand_side,
            associative_precedence,
        }
    }

    pub fn ident(&self) -> u32 {
        self.ident
    }

    pub fn left_hand_side(&self) -> SymbolId {
        self.left_hand_side
    }

    pub fn right_hand_side(&self) -> &[SymbolId] {
        &self.right_hand_side
    }

    pub fn len(&self) -> usize {
        self.right_hand_side.len()
    }

    pub fn is_empty(&self) -> bool {
        self.right_hand_side.is_empty()
    }

    pub fn associativity(&self) -> Associativity {
        self.associative_precedence.associativity
    }

    pub fn precedence(&self) -> u16 {
        self.associative_precedence.precedence
    }
}

/// An LR item core: a production with a dot position.  Lookaheads are kept
/// beside the key in a `GrammarItemSet` so that items sharing a core merge
/// their lookahead sets structurally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct GrammarItemKey {
    production: u32,
    dot: usize,
}

impl From<&Production> for GrammarItemKey {
    fn from(production: &Production) -> Self {
        Self {
            production: production.ident(),
            dot: 0,
        }
    }
}

impl GrammarItemKey {
    pub fn production(&self) -> u32 {
        self.production
    }

    pub fn dot(&self) -> usize {
        self.dot
    }

    pub fn shifted(&self) -> Self {
        Self {
            production: self.production,
            dot: self.dot + 1,
        }
    }

    pub fn is_reducible(&self, grammar: &Grammar) -> bool {
        self.dot >= grammar.production(self.production).len()
    }

    pub fn is_kernel_item(&self, grammar: &Grammar) -> bool {
        self.dot > 0 || grammar.production(self.production).left_hand_side() == ACCEPT_SYMBOL
    }

    pub fn next_symbol(&self, grammar: &Grammar) -> Option<SymbolId> {
        grammar
            .production(self.production)
            .right_hand_side()
            .get(self.dot)
            .copied()
    }

    pub fn is_closable(&self, grammar: &Grammar) -> bool {
        match self.next_symbol(grammar) {
            Some(symbol) => grammar.symbol_table().is_non_terminal(symbol),
            None => false,
        }
    }

    /// The symbols after the one the dot is at, i.e. β for `A → α·Xβ`.
    pub fn rhs_tail<'a>(&self, grammar: &'a Grammar) -> &'a [SymbolId] {
        &grammar.production(self.production).right_hand_side()[self.dot + 1..]
    }

    pub fn format(&self, grammar: &Grammar) -> String {
        let production = grammar.production(self.production);
        let names = grammar.symbol_table();
        let mut string = format!("{}:", names.name(production.left_hand_side()));
        if production.is_empty() {
            string += " . <empty>";
        } else {
            for (index, symbol) in production.right_hand_side().iter().enumerate() {
                if index == self.dot {
                    string += &format!(" . {}", names.name(*symbol));
                } else {
                    string += &format!(" {}", names.name(*symbol));
                }
            }
            if self.dot >= production.len() {
                string += " . ";
            }
        };
        string
    }
}

/// A set of LR items: item cores mapped to their lookahead sets.  For the
/// LR(0) family the lookahead sets are left empty.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GrammarItemSet(BTreeMap<GrammarItemKey, TokenSet>);

impl From<BTreeMap<GrammarItemKey, TokenSet>> for GrammarItemSet {
    fn from(map: BTreeMap<GrammarItemKey, TokenSet>) -> Self {
        Self(map)
    }
}

impl Index<&GrammarItemKey> for GrammarItemSet {
    type Output = TokenSet;

    fn index(&self, key: &GrammarItemKey) -> &TokenSet {
        self.0.index(key)
    }
}

impl GrammarItemSet {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GrammarItemKey, &TokenSet)> {
        self.0.iter()
    }

    pub fn get(&self, key: &GrammarItemKey) -> Option<&TokenSet> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &GrammarItemKey) -> Option<&mut TokenSet> {
        self.0.get_mut(key)
    }

    pub fn insert(&mut self, key: GrammarItemKey, look_ahead_set: TokenSet) -> Option<TokenSet> {
        self.0.insert(key, look_ahead_set)
    }

    /// Items whose dot sits before a nonterminal, snapshotted so the caller
    /// can extend the set while iterating.
    pub fn closable_set(&self, grammar: &Grammar) -> Vec<(GrammarItemKey, TokenSet)> {
        self.0
            .iter()
            .filter(|(key, _)| key.is_closable(grammar))
            .map(|(key, set)| (*key, set.clone()))
            .collect()
    }

    pub fn generate_goto_kernel(&self, grammar: &Grammar, symbol: SymbolId) -> GrammarItemSet {
        let mut map = BTreeMap::new();
        for (item_key, look_ahead_set) in self.0.iter() {
            if item_key.next_symbol(grammar) == Some(symbol) {
                map.insert(item_key.shifted(), look_ahead_set.clone());
            }
        }
        GrammarItemSet(map)
    }

    pub fn kernel_keys(&self, grammar: &Grammar) -> BTreeSet<GrammarItemKey> {
        self.0
            .keys()
            .filter(|key| key.is_kernel_item(grammar))
            .copied()
            .collect()
    }

    pub fn irreducible_keys(&self, grammar: &Grammar) -> BTreeSet<GrammarItemKey> {
        self.0
            .keys()
            .filter(|key| !key.is_reducible(grammar))
            .copied()
            .collect()
    }

    pub fn reducible_keys(&self, grammar: &Grammar) -> BTreeSet<GrammarItemKey> {
        self.0
            .keys()
            .filter(|key| key.is_reducible(grammar))
            .copied()
            .collect()
    }

    /// Symbols appearing immediately after a dot, in id order.
    pub fn next_symbol_set(&self, grammar: &Grammar) -> BTreeSet<SymbolId> {
        self.0
            .keys()
            .filter_map(|key| key.next_symbol(grammar))
            .collect()
    }

    /// The state identity used for LR(0)-core keying: the kernel's sorted
    /// `(production, dot)` pairs.
    pub fn core_key(&self, grammar: &Grammar) -> Vec<(u32, usize)> {
        self.0
            .keys()
            .filter(|key| key.is_kernel_item(grammar))
            .map(|key| (key.production, key.dot))
            .collect()
    }

    /// The state identity used for LR(1) keying: the core plus each kernel
    /// item's sorted lookahead terminals.
    pub fn lr1_key(&self, grammar: &Grammar) -> Vec<(u32, usize, Vec<SymbolId>)> {
        self.0
            .iter()
            .filter(|(key, _)| key.is_kernel_item(grammar))
            .map(|(key, set)| (key.production, key.dot, set.iter().copied().collect()))
            .collect()
    }

    /// Unions `other`'s lookaheads into this set, item by item.  Both sets
    /// must share the same item cores.  Returns the number of additions.
    pub fn merge_look_ahead_sets(&mut self, other: &GrammarItemSet) -> usize {
        let mut additions = 0;
        for (key, other_look_ahead_set) in other.0.iter() {
            if let Some(look_ahead_set) = self.0.get_mut(key) {
                let current_len = look_ahead_set.len();
                *look_ahead_set |= other_look_ahead_set;
                additions += look_ahead_set.len() - current_len;
            } else {
                panic!("item cores should be identical to get here");
            }
        }
        additions
    }

}
