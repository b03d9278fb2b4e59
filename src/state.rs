// Copyright 2022 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>

use std::collections::{BTreeMap, VecDeque};

use log::debug;

use crate::grammar::Grammar;
use crate::production::{GrammarItemKey, GrammarItemSet};
use crate::sets::GrammarSets;
use crate::symbol::{SymbolId, TokenSet, END_SYMBOL};

/// Which canonical collection to build.  `Lr0` serves both the LR(0) and the
/// SLR(1) table builders; they differ only in where reduce lookaheads come
/// from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    Lr0,
    Lr1,
    Lalr1,
}

/// One state of the characteristic automaton.  Transitions hold state ids,
/// never references; the state graph is cyclic.
#[derive(Debug, Clone)]
pub struct ParserState {
    ident: u32,
    items: GrammarItemSet,
    transitions: BTreeMap<SymbolId, u32>,
}

impl ParserState {
    pub fn ident(&self) -> u32 {
        self.ident
    }

    pub fn items(&self) -> &GrammarItemSet {
        &self.items
    }

    pub fn transitions(&self) -> &BTreeMap<SymbolId, u32> {
        &self.transitions
    }

    pub fn description(&self, grammar: &Grammar) -> String {
        let mut string = format!("State<{}>:\n  Grammar Items:\n", self.ident);
        for (key, look_ahead_set) in self.items.iter() {
            string += &format!("    {}: {}\n", key.format(grammar), look_ahead_set);
        }
        string += "  Transitions:\n";
        for (symbol, target) in self.transitions.iter() {
            string += &format!(
                "    {} -> State<{}>\n",
                grammar.symbol_table().name(*symbol),
                target
            );
        }
        string
    }
}

/// State identity for canonical keying.  Cores and lookaheads come out of
/// `BTreeMap`s already sorted, so identical states key identically on every
/// run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum StateKey {
    Core(Vec<(u32, usize)>),
    Lr1(Vec<(u32, usize, Vec<SymbolId>)>),
}

struct CollectionBuilder<'a> {
    grammar: &'a Grammar,
    sets: &'a GrammarSets,
    with_look_aheads: bool,
}

impl<'a> CollectionBuilder<'a> {
    /// ε-expansion to fixpoint.  Items acquiring the same core merge their
    /// lookahead sets, which keeps the LR(1) collection from splitting on
    /// lookahead-only differences within one state.
    fn closure(&self, mut item_set: GrammarItemSet) -> GrammarItemSet {
        let mut additions_made = true;
        while additions_made {
            additions_made = false;
            // Snapshot needed because the set grows while it is walked.
            for (item_key, look_ahead_set) in item_set.closable_set(self.grammar) {
                let prospective_lhs = item_key
                    .next_symbol(self.grammar)
                    .expect("closable items have a next symbol");
                let look_aheads = if self.with_look_aheads {
                    let (mut firsts, nullable) =
                        self.sets.first_of_string(item_key.rhs_tail(self.grammar));
                    if nullable {
                        firsts |= &look_ahead_set;
                    }
                    firsts
                } else {
                    TokenSet::new()
                };
                for production in self.grammar.productions_for(prospective_lhs) {
                    let prospective_key = GrammarItemKey::from(production);
                    if let Some(set) = item_set.get_mut(&prospective_key) {
                        if self.with_look_aheads {
                            let len = set.len();
                            *set |= &look_aheads;
                            additions_made = additions_made || set.len() > len;
                        }
                    } else {
                        item_set.insert(prospective_key, look_aheads.clone());
                        additions_made = true;
                    }
                }
            }
        }
        item_set
    }

    fn state_key(&self, item_set: &GrammarItemSet) -> StateKey {
        if self.with_look_aheads {
            StateKey::Lr1(item_set.lr1_key(self.grammar))
        } else {
            StateKey::Core(item_set.core_key(self.grammar))
        }
    }

    fn start_item_set(&self) -> GrammarItemSet {
        let start_key = GrammarItemKey::from(self.grammar.production(0));
        let look_aheads = if self.with_look_aheads {
            TokenSet::singleton(END_SYMBOL)
        } else {
            TokenSet::new()
        };
        let mut kernel = GrammarItemSet::default();
        kernel.insert(start_key, look_aheads);
        self.closure(kernel)
    }

    /// Breadth-first closure-and-goto from the start item.  State ids are
    /// discovery order; transition symbols are expanded in id order.
    fn build(&self) -> Vec<ParserState> {
        let mut states = vec![ParserState {
            ident: 0,
            items: self.start_item_set(),
            transitions: BTreeMap::new(),
        }];
        let mut key_map = BTreeMap::new();
        key_map.insert(self.state_key(&states[0].items), 0_u32);
        let mut queue = VecDeque::from([0_u32]);

        while let Some(ident) = queue.pop_front() {
            let goto_kernels: Vec<(SymbolId, GrammarItemSet)> = states[ident as usize]
                .items
                .next_symbol_set(self.grammar)
                .into_iter()
                .map(|symbol| {
                    (
                        symbol,
                        states[ident as usize]
                            .items
                            .generate_goto_kernel(self.grammar, symbol),
                    )
                })
                .collect();
            for (symbol, kernel) in goto_kernels {
                let item_set = self.closure(kernel);
                let key = self.state_key(&item_set);
                let target = if let Some(target) = key_map.get(&key) {
                    *target
                } else {
                    let target = states.len() as u32;
                    states.push(ParserState {
                        ident: target,
                        items: item_set,
                        transitions: BTreeMap::new(),
                    });
                    key_map.insert(key, target);
                    queue.push_back(target);
                    target
                };
                states[ident as usize].transitions.insert(symbol, target);
            }
        }
        states
    }
}

/// Builds the canonical collection for the requested family.  LALR(1) states
/// are the full LR(1) collection merged by LR(0) core, with transitions
/// redirected into the merged states.
pub fn build_states(
    grammar: &Grammar,
    sets: &GrammarSets,
    kind: CollectionKind,
) -> Vec<ParserState> {
    let builder = CollectionBuilder {
        grammar,
        sets,
        with_look_aheads: kind != CollectionKind::Lr0,
    };
    let states = builder.build();
    match kind {
        CollectionKind::Lalr1 => {
            let merged = merge_by_core(grammar, states);
            debug!("LALR(1) merge left {} states", merged.len());
            merged
        }
        _ => {
            debug!("canonical collection has {} states", states.len());
            states
        }
    }
}

fn merge_by_core(grammar: &Grammar, states: Vec<ParserState>) -> Vec<ParserState> {
    let mut groups: BTreeMap<Vec<(u32, usize)>, Vec<u32>> = BTreeMap::new();
    for state in states.iter() {
        groups
            .entry(state.items.core_key(grammar))
            .or_default()
            .push(state.ident);
    }
    // Merged ids follow each group's first LR(1) member so state 0 stays the
    // start state.
    let mut group_list: Vec<Vec<u32>> = groups.into_values().collect();
    group_list.sort_by_key(|group| group[0]);
    let mut remap = BTreeMap::new();
    for (new_ident, group) in group_list.iter().enumerate() {
        for old_ident in group.iter() {
            remap.insert(*old_ident, new_ident as u32);
        }
    }

    let mut merged = Vec::with_capacity(group_list.len());
    for (new_ident, group) in group_list.iter().enumerate() {
        let mut items = states[group[0] as usize].items.clone();
        for old_ident in group[1..].iter() {
            items.merge_look_ahead_sets(&states[*old_ident as usize].items);
        }
        let transitions = states[group[0] as usize]
            .transitions
            .iter()
            .map(|(symbol, target)| (*symbol, remap[target]))
            .collect();
        merged.push(ParserState {
            ident: new_ident as u32,
            items,
            transitions,
        });
    }
    merged
}
