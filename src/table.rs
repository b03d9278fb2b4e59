// Copyright 2022 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use log::{debug, warn};

use crate::grammar::Grammar;
use crate::production::GrammarItemKey;
use crate::sets::GrammarSets;
use crate::state::{build_states, CollectionKind, ParserState};
use crate::symbol::{Associativity, SymbolId, TokenSet, END_SYMBOL, ERROR_SYMBOL};

/// The table family to build.  Dispatch happens once here; the shared
/// pipeline stages are free functions over the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Lr0,
    Slr1,
    Lalr1,
    Lr1,
    Ll1,
}

/// A parse action.  `Error` marks a cell made an explicit error by nonassoc
/// precedence resolution; an absent entry is the ordinary error case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Shift(u32),
    Reduce(u32),
    Accept,
    Error,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Action::Shift(state) => write!(f, "shift: -> State<{}>", state),
            Action::Reduce(production) => write!(f, "reduce: {}", production),
            Action::Accept => write!(f, "accept"),
            Action::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    ShiftReduce,
    ReduceReduce,
    FirstFirst,
    FirstFollow,
}

/// A recorded table conflict.  `owner` is a state id for the LR family and a
/// nonterminal id for LL(1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub owner: u32,
    pub look_ahead: SymbolId,
    pub chosen: Action,
    pub discarded: Action,
    pub kind: ConflictKind,
}

/// The output of `build`: an LR action/goto table or an LL(1) predictive
/// table.
#[derive(Debug)]
pub enum Table {
    Lr(LrTable),
    Ll(LlTable),
}

impl Table {
    pub fn conflicts(&self) -> &[Conflict] {
        match self {
            Table::Lr(table) => table.conflicts(),
            Table::Ll(table) => table.conflicts(),
        }
    }

    pub fn as_lr(&self) -> Option<&LrTable> {
        match self {
            Table::Lr(table) => Some(table),
            Table::Ll(_) => None,
        }
    }

    pub fn as_ll(&self) -> Option<&LlTable> {
        match self {
            Table::Ll(table) => Some(table),
            Table::Lr(_) => None,
        }
    }
}

/// Computes the parse table for `grammar` using the requested algorithm.
/// Conflicts never abort construction; callers inspect `Table::conflicts`
/// and decide.
pub fn build(grammar: &Grammar, algorithm: Algorithm) -> Table {
    let sets = GrammarSets::new(grammar);
    match algorithm {
        Algorithm::Ll1 => Table::Ll(build_ll_table(grammar, &sets)),
        _ => Table::Lr(build_lr_table(grammar, &sets, algorithm)),
    }
}

/// A compiled shift-reduce table.  Self-contained and immutable: it carries
/// the production data and display names the runtime needs, holds no mutable
/// state and may be shared across threads by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LrTable {
    actions: Vec<BTreeMap<SymbolId, Action>>,
    gotos: Vec<BTreeMap<SymbolId, u32>>,
    default_actions: BTreeMap<u32, u32>,
    production_data: Vec<(SymbolId, usize)>,
    symbol_names: Vec<String>,
    conflicts: Vec<Conflict>,
}

impl LrTable {
    pub fn state_count(&self) -> usize {
        self.actions.len()
    }

    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    pub fn action(&self, state: u32, look_ahead: SymbolId) -> Option<Action> {
        self.actions[state as usize].get(&look_ahead).copied()
    }

    pub fn goto_state(&self, state: u32, left_hand_side: SymbolId) -> Option<u32> {
        self.gotos[state as usize].get(&left_hand_side).copied()
    }

    /// The forced reduction for `state`, if its row compressed to one.  The
    /// runtime consults this before asking the lexer for a lookahead.
    pub fn default_action(&self, state: u32) -> Option<u32> {
        self.default_actions.get(&state).copied()
    }

    /// `(left hand side, rhs length)` for a production.
    pub fn production_data(&self, production: u32) -> (SymbolId, usize) {
        self.production_data[production as usize]
    }

    pub fn symbol_name(&self, symbol: SymbolId) -> &str {
        &self.symbol_names[symbol as usize]
    }

    pub fn symbol_names(&self) -> &[String] {
        &self.symbol_names
    }

    /// Terminals for which `state` has a defined, non-error action.  The
    /// `error` placeholder is omitted: it never arrives from a lexer.
    pub fn expected_tokens(&self, state: u32) -> TokenSet {
        self.actions[state as usize]
            .iter()
            .filter(|(symbol, action)| **symbol != ERROR_SYMBOL && **action != Action::Error)
            .map(|(symbol, _)| *symbol)
            .collect()
    }

    /// The state entered by shifting the `error` placeholder, if this state
    /// can.
    pub fn error_shift_state(&self, state: u32) -> Option<u32> {
        match self.actions[state as usize].get(&ERROR_SYMBOL) {
            Some(Action::Shift(target)) => Some(*target),
            _ => None,
        }
    }

    /// Exactly-one-Accept invariant support for diagnostics and tests.
    pub fn accept_cell_count(&self) -> usize {
        self.actions
            .iter()
            .flat_map(|row| row.values())
            .filter(|action| **action == Action::Accept)
            .count()
    }
}

struct LrTableBuilder<'a> {
    grammar: &'a Grammar,
    actions: Vec<BTreeMap<SymbolId, Action>>,
    gotos: Vec<BTreeMap<SymbolId, u32>>,
    conflicts: Vec<Conflict>,
}

impl<'a> LrTableBuilder<'a> {
    fn set_action(&mut self, state: u32, look_ahead: SymbolId, action: Action) {
        let row = &mut self.actions[state as usize];
        let existing = match row.get(&look_ahead) {
            None => {
                row.insert(look_ahead, action);
                return;
            }
            Some(existing) => *existing,
        };
        if existing == action {
            return;
        }
        let resolved = self.resolve(state, look_ahead, existing, action);
        self.actions[state as usize].insert(look_ahead, resolved);
    }

    fn resolve(&mut self, state: u32, look_ahead: SymbolId, existing: Action, incoming: Action) -> Action {
        use Action::*;
        match (existing, incoming) {
            (Shift(target), Reduce(production)) | (Reduce(production), Shift(target)) => {
                let token = self
                    .grammar
                    .symbol_table()
                    .associative_precedence(look_ahead);
                let rule_precedence = self.grammar.production(production).precedence();
                if token.explicitly_set() && rule_precedence > 0 {
                    // Declared precedence settles the cell silently.
                    let resolved = if rule_precedence > token.precedence {
                        Reduce(production)
                    } else if rule_precedence < token.precedence {
                        Shift(target)
                    } else {
                        match token.associativity {
                            Associativity::Left => Reduce(production),
                            Associativity::Right => Shift(target),
                            Associativity::NonAssoc => Error,
                        }
                    };
                    debug!(
                        "state {}: {} on \"{}\" settled by precedence",
                        state,
                        resolved,
                        self.grammar.symbol_table().name(look_ahead)
                    );
                    resolved
                } else {
                    warn!(
                        "state {}: shift/reduce conflict on \"{}\"; keeping shift",
                        state,
                        self.grammar.symbol_table().name(look_ahead)
                    );
                    self.conflicts.push(Conflict {
                        owner: state,
                        look_ahead,
                        chosen: Shift(target),
                        discarded: Reduce(production),
                        kind: ConflictKind::ShiftReduce,
                    });
                    Shift(target)
                }
            }
            (Reduce(first), Reduce(second)) => {
                let (kept, discarded) = if first <= second {
                    (first, second)
                } else {
                    (second, first)
                };
                warn!(
                    "state {}: reduce/reduce conflict on \"{}\"; keeping production {}",
                    state,
                    self.grammar.symbol_table().name(look_ahead),
                    kept
                );
                self.conflicts.push(Conflict {
                    owner: state,
                    look_ahead,
                    chosen: Reduce(kept),
                    discarded: Reduce(discarded),
                    kind: ConflictKind::ReduceReduce,
                });
                Reduce(kept)
            }
            (Accept, other) | (other, Accept) => {
                self.conflicts.push(Conflict {
                    owner: state,
                    look_ahead,
                    chosen: Accept,
                    discarded: other,
                    kind: ConflictKind::ReduceReduce,
                });
                Accept
            }
            // An explicit nonassoc error cell stays an error cell.
            (Error, _) | (_, Error) => Error,
            (Shift(_), Shift(_)) => panic!("goto is not deterministic"),
        }
    }

    /// Where reduce lookaheads come from is the whole difference between the
    /// LR family members.
    fn reduce_look_aheads(
        &self,
        sets: &GrammarSets,
        algorithm: Algorithm,
        state: &ParserState,
        key: &GrammarItemKey,
    ) -> TokenSet {
        match algorithm {
            Algorithm::Lr0 => self.grammar.lexical_token_set().into_iter().collect(),
            Algorithm::Slr1 => sets
                .follow(self.grammar.production(key.production()).left_hand_side())
                .clone(),
            Algorithm::Lalr1 | Algorithm::Lr1 => state.items()[key].clone(),
            Algorithm::Ll1 => unreachable!("LL(1) has no LR reduce lookaheads"),
        }
    }
}

fn build_lr_table(grammar: &Grammar, sets: &GrammarSets, algorithm: Algorithm) -> LrTable {
    let kind = match algorithm {
        Algorithm::Lr0 | Algorithm::Slr1 => CollectionKind::Lr0,
        Algorithm::Lalr1 => CollectionKind::Lalr1,
        Algorithm::Lr1 => CollectionKind::Lr1,
        Algorithm::Ll1 => unreachable!("LL(1) is not an LR table"),
    };
    let states = build_states(grammar, sets, kind);
    let mut builder = LrTableBuilder {
        grammar,
        actions: vec![BTreeMap::new(); states.len()],
        gotos: vec![BTreeMap::new(); states.len()],
        conflicts: vec![],
    };

    for state in states.iter() {
        let ident = state.ident();
        for (symbol, target) in state.transitions() {
            if grammar.symbol_table().is_token(*symbol) {
                builder.set_action(ident, *symbol, Action::Shift(*target));
            } else {
                builder.gotos[ident as usize].insert(*symbol, *target);
            }
        }
        for key in state.items().reducible_keys(grammar) {
            if key.production() == 0 {
                builder.set_action(ident, END_SYMBOL, Action::Accept);
                continue;
            }
            let look_aheads = builder.reduce_look_aheads(sets, algorithm, state, &key);
            for look_ahead in look_aheads.iter() {
                builder.set_action(ident, *look_ahead, Action::Reduce(key.production()));
            }
        }
    }

    let mut table = LrTable {
        actions: builder.actions,
        gotos: builder.gotos,
        default_actions: BTreeMap::new(),
        production_data: grammar
            .productions()
            .map(|p| (p.left_hand_side(), p.len()))
            .collect(),
        symbol_names: grammar.symbol_table().names(),
        conflicts: builder.conflicts,
    };
    detect_default_actions(&mut table);
    prune_unreachable_states(&mut table);
    debug!(
        "built {:?} table: {} states, {} conflicts",
        algorithm,
        table.state_count(),
        table.conflicts.len()
    );
    table
}

/// A row whose only content is one distinct reduction is replaced by a
/// default action; the runtime then reduces without consulting the lookahead.
fn detect_default_actions(table: &mut LrTable) {
    for (state, row) in table.actions.iter().enumerate() {
        if row.is_empty() {
            continue;
        }
        let mut sole_reduction = None;
        let mut forced = true;
        for action in row.values() {
            match action {
                Action::Reduce(production) => match sole_reduction {
                    None => sole_reduction = Some(*production),
                    Some(p) if p == *production => (),
                    Some(_) => {
                        forced = false;
                        break;
                    }
                },
                _ => {
                    forced = false;
                    break;
                }
            }
        }
        if forced {
            if let Some(production) = sole_reduction {
                table.default_actions.insert(state as u32, production);
            }
        }
    }
}

/// Precedence resolution can rewrite shift cells and orphan their targets;
/// the table is renumbered to the reachable dense prefix so the runtime never
/// sees a dangling id.
fn prune_unreachable_states(table: &mut LrTable) {
    let state_count = table.actions.len();
    let mut reachable = BTreeSet::new();
    reachable.insert(0_u32);
    let mut queue = VecDeque::from([0_u32]);
    while let Some(state) = queue.pop_front() {
        let mut targets: Vec<u32> = table.actions[state as usize]
            .values()
            .filter_map(|action| match action {
                Action::Shift(target) => Some(*target),
                _ => None,
            })
            .collect();
        targets.extend(table.gotos[state as usize].values().copied());
        for target in targets {
            if reachable.insert(target) {
                queue.push_back(target);
            }
        }
    }
    if reachable.len() == state_count {
        return;
    }
    debug!("pruning {} unreachable states", state_count - reachable.len());

    let remap: BTreeMap<u32, u32> = reachable
        .iter()
        .enumerate()
        .map(|(new, old)| (*old, new as u32))
        .collect();
    let remap_action = |action: &Action| match action {
        Action::Shift(target) => Action::Shift(remap[target]),
        other => *other,
    };
    let actions = reachable
        .iter()
        .map(|old| {
            table.actions[*old as usize]
                .iter()
                .map(|(symbol, action)| (*symbol, remap_action(action)))
                .collect()
        })
        .collect();
    let gotos = reachable
        .iter()
        .map(|old| {
            table.gotos[*old as usize]
                .iter()
                .map(|(symbol, target)| (*symbol, remap[target]))
                .collect()
        })
        .collect();
    let default_actions = table
        .default_actions
        .iter()
        .filter_map(|(state, production)| remap.get(state).map(|new| (*new, *production)))
        .collect();
    let conflicts = table
        .conflicts
        .iter()
        .filter_map(|conflict| {
            remap.get(&conflict.owner).map(|new| Conflict {
                owner: *new,
                look_ahead: conflict.look_ahead,
                chosen: remap_action(&conflict.chosen),
                discarded: remap_action(&conflict.discarded),
                kind: conflict.kind,
            })
        })
        .collect();
    table.actions = actions;
    table.gotos = gotos;
    table.default_actions = default_actions;
    table.conflicts = conflicts;
}

/// An LL(1) predictive table: `(nonterminal, terminal) → production`.
/// Nothing analogous to LR state pruning applies here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlTable {
    predictions: BTreeMap<SymbolId, BTreeMap<SymbolId, u32>>,
    productions: Vec<(SymbolId, Vec<SymbolId>)>,
    token_flags: Vec<bool>,
    symbol_names: Vec<String>,
    start: SymbolId,
    conflicts: Vec<Conflict>,
}

impl LlTable {
    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    pub fn production_for(&self, non_terminal: SymbolId, look_ahead: SymbolId) -> Option<u32> {
        self.predictions.get(&non_terminal)?.get(&look_ahead).copied()
    }

    pub fn start(&self) -> SymbolId {
        self.start
    }

    pub fn right_hand_side(&self, production: u32) -> &[SymbolId] {
        &self.productions[production as usize].1
    }

    pub fn is_token(&self, symbol: SymbolId) -> bool {
        self.token_flags[symbol as usize]
    }

    pub fn symbol_name(&self, symbol: SymbolId) -> &str {
        &self.symbol_names[symbol as usize]
    }

    pub fn symbol_names(&self) -> &[String] {
        &self.symbol_names
    }

    /// Terminals that select some production of `non_terminal`.
    pub fn expected_tokens(&self, non_terminal: SymbolId) -> TokenSet {
        match self.predictions.get(&non_terminal) {
            Some(row) => row.keys().copied().collect(),
            None => TokenSet::new(),
        }
    }
}

fn build_ll_table(grammar: &Grammar, sets: &GrammarSets) -> LlTable {
    let mut predictions: BTreeMap<SymbolId, BTreeMap<SymbolId, u32>> = grammar
        .symbol_table()
        .non_terminal_ids()
        .map(|ident| (ident, BTreeMap::new()))
        .collect();
    let mut conflicts = vec![];

    for production in grammar.productions() {
        let left_hand_side = production.left_hand_side();
        let (mut predict, nullable) = sets.first_of_string(production.right_hand_side());
        if nullable {
            predict |= sets.follow(left_hand_side);
        }
        let row = predictions.get_mut(&left_hand_side).expect("nonterminal");
        for look_ahead in predict.iter() {
            match row.get(look_ahead) {
                None => {
                    row.insert(*look_ahead, production.ident());
                }
                Some(existing) => {
                    // Productions arrive in declaration order, so the earlier
                    // one is already in the cell and stays there.
                    let (existing_firsts, _) = sets.first_of_string(
                        grammar.production(*existing).right_hand_side(),
                    );
                    let kind = if existing_firsts.contains(*look_ahead)
                        && sets.first_of_string(production.right_hand_side())
                            .0
                            .contains(*look_ahead)
                    {
                        ConflictKind::FirstFirst
                    } else {
                        ConflictKind::FirstFollow
                    };
                    warn!(
                        "LL(1) conflict for {} on \"{}\"; keeping production {}",
                        grammar.symbol_table().name(left_hand_side),
                        grammar.symbol_table().name(*look_ahead),
                        existing
                    );
                    conflicts.push(Conflict {
                        owner: left_hand_side,
                        look_ahead: *look_ahead,
                        chosen: Action::Reduce(*existing),
                        discarded: Action::Reduce(production.ident()),
                        kind,
                    });
                }
            }
        }
    }

    LlTable {
        predictions,
        productions: grammar
            .productions()
            .map(|p| (p.left_hand_side(), p.right_hand_side().to_vec()))
            .collect(),
        token_flags: grammar
            .symbol_table()
            .symbol_ids()
            .map(|ident| grammar.symbol_table().is_token(ident))
            .collect(),
        symbol_names: grammar.symbol_table().names(),
        start: grammar.start(),
        conflicts,
    }
}
