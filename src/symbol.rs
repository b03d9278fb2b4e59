// Copyright 2022 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>

use std::{
    collections::{btree_set, BTreeMap, BTreeSet},
    fmt,
    iter::FromIterator,
    ops::{BitOr, BitOrAssign},
};

/// Stable integer identity of a grammar symbol.
pub type SymbolId = u32;

/// Id of the synthetic augmentation nonterminal (display name `$accept`).
pub const ACCEPT_SYMBOL: SymbolId = 0;
/// Id of the end-of-input terminal (display name `$end`).
pub const END_SYMBOL: SymbolId = 1;
/// Id of the error-recovery placeholder terminal (display name `error`).
pub const ERROR_SYMBOL: SymbolId = 2;

pub const ACCEPT_NAME: &str = "$accept";
pub const END_NAME: &str = "$end";
pub const ERROR_NAME: &str = "error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Associativity {
    NonAssoc,
    Left,
    Right,
}

impl Default for Associativity {
    fn default() -> Self {
        Associativity::NonAssoc
    }
}

impl fmt::Display for Associativity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Associativity::*;
        match self {
            NonAssoc => write!(f, "NonAssoc"),
            Left => write!(f, "Left"),
            Right => write!(f, "Right"),
        }
    }
}

/// Precedence level paired with its associativity.  Level 0 means "never
/// declared"; declared levels start at 1 and higher levels bind tighter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssociativePrecedence {
    pub associativity: Associativity,
    pub precedence: u16,
}

impl AssociativePrecedence {
    pub fn explicitly_set(&self) -> bool {
        self.precedence > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Token,
    NonTerminal,
}

#[derive(Debug, Clone)]
struct SymbolData {
    name: String,
    kind: SymbolKind,
    associative_precedence: AssociativePrecedence,
}

/// Interns symbol names to dense integer ids and records each symbol's
/// classification and operator precedence.  Ids 0..=2 are reserved at
/// construction and the classification of every symbol is fixed once the
/// owning grammar has been built.
#[derive(Debug)]
pub struct SymbolTable {
    symbols: Vec<SymbolData>,
    index: BTreeMap<String, SymbolId>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        let mut table = Self {
            symbols: vec![],
            index: BTreeMap::new(),
        };
        table.intern(ACCEPT_NAME, SymbolKind::NonTerminal);
        table.intern(END_NAME, SymbolKind::Token);
        table.intern(ERROR_NAME, SymbolKind::Token);
        table
    }
}

impl SymbolTable {
    pub fn intern(&mut self, name: &str, kind: SymbolKind) -> SymbolId {
        if let Some(ident) = self.index.get(name) {
            return *ident;
        }
        let ident = self.symbols.len() as SymbolId;
        self.symbols.push(SymbolData {
            name: name.to_string(),
            kind,
            associative_precedence: AssociativePrecedence::default(),
        });
        self.index.insert(name.to_string(), ident);
        ident
    }

    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.index.get(name).copied()
    }

    pub fn name(&self, ident: SymbolId) -> &str {
        &self.symbols[ident as usize].name
    }

    pub fn kind(&self, ident: SymbolId) -> SymbolKind {
        self.symbols[ident as usize].kind
    }

    pub fn is_token(&self, ident: SymbolId) -> bool {
        self.kind(ident) == SymbolKind::Token
    }

    pub fn is_non_terminal(&self, ident: SymbolId) -> bool {
        self.kind(ident) == SymbolKind::NonTerminal
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbol_ids(&self) -> impl Iterator<Item = SymbolId> + '_ {
        (0..self.symbols.len()).map(|i| i as SymbolId)
    }

    pub fn token_ids(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.symbol_ids().filter(move |i| self.is_token(*i))
    }

    pub fn non_terminal_ids(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.symbol_ids().filter(move |i| self.is_non_terminal(*i))
    }

    pub fn set_associative_precedence(
        &mut self,
        ident: SymbolId,
        associativity: Associativity,
        precedence: u16,
    ) {
        debug_assert!(precedence > 0);
        self.symbols[ident as usize].associative_precedence = AssociativePrecedence {
            associativity,
            precedence,
        };
    }

    pub fn associative_precedence(&self, ident: SymbolId) -> AssociativePrecedence {
        self.symbols[ident as usize].associative_precedence
    }

    pub fn names(&self) -> Vec<String> {
        self.symbols.iter().map(|s| s.name.clone()).collect()
    }
}

/// A deterministic set of terminal ids.
#[derive(Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TokenSet(BTreeSet<SymbolId>);

impl TokenSet {
    pub fn new() -> Self {
        TokenSet::default()
    }

    pub fn singleton(token: SymbolId) -> Self {
        let mut set = Self::new();
        set.insert(token);
        set
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, token: SymbolId) -> bool {
        self.0.contains(&token)
    }

    pub fn insert(&mut self, token: SymbolId) -> bool {
        self.0.insert(token)
    }

    pub fn remove(&mut self, token: SymbolId) -> bool {
        self.0.remove(&token)
    }

    pub fn iter(&self) -> btree_set::Iter<'_, SymbolId> {
        self.0.iter()
    }

    pub fn intersection(&self, other: &Self) -> Self {
        Self(self.0.intersection(&other.0).copied().collect())
    }

    pub fn difference(&self, other: &Self) -> Self {
        Self(self.0.difference(&other.0).copied().collect())
    }
}

impl BitOrAssign<&Self> for TokenSet {
    fn bitor_assign(&mut self, rhs: &Self) {
        self.0 = (&self.0).bitor(&rhs.0);
    }
}

impl FromIterator<SymbolId> for TokenSet {
    fn from_iter<I: IntoIterator<Item = SymbolId>>(iter: I) -> Self {
        Self(BTreeSet::from_iter(iter))
    }
}

impl<'a> IntoIterator for &'a TokenSet {
    type Item = &'a SymbolId;
    type IntoIter = btree_set::Iter<'a, SymbolId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut string = "TokenSet{".to_string();
        for (index, item) in self.iter().enumerate() {
            if index == 0 {
                string += &format!("{}", item);
            } else {
                string += &format!(", {}", item);
            }
        }
        string += "}";
        write!(f, "{}", string)
    }
}
