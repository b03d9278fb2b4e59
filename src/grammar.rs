// Copyright 2022 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>

use std::collections::BTreeSet;

use lazy_static::lazy_static;
use thiserror::Error;

use crate::production::Production;
use crate::symbol::{
    Associativity, AssociativePrecedence, SymbolId, SymbolKind, SymbolTable, ACCEPT_NAME,
    ACCEPT_SYMBOL, END_NAME, ERROR_NAME, ERROR_SYMBOL,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GrammarError {
    #[error("grammar has no productions")]
    EmptyGrammar,
    #[error("grammar has no start symbol")]
    NoStart,
    #[error("\"{0}\" is not a declared token and has no productions")]
    UndeclaredSymbol(String),
    #[error("token \"{0}\" may not appear as the left hand side of a production")]
    TokenAsNonTerminal(String),
    #[error("token \"{0}\" declared more than once")]
    DuplicateToken(String),
    #[error("\"{0}\" is not an allowable symbol name")]
    MalformedName(String),
}

lazy_static! {
    static ref NAME_CRE: regex::Regex =
        regex::Regex::new(r"\A([A-Za-z_$][A-Za-z0-9_$']*|[^\s]+)\z").unwrap();
}

fn is_allowable_name(name: &str) -> bool {
    !name.is_empty() && NAME_CRE.is_match(name)
}

/// One rule of the input grammar: a left hand side name and the sequence of
/// symbol names it derives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductionSpec {
    pub symbol: String,
    pub handle: Vec<String>,
}

impl ProductionSpec {
    pub fn new(symbol: &str, handle: &[&str]) -> Self {
        Self {
            symbol: symbol.to_string(),
            handle: handle.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// The structured grammar description accepted by the pipeline.  Grammar
/// source text parsing is a collaborator's concern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrammarSpec {
    pub start: String,
    pub tokens: Vec<String>,
    pub productions: Vec<ProductionSpec>,
    pub operators: Vec<(Associativity, Vec<String>)>,
}

impl GrammarSpec {
    pub fn new(start: &str) -> Self {
        Self {
            start: start.to_string(),
            ..Self::default()
        }
    }

    pub fn token(mut self, name: &str) -> Self {
        self.tokens.push(name.to_string());
        self
    }

    pub fn tokens(mut self, names: &[&str]) -> Self {
        self.tokens.extend(names.iter().map(|s| s.to_string()));
        self
    }

    pub fn rule(mut self, symbol: &str, handle: &[&str]) -> Self {
        self.productions.push(ProductionSpec::new(symbol, handle));
        self
    }

    /// Appends one operator level.  Levels are numbered in call order
    /// starting at 1 and later levels bind tighter.
    pub fn operators(mut self, associativity: Associativity, names: &[&str]) -> Self {
        self.operators
            .push((associativity, names.iter().map(|s| s.to_string()).collect()));
        self
    }
}

/// A validated, augmented grammar: the immutable input to the set solver and
/// the state builders.
#[derive(Debug)]
pub struct Grammar {
    symbol_table: SymbolTable,
    productions: Vec<Production>,
    start: SymbolId,
}

impl Grammar {
    pub fn new(spec: GrammarSpec) -> Result<Self, GrammarError> {
        if spec.productions.is_empty() {
            return Err(GrammarError::EmptyGrammar);
        }
        if spec.start.is_empty() {
            return Err(GrammarError::NoStart);
        }

        let mut symbol_table = SymbolTable::default();
        for name in spec.tokens.iter() {
            if name == ACCEPT_NAME || name == END_NAME || name == ERROR_NAME {
                return Err(GrammarError::MalformedName(name.clone()));
            }
            if !is_allowable_name(name) {
                return Err(GrammarError::MalformedName(name.clone()));
            }
            if symbol_table.lookup(name).is_some() {
                return Err(GrammarError::DuplicateToken(name.clone()));
            }
            symbol_table.intern(name, SymbolKind::Token);
        }

        // Left hand sides are the nonterminals; classification is fixed here.
        for production in spec.productions.iter() {
            let name = &production.symbol;
            if name == ACCEPT_NAME || name == END_NAME || name == ERROR_NAME {
                return Err(GrammarError::MalformedName(name.clone()));
            }
            if !is_allowable_name(name) {
                return Err(GrammarError::MalformedName(name.clone()));
            }
            if let Some(ident) = symbol_table.lookup(name) {
                if symbol_table.is_token(ident) {
                    return Err(GrammarError::TokenAsNonTerminal(name.clone()));
                }
            } else {
                symbol_table.intern(name, SymbolKind::NonTerminal);
            }
        }

        let start = match symbol_table.lookup(&spec.start) {
            Some(ident) if symbol_table.is_non_terminal(ident) => ident,
            _ => return Err(GrammarError::NoStart),
        };

        for (level, (associativity, names)) in spec.operators.iter().enumerate() {
            for name in names.iter() {
                match symbol_table.lookup(name) {
                    Some(ident) if symbol_table.is_token(ident) => {
                        symbol_table.set_associative_precedence(
                            ident,
                            *associativity,
                            (level + 1) as u16,
                        );
                    }
                    _ => return Err(GrammarError::UndeclaredSymbol(name.clone())),
                }
            }
        }

        let mut productions = Vec::with_capacity(spec.productions.len() + 1);
        productions.push(Production::new(
            0,
            ACCEPT_SYMBOL,
            vec![start],
            AssociativePrecedence::default(),
        ));
        for production_spec in spec.productions.iter() {
            let left_hand_side = symbol_table
                .lookup(&production_spec.symbol)
                .expect("interned above");
            let mut right_hand_side = Vec::with_capacity(production_spec.handle.len());
            for name in production_spec.handle.iter() {
                match symbol_table.lookup(name) {
                    Some(ident) => right_hand_side.push(ident),
                    None => return Err(GrammarError::UndeclaredSymbol(name.clone())),
                }
            }
            let associative_precedence =
                rhs_associated_precedence(&symbol_table, &right_hand_side);
            let ident = productions.len() as u32;
            productions.push(Production::new(
                ident,
                left_hand_side,
                right_hand_side,
                associative_precedence,
            ));
        }

        Ok(Self {
            symbol_table,
            productions,
            start,
        })
    }

    pub fn symbol_table(&self) -> &SymbolTable {
        &self.symbol_table
    }

    pub fn start(&self) -> SymbolId {
        self.start
    }

    pub fn production(&self, ident: u32) -> &Production {
        &self.productions[ident as usize]
    }

    pub fn productions(&self) -> impl Iterator<Item = &Production> {
        self.productions.iter()
    }

    pub fn production_count(&self) -> usize {
        self.productions.len()
    }

    pub fn productions_for(&self, left_hand_side: SymbolId) -> impl Iterator<Item = &Production> {
        self.productions
            .iter()
            .filter(move |p| p.left_hand_side() == left_hand_side)
    }

    /// Declared tokens plus `$end`; the `error` placeholder is excluded
    /// because it never arrives from a lexer.
    pub fn lexical_token_set(&self) -> BTreeSet<SymbolId> {
        self.symbol_table
            .token_ids()
            .filter(|ident| *ident != ERROR_SYMBOL)
            .collect()
    }
}

/// A production's precedence defaults to that of the rightmost terminal in
/// its right hand side.
fn rhs_associated_precedence(
    symbol_table: &SymbolTable,
    symbols: &[SymbolId],
) -> AssociativePrecedence {
    for symbol in symbols.iter().rev() {
        if symbol_table.is_token(*symbol) {
            return symbol_table.associative_precedence(*symbol);
        }
    }
    AssociativePrecedence::default()
}
