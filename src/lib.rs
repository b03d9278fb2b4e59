// Copyright 2022 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>

//! Parser-table construction and table-driven parsing.
//!
//! Given a structured grammar description, `parsetab` computes the tables
//! that drive a deterministic parser (LR(0), SLR(1), LALR(1), canonical
//! LR(1) or LL(1)) and interprets the LR tables with a shift-reduce loop
//! that supports operator precedence, panic-mode error recovery through the
//! `error` placeholder, and pluggable lexers and semantic actions.
//!
//! ```
//! use parsetab::{build, Algorithm, Grammar, GrammarSpec, LexicalAnalyzer, Recognizer};
//!
//! let grammar = Grammar::new(
//!     GrammarSpec::new("S")
//!         .tokens(&["a", "b"])
//!         .rule("S", &["a", "S", "b"])
//!         .rule("S", &[]),
//! )
//! .unwrap();
//! let table = build(&grammar, Algorithm::Lalr1);
//! assert!(table.conflicts().is_empty());
//!
//! let symbols = grammar.symbol_table();
//! let analyzer = LexicalAnalyzer::new(
//!     &[
//!         (symbols.lookup("a").unwrap(), "a"),
//!         (symbols.lookup("b").unwrap(), "b"),
//!     ],
//!     &[],
//!     &[r"\s+"],
//! )
//! .unwrap();
//! let table = table.as_lr().unwrap();
//! assert!(table
//!     .parse(&mut analyzer.tokens("a a b b"), &mut Recognizer)
//!     .is_ok());
//! ```

pub mod grammar;
pub mod lexer;
pub mod parser;
pub mod production;
pub mod sets;
pub mod state;
pub mod symbol;
pub mod table;

pub use crate::grammar::{Grammar, GrammarError, GrammarSpec, ProductionSpec};
pub use crate::lexer::{LexicalAnalyzer, LexiconError, TextTokens};
pub use crate::parser::{
    Location, ParseError, Recognizer, SemanticActions, Token, TokenSource,
};
pub use crate::sets::GrammarSets;
pub use crate::symbol::{
    Associativity, SymbolId, SymbolTable, TokenSet, END_SYMBOL, ERROR_SYMBOL,
};
pub use crate::table::{
    build, Action, Algorithm, Conflict, ConflictKind, LlTable, LrTable, Table,
};
