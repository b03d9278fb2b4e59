// Copyright 2022 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>

//! Syntax-error reporting and panic-mode recovery through the `error`
//! placeholder nonterminal.

use parsetab::{
    build, Algorithm, Grammar, GrammarSpec, LexicalAnalyzer, Location, ParseError, Recognizer,
    SemanticActions, Token, END_SYMBOL,
};

fn ab_grammar() -> Grammar {
    Grammar::new(
        GrammarSpec::new("S")
            .tokens(&["a", "b", "c"])
            .rule("S", &["a", "B"])
            .rule("B", &["b"])
            .rule("B", &["c"]),
    )
    .unwrap()
}

fn ab_lexer(grammar: &Grammar) -> LexicalAnalyzer {
    let symbols = grammar.symbol_table();
    LexicalAnalyzer::new(
        &[
            (symbols.lookup("a").unwrap(), "a"),
            (symbols.lookup("b").unwrap(), "b"),
            (symbols.lookup("c").unwrap(), "c"),
        ],
        &[],
        &[r"\s+"],
    )
    .unwrap()
}

/// Statement-list grammar with an error production: statements are
/// semicolon-terminated and an unparsable statement becomes an error node.
fn statements_grammar() -> Grammar {
    Grammar::new(
        GrammarSpec::new("S")
            .tokens(&["semi", "id", "junk"])
            .rule("S", &["stmt", "semi", "S"])
            .rule("S", &[])
            .rule("stmt", &["id"])
            .rule("stmt", &["error"]),
    )
    .unwrap()
}

fn statements_lexer(grammar: &Grammar) -> LexicalAnalyzer {
    let symbols = grammar.symbol_table();
    LexicalAnalyzer::new(
        &[(symbols.lookup("semi").unwrap(), ";")],
        &[
            (symbols.lookup("id").unwrap(), r"[a-z][a-z0-9_]*"),
            (symbols.lookup("junk").unwrap(), r"\?+"),
        ],
        &[r"\s+"],
    )
    .unwrap()
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
enum Stmt {
    #[default]
    Empty,
    Id(String),
    ErrorNode,
}

impl From<Token> for Stmt {
    fn from(token: Token) -> Self {
        Stmt::Id(token.lexeme().to_string())
    }
}

#[derive(Default)]
struct StatementActions {
    statements: Vec<Stmt>,
    errors_reported: usize,
}

impl SemanticActions for StatementActions {
    type Attribute = Stmt;

    fn perform_action(
        &mut self,
        production: u32,
        lhs: &mut Stmt,
        rhs: &[Stmt],
        _locations: &[Location],
    ) -> Result<Option<Stmt>, ParseError> {
        match production {
            // stmt: id
            3 => self.statements.push(rhs[0].clone()),
            // stmt: error
            4 => {
                *lhs = Stmt::ErrorNode;
                self.statements.push(Stmt::ErrorNode);
            }
            _ => (),
        }
        Ok(None)
    }

    fn report_error(&mut self, _error: &ParseError) {
        self.errors_reported += 1;
    }
}

#[test]
fn truncated_input_reports_the_expected_set() {
    let grammar = ab_grammar();
    let table = build(&grammar, Algorithm::Lalr1);
    let table = table.as_lr().unwrap();
    let lexer = ab_lexer(&grammar);
    for input in ["ab", "ac"] {
        assert!(table
            .parse(&mut lexer.tokens(input), &mut Recognizer)
            .is_ok());
    }
    match table
        .parse(&mut lexer.tokens("a"), &mut Recognizer)
        .unwrap_err()
    {
        ParseError::Syntax {
            token,
            expected,
            recoverable,
            ..
        } => {
            assert_eq!(token.tag(), END_SYMBOL);
            assert_eq!(token.location().first_column, 2);
            assert_eq!(expected, vec!["b".to_string(), "c".to_string()]);
            assert!(!recoverable);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    match table
        .parse(&mut lexer.tokens("b"), &mut Recognizer)
        .unwrap_err()
    {
        ParseError::Syntax { expected, .. } => assert_eq!(expected, vec!["a".to_string()]),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(table
        .parse(&mut lexer.tokens("ab c"), &mut Recognizer)
        .is_err());
}

#[test]
fn error_statement_becomes_an_error_node() {
    let grammar = statements_grammar();
    let table = build(&grammar, Algorithm::Lalr1);
    assert!(table.conflicts().is_empty());
    let table = table.as_lr().unwrap();
    let lexer = statements_lexer(&grammar);
    let mut actions = StatementActions::default();
    table
        .parse(&mut lexer.tokens("id ; ??? ; id ;"), &mut actions)
        .unwrap();
    assert_eq!(
        actions.statements,
        vec![
            Stmt::Id("id".to_string()),
            Stmt::ErrorNode,
            Stmt::Id("id".to_string()),
        ]
    );
    assert_eq!(actions.errors_reported, 1);
}

#[test]
fn recovery_rearms_after_three_shifts() {
    let grammar = statements_grammar();
    let table = build(&grammar, Algorithm::Lalr1);
    let table = table.as_lr().unwrap();
    let lexer = statements_lexer(&grammar);
    let mut actions = StatementActions::default();
    table
        .parse(&mut lexer.tokens("id ; ??? ; id ; ??? ; id ;"), &mut actions)
        .unwrap();
    // Both bad statements surface: the recovery counter reaches zero on the
    // shifts between them, so the second error is reported afresh.
    assert_eq!(actions.errors_reported, 2);
    assert_eq!(
        actions.statements,
        vec![
            Stmt::Id("id".to_string()),
            Stmt::ErrorNode,
            Stmt::Id("id".to_string()),
            Stmt::ErrorNode,
            Stmt::Id("id".to_string()),
        ]
    );
}

#[test]
fn unrecoverable_junk_is_fatal() {
    let grammar = ab_grammar();
    let table = build(&grammar, Algorithm::Lalr1);
    let table = table.as_lr().unwrap();
    let lexer = ab_lexer(&grammar);
    // No production mentions `error`, so recovery is impossible.
    match table
        .parse(&mut lexer.tokens("ba"), &mut Recognizer)
        .unwrap_err()
    {
        ParseError::Syntax { recoverable, .. } => assert!(!recoverable),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn junk_before_any_statement_recovers_too() {
    let grammar = statements_grammar();
    let table = build(&grammar, Algorithm::Lalr1);
    let table = table.as_lr().unwrap();
    let lexer = statements_lexer(&grammar);
    let mut actions = StatementActions::default();
    table
        .parse(&mut lexer.tokens("??? ; id ;"), &mut actions)
        .unwrap();
    assert_eq!(
        actions.statements,
        vec![Stmt::ErrorNode, Stmt::Id("id".to_string())]
    );
    assert_eq!(actions.errors_reported, 1);
}
