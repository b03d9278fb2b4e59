// Copyright 2022 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>

//! End-to-end expression parsing: precedence resolution, semantic actions
//! and the bundled lexical analyzer.

use parsetab::{
    build, Algorithm, Associativity, Grammar, GrammarSpec, LexicalAnalyzer, Location, ParseError,
    SemanticActions, Token,
};

fn expression_grammar() -> Grammar {
    Grammar::new(
        GrammarSpec::new("E")
            .tokens(&["plus", "times", "lparen", "rparen", "id"])
            .operators(Associativity::Left, &["plus"])
            .operators(Associativity::Left, &["times"])
            .rule("E", &["E", "plus", "E"])
            .rule("E", &["E", "times", "E"])
            .rule("E", &["lparen", "E", "rparen"])
            .rule("E", &["id"]),
    )
    .unwrap()
}

fn expression_lexer(grammar: &Grammar) -> LexicalAnalyzer {
    let symbols = grammar.symbol_table();
    let id = |name: &str| symbols.lookup(name).unwrap();
    LexicalAnalyzer::new(
        &[
            (id("plus"), "+"),
            (id("times"), "*"),
            (id("lparen"), "("),
            (id("rparen"), ")"),
        ],
        &[(id("id"), r"[0-9]+|[a-z][a-z0-9_]*")],
        &[r"\s+"],
    )
    .unwrap()
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct Ast(String);

impl From<Token> for Ast {
    fn from(token: Token) -> Self {
        Ast(token.lexeme().to_string())
    }
}

/// Builds a fully parenthesized rendering so associativity and precedence
/// are visible in the result.
#[derive(Default)]
struct AstActions;

impl SemanticActions for AstActions {
    type Attribute = Ast;

    fn perform_action(
        &mut self,
        production: u32,
        lhs: &mut Ast,
        rhs: &[Ast],
        _locations: &[Location],
    ) -> Result<Option<Ast>, ParseError> {
        match production {
            1 => *lhs = Ast(format!("({}+{})", rhs[0].0, rhs[2].0)),
            2 => *lhs = Ast(format!("({}*{})", rhs[0].0, rhs[2].0)),
            3 => *lhs = rhs[1].clone(),
            _ => (),
        }
        Ok(None)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct Value(i64);

impl From<Token> for Value {
    fn from(token: Token) -> Self {
        Value(token.lexeme().parse().unwrap_or(0))
    }
}

#[derive(Default)]
struct EvalActions;

impl SemanticActions for EvalActions {
    type Attribute = Value;

    fn perform_action(
        &mut self,
        production: u32,
        lhs: &mut Value,
        rhs: &[Value],
        _locations: &[Location],
    ) -> Result<Option<Value>, ParseError> {
        match production {
            1 => *lhs = Value(rhs[0].0 + rhs[2].0),
            2 => *lhs = Value(rhs[0].0 * rhs[2].0),
            3 => *lhs = rhs[1].clone(),
            _ => (),
        }
        Ok(None)
    }
}

#[test]
fn precedence_leaves_no_conflicts() {
    let table = build(&expression_grammar(), Algorithm::Lalr1);
    assert!(table.conflicts().is_empty());
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    let grammar = expression_grammar();
    let table = build(&grammar, Algorithm::Lalr1);
    let table = table.as_lr().unwrap();
    let lexer = expression_lexer(&grammar);
    let ast = table
        .parse(&mut lexer.tokens("id + id * id"), &mut AstActions)
        .unwrap();
    assert_eq!(ast, Ast("(id+(id*id))".to_string()));
}

#[test]
fn addition_is_left_associative() {
    let grammar = expression_grammar();
    let table = build(&grammar, Algorithm::Lalr1);
    let table = table.as_lr().unwrap();
    let lexer = expression_lexer(&grammar);
    let ast = table
        .parse(&mut lexer.tokens("a + b + c"), &mut AstActions)
        .unwrap();
    assert_eq!(ast, Ast("((a+b)+c)".to_string()));
}

#[test]
fn parentheses_override_precedence() {
    let grammar = expression_grammar();
    let table = build(&grammar, Algorithm::Lalr1);
    let table = table.as_lr().unwrap();
    let lexer = expression_lexer(&grammar);
    for (text, expected) in [
        ("1 + 2 * 3", 7),
        ("(1 + 2) * 3", 9),
        ("2 * 3 + 4", 10),
        ("1 + 2 + 3", 6),
    ] {
        let value = table
            .parse(&mut lexer.tokens(text), &mut EvalActions)
            .unwrap();
        assert_eq!(value, Value(expected), "{}", text);
    }
}

#[test]
fn every_lr_family_member_accepts_the_language() {
    let grammar = expression_grammar();
    let lexer = expression_lexer(&grammar);
    // LR(0) is too weak for this grammar (its conflicts are resolved in
    // favour of shift) but SLR(1) upward agree after precedence resolution.
    for algorithm in [Algorithm::Slr1, Algorithm::Lalr1, Algorithm::Lr1] {
        let table = build(&grammar, algorithm);
        assert!(table.conflicts().is_empty(), "{:?}", algorithm);
        let value = table
            .as_lr()
            .unwrap()
            .parse(&mut lexer.tokens("(1 + 2) * (3 + 4)"), &mut EvalActions)
            .unwrap();
        assert_eq!(value, Value(21), "{:?}", algorithm);
    }
}

#[test]
fn unlexable_input_is_a_fatal_lexical_error() {
    let grammar = expression_grammar();
    let table = build(&grammar, Algorithm::Lalr1);
    let table = table.as_lr().unwrap();
    let lexer = expression_lexer(&grammar);
    match table
        .parse(&mut lexer.tokens("1 + ?"), &mut EvalActions)
        .unwrap_err()
    {
        ParseError::Lexical { text, location } => {
            assert_eq!(text, "?");
            assert_eq!(location.first_column, 5);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}
