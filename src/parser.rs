// Copyright 2022 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

use crate::symbol::{SymbolId, END_SYMBOL};
use crate::table::{Action, LlTable, LrTable};

/// A source position span.  Lines and columns are 1-based; `start..end` is
/// the byte range within the input text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub first_line: usize,
    pub first_column: usize,
    pub last_line: usize,
    pub last_column: usize,
    pub start: usize,
    pub end: usize,
}

impl Default for Location {
    fn default() -> Self {
        Self {
            first_line: 1,
            first_column: 1,
            last_line: 1,
            last_column: 1,
            start: 0,
            end: 0,
        }
    }
}

impl Location {
    /// The span covering `first` through `last`.
    pub fn span(first: &Location, last: &Location) -> Location {
        Location {
            first_line: first.first_line,
            first_column: first.first_column,
            last_line: last.last_line,
            last_column: last.last_column,
            start: first.start,
            end: last.end,
        }
    }

    /// A zero-width location at the end of `self`, for ε reductions.
    pub fn end_point(&self) -> Location {
        Location {
            first_line: self.last_line,
            first_column: self.last_column,
            last_line: self.last_line,
            last_column: self.last_column,
            start: self.end,
            end: self.end,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.first_line, self.first_column)
    }
}

/// A lexeme tagged with its terminal id and source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    tag: SymbolId,
    lexeme: String,
    location: Location,
}

impl Token {
    pub fn new(tag: SymbolId, lexeme: &str, location: Location) -> Self {
        Self {
            tag,
            lexeme: lexeme.to_string(),
            location,
        }
    }

    pub fn tag(&self) -> SymbolId {
        self.tag
    }

    pub fn lexeme(&self) -> &str {
        &self.lexeme
    }

    pub fn location(&self) -> &Location {
        &self.location
    }
}

fn format_or_list(items: &[String]) -> String {
    let mut string = String::new();
    let last = items.len().saturating_sub(1);
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            string += if index == last { " or " } else { ", " };
        }
        string += item;
    }
    string
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error(
        "syntax error: expected: {} found: \"{}\" at: {}",
        format_or_list(.expected),
        .token.lexeme(),
        .token.location()
    )]
    Syntax {
        state: u32,
        token: Token,
        expected: Vec<String>,
        recoverable: bool,
    },
    #[error("lexical error: unexpected text \"{text}\" at: {location}")]
    Lexical { text: String, location: Location },
    #[error("parse cancelled")]
    Cancelled,
    #[error("semantic error: {0}")]
    Semantic(String),
}

/// The pull interface a lexer provides to the parse loop.  `$end` must be
/// delivered exactly once at the end of the stream; behaviour of further
/// calls is the source's own affair.
pub trait TokenSource {
    fn next_token(&mut self) -> Result<Token, ParseError>;

    /// A short rendering of the current position for diagnostics.
    fn show_position(&self) -> String {
        String::new()
    }
}

/// Reduction callbacks.  `perform_action` fires on every reduction, before
/// the handle is popped, in left-to-right bottom-up order; `lhs` arrives
/// seeded with the first right-hand-side attribute (or the default for ε).
/// Returning `Ok(Some(value))` ends the parse immediately with that value.
pub trait SemanticActions {
    type Attribute: Default + Clone + From<Token>;

    fn perform_action(
        &mut self,
        production: u32,
        lhs: &mut Self::Attribute,
        rhs: &[Self::Attribute],
        locations: &[Location],
    ) -> Result<Option<Self::Attribute>, ParseError> {
        let _ = (production, lhs, rhs, locations);
        Ok(None)
    }

    fn report_error(&mut self, error: &ParseError) {
        log::error!("{}", error);
    }
}

impl From<Token> for () {
    fn from(_: Token) -> Self {}
}

/// Accept/reject driving with no semantic values.
#[derive(Debug, Default)]
pub struct Recognizer;

impl SemanticActions for Recognizer {
    type Attribute = ();
}

/// Three parallel stacks: state, attribute and location.  The state stack
/// keeps one more entry than the others (the start state has no attribute).
#[derive(Debug)]
struct ParseStack<A> {
    states: Vec<u32>,
    attributes: Vec<A>,
    locations: Vec<Location>,
}

impl<A: Clone> ParseStack<A> {
    fn new() -> Self {
        Self {
            states: vec![0],
            attributes: vec![],
            locations: vec![],
        }
    }

    fn current_state(&self) -> u32 {
        *self.states.last().expect("start state is never popped")
    }

    fn push(&mut self, state: u32, attribute: A, location: Location) {
        self.states.push(state);
        self.attributes.push(attribute);
        self.locations.push(location);
    }

    fn pop_n(&mut self, n: usize) {
        self.states.truncate(self.states.len() - n);
        self.attributes.truncate(self.attributes.len() - n);
        self.locations.truncate(self.locations.len() - n);
    }

    fn pop_frame(&mut self) {
        self.pop_n(1);
    }

    fn frame_count(&self) -> usize {
        self.attributes.len()
    }

    fn handle(&self, len: usize) -> (&[A], &[Location]) {
        let split = self.attributes.len() - len;
        (&self.attributes[split..], &self.locations[split..])
    }

    /// The combined location for a reduction of `len` symbols.
    fn reduction_location(&self, len: usize) -> Location {
        if len > 0 {
            let (_, locations) = self.handle(len);
            Location::span(&locations[0], &locations[len - 1])
        } else {
            match self.locations.last() {
                Some(location) => location.end_point(),
                None => Location::default(),
            }
        }
    }
}

enum Reduction<A> {
    Continue,
    EarlyAccept(A),
}

/// Shifts a recovery re-arms after: this many successful shifts must occur
/// before syntax errors are reported again.
const RECOVERY_SHIFT_COUNT: u32 = 3;

impl LrTable {
    /// Runs the shift-reduce loop to acceptance or a fatal error.
    pub fn parse<L, S>(&self, lexer: &mut L, actions: &mut S) -> Result<S::Attribute, ParseError>
    where
        L: TokenSource,
        S: SemanticActions,
    {
        self.drive(lexer, actions, None)
    }

    /// As `parse`, but checks `cancel` at the top of every iteration.
    pub fn parse_cancellable<L, S>(
        &self,
        lexer: &mut L,
        actions: &mut S,
        cancel: &AtomicBool,
    ) -> Result<S::Attribute, ParseError>
    where
        L: TokenSource,
        S: SemanticActions,
    {
        self.drive(lexer, actions, Some(cancel))
    }

    fn drive<L, S>(
        &self,
        lexer: &mut L,
        actions: &mut S,
        cancel: Option<&AtomicBool>,
    ) -> Result<S::Attribute, ParseError>
    where
        L: TokenSource,
        S: SemanticActions,
    {
        let mut stack = ParseStack::<S::Attribute>::new();
        let mut look_ahead: Option<Token> = None;
        let mut recovery_shifts_owed = 0_u32;

        loop {
            if let Some(cancel) = cancel {
                if cancel.load(Ordering::Relaxed) {
                    return Err(ParseError::Cancelled);
                }
            }
            let state = stack.current_state();

            // A forced reduction needs no lookahead, which lets the loop
            // skip lexing entirely.
            if let Some(production) = self.default_action(state) {
                match self.reduce(production, &mut stack, actions)? {
                    Reduction::Continue => continue,
                    Reduction::EarlyAccept(value) => return Ok(value),
                }
            }

            let token = match &look_ahead {
                Some(token) => token.clone(),
                None => {
                    let token = lexer.next_token().map_err(|error| {
                        actions.report_error(&error);
                        error
                    })?;
                    look_ahead = Some(token.clone());
                    token
                }
            };

            match self.action(state, token.tag()) {
                Some(Action::Shift(next_state)) => {
                    let location = token.location().clone();
                    let attribute = S::Attribute::from(token);
                    stack.push(next_state, attribute, location);
                    look_ahead = None;
                    recovery_shifts_owed = recovery_shifts_owed.saturating_sub(1);
                }
                Some(Action::Reduce(production)) => {
                    match self.reduce(production, &mut stack, actions)? {
                        Reduction::Continue => (),
                        Reduction::EarlyAccept(value) => return Ok(value),
                    }
                }
                Some(Action::Accept) => {
                    return Ok(stack.attributes.pop().unwrap_or_default());
                }
                Some(Action::Error) | None => {
                    if recovery_shifts_owed > 0 {
                        // Still synchronizing: discard input instead of
                        // reporting.
                        if token.tag() == END_SYMBOL {
                            return Err(self.syntax_error(state, token, false));
                        }
                        look_ahead = None;
                        continue;
                    }
                    let recoverable = stack
                        .states
                        .iter()
                        .any(|stacked| self.error_shift_state(*stacked).is_some());
                    let error = self.syntax_error(state, token.clone(), recoverable);
                    actions.report_error(&error);
                    if !recoverable {
                        return Err(error);
                    }
                    self.synchronize(&mut stack, &token);
                    recovery_shifts_owed = RECOVERY_SHIFT_COUNT;
                }
            }
        }
    }

    fn reduce<S>(
        &self,
        production: u32,
        stack: &mut ParseStack<S::Attribute>,
        actions: &mut S,
    ) -> Result<Reduction<S::Attribute>, ParseError>
    where
        S: SemanticActions,
    {
        let (left_hand_side, len) = self.production_data(production);
        let location = stack.reduction_location(len);
        let (rhs, locations) = stack.handle(len);
        let mut lhs = rhs.first().cloned().unwrap_or_default();
        if let Some(value) = actions.perform_action(production, &mut lhs, rhs, locations)? {
            return Ok(Reduction::EarlyAccept(value));
        }
        stack.pop_n(len);
        let next_state = match self.goto_state(stack.current_state(), left_hand_side) {
            Some(next_state) => next_state,
            None => panic!(
                "malformed goto table: ({}, {})",
                self.symbol_name(left_hand_side),
                stack.current_state()
            ),
        };
        stack.push(next_state, lhs, location);
        Ok(Reduction::Continue)
    }

    fn syntax_error(&self, state: u32, token: Token, recoverable: bool) -> ParseError {
        let expected = self
            .expected_tokens(state)
            .iter()
            .map(|symbol| self.symbol_name(*symbol).to_string())
            .collect();
        ParseError::Syntax {
            state,
            token,
            expected,
            recoverable,
        }
    }

    /// Panic-mode synchronization: discard stack frames until a state that
    /// shifts the `error` placeholder, then shift it.  The offending
    /// lookahead stays current.
    fn synchronize<A: Default + Clone>(&self, stack: &mut ParseStack<A>, token: &Token) {
        loop {
            let top = stack.current_state();
            if let Some(target) = self.error_shift_state(top) {
                stack.push(target, A::default(), token.location().clone());
                return;
            }
            debug_assert!(stack.frame_count() > 0, "synchronize needs a viable state");
            stack.pop_frame();
        }
    }
}

impl LlTable {
    /// Table-driven predictive recognition: match terminals, expand
    /// nonterminals through the prediction table.  Accepts or rejects; the
    /// shift-reduce runtime is where semantic values live.
    pub fn parse<L: TokenSource>(&self, lexer: &mut L) -> Result<(), ParseError> {
        let mut stack: Vec<SymbolId> = vec![END_SYMBOL, self.start()];
        let mut token = lexer.next_token()?;
        while let Some(top) = stack.pop() {
            if self.is_token(top) {
                if token.tag() != top {
                    return Err(ParseError::Syntax {
                        state: top,
                        token,
                        expected: vec![self.symbol_name(top).to_string()],
                        recoverable: false,
                    });
                }
                if top == END_SYMBOL {
                    return Ok(());
                }
                token = lexer.next_token()?;
            } else {
                match self.production_for(top, token.tag()) {
                    Some(production) => {
                        for symbol in self.right_hand_side(production).iter().rev() {
                            stack.push(*symbol);
                        }
                    }
                    None => {
                        let expected = self
                            .expected_tokens(top)
                            .iter()
                            .map(|symbol| self.symbol_name(*symbol).to_string())
                            .collect();
                        return Err(ParseError::Syntax {
                            state: top,
                            token,
                            expected,
                            recoverable: false,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
