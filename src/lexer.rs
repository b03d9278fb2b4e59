use regex::Regex;
use thiserror::Error;

use crate::parser::{Location, ParseError, Token, TokenSource};
use crate::symbol::{SymbolId, END_SYMBOL};

#[derive(Debug, Error)]
pub enum LexiconError {
    #[error("handle {0} given more than one pattern")]
    DuplicateHandle(SymbolId),
    #[error("pattern \"{0}\" given more than one handle")]
    DuplicatePattern(String),
    #[error("empty pattern for handle {0}")]
    EmptyPattern(SymbolId),
    #[error(transparent)]
    Regex(#[from] regex::Error),
}

/// A table of literal and regular-expression token definitions keyed by
/// terminal id, plus skip patterns.  Matching is longest-match; a literal
/// beats a regex of the same length and earlier declaration breaks any
/// remaining tie.
#[derive(Debug, Default)]
pub struct LexicalAnalyzer {
    literals: Vec<(SymbolId, String)>,
    regexes: Vec<(SymbolId, Regex)>,
    skips: Vec<Regex>,
}

fn anchored(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"\A(?:{})", pattern))
}

impl LexicalAnalyzer {
    pub fn new(
        literals: &[(SymbolId, &str)],
        regex_patterns: &[(SymbolId, &str)],
        skip_patterns: &[&str],
    ) -> Result<Self, LexiconError> {
        let mut handles = vec![];
        let mut patterns = vec![];
        let mut analyzer = LexicalAnalyzer::default();
        for (handle, pattern) in literals.iter().chain(regex_patterns.iter()) {
            if pattern.is_empty() {
                return Err(LexiconError::EmptyPattern(*handle));
            }
            match handles.binary_search(handle) {
                Ok(_) => return Err(LexiconError::DuplicateHandle(*handle)),
                Err(index) => handles.insert(index, *handle),
            }
            match patterns.binary_search(pattern) {
                Ok(_) => return Err(LexiconError::DuplicatePattern(pattern.to_string())),
                Err(index) => patterns.insert(index, *pattern),
            }
        }
        for (handle, text) in literals.iter() {
            analyzer.literals.push((*handle, text.to_string()));
        }
        for (handle, pattern) in regex_patterns.iter() {
            analyzer.regexes.push((*handle, anchored(pattern)?));
        }
        for pattern in skip_patterns.iter() {
            analyzer.skips.push(anchored(pattern)?);
        }
        Ok(analyzer)
    }

    /// Number of skippable bytes at the start of `text`.
    fn skippable_count(&self, text: &str) -> usize {
        let mut index = 0;
        'outer: while index < text.len() {
            for regex in self.skips.iter() {
                if let Some(m) = regex.find(&text[index..]) {
                    if m.end() > 0 {
                        index += m.end();
                        continue 'outer;
                    }
                }
            }
            break;
        }
        index
    }

    fn longest_literal_match(&self, text: &str) -> Option<(SymbolId, usize)> {
        let mut best: Option<(SymbolId, usize)> = None;
        for (handle, literal) in self.literals.iter() {
            if text.starts_with(literal.as_str()) {
                match best {
                    Some((_, length)) if literal.len() <= length => (),
                    _ => best = Some((*handle, literal.len())),
                }
            }
        }
        best
    }

    fn longest_regex_match(&self, text: &str) -> Option<(SymbolId, usize)> {
        let mut best: Option<(SymbolId, usize)> = None;
        for (handle, regex) in self.regexes.iter() {
            if let Some(m) = regex.find(text) {
                match best {
                    Some((_, length)) if m.end() <= length => (),
                    _ => {
                        if m.end() > 0 {
                            best = Some((*handle, m.end()));
                        }
                    }
                }
            }
        }
        best
    }

    /// A token source over `text`.
    pub fn tokens<'a>(&'a self, text: &'a str) -> TextTokens<'a> {
        TextTokens {
            analyzer: self,
            text,
            index: 0,
            line: 1,
            column: 1,
        }
    }
}

/// A `TokenSource` over one input text, tracking line, column and byte
/// offsets as it advances.
#[derive(Debug)]
pub struct TextTokens<'a> {
    analyzer: &'a LexicalAnalyzer,
    text: &'a str,
    index: usize,
    line: usize,
    column: usize,
}

impl<'a> TextTokens<'a> {
    fn advance_over(&mut self, length: usize) {
        let slice = &self.text[self.index..self.index + length];
        for ch in slice.chars() {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.index += length;
    }

    fn location_for(&mut self, length: usize) -> Location {
        let first_line = self.line;
        let first_column = self.column;
        let start = self.index;
        self.advance_over(length);
        Location {
            first_line,
            first_column,
            last_line: self.line,
            last_column: self.column,
            start,
            end: self.index,
        }
    }

    fn here(&self) -> Location {
        Location {
            first_line: self.line,
            first_column: self.column,
            last_line: self.line,
            last_column: self.column,
            start: self.index,
            end: self.index,
        }
    }
}

impl<'a> TokenSource for TextTokens<'a> {
    fn next_token(&mut self) -> Result<Token, ParseError> {
        self.advance_over(self.analyzer.skippable_count(&self.text[self.index..]));
        if self.index >= self.text.len() {
            return Ok(Token::new(END_SYMBOL, "", self.here()));
        }
        let rest = &self.text[self.index..];
        let literal = self.analyzer.longest_literal_match(rest);
        let regex = self.analyzer.longest_regex_match(rest);
        let matched = match (literal, regex) {
            (Some((handle, length)), Some((_, regex_length))) if length >= regex_length => {
                Some((handle, length))
            }
            (_, Some((handle, length))) => Some((handle, length)),
            (Some((handle, length)), None) => Some((handle, length)),
            (None, None) => None,
        };
        match matched {
            Some((handle, length)) => {
                let lexeme = &self.text[self.index..self.index + length];
                let lexeme = lexeme.to_string();
                let location = self.location_for(length);
                Ok(Token::new(handle, &lexeme, location))
            }
            None => {
                let length = rest.chars().next().map(char::len_utf8).unwrap_or(1);
                let text = rest[..length].to_string();
                let location = self.location_for(length);
                Err(ParseError::Lexical { text, location })
            }
        }
    }

    fn show_position(&self) -> String {
        let rest = &self.text[self.index..];
        let upcoming: String = rest.chars().take(24).collect();
        let upcoming = match upcoming.find('\n') {
            Some(eol) => &upcoming[..eol],
            None => upcoming.as_str(),
        };
        format!("{}\n^", upcoming)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IF: SymbolId = 3;
    const WHEN: SymbolId = 4;
    const IDENT: SymbolId = 5;

    fn analyzer() -> LexicalAnalyzer {
        LexicalAnalyzer::new(
            &[(IF, "if"), (WHEN, "when")],
            &[(IDENT, r"[a-zA-Z]+[\w_]*")],
            &[r"(/\*(.|[\n\r])*?\*/)", r"(//[^\n\r]*)", r"(\s+)"],
        )
        .unwrap()
    }

    #[test]
    fn duplicate_handles_are_rejected() {
        assert!(matches!(
            LexicalAnalyzer::new(&[(IF, "if")], &[(IF, "when")], &[]),
            Err(LexiconError::DuplicateHandle(IF))
        ));
    }

    #[test]
    fn token_stream_basics() {
        let analyzer = analyzer();
        let mut tokens = analyzer.tokens(" if nothing happens ");
        // A literal beats a regex of the same length.
        let token = tokens.next_token().unwrap();
        assert_eq!(token.tag(), IF);
        assert_eq!(token.lexeme(), "if");
        assert_eq!(token.location().first_column, 2);
        let token = tokens.next_token().unwrap();
        assert_eq!(token.tag(), IDENT);
        assert_eq!(token.lexeme(), "nothing");
        let token = tokens.next_token().unwrap();
        assert_eq!(token.lexeme(), "happens");
        let token = tokens.next_token().unwrap();
        assert_eq!(token.tag(), END_SYMBOL);
    }

    #[test]
    fn longest_match_prefers_ident_over_keyword_prefix() {
        let analyzer = analyzer();
        let mut tokens = analyzer.tokens("iffy");
        let token = tokens.next_token().unwrap();
        assert_eq!(token.tag(), IDENT);
        assert_eq!(token.lexeme(), "iffy");
    }

    #[test]
    fn locations_track_lines_and_offsets() {
        let analyzer = analyzer();
        let mut tokens = analyzer.tokens("if\n  when");
        let token = tokens.next_token().unwrap();
        assert_eq!((token.location().first_line, token.location().first_column), (1, 1));
        let token = tokens.next_token().unwrap();
        assert_eq!((token.location().first_line, token.location().first_column), (2, 3));
        assert_eq!(token.location().start, 5);
        assert_eq!(token.location().end, 9);
        let token = tokens.next_token().unwrap();
        assert_eq!(token.tag(), END_SYMBOL);
        assert_eq!(token.lexeme(), "");
    }

    #[test]
    fn comments_are_skipped() {
        let analyzer = analyzer();
        let mut tokens = analyzer.tokens("/* ignored */ when // trailing");
        let token = tokens.next_token().unwrap();
        assert_eq!(token.tag(), WHEN);
        let token = tokens.next_token().unwrap();
        assert_eq!(token.tag(), END_SYMBOL);
    }

    #[test]
    fn unexpected_text_is_a_lexical_error() {
        let analyzer = analyzer();
        let mut tokens = analyzer.tokens("if ?");
        tokens.next_token().unwrap();
        match tokens.next_token().unwrap_err() {
            ParseError::Lexical { text, location } => {
                assert_eq!(text, "?");
                assert_eq!(location.first_column, 4);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        // The bad byte is consumed; the stream continues.
        let token = tokens.next_token().unwrap();
        assert_eq!(token.tag(), END_SYMBOL);
    }

    #[test]
    fn show_position_renders_upcoming_text() {
        let analyzer = analyzer();
        let tokens = analyzer.tokens("when next");
        assert_eq!(tokens.show_position(), "when next\n^");
    }
}
