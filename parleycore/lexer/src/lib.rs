//! Tokenizer + backtracking token cursor for Parley scripts
use std::fmt;
use std::sync::Arc;

use parley_common::Span;

/// Two-character operators the scanner matches greedily before falling back
/// to single-character symbols.
const TWO_CHAR_SYMBOLS: [&str; 3] = ["&&", "<=", ">="];

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Double-quoted string. The scanner does no escape processing: it
    /// consumes everything up to the next `"`, nothing else is interpreted.
    QuotedString(String),
    /// Identifier (alphanumerics plus `_`). Compared case-insensitively.
    UnquotedString(String),
    Integer(i64),
    Double(f64),
    /// A single punctuation character, one of [`TWO_CHAR_SYMBOLS`], or the
    /// distinguished newline symbol `"\n"`.
    Symbol(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub file: Arc<str>,
}

impl Token {
    pub fn offset(&self) -> u32 { self.span.start }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TokenKind::QuotedString(s) => write!(f, "\"{}\"", s)?,
            TokenKind::UnquotedString(s) => write!(f, "'{}'", s)?,
            TokenKind::Integer(i) => write!(f, "{}", i)?,
            TokenKind::Double(d) => write!(f, "{}", d)?,
            TokenKind::Symbol(s) if s == "\n" => write!(f, "end of line")?,
            TokenKind::Symbol(s) => write!(f, "'{}'", s)?,
        }
        write!(f, " at {}:{}", self.file, self.span.start)
    }
}

/// Errors raised while turning source text into tokens or tokens into a
/// script. Each carries the offending token when one was available (`None`
/// means the token stream ran out).
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    ExpectedIdentifier { expected: String, found: Option<Token> },
    ExpectedOperator { symbol: String, found: Option<Token> },
    ExpectedOperandAfterOperator { symbol: String, found: Option<Token> },
    ExpectedInteger { found: Option<Token> },
    ExpectedNumber { found: Option<Token> },
    ExpectedString { found: Option<Token> },
    ExpectedValue { found: Option<Token> },
    ExpectedExpression { found: Option<Token> },
    ExpectedEndOfLine { found: Option<Token> },
    ExpectedFunctionName { found: Option<Token> },
}

impl ParseError {
    pub fn token(&self) -> Option<&Token> {
        match self {
            ParseError::ExpectedIdentifier { found, .. }
            | ParseError::ExpectedOperator { found, .. }
            | ParseError::ExpectedOperandAfterOperator { found, .. }
            | ParseError::ExpectedInteger { found }
            | ParseError::ExpectedNumber { found }
            | ParseError::ExpectedString { found }
            | ParseError::ExpectedValue { found }
            | ParseError::ExpectedExpression { found }
            | ParseError::ExpectedEndOfLine { found }
            | ParseError::ExpectedFunctionName { found } => found.as_ref(),
        }
    }
}

fn write_found(f: &mut fmt::Formatter<'_>, found: &Option<Token>) -> fmt::Result {
    match found {
        Some(t) => write!(f, ", found {}", t),
        None => write!(f, ", found end of script"),
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::ExpectedIdentifier { expected, found } => {
                if expected.is_empty() { write!(f, "expected an identifier")?; }
                else { write!(f, "expected '{}'", expected)?; }
                write_found(f, found)
            }
            ParseError::ExpectedOperator { symbol, found } => {
                write!(f, "expected '{}'", symbol)?;
                write_found(f, found)
            }
            ParseError::ExpectedOperandAfterOperator { symbol, found } => {
                write!(f, "expected an operand after '{}'", symbol)?;
                write_found(f, found)
            }
            ParseError::ExpectedInteger { found } => { write!(f, "expected an integer")?; write_found(f, found) }
            ParseError::ExpectedNumber { found } => { write!(f, "expected a number")?; write_found(f, found) }
            ParseError::ExpectedString { found } => { write!(f, "expected a string")?; write_found(f, found) }
            ParseError::ExpectedValue { found } => { write!(f, "expected a value")?; write_found(f, found) }
            ParseError::ExpectedExpression { found } => { write!(f, "expected an expression")?; write_found(f, found) }
            ParseError::ExpectedEndOfLine { found } => { write!(f, "expected end of line")?; write_found(f, found) }
            ParseError::ExpectedFunctionName { found } => { write!(f, "expected a handler name")?; write_found(f, found) }
        }
    }
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Scans source text into a random-access token buffer. Several sources may
/// be added to one tokenizer; tokens remember which file they came from.
#[derive(Default)]
pub struct Tokenizer {
    pub tokens: Vec<Token>,
}

impl Tokenizer {
    pub fn new() -> Self { Self::default() }

    pub fn add_tokens(&mut self, src: &str, file: &str) -> ParseResult<()> {
        let file: Arc<str> = Arc::from(file);
        let chars: Vec<(usize, char)> = src.char_indices().collect();
        let len = src.len();
        let mut i = 0usize;
        while i < chars.len() {
            let (at, c) = chars[i];
            // horizontal whitespace (carriage returns included)
            if c == ' ' || c == '\t' || c == '\r' { i += 1; continue; }
            if c == '"' {
                let mut text = String::new();
                let mut j = i + 1;
                while j < chars.len() && chars[j].1 != '"' { text.push(chars[j].1); j += 1; }
                if j >= chars.len() {
                    let tok = Token { kind: TokenKind::QuotedString(text), span: Span::new(at, len), file: file.clone() };
                    return Err(ParseError::ExpectedString { found: Some(tok) });
                }
                let end = chars[j].0 + 1;
                self.tokens.push(Token { kind: TokenKind::QuotedString(text), span: Span::new(at, end), file: file.clone() });
                i = j + 1;
                continue;
            }
            // `--` comments run to the end of the line
            if c == '-' && i + 1 < chars.len() && chars[i + 1].1 == '-' {
                while i < chars.len() && chars[i].1 != '\n' { i += 1; }
                continue;
            }
            if c == '\n' {
                self.tokens.push(Token { kind: TokenKind::Symbol("\n".into()), span: Span::new(at, at + 1), file: file.clone() });
                i += 1;
                continue;
            }
            if c.is_ascii_digit() {
                let mut j = i;
                while j < chars.len() && chars[j].1.is_ascii_digit() { j += 1; }
                let mut is_double = false;
                if j < chars.len() && chars[j].1 == '.' {
                    is_double = true;
                    j += 1;
                    while j < chars.len() && chars[j].1.is_ascii_digit() { j += 1; }
                }
                let end = if j < chars.len() { chars[j].0 } else { len };
                let text = &src[at..end];
                let kind = if is_double {
                    TokenKind::Double(text.parse::<f64>().unwrap_or(0.0))
                } else {
                    match text.parse::<i64>() {
                        Ok(v) => TokenKind::Integer(v),
                        Err(_) => TokenKind::Double(text.parse::<f64>().unwrap_or(0.0)),
                    }
                };
                self.tokens.push(Token { kind, span: Span::new(at, end), file: file.clone() });
                i = j;
                continue;
            }
            if is_identifier_char(c) {
                let mut j = i;
                while j < chars.len() && is_identifier_char(chars[j].1) { j += 1; }
                let end = if j < chars.len() { chars[j].0 } else { len };
                self.tokens.push(Token {
                    kind: TokenKind::UnquotedString(src[at..end].to_string()),
                    span: Span::new(at, end),
                    file: file.clone(),
                });
                i = j;
                continue;
            }
            // punctuation: longest match from the two-character set first
            if i + 1 < chars.len() {
                let pair_end = chars[i + 1].0 + chars[i + 1].1.len_utf8();
                let pair = &src[at..pair_end];
                if TWO_CHAR_SYMBOLS.contains(&pair) {
                    self.tokens.push(Token { kind: TokenKind::Symbol(pair.to_string()), span: Span::new(at, pair_end), file: file.clone() });
                    i += 2;
                    continue;
                }
            }
            let end = at + c.len_utf8();
            self.tokens.push(Token { kind: TokenKind::Symbol(c.to_string()), span: Span::new(at, end), file: file.clone() });
            i += 1;
        }
        Ok(())
    }
}

fn is_identifier_char(c: char) -> bool { c.is_ascii_alphanumeric() || c == '_' }

/// Cursor over a tokenizer's buffer. Backtracking is always
/// "remember `position()`, `seek()` back to it" — the cursor is nothing but
/// an index. The `has_*` family peeks and only advances on opt-in; the
/// `expect_*` family advances or fails with a precise [`ParseError`].
pub struct TokenCursor<'t> {
    tokens: &'t [Token],
    idx: usize,
}

impl<'t> TokenCursor<'t> {
    pub fn new(tokenizer: &'t Tokenizer) -> Self { Self { tokens: &tokenizer.tokens, idx: 0 } }

    pub fn is_at_end(&self) -> bool { self.idx >= self.tokens.len() }
    pub fn current(&self) -> Option<&'t Token> { self.tokens.get(self.idx) }

    pub fn position(&self) -> usize { self.idx }
    pub fn seek(&mut self, position: usize) { self.idx = position; }

    /// The token to blame in an error: the current one, or the last one when
    /// the stream ran out mid-construct.
    pub fn err_token(&self) -> Option<Token> {
        self.current().or_else(|| self.tokens.last()).cloned()
    }

    pub fn has_identifier(&mut self, advance: bool) -> Option<String> {
        match self.current() {
            Some(Token { kind: TokenKind::UnquotedString(s), .. }) => {
                let s = s.clone();
                if advance { self.idx += 1; }
                Some(s)
            }
            _ => None,
        }
    }

    pub fn has_specific_identifier(&mut self, word: &str, advance: bool) -> bool {
        match self.current() {
            Some(Token { kind: TokenKind::UnquotedString(s), .. }) if s.eq_ignore_ascii_case(word) => {
                if advance { self.idx += 1; }
                true
            }
            _ => false,
        }
    }

    /// Matches a run of consecutive identifier tokens atomically: either all
    /// words match (and the cursor advances past them iff `advance`), or the
    /// cursor is untouched.
    pub fn has_identifiers(&mut self, words: &[&str], advance: bool) -> bool {
        for (k, word) in words.iter().enumerate() {
            match self.tokens.get(self.idx + k) {
                Some(Token { kind: TokenKind::UnquotedString(s), .. }) if s.eq_ignore_ascii_case(word) => {}
                _ => return false,
            }
        }
        if advance { self.idx += words.len(); }
        true
    }

    pub fn has_string(&mut self, advance: bool) -> Option<String> {
        match self.current() {
            Some(Token { kind: TokenKind::QuotedString(s), .. }) => {
                let s = s.clone();
                if advance { self.idx += 1; }
                Some(s)
            }
            _ => None,
        }
    }

    pub fn has_integer(&mut self, advance: bool) -> Option<i64> {
        match self.current() {
            Some(Token { kind: TokenKind::Integer(v), .. }) => {
                let v = *v;
                if advance { self.idx += 1; }
                Some(v)
            }
            _ => None,
        }
    }

    pub fn has_double(&mut self, advance: bool) -> Option<f64> {
        match self.current() {
            Some(Token { kind: TokenKind::Double(v), .. }) => {
                let v = *v;
                if advance { self.idx += 1; }
                Some(v)
            }
            _ => None,
        }
    }

    pub fn has_symbol(&mut self, symbol: &str, advance: bool) -> bool {
        match self.current() {
            Some(Token { kind: TokenKind::Symbol(s), .. }) if s == symbol => {
                if advance { self.idx += 1; }
                true
            }
            _ => false,
        }
    }

    pub fn has_any_symbol(&mut self, advance: bool) -> Option<String> {
        match self.current() {
            Some(Token { kind: TokenKind::Symbol(s), .. }) => {
                let s = s.clone();
                if advance { self.idx += 1; }
                Some(s)
            }
            _ => None,
        }
    }

    pub fn has_newline(&mut self, advance: bool) -> bool { self.has_symbol("\n", advance) }

    pub fn expect_identifier(&mut self) -> ParseResult<String> {
        self.has_identifier(true)
            .ok_or_else(|| ParseError::ExpectedIdentifier { expected: String::new(), found: self.err_token() })
    }

    pub fn expect_specific_identifier(&mut self, word: &str) -> ParseResult<()> {
        if self.has_specific_identifier(word, true) { Ok(()) }
        else { Err(ParseError::ExpectedIdentifier { expected: word.to_string(), found: self.err_token() }) }
    }

    pub fn expect_identifiers(&mut self, words: &[&str]) -> ParseResult<()> {
        if self.has_identifiers(words, true) { Ok(()) }
        else { Err(ParseError::ExpectedIdentifier { expected: words.join(" "), found: self.err_token() }) }
    }

    pub fn expect_string(&mut self) -> ParseResult<String> {
        self.has_string(true).ok_or_else(|| ParseError::ExpectedString { found: self.err_token() })
    }

    pub fn expect_integer(&mut self) -> ParseResult<i64> {
        self.has_integer(true).ok_or_else(|| ParseError::ExpectedInteger { found: self.err_token() })
    }

    /// Accepts an integer or a double token.
    pub fn expect_number(&mut self) -> ParseResult<f64> {
        if let Some(v) = self.has_integer(true) { return Ok(v as f64); }
        self.has_double(true).ok_or_else(|| ParseError::ExpectedNumber { found: self.err_token() })
    }

    pub fn expect_symbol(&mut self, symbol: &str) -> ParseResult<()> {
        if self.has_symbol(symbol, true) { Ok(()) }
        else { Err(ParseError::ExpectedOperator { symbol: symbol.to_string(), found: self.err_token() }) }
    }

    pub fn expect_newline(&mut self) -> ParseResult<()> {
        if self.has_newline(true) || self.is_at_end() { Ok(()) }
        else { Err(ParseError::ExpectedEndOfLine { found: self.err_token() }) }
    }

    pub fn skip_newlines(&mut self) {
        while self.has_newline(true) {}
    }

    /// Advances past everything up to and including the next newline.
    pub fn skip_line(&mut self) {
        while let Some(t) = self.current() {
            let done = matches!(&t.kind, TokenKind::Symbol(s) if s == "\n");
            self.idx += 1;
            if done { break; }
        }
    }
}
