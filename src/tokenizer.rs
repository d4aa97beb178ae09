// Formula tokenizer
//
// Splits a formula on a fixed operator/punctuation pattern. Everything between
// two separators is one token after trimming, so identifiers may contain
// spaces ("Base Strength") and dots ("Fortress.Wood").

use std::collections::VecDeque;

use lazy_static::lazy_static;
use regex::Regex;

use crate::value::parse_number;

/// Stand-in for an escaped double quote while splitting.
const ESCAPED_DOUBLE: char = '\u{2023}';
/// Stand-in for an escaped single quote while splitting.
const ESCAPED_SINGLE: char = '\u{2043}';

lazy_static! {
    /// Quoted literals first, then two-character operators, then single symbols.
    static ref TOKEN_PATTERN: Regex =
        Regex::new(r#"'[^']*'|"[^"]*"|\|\||!|&&|>=|<=|==|[()+\-/*><?:\[\],]"#)
            .expect("token pattern is valid");
}

/// Symbols that end an identifier run. Anything else is part of a word.
pub const SYMBOLS: &[&str] = &[
    "||", "&&", ">=", "<=", "==", "!", "(", ")", "+", "-", "/", "*", ">", "<", "?", ":", "[",
    "]", ",",
];

/// A consumed token, coerced on read.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// A token that parses as a number.
    Number(f64),
    /// Any other token: a symbol, a quoted literal (quotes included) or a word.
    Text(String),
}

/// Whether a raw token is one of the reserved operator/punctuation symbols.
pub fn is_symbol(token: &str) -> bool {
    SYMBOLS.contains(&token)
}

/// Whether a raw token is a quoted string literal.
pub fn is_string_literal(token: &str) -> bool {
    token.starts_with('"') || token.starts_with('\'')
}

/// Strip the quotes from a string literal token and restore escaped quotes.
pub fn unquote(token: &str) -> String {
    let mut chars = token.chars();
    let inner = match chars.next() {
        Some(quote) => {
            let rest = chars.as_str();
            rest.strip_suffix(quote).unwrap_or(rest)
        }
        None => "",
    };
    inner
        .replace(ESCAPED_DOUBLE, "\"")
        .replace(ESCAPED_SINGLE, "'")
}

/// The ordered token sequence of one formula.
///
/// Consumed from the front by the parser; `peek` never consumes.
#[derive(Debug, Clone, Default)]
pub struct Tokens {
    tokens: VecDeque<String>,
}

impl Tokens {
    pub fn new(formula: &str) -> Self {
        let masked = formula
            .replace("\\\"", &ESCAPED_DOUBLE.to_string())
            .replace("\\'", &ESCAPED_SINGLE.to_string());

        let mut tokens = VecDeque::new();
        let mut last = 0;
        for m in TOKEN_PATTERN.find_iter(&masked) {
            push_trimmed(&mut tokens, &masked[last..m.start()]);
            push_trimmed(&mut tokens, m.as_str());
            last = m.end();
        }
        push_trimmed(&mut tokens, &masked[last..]);

        Tokens { tokens }
    }

    /// Look at the token `offset` positions ahead without consuming.
    pub fn peek(&self, offset: usize) -> Option<&str> {
        self.tokens.get(offset).map(String::as_str)
    }

    /// Whether the next token is exactly `symbol`.
    pub fn next_is(&self, symbol: &str) -> bool {
        self.peek(0) == Some(symbol)
    }

    /// Remove the front token, coercing it to a number when it parses as one.
    pub fn get(&mut self) -> Option<Token> {
        let raw = self.tokens.pop_front()?;
        if is_string_literal(&raw) {
            return Some(Token::Text(raw));
        }
        Some(match parse_number(&raw) {
            Some(n) => Token::Number(n),
            None => Token::Text(raw),
        })
    }

    /// Remove the front token without coercion.
    pub fn get_raw(&mut self) -> Option<String> {
        self.tokens.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Tokens not yet consumed, in source form.
    pub fn remaining(&self) -> Vec<String> {
        self.tokens.iter().map(|t| to_source_form(t)).collect()
    }

    /// Rebuild an equivalent formula by joining tokens with single spaces.
    pub fn to_source(&self) -> String {
        self.remaining().join(" ")
    }
}

fn push_trimmed(tokens: &mut VecDeque<String>, piece: &str) {
    let trimmed = piece.trim();
    if !trimmed.is_empty() {
        tokens.push_back(trimmed.to_string());
    }
}

fn to_source_form(token: &str) -> String {
    token
        .replace(ESCAPED_DOUBLE, "\\\"")
        .replace(ESCAPED_SINGLE, "\\'")
}

/// Split a formula into its token sequence, in source form.
///
/// Joining the result with single spaces yields a formula that tokenizes to
/// the same sequence.
pub fn tokenize(formula: &str) -> Vec<String> {
    Tokens::new(formula).remaining()
}
