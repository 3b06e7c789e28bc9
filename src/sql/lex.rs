use std::{fmt, result};

use crate::{sql::Position, Error, Result};

/// Token kinds produced by [Lex]. Keywords are folded case-insensitively.
#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Keyword(&'static str),
    // punctuation and operators
    LParen,
    RParen,
    Comma,
    Dot,
    Star,
    Plus,
    Minus,
    Slash,
    Percent,
    Concat, // ||
    Eq,     // =
    Ne,     // <> or !=
    Lt,
    Le,
    Gt,
    Ge,
    Semi,
}

/// One token with the position it started at.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Position,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        match &self.kind {
            TokenKind::Ident(s) => write!(f, "{}", s),
            TokenKind::Int(v) => write!(f, "{}", v),
            TokenKind::Float(v) => write!(f, "{}", v),
            TokenKind::Str(s) => write!(f, "'{}'", s),
            TokenKind::Keyword(s) => write!(f, "{}", s),
            kind => write!(f, "{:?}", kind),
        }
    }
}

const KEYWORDS: [&str; 42] = [
    "SELECT", "FROM", "WHERE", "GROUP", "BY", "HAVING", "ORDER", "LIMIT", "OFFSET",
    "AS", "AND", "OR", "NOT", "IN", "LIKE", "IS", "NULL", "JOIN", "INNER", "LEFT",
    "ON", "WITH", "CASE", "WHEN", "THEN", "ELSE", "END", "OVER", "PARTITION", "ROWS",
    "BETWEEN", "PRECEDING", "FOLLOWING", "CURRENT", "ROW", "UNBOUNDED", "ASC", "DESC",
    "INSERT", "INTO", "VALUES", "DISTINCT",
];

const BOOLS: [&str; 2] = ["TRUE", "FALSE"];

/// Lexer over query text, tracking `(row, col)` positions the same way the
/// parser reports errors.
#[derive(Clone, Debug)]
pub struct Lex {
    text: Vec<char>,
    row_no: usize, // start from ZERO
    col_no: usize, // start from ZERO
    cursor: usize, // start from ZERO
}

impl Lex {
    pub fn new(text: &str) -> Lex {
        Lex { text: text.chars().collect(), row_no: 0, col_no: 0, cursor: 0 }
    }

    pub fn to_position(&self) -> Position {
        Position(self.row_no + 1, self.col_no + 1)
    }

    fn peek(&self) -> Option<char> {
        self.text.get(self.cursor).copied()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.text.get(self.cursor + n).copied()
    }

    fn move_cursor(&mut self, n: usize) {
        for i in 0..n {
            match self.text.get(self.cursor + i) {
                Some('\n') => {
                    self.row_no += 1;
                    self.col_no = 0;
                }
                Some(_) => self.col_no += 1,
                None => break,
            }
        }
        self.cursor += n;
    }

    /// Tokenize the whole text. Fails with [Error::ParseSQL] carrying the
    /// offending position.
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = vec![];
        loop {
            self.skip_whitespace();
            let pos = self.to_position();
            let ch = match self.peek() {
                Some(ch) => ch,
                None => break,
            };

            let kind = match ch {
                '(' => self.single(TokenKind::LParen),
                ')' => self.single(TokenKind::RParen),
                ',' => self.single(TokenKind::Comma),
                '.' => self.single(TokenKind::Dot),
                '*' => self.single(TokenKind::Star),
                '+' => self.single(TokenKind::Plus),
                '-' => self.single(TokenKind::Minus),
                '/' => self.single(TokenKind::Slash),
                '%' => self.single(TokenKind::Percent),
                ';' => self.single(TokenKind::Semi),
                '=' => self.single(TokenKind::Eq),
                '|' => match self.peek_at(1) {
                    Some('|') => {
                        self.move_cursor(2);
                        TokenKind::Concat
                    }
                    _ => err_at!(ParseSQL, msg: "{} stray |", pos)?,
                },
                '!' => match self.peek_at(1) {
                    Some('=') => {
                        self.move_cursor(2);
                        TokenKind::Ne
                    }
                    _ => err_at!(ParseSQL, msg: "{} stray !", pos)?,
                },
                '<' => match self.peek_at(1) {
                    Some('=') => {
                        self.move_cursor(2);
                        TokenKind::Le
                    }
                    Some('>') => {
                        self.move_cursor(2);
                        TokenKind::Ne
                    }
                    _ => self.single(TokenKind::Lt),
                },
                '>' => match self.peek_at(1) {
                    Some('=') => {
                        self.move_cursor(2);
                        TokenKind::Ge
                    }
                    _ => self.single(TokenKind::Gt),
                },
                '\'' => self.string_literal(pos)?,
                ch if ch.is_ascii_digit() => self.number(pos)?,
                ch if ch.is_alphabetic() || ch == '_' => self.identifier(),
                ch => err_at!(ParseSQL, msg: "{} unexpected character {:?}", pos, ch)?,
            };
            tokens.push(Token { kind, pos });
        }

        Ok(tokens)
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.move_cursor(1);
        kind
    }

    fn skip_whitespace(&mut self) {
        loop {
            match self.peek() {
                Some(ch) if ch.is_whitespace() => self.move_cursor(1),
                // -- line comment
                Some('-') if self.peek_at(1) == Some('-') => {
                    while let Some(ch) = self.peek() {
                        if ch == '\n' {
                            break;
                        }
                        self.move_cursor(1);
                    }
                }
                _ => break,
            }
        }
    }

    // single-quoted, '' escapes a quote.
    fn string_literal(&mut self, pos: Position) -> Result<TokenKind> {
        self.move_cursor(1);
        let mut out = String::new();
        loop {
            match self.peek() {
                Some('\'') if self.peek_at(1) == Some('\'') => {
                    out.push('\'');
                    self.move_cursor(2);
                }
                Some('\'') => {
                    self.move_cursor(1);
                    break Ok(TokenKind::Str(out));
                }
                Some(ch) => {
                    out.push(ch);
                    self.move_cursor(1);
                }
                None => err_at!(ParseSQL, msg: "{} unterminated string", pos)?,
            }
        }
    }

    fn number(&mut self, pos: Position) -> Result<TokenKind> {
        let mut out = String::new();
        let mut is_float = false;
        loop {
            match self.peek() {
                Some(ch) if ch.is_ascii_digit() => {
                    out.push(ch);
                    self.move_cursor(1);
                }
                Some('.') if self.peek_at(1).map_or(false, |c| c.is_ascii_digit()) => {
                    is_float = true;
                    out.push('.');
                    self.move_cursor(1);
                }
                Some('e') | Some('E')
                    if self.peek_at(1).map_or(false, |c| {
                        c.is_ascii_digit() || c == '+' || c == '-'
                    }) =>
                {
                    is_float = true;
                    out.push('e');
                    self.move_cursor(1);
                    if let Some(sign) = self.peek() {
                        if sign == '+' || sign == '-' {
                            out.push(sign);
                            self.move_cursor(1);
                        }
                    }
                }
                _ => break,
            }
        }

        if is_float {
            Ok(TokenKind::Float(err_at!(ParseSQL, out.parse::<f64>(), "{}", pos)?))
        } else {
            Ok(TokenKind::Int(err_at!(ParseSQL, out.parse::<i64>(), "{}", pos)?))
        }
    }

    fn identifier(&mut self) -> TokenKind {
        let mut out = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                out.push(ch);
                self.move_cursor(1);
            } else {
                break;
            }
        }

        let upper = out.to_uppercase();
        if let Some(kw) = KEYWORDS.iter().find(|k| **k == upper).copied() {
            TokenKind::Keyword(kw)
        } else if BOOLS.contains(&upper.as_str()) {
            // booleans surface as integers, the engine has no bool column
            // kind.
            TokenKind::Int(if upper == "TRUE" { 1 } else { 0 })
        } else {
            TokenKind::Ident(out)
        }
    }
}

#[cfg(test)]
#[path = "lex_test.rs"]
mod lex_test;
