//! Turns LASM source text into a flat token stream. Each token carries the
//! line/column it started at so later phases can report diagnostics without
//! re-scanning the source.

use super::error::{LexError, SourceLocation};

#[derive(Clone, PartialEq, Debug)]
pub enum TokenKind {
    Identifier(String),
    Integer(i64),
    /// Resolved register id, from either `$rN` or an alias like `$sp`.
    Register(u8),
    StringLiteral(String),
    Comma,
    LParen,
    RParen,
    Colon,
    /// A leading-dot directive name, without the dot (e.g. `segment`).
    Directive(String),
    Newline,
    Eof,
}

#[derive(Clone, PartialEq, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub location: SourceLocation,
}

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
}

impl Lexer {
    pub fn new(source: &str) -> Lexer {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn location(&self) -> SourceLocation {
        SourceLocation {
            line: self.line,
            column: self.column,
        }
    }

    fn skip_line_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c == ' ' || c == '\t' || c == '\r' => {
                    self.advance();
                }
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_line_whitespace_and_comments();
        let location = self.location();

        let c = match self.peek() {
            Some(c) => c,
            None => {
                return Ok(Token {
                    kind: TokenKind::Eof,
                    location,
                })
            }
        };

        let kind = match c {
            '\n' => {
                self.advance();
                TokenKind::Newline
            }
            ',' => {
                self.advance();
                TokenKind::Comma
            }
            '(' => {
                self.advance();
                TokenKind::LParen
            }
            ')' => {
                self.advance();
                TokenKind::RParen
            }
            ':' => {
                self.advance();
                TokenKind::Colon
            }
            '.' => {
                self.advance();
                TokenKind::Directive(self.read_identifier())
            }
            '$' => {
                self.advance();
                self.read_register(location)?
            }
            '"' => self.read_string(location)?,
            c if c.is_ascii_digit() => self.read_number(location)?,
            c if c == '-' && self.peek_at(1).map_or(false, |d| d.is_ascii_digit()) => {
                self.read_number(location)?
            }
            c if c.is_alphabetic() || c == '_' => TokenKind::Identifier(self.read_identifier()),
            other => {
                self.advance();
                return Err(LexError::UnexpectedChar(other, location));
            }
        };

        Ok(Token { kind, location })
    }

    fn read_identifier(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn read_register(&mut self, location: SourceLocation) -> Result<TokenKind, LexError> {
        let name = self.read_identifier();
        match luz::isa::register_from_name(&name) {
            Some(id) => Ok(TokenKind::Register(id)),
            None => Err(LexError::UnknownRegisterAlias(name, location)),
        }
    }

    fn read_string(&mut self, location: SourceLocation) -> Result<TokenKind, LexError> {
        self.advance(); // opening quote
        let mut text = String::new();
        loop {
            match self.advance() {
                Some('"') => return Ok(TokenKind::StringLiteral(text)),
                Some('\\') => match self.advance() {
                    Some('t') => text.push('\t'),
                    Some('n') => text.push('\n'),
                    Some('\\') => text.push('\\'),
                    Some('"') => text.push('"'),
                    Some(other) => text.push(other),
                    None => return Err(LexError::UnterminatedString(location)),
                },
                Some('\n') | None => return Err(LexError::UnterminatedString(location)),
                Some(c) => text.push(c),
            }
        }
    }

    fn read_number(&mut self, location: SourceLocation) -> Result<TokenKind, LexError> {
        let start = self.pos;
        let negative = self.peek() == Some('-');
        if negative {
            self.advance();
        }
        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x') | Some('X')) {
            self.advance();
            self.advance();
            let digits_start = self.pos;
            while self.peek().map_or(false, |c| c.is_ascii_hexdigit()) {
                self.advance();
            }
            let text: String = self.chars[digits_start..self.pos].iter().collect();
            let mut value = i64::from_str_radix(&text, 16)
                .map_err(|_| LexError::MalformedNumber(self.slice_from(start), location))?;
            if negative {
                value = -value;
            }
            return Ok(TokenKind::Integer(value));
        }
        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('b') | Some('B')) {
            self.advance();
            self.advance();
            let digits_start = self.pos;
            while matches!(self.peek(), Some('0') | Some('1')) {
                self.advance();
            }
            let text: String = self.chars[digits_start..self.pos].iter().collect();
            let mut value = i64::from_str_radix(&text, 2)
                .map_err(|_| LexError::MalformedNumber(self.slice_from(start), location))?;
            if negative {
                value = -value;
            }
            return Ok(TokenKind::Integer(value));
        }
        while self.peek().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }
        let text = self.slice_from(start);
        let value = text
            .parse::<i64>()
            .map_err(|_| LexError::MalformedNumber(text.clone(), location))?;
        Ok(TokenKind::Integer(value))
    }

    fn slice_from(&self, start: usize) -> String {
        self.chars[start..self.pos].iter().collect()
    }
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).tokenize()
}
