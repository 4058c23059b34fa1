//! Turns a token stream into a sequence of label/directive/instruction
//! statements. Pseudo-instructions are recognized here by mnemonic name but
//! expanded later, in the assembler's first pass, where addresses are
//! tracked.

use super::error::{ParseError, SourceLocation};
use super::lexer::{Token, TokenKind};

#[derive(Clone, Debug)]
pub enum ImmediateOperand {
    Integer(i64),
    Symbol(String),
    /// Upper 16 bits of a symbol's final address. Never produced by parsing
    /// source text directly; only by `LI` pseudo-instruction expansion.
    SymbolHigh(String),
    /// Lower 16 bits of a symbol's final address, the `LI` counterpart to
    /// [`ImmediateOperand::SymbolHigh`].
    SymbolLow(String),
}

#[derive(Clone, Debug)]
pub enum Operand {
    Register(u8),
    Immediate(ImmediateOperand),
    Memory { offset: ImmediateOperand, base: u8 },
}

#[derive(Clone, Debug)]
pub enum Directive {
    Segment(String),
    Global(String),
    Define(String, ImmediateOperand),
    Alloc(u32),
    Byte(Vec<u8>),
    Word(Vec<ImmediateOperand>),
    String(String),
}

#[derive(Clone, Debug)]
pub enum Statement {
    Label(String),
    Directive(Directive),
    Instruction {
        mnemonic: String,
        operands: Vec<Operand>,
    },
}

#[derive(Clone, Debug)]
pub struct Located<T> {
    pub value: T,
    pub location: SourceLocation,
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn skip_blank_lines(&mut self) {
        while matches!(self.peek().kind, TokenKind::Newline) {
            self.advance();
        }
    }

    fn expect_identifier(&mut self, expected: &'static str) -> Result<String, ParseError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Identifier(name) => Ok(name),
            other => Err(ParseError::UnexpectedToken {
                found: format!("{:?}", other),
                expected,
                location: token.location,
            }),
        }
    }

    fn expect_integer(&mut self, expected: &'static str) -> Result<i64, ParseError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Integer(value) => Ok(value),
            other => Err(ParseError::UnexpectedToken {
                found: format!("{:?}", other),
                expected,
                location: token.location,
            }),
        }
    }

    fn expect(&mut self, expected_kind: &TokenKind, expected: &'static str) -> Result<(), ParseError> {
        let token = self.advance();
        if &token.kind == expected_kind {
            Ok(())
        } else {
            Err(ParseError::UnexpectedToken {
                found: format!("{:?}", token.kind),
                expected,
                location: token.location,
            })
        }
    }

    fn parse_immediate_operand(&mut self) -> Result<ImmediateOperand, ParseError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Integer(value) => Ok(ImmediateOperand::Integer(value)),
            TokenKind::Identifier(name) => Ok(ImmediateOperand::Symbol(name)),
            other => Err(ParseError::UnexpectedToken {
                found: format!("{:?}", other),
                expected: "an integer or a symbol name",
                location: token.location,
            }),
        }
    }

    fn parse_operand(&mut self) -> Result<Operand, ParseError> {
        match self.peek().kind.clone() {
            TokenKind::Register(id) => {
                self.advance();
                Ok(Operand::Register(id))
            }
            TokenKind::Integer(_) | TokenKind::Identifier(_) => {
                let first = self.parse_immediate_operand()?;
                if matches!(self.peek().kind, TokenKind::LParen) {
                    self.advance();
                    let base_token = self.advance();
                    let base = match base_token.kind {
                        TokenKind::Register(id) => id,
                        other => {
                            return Err(ParseError::UnexpectedToken {
                                found: format!("{:?}", other),
                                expected: "a register",
                                location: base_token.location,
                            })
                        }
                    };
                    self.expect(&TokenKind::RParen, "')'")?;
                    Ok(Operand::Memory { offset: first, base })
                } else {
                    Ok(Operand::Immediate(first))
                }
            }
            other => Err(ParseError::UnexpectedToken {
                found: format!("{:?}", other),
                expected: "an operand",
                location: self.peek().location,
            }),
        }
    }

    fn parse_operand_list(&mut self) -> Result<Vec<Operand>, ParseError> {
        let mut operands = Vec::new();
        if matches!(self.peek().kind, TokenKind::Newline | TokenKind::Eof) {
            return Ok(operands);
        }
        operands.push(self.parse_operand()?);
        while matches!(self.peek().kind, TokenKind::Comma) {
            self.advance();
            operands.push(self.parse_operand()?);
        }
        Ok(operands)
    }

    fn parse_directive(&mut self, name: String, location: SourceLocation) -> Result<Directive, ParseError> {
        match name.as_str() {
            "segment" => Ok(Directive::Segment(self.expect_identifier("a segment name")?)),
            "global" => Ok(Directive::Global(self.expect_identifier("a symbol name")?)),
            "define" => {
                let constant_name = self.expect_identifier("a constant name")?;
                self.expect(&TokenKind::Comma, "','")?;
                let value = self.parse_immediate_operand()?;
                Ok(Directive::Define(constant_name, value))
            }
            "alloc" => Ok(Directive::Alloc(self.expect_integer("a byte count")? as u32)),
            "byte" => {
                let mut bytes = Vec::new();
                loop {
                    bytes.push(self.expect_integer("a byte value")? as u8);
                    if matches!(self.peek().kind, TokenKind::Comma) {
                        self.advance();
                    } else {
                        break;
                    }
                }
                Ok(Directive::Byte(bytes))
            }
            "word" => {
                let mut words = Vec::new();
                loop {
                    words.push(self.parse_immediate_operand()?);
                    if matches!(self.peek().kind, TokenKind::Comma) {
                        self.advance();
                    } else {
                        break;
                    }
                }
                Ok(Directive::Word(words))
            }
            "string" => {
                let token = self.advance();
                match token.kind {
                    TokenKind::StringLiteral(text) => Ok(Directive::String(text)),
                    other => Err(ParseError::UnexpectedToken {
                        found: format!("{:?}", other),
                        expected: "a string literal",
                        location: token.location,
                    }),
                }
            }
            _ => Err(ParseError::UnknownDirective(name, location)),
        }
    }

    fn parse_statement(&mut self) -> Result<Option<Located<Statement>>, ParseError> {
        self.skip_blank_lines();
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Eof => Ok(None),
            TokenKind::Directive(name) => {
                self.advance();
                let directive = self.parse_directive(name, token.location)?;
                self.end_of_statement()?;
                Ok(Some(Located {
                    value: Statement::Directive(directive),
                    location: token.location,
                }))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                if matches!(self.peek().kind, TokenKind::Colon) {
                    self.advance();
                    self.end_of_statement()?;
                    Ok(Some(Located {
                        value: Statement::Label(name),
                        location: token.location,
                    }))
                } else {
                    let operands = self.parse_operand_list()?;
                    self.end_of_statement()?;
                    Ok(Some(Located {
                        value: Statement::Instruction { mnemonic: name, operands },
                        location: token.location,
                    }))
                }
            }
            other => Err(ParseError::UnexpectedToken {
                found: format!("{:?}", other),
                expected: "a label, directive or instruction",
                location: token.location,
            }),
        }
    }

    fn end_of_statement(&mut self) -> Result<(), ParseError> {
        match self.peek().kind {
            TokenKind::Newline => {
                self.advance();
                Ok(())
            }
            TokenKind::Eof => Ok(()),
            ref other => Err(ParseError::UnexpectedToken {
                found: format!("{:?}", other),
                expected: "end of line",
                location: self.peek().location,
            }),
        }
    }
}

pub fn parse(tokens: Vec<Token>) -> Result<Vec<Located<Statement>>, ParseError> {
    let mut parser = Parser { tokens, pos: 0 };
    let mut statements = Vec::new();
    while let Some(statement) = parser.parse_statement()? {
        statements.push(statement);
    }
    Ok(statements)
}
