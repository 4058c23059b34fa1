//! Lexer, parser and two-pass assembler for Luz Assembly (LASM).
//!
//! [`assemble`] is the crate's single entry point: it turns LASM source text
//! into a [`luzobj::ObjectImage`], ready to be written to disk or handed
//! straight to the linker.

pub mod assembler;
pub mod error;
pub mod lexer;
pub mod parser;

pub use assembler::assemble;
pub use error::{AssembleError, LexError, ParseError, SourceLocation};
