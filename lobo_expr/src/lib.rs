//! Expression engine for node variables: a small lexer, a backtracking
//! recursive-descent parser, and an AST evaluator over [`lobo_variant::Value`]
//! operands.

pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::{BinaryOp, EvalContext, EvalError, Expr, FnContext, NoContext, UnaryOp};
pub use lexer::{LexError, LexerConfig, Token, tokenize, tokenize_with};
pub use parser::{ParseError, parse};

use lobo_variant::Value;
use thiserror::Error;

/// Any phase of turning expression source into a value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Tokenizes and parses `text` in one step.
pub fn parse_source(text: &str) -> Result<Expr, ExprError> {
    let tokens = tokenize(text)?;
    Ok(parse(&tokens)?)
}

/// Parses and evaluates `text` against `ctx` in one step.
pub fn evaluate_source(text: &str, ctx: &dyn EvalContext) -> Result<Value, ExprError> {
    Ok(parse_source(text)?.eval(ctx)?)
}
