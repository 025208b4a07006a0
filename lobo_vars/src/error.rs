use lobo_expr::{EvalError, ExprError};
use lobo_variant::ValueType;
use thiserror::Error;

use crate::path::NodePath;

/// Everything that can go wrong operating on a NodeVar. Permission failures
/// (`NotGettable`/`NotSettable`) are distinct from type failures, and a
/// dangling cross-container reference is an error on access, never a crash.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VarError {
    #[error("NodeVar \"{0}\" is not gettable")]
    NotGettable(String),
    #[error("NodeVar \"{0}\" is not settable")]
    NotSettable(String),
    #[error("NodeVar \"{name}\" holds {expected} values, cannot set a {got} value")]
    TypeMismatch {
        name: String,
        expected: ValueType,
        got: ValueType,
    },
    #[error("no NodeVar named \"{0}\"")]
    UnknownVar(String),
    #[error("NodeVar \"{0}\" has no value")]
    Unset(String),
    #[error("NodeVar \"{name}\" references \"{path}\", which does not resolve to a container")]
    DanglingReference { name: String, path: NodePath },
    #[error("NodeVar \"{0}\" is not bound yet; ready its container first")]
    NotReady(String),
    #[error("NodeVar \"{name}\" has an invalid expression: {source}")]
    Expression { name: String, source: ExprError },
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error("invalid NodeVar dictionary: {0}")]
    InvalidDict(String),
}
