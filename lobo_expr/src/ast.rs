use std::fmt;

use lobo_variant::{Value, ValueType};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Arithmetic negate (`-x`).
    Negative,
    /// Boolean not (`!x`).
    Negation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    And,
    Or,
    Equals,
    GreaterThan,
    LessThan,
    GreaterThanEquals,
    LessThanEquals,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnaryOp::Negative => "-",
            UnaryOp::Negation => "!",
        };
        write!(f, "{name}")
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Equals => "==",
            BinaryOp::GreaterThan => ">",
            BinaryOp::LessThan => "<",
            BinaryOp::GreaterThanEquals => ">=",
            BinaryOp::LessThanEquals => "<=",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("no variable resolver bound, cannot resolve \"{0}\"")]
    NoVariableResolver(String),
    #[error("no function resolver bound, cannot call \"{0}\"")]
    NoFunctionResolver(String),
    #[error("unknown variable \"{0}\"")]
    UnknownVariable(String),
    #[error("unknown function \"{0}\"")]
    UnknownFunction(String),
    #[error("operator {op} cannot evaluate operands of {left} and {right}")]
    BinaryType {
        op: BinaryOp,
        left: ValueType,
        right: ValueType,
    },
    #[error("operator {op} cannot evaluate an operand of {operand}")]
    UnaryType { op: UnaryOp, operand: ValueType },
    #[error("integer division by zero")]
    DivisionByZero,
    #[error("variable cycle detected while evaluating \"{0}\"")]
    Cycle(String),
    #[error("resolver failed: {0}")]
    Resolver(String),
}

/// The evaluation environment an expression runs against: a variable lookup
/// and a function-call capability. Resolvers may read live external state, so
/// evaluating the same tree twice can legitimately produce different values.
pub trait EvalContext {
    fn variable(&self, name: &str) -> Result<Value, EvalError>;
    fn call(&self, name: &str, args: &[Value]) -> Result<Value, EvalError>;
}

/// A context with nothing bound. Variable and function nodes fail loudly
/// against it, which is exactly what an unbound AST should do.
pub struct NoContext;

impl EvalContext for NoContext {
    fn variable(&self, name: &str) -> Result<Value, EvalError> {
        Err(EvalError::NoVariableResolver(name.to_string()))
    }

    fn call(&self, name: &str, _args: &[Value]) -> Result<Value, EvalError> {
        Err(EvalError::NoFunctionResolver(name.to_string()))
    }
}

/// Adapts plain closures into an [`EvalContext`]; handy in tests and tools.
#[derive(Default)]
pub struct FnContext<'a> {
    pub variables: Option<&'a dyn Fn(&str) -> Option<Value>>,
    pub functions: Option<&'a dyn Fn(&str, &[Value]) -> Option<Value>>,
}

impl EvalContext for FnContext<'_> {
    fn variable(&self, name: &str) -> Result<Value, EvalError> {
        match self.variables {
            None => Err(EvalError::NoVariableResolver(name.to_string())),
            Some(fetch) => fetch(name).ok_or_else(|| EvalError::UnknownVariable(name.to_string())),
        }
    }

    fn call(&self, name: &str, args: &[Value]) -> Result<Value, EvalError> {
        match self.functions {
            None => Err(EvalError::NoFunctionResolver(name.to_string())),
            Some(call) => call(name, args).ok_or_else(|| EvalError::UnknownFunction(name.to_string())),
        }
    }
}

/// An expression tree. Immutable once built; evaluation is a pure function
/// of the tree and the supplied context.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Variable(String),
    FunctionCall { name: String, args: Vec<Expr> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
}

impl Expr {
    pub fn eval(&self, ctx: &dyn EvalContext) -> Result<Value, EvalError> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Variable(name) => ctx.variable(name),
            Expr::FunctionCall { name, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(arg.eval(ctx)?);
                }
                ctx.call(name, &values)
            }
            Expr::Unary { op, operand } => eval_unary(*op, operand.eval(ctx)?),
            Expr::Binary { op, left, right } => {
                // Both operands are always evaluated; `&&`/`||` do not
                // short-circuit.
                let left = left.eval(ctx)?;
                let right = right.eval(ctx)?;
                eval_binary(*op, left, right)
            }
        }
    }
}

fn eval_unary(op: UnaryOp, operand: Value) -> Result<Value, EvalError> {
    match (op, &operand) {
        (UnaryOp::Negative, Value::Int(v)) => Ok(Value::Int(-v)),
        (UnaryOp::Negative, Value::Float(v)) => Ok(Value::Float(-v)),
        (UnaryOp::Negation, Value::Bool(v)) => Ok(Value::Bool(!v)),
        _ => Err(EvalError::UnaryType {
            op,
            operand: ValueType::of(&operand),
        }),
    }
}

fn eval_binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, EvalError> {
    let type_error = |left: &Value, right: &Value| EvalError::BinaryType {
        op,
        left: ValueType::of(left),
        right: ValueType::of(right),
    };
    match op {
        BinaryOp::Add => match (&left, &right) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
            (Value::Int(a), Value::Float(b)) => Ok(Value::Float(*a as f64 + b)),
            (Value::Float(a), Value::Int(b)) => Ok(Value::Float(a + *b as f64)),
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
            (Value::String(a), Value::String(b)) => Ok(Value::string(format!("{a}{b}"))),
            _ => Err(type_error(&left, &right)),
        },
        BinaryOp::Subtract => match (&left, &right) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a - b)),
            (Value::Int(a), Value::Float(b)) => Ok(Value::Float(*a as f64 - b)),
            (Value::Float(a), Value::Int(b)) => Ok(Value::Float(a - *b as f64)),
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a - b)),
            _ => Err(type_error(&left, &right)),
        },
        BinaryOp::Multiply => match (&left, &right) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a * b)),
            (Value::Int(a), Value::Float(b)) => Ok(Value::Float(*a as f64 * b)),
            (Value::Float(a), Value::Int(b)) => Ok(Value::Float(a * *b as f64)),
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a * b)),
            _ => Err(type_error(&left, &right)),
        },
        BinaryOp::Divide => match (&left, &right) {
            (Value::Int(a), Value::Int(b)) => {
                a.checked_div(*b).map(Value::Int).ok_or(EvalError::DivisionByZero)
            }
            (Value::Int(a), Value::Float(b)) => Ok(Value::Float(*a as f64 / b)),
            (Value::Float(a), Value::Int(b)) => Ok(Value::Float(a / *b as f64)),
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a / b)),
            _ => Err(type_error(&left, &right)),
        },
        BinaryOp::And => match (&left, &right) {
            (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a && *b)),
            _ => Err(type_error(&left, &right)),
        },
        BinaryOp::Or => match (&left, &right) {
            (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a || *b)),
            _ => Err(type_error(&left, &right)),
        },
        // Raw equality of the evaluated operands; cross-type compares are
        // simply unequal.
        BinaryOp::Equals => Ok(Value::Bool(left == right)),
        BinaryOp::GreaterThan => match (&left, &right) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a > b)),
            (Value::Int(a), Value::Float(b)) => Ok(Value::Bool(*a as f64 > *b)),
            (Value::Float(a), Value::Int(b)) => Ok(Value::Bool(*a > *b as f64)),
            (Value::Float(a), Value::Float(b)) => Ok(Value::Bool(a > b)),
            _ => Err(type_error(&left, &right)),
        },
        BinaryOp::LessThan => match (&left, &right) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a < b)),
            (Value::Int(a), Value::Float(b)) => Ok(Value::Bool((*a as f64) < *b)),
            (Value::Float(a), Value::Int(b)) => Ok(Value::Bool(*a < *b as f64)),
            (Value::Float(a), Value::Float(b)) => Ok(Value::Bool(a < b)),
            _ => Err(type_error(&left, &right)),
        },
        // Equality short-circuit first, then delegate to the strict compare.
        // This is value equality, so `5 >= 5.0` falls through to `>` and is
        // false; the strict compare also supplies the type checking.
        BinaryOp::GreaterThanEquals => {
            if left == right {
                Ok(Value::Bool(true))
            } else {
                eval_binary(BinaryOp::GreaterThan, left, right)
            }
        }
        BinaryOp::LessThanEquals => {
            if left == right {
                Ok(Value::Bool(true))
            } else {
                eval_binary(BinaryOp::LessThan, left, right)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn eval_text(text: &str) -> Result<Value, EvalError> {
        parse(&tokenize(text).unwrap()).unwrap().eval(&NoContext)
    }

    #[test]
    fn integer_arithmetic() {
        assert_eq!(eval_text("5 + 6 * 3").unwrap(), Value::Int(23));
        assert_eq!(eval_text("(5 + 6) * 3").unwrap(), Value::Int(33));
        assert_eq!(eval_text("(5 + 3 / 3 * 4 - 2) * 3").unwrap(), Value::Int(21));
        assert_eq!(eval_text("5 / 6 * 5 / 3").unwrap(), Value::Int(0));
    }

    #[test]
    fn mixed_arithmetic_widens_to_float() {
        assert_eq!(eval_text("1 + 0.5").unwrap(), Value::Float(1.5));
        assert_eq!(eval_text("0.5 * 4").unwrap(), Value::Float(2.0));
        assert_eq!(eval_text("-2.5 - 1").unwrap(), Value::Float(-3.5));
    }

    #[test]
    fn boolean_logic() {
        assert_eq!(eval_text("true && false || true").unwrap(), Value::Bool(true));
        assert_eq!(eval_text("!(true && false)").unwrap(), Value::Bool(true));
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(
            eval_text("\"hello\" + \" world\"").unwrap(),
            Value::from("hello world")
        );
    }

    #[test]
    fn comparisons() {
        assert_eq!(eval_text("5 > 3").unwrap(), Value::Bool(true));
        assert_eq!(eval_text("5 <= 5").unwrap(), Value::Bool(true));
        assert_eq!(eval_text("2.5 >= 2.4").unwrap(), Value::Bool(true));
        // Equality is raw value equality; cross-type compares are unequal.
        assert_eq!(eval_text("5 == 5.0").unwrap(), Value::Bool(false));
        assert_eq!(eval_text("\"a\" == \"a\"").unwrap(), Value::Bool(true));
    }

    #[test]
    fn gte_is_equality_then_strict_compare() {
        // Mixed int/float equality is false, so >= falls through to > and
        // the equal case compares false.
        assert_eq!(eval_text("5 >= 5.0").unwrap(), Value::Bool(false));
        assert_eq!(eval_text("5 >= 5").unwrap(), Value::Bool(true));
        assert_eq!(eval_text("5.1 >= 5").unwrap(), Value::Bool(true));
    }

    #[test]
    fn type_mismatches_fail_loudly() {
        assert!(matches!(
            eval_text("true + 1"),
            Err(EvalError::BinaryType { op: BinaryOp::Add, .. })
        ));
        assert!(matches!(
            eval_text("\"a\" - \"b\""),
            Err(EvalError::BinaryType { op: BinaryOp::Subtract, .. })
        ));
        assert!(matches!(
            eval_text("-true"),
            Err(EvalError::UnaryType { op: UnaryOp::Negative, .. })
        ));
        assert!(matches!(
            eval_text("!5"),
            Err(EvalError::UnaryType { op: UnaryOp::Negation, .. })
        ));
    }

    #[test]
    fn integer_division_by_zero_is_an_error() {
        assert_eq!(eval_text("5 / 0"), Err(EvalError::DivisionByZero));
        // Float division stays IEEE.
        assert_eq!(eval_text("5.0 / 0"), Ok(Value::Float(f64::INFINITY)));
    }

    #[test]
    fn unbound_variables_and_functions_fail() {
        assert!(matches!(
            eval_text("myVar"),
            Err(EvalError::NoVariableResolver(_))
        ));
        assert!(matches!(
            eval_text("myFunc(1)"),
            Err(EvalError::NoFunctionResolver(_))
        ));
    }

    #[test]
    fn injected_variables_and_functions() {
        let variables = |name: &str| match name {
            "myVar" => Some(Value::Int(5)),
            _ => None,
        };
        let functions = |name: &str, args: &[Value]| match name {
            "myAdd" => Some(Value::Int(args[0].as_int()? + args[1].as_int()?)),
            "isNegative" => Some(Value::Bool(args[0].as_int()? < 0)),
            _ => None,
        };
        let ctx = FnContext {
            variables: Some(&variables),
            functions: Some(&functions),
        };

        let eval = |text: &str| parse(&tokenize(text).unwrap()).unwrap().eval(&ctx);
        assert_eq!(eval("myAdd(3, myVar)").unwrap(), Value::Int(8));
        assert_eq!(eval("myAdd(-3, myVar)").unwrap(), Value::Int(2));
        assert_eq!(eval("isNegative(myAdd(-3, myVar))").unwrap(), Value::Bool(false));
        assert!(matches!(
            eval("missing(1)"),
            Err(EvalError::UnknownFunction(_))
        ));
    }
}
