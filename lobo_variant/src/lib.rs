// lobo_variant/src/lib.rs

#![forbid(unsafe_code)]

mod value;

pub use value::{Value, ValueType};
