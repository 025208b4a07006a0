use std::fmt;
use std::sync::Arc;

use glam::{Vec2, Vec3};
use serde_json::{Map as JsonMap, Number as JsonNumber, Value as JsonValue};

/// A node variable's runtime value.
///
/// The supported type set is closed: variables, expression operands, and
/// serialized defaults all draw from these six variants.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(Arc<str>),
    Vector2(Vec2),
    Vector3(Vec3),
}

/// The declared type of a [`Value`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    Int,
    Float,
    Bool,
    String,
    Vector2,
    Vector3,
}

impl ValueType {
    pub const ALL: [ValueType; 6] = [
        ValueType::Int,
        ValueType::Float,
        ValueType::Bool,
        ValueType::String,
        ValueType::Vector2,
        ValueType::Vector3,
    ];

    #[inline]
    pub fn of(value: &Value) -> ValueType {
        match value {
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Bool(_) => ValueType::Bool,
            Value::String(_) => ValueType::String,
            Value::Vector2(_) => ValueType::Vector2,
            Value::Vector3(_) => ValueType::Vector3,
        }
    }

    /// The zero/empty value a freshly declared variable of this type holds.
    pub fn default_value(self) -> Value {
        match self {
            ValueType::Int => Value::Int(0),
            ValueType::Float => Value::Float(0.0),
            ValueType::Bool => Value::Bool(false),
            ValueType::String => Value::string(""),
            ValueType::Vector2 => Value::Vector2(Vec2::ZERO),
            ValueType::Vector3 => Value::Vector3(Vec3::ZERO),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Bool => "bool",
            ValueType::String => "string",
            ValueType::Vector2 => "Vector2",
            ValueType::Vector3 => "Vector3",
        };
        write!(f, "{name}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{:?}", v.as_ref()),
            Value::Vector2(v) => write!(f, "({}, {})", v.x, v.y),
            Value::Vector3(v) => write!(f, "({}, {}, {})", v.x, v.y, v.z),
        }
    }
}

// -------------------- Constructors --------------------

impl Value {
    #[inline]
    pub fn string<S: AsRef<str>>(s: S) -> Self {
        Value::String(Arc::<str>::from(s.as_ref()))
    }
}

// -------------------- Accessors --------------------

impl Value {
    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        match *self {
            Value::Int(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_float(&self) -> Option<f64> {
        match *self {
            Value::Float(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_vec2(&self) -> Option<Vec2> {
        match *self {
            Value::Vector2(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_vec3(&self) -> Option<Vec3> {
        match *self {
            Value::Vector3(v) => Some(v),
            _ => None,
        }
    }
}

// -------------------- From impls --------------------

impl From<i32> for Value {
    #[inline]
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}
impl From<i64> for Value {
    #[inline]
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}
impl From<f32> for Value {
    #[inline]
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}
impl From<f64> for Value {
    #[inline]
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}
impl From<bool> for Value {
    #[inline]
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}
impl From<&str> for Value {
    #[inline]
    fn from(v: &str) -> Self {
        Value::String(Arc::<str>::from(v))
    }
}
impl From<String> for Value {
    #[inline]
    fn from(v: String) -> Self {
        Value::String(Arc::<str>::from(v))
    }
}
impl From<Arc<str>> for Value {
    #[inline]
    fn from(v: Arc<str>) -> Self {
        Value::String(v)
    }
}
impl From<Vec2> for Value {
    #[inline]
    fn from(v: Vec2) -> Self {
        Value::Vector2(v)
    }
}
impl From<Vec3> for Value {
    #[inline]
    fn from(v: Vec3) -> Self {
        Value::Vector3(v)
    }
}

// -------------------- JSON conversion --------------------

impl Value {
    /// Reads a value back from its JSON form. Numbers map to `Int` when they
    /// fit an `i64`, otherwise `Float`; objects shaped `{x, y}` / `{x, y, z}`
    /// map to vectors. Returns `None` for anything outside the closed set.
    pub fn from_json(json: &JsonValue) -> Option<Self> {
        match json {
            JsonValue::Bool(v) => Some(Value::Bool(*v)),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Value::Int(i))
                } else {
                    n.as_f64().map(Value::Float)
                }
            }
            JsonValue::String(s) => Some(Value::string(s)),
            JsonValue::Object(map) => {
                let x = map.get("x").and_then(JsonValue::as_f64)?;
                let y = map.get("y").and_then(JsonValue::as_f64)?;
                match (map.get("z").and_then(JsonValue::as_f64), map.len()) {
                    (Some(z), 3) => Some(Value::Vector3(Vec3::new(x as f32, y as f32, z as f32))),
                    (None, 2) => Some(Value::Vector2(Vec2::new(x as f32, y as f32))),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Int(v) => JsonValue::Number(JsonNumber::from(*v)),
            Value::Float(v) => float_to_json(*v),
            Value::Bool(v) => JsonValue::Bool(*v),
            Value::String(v) => JsonValue::String(v.as_ref().to_string()),
            Value::Vector2(v) => {
                let mut map = JsonMap::new();
                map.insert("x".to_string(), float_to_json(v.x as f64));
                map.insert("y".to_string(), float_to_json(v.y as f64));
                JsonValue::Object(map)
            }
            Value::Vector3(v) => {
                let mut map = JsonMap::new();
                map.insert("x".to_string(), float_to_json(v.x as f64));
                map.insert("y".to_string(), float_to_json(v.y as f64));
                map.insert("z".to_string(), float_to_json(v.z as f64));
                JsonValue::Object(map)
            }
        }
    }
}

fn float_to_json(value: f64) -> JsonValue {
    match JsonNumber::from_f64(value) {
        Some(v) => JsonValue::Number(v),
        None => JsonValue::Null,
    }
}
