use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// A dynamically typed argument or result value.
///
/// Every variant carries its own tag on the wire, so a peer can reconstruct
/// the concrete type without any out-of-band schema.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Short variant name, used in mismatch messages.
    pub fn kind(&self) -> &'static str {
        use Value::*;
        match self {
            Nil => "nil",
            Bool(_) => "bool",
            Int(_) => "int",
            Float(_) => "float",
            Str(_) => "str",
            Bytes(_) => "bytes",
            List(_) => "list",
            Map(_) => "map",
        }
    }
}

/// Conversion out of a [`Value`], checked against the expected variant.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, TypeMismatch>;
}

macro_rules! impl_value {
    ($rust_ty:ty, $variant:ident, $kind:literal) => {
        impl From<$rust_ty> for Value {
            fn from(v: $rust_ty) -> Value {
                Value::$variant(v)
            }
        }

        impl FromValue for $rust_ty {
            fn from_value(value: Value) -> Result<Self, TypeMismatch> {
                match value {
                    Value::$variant(v) => Ok(v),
                    other => Err(TypeMismatch::new($kind, &other)),
                }
            }
        }
    };
}

impl_value!(bool, Bool, "bool");
impl_value!(i64, Int, "int");
impl_value!(f64, Float, "float");
impl_value!(String, Str, "str");
impl_value!(Vec<u8>, Bytes, "bytes");
impl_value!(Vec<Value>, List, "list");
impl_value!(BTreeMap<String, Value>, Map, "map");

impl From<()> for Value {
    fn from(_: ()) -> Value {
        Value::Nil
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Str(s.to_owned())
    }
}

impl FromValue for () {
    fn from_value(value: Value) -> Result<Self, TypeMismatch> {
        match value {
            Value::Nil => Ok(()),
            other => Err(TypeMismatch::new("nil", &other)),
        }
    }
}

// Identity conversion, for functions that take the raw tagged value.
impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, TypeMismatch> {
        Ok(value)
    }
}

/// A value did not carry the variant a function expected.
///
/// Conversions are strict: an `Int` never decodes as `f64` and vice versa.
#[derive(Debug, Clone, Error)]
#[error("expected {expected}, got {got}")]
pub struct TypeMismatch {
    expected: &'static str,
    got: &'static str,
}

impl TypeMismatch {
    fn new(expected: &'static str, got: &Value) -> Self {
        Self {
            expected,
            got: got.kind(),
        }
    }
}
