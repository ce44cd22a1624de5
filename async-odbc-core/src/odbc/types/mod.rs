//! Decoding of row values into Rust types.
//!
//! Drivers do not agree on how they report scalars: the embedded SQLite driver
//! hands back 64-bit integers for every integer column, while many ODBC drivers
//! report numbers as text. The conversions here accept any representation that
//! losslessly fits the target type.

use crate::odbc::{BoxDynError, Value};

/// A type that can be read out of a [`Value`].
pub trait Decode: Sized {
    fn decode(value: &Value) -> Result<Self, BoxDynError>;
}

fn unexpected(value: &Value, target: &str) -> BoxDynError {
    match value {
        Value::Null => format!("unexpected NULL, cannot decode as {target}").into(),
        other => format!("cannot decode {} as {target}", other.type_info()).into(),
    }
}

// ============================================================================
// Boolean
// ============================================================================

impl Decode for bool {
    fn decode(value: &Value) -> Result<Self, BoxDynError> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Text(s) => match s.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => Err(format!("Cannot decode '{}' as bool", s).into()),
            },
            other => other
                .as_i64()
                .map(|i| i != 0)
                .ok_or_else(|| unexpected(other, "bool")),
        }
    }
}

// ============================================================================
// Integers
// ============================================================================

macro_rules! impl_decode_int {
    ($($ty:ty),*) => {
        $(
            impl Decode for $ty {
                fn decode(value: &Value) -> Result<Self, BoxDynError> {
                    match value {
                        Value::Text(s) => s.trim().parse().map_err(|e| Box::new(e) as BoxDynError),
                        other => {
                            let wide = other
                                .as_i64()
                                .ok_or_else(|| unexpected(other, stringify!($ty)))?;
                            <$ty>::try_from(wide).map_err(|e| Box::new(e) as BoxDynError)
                        }
                    }
                }
            }
        )*
    };
}

impl_decode_int!(i8, i16, i32, i64);

// ============================================================================
// Floating Point
// ============================================================================

impl Decode for f64 {
    fn decode(value: &Value) -> Result<Self, BoxDynError> {
        match value {
            Value::Double(f) => Ok(*f),
            Value::Float(f) => Ok(f64::from(*f)),
            Value::Text(s) => s.trim().parse().map_err(|e| Box::new(e) as BoxDynError),
            other => other
                .as_i64()
                .map(|i| i as f64)
                .ok_or_else(|| unexpected(other, "f64")),
        }
    }
}

impl Decode for f32 {
    fn decode(value: &Value) -> Result<Self, BoxDynError> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Double(f) => Ok(*f as f32),
            Value::Text(s) => s.trim().parse().map_err(|e| Box::new(e) as BoxDynError),
            other => other
                .as_i64()
                .map(|i| i as f32)
                .ok_or_else(|| unexpected(other, "f32")),
        }
    }
}

// ============================================================================
// Strings and binary
// ============================================================================

impl Decode for String {
    fn decode(value: &Value) -> Result<Self, BoxDynError> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            Value::Binary(b) => String::from_utf8(b.clone()).map_err(|e| Box::new(e) as BoxDynError),
            Value::Null => Err(unexpected(value, "String")),
            other => Ok(other.to_string()),
        }
    }
}

impl Decode for Vec<u8> {
    fn decode(value: &Value) -> Result<Self, BoxDynError> {
        match value {
            Value::Binary(b) => Ok(b.clone()),
            Value::Text(s) => Ok(s.as_bytes().to_vec()),
            other => Err(unexpected(other, "Vec<u8>")),
        }
    }
}

// ============================================================================
// Generic
// ============================================================================

impl Decode for Value {
    fn decode(value: &Value) -> Result<Self, BoxDynError> {
        Ok(value.clone())
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(value: &Value) -> Result<Self, BoxDynError> {
        match value {
            Value::Null => Ok(None),
            other => T::decode(other).map(Some),
        }
    }
}
