use serde::Serialize;
use serde_json::Value;

use crate::{
    error::{Error, Result},
    url::Escaped,
};

/// A value that can be rendered into a query, form, path or header slot.
///
/// `to_param` returning `None` means "absent": query, form and header steps
/// are skipped, and path placeholders are replaced with the empty string.
/// Integers and booleans never need escaping; floating point values still
/// go through the escaper to cover exponent formats.
pub trait ParamValue {
    fn to_param(&self) -> Option<String>;

    fn needs_escaping(&self) -> bool {
        true
    }
}

impl ParamValue for str {
    fn to_param(&self) -> Option<String> {
        Some(self.to_string())
    }
}

impl ParamValue for String {
    fn to_param(&self) -> Option<String> {
        Some(self.clone())
    }
}

impl ParamValue for char {
    fn to_param(&self) -> Option<String> {
        Some(self.to_string())
    }
}

impl ParamValue for bool {
    fn to_param(&self) -> Option<String> {
        Some(if *self { "true" } else { "false" }.to_string())
    }

    fn needs_escaping(&self) -> bool {
        false
    }
}

macro_rules! integer_param {
    ($($t:ty),*) => {
        $(impl ParamValue for $t {
            fn to_param(&self) -> Option<String> {
                Some(self.to_string())
            }

            fn needs_escaping(&self) -> bool {
                false
            }
        })*
    };
}

integer_param!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl ParamValue for f32 {
    fn to_param(&self) -> Option<String> {
        Some(self.to_string())
    }
}

impl ParamValue for f64 {
    fn to_param(&self) -> Option<String> {
        Some(self.to_string())
    }
}

impl ParamValue for Escaped {
    fn to_param(&self) -> Option<String> {
        Some(self.to_string())
    }

    fn needs_escaping(&self) -> bool {
        false
    }
}

impl<T: ParamValue + ?Sized> ParamValue for &T {
    fn to_param(&self) -> Option<String> {
        (**self).to_param()
    }

    fn needs_escaping(&self) -> bool {
        (**self).needs_escaping()
    }
}

impl<T: ParamValue> ParamValue for Option<T> {
    fn to_param(&self) -> Option<String> {
        self.as_ref().and_then(ParamValue::to_param)
    }

    fn needs_escaping(&self) -> bool {
        self.as_ref().is_none_or(ParamValue::needs_escaping)
    }
}

/// One type-erased method argument as handed to the invocation pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument(Value);

impl Argument {
    pub fn new<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(Self)
            .map_err(|e| Error::Serialize(e.to_string()))
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn is_absent(&self) -> bool {
        self.0.is_null()
    }
}

impl From<Value> for Argument {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl ParamValue for Argument {
    fn to_param(&self) -> Option<String> {
        match &self.0 {
            Value::Null => None,
            Value::Bool(b) => b.to_param(),
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    fn needs_escaping(&self) -> bool {
        match &self.0 {
            Value::Bool(_) => false,
            Value::Number(n) => n.is_f64(),
            _ => true,
        }
    }
}
