use std::fmt::{Debug, Display, Formatter};

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum TagValue {
    Str(&'static str),
    String(String),
    Bool(bool),
    I32(i32),
    I64(i64),
    U16(u16),
    U32(u32),
    U64(u64),
    Usize(usize),
    Null,
}
impl From<&'static str> for TagValue {
    fn from(value: &'static str) -> Self {
        Self::Str(value)
    }
}
impl From<String> for TagValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}
impl From<bool> for TagValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}
impl From<i32> for TagValue {
    fn from(value: i32) -> Self {
        Self::I32(value)
    }
}
impl From<i64> for TagValue {
    fn from(value: i64) -> Self {
        Self::I64(value)
    }
}
impl From<u16> for TagValue {
    fn from(value: u16) -> Self {
        Self::U16(value)
    }
}
impl From<u32> for TagValue {
    fn from(value: u32) -> Self {
        Self::U32(value)
    }
}
impl From<u64> for TagValue {
    fn from(value: u64) -> Self {
        Self::U64(value)
    }
}
impl From<usize> for TagValue {
    fn from(value: usize) -> Self {
        Self::Usize(value)
    }
}
impl<T: Into<TagValue>> From<Option<T>> for TagValue {
    fn from(value: Option<T>) -> Self {
        match value {
            None => Self::Null,
            Some(t) => t.into(),
        }
    }
}
impl Display for TagValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            TagValue::Str(x) => write!(f, "{x:?}"),
            TagValue::String(x) => write!(f, "{x:?}"),
            TagValue::Bool(x) => Display::fmt(&x, f),
            TagValue::I32(x) => Display::fmt(&x, f),
            TagValue::I64(x) => Display::fmt(&x, f),
            TagValue::U16(x) => Display::fmt(&x, f),
            TagValue::U32(x) => Display::fmt(&x, f),
            TagValue::U64(x) => Display::fmt(&x, f),
            TagValue::Usize(x) => Display::fmt(&x, f),
            TagValue::Null => write!(f, "null"),
        }
    }
}
