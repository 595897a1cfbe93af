use std::collections::HashMap;
use std::fmt;

/// A dynamically-typed value returned by an `Observable::query`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    String(String),
    Array(Vec<Value>),
    Map(HashMap<String, Value>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::U8(v) => write!(f, "{v}"),
            Self::U16(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::I8(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v}"),
            Self::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

macro_rules! value_from {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Self::$variant(v)
            }
        }
    };
}

value_from!(bool, Bool);
value_from!(u8, U8);
value_from!(u16, U16);
value_from!(u32, U32);
value_from!(u64, U64);
value_from!(i8, I8);
value_from!(String, String);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

/// Introspection for a chip or system: query named paths without
/// mutating state. Used by debuggers and tests, never by the simulated
/// machine itself.
pub trait Observable {
    /// Look up a dotted path (e.g. `"cpu.pc"`, `"cia1.timer_a"`).
    /// Returns `None` for an unrecognized path.
    fn query(&self, path: &str) -> Option<Value>;

    /// The set of paths this implementation recognizes, for
    /// discoverability. Paths with a parametric suffix (an address, an
    /// index) are documented with a placeholder, e.g. `"memory.<address>"`.
    fn query_paths(&self) -> &'static [&'static str];
}
