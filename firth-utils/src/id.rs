//! Interned identifiers.

use std::fmt;

/// An identifier in a Firth program.
///
/// The text is interned in a process-wide table: an `Id` is a small
/// copyable handle, and two ids with the same text compare equal by
/// handle without touching the string data.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Id(symbol_table::GlobalSymbol);

impl Id {
    pub fn new(text: impl AsRef<str>) -> Self {
        Id(symbol_table::GlobalSymbol::from(text.as_ref()))
    }

    /// The interned text.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// The empty identifier, used where a name is optional but a placeholder
/// is needed.
impl Default for Id {
    fn default() -> Self {
        Id::new("")
    }
}

impl From<&str> for Id {
    fn from(text: &str) -> Self {
        Id::new(text)
    }
}

impl From<String> for Id {
    fn from(text: String) -> Self {
        Id::new(text)
    }
}

impl PartialEq<&str> for Id {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}'", self.as_str())
    }
}

/// An IR object that carries a name.
pub trait GetName {
    fn name(&self) -> Id;
}
