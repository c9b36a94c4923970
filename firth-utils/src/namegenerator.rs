use crate::Id;
use std::collections::{HashMap, HashSet};

/// Generates non-conflicting names for IR objects.
///
/// Tracks the names already defined in a scope and a per-prefix counter so
/// that repeated requests for the same prefix produce `prefix`, `prefix0`,
/// `prefix1`, and so on.
#[derive(Clone, Debug, Default)]
pub struct NameGenerator {
    counts: HashMap<Id, u64>,
    defined: HashSet<Id>,
}

impl NameGenerator {
    /// Create a generator that avoids the given already-defined names.
    pub fn with_prev_defined_names(defined: HashSet<Id>) -> Self {
        NameGenerator {
            counts: HashMap::new(),
            defined,
        }
    }

    /// Mark additional names as defined.
    pub fn add_names(&mut self, names: HashSet<Id>) {
        self.defined.extend(names)
    }

    /// Return a fresh name starting with `prefix`.
    pub fn gen_name<S: Into<Id>>(&mut self, prefix: S) -> Id {
        let prefix = prefix.into();
        let mut count = self.counts.get(&prefix).copied().unwrap_or(0);
        let mut name = if count == 0 {
            prefix
        } else {
            Id::new(format!("{prefix}{}", count - 1))
        };
        while self.defined.contains(&name) {
            name = Id::new(format!("{prefix}{count}"));
            count += 1;
        }
        self.counts.insert(prefix, count + 1);
        self.defined.insert(name);
        name
    }
}
