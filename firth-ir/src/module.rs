//! In-memory representation of a hardware module.

use crate::{AnnotationSet, OpIdx, Type, ValueIdx};
use firth_utils::{GPosIdx, GetName, Id, NameGenerator, WithPos};
use std::collections::HashSet;

/// Direction of a module port, seen from the outside of the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    /// Return the direction opposite to the current one.
    pub fn reverse(&self) -> Self {
        match self {
            Direction::Input => Direction::Output,
            Direction::Output => Direction::Input,
        }
    }
}

/// A port of a module. The port's type is duplicated here from the port
/// value: the port list is the module's signature, and must be re-synced
/// whenever the value's type is rewritten.
#[derive(Debug, Clone)]
pub struct Port {
    pub name: Id,
    pub direction: Direction,
    pub ty: Type,
    /// The value the port is visible as inside the module body.
    pub value: ValueIdx,
    pub annotations: AnnotationSet,
    pub pos: GPosIdx,
}

impl GetName for Port {
    fn name(&self) -> Id {
        self.name
    }
}

impl WithPos for Port {
    fn copy_span(&self) -> GPosIdx {
        self.pos
    }
}

/// A hardware module: a signature of typed ports and a body of operations
/// in program order.
#[derive(Debug, Clone)]
pub struct Module {
    pub name: Id,
    pub ports: Vec<Port>,
    /// The operations in the module body, in program order.
    pub body: Vec<OpIdx>,
    pub annotations: AnnotationSet,
    pub pos: GPosIdx,
    /// Tracks the names defined in this module (ports and declarations).
    pub(crate) namegen: NameGenerator,
}

impl Module {
    pub fn new<S: Into<Id>>(name: S, pos: GPosIdx) -> Self {
        Module {
            name: name.into(),
            ports: Vec::new(),
            body: Vec::new(),
            annotations: AnnotationSet::default(),
            pos,
            namegen: NameGenerator::default(),
        }
    }

    /// Return a reference to the port with `name` if present.
    pub fn find_port<S>(&self, name: S) -> Option<&Port>
    where
        S: Into<Id>,
    {
        let name = name.into();
        self.ports.iter().find(|p| p.name == name)
    }

    /// The position of the port with `name` in the port list.
    pub fn port_index<S>(&self, name: S) -> Option<usize>
    where
        S: Into<Id>,
    {
        let name = name.into();
        self.ports.iter().position(|p| p.name == name)
    }

    /// Construct a non-conflicting name using the module's name generator.
    pub fn generate_name<S>(&mut self, prefix: S) -> Id
    where
        S: Into<Id>,
    {
        self.namegen.gen_name(prefix)
    }

    pub(crate) fn add_names(&mut self, names: HashSet<Id>) {
        self.namegen.add_names(names)
    }
}

impl GetName for Module {
    fn name(&self) -> Id {
        self.name
    }
}

impl WithPos for Module {
    fn copy_span(&self) -> GPosIdx {
        self.pos
    }
}
