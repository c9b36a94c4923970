//! Values and operations.

use crate::{AnnotationSet, Type};
use firth_utils::{GPosIdx, Id, WithPos, impl_idx};
use smallvec::{SmallVec, smallvec};

/// Index of a module in the circuit arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleIdx(u32);
impl_idx!(ModuleIdx);

/// Index of a value in the circuit arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueIdx(u32);
impl_idx!(ValueIdx);

/// Index of an operation in the circuit arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpIdx(u32);
impl_idx!(OpIdx);

/// A reference to a leaf of a (possibly aggregate) value: the root value
/// plus a field ID in the flat numbering scheme of [`Type`]. Ground values
/// use field ID 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub value: ValueIdx,
    pub field_id: u32,
}

impl FieldRef {
    pub fn new(value: ValueIdx, field_id: u32) -> Self {
        FieldRef { value, field_id }
    }
}

/// What defines a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueDef {
    /// The value is a module port. The index tracks the position in the
    /// module's port list and is updated when ports are inserted.
    Port { index: usize },
    /// The value is the `index`-th result of an operation.
    OpResult { op: OpIdx, index: usize },
}

/// A value in the IR.
#[derive(Debug, Clone)]
pub struct ValueData {
    pub ty: Type,
    pub def: ValueDef,
    /// The module this value lives in.
    pub module: ModuleIdx,
    pub pos: GPosIdx,
}

impl WithPos for ValueData {
    fn copy_span(&self) -> GPosIdx {
        self.pos
    }
}

/// An operation in a module body.
#[derive(Debug, Clone)]
pub struct OpData {
    pub kind: OpKind,
    pub annotations: AnnotationSet,
    pub module: ModuleIdx,
    pub pos: GPosIdx,
}

impl WithPos for OpData {
    fn copy_span(&self) -> GPosIdx {
        self.pos
    }
}

/// The operation kinds of the IR.
#[derive(Debug, Clone)]
pub enum OpKind {
    /// A named connection point.
    Wire { result: ValueIdx, name: Id },
    /// A named alias for a value.
    Node {
        result: ValueIdx,
        input: ValueIdx,
        name: Id,
    },
    /// A register without a reset.
    Reg {
        result: ValueIdx,
        clock: ValueIdx,
        name: Id,
    },
    /// A register with a reset signal and reset value.
    RegReset {
        result: ValueIdx,
        clock: ValueIdx,
        reset: ValueIdx,
        reset_value: ValueIdx,
        name: Id,
    },
    /// An instantiation of another module. One result per port of the
    /// target module, in port order.
    Instance {
        results: Vec<ValueIdx>,
        target: Id,
        name: Id,
    },
    /// A full connection from `src` to `dest`.
    Connect { dest: ValueIdx, src: ValueIdx },
    /// A connection of the fields common to `src` and `dest`.
    PartialConnect { dest: ValueIdx, src: ValueIdx },
    /// Projection of a bundle field.
    Subfield {
        result: ValueIdx,
        input: ValueIdx,
        index: usize,
    },
    /// Projection of a vector element by constant index.
    Subindex {
        result: ValueIdx,
        input: ValueIdx,
        index: usize,
    },
    /// Projection of a vector element by dynamic index.
    Subaccess {
        result: ValueIdx,
        input: ValueIdx,
        index: ValueIdx,
    },
    /// Two-way multiplexer.
    Mux {
        result: ValueIdx,
        sel: ValueIdx,
        high: ValueIdx,
        low: ValueIdx,
    },
    /// An integer constant.
    Constant { result: ValueIdx, value: u64 },
    /// A value left unconnected.
    Invalid { result: ValueIdx },
    /// Reinterpret a bit as a clock.
    AsClock { result: ValueIdx, input: ValueIdx },
    /// Reinterpret a bit as an async reset.
    AsAsyncReset { result: ValueIdx, input: ValueIdx },
}

impl OpKind {
    /// The values this operation defines.
    pub fn results(&self) -> SmallVec<[ValueIdx; 1]> {
        match self {
            OpKind::Wire { result, .. }
            | OpKind::Node { result, .. }
            | OpKind::Reg { result, .. }
            | OpKind::RegReset { result, .. }
            | OpKind::Subfield { result, .. }
            | OpKind::Subindex { result, .. }
            | OpKind::Subaccess { result, .. }
            | OpKind::Mux { result, .. }
            | OpKind::Constant { result, .. }
            | OpKind::Invalid { result }
            | OpKind::AsClock { result, .. }
            | OpKind::AsAsyncReset { result, .. } => smallvec![*result],
            OpKind::Instance { results, .. } => {
                results.iter().copied().collect()
            }
            OpKind::Connect { .. } | OpKind::PartialConnect { .. } => {
                smallvec![]
            }
        }
    }

    /// The values this operation consumes.
    pub fn operands(&self) -> SmallVec<[ValueIdx; 2]> {
        match self {
            OpKind::Wire { .. }
            | OpKind::Instance { .. }
            | OpKind::Constant { .. }
            | OpKind::Invalid { .. } => smallvec![],
            OpKind::Node { input, .. }
            | OpKind::Subfield { input, .. }
            | OpKind::Subindex { input, .. }
            | OpKind::AsClock { input, .. }
            | OpKind::AsAsyncReset { input, .. } => smallvec![*input],
            OpKind::Reg { clock, .. } => smallvec![*clock],
            OpKind::RegReset {
                clock,
                reset,
                reset_value,
                ..
            } => smallvec![*clock, *reset, *reset_value],
            OpKind::Connect { dest, src }
            | OpKind::PartialConnect { dest, src } => smallvec![*dest, *src],
            OpKind::Subaccess { input, index, .. } => {
                smallvec![*input, *index]
            }
            OpKind::Mux {
                sel, high, low, ..
            } => smallvec![*sel, *high, *low],
        }
    }

    /// The `name` attribute of a declaration-like operation.
    pub fn name(&self) -> Option<Id> {
        match self {
            OpKind::Wire { name, .. }
            | OpKind::Node { name, .. }
            | OpKind::Reg { name, .. }
            | OpKind::RegReset { name, .. }
            | OpKind::Instance { name, .. } => Some(*name),
            _ => None,
        }
    }

    /// Whether this is a subfield/subindex/subaccess projection.
    pub fn is_projection(&self) -> bool {
        matches!(
            self,
            OpKind::Subfield { .. }
                | OpKind::Subindex { .. }
                | OpKind::Subaccess { .. }
        )
    }

    /// A short mnemonic for the operation, as printed.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            OpKind::Wire { .. } => "wire",
            OpKind::Node { .. } => "node",
            OpKind::Reg { .. } => "reg",
            OpKind::RegReset { .. } => "regreset",
            OpKind::Instance { .. } => "instance",
            OpKind::Connect { .. } => "connect",
            OpKind::PartialConnect { .. } => "partial-connect",
            OpKind::Subfield { .. } => "subfield",
            OpKind::Subindex { .. } => "subindex",
            OpKind::Subaccess { .. } => "subaccess",
            OpKind::Mux { .. } => "mux",
            OpKind::Constant { .. } => "constant",
            OpKind::Invalid { .. } => "invalid",
            OpKind::AsClock { .. } => "asclock",
            OpKind::AsAsyncReset { .. } => "asasyncreset",
        }
    }
}
