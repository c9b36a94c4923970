//! Intermediate representation for the Firth compiler.
//!
//! The IR models a FIRRTL-flavoured circuit: a set of modules with typed,
//! directed ports, each with a body of operations in SSA form. Values and
//! operations live in arenas owned by the [`Circuit`] and are addressed by
//! the typed indices [`ValueIdx`], [`OpIdx`], and [`ModuleIdx`], which stay
//! stable across rewrites.

mod annotation;
mod builder;
mod circuit;
mod module;
mod printer;
mod structure;
mod types;

pub use annotation::{
    Annotation, AnnotationSet, FULL_ASYNC_RESET_ANNO,
    IGNORE_FULL_ASYNC_RESET_ANNO,
};
pub use builder::Builder;
pub use circuit::Circuit;
pub use firth_utils::{GetName, Id};
pub use module::{Direction, Module, Port};
pub use printer::Printer;
pub use structure::{
    FieldRef, ModuleIdx, OpData, OpIdx, OpKind, ValueData, ValueDef, ValueIdx,
};
pub use types::{BundleField, Type};
