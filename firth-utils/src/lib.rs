//! Shared utilities for the Firth compiler.
mod errors;
mod id;
mod idx;
mod namegenerator;
mod position;

pub use errors::{Error, FirthResult};
pub use id::{GetName, Id};
pub use idx::{IndexRef, IndexedMap};
pub use namegenerator::NameGenerator;
pub use position::{
    FileIdx, GPosIdx, GlobalPositionTable, PosIdx, WithPos,
};
