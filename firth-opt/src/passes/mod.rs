//! Passes over the Firth IR.

mod infer_resets;

pub use infer_resets::InferResets;
