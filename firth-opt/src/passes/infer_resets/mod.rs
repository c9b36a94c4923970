//! Infer concrete reset types and implement full async reset domains.
//!
//! The pass replaces the abstract `reset` type in the IR with a concrete
//! `asyncreset` or `uint<1>` depending on how each reset is driven, and adds
//! async resets to the registers of modules covered by a
//! `FullAsyncResetAnnotation`. It operates in two phases:
//!
//! 1. Trace every connection that touches a value of reset type, across
//!    instance boundaries, and coalesce the connected values into reset
//!    nets ([`net::ResetMap`]).
//! 2. Vote on each net's concrete kind from its concretely typed drivers
//!    and rewrite the IR accordingly, re-deriving dependent types and
//!    module signatures.
//! 3. Collect the `FullAsyncResetAnnotation` /
//!    `IgnoreFullAsyncResetAnnotation` markers of every module.
//! 4. Walk the instance hierarchy to assign every module a reset domain,
//!    inherited from its parent unless the module carries its own marker.
//!    A module reached from two different domains is an error.
//! 5. Plan, per module, how the domain reset is sourced: a local value, an
//!    existing compatible port, or a freshly inserted port.
//! 6. Materialize the plan: insert ports, wire up instances, rewrite
//!    reset-less registers to reset registers with a zero value, and fold
//!    pre-existing sync resets into muxes on the register drivers.

mod annos;
mod domain;
mod implement;
mod infer;
mod net;
mod trace;

use crate::analysis::InstanceGraph;
use crate::traversal::{Named, Pass};
use domain::{InstancePath, ResetDomain};
use firth_ir::{Circuit, ModuleIdx, ValueIdx};
use firth_utils::FirthResult;
use linked_hash_map::LinkedHashMap;
use net::ResetMap;
use std::collections::HashMap;

/// See the [module documentation](self).
#[derive(Default)]
pub struct InferResets {
    /// All traced reset networks in the circuit.
    reset_map: ResetMap,
    /// The annotated reset for a module. `None` records an explicit
    /// `ignore`; otherwise the designated port or wire/node value.
    annotated_resets: HashMap<ModuleIdx, Option<ValueIdx>>,
    /// The reset domain(s) for every module, in instantiation pre-order. A
    /// module reached from conflicting domains has several entries.
    domains: LinkedHashMap<ModuleIdx, Vec<(ResetDomain, InstancePath)>>,
}

impl Named for InferResets {
    fn name() -> &'static str {
        "infer-resets"
    }

    fn description() -> &'static str {
        "infer concrete reset types and implement full async reset domains"
    }
}

impl Pass for InferResets {
    fn run(&mut self, circ: &mut Circuit) -> FirthResult<()> {
        let res = self.run_inner(circ);
        self.clear_data();
        res
    }
}

impl InferResets {
    fn run_inner(&mut self, circ: &mut Circuit) -> FirthResult<()> {
        log::debug!("===----- Tracing uninferred resets -----===");
        self.trace_resets(circ)?;

        log::debug!("===----- Infer reset types -----===");
        self.infer_resets(circ)?;

        log::debug!("===----- Update reset types -----===");
        self.update_resets(circ)?;

        log::debug!("===----- Gather async reset annotations -----===");
        self.collect_annos(circ)?;

        log::debug!("===----- Build async reset domains -----===");
        let graph = InstanceGraph::from(&*circ);
        self.build_domains(circ, &graph)?;

        log::debug!("===----- Determine implementation -----===");
        self.determine_impl(circ);

        log::debug!("===----- Implement async resets -----===");
        self.implement_async_resets(circ)
    }

    fn clear_data(&mut self) {
        self.reset_map.clear();
        self.annotated_resets.clear();
        self.domains.clear();
    }
}
