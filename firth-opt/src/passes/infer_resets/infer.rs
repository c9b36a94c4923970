//! Phase I, steps 2 and 3: infer the kind of every reset net and rewrite
//! the IR with the concrete types.

use super::net::{ResetKind, ResetNetIdx};
use super::InferResets;
use firth_ir::{Circuit, FieldRef, OpIdx, OpKind, Type, ValueDef};
use firth_utils::{Error, FirthResult};
use std::collections::HashSet;

impl InferResets {
    /// Assign every traced net a concrete reset kind.
    pub(super) fn infer_resets(&mut self, circ: &Circuit) -> FirthResult<()> {
        for net in self.reset_map.live_nets() {
            self.infer_reset(circ, net)?;
        }
        Ok(())
    }

    fn infer_reset(
        &mut self,
        circ: &Circuit,
        net_idx: ResetNetIdx,
    ) -> FirthResult<()> {
        let net = self.reset_map.net(net_idx);
        log::debug!(
            "Inferring reset network with {} nodes",
            net.nodes.len()
        );

        // Tally the votes of the concretely typed members.
        let mut async_votes = 0_usize;
        let mut sync_votes = 0_usize;
        let mut invalid_votes = 0_usize;
        for &node_idx in &net.nodes {
            let node = self.reset_map.node(node_idx);
            if !node.ty.is_reset_type() {
                // A value of the wrong type ended up in the net; report it
                // at the drive that pulled it in.
                for drive in &net.drives {
                    if drive.dst == node_idx {
                        return Err(Error::malformed_structure(format!(
                            "reset network drives a non-reset type `{}'",
                            node.ty
                        ))
                        .with_pos(&drive.pos));
                    }
                    if drive.src == node_idx {
                        return Err(Error::malformed_structure(format!(
                            "reset network driven with non-reset type `{}'",
                            node.ty
                        ))
                        .with_pos(&drive.pos));
                    }
                }
                unreachable!(
                    "a node is always involved in at least one drive"
                );
            }

            match node.ty {
                Type::AsyncReset => async_votes += 1,
                Type::Uint(_) => sync_votes += 1,
                _ => {
                    // The invalid-value op is a wildcard: it only votes
                    // for "driven by something".
                    if is_invalid_result(circ, node.field) {
                        invalid_votes += 1;
                    }
                }
            }
        }
        log::debug!(
            "- Found {async_votes} async, {sync_votes} sync, \
             {invalid_votes} invalid drives"
        );

        // A net that nothing concrete ever drove cannot be inferred.
        if async_votes == 0 && sync_votes == 0 && invalid_votes == 0 {
            let root = self.reset_map.guess_root(net_idx);
            return Err(Error::malformed_structure(
                "reset network never driven with concrete type",
            )
            .with_pos(&circ.values[root.value]));
        }

        // Votes for both kinds are a contradiction.
        if async_votes > 0 && sync_votes > 0 {
            let root = self.reset_map.guess_root(net_idx);
            let majority_async = async_votes >= sync_votes;
            let mut err = Error::malformed_structure(
                "reset network simultaneously connected to async and sync \
                 resets",
            )
            .with_pos(&circ.values[root.value])
            .with_note(
                format!(
                    "Did you intend for the reset to be {}?",
                    if majority_async { "async" } else { "sync" }
                ),
                &circ.values[root.value],
            );
            for drive in &net.drives {
                let dst_ty = &self.reset_map.node(drive.dst).ty;
                let src_ty = &self.reset_map.node(drive.src).ty;
                let offending = if majority_async {
                    matches!(dst_ty, Type::Uint(_))
                        || matches!(src_ty, Type::Uint(_))
                } else {
                    matches!(dst_ty, Type::AsyncReset)
                        || matches!(src_ty, Type::AsyncReset)
                };
                if offending {
                    err = err.with_note(
                        format!(
                            "Offending {} drive here:",
                            if majority_async { "sync" } else { "async" }
                        ),
                        &drive.pos,
                    );
                }
            }
            return Err(err);
        }

        // The kind is unambiguous: any async vote makes the net async.
        let kind = if async_votes > 0 {
            ResetKind::Async
        } else {
            ResetKind::Sync
        };
        self.reset_map.net_mut(net_idx).kind = kind;
        log::debug!("- Inferred as {kind}");
        Ok(())
    }

    /// Replace the abstract reset types in the IR with the kinds inferred
    /// for their nets.
    pub(super) fn update_resets(
        &mut self,
        circ: &mut Circuit,
    ) -> FirthResult<()> {
        for net in self.reset_map.live_nets() {
            self.update_net(circ, net)?;
        }
        Ok(())
    }

    fn update_net(
        &mut self,
        circ: &mut Circuit,
        net_idx: ResetNetIdx,
    ) -> FirthResult<()> {
        let kind = self.reset_map.net(net_idx).kind;
        log::debug!(
            "Updating reset network with {} nodes to {kind}",
            self.reset_map.net(net_idx).nodes.len()
        );
        let reset_ty = match kind {
            ResetKind::Async => Type::AsyncReset,
            ResetKind::Sync => Type::Uint(1),
            ResetKind::Uninferred => {
                unreachable!("all nets are inferred at this point")
            }
        };

        // Rewrite the values whose types cannot be re-derived from their
        // operands; everything downstream follows through the worklist.
        let mut worklist = Worklist::default();
        let mut module_worklist = HashSet::new();
        let nodes = self.reset_map.net(net_idx).nodes.clone();
        for node_idx in nodes {
            let field = self.reset_map.node(node_idx).field;
            let is_root = match circ.values[field.value].def {
                ValueDef::Port { .. } => true,
                ValueDef::OpResult { op, .. } => matches!(
                    circ.ops[op].kind,
                    OpKind::Wire { .. }
                        | OpKind::Reg { .. }
                        | OpKind::RegReset { .. }
                        | OpKind::Instance { .. }
                        | OpKind::Invalid { .. }
                ),
            };
            if !is_root {
                continue;
            }
            if update_field(circ, field, &reset_ty) {
                for user in circ.users(field.value) {
                    worklist.insert(user);
                }
                if let ValueDef::Port { .. } = circ.values[field.value].def {
                    module_worklist.insert(circ.values[field.value].module);
                }
            }
        }

        // Propagate through the type-inferring ops until nothing changes.
        // Each step moves a type from abstract to concrete, so the list
        // converges.
        while let Some(op) = worklist.pop() {
            let Some(types) = circ.infer_result_types(op) else {
                continue;
            };
            let results = circ.ops[op].kind.results();
            debug_assert_eq!(results.len(), types.len());
            for (result, new_ty) in results.into_iter().zip(types) {
                if circ.values[result].ty == new_ty {
                    continue;
                }
                circ.values[result].ty = new_ty;
                for user in circ.users(result) {
                    worklist.insert(user);
                }
            }
        }

        // Rebuild the signatures of modules whose port types changed.
        for module in module_worklist {
            circ.sync_signature(module);
            log::debug!(
                "- Updated signature of module `{}'",
                circ.modules[module].name
            );
        }

        Ok(())
    }
}

/// Rewrite the type of a single field within a value's type. Returns
/// whether anything changed.
fn update_field(
    circ: &mut Circuit,
    field: FieldRef,
    reset_ty: &Type,
) -> bool {
    let old = circ.values[field.value].ty.clone();
    let new = old.with_field_type(field.field_id, reset_ty.clone());
    if old == new {
        return false;
    }
    log::debug!("- Updating from `{old}' to `{new}'");
    circ.values[field.value].ty = new;
    true
}

/// Whether the field's root value is the result of an invalid-value op.
fn is_invalid_result(circ: &Circuit, field: FieldRef) -> bool {
    match circ.values[field.value].def {
        ValueDef::OpResult { op, .. } => {
            matches!(circ.ops[op].kind, OpKind::Invalid { .. })
        }
        ValueDef::Port { .. } => false,
    }
}

/// A LIFO worklist with set semantics: an op is not enqueued twice while
/// it is already waiting.
#[derive(Default)]
struct Worklist {
    stack: Vec<OpIdx>,
    queued: HashSet<OpIdx>,
}

impl Worklist {
    fn insert(&mut self, op: OpIdx) {
        if self.queued.insert(op) {
            self.stack.push(op);
        }
    }

    fn pop(&mut self) -> Option<OpIdx> {
        let op = self.stack.pop()?;
        self.queued.remove(&op);
        Some(op)
    }
}
