//! Phase I, step 1: trace the uninferred reset networks of a circuit.
//!
//! Walks every module body once. Connect and partial-connect ops, plus the
//! implicit port-to-port links of instance ops, contribute field-level
//! drives to the [`ResetMap`](super::net::ResetMap).

use super::InferResets;
use firth_ir::{
    Circuit, Direction, FieldRef, Id, OpKind, Type, ValueDef, ValueIdx,
};
use firth_utils::{Error, FirthResult, GPosIdx};

impl InferResets {
    /// Follow all signals of reset type in the circuit, aggregating them
    /// into reset nets.
    pub(super) fn trace_resets(&mut self, circ: &Circuit) -> FirthResult<()> {
        for module in circ.modules.values() {
            for &op in &module.body {
                let data = &circ.ops[op];
                match &data.kind {
                    OpKind::Connect { dest, src }
                    | OpKind::PartialConnect { dest, src } => {
                        self.trace_connect(circ, *dest, *src, data.pos)?
                    }
                    OpKind::Instance {
                        results, target, ..
                    } => self.trace_instance(circ, results, *target)?,
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Trace reset signals through an instance, associating the instance's
    /// results with the target module's port values.
    fn trace_instance(
        &mut self,
        circ: &Circuit,
        results: &[ValueIdx],
        target: Id,
    ) -> FirthResult<()> {
        // Nothing to do for instances of modules that are not defined in
        // this circuit.
        let Some(t) = circ.find_module(target) else {
            return Ok(());
        };
        log::debug!("Visiting instance of `{target}'");
        for (result, port) in results.iter().zip(&circ.modules[t].ports) {
            // An input port is driven from the instance side; an output
            // port drives the instance side.
            let (dst, src) = match port.direction {
                Direction::Input => (port.value, *result),
                Direction::Output => (*result, port.value),
            };
            self.trace_connect(circ, dst, src, circ.values[*result].pos)?;
        }
        Ok(())
    }

    /// Analyze a connect of one (possibly aggregate, possibly projected)
    /// value to another.
    fn trace_connect(
        &mut self,
        circ: &Circuit,
        dst: ValueIdx,
        src: ValueIdx,
        pos: GPosIdx,
    ) -> FirthResult<()> {
        let (dst_root, dst_id) = resolve_projections(circ, dst);
        let (src_root, src_id) = resolve_projections(circ, src);
        self.trace_types(
            circ,
            circ.ty(dst),
            dst_root,
            dst_id,
            circ.ty(src),
            src_root,
            src_id,
            pos,
        )
    }

    /// Recurse structurally over a drive, recording every leaf that
    /// involves the abstract reset type.
    #[allow(clippy::too_many_arguments)]
    fn trace_types(
        &mut self,
        circ: &Circuit,
        dst_ty: &Type,
        dst: ValueIdx,
        dst_id: u32,
        src_ty: &Type,
        src: ValueIdx,
        src_id: u32,
        pos: GPosIdx,
    ) -> FirthResult<()> {
        match (dst_ty, src_ty) {
            (Type::Bundle(dst_fields), Type::Bundle(_)) => {
                for (dst_idx, dst_field) in dst_fields.iter().enumerate() {
                    // Fields missing on one side are simply not connected
                    // (partial-connect semantics).
                    let Some(src_idx) = src_ty.field_index(dst_field.name)
                    else {
                        continue;
                    };
                    let src_field = &src_ty.fields()[src_idx];
                    if dst_field.flip {
                        self.trace_types(
                            circ,
                            &src_field.ty,
                            src,
                            src_id + src_ty.field_id(src_idx),
                            &dst_field.ty,
                            dst,
                            dst_id + dst_ty.field_id(dst_idx),
                            pos,
                        )?;
                    } else {
                        self.trace_types(
                            circ,
                            &dst_field.ty,
                            dst,
                            dst_id + dst_ty.field_id(dst_idx),
                            &src_field.ty,
                            src,
                            src_id + src_ty.field_id(src_idx),
                            pos,
                        )?;
                    }
                }
                Ok(())
            }
            (Type::Vector(dst_elem, _), Type::Vector(src_elem, _)) => {
                // Collapse all elements onto element 0. This may join
                // unrelated resets in the same vector, but the vector's
                // single element type forces them to agree anyway.
                self.trace_types(
                    circ,
                    dst_elem,
                    dst,
                    dst_id + dst_ty.field_id(0),
                    src_elem,
                    src,
                    src_id + src_ty.field_id(0),
                    pos,
                )
            }
            _ if dst_ty.is_ground() && src_ty.is_ground() => {
                if dst_ty.is_abstract_reset() || src_ty.is_abstract_reset() {
                    self.reset_map.add(
                        FieldRef::new(dst, dst_id),
                        dst_ty,
                        FieldRef::new(src, src_id),
                        src_ty,
                        pos,
                    );
                }
                Ok(())
            }
            _ => Err(Error::malformed_structure(format!(
                "connection between incompatible types `{dst_ty}' and \
                 `{src_ty}'"
            ))
            .with_pos(&pos)),
        }
    }
}

/// Walk through the subfield/subindex/subaccess chain on a value, down to
/// the root aggregate, accumulating the field-ID offset of the projected
/// leaf. Constant and dynamic element projections both collapse onto
/// element 0, matching the vector handling above; a subaccess index
/// operand never contributes a drive.
fn resolve_projections(circ: &Circuit, value: ValueIdx) -> (ValueIdx, u32) {
    let mut value = value;
    let mut id = 0;
    loop {
        let ValueDef::OpResult { op, .. } = circ.values[value].def else {
            return (value, id);
        };
        match &circ.ops[op].kind {
            OpKind::Subfield { input, index, .. } => {
                id += circ.ty(*input).field_id(*index);
                value = *input;
            }
            OpKind::Subindex { input, .. }
            | OpKind::Subaccess { input, .. } => {
                id += circ.ty(*input).field_id(0);
                value = *input;
            }
            _ => return (value, id),
        }
    }
}
