//! Phase II, step 4: materialize the async reset plan of every module.

use super::domain::ResetDomain;
use super::InferResets;
use firth_ir::{
    Builder, Circuit, Direction, ModuleIdx, OpIdx, OpKind, Type, ValueData,
    ValueDef, ValueIdx,
};
use firth_utils::FirthResult;
use std::collections::HashMap;

impl InferResets {
    /// Implement the async resets gathered in the pass' domain map.
    pub(super) fn implement_async_resets(
        &mut self,
        circ: &mut Circuit,
    ) -> FirthResult<()> {
        let work: Vec<(ModuleIdx, ResetDomain)> = self
            .domains
            .iter()
            .map(|(&m, entries)| (m, entries.last().unwrap().0))
            .collect();
        for (m, domain) in work {
            self.implement_module(circ, m, domain)?;
        }
        Ok(())
    }

    /// Implement the async reset for a single module: add the planned
    /// port, rewrite the registers, and wire up instantiated submodules.
    fn implement_module(
        &self,
        circ: &mut Circuit,
        m: ModuleIdx,
        domain: ResetDomain,
    ) -> FirthResult<()> {
        log::debug!(
            "Implementing async reset for `{}'",
            circ.modules[m].name
        );

        // Nothing to do for a module explicitly outside any domain.
        let Some(reset) = domain.reset else {
            log::debug!("- Skipping because module explicitly has no domain");
            return Ok(());
        };

        // If needed, add a reset port to the module.
        let actual_reset = match domain.new_port_name {
            Some(name) => {
                let pos = circ.values[reset].pos;
                let value = circ.insert_port(
                    m,
                    0,
                    name,
                    Direction::Input,
                    Type::AsyncReset,
                    pos,
                );
                log::debug!("- Inserted port {name}");
                value
            }
            None => domain
                .existing_value
                .expect("planning recorded a local reset value"),
        };

        // Rewrite the body. Ops created along the way (zero values, muxes)
        // must not be revisited, so walk a snapshot.
        let body = circ.modules[m].body.clone();
        let mut connects: Vec<(ValueIdx, ValueIdx)> = Vec::new();
        for op in body {
            self.implement_op(circ, m, op, actual_reset, &mut connects)?;
        }

        // Connect the reset ports of the rewritten instances.
        let mut builder = Builder::at_end(circ, m);
        for (dst, src) in connects {
            builder.add_connect(dst, src);
        }
        Ok(())
    }

    fn implement_op(
        &self,
        circ: &mut Circuit,
        m: ModuleIdx,
        op: OpIdx,
        actual_reset: ValueIdx,
        connects: &mut Vec<(ValueIdx, ValueIdx)>,
    ) -> FirthResult<()> {
        match circ.ops[op].kind.clone() {
            // Wire instances of modules that take part in a reset domain
            // up to the local reset.
            OpKind::Instance {
                results,
                target,
                name,
            } => {
                let Some(t) = circ.find_module(target) else {
                    return Ok(());
                };
                // Skip targets without a domain or with an explicitly
                // ignored one.
                let Some(entries) = self.domains.get(&t) else {
                    return Ok(());
                };
                let child = entries.last().unwrap().0;
                if child.reset.is_none() {
                    return Ok(());
                }
                log::debug!("- Update instance `{name}'");

                let inst_reset = if child.new_port_name.is_some() {
                    // The target gets a new port at index 0; mirror it
                    // here by prepending a result and shifting the rest.
                    log::debug!("  - Adding new result as reset");
                    let pos = circ.ops[op].pos;
                    let value = circ.values.push(ValueData {
                        ty: Type::AsyncReset,
                        def: ValueDef::OpResult { op, index: 0 },
                        module: m,
                        pos,
                    });
                    for (index, &result) in results.iter().enumerate() {
                        circ.values[result].def = ValueDef::OpResult {
                            op,
                            index: index + 1,
                        };
                    }
                    let OpKind::Instance { results, .. } =
                        &mut circ.ops[op].kind
                    else {
                        unreachable!();
                    };
                    results.insert(0, value);
                    Some(value)
                } else if let Some(index) = child.existing_port {
                    log::debug!("  - Using result #{index} as reset");
                    Some(results[index])
                } else {
                    // The child's domain is rooted at an internal wire;
                    // there is no port to drive.
                    None
                };

                if let Some(inst_reset) = inst_reset {
                    connects.push((inst_reset, actual_reset));
                }
                Ok(())
            }

            // A reset-less register becomes a reset register with a zero
            // value.
            OpKind::Reg {
                result,
                clock,
                name,
            } => {
                log::debug!("- Adding async reset to reg `{name}'");
                let ty = circ.ty(result).clone();
                let mut builder = Builder::before_op(circ, m, op);
                let zero = create_zero_value(&mut builder, &ty);
                circ.ops[op].kind = OpKind::RegReset {
                    result,
                    clock,
                    reset: actual_reset,
                    reset_value: zero,
                    name,
                };
                Ok(())
            }

            OpKind::RegReset {
                result,
                clock,
                reset,
                reset_value,
                name,
            } => {
                // A register that is already async stays as it is, but
                // must satisfy the register contract.
                if circ.ty(reset) == &Type::AsyncReset {
                    log::debug!("- Skipping (has async reset) `{name}'");
                    return circ.verify_op(op);
                }
                log::debug!("- Updating reset of `{name}'");

                // The register has a sync reset. Fold it into a mux on
                // every driver, then move the register into the async
                // domain.
                let mut builder = Builder::before_op(circ, m, op);
                insert_reset_mux(&mut builder, result, reset, reset_value);
                builder.set_insertion_before(op);
                let ty = builder.circ.ty(result).clone();
                let zero = create_zero_value(&mut builder, &ty);
                circ.ops[op].kind = OpKind::RegReset {
                    result,
                    clock,
                    reset: actual_reset,
                    reset_value: zero,
                    name,
                };
                Ok(())
            }

            _ => Ok(()),
        }
    }
}

/// Construct a zero value of the given type, memoizing shared subterms.
fn create_zero_value(builder: &mut Builder, ty: &Type) -> ValueIdx {
    let mut cache = HashMap::new();
    create_zero(builder, ty, &mut cache)
}

fn create_zero(
    builder: &mut Builder,
    ty: &Type,
    cache: &mut HashMap<Type, ValueIdx>,
) -> ValueIdx {
    if let Some(&value) = cache.get(ty) {
        return value;
    }
    let value = match ty {
        Type::Uint(_) | Type::Sint(_) => {
            builder.add_constant(ty.clone(), 0)
        }
        Type::Clock => {
            let bit = create_zero(builder, &Type::Uint(1), cache);
            builder.add_as_clock(bit)
        }
        Type::AsyncReset => {
            let bit = create_zero(builder, &Type::Uint(1), cache);
            builder.add_as_async_reset(bit)
        }
        Type::Bundle(fields) => {
            let name = builder.gen_name("_zero");
            let wire = builder.add_wire(name, ty.clone());
            for (index, field) in fields.iter().enumerate() {
                let zero = create_zero(builder, &field.ty, cache);
                let acc = builder.add_subfield(wire, index);
                builder.add_connect(acc, zero);
            }
            wire
        }
        Type::Vector(elem, len) => {
            let name = builder.gen_name("_zero");
            let wire = builder.add_wire(name, ty.clone());
            let zero = create_zero(builder, elem, cache);
            for index in 0..*len {
                let acc = builder.add_subindex(wire, index);
                builder.add_connect(acc, zero);
            }
            wire
        }
        // Analog cannot be driven, and the abstract reset is gone after
        // inference; an invalid value stands in for both.
        Type::Reset | Type::Analog(_) => builder.add_invalid(ty.clone()),
    };
    cache.insert(ty.clone(), value);
    value
}

/// Insert a reset multiplexer into every connect targeting `target`:
/// `connect(dst, src)` becomes `connect(dst, mux(reset, reset_value, src))`.
/// Looks through subfield/subindex/subaccess chains, projecting
/// `reset_value` alongside the target; projections that end up unused are
/// erased again. Returns whether `reset_value` was used in any way.
fn insert_reset_mux(
    builder: &mut Builder,
    target: ValueIdx,
    reset: ValueIdx,
    reset_value: ValueIdx,
) -> bool {
    let mut used = false;
    for op in builder.circ.users(target) {
        match builder.circ.ops[op].kind.clone() {
            OpKind::Connect { dest, src }
            | OpKind::PartialConnect { dest, src } => {
                // The register read on the source side of a connect is
                // not a drive.
                if dest != target {
                    continue;
                }
                log::debug!("  - Insert mux into connect");
                builder.set_insertion_before(op);
                let mux = builder.add_mux(reset, reset_value, src);
                match &mut builder.circ.ops[op].kind {
                    OpKind::Connect { src, .. }
                    | OpKind::PartialConnect { src, .. } => *src = mux,
                    _ => unreachable!(),
                }
                used = true;
            }
            OpKind::Subfield {
                result,
                input,
                index,
            } => {
                if input != target {
                    continue;
                }
                builder.set_insertion_before(op);
                let sub = builder.add_subfield(reset_value, index);
                if insert_reset_mux(builder, result, reset, sub) {
                    used = true;
                } else {
                    erase_value_def(builder, sub);
                }
            }
            OpKind::Subindex {
                result,
                input,
                index,
            } => {
                if input != target {
                    continue;
                }
                builder.set_insertion_before(op);
                let sub = builder.add_subindex(reset_value, index);
                if insert_reset_mux(builder, result, reset, sub) {
                    used = true;
                } else {
                    erase_value_def(builder, sub);
                }
            }
            OpKind::Subaccess {
                result,
                input,
                index,
            } => {
                // `target` may also appear as the index operand; that use
                // is not a projection of the register.
                if input != target {
                    continue;
                }
                builder.set_insertion_before(op);
                let sub = builder.add_subaccess(reset_value, index);
                if insert_reset_mux(builder, result, reset, sub) {
                    used = true;
                } else {
                    erase_value_def(builder, sub);
                }
            }
            _ => {}
        }
    }
    used
}

fn erase_value_def(builder: &mut Builder, value: ValueIdx) {
    let ValueDef::OpResult { op, .. } = builder.circ.values[value].def else {
        unreachable!("projections are op results");
    };
    builder.erase_op(op);
}
