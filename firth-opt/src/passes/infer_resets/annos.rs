//! Phase II, step 1: gather the async reset annotations of every module.

use super::InferResets;
use firth_ir::{
    Circuit, ModuleIdx, OpKind, ValueIdx, FULL_ASYNC_RESET_ANNO,
    IGNORE_FULL_ASYNC_RESET_ANNO,
};
use firth_utils::{Error, FirthResult, GPosIdx, Id};

impl InferResets {
    /// Consume the reset annotations of every module and record, per
    /// module, either the designated reset value or an explicit ignore.
    /// Modules with neither inherit a domain from their instantiation
    /// sites and stay absent from the map.
    pub(super) fn collect_annos(
        &mut self,
        circ: &mut Circuit,
    ) -> FirthResult<()> {
        for module in circ.modules.keys().collect::<Vec<_>>() {
            self.collect_module_annos(circ, module)?;
        }
        Ok(())
    }

    fn collect_module_annos(
        &mut self,
        circ: &mut Circuit,
        m: ModuleIdx,
    ) -> FirthResult<()> {
        let module_name = circ.modules[m].name;
        let module_pos = circ.modules[m].pos;
        // Every consumed designation or ignore, for conflict reporting.
        let mut consumed: Vec<(Id, GPosIdx)> = Vec::new();
        let mut failure: Option<Error> = None;
        let mut ignore = false;
        let mut reset: Option<ValueIdx> = None;

        // An "ignore" on the module itself explicitly assigns it no reset
        // domain. A designation must target a port or wire/node instead.
        circ.modules[m].annotations.remove_matching(|anno| {
            if anno.is_class(IGNORE_FULL_ASYNC_RESET_ANNO) {
                ignore = true;
                consumed.push((anno.class, module_pos));
                return true;
            }
            if anno.is_class(FULL_ASYNC_RESET_ANNO) {
                failure = Some(
                    Error::invalid_annotation(
                        "'FullAsyncResetAnnotation' cannot target module; \
                         must target port or wire/node instead",
                    )
                    .with_pos(&module_pos),
                );
                return true;
            }
            false
        });
        if let Some(err) = failure.take() {
            return Err(err);
        }

        // Designations on ports.
        for index in 0..circ.modules[m].ports.len() {
            let value = circ.modules[m].ports[index].value;
            let pos = circ.modules[m].ports[index].pos;
            circ.modules[m].ports[index].annotations.remove_matching(
                |anno| {
                    if anno.is_class(FULL_ASYNC_RESET_ANNO) {
                        reset = Some(value);
                        consumed.push((anno.class, pos));
                        return true;
                    }
                    if anno.is_class(IGNORE_FULL_ASYNC_RESET_ANNO) {
                        failure = Some(
                            Error::invalid_annotation(
                                "'IgnoreFullAsyncResetAnnotation' cannot \
                                 target port; must target module instead",
                            )
                            .with_pos(&pos),
                        );
                        return true;
                    }
                    false
                },
            );
            if let Some(err) = failure.take() {
                return Err(err);
            }
        }

        // Designations on wires and nodes in the body. Either annotation
        // on any other op kind is an error.
        for op in circ.modules[m].body.clone() {
            let data = &circ.ops[op];
            let is_wire_or_node = matches!(
                data.kind,
                OpKind::Wire { .. } | OpKind::Node { .. }
            );
            let result = data.kind.results().first().copied();
            let pos = data.pos;
            circ.ops[op].annotations.remove_matching(|anno| {
                if !is_wire_or_node {
                    if anno.is_class(FULL_ASYNC_RESET_ANNO)
                        || anno.is_class(IGNORE_FULL_ASYNC_RESET_ANNO)
                    {
                        failure = Some(
                            Error::invalid_annotation(
                                "reset annotations must target module, \
                                 port, or wire/node",
                            )
                            .with_pos(&pos),
                        );
                        return true;
                    }
                    return false;
                }
                if anno.is_class(FULL_ASYNC_RESET_ANNO) {
                    reset = result;
                    consumed.push((anno.class, pos));
                    return true;
                }
                if anno.is_class(IGNORE_FULL_ASYNC_RESET_ANNO) {
                    failure = Some(
                        Error::invalid_annotation(
                            "'IgnoreFullAsyncResetAnnotation' cannot \
                             target wire/node; must target module instead",
                        )
                        .with_pos(&pos),
                    );
                    return true;
                }
                false
            });
            if let Some(err) = failure.take() {
                return Err(err);
            }
        }

        // No annotations: the module inherits its domain.
        if !ignore && reset.is_none() {
            log::debug!("No reset annotation for `{module_name}'");
            return Ok(());
        }

        // Several designations (or a designation next to an ignore) within
        // one module are ambiguous.
        if consumed.len() > 1 {
            let mut err = Error::invalid_annotation(format!(
                "multiple reset annotations on module `{module_name}'"
            ))
            .with_pos(&module_pos);
            for (class, pos) in &consumed {
                err = err.with_note(format!("Conflicting {class}:"), pos);
            }
            return Err(err);
        }

        debug_assert!(ignore || reset.is_some());
        self.annotated_resets.insert(m, reset);
        Ok(())
    }
}
