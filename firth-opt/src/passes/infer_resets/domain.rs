//! Phase II, steps 2 and 3: build the reset domains across the instance
//! hierarchy and plan how each module sources its domain reset.

use super::InferResets;
use crate::analysis::InstanceGraph;
use firth_ir::{
    Circuit, Id, ModuleIdx, OpIdx, ValueDef, ValueIdx,
};
use firth_utils::{Error, FirthResult};
use itertools::Itertools;
use std::collections::HashSet;

/// The instance ops leading from the circuit root to a module occurrence.
pub(super) type InstancePath = Vec<OpIdx>;

/// A reset domain.
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct ResetDomain {
    /// Whether this module is the root of its domain.
    pub is_top: bool,
    /// The reset signal for this domain. `None` means the domain
    /// explicitly has no reset.
    pub reset: Option<ValueIdx>,

    // Implementation details filled in by planning.
    pub existing_value: Option<ValueIdx>,
    pub existing_port: Option<usize>,
    pub new_port_name: Option<Id>,
}

/// Two domains are the same iff they agree on the root flag and the reset;
/// the implementation details don't participate.
impl PartialEq for ResetDomain {
    fn eq(&self, other: &Self) -> bool {
        self.is_top == other.is_top && self.reset == other.reset
    }
}
impl Eq for ResetDomain {}

impl ResetDomain {
    fn inherited(reset: Option<ValueIdx>) -> Self {
        ResetDomain {
            reset,
            ..Default::default()
        }
    }
}

/// The name and owning module of a reset value, which must be a module
/// port or a wire/node result.
pub(super) fn reset_name_and_module(
    circ: &Circuit,
    reset: ValueIdx,
) -> (Id, ModuleIdx) {
    let data = &circ.values[reset];
    let name = match data.def {
        ValueDef::Port { index } => {
            circ.modules[data.module].ports[index].name
        }
        ValueDef::OpResult { op, .. } => circ.ops[op]
            .kind
            .name()
            .expect("domain resets are ports or named declarations"),
    };
    (name, data.module)
}

impl InferResets {
    /// Gather the reset domains of the design by walking the instance
    /// hierarchy from the top module. A module inherits its parent's
    /// domain unless it carries its own annotation. Fails if any module is
    /// reached from two different domains.
    pub(super) fn build_domains(
        &mut self,
        circ: &Circuit,
        graph: &InstanceGraph,
    ) -> FirthResult<()> {
        let Some(top) = circ.entrypoint_module() else {
            return Err(Error::undefined(circ.entrypoint, "top-level module"));
        };
        self.build_domains_for(circ, graph, top, Vec::new(), None, 0);

        // Report the modules that ended up in several domains.
        let mut errors = Vec::new();
        for (&m, entries) in self.domains.iter() {
            if entries.len() <= 1 {
                continue;
            }
            errors.push(domain_conflict_error(circ, m, entries));
        }
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.pop().unwrap()),
            _ => Err(Error::multi(errors)),
        }
    }

    fn build_domains_for(
        &mut self,
        circ: &Circuit,
        graph: &InstanceGraph,
        m: ModuleIdx,
        path: InstancePath,
        parent_reset: Option<ValueIdx>,
        indent: usize,
    ) {
        log::debug!(
            "{:indent$}Visiting {}",
            "",
            circ.modules[m].name,
            indent = indent * 2
        );

        // Assemble the domain for this module: inherited, unless the
        // module has its own annotation.
        let mut domain = ResetDomain::inherited(parent_reset);
        if let Some(&annotated) = self.annotated_resets.get(&m) {
            domain.reset = annotated;
            // An explicit ignore does not root a domain.
            domain.is_top = annotated.is_some();
        }

        // Associate the domain with the module. Another entry only gets
        // added for a domain the module has not been seen in yet.
        let entries = self.domains.entry(m).or_insert_with(Vec::new);
        if entries.iter().all(|(d, _)| *d != domain) {
            entries.push((domain, path.clone()));
        }

        // Traverse the child instances. The walk visits per path, not per
        // module: shared submodules are intentionally revisited.
        for (inst, target) in graph.instances(m) {
            let mut child_path = path.clone();
            child_path.push(inst);
            self.build_domains_for(
                circ,
                graph,
                target,
                child_path,
                domain.reset,
                indent + 1,
            );
        }
    }

    /// Decide, for every module, how its domain reset is implemented. This
    /// fills in the `existing_value`, `existing_port`, and `new_port_name`
    /// fields of the domain.
    pub(super) fn determine_impl(&mut self, circ: &Circuit) {
        let modules: Vec<ModuleIdx> = self.domains.keys().copied().collect();
        for m in modules {
            let entries = self.domains.get_mut(&m).unwrap();
            let domain = &mut entries
                .last_mut()
                .expect("every visited module has a domain")
                .0;
            determine_impl_for(circ, m, domain);
        }
    }
}

fn determine_impl_for(
    circ: &Circuit,
    m: ModuleIdx,
    domain: &mut ResetDomain,
) {
    // Nothing to plan if the module needs no reset.
    let Some(reset) = domain.reset else {
        return;
    };
    log::debug!("Planning reset for `{}'", circ.modules[m].name);

    // The root of a domain reuses its local port or wire directly.
    if domain.is_top {
        domain.existing_value = Some(reset);
        if let ValueDef::Port { index } = circ.values[reset].def {
            domain.existing_port = Some(index);
        }
        return;
    }

    // The reset lives in a parent module, so this module must route it
    // through a port named after the parent's reset.
    let (needed_name, _) = reset_name_and_module(circ, reset);
    let needed_ty = circ.ty(reset);
    let module = &circ.modules[m];
    if let Some(index) = module.port_index(needed_name) {
        if &module.ports[index].ty == needed_ty {
            log::debug!("- Reusing existing port {needed_name}");
            domain.existing_value = Some(module.ports[index].value);
            domain.existing_port = Some(index);
            return;
        }
        // The name is taken with an incompatible type; uniquify with a
        // numeric suffix.
        let mut suffix = 0;
        let new_name = loop {
            let candidate = Id::new(format!("{needed_name}_{suffix}"));
            if module.find_port(candidate).is_none() {
                break candidate;
            }
            suffix += 1;
        };
        log::debug!("- Creating uniquified port {new_name}");
        domain.new_port_name = Some(new_name);
        return;
    }

    log::debug!("- Creating new port {needed_name}");
    domain.new_port_name = Some(needed_name);
}

/// Describe a module reached from several reset domains: one note per
/// entry naming the instance path and its domain, plus a declaration note
/// the first time each domain reset appears.
fn domain_conflict_error(
    circ: &Circuit,
    m: ModuleIdx,
    entries: &[(ResetDomain, InstancePath)],
) -> Error {
    let module = &circ.modules[m];
    let mut err = Error::malformed_structure(format!(
        "module `{}' instantiated in different reset domains",
        module.name
    ))
    .with_pos(module);

    let mut declared: HashSet<ValueIdx> = HashSet::new();
    for (domain, path) in entries {
        let pos = path
            .last()
            .map(|&inst| circ.ops[inst].pos)
            .unwrap_or(module.pos);
        let site = if path.is_empty() {
            "Root instance".to_string()
        } else {
            format!(
                "Instance `{}'",
                path.iter()
                    .map(|&inst| {
                        circ.ops[inst].kind.name().unwrap_or_default()
                    })
                    .join("/")
            )
        };
        match domain.reset {
            Some(reset) => {
                let (name, root) = reset_name_and_module(circ, reset);
                err = err.with_note(
                    format!(
                        "{site} is in reset domain rooted at `{name}' of \
                         module `{}'",
                        circ.modules[root].name
                    ),
                    &pos,
                );
                if declared.insert(reset) {
                    err = err.with_note(
                        format!(
                            "Reset domain `{name}' of module `{}' declared \
                             here:",
                            circ.modules[root].name
                        ),
                        &circ.values[reset],
                    );
                }
            }
            None => {
                err = err
                    .with_note(format!("{site} is in no reset domain"), &pos);
            }
        }
    }
    err
}
