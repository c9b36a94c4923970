//! The top-level IR object: a circuit owning all modules, values, and
//! operations.

use crate::{
    Direction, Module, ModuleIdx, OpData, OpIdx, OpKind, Port, Type,
    ValueData, ValueDef, ValueIdx,
};
use crate::annotation::AnnotationSet;
use firth_utils::{Error, FirthResult, GPosIdx, Id, IndexedMap};
use linked_hash_map::LinkedHashMap;

/// An entire design. Modules, values, and operations live in arenas owned
/// by the circuit and are addressed by stable typed indices.
pub struct Circuit {
    pub modules: IndexedMap<ModuleIdx, Module>,
    pub values: IndexedMap<ValueIdx, ValueData>,
    pub ops: IndexedMap<OpIdx, OpData>,
    /// Name index over `modules`, in definition order.
    module_index: LinkedHashMap<Id, ModuleIdx>,
    /// The name of the top-level module.
    pub entrypoint: Id,
}

impl Circuit {
    pub fn new<S: Into<Id>>(entrypoint: S) -> Self {
        Circuit {
            modules: IndexedMap::new(),
            values: IndexedMap::new(),
            ops: IndexedMap::new(),
            module_index: LinkedHashMap::new(),
            entrypoint: entrypoint.into(),
        }
    }

    /// Define a new module with the given name.
    pub fn add_module<S: Into<Id>>(
        &mut self,
        name: S,
        pos: GPosIdx,
    ) -> ModuleIdx {
        let name = name.into();
        assert!(
            !self.module_index.contains_key(&name),
            "module `{name}' is already defined"
        );
        let idx = self.modules.push(Module::new(name, pos));
        self.module_index.insert(name, idx);
        idx
    }

    /// Look up a module by name.
    pub fn find_module<S: Into<Id>>(&self, name: S) -> Option<ModuleIdx> {
        self.module_index.get(&name.into()).copied()
    }

    /// The top-level module, if it is defined.
    pub fn entrypoint_module(&self) -> Option<ModuleIdx> {
        self.find_module(self.entrypoint)
    }

    /// Append a port to a module's signature and return its value.
    pub fn add_port<S: Into<Id>>(
        &mut self,
        module: ModuleIdx,
        name: S,
        direction: Direction,
        ty: Type,
        pos: GPosIdx,
    ) -> ValueIdx {
        let at = self.modules[module].ports.len();
        self.insert_port(module, at, name, direction, ty, pos)
    }

    /// Insert a port into a module's signature at position `at`, shifting
    /// the ports behind it. Returns the new port's value.
    pub fn insert_port<S: Into<Id>>(
        &mut self,
        module: ModuleIdx,
        at: usize,
        name: S,
        direction: Direction,
        ty: Type,
        pos: GPosIdx,
    ) -> ValueIdx {
        let name = name.into();
        let value = self.values.push(ValueData {
            ty: ty.clone(),
            def: ValueDef::Port { index: at },
            module,
            pos,
        });
        let m = &mut self.modules[module];
        m.ports.insert(
            at,
            Port {
                name,
                direction,
                ty,
                value,
                annotations: AnnotationSet::default(),
                pos,
            },
        );
        m.add_names([name].into());
        // Re-index the port values that were shifted.
        for index in at + 1..m.ports.len() {
            let shifted = m.ports[index].value;
            self.values[shifted].def = ValueDef::Port { index };
        }
        value
    }

    /// Copy the port value types back into a module's signature. Must be
    /// called after rewriting the type of any port value.
    pub fn sync_signature(&mut self, module: ModuleIdx) {
        let Circuit {
            modules, values, ..
        } = self;
        for port in &mut modules[module].ports {
            port.ty = values[port.value].ty.clone();
        }
    }

    /// Convenience accessor for a value's type.
    pub fn ty(&self, value: ValueIdx) -> &Type {
        &self.values[value].ty
    }

    /// The operations of the owning module that use `value` as an operand,
    /// in program order.
    pub fn users(&self, value: ValueIdx) -> Vec<OpIdx> {
        let module = self.values[value].module;
        self.modules[module]
            .body
            .iter()
            .copied()
            .filter(|&op| self.ops[op].kind.operands().contains(&value))
            .collect()
    }

    /// Remove an operation from its module's body. The arena entry stays
    /// behind but is no longer reachable.
    pub fn erase_op(&mut self, op: OpIdx) {
        let module = self.ops[op].module;
        self.modules[module].body.retain(|&o| o != op);
    }

    /// Re-derive the result types of an operation from its operand types.
    /// Returns `None` for operations whose results do not depend on their
    /// operands.
    pub fn infer_result_types(&self, op: OpIdx) -> Option<Vec<Type>> {
        match &self.ops[op].kind {
            OpKind::Node { input, .. } => {
                Some(vec![self.ty(*input).clone()])
            }
            OpKind::Subfield { input, index, .. } => {
                Some(vec![self.ty(*input).fields()[*index].ty.clone()])
            }
            OpKind::Subindex { input, .. }
            | OpKind::Subaccess { input, .. } => {
                Some(vec![self.ty(*input).element().clone()])
            }
            OpKind::Mux { high, .. } => Some(vec![self.ty(*high).clone()]),
            OpKind::AsClock { .. } => Some(vec![Type::Clock]),
            OpKind::AsAsyncReset { .. } => Some(vec![Type::AsyncReset]),
            _ => None,
        }
    }

    /// Check the structural contract of a single operation. Only register
    /// operations have one: a `regreset` must carry a concrete reset
    /// signal and a reset value of the register's own type.
    pub fn verify_op(&self, op: OpIdx) -> FirthResult<()> {
        let data = &self.ops[op];
        if let OpKind::RegReset {
            result,
            reset,
            reset_value,
            name,
            ..
        } = &data.kind
        {
            let reset_ty = self.ty(*reset);
            if !matches!(reset_ty, Type::AsyncReset | Type::Uint(1)) {
                return Err(Error::malformed_structure(format!(
                    "register `{name}' has reset of non-concrete type \
                     `{reset_ty}'"
                ))
                .with_pos(data));
            }
            let result_ty = self.ty(*result);
            let value_ty = self.ty(*reset_value);
            if result_ty != value_ty {
                return Err(Error::malformed_structure(format!(
                    "register `{name}' of type `{result_ty}' has reset \
                     value of type `{value_ty}'"
                ))
                .with_pos(data));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_port_reindexes_values() {
        let mut circ = Circuit::new("top");
        let top = circ.add_module("top", GPosIdx::UNKNOWN);
        let clk = circ.add_port(
            top,
            "clk",
            Direction::Input,
            Type::Clock,
            GPosIdx::UNKNOWN,
        );
        let out = circ.add_port(
            top,
            "out",
            Direction::Output,
            Type::Uint(8),
            GPosIdx::UNKNOWN,
        );
        let rst = circ.insert_port(
            top,
            0,
            "rst",
            Direction::Input,
            Type::AsyncReset,
            GPosIdx::UNKNOWN,
        );

        let names: Vec<_> = circ.modules[top]
            .ports
            .iter()
            .map(|p| p.name.to_string())
            .collect();
        assert_eq!(names, ["rst", "clk", "out"]);
        assert_eq!(circ.values[rst].def, ValueDef::Port { index: 0 });
        assert_eq!(circ.values[clk].def, ValueDef::Port { index: 1 });
        assert_eq!(circ.values[out].def, ValueDef::Port { index: 2 });
    }
}
