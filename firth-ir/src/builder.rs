//! A builder for constructing operations inside a module body.

use crate::{
    Circuit, ModuleIdx, OpData, OpIdx, OpKind, Type, ValueData, ValueDef,
    ValueIdx,
};
use crate::annotation::AnnotationSet;
use firth_utils::{GPosIdx, Id};

/// Constructs operations at an insertion point inside a module body. Every
/// created operation carries the builder's current position, in the manner
/// of an implicit-location builder.
pub struct Builder<'a> {
    pub circ: &'a mut Circuit,
    module: ModuleIdx,
    /// Index into the module body where the next operation is inserted.
    point: usize,
    pos: GPosIdx,
}

impl<'a> Builder<'a> {
    /// Start inserting at the end of `module`'s body.
    pub fn at_end(circ: &'a mut Circuit, module: ModuleIdx) -> Self {
        let point = circ.modules[module].body.len();
        Builder {
            circ,
            module,
            point,
            pos: GPosIdx::UNKNOWN,
        }
    }

    /// Start inserting directly before `op`.
    pub fn before_op(
        circ: &'a mut Circuit,
        module: ModuleIdx,
        op: OpIdx,
    ) -> Self {
        let mut builder = Self::at_end(circ, module);
        builder.set_insertion_before(op);
        builder
    }

    /// The module this builder inserts into.
    pub fn module(&self) -> ModuleIdx {
        self.module
    }

    /// Move the insertion point to directly before `op`.
    pub fn set_insertion_before(&mut self, op: OpIdx) {
        let body = &self.circ.modules[self.module].body;
        self.point = body
            .iter()
            .position(|&o| o == op)
            .unwrap_or_else(|| {
                panic!("operation is not in the body of this module")
            });
    }

    /// Move the insertion point to the end of the body.
    pub fn set_insertion_to_end(&mut self) {
        self.point = self.circ.modules[self.module].body.len();
    }

    /// Set the position attached to subsequently created operations.
    pub fn set_pos(&mut self, pos: GPosIdx) {
        self.pos = pos;
    }

    /// Construct a non-conflicting name in the current module.
    pub fn gen_name<S: Into<Id>>(&mut self, prefix: S) -> Id {
        self.circ.modules[self.module].generate_name(prefix)
    }

    fn insert_op(&mut self, kind: OpKind) -> OpIdx {
        let op = self.circ.ops.push(OpData {
            kind,
            annotations: AnnotationSet::default(),
            module: self.module,
            pos: self.pos,
        });
        self.circ.modules[self.module].body.insert(self.point, op);
        self.point += 1;
        op
    }

    fn new_result(&mut self, ty: Type, index: usize) -> ValueIdx {
        let op = self.circ.ops.peek_next_idx();
        self.circ.values.push(ValueData {
            ty,
            def: ValueDef::OpResult { op, index },
            module: self.module,
            pos: self.pos,
        })
    }

    pub fn add_wire<S: Into<Id>>(&mut self, name: S, ty: Type) -> ValueIdx {
        let name = name.into();
        self.circ.modules[self.module].add_names([name].into());
        let result = self.new_result(ty, 0);
        self.insert_op(OpKind::Wire { result, name });
        result
    }

    pub fn add_node<S: Into<Id>>(
        &mut self,
        name: S,
        input: ValueIdx,
    ) -> ValueIdx {
        let name = name.into();
        self.circ.modules[self.module].add_names([name].into());
        let result = self.new_result(self.circ.ty(input).clone(), 0);
        self.insert_op(OpKind::Node {
            result,
            input,
            name,
        });
        result
    }

    pub fn add_reg<S: Into<Id>>(
        &mut self,
        name: S,
        ty: Type,
        clock: ValueIdx,
    ) -> ValueIdx {
        let name = name.into();
        self.circ.modules[self.module].add_names([name].into());
        let result = self.new_result(ty, 0);
        self.insert_op(OpKind::Reg {
            result,
            clock,
            name,
        });
        result
    }

    pub fn add_reg_reset<S: Into<Id>>(
        &mut self,
        name: S,
        ty: Type,
        clock: ValueIdx,
        reset: ValueIdx,
        reset_value: ValueIdx,
    ) -> ValueIdx {
        let name = name.into();
        self.circ.modules[self.module].add_names([name].into());
        let result = self.new_result(ty, 0);
        self.insert_op(OpKind::RegReset {
            result,
            clock,
            reset,
            reset_value,
            name,
        });
        result
    }

    /// Instantiate `target`, creating one result per port of the target
    /// module in port order.
    pub fn add_instance<S: Into<Id>>(
        &mut self,
        name: S,
        target: ModuleIdx,
    ) -> OpIdx {
        let name = name.into();
        self.circ.modules[self.module].add_names([name].into());
        let target_name = self.circ.modules[target].name;
        let port_tys: Vec<Type> = self.circ.modules[target]
            .ports
            .iter()
            .map(|p| p.ty.clone())
            .collect();
        let results = port_tys
            .into_iter()
            .enumerate()
            .map(|(index, ty)| self.new_result(ty, index))
            .collect();
        self.insert_op(OpKind::Instance {
            results,
            target: target_name,
            name,
        })
    }

    pub fn add_connect(&mut self, dest: ValueIdx, src: ValueIdx) -> OpIdx {
        self.insert_op(OpKind::Connect { dest, src })
    }

    pub fn add_partial_connect(
        &mut self,
        dest: ValueIdx,
        src: ValueIdx,
    ) -> OpIdx {
        self.insert_op(OpKind::PartialConnect { dest, src })
    }

    pub fn add_subfield(
        &mut self,
        input: ValueIdx,
        index: usize,
    ) -> ValueIdx {
        let ty = self.circ.ty(input).fields()[index].ty.clone();
        let result = self.new_result(ty, 0);
        self.insert_op(OpKind::Subfield {
            result,
            input,
            index,
        });
        result
    }

    pub fn add_subindex(&mut self, input: ValueIdx, index: usize) -> ValueIdx {
        let ty = self.circ.ty(input).element().clone();
        let result = self.new_result(ty, 0);
        self.insert_op(OpKind::Subindex {
            result,
            input,
            index,
        });
        result
    }

    pub fn add_subaccess(
        &mut self,
        input: ValueIdx,
        index: ValueIdx,
    ) -> ValueIdx {
        let ty = self.circ.ty(input).element().clone();
        let result = self.new_result(ty, 0);
        self.insert_op(OpKind::Subaccess {
            result,
            input,
            index,
        });
        result
    }

    pub fn add_mux(
        &mut self,
        sel: ValueIdx,
        high: ValueIdx,
        low: ValueIdx,
    ) -> ValueIdx {
        let ty = self.circ.ty(high).clone();
        let result = self.new_result(ty, 0);
        self.insert_op(OpKind::Mux {
            result,
            sel,
            high,
            low,
        });
        result
    }

    pub fn add_constant(&mut self, ty: Type, value: u64) -> ValueIdx {
        let result = self.new_result(ty, 0);
        self.insert_op(OpKind::Constant { result, value });
        result
    }

    pub fn add_invalid(&mut self, ty: Type) -> ValueIdx {
        let result = self.new_result(ty, 0);
        self.insert_op(OpKind::Invalid { result });
        result
    }

    pub fn add_as_clock(&mut self, input: ValueIdx) -> ValueIdx {
        let result = self.new_result(Type::Clock, 0);
        self.insert_op(OpKind::AsClock { result, input });
        result
    }

    pub fn add_as_async_reset(&mut self, input: ValueIdx) -> ValueIdx {
        let result = self.new_result(Type::AsyncReset, 0);
        self.insert_op(OpKind::AsAsyncReset { result, input });
        result
    }

    /// Remove an operation from the body, keeping the insertion point
    /// stable.
    pub fn erase_op(&mut self, op: OpIdx) {
        let body = &self.circ.modules[self.module].body;
        if let Some(at) = body.iter().position(|&o| o == op) {
            if at < self.point {
                self.point -= 1;
            }
            self.circ.modules[self.module].body.remove(at);
        }
    }
}
