//! Rendering of the IR as FIRRTL-flavoured text. Meant for debugging and
//! test output, not for round-tripping.

use crate::{Circuit, Direction, Module, OpData, OpKind, ValueDef, ValueIdx};
use itertools::Itertools;
use std::io;

/// Renders a circuit in a FIRRTL-ish concrete syntax.
pub struct Printer;

impl Printer {
    pub fn write_circuit<W: io::Write>(
        circ: &Circuit,
        f: &mut W,
    ) -> io::Result<()> {
        writeln!(f, "circuit {}:", circ.entrypoint)?;
        for module in circ.modules.values() {
            Self::write_module(circ, module, f)?;
        }
        Ok(())
    }

    pub fn write_module<W: io::Write>(
        circ: &Circuit,
        module: &Module,
        f: &mut W,
    ) -> io::Result<()> {
        writeln!(f, "  module {}:", module.name)?;
        for port in &module.ports {
            let dir = match port.direction {
                Direction::Input => "input",
                Direction::Output => "output",
            };
            writeln!(f, "    {dir} {}: {}", port.name, port.ty)?;
        }
        for &op in &module.body {
            write!(f, "    ")?;
            Self::write_op(circ, &circ.ops[op], f)?;
            writeln!(f)?;
        }
        Ok(())
    }

    /// The name a value prints as: the port or declaration name where one
    /// exists, a `%N` placeholder otherwise.
    pub fn value_name(circ: &Circuit, value: ValueIdx) -> String {
        let data = &circ.values[value];
        match data.def {
            ValueDef::Port { index } => {
                circ.modules[data.module].ports[index].name.to_string()
            }
            ValueDef::OpResult { op, index } => {
                let kind = &circ.ops[op].kind;
                if let OpKind::Instance { target, name, .. } = kind {
                    match circ.find_module(*target) {
                        Some(t) => format!(
                            "{name}.{}",
                            circ.modules[t].ports[index].name
                        ),
                        None => format!("{name}.{index}"),
                    }
                } else if let Some(name) = kind.name() {
                    name.to_string()
                } else {
                    format!(
                        "%{}",
                        firth_utils::IndexRef::index(&value)
                    )
                }
            }
        }
    }

    pub fn write_op<W: io::Write>(
        circ: &Circuit,
        op: &OpData,
        f: &mut W,
    ) -> io::Result<()> {
        let name = |v: &ValueIdx| Self::value_name(circ, *v);
        match &op.kind {
            OpKind::Wire { result, name: n } => {
                write!(f, "wire {n}: {}", circ.ty(*result))
            }
            OpKind::Node { input, name: n, .. } => {
                write!(f, "node {n} = {}", name(input))
            }
            OpKind::Reg {
                result,
                clock,
                name: n,
            } => {
                write!(
                    f,
                    "reg {n}: {} with {}",
                    circ.ty(*result),
                    name(clock)
                )
            }
            OpKind::RegReset {
                result,
                clock,
                reset,
                reset_value,
                name: n,
            } => write!(
                f,
                "regreset {n}: {} with {} reset ({}, {})",
                circ.ty(*result),
                name(clock),
                name(reset),
                name(reset_value)
            ),
            OpKind::Instance {
                target, name: n, ..
            } => write!(f, "inst {n} of {target}"),
            OpKind::Connect { dest, src } => {
                write!(f, "{} <= {}", name(dest), name(src))
            }
            OpKind::PartialConnect { dest, src } => {
                write!(f, "{} <- {}", name(dest), name(src))
            }
            OpKind::Subfield { result, input, index } => {
                let field = circ.ty(*input).fields()[*index].name;
                write!(
                    f,
                    "{} = {}.{field}",
                    name(result),
                    name(input)
                )
            }
            OpKind::Subindex { result, input, index } => {
                write!(f, "{} = {}[{index}]", name(result), name(input))
            }
            OpKind::Subaccess {
                result,
                input,
                index,
            } => write!(
                f,
                "{} = {}[{}]",
                name(result),
                name(input),
                name(index)
            ),
            OpKind::Mux {
                result,
                sel,
                high,
                low,
            } => write!(
                f,
                "{} = mux({})",
                name(result),
                [sel, high, low].iter().map(|v| name(v)).join(", ")
            ),
            OpKind::Constant { result, value } => {
                write!(f, "{} = {}({value})", name(result), circ.ty(*result))
            }
            OpKind::Invalid { result } => {
                write!(f, "{} = invalid: {}", name(result), circ.ty(*result))
            }
            OpKind::AsClock { result, input } => {
                write!(f, "{} = asClock({})", name(result), name(input))
            }
            OpKind::AsAsyncReset { result, input } => {
                write!(f, "{} = asAsyncReset({})", name(result), name(input))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Builder, Type};
    use firth_utils::GPosIdx;

    #[test]
    fn renders_a_small_module() {
        let mut circ = Circuit::new("top");
        let top = circ.add_module("top", GPosIdx::UNKNOWN);
        let clk = circ.add_port(
            top,
            "clk",
            Direction::Input,
            Type::Clock,
            GPosIdx::UNKNOWN,
        );
        let mut b = Builder::at_end(&mut circ, top);
        let q = b.add_reg("q", Type::Uint(4), clk);
        let w = b.add_wire("w", Type::Uint(4));
        b.add_connect(q, w);

        let mut out = Vec::new();
        Printer::write_circuit(&circ, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("circuit top:"));
        assert!(text.contains("input clk: clock"));
        assert!(text.contains("reg q: uint<4> with clk"));
        assert!(text.contains("q <= w"));
    }
}
