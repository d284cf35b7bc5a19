//! Flattens a resolved node list into the operand sequence the runtime
//! executes. No reordering, no synthesis.

use crate::mini_front::error::{EmitError, UnsupportedNodeError};
use crate::mini_front::node::Node;
use crate::mini_vm::code::{Code, Immediate};

pub fn emit(nodes: &[Node]) -> Result<Vec<Code>, EmitError> {
    let mut codes = Vec::with_capacity(nodes.len());
    for node in nodes {
        convert(node, &mut codes)?;
    }
    Ok(codes)
}

fn convert(node: &Node, out: &mut Vec<Code>) -> Result<(), EmitError> {
    match node {
        Node::Instr(instr) => {
            out.push(Code::Op(instr.op));
            for arg in &instr.args {
                convert(arg, out)?;
            }
        }
        Node::Op(op) => out.push(Code::Op(*op)),
        Node::Reg(reg) => out.push(Code::Reg(*reg)),
        Node::Off(off) => out.push(Code::Off(*off)),
        Node::Int(v) => out.push(Code::Imm(Immediate::Int(*v))),
        Node::Char(c) => out.push(Code::Imm(Immediate::Char(*c))),
        // a label this late means the linker failed to resolve it
        Node::Label { .. } => {
            return Err(UnsupportedNodeError {
                node: node.to_string(),
            }
            .into())
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mini_front::node::InstrNode;
    use crate::mini_vm::code::{GeneralRegister, Offset, Opcode, Register};

    fn r1() -> Node {
        Node::Reg(Register::General(GeneralRegister::R1))
    }

    #[test]
    fn instruction_nodes_expand_to_opcode_then_args() {
        let nodes = vec![
            Node::Instr(InstrNode::new(Opcode::Mov, vec![r1(), Node::Int(10)])),
            Node::Instr(InstrNode::new(Opcode::Jmp, vec![Node::Off(Offset::Pc(-3))])),
            Node::Instr(InstrNode::new(Opcode::Syscall, vec![])),
        ];
        let codes = emit(&nodes).unwrap();
        assert_eq!(
            codes,
            vec![
                Code::Op(Opcode::Mov),
                Code::Reg(Register::General(GeneralRegister::R1)),
                Code::Imm(Immediate::Int(10)),
                Code::Op(Opcode::Jmp),
                Code::Off(Offset::Pc(-3)),
                Code::Op(Opcode::Syscall),
            ]
        );
    }

    #[test]
    fn flat_nodes_map_one_to_one() {
        let nodes = vec![
            Node::Op(Opcode::Push),
            Node::Char('h'),
            Node::Op(Opcode::Alloc),
            Node::Int(16),
        ];
        let codes = emit(&nodes).unwrap();
        assert_eq!(
            codes,
            vec![
                Code::Op(Opcode::Push),
                Code::Imm(Immediate::Char('h')),
                Code::Op(Opcode::Alloc),
                Code::Imm(Immediate::Int(16)),
            ]
        );
    }

    #[test]
    fn surviving_labels_are_an_error() {
        let err = emit(&[Node::reference("_start")]).unwrap_err();
        assert!(matches!(err, EmitError::UnsupportedNode(_)));
    }
}
