//! Combines translation units into one self-contained program: texts are
//! concatenated, the global symbol table is checked, sizeof constants are
//! substituted, AUTO constants become a heap-initialization preamble, and
//! every remaining label turns into a concrete PC offset or address.

use crate::mini_front::node::Node;
use crate::mini_ir::error::{LinkError, TooManyEntryPointsError, UndefinedSymbolsError};
use crate::mini_ir::parser::{solve_labels, solve_sizeof};
use crate::mini_ir::symbol::SymbolTable;
use crate::mini_ir::{DataMode, TranslationUnit};
use crate::mini_vm::code::{GeneralRegister, Offset, Opcode, Register};

/// Name of the synthesized label the initial jump lands on.
const PRE_LABEL: &str = "_pre";

/// Links the units in order. The result starts with a jump to the data
/// preamble; the preamble materializes every AUTO constant on the heap
/// and ends by jumping to the entry point.
pub fn link(units: Vec<TranslationUnit>) -> Result<Vec<Node>, LinkError> {
    let mut units = units;

    // pick the single entry point
    let mut entry_point = None;
    let mut entry_count = 0;
    for (index, unit) in units.iter_mut().enumerate() {
        unit.id = index.to_string();
        if let Some(entry) = &unit.entry_point {
            entry_count += 1;
            entry_point = Some(entry.clone());
        }
    }
    if entry_count > 1 {
        return Err(TooManyEntryPointsError { count: entry_count }.into());
    }

    let mut table = SymbolTable::new();
    let mut merged = TranslationUnit {
        entry_point: entry_point.clone(),
        ..TranslationUnit::default()
    };
    for unit in &units {
        merge(&mut merged, unit);
        table.collect(unit)?;
    }

    // every import and reference must be satisfied by now
    let unsolved = table.unsolved();
    if !unsolved.is_empty() {
        return Err(UndefinedSymbolsError {
            names: unsolved.join(", "),
        }
        .into());
    }

    let (constants, text) = solve_sizeof(&[], &merged.constants, merged.text)?;
    merged.constants = constants;
    merged.text = text;

    let preamble = solve_data(&mut merged);

    // layout: the preamble goes last, behind its label, and hands
    // control to the entry point when there is one
    let pre_index = merged.text.len();
    merged.text.push(Node::define(PRE_LABEL));
    merged.text.extend(preamble);
    if let Some(entry) = &entry_point {
        merged.text.push(Node::Op(Opcode::Jmp));
        merged.text.push(Node::reference(entry));
    }

    let (text, _) = solve_labels(&[], merged.text);

    // the initial jump occupies two cells, so the displacement to the
    // preamble label accounts for them; every other PC offset is
    // relative and survives the shift untouched
    let mut result = Vec::with_capacity(text.len() + 2);
    result.push(Node::Op(Opcode::Jmp));
    result.push(Node::Off(Offset::Pc(pre_index as i64 + 2)));
    result.extend(text);
    Ok(result)
}

/// Appends a source unit's text to the merged unit. Displacements are
/// relative, so nodes are copied unchanged; a defining label satisfies
/// any pending import of the same name.
fn merge(dst: &mut TranslationUnit, src: &TranslationUnit) {
    dst.imports.extend(src.imports.iter().cloned());
    for node in &src.text {
        if let Node::Label { define: true, name } = node {
            dst.imports.retain(|import| import != name);
        }
        dst.text.push(node.clone());
    }
    dst.exports.extend(src.exports.iter().cloned());
    dst.constants.extend(src.constants.iter().cloned());
}

/// Rewrites references to each AUTO constant as its future heap address
/// and builds the initialization preamble: `alloc len; pop r10;` then one
/// `store` per cell. Heap addresses are assigned in declaration order
/// from address 0, which is where `hp` starts at run time.
fn solve_data(unit: &mut TranslationUnit) -> Vec<Node> {
    let mut preamble = Vec::new();
    let mut hp: i64 = 0;
    for constant in &unit.constants {
        if constant.mode != DataMode::Auto {
            continue;
        }
        for node in &mut unit.text {
            if matches!(node, Node::Label { define: false, name } if *name == constant.name) {
                *node = Node::Int(hp);
            }
        }

        preamble.push(Node::Op(Opcode::Alloc));
        preamble.push(Node::Int(constant.values.len() as i64));
        preamble.push(Node::Op(Opcode::Pop));
        preamble.push(Node::Reg(Register::General(GeneralRegister::R10)));
        for (i, value) in constant.values.iter().enumerate() {
            preamble.push(Node::Op(Opcode::Store));
            preamble.push(Node::Int(hp + i as i64));
            preamble.push(match value {
                crate::mini_ir::ConstData::Char(c) => Node::Char(*c),
                crate::mini_ir::ConstData::Int(v) => Node::Int(*v),
            });
        }
        hp += constant.values.len() as i64;
    }
    preamble
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mini_front::node::{expand, InstrNode};
    use crate::mini_ir::parser::parse;
    use crate::mini_vm::code::Register::General;
    use crate::mini_vm::code::{GeneralRegister, Opcode};

    use GeneralRegister::{R0, R1};

    fn unit(entry: Option<&str>, exports: Vec<&str>, imports: Vec<&str>, text: Vec<Node>) -> TranslationUnit {
        TranslationUnit {
            id: String::new(),
            imports: imports.into_iter().map(String::from).collect(),
            exports: exports.into_iter().map(String::from).collect(),
            constants: Vec::new(),
            entry_point: entry.map(String::from),
            text: expand(text),
        }
    }

    fn instr(op: Opcode, args: Vec<Node>) -> Node {
        Node::Instr(InstrNode::new(op, args))
    }

    #[test]
    fn forward_jump() {
        let input = unit(
            Some("_start"),
            vec![],
            vec![],
            vec![
                Node::define("_start"),
                instr(Opcode::Jmp, vec![Node::reference("_target")]),
                Node::Op(Opcode::Nop),
                Node::Op(Opcode::Nop),
                Node::define("_target"),
                instr(Opcode::Mov, vec![Node::Reg(General(R0)), Node::Int(0)]),
            ],
        );
        let nodes = link(vec![input]).unwrap();
        assert_eq!(
            nodes,
            vec![
                Node::Op(Opcode::Jmp),
                Node::Off(Offset::Pc(11)), // to the preamble label
                Node::Op(Opcode::Nop),     // _start
                Node::Op(Opcode::Jmp),
                Node::Off(Offset::Pc(4)), // forward to _target
                Node::Op(Opcode::Nop),
                Node::Op(Opcode::Nop),
                Node::Op(Opcode::Nop), // _target
                Node::Op(Opcode::Mov),
                Node::Reg(General(R0)),
                Node::Int(0),
                Node::Op(Opcode::Nop), // _pre
                Node::Op(Opcode::Jmp),
                Node::Off(Offset::Pc(-10)), // back to _start
            ]
        );
    }

    #[test]
    fn backward_jump() {
        let input = unit(
            Some("_start"),
            vec![],
            vec![],
            vec![
                Node::define("_start"),
                Node::define("_loop"),
                instr(Opcode::Sub, vec![Node::Reg(General(R1)), Node::Int(1)]),
                instr(Opcode::Jnz, vec![Node::reference("_loop")]),
            ],
        );
        let nodes = link(vec![input]).unwrap();
        assert_eq!(
            nodes,
            vec![
                Node::Op(Opcode::Jmp),
                Node::Off(Offset::Pc(9)), // to the preamble label
                Node::Op(Opcode::Nop),    // _start
                Node::Op(Opcode::Nop),    // _loop
                Node::Op(Opcode::Sub),
                Node::Reg(General(R1)),
                Node::Int(1),
                Node::Op(Opcode::Jnz),
                Node::Off(Offset::Pc(-4)), // back to _loop
                Node::Op(Opcode::Nop),     // _pre
                Node::Op(Opcode::Jmp),
                Node::Off(Offset::Pc(-8)), // back to _start
            ]
        );
    }

    #[test]
    fn call_with_offset() {
        let input = unit(
            Some("_start"),
            vec![],
            vec![],
            vec![
                Node::define("_start"),
                instr(Opcode::Call, vec![Node::reference("_func")]),
                instr(Opcode::Ret, vec![]),
                Node::define("_func"),
                instr(Opcode::Mov, vec![Node::Reg(General(R0)), Node::Int(42)]),
                instr(Opcode::Ret, vec![]),
            ],
        );
        let nodes = link(vec![input]).unwrap();
        assert_eq!(
            nodes,
            vec![
                Node::Op(Opcode::Jmp),
                Node::Off(Offset::Pc(11)),
                Node::Op(Opcode::Nop), // _start
                Node::Op(Opcode::Call),
                Node::Off(Offset::Pc(3)), // to _func
                Node::Op(Opcode::Ret),
                Node::Op(Opcode::Nop), // _func
                Node::Op(Opcode::Mov),
                Node::Reg(General(R0)),
                Node::Int(42),
                Node::Op(Opcode::Ret),
                Node::Op(Opcode::Nop), // _pre
                Node::Op(Opcode::Jmp),
                Node::Off(Offset::Pc(-10)),
            ]
        );
    }

    #[test]
    fn multiple_jumps_to_the_same_target() {
        let input = unit(
            Some("_start"),
            vec![],
            vec![],
            vec![
                Node::define("_start"),
                instr(Opcode::Jmp, vec![Node::reference("_end")]),
                Node::Op(Opcode::Nop),
                instr(Opcode::Jmp, vec![Node::reference("_end")]),
                Node::Op(Opcode::Nop),
                Node::define("_end"),
                instr(Opcode::Ret, vec![]),
            ],
        );
        let nodes = link(vec![input]).unwrap();
        assert_eq!(
            nodes,
            vec![
                Node::Op(Opcode::Jmp),
                Node::Off(Offset::Pc(11)),
                Node::Op(Opcode::Nop), // _start
                Node::Op(Opcode::Jmp),
                Node::Off(Offset::Pc(6)),
                Node::Op(Opcode::Nop),
                Node::Op(Opcode::Jmp),
                Node::Off(Offset::Pc(3)),
                Node::Op(Opcode::Nop),
                Node::Op(Opcode::Nop), // _end
                Node::Op(Opcode::Ret),
                Node::Op(Opcode::Nop), // _pre
                Node::Op(Opcode::Jmp),
                Node::Off(Offset::Pc(-10)),
            ]
        );
    }

    #[test]
    fn cross_module_label_reference() {
        let library = unit(
            None,
            vec!["_func"],
            vec![],
            vec![
                Node::define("_func"),
                instr(Opcode::Mov, vec![Node::Reg(General(R0)), Node::Int(1)]),
                instr(Opcode::Ret, vec![]),
            ],
        );
        let main = unit(
            Some("_start"),
            vec![],
            vec!["_func"],
            vec![
                Node::define("_start"),
                instr(Opcode::Call, vec![Node::reference("_func")]),
                instr(Opcode::Ret, vec![]),
            ],
        );
        let nodes = link(vec![library, main]).unwrap();
        assert_eq!(
            nodes,
            vec![
                Node::Op(Opcode::Jmp),
                Node::Off(Offset::Pc(11)),
                Node::Op(Opcode::Nop), // _func
                Node::Op(Opcode::Mov),
                Node::Reg(General(R0)),
                Node::Int(1),
                Node::Op(Opcode::Ret),
                Node::Op(Opcode::Nop), // _start
                Node::Op(Opcode::Call),
                Node::Off(Offset::Pc(-6)), // back into the library
                Node::Op(Opcode::Ret),
                Node::Op(Opcode::Nop), // _pre
                Node::Op(Opcode::Jmp),
                Node::Off(Offset::Pc(-5)),
            ]
        );
    }

    #[test]
    fn two_entry_points_fail() {
        let a = unit(Some("_start"), vec![], vec![], vec![Node::define("_start")]);
        let b = unit(Some("_main"), vec![], vec![], vec![Node::define("_main")]);
        let err = link(vec![a, b]).unwrap_err();
        assert!(matches!(err, LinkError::TooManyEntryPoints(_)));
    }

    #[test]
    fn unresolved_reference_fails() {
        let input = unit(
            Some("_start"),
            vec![],
            vec![],
            vec![
                Node::define("_start"),
                instr(Opcode::Jmp, vec![Node::reference("_nowhere")]),
            ],
        );
        let err = link(vec![input]).unwrap_err();
        assert!(matches!(err, LinkError::UndefinedSymbols(_)));
    }

    #[test]
    fn unsatisfied_import_fails() {
        let input = unit(
            Some("_start"),
            vec![],
            vec!["printf"],
            vec![Node::define("_start")],
        );
        let err = link(vec![input]).unwrap_err();
        assert!(matches!(err, LinkError::UndefinedSymbols(_)));
    }

    #[test]
    fn auto_data_labels_resolve_to_heap_addresses() {
        let source = r#"
.section .data:
    num auto "A"

.section .text:
    global _start
_start:
    load r1 num
    store num r1
"#;
        let nodes = link(vec![parse(source).unwrap()]).unwrap();
        assert!(!nodes
            .iter()
            .any(|n| matches!(n, Node::Label { name, .. } if name == "num")));
        // both references collapse to the constant's base address 0
        let window: Vec<&Node> = nodes.iter().collect();
        assert!(window
            .windows(3)
            .any(|w| w[0] == &Node::Op(Opcode::Load)
                && w[1] == &Node::Reg(General(R1))
                && w[2] == &Node::Int(0)));
        assert!(window
            .windows(3)
            .any(|w| w[0] == &Node::Op(Opcode::Store)
                && w[1] == &Node::Int(0)
                && w[2] == &Node::Reg(General(R1))));
    }

    #[test]
    fn sizeof_resolves_in_linked_text() {
        let source = r#"
.section .data:
    arr auto "hi"
    sz sizeof arr

.section .text:
    global _start
_start:
    mov r1 sz
"#;
        let nodes = link(vec![parse(source).unwrap()]).unwrap();
        assert!(window_exists(
            &nodes,
            &[
                Node::Op(Opcode::Mov),
                Node::Reg(General(R1)),
                Node::Int(2),
            ]
        ));
        assert!(!nodes
            .iter()
            .any(|n| matches!(n, Node::Label { name, .. } if name == "sz")));
    }

    #[test]
    fn preamble_materializes_auto_constants() {
        let source = r#"
.section .data:
    data auto "AB"

.section .text:
    global _start
_start:
    nop
"#;
        let nodes = link(vec![parse(source).unwrap()]).unwrap();
        assert!(window_exists(
            &nodes,
            &[
                Node::Op(Opcode::Alloc),
                Node::Int(2),
                Node::Op(Opcode::Pop),
                Node::Reg(General(GeneralRegister::R10)),
            ]
        ));
        assert!(window_exists(
            &nodes,
            &[Node::Op(Opcode::Store), Node::Int(0), Node::Char('A')]
        ));
        assert!(window_exists(
            &nodes,
            &[Node::Op(Opcode::Store), Node::Int(1), Node::Char('B')]
        ));
    }

    #[test]
    fn consecutive_constants_get_consecutive_bases() {
        let source = r#"
.section .data:
    first auto "ab"
    second auto "cd"

.section .text:
    global _start
_start:
    mov r1 second
"#;
        let nodes = link(vec![parse(source).unwrap()]).unwrap();
        // second lives right after first on the heap
        assert!(window_exists(
            &nodes,
            &[Node::Op(Opcode::Mov), Node::Reg(General(R1)), Node::Int(2)]
        ));
        assert!(window_exists(
            &nodes,
            &[Node::Op(Opcode::Store), Node::Int(3), Node::Char('d')]
        ));
    }

    #[test]
    fn entry_jump_points_at_the_preamble() {
        let input = unit(
            Some("_start"),
            vec![],
            vec![],
            vec![Node::define("_start"), Node::Op(Opcode::Nop)],
        );
        let nodes = link(vec![input]).unwrap();
        // text is [nop nop], so the preamble label sits at index 2 and
        // the displacement includes the two prepended cells
        assert_eq!(nodes[0], Node::Op(Opcode::Jmp));
        assert_eq!(nodes[1], Node::Off(Offset::Pc(4)));
    }

    #[test]
    fn relinking_a_linked_library_only_prepends() {
        let input = unit(
            Some("_start"),
            vec![],
            vec![],
            vec![
                Node::define("_start"),
                instr(Opcode::Jmp, vec![Node::reference("_target")]),
                Node::Op(Opcode::Nop),
                Node::define("_target"),
                instr(Opcode::Ret, vec![]),
            ],
        );
        let linked = link(vec![input]).unwrap();
        let relinked = link(vec![unit(None, vec![], vec![], linked.clone())]).unwrap();
        // original offsets are untouched; the only additions are the new
        // entry jump in front and the new preamble label behind
        assert_eq!(relinked[2..2 + linked.len()], linked[..]);
        assert_eq!(relinked[0], Node::Op(Opcode::Jmp));
        assert_eq!(
            relinked[1],
            Node::Off(Offset::Pc(linked.len() as i64 + 2))
        );
        assert_eq!(relinked[relinked.len() - 1], Node::Op(Opcode::Nop));
    }

    #[test]
    fn offsets_commute_with_concatenation() {
        let first = || {
            unit(
                Some("_start"),
                vec![],
                vec![],
                vec![
                    Node::define("_start"),
                    Node::define("_loop"),
                    instr(Opcode::Sub, vec![Node::Reg(General(R1)), Node::Int(1)]),
                    instr(Opcode::Jnz, vec![Node::reference("_loop")]),
                ],
            )
        };
        let library = unit(
            None,
            vec!["_aux"],
            vec![],
            vec![Node::define("_aux"), instr(Opcode::Ret, vec![])],
        );
        let alone = link(vec![first()]).unwrap();
        let combined = link(vec![first(), library]).unwrap();
        // the first unit's instructions sit at the same place in both
        // outputs and their displacement values are identical
        let body = 7; // nop nop sub r1 1 jnz (-4)
        assert_eq!(alone[2..2 + body], combined[2..2 + body]);
    }

    fn window_exists(nodes: &[Node], pattern: &[Node]) -> bool {
        nodes.windows(pattern.len()).any(|w| w == pattern)
    }
}
