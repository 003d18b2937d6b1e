//! Debug utilities for the SSA graph
//!
//! Textual dumps of methods and blocks, and Graphviz renderings of the CFG
//! and of the dominator tree. Each block becomes a cluster with invisible
//! `start`/`end` anchors so edges attach to the cluster borders.

use super::dominator::DominatorTree;
use super::ir::{Block, BlockKind, InstructionKind, MethodId, Program, ValueId};
use std::fmt::Write;

/// Render the whole program in human-readable form
pub fn dump_program(program: &Program) -> String {
    let mut out = String::new();
    for method in &program.methods {
        let _ = writeln!(
            out,
            "method {} ({:?}, {} param(s))",
            method.name, method.kind, method.arity
        );
        for block in program.method_blocks(method.id) {
            out.push_str(&dump_block(program, block));
        }
        out.push('\n');
    }
    out
}

/// Render one block: header line, edges, then one instruction per line
pub fn dump_block(program: &Program, block: &Block) -> String {
    let mut out = String::new();
    let dominator = block
        .dominator
        .map(|d| d.to_string())
        .unwrap_or_else(|| "-".to_string());
    let _ = writeln!(
        out,
        "  {}: preds [{}] succs [{}] idom {}",
        block.label(),
        join_ids(&block.predecessors),
        join_ids(&block.successors),
        dominator
    );
    for value in block.all_instructions() {
        let _ = writeln!(out, "    {}", format_instruction(program, value));
    }
    out
}

/// Format a single instruction as `vN = mnemonic operands`
pub fn format_instruction(program: &Program, value: ValueId) -> String {
    let instruction = program.instruction(value);
    let body = match &instruction.kind {
        InstructionKind::Const(n) => format!("const {}", n),
        InstructionKind::Param { name, index } => format!("param #{} {}", index, name),
        InstructionKind::Phi { variable, operands } => {
            let args: Vec<String> = operands
                .iter()
                .map(|(block, value)| format!("[{}: {}]", block, value))
                .collect();
            format!("phi {} {}", variable, args.join(" "))
        }
        InstructionKind::Compute { op, lhs, rhs } => format!("{} {} {}", op, lhs, rhs),
        InstructionKind::Compare { op, lhs, rhs } => format!("cmp.{} {} {}", op, lhs, rhs),
        InstructionKind::LoadGlobal { name } => format!("ldg {}", name),
        InstructionKind::StoreGlobal { name, value } => format!("stg {} {}", name, value),
        InstructionKind::DeclareArray { name, dimensions } => {
            let dims: Vec<String> = dimensions.iter().map(|d| format!("[{}]", d)).collect();
            format!("array {}{}", name, dims.concat())
        }
        InstructionKind::ArrayBase { name } => format!("base {}", name),
        InstructionKind::Index { base, offset } => format!("adda {} {}", base, offset),
        InstructionKind::Load { address } => format!("load {}", address),
        InstructionKind::Store { address, value } => format!("store {} {}", address, value),
        InstructionKind::Call { callee, arguments } => {
            let args: Vec<String> = arguments.iter().map(|a| a.to_string()).collect();
            format!("call {}({})", callee, args.join(", "))
        }
        InstructionKind::Read => "read".to_string(),
        InstructionKind::Write { value } => format!("write {}", value),
        InstructionKind::WriteLine => "writeNL".to_string(),
        InstructionKind::Branch {
            condition,
            on_true,
            on_false,
        } => format!("br {} {} {}", condition, on_true, on_false),
        InstructionKind::Jump { target } => format!("bra {}", target),
        InstructionKind::Return { value: Some(v) } => format!("ret {}", v),
        InstructionKind::Return { value: None } => "ret".to_string(),
    };

    if instruction.kind.has_value() {
        format!("{} = {}", value, body)
    } else {
        format!("{}: {}", value, body)
    }
}

/// Graphviz rendering of a method's CFG
pub fn method_to_dot(program: &Program, method: MethodId) -> String {
    let name = &program.method(method).name;
    let mut out = format!("digraph {} {{\n  compound=true;\n", name);
    for block in program.method_blocks(method) {
        out.push_str(&block_cluster(program, block));
    }
    for block in program.method_blocks(method) {
        for succ in &block.successors {
            out.push_str(&cluster_edge(block.id.0, succ.0));
        }
    }
    out.push_str("}\n");
    out
}

/// Graphviz rendering of a method's dominator tree
pub fn dominator_tree_to_dot(program: &Program, method: MethodId) -> String {
    let name = &program.method(method).name;
    let tree = DominatorTree::build(program, method);
    let mut out = format!("digraph {}_dominator_tree {{\n  compound=true;\n", name);
    for block in program.method_blocks(method) {
        out.push_str(&block_cluster(program, block));
    }
    for (parent, child) in tree.edges() {
        out.push_str(&cluster_edge(parent.0, child.0));
    }
    out.push_str("}\n");
    out
}

fn block_cluster(program: &Program, block: &Block) -> String {
    let id = block.id.0;
    let mut lines = Vec::new();
    if let BlockKind::Entry { parameters } = &block.kind {
        if !parameters.is_empty() {
            lines.push(format!("params {}", join_ids(parameters)));
        }
    }
    lines.extend(
        block
            .all_instructions()
            .map(|v| escape(&format_instruction(program, v))),
    );

    let mut out = String::new();
    let _ = writeln!(out, "  subgraph cluster{} {{", id);
    let _ = writeln!(out, "    label=\"{}\";", block.label());
    let _ = writeln!(out, "    \"start{}\" [shape=point style=invis];", id);
    let _ = writeln!(
        out,
        "    \"body{}\" [shape=box label=\"{}\\l\"];",
        id,
        lines.join("\\l")
    );
    let _ = writeln!(out, "    \"end{}\" [shape=point style=invis];", id);
    let _ = writeln!(out, "    \"start{}\" -> \"body{}\" -> \"end{}\" [style=invis];", id, id, id);
    out.push_str("  }\n");
    out
}

fn cluster_edge(from: u32, to: u32) -> String {
    format!(
        "  \"end{}\" -> \"start{}\" [ltail=cluster{} lhead=cluster{}];\n",
        from, to, from, to
    )
}

fn join_ids<T: std::fmt::Display>(ids: &[T]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn escape(text: &str) -> String {
    text.replace('"', "\\\"")
}
