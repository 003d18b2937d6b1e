/// End-to-end tests for SSA construction
/// Source → Scanner → SsaParser, inspecting the resulting graph
use pl241_ssa::compiler::dominator::dominates;
use pl241_ssa::compiler::ir::{Block, ComputeOp, InstructionKind, Method, Program, ValueId};
use pl241_ssa::compiler::verifier::verify;

const NESTED: &str = r#"
main
var i, j, s;
array[4][4] m;

function sum(n);
var k, t;
{
    let k <- 0;
    let t <- 0;
    while k < n do
        let t <- t + k;
        let k <- k + 1
    od;
    return t
};

procedure show(v);
{
    if v < 0 then call OutputNum(0 - v) else call OutputNum(v) fi;
    call OutputNewLine
};

{
    let i <- 0;
    while i < 4 do
        let j <- 0;
        while j < 4 do
            let m[i][j] <- i * j;
            let j <- j + 1
        od;
        let i <- i + 1
    od;
    let s <- call sum(m[3][3]);
    call show(s)
}.
"#;

fn build(source: &str) -> Program {
    let output = pl241_ssa::parse(source).unwrap();
    assert!(
        output.diagnostics.is_empty(),
        "unexpected diagnostics: {:?}",
        output.diagnostics
    );
    output.program
}

fn main_method(program: &Program) -> &Method {
    program.main().unwrap()
}

fn blocks<'a>(program: &'a Program, method: &Method) -> Vec<&'a Block> {
    program.method_blocks(method.id).collect()
}

fn find_write(program: &Program, method: &Method) -> ValueId {
    program
        .method_blocks(method.id)
        .flat_map(|b| b.instructions.iter().copied())
        .find_map(|v| match program.instruction(v).kind {
            InstructionKind::Write { value } => Some(value),
            _ => None,
        })
        .unwrap()
}

#[test]
fn test_if_else_places_phi() {
    let program = build(
        "main var x; { let x <- 1; if x == 1 then let x <- 2 else let x <- 3 fi; call OutputNum(x) } .",
    );
    let main = main_method(&program);

    let joins: Vec<_> = blocks(&program, main)
        .into_iter()
        .filter(|b| b.is_join())
        .collect();
    assert_eq!(joins.len(), 1);
    let join = joins[0];
    assert_eq!(join.phis.len(), 1);

    let phi = join.phis[0];
    let InstructionKind::Phi { variable, operands } = &program.instruction(phi).kind else {
        panic!("phi expected");
    };
    assert_eq!(variable, "x");
    assert_eq!(operands.len(), 2);
    assert_eq!(operands[0].0, join.predecessors[0]);
    assert_eq!(operands[1].0, join.predecessors[1]);
    assert_eq!(program.constant(operands[0].1), Some(2));
    assert_eq!(program.constant(operands[1].1), Some(3));

    assert_eq!(find_write(&program, main), phi);
}

#[test]
fn test_if_join_dominated_by_branch_block() {
    let program = build(
        "main var x; { let x <- call InputNum(); if x > 0 then let x <- 2 else let x <- 3 fi; call OutputNum(x) } .",
    );
    let main = main_method(&program);

    let branch = blocks(&program, main)
        .into_iter()
        .find(|b| {
            b.last_instruction()
                .map(|v| matches!(program.instruction(v).kind, InstructionKind::Branch { .. }))
                .unwrap_or(false)
        })
        .unwrap();
    let join = blocks(&program, main)
        .into_iter()
        .find(|b| b.is_join())
        .unwrap();

    assert_eq!(join.dominator, Some(branch.id));
    for succ in &branch.successors {
        assert_eq!(program.block(*succ).dominator, Some(branch.id));
    }
}

#[test]
fn test_join_reached_only_from_else_is_dominated_by_else_arm() {
    let program = build(
        "main var x; function f(a); { if a > 0 then return 1 else let a <- a + 1 fi; return a }; { let x <- call f(3); call OutputNum(x) } .",
    );
    let f = program.method_by_name("f").unwrap();
    let join = program.method_blocks(f.id).find(|b| b.is_join()).unwrap();

    assert_eq!(join.predecessors.len(), 1);
    assert!(join.phis.is_empty());

    let else_arm = join.predecessors[0];
    let branch = program.block(else_arm).dominator.unwrap();
    let InstructionKind::Branch { on_false, .. } =
        program.instruction(program.block(branch).last_instruction().unwrap()).kind
    else {
        panic!("branch expected");
    };
    assert_eq!(on_false, else_arm);
    assert_eq!(join.dominator, Some(else_arm));

    let verification = verify(&program);
    assert!(verification.valid, "{:?}", verification.errors);
}

#[test]
fn test_unchanged_variable_gets_no_phi() {
    let program = build(
        "main var x, y; { let x <- call InputNum(); if x > 0 then let y <- 5 fi; call OutputNum(x); call OutputNum(y) } .",
    );
    let main = main_method(&program);
    let join = blocks(&program, main)
        .into_iter()
        .find(|b| b.is_join())
        .unwrap();

    let variables: Vec<_> = join
        .phis
        .iter()
        .map(|p| match &program.instruction(*p).kind {
            InstructionKind::Phi { variable, .. } => variable.clone(),
            _ => String::new(),
        })
        .collect();
    assert_eq!(variables, vec!["y".to_string()]);
}

#[test]
fn test_loop_carried_phi() {
    let program = build(
        "main var x; { let x <- 0; while x < 10 do let x <- x + 1 od; call OutputNum(x) } .",
    );
    let main = main_method(&program);

    let header = blocks(&program, main)
        .into_iter()
        .find(|b| b.is_loop_header())
        .unwrap();
    assert_eq!(header.phis.len(), 1);
    assert_eq!(header.predecessors.len(), 2);

    let phi = header.phis[0];
    let InstructionKind::Phi { operands, .. } = &program.instruction(phi).kind else {
        panic!("phi expected");
    };
    let (entry_edge, initial) = operands[0];
    let (back_edge, next) = operands[1];
    assert_eq!(entry_edge, header.predecessors[0]);
    assert_eq!(back_edge, header.predecessors[1]);
    assert_eq!(program.constant(initial), Some(0));

    let InstructionKind::Compute {
        op: ComputeOp::Add,
        lhs,
        rhs,
    } = program.instruction(next).kind
    else {
        panic!("x + 1 expected on the back edge");
    };
    assert_eq!(lhs, phi);
    assert_eq!(program.constant(rhs), Some(1));

    // The loop exit sees the header binding.
    assert_eq!(find_write(&program, main), phi);
}

#[test]
fn test_loop_blocks_dominated_by_header() {
    let program = build(
        "main var x; { let x <- 0; while x < 10 do let x <- x + 1 od; call OutputNum(x) } .",
    );
    let main = main_method(&program);
    let header = blocks(&program, main)
        .into_iter()
        .find(|b| b.is_loop_header())
        .unwrap();

    assert_eq!(header.successors.len(), 2);
    for succ in &header.successors {
        assert_eq!(program.block(*succ).dominator, Some(header.id));
    }
    assert_eq!(header.dominator, Some(header.predecessors[0]));
}

#[test]
fn test_array_offset_is_flattened() {
    let source = "main array[2][3] a; var y; { let a[1][2] <- 7; let y <- a[1][2]; call OutputNum(y) } .";

    let program = build(source);
    let main = main_method(&program);
    let index = program
        .method_blocks(main.id)
        .flat_map(|b| b.instructions.iter().copied())
        .find(|v| matches!(program.instruction(*v).kind, InstructionKind::Index { .. }))
        .unwrap();
    let InstructionKind::Index { offset, .. } = program.instruction(index).kind else {
        unreachable!();
    };
    let InstructionKind::Compute {
        op: ComputeOp::Add,
        lhs,
        rhs,
    } = program.instruction(offset).kind
    else {
        panic!("offset must be a sum");
    };
    assert!(matches!(
        program.instruction(lhs).kind,
        InstructionKind::Compute {
            op: ComputeOp::Mul,
            ..
        }
    ));
    assert_eq!(program.constant(rhs), Some(2));

    // After folding both accesses address element 5.
    let result = pl241_ssa::compile(source).unwrap();
    let program = result.program;
    let offsets: Vec<_> = program
        .instructions()
        .filter(|i| i.block.is_some())
        .filter_map(|i| match i.kind {
            InstructionKind::Index { offset, .. } => program.constant(offset),
            _ => None,
        })
        .collect();
    assert_eq!(offsets, vec![5, 5]);
}

#[test]
fn test_function_with_two_returns_merges_at_exit() {
    let program = build(
        "main var x; function f(a); { if a > 0 then return 1 else return 2 fi }; { let x <- call f(3); call OutputNum(x) } .",
    );
    let f = program.method_by_name("f").unwrap();
    let exit = program.block(f.exit.unwrap());

    assert_eq!(exit.predecessors.len(), 2);
    assert_eq!(exit.phis.len(), 1);
    let phi = exit.phis[0];
    let InstructionKind::Phi { variable, operands } = &program.instruction(phi).kind else {
        panic!("phi expected");
    };
    assert_eq!(variable, "return");
    let constants: Vec<_> = operands
        .iter()
        .map(|(_, v)| program.constant(*v))
        .collect();
    assert_eq!(constants, vec![Some(1), Some(2)]);

    let ret = program.instruction(exit.last_instruction().unwrap());
    assert_eq!(ret.kind, InstructionKind::Return { value: Some(phi) });

    // Both arms hang off the branch block, which dominates the exit.
    let branch = program.block(exit.predecessors[0]).dominator.unwrap();
    assert_eq!(exit.dominator, Some(branch));
    // The join nobody reaches is gone.
    assert!(program.method_blocks(f.id).all(|b| !b.is_join()));
}

#[test]
fn test_phi_arity_matches_predecessors() {
    let program = build(NESTED);

    for method in &program.methods {
        for block in program.method_blocks(method.id) {
            for phi in &block.phis {
                let InstructionKind::Phi { operands, .. } = &program.instruction(*phi).kind else {
                    panic!("phi list holds a non-phi");
                };
                let sources: Vec<_> = operands.iter().map(|(b, _)| *b).collect();
                assert_eq!(sources, block.predecessors, "{} in {}", phi, method.name);
            }
        }
    }
}

#[test]
fn test_every_block_dominated_by_entry() {
    let program = build(NESTED);

    for method in &program.methods {
        let entry = program.block(method.entry);
        assert!(entry.predecessors.is_empty());
        assert_eq!(entry.dominator, None);
        for block in program.method_blocks(method.id) {
            assert!(dominates(&program, method.entry, block.id));
            if let Some(dominator) = block.dominator {
                assert_eq!(program.block(dominator).method, method.id);
            }
        }
        assert!(program.block(method.exit.unwrap()).successors.is_empty());
    }
}

#[test]
fn test_nested_program_verifies() {
    let program = build(NESTED);
    let result = verify(&program);
    assert!(result.valid, "{:?}", result.errors);
    assert!(result.warnings.is_empty());
    assert_eq!(result.stats.method_count, 3);

    let compiled = pl241_ssa::compile(NESTED).unwrap();
    assert!(verify(&compiled.program).valid);
    assert!(compiled.fold_stats.folded >= 2);
}

#[test]
fn test_dominator_tree_covers_method() {
    let mut program = build(NESTED);
    let sum = program.method_by_name("sum").unwrap();
    let (id, count) = (sum.id, sum.blocks.len());

    let tree = program.dominator_tree(id);
    assert_eq!(tree.preorder().len(), count);
}
