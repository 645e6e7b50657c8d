mod harness;

use harness::{assert_accepts, assert_rejects, assemble, check, compile_src};
use mica_core::types::SemType;

#[test]
fn initialized_globals_flow_through_arithmetic() {
    let source = "int x = 42; int y = x + 10;";
    assert_accepts(source);

    let checked = check(source);
    let x = checked.table.find("x").expect("x is declared");
    assert_eq!(x.fqdn, "global::x");
    assert_eq!(x.ty, SemType::Int);
    assert!(x.initialized);

    // Executing the emitted code would leave 52 in y's cell: 42 is
    // stored, reloaded, and 10 added before the second store.
    let asm = assemble(source);
    harness::assert_contains_in_order(
        &asm,
        &["push 42", "store 1", "load 1", "push 10", "add", "store 2"],
    );
}

#[test]
fn reading_an_unknown_name_fails() {
    assert_rejects("int x = y + 10;", "Undefined identifier 'y'");
}

#[test]
fn functions_compile_and_get_called() {
    let source = "fn int add(int a, int b) { ret a + b; }; int r = add(5, 3);";
    assert_accepts(source);
    let asm = assemble(source);
    harness::assert_contains_in_order(
        &asm,
        &["push 5", "push 3", "call fn_global_add", "store 1"],
    );
}

#[test]
fn self_referential_layout_declares_cleanly() {
    let source = "layout Node { int data; ->Node next; };";
    assert_accepts(source);

    let checked = check(source);
    let node = checked.table.find("Node").expect("Node is declared");
    let SemType::Layout { fqdn, members } = &node.ty else {
        panic!("expected a layout type");
    };
    assert_eq!(fqdn, "global::Node");
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].ty, SemType::Int);
    assert!(
        matches!(&members[1].ty, SemType::Pointer(p)
            if matches!(p.as_ref(), SemType::Layout { fqdn, .. } if fqdn == "global::Node")),
        "second member should point back at the layout"
    );
}

#[test]
fn short_syscalls_are_rejected() {
    assert_rejects(
        "syscall(0, 1, 2, 3, 4, 5);",
        "syscall expects exactly 7 arguments",
    );
}

#[test]
fn uninitialized_reads_are_rejected() {
    assert_rejects("int x; int y = x + 10;", "Use of uninitialized variable 'x'");
}

#[test]
fn layout_array_element_member_store_hits_the_right_cell() {
    let source = "layout Point { int x; int y; };\n\
                  ->Point pts = ~Point[3];\n\
                  pts[0].x = 10;";
    assert_accepts(source);
    let asm = assemble(source);
    harness::assert_contains_in_order(
        &asm,
        &["push 10", "load 1", "push 0", "push 2", "mul", "add", "push 0", "add", "stind"],
    );
}

#[test]
fn warnings_do_not_block_code_generation() {
    let artifact = compile_src("int x = 300; char c = <char>(x);").expect("warnings are non-fatal");
    assert_eq!(artifact.warnings.len(), 1);
    assert!(artifact.warnings[0].message.contains("Possible data loss"));
    assert!(artifact.assembly.contains("halt"));
}

#[test]
fn analysis_continues_past_parse_errors() {
    // The broken first statement becomes a parse diagnostic; the
    // partial AST still reaches the analyzer, which reports the
    // undefined name in the second statement.
    let checked = check("int x = ;\nint y = q;");
    assert!(checked
        .diagnostics
        .iter()
        .any(|d| d.message.contains("Error in variable initialization")));
    assert!(checked
        .diagnostics
        .iter()
        .any(|d| d.message.contains("Undefined identifier 'q'")));
}

#[test]
fn erroneous_programs_do_not_reach_codegen() {
    match compile_src("int x = y;") {
        Err(mica_core::CoreError::Diagnostics(diags)) => {
            assert!(!diags.is_empty());
        }
        other => panic!("expected diagnostics, got {other:?}"),
    }
}
