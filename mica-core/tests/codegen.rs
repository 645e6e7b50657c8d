mod harness;

use harness::{assemble, assert_contains_in_order, compile_src};
use mica_core::CoreError;

#[test]
fn globals_get_sequential_cells_from_address_one() {
    let asm = assemble("int x = 42; int y = x + 10;");
    assert_contains_in_order(
        &asm,
        &["push 42", "store 1", "load 1", "push 10", "add", "store 2", "halt"],
    );
}

#[test]
fn if_else_lowers_to_branch_on_zero() {
    let asm = assemble("int x = 1; if (x) { x = 2; } else { x = 3; }");
    assert_contains_in_order(
        &asm,
        &[
            "load 1", "jz L1", "push 2", "store 1", "jmp L2", "L1:", "push 3", "store 1",
            "L2:", "halt",
        ],
    );
}

#[test]
fn if_without_else_branches_straight_to_the_end() {
    let asm = assemble("int x = 1; if (x) { x = 2; }");
    assert_contains_in_order(&asm, &["load 1", "jz L1", "push 2", "store 1", "L1:"]);
    assert!(!asm.contains("jmp"), "no jump needed without an else arm:\n{asm}");
}

#[test]
fn while_loops_test_at_the_head() {
    let asm = assemble("int i = 0; while (i < 3) { i = i + 1; }");
    assert_contains_in_order(
        &asm,
        &[
            "L1:", "load 1", "push 3", "lt", "jz L2", "load 1", "push 1", "add", "store 1",
            "jmp L1", "L2:",
        ],
    );
}

#[test]
fn function_bodies_are_jumped_over_and_parameters_popped_in_reverse() {
    let asm = assemble("fn int add(int a, int b) { ret a + b; }; int r = add(5, 3);");
    assert_contains_in_order(
        &asm,
        &[
            "jmp L1",
            "fn_global_add:",
            // b sits on top of the stack, so it pops first.
            "rpop r0",
            "rstore r0 2",
            "rpop r1",
            "rstore r1 1",
            "rpush r1",
            "rpush r0",
            "add",
            "ret",
            "L1:",
            "push 5",
            "push 3",
            "call fn_global_add",
            "store 1",
            "halt",
        ],
    );
}

#[test]
fn cached_parameter_registers_reload_after_a_call() {
    let asm = assemble(
        "fn int id(int x) { ret x; };\n\
         fn int twice(int a) { int t = id(a); ret a + t; };",
    );
    assert_contains_in_order(&asm, &["call fn_global_id", "rload r0 1"]);
}

#[test]
fn layout_member_store_computes_base_plus_scaled_index_plus_offset() {
    let asm = assemble(
        "layout Point { int x; int y; };\n\
         ->Point pts = ~Point[3];\n\
         pts[0].x = 10;",
    );
    // base + 0 * sizeof(Point) + offset(x): value first, then the
    // address computation, then the indirect store.
    assert_contains_in_order(
        &asm,
        &[
            "push 10", "load 1", "push 0", "push 2", "mul", "add", "push 0", "add", "stind",
        ],
    );
}

#[test]
fn second_member_gets_a_nonzero_offset() {
    let asm = assemble(
        "layout Point { int x; int y; };\n\
         Point p;\n\
         p.y = 7;",
    );
    // p at cell 1, member y at offset 1.
    assert_contains_in_order(&asm, &["push 7", "push 1", "push 1", "add", "stind"]);
}

#[test]
fn block_scopes_reclaim_their_cells() {
    let asm = assemble("{ int a = 5; } { int b = 6; }");
    let stores = asm.lines().filter(|l| l.trim() == "store 1").count();
    assert_eq!(stores, 2, "both block locals should reuse cell 1:\n{asm}");
}

#[test]
fn array_allocation_reserves_cells_statically() {
    let asm = assemble("->int p = ~int[3]; int n = 7;");
    // p at 1, array backing at 2..4, so n lands at 5.
    assert_contains_in_order(&asm, &["push 2", "store 1", "push 7", "store 5"]);
}

#[test]
fn array_allocation_scales_by_layout_size() {
    let asm = assemble(
        "layout Pair { int a; int b; };\n\
         ->Pair ps = ~Pair[3];\n\
         int n = 1;",
    );
    // Backing store is 3 * sizeof(Pair) = 6 cells at 2..7.
    assert_contains_in_order(&asm, &["push 2", "store 1", "push 1", "store 8"]);
}

#[test]
fn dynamic_array_size_is_a_codegen_error() {
    let result = compile_src("int n = 2; ->int p = ~int[n];");
    match result {
        Err(CoreError::Codegen(message)) => {
            assert!(message.contains("array allocation size must be constant"));
        }
        other => panic!("expected a codegen error, got {other:?}"),
    }
}

#[test]
fn syscall_pushes_all_seven_arguments() {
    let asm = assemble("int x = syscall(1, 2, 3, 4, 5, 6, 7);");
    assert_contains_in_order(
        &asm,
        &[
            "push 1", "push 2", "push 3", "push 4", "push 5", "push 6", "push 7", "sys",
            "store 1",
        ],
    );
}

#[test]
fn expression_statements_discard_their_result() {
    let asm = assemble("fn int f() { ret 1; }; f();");
    assert_contains_in_order(&asm, &["call fn_global_f", "pop", "halt"]);
}

#[test]
fn string_literals_are_laid_down_nul_terminated() {
    let asm = assemble("->char msg = \"hi\";");
    assert_contains_in_order(
        &asm,
        &[
            "push 104", "store 2", "push 105", "store 3", "push 0", "store 4", "push 2",
            "store 1",
        ],
    );
}

#[test]
fn namespace_variables_stay_addressable_after_the_namespace_closes() {
    let asm = assemble("namespace cfg { int flag = 1; }; int x = cfg.flag;");
    assert_contains_in_order(&asm, &["push 1", "store 1", "load 1", "store 2"]);
}

#[test]
fn namespace_function_calls_use_the_qualified_entry_label() {
    let asm = assemble(
        "namespace math { fn int double(int x) { ret x + x; }; };\n\
         int r = math.double(21);",
    );
    assert_contains_in_order(
        &asm,
        &["fn_global_namespace_math_double:", "push 21", "call fn_global_namespace_math_double"],
    );
}

#[test]
fn casts_are_value_preserving_at_runtime() {
    let artifact = compile_src("int x = 65; char c = <char>(x);").expect("compiles");
    assert_eq!(artifact.warnings.len(), 1);
    assert_contains_in_order(
        &artifact.assembly,
        &["push 65", "store 1", "load 1", "store 2"],
    );
}

#[test]
fn store_through_a_pointer_uses_an_indirect_store() {
    let asm = assemble("int v = 1; ->int p = ->(v); <-p = 9;");
    // Address-of lowers to the variable's cell address; the write
    // goes value, then address, then stind.
    assert_contains_in_order(&asm, &["push 1", "store 1", "push 1", "store 2", "push 9", "load 2", "stind"]);
}

#[test]
fn dereference_read_loads_through_the_pointer() {
    let asm = assemble("int v = 1; ->int p = ->(v); int w = <-p;");
    assert_contains_in_order(&asm, &["load 2", "ldind", "store 3"]);
}

#[test]
fn layout_initializer_stores_member_by_member() {
    let asm = assemble("layout Point { int x; int y; }; Point p = { 4, 5 };");
    assert_contains_in_order(&asm, &["push 4", "store 1", "push 5", "store 2"]);
}

#[test]
fn functions_fall_back_to_returning_zero() {
    let asm = assemble("fn int f() { int x = 1; };");
    assert_contains_in_order(&asm, &["fn_global_f:", "push 1", "store 1", "push 0", "ret"]);
}
