mod harness;

use harness::{assert_accepts, assert_rejects, check, error_messages};
use mica_core::diagnostic::Severity;
use mica_core::symbols::SymbolKind;
use mica_core::types::SemType;

#[test]
fn undefined_identifier_is_reported() {
    assert_rejects("int x = y + 10;", "Undefined identifier 'y'");
}

#[test]
fn one_undefined_name_produces_exactly_one_diagnostic() {
    // Error types absorb: the bad operand must not cascade into
    // arithmetic or initialization diagnostics.
    let errors = error_messages("int x = y + 10;");
    assert_eq!(errors.len(), 1, "got: {errors:?}");
}

#[test]
fn uninitialized_read_is_reported() {
    assert_rejects("int x; int y = x + 10;", "Use of uninitialized variable 'x'");
}

#[test]
fn assignment_initializes_without_a_read_error() {
    assert_accepts("int x; x = 5; int y = x;");
}

#[test]
fn duplicate_declaration_in_scope_is_reported() {
    assert_rejects("int x = 1; int x = 2;", "already declared in current scope");
}

#[test]
fn shadowing_in_a_nested_block_is_legal() {
    assert_accepts("int x = 1; { int x = 2; int y = x; }");
}

#[test]
fn arithmetic_requires_numeric_operands() {
    assert_rejects(
        "->int p = ~int[2]; int x = p + 1;",
        "Arithmetic operators require numeric types",
    );
}

#[test]
fn arithmetic_widens_char_to_int() {
    assert_accepts("char c = 'a'; int x = c + 1;");
    // And the reverse direction narrows, which is not implicit.
    assert_rejects(
        "char c = 'a'; int x = 1; char d = c + x;",
        "Type mismatch in variable initialization",
    );
}

#[test]
fn comparisons_yield_int() {
    assert_accepts("int x = 1; int y = x < 2;");
}

#[test]
fn incompatible_comparison_is_reported() {
    assert_rejects(
        "->int p = ~int[2]; int x = 1; int b = p == x;",
        "Cannot compare incompatible types",
    );
}

#[test]
fn char_compared_to_string_literal_gets_a_targeted_error() {
    assert_rejects(
        "char c = 'a'; int b = c == \"a\";",
        "Cannot compare char with string literal",
    );
}

#[test]
fn string_literal_initializes_char_pointer() {
    assert_accepts("->char msg = \"hello\";");
}

#[test]
fn string_literal_to_plain_char_is_an_error() {
    assert_rejects(
        "char c = \"x\";",
        "Cannot assign string literal to single char variable",
    );
}

#[test]
fn function_call_checks_arity() {
    assert_rejects(
        "fn int add(int a, int b) { ret a + b; }; int r = add(5);",
        "expects 2 arguments, got 1",
    );
}

#[test]
fn function_call_checks_argument_types() {
    assert_rejects(
        "fn int deref(->int p) { ret <-p; }; int r = deref(5);",
        "Argument 1 type mismatch",
    );
}

#[test]
fn recursion_resolves_through_the_forward_symbol() {
    assert_accepts(
        "fn int fact(int n) { if (n <= 1) { ret 1; } ret n * fact(n - 1); };",
    );
}

#[test]
fn return_type_is_checked() {
    assert_rejects(
        "fn int f() { ->int p = ~int[1]; ret p; };",
        "Return type mismatch",
    );
}

#[test]
fn return_outside_function_is_reported() {
    assert_rejects("ret 1;", "Return statement outside of function");
}

#[test]
fn syscall_arity_is_exactly_seven() {
    assert_rejects(
        "int x = syscall(0, 1, 2, 3, 4, 5);",
        "syscall expects exactly 7 arguments",
    );
    assert_accepts("int x = syscall(0, 1, 2, 3, 4, 5, 6);");
}

#[test]
fn layout_self_reference_sees_the_complete_layout() {
    let checked = check("layout Node { int data; ->Node next; };");
    assert!(checked.diagnostics.is_empty(), "{:?}", checked.diagnostics);

    let node = checked.table.find("Node").expect("Node symbol");
    assert_eq!(node.kind, SymbolKind::Layout);
    assert_eq!(node.fqdn, "global::Node");

    let SemType::Layout { members, .. } = &node.ty else {
        panic!("expected layout type");
    };
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].name, "data");
    assert_eq!(members[0].ty, SemType::Int);
    assert_eq!(members[1].name, "next");
    let SemType::Pointer(points_to) = &members[1].ty else {
        panic!("expected pointer member");
    };
    let SemType::Layout { fqdn, .. } = points_to.as_ref() else {
        panic!("expected pointer to layout");
    };
    assert_eq!(fqdn, "global::Node");
}

#[test]
fn member_access_through_self_referential_pointer_resolves() {
    assert_accepts(
        "layout Node { int data; ->Node next; };\n\
         Node n;\n\
         n.data = 1;\n\
         ->Node p = ->(n);\n\
         int d = (<-p).data;",
    );
}

#[test]
fn member_access_requires_a_layout() {
    assert_rejects("int x = 1; int y = x.field;", "Member access requires layout type");
}

#[test]
fn unknown_member_is_reported_with_the_layout_name() {
    assert_rejects(
        "layout Point { int x; }; Point p; int z = p.z;",
        "Layout 'global::Point' has no member 'z'",
    );
}

#[test]
fn pointer_to_layout_auto_dereferences_on_member_access() {
    assert_accepts(
        "layout Point { int x; int y; }; ->Point p = ~Point[1]; p.x = 3; int v = p.x;",
    );
}

#[test]
fn layout_variables_are_initialized_by_declaration() {
    assert_accepts("layout Point { int x; }; Point p; p.x = 1; int v = p.x;");
}

#[test]
fn layout_initializer_checks_member_count() {
    assert_rejects(
        "layout Point { int x; int y; }; Point p = { 1 };",
        "has 2 members",
    );
}

#[test]
fn layout_initializer_checks_member_types() {
    assert_rejects(
        "layout Box { ->char p; }; Box b = { ~int[1] };",
        "Type mismatch in layout initialization for member 'p'",
    );
}

#[test]
fn layout_initializer_accepts_matching_values() {
    assert_accepts("layout Point { int x; int y; }; Point p = { 1, 2 };");
}

#[test]
fn dereference_requires_a_pointer() {
    assert_rejects("int x = 1; int y = <-x;", "Dereference operator requires pointer type");
}

#[test]
fn array_access_requires_pointer_or_array() {
    assert_rejects("int x = 1; int y = x[0];", "Array access requires pointer/array type");
}

#[test]
fn array_size_must_be_numeric() {
    assert_rejects(
        "->char s = \"ab\"; ->int p = ~int[s];",
        "Array size must be numeric",
    );
}

#[test]
fn cast_between_numeric_and_pointer_is_legal() {
    assert_accepts("->int p = <->int>(4096); int addr = <int>(p);");
}

#[test]
fn cast_from_layout_is_rejected() {
    assert_rejects(
        "layout Point { int x; }; Point p; int v = <int>(p);",
        "Type cast only supported between numeric types",
    );
}

#[test]
fn narrowing_cast_warns_but_does_not_fail() {
    let checked = check("int x = 300; char c = <char>(x);");
    let warnings: Vec<_> = checked
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Warning)
        .collect();
    let errors: Vec<_> = checked
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .collect();
    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("Possible data loss"));
}

#[test]
fn namespace_function_calls_resolve_through_the_namespace_scope() {
    assert_accepts(
        "namespace math { fn int double(int x) { ret x + x; }; };\n\
         int r = math.double(21);",
    );
}

#[test]
fn undefined_function_in_namespace_is_reported() {
    assert_rejects(
        "namespace math { fn int double(int x) { ret x + x; }; };\n\
         int r = math.triple(21);",
        "Undefined function 'triple' in namespace 'math'",
    );
}

#[test]
fn namespace_variables_are_reachable_by_qualified_access() {
    assert_accepts("namespace cfg { int flag = 1; }; int x = cfg.flag;");
}

#[test]
fn namespace_qualified_layout_types_resolve() {
    assert_accepts(
        "namespace geo { layout P { int x; int y; }; };\n\
         fn int getx(->geo.P p) { ret p.x; };",
    );
}

#[test]
fn analysis_leaves_exactly_the_global_scope_active() {
    let checked = check(
        "int g = 1;\n\
         fn int f(int a) { int b = a; ret b; };\n\
         namespace n { int v = 2; };",
    );
    assert!(checked.diagnostics.is_empty(), "{:?}", checked.diagnostics);
    assert_eq!(checked.table.active_scopes().len(), 1);
    assert_eq!(checked.table.active_scopes()[0].name, "global");
    // Function, block and namespace scopes are archived, not dropped.
    assert!(checked.table.archived_scopes().len() >= 3);
}

#[test]
fn fqdns_are_unique_across_all_scopes() {
    let checked = check(
        "int g = 1;\n\
         layout Point { int x; int y; };\n\
         fn int f(int a) { int b = a; ret b; };\n\
         fn int h(int a) { int b = a; ret b; };\n\
         namespace n { int v = 2; fn int get() { ret v; }; };",
    );
    assert!(checked.diagnostics.is_empty(), "{:?}", checked.diagnostics);

    let mut fqdns: Vec<String> = checked
        .table
        .all_scopes()
        .flat_map(|s| s.symbols.values().map(|sym| sym.fqdn.clone()))
        .collect();
    let total = fqdns.len();
    fqdns.sort();
    fqdns.dedup();
    assert_eq!(total, fqdns.len(), "duplicate FQDNs: {fqdns:?}");
}

#[test]
fn compatibility_laws_hold() {
    let int = SemType::Int;
    let ch = SemType::Char;
    let int_ptr = SemType::pointer(SemType::Int);
    let char_ptr = SemType::pointer(SemType::Char);
    let point_a = SemType::Layout {
        fqdn: "global::Point".into(),
        members: Vec::new(),
    };
    let point_b = SemType::Layout {
        fqdn: "global::namespace_geo::Point".into(),
        members: Vec::new(),
    };

    // Reflexive on non-error types.
    for ty in [&int, &ch, &int_ptr, &point_a] {
        assert!(ty.is_compatible_with(ty));
    }
    // int accepts char, not conversely.
    assert!(int.is_compatible_with(&ch));
    assert!(!ch.is_compatible_with(&int));
    // Pointer compatibility is congruent on pointee types.
    assert!(int_ptr.is_compatible_with(&char_ptr));
    assert!(!char_ptr.is_compatible_with(&int_ptr));
    // Layout compatibility is FQDN equality.
    assert!(!point_a.is_compatible_with(&point_b));
    // Error absorbs both ways.
    assert!(SemType::Error.is_compatible_with(&int));
    assert!(int.is_compatible_with(&SemType::Error));
}
