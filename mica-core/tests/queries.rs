use mica_core::queries::{definition_of, diagnostics, hover, references_to};

const SOURCE: &str = "int value = 1;\nint other = value + 2;\nvalue = other;\n";

#[test]
fn definition_resolves_to_the_declaration_site() {
    // The `value` read on line 2 starts at column 13.
    let locations = definition_of(SOURCE, "<test>", 2, 13);
    assert_eq!(locations.len(), 1);
    assert_eq!(locations[0].line, 1);
    assert_eq!(locations[0].column, 5);
    assert_eq!(locations[0].length, 5);
}

#[test]
fn definition_inside_a_token_span_also_hits() {
    // Column 15 is in the middle of the same identifier.
    let locations = definition_of(SOURCE, "<test>", 2, 15);
    assert_eq!(locations.len(), 1);
    assert_eq!(locations[0].line, 1);
}

#[test]
fn definition_of_a_non_identifier_is_empty() {
    // Column 11 on line 1 is the `=`.
    assert!(definition_of(SOURCE, "<test>", 1, 11).is_empty());
    // Nowhere near a token at all.
    assert!(definition_of(SOURCE, "<test>", 9, 1).is_empty());
}

#[test]
fn references_match_by_token_text() {
    let locations = references_to(SOURCE, "<test>", 2, 13);
    assert_eq!(locations.len(), 3);
    assert_eq!(locations[0].line, 1);
    assert_eq!(locations[1].line, 2);
    assert_eq!(locations[2].line, 3);
}

#[test]
fn hover_reports_kind_type_and_scope() {
    let text = hover(SOURCE, "<test>", 2, 13).expect("hover hit");
    assert!(text.contains("**value**"));
    assert!(text.contains("Variable"));
    assert!(text.contains("Type: `int`"));
    assert!(text.contains("Defined in scope: `global`"));
}

#[test]
fn hover_on_a_function_names_its_signature() {
    let source = "fn int add(int a, int b) { ret a + b; };\nint r = add(1, 2);\n";
    // `add` on line 2 starts at column 9.
    let text = hover(source, "<test>", 2, 9).expect("hover hit");
    assert!(text.contains("**add**"));
    assert!(text.contains("Function"));
    assert!(text.contains("fn int(int, int)"));
}

#[test]
fn diagnostics_surface_both_parse_and_semantic_problems() {
    let diags = diagnostics("int x = ;\nint y = q;\n", "<test>");
    assert!(diags.len() >= 2);
    assert!(diags.iter().any(|d| d.message.contains("Undefined identifier 'q'")));
}

#[test]
fn local_definitions_resolve_through_archived_scopes() {
    let source = "fn int f(int seed) { int local = seed; ret local; };\n";
    // `local` in the return statement starts at column 44.
    let locations = definition_of(source, "<test>", 1, 44);
    assert_eq!(locations.len(), 1, "local should resolve via the archive");
    assert_eq!(locations[0].line, 1);
    assert_eq!(locations[0].column, 26);
}
