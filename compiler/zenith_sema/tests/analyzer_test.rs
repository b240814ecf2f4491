//! Semantic analysis integration tests

use pretty_assertions::assert_eq;
use zenith_common::Diagnostics;
use zenith_lexer::Lexer;
use zenith_parser::Parser;
use zenith_sema::*;

fn analyze(source: &str) -> (Unit, Diagnostics) {
    let mut lexer = Lexer::new(source, 0);
    let tokens = lexer.tokenize();
    assert!(!lexer.diagnostics().has_errors(), "lex errors in test source");
    let mut parser = Parser::new(tokens);
    let program = parser.parse_program();
    assert!(
        !parser.diagnostics().has_errors(),
        "parse errors: {:?}",
        parser.diagnostics().messages
    );
    Analyzer::new().analyze(&program)
}

fn analyze_ok(source: &str) -> Unit {
    let (unit, diagnostics) = analyze(source);
    assert!(
        !diagnostics.has_errors(),
        "unexpected diagnostics: {:?}",
        diagnostics.messages
    );
    unit
}

fn global_type(unit: &Unit, name: &str) -> Type {
    let id = unit.table.lookup(SymbolTable::GLOBAL, name).expect("global symbol");
    unit.table.symbol(id).ty.clone()
}

fn find_symbol<'a>(unit: &'a Unit, qualified: &str) -> &'a Symbol {
    unit.table
        .symbols()
        .map(|(_, s)| s)
        .find(|s| s.qualified_name == qualified)
        .unwrap_or_else(|| panic!("no symbol named '{}'", qualified))
}

#[test]
fn addition_function_builds_typed_ir() {
    let unit = analyze_ok("addition: (x: u16, y: u16) u16 { ret x + y }");

    let func = unit.function("addition").expect("function IR decl");
    assert_eq!(func.params.len(), 2);
    for &param in &func.params {
        assert_eq!(unit.table.symbol(param).ty, Type::Primitive(PrimitiveType::U16));
    }
    assert_eq!(func.return_type, Some(Type::Primitive(PrimitiveType::U16)));
    assert_eq!(func.body.statements.len(), 1);

    match &func.body.statements[0] {
        Stmt::Return(Some(value)) => {
            // Binary-op type equals the left operand's type.
            assert_eq!(value.ty, Type::Primitive(PrimitiveType::U16));
        }
        other => panic!("expected return statement, got {:?}", other),
    }
}

#[test]
fn integer_literals_take_smallest_containing_type() {
    let unit = analyze_ok("a: = 5\nb: = 255\nc: = 256\nd: = 65535\ne: = -1\nf: = -128\ng: = -129");
    assert_eq!(global_type(&unit, "a"), Type::Primitive(PrimitiveType::U8));
    assert_eq!(global_type(&unit, "b"), Type::Primitive(PrimitiveType::U8));
    assert_eq!(global_type(&unit, "c"), Type::Primitive(PrimitiveType::U16));
    assert_eq!(global_type(&unit, "d"), Type::Primitive(PrimitiveType::U16));
    assert_eq!(global_type(&unit, "e"), Type::Primitive(PrimitiveType::I8));
    assert_eq!(global_type(&unit, "f"), Type::Primitive(PrimitiveType::I8));
    assert_eq!(global_type(&unit, "g"), Type::Primitive(PrimitiveType::I16));
}

#[test]
fn negated_literal_folds_to_constant() {
    let unit = analyze_ok("x: = -42");
    match &unit.decls[0] {
        Decl::Variable { init: Some(init), .. } => {
            assert!(matches!(init.kind, ExprKind::Constant(Value::Int(-42))));
            assert_eq!(init.ty, Type::Primitive(PrimitiveType::I8));
        }
        other => panic!("expected variable declaration, got {:?}", other),
    }
}

#[test]
fn string_literal_types_as_quoted_length_byte_array() {
    let unit = analyze_ok("s: = \"abc\"");
    // Three characters plus both quotes.
    assert_eq!(
        global_type(&unit, "s"),
        Type::Array { element: Box::new(Type::Primitive(PrimitiveType::U8)), len: Some(5) }
    );
}

#[test]
fn inferred_declaration_without_initializer_is_rejected() {
    // The grammar cannot produce this shape, but a hand-built tree can.
    use zenith_common::Span;
    use zenith_parser::ast;

    let program = ast::Program {
        decls: vec![ast::Decl {
            kind: ast::DeclKind::Variable(ast::VariableDecl {
                name: "x".to_string(),
                name_span: Span::empty(),
                ty: None,
                initializer: None,
            }),
            span: Span::empty(),
            id: 0,
        }],
        span: Span::empty(),
    };

    let (_, diagnostics) = Analyzer::new().analyze(&program);
    assert!(diagnostics
        .errors()
        .any(|d| d.message().contains("requires an initializer")));
}

#[test]
fn struct_return_by_value_is_rejected() {
    let (_, diagnostics) = analyze("struct P { x: u8, y: u8 } getP: () P { }");
    assert_eq!(diagnostics.error_count(), 1);
    assert_eq!(
        diagnostics.errors().next().unwrap().message(),
        "cannot return struct type 'P' by value"
    );
}

#[test]
fn undefined_function_is_reported() {
    let (_, diagnostics) = analyze("main: () { unknown() }");
    assert_eq!(diagnostics.error_count(), 1);
    assert_eq!(
        diagnostics.errors().next().unwrap().message(),
        "undefined function 'unknown'"
    );
}

#[test]
fn undefined_identifier_and_type_are_reported() {
    let (_, diagnostics) = analyze("main: () { x: bogus\n y: = missing }");
    let messages: Vec<&str> = diagnostics.errors().map(|d| d.message()).collect();
    assert!(messages.contains(&"undefined type 'bogus'"));
    assert!(messages.contains(&"undefined identifier 'missing'"));
}

#[test]
fn duplicate_declaration_is_reported() {
    let (_, diagnostics) = analyze("x: u8\nx: u16");
    assert_eq!(diagnostics.error_count(), 1);
    assert!(diagnostics.errors().next().unwrap().message().contains("duplicate declaration"));
}

#[test]
fn member_access_on_non_struct_is_reported() {
    let (_, diagnostics) = analyze("main: (n: u8) { x: = n.field }");
    assert!(diagnostics
        .errors()
        .any(|d| d.message() == "member access on non-struct value"));
}

#[test]
fn forward_references_resolve() {
    // `first` calls `second`, declared later in the unit.
    analyze_ok("first: () u8 { ret second() }\nsecond: () u8 { ret 1 }");
}

#[test]
fn call_graph_records_recursion() {
    let unit = analyze_ok(
        "factorial: (n: u8) u8 { if n <= 1 { ret 1 } ret n * factorial(n - 1) }",
    );
    assert!(unit.call_graph.contains_edge("factorial", "factorial"));
}

#[test]
fn call_graph_edges_are_deduplicated_across_nesting() {
    let unit = analyze_ok(
        "helper: () { }\n\
         main: (n: u8) { if n > 1 { helper() } for i := 0; i < n; i++ { helper() } helper() }",
    );
    let edges: Vec<_> = unit
        .call_graph
        .edges()
        .iter()
        .filter(|(from, _)| from == "main")
        .collect();
    assert_eq!(edges.len(), 1);
}

#[test]
fn reverse_loop_tracks_counter_usage() {
    let unit = analyze_ok(
        "reverse: (arr: u8[]) { l := arr.length / 2; for i := 0; i < l; i++ { \
         tmp := arr[i]; arr[i] = arr[l - 1 - i]; arr[l - 1 - i] = tmp } }",
    );

    let i = find_symbol(&unit, "reverse.i");
    assert!(i.usage.contains(Usage::INIT_COUNTER));
    assert!(i.usage.contains(Usage::USED_COUNTER));
    assert!(i.usage.contains(Usage::USED_ARITHMETIC));

    // Member access marks the array pointer-used.
    let arr = find_symbol(&unit, "reverse.arr");
    assert!(arr.usage.contains(Usage::USED_POINTER));
}

#[test]
fn arithmetic_and_comparison_usage_flags() {
    let unit = analyze_ok("calc: (a: u8, b: u8) bool { sum := a + b\n ret sum > b }");
    let a = find_symbol(&unit, "calc.a");
    assert!(a.usage.contains(Usage::USED_ARITHMETIC));
    let sum = find_symbol(&unit, "calc.sum");
    assert!(sum.usage.contains(Usage::USED_COMPARISON));
    assert!(sum.usage.contains(Usage::INIT_ARITHMETIC));
}

#[test]
fn struct_fields_resolve_with_offsets() {
    let unit = analyze_ok(
        "struct Point { x: u8, y: u16 }\n\
         dist: (p: Point) u16 { ret p.y }",
    );
    let ty = global_type(&unit, "Point");
    assert_eq!(ty.field("x").unwrap().offset, 0);
    assert_eq!(ty.field("y").unwrap().offset, 1);
    assert_eq!(ty.byte_size(), 3);
}

#[test]
fn every_referenced_symbol_is_reachable_from_function_scope() {
    let unit = analyze_ok(
        "limit: u8 = 10\n\
         clamp: (v: u8) u8 { if v > limit { ret limit } ret v }",
    );
    let func = unit.function("clamp").unwrap();

    let mut symbols = Vec::new();
    collect_stmt_symbols(&func.body, &mut symbols);
    assert!(!symbols.is_empty());
    for id in symbols {
        assert!(
            unit.table.is_reachable(func.scope, id),
            "symbol '{}' not reachable from function scope",
            unit.table.symbol(id).name
        );
    }
}

fn collect_stmt_symbols(block: &Block, out: &mut Vec<SymbolId>) {
    for stmt in &block.statements {
        match stmt {
            Stmt::VarDecl { init, .. } => {
                if let Some(init) = init {
                    referenced_symbols(init, out);
                }
            }
            Stmt::Assign { target, value } => {
                referenced_symbols(target, out);
                referenced_symbols(value, out);
            }
            Stmt::If { condition, then_block, elsif_clauses, else_block } => {
                referenced_symbols(condition, out);
                collect_stmt_symbols(then_block, out);
                for clause in elsif_clauses {
                    referenced_symbols(&clause.condition, out);
                    collect_stmt_symbols(&clause.block, out);
                }
                if let Some(block) = else_block {
                    collect_stmt_symbols(block, out);
                }
            }
            Stmt::For { init, condition, increment, body, .. } => {
                if let Some(init) = init {
                    collect_stmt_symbols(
                        &Block { statements: vec![init.as_ref().clone()] },
                        out,
                    );
                }
                if let Some(cond) = condition {
                    referenced_symbols(cond, out);
                }
                if let Some(inc) = increment {
                    referenced_symbols(inc, out);
                }
                collect_stmt_symbols(body, out);
            }
            Stmt::Select { scrutinee, cases, else_block } => {
                referenced_symbols(scrutinee, out);
                for case in cases {
                    referenced_symbols(&case.value, out);
                    collect_stmt_symbols(&case.block, out);
                }
                if let Some(block) = else_block {
                    collect_stmt_symbols(block, out);
                }
            }
            Stmt::Expr(expr) => referenced_symbols(expr, out),
            Stmt::Return(value) => {
                if let Some(value) = value {
                    referenced_symbols(value, out);
                }
            }
        }
    }
}
