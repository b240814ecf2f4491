//! Parser integration tests over the surface grammar

use pretty_assertions::assert_eq;
use zenith_lexer::Lexer;
use zenith_parser::*;

fn parse(source: &str) -> Program {
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
    program
}

#[test]
fn parses_typed_variable_declaration() {
    let program = parse("counter: u16 = 500");
    assert_eq!(program.decls.len(), 1);
    match &program.decls[0].kind {
        DeclKind::Variable(var) => {
            assert_eq!(var.name, "counter");
            let ty = var.ty.as_ref().expect("explicit type");
            assert_eq!(ty.name, "u16");
            assert_eq!(ty.array, ArraySpec::None);
            assert!(!ty.pointer);
            assert!(var.initializer.is_some());
        }
        other => panic!("expected variable declaration, got {:?}", other),
    }
}

#[test]
fn parses_inferred_declaration() {
    let program = parse("flag: = true");
    match &program.decls[0].kind {
        DeclKind::Variable(var) => {
            assert!(var.ty.is_none());
            assert!(var.initializer.is_some());
        }
        other => panic!("expected variable declaration, got {:?}", other),
    }
}

#[test]
fn parses_array_and_pointer_type_suffixes() {
    let program = parse("buf: u8[16]\nname: u8[]\nptr: u16*");
    let tys: Vec<&TypeRef> = program
        .decls
        .iter()
        .map(|d| match &d.kind {
            DeclKind::Variable(v) => v.ty.as_ref().unwrap(),
            other => panic!("expected variable declaration, got {:?}", other),
        })
        .collect();

    assert_eq!(tys[0].array, ArraySpec::Sized(16));
    assert_eq!(tys[1].array, ArraySpec::Unsized);
    assert!(tys[2].pointer);
}

#[test]
fn parses_function_with_params_and_return_type() {
    let program = parse("addition: (x: u16, y: u16) u16 { ret x + y }");
    match &program.decls[0].kind {
        DeclKind::Function(func) => {
            assert_eq!(func.name, "addition");
            assert_eq!(func.params.len(), 2);
            assert_eq!(func.params[0].name, "x");
            assert_eq!(func.return_type.as_ref().unwrap().name, "u16");
            assert_eq!(func.body.statements.len(), 1);
            assert!(matches!(func.body.statements[0].kind, StmtKind::Return(Some(_))));
        }
        other => panic!("expected function declaration, got {:?}", other),
    }
}

#[test]
fn parses_binary_chains_left_to_right() {
    // No operator precedence: 2 + 3 * 4 is (2 + 3) * 4.
    let program = parse("v: = 2 + 3 * 4");
    let init = match &program.decls[0].kind {
        DeclKind::Variable(var) => var.initializer.as_ref().unwrap(),
        other => panic!("expected variable declaration, got {:?}", other),
    };

    match &init.kind {
        ExprKind::Binary { op, left, .. } => {
            assert_eq!(*op, BinaryOp::Multiply);
            match &left.kind {
                ExprKind::Binary { op, .. } => assert_eq!(*op, BinaryOp::Add),
                other => panic!("expected nested addition on the left, got {:?}", other),
            }
        }
        other => panic!("expected binary expression, got {:?}", other),
    }
}

#[test]
fn parses_if_elsif_else() {
    let program = parse(
        "classify: (n: u8) u8 { if n > 200 { ret 2 } elsif n > 100 { ret 1 } else { ret 0 } }",
    );
    let func = match &program.decls[0].kind {
        DeclKind::Function(f) => f,
        other => panic!("expected function, got {:?}", other),
    };
    match &func.body.statements[0].kind {
        StmtKind::If(if_stmt) => {
            assert_eq!(if_stmt.elsif_clauses.len(), 1);
            assert!(if_stmt.else_block.is_some());
        }
        other => panic!("expected if statement, got {:?}", other),
    }
}

#[test]
fn parses_for_with_all_clauses() {
    let program = parse("count: () { for i := 0; i < 10; i++ { } }");
    let func = match &program.decls[0].kind {
        DeclKind::Function(f) => f,
        other => panic!("expected function, got {:?}", other),
    };
    match &func.body.statements[0].kind {
        StmtKind::For(for_stmt) => {
            let init = for_stmt.init.as_ref().expect("init clause");
            assert!(matches!(init.kind, StmtKind::VariableDecl(_)));
            assert!(for_stmt.condition.is_some());
            let inc = for_stmt.increment.as_ref().expect("increment clause");
            assert!(matches!(
                inc.kind,
                ExprKind::Unary { op: UnaryOp::Increment, .. }
            ));
        }
        other => panic!("expected for statement, got {:?}", other),
    }
}

#[test]
fn parses_select_with_cases_and_else() {
    let program = parse(
        "dispatch: (op: u8) { select op { case 1 { beep() } case 2 { boop() } else { halt() } } }",
    );
    let func = match &program.decls[0].kind {
        DeclKind::Function(f) => f,
        other => panic!("expected function, got {:?}", other),
    };
    match &func.body.statements[0].kind {
        StmtKind::Select(select) => {
            assert_eq!(select.cases.len(), 2);
            assert!(select.else_block.is_some());
        }
        other => panic!("expected select statement, got {:?}", other),
    }
}

#[test]
fn parses_lvalue_assignments() {
    let program = parse("swap: (arr: u8[], i: u8) { arr[i] = 0\n p.x = 1 }");
    let func = match &program.decls[0].kind {
        DeclKind::Function(f) => f,
        other => panic!("expected function, got {:?}", other),
    };
    match &func.body.statements[0].kind {
        StmtKind::Assignment { target, .. } => {
            assert!(matches!(target.kind, ExprKind::Subscript { .. }));
        }
        other => panic!("expected assignment, got {:?}", other),
    }
    match &func.body.statements[1].kind {
        StmtKind::Assignment { target, .. } => {
            assert!(matches!(target.kind, ExprKind::Member { .. }));
        }
        other => panic!("expected assignment, got {:?}", other),
    }
}

#[test]
fn parses_struct_decl_and_initializer() {
    let program = parse("struct P { x: u8, y: u8 }\norigin: = P{ x = 0, y = 0 }");
    match &program.decls[0].kind {
        DeclKind::Struct(s) => {
            assert_eq!(s.name, "P");
            assert_eq!(s.fields.len(), 2);
        }
        other => panic!("expected struct declaration, got {:?}", other),
    }
    match &program.decls[1].kind {
        DeclKind::Variable(var) => {
            let init = var.initializer.as_ref().unwrap();
            match &init.kind {
                ExprKind::StructInit { name, fields } => {
                    assert_eq!(name, "P");
                    assert_eq!(fields.len(), 2);
                }
                other => panic!("expected struct initializer, got {:?}", other),
            }
        }
        other => panic!("expected variable declaration, got {:?}", other),
    }
}

#[test]
fn parses_array_initializer() {
    let program = parse("primes: = [2, 3, 5, 7]");
    match &program.decls[0].kind {
        DeclKind::Variable(var) => match &var.initializer.as_ref().unwrap().kind {
            ExprKind::ArrayInit(elements) => assert_eq!(elements.len(), 4),
            other => panic!("expected array initializer, got {:?}", other),
        },
        other => panic!("expected variable declaration, got {:?}", other),
    }
}

#[test]
fn condition_brace_is_block_not_struct_literal() {
    // `if a > b {` must treat the brace as the then-block.
    let program = parse("max: (a: u8, b: u8) u8 { if a > b { ret a } else { ret b } }");
    let func = match &program.decls[0].kind {
        DeclKind::Function(f) => f,
        other => panic!("expected function, got {:?}", other),
    };
    assert!(matches!(func.body.statements[0].kind, StmtKind::If(_)));
}

#[test]
fn reports_diagnostic_for_missing_paren() {
    let mut lexer = Lexer::new("broken: (x: u8 { ret x }", 0);
    let tokens = lexer.tokenize();
    let mut parser = Parser::new(tokens);
    parser.parse_program();
    assert!(parser.diagnostics().has_errors());
}
