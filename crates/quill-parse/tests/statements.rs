use quill_ast::ast::{Expr, Lit, Stmt};
use quill_parse::parse_str;

fn parse_stmts(src: &str) -> Vec<Stmt> {
    parse_str("<mem>", src).expect("parse ok").stmts
}

#[test]
fn var_with_and_without_initializer() {
    let stmts = parse_stmts("var a = 1; var b;");
    assert_eq!(stmts.len(), 2);
    let Stmt::Var { name, init, .. } = &stmts[0] else {
        panic!("expected Var");
    };
    assert_eq!(name.text, "a");
    assert!(matches!(init, Some(Expr::Lit(Lit::Number(n), _)) if *n == 1.0));
    assert!(matches!(&stmts[1], Stmt::Var { init: None, .. }));
}

#[test]
fn print_and_block() {
    let stmts = parse_stmts("{ print 1; { print 2; } }");
    let Stmt::Block { stmts: inner, .. } = &stmts[0] else {
        panic!("expected Block");
    };
    assert!(matches!(&inner[0], Stmt::Print { .. }));
    assert!(matches!(&inner[1], Stmt::Block { .. }));
}

#[test]
fn if_else_chain() {
    let stmts = parse_stmts("if (a) print 1; else if (b) print 2; else print 3;");
    let Stmt::If { else_, .. } = &stmts[0] else {
        panic!("expected If");
    };
    let else_ = else_.as_ref().expect("else branch");
    assert!(matches!(**else_, Stmt::If { else_: Some(_), .. }));
}

#[test]
fn while_with_break_and_continue() {
    let stmts = parse_stmts("while (true) { break; continue; }");
    let Stmt::While {
        body, increment, ..
    } = &stmts[0]
    else {
        panic!("expected While");
    };
    assert!(increment.is_none());
    let Stmt::Block { stmts: inner, .. } = &**body else {
        panic!("expected Block body");
    };
    assert!(matches!(inner[0], Stmt::Break { .. }));
    assert!(matches!(inner[1], Stmt::Continue { .. }));
}

#[test]
fn for_desugars_into_block_and_while() {
    let stmts = parse_stmts("for (var i = 0; i < 3; i = i + 1) print i;");
    let Stmt::Block { stmts: inner, .. } = &stmts[0] else {
        panic!("expected Block");
    };
    assert!(matches!(&inner[0], Stmt::Var { .. }));
    let Stmt::While { increment, .. } = &inner[1] else {
        panic!("expected While");
    };
    assert!(matches!(increment, Some(Expr::Assign { .. })));
}

#[test]
fn for_without_clauses_loops_forever() {
    let stmts = parse_stmts("for (;;) break;");
    let Stmt::While {
        cond, increment, ..
    } = &stmts[0]
    else {
        panic!("expected bare While");
    };
    assert!(matches!(cond, Expr::Lit(Lit::Bool(true), _)));
    assert!(increment.is_none());
}

#[test]
fn function_declaration() {
    let stmts = parse_stmts("fun add(a, b) { return a + b; }");
    let Stmt::Fn(decl) = &stmts[0] else {
        panic!("expected Fn");
    };
    assert_eq!(decl.display_name(), "add");
    assert_eq!(decl.params.len(), 2);
    assert!(matches!(decl.body[0], Stmt::Return { value: Some(_), .. }));
}

#[test]
fn anonymous_function_statement() {
    let stmts = parse_stmts("fun (x) { print x; };");
    let Stmt::Expr {
        expr: Expr::Function(decl),
        ..
    } = &stmts[0]
    else {
        panic!("expected function literal");
    };
    assert!(decl.name.is_none());
}

#[test]
fn class_with_superclass_and_static_methods() {
    let stmts = parse_stmts(
        r#"
        class Circle < Shape {
            init(r) { this.r = r; }
            area() { return 3 * this.r * this.r; }
            class unit() { return Circle(1); }
        }
        "#,
    );
    let Stmt::Class(decl) = &stmts[0] else {
        panic!("expected Class");
    };
    assert_eq!(decl.name.text, "Circle");
    assert!(matches!(&decl.superclass, Some(Expr::Var { name, .. }) if name.text == "Shape"));
    assert_eq!(decl.methods.len(), 2);
    assert_eq!(decl.static_methods.len(), 1);
    assert_eq!(decl.static_methods[0].display_name(), "unit");
}

#[test]
fn return_without_value() {
    let stmts = parse_stmts("fun f() { return; }");
    let Stmt::Fn(decl) = &stmts[0] else {
        panic!("expected Fn");
    };
    assert!(matches!(decl.body[0], Stmt::Return { value: None, .. }));
}
