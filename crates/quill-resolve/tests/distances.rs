//! Integration tests for scope-distance computation

use quill_ast::ast::{Expr, Program, Stmt};
use quill_parse::parse_str;
use quill_resolve::resolve;

/// Collect (name, distance) for every variable/this/super read in program order.
fn reads(program: &Program) -> Vec<(String, Option<usize>)> {
    let res = resolve(program);
    assert!(res.is_ok(), "unexpected errors: {:?}", res.errors);
    let mut out = Vec::new();
    for stmt in &program.stmts {
        walk_stmt(stmt, &res, &mut out);
    }
    out
}

fn walk_stmt(stmt: &Stmt, res: &quill_resolve::Resolution, out: &mut Vec<(String, Option<usize>)>) {
    match stmt {
        Stmt::Expr { expr, .. } | Stmt::Print { expr, .. } => walk_expr(expr, res, out),
        Stmt::Var { init, .. } => {
            if let Some(init) = init {
                walk_expr(init, res, out);
            }
        }
        Stmt::Block { stmts, .. } => stmts.iter().for_each(|s| walk_stmt(s, res, out)),
        Stmt::Return { value, .. } => {
            if let Some(v) = value {
                walk_expr(v, res, out);
            }
        }
        Stmt::Fn(decl) => decl.body.iter().for_each(|s| walk_stmt(s, res, out)),
        Stmt::Class(decl) => {
            for m in decl.methods.iter().chain(&decl.static_methods) {
                m.body.iter().for_each(|s| walk_stmt(s, res, out));
            }
        }
        _ => {}
    }
}

fn walk_expr(expr: &Expr, res: &quill_resolve::Resolution, out: &mut Vec<(String, Option<usize>)>) {
    match expr {
        Expr::Var { name, id } => out.push((name.text.clone(), res.distance(*id))),
        Expr::This { id, .. } => out.push(("this".into(), res.distance(*id))),
        Expr::Super { id, .. } => out.push(("super".into(), res.distance(*id))),
        Expr::Binary { lhs, rhs, .. } => {
            walk_expr(lhs, res, out);
            walk_expr(rhs, res, out);
        }
        Expr::Call { callee, args, .. } => {
            walk_expr(callee, res, out);
            args.iter().for_each(|a| walk_expr(a, res, out));
        }
        Expr::Get { object, .. } => walk_expr(object, res, out),
        Expr::Function(decl) => decl.body.iter().for_each(|s| walk_stmt(s, res, out)),
        _ => {}
    }
}

#[test]
fn shadowed_block_variables() {
    let program =
        parse_str("<test>", "{ var x = 1; { var x = 2; print x; } print x; }").unwrap();
    assert_eq!(
        reads(&program),
        vec![("x".into(), Some(0)), ("x".into(), Some(0))]
    );
}

#[test]
fn closure_reads_enclosing_function_local() {
    let src = r#"
        fun counter() {
            var n = 0;
            fun inc() { n = n + 1; return n; }
            return inc;
        }
    "#;
    let program = parse_str("<test>", src).unwrap();
    // `return n` inside inc: n lives one function scope out
    assert_eq!(
        reads(&program),
        vec![("n".into(), Some(1)), ("inc".into(), Some(0))]
    );
}

#[test]
fn this_is_one_scope_outside_method_body() {
    let program = parse_str("<test>", "class A { get() { return this; } }").unwrap();
    assert_eq!(reads(&program), vec![("this".into(), Some(1))]);
}

#[test]
fn super_is_two_scopes_outside_method_body() {
    let src = "class A { f() {} } class B < A { f() { return super.f; } }";
    let program = parse_str("<test>", src).unwrap();
    assert_eq!(reads(&program), vec![("super".into(), Some(2))]);
}

#[test]
fn unresolved_names_are_global() {
    let program = parse_str("<test>", "fun f() { return g; }").unwrap();
    assert_eq!(reads(&program), vec![("g".into(), None)]);
}
