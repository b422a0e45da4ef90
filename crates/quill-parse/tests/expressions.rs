use quill_ast::ast::{BinOp, Expr, LogicOp, Stmt, UnOp};
use quill_parse::parse_str;

/// Helper: parse `src;` as an expression statement and return the expression
fn parse_expr_only(src: &str) -> Expr {
    let program = parse_str("<mem>", &format!("{src};")).expect("parse ok");
    let Stmt::Expr { expr, .. } = &program.stmts[0] else {
        panic!("expected expression statement");
    };
    expr.clone()
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    let e = parse_expr_only("1 + 2 * 3");
    let Expr::Binary { op, rhs, .. } = e else {
        panic!("expected Binary");
    };
    assert_eq!(op, BinOp::Add);
    assert!(matches!(*rhs, Expr::Binary { op: BinOp::Mul, .. }));
}

#[test]
fn remainder_is_multiplicative() {
    let e = parse_expr_only("1 + 7 % 3");
    let Expr::Binary { op, rhs, .. } = e else {
        panic!("expected Binary");
    };
    assert_eq!(op, BinOp::Add);
    assert!(matches!(*rhs, Expr::Binary { op: BinOp::Rem, .. }));
}

#[test]
fn subtraction_is_left_associative() {
    let e = parse_expr_only("1 - 2 - 3");
    let Expr::Binary { lhs, op, .. } = e else {
        panic!("expected Binary");
    };
    assert_eq!(op, BinOp::Sub);
    assert!(matches!(*lhs, Expr::Binary { op: BinOp::Sub, .. }));
}

#[test]
fn and_binds_tighter_than_or() {
    let e = parse_expr_only("a or b and c");
    let Expr::Logical { op, rhs, .. } = e else {
        panic!("expected Logical");
    };
    assert_eq!(op, LogicOp::Or);
    assert!(matches!(*rhs, Expr::Logical { op: LogicOp::And, .. }));
}

#[test]
fn comparison_below_equality() {
    let e = parse_expr_only("a < b == c > d");
    let Expr::Binary { op, lhs, rhs, .. } = e else {
        panic!("expected Binary");
    };
    assert_eq!(op, BinOp::Eq);
    assert!(matches!(*lhs, Expr::Binary { op: BinOp::Lt, .. }));
    assert!(matches!(*rhs, Expr::Binary { op: BinOp::Gt, .. }));
}

#[test]
fn comma_is_lowest_precedence() {
    let e = parse_expr_only("a = 1, b = 2");
    let Expr::Binary { op, lhs, rhs, .. } = e else {
        panic!("expected comma Binary");
    };
    assert_eq!(op, BinOp::Comma);
    assert!(matches!(*lhs, Expr::Assign { .. }));
    assert!(matches!(*rhs, Expr::Assign { .. }));
}

#[test]
fn assignment_is_right_associative() {
    let e = parse_expr_only("a = b = 3");
    let Expr::Assign { name, value, .. } = e else {
        panic!("expected Assign");
    };
    assert_eq!(name.text, "a");
    assert!(matches!(*value, Expr::Assign { .. }));
}

#[test]
fn property_assignment_becomes_set() {
    let e = parse_expr_only("point.x = 3");
    let Expr::Set { name, object, .. } = e else {
        panic!("expected Set");
    };
    assert_eq!(name.text, "x");
    assert!(matches!(*object, Expr::Var { .. }));
}

#[test]
fn call_arguments_do_not_use_comma_operator() {
    let e = parse_expr_only("f(1, 2, 3)");
    let Expr::Call { args, .. } = e else {
        panic!("expected Call");
    };
    assert_eq!(args.len(), 3);
}

#[test]
fn chained_calls_and_gets() {
    let e = parse_expr_only("a.b(1).c()");
    let Expr::Call { callee, args, .. } = e else {
        panic!("expected Call");
    };
    assert!(args.is_empty());
    assert!(matches!(*callee, Expr::Get { .. }));
}

#[test]
fn unary_applies_to_postfix_chain() {
    let e = parse_expr_only("-a.b");
    let Expr::Unary { op, expr, .. } = e else {
        panic!("expected Unary");
    };
    assert_eq!(op, UnOp::Neg);
    assert!(matches!(*expr, Expr::Get { .. }));
}

#[test]
fn this_and_super() {
    assert!(matches!(parse_expr_only("this"), Expr::This { .. }));
    let Expr::Super { method, .. } = parse_expr_only("super.area") else {
        panic!("expected Super");
    };
    assert_eq!(method.text, "area");
}

#[test]
fn reference_nodes_get_distinct_ids() {
    let e = parse_expr_only("a + a");
    let Expr::Binary { lhs, rhs, .. } = e else {
        panic!("expected Binary");
    };
    let (Expr::Var { id: l, .. }, Expr::Var { id: r, .. }) = (*lhs, *rhs) else {
        panic!("expected two Vars");
    };
    assert_ne!(l, r);
}

#[test]
fn separate_parses_never_share_ids() {
    let Expr::Var { id: first, .. } = parse_expr_only("a") else {
        panic!("expected Var");
    };
    let Expr::Var { id: second, .. } = parse_expr_only("a") else {
        panic!("expected Var");
    };
    assert_ne!(first, second);
}

#[test]
fn spans_cover_whole_binary() {
    let e = parse_expr_only("12 + 345");
    let span = e.span();
    assert_eq!((span.start, span.end), (0, 8));
}
