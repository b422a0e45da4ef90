//! Host builtins as seen from scripts.

use std::io::Cursor;

use quill_cli::{run_source, CaptureBuffer, Interpreter, RunReport, RunStatus};

fn run_with_input(src: &str, input: &'static str) -> (RunReport, String) {
    let out = CaptureBuffer::new();
    let mut interp = Interpreter::with_io(Box::new(out.clone()), Box::new(Cursor::new(input)));
    let report = run_source(&mut interp, "<test>", src);
    (report, out.contents())
}

#[test]
fn readers_consume_input_in_order() {
    let src = r#"
        var line = readLine();
        var d = readDouble();
        var i = readInt();
        var nl = readByte();
        var x = readByte();
        var y = readByte();
        var end = readByte();
        print line;
        print d;
        print i;
        print nl == NEWLINE_CHAR;
        print x + y;
        print end;
        print readLine();
    "#;
    let (report, out) = run_with_input(src, "hello\n42 3.7\nxy");
    assert_eq!(report.status, RunStatus::Ok, "{:?}", report.diagnostics);
    assert_eq!(out, "hello\n42\n3\ntrue\nxy\nnil\nnil\n");
}

#[test]
fn read_line_strips_crlf() {
    let (report, out) = run_with_input("print readLine() + \"|\";", "text\r\nmore");
    assert_eq!(report.status, RunStatus::Ok);
    assert_eq!(out, "text|\n");
}

#[test]
fn non_numeric_input_is_a_runtime_error() {
    let (report, _) = run_with_input("readDouble();", "abc");
    assert_eq!(report.status, RunStatus::RuntimeError);
    assert_eq!(
        report.diagnostics[0].message,
        "readDouble: invalid input: 'abc' is not a number"
    );
}

#[test]
fn clock_is_seconds_since_epoch() {
    let (report, out) = run_with_input("print clock() > 1000000000;", "");
    assert_eq!(report.status, RunStatus::Ok);
    assert_eq!(out, "true\n");
}

#[test]
fn instance_of_walks_superclasses() {
    let src = r#"
        class A {}
        class B < A {}
        print instanceOf(B(), A);
        print instanceOf(A(), B);
        print instanceOf(1, A);
    "#;
    let (report, out) = run_with_input(src, "");
    assert_eq!(report.status, RunStatus::Ok);
    assert_eq!(out, "true\nfalse\nfalse\n");
}

#[test]
fn instance_of_requires_a_class() {
    let (report, _) = run_with_input("instanceOf(1, 2);", "");
    assert_eq!(report.status, RunStatus::RuntimeError);
    assert!(report.diagnostics[0].message.starts_with("instanceOf: type error"));
}

#[test]
fn builtins_check_arity_and_print_natively() {
    let (report, out) = run_with_input("print clock;", "");
    assert_eq!(report.status, RunStatus::Ok);
    assert_eq!(out, "<native fn>\n");

    let (report, _) = run_with_input("clock(1);", "");
    assert_eq!(report.diagnostics[0].message, "Expected 0 arguments but got 1.");
}

#[test]
fn builtins_can_be_shadowed_locally_but_not_redeclared_globally() {
    let (report, out) = run_with_input("{ var clock = 1; print clock; }", "");
    assert_eq!(report.status, RunStatus::Ok);
    assert_eq!(out, "1\n");

    let (report, _) = run_with_input("var clock = 1;", "");
    assert_eq!(report.status, RunStatus::RuntimeError);
    assert_eq!(
        report.diagnostics[0].message,
        "Attempting to redefine scope variable 'clock'."
    );
}
