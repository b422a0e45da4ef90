//! Evaluator for Quill programs
//!
//! A tree-walking interpreter over the resolved syntax tree. Statements yield
//! a tagged `ControlFlow`; `return`, `break` and `continue` travel outward as
//! tags until the call or loop that owns them absorbs them.

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::rc::Rc;

use quill_ast::ast::{
    BinOp, ClassDecl, Expr, FnDecl, Ident, Lit, LogicOp, NodeId, Program, Stmt, UnOp,
};
use quill_ast::span::Span;
use quill_resolve::Locals;

use crate::env::{EnvError, EnvRef, Environment};
use crate::host::{HostError, HostRegistry};
use crate::stack::ensure_sufficient_stack;
use crate::value::{Callable, Class, Function, Instance, Value};

/// Deepest allowed nesting of calls. Runaway recursion stops here with a
/// `StackOverflow` error; the native stack grows on demand up to this point.
pub const MAX_CALL_DEPTH: usize = 10_000;

/// Control flow for evaluation
///
/// Used to propagate returns and loop exits through blocks and calls.
#[derive(Debug, Clone)]
pub enum ControlFlow {
    /// Normal completion with the statement's value
    Value(Value),
    /// Return statement - bubbles up to the function boundary
    Return(Value),
    /// Break statement - absorbed by the innermost loop
    Break,
    /// Continue statement - absorbed by the innermost loop
    Continue,
}

impl ControlFlow {
    /// Extract the value, treating Return as a normal value
    pub fn into_value(self) -> Value {
        match self {
            ControlFlow::Value(v) | ControlFlow::Return(v) => v,
            ControlFlow::Break | ControlFlow::Continue => Value::Nil,
        }
    }
}

/// Errors raised while evaluating. Each carries the offending source span.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// Operand of the wrong type for an operator
    TypeError { message: &'static str, span: Span },
    Redefinition { name: String, span: Span },
    UninitializedVariable { name: String, span: Span },
    UndefinedVariable { name: String, span: Span },
    NotCallable { span: Span },
    Arity {
        expected: usize,
        got: usize,
        span: Span,
    },
    /// Property read on something other than an instance or class
    NotAnInstance { span: Span },
    /// Property write on something other than an instance
    FieldOnNonInstance { span: Span },
    UndefinedProperty { name: String, span: Span },
    SuperclassNotClass { span: Span },
    /// Call nesting exceeded `MAX_CALL_DEPTH`
    StackOverflow { span: Span },
    /// A builtin failed
    Host {
        name: String,
        error: HostError,
        span: Span,
    },
    /// Writing program output failed
    Output { message: String, span: Span },
}

impl RuntimeError {
    pub fn span(&self) -> Span {
        match self {
            RuntimeError::TypeError { span, .. }
            | RuntimeError::Redefinition { span, .. }
            | RuntimeError::UninitializedVariable { span, .. }
            | RuntimeError::UndefinedVariable { span, .. }
            | RuntimeError::NotCallable { span }
            | RuntimeError::Arity { span, .. }
            | RuntimeError::NotAnInstance { span }
            | RuntimeError::FieldOnNonInstance { span }
            | RuntimeError::UndefinedProperty { span, .. }
            | RuntimeError::SuperclassNotClass { span }
            | RuntimeError::StackOverflow { span }
            | RuntimeError::Host { span, .. }
            | RuntimeError::Output { span, .. } => *span,
        }
    }

    fn from_env(err: EnvError, span: Span) -> Self {
        match err {
            EnvError::Redefinition(name) => RuntimeError::Redefinition { name, span },
            EnvError::Uninitialized(name) => RuntimeError::UninitializedVariable { name, span },
            EnvError::Undefined(name) => RuntimeError::UndefinedVariable { name, span },
        }
    }
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeError::TypeError { message, .. } => write!(f, "{}", message),
            RuntimeError::Redefinition { name, .. } => {
                write!(f, "{}", EnvError::Redefinition(name.clone()))
            }
            RuntimeError::UninitializedVariable { name, .. } => {
                write!(f, "{}", EnvError::Uninitialized(name.clone()))
            }
            RuntimeError::UndefinedVariable { name, .. } => {
                write!(f, "{}", EnvError::Undefined(name.clone()))
            }
            RuntimeError::NotCallable { .. } => write!(f, "Can only call functions and classes."),
            RuntimeError::Arity { expected, got, .. } => {
                write!(f, "Expected {} arguments but got {}.", expected, got)
            }
            RuntimeError::NotAnInstance { .. } => write!(f, "Only instances have properties."),
            RuntimeError::FieldOnNonInstance { .. } => write!(f, "Only instances have fields."),
            RuntimeError::UndefinedProperty { name, .. } => {
                write!(f, "Undefined property '{}'.", name)
            }
            RuntimeError::SuperclassNotClass { .. } => write!(f, "Superclass must be a class."),
            RuntimeError::StackOverflow { .. } => write!(f, "Stack overflow."),
            RuntimeError::Host { name, error, .. } => write!(f, "{}: {}", name, error),
            RuntimeError::Output { message, .. } => write!(f, "output error: {}", message),
        }
    }
}

impl std::error::Error for RuntimeError {}

type Result<T> = std::result::Result<T, RuntimeError>;

/// Results of running a program's top-level statements.
#[derive(Debug)]
pub struct Evaluation {
    /// One value per top-level statement that completed
    pub results: Vec<Value>,
    /// The failure that stopped the batch, if any
    pub error: Option<RuntimeError>,
}

impl Evaluation {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Tree-walking interpreter.
///
/// Owns its globals, so independent interpreters never share state.
pub struct Interpreter {
    globals: EnvRef,
    /// Environment of the code currently executing
    env: EnvRef,
    locals: Locals,
    out: Box<dyn Write>,
    input: Box<dyn BufRead>,
    call_depth: usize,
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("globals", &self.globals)
            .field("locals", &self.locals.len())
            .field("call_depth", &self.call_depth)
            .finish()
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// An interpreter printing to stdout and reading from stdin.
    pub fn new() -> Self {
        Self::with_io(Box::new(std::io::stdout()), Box::new(std::io::stdin().lock()))
    }

    /// An interpreter with explicit output and input streams.
    pub fn with_io(out: Box<dyn Write>, input: Box<dyn BufRead>) -> Self {
        let globals = Environment::new();
        HostRegistry::new().install(&globals);
        Self {
            env: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            out,
            input,
            call_depth: 0,
        }
    }

    pub fn globals(&self) -> &EnvRef {
        &self.globals
    }

    pub(crate) fn input(&mut self) -> &mut dyn BufRead {
        self.input.as_mut()
    }

    /// Execute every top-level statement in order, collecting one result per
    /// statement. The first runtime failure stops the batch; results produced
    /// before it are kept.
    ///
    /// `locals` must come from resolving this same `program`. Distances from
    /// earlier programs are kept, so closures they created still resolve;
    /// node ids are unique across parses, so the tables never collide.
    #[tracing::instrument(level = "debug", skip_all, fields(stmts = program.stmts.len()))]
    pub fn interpret(&mut self, program: &Program, locals: &Locals) -> Evaluation {
        self.locals.extend(locals.iter().map(|(id, depth)| (*id, *depth)));

        let mut results = Vec::with_capacity(program.stmts.len());
        let mut error = None;
        for stmt in &program.stmts {
            match self.execute(stmt) {
                Ok(flow) => results.push(flow.into_value()),
                Err(err) => {
                    tracing::debug!(%err, "runtime failure");
                    error = Some(err);
                    break;
                }
            }
        }
        if let Err(e) = self.out.flush() {
            if error.is_none() {
                error = Some(RuntimeError::Output {
                    message: e.to_string(),
                    span: program.span,
                });
            }
        }
        Evaluation { results, error }
    }

    /// Run `stmts` with `env` as the current environment, restoring the
    /// previous one on every exit path.
    pub fn execute_block(&mut self, stmts: &[Stmt], env: EnvRef) -> Result<ControlFlow> {
        let previous = std::mem::replace(&mut self.env, env);
        let result = self.execute_stmts(stmts);
        self.env = previous;
        result
    }

    fn execute_stmts(&mut self, stmts: &[Stmt]) -> Result<ControlFlow> {
        let mut last = Value::Nil;
        for stmt in stmts {
            match self.execute(stmt)? {
                ControlFlow::Value(value) => last = value,
                flow => return Ok(flow),
            }
        }
        Ok(ControlFlow::Value(last))
    }

    // ======= statements =======

    fn execute(&mut self, stmt: &Stmt) -> Result<ControlFlow> {
        ensure_sufficient_stack(|| self.execute_inner(stmt))
    }

    fn execute_inner(&mut self, stmt: &Stmt) -> Result<ControlFlow> {
        match stmt {
            Stmt::Expr { expr, .. } => Ok(ControlFlow::Value(self.evaluate(expr)?)),

            Stmt::Print { expr, span } => {
                let value = self.evaluate(expr)?;
                writeln!(self.out, "{}", value).map_err(|e| RuntimeError::Output {
                    message: e.to_string(),
                    span: *span,
                })?;
                Ok(ControlFlow::Value(value))
            }

            Stmt::Var { name, init, .. } => {
                let value = match init {
                    Some(init) => Some(self.evaluate(init)?),
                    None => None,
                };
                self.define(name, value.clone())?;
                Ok(ControlFlow::Value(value.unwrap_or(Value::Nil)))
            }

            Stmt::Block { stmts, .. } => {
                let env = Environment::child(&self.env);
                self.execute_block(stmts, env)
            }

            Stmt::If {
                cond, then_, else_, ..
            } => {
                if self.evaluate(cond)?.is_truthy() {
                    self.execute(then_)
                } else if let Some(else_) = else_ {
                    self.execute(else_)
                } else {
                    Ok(ControlFlow::Value(Value::Nil))
                }
            }

            Stmt::While {
                cond,
                body,
                increment,
                ..
            } => self.execute_while(cond, body, increment.as_ref()),

            Stmt::Break { .. } => Ok(ControlFlow::Break),
            Stmt::Continue { .. } => Ok(ControlFlow::Continue),

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(value) => self.evaluate(value)?,
                    None => Value::Nil,
                };
                Ok(ControlFlow::Return(value))
            }

            Stmt::Fn(decl) => Ok(ControlFlow::Value(self.make_function(decl)?)),
            Stmt::Class(decl) => Ok(ControlFlow::Value(self.declare_class(decl)?)),
        }
    }

    fn execute_while(
        &mut self,
        cond: &Expr,
        body: &Stmt,
        increment: Option<&Expr>,
    ) -> Result<ControlFlow> {
        let mut last = Value::Nil;
        while self.evaluate(cond)?.is_truthy() {
            match self.execute(body)? {
                ControlFlow::Value(value) => last = value,
                ControlFlow::Break => break,
                ControlFlow::Continue => {}
                flow @ ControlFlow::Return(_) => return Ok(flow),
            }
            if let Some(increment) = increment {
                self.evaluate(increment)?;
            }
        }
        Ok(ControlFlow::Value(last))
    }

    fn define(&mut self, name: &Ident, value: Option<Value>) -> Result<()> {
        self.env
            .borrow_mut()
            .define(&name.text, value)
            .map_err(|e| RuntimeError::from_env(e, name.span))
    }

    /// Build a closure over the current environment. Named functions are
    /// also bound under their name.
    fn make_function(&mut self, decl: &Rc<FnDecl>) -> Result<Value> {
        let function = Function::new(Rc::clone(decl), Rc::clone(&self.env), false);
        let value = Value::Function(Rc::new(function));
        if let Some(name) = &decl.name {
            self.define(name, Some(value.clone()))?;
        }
        Ok(value)
    }

    fn declare_class(&mut self, decl: &ClassDecl) -> Result<Value> {
        // Bound first so methods can refer to the class by name.
        self.define(&decl.name, Some(Value::Nil))?;

        let superclass = match &decl.superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),
                _ => return Err(RuntimeError::SuperclassNotClass { span: expr.span() }),
            },
            None => None,
        };

        let closure = match &superclass {
            Some(superclass) => {
                Environment::with_binding(&self.env, "super", Value::Class(Rc::clone(superclass)))
            }
            None => Rc::clone(&self.env),
        };
        let build = |decls: &[Rc<FnDecl>]| -> HashMap<String, Rc<Function>> {
            decls
                .iter()
                .map(|method| {
                    let name = method.display_name().to_string();
                    let is_init = name == "init";
                    let method = Function::new(Rc::clone(method), Rc::clone(&closure), is_init);
                    (name, Rc::new(method))
                })
                .collect()
        };
        let methods = build(decl.methods.as_slice());
        let static_methods = build(decl.static_methods.as_slice());

        let class = Rc::new(Class::new(
            decl.name.text.clone(),
            superclass,
            methods,
            static_methods,
        ));
        tracing::debug!(class = %class.name, "defined class");

        let value = Value::Class(Rc::clone(&class));
        self.env
            .borrow_mut()
            .assign(&decl.name.text, value.clone())
            .map_err(|e| RuntimeError::from_env(e, decl.name.span))?;

        if let Some(init) = class.find_static_method("init") {
            let bound = Rc::new(init.bind(value.clone()));
            self.call(Callable::Function(bound), Vec::new(), decl.name.span)?;
        }
        Ok(value)
    }

    // ======= expressions =======

    fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        ensure_sufficient_stack(|| self.evaluate_inner(expr))
    }

    fn evaluate_inner(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Lit(lit, _) => Ok(match lit {
                Lit::Number(n) => Value::Number(*n),
                Lit::Str(s) => Value::Str(s.clone()),
                Lit::Bool(b) => Value::Bool(*b),
                Lit::Nil => Value::Nil,
            }),

            Expr::Paren { inner, .. } => self.evaluate(inner),

            Expr::Var { name, id } => self.look_up(&name.text, *id, name.span),

            Expr::Assign {
                name, value, id, ..
            } => {
                let value = self.evaluate(value)?;
                let assigned = match self.locals.get(id) {
                    Some(&distance) => {
                        Environment::assign_at(&self.env, distance, &name.text, value.clone())
                    }
                    None => self.globals.borrow_mut().assign(&name.text, value.clone()),
                };
                assigned.map_err(|e| RuntimeError::from_env(e, name.span))?;
                Ok(value)
            }

            Expr::Unary { op, expr, span } => {
                let operand = self.evaluate(expr)?;
                match (op, operand) {
                    (UnOp::Neg, Value::Number(n)) => Ok(Value::Number(-n)),
                    (UnOp::Neg, _) => Err(RuntimeError::TypeError {
                        message: "Operand must be a number.",
                        span: *span,
                    }),
                    (UnOp::Not, operand) => Ok(Value::Bool(!operand.is_truthy())),
                }
            }

            Expr::Binary { lhs, op, rhs, span } => {
                let lhs = self.evaluate(lhs)?;
                let rhs = self.evaluate(rhs)?;
                binary(*op, lhs, rhs, *span)
            }

            Expr::Logical { lhs, op, rhs, .. } => {
                let left = self.evaluate(lhs)?;
                let short_circuit = match op {
                    LogicOp::Or => left.is_truthy(),
                    LogicOp::And => !left.is_truthy(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.evaluate(rhs)
                }
            }

            Expr::Call { callee, args, span } => {
                let callee = self.evaluate(callee)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.evaluate(arg)?);
                }
                let callable = callee
                    .as_callable()
                    .ok_or(RuntimeError::NotCallable { span: *span })?;
                self.call(callable, values, *span)
            }

            Expr::Get { object, name, .. } => {
                let object = self.evaluate(object)?;
                get_property(object, name)
            }

            Expr::Set {
                object,
                name,
                value,
                ..
            } => {
                let Value::Instance(instance) = self.evaluate(object)? else {
                    return Err(RuntimeError::FieldOnNonInstance { span: name.span });
                };
                let value = self.evaluate(value)?;
                instance.set(&name.text, value.clone());
                Ok(value)
            }

            Expr::This { id, span } => self.look_up("this", *id, *span),

            Expr::Super { method, id, span } => self.evaluate_super(method, *id, *span),

            Expr::Function(decl) => self.make_function(decl),
        }
    }

    /// Resolved references read at their recorded distance; the rest are globals.
    fn look_up(&self, name: &str, id: NodeId, span: Span) -> Result<Value> {
        let found = match self.locals.get(&id) {
            Some(&distance) => Environment::get_at(&self.env, distance, name),
            None => self.globals.borrow().get(name),
        };
        found.map_err(|e| RuntimeError::from_env(e, span))
    }

    fn evaluate_super(&mut self, method: &Ident, id: NodeId, span: Span) -> Result<Value> {
        let distance = self
            .locals
            .get(&id)
            .copied()
            .ok_or_else(|| RuntimeError::UndefinedVariable {
                name: "super".to_string(),
                span,
            })?;
        let Value::Class(superclass) = Environment::get_at(&self.env, distance, "super")
            .map_err(|e| RuntimeError::from_env(e, span))?
        else {
            return Err(RuntimeError::SuperclassNotClass { span });
        };
        // `this` lives in the scope just inside the one holding `super`.
        let receiver = Environment::get_at(&self.env, distance.saturating_sub(1), "this")
            .map_err(|e| RuntimeError::from_env(e, span))?;

        let found = match receiver {
            Value::Class(_) => superclass.find_static_method(&method.text),
            _ => superclass.find_method(&method.text),
        };
        let found = found.ok_or_else(|| RuntimeError::UndefinedProperty {
            name: method.text.clone(),
            span: method.span,
        })?;
        Ok(Value::Function(Rc::new(found.bind(receiver))))
    }

    // ======= calls =======

    /// Invoke `callee` after checking arity and call depth.
    pub fn call(&mut self, callee: Callable, args: Vec<Value>, span: Span) -> Result<Value> {
        let expected = callee.arity();
        if args.len() != expected {
            return Err(RuntimeError::Arity {
                expected,
                got: args.len(),
                span,
            });
        }
        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(RuntimeError::StackOverflow { span });
        }

        self.call_depth += 1;
        tracing::trace!(depth = self.call_depth, "call");
        let result = ensure_sufficient_stack(|| match &callee {
            Callable::Function(function) => self.call_function(function, args, span),
            Callable::Class(class) => self.instantiate(class, args, span),
            Callable::Builtin(builtin) => {
                (builtin.func)(self, &args).map_err(|error| RuntimeError::Host {
                    name: builtin.name.to_string(),
                    error,
                    span,
                })
            }
        });
        self.call_depth -= 1;
        result
    }

    fn call_function(&mut self, function: &Function, args: Vec<Value>, span: Span) -> Result<Value> {
        let frame = Environment::child(&function.closure);
        {
            let mut frame = frame.borrow_mut();
            for (param, arg) in function.decl.params.iter().zip(args) {
                frame
                    .define(&param.text, Some(arg))
                    .map_err(|e| RuntimeError::from_env(e, param.span))?;
            }
        }

        let flow = self.execute_block(&function.decl.body, frame)?;
        if function.is_initializer {
            return Environment::get_at(&function.closure, 0, "this")
                .map_err(|e| RuntimeError::from_env(e, span));
        }
        Ok(match flow {
            ControlFlow::Return(value) => value,
            _ => Value::Nil,
        })
    }

    fn instantiate(&mut self, class: &Rc<Class>, args: Vec<Value>, span: Span) -> Result<Value> {
        let instance = Rc::new(Instance::new(Rc::clone(class)));
        if let Some(init) = class.initializer() {
            let bound = init.bind(Value::Instance(Rc::clone(&instance)));
            self.call_function(&bound, args, span)?;
        }
        Ok(Value::Instance(instance))
    }
}

/// Instances expose fields and bound methods; classes expose static methods.
fn get_property(object: Value, name: &Ident) -> Result<Value> {
    let found = match &object {
        Value::Instance(instance) => instance.get(&name.text),
        Value::Class(class) => class
            .find_static_method(&name.text)
            .map(|method| Value::Function(Rc::new(method.bind(object.clone())))),
        _ => return Err(RuntimeError::NotAnInstance { span: name.span }),
    };
    found.ok_or_else(|| RuntimeError::UndefinedProperty {
        name: name.text.clone(),
        span: name.span,
    })
}

fn binary(op: BinOp, lhs: Value, rhs: Value, span: Span) -> Result<Value> {
    match op {
        BinOp::Comma => Ok(rhs),
        BinOp::Eq => Ok(Value::Bool(lhs == rhs)),
        BinOp::Ne => Ok(Value::Bool(lhs != rhs)),
        BinOp::Lt => Ok(Value::Bool(compare(&lhs, &rhs, span)? < 0)),
        BinOp::Le => Ok(Value::Bool(compare(&lhs, &rhs, span)? <= 0)),
        BinOp::Gt => Ok(Value::Bool(compare(&lhs, &rhs, span)? > 0)),
        BinOp::Ge => Ok(Value::Bool(compare(&lhs, &rhs, span)? >= 0)),
        BinOp::Add => add(lhs, rhs, span),
        BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem => arithmetic(op, &lhs, &rhs, span),
    }
}

/// Numbers add; a string on either side turns `+` into concatenation.
fn add(lhs: Value, rhs: Value, span: Span) -> Result<Value> {
    match (&lhs, &rhs) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
        (Value::Str(_), _) | (_, Value::Str(_)) => Ok(Value::Str(format!("{}{}", lhs, rhs))),
        _ => Err(RuntimeError::TypeError {
            message: "Operands must be two numbers or one of them must be a string.",
            span,
        }),
    }
}

fn arithmetic(op: BinOp, lhs: &Value, rhs: &Value, span: Span) -> Result<Value> {
    let (Value::Number(a), Value::Number(b)) = (lhs, rhs) else {
        return Err(RuntimeError::TypeError {
            message: "Operands must be numbers.",
            span,
        });
    };
    let n = match op {
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        _ => a % b,
    };
    Ok(Value::Number(n))
}

/// Ordering sign of two operands. Numbers compare by their difference
/// truncated toward zero, so values less than 1 apart compare equal.
fn compare(lhs: &Value, rhs: &Value, span: Span) -> Result<i32> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => Ok((a - b) as i32),
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b) as i32),
        _ => Err(RuntimeError::TypeError {
            message: "Operands must be two numbers or two strings.",
            span,
        }),
    }
}
