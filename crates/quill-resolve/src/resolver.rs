// crates/quill-resolve/src/resolver.rs
// Scope resolver for Quill - computes variable distances and static legality

use crate::error::ResolveError;
use quill_ast::ast::{ClassDecl, Expr, FnDecl, Ident, NodeId, Program, Stmt};
use quill_ast::span::Span;
use std::collections::HashMap;

/// Reference node -> number of scopes between the use and its declaration.
///
/// References without an entry are globals.
pub type Locals = HashMap<NodeId, usize>;

/// Output of one resolution pass.
#[derive(Debug, Default)]
pub struct Resolution {
    pub locals: Locals,
    pub errors: Vec<ResolveError>,
}

impl Resolution {
    /// True when the program has no static errors and may be evaluated.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Scope distance recorded for a reference node, if it is local.
    pub fn distance(&self, id: NodeId) -> Option<usize> {
        self.locals.get(&id).copied()
    }
}

/// Resolve a whole program with a fresh resolver.
pub fn resolve(program: &Program) -> Resolution {
    Resolver::new().resolve_program(program)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FunctionKind {
    None,
    Function,
    Method,
    Initializer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LoopKind {
    None,
    Loop,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ClassKind {
    None,
    Class,
    Subclass,
}

/// Whether method bodies being resolved belong to instances or to the class itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Dispatch {
    Instance,
    Static,
}

/// Everything that gates statement legality. Saved and restored around each
/// nested construct so it never leaks into siblings.
#[derive(Clone, Copy, Debug)]
struct Context {
    function: FunctionKind,
    looping: LoopKind,
    class: ClassKind,
    dispatch: Dispatch,
}

/// Static resolver: one pre-order walk over the tree.
pub struct Resolver {
    /// Innermost scope last; `false` marks "declared, initializer not finished"
    scopes: Vec<HashMap<String, bool>>,
    locals: Locals,
    errors: Vec<ResolveError>,
    ctx: Context,
    /// Global `var` whose initializer is being resolved
    pending_global: Option<String>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            scopes: Vec::new(),
            locals: HashMap::new(),
            errors: Vec::new(),
            ctx: Context {
                function: FunctionKind::None,
                looping: LoopKind::None,
                class: ClassKind::None,
                dispatch: Dispatch::Instance,
            },
            pending_global: None,
        }
    }

    /// Resolve every statement, collecting all static errors.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn resolve_program(&mut self, program: &Program) -> Resolution {
        self.resolve_stmts(&program.stmts);
        let resolution = Resolution {
            locals: std::mem::take(&mut self.locals),
            errors: std::mem::take(&mut self.errors),
        };
        tracing::debug!(
            locals = resolution.locals.len(),
            errors = resolution.errors.len(),
            "resolved program"
        );
        resolution
    }

    fn error(&mut self, err: ResolveError) {
        tracing::trace!(%err, "static error");
        self.errors.push(err);
    }

    /// Run `f` under `ctx`, restoring the enclosing context afterwards.
    fn with_context(&mut self, ctx: Context, f: impl FnOnce(&mut Self)) {
        let enclosing = std::mem::replace(&mut self.ctx, ctx);
        f(self);
        self.ctx = enclosing;
    }

    // ======= scopes =======

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Ident) {
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };
        if scope.insert(name.text.clone(), false).is_some() {
            self.error(ResolveError::DuplicateDeclaration {
                name: name.text.clone(),
                span: name.span,
            });
        }
    }

    fn define(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), true);
        }
    }

    fn resolve_local(&mut self, id: NodeId, name: &str) {
        for (i, scope) in self.scopes.iter().enumerate().rev() {
            if scope.contains_key(name) {
                self.locals.insert(id, self.scopes.len() - 1 - i);
                return;
            }
        }
        // Not found: assumed global, looked up directly at run time.
    }

    // ======= statements =======

    fn resolve_stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.resolve_stmt(stmt);
        }
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr { expr, .. } | Stmt::Print { expr, .. } => self.resolve_expr(expr),

            Stmt::Var { name, init, .. } => {
                self.declare(name);
                if let Some(init) = init {
                    let pending = if self.scopes.is_empty() {
                        self.pending_global.replace(name.text.clone())
                    } else {
                        self.pending_global.take()
                    };
                    self.resolve_expr(init);
                    self.pending_global = pending;
                }
                self.define(&name.text);
            }

            Stmt::Block { stmts, .. } => {
                self.begin_scope();
                self.resolve_stmts(stmts);
                self.end_scope();
            }

            Stmt::If {
                cond, then_, else_, ..
            } => {
                self.resolve_expr(cond);
                self.resolve_stmt(then_);
                if let Some(else_) = else_ {
                    self.resolve_stmt(else_);
                }
            }

            Stmt::While {
                cond,
                body,
                increment,
                ..
            } => {
                self.resolve_expr(cond);
                let ctx = Context {
                    looping: LoopKind::Loop,
                    ..self.ctx
                };
                self.with_context(ctx, |r| {
                    r.resolve_stmt(body);
                    if let Some(increment) = increment {
                        r.resolve_expr(increment);
                    }
                });
            }

            Stmt::Break { span } => {
                if self.ctx.looping == LoopKind::None {
                    self.error(ResolveError::BreakOutsideLoop { span: *span });
                }
            }

            Stmt::Continue { span } => {
                if self.ctx.looping == LoopKind::None {
                    self.error(ResolveError::ContinueOutsideLoop { span: *span });
                }
            }

            Stmt::Return { value, span } => {
                if self.ctx.function == FunctionKind::None {
                    self.error(ResolveError::ReturnOutsideFunction { span: *span });
                }
                if let Some(value) = value {
                    if self.ctx.function == FunctionKind::Initializer {
                        self.error(ResolveError::ReturnValueFromInitializer { span: *span });
                    }
                    self.resolve_expr(value);
                }
            }

            Stmt::Fn(decl) => {
                if let Some(name) = &decl.name {
                    self.declare(name);
                    self.define(&name.text);
                }
                self.resolve_function(decl, FunctionKind::Function);
            }

            Stmt::Class(decl) => self.resolve_class(decl),
        }
    }

    fn resolve_function(&mut self, decl: &FnDecl, kind: FunctionKind) {
        let ctx = Context {
            function: kind,
            looping: LoopKind::None,
            ..self.ctx
        };
        self.with_context(ctx, |r| {
            r.begin_scope();
            for param in &decl.params {
                r.declare(param);
                r.define(&param.text);
            }
            r.resolve_stmts(&decl.body);
            r.end_scope();
        });
    }

    fn resolve_class(&mut self, decl: &ClassDecl) {
        self.declare(&decl.name);
        self.define(&decl.name.text);

        let mut class_kind = ClassKind::Class;
        if let Some(superclass) = &decl.superclass {
            if let Expr::Var { name, .. } = superclass {
                if name.text == decl.name.text {
                    self.error(ResolveError::InheritFromSelf {
                        name: name.text.clone(),
                        span: name.span,
                    });
                }
            }
            class_kind = ClassKind::Subclass;
            self.resolve_expr(superclass);
        }

        let ctx = Context {
            class: class_kind,
            ..self.ctx
        };
        self.with_context(ctx, |r| {
            if class_kind == ClassKind::Subclass {
                r.begin_scope();
                r.define("super");
            }
            r.begin_scope();
            r.define("this");

            for method in &decl.methods {
                r.resolve_method(method, Dispatch::Instance);
            }
            for method in &decl.static_methods {
                r.resolve_method(method, Dispatch::Static);
            }

            r.end_scope();
            if class_kind == ClassKind::Subclass {
                r.end_scope();
            }
        });
    }

    fn resolve_method(&mut self, method: &FnDecl, dispatch: Dispatch) {
        let is_init = method.display_name() == "init";
        if is_init && dispatch == Dispatch::Static && !method.params.is_empty() {
            let span = method.name.as_ref().map(|n| n.span).unwrap_or(method.span);
            self.error(ResolveError::StaticInitializerParams { span });
        }
        let kind = if is_init {
            FunctionKind::Initializer
        } else {
            FunctionKind::Method
        };
        let ctx = Context {
            dispatch,
            ..self.ctx
        };
        self.with_context(ctx, |r| r.resolve_function(method, kind));
    }

    // ======= expressions =======

    fn resolve_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Lit(..) => {}

            Expr::Var { name, id } => {
                self.check_initializing(name);
                self.resolve_local(*id, &name.text);
            }

            Expr::Assign {
                name, value, id, ..
            } => {
                self.resolve_expr(value);
                self.resolve_local(*id, &name.text);
            }

            Expr::Unary { expr, .. } => self.resolve_expr(expr),
            Expr::Paren { inner, .. } => self.resolve_expr(inner),

            Expr::Binary { lhs, rhs, .. } | Expr::Logical { lhs, rhs, .. } => {
                self.resolve_expr(lhs);
                self.resolve_expr(rhs);
            }

            Expr::Call { callee, args, .. } => {
                self.resolve_expr(callee);
                for arg in args {
                    self.resolve_expr(arg);
                }
            }

            Expr::Get { object, .. } => self.resolve_expr(object),

            Expr::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }

            Expr::This { id, span } => self.resolve_this(*id, *span),

            Expr::Super { id, span, .. } => match self.ctx.class {
                ClassKind::None => self.error(ResolveError::SuperOutsideClass { span: *span }),
                ClassKind::Class => {
                    self.error(ResolveError::SuperWithoutSuperclass { span: *span })
                }
                ClassKind::Subclass => self.resolve_local(*id, "super"),
            },

            Expr::Function(decl) => {
                if let Some(name) = &decl.name {
                    self.declare(name);
                    self.define(&name.text);
                }
                self.resolve_function(decl, FunctionKind::Function);
            }
        }
    }

    fn resolve_this(&mut self, id: NodeId, span: Span) {
        if self.ctx.class == ClassKind::None {
            self.error(ResolveError::ThisOutsideClass { span });
        } else if self.ctx.dispatch == Dispatch::Static {
            self.error(ResolveError::ThisInStaticMethod { span });
        } else {
            self.resolve_local(id, "this");
        }
    }

    /// Report reads of a variable from inside its own initializer.
    fn check_initializing(&mut self, name: &Ident) {
        let reading_own_init = match self.scopes.last() {
            Some(scope) => scope.get(&name.text) == Some(&false),
            None => self.pending_global.as_deref() == Some(name.text.as_str()),
        };
        if reading_own_init {
            self.error(ResolveError::SelfReferencingInitializer {
                name: name.text.clone(),
                span: name.span,
            });
        }
    }
}
