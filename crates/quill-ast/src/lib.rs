pub mod span {
    use serde::Serialize;

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
    pub struct Span {
        pub start: u32,
        pub end: u32,
    }

    impl Span {
        pub fn new(start: u32, end: u32) -> Self {
            Self { start, end }
        }

        /// Smallest span covering both `self` and `other`.
        pub fn to(self, other: Span) -> Span {
            Span {
                start: self.start.min(other.start),
                end: self.end.max(other.end),
            }
        }

        /// 1-based (line, column) of the span start within `src`.
        pub fn line_col(&self, src: &str) -> (usize, usize) {
            let offset = (self.start as usize).min(src.len());
            let mut line = 1;
            let mut col = 1;
            for (i, ch) in src.char_indices() {
                if i >= offset {
                    break;
                }
                if ch == '\n' {
                    line += 1;
                    col = 1;
                } else {
                    col += 1;
                }
            }
            (line, col)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::Span;

        #[test]
        fn line_col_counts_from_one() {
            let src = "var a = 1;\nprint a;";
            assert_eq!(Span::new(0, 3).line_col(src), (1, 1));
            assert_eq!(Span::new(11, 16).line_col(src), (2, 1));
            assert_eq!(Span::new(17, 18).line_col(src), (2, 7));
        }

        #[test]
        fn line_col_clamps_past_end() {
            assert_eq!(Span::new(99, 99).line_col("ab"), (1, 3));
        }
    }
}

pub mod ast {
    use super::span::Span;
    use serde::Serialize;
    use std::rc::Rc;

    /// Identity of a reference node, unique within one parse.
    ///
    /// The resolver keys its scope-distance table on these.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
    pub struct NodeId(pub u32);

    #[derive(Debug, Serialize)]
    pub struct Program {
        pub stmts: Vec<Stmt>,
        pub span: Span,
    }

    #[derive(Debug, Clone, Serialize)]
    pub struct Ident {
        pub text: String,
        pub span: Span,
    }

    /// A function declaration or literal. Shared by every closure created from it.
    #[derive(Debug, Serialize)]
    pub struct FnDecl {
        /// `None` for anonymous function literals.
        pub name: Option<Ident>,
        pub params: Vec<Ident>,
        pub body: Vec<Stmt>,
        pub span: Span,
    }

    impl FnDecl {
        pub fn display_name(&self) -> &str {
            self.name.as_ref().map(|n| n.text.as_str()).unwrap_or("")
        }
    }

    #[derive(Debug, Clone, Serialize)]
    pub struct ClassDecl {
        pub name: Ident,
        /// Always an `Expr::Var` when present.
        pub superclass: Option<Expr>,
        pub methods: Vec<Rc<FnDecl>>,
        /// Methods declared with a leading `class` keyword.
        pub static_methods: Vec<Rc<FnDecl>>,
        pub span: Span,
    }

    #[derive(Debug, Clone, Serialize)]
    pub enum Stmt {
        Expr {
            expr: Expr,
            span: Span,
        },
        Print {
            expr: Expr,
            span: Span,
        },
        Var {
            name: Ident,
            init: Option<Expr>,
            span: Span,
        },
        Block {
            stmts: Vec<Stmt>,
            span: Span,
        },
        If {
            cond: Expr,
            then_: Box<Stmt>,
            else_: Option<Box<Stmt>>,
            span: Span,
        },
        While {
            cond: Expr,
            body: Box<Stmt>,
            /// Set for desugared `for` loops; runs after every body pass.
            increment: Option<Expr>,
            span: Span,
        },
        Break {
            span: Span,
        },
        Continue {
            span: Span,
        },
        Return {
            value: Option<Expr>,
            span: Span,
        },
        Fn(Rc<FnDecl>),
        Class(ClassDecl),
    }

    impl Stmt {
        pub fn span(&self) -> Span {
            match self {
                Stmt::Expr { span, .. }
                | Stmt::Print { span, .. }
                | Stmt::Var { span, .. }
                | Stmt::Block { span, .. }
                | Stmt::If { span, .. }
                | Stmt::While { span, .. }
                | Stmt::Break { span }
                | Stmt::Continue { span }
                | Stmt::Return { span, .. } => *span,
                Stmt::Fn(decl) => decl.span,
                Stmt::Class(decl) => decl.span,
            }
        }
    }

    #[derive(Debug, Clone, Serialize)]
    pub enum Expr {
        Lit(Lit, Span),
        Var {
            name: Ident,
            id: NodeId,
        },
        Assign {
            name: Ident,
            value: Box<Expr>,
            id: NodeId,
            span: Span,
        },
        Unary {
            op: UnOp,
            expr: Box<Expr>,
            span: Span,
        },
        Binary {
            lhs: Box<Expr>,
            op: BinOp,
            rhs: Box<Expr>,
            span: Span,
        },
        /// Short-circuiting `and` / `or`.
        Logical {
            lhs: Box<Expr>,
            op: LogicOp,
            rhs: Box<Expr>,
            span: Span,
        },
        Paren {
            inner: Box<Expr>,
            span: Span,
        },
        Call {
            callee: Box<Expr>,
            args: Vec<Expr>,
            span: Span,
        },
        Get {
            object: Box<Expr>,
            name: Ident,
            span: Span,
        },
        Set {
            object: Box<Expr>,
            name: Ident,
            value: Box<Expr>,
            span: Span,
        },
        This {
            id: NodeId,
            span: Span,
        },
        Super {
            method: Ident,
            id: NodeId,
            span: Span,
        },
        Function(Rc<FnDecl>),
    }

    impl Expr {
        pub fn span(&self) -> Span {
            match self {
                Expr::Lit(_, span) => *span,
                Expr::Var { name, .. } => name.span,
                Expr::Assign { span, .. }
                | Expr::Unary { span, .. }
                | Expr::Binary { span, .. }
                | Expr::Logical { span, .. }
                | Expr::Paren { span, .. }
                | Expr::Call { span, .. }
                | Expr::Get { span, .. }
                | Expr::Set { span, .. }
                | Expr::This { span, .. }
                | Expr::Super { span, .. } => *span,
                Expr::Function(decl) => decl.span,
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub enum UnOp {
        Not,
        Neg,
    }

    #[derive(Debug, Clone, Serialize)]
    pub enum Lit {
        Number(f64),
        Str(String),
        Bool(bool),
        Nil,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub enum LogicOp {
        Or,
        And,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub enum BinOp {
        // sequencing
        Comma,
        // equality
        Eq,
        Ne,
        // relational
        Lt,
        Le,
        Gt,
        Ge,
        // arithmetic
        Add,
        Sub,
        Mul,
        Div,
        Rem,
    }
}
