use crate::lexer::Lexer;
use crate::token::{Tok, TokKind};
use quill_ast::ast::{
    BinOp, ClassDecl, Expr, FnDecl, Ident, Lit, LogicOp, NodeId, Program, Stmt, UnOp,
};
use quill_ast::span::Span;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Maximum nesting of blocks/expressions before the parser gives up.
pub const MAX_NESTING_DEPTH: u32 = 256;

/// Maximum number of parameters or call arguments.
pub const MAX_ARGS: usize = 255;

/// Source of node ids. Shared by every parse in the process, so trees from
/// separate parses never hand out the same id.
static NEXT_NODE_ID: AtomicU32 = AtomicU32::new(0);

/// A syntax error with the span of the offending token.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseError {}

type Result<T> = std::result::Result<T, ParseError>;

macro_rules! bail_at {
    ($span:expr, $($arg:tt)*) => {
        return Err(ParseError {
            message: format!($($arg)*),
            span: $span,
        })
    };
}

pub fn parse_str(file: &str, src: &str) -> Result<Program> {
    let mut p = Parser::new(src);
    let program = p.parse_program()?;
    tracing::debug!(
        file,
        stmts = program.stmts.len(),
        nodes = p.nodes,
        "parsed program"
    );
    Ok(program)
}

struct Parser<'a> {
    lex: Lexer<'a>,
    cur: Tok,
    nxt: Tok,
    /// Ids handed out by this parse
    nodes: u32,
    depth: u32,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        let mut lex = Lexer::new(src);
        let cur = lex.next_tok();
        let nxt = lex.next_tok();
        Self {
            lex,
            cur,
            nxt,
            nodes: 0,
            depth: 0,
        }
    }

    fn bump(&mut self) {
        self.cur = std::mem::replace(&mut self.nxt, self.lex.next_tok());
    }

    fn at(&self, k: &TokKind) -> bool {
        std::mem::discriminant(&self.cur.kind) == std::mem::discriminant(k)
    }

    fn expect(&mut self, k: TokKind) -> Result<Tok> {
        if self.at(&k) {
            let t = self.cur.clone();
            self.bump();
            Ok(t)
        } else {
            self.unexpected(&format!("{:?}", k))
        }
    }

    fn unexpected<T>(&self, wanted: &str) -> Result<T> {
        match &self.cur.kind {
            TokKind::Error(msg) => bail_at!(self.cur.span, "{}", msg),
            other => bail_at!(self.cur.span, "expected {}, found {:?}", wanted, other),
        }
    }

    fn node_id(&mut self) -> NodeId {
        self.nodes += 1;
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            bail_at!(
                self.cur.span,
                "nesting depth limit exceeded (limit: {})",
                MAX_NESTING_DEPTH
            );
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    // ======= program / declarations =======

    fn parse_program(&mut self) -> Result<Program> {
        let start = self.cur.span.start;
        let mut stmts = Vec::new();
        while !matches!(self.cur.kind, TokKind::Eof) {
            stmts.push(self.parse_declaration()?);
        }
        Ok(Program {
            stmts,
            span: Span {
                start,
                end: self.cur.span.end,
            },
        })
    }

    fn parse_declaration(&mut self) -> Result<Stmt> {
        match self.cur.kind {
            TokKind::KwClass => Ok(Stmt::Class(self.parse_class()?)),
            // `fun name(...)` declares; a bare `fun (...)` is an expression statement
            TokKind::KwFun if matches!(self.nxt.kind, TokKind::Ident(_)) => {
                let start = self.cur.span;
                self.bump();
                Ok(Stmt::Fn(self.parse_function(true, start)?))
            }
            TokKind::KwVar => self.parse_var(),
            _ => self.parse_statement(),
        }
    }

    fn parse_ident(&mut self) -> Result<Ident> {
        match &self.cur.kind {
            TokKind::Ident(s) => {
                let id = Ident {
                    text: s.clone(),
                    span: self.cur.span,
                };
                self.bump();
                Ok(id)
            }
            _ => self.unexpected("identifier"),
        }
    }

    fn parse_class(&mut self) -> Result<ClassDecl> {
        let start = self.expect(TokKind::KwClass)?.span;
        let name = self.parse_ident()?;

        let superclass = if matches!(self.cur.kind, TokKind::Lt) {
            self.bump();
            let name = self.parse_ident()?;
            Some(Expr::Var {
                name,
                id: self.node_id(),
            })
        } else {
            None
        };

        self.expect(TokKind::LBrace)?;
        let mut methods = Vec::new();
        let mut static_methods = Vec::new();
        while !matches!(self.cur.kind, TokKind::RBrace | TokKind::Eof) {
            let start = self.cur.span;
            if matches!(self.cur.kind, TokKind::KwClass) {
                self.bump();
                static_methods.push(self.parse_function(true, start)?);
            } else {
                methods.push(self.parse_function(true, start)?);
            }
        }
        let end = self.expect(TokKind::RBrace)?.span;

        Ok(ClassDecl {
            name,
            superclass,
            methods,
            static_methods,
            span: start.to(end),
        })
    }

    /// Parse `name? (params) { body }`; the `fun` keyword (if any) is already consumed.
    fn parse_function(&mut self, named: bool, start: Span) -> Result<Rc<FnDecl>> {
        let name = if named || matches!(self.cur.kind, TokKind::Ident(_)) {
            Some(self.parse_ident()?)
        } else {
            None
        };

        self.expect(TokKind::LParen)?;
        let params = self.parse_params()?;
        self.expect(TokKind::RParen)?;

        let (body, body_span) = self.parse_block()?;

        Ok(Rc::new(FnDecl {
            name,
            params,
            body,
            span: start.to(body_span),
        }))
    }

    fn parse_params(&mut self) -> Result<Vec<Ident>> {
        let mut params = Vec::new();

        // Empty param list: ()
        if matches!(self.cur.kind, TokKind::RParen) {
            return Ok(params);
        }

        loop {
            if params.len() >= MAX_ARGS {
                bail_at!(
                    self.cur.span,
                    "cannot have more than {} parameters",
                    MAX_ARGS
                );
            }
            params.push(self.parse_ident()?);
            if !matches!(self.cur.kind, TokKind::Comma) {
                break;
            }
            self.bump(); // consume comma
        }

        Ok(params)
    }

    fn parse_var(&mut self) -> Result<Stmt> {
        let start = self.expect(TokKind::KwVar)?.span;
        let name = self.parse_ident()?;
        let init = if matches!(self.cur.kind, TokKind::Eq) {
            self.bump();
            Some(self.parse_expr()?)
        } else {
            None
        };
        let end = self.expect(TokKind::Semicolon)?.span;
        Ok(Stmt::Var {
            name,
            init,
            span: start.to(end),
        })
    }

    // ======= statements =======

    fn parse_statement(&mut self) -> Result<Stmt> {
        self.enter()?;
        let stmt = self.parse_statement_inner();
        self.leave();
        stmt
    }

    fn parse_statement_inner(&mut self) -> Result<Stmt> {
        let start = self.cur.span;
        match self.cur.kind {
            TokKind::KwPrint => {
                self.bump();
                let expr = self.parse_expr()?;
                let end = self.expect(TokKind::Semicolon)?.span;
                Ok(Stmt::Print {
                    expr,
                    span: start.to(end),
                })
            }
            TokKind::LBrace => {
                let (stmts, span) = self.parse_block()?;
                Ok(Stmt::Block { stmts, span })
            }
            TokKind::KwIf => self.parse_if(),
            TokKind::KwWhile => self.parse_while(),
            TokKind::KwFor => self.parse_for(),
            TokKind::KwBreak => {
                self.bump();
                let end = self.expect(TokKind::Semicolon)?.span;
                Ok(Stmt::Break {
                    span: start.to(end),
                })
            }
            TokKind::KwContinue => {
                self.bump();
                let end = self.expect(TokKind::Semicolon)?.span;
                Ok(Stmt::Continue {
                    span: start.to(end),
                })
            }
            TokKind::KwReturn => self.parse_return(),
            _ => {
                let expr = self.parse_expr()?;
                let end = self.expect(TokKind::Semicolon)?.span;
                Ok(Stmt::Expr {
                    expr,
                    span: start.to(end),
                })
            }
        }
    }

    /// Parse a block: `{ declaration* }`
    fn parse_block(&mut self) -> Result<(Vec<Stmt>, Span)> {
        let start = self.expect(TokKind::LBrace)?.span;
        let mut stmts = Vec::new();
        while !matches!(self.cur.kind, TokKind::RBrace | TokKind::Eof) {
            stmts.push(self.parse_declaration()?);
        }
        let end = self.expect(TokKind::RBrace)?.span;
        Ok((stmts, start.to(end)))
    }

    /// Parse a return statement: `return [expr];`
    fn parse_return(&mut self) -> Result<Stmt> {
        let start = self.expect(TokKind::KwReturn)?.span;

        // Optional return value
        let value = if matches!(self.cur.kind, TokKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };

        let end = self.expect(TokKind::Semicolon)?.span;
        Ok(Stmt::Return {
            value,
            span: start.to(end),
        })
    }

    /// Parse `if (cond) stmt [else stmt]`
    fn parse_if(&mut self) -> Result<Stmt> {
        let start = self.expect(TokKind::KwIf)?.span;
        self.expect(TokKind::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(TokKind::RParen)?;

        let then_ = Box::new(self.parse_statement()?);
        let else_ = if matches!(self.cur.kind, TokKind::KwElse) {
            self.bump(); // consume 'else'
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };

        let end = else_.as_ref().map(|s| s.span()).unwrap_or(then_.span());
        Ok(Stmt::If {
            cond,
            then_,
            else_,
            span: start.to(end),
        })
    }

    /// Parse a while loop: `while (cond) stmt`
    fn parse_while(&mut self) -> Result<Stmt> {
        let start = self.expect(TokKind::KwWhile)?.span;
        self.expect(TokKind::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(TokKind::RParen)?;
        let body = Box::new(self.parse_statement()?);
        let span = start.to(body.span());

        Ok(Stmt::While {
            cond,
            body,
            increment: None,
            span,
        })
    }

    /// Parse `for (init; cond; incr) stmt` into a `while` wrapped in a block.
    fn parse_for(&mut self) -> Result<Stmt> {
        let start = self.expect(TokKind::KwFor)?.span;
        self.expect(TokKind::LParen)?;

        let init = match self.cur.kind {
            TokKind::Semicolon => {
                self.bump();
                None
            }
            TokKind::KwVar => Some(self.parse_var()?),
            _ => {
                let expr = self.parse_expr()?;
                let end = self.expect(TokKind::Semicolon)?.span;
                Some(Stmt::Expr {
                    span: expr.span().to(end),
                    expr,
                })
            }
        };

        let cond = if matches!(self.cur.kind, TokKind::Semicolon) {
            Expr::Lit(Lit::Bool(true), self.cur.span)
        } else {
            self.parse_expr()?
        };
        self.expect(TokKind::Semicolon)?;

        let increment = if matches!(self.cur.kind, TokKind::RParen) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(TokKind::RParen)?;

        let body = Box::new(self.parse_statement()?);
        let span = start.to(body.span());
        let looped = Stmt::While {
            cond,
            body,
            increment,
            span,
        };

        Ok(match init {
            Some(init) => Stmt::Block {
                stmts: vec![init, looped],
                span,
            },
            None => looped,
        })
    }

    // ======= expressions (Pratt parser) =======
    //
    // Precedence (low -> high):
    //   1:  ,   (comma operator)
    //   4:  =   (right associative)
    //   5:  or
    //   7:  and
    //   9:  == !=
    //   11: < <= > >=
    //   13: + -
    //   15: * / %
    // prefix (unary) binds tighter than all infix; we give it rbp = 100.
    // Calls and property access are postfix and bind tightest.

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_expr_bp(0)
    }

    /// An expression that stops at a top-level comma (call arguments).
    fn parse_assignment(&mut self) -> Result<Expr> {
        self.parse_expr_bp(3)
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> Result<Expr> {
        self.enter()?;
        let expr = self.parse_expr_bp_inner(min_bp);
        self.leave();
        expr
    }

    fn parse_expr_bp_inner(&mut self, min_bp: u8) -> Result<Expr> {
        let mut lhs = self.parse_prefix()?;

        loop {
            match self.cur.kind {
                // call application (tightest)
                TokKind::LParen => {
                    lhs = self.parse_call(lhs)?;
                    continue;
                }
                TokKind::Dot => {
                    self.bump();
                    let name = self.parse_ident()?;
                    let span = lhs.span().to(name.span);
                    lhs = Expr::Get {
                        object: Box::new(lhs),
                        name,
                        span,
                    };
                    continue;
                }
                TokKind::Eq => {
                    if 4 < min_bp {
                        break;
                    }
                    let eq_span = self.cur.span;
                    self.bump();
                    let value = Box::new(self.parse_expr_bp(3)?);
                    let span = lhs.span().to(value.span());
                    lhs = match lhs {
                        Expr::Var { name, .. } => Expr::Assign {
                            name,
                            value,
                            id: self.node_id(),
                            span,
                        },
                        Expr::Get { object, name, .. } => Expr::Set {
                            object,
                            name,
                            value,
                            span,
                        },
                        _ => bail_at!(eq_span, "invalid assignment target"),
                    };
                    continue;
                }
                _ => {}
            }

            let (op, lbp, rbp) = match self.cur.kind {
                TokKind::Comma => (Infix::Binary(BinOp::Comma), 1, 2),
                // logical
                TokKind::KwOr => (Infix::Logical(LogicOp::Or), 5, 6),
                TokKind::KwAnd => (Infix::Logical(LogicOp::And), 7, 8),
                // equality
                TokKind::EqEq => (Infix::Binary(BinOp::Eq), 9, 10),
                TokKind::BangEq => (Infix::Binary(BinOp::Ne), 9, 10),
                // relational
                TokKind::Lt => (Infix::Binary(BinOp::Lt), 11, 12),
                TokKind::Le => (Infix::Binary(BinOp::Le), 11, 12),
                TokKind::Gt => (Infix::Binary(BinOp::Gt), 11, 12),
                TokKind::Ge => (Infix::Binary(BinOp::Ge), 11, 12),
                // arithmetic
                TokKind::Plus => (Infix::Binary(BinOp::Add), 13, 14),
                TokKind::Minus => (Infix::Binary(BinOp::Sub), 13, 14),
                TokKind::Star => (Infix::Binary(BinOp::Mul), 15, 16),
                TokKind::Slash => (Infix::Binary(BinOp::Div), 15, 16),
                TokKind::Percent => (Infix::Binary(BinOp::Rem), 15, 16),
                _ => break,
            };

            if lbp < min_bp {
                break;
            }
            self.bump(); // consume operator
            let rhs = self.parse_expr_bp(rbp)?;
            let span = lhs.span().to(rhs.span());
            lhs = match op {
                Infix::Binary(op) => Expr::Binary {
                    lhs: Box::new(lhs),
                    op,
                    rhs: Box::new(rhs),
                    span,
                },
                Infix::Logical(op) => Expr::Logical {
                    lhs: Box::new(lhs),
                    op,
                    rhs: Box::new(rhs),
                    span,
                },
            };
        }

        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> Result<Expr> {
        // Snapshot current token to avoid borrow issues when bumping
        let tok_kind = self.cur.kind.clone();
        let tok_span = self.cur.span;

        match tok_kind {
            // unary prefix
            TokKind::Bang | TokKind::Minus => {
                self.bump();
                let op = if tok_kind == TokKind::Bang {
                    UnOp::Not
                } else {
                    UnOp::Neg
                };
                let inner = self.parse_expr_bp(100)?;
                let span = tok_span.to(inner.span());
                Ok(Expr::Unary {
                    op,
                    expr: Box::new(inner),
                    span,
                })
            }

            // primaries
            TokKind::Number(v) => {
                self.bump();
                Ok(Expr::Lit(Lit::Number(v), tok_span))
            }
            TokKind::Str(s) => {
                self.bump();
                Ok(Expr::Lit(Lit::Str(s), tok_span))
            }
            TokKind::KwTrue => {
                self.bump();
                Ok(Expr::Lit(Lit::Bool(true), tok_span))
            }
            TokKind::KwFalse => {
                self.bump();
                Ok(Expr::Lit(Lit::Bool(false), tok_span))
            }
            TokKind::KwNil => {
                self.bump();
                Ok(Expr::Lit(Lit::Nil, tok_span))
            }

            TokKind::Ident(_) => {
                let name = self.parse_ident()?;
                Ok(Expr::Var {
                    name,
                    id: self.node_id(),
                })
            }

            TokKind::KwThis => {
                self.bump();
                Ok(Expr::This {
                    id: self.node_id(),
                    span: tok_span,
                })
            }

            TokKind::KwSuper => {
                self.bump();
                self.expect(TokKind::Dot)?;
                let method = self.parse_ident()?;
                let span = tok_span.to(method.span);
                Ok(Expr::Super {
                    method,
                    id: self.node_id(),
                    span,
                })
            }

            TokKind::LParen => {
                self.bump(); // '('
                let inner = self.parse_expr()?;
                let end_tok = self.expect(TokKind::RParen)?;
                Ok(Expr::Paren {
                    inner: Box::new(inner),
                    span: tok_span.to(end_tok.span),
                })
            }

            // Function literal, optionally named
            TokKind::KwFun => {
                self.bump();
                Ok(Expr::Function(self.parse_function(false, tok_span)?))
            }

            TokKind::Error(msg) => bail_at!(tok_span, "{}", msg),

            _ => bail_at!(tok_span, "expected expression, found {:?}", tok_kind),
        }
    }

    fn parse_call(&mut self, callee: Expr) -> Result<Expr> {
        self.expect(TokKind::LParen)?; // we are at '('
        let mut args = Vec::new();
        if !matches!(self.cur.kind, TokKind::RParen) {
            loop {
                if args.len() >= MAX_ARGS {
                    bail_at!(
                        self.cur.span,
                        "cannot have more than {} arguments",
                        MAX_ARGS
                    );
                }
                args.push(self.parse_assignment()?);
                if matches!(self.cur.kind, TokKind::Comma) {
                    self.bump();
                    continue;
                }
                break;
            }
        }
        let end = self.expect(TokKind::RParen)?.span;
        let span = callee.span().to(end);
        Ok(Expr::Call {
            callee: Box::new(callee),
            args,
            span,
        })
    }
}

enum Infix {
    Binary(BinOp),
    Logical(LogicOp),
}
