// crates/quill-resolve/src/error.rs
// Static errors reported by the resolver

use quill_ast::span::Span;

/// Errors found during static resolution.
///
/// None of these abort the pass; the resolver records them and keeps going so
/// a single run surfaces every problem in the program.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind"))]
pub enum ResolveError {
    /// A name declared twice in the same local scope
    DuplicateDeclaration { name: String, span: Span },
    /// `var x = x;` reads the variable being declared
    SelfReferencingInitializer { name: String, span: Span },
    /// `return` outside any function body
    ReturnOutsideFunction { span: Span },
    /// `return value;` inside an `init` method
    ReturnValueFromInitializer { span: Span },
    /// `break` outside any loop body
    BreakOutsideLoop { span: Span },
    /// `continue` outside any loop body
    ContinueOutsideLoop { span: Span },
    /// `this` outside a class body
    ThisOutsideClass { span: Span },
    /// `this` inside a class-level (static) method
    ThisInStaticMethod { span: Span },
    /// `super` outside a class body
    SuperOutsideClass { span: Span },
    /// `super` in a class that declares no superclass
    SuperWithoutSuperclass { span: Span },
    /// `class init(a) {}`; static initializers take no arguments
    StaticInitializerParams { span: Span },
    /// `class A < A {}`
    InheritFromSelf { name: String, span: Span },
}

impl ResolveError {
    pub fn span(&self) -> Span {
        match self {
            ResolveError::DuplicateDeclaration { span, .. }
            | ResolveError::SelfReferencingInitializer { span, .. }
            | ResolveError::ReturnOutsideFunction { span }
            | ResolveError::ReturnValueFromInitializer { span }
            | ResolveError::BreakOutsideLoop { span }
            | ResolveError::ContinueOutsideLoop { span }
            | ResolveError::ThisOutsideClass { span }
            | ResolveError::ThisInStaticMethod { span }
            | ResolveError::SuperOutsideClass { span }
            | ResolveError::SuperWithoutSuperclass { span }
            | ResolveError::StaticInitializerParams { span }
            | ResolveError::InheritFromSelf { span, .. } => *span,
        }
    }
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ResolveError::DuplicateDeclaration { name, .. } => {
                write!(f, "Variable '{}' is already declared in this scope.", name)
            }
            ResolveError::SelfReferencingInitializer { name, .. } => {
                write!(
                    f,
                    "Cannot read local variable '{}' in its own initializer.",
                    name
                )
            }
            ResolveError::ReturnOutsideFunction { .. } => {
                write!(f, "Cannot return from top-level code.")
            }
            ResolveError::ReturnValueFromInitializer { .. } => {
                write!(f, "Cannot return a value from an initializer.")
            }
            ResolveError::BreakOutsideLoop { .. } => {
                write!(f, "Cannot break from outside a loop.")
            }
            ResolveError::ContinueOutsideLoop { .. } => {
                write!(f, "Cannot continue from outside a loop.")
            }
            ResolveError::ThisOutsideClass { .. } => {
                write!(f, "Cannot use 'this' outside of a class.")
            }
            ResolveError::ThisInStaticMethod { .. } => {
                write!(f, "Cannot use 'this' in a static method.")
            }
            ResolveError::SuperOutsideClass { .. } => {
                write!(f, "Cannot use 'super' outside of a class.")
            }
            ResolveError::SuperWithoutSuperclass { .. } => {
                write!(f, "Cannot use 'super' in a class with no superclass.")
            }
            ResolveError::StaticInitializerParams { .. } => {
                write!(f, "A static initializer cannot take parameters.")
            }
            ResolveError::InheritFromSelf { .. } => {
                write!(f, "A class cannot inherit from itself.")
            }
        }
    }
}

impl std::error::Error for ResolveError {}
