//! Runtime values and the object model: functions, classes, instances.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use quill_ast::ast::FnDecl;
use quill_ast::span::Span;

use crate::env::{EnvRef, Environment};
use crate::host::Builtin;

/// Runtime values in Quill
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    Str(String),
    Function(Rc<Function>),
    Builtin(Rc<Builtin>),
    Class(Rc<Class>),
    Instance(Rc<Instance>),
}

impl Value {
    /// `nil`, `false` and numeric zero are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            _ => true,
        }
    }

    /// The value viewed as a call target, if it is one.
    pub fn as_callable(&self) -> Option<Callable> {
        match self {
            Value::Function(f) => Some(Callable::Function(Rc::clone(f))),
            Value::Class(c) => Some(Callable::Class(Rc::clone(c))),
            Value::Builtin(b) => Some(Callable::Builtin(Rc::clone(b))),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Function(_) | Value::Builtin(_) => "function",
            Value::Class(_) => "class",
            Value::Instance(_) => "instance",
        }
    }
}

/// `nil` equals only `nil`; objects compare by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => fmt_number(*n, f),
            Value::Str(s) => write!(f, "{s}"),
            Value::Function(func) => match func.decl.name.as_ref() {
                Some(name) => write!(f, "<fn {}>", name.text),
                None => write!(f, "<fn>"),
            },
            Value::Builtin(_) => write!(f, "<native fn>"),
            Value::Class(class) => write!(f, "{}", class.name),
            Value::Instance(instance) => write!(f, "{} instance", instance.class.name),
        }
    }
}

/// Integral numbers print without a fractional part; no exponent form is used.
fn fmt_number(n: f64, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    if n.is_infinite() {
        let sign = if n < 0.0 { "-" } else { "" };
        write!(f, "{sign}Infinity")
    } else {
        write!(f, "{n}")
    }
}

// ---------------------------------------------------------------------------
// Callable
// ---------------------------------------------------------------------------

/// Everything a call expression can invoke.
///
/// `Function` covers plain closures as well as methods bound to a receiver.
#[derive(Debug, Clone)]
pub enum Callable {
    Function(Rc<Function>),
    Class(Rc<Class>),
    Builtin(Rc<Builtin>),
}

impl Callable {
    /// Exact number of arguments a call must supply.
    pub fn arity(&self) -> usize {
        match self {
            Callable::Function(f) => f.arity(),
            Callable::Class(c) => c.arity(),
            Callable::Builtin(b) => b.arity,
        }
    }
}

// ---------------------------------------------------------------------------
// Function
// ---------------------------------------------------------------------------

/// A closure: a shared declaration plus the environment it was created in.
pub struct Function {
    pub decl: Rc<FnDecl>,
    pub closure: EnvRef,
    /// Initializers always produce the bound `this`, whatever they return.
    pub is_initializer: bool,
}

impl std::fmt::Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.decl.display_name())
            .field("arity", &self.arity())
            .field("is_initializer", &self.is_initializer)
            .finish()
    }
}

impl Function {
    pub fn new(decl: Rc<FnDecl>, closure: EnvRef, is_initializer: bool) -> Self {
        Self {
            decl,
            closure,
            is_initializer,
        }
    }

    /// The `init` given to classes that do not declare one.
    pub fn noop_initializer() -> Self {
        let decl = FnDecl {
            name: None,
            params: Vec::new(),
            body: Vec::new(),
            span: Span::default(),
        };
        Self::new(Rc::new(decl), Environment::new(), true)
    }

    /// A copy of this function whose closure defines `this` as `receiver`.
    pub fn bind(&self, receiver: Value) -> Function {
        let env = Environment::with_binding(&self.closure, "this", receiver);
        Function::new(Rc::clone(&self.decl), env, self.is_initializer)
    }

    pub fn arity(&self) -> usize {
        self.decl.params.len()
    }

    pub fn name(&self) -> &str {
        self.decl.display_name()
    }
}

// ---------------------------------------------------------------------------
// Class
// ---------------------------------------------------------------------------

/// A class with separate instance and class-level method tables.
pub struct Class {
    pub name: String,
    pub superclass: Option<Rc<Class>>,
    methods: HashMap<String, Rc<Function>>,
    static_methods: HashMap<String, Rc<Function>>,
}

impl std::fmt::Debug for Class {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut methods: Vec<_> = self.methods.keys().collect();
        methods.sort();
        let mut statics: Vec<_> = self.static_methods.keys().collect();
        statics.sort();
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("superclass", &self.superclass.as_ref().map(|s| &s.name))
            .field("methods", &methods)
            .field("static_methods", &statics)
            .finish()
    }
}

impl Class {
    /// Build a class. An empty `init` is synthesized when none is declared,
    /// so construction always has an initializer to run.
    pub fn new(
        name: String,
        superclass: Option<Rc<Class>>,
        mut methods: HashMap<String, Rc<Function>>,
        static_methods: HashMap<String, Rc<Function>>,
    ) -> Self {
        methods
            .entry("init".to_string())
            .or_insert_with(|| Rc::new(Function::noop_initializer()));
        Self {
            name,
            superclass,
            methods,
            static_methods,
        }
    }

    /// Instance method lookup through this class and then its superclass chain.
    pub fn find_method(&self, name: &str) -> Option<Rc<Function>> {
        match self.methods.get(name) {
            Some(method) => Some(Rc::clone(method)),
            None => self.superclass.as_ref()?.find_method(name),
        }
    }

    /// Class-level method lookup. Static methods are not inherited.
    pub fn find_static_method(&self, name: &str) -> Option<Rc<Function>> {
        self.static_methods.get(name).cloned()
    }

    pub fn initializer(&self) -> Option<Rc<Function>> {
        self.methods.get("init").cloned()
    }

    /// Construction takes exactly as many arguments as `init`.
    pub fn arity(&self) -> usize {
        self.initializer().map_or(0, |init| init.arity())
    }

    /// True when `other` is this class or one of its ancestors.
    pub fn is_subclass_of(&self, other: &Class) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        match &self.superclass {
            Some(superclass) => superclass.is_subclass_of(other),
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Instance
// ---------------------------------------------------------------------------

/// An object created by calling a class. Fields are added on first assignment.
pub struct Instance {
    pub class: Rc<Class>,
    fields: RefCell<HashMap<String, Value>>,
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields = self.fields.borrow();
        let mut names: Vec<_> = fields.keys().collect();
        names.sort();
        f.debug_struct("Instance")
            .field("class", &self.class.name)
            .field("fields", &names)
            .finish()
    }
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        Self {
            class,
            fields: RefCell::new(HashMap::new()),
        }
    }

    /// Own field first, then a method bound to this instance.
    pub fn get(self: &Rc<Self>, name: &str) -> Option<Value> {
        if let Some(value) = self.fields.borrow().get(name) {
            return Some(value.clone());
        }
        let method = self.class.find_method(name)?;
        let bound = method.bind(Value::Instance(Rc::clone(self)));
        Some(Value::Function(Rc::new(bound)))
    }

    pub fn set(&self, name: &str, value: Value) {
        self.fields.borrow_mut().insert(name.to_string(), value);
    }

    pub fn is_instance_of(&self, class: &Class) -> bool {
        self.class.is_subclass_of(class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(name: &str, superclass: Option<Rc<Class>>) -> Rc<Class> {
        Rc::new(Class::new(
            name.to_string(),
            superclass,
            HashMap::new(),
            HashMap::new(),
        ))
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(Value::Number(-2.5).is_truthy());
        assert!(Value::Str("0".into()).is_truthy());
        assert!(Value::Str(String::new()).is_truthy());
    }

    #[test]
    fn large_numbers_print_in_positional_notation() {
        assert_eq!(Value::Number(1e21).to_string(), "1000000000000000000000");
        assert_eq!(Value::Number(0.1 + 0.2).to_string(), "0.30000000000000004");
    }

    #[test]
    fn number_equality_is_ieee() {
        assert_eq!(Value::Number(0.0), Value::Number(-0.0));
        assert_ne!(Value::Number(f64::NAN), Value::Number(f64::NAN));
    }

    #[test]
    fn display_formats() {
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(Value::Number(-0.5).to_string(), "-0.5");
        assert_eq!(Value::Number(f64::INFINITY).to_string(), "Infinity");
        assert_eq!(Value::Nil.to_string(), "nil");
        assert_eq!(Value::Str("hi".into()).to_string(), "hi");
        let point = class("Point", None);
        assert_eq!(Value::Class(Rc::clone(&point)).to_string(), "Point");
        let p = Value::Instance(Rc::new(Instance::new(point)));
        assert_eq!(p.to_string(), "Point instance");
    }

    #[test]
    fn nil_only_equals_nil() {
        assert_eq!(Value::Nil, Value::Nil);
        assert_ne!(Value::Nil, Value::Bool(false));
        assert_ne!(Value::Nil, Value::Number(0.0));
        assert_ne!(Value::Number(1.0), Value::Str("1".into()));
    }

    #[test]
    fn instances_compare_by_identity() {
        let a = class("A", None);
        let x = Rc::new(Instance::new(Rc::clone(&a)));
        let y = Rc::new(Instance::new(a));
        assert_eq!(Value::Instance(Rc::clone(&x)), Value::Instance(Rc::clone(&x)));
        assert_ne!(Value::Instance(x), Value::Instance(y));
    }

    #[test]
    fn synthesized_initializer_has_zero_arity() {
        let a = class("A", None);
        assert_eq!(a.arity(), 0);
        assert!(a.initializer().is_some_and(|init| init.is_initializer));
    }

    #[test]
    fn fields_shadow_methods() {
        let a = class("A", None);
        let inst = Rc::new(Instance::new(a));
        assert!(inst.get("missing").is_none());
        inst.set("init", Value::Number(1.0));
        assert_eq!(inst.get("init"), Some(Value::Number(1.0)));
    }

    #[test]
    fn bound_initializer_returns_receiver_binding() {
        let a = class("A", None);
        let inst = Rc::new(Instance::new(Rc::clone(&a)));
        let init = a.initializer().unwrap();
        let bound = init.bind(Value::Instance(Rc::clone(&inst)));
        assert_eq!(
            Environment::get_at(&bound.closure, 0, "this").unwrap(),
            Value::Instance(inst)
        );
    }

    #[test]
    fn subclass_relation_walks_chain() {
        let base = class("Base", None);
        let mid = class("Mid", Some(Rc::clone(&base)));
        let leaf = class("Leaf", Some(Rc::clone(&mid)));
        let other = class("Other", None);
        assert!(leaf.is_subclass_of(&base));
        assert!(leaf.is_subclass_of(&leaf));
        assert!(!base.is_subclass_of(&leaf));
        assert!(!leaf.is_subclass_of(&other));
        let inst = Instance::new(leaf);
        assert!(inst.is_instance_of(&mid));
    }
}
