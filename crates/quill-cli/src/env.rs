//! Chained variable environments.
//!
//! Each block, call, and bound method gets its own `Environment`; closures
//! keep the one they were created in alive through a shared handle.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::value::Value;

/// Shared handle to an environment. Closures and call frames may hold the
/// same one at once.
pub type EnvRef = Rc<RefCell<Environment>>;

/// Failures of environment lookups and updates.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvError {
    /// `define` of a name already present in this exact environment
    Redefinition(String),
    /// Read of a name that was declared but never assigned
    Uninitialized(String),
    /// Name absent from the whole chain
    Undefined(String),
}

impl std::fmt::Display for EnvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvError::Redefinition(name) => {
                write!(f, "Attempting to redefine scope variable '{}'.", name)
            }
            EnvError::Uninitialized(name) => {
                write!(f, "Attempting to access uninitialized variable '{}'.", name)
            }
            EnvError::Undefined(name) => write!(f, "Undefined variable '{}'.", name),
        }
    }
}

impl std::error::Error for EnvError {}

/// One scope record. `None` marks declared-but-uninitialized.
#[derive(Default)]
pub struct Environment {
    values: HashMap<String, Option<Value>>,
    enclosing: Option<EnvRef>,
}

// Values can point back at their defining environment, so only names are shown.
impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.values.keys().collect();
        names.sort();
        f.debug_struct("Environment")
            .field("names", &names)
            .field("has_enclosing", &self.enclosing.is_some())
            .finish()
    }
}

impl Environment {
    /// A root environment with no parent.
    pub fn new() -> EnvRef {
        Rc::new(RefCell::new(Environment::default()))
    }

    /// A fresh child scope of `enclosing`.
    pub fn child(enclosing: &EnvRef) -> EnvRef {
        Rc::new(RefCell::new(Environment {
            values: HashMap::new(),
            enclosing: Some(Rc::clone(enclosing)),
        }))
    }

    /// A child scope of `enclosing` holding exactly one initialized binding.
    pub fn with_binding(enclosing: &EnvRef, name: &str, value: Value) -> EnvRef {
        let mut values = HashMap::new();
        values.insert(name.to_string(), Some(value));
        Rc::new(RefCell::new(Environment {
            values,
            enclosing: Some(Rc::clone(enclosing)),
        }))
    }

    pub fn enclosing(&self) -> Option<EnvRef> {
        self.enclosing.clone()
    }

    /// Introduce `name` in this scope. `None` leaves it uninitialized.
    pub fn define(&mut self, name: &str, value: Option<Value>) -> Result<(), EnvError> {
        if self.values.contains_key(name) {
            return Err(EnvError::Redefinition(name.to_string()));
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Look `name` up here, then through the enclosing chain.
    pub fn get(&self, name: &str) -> Result<Value, EnvError> {
        match self.values.get(name) {
            Some(Some(value)) => Ok(value.clone()),
            Some(None) => Err(EnvError::Uninitialized(name.to_string())),
            None => match &self.enclosing {
                Some(enclosing) => enclosing.borrow().get(name),
                None => Err(EnvError::Undefined(name.to_string())),
            },
        }
    }

    /// Overwrite the nearest binding of `name`. Never creates one.
    pub fn assign(&mut self, name: &str, value: Value) -> Result<(), EnvError> {
        if let Some(slot) = self.values.get_mut(name) {
            *slot = Some(value);
            return Ok(());
        }
        match &self.enclosing {
            Some(enclosing) => enclosing.borrow_mut().assign(name, value),
            None => Err(EnvError::Undefined(name.to_string())),
        }
    }

    /// Read `name` from the environment exactly `distance` hops out.
    pub fn get_at(env: &EnvRef, distance: usize, name: &str) -> Result<Value, EnvError> {
        let target = Self::ancestor(env, distance, name)?;
        let target = target.borrow();
        match target.values.get(name) {
            Some(Some(value)) => Ok(value.clone()),
            Some(None) => Err(EnvError::Uninitialized(name.to_string())),
            None => Err(EnvError::Undefined(name.to_string())),
        }
    }

    /// Assign `name` in the environment exactly `distance` hops out.
    pub fn assign_at(
        env: &EnvRef,
        distance: usize,
        name: &str,
        value: Value,
    ) -> Result<(), EnvError> {
        let target = Self::ancestor(env, distance, name)?;
        let mut target = target.borrow_mut();
        match target.values.get_mut(name) {
            Some(slot) => {
                *slot = Some(value);
                Ok(())
            }
            None => Err(EnvError::Undefined(name.to_string())),
        }
    }

    fn ancestor(env: &EnvRef, distance: usize, name: &str) -> Result<EnvRef, EnvError> {
        let mut current = Rc::clone(env);
        for _ in 0..distance {
            let next = current
                .borrow()
                .enclosing()
                .ok_or_else(|| EnvError::Undefined(name.to_string()))?;
            current = next;
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_then_get() {
        let env = Environment::new();
        env.borrow_mut().define("a", Some(Value::Number(1.0))).unwrap();
        assert_eq!(env.borrow().get("a").unwrap(), Value::Number(1.0));
    }

    #[test]
    fn redefinition_in_same_scope_fails() {
        let env = Environment::new();
        env.borrow_mut().define("a", Some(Value::Nil)).unwrap();
        assert_eq!(
            env.borrow_mut().define("a", Some(Value::Nil)),
            Err(EnvError::Redefinition("a".into()))
        );
    }

    #[test]
    fn shadowing_in_child_scope_is_allowed() {
        let outer = Environment::new();
        outer.borrow_mut().define("a", Some(Value::Number(1.0))).unwrap();
        let inner = Environment::child(&outer);
        inner.borrow_mut().define("a", Some(Value::Number(2.0))).unwrap();
        assert_eq!(inner.borrow().get("a").unwrap(), Value::Number(2.0));
        assert_eq!(outer.borrow().get("a").unwrap(), Value::Number(1.0));
    }

    #[test]
    fn uninitialized_until_assigned() {
        let outer = Environment::new();
        outer.borrow_mut().define("a", None).unwrap();
        let inner = Environment::child(&outer);
        assert_eq!(
            inner.borrow().get("a"),
            Err(EnvError::Uninitialized("a".into()))
        );
        inner.borrow_mut().assign("a", Value::Bool(true)).unwrap();
        assert_eq!(inner.borrow().get("a").unwrap(), Value::Bool(true));
    }

    #[test]
    fn assign_never_creates() {
        let env = Environment::new();
        assert_eq!(
            env.borrow_mut().assign("nope", Value::Nil),
            Err(EnvError::Undefined("nope".into()))
        );
        assert_eq!(
            env.borrow().get("nope"),
            Err(EnvError::Undefined("nope".into()))
        );
    }

    #[test]
    fn distance_access_skips_nearer_shadows() {
        let root = Environment::new();
        root.borrow_mut().define("x", Some(Value::Number(1.0))).unwrap();
        let mid = Environment::child(&root);
        mid.borrow_mut().define("x", Some(Value::Number(2.0))).unwrap();
        let leaf = Environment::child(&mid);

        assert_eq!(Environment::get_at(&leaf, 1, "x").unwrap(), Value::Number(2.0));
        assert_eq!(Environment::get_at(&leaf, 2, "x").unwrap(), Value::Number(1.0));

        Environment::assign_at(&leaf, 2, "x", Value::Number(9.0)).unwrap();
        assert_eq!(root.borrow().get("x").unwrap(), Value::Number(9.0));
        assert_eq!(mid.borrow().get("x").unwrap(), Value::Number(2.0));
    }

    #[test]
    fn distance_access_does_not_fall_back() {
        let root = Environment::new();
        root.borrow_mut().define("x", Some(Value::Nil)).unwrap();
        let leaf = Environment::child(&root);
        assert_eq!(
            Environment::get_at(&leaf, 0, "x"),
            Err(EnvError::Undefined("x".into()))
        );
        assert_eq!(
            Environment::get_at(&leaf, 5, "x"),
            Err(EnvError::Undefined("x".into()))
        );
    }
}
