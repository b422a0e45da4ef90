//! Host builtins registered into every interpreter's globals.
//!
//! Each builtin is a plain Rust function with a fixed arity. Input readers
//! pull from the interpreter's input source, so tests can feed them a buffer.

use std::collections::BTreeMap;
use std::io::{BufRead, Read};
use std::rc::Rc;

use crate::env::EnvRef;
use crate::eval::Interpreter;
use crate::value::Value;

/// Errors from host function execution.
#[derive(Debug, Clone, PartialEq)]
pub enum HostError {
    /// Argument of the wrong kind
    TypeError(String),
    /// Input source exhausted or held something unreadable
    InvalidInput(String),
    /// I/O error from the host
    IoError(String),
}

impl std::fmt::Display for HostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostError::TypeError(msg) => write!(f, "type error: {}", msg),
            HostError::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
            HostError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for HostError {}

impl From<std::io::Error> for HostError {
    fn from(err: std::io::Error) -> Self {
        HostError::IoError(err.to_string())
    }
}

/// Type alias for host function signatures.
pub type HostFnImpl = fn(&mut Interpreter, &[Value]) -> Result<Value, HostError>;

/// A native function exposed to scripts.
pub struct Builtin {
    pub name: &'static str,
    pub arity: usize,
    pub func: HostFnImpl,
}

impl std::fmt::Debug for Builtin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builtin")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

/// Registry of builtin functions and constants.
pub struct HostRegistry {
    functions: BTreeMap<&'static str, Rc<Builtin>>,
    constants: BTreeMap<&'static str, Value>,
}

impl std::fmt::Debug for HostRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.functions.keys().collect();
        let constants: Vec<_> = self.constants.keys().collect();
        f.debug_struct("HostRegistry")
            .field("functions", &names)
            .field("constants", &constants)
            .finish()
    }
}

impl Default for HostRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HostRegistry {
    /// Create a new registry with all built-in host functions.
    pub fn new() -> Self {
        let mut reg = Self {
            functions: BTreeMap::new(),
            constants: BTreeMap::new(),
        };
        reg.register("clock", 0, host_clock);
        reg.register("readLine", 0, host_read_line);
        reg.register("readDouble", 0, host_read_double);
        reg.register("readInt", 0, host_read_int);
        reg.register("readByte", 0, host_read_byte);
        reg.register("instanceOf", 2, host_instance_of);
        reg.constants
            .insert("NEWLINE_CHAR", Value::Str("\n".to_string()));
        reg
    }

    fn register(&mut self, name: &'static str, arity: usize, func: HostFnImpl) {
        self.functions
            .insert(name, Rc::new(Builtin { name, arity, func }));
    }

    pub fn get(&self, name: &str) -> Option<Rc<Builtin>> {
        self.functions.get(name).cloned()
    }

    /// Define every builtin and constant in `globals`.
    pub fn install(&self, globals: &EnvRef) {
        let mut env = globals.borrow_mut();
        let functions = self
            .functions
            .iter()
            .map(|(name, builtin)| (*name, Value::Builtin(Rc::clone(builtin))));
        let constants = self
            .constants
            .iter()
            .map(|(name, value)| (*name, value.clone()));
        for (name, value) in functions.chain(constants) {
            if let Err(err) = env.define(name, Some(value)) {
                tracing::warn!(%err, "builtin not installed");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Builtin implementations
// ---------------------------------------------------------------------------

fn host_clock(_interp: &mut Interpreter, _args: &[Value]) -> Result<Value, HostError> {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(|e| HostError::IoError(e.to_string()))?;
    Ok(Value::Number(now.as_secs_f64()))
}

fn host_read_line(interp: &mut Interpreter, _args: &[Value]) -> Result<Value, HostError> {
    let mut line = String::new();
    if interp.input().read_line(&mut line)? == 0 {
        return Ok(Value::Nil);
    }
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    Ok(Value::Str(line))
}

fn host_read_double(interp: &mut Interpreter, _args: &[Value]) -> Result<Value, HostError> {
    let token = next_token(interp.input())?;
    Ok(Value::Number(parse_number(&token)?))
}

fn host_read_int(interp: &mut Interpreter, _args: &[Value]) -> Result<Value, HostError> {
    let token = next_token(interp.input())?;
    Ok(Value::Number(parse_number(&token)?.trunc()))
}

fn host_read_byte(interp: &mut Interpreter, _args: &[Value]) -> Result<Value, HostError> {
    Ok(match next_char(interp.input())? {
        Some(ch) => Value::Str(ch),
        None => Value::Nil,
    })
}

fn host_instance_of(_interp: &mut Interpreter, args: &[Value]) -> Result<Value, HostError> {
    match (&args[0], &args[1]) {
        (Value::Instance(instance), Value::Class(class)) => {
            Ok(Value::Bool(instance.is_instance_of(class)))
        }
        (_, Value::Class(_)) => Ok(Value::Bool(false)),
        (_, other) => Err(HostError::TypeError(format!(
            "instanceOf expects a class as its second argument, got {}",
            other.type_name()
        ))),
    }
}

fn parse_number(token: &str) -> Result<f64, HostError> {
    token
        .parse::<f64>()
        .map_err(|_| HostError::InvalidInput(format!("'{}' is not a number", token)))
}

/// Next whitespace-delimited token. Trailing whitespace is left unread.
fn next_token(input: &mut dyn BufRead) -> Result<String, HostError> {
    loop {
        let buf = input.fill_buf()?;
        if buf.is_empty() {
            return Err(HostError::InvalidInput("end of input".to_string()));
        }
        let skip = buf.iter().take_while(|b| b.is_ascii_whitespace()).count();
        let found = skip < buf.len();
        input.consume(skip);
        if found {
            break;
        }
    }

    let mut bytes = Vec::new();
    loop {
        let buf = input.fill_buf()?;
        if buf.is_empty() {
            break;
        }
        let take = buf.iter().take_while(|b| !b.is_ascii_whitespace()).count();
        bytes.extend_from_slice(&buf[..take]);
        let ended = take < buf.len();
        input.consume(take);
        if ended {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Next single character, whitespace included. `None` at end of input.
fn next_char(input: &mut dyn BufRead) -> Result<Option<String>, HostError> {
    let mut first = [0u8; 1];
    if input.read(&mut first)? == 0 {
        return Ok(None);
    }
    let width = match first[0] {
        b if b < 0x80 => 1,
        b if b >> 5 == 0b110 => 2,
        b if b >> 4 == 0b1110 => 3,
        b if b >> 3 == 0b11110 => 4,
        _ => 1,
    };
    let mut bytes = vec![first[0]];
    if width > 1 {
        (&mut *input)
            .take(width as u64 - 1)
            .read_to_end(&mut bytes)?;
    }
    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}
