//! Stack cells, instructions and compiled scripts for the Parley VM
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use parley_common::{RunResult, RuntimeError};

/// Reference chains are produced by the code generator and are always short;
/// the cap only guards against native-object misuse creating a cycle.
const MAX_REFERENCE_DEPTH: usize = 64;

/// Host-owned object surfaced to property access. `id` is answered by the
/// machine itself (and is read-only), so implementors only provide their own
/// properties.
pub trait NativeObject {
    fn id(&self) -> i64;
    fn get_property(&self, name: &str) -> RunResult<Value>;
    fn set_property(&mut self, name: &str, value: Value) -> RunResult<()>;
}

pub type ObjectRef = Rc<RefCell<dyn NativeObject>>;
pub type WeakObjectRef = Weak<RefCell<dyn NativeObject>>;

/// One stack cell. User values and the VM's frame bookkeeping share the
/// stack, so bookkeeping kinds are separate variants with their own failing
/// accessors — a user expression that lands on one produces a distinct
/// internal error instead of garbage.
#[derive(Clone, Default)]
pub enum Value {
    /// Distinguishable absence: default return value, missing parameters,
    /// freshly reserved locals. Coerces to "" but not to a number or bool.
    #[default]
    Unset,
    Empty,
    String(String),
    Integer(i64),
    Double(f64),
    Boolean(bool),
    /// Stack index of another value; resolved transitively everywhere.
    Reference(usize),
    InstructionIndex(isize),
    StackIndex(isize),
    ParameterCount(usize),
    NativeObject(ObjectRef),
    WeakNativeObject(WeakObjectRef),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        if s.is_empty() { Value::Empty } else { Value::String(s.to_string()) }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        if s.is_empty() { Value::Empty } else { Value::String(s) }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self { Value::Integer(i) }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self { Value::Double(d) }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self { Value::Boolean(b) }
}

impl Value {
    /// Walks a chain of references to the ultimate target index. `None` for
    /// non-references and for chains longer than the depth cap.
    pub fn reference_index(&self, stack: &[Value]) -> Option<usize> {
        let mut idx = match self {
            Value::Reference(i) => *i,
            _ => return None,
        };
        for _ in 0..MAX_REFERENCE_DEPTH {
            match stack.get(idx) {
                Some(Value::Reference(next)) => idx = *next,
                _ => return Some(idx),
            }
        }
        None
    }

    fn resolve<'a>(&'a self, stack: &'a [Value]) -> RunResult<&'a Value> {
        match self {
            Value::Reference(_) => {
                let idx = self.reference_index(stack).ok_or(RuntimeError::StackIndexOutOfRange)?;
                stack.get(idx).ok_or(RuntimeError::StackIndexOutOfRange)
            }
            other => Ok(other),
        }
    }

    /// A clone of the value a reference ultimately points at (or of the
    /// value itself). Needed whenever a value must outlive the frame its
    /// reference points into.
    pub fn resolved(&self, stack: &[Value]) -> RunResult<Value> {
        Ok(self.resolve(stack)?.clone())
    }

    pub fn as_string(&self, stack: &[Value]) -> RunResult<String> {
        match self {
            Value::Unset | Value::Empty => Ok(String::new()),
            Value::String(s) => Ok(s.clone()),
            Value::Integer(i) => Ok(i.to_string()),
            Value::Double(d) => {
                // trimmed to integer form when exactly integral
                if d.fract() == 0.0 && d.is_finite() && d.abs() < (i64::MAX as f64) {
                    Ok((*d as i64).to_string())
                } else {
                    Ok(d.to_string())
                }
            }
            Value::Boolean(b) => Ok(b.to_string()),
            Value::Reference(_) => self.resolve(stack)?.as_string(stack),
            _ => Err(RuntimeError::ExpectedStringHere),
        }
    }

    pub fn as_integer(&self, stack: &[Value]) -> RunResult<i64> {
        match self {
            Value::String(s) => Ok(s.parse::<i64>().unwrap_or(0)),
            Value::Integer(i) => Ok(*i),
            Value::Double(d) => {
                if d.fract() == 0.0 && d.is_finite() && d.abs() < (i64::MAX as f64) {
                    Ok(*d as i64)
                } else {
                    Err(RuntimeError::ExpectedIntegerHere)
                }
            }
            Value::Reference(_) => self.resolve(stack)?.as_integer(stack),
            _ => Err(RuntimeError::ExpectedIntegerHere),
        }
    }

    pub fn as_double(&self, stack: &[Value]) -> RunResult<f64> {
        match self {
            Value::Empty => Ok(0.0),
            Value::String(s) => Ok(s.parse::<f64>().unwrap_or(0.0)),
            Value::Integer(i) => Ok(*i as f64),
            Value::Double(d) => Ok(*d),
            Value::Reference(_) => self.resolve(stack)?.as_double(stack),
            _ => Err(RuntimeError::ExpectedNumberHere),
        }
    }

    pub fn as_boolean(&self, stack: &[Value]) -> RunResult<bool> {
        match self {
            Value::Boolean(b) => Ok(*b),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
            Value::Reference(_) => self.resolve(stack)?.as_boolean(stack),
            _ => Err(RuntimeError::ExpectedBooleanHere),
        }
    }

    pub fn as_instruction_index(&self) -> RunResult<isize> {
        match self {
            Value::InstructionIndex(i) => Ok(*i),
            _ => Err(RuntimeError::ExpectedInstructionIndexHere),
        }
    }

    pub fn as_stack_index(&self) -> RunResult<isize> {
        match self {
            Value::StackIndex(i) => Ok(*i),
            _ => Err(RuntimeError::ExpectedStackIndexHere),
        }
    }

    pub fn as_parameter_count(&self) -> RunResult<usize> {
        match self {
            Value::ParameterCount(n) => Ok(*n),
            _ => Err(RuntimeError::ExpectedParameterCountHere),
        }
    }

    fn upgrade_weak(weak: &WeakObjectRef) -> RunResult<ObjectRef> {
        weak.upgrade().ok_or(RuntimeError::ObjectDoesNotExist)
    }

    /// Reads a named property off this value. Native objects answer their
    /// own properties plus the machine-provided `id`; everything coercible
    /// to a string answers `length`.
    pub fn property_value(&self, name: &str, stack: &[Value]) -> RunResult<Value> {
        let target = self.resolve(stack)?;
        match target {
            Value::NativeObject(obj) => {
                if name.eq_ignore_ascii_case("id") {
                    return Ok(Value::Integer(obj.borrow().id()));
                }
                obj.borrow().get_property(name)
            }
            Value::WeakNativeObject(weak) => {
                let obj = Self::upgrade_weak(weak)?;
                if name.eq_ignore_ascii_case("id") {
                    return Ok(Value::Integer(obj.borrow().id()));
                }
                let v = obj.borrow().get_property(name);
                v
            }
            other => {
                if name.eq_ignore_ascii_case("length") {
                    Ok(Value::Integer(other.as_string(stack)?.chars().count() as i64))
                } else {
                    Err(RuntimeError::UnknownProperty(name.to_string()))
                }
            }
        }
    }

    pub fn set_property(&self, name: &str, value: Value, stack: &[Value]) -> RunResult<()> {
        let target = self.resolve(stack)?;
        match target {
            Value::NativeObject(obj) => {
                if name.eq_ignore_ascii_case("id") {
                    return Err(RuntimeError::ReadOnlyProperty(name.to_string()));
                }
                obj.borrow_mut().set_property(name, value)
            }
            Value::WeakNativeObject(weak) => {
                let obj = Self::upgrade_weak(weak)?;
                if name.eq_ignore_ascii_case("id") {
                    return Err(RuntimeError::ReadOnlyProperty(name.to_string()));
                }
                let r = obj.borrow_mut().set_property(name, value);
                r
            }
            _ => {
                if name.eq_ignore_ascii_case("length") {
                    Err(RuntimeError::ReadOnlyProperty(name.to_string()))
                } else {
                    Err(RuntimeError::UnknownProperty(name.to_string()))
                }
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Unset, Value::Unset) | (Value::Empty, Value::Empty) => true,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Reference(a), Value::Reference(b)) => a == b,
            (Value::InstructionIndex(a), Value::InstructionIndex(b)) => a == b,
            (Value::StackIndex(a), Value::StackIndex(b)) => a == b,
            (Value::ParameterCount(a), Value::ParameterCount(b)) => a == b,
            (Value::NativeObject(a), Value::NativeObject(b)) => a.borrow().id() == b.borrow().id(),
            (Value::WeakNativeObject(a), Value::WeakNativeObject(b)) => match (a.upgrade(), b.upgrade()) {
                (Some(a), Some(b)) => a.borrow().id() == b.borrow().id(),
                _ => false,
            },
            (Value::NativeObject(a), Value::WeakNativeObject(b))
            | (Value::WeakNativeObject(b), Value::NativeObject(a)) => match b.upgrade() {
                Some(b) => a.borrow().id() == b.borrow().id(),
                None => false,
            },
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unset => write!(f, "Unset"),
            Value::Empty => write!(f, "Empty"),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Integer(i) => write!(f, "Integer({})", i),
            Value::Double(d) => write!(f, "Double({})", d),
            Value::Boolean(b) => write!(f, "Boolean({})", b),
            Value::Reference(i) => write!(f, "Reference({})", i),
            Value::InstructionIndex(i) => write!(f, "InstructionIndex({})", i),
            Value::StackIndex(i) => write!(f, "StackIndex({})", i),
            Value::ParameterCount(n) => write!(f, "ParameterCount({})", n),
            Value::NativeObject(o) => write!(f, "NativeObject(id={})", o.borrow().id()),
            Value::WeakNativeObject(w) => match w.upgrade() {
                Some(o) => write!(f, "WeakNativeObject(id={})", o.borrow().id()),
                None => write!(f, "WeakNativeObject(dead)"),
            },
        }
    }
}

/// The closed instruction set. Jump offsets are relative to the jump
/// instruction itself; every opcode is responsible for advancing the pc.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    PushUnset,
    PushString(String),
    PushInteger(i64),
    PushDouble(f64),
    PushParameterCount(usize),
    /// Appends n Unset cells — a handler's locals. Always the first
    /// instruction of a handler.
    Reserve(usize),
    /// Push Reference(BP + offset).
    StackValueBpRelative(i32),
    /// Push Reference to caller-supplied argument i (1-based), or Unset when
    /// fewer arguments were passed.
    Parameter(usize),
    Call { name: String, is_command: bool },
    Return { is_command: bool },
    JumpBy(i32),
    JumpByIfFalse(i32),
    JumpByIfTrue(i32),
    /// Pop a target, push the named property of it.
    PushProperty(String),
}

/// Where a handler-local name lives relative to the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableBinding {
    /// Caller-supplied argument, 1-based.
    Parameter(usize),
    /// Frame-local cell at BP + offset.
    StackValueBpRelative(i32),
}

impl VariableBinding {
    /// The instruction that pushes this binding's cell (as a reference).
    pub fn instruction(&self) -> Instruction {
        match self {
            VariableBinding::Parameter(i) => Instruction::Parameter(*i),
            VariableBinding::StackValueBpRelative(off) => Instruction::StackValueBpRelative(*off),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Variables {
    /// Lowercased name → binding. Includes `result` and all parameters.
    pub mappings: HashMap<String, VariableBinding>,
    /// Count of frame-local cells (the `result` local included).
    pub num_locals: usize,
}

/// Per-handler record in a compiled script.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerFrame {
    pub first_instruction: usize,
    pub variables: Variables,
}

/// A parsed script: one flat instruction vector plus the two handler
/// namespaces. Effectively immutable once parsing finishes; may be shared
/// read-only between run contexts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Script {
    pub instructions: Vec<Instruction>,
    pub commands: HashMap<String, HandlerFrame>,
    pub functions: HashMap<String, HandlerFrame>,
}

impl Script {
    pub fn handler(&self, name: &str, is_command: bool) -> Option<&HandlerFrame> {
        let key = name.to_ascii_lowercase();
        if is_command { self.commands.get(&key) } else { self.functions.get(&key) }
    }
}
