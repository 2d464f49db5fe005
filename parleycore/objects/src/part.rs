use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicI64, Ordering};

use parley_bytecode::{NativeObject, ObjectRef, Value};
use parley_common::{RunResult, RuntimeError};

static NEXT_ID: AtomicI64 = AtomicI64::new(1);

pub fn register(reg: &mut crate::Registry) {
    reg.register("button", crate::TypeInfo { factory: make_button });
    reg.register("field", crate::TypeInfo { factory: make_field });
}

fn make_button(args: &[Value]) -> RunResult<ObjectRef> {
    Ok(Part::new("button", label_from(args)?))
}

fn make_field(args: &[Value]) -> RunResult<ObjectRef> {
    Ok(Part::new("field", label_from(args)?))
}

// optional first argument: the initial label
fn label_from(args: &[Value]) -> RunResult<String> {
    match args.first() {
        Some(v) => v.as_string(&[]),
        None => Ok(String::new()),
    }
}

/// A card part in the host's object model. `kind` is fixed at creation,
/// `label` can be rewritten from scripts.
#[derive(Debug)]
pub struct Part {
    id: i64,
    kind: String,
    label: String,
}

impl Part {
    pub fn new(kind: &str, label: String) -> ObjectRef {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        Rc::new(RefCell::new(Part { id, kind: kind.to_string(), label }))
    }
}

impl NativeObject for Part {
    fn id(&self) -> i64 { self.id }

    fn get_property(&self, name: &str) -> RunResult<Value> {
        match name.to_ascii_lowercase().as_str() {
            "kind" => Ok(Value::from(self.kind.as_str())),
            "label" => Ok(Value::from(self.label.as_str())),
            other => Err(RuntimeError::UnknownProperty(other.to_string())),
        }
    }

    fn set_property(&mut self, name: &str, value: Value) -> RunResult<()> {
        match name.to_ascii_lowercase().as_str() {
            "label" => {
                self.label = value.as_string(&[])?;
                Ok(())
            }
            "kind" => Err(RuntimeError::ReadOnlyProperty(name.to_string())),
            other => Err(RuntimeError::UnknownProperty(other.to_string())),
        }
    }
}
