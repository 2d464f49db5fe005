use std::cell::RefCell;
use std::rc::Rc;

use parley_bytecode::{NativeObject, ObjectRef, Value};
use parley_common::{RunResult, RuntimeError};

#[derive(Debug)]
struct Gadget {
    id: i64,
    label: String,
}

impl NativeObject for Gadget {
    fn id(&self) -> i64 { self.id }
    fn get_property(&self, name: &str) -> RunResult<Value> {
        match name.to_ascii_lowercase().as_str() {
            "label" => Ok(Value::from(self.label.as_str())),
            other => Err(RuntimeError::UnknownProperty(other.to_string())),
        }
    }
    fn set_property(&mut self, name: &str, value: Value) -> RunResult<()> {
        match name.to_ascii_lowercase().as_str() {
            "label" => { self.label = value.as_string(&[])?; Ok(()) }
            other => Err(RuntimeError::UnknownProperty(other.to_string())),
        }
    }
}

fn gadget(id: i64, label: &str) -> Rc<RefCell<Gadget>> {
    Rc::new(RefCell::new(Gadget { id, label: label.to_string() }))
}

#[test]
fn string_coercion() {
    let stack: Vec<Value> = Vec::new();
    assert_eq!(Value::Unset.as_string(&stack).unwrap(), "");
    assert_eq!(Value::Empty.as_string(&stack).unwrap(), "");
    assert_eq!(Value::Integer(-7).as_string(&stack).unwrap(), "-7");
    // exactly integral doubles print in integer form
    assert_eq!(Value::Double(2.0).as_string(&stack).unwrap(), "2");
    assert_eq!(Value::Double(2.5).as_string(&stack).unwrap(), "2.5");
    assert_eq!(Value::Boolean(true).as_string(&stack).unwrap(), "true");
    assert_eq!(
        Value::ParameterCount(1).as_string(&stack),
        Err(RuntimeError::ExpectedStringHere)
    );
}

#[test]
fn integer_coercion() {
    let stack: Vec<Value> = Vec::new();
    assert_eq!(Value::from("12").as_integer(&stack).unwrap(), 12);
    // malformed strings read as zero
    assert_eq!(Value::from("nope").as_integer(&stack).unwrap(), 0);
    assert_eq!(Value::Double(3.0).as_integer(&stack).unwrap(), 3);
    assert_eq!(Value::Double(3.5).as_integer(&stack), Err(RuntimeError::ExpectedIntegerHere));
    assert_eq!(Value::Unset.as_integer(&stack), Err(RuntimeError::ExpectedIntegerHere));
    assert_eq!(Value::Empty.as_integer(&stack), Err(RuntimeError::ExpectedIntegerHere));
    assert_eq!(Value::Boolean(true).as_integer(&stack), Err(RuntimeError::ExpectedIntegerHere));
}

#[test]
fn double_coercion() {
    let stack: Vec<Value> = Vec::new();
    assert_eq!(Value::Empty.as_double(&stack).unwrap(), 0.0);
    assert_eq!(Value::from("2.5").as_double(&stack).unwrap(), 2.5);
    assert_eq!(Value::from("junk").as_double(&stack).unwrap(), 0.0);
    assert_eq!(Value::Integer(4).as_double(&stack).unwrap(), 4.0);
    assert_eq!(Value::Unset.as_double(&stack), Err(RuntimeError::ExpectedNumberHere));
    assert_eq!(Value::Boolean(false).as_double(&stack), Err(RuntimeError::ExpectedNumberHere));
}

#[test]
fn boolean_coercion() {
    let stack: Vec<Value> = Vec::new();
    assert!(Value::Boolean(true).as_boolean(&stack).unwrap());
    assert!(Value::from("TRUE").as_boolean(&stack).unwrap());
    assert!(!Value::from("false").as_boolean(&stack).unwrap());
    assert_eq!(Value::from("1").as_boolean(&stack), Err(RuntimeError::ExpectedBooleanHere));
    assert_eq!(Value::Unset.as_boolean(&stack), Err(RuntimeError::ExpectedBooleanHere));
}

#[test]
fn references_resolve_transitively() {
    let stack = vec![Value::Integer(7), Value::Reference(0), Value::Reference(1)];
    let v = Value::Reference(2);
    assert_eq!(v.reference_index(&stack), Some(0));
    assert_eq!(v.as_string(&stack).unwrap(), "7");
    assert_eq!(v.as_integer(&stack).unwrap(), 7);
}

#[test]
fn reference_cycles_are_caught() {
    let stack = vec![Value::Reference(1), Value::Reference(0)];
    assert_eq!(Value::Reference(0).reference_index(&stack), None);
    assert_eq!(Value::Reference(0).as_string(&stack), Err(RuntimeError::StackIndexOutOfRange));
}

#[test]
fn length_is_a_read_only_property_of_strings() {
    let stack: Vec<Value> = Vec::new();
    let v = Value::from("Four");
    assert_eq!(v.property_value("length", &stack).unwrap(), Value::Integer(4));
    assert_eq!(
        v.set_property("length", Value::Integer(1), &stack),
        Err(RuntimeError::ReadOnlyProperty("length".into()))
    );
    assert_eq!(
        v.property_value("width", &stack),
        Err(RuntimeError::UnknownProperty("width".into()))
    );
}

#[test]
fn native_objects_answer_their_properties() {
    let g = gadget(1, "Go");
    let obj: ObjectRef = g.clone();
    let v = Value::NativeObject(obj);
    let stack: Vec<Value> = Vec::new();
    assert_eq!(v.property_value("label", &stack).unwrap(), Value::from("Go"));
    assert_eq!(v.property_value("id", &stack).unwrap(), Value::Integer(1));
    v.set_property("label", Value::from("Stop"), &stack).unwrap();
    assert_eq!(g.borrow().label, "Stop");
    assert_eq!(
        v.set_property("id", Value::Integer(9), &stack),
        Err(RuntimeError::ReadOnlyProperty("id".into()))
    );
}

#[test]
fn property_access_through_a_reference() {
    let obj: ObjectRef = gadget(3, "Press");
    let stack = vec![Value::NativeObject(obj)];
    let v = Value::Reference(0);
    assert_eq!(v.property_value("label", &stack).unwrap(), Value::from("Press"));
}

#[test]
fn dead_weak_objects_fail() {
    let strong: ObjectRef = gadget(2, "x");
    let weak = Value::WeakNativeObject(Rc::downgrade(&strong));
    let stack: Vec<Value> = Vec::new();
    assert_eq!(weak.property_value("label", &stack).unwrap(), Value::from("x"));
    drop(strong);
    assert_eq!(weak.property_value("label", &stack), Err(RuntimeError::ObjectDoesNotExist));
    assert_eq!(
        weak.set_property("label", Value::from("y"), &stack),
        Err(RuntimeError::ObjectDoesNotExist)
    );
}

#[test]
fn equality_is_structural_and_by_object_id() {
    assert_eq!(Value::from("abc"), Value::from("abc"));
    assert_ne!(Value::from("abc"), Value::from("ABC"));
    assert_ne!(Value::from("1"), Value::Integer(1));
    assert_eq!(Value::Unset, Value::Unset);
    assert_ne!(Value::Unset, Value::Empty);
    let a: ObjectRef = gadget(5, "a");
    let b: ObjectRef = gadget(5, "entirely different label");
    let c: ObjectRef = gadget(6, "a");
    assert_eq!(Value::NativeObject(a.clone()), Value::NativeObject(b));
    assert_ne!(Value::NativeObject(a.clone()), Value::NativeObject(c));
    assert_eq!(Value::NativeObject(a.clone()), Value::WeakNativeObject(Rc::downgrade(&a)));
}

#[test]
fn empty_comes_from_empty_strings() {
    assert_eq!(Value::from(""), Value::Empty);
    assert_eq!(Value::from(String::new()), Value::Empty);
    assert!(matches!(Value::from("x"), Value::String(_)));
}
