//! Native-object type registry for Parley hosts
use std::collections::HashMap;

use parley_bytecode::{ObjectRef, Value};
use parley_common::{RunResult, RuntimeError};

pub struct TypeInfo {
    pub factory: fn(args: &[Value]) -> RunResult<ObjectRef>,
}

#[derive(Default)]
pub struct Registry {
    types: HashMap<String, TypeInfo>,
}

impl Registry {
    pub fn new() -> Self { Self { types: HashMap::new() } }

    pub fn register(&mut self, type_name: &str, info: TypeInfo) {
        self.types.insert(type_name.to_ascii_lowercase(), info);
    }

    pub fn has_type(&self, type_name: &str) -> bool {
        self.types.contains_key(&type_name.to_ascii_lowercase())
    }

    pub fn make(&self, type_name: &str, args: &[Value]) -> RunResult<ObjectRef> {
        let info = self
            .types
            .get(&type_name.to_ascii_lowercase())
            .ok_or_else(|| RuntimeError::UnknownObjectType(type_name.to_string()))?;
        (info.factory)(args)
    }
}

pub fn register_objects(reg: &mut Registry) {
    part::register(reg);
}

pub mod part;
