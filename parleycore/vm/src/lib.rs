/*

 ▄▄▄▄    ██▓    ▄▄▄       ▄████▄   ██ ▄█▀ ██▀███   █    ██   ██████  ██░ ██
▓█████▄ ▓██▒   ▒████▄    ▒██▀ ▀█   ██▄█▒ ▓██ ▒ ██▒ ██  ▓██▒▒██    ▒ ▓██░ ██▒
▒██▒ ▄██▒██░   ▒██  ▀█▄  ▒▓█    ▄ ▓███▄░ ▓██ ░▄█ ▒▓██  ▒██░░ ▓██▄   ▒██▀▀██░
▒██░█▀  ▒██░   ░██▄▄▄▄██ ▒▓▓▄ ▄██▒▓██ █▄ ▒██▀▀█▄  ▓▓█  ░██░  ▒   ██▒░▓█ ░██
░▓█  ▀█▓░██████▒▓█   ▓██▒▒ ▓███▀ ░▒██▒ █▄░██▓ ▒██▒▒▒█████▓ ▒██████▒▒░▓█▒░██▓
░▒▓███▀▒░ ▒░▓  ░▒▒   ▓▒█░░ ░▒ ▒  ░▒ ▒▒ ▓▒░ ▒▓ ░▒▓░░▒▓▒ ▒ ▒ ▒ ▒▓▒ ▒ ░ ▒ ░░▒░▒
▒░▒   ░ ░ ░ ▒  ░ ▒   ▒▒ ░  ░  ▒   ░ ░▒ ▒░  ░▒ ░ ▒░░░▒░ ░ ░ ░ ░▒  ░ ░ ▒ ░▒░ ░
 ░    ░   ░ ░    ░   ▒   ░        ░ ░░ ░   ░░   ░  ░░░ ░ ░ ░  ░  ░   ░  ░░ ░
 ░          ░  ░     ░  ░░ ░      ░  ░      ░        ░           ░   ░  ░  ░
      ░                  ░
Copyright (C) 2026, Blackrush LLC, All Rights Reserved
Created by Erik Olson, Tarpon Springs, Florida
For more information, visit BlackrushDrive.com

MIT License

Copyright (c) 2026 Erik Lee Olson for Blackrush, LLC

Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.

THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.

*/

//! Frame-based VM: stack, base pointer, fetch-dispatch loop, uniform calls
//! into user handlers and host builtins
use std::collections::HashMap;
use std::rc::Rc;

use parley_bytecode::{Instruction, Script, Value};
use parley_common::{RunResult, RuntimeError};
use tracing::{debug, trace};

mod builtins;

/// Hard cap on stack cells; recursion that reaches it fails cleanly instead
/// of exhausting memory.
const MAX_STACK_DEPTH: usize = 100_000;

/// A host-provided handler. Function-namespace builtins push exactly one
/// result value; command-namespace builtins usually write through a
/// reference argument and push nothing. `args[0]` is the first argument as
/// written in the script.
pub type Builtin = Rc<dyn Fn(&[Value], &mut RunContext) -> RunResult<()>>;

/// Executes one script. The stack grows upward; `bp` marks the running
/// handler's frame (`bp` = saved pc cell, `bp+1` = saved bp cell, `bp-1` =
/// the caller's argument count, `bp+2` = the `result` local).
pub struct RunContext {
    pub script: Rc<Script>,
    pub stack: Vec<Value>,
    pub pc: isize,
    pub bp: isize,
    pub builtin_commands: HashMap<String, Builtin>,
    pub builtin_functions: HashMap<String, Builtin>,
}

impl RunContext {
    /// A context with the standard operators and the `put`/`add`/`subtract`
    /// commands installed. Hosts add their own entries to the two builtin
    /// maps before calling [`run`](Self::run).
    pub fn new(script: Rc<Script>) -> Self {
        let mut ctx = Self {
            script,
            stack: Vec::new(),
            pc: -1,
            bp: -1,
            builtin_commands: HashMap::new(),
            builtin_functions: HashMap::new(),
        };
        builtins::register_defaults(&mut ctx);
        ctx
    }

    pub fn add_builtin_command(&mut self, name: &str, builtin: Builtin) {
        self.builtin_commands.insert(name.to_ascii_lowercase(), builtin);
    }

    pub fn add_builtin_function(&mut self, name: &str, builtin: Builtin) {
        self.builtin_functions.insert(name.to_ascii_lowercase(), builtin);
    }

    /// Runs a handler to completion. Afterwards the stack holds exactly the
    /// handler's return value (Unset when it never executed `return` with a
    /// value).
    pub fn run(&mut self, handler_name: &str, is_command: bool, args: &[Value]) -> RunResult<()> {
        self.stack.clear();
        for arg in args.iter().rev() {
            self.stack.push(arg.clone());
        }
        self.stack.push(Value::ParameterCount(args.len()));
        let first_instruction = match self.script.handler(handler_name, is_command) {
            Some(frame) => frame.first_instruction,
            None => {
                return Err(RuntimeError::UnknownMessage { name: handler_name.to_string(), is_command })
            }
        };
        self.bp = self.stack.len() as isize;
        self.stack.push(Value::InstructionIndex(-1));
        self.stack.push(Value::StackIndex(-1));
        self.pc = first_instruction as isize;
        debug!(handler = handler_name, is_command, argc = args.len(), "run start");
        while self.pc >= 0 {
            self.step()?;
        }
        debug!(handler = handler_name, "run finished");
        if self.stack.len() > 1 {
            return Err(RuntimeError::StackNotCleanedUpAtEndOfCall { excess: self.stack.len() - 1 });
        }
        Ok(())
    }

    /// The value the last completed run produced.
    pub fn result_value(&self) -> Option<&Value> {
        self.stack.last()
    }

    /// Writes into the running handler's `result` local. For host command
    /// builtins that hand a value back to the script (`ask`, `create`, …).
    pub fn set_result(&mut self, value: Value) -> RunResult<()> {
        let index = self.bp + 2;
        if index < 0 {
            return Err(RuntimeError::StackIndexOutOfRange);
        }
        let cell = self
            .stack
            .get_mut(index as usize)
            .ok_or(RuntimeError::StackIndexOutOfRange)?;
        *cell = value;
        Ok(())
    }

    fn step(&mut self) -> RunResult<()> {
        let script = Rc::clone(&self.script);
        let instruction = script
            .instructions
            .get(self.pc as usize)
            .ok_or(RuntimeError::UnknownInstruction)?;
        match instruction {
            Instruction::PushUnset => {
                self.push(Value::Unset)?;
                self.pc += 1;
            }
            Instruction::PushString(s) => {
                self.push(Value::from(s.clone()))?;
                self.pc += 1;
            }
            Instruction::PushInteger(i) => {
                self.push(Value::Integer(*i))?;
                self.pc += 1;
            }
            Instruction::PushDouble(d) => {
                self.push(Value::Double(*d))?;
                self.pc += 1;
            }
            Instruction::PushParameterCount(n) => {
                self.push(Value::ParameterCount(*n))?;
                self.pc += 1;
            }
            Instruction::Reserve(n) => {
                for _ in 0..*n {
                    self.push(Value::Unset)?;
                }
                self.pc += 1;
            }
            Instruction::StackValueBpRelative(offset) => {
                let index = self.bp + *offset as isize;
                if index < 0 || index as usize >= self.stack.len() {
                    return Err(RuntimeError::StackIndexOutOfRange);
                }
                self.push(Value::Reference(index as usize))?;
                self.pc += 1;
            }
            Instruction::Parameter(i) => {
                let count_index = self.bp - 1;
                if count_index < 0 {
                    return Err(RuntimeError::StackIndexOutOfRange);
                }
                let count = self
                    .stack
                    .get(count_index as usize)
                    .ok_or(RuntimeError::StackIndexOutOfRange)?
                    .as_parameter_count()?;
                if *i <= count {
                    self.push(Value::Reference((count_index - *i as isize) as usize))?;
                } else {
                    self.push(Value::Unset)?;
                }
                self.pc += 1;
            }
            Instruction::Call { name, is_command } => {
                self.dispatch_call(name, *is_command)?;
            }
            Instruction::Return { is_command } => {
                self.do_return(*is_command)?;
            }
            Instruction::JumpBy(offset) => {
                self.pc += *offset as isize;
            }
            Instruction::JumpByIfFalse(offset) => {
                let value = self.pop()?;
                if !value.as_boolean(&self.stack)? {
                    self.pc += *offset as isize;
                } else {
                    self.pc += 1;
                }
            }
            Instruction::JumpByIfTrue(offset) => {
                let value = self.pop()?;
                if value.as_boolean(&self.stack)? {
                    self.pc += *offset as isize;
                } else {
                    self.pc += 1;
                }
            }
            Instruction::PushProperty(name) => {
                let target = self.pop()?;
                let value = target.property_value(name, &self.stack)?;
                self.push(value)?;
                self.pc += 1;
            }
        }
        Ok(())
    }

    /// User handlers get a fresh frame; builtins get their arguments popped
    /// and run in the caller's frame. The two namespaces never mix.
    fn dispatch_call(&mut self, name: &str, is_command: bool) -> RunResult<()> {
        trace!(name, is_command, "call");
        if let Some(frame) = self.script.handler(name, is_command) {
            let first_instruction = frame.first_instruction;
            let new_bp = self.stack.len() as isize;
            self.push(Value::InstructionIndex(self.pc + 1))?;
            self.push(Value::StackIndex(self.bp))?;
            self.bp = new_bp;
            self.pc = first_instruction as isize;
            return Ok(());
        }
        let builtins = if is_command { &self.builtin_commands } else { &self.builtin_functions };
        if let Some(builtin) = builtins.get(&name.to_ascii_lowercase()).cloned() {
            let count = self.pop()?.as_parameter_count()?;
            let mut args = Vec::with_capacity(count);
            for _ in 0..count {
                args.push(self.pop()?);
            }
            builtin(&args, self)?;
            self.pc += 1;
            return Ok(());
        }
        Err(RuntimeError::UnknownMessage { name: name.to_string(), is_command })
    }

    fn do_return(&mut self, is_command: bool) -> RunResult<()> {
        let value = self.pop()?;
        // the frame's cells are about to disappear, so references into it
        // must be materialized now
        let value = value.resolved(&self.stack)?;
        if self.bp < 0 {
            return Err(RuntimeError::StackIndexOutOfRange);
        }
        self.stack.truncate((self.bp + 2) as usize);
        let saved_bp = self.pop()?.as_stack_index()?;
        let return_pc = self.pop()?.as_instruction_index()?;
        let argument_count = self.pop()?.as_parameter_count()?;
        for _ in 0..argument_count {
            self.pop()?;
        }
        self.bp = saved_bp;
        self.pc = return_pc;
        if is_command && self.bp >= 0 {
            // hand the value to the caller through its `result` local
            self.set_result(value)?;
        } else {
            self.push(value)?;
        }
        Ok(())
    }

    fn push(&mut self, value: Value) -> RunResult<()> {
        if self.stack.len() >= MAX_STACK_DEPTH {
            return Err(RuntimeError::StackOverflow);
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> RunResult<Value> {
        self.stack.pop().ok_or(RuntimeError::StackIndexOutOfRange)
    }
}
