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

//! Backtracking parser emitting stack-machine instructions straight from the
//! token stream: handlers, English command syntaxes, precedence expressions
use parley_bytecode::{HandlerFrame, Instruction, Script, VariableBinding, Variables};
use parley_lexer::{ParseError, ParseResult, TokenCursor, Tokenizer};
use tracing::debug;

pub mod service;

/// One element of an English command syntax: an optional literal identifier
/// prefix followed by the kind of value to parse.
#[derive(Debug, Clone)]
pub struct SyntaxElement {
    pub prefix: Option<String>,
    pub kind: SyntaxElementKind,
}

#[derive(Debug, Clone)]
pub enum SyntaxElementKind {
    /// A full expression, pushed as a parameter.
    Expression,
    /// Like Expression but parsed in writable mode, so a fresh identifier
    /// becomes a new local the command can write through.
    Container,
    /// One of the given keywords; the matched word is pushed as a string.
    Identifier(Vec<String>),
    /// Any identifier token, pushed as a string.
    AnyIdentifier,
    /// Nothing is parsed or pushed (the prefix alone is consumed).
    None,
}

impl SyntaxElement {
    pub fn expression(prefix: Option<&str>) -> Self {
        Self { prefix: prefix.map(str::to_string), kind: SyntaxElementKind::Expression }
    }
    pub fn container(prefix: Option<&str>) -> Self {
        Self { prefix: prefix.map(str::to_string), kind: SyntaxElementKind::Container }
    }
    pub fn identifier(prefix: Option<&str>, expected: &[&str]) -> Self {
        Self {
            prefix: prefix.map(str::to_string),
            kind: SyntaxElementKind::Identifier(expected.iter().map(|s| s.to_string()).collect()),
        }
    }
    pub fn any_identifier(prefix: Option<&str>) -> Self {
        Self { prefix: prefix.map(str::to_string), kind: SyntaxElementKind::AnyIdentifier }
    }
    pub fn none(prefix: &str) -> Self {
        Self { prefix: Some(prefix.to_string()), kind: SyntaxElementKind::None }
    }
}

/// An English command template. Templates are tried in registration order;
/// the first one whose introductory words and elements all match wins. Its
/// call name is the introductory words joined with single spaces.
#[derive(Debug, Clone)]
pub struct Syntax {
    pub name: Vec<String>,
    pub elements: Vec<SyntaxElement>,
}

impl Syntax {
    pub fn new(name: &[&str], elements: Vec<SyntaxElement>) -> Self {
        Self { name: name.iter().map(|s| s.to_string()).collect(), elements }
    }

    fn call_name(&self) -> String {
        self.name.join(" ").to_ascii_lowercase()
    }
}

// Expression operator binding strengths; smaller binds tighter. Symbols not
// in this table (the comparison operators among them) bind loosest of all.
fn precedence_of(symbol: &str) -> u8 {
    match symbol {
        "*" => 1,
        "/" => 2,
        "-" => 3,
        "+" => 4,
        "&" => 5,
        "&&" => 6,
        _ => u8::MAX,
    }
}

fn is_bracket(symbol: &str) -> bool {
    matches!(symbol, "(" | ")" | "[" | "]" | "{" | "}")
}

/// Operator-precedence tree built while scanning an expression left to
/// right. Leaves are already-generated instruction runs.
enum OperationNode {
    Operand(Vec<Instruction>),
    Operation {
        name: String,
        precedence: u8,
        lhs: Box<OperationNode>,
        rhs: Box<OperationNode>,
    },
}

fn rightmost_operation(node: &mut OperationNode) -> &mut OperationNode {
    let descend = matches!(node,
        OperationNode::Operation { rhs, .. } if matches!(**rhs, OperationNode::Operation { .. }));
    if descend {
        match node {
            OperationNode::Operation { rhs, .. } => rightmost_operation(rhs),
            OperationNode::Operand(_) => unreachable!(),
        }
    } else {
        node
    }
}

/// Splices a freshly parsed operator + operand into the tree: descend to the
/// rightmost operation; when it binds looser (larger number) than the new
/// operator, the new operation takes over its right-hand side, otherwise the
/// new operation becomes the root.
fn insert_operand(root: OperationNode, name: String, operand: Vec<Instruction>) -> OperationNode {
    let precedence = precedence_of(&name);
    let mut root = root;
    let splice = match &mut root {
        OperationNode::Operand(_) => false,
        node => matches!(rightmost_operation(node),
            OperationNode::Operation { precedence: p, .. } if *p > precedence),
    };
    if splice {
        if let OperationNode::Operation { rhs, .. } = rightmost_operation(&mut root) {
            let lhs = std::mem::replace(rhs, Box::new(OperationNode::Operand(Vec::new())));
            **rhs = OperationNode::Operation {
                name,
                precedence,
                lhs,
                rhs: Box::new(OperationNode::Operand(operand)),
            };
        }
        root
    } else {
        OperationNode::Operation {
            name,
            precedence,
            lhs: Box::new(root),
            rhs: Box::new(OperationNode::Operand(operand)),
        }
    }
}

/// Post-order flattening. Right-hand side first, so that the first written
/// argument ends up topmost when the call pops its parameters.
fn linearize(node: OperationNode, out: &mut Vec<Instruction>) {
    match node {
        OperationNode::Operand(instrs) => out.extend(instrs),
        OperationNode::Operation { name, lhs, rhs, .. } => {
            linearize(*rhs, out);
            linearize(*lhs, out);
            out.push(Instruction::PushParameterCount(2));
            out.push(Instruction::Call { name, is_command: false });
        }
    }
}

fn constant_instruction(identifier: &str) -> Option<Instruction> {
    match identifier.to_ascii_lowercase().as_str() {
        "quote" => Some(Instruction::PushString("\"".into())),
        "return" => Some(Instruction::PushString("\r".into())),
        "linefeed" | "newline" => Some(Instruction::PushString("\n".into())),
        "tab" => Some(Instruction::PushString("\t".into())),
        "pi" => Some(Instruction::PushDouble(std::f64::consts::PI)),
        _ => None,
    }
}

/// Parses token buffers into a [`Script`]. English command templates can be
/// registered by the host before `parse` (the `put`/`add`/`subtract`/`create`
/// templates are built in).
pub struct Parser {
    pub script: Script,
    syntaxes: Vec<Syntax>,
    vars: Variables,
    handler_is_command: bool,
    synth_counter: usize,
}

impl Default for Parser {
    fn default() -> Self { Self::new() }
}

impl Parser {
    pub fn new() -> Self {
        let syntaxes = vec![
            Syntax::new(&["put"], vec![
                SyntaxElement::expression(None),
                SyntaxElement::container(Some("into")),
            ]),
            Syntax::new(&["add"], vec![
                SyntaxElement::expression(None),
                SyntaxElement::container(Some("to")),
            ]),
            Syntax::new(&["subtract"], vec![
                SyntaxElement::expression(None),
                SyntaxElement::container(Some("from")),
            ]),
            // `create` comes twice: the trailing expression is optional and
            // the ordered matcher makes optionality free.
            Syntax::new(&["create"], vec![
                SyntaxElement::any_identifier(None),
                SyntaxElement::expression(None),
            ]),
            Syntax::new(&["create"], vec![
                SyntaxElement::any_identifier(None),
            ]),
        ];
        Self {
            script: Script::default(),
            syntaxes,
            vars: Variables::default(),
            handler_is_command: true,
            synth_counter: 0,
        }
    }

    pub fn add_syntax(&mut self, syntax: Syntax) {
        self.syntaxes.push(syntax);
    }

    /// Top-level loop: handler definitions are parsed, anything else is
    /// skipped line by line.
    pub fn parse(&mut self, tokens: &Tokenizer) -> ParseResult<()> {
        let mut cur = TokenCursor::new(tokens);
        loop {
            cur.skip_newlines();
            if cur.is_at_end() { break; }
            if cur.has_specific_identifier("on", true) {
                self.parse_handler(&mut cur, true)?;
            } else if cur.has_specific_identifier("function", true) {
                self.parse_handler(&mut cur, false)?;
            } else {
                cur.skip_line();
            }
        }
        Ok(())
    }

    fn parse_handler(&mut self, cur: &mut TokenCursor, is_command: bool) -> ParseResult<()> {
        let name = match cur.has_identifier(true) {
            Some(n) => n,
            None => return Err(ParseError::ExpectedFunctionName { found: cur.err_token() }),
        };
        let first_instruction = self.script.instructions.len();
        // local count is patched in once the body has been parsed
        self.script.instructions.push(Instruction::Reserve(0));
        self.vars = Variables::default();
        self.handler_is_command = is_command;
        // `result` is addressable in every handler, right above the frame cells
        self.vars.mappings.insert("result".into(), VariableBinding::StackValueBpRelative(2));
        self.vars.num_locals = 1;
        let mut parameter_index = 1;
        while let Some(param) = cur.has_identifier(true) {
            self.vars.mappings.insert(param.to_ascii_lowercase(), VariableBinding::Parameter(parameter_index));
            parameter_index += 1;
            if !cur.has_symbol(",", true) { break; }
        }
        cur.expect_newline()?;
        let mut body = Vec::new();
        loop {
            cur.skip_newlines();
            if cur.has_specific_identifier("end", false) { break; }
            if cur.is_at_end() {
                return Err(ParseError::ExpectedIdentifier { expected: "end".into(), found: None });
            }
            self.parse_statement(cur, &mut body)?;
        }
        self.script.instructions.extend(body);
        self.script.instructions.push(Instruction::PushUnset);
        self.script.instructions.push(Instruction::Return { is_command });
        cur.expect_specific_identifier("end")?;
        cur.expect_specific_identifier(&name)?;
        self.script.instructions[first_instruction] = Instruction::Reserve(self.vars.num_locals);
        debug!(
            handler = %name,
            is_command,
            locals = self.vars.num_locals,
            "registered handler"
        );
        let frame = HandlerFrame { first_instruction, variables: std::mem::take(&mut self.vars) };
        let key = name.to_ascii_lowercase();
        if is_command {
            self.script.commands.insert(key, frame);
        } else {
            self.script.functions.insert(key, frame);
        }
        Ok(())
    }

    fn parse_statement(&mut self, cur: &mut TokenCursor, out: &mut Vec<Instruction>) -> ParseResult<()> {
        if cur.has_specific_identifier("repeat", true) {
            return self.parse_repeat(cur, out);
        }
        if cur.has_specific_identifier("if", true) {
            return self.parse_if(cur, out);
        }
        if self.parse_english_call(cur, out) {
            return Ok(());
        }
        if cur.has_specific_identifier("local", true) {
            // parsing in writable mode registers the local; the generated
            // instructions are not needed
            let mut scratch = Vec::new();
            if !self.parse_value(cur, &mut scratch, true)? {
                return Err(ParseError::ExpectedValue { found: cur.err_token() });
            }
            return Ok(());
        }
        if cur.has_specific_identifier("return", true) {
            if cur.has_newline(false) || cur.is_at_end() {
                out.push(Instruction::PushUnset);
            } else if !self.parse_expression(cur, out, &[], false)? {
                return Err(ParseError::ExpectedExpression { found: cur.err_token() });
            }
            out.push(Instruction::Return { is_command: self.handler_is_command });
            return Ok(());
        }
        let name = match cur.has_identifier(true) {
            Some(n) => n,
            None => return Err(ParseError::ExpectedIdentifier { expected: String::new(), found: cur.err_token() }),
        };
        self.parse_call_arguments(cur, out, &name, true)
    }

    /// Tries every registered English template at the current position.
    /// Returns false (cursor untouched) when none matches.
    fn parse_english_call(&mut self, cur: &mut TokenCursor, out: &mut Vec<Instruction>) -> bool {
        for template_index in 0..self.syntaxes.len() {
            let syntax = self.syntaxes[template_index].clone();
            let save = cur.position();
            if self.match_syntax(cur, &syntax, out) {
                return true;
            }
            cur.seek(save);
        }
        false
    }

    fn match_syntax(&mut self, cur: &mut TokenCursor, syntax: &Syntax, out: &mut Vec<Instruction>) -> bool {
        let words: Vec<&str> = syntax.name.iter().map(String::as_str).collect();
        if !cur.has_identifiers(&words, true) {
            return false;
        }
        let mut params: Vec<Vec<Instruction>> = Vec::new();
        for element in &syntax.elements {
            if let Some(prefix) = &element.prefix {
                if !cur.has_specific_identifier(prefix, true) {
                    return false;
                }
            }
            match &element.kind {
                SyntaxElementKind::Expression => {
                    let mut instrs = Vec::new();
                    match self.parse_expression(cur, &mut instrs, &[","], false) {
                        Ok(true) => params.push(instrs),
                        _ => return false,
                    }
                }
                SyntaxElementKind::Container => {
                    let mut instrs = Vec::new();
                    match self.parse_expression(cur, &mut instrs, &[","], true) {
                        Ok(true) => params.push(instrs),
                        _ => return false,
                    }
                }
                SyntaxElementKind::Identifier(expected) => {
                    let word = match cur.has_identifier(false) {
                        Some(w) => w,
                        None => return false,
                    };
                    let canonical = match expected.iter().find(|e| e.eq_ignore_ascii_case(&word)) {
                        Some(c) => c.to_ascii_lowercase(),
                        None => return false,
                    };
                    let _ = cur.has_identifier(true);
                    params.push(vec![Instruction::PushString(canonical)]);
                }
                SyntaxElementKind::AnyIdentifier => {
                    match cur.has_identifier(true) {
                        Some(w) => params.push(vec![Instruction::PushString(w)]),
                        None => return false,
                    }
                }
                SyntaxElementKind::None => {}
            }
        }
        for param in params.iter().rev() {
            out.extend_from_slice(param);
        }
        out.push(Instruction::PushParameterCount(params.len()));
        out.push(Instruction::Call { name: syntax.call_name(), is_command: true });
        true
    }

    /// Comma-separated argument list for a generic call (statement position
    /// or `name(...)` in an expression). Arguments are emitted in reverse so
    /// the first one ends up topmost under the parameter count.
    fn parse_call_arguments(
        &mut self,
        cur: &mut TokenCursor,
        out: &mut Vec<Instruction>,
        name: &str,
        is_command: bool,
    ) -> ParseResult<()> {
        let mut arguments: Vec<Vec<Instruction>> = Vec::new();
        let mut first = Vec::new();
        if self.parse_expression(cur, &mut first, &[","], false)? {
            arguments.push(first);
            while cur.has_symbol(",", true) {
                let mut buf = Vec::new();
                if !self.parse_expression(cur, &mut buf, &[","], false)? {
                    return Err(ParseError::ExpectedExpression { found: cur.err_token() });
                }
                arguments.push(buf);
            }
        }
        for argument in arguments.iter().rev() {
            out.extend_from_slice(argument);
        }
        out.push(Instruction::PushParameterCount(arguments.len()));
        out.push(Instruction::Call { name: name.to_ascii_lowercase(), is_command });
        Ok(())
    }

    /// One value: literal, constant, function call, property chain, variable
    /// — or, failing all of those, the identifier itself as a string, which
    /// is what lets `put button into kind` work unquoted. In writable mode a
    /// fresh identifier becomes a new local instead.
    fn parse_value(&mut self, cur: &mut TokenCursor, out: &mut Vec<Instruction>, writable: bool) -> ParseResult<bool> {
        if let Some(s) = cur.has_string(true) {
            out.push(Instruction::PushString(s));
            return Ok(true);
        }
        if let Some(i) = cur.has_integer(true) {
            out.push(Instruction::PushInteger(i));
            return Ok(true);
        }
        if let Some(d) = cur.has_double(true) {
            out.push(Instruction::PushDouble(d));
            return Ok(true);
        }
        let identifier = match cur.has_identifier(true) {
            Some(w) => w,
            None => return Ok(false),
        };
        if let Some(instruction) = constant_instruction(&identifier) {
            out.push(instruction);
            return Ok(true);
        }
        if cur.has_symbol("(", true) {
            self.parse_call_arguments(cur, out, &identifier, false)?;
            cur.expect_symbol(")")?;
            return Ok(true);
        }
        if cur.has_specific_identifier("of", true) {
            if !self.parse_value(cur, out, false)? {
                return Err(ParseError::ExpectedValue { found: cur.err_token() });
            }
            out.push(Instruction::PushProperty(identifier.to_ascii_lowercase()));
            return Ok(true);
        }
        let key = identifier.to_ascii_lowercase();
        if let Some(binding) = self.vars.mappings.get(&key) {
            out.push(binding.instruction());
            return Ok(true);
        }
        if writable {
            let binding = self.writable_binding(&identifier);
            out.push(binding.instruction());
            return Ok(true);
        }
        out.push(Instruction::PushString(identifier));
        Ok(true)
    }

    /// Expression: leading value, then operator/value pairs folded into the
    /// precedence tree. Stops at newlines, brackets and forbidden operators;
    /// an operator with no value after it is put back.
    fn parse_expression(
        &mut self,
        cur: &mut TokenCursor,
        out: &mut Vec<Instruction>,
        forbidden_operators: &[&str],
        writable: bool,
    ) -> ParseResult<bool> {
        let mut first = Vec::new();
        if !self.parse_value(cur, &mut first, writable)? {
            return Ok(false);
        }
        let mut root = OperationNode::Operand(first);
        loop {
            let symbol = match cur.has_any_symbol(false) {
                Some(s) => s,
                None => break,
            };
            if symbol == "\n" || is_bracket(&symbol) || forbidden_operators.contains(&symbol.as_str()) {
                break;
            }
            let save = cur.position();
            cur.has_any_symbol(true);
            let mut operand = Vec::new();
            if !self.parse_value(cur, &mut operand, false)? {
                cur.seek(save);
                break;
            }
            root = insert_operand(root, symbol, operand);
        }
        linearize(root, out);
        Ok(true)
    }

    fn writable_binding(&mut self, name: &str) -> VariableBinding {
        let key = name.to_ascii_lowercase();
        if let Some(binding) = self.vars.mappings.get(&key) {
            return *binding;
        }
        let binding = VariableBinding::StackValueBpRelative(2 + self.vars.num_locals as i32);
        self.vars.num_locals += 1;
        self.vars.mappings.insert(key, binding);
        binding
    }

    // --- control flow ---

    fn parse_if(&mut self, cur: &mut TokenCursor, out: &mut Vec<Instruction>) -> ParseResult<()> {
        let mut condition = Vec::new();
        if !self.parse_expression(cur, &mut condition, &[], false)? {
            return Err(ParseError::ExpectedExpression { found: cur.err_token() });
        }
        cur.skip_newlines();
        cur.expect_specific_identifier("then")?;
        let mut true_branch = Vec::new();
        let mut false_branch = None;
        if cur.has_newline(false) {
            // multi-line shape, closed by `end if` (or `else … end if`)
            loop {
                cur.skip_newlines();
                if cur.has_identifiers(&["end", "if"], true) { break; }
                if cur.has_specific_identifier("else", true) {
                    false_branch = Some(self.parse_else_branch(cur)?);
                    break;
                }
                if cur.is_at_end() {
                    return Err(ParseError::ExpectedIdentifier { expected: "end if".into(), found: None });
                }
                self.parse_statement(cur, &mut true_branch)?;
            }
        } else {
            // single-line true branch; an else may still follow on the next line
            self.parse_statement(cur, &mut true_branch)?;
            let save = cur.position();
            cur.skip_newlines();
            if cur.has_specific_identifier("else", true) {
                if cur.has_newline(false) {
                    false_branch = Some(self.parse_else_branch(cur)?);
                } else {
                    let mut branch = Vec::new();
                    self.parse_statement(cur, &mut branch)?;
                    false_branch = Some(branch);
                }
            } else {
                cur.seek(save);
            }
        }
        let true_len = true_branch.len() as i32;
        out.extend(condition);
        match false_branch {
            Some(false_branch) => {
                let false_len = false_branch.len() as i32;
                out.push(Instruction::JumpByIfFalse(true_len + 2));
                out.extend(true_branch);
                out.push(Instruction::JumpBy(false_len + 1));
                out.extend(false_branch);
            }
            None => {
                out.push(Instruction::JumpByIfFalse(true_len + 1));
                out.extend(true_branch);
            }
        }
        Ok(())
    }

    fn parse_else_branch(&mut self, cur: &mut TokenCursor) -> ParseResult<Vec<Instruction>> {
        let mut branch = Vec::new();
        loop {
            cur.skip_newlines();
            if cur.has_identifiers(&["end", "if"], true) { break; }
            if cur.is_at_end() {
                return Err(ParseError::ExpectedIdentifier { expected: "end if".into(), found: None });
            }
            self.parse_statement(cur, &mut branch)?;
        }
        Ok(branch)
    }

    fn parse_repeat(&mut self, cur: &mut TokenCursor, out: &mut Vec<Instruction>) -> ParseResult<()> {
        if cur.has_specific_identifier("while", true) {
            let mut condition = Vec::new();
            if !self.parse_expression(cur, &mut condition, &[], false)? {
                return Err(ParseError::ExpectedExpression { found: cur.err_token() });
            }
            let body = self.parse_repeat_body(cur)?;
            emit_loop(out, condition, body);
            return Ok(());
        }
        if cur.has_specific_identifier("with", true) {
            return self.parse_counted_repeat(cur, out);
        }
        // `repeat [for] <count> [times]`
        cur.has_specific_identifier("for", true);
        let mut count = Vec::new();
        if !self.parse_expression(cur, &mut count, &[], false)? {
            return Err(ParseError::ExpectedExpression { found: cur.err_token() });
        }
        cur.has_specific_identifier("times", true);
        // The `%` prefix cannot be produced by the tokenizer as part of an
        // identifier, so the counter can never collide with a user name.
        let counter_name = format!("%repeat{}", self.synth_counter);
        self.synth_counter += 1;
        let counter = self.writable_binding(&counter_name);
        // counter starts at the count and runs down to zero with `>`, so a
        // non-positive count skips the body entirely
        emit_builtin_command(out, counter, count, "put");
        let mut condition = Vec::new();
        condition.push(Instruction::PushInteger(0));
        condition.push(counter.instruction());
        condition.push(Instruction::PushParameterCount(2));
        condition.push(Instruction::Call { name: ">".into(), is_command: false });
        let mut body = self.parse_repeat_body(cur)?;
        emit_builtin_command(&mut body, counter, vec![Instruction::PushInteger(1)], "subtract");
        emit_loop(out, condition, body);
        Ok(())
    }

    /// `repeat with <name> from <start> [down] to <end>`. Equivalent to
    /// `put start into name; while name <= end { body; add step to name }`.
    /// The comparison is `<=` regardless of direction, so a strictly
    /// descending range never runs — longstanding behavior, kept as is.
    fn parse_counted_repeat(&mut self, cur: &mut TokenCursor, out: &mut Vec<Instruction>) -> ParseResult<()> {
        let variable = cur.expect_identifier()?;
        cur.expect_specific_identifier("from")?;
        let mut start = Vec::new();
        if !self.parse_expression(cur, &mut start, &[], false)? {
            return Err(ParseError::ExpectedExpression { found: cur.err_token() });
        }
        let descending = cur.has_specific_identifier("down", true);
        cur.expect_specific_identifier("to")?;
        let mut end = Vec::new();
        if !self.parse_expression(cur, &mut end, &[], false)? {
            return Err(ParseError::ExpectedExpression { found: cur.err_token() });
        }
        let counter = self.writable_binding(&variable);
        emit_builtin_command(out, counter, start, "put");
        let mut condition = end;
        condition.push(counter.instruction());
        condition.push(Instruction::PushParameterCount(2));
        condition.push(Instruction::Call { name: "<=".into(), is_command: false });
        let mut body = self.parse_repeat_body(cur)?;
        let step = if descending { -1 } else { 1 };
        emit_builtin_command(&mut body, counter, vec![Instruction::PushInteger(step)], "add");
        emit_loop(out, condition, body);
        Ok(())
    }

    fn parse_repeat_body(&mut self, cur: &mut TokenCursor) -> ParseResult<Vec<Instruction>> {
        let mut body = Vec::new();
        loop {
            cur.skip_newlines();
            if cur.has_identifiers(&["end", "repeat"], true) { break; }
            if cur.is_at_end() {
                return Err(ParseError::ExpectedIdentifier { expected: "end repeat".into(), found: None });
            }
            self.parse_statement(cur, &mut body)?;
        }
        Ok(body)
    }
}

/// condition, branch-out-if-false, body, jump back to the condition.
fn emit_loop(out: &mut Vec<Instruction>, condition: Vec<Instruction>, body: Vec<Instruction>) {
    let condition_len = condition.len() as i32;
    let body_len = body.len() as i32;
    out.extend(condition);
    out.push(Instruction::JumpByIfFalse(body_len + 2));
    out.extend(body);
    out.push(Instruction::JumpBy(-(condition_len + body_len + 1)));
}

/// `<name> <value…> into/to/from <destination>` as instructions: the
/// destination reference is pushed first so the value ends up topmost, which
/// is the argument order the command builtins expect.
fn emit_builtin_command(
    out: &mut Vec<Instruction>,
    destination: VariableBinding,
    value: Vec<Instruction>,
    name: &str,
) {
    out.push(destination.instruction());
    out.extend(value);
    out.push(Instruction::PushParameterCount(2));
    out.push(Instruction::Call { name: name.into(), is_command: true });
}
