use parley_bytecode::{Instruction, Script, VariableBinding};
use parley_lexer::{ParseError, Tokenizer};
use parley_parser::Parser;

fn compile(src: &str) -> Script {
    let mut tokenizer = Tokenizer::new();
    tokenizer.add_tokens(src, "test.parley").expect("tokenize");
    let mut parser = Parser::new();
    parser.parse(&tokenizer).expect("parse");
    parser.script
}

fn compile_err(src: &str) -> ParseError {
    let mut tokenizer = Tokenizer::new();
    tokenizer.add_tokens(src, "test.parley").expect("tokenize");
    let mut parser = Parser::new();
    parser.parse(&tokenizer).expect_err("expected a parse error")
}

#[test]
fn empty_handler_shape() {
    let script = compile("on main\nend main\n");
    let frame = script.commands.get("main").expect("main registered");
    assert_eq!(
        script.instructions[frame.first_instruction],
        Instruction::Reserve(1)
    );
    // body is just the implicit return
    assert_eq!(
        script.instructions[frame.first_instruction + 1..frame.first_instruction + 3],
        [Instruction::PushUnset, Instruction::Return { is_command: true }]
    );
    assert_eq!(frame.variables.num_locals, 1);
    assert_eq!(
        frame.variables.mappings.get("result"),
        Some(&VariableBinding::StackValueBpRelative(2))
    );
}

#[test]
fn put_into_fresh_local_allocates_it() {
    let script = compile("on main\nput \"foo\" into myFoo\nend main\n");
    let frame = script.commands.get("main").unwrap();
    assert_eq!(frame.variables.num_locals, 2);
    assert_eq!(
        frame.variables.mappings.get("myfoo"),
        Some(&VariableBinding::StackValueBpRelative(3))
    );
    assert_eq!(script.instructions[frame.first_instruction], Instruction::Reserve(2));
    // destination reference goes first so the value ends up topmost
    assert_eq!(
        script.instructions[frame.first_instruction + 1..frame.first_instruction + 5],
        [
            Instruction::StackValueBpRelative(3),
            Instruction::PushString("foo".into()),
            Instruction::PushParameterCount(2),
            Instruction::Call { name: "put".into(), is_command: true },
        ]
    );
}

#[test]
fn parameters_bind_one_based() {
    let script = compile("on greet first_name, last_name\nend greet\n");
    let frame = script.commands.get("greet").unwrap();
    assert_eq!(
        frame.variables.mappings.get("first_name"),
        Some(&VariableBinding::Parameter(1))
    );
    assert_eq!(
        frame.variables.mappings.get("last_name"),
        Some(&VariableBinding::Parameter(2))
    );
    // parameters are not locals
    assert_eq!(frame.variables.num_locals, 1);
}

#[test]
fn expression_linearizes_rightmost_first() {
    let script = compile("on main\nreturn 1 + 2 * 3\nend main\n");
    let frame = script.commands.get("main").unwrap();
    let body = &script.instructions[frame.first_instruction..];
    assert_eq!(
        body,
        [
            Instruction::Reserve(1),
            Instruction::PushInteger(3),
            Instruction::PushInteger(2),
            Instruction::PushParameterCount(2),
            Instruction::Call { name: "*".into(), is_command: false },
            Instruction::PushInteger(1),
            Instruction::PushParameterCount(2),
            Instruction::Call { name: "+".into(), is_command: false },
            Instruction::Return { is_command: true },
            Instruction::PushUnset,
            Instruction::Return { is_command: true },
        ]
    );
}

#[test]
fn comparisons_bind_loosest() {
    let script = compile("on main\nreturn 1 + 2 > 3\nend main\n");
    let frame = script.commands.get("main").unwrap();
    let body = &script.instructions[frame.first_instruction..];
    // the comparison wraps the whole arithmetic expression
    assert_eq!(
        body,
        [
            Instruction::Reserve(1),
            Instruction::PushInteger(3),
            Instruction::PushInteger(2),
            Instruction::PushInteger(1),
            Instruction::PushParameterCount(2),
            Instruction::Call { name: "+".into(), is_command: false },
            Instruction::PushParameterCount(2),
            Instruction::Call { name: ">".into(), is_command: false },
            Instruction::Return { is_command: true },
            Instruction::PushUnset,
            Instruction::Return { is_command: true },
        ]
    );
}

#[test]
fn function_calls_push_arguments_in_reverse() {
    let script = compile("on main\nreturn highest(1, 2)\nend main\n");
    let frame = script.commands.get("main").unwrap();
    let body = &script.instructions[frame.first_instruction..];
    assert_eq!(
        body[..5],
        [
            Instruction::Reserve(1),
            Instruction::PushInteger(2),
            Instruction::PushInteger(1),
            Instruction::PushParameterCount(2),
            Instruction::Call { name: "highest".into(), is_command: false },
        ]
    );
}

#[test]
fn property_access_compiles_to_push_property() {
    let script = compile("on main\nreturn length of \"Four\"\nend main\n");
    let frame = script.commands.get("main").unwrap();
    let body = &script.instructions[frame.first_instruction..];
    assert_eq!(
        body[..3],
        [
            Instruction::Reserve(1),
            Instruction::PushString("Four".into()),
            Instruction::PushProperty("length".into()),
        ]
    );
}

#[test]
fn unknown_identifier_reads_as_its_own_text() {
    let script = compile("on main\nreturn button\nend main\n");
    let frame = script.commands.get("main").unwrap();
    assert_eq!(
        script.instructions[frame.first_instruction + 1],
        Instruction::PushString("button".into())
    );
}

#[test]
fn constants_compile_to_literals() {
    let script = compile("on main\nreturn quote\nend main\n");
    let frame = script.commands.get("main").unwrap();
    assert_eq!(
        script.instructions[frame.first_instruction + 1],
        Instruction::PushString("\"".into())
    );
    let script = compile("on main\nreturn tab\nend main\n");
    let frame = script.commands.get("main").unwrap();
    assert_eq!(
        script.instructions[frame.first_instruction + 1],
        Instruction::PushString("\t".into())
    );
}

#[test]
fn return_in_value_position_is_the_carriage_return_constant() {
    let script = compile("on main\nreturn return\nend main\n");
    let frame = script.commands.get("main").unwrap();
    assert_eq!(
        script.instructions[frame.first_instruction + 1],
        Instruction::PushString("\r".into())
    );
}

#[test]
fn local_registers_without_emitting() {
    let script = compile("on main\nlocal counter\nend main\n");
    let frame = script.commands.get("main").unwrap();
    assert_eq!(frame.variables.num_locals, 2);
    assert_eq!(
        frame.variables.mappings.get("counter"),
        Some(&VariableBinding::StackValueBpRelative(3))
    );
    // nothing in the body except the implicit return
    assert_eq!(
        &script.instructions[frame.first_instruction..],
        &[
            Instruction::Reserve(2),
            Instruction::PushUnset,
            Instruction::Return { is_command: true },
        ]
    );
}

#[test]
fn commands_and_functions_are_separate_namespaces() {
    let script = compile(
        "on quoted str\nend quoted\nfunction quoted str\nreturn str\nend quoted\n",
    );
    assert!(script.commands.contains_key("quoted"));
    assert!(script.functions.contains_key("quoted"));
    assert_ne!(
        script.commands.get("quoted").unwrap().first_instruction,
        script.functions.get("quoted").unwrap().first_instruction
    );
}

#[test]
fn handler_names_are_case_insensitive() {
    let script = compile("on MyHandler\nend MYHANDLER\n");
    assert!(script.commands.contains_key("myhandler"));
    assert!(script.handler("MyHandler", true).is_some());
}

#[test]
fn all_bindings_stay_in_frame_range() {
    let script = compile(
        "on busy a, b\nlocal x\nput 1 into y\nrepeat with i from 1 to 3\nend repeat\nend busy\n",
    );
    let frame = script.commands.get("busy").unwrap();
    let locals = frame.variables.num_locals as i32;
    for binding in frame.variables.mappings.values() {
        match binding {
            VariableBinding::Parameter(i) => assert!((1..=2).contains(i)),
            VariableBinding::StackValueBpRelative(off) => {
                assert!((2..2 + locals).contains(off), "offset {} out of range", off);
            }
        }
    }
    assert_eq!(script.instructions[frame.first_instruction], Instruction::Reserve(locals as usize));
}

#[test]
fn reparse_is_structurally_equal() {
    let src = "\
function quoted str\nreturn quote & str & quote\nend quoted\n\
on main\nput 5 into x\nrepeat while x > 0\nsubtract 1 from x\nend repeat\n\
if x = 0 then\nreturn quoted(\"done\")\nend if\nend main\n";
    assert_eq!(compile(src), compile(src));
}

#[test]
fn wrong_closing_name_is_reported() {
    let err = compile_err("on main\nend wrong\n");
    assert!(matches!(err, ParseError::ExpectedIdentifier { .. }));
}

#[test]
fn missing_handler_name_is_reported() {
    let err = compile_err("on\nend\n");
    assert!(matches!(err, ParseError::ExpectedFunctionName { .. }));
}

#[test]
fn unterminated_repeat_is_reported() {
    let err = compile_err("on main\nrepeat while 1 < 2\noutput \"x\"\nend main\n");
    assert!(matches!(err, ParseError::ExpectedIdentifier { .. }));
}

#[test]
fn top_level_junk_is_skipped() {
    let script = compile("-- a header comment\nsome stray line\non main\nend main\n");
    assert!(script.commands.contains_key("main"));
}

#[test]
fn host_templates_participate_in_matching() {
    use parley_parser::{Syntax, SyntaxElement};
    let mut tokenizer = Tokenizer::new();
    tokenizer
        .add_tokens("on main\nsort lines of stuff descending\nend main\n", "t.parley")
        .unwrap();
    let mut parser = Parser::new();
    parser.add_syntax(Syntax::new(
        &["sort", "lines", "of"],
        vec![
            SyntaxElement::container(None),
            SyntaxElement::identifier(None, &["ascending", "descending"]),
        ],
    ));
    parser.parse(&tokenizer).expect("parse");
    let script = parser.script;
    let frame = script.commands.get("main").unwrap();
    let body = &script.instructions[frame.first_instruction..];
    assert_eq!(
        body[1..5],
        [
            Instruction::PushString("descending".into()),
            Instruction::StackValueBpRelative(3),
            Instruction::PushParameterCount(2),
            Instruction::Call { name: "sort lines of".into(), is_command: true },
        ]
    );
}
