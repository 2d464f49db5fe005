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

use std::env;
use std::io::{self, Write};
use std::rc::Rc;

use parley_lexer::Tokenizer;
use parley_objects::{register_objects, Registry};
use parley_parser::service::analyze_source;
use parley_parser::{Parser, Syntax, SyntaxElement};
use parley_vm::RunContext;
use parley_bytecode::{Script, Value};
use tracing_subscriber::EnvFilter;

mod repl;

fn main() {
    install_tracing();
    let mut args = env::args().skip(1);
    let Some(cmd) = args.next() else {
        print_help();
        std::process::exit(2);
    };
    match canonicalize(&cmd) {
        "run" => cmd_run(args.next(), args.next()),
        "lex" => cmd_lex(args.next()),
        "analyze" => {
            let mut path = None;
            let mut json = false;
            for a in args {
                if a == "--json" { json = true; } else { path = Some(a); }
            }
            cmd_analyze(path, json);
        }
        "repl" => repl::run_repl(),
        "version" => println!("parleyc {}", env!("CARGO_PKG_VERSION")),
        "help" | "--help" | "-h" => print_help(),
        other => {
            eprintln!("unknown command '{}'", other);
            print_help();
            std::process::exit(2);
        }
    }
}

fn install_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

// Map fun aliases → canonical commands
fn canonicalize(cmd: &str) -> &str {
    match cmd.to_ascii_lowercase().as_str() {
        "run" => "run",
        "lex" => "lex",
        "chop" => "lex", // fun alias
        "analyze" | "--analyze" => "analyze",
        "repl" => "repl",
        "chat" => "repl", // fun alias
        "say" => "run",   // fun alias
        "version" | "--version" | "-v" => "version",
        _ => cmd,
    }
}

fn print_help() {
    println!("Parley CLI\n");
    println!("Commands (aliases in parentheses):");
    println!("  run  (say)      Tokenize → parse → run a .parley file");
    println!("  lex  (chop)     Dump tokens from a .parley file (debug)");
    println!("  analyze [--json]  Parse and print diagnostics/symbols");
    println!("  repl (chat)     Interactive session");
    println!("  version         Print the version\n");
    println!("Usage:");
    println!("  parleyc <command> [args]\n");
    println!("Examples:");
    println!("  parleyc run demos/hello.parley");
    println!("  parleyc run demos/hello.parley greet");
    println!("  parleyc lex demos/hello.parley");
    println!("  parleyc analyze demos/hello.parley --json");
    println!("");
}

/// Templates for the commands this host adds on top of the built-in ones.
/// `output` needs none (the generic-call statement form covers it); `ask` is
/// registered as a proper English syntax.
pub fn host_syntaxes() -> Vec<Syntax> {
    vec![
        Syntax::new(&["ask"], vec![SyntaxElement::expression(None)]),
    ]
}

/// Parses a source text with the host templates registered. Used by `run`
/// and the REPL.
pub fn parse_script(source: &str, file: &str) -> Result<Script, parley_lexer::ParseError> {
    let mut tokenizer = Tokenizer::new();
    tokenizer.add_tokens(source, file)?;
    let mut parser = Parser::new();
    for syntax in host_syntaxes() {
        parser.add_syntax(syntax);
    }
    parser.parse(&tokenizer)?;
    Ok(std::mem::take(&mut parser.script))
}

/// A run context with this host's builtins: `output`, `ask`, `create`.
pub fn host_context(script: Rc<Script>) -> RunContext {
    let mut ctx = RunContext::new(script);
    ctx.add_builtin_command("output", Rc::new(|args: &[Value], ctx: &mut RunContext| {
        let text = match args.first() {
            Some(v) => v.as_string(&ctx.stack)?,
            None => String::new(),
        };
        println!("{}", text);
        Ok(())
    }));
    ctx.add_builtin_command("ask", Rc::new(|args: &[Value], ctx: &mut RunContext| {
        if let Some(prompt) = args.first() {
            print!("{} ", prompt.as_string(&ctx.stack)?);
            let _ = io::stdout().flush();
        }
        let mut input = String::new();
        let _ = io::stdin().read_line(&mut input);
        while input.ends_with('\n') || input.ends_with('\r') {
            input.pop();
        }
        ctx.set_result(Value::from(input))
    }));
    let registry = Rc::new({
        let mut registry = Registry::new();
        register_objects(&mut registry);
        registry
    });
    ctx.add_builtin_command("create", Rc::new(move |args: &[Value], ctx: &mut RunContext| {
        let kind = match args.first() {
            Some(v) => v.as_string(&ctx.stack)?,
            None => return Err(parley_common::RuntimeError::TooFewOperands),
        };
        // factories never see stack references
        let mut factory_args = Vec::new();
        for arg in &args[1..] {
            factory_args.push(arg.resolved(&ctx.stack)?);
        }
        let object = registry.make(&kind, &factory_args)?;
        ctx.set_result(Value::NativeObject(object))
    }));
    ctx
}

fn cmd_run(path: Option<String>, handler: Option<String>) {
    let Some(path) = path else {
        eprintln!("usage: parleyc run <file.parley> [handler]");
        std::process::exit(2)
    };
    let src = match std::fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) => { eprintln!("read {}: {}", path, e); std::process::exit(1); }
    };
    let script = match parse_script(&src, &path) {
        Ok(s) => s,
        Err(e) => { eprintln!("parse error: {}", e); std::process::exit(1); }
    };
    let mut ctx = host_context(Rc::new(script));
    let handler = handler.unwrap_or_else(|| "main".to_string());
    if let Err(e) = ctx.run(&handler, true, &[]) {
        eprintln!("runtime error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_lex(path: Option<String>) {
    let Some(path) = path else { eprintln!("usage: parleyc lex <file.parley>"); std::process::exit(2) };
    let src = std::fs::read_to_string(&path).expect("read file");
    let mut tokenizer = Tokenizer::new();
    match tokenizer.add_tokens(&src, &path) {
        Ok(()) => {
            for t in &tokenizer.tokens {
                println!("{:?}\t@{}..{}", t.kind, t.span.start, t.span.end);
            }
        }
        Err(e) => {
            eprintln!("lex error: {}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_analyze(path: Option<String>, json: bool) {
    let Some(path) = path else { eprintln!("usage: parleyc analyze <file.parley> [--json]"); std::process::exit(2) };
    let src = match std::fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) => { eprintln!("read {}: {}", path, e); std::process::exit(1); }
    };
    let diags = analyze_source(&src, &path);
    if json {
        match serde_json::to_string_pretty(&diags) {
            Ok(s) => println!("{}", s),
            Err(e) => { eprintln!("json: {}", e); std::process::exit(1); }
        }
    } else {
        if diags.errors.is_empty() {
            println!("No errors.");
        } else {
            println!("Errors:");
            for e in &diags.errors {
                println!("- at {}:{}: {}", e.line, e.column, e.message);
            }
        }
        if !diags.symbols.is_empty() {
            println!("Handlers:");
            for s in &diags.symbols {
                println!("- {:?} {} ({} parameter(s), {} local(s))", s.kind, s.name, s.parameters, s.locals);
            }
        }
    }
}
