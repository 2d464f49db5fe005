use std::io::{self, BufRead, Write};
use std::rc::Rc;

use parley_bytecode::Value;

/// Line-oriented session: `on`/`function` definitions accumulate, any other
/// line is wrapped in a scratch handler and run against them. Variables live
/// only for the line they are typed on; definitions stick around.
pub fn run_repl() {
    println!("Parley session. Define handlers with `on`/`function`; anything else runs.");
    println!("`return` or `output` something to see it. Type `quit` to leave.");
    let mut definitions = String::new();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("parley> ");
        let _ = io::stdout().flush();
        let Some(Ok(line)) = lines.next() else { break };
        let trimmed = line.trim();
        if trimmed.is_empty() { continue; }
        if trimmed.eq_ignore_ascii_case("quit") || trimmed.eq_ignore_ascii_case("exit") {
            break;
        }
        let first_word = trimmed.split_whitespace().next().unwrap_or("");
        if first_word.eq_ignore_ascii_case("on") || first_word.eq_ignore_ascii_case("function") {
            let name = trimmed
                .split_whitespace()
                .nth(1)
                .unwrap_or("")
                .to_ascii_lowercase();
            let block = read_definition(&mut lines, &line, &name);
            let candidate = format!("{}{}", definitions, block);
            match crate::parse_script(&candidate, "repl") {
                Ok(_) => {
                    definitions = candidate;
                    println!("ok");
                }
                Err(e) => println!("parse error: {}", e),
            }
            continue;
        }
        run_line(&definitions, &line);
    }
}

fn read_definition(
    lines: &mut impl Iterator<Item = io::Result<String>>,
    first_line: &str,
    name: &str,
) -> String {
    let mut block = String::new();
    block.push_str(first_line);
    block.push('\n');
    loop {
        print!("   ...> ");
        let _ = io::stdout().flush();
        let Some(Ok(next)) = lines.next() else { break };
        let done = {
            let mut words = next.trim().split_whitespace();
            words.next().map_or(false, |w| w.eq_ignore_ascii_case("end"))
                && words.next().map_or(false, |w| w.eq_ignore_ascii_case(name))
        };
        block.push_str(&next);
        block.push('\n');
        if done { break; }
    }
    block
}

fn run_line(definitions: &str, line: &str) {
    let source = format!("{}\non replscratch\n{}\nend replscratch\n", definitions, line);
    let script = match crate::parse_script(&source, "repl") {
        Ok(s) => s,
        Err(e) => {
            println!("parse error: {}", e);
            return;
        }
    };
    let mut ctx = crate::host_context(Rc::new(script));
    match ctx.run("replscratch", true, &[]) {
        Ok(()) => {
            if let Some(v) = ctx.result_value() {
                if !matches!(v, Value::Unset) {
                    match v.as_string(&ctx.stack) {
                        Ok(s) => println!("{}", s),
                        Err(_) => println!("{:?}", v),
                    }
                }
            }
        }
        Err(e) => println!("runtime error: {}", e),
    }
}
