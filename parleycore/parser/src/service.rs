use serde::{Deserialize, Serialize};

use parley_bytecode::{HandlerFrame, VariableBinding};
use parley_lexer::Tokenizer;

use crate::Parser;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DiagnosticSeverity { Error, Warning, Information }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub severity: DiagnosticSeverity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SymbolKind { Command, Function }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub name: String,
    pub kind: SymbolKind,
    pub parameters: usize,
    pub locals: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScriptDiagnostics {
    pub errors: Vec<Diagnostic>,
    pub symbols: Vec<SymbolInfo>,
}

/// Tokenizes and parses a source text, reporting errors with line/column
/// positions and the handlers that were defined. Never fails: problems come
/// back as diagnostics.
pub fn analyze_source(source: &str, filename: &str) -> ScriptDiagnostics {
    let mut out = ScriptDiagnostics::default();
    let mut tokenizer = Tokenizer::new();
    if let Err(e) = tokenizer.add_tokens(source, filename) {
        out.errors.push(diagnostic_for(&e, source));
        return out;
    }
    let mut parser = Parser::new();
    match parser.parse(&tokenizer) {
        Ok(()) => {
            let mut symbols: Vec<SymbolInfo> = parser
                .script
                .commands
                .iter()
                .map(|(name, frame)| symbol_for(name, frame, SymbolKind::Command))
                .chain(
                    parser
                        .script
                        .functions
                        .iter()
                        .map(|(name, frame)| symbol_for(name, frame, SymbolKind::Function)),
                )
                .collect();
            symbols.sort_by(|a, b| a.name.cmp(&b.name));
            out.symbols = symbols;
        }
        Err(e) => out.errors.push(diagnostic_for(&e, source)),
    }
    out
}

fn symbol_for(name: &str, frame: &HandlerFrame, kind: SymbolKind) -> SymbolInfo {
    let parameters = frame
        .variables
        .mappings
        .values()
        .filter(|b| matches!(b, VariableBinding::Parameter(_)))
        .count();
    SymbolInfo { name: name.to_string(), kind, parameters, locals: frame.variables.num_locals }
}

fn diagnostic_for(error: &parley_lexer::ParseError, source: &str) -> Diagnostic {
    let (line, column) = match error.token() {
        Some(t) => line_column(source, t.offset() as usize),
        None => (0, 0),
    };
    Diagnostic { message: error.to_string(), line, column, severity: DiagnosticSeverity::Error }
}

// 1-based line and column for a byte offset
fn line_column(source: &str, offset: usize) -> (usize, usize) {
    let clamped = offset.min(source.len());
    let before = &source[..clamped];
    let line = before.matches('\n').count() + 1;
    let column = before.chars().rev().take_while(|c| *c != '\n').count() + 1;
    (line, column)
}
