use thiserror::Error;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Span { pub start: u32, pub end: u32 }
impl Span { pub fn new(start: usize, end: usize) -> Self { Self { start: start as u32, end: end as u32 } } }

/// Errors raised while a script is executing. The `Expected…Here` variants
/// are internal: they fire when a stack cell holds a different kind of value
/// than the machine (or a coercion) requires, which a well-formed program
/// never triggers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("stack index out of range")]
    StackIndexOutOfRange,
    #[error("too few operands")]
    TooFewOperands,
    #[error("too many operands")]
    TooManyOperands,
    #[error("division by zero")]
    ZeroDivision,
    #[error("unknown message '{name}'")]
    UnknownMessage { name: String, is_command: bool },
    #[error("unknown instruction")]
    UnknownInstruction,
    #[error("expected a container to put the value into")]
    InvalidPutDestination,
    #[error("{excess} leftover value(s) on the stack at end of call")]
    StackNotCleanedUpAtEndOfCall { excess: usize },
    #[error("unknown property '{0}'")]
    UnknownProperty(String),
    #[error("property '{0}' is read-only")]
    ReadOnlyProperty(String),
    #[error("object does not exist anymore")]
    ObjectDoesNotExist,
    #[error("unknown object type '{0}'")]
    UnknownObjectType(String),
    #[error("expected an integer here")]
    ExpectedIntegerHere,
    #[error("expected a number here")]
    ExpectedNumberHere,
    #[error("expected a boolean here")]
    ExpectedBooleanHere,
    #[error("expected a string here")]
    ExpectedStringHere,
    #[error("expected an instruction index here")]
    ExpectedInstructionIndexHere,
    #[error("expected a stack index here")]
    ExpectedStackIndexHere,
    #[error("expected a parameter count here")]
    ExpectedParameterCountHere,
    #[error("stack depth limit exceeded")]
    StackOverflow,
}

pub type RunResult<T> = std::result::Result<T, RuntimeError>;
