use thiserror::Error;

/// Errors surfaced by a debugger session.
#[derive(Error, Debug)]
pub enum Error {
    /// The debugger answered a command with `^error`. Not fatal to the
    /// session; the queue proceeds to the next command.
    #[error("command `{command}` failed: {message}")]
    CommandFailed {
        message: String,
        code: Option<String>,
        command: String,
        token: Option<u64>,
    },

    /// A response parsed cleanly but is missing a key the operation
    /// requires (e.g. `value`, `memory`, `asm_insns`, a non-empty
    /// `threads`).
    #[error("malformed response to `{command}`: {message}")]
    MalformedResponse {
        message: String,
        response: String,
        command: String,
        token: Option<u64>,
    },

    /// The MI parser rejected a line from the debugger. Fatal: the session
    /// stops and every pending command fails with this error.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Caller-side precondition violation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The session has ended; in-flight and future commands fail with this.
    #[error("debugger session closed")]
    SessionClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to recognize a line of debugger output as an MI record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot parse MI output (line {line}, column {column}): expected {}, found {found:?}", .expected.join(" | "))]
pub struct ParseError {
    /// Line number within the session, 1-based. Zero when the parser was
    /// invoked outside a session.
    pub line: u64,
    /// 1-based column of the deepest point the grammar reached.
    pub column: usize,
    /// Names of the grammar productions that could have continued.
    pub expected: Vec<String>,
    /// The raw line as received.
    pub found: String,
}

pub type Result<T> = std::result::Result<T, Error>;
