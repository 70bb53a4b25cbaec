use std::io;

use tokio::io::AsyncRead;

/// A pseudoterminal allocated for a locally started inferior.
pub struct InferiorTerminal {
    /// Path of the slave side, handed to the debugger via
    /// `inferior-tty-set`.
    pub slave_path: String,
    /// Read side of the terminal; the session forwards it as target
    /// output events.
    pub output: Box<dyn AsyncRead + Send + Unpin>,
}

/// Source of inferior terminals. Platform specific, so implemented by the
/// embedding application and handed to the session through its
/// configuration.
pub trait InferiorTerminalProvider: Send + Sync {
    fn allocate(&self) -> io::Result<InferiorTerminal>;
}
