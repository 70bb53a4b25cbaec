use std::fmt;
use std::sync::Arc;

use crate::terminal::InferiorTerminalProvider;

/// Which MI dialect sits on the other end of the pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebuggerFlavor {
    #[default]
    Gdb,
    Lldb,
}

/// Session configuration.
#[derive(Clone)]
pub struct SessionConfig {
    pub flavor: DebuggerFlavor,
    /// Prefix outbound commands with a monotonic numeric token. Response
    /// correlation stays FIFO either way; tokens are a debugging aid.
    pub emit_tokens: bool,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
    /// Terminal source for locally started inferiors (GDB only). Without
    /// one, inferior output shares the debugger's console.
    pub terminal_provider: Option<Arc<dyn InferiorTerminalProvider>>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            flavor: DebuggerFlavor::default(),
            emit_tokens: true,
            event_capacity: 256,
            terminal_provider: None,
        }
    }
}

impl SessionConfig {
    pub fn for_flavor(flavor: DebuggerFlavor) -> Self {
        Self { flavor, ..Default::default() }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("flavor", &self.flavor)
            .field("emit_tokens", &self.emit_tokens)
            .field("event_capacity", &self.event_capacity)
            .field("terminal_provider", &self.terminal_provider.as_ref().map(|_| "..."))
            .finish()
    }
}
