//! Typed client for the GDB/LLDB Machine Interface (MI).
//!
//! The debugger runs as a child process with an MI interpreter on its
//! stdio; this crate drives it: typed operations go out as MI command
//! lines, result records complete them in FIFO order, and out-of-band
//! records (target stopped, library loaded, console output, ...) fan out
//! to subscribers as typed [`events::Event`]s.
//!
//! ```no_run
//! use dbgmi::{BreakpointOptions, DebuggerBuilder, RunOptions, SessionConfig};
//!
//! # async fn demo() -> dbgmi::Result<()> {
//! let (session, _child) =
//!     DebuggerBuilder::new("/usr/bin/gdb", SessionConfig::default()).try_spawn()?;
//! let mut events = session.subscribe();
//!
//! session.set_executable_file("./a.out").await?;
//! let breakpoint = session.add_breakpoint("main", &BreakpointOptions::default()).await?;
//! println!("breakpoint {} set", breakpoint.id);
//!
//! session.start_inferior(&RunOptions::default()).await?;
//! while let Ok(event) = events.recv().await {
//!     println!("{}: {:?}", event.name(), event);
//! }
//! session.end(true).await
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;
mod extract;
pub mod launch;
pub mod mi;
pub mod models;
mod ops;
pub mod session;
pub mod terminal;

pub use config::{DebuggerFlavor, SessionConfig};
pub use error::{Error, ParseError, Result};
pub use events::{Event, TargetStop};
pub use launch::DebuggerBuilder;
pub use mi::commands::{
    BreakpointOptions, ContinueOptions, FrameRef, MiCommand, RegisterValuesQuery, RunOptions,
    StackArgsQuery, StackFramesQuery, StackVariablesQuery, StepOptions, WatchChildrenQuery,
    WatchOptions,
};
pub use models::{
    AsmInstruction, Breakpoint, BreakpointLocation, FrameArgs, FrameInfo, FrameVariables,
    LibraryInfo, MemoryBlock, MultiThread, RegisterFormat, SourceLineAsm, StackFrame, StopReason,
    Thread, ThreadFrame, ValueDetail, Variable, Watch, WatchAttribute, WatchChild, WatchFormat,
    WatchUpdate,
};
pub use session::Session;
pub use terminal::{InferiorTerminal, InferiorTerminalProvider};
