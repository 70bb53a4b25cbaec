//! The session core: a FIFO command queue and the I/O loop that owns the
//! debugger's streams.
//!
//! All parsing and dispatch happen on one spawned task. Commands are
//! written one at a time: the head of the queue is the only command in
//! flight, and the next one goes out only after the head's result record
//! arrives. Out-of-band records never touch the queue; they fan out to
//! event subscribers in parse order.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::events::{self, Event};
use crate::extract::get_str;
use crate::mi::commands::MiCommand;
use crate::mi::output::{Record, ResultClass, ValueMap, parse_line};

/// A submitted command awaiting its result record. Owned by the loop's
/// queue from submission until its sink fires.
struct PendingCommand {
    token: Option<u64>,
    /// The serialized line, newline included.
    text: String,
    /// The line without its newline, for diagnostics and errors.
    command: String,
    done: oneshot::Sender<Result<ValueMap>>,
}

enum Control {
    Submit(PendingCommand),
    Shutdown,
}

/// A live connection to a debugger speaking MI over a pair of byte
/// streams. Cheap handle; the I/O loop runs on its own task.
pub struct Session {
    control: mpsc::UnboundedSender<Control>,
    events: broadcast::Sender<Event>,
    next_token: AtomicU64,
    closed: Arc<AtomicBool>,
    ending: AtomicBool,
    pub(crate) remote: AtomicBool,
    pub(crate) tty: tokio::sync::Mutex<Option<String>>,
    pub(crate) config: SessionConfig,
}

impl Session {
    /// Begin a session over the debugger's stdout (`source`) and stdin
    /// (`sink`). Line reading starts immediately.
    pub fn start<R, W>(config: SessionConfig, source: R, sink: W) -> Session
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (control, control_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(config.event_capacity);
        let closed = Arc::new(AtomicBool::new(false));
        tokio::spawn(run_loop(source, sink, control_rx, events.clone(), closed.clone()));
        info!(flavor = ?config.flavor, "debugger session started");
        Session {
            control,
            events,
            next_token: AtomicU64::new(1),
            closed,
            ending: AtomicBool::new(false),
            remote: AtomicBool::new(false),
            tty: tokio::sync::Mutex::new(None),
            config,
        }
    }

    /// Subscribe to out-of-band events. Events are broadcast in parse
    /// order; each subscriber sees every event from the moment it
    /// subscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn events_channel(&self) -> broadcast::Sender<Event> {
        self.events.clone()
    }

    /// Submit a raw MI command and await the payload of its result
    /// record. Commands complete strictly in submission order.
    pub async fn execute(&self, command: MiCommand) -> Result<ValueMap> {
        if self.is_closed() {
            return Err(Error::SessionClosed);
        }
        let token = self
            .config
            .emit_tokens
            .then(|| self.next_token.fetch_add(1, Ordering::SeqCst));
        let text = command.to_interpreter_line(token);
        let command_line = text.trim_end().to_string();
        let (done, completion) = oneshot::channel();
        let pending = PendingCommand { token, text, command: command_line, done };
        self.control
            .send(Control::Submit(pending))
            .map_err(|_| Error::SessionClosed)?;
        completion.await.map_err(|_| Error::SessionClosed)?
    }

    /// End the session. With `notify_debugger` a `gdb-exit` goes through
    /// the queue and its completion tears the loop down; without, the
    /// loop stops immediately (used when the debugger already died).
    /// Idempotent.
    pub async fn end(&self, notify_debugger: bool) -> Result<()> {
        if self.ending.swap(true, Ordering::SeqCst) || self.is_closed() {
            return Ok(());
        }
        if notify_debugger {
            match self.execute(MiCommand::gdb_exit()).await {
                Ok(_) | Err(Error::SessionClosed) => Ok(()),
                Err(e) => Err(e),
            }
        } else {
            let _ = self.control.send(Control::Shutdown);
            Ok(())
        }
    }
}

#[derive(PartialEq)]
enum Flow {
    Continue,
    Stop,
}

async fn run_loop<R, W>(
    source: R,
    mut sink: W,
    mut control: mpsc::UnboundedReceiver<Control>,
    events: broadcast::Sender<Event>,
    closed: Arc<AtomicBool>,
) where
    R: AsyncRead + Send + Unpin,
    W: AsyncWrite + Send + Unpin,
{
    let mut lines = BufReader::new(source).lines();
    let mut queue: VecDeque<PendingCommand> = VecDeque::new();
    let mut line_no: u64 = 0;

    loop {
        tokio::select! {
            message = control.recv() => match message {
                Some(Control::Submit(command)) => {
                    debug!(command = %command.command, "queueing command");
                    queue.push_back(command);
                    // Only the head may be in flight; a deeper queue means
                    // an earlier command is still awaiting its result.
                    if queue.len() == 1 && send_head(&mut sink, &queue).await == Flow::Stop {
                        fail_all(&mut queue, || Error::SessionClosed);
                        break;
                    }
                }
                Some(Control::Shutdown) | None => {
                    fail_all(&mut queue, || Error::SessionClosed);
                    break;
                }
            },
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    line_no += 1;
                    if let Flow::Stop =
                        handle_line(&line, line_no, &mut sink, &mut queue, &events).await
                    {
                        break;
                    }
                }
                Ok(None) => {
                    debug!("debugger output stream closed");
                    fail_all(&mut queue, || Error::SessionClosed);
                    break;
                }
                Err(e) => {
                    error!(error = %e, "transport error reading debugger output");
                    fail_all(&mut queue, || Error::SessionClosed);
                    break;
                }
            },
        }
    }

    closed.store(true, Ordering::SeqCst);
    info!("debugger session closed");
}

async fn handle_line<W>(
    line: &str,
    line_no: u64,
    sink: &mut W,
    queue: &mut VecDeque<PendingCommand>,
    events: &broadcast::Sender<Event>,
) -> Flow
where
    W: AsyncWrite + Send + Unpin,
{
    if line.trim().is_empty() {
        return Flow::Continue;
    }
    debug!(line_no, line, "debugger output");

    let record = match parse_line(line) {
        Ok(record) => record,
        Err(mut parse_error) => {
            parse_error.line = line_no;
            error!(error = %parse_error, "unparseable debugger output");
            fail_all(queue, || Error::Parse(parse_error.clone()));
            return Flow::Stop;
        }
    };

    match record {
        Record::Prompt => Flow::Continue,
        Record::Result(result) => {
            let Some(head) = queue.pop_front() else {
                warn!(class = ?result.class, "result record with no pending command");
                return Flow::Continue;
            };
            if result.token.is_some() && result.token != head.token {
                // FIFO order still governs; the debugger answers commands
                // in the order it received them.
                warn!(
                    expected = ?head.token,
                    received = ?result.token,
                    "result token mismatch, completing head of queue"
                );
            }
            let exiting = result.class == ResultClass::Exit;
            let completion = match result.class {
                ResultClass::Error => Err(command_failed(&head, &result.results)),
                _ => Ok(result.results),
            };
            let _ = head.done.send(completion);
            if exiting {
                fail_all(queue, || Error::SessionClosed);
                return Flow::Stop;
            }
            if !queue.is_empty() && send_head(sink, queue).await == Flow::Stop {
                fail_all(queue, || Error::SessionClosed);
                return Flow::Stop;
            }
            Flow::Continue
        }
        Record::Async(async_record) => {
            for event in events::events_from_async(&async_record) {
                let _ = events.send(event);
            }
            Flow::Continue
        }
        Record::Stream(stream) => {
            let _ = events.send(events::stream_event(&stream));
            Flow::Continue
        }
    }
}

async fn send_head<W>(sink: &mut W, queue: &VecDeque<PendingCommand>) -> Flow
where
    W: AsyncWrite + Send + Unpin,
{
    let Some(head) = queue.front() else {
        return Flow::Continue;
    };
    debug!(command = %head.command, "sending command");
    let written = async {
        sink.write_all(head.text.as_bytes()).await?;
        sink.flush().await
    };
    match written.await {
        Ok(()) => Flow::Continue,
        Err(e) => {
            error!(error = %e, "transport error writing command");
            Flow::Stop
        }
    }
}

fn command_failed(head: &PendingCommand, results: &ValueMap) -> Error {
    Error::CommandFailed {
        message: get_str(results, "msg").unwrap_or("unknown error").to_string(),
        code: get_str(results, "code").map(str::to_string),
        command: head.command.clone(),
        token: head.token,
    }
}

fn fail_all(queue: &mut VecDeque<PendingCommand>, mut make: impl FnMut() -> Error) {
    for pending in queue.drain(..) {
        let _ = pending.done.send(Err(make()));
    }
}
