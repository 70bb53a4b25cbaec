//! Typed events distilled from the debugger's out-of-band records.

use serde_json::Value;
use tracing::debug;

use crate::extract::{self, get_str, get_u32};
use crate::mi::output::{
    AsyncClass, AsyncKind, AsyncRecord, BreakPointEvent, StreamKind, StreamRecord, ThreadEvent,
    ValueMap,
};
use crate::models::{Breakpoint, FrameInfo, LibraryInfo, StopReason};

/// Wire-compatible event names, grouped by category.
pub mod names {
    pub const THREAD_GROUP_ADDED: &str = "thdgrpadd";
    pub const THREAD_GROUP_REMOVED: &str = "thdgrprem";
    pub const THREAD_GROUP_STARTED: &str = "thdgrpstart";
    pub const THREAD_GROUP_EXITED: &str = "thdgrpexit";
    pub const THREAD_CREATED: &str = "thdcreate";
    pub const THREAD_EXITED: &str = "thdexit";
    pub const THREAD_SELECTED: &str = "thdselect";
    pub const LIB_LOADED: &str = "libload";
    pub const LIB_UNLOADED: &str = "libunload";
    pub const DBG_CONSOLE_OUTPUT: &str = "conout";
    pub const TARGET_OUTPUT: &str = "targetout";
    pub const DBG_LOG_OUTPUT: &str = "dbgout";
    pub const TARGET_RUNNING: &str = "targetrun";
    pub const TARGET_STOPPED: &str = "targetstop";
    pub const BREAKPOINT_HIT: &str = "brkpthit";
    pub const STEP_FINISHED: &str = "endstep";
    pub const FUNCTION_FINISHED: &str = "endfunc";
    pub const SIGNAL_RECEIVED: &str = "signal";
    pub const EXCEPTION_RECEIVED: &str = "exception";
    pub const BREAKPOINT_MODIFIED: &str = "breakpoint-modified";
}

/// Common payload of every stop notification. `stopped_threads` empty
/// means all threads stopped.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetStop {
    pub reason: StopReason,
    pub thread_id: Option<u32>,
    pub stopped_threads: Vec<u32>,
    pub processor_core: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Event {
    ThreadGroupAdded(ValueMap),
    ThreadGroupRemoved(ValueMap),
    ThreadGroupStarted(ValueMap),
    ThreadGroupExited {
        id: Option<String>,
        exit_code: Option<String>,
    },
    ThreadCreated {
        id: Option<u32>,
        group_id: Option<String>,
    },
    ThreadExited {
        id: Option<u32>,
        group_id: Option<String>,
    },
    ThreadSelected {
        id: Option<u32>,
    },
    LibraryLoaded(LibraryInfo),
    LibraryUnloaded(LibraryInfo),
    /// Output of the debugger's own console.
    ConsoleOutput(String),
    /// Output of the program being debugged.
    TargetOutput(String),
    /// The debugger's internal log stream.
    LogOutput(String),
    TargetRunning {
        /// `"all"` when every thread resumed.
        thread_id: String,
    },
    TargetStopped(TargetStop),
    BreakpointHit {
        stop: TargetStop,
        breakpoint_id: Option<u32>,
        frame: FrameInfo,
    },
    StepFinished {
        stop: TargetStop,
        frame: FrameInfo,
    },
    FunctionFinished {
        stop: TargetStop,
        frame: FrameInfo,
        result_var: Option<String>,
        return_value: Option<String>,
    },
    SignalReceived {
        stop: TargetStop,
        signal_code: Option<String>,
        signal_name: Option<String>,
        signal_meaning: Option<String>,
    },
    ExceptionReceived {
        stop: TargetStop,
        exception: Option<String>,
    },
    BreakpointModified(Breakpoint),
}

impl Event {
    /// The event's wire-compatible name (see [`names`]).
    pub fn name(&self) -> &'static str {
        match self {
            Event::ThreadGroupAdded(_) => names::THREAD_GROUP_ADDED,
            Event::ThreadGroupRemoved(_) => names::THREAD_GROUP_REMOVED,
            Event::ThreadGroupStarted(_) => names::THREAD_GROUP_STARTED,
            Event::ThreadGroupExited { .. } => names::THREAD_GROUP_EXITED,
            Event::ThreadCreated { .. } => names::THREAD_CREATED,
            Event::ThreadExited { .. } => names::THREAD_EXITED,
            Event::ThreadSelected { .. } => names::THREAD_SELECTED,
            Event::LibraryLoaded(_) => names::LIB_LOADED,
            Event::LibraryUnloaded(_) => names::LIB_UNLOADED,
            Event::ConsoleOutput(_) => names::DBG_CONSOLE_OUTPUT,
            Event::TargetOutput(_) => names::TARGET_OUTPUT,
            Event::LogOutput(_) => names::DBG_LOG_OUTPUT,
            Event::TargetRunning { .. } => names::TARGET_RUNNING,
            Event::TargetStopped(_) => names::TARGET_STOPPED,
            Event::BreakpointHit { .. } => names::BREAKPOINT_HIT,
            Event::StepFinished { .. } => names::STEP_FINISHED,
            Event::FunctionFinished { .. } => names::FUNCTION_FINISHED,
            Event::SignalReceived { .. } => names::SIGNAL_RECEIVED,
            Event::ExceptionReceived { .. } => names::EXCEPTION_RECEIVED,
            Event::BreakpointModified(_) => names::BREAKPOINT_MODIFIED,
        }
    }
}

/// Map an async record to the events it implies, in dispatch order.
pub(crate) fn events_from_async(record: &AsyncRecord) -> Vec<Event> {
    match record.kind {
        AsyncKind::Exec => exec_events(record),
        AsyncKind::Notify => notify_event(record).into_iter().collect(),
        AsyncKind::Status => {
            debug!(class = ?record.class, "ignoring status record");
            Vec::new()
        }
    }
}

pub(crate) fn stream_event(record: &StreamRecord) -> Event {
    match record.kind {
        StreamKind::Console => Event::ConsoleOutput(record.data.clone()),
        StreamKind::Target => Event::TargetOutput(record.data.clone()),
        StreamKind::Log => Event::LogOutput(record.data.clone()),
    }
}

fn exec_events(record: &AsyncRecord) -> Vec<Event> {
    match &record.class {
        AsyncClass::Running => {
            let thread_id = get_str(&record.results, "thread-id").unwrap_or("all").to_string();
            vec![Event::TargetRunning { thread_id }]
        }
        AsyncClass::Stopped => stopped_events(&record.results),
        other => {
            debug!(class = ?other, "unhandled exec class");
            Vec::new()
        }
    }
}

/// A `stopped` record always yields `TargetStopped` first; some reasons
/// add exactly one specialized event carrying the same stop payload.
fn stopped_events(results: &ValueMap) -> Vec<Event> {
    let stop = TargetStop {
        reason: get_str(results, "reason")
            .map(StopReason::from_mi)
            .unwrap_or(StopReason::Unrecognized),
        thread_id: get_u32(results, "thread-id"),
        stopped_threads: stopped_threads(results.get("stopped-threads")),
        processor_core: get_str(results, "core").map(str::to_string),
    };
    let frame = || {
        results
            .get("frame")
            .and_then(|f| extract::frame_info(f).ok())
            .unwrap_or_default()
    };
    let owned = |key: &str| get_str(results, key).map(str::to_string);

    let mut events = vec![Event::TargetStopped(stop.clone())];
    match stop.reason {
        StopReason::BreakpointHit => events.push(Event::BreakpointHit {
            breakpoint_id: get_u32(results, "bkptno"),
            frame: frame(),
            stop,
        }),
        StopReason::EndSteppingRange => {
            events.push(Event::StepFinished { frame: frame(), stop })
        }
        StopReason::FunctionFinished => events.push(Event::FunctionFinished {
            frame: frame(),
            result_var: owned("gdb-result-var"),
            return_value: owned("return-value"),
            stop,
        }),
        StopReason::SignalReceived => events.push(Event::SignalReceived {
            signal_code: owned("signal"),
            signal_name: owned("signal-name"),
            signal_meaning: owned("signal-meaning"),
            stop,
        }),
        StopReason::ExceptionReceived => events.push(Event::ExceptionReceived {
            exception: owned("exception"),
            stop,
        }),
        _ => {}
    }
    events
}

/// `"all"` (or nothing) means every thread stopped: empty vec. A single
/// id or a list of ids yields the parsed integers.
fn stopped_threads(value: Option<&Value>) -> Vec<u32> {
    match value {
        Some(Value::String(s)) if s != "all" => s.parse().ok().into_iter().collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().and_then(|s| s.parse().ok()))
            .collect(),
        _ => Vec::new(),
    }
}

fn notify_event(record: &AsyncRecord) -> Option<Event> {
    let results = &record.results;
    match &record.class {
        AsyncClass::Thread(ThreadEvent::GroupAdded) => {
            Some(Event::ThreadGroupAdded(results.clone()))
        }
        AsyncClass::Thread(ThreadEvent::GroupRemoved) => {
            Some(Event::ThreadGroupRemoved(results.clone()))
        }
        AsyncClass::Thread(ThreadEvent::GroupStarted) => {
            Some(Event::ThreadGroupStarted(results.clone()))
        }
        AsyncClass::Thread(ThreadEvent::GroupExited) => Some(Event::ThreadGroupExited {
            id: get_str(results, "id").map(str::to_string),
            exit_code: get_str(results, "exit-code").map(str::to_string),
        }),
        // lldb-mi can omit the id here; leave it unset rather than guess.
        AsyncClass::Thread(ThreadEvent::Created) => Some(Event::ThreadCreated {
            id: get_u32(results, "id"),
            group_id: get_str(results, "group-id").map(str::to_string),
        }),
        AsyncClass::Thread(ThreadEvent::Exited) => Some(Event::ThreadExited {
            id: get_u32(results, "id"),
            group_id: get_str(results, "group-id").map(str::to_string),
        }),
        AsyncClass::Thread(ThreadEvent::Selected) => {
            Some(Event::ThreadSelected { id: get_u32(results, "id") })
        }
        AsyncClass::LibraryLoaded => Some(Event::LibraryLoaded(library(results))),
        AsyncClass::LibraryUnloaded => Some(Event::LibraryUnloaded(library(results))),
        AsyncClass::BreakPoint(BreakPointEvent::Modified) => {
            match extract::breakpoint(results) {
                Ok(breakpoint) => Some(Event::BreakpointModified(breakpoint)),
                Err(message) => {
                    debug!(%message, "discarding breakpoint-modified record");
                    None
                }
            }
        }
        other => {
            debug!(class = ?other, "unhandled notify class");
            None
        }
    }
}

fn library(results: &ValueMap) -> LibraryInfo {
    serde_json::from_value(Value::Object(results.clone())).unwrap_or_default()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mi::output::{Record, parse_line};

    fn async_record(line: &str) -> AsyncRecord {
        match parse_line(line) {
            Ok(Record::Async(record)) => record,
            other => panic!("not an async record: {:?}", other),
        }
    }

    #[test]
    fn test_thread_group_started_passthrough() {
        // Thread-group lifecycle tuples pass through untouched.
        let events = events_from_async(&async_record(
            "=thread-group-started,id=\"i1\",pid=\"6550\"",
        ));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name(), names::THREAD_GROUP_STARTED);
        let Event::ThreadGroupStarted(data) = &events[0] else {
            panic!("wrong event: {:?}", events[0]);
        };
        assert_eq!(data["id"], "i1");
        assert_eq!(data["pid"], "6550");
    }

    #[test]
    fn test_breakpoint_hit_order_and_fields() {
        // Generic stop first, specialized second, same stop payload.
        let events = events_from_async(&async_record(
            "*stopped,reason=\"breakpoint-hit\",bkptno=\"15\",frame={},thread-id=\"1\",\
             stopped-threads=\"all\"",
        ));
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name(), names::TARGET_STOPPED);
        assert_eq!(events[1].name(), names::BREAKPOINT_HIT);

        let Event::TargetStopped(generic) = &events[0] else { panic!() };
        let Event::BreakpointHit { stop, breakpoint_id, frame } = &events[1] else { panic!() };
        assert_eq!(generic, stop);
        assert_eq!(stop.reason, StopReason::BreakpointHit);
        assert_eq!(stop.thread_id, Some(1));
        assert!(stop.stopped_threads.is_empty());
        assert_eq!(stop.processor_core, None);
        assert_eq!(*breakpoint_id, Some(15));
        assert_eq!(*frame, FrameInfo::default());
    }

    #[test]
    fn test_stopped_threads_forms() {
        let all = events_from_async(&async_record(
            "*stopped,reason=\"end-stepping-range\",thread-id=\"2\",stopped-threads=\"all\"",
        ));
        let Event::TargetStopped(stop) = &all[0] else { panic!() };
        assert!(stop.stopped_threads.is_empty());

        let one = events_from_async(&async_record(
            "*stopped,reason=\"end-stepping-range\",thread-id=\"2\",stopped-threads=\"2\"",
        ));
        let Event::TargetStopped(stop) = &one[0] else { panic!() };
        assert_eq!(stop.stopped_threads, vec![2]);

        let listed = events_from_async(&async_record(
            "*stopped,reason=\"end-stepping-range\",stopped-threads=[\"1\",\"3\"]",
        ));
        let Event::TargetStopped(stop) = &listed[0] else { panic!() };
        assert_eq!(stop.stopped_threads, vec![1, 3]);
    }

    #[test]
    fn test_function_finished_payload() {
        let events = events_from_async(&async_record(
            "*stopped,reason=\"function-finished\",frame={func=\"main\",line=\"10\"},\
             thread-id=\"1\",stopped-threads=\"all\",gdb-result-var=\"$1\",return-value=\"42\"",
        ));
        assert_eq!(events.len(), 2);
        let Event::FunctionFinished { frame, result_var, return_value, .. } = &events[1] else {
            panic!("wrong event: {:?}", events[1]);
        };
        assert_eq!(frame.func.as_deref(), Some("main"));
        assert_eq!(result_var.as_deref(), Some("$1"));
        assert_eq!(return_value.as_deref(), Some("42"));
    }

    #[test]
    fn test_signal_received_payload() {
        let events = events_from_async(&async_record(
            "*stopped,reason=\"signal-received\",signal-name=\"SIGSEGV\",\
             signal-meaning=\"Segmentation fault\",thread-id=\"1\",stopped-threads=\"all\"",
        ));
        let Event::SignalReceived { signal_name, signal_meaning, signal_code, .. } = &events[1]
        else {
            panic!("wrong event: {:?}", events[1]);
        };
        assert_eq!(signal_name.as_deref(), Some("SIGSEGV"));
        assert_eq!(signal_meaning.as_deref(), Some("Segmentation fault"));
        assert_eq!(*signal_code, None);
    }

    #[test]
    fn test_exit_reasons_stay_generic() {
        let events = events_from_async(&async_record(
            "*stopped,reason=\"exited-normally\"",
        ));
        assert_eq!(events.len(), 1);
        let Event::TargetStopped(stop) = &events[0] else { panic!() };
        assert_eq!(stop.reason, StopReason::ExitedNormally);
    }

    #[test]
    fn test_running_thread_id() {
        let events = events_from_async(&async_record("*running,thread-id=\"all\""));
        let Event::TargetRunning { thread_id } = &events[0] else { panic!() };
        assert_eq!(thread_id, "all");
    }

    #[test]
    fn test_thread_created_without_id() {
        let events = events_from_async(&async_record("=thread-created,group-id=\"i1\""));
        let Event::ThreadCreated { id, group_id } = &events[0] else {
            panic!("wrong event: {:?}", events[0]);
        };
        assert_eq!(*id, None);
        assert_eq!(group_id.as_deref(), Some("i1"));
    }

    #[test]
    fn test_library_loaded() {
        let events = events_from_async(&async_record(
            "=library-loaded,id=\"/lib/libc.so.6\",target-name=\"/lib/libc.so.6\",\
             host-name=\"/lib/libc.so.6\",symbols-loaded=\"0\",thread-group=\"i1\"",
        ));
        let Event::LibraryLoaded(library) = &events[0] else { panic!() };
        assert_eq!(library.id.as_deref(), Some("/lib/libc.so.6"));
        assert_eq!(library.thread_group.as_deref(), Some("i1"));
        assert_eq!(library.load_address, None);
    }

    #[test]
    fn test_unknown_classes_produce_nothing() {
        assert!(events_from_async(&async_record("*record-started,thread-group=\"i1\"")).is_empty());
        assert!(events_from_async(&async_record("=cmd-param-changed,param=\"x\"")).is_empty());
        assert!(events_from_async(&async_record("+download,section=\".text\"")).is_empty());
    }

    #[test]
    fn test_breakpoint_modified_event() {
        // Full breakpoint tuple end-to-end through the notify branch.
        let events = events_from_async(&async_record(
            "=breakpoint-modified,bkpt={number=\"999\",type=\"breakpoint\",disp=\"keep\",\
             enabled=\"y\",addr=\"0x400927\",func=\"main\",file=\"x.cpp\",fullname=\"/x.cpp\",\
             line=\"47\",times=\"1\",enable=\"3\",ignore=\"2\",pass=\"4\",\
             original-location=\"main\",thread=\"10\",cond=\"x==1\",what=\"nothing\",\
             at=\"0x400927 main\",evaluated-by=\"target\",mask=\"xxxx\",installed=\"y\"}",
        ));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name(), names::BREAKPOINT_MODIFIED);
        let Event::BreakpointModified(bp) = &events[0] else { panic!() };
        assert_eq!(bp.id, 999);
        assert_eq!(bp.hit_count, Some(1));
        assert_eq!(bp.locations.len(), 1);
        assert_eq!(bp.locations[0].id, "999.1");
    }

    #[test]
    fn test_stream_events() {
        // A target stream record becomes a target-output event.
        let Ok(Record::Stream(stream)) = parse_line("@\"hello\"") else { panic!() };
        let event = stream_event(&stream);
        assert_eq!(event.name(), names::TARGET_OUTPUT);
        let Event::TargetOutput(payload) = event else { panic!() };
        assert_eq!(payload, "hello");
    }
}
