use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, OneOrMany, serde_as, skip_serializing_none};

/// Why the target stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    BreakpointHit,
    EndSteppingRange,
    FunctionFinished,
    ExitedNormally,
    ExitedSignalled,
    Exited,
    SignalReceived,
    ExceptionReceived,
    /// A reason this library doesn't know; carried through, never fatal.
    Unrecognized,
}

impl StopReason {
    pub fn from_mi(reason: &str) -> StopReason {
        match reason {
            "breakpoint-hit" => StopReason::BreakpointHit,
            "end-stepping-range" => StopReason::EndSteppingRange,
            "function-finished" => StopReason::FunctionFinished,
            "exited-normally" => StopReason::ExitedNormally,
            "exited-signalled" => StopReason::ExitedSignalled,
            "exited" => StopReason::Exited,
            "signal-received" => StopReason::SignalReceived,
            "exception-received" => StopReason::ExceptionReceived,
            _ => StopReason::Unrecognized,
        }
    }
}

/// One resolved address of a breakpoint. `id` is `"N"` or `"N.M"`.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BreakpointLocation {
    pub id: String,
    pub is_enabled: Option<bool>,
    pub address: Option<String>,
    pub func: Option<String>,
    pub filename: Option<String>,
    pub fullname: Option<String>,
    pub line: Option<u32>,
    pub at: Option<String>,
}

/// A breakpoint and its locations. A pending breakpoint has no locations;
/// every other breakpoint has at least one.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Breakpoint {
    pub id: u32,
    pub breakpoint_type: Option<String>,
    pub catch_type: Option<String>,
    pub is_temp: Option<bool>,
    pub is_enabled: Option<bool>,
    pub locations: Vec<BreakpointLocation>,
    pub pending: Option<String>,
    pub evaluated_by: Option<String>,
    pub thread_id: Option<u32>,
    pub condition: Option<String>,
    pub ignore_count: Option<u32>,
    pub enable_count: Option<u32>,
    pub mask: Option<String>,
    pub pass_count: Option<u32>,
    pub original_location: Option<String>,
    pub hit_count: Option<u32>,
    pub is_installed: Option<bool>,
    pub what: Option<String>,
}

/// One frame of a stopped thread's call stack.
#[serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StackFrame {
    #[serde_as(as = "DisplayFromStr")]
    pub level: u32,
    pub func: Option<String>,
    #[serde(rename = "addr")]
    pub address: Option<String>,
    #[serde(rename = "file")]
    pub filename: Option<String>,
    pub fullname: Option<String>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub line: Option<u32>,
    pub from: Option<String>,
}

/// The frame reported inside a stop notification: no level, but argument
/// values when the debugger includes them.
#[serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FrameInfo {
    pub func: Option<String>,
    #[serde(rename = "addr")]
    pub address: Option<String>,
    #[serde(rename = "file")]
    pub filename: Option<String>,
    pub fullname: Option<String>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub line: Option<u32>,
    pub from: Option<String>,
    #[serde_as(as = "OneOrMany<_>")]
    #[serde(default)]
    pub args: Vec<Variable>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Variable {
    pub name: String,
    pub value: Option<String>,
    pub r#type: Option<String>,
}

/// Argument values of one stack frame, as returned by the stack-arguments
/// listing.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameArgs {
    #[serde_as(as = "DisplayFromStr")]
    pub level: u32,
    #[serde_as(as = "OneOrMany<_>")]
    #[serde(default)]
    pub args: Vec<Variable>,
}

/// Locals and arguments of a frame, split the way the debugger tags them.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct FrameVariables {
    pub args: Vec<Variable>,
    pub locals: Vec<Variable>,
}

/// An observed expression (MI "variable object").
#[serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Watch {
    #[serde(rename = "name")]
    pub id: String,
    #[serde_as(as = "DisplayFromStr")]
    #[serde(rename = "numchild", default)]
    pub child_count: u32,
    pub value: Option<String>,
    #[serde(rename = "type")]
    pub expression_type: Option<String>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(rename = "thread-id", default)]
    pub thread_id: Option<u32>,
    #[serde(rename = "dynamic", default, deserialize_with = "de::flag")]
    pub is_dynamic: bool,
    #[serde(rename = "displayhint")]
    pub display_hint: Option<String>,
    #[serde(rename = "has_more", default, deserialize_with = "de::flag")]
    pub has_more_children: bool,
}

/// A child of a watch, one per member/element of the parent expression.
#[serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchChild {
    #[serde(rename = "name")]
    pub id: String,
    #[serde(rename = "exp")]
    pub expression: Option<String>,
    #[serde_as(as = "DisplayFromStr")]
    #[serde(rename = "numchild", default)]
    pub child_count: u32,
    pub value: Option<String>,
    #[serde(rename = "type")]
    pub expression_type: Option<String>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(rename = "thread-id", default)]
    pub thread_id: Option<u32>,
    #[serde(rename = "dynamic", default, deserialize_with = "de::flag")]
    pub is_dynamic: bool,
    #[serde(rename = "displayhint")]
    pub display_hint: Option<String>,
    #[serde(rename = "has_more", default, deserialize_with = "de::flag")]
    pub has_more_children: bool,
    #[serde(rename = "frozen", default, deserialize_with = "de::flag")]
    pub is_frozen: bool,
}

/// One entry of a watch update pass.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WatchUpdate {
    pub id: String,
    pub child_count: Option<u32>,
    pub value: Option<String>,
    pub expression_type: Option<String>,
    /// The watched expression still exists in the current frame.
    pub is_in_scope: bool,
    /// The expression can never come back into scope; the watch should be
    /// deleted.
    pub is_obsolete: bool,
    pub has_type_changed: Option<bool>,
    pub is_dynamic: Option<bool>,
    pub display_hint: Option<String>,
    pub has_more_children: bool,
    pub new_children: Option<Vec<WatchChild>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchAttribute {
    Editable,
    NonEditable,
}

/// A contiguous run of target memory; `contents` is hex digits, two per
/// byte.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryBlock {
    pub begin: String,
    pub end: String,
    pub offset: String,
    pub contents: String,
}

#[serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AsmInstruction {
    pub address: Option<String>,
    #[serde(rename = "func-name")]
    pub func: Option<String>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub offset: Option<u32>,
    pub inst: String,
    pub opcodes: Option<String>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub size: Option<u32>,
}

/// Instructions grouped under the source line they implement.
#[serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceLineAsm {
    pub file: Option<String>,
    pub fullname: Option<String>,
    #[serde_as(as = "DisplayFromStr")]
    pub line: u32,
    #[serde_as(as = "OneOrMany<_>")]
    #[serde(rename = "line_asm_insn", default)]
    pub instructions: Vec<AsmInstruction>,
}

/// The frame a thread currently sits in.
#[serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThreadFrame {
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub level: Option<u32>,
    pub func: Option<String>,
    #[serde(rename = "addr")]
    pub address: Option<String>,
    #[serde(rename = "file")]
    pub filename: Option<String>,
    pub fullname: Option<String>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub line: Option<u32>,
    #[serde_as(as = "OneOrMany<_>")]
    #[serde(default)]
    pub args: Vec<Variable>,
}

#[serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Thread {
    #[serde_as(as = "DisplayFromStr")]
    pub id: u32,
    #[serde(rename = "target-id")]
    pub target_id: Option<String>,
    pub name: Option<String>,
    /// Absent for threads the debugger cannot walk (e.g. still running
    /// under non-stop).
    pub frame: Option<ThreadFrame>,
    #[serde(rename = "state", default, deserialize_with = "de::stopped_state")]
    pub is_stopped: Option<bool>,
    #[serde(rename = "core")]
    pub processor_core: Option<String>,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MultiThread {
    pub all: Vec<Thread>,
    pub current: Option<Thread>,
}

/// A shared library reported by the debugger.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LibraryInfo {
    pub id: Option<String>,
    #[serde(rename = "target-name")]
    pub target_name: Option<String>,
    #[serde(rename = "host-name")]
    pub host_name: Option<String>,
    #[serde(rename = "thread-group")]
    pub thread_group: Option<String>,
    #[serde(rename = "loaded_addr")]
    pub load_address: Option<String>,
    #[serde(rename = "symbols-path")]
    pub symbols_path: Option<String>,
}

/// How much value detail a variable listing carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueDetail {
    #[default]
    None,
    All,
    Simple,
}

impl ValueDetail {
    pub(crate) fn mi(self) -> &'static str {
        match self {
            ValueDetail::None => "0",
            ValueDetail::All => "1",
            ValueDetail::Simple => "2",
        }
    }
}

/// Output format for watch values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatchFormat {
    Binary,
    Decimal,
    Hexadecimal,
    Octal,
    #[default]
    Default,
}

impl WatchFormat {
    pub(crate) fn mi(self) -> &'static str {
        match self {
            WatchFormat::Binary => "binary",
            WatchFormat::Decimal => "decimal",
            WatchFormat::Hexadecimal => "hexadecimal",
            WatchFormat::Octal => "octal",
            WatchFormat::Default => "natural",
        }
    }
}

/// Output format for register values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegisterFormat {
    Binary,
    Decimal,
    Hexadecimal,
    Octal,
    Raw,
    #[default]
    Default,
}

impl RegisterFormat {
    pub(crate) fn code(self) -> char {
        match self {
            RegisterFormat::Binary => 't',
            RegisterFormat::Decimal => 'd',
            RegisterFormat::Hexadecimal => 'x',
            RegisterFormat::Octal => 'o',
            RegisterFormat::Raw => 'r',
            RegisterFormat::Default => 'N',
        }
    }
}

pub(crate) mod de {
    use serde::{Deserialize, Deserializer};

    /// MI boolean flags arrive as strings: "1"/"y"/"true" are true.
    pub(crate) fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(matches!(s.as_str(), "1" | "y" | "true"))
    }

    pub(crate) fn stopped_state<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Option::<String>::deserialize(deserializer)?;
        Ok(s.map(|state| state == "stopped"))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stack_frame_from_value() {
        let frame: StackFrame = serde_json::from_value(json!({
            "level": "2",
            "func": "main",
            "addr": "0x0000000000400927",
            "file": "x.cpp",
            "fullname": "/tmp/x.cpp",
            "line": "47",
            "arch": "i386:x86-64",
        }))
        .expect("frame deserializes");
        assert_eq!(frame.level, 2);
        assert_eq!(frame.line, Some(47));
        assert_eq!(frame.filename.as_deref(), Some("x.cpp"));
    }

    #[test]
    fn test_watch_flags() {
        let watch: Watch = serde_json::from_value(json!({
            "name": "var1",
            "numchild": "2",
            "value": "{...}",
            "type": "std::vector<int>",
            "thread-id": "3",
            "dynamic": "1",
            "displayhint": "array",
            "has_more": "0",
        }))
        .expect("watch deserializes");
        assert_eq!(watch.id, "var1");
        assert_eq!(watch.child_count, 2);
        assert_eq!(watch.thread_id, Some(3));
        assert!(watch.is_dynamic);
        assert!(!watch.has_more_children);
    }

    #[test]
    fn test_watch_minimal() {
        let watch: Watch =
            serde_json::from_value(json!({ "name": "var2", "numchild": "0" })).expect("minimal");
        assert_eq!(watch.child_count, 0);
        assert!(!watch.is_dynamic);
        assert!(watch.value.is_none());
    }

    #[test]
    fn test_thread_state() {
        let thread: Thread = serde_json::from_value(json!({
            "id": "1",
            "target-id": "Thread 0x7ffff7fc9740 (LWP 6550)",
            "frame": { "level": "0", "func": "main", "args": [] },
            "state": "stopped",
            "core": "2",
        }))
        .expect("thread deserializes");
        assert_eq!(thread.id, 1);
        assert_eq!(thread.is_stopped, Some(true));
        assert_eq!(thread.frame.expect("frame").func.as_deref(), Some("main"));
    }

    #[test]
    fn test_frame_args_single_or_list() {
        let single: FrameArgs = serde_json::from_value(json!({
            "level": "0",
            "args": { "name": "argc", "value": "1" },
        }))
        .expect("single arg");
        assert_eq!(single.args.len(), 1);

        let list: FrameArgs = serde_json::from_value(json!({
            "level": "1",
            "args": [{ "name": "argc", "value": "1" }, { "name": "argv", "value": "0x1" }],
        }))
        .expect("arg list");
        assert_eq!(list.args.len(), 2);
    }

    #[test]
    fn test_stop_reason_unrecognized() {
        assert_eq!(StopReason::from_mi("breakpoint-hit"), StopReason::BreakpointHit);
        assert_eq!(StopReason::from_mi("solib-event"), StopReason::Unrecognized);
    }
}
