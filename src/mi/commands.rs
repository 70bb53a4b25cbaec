use std::path::Path;

use crate::models::{RegisterFormat, ValueDetail, WatchFormat};

/// One MI input line: an operation plus its option and parameter tokens.
/// Serialized as `[token]-operation options [-- parameters]`.
#[derive(Debug, Clone, Default)]
pub struct MiCommand {
    pub operation: &'static str,
    pub options: Vec<String>,
    pub parameters: Vec<String>,
}

pub enum DisassembleMode {
    DisassemblyOnly = 0,
    MixedSourceAndDisassembly = 1,
    DisassemblyWithRawOpcodes = 2,
    MixedSourceAndDisassemblyWithRawOpcodes = 3,
}

/// Flags and attributes for `break-insert`.
#[derive(Debug, Clone, Default)]
pub struct BreakpointOptions {
    pub is_temp: bool,
    pub is_hardware: bool,
    pub is_pending: bool,
    pub is_disabled: bool,
    pub is_tracepoint: bool,
    pub condition: Option<String>,
    pub ignore_count: Option<u32>,
    pub thread_id: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub thread_group: Option<String>,
    pub stop_at_start: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ContinueOptions {
    pub thread_group: Option<String>,
    pub reverse: bool,
}

/// Options shared by every stepping operation.
#[derive(Debug, Clone, Default)]
pub struct StepOptions {
    pub thread_id: Option<u32>,
    pub reverse: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FrameRef {
    pub thread_id: Option<u32>,
    pub frame_level: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StackFramesQuery {
    pub thread_id: Option<u32>,
    pub no_frame_filters: bool,
    pub low_frame: Option<u32>,
    pub high_frame: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StackArgsQuery {
    pub thread_id: Option<u32>,
    pub no_frame_filters: bool,
    pub skip_unavailable: bool,
    pub low_frame: Option<u32>,
    pub high_frame: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StackVariablesQuery {
    pub thread_id: Option<u32>,
    pub frame_level: Option<u32>,
    pub no_frame_filters: bool,
    pub skip_unavailable: bool,
}

/// Placement of a new watch: default is the current frame (`*`); a
/// floating watch (`@`) re-binds to whichever frame is current when it is
/// evaluated; a literal frame address pins it.
#[derive(Debug, Clone, Default)]
pub struct WatchOptions {
    pub id: Option<String>,
    pub thread_id: Option<u32>,
    pub thread_group: Option<String>,
    pub frame_level: Option<u32>,
    pub frame_address: Option<String>,
    pub is_floating: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WatchChildrenQuery {
    pub detail: Option<ValueDetail>,
    pub from: Option<u32>,
    pub to: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct RegisterValuesQuery {
    pub registers: Vec<u32>,
    pub skip_unavailable: bool,
    pub thread_id: Option<u32>,
    pub frame_level: Option<u32>,
}

/// Encode a string with the escapes the MI c-string grammar decodes.
pub fn escape_string(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\x07' => out.push_str("\\a"),
            '\x08' => out.push_str("\\b"),
            '\x0c' => out.push_str("\\f"),
            '\x0b' => out.push_str("\\v"),
            '\x1b' => out.push_str("\\e"),
            '\0' => out.push_str("\\0"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

/// Quote and escape an expression for embedding in a command line.
fn quoted(input: &str) -> String {
    format!("\"{}\"", escape_string(input))
}

fn push_thread_frame(options: &mut Vec<String>, thread_id: Option<u32>, frame_level: Option<u32>) {
    if let Some(thread_id) = thread_id {
        options.push("--thread".to_string());
        options.push(thread_id.to_string());
    }
    if let Some(frame_level) = frame_level {
        options.push("--frame".to_string());
        options.push(frame_level.to_string());
    }
}

impl MiCommand {
    /// Serialize as `[token]-operation ...\n`, the wire form the debugger's
    /// MI interpreter reads.
    pub fn to_interpreter_line(&self, token: Option<u64>) -> String {
        let mut line = String::new();
        if let Some(token) = token {
            line.push_str(&token.to_string());
        }
        line.push('-');
        line.push_str(self.operation);
        for option in &self.options {
            line.push(' ');
            line.push_str(option);
        }
        if !self.parameters.is_empty() {
            if !self.options.is_empty() {
                line.push_str(" --");
            }
            for parameter in &self.parameters {
                line.push(' ');
                line.push_str(parameter);
            }
        }
        line.push('\n');
        line
    }

    fn with_options(operation: &'static str, options: Vec<String>) -> MiCommand {
        MiCommand { operation, options, ..Default::default() }
    }

    // --- target setup ---

    pub fn file_exec_and_symbols(path: &Path) -> MiCommand {
        Self::with_options("file-exec-and-symbols", vec![path.display().to_string()])
    }

    pub fn inferior_tty_set(tty: &str) -> MiCommand {
        Self::with_options("inferior-tty-set", vec![tty.to_string()])
    }

    pub fn target_select_remote(host: &str, port: u16) -> MiCommand {
        Self::with_options("target-select", vec!["remote".to_string(), format!("{}:{}", host, port)])
    }

    // --- breakpoints ---

    pub fn break_insert(location: &str, opts: &BreakpointOptions) -> MiCommand {
        let mut options = Vec::new();
        if opts.is_temp {
            options.push("-t".to_string());
        }
        if opts.is_hardware {
            options.push("-h".to_string());
        }
        if opts.is_pending {
            options.push("-f".to_string());
        }
        if opts.is_disabled {
            options.push("-d".to_string());
        }
        if opts.is_tracepoint {
            options.push("-a".to_string());
        }
        if let Some(condition) = &opts.condition {
            options.push("-c".to_string());
            options.push(quoted(condition));
        }
        if let Some(ignore_count) = opts.ignore_count {
            options.push("-i".to_string());
            options.push(ignore_count.to_string());
        }
        if let Some(thread_id) = opts.thread_id {
            options.push("-p".to_string());
            options.push(thread_id.to_string());
        }
        options.push(location.to_string());
        Self::with_options("break-insert", options)
    }

    pub fn break_delete(ids: &[u32]) -> MiCommand {
        Self::with_options("break-delete", ids.iter().map(u32::to_string).collect())
    }

    pub fn break_enable(ids: &[u32]) -> MiCommand {
        Self::with_options("break-enable", ids.iter().map(u32::to_string).collect())
    }

    pub fn break_disable(ids: &[u32]) -> MiCommand {
        Self::with_options("break-disable", ids.iter().map(u32::to_string).collect())
    }

    pub fn break_after(id: u32, ignore_count: u32) -> MiCommand {
        Self::with_options("break-after", vec![id.to_string(), ignore_count.to_string()])
    }

    pub fn break_condition(id: u32, condition: &str) -> MiCommand {
        Self::with_options("break-condition", vec![id.to_string(), condition.to_string()])
    }

    // --- execution ---

    pub fn exec_arguments(args: &[String]) -> MiCommand {
        Self::with_options("exec-arguments", args.to_vec())
    }

    pub fn exec_run(thread_group: Option<&str>, all: bool, stop_at_start: bool) -> MiCommand {
        let mut options = Vec::new();
        if all {
            options.push("--all".to_string());
        } else if let Some(group) = thread_group {
            options.push("--thread-group".to_string());
            options.push(group.to_string());
        }
        if stop_at_start {
            options.push("--start".to_string());
        }
        Self::with_options("exec-run", options)
    }

    pub fn exec_abort() -> MiCommand {
        MiCommand { operation: "exec-abort", ..Default::default() }
    }

    pub fn exec_continue(thread_group: Option<&str>, all: bool, reverse: bool) -> MiCommand {
        let mut options = Vec::new();
        if all {
            options.push("--all".to_string());
        } else if let Some(group) = thread_group {
            options.push("--thread-group".to_string());
            options.push(group.to_string());
        }
        if reverse {
            options.push("--reverse".to_string());
        }
        Self::with_options("exec-continue", options)
    }

    pub fn exec_interrupt(thread_group: Option<&str>, all: bool) -> MiCommand {
        let mut options = Vec::new();
        if all {
            options.push("--all".to_string());
        } else if let Some(group) = thread_group {
            options.push("--thread-group".to_string());
            options.push(group.to_string());
        }
        Self::with_options("exec-interrupt", options)
    }

    /// Shared shape of exec-step / exec-next / exec-step-instruction /
    /// exec-next-instruction / exec-finish.
    pub fn stepping(operation: &'static str, opts: &StepOptions) -> MiCommand {
        let mut options = Vec::new();
        if let Some(thread_id) = opts.thread_id {
            options.push("--thread".to_string());
            options.push(thread_id.to_string());
        }
        if opts.reverse {
            options.push("--reverse".to_string());
        }
        Self::with_options(operation, options)
    }

    // --- stack ---

    pub fn stack_info_frame(frame: FrameRef) -> MiCommand {
        let mut options = Vec::new();
        push_thread_frame(&mut options, frame.thread_id, frame.frame_level);
        Self::with_options("stack-info-frame", options)
    }

    pub fn stack_info_depth(thread_id: Option<u32>, max_depth: Option<u32>) -> MiCommand {
        let mut options = Vec::new();
        push_thread_frame(&mut options, thread_id, None);
        if let Some(max_depth) = max_depth {
            options.push(max_depth.to_string());
        }
        Self::with_options("stack-info-depth", options)
    }

    pub fn stack_list_frames(q: &StackFramesQuery) -> MiCommand {
        let mut options = Vec::new();
        push_thread_frame(&mut options, q.thread_id, None);
        if q.no_frame_filters {
            options.push("--no-frame-filters".to_string());
        }
        // A single bound is a single-frame request: pass it twice.
        let range = match (q.low_frame, q.high_frame) {
            (Some(low), Some(high)) => Some((low, high)),
            (Some(single), None) | (None, Some(single)) => Some((single, single)),
            (None, None) => None,
        };
        if let Some((low, high)) = range {
            options.push(low.to_string());
            options.push(high.to_string());
        }
        Self::with_options("stack-list-frames", options)
    }

    /// `range` must already be validated: both bounds or neither.
    pub fn stack_list_arguments(
        detail: ValueDetail,
        q: &StackArgsQuery,
        range: Option<(u32, u32)>,
    ) -> MiCommand {
        let mut options = Vec::new();
        push_thread_frame(&mut options, q.thread_id, None);
        if q.no_frame_filters {
            options.push("--no-frame-filters".to_string());
        }
        if q.skip_unavailable {
            options.push("--skip-unavailable".to_string());
        }
        options.push(detail.mi().to_string());
        if let Some((low, high)) = range {
            options.push(low.to_string());
            options.push(high.to_string());
        }
        Self::with_options("stack-list-arguments", options)
    }

    pub fn stack_list_variables(detail: ValueDetail, q: &StackVariablesQuery) -> MiCommand {
        let mut options = Vec::new();
        push_thread_frame(&mut options, q.thread_id, q.frame_level);
        if q.no_frame_filters {
            options.push("--no-frame-filters".to_string());
        }
        if q.skip_unavailable {
            options.push("--skip-unavailable".to_string());
        }
        options.push(detail.mi().to_string());
        Self::with_options("stack-list-variables", options)
    }

    // --- watches ---

    pub fn var_create(expression: &str, opts: &WatchOptions) -> MiCommand {
        let mut options = Vec::new();
        if let Some(thread_id) = opts.thread_id {
            options.push("--thread".to_string());
            options.push(thread_id.to_string());
        }
        if let Some(group) = &opts.thread_group {
            options.push("--thread-group".to_string());
            options.push(group.to_string());
        }
        if let Some(frame_level) = opts.frame_level {
            options.push("--frame".to_string());
            options.push(frame_level.to_string());
        }
        // "-" asks the debugger to generate the watch id.
        options.push(opts.id.clone().unwrap_or_else(|| "-".to_string()));
        let address = if opts.is_floating {
            "@".to_string()
        } else {
            opts.frame_address.clone().unwrap_or_else(|| "*".to_string())
        };
        options.push(address);
        options.push(quoted(expression));
        Self::with_options("var-create", options)
    }

    pub fn var_delete(id: &str) -> MiCommand {
        Self::with_options("var-delete", vec![id.to_string()])
    }

    pub fn var_update(id: &str, detail: Option<ValueDetail>) -> MiCommand {
        let mut options = Vec::new();
        if let Some(detail) = detail {
            options.push(detail.mi().to_string());
        }
        options.push(id.to_string());
        Self::with_options("var-update", options)
    }

    pub fn var_list_children(id: &str, q: &WatchChildrenQuery) -> MiCommand {
        let mut options = Vec::new();
        if let Some(detail) = q.detail {
            options.push(detail.mi().to_string());
        }
        options.push(id.to_string());
        if let (Some(from), Some(to)) = (q.from, q.to) {
            options.push(from.to_string());
            options.push(to.to_string());
        }
        Self::with_options("var-list-children", options)
    }

    pub fn var_set_format(id: &str, format: WatchFormat) -> MiCommand {
        Self::with_options("var-set-format", vec![id.to_string(), format.mi().to_string()])
    }

    pub fn var_evaluate_expression(id: &str, format: Option<WatchFormat>) -> MiCommand {
        let mut options = Vec::new();
        if let Some(format) = format {
            options.push("-f".to_string());
            options.push(format.mi().to_string());
        }
        options.push(id.to_string());
        Self::with_options("var-evaluate-expression", options)
    }

    pub fn var_assign(id: &str, expression: &str) -> MiCommand {
        Self::with_options("var-assign", vec![id.to_string(), quoted(expression)])
    }

    pub fn var_show_attributes(id: &str) -> MiCommand {
        Self::with_options("var-show-attributes", vec![id.to_string()])
    }

    pub fn var_info_path_expression(id: &str) -> MiCommand {
        Self::with_options("var-info-path-expression", vec![id.to_string()])
    }

    // --- data ---

    pub fn data_evaluate_expression(expression: &str, frame: FrameRef) -> MiCommand {
        let mut options = Vec::new();
        push_thread_frame(&mut options, frame.thread_id, frame.frame_level);
        options.push(quoted(expression));
        Self::with_options("data-evaluate-expression", options)
    }

    pub fn data_read_memory_bytes(
        address: &str,
        byte_count: u64,
        byte_offset: Option<i64>,
    ) -> MiCommand {
        let mut options = Vec::new();
        if let Some(offset) = byte_offset {
            options.push("-o".to_string());
            options.push(offset.to_string());
        }
        options.push(quoted(address));
        options.push(byte_count.to_string());
        Self::with_options("data-read-memory-bytes", options)
    }

    pub fn data_list_register_names(registers: &[u32]) -> MiCommand {
        Self::with_options(
            "data-list-register-names",
            registers.iter().map(u32::to_string).collect(),
        )
    }

    pub fn data_list_register_values(
        format: RegisterFormat,
        q: &RegisterValuesQuery,
    ) -> MiCommand {
        let mut options = Vec::new();
        push_thread_frame(&mut options, q.thread_id, q.frame_level);
        if q.skip_unavailable {
            options.push("--skip-unavailable".to_string());
        }
        options.push(format.code().to_string());
        options.extend(q.registers.iter().map(u32::to_string));
        Self::with_options("data-list-register-values", options)
    }

    // --- disassembly ---

    pub fn data_disassemble_address(start: &str, end: &str, mode: DisassembleMode) -> MiCommand {
        MiCommand {
            operation: "data-disassemble",
            options: vec![
                "-s".to_string(),
                start.to_string(),
                "-e".to_string(),
                end.to_string(),
            ],
            parameters: vec![(mode as u8).to_string()],
        }
    }

    pub fn data_disassemble_file(
        file: &str,
        line: u32,
        max_instructions: Option<u32>,
        mode: DisassembleMode,
    ) -> MiCommand {
        let mut options = vec![
            "-f".to_string(),
            file.to_string(),
            "-l".to_string(),
            line.to_string(),
        ];
        if let Some(max) = max_instructions {
            options.push("-n".to_string());
            options.push(max.to_string());
        }
        MiCommand {
            operation: "data-disassemble",
            options,
            parameters: vec![(mode as u8).to_string()],
        }
    }

    // --- threads, session ---

    pub fn thread_info(thread_id: Option<u32>) -> MiCommand {
        let options = thread_id.map(|id| vec![id.to_string()]).unwrap_or_default();
        Self::with_options("thread-info", options)
    }

    pub fn gdb_exit() -> MiCommand {
        MiCommand { operation: "gdb-exit", ..Default::default() }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mi::output::{Record, StreamKind, parse_line};

    #[test]
    fn test_interpreter_line() {
        let cmd = MiCommand::break_insert(
            "main.cpp:42",
            &BreakpointOptions {
                is_temp: true,
                condition: Some("x==1".to_string()),
                ignore_count: Some(3),
                ..Default::default()
            },
        );
        assert_eq!(
            cmd.to_interpreter_line(Some(5)),
            "5-break-insert -t -c \"x==1\" -i 3 main.cpp:42\n"
        );
        assert_eq!(
            cmd.to_interpreter_line(None),
            "-break-insert -t -c \"x==1\" -i 3 main.cpp:42\n"
        );
    }

    #[test]
    fn test_disassemble_mode_separator() {
        let cmd = MiCommand::data_disassemble_address(
            "0x400000",
            "0x400040",
            DisassembleMode::DisassemblyWithRawOpcodes,
        );
        assert_eq!(
            cmd.to_interpreter_line(None),
            "-data-disassemble -s 0x400000 -e 0x400040 -- 2\n"
        );
    }

    #[test]
    fn test_frame_range_single_bound_passed_twice() {
        let cmd = MiCommand::stack_list_frames(&StackFramesQuery {
            low_frame: Some(3),
            ..Default::default()
        });
        assert_eq!(cmd.to_interpreter_line(None), "-stack-list-frames 3 3\n");
    }

    #[test]
    fn test_thread_option_is_space_separated() {
        let cmd = MiCommand::stack_list_frames(&StackFramesQuery {
            thread_id: Some(2),
            low_frame: Some(0),
            high_frame: Some(4),
            ..Default::default()
        });
        assert_eq!(cmd.to_interpreter_line(None), "-stack-list-frames --thread 2 0 4\n");
    }

    #[test]
    fn test_var_create_defaults() {
        let cmd = MiCommand::var_create("buf[0]", &WatchOptions::default());
        assert_eq!(cmd.to_interpreter_line(None), "-var-create - * \"buf[0]\"\n");
        let floating = MiCommand::var_create(
            "x",
            &WatchOptions { is_floating: true, id: Some("w1".to_string()), ..Default::default() },
        );
        assert_eq!(floating.to_interpreter_line(None), "-var-create w1 @ \"x\"\n");
    }

    #[test]
    fn test_escape_round_trip() {
        let raw = "tab\t \"quoted\" \\slash\n bell\x07 \x1b[0m nul\0";
        let line = format!("~\"{}\"", escape_string(raw));
        let Ok(Record::Stream(stream)) = parse_line(&line) else {
            panic!("re-encoded string did not parse");
        };
        assert_eq!(stream.kind, StreamKind::Console);
        assert_eq!(stream.data, raw);
    }
}
