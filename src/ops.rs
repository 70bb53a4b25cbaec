//! The typed operation surface of a [`Session`]. Every operation formats
//! one MI command, awaits its result through the queue, and extracts the
//! domain record the caller asked for.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::Ordering;

use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::config::DebuggerFlavor;
use crate::error::{Error, Result};
use crate::events::Event;
use crate::extract;
use crate::mi::commands::{
    BreakpointOptions, ContinueOptions, DisassembleMode, FrameRef, MiCommand, RegisterValuesQuery,
    RunOptions, StackArgsQuery, StackFramesQuery, StackVariablesQuery, StepOptions,
    WatchChildrenQuery, WatchOptions,
};
use crate::mi::output::{Value, ValueMap};
use crate::models::{
    AsmInstruction, Breakpoint, FrameArgs, FrameVariables, MemoryBlock, MultiThread,
    RegisterFormat, SourceLineAsm, StackFrame, Thread, ValueDetail, Watch, WatchAttribute,
    WatchChild, WatchFormat, WatchUpdate,
};
use crate::session::Session;

impl Session {
    /// Run a command and extract its typed result, wrapping extractor
    /// complaints into `MalformedResponse`.
    async fn run<T>(
        &self,
        command: MiCommand,
        extractor: impl FnOnce(&ValueMap) -> std::result::Result<T, String>,
    ) -> Result<T> {
        let operation = command.operation;
        let results = self.execute(command).await?;
        extractor(&results).map_err(|message| Error::MalformedResponse {
            message,
            response: Value::Object(results).to_string(),
            command: operation.to_string(),
            token: None,
        })
    }

    async fn run_unit(&self, command: MiCommand) -> Result<()> {
        self.execute(command).await.map(drop)
    }

    // --- target setup ---

    pub async fn set_executable_file(&self, path: impl AsRef<Path>) -> Result<()> {
        self.run_unit(MiCommand::file_exec_and_symbols(path.as_ref())).await
    }

    pub async fn set_inferior_terminal(&self, tty: &str) -> Result<()> {
        self.run_unit(MiCommand::inferior_tty_set(tty)).await
    }

    /// Attach to a remote stub. The session remembers this and skips the
    /// local-terminal setup when the inferior starts.
    pub async fn connect_to_remote_target(&self, host: &str, port: u16) -> Result<()> {
        self.run_unit(MiCommand::target_select_remote(host, port)).await?;
        self.remote.store(true, Ordering::SeqCst);
        Ok(())
    }

    // --- breakpoints ---

    pub async fn add_breakpoint(
        &self,
        location: &str,
        options: &BreakpointOptions,
    ) -> Result<Breakpoint> {
        self.run(MiCommand::break_insert(location, options), extract::breakpoint).await
    }

    pub async fn remove_breakpoint(&self, id: u32) -> Result<()> {
        self.remove_breakpoints(&[id]).await
    }

    pub async fn remove_breakpoints(&self, ids: &[u32]) -> Result<()> {
        self.run_unit(MiCommand::break_delete(ids)).await
    }

    pub async fn enable_breakpoint(&self, id: u32) -> Result<()> {
        self.enable_breakpoints(&[id]).await
    }

    pub async fn enable_breakpoints(&self, ids: &[u32]) -> Result<()> {
        self.run_unit(MiCommand::break_enable(ids)).await
    }

    pub async fn disable_breakpoint(&self, id: u32) -> Result<()> {
        self.disable_breakpoints(&[id]).await
    }

    pub async fn disable_breakpoints(&self, ids: &[u32]) -> Result<()> {
        self.run_unit(MiCommand::break_disable(ids)).await
    }

    /// Skip the next `ignore_count` hits. The debugger answers with the
    /// full breakpoint record.
    pub async fn ignore_breakpoint(&self, id: u32, ignore_count: u32) -> Result<Breakpoint> {
        self.run(MiCommand::break_after(id, ignore_count), extract::breakpoint).await
    }

    pub async fn set_breakpoint_condition(&self, id: u32, condition: &str) -> Result<()> {
        self.run_unit(MiCommand::break_condition(id, condition)).await
    }

    // --- execution ---

    pub async fn set_inferior_arguments(&self, args: &[String]) -> Result<()> {
        self.run_unit(MiCommand::exec_arguments(args)).await
    }

    pub async fn start_inferior(&self, options: &RunOptions) -> Result<()> {
        self.prepare_local_inferior().await?;
        self.run_unit(MiCommand::exec_run(
            options.thread_group.as_deref(),
            false,
            options.stop_at_start,
        ))
        .await
    }

    pub async fn start_all_inferiors(&self, stop_at_start: bool) -> Result<()> {
        self.prepare_local_inferior().await?;
        self.run_unit(MiCommand::exec_run(None, true, stop_at_start)).await
    }

    pub async fn abort_inferior(&self) -> Result<()> {
        self.run_unit(MiCommand::exec_abort()).await
    }

    pub async fn resume_inferior(&self, options: &ContinueOptions) -> Result<()> {
        self.run_unit(MiCommand::exec_continue(
            options.thread_group.as_deref(),
            false,
            options.reverse,
        ))
        .await
    }

    pub async fn resume_all_inferiors(&self, reverse: bool) -> Result<()> {
        self.run_unit(MiCommand::exec_continue(None, true, reverse)).await
    }

    pub async fn interrupt_inferior(&self, thread_group: Option<&str>) -> Result<()> {
        self.run_unit(MiCommand::exec_interrupt(thread_group, false)).await
    }

    pub async fn interrupt_all_inferiors(&self) -> Result<()> {
        self.run_unit(MiCommand::exec_interrupt(None, true)).await
    }

    pub async fn step_into_line(&self, options: &StepOptions) -> Result<()> {
        self.run_unit(MiCommand::stepping("exec-step", options)).await
    }

    pub async fn step_over_line(&self, options: &StepOptions) -> Result<()> {
        self.run_unit(MiCommand::stepping("exec-next", options)).await
    }

    pub async fn step_into_instruction(&self, options: &StepOptions) -> Result<()> {
        self.run_unit(MiCommand::stepping("exec-step-instruction", options)).await
    }

    pub async fn step_over_instruction(&self, options: &StepOptions) -> Result<()> {
        self.run_unit(MiCommand::stepping("exec-next-instruction", options)).await
    }

    pub async fn step_out(&self, options: &StepOptions) -> Result<()> {
        self.run_unit(MiCommand::stepping("exec-finish", options)).await
    }

    /// GDB reports `function-finished` when stepping out; lldb-mi only
    /// ever reports the end of a stepping range. Callers adapt on this.
    pub fn can_emit_function_finished_notification(&self) -> bool {
        self.config.flavor == DebuggerFlavor::Gdb
    }

    /// For a local GDB inferior: allocate a terminal from the configured
    /// provider, forward its output as target-output events, and point
    /// the debugger at its slave side. Runs at most once per session;
    /// remote targets and sessions without a provider skip it.
    async fn prepare_local_inferior(&self) -> Result<()> {
        if self.config.flavor != DebuggerFlavor::Gdb || self.remote.load(Ordering::SeqCst) {
            return Ok(());
        }
        let Some(provider) = self.config.terminal_provider.clone() else {
            return Ok(());
        };
        let mut tty = self.tty.lock().await;
        if tty.is_some() {
            return Ok(());
        }
        let terminal = provider.allocate()?;
        let slave_path = terminal.slave_path;
        debug!(%slave_path, "allocated inferior terminal");

        let events = self.events_channel();
        let mut output = terminal.output;
        tokio::spawn(async move {
            let mut buffer = [0u8; 4096];
            loop {
                match output.read(&mut buffer).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let chunk = String::from_utf8_lossy(&buffer[..n]).into_owned();
                        let _ = events.send(Event::TargetOutput(chunk));
                    }
                }
            }
        });

        self.set_inferior_terminal(&slave_path).await?;
        *tty = Some(slave_path);
        Ok(())
    }

    // --- stack ---

    pub async fn get_stack_frame(&self, frame: FrameRef) -> Result<StackFrame> {
        self.run(MiCommand::stack_info_frame(frame), extract::stack_frame).await
    }

    pub async fn get_stack_depth(
        &self,
        thread_id: Option<u32>,
        max_depth: Option<u32>,
    ) -> Result<u32> {
        self.run(MiCommand::stack_info_depth(thread_id, max_depth), extract::stack_depth).await
    }

    pub async fn get_stack_frames(&self, query: &StackFramesQuery) -> Result<Vec<StackFrame>> {
        self.run(MiCommand::stack_list_frames(query), extract::stack_frames).await
    }

    pub async fn get_stack_frame_args(
        &self,
        detail: ValueDetail,
        query: &StackArgsQuery,
    ) -> Result<Vec<FrameArgs>> {
        let range = match (query.low_frame, query.high_frame) {
            (Some(low), Some(high)) => Some((low, high)),
            (None, None) => None,
            _ => {
                return Err(Error::InvalidArgument(
                    "low_frame and high_frame must be given together".to_string(),
                ));
            }
        };
        self.run(
            MiCommand::stack_list_arguments(detail, query, range),
            extract::frame_args,
        )
        .await
    }

    pub async fn get_stack_frame_variables(
        &self,
        detail: ValueDetail,
        query: &StackVariablesQuery,
    ) -> Result<FrameVariables> {
        self.run(MiCommand::stack_list_variables(detail, query), extract::frame_variables).await
    }

    // --- watches ---

    pub async fn add_watch(&self, expression: &str, options: &WatchOptions) -> Result<Watch> {
        self.run(MiCommand::var_create(expression, options), extract::watch).await
    }

    pub async fn remove_watch(&self, id: &str) -> Result<()> {
        self.run_unit(MiCommand::var_delete(id)).await
    }

    pub async fn update_watch(
        &self,
        id: &str,
        detail: Option<ValueDetail>,
    ) -> Result<Vec<WatchUpdate>> {
        self.run(MiCommand::var_update(id, detail), extract::watch_updates).await
    }

    pub async fn get_watch_children(
        &self,
        id: &str,
        query: &WatchChildrenQuery,
    ) -> Result<Vec<WatchChild>> {
        self.run(MiCommand::var_list_children(id, query), extract::watch_children).await
    }

    pub async fn set_watch_value_format(&self, id: &str, format: WatchFormat) -> Result<String> {
        self.run(MiCommand::var_set_format(id, format), extract::format_result_value).await
    }

    pub async fn get_watch_value(&self, id: &str, format: Option<WatchFormat>) -> Result<String> {
        self.run(MiCommand::var_evaluate_expression(id, format), |map| {
            extract::string_field(map, "value")
        })
        .await
    }

    pub async fn set_watch_value(&self, id: &str, expression: &str) -> Result<String> {
        self.run(MiCommand::var_assign(id, expression), |map| {
            extract::string_field(map, "value")
        })
        .await
    }

    pub async fn get_watch_attributes(&self, id: &str) -> Result<Vec<WatchAttribute>> {
        self.run(MiCommand::var_show_attributes(id), extract::watch_attributes).await
    }

    pub async fn get_watch_expression(&self, id: &str) -> Result<String> {
        self.run(MiCommand::var_info_path_expression(id), |map| {
            extract::string_field(map, "path_expr")
        })
        .await
    }

    // --- data inspection ---

    pub async fn evaluate_expression(&self, expression: &str, frame: FrameRef) -> Result<String> {
        self.run(MiCommand::data_evaluate_expression(expression, frame), |map| {
            extract::string_field(map, "value")
        })
        .await
    }

    pub async fn read_memory(
        &self,
        address: &str,
        byte_count: u64,
        byte_offset: Option<i64>,
    ) -> Result<Vec<MemoryBlock>> {
        self.run(
            MiCommand::data_read_memory_bytes(address, byte_count, byte_offset),
            extract::memory_blocks,
        )
        .await
    }

    pub async fn get_register_names(&self, registers: &[u32]) -> Result<Vec<String>> {
        self.run(MiCommand::data_list_register_names(registers), extract::register_names).await
    }

    pub async fn get_register_values(
        &self,
        format: RegisterFormat,
        query: &RegisterValuesQuery,
    ) -> Result<HashMap<u32, String>> {
        self.run(
            MiCommand::data_list_register_values(format, query),
            extract::register_values,
        )
        .await
    }

    // --- disassembly ---

    pub async fn disassemble_address_range(
        &self,
        start: &str,
        end: &str,
        show_opcodes: bool,
    ) -> Result<Vec<AsmInstruction>> {
        let mode = if show_opcodes {
            DisassembleMode::DisassemblyWithRawOpcodes
        } else {
            DisassembleMode::DisassemblyOnly
        };
        self.run(
            MiCommand::data_disassemble_address(start, end, mode),
            extract::asm_instructions,
        )
        .await
    }

    pub async fn disassemble_address_range_by_line(
        &self,
        start: &str,
        end: &str,
        show_opcodes: bool,
    ) -> Result<Vec<SourceLineAsm>> {
        let mode = if show_opcodes {
            DisassembleMode::MixedSourceAndDisassemblyWithRawOpcodes
        } else {
            DisassembleMode::MixedSourceAndDisassembly
        };
        self.run(MiCommand::data_disassemble_address(start, end, mode), extract::asm_by_line)
            .await
    }

    pub async fn disassemble_file(
        &self,
        file: &str,
        line: u32,
        max_instructions: Option<u32>,
        show_opcodes: bool,
    ) -> Result<Vec<AsmInstruction>> {
        let mode = if show_opcodes {
            DisassembleMode::DisassemblyWithRawOpcodes
        } else {
            DisassembleMode::DisassemblyOnly
        };
        self.run(
            MiCommand::data_disassemble_file(file, line, max_instructions, mode),
            extract::asm_instructions,
        )
        .await
    }

    pub async fn disassemble_file_by_line(
        &self,
        file: &str,
        line: u32,
        max_instructions: Option<u32>,
        show_opcodes: bool,
    ) -> Result<Vec<SourceLineAsm>> {
        let mode = if show_opcodes {
            DisassembleMode::MixedSourceAndDisassemblyWithRawOpcodes
        } else {
            DisassembleMode::MixedSourceAndDisassembly
        };
        self.run(
            MiCommand::data_disassemble_file(file, line, max_instructions, mode),
            extract::asm_by_line,
        )
        .await
    }

    // --- threads ---

    pub async fn get_thread(&self, id: u32) -> Result<Thread> {
        self.run(MiCommand::thread_info(Some(id)), |map| {
            let mut threads = extract::threads(map)?;
            match threads.len() {
                1 => Ok(threads.remove(0)),
                0 => Err("empty `threads`".to_string()),
                n => Err(format!("expected one thread, got {}", n)),
            }
        })
        .await
    }

    pub async fn get_threads(&self) -> Result<MultiThread> {
        self.run(MiCommand::thread_info(None), extract::multi_thread).await
    }
}
