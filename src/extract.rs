//! Extractors turning generic MI mappings into domain records.
//!
//! The debugger's output shapes are loose: a field holding one element is
//! a tuple, the same field holding several is a list, and some fields go
//! missing entirely. Every extractor here normalizes to owned records and
//! reports missing required keys as plain string messages; the session
//! façade wraps those into `Error::MalformedResponse`.

use std::collections::HashMap;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use serde_with::{DisplayFromStr, serde_as};

use crate::mi::output::ValueMap;
use crate::models::{
    AsmInstruction, Breakpoint, BreakpointLocation, FrameArgs, FrameInfo, FrameVariables,
    MemoryBlock, MultiThread, SourceLineAsm, StackFrame, Thread, Variable, Watch, WatchAttribute,
    WatchChild, WatchUpdate, de,
};

pub(crate) fn get_str<'a>(map: &'a ValueMap, key: &str) -> Option<&'a str> {
    map.get(key).and_then(Value::as_str)
}

pub(crate) fn get_u32(map: &ValueMap, key: &str) -> Option<u32> {
    get_str(map, key).and_then(|s| s.parse().ok())
}

/// Normalize a single-or-list field to a list of items.
pub(crate) fn one_or_many(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

fn from_value<T: DeserializeOwned>(value: &Value) -> Result<T, String> {
    serde_json::from_value(value.clone()).map_err(|e| e.to_string())
}

fn require<'a>(map: &'a ValueMap, key: &str) -> Result<&'a Value, String> {
    map.get(key).ok_or_else(|| format!("missing `{}`", key))
}

// --- breakpoints ---

#[serde_as]
#[derive(Debug, Deserialize)]
struct RawBreakpoint {
    number: String,
    #[serde(rename = "type")]
    breakpoint_type: Option<String>,
    #[serde(rename = "catch-type")]
    catch_type: Option<String>,
    disp: Option<String>,
    enabled: Option<String>,
    addr: Option<String>,
    func: Option<String>,
    file: Option<String>,
    fullname: Option<String>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    line: Option<u32>,
    at: Option<String>,
    pending: Option<String>,
    #[serde(rename = "evaluated-by")]
    evaluated_by: Option<String>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(rename = "thread", default)]
    thread_id: Option<u32>,
    cond: Option<String>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(rename = "ignore", default)]
    ignore_count: Option<u32>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(rename = "enable", default)]
    enable_count: Option<u32>,
    mask: Option<String>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(rename = "pass", default)]
    pass_count: Option<u32>,
    #[serde(rename = "original-location")]
    original_location: Option<String>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(rename = "times", default)]
    hit_count: Option<u32>,
    installed: Option<String>,
    what: Option<String>,
}

impl RawBreakpoint {
    fn location(&self, id: String) -> BreakpointLocation {
        BreakpointLocation {
            id,
            is_enabled: self.enabled.as_deref().map(|e| e == "y"),
            address: self.addr.clone(),
            func: self.func.clone(),
            filename: self.file.clone(),
            fullname: self.fullname.clone(),
            line: self.line,
            at: self.at.clone(),
        }
    }
}

/// Build a breakpoint from the value under `bkpt`. A lone tuple carries
/// the breakpoint and its single location (none when pending); a sequence
/// starts with the breakpoint header and continues with its locations.
pub(crate) fn breakpoint_from_value(value: &Value) -> Result<Breakpoint, String> {
    let parts = one_or_many(value);
    let header = parts.first().ok_or("empty `bkpt`")?;
    let raw: RawBreakpoint = from_value(header)?;
    let id: u32 = raw
        .number
        .parse()
        .map_err(|_| format!("breakpoint number {:?} is not numeric", raw.number))?;

    let mut locations = Vec::new();
    if parts.len() > 1 {
        for part in &parts[1..] {
            let loc: RawBreakpoint = from_value(part)?;
            locations.push(loc.location(loc.number.clone()));
        }
    } else if raw.addr.as_deref() != Some("<PENDING>") {
        locations.push(raw.location(format!("{}.1", id)));
    }

    Ok(Breakpoint {
        id,
        breakpoint_type: raw.breakpoint_type,
        catch_type: raw.catch_type,
        is_temp: raw.disp.as_deref().map(|d| d == "del"),
        is_enabled: raw.enabled.as_deref().map(|e| e == "y"),
        locations,
        pending: raw.pending,
        evaluated_by: raw.evaluated_by,
        thread_id: raw.thread_id,
        condition: raw.cond,
        ignore_count: raw.ignore_count,
        enable_count: raw.enable_count,
        mask: raw.mask,
        pass_count: raw.pass_count,
        original_location: raw.original_location,
        hit_count: raw.hit_count,
        is_installed: raw.installed.as_deref().map(|i| i == "y"),
        what: raw.what,
    })
}

pub(crate) fn breakpoint(map: &ValueMap) -> Result<Breakpoint, String> {
    breakpoint_from_value(require(map, "bkpt")?)
}

// --- stack ---

pub(crate) fn stack_frame(map: &ValueMap) -> Result<StackFrame, String> {
    from_value(require(map, "frame")?)
}

pub(crate) fn stack_frames(map: &ValueMap) -> Result<Vec<StackFrame>, String> {
    one_or_many(require(map, "stack")?).iter().map(from_value).collect()
}

pub(crate) fn stack_depth(map: &ValueMap) -> Result<u32, String> {
    get_u32(map, "depth").ok_or_else(|| "missing numeric `depth`".to_string())
}

pub(crate) fn frame_args(map: &ValueMap) -> Result<Vec<FrameArgs>, String> {
    one_or_many(require(map, "stack-args")?).iter().map(from_value).collect()
}

/// Split a `variables` listing into arguments (`arg="1"`) and locals,
/// preserving order within each bucket.
pub(crate) fn frame_variables(map: &ValueMap) -> Result<FrameVariables, String> {
    let mut out = FrameVariables::default();
    for item in one_or_many(require(map, "variables")?) {
        let variable: Variable = from_value(&item)?;
        let is_arg = item.get("arg").and_then(Value::as_str) == Some("1");
        if is_arg {
            out.args.push(variable);
        } else {
            out.locals.push(variable);
        }
    }
    Ok(out)
}

// --- watches ---

pub(crate) fn watch(map: &ValueMap) -> Result<Watch, String> {
    from_value(&Value::Object(map.clone()))
}

/// Children arrive as a list, a single tuple, the literal string `"[]"`,
/// or not at all. Always an array on the way out.
pub(crate) fn watch_children(map: &ValueMap) -> Result<Vec<WatchChild>, String> {
    match map.get("children") {
        None | Some(Value::String(_)) => Ok(Vec::new()),
        Some(value) => one_or_many(value).iter().map(from_value).collect(),
    }
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct RawWatchUpdate {
    name: String,
    value: Option<String>,
    in_scope: String,
    type_changed: Option<String>,
    new_type: Option<String>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    new_num_children: Option<u32>,
    displayhint: Option<String>,
    #[serde(default, deserialize_with = "de::flag")]
    has_more: bool,
    dynamic: Option<String>,
    new_children: Option<Vec<WatchChild>>,
}

pub(crate) fn watch_updates(map: &ValueMap) -> Result<Vec<WatchUpdate>, String> {
    let changes = match map.get("changelist") {
        None => return Ok(Vec::new()),
        Some(value) => one_or_many(value),
    };
    changes
        .iter()
        .map(|change| {
            let raw: RawWatchUpdate = from_value(change)?;
            Ok(WatchUpdate {
                id: raw.name,
                child_count: raw.new_num_children,
                value: raw.value,
                expression_type: raw.new_type,
                is_in_scope: raw.in_scope == "true",
                is_obsolete: raw.in_scope == "invalid",
                has_type_changed: raw.type_changed.map(|t| t == "true"),
                is_dynamic: raw.dynamic.map(|d| d == "1"),
                display_hint: raw.displayhint,
                has_more_children: raw.has_more,
                new_children: raw.new_children,
            })
        })
        .collect()
}

/// Attributes come back under `status` (GDB) or `attr` (LLDB), as one
/// string or a list of strings.
pub(crate) fn watch_attributes(map: &ValueMap) -> Result<Vec<WatchAttribute>, String> {
    let value = map
        .get("status")
        .or_else(|| map.get("attr"))
        .ok_or("missing `status`/`attr`")?;
    one_or_many(value)
        .iter()
        .map(|item| {
            let name = item.as_str().ok_or_else(|| format!("attribute {:?} is not a string", item))?;
            if name.eq_ignore_ascii_case("editable") {
                Ok(WatchAttribute::Editable)
            } else {
                Ok(WatchAttribute::NonEditable)
            }
        })
        .collect()
}

/// Pull a single required string field out of a result.
pub(crate) fn string_field(map: &ValueMap, key: &str) -> Result<String, String> {
    get_str(map, key).map(str::to_string).ok_or_else(|| format!("missing `{}`", key))
}

/// The value after a format change lives under `value` on GDB; lldb-mi
/// reports it through `changelist[0].value` instead.
pub(crate) fn format_result_value(map: &ValueMap) -> Result<String, String> {
    if let Some(value) = get_str(map, "value") {
        return Ok(value.to_string());
    }
    map.get("changelist")
        .map(|c| one_or_many(c))
        .and_then(|items| items.first().cloned())
        .as_ref()
        .and_then(|item| item.get("value"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| "missing `value` and `changelist[0].value`".to_string())
}

// --- data ---

pub(crate) fn memory_blocks(map: &ValueMap) -> Result<Vec<MemoryBlock>, String> {
    one_or_many(require(map, "memory")?).iter().map(from_value).collect()
}

pub(crate) fn register_names(map: &ValueMap) -> Result<Vec<String>, String> {
    from_value(require(map, "register-names")?)
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct RawRegisterValue {
    #[serde_as(as = "DisplayFromStr")]
    number: u32,
    value: String,
}

pub(crate) fn register_values(map: &ValueMap) -> Result<HashMap<u32, String>, String> {
    one_or_many(require(map, "register-values")?)
        .iter()
        .map(|item| {
            let raw: RawRegisterValue = from_value(item)?;
            Ok((raw.number, raw.value))
        })
        .collect()
}

// --- disassembly ---

pub(crate) fn asm_instructions(map: &ValueMap) -> Result<Vec<AsmInstruction>, String> {
    one_or_many(require(map, "asm_insns")?).iter().map(from_value).collect()
}

pub(crate) fn asm_by_line(map: &ValueMap) -> Result<Vec<SourceLineAsm>, String> {
    one_or_many(require(map, "asm_insns")?).iter().map(from_value).collect()
}

// --- threads ---

pub(crate) fn threads(map: &ValueMap) -> Result<Vec<Thread>, String> {
    one_or_many(require(map, "threads")?).iter().map(from_value).collect()
}

pub(crate) fn multi_thread(map: &ValueMap) -> Result<MultiThread, String> {
    let all = threads(map)?;
    let current = get_u32(map, "current-thread-id")
        .and_then(|id| all.iter().find(|t| t.id == id).cloned());
    Ok(MultiThread { all, current })
}

// --- frames in stop events ---

pub(crate) fn frame_info(value: &Value) -> Result<FrameInfo, String> {
    from_value(value)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mi::output::{Record, parse_line};

    fn result_map(line: &str) -> ValueMap {
        match parse_line(line) {
            Ok(Record::Result(record)) => record.results,
            Ok(other) => panic!("not a result record: {:?}", other),
            Err(e) => panic!("parse failed: {}", e),
        }
    }

    fn notify_map(line: &str) -> ValueMap {
        match parse_line(line) {
            Ok(Record::Async(record)) => record.results,
            other => panic!("not an async record: {:?}", other),
        }
    }

    #[test]
    fn test_breakpoint_all_fields() {
        let map = notify_map(
            "=breakpoint-modified,bkpt={number=\"999\",type=\"breakpoint\",disp=\"keep\",\
             enabled=\"y\",addr=\"0x400927\",func=\"main\",file=\"x.cpp\",fullname=\"/x.cpp\",\
             line=\"47\",times=\"1\",enable=\"3\",ignore=\"2\",pass=\"4\",\
             original-location=\"main\",thread=\"10\",cond=\"x==1\",what=\"nothing\",\
             at=\"0x400927 main\",evaluated-by=\"target\",mask=\"xxxx\",installed=\"y\"}",
        );
        let bp = breakpoint(&map).expect("breakpoint extracts");
        assert_eq!(bp.id, 999);
        assert_eq!(bp.is_temp, Some(false));
        assert_eq!(bp.is_enabled, Some(true));
        assert_eq!(bp.hit_count, Some(1));
        assert_eq!(bp.enable_count, Some(3));
        assert_eq!(bp.ignore_count, Some(2));
        assert_eq!(bp.pass_count, Some(4));
        assert_eq!(bp.condition.as_deref(), Some("x==1"));
        assert_eq!(bp.thread_id, Some(10));
        assert_eq!(bp.is_installed, Some(true));
        assert_eq!(bp.what.as_deref(), Some("nothing"));
        assert_eq!(bp.evaluated_by.as_deref(), Some("target"));
        assert_eq!(bp.mask.as_deref(), Some("xxxx"));
        assert_eq!(bp.locations.len(), 1);
        let loc = &bp.locations[0];
        assert_eq!(loc.id, "999.1");
        assert_eq!(loc.address.as_deref(), Some("0x400927"));
        assert_eq!(loc.func.as_deref(), Some("main"));
        assert_eq!(loc.line, Some(47));
    }

    #[test]
    fn test_pending_breakpoint_has_no_locations() {
        let map = result_map(
            "^done,bkpt={number=\"2\",type=\"breakpoint\",disp=\"keep\",enabled=\"y\",\
             addr=\"<PENDING>\",pending=\"libfoo.c:10\",times=\"0\"}",
        );
        let bp = breakpoint(&map).expect("pending breakpoint extracts");
        assert_eq!(bp.id, 2);
        assert!(bp.locations.is_empty());
        assert_eq!(bp.pending.as_deref(), Some("libfoo.c:10"));
    }

    #[test]
    fn test_multi_location_breakpoint() {
        let map = result_map(
            "^done,bkpt={number=\"1\",type=\"breakpoint\",disp=\"keep\",enabled=\"y\",\
             addr=\"<MULTIPLE>\",times=\"0\"},\
             bkpt={number=\"1.1\",enabled=\"y\",addr=\"0x400927\",func=\"foo<int>\",line=\"7\"},\
             bkpt={number=\"1.2\",enabled=\"n\",addr=\"0x400a01\",func=\"foo<long>\",line=\"7\"}",
        );
        let bp = breakpoint(&map).expect("multi-location breakpoint extracts");
        assert_eq!(bp.id, 1);
        assert_eq!(bp.locations.len(), 2);
        assert_eq!(bp.locations[0].id, "1.1");
        assert_eq!(bp.locations[1].id, "1.2");
        assert_eq!(bp.locations[1].is_enabled, Some(false));
    }

    #[test]
    fn test_stack_frames() {
        let map = result_map(
            "^done,stack=[frame={level=\"0\",addr=\"0x400927\",func=\"inner\",file=\"x.cpp\",\
             line=\"3\"},frame={level=\"1\",addr=\"0x400a00\",func=\"main\",file=\"x.cpp\",\
             line=\"10\"}]",
        );
        let frames = stack_frames(&map).expect("frames extract");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].level, 0);
        assert_eq!(frames[1].func.as_deref(), Some("main"));
    }

    #[test]
    fn test_frame_variables_split() {
        let map = result_map(
            "^done,variables=[{name=\"argc\",arg=\"1\",value=\"1\"},\
             {name=\"argv\",arg=\"1\",value=\"0x7fff\"},{name=\"x\",value=\"42\"}]",
        );
        let vars = frame_variables(&map).expect("variables extract");
        assert_eq!(vars.args.len(), 2);
        assert_eq!(vars.locals.len(), 1);
        assert_eq!(vars.args[0].name, "argc");
        assert_eq!(vars.locals[0].name, "x");
    }

    #[test]
    fn test_watch_children_shapes() {
        let missing = result_map("^done,numchild=\"0\",has_more=\"0\"");
        assert!(watch_children(&missing).expect("missing ok").is_empty());

        let empty = result_map("^done,numchild=\"0\",children=[],has_more=\"0\"");
        assert!(watch_children(&empty).expect("empty ok").is_empty());

        let single = result_map(
            "^done,numchild=\"1\",children=[child={name=\"var1.x\",exp=\"x\",numchild=\"0\",\
             value=\"1\",type=\"int\",thread-id=\"1\"}],has_more=\"0\"",
        );
        let children = watch_children(&single).expect("single ok");
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, "var1.x");
        assert_eq!(children[0].expression.as_deref(), Some("x"));

        let frozen = result_map(
            "^done,children=[child={name=\"v.a\",exp=\"a\",numchild=\"0\",frozen=\"1\"},\
             child={name=\"v.b\",exp=\"b\",numchild=\"0\"}]",
        );
        let children = watch_children(&frozen).expect("list ok");
        assert_eq!(children.len(), 2);
        assert!(children[0].is_frozen);
        assert!(!children[1].is_frozen);
    }

    #[test]
    fn test_watch_updates() {
        let map = result_map(
            "^done,changelist=[{name=\"var1\",value=\"99\",in_scope=\"true\",\
             type_changed=\"false\",has_more=\"0\"},{name=\"var2\",in_scope=\"invalid\",\
             has_more=\"0\"}]",
        );
        let updates = watch_updates(&map).expect("updates extract");
        assert_eq!(updates.len(), 2);
        assert!(updates[0].is_in_scope);
        assert!(!updates[0].is_obsolete);
        assert_eq!(updates[0].has_type_changed, Some(false));
        assert_eq!(updates[0].value.as_deref(), Some("99"));
        assert!(!updates[1].is_in_scope);
        assert!(updates[1].is_obsolete);
    }

    #[test]
    fn test_watch_attributes_both_spellings() {
        let gdb = result_map("^done,status=\"editable\"");
        assert_eq!(watch_attributes(&gdb).expect("status"), vec![WatchAttribute::Editable]);

        let lldb = result_map("^done,attr=[\"noneditable\"]");
        assert_eq!(watch_attributes(&lldb).expect("attr"), vec![WatchAttribute::NonEditable]);
    }

    #[test]
    fn test_format_value_both_shapes() {
        let gdb = result_map("^done,format=\"hexadecimal\",value=\"0x2a\"");
        assert_eq!(format_result_value(&gdb).expect("gdb shape"), "0x2a");

        let lldb = result_map(
            "^done,changelist=[{name=\"var1\",value=\"0x2a\",in_scope=\"true\",\
             type_changed=\"false\"}]",
        );
        assert_eq!(format_result_value(&lldb).expect("lldb shape"), "0x2a");

        let neither = result_map("^done");
        assert!(format_result_value(&neither).is_err());
    }

    #[test]
    fn test_memory_blocks() {
        let map = result_map(
            "^done,memory=[{begin=\"0x601000\",offset=\"0x0\",end=\"0x601004\",\
             contents=\"aa11bb22\"}]",
        );
        let blocks = memory_blocks(&map).expect("memory extracts");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].contents, "aa11bb22");
    }

    #[test]
    fn test_register_values() {
        let map = result_map(
            "^done,register-values=[{number=\"0\",value=\"0x0\"},{number=\"16\",\
             value=\"0x400927\"}]",
        );
        let values = register_values(&map).expect("registers extract");
        assert_eq!(values.len(), 2);
        assert_eq!(values[&16], "0x400927");
    }

    #[test]
    fn test_asm_flat_and_by_line() {
        let flat = result_map(
            "^done,asm_insns=[{address=\"0x400927\",func-name=\"main\",offset=\"0\",\
             inst=\"push %rbp\"},{address=\"0x400928\",func-name=\"main\",offset=\"1\",\
             opcodes=\"48 89 e5\",inst=\"mov %rsp,%rbp\"}]",
        );
        let instructions = asm_instructions(&flat).expect("flat extracts");
        assert_eq!(instructions.len(), 2);
        assert_eq!(instructions[1].offset, Some(1));
        assert_eq!(instructions[1].opcodes.as_deref(), Some("48 89 e5"));

        let by_line = result_map(
            "^done,asm_insns=[src_and_asm_line={line=\"7\",file=\"x.cpp\",\
             fullname=\"/tmp/x.cpp\",line_asm_insn=[{address=\"0x400927\",inst=\"push %rbp\"}]},\
             src_and_asm_line={line=\"8\",file=\"x.cpp\",line_asm_insn=[]}]",
        );
        let lines = asm_by_line(&by_line).expect("by-line extracts");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].line, 7);
        assert_eq!(lines[0].instructions.len(), 1);
        assert!(lines[1].instructions.is_empty());
    }

    #[test]
    fn test_threads() {
        let map = result_map(
            "^done,threads=[{id=\"2\",target-id=\"Thread 2\",state=\"running\",core=\"1\"},\
             {id=\"1\",target-id=\"Thread 1\",frame={level=\"0\",addr=\"0x400927\",\
             func=\"main\",args=[],file=\"x.cpp\",line=\"7\"},state=\"stopped\",core=\"0\"}],\
             current-thread-id=\"1\"",
        );
        let threads = multi_thread(&map).expect("threads extract");
        assert_eq!(threads.all.len(), 2);
        assert_eq!(threads.all[0].is_stopped, Some(false));
        let current = threads.current.expect("current thread");
        assert_eq!(current.id, 1);
        assert_eq!(current.frame.expect("frame").line, Some(7));
    }

    #[test]
    fn test_missing_key_is_reported() {
        let map = result_map("^done");
        let err = memory_blocks(&map).expect_err("must fail");
        assert!(err.contains("memory"));
    }
}
