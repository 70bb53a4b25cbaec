use std::collections::HashSet;

use nom::branch::alt;
use nom::bytes::complete::{is_not, tag, take_while, take_while_m_n};
use nom::character::complete::{char, digit1};
use nom::combinator::{all_consuming, map, map_res, opt, recognize, value, verify};
use nom::error::{ContextError, ErrorKind, FromExternalError, ParseError as NomParseError, context};
use nom::multi::{fold, many0, separated_list0};
use nom::sequence::{delimited, preceded, separated_pair};
use nom::{IResult, Parser};
use serde_json::map::Entry;

use crate::error::ParseError;

pub use serde_json::{Map, Value};

/// A parsed tuple flattened to a mapping. Key order follows the wire; a
/// name repeated within one tuple is preserved as an ordered array under
/// that name.
pub type ValueMap = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultClass {
    Done,
    Running,
    Connected,
    Error,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncKind {
    Exec,
    Status,
    Notify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Console,
    Target,
    Log,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadEvent {
    Created,
    Exited,
    Selected,
    GroupAdded,
    GroupRemoved,
    GroupStarted,
    GroupExited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakPointEvent {
    Created,
    Deleted,
    Modified,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsyncClass {
    Running,
    Stopped,
    Thread(ThreadEvent),
    BreakPoint(BreakPointEvent),
    LibraryLoaded,
    LibraryUnloaded,
    Other(String),
}

#[derive(Debug, Clone)]
pub struct ResultRecord {
    pub token: Option<u64>,
    pub class: ResultClass,
    pub results: ValueMap,
}

#[derive(Debug, Clone)]
pub struct AsyncRecord {
    pub token: Option<u64>,
    pub kind: AsyncKind,
    pub class: AsyncClass,
    pub results: ValueMap,
}

#[derive(Debug, Clone)]
pub struct StreamRecord {
    pub kind: StreamKind,
    pub data: String,
}

/// One line of debugger output, classified.
#[derive(Debug, Clone)]
pub enum Record {
    Result(ResultRecord),
    Async(AsyncRecord),
    Stream(StreamRecord),
    Prompt,
}

/// Parse one line of MI output. Trailing line endings are tolerated; the
/// whole remainder must be consumed.
pub fn parse_line(input: &str) -> Result<Record, ParseError> {
    let line = input.trim_end_matches(['\r', '\n']);
    match all_consuming(output).parse(line) {
        Ok((_, record)) => Ok(record),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(e.into_parse_error(line)),
        Err(nom::Err::Incomplete(_)) => Err(ParseError {
            line: 0,
            column: line.len() + 1,
            expected: vec!["more input".to_string()],
            found: line.to_string(),
        }),
    }
}

/// Grammar error tracking the deepest failure point and the productions
/// that could have continued there.
#[derive(Debug)]
struct MiError<'a> {
    input: &'a str,
    expected: Vec<String>,
}

impl<'a> MiError<'a> {
    fn into_parse_error(mut self, line: &str) -> ParseError {
        self.expected.dedup();
        ParseError {
            line: 0,
            column: line.len() - self.input.len() + 1,
            expected: self.expected,
            found: line.to_string(),
        }
    }
}

impl<'a> NomParseError<&'a str> for MiError<'a> {
    fn from_error_kind(input: &'a str, kind: ErrorKind) -> Self {
        MiError { input, expected: vec![kind.description().to_string()] }
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }

    fn from_char(input: &'a str, c: char) -> Self {
        MiError { input, expected: vec![format!("`{}`", c)] }
    }

    fn or(mut self, mut other: Self) -> Self {
        // Keep whichever alternative got further; merge on a tie.
        if other.input.len() < self.input.len() {
            other
        } else if self.input.len() < other.input.len() {
            self
        } else {
            self.expected.append(&mut other.expected);
            self
        }
    }
}

impl<'a, E> FromExternalError<&'a str, E> for MiError<'a> {
    fn from_external_error(input: &'a str, kind: ErrorKind, _e: E) -> Self {
        MiError { input, expected: vec![kind.description().to_string()] }
    }
}

impl<'a> ContextError<&'a str> for MiError<'a> {
    fn add_context(input: &'a str, ctx: &'static str, other: Self) -> Self {
        // Name the production only if it failed without consuming anything;
        // otherwise the inner error is the more precise one.
        if other.input.len() == input.len() {
            MiError { input, expected: vec![ctx.to_string()] }
        } else {
            other
        }
    }
}

type PResult<'a, O> = IResult<&'a str, O, MiError<'a>>;

/// parse the result class by looking for the corresponding tag, which is
/// one of: done, running, connected, error, exit
fn result_class(input: &str) -> PResult<ResultClass> {
    context(
        "result class",
        alt((
            value(ResultClass::Done, tag("done")),
            value(ResultClass::Running, tag("running")),
            value(ResultClass::Connected, tag("connected")),
            value(ResultClass::Error, tag("error")),
            value(ResultClass::Exit, tag("exit")),
        )),
    )
    .parse(input)
}

/// Parse a `\xHH` byte escape.
fn hex_escape(input: &str) -> PResult<char> {
    let hex = take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit());
    let byte = map_res(preceded(char('x'), hex), |digits| u8::from_str_radix(digits, 16));
    map(byte, char::from).parse(input)
}

/// Parse one escaped character from the set GDB emits inside c-strings.
fn escaped_char(input: &str) -> PResult<char> {
    preceded(
        char('\\'),
        alt((
            value('\\', char('\\')),
            value('"', char('"')),
            value('\n', char('n')),
            value('\t', char('t')),
            value('\r', char('r')),
            value('\x07', char('a')),
            value('\x08', char('b')),
            value('\x0c', char('f')),
            value('\x0b', char('v')),
            value('\x1b', char('e')),
            value('\0', char('0')),
            hex_escape,
        )),
    )
    .parse(input)
}

/// Parse a non-empty block of text that doesn't include \ or "
fn literal(input: &str) -> PResult<&str> {
    let not_quote_slash = is_not("\"\\");
    verify(not_quote_slash, |s: &str| !s.is_empty()).parse(input)
}

#[derive(Debug, Clone)]
enum StringFragment<'a> {
    Literal(&'a str),
    EscapedChar(char),
}

fn fragment(input: &str) -> PResult<StringFragment> {
    alt((
        map(literal, StringFragment::Literal),
        map(escaped_char, StringFragment::EscapedChar),
    ))
    .parse(input)
}

/// Parse a c-string: a loop of fragments folded into one decoded String.
fn c_string(input: &str) -> PResult<String> {
    let build_string = fold(0.., fragment, String::new, |mut string, frag| {
        match frag {
            StringFragment::Literal(s) => string.push_str(s),
            StringFragment::EscapedChar(c) => string.push(c),
        }
        string
    });
    context("string", delimited(char('"'), build_string, char('"'))).parse(input)
}

/// Flatten ordered key-value pairs into a mapping. A repeated name keeps
/// every occurrence, in order, as an array under that name.
fn to_map(pairs: Vec<(String, Value)>) -> ValueMap {
    let mut map = ValueMap::new();
    let mut promoted: HashSet<String> = HashSet::new();
    for (name, val) in pairs {
        match map.entry(name) {
            Entry::Vacant(slot) => {
                slot.insert(val);
            }
            Entry::Occupied(mut slot) => {
                if promoted.contains(slot.key()) {
                    if let Value::Array(items) = slot.get_mut() {
                        items.push(val);
                    }
                } else {
                    promoted.insert(slot.key().clone());
                    let first = slot.get_mut().take();
                    *slot.get_mut() = Value::Array(vec![first, val]);
                }
            }
        }
    }
    map
}

fn to_list(pairs: Vec<(String, Value)>) -> Vec<Value> {
    // A list of results keeps only the values; consumers index items
    // positionally and the item names ("frame", "bkpt", ...) carry no
    // information beyond the key the list itself sits under.
    pairs.into_iter().map(|(_, val)| val).collect()
}

fn mi_value(input: &str) -> PResult<Value> {
    context(
        "value",
        alt((
            map(c_string, Value::String),
            map(
                delimited(char('{'), separated_list0(char(','), key_value), char('}')),
                |results| Value::Object(to_map(results)),
            ),
            map(
                delimited(char('['), separated_list0(char(','), mi_value), char(']')),
                Value::Array,
            ),
            map(
                delimited(char('['), separated_list0(char(','), key_value), char(']')),
                |results| Value::Array(to_list(results)),
            ),
        )),
    )
    .parse(input)
}

// Against its spec, gdb(mi) sometimes emits multiple comma separated
// values for a single result variable.
fn values_in_result(input: &str) -> PResult<Value> {
    map(separated_list0(tag(","), mi_value), |mut values: Vec<Value>| {
        if values.len() == 1 {
            values.pop().unwrap_or(Value::Null)
        } else {
            Value::Array(values)
        }
    })
    .parse(input)
}

/// variable = [A-Za-z_][-A-Za-z0-9_]*
fn variable(input: &str) -> PResult<&str> {
    context(
        "variable name",
        recognize((
            take_while_m_n(1, 1, |c: char| c.is_ascii_alphabetic() || c == '_'),
            take_while(|c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
        )),
    )
    .parse(input)
}

fn key_value(input: &str) -> PResult<(String, Value)> {
    map(separated_pair(variable, char('='), values_in_result), |(var, val)| {
        (var.to_string(), val)
    })
    .parse(input)
}

fn token(input: &str) -> PResult<u64> {
    map_res(digit1, str::parse::<u64>).parse(input)
}

/// \[token\] "^" result-class ( "," result )*
fn result_record(input: &str) -> PResult<Record> {
    map(
        (opt(token), char('^'), result_class, many0(preceded(char(','), key_value))),
        |(t, _, class, results)| {
            Record::Result(ResultRecord { token: t, class, results: to_map(results) })
        },
    )
    .parse(input)
}

fn async_kind(input: &str) -> PResult<AsyncKind> {
    alt((
        value(AsyncKind::Exec, char('*')),
        value(AsyncKind::Status, char('+')),
        value(AsyncKind::Notify, char('=')),
    ))
    .parse(input)
}

fn async_class(input: &str) -> PResult<AsyncClass> {
    context(
        "class name",
        alt((
            value(AsyncClass::Running, tag("running")),
            value(AsyncClass::Stopped, tag("stopped")),
            value(AsyncClass::Thread(ThreadEvent::Created), tag("thread-created")),
            value(AsyncClass::Thread(ThreadEvent::GroupAdded), tag("thread-group-added")),
            value(AsyncClass::Thread(ThreadEvent::GroupRemoved), tag("thread-group-removed")),
            value(AsyncClass::Thread(ThreadEvent::GroupStarted), tag("thread-group-started")),
            value(AsyncClass::Thread(ThreadEvent::GroupExited), tag("thread-group-exited")),
            value(AsyncClass::Thread(ThreadEvent::Exited), tag("thread-exited")),
            value(AsyncClass::Thread(ThreadEvent::Selected), tag("thread-selected")),
            value(AsyncClass::LibraryLoaded, tag("library-loaded")),
            value(AsyncClass::LibraryUnloaded, tag("library-unloaded")),
            value(AsyncClass::BreakPoint(BreakPointEvent::Created), tag("breakpoint-created")),
            value(AsyncClass::BreakPoint(BreakPointEvent::Deleted), tag("breakpoint-deleted")),
            value(AsyncClass::BreakPoint(BreakPointEvent::Modified), tag("breakpoint-modified")),
            map(is_not(","), |name: &str| AsyncClass::Other(name.to_string())),
        )),
    )
    .parse(input)
}

/// \[token\] ("*"|"+"|"=") class-name ( "," result )*
fn async_record(input: &str) -> PResult<Record> {
    map(
        (opt(token), async_kind, async_class, many0(preceded(char(','), key_value))),
        |(t, kind, class, results)| {
            Record::Async(AsyncRecord { token: t, kind, class, results: to_map(results) })
        },
    )
    .parse(input)
}

fn stream_kind(input: &str) -> PResult<StreamKind> {
    alt((
        value(StreamKind::Console, char('~')),
        value(StreamKind::Target, char('@')),
        value(StreamKind::Log, char('&')),
    ))
    .parse(input)
}

/// ("~"|"@"|"&") c-string
fn stream_record(input: &str) -> PResult<Record> {
    map((stream_kind, c_string), |(kind, data)| {
        Record::Stream(StreamRecord { kind, data })
    })
    .parse(input)
}

/// The `(gdb)` sentinel, with or without its trailing space.
fn prompt(input: &str) -> PResult<Record> {
    map((tag("(gdb)"), opt(char(' '))), |_| Record::Prompt).parse(input)
}

fn output(input: &str) -> PResult<Record> {
    alt((
        context("result record", result_record),
        context("stream record", stream_record),
        context("async record", async_record),
        context("prompt", prompt),
    ))
    .parse(input)
}
