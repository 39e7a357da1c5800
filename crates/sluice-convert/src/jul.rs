//! java.util.logging records
//!
//! JUL levels are numeric with larger meaning more severe. Messages use
//! indexed `{0}` placeholders, which are rewritten into positional `{}`
//! placeholders with the arguments reordered to match.

use serde::{Deserialize, Serialize};

use sluice_core::{Level, LoggingEvent, Message, StackFrame, ThreadInfo};

use crate::converter::Converter;
use crate::log4j::ORIGINAL_LEVEL_KEY;
use crate::throwable::{ForeignThrowable, convert_throwable};

/// A JUL level: name and numeric value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JulLevel {
    pub name: String,
    pub value: i32,
}

impl JulLevel {
    pub const OFF: i32 = i32::MAX;
    pub const SEVERE: i32 = 1000;
    pub const WARNING: i32 = 900;
    pub const INFO: i32 = 800;
    pub const CONFIG: i32 = 700;
    pub const FINE: i32 = 500;
    pub const FINER: i32 = 400;
    pub const FINEST: i32 = 300;
    pub const ALL: i32 = i32::MIN;

    const STANDARD: [(&'static str, i32); 9] = [
        ("OFF", Self::OFF),
        ("SEVERE", Self::SEVERE),
        ("WARNING", Self::WARNING),
        ("INFO", Self::INFO),
        ("CONFIG", Self::CONFIG),
        ("FINE", Self::FINE),
        ("FINER", Self::FINER),
        ("FINEST", Self::FINEST),
        ("ALL", Self::ALL),
    ];

    pub fn new(name: impl Into<String>, value: i32) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn standard(name: &str) -> Option<Self> {
        Self::STANDARD
            .iter()
            .find(|(standard, _)| standard.eq_ignore_ascii_case(name))
            .map(|(standard, value)| Self::new(*standard, *value))
    }

    pub fn is_standard(&self) -> bool {
        Self::STANDARD
            .iter()
            .any(|(standard, value)| *value == self.value && standard.eq_ignore_ascii_case(&self.name))
    }

    pub fn canonical(&self) -> Level {
        match self.value {
            v if v >= Self::SEVERE => Level::Error,
            v if v >= Self::WARNING => Level::Warn,
            v if v >= Self::CONFIG => Level::Info,
            v if v >= Self::FINE => Level::Debug,
            _ => Level::Trace,
        }
    }
}

/// A JUL log record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JulRecord {
    #[serde(default)]
    pub logger_name: Option<String>,
    pub level: JulLevel,
    pub millis: i64,
    #[serde(default)]
    pub sequence_number: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub parameters: Option<Vec<Option<String>>>,
    #[serde(default)]
    pub thread_id: Option<i64>,
    #[serde(default)]
    pub source_class_name: Option<String>,
    #[serde(default)]
    pub source_method_name: Option<String>,
    #[serde(default)]
    pub thrown: Option<ForeignThrowable>,
}

impl JulRecord {
    pub fn new(level: JulLevel, message: impl Into<String>, millis: i64) -> Self {
        Self {
            logger_name: None,
            level,
            millis,
            sequence_number: 0,
            message: Some(message.into()),
            parameters: None,
            thread_id: None,
            source_class_name: None,
            source_method_name: None,
            thrown: None,
        }
    }
}

/// Rewrite an indexed pattern into a positional one
///
/// `{n}` and `{n,format}` become `{}` with argument `n` moved into place.
/// Indexes without an argument stay literal, as does a literal `{}`, which is
/// escaped so it is not taken for a placeholder later.
pub fn rewrite_indexed_pattern(
    pattern: &str,
    parameters: &[Option<String>],
) -> (String, Vec<Option<String>>) {
    let mut out = String::with_capacity(pattern.len());
    let mut arguments = Vec::new();
    let mut rest = pattern;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return (out, arguments);
        };

        let inner = &after[..close];
        let index = inner.split(',').next().and_then(|n| n.trim().parse::<usize>().ok());
        match index {
            Some(index) if index < parameters.len() => {
                // A backslash right before the placeholder must stay literal.
                if out.ends_with('\\') {
                    out.push('\\');
                }
                out.push_str("{}");
                arguments.push(parameters[index].clone());
            }
            _ if inner.is_empty() => out.push_str("\\{}"),
            _ => {
                out.push('{');
                out.push_str(inner);
                out.push('}');
            }
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    (out, arguments)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JulConverter;

impl Converter for JulConverter {
    type Foreign = JulRecord;
    type Canonical = LoggingEvent;

    fn convert(&self, foreign: Option<&JulRecord>) -> Option<LoggingEvent> {
        let record = foreign?;

        let message = record.message.as_deref().map(|pattern| {
            let (pattern, arguments) =
                rewrite_indexed_pattern(pattern, record.parameters.as_deref().unwrap_or_default());
            Message {
                pattern: Some(pattern),
                arguments: (!arguments.is_empty()).then_some(arguments),
            }
        });

        let mdc = (!record.level.is_standard()).then(|| {
            [(ORIGINAL_LEVEL_KEY.to_string(), record.level.name.clone())]
                .into_iter()
                .collect()
        });

        let call_stack = (record.source_class_name.is_some() || record.source_method_name.is_some())
            .then(|| {
                vec![StackFrame {
                    declaring_class: record.source_class_name.clone(),
                    method_name: record.source_method_name.clone(),
                    ..Default::default()
                }]
            });

        Some(LoggingEvent {
            logger: record.logger_name.clone(),
            level: Some(record.level.canonical()),
            timestamp: Some(record.millis),
            sequence_number: Some(record.sequence_number),
            message,
            thread_info: record.thread_id.map(|id| ThreadInfo {
                id: Some(id),
                ..Default::default()
            }),
            mdc,
            ndc: None,
            call_stack,
            throwable: record.thrown.as_ref().map(convert_throwable),
            logger_context: None,
        })
    }
}
