//! Log4j-style events
//!
//! Log4j levels are a name plus an integer weight where smaller means more
//! severe. The canonical level is chosen by weight thresholds, so custom
//! levels land next to the standard level they are registered near.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use serde::{Deserialize, Serialize};
use tracing::debug;

use sluice_core::{Level, LoggingEvent, Message, ThreadInfo};

use crate::converter::Converter;
use crate::throwable::{ForeignFrame, ForeignThrowable, convert_frame, convert_throwable};

/// MDC key under which a level label without a canonical equivalent is kept
pub const ORIGINAL_LEVEL_KEY: &str = "sluice.originalLevel";

/// A log4j level: name and weight
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log4jLevel {
    pub name: String,
    pub int_level: i32,
}

impl Log4jLevel {
    pub const OFF: i32 = 0;
    pub const FATAL: i32 = 100;
    pub const ERROR: i32 = 200;
    pub const WARN: i32 = 300;
    pub const INFO: i32 = 400;
    pub const DEBUG: i32 = 500;
    pub const TRACE: i32 = 600;
    pub const ALL: i32 = i32::MAX;

    pub fn new(name: impl Into<String>, int_level: i32) -> Self {
        Self {
            name: name.into(),
            int_level,
        }
    }

    /// Look up a standard level by name, case-insensitively
    pub fn standard(name: &str) -> Option<Self> {
        let int_level = match name.to_ascii_uppercase().as_str() {
            "OFF" => Self::OFF,
            "FATAL" => Self::FATAL,
            "ERROR" => Self::ERROR,
            "WARN" => Self::WARN,
            "INFO" => Self::INFO,
            "DEBUG" => Self::DEBUG,
            "TRACE" => Self::TRACE,
            "ALL" => Self::ALL,
            _ => return None,
        };
        Some(Self::new(name.to_ascii_uppercase(), int_level))
    }

    /// The canonical level this weight falls into
    pub fn canonical(&self) -> Level {
        let weight = self.int_level;
        if weight <= Self::ERROR {
            Level::Error
        } else if weight <= Self::WARN {
            Level::Warn
        } else if weight <= Self::INFO {
            Level::Info
        } else if weight <= Self::DEBUG {
            Level::Debug
        } else {
            Level::Trace
        }
    }
}

/// A log4j-style event as handed over by an appender
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log4jEvent {
    #[serde(default)]
    pub logger_name: Option<String>,
    pub level: Log4jLevel,
    pub time_millis: i64,
    #[serde(default)]
    pub message_format: Option<String>,
    #[serde(default)]
    pub parameters: Option<Vec<Option<String>>>,
    #[serde(default)]
    pub thread_name: Option<String>,
    #[serde(default)]
    pub thread_id: Option<i64>,
    #[serde(default)]
    pub thread_priority: Option<i32>,
    #[serde(default)]
    pub context_data: BTreeMap<String, String>,
    #[serde(default)]
    pub context_stack: Vec<String>,
    #[serde(default)]
    pub source: Option<ForeignFrame>,
    #[serde(default)]
    pub thrown: Option<ForeignThrowable>,
}

impl Log4jEvent {
    pub fn new(logger_name: impl Into<String>, level: Log4jLevel, time_millis: i64) -> Self {
        Self {
            logger_name: Some(logger_name.into()),
            level,
            time_millis,
            message_format: None,
            parameters: None,
            thread_name: None,
            thread_id: None,
            thread_priority: None,
            context_data: BTreeMap::new(),
            context_stack: Vec::new(),
            source: None,
            thrown: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Log4jConverter;

impl Converter for Log4jConverter {
    type Foreign = Log4jEvent;
    type Canonical = LoggingEvent;

    fn convert(&self, foreign: Option<&Log4jEvent>) -> Option<LoggingEvent> {
        let event = foreign?;
        let level = event.level.canonical();

        let mut mdc = event.context_data.clone();
        if !event.level.name.eq_ignore_ascii_case(level.as_str()) {
            match mdc.entry(ORIGINAL_LEVEL_KEY.to_string()) {
                Entry::Vacant(entry) => {
                    entry.insert(event.level.name.clone());
                }
                Entry::Occupied(entry) => debug!(
                    level = %event.level.name,
                    existing = %entry.get(),
                    "MDC already holds {}, keeping its value",
                    ORIGINAL_LEVEL_KEY
                ),
            }
        }

        let message = (event.message_format.is_some() || event.parameters.is_some()).then(|| {
            Message {
                pattern: event.message_format.clone(),
                arguments: event.parameters.clone(),
            }
        });

        let has_thread =
            event.thread_name.is_some() || event.thread_id.is_some() || event.thread_priority.is_some();
        let thread_info = has_thread.then(|| ThreadInfo {
            name: event.thread_name.clone(),
            id: event.thread_id,
            priority: event.thread_priority,
            ..Default::default()
        });

        Some(LoggingEvent {
            logger: event.logger_name.clone(),
            level: Some(level),
            timestamp: Some(event.time_millis),
            sequence_number: None,
            message,
            thread_info,
            mdc: (!mdc.is_empty()).then_some(mdc),
            ndc: (!event.context_stack.is_empty())
                .then(|| event.context_stack.iter().map(Message::new).collect()),
            call_stack: event.source.as_ref().map(|frame| vec![convert_frame(frame)]),
            throwable: event.thrown.as_ref().map(convert_throwable),
            logger_context: None,
        })
    }
}
