//! Canonical logging event
//!
//! Every codec and converter produces a [`LoggingEvent`]. Optional parts are
//! `Option`s so an absent map or list stays distinguishable from an empty one
//! through every wire format.

use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Mapped diagnostic context
pub type Mdc = BTreeMap<String, String>;

/// Canonical log level, totally ordered from `Trace` to `Error`
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl Level {
    pub const ALL: [Level; 5] = [
        Level::Trace,
        Level::Debug,
        Level::Info,
        Level::Warn,
        Level::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

impl Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TRACE" => Ok(Level::Trace),
            "DEBUG" => Ok(Level::Debug),
            "INFO" => Ok(Level::Info),
            "WARN" => Ok(Level::Warn),
            "ERROR" => Ok(Level::Error),
            other => Err(format!("unknown level: {}", other)),
        }
    }
}

/// A message pattern with positional arguments
///
/// Rendering is deferred: `{}` placeholders are only substituted when
/// [`Message::formatted`] is called.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Vec<Option<String>>>,
}

impl Message {
    /// A message without arguments
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: Some(pattern.into()),
            arguments: None,
        }
    }

    pub fn with_arguments(pattern: impl Into<String>, arguments: Vec<Option<String>>) -> Self {
        Self {
            pattern: Some(pattern.into()),
            arguments: Some(arguments),
        }
    }

    /// Render the pattern, substituting `{}` with arguments in order
    ///
    /// `\{}` renders a literal `{}` and `\\{}` a backslash followed by the
    /// argument. Missing arguments leave the placeholder in place and `None`
    /// arguments render as `null`.
    pub fn formatted(&self) -> Option<String> {
        let pattern = self.pattern.as_ref()?;
        let args = self.arguments.as_deref().unwrap_or(&[]);

        let mut out = String::with_capacity(pattern.len());
        let mut next_arg = 0;
        let mut rest = pattern.as_str();

        while let Some(pos) = rest.find("{}") {
            let (before, after) = rest.split_at(pos);
            let (before, escaped) = match before.strip_suffix('\\') {
                // `\\{}` is a literal backslash followed by a placeholder
                Some(stripped) if stripped.ends_with('\\') => (stripped, false),
                Some(stripped) => (stripped, true),
                None => (before, false),
            };
            out.push_str(before);
            if !escaped && next_arg < args.len() {
                out.push_str(args[next_arg].as_deref().unwrap_or("null"));
                next_arg += 1;
            } else {
                out.push_str("{}");
            }
            rest = &after[2..];
        }
        out.push_str(rest);
        Some(out)
    }
}

/// Description of the emitting thread
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
}

/// Line number used by stack frames of native methods
pub const NATIVE_METHOD_LINE: i32 = -2;

/// One frame of a call stack or throwable stack trace
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declaring_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Whether `code_location` and `version` are known to be exact
    #[serde(default)]
    pub exact: bool,
}

impl StackFrame {
    pub fn new(
        declaring_class: impl Into<String>,
        method_name: impl Into<String>,
        file_name: impl Into<String>,
        line_number: i32,
    ) -> Self {
        Self {
            declaring_class: Some(declaring_class.into()),
            method_name: Some(method_name.into()),
            file_name: Some(file_name.into()),
            line_number: Some(line_number),
            ..Default::default()
        }
    }

    pub fn is_native_method(&self) -> bool {
        self.line_number == Some(NATIVE_METHOD_LINE)
    }
}

impl Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}(",
            self.declaring_class.as_deref().unwrap_or("?"),
            self.method_name.as_deref().unwrap_or("?")
        )?;
        match (&self.file_name, self.line_number) {
            _ if self.is_native_method() => write!(f, "Native Method")?,
            (Some(file), Some(line)) if line >= 0 => write!(f, "{}:{}", file, line)?,
            (Some(file), _) => write!(f, "{}", file)?,
            (None, _) => write!(f, "Unknown Source")?,
        }
        write!(f, ")")
    }
}

/// A throwable with its cause chain and suppressed siblings
///
/// The structure is a tree: `cause` links down the chain and `suppressed`
/// holds siblings attached at this level.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThrowableInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<Vec<StackFrame>>,
    /// Frames elided by the emitting framework, shared with the enclosing trace
    #[serde(default)]
    pub omitted_elements: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<ThrowableInfo>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suppressed: Option<Vec<ThrowableInfo>>,
}

impl ThrowableInfo {
    pub fn new(name: impl Into<String>, message: Option<String>) -> Self {
        Self {
            name: Some(name.into()),
            message,
            ..Default::default()
        }
    }

    pub fn with_cause(mut self, cause: ThrowableInfo) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Iterate over this throwable and its causes, outermost first
    pub fn causes(&self) -> impl Iterator<Item = &ThrowableInfo> {
        std::iter::successors(Some(self), |t| t.cause.as_deref())
    }

    /// Length of the cause chain including this throwable
    pub fn depth(&self) -> usize {
        self.causes().count()
    }
}

/// Metadata about the logger context an event was emitted in
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggerContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, String>>,
}

/// The canonical logging event
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<Level>,
    /// Milliseconds since the Unix epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// Sequence number assigned by the emitter, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_info: Option<ThreadInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mdc: Option<Mdc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ndc: Option<Vec<Message>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_stack: Option<Vec<StackFrame>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throwable: Option<ThrowableInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logger_context: Option<LoggerContext>,
}

impl LoggingEvent {
    /// A minimal event with logger, level, message and the current time
    pub fn new(logger: impl Into<String>, level: Level, message: impl Into<String>) -> Self {
        Self {
            logger: Some(logger.into()),
            level: Some(level),
            timestamp: Some(chrono::Utc::now().timestamp_millis()),
            message: Some(Message::new(message)),
            ..Default::default()
        }
    }

    /// The rendered message text, if any
    pub fn formatted_message(&self) -> Option<String> {
        self.message.as_ref().and_then(Message::formatted)
    }
}
