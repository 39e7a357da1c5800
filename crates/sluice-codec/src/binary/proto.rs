//! Protobuf message types for the binary codec
//!
//! Declared with prost derives, no build script. Lists and maps that may be
//! absent on the canonical side travel inside a wrapper message so that an
//! empty collection and a missing one stay distinct.

use std::collections::BTreeMap;

use prost::Message;

use sluice_core::{
    AccessEvent, DecodeError, Level, LoggerContext, LoggingEvent, Message as EventMessage,
    StackFrame, ThreadInfo, ThrowableInfo,
};

// ============================================================================
// Shared containers
// ============================================================================

#[derive(Clone, PartialEq, Message)]
pub struct StringMapProto {
    #[prost(btree_map = "string, string", tag = "1")]
    pub entries: BTreeMap<String, String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct StringListProto {
    #[prost(string, repeated, tag = "1")]
    pub values: Vec<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ParameterMapProto {
    #[prost(btree_map = "string, message", tag = "1")]
    pub entries: BTreeMap<String, StringListProto>,
}

// ============================================================================
// Logging event
// ============================================================================

/// A single message argument, which may itself be null
#[derive(Clone, PartialEq, Message)]
pub struct ArgumentProto {
    #[prost(string, optional, tag = "1")]
    pub value: Option<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ArgumentListProto {
    #[prost(message, repeated, tag = "1")]
    pub arguments: Vec<ArgumentProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct MessageProto {
    #[prost(string, optional, tag = "1")]
    pub pattern: Option<String>,
    #[prost(message, optional, tag = "2")]
    pub arguments: Option<ArgumentListProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct MessageListProto {
    #[prost(message, repeated, tag = "1")]
    pub messages: Vec<MessageProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ThreadInfoProto {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    #[prost(int64, optional, tag = "2")]
    pub id: Option<i64>,
    #[prost(string, optional, tag = "3")]
    pub group_name: Option<String>,
    #[prost(int64, optional, tag = "4")]
    pub group_id: Option<i64>,
    #[prost(int32, optional, tag = "5")]
    pub priority: Option<i32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct StackFrameProto {
    #[prost(string, optional, tag = "1")]
    pub declaring_class: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub method_name: Option<String>,
    #[prost(string, optional, tag = "3")]
    pub file_name: Option<String>,
    #[prost(int32, optional, tag = "4")]
    pub line_number: Option<i32>,
    #[prost(string, optional, tag = "5")]
    pub code_location: Option<String>,
    #[prost(string, optional, tag = "6")]
    pub version: Option<String>,
    #[prost(bool, tag = "7")]
    pub exact: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct StackTraceProto {
    #[prost(message, repeated, tag = "1")]
    pub frames: Vec<StackFrameProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ThrowableProto {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub message: Option<String>,
    #[prost(message, optional, tag = "3")]
    pub stack_trace: Option<StackTraceProto>,
    #[prost(uint32, tag = "4")]
    pub omitted_elements: u32,
    #[prost(message, optional, boxed, tag = "5")]
    pub cause: Option<Box<ThrowableProto>>,
    #[prost(message, optional, tag = "6")]
    pub suppressed: Option<ThrowableListProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ThrowableListProto {
    #[prost(message, repeated, tag = "1")]
    pub throwables: Vec<ThrowableProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct LoggerContextProto {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    #[prost(int64, optional, tag = "2")]
    pub birth_time: Option<i64>,
    #[prost(message, optional, tag = "3")]
    pub properties: Option<StringMapProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct LoggingEventProto {
    #[prost(string, optional, tag = "1")]
    pub logger: Option<String>,
    #[prost(int32, optional, tag = "2")]
    pub level: Option<i32>,
    #[prost(int64, optional, tag = "3")]
    pub timestamp: Option<i64>,
    #[prost(int64, optional, tag = "4")]
    pub sequence_number: Option<i64>,
    #[prost(message, optional, tag = "5")]
    pub message: Option<MessageProto>,
    #[prost(message, optional, tag = "6")]
    pub thread_info: Option<ThreadInfoProto>,
    #[prost(message, optional, tag = "7")]
    pub mdc: Option<StringMapProto>,
    #[prost(message, optional, tag = "8")]
    pub ndc: Option<MessageListProto>,
    #[prost(message, optional, tag = "9")]
    pub call_stack: Option<StackTraceProto>,
    #[prost(message, optional, tag = "10")]
    pub throwable: Option<ThrowableProto>,
    #[prost(message, optional, tag = "11")]
    pub logger_context: Option<LoggerContextProto>,
    /// Always written, so an event with no fields still has a payload
    #[prost(uint32, tag = "15")]
    pub version: u32,
}

// ============================================================================
// Access event
// ============================================================================

#[derive(Clone, PartialEq, Message)]
pub struct AccessEventProto {
    #[prost(int64, optional, tag = "1")]
    pub timestamp: Option<i64>,
    #[prost(int64, optional, tag = "2")]
    pub elapsed_time: Option<i64>,
    #[prost(string, optional, tag = "3")]
    pub method: Option<String>,
    #[prost(string, optional, tag = "4")]
    pub protocol: Option<String>,
    #[prost(string, optional, tag = "5")]
    pub remote_address: Option<String>,
    #[prost(string, optional, tag = "6")]
    pub remote_host: Option<String>,
    #[prost(string, optional, tag = "7")]
    pub remote_user: Option<String>,
    #[prost(string, optional, tag = "8")]
    pub request_uri: Option<String>,
    #[prost(string, optional, tag = "9")]
    pub request_url: Option<String>,
    #[prost(string, optional, tag = "10")]
    pub server_name: Option<String>,
    #[prost(int32, optional, tag = "11")]
    pub local_port: Option<i32>,
    #[prost(int32, optional, tag = "12")]
    pub status_code: Option<i32>,
    #[prost(message, optional, tag = "13")]
    pub request_headers: Option<StringMapProto>,
    #[prost(message, optional, tag = "14")]
    pub response_headers: Option<StringMapProto>,
    #[prost(message, optional, tag = "15")]
    pub request_parameters: Option<ParameterMapProto>,
    #[prost(message, optional, tag = "16")]
    pub logger_context: Option<LoggerContextProto>,
    #[prost(uint32, tag = "17")]
    pub version: u32,
}

// ============================================================================
// Conversion logic
// ============================================================================

/// Record layout version written by this codec
///
/// Records without the field (version 0) decode like version 1.
pub const WIRE_VERSION: u32 = 1;

fn check_version(version: u32) -> Result<(), DecodeError> {
    if version > WIRE_VERSION {
        return Err(DecodeError::UnsupportedFormat(format!(
            "binary record version {} is newer than {}",
            version, WIRE_VERSION
        )));
    }
    Ok(())
}

pub(crate) fn level_to_wire(level: Level) -> i32 {
    match level {
        Level::Trace => 1,
        Level::Debug => 2,
        Level::Info => 3,
        Level::Warn => 4,
        Level::Error => 5,
    }
}

pub(crate) fn level_from_wire(value: i32) -> Result<Level, DecodeError> {
    match value {
        1 => Ok(Level::Trace),
        2 => Ok(Level::Debug),
        3 => Ok(Level::Info),
        4 => Ok(Level::Warn),
        5 => Ok(Level::Error),
        other => Err(DecodeError::binary(format!("unknown level {}", other))),
    }
}

fn string_map(map: &BTreeMap<String, String>) -> StringMapProto {
    StringMapProto {
        entries: map.clone(),
    }
}

impl From<&EventMessage> for MessageProto {
    fn from(message: &EventMessage) -> Self {
        Self {
            pattern: message.pattern.clone(),
            arguments: message.arguments.as_ref().map(|args| ArgumentListProto {
                arguments: args
                    .iter()
                    .map(|value| ArgumentProto {
                        value: value.clone(),
                    })
                    .collect(),
            }),
        }
    }
}

impl From<MessageProto> for EventMessage {
    fn from(proto: MessageProto) -> Self {
        Self {
            pattern: proto.pattern,
            arguments: proto
                .arguments
                .map(|list| list.arguments.into_iter().map(|arg| arg.value).collect()),
        }
    }
}

impl From<&ThreadInfo> for ThreadInfoProto {
    fn from(info: &ThreadInfo) -> Self {
        Self {
            name: info.name.clone(),
            id: info.id,
            group_name: info.group_name.clone(),
            group_id: info.group_id,
            priority: info.priority,
        }
    }
}

impl From<ThreadInfoProto> for ThreadInfo {
    fn from(proto: ThreadInfoProto) -> Self {
        Self {
            name: proto.name,
            id: proto.id,
            group_name: proto.group_name,
            group_id: proto.group_id,
            priority: proto.priority,
        }
    }
}

impl From<&StackFrame> for StackFrameProto {
    fn from(frame: &StackFrame) -> Self {
        Self {
            declaring_class: frame.declaring_class.clone(),
            method_name: frame.method_name.clone(),
            file_name: frame.file_name.clone(),
            line_number: frame.line_number,
            code_location: frame.code_location.clone(),
            version: frame.version.clone(),
            exact: frame.exact,
        }
    }
}

impl From<StackFrameProto> for StackFrame {
    fn from(proto: StackFrameProto) -> Self {
        Self {
            declaring_class: proto.declaring_class,
            method_name: proto.method_name,
            file_name: proto.file_name,
            line_number: proto.line_number,
            code_location: proto.code_location,
            version: proto.version,
            exact: proto.exact,
        }
    }
}

fn stack_trace(frames: &[StackFrame]) -> StackTraceProto {
    StackTraceProto {
        frames: frames.iter().map(StackFrameProto::from).collect(),
    }
}

fn frames_from(proto: StackTraceProto) -> Vec<StackFrame> {
    proto.frames.into_iter().map(StackFrame::from).collect()
}

impl From<&ThrowableInfo> for ThrowableProto {
    fn from(throwable: &ThrowableInfo) -> Self {
        Self {
            name: throwable.name.clone(),
            message: throwable.message.clone(),
            stack_trace: throwable.stack_trace.as_deref().map(stack_trace),
            omitted_elements: throwable.omitted_elements,
            cause: throwable
                .cause
                .as_deref()
                .map(|cause| Box::new(ThrowableProto::from(cause))),
            suppressed: throwable
                .suppressed
                .as_ref()
                .map(|list| ThrowableListProto {
                    throwables: list.iter().map(ThrowableProto::from).collect(),
                }),
        }
    }
}

impl From<ThrowableProto> for ThrowableInfo {
    fn from(proto: ThrowableProto) -> Self {
        Self {
            name: proto.name,
            message: proto.message,
            stack_trace: proto.stack_trace.map(frames_from),
            omitted_elements: proto.omitted_elements,
            cause: proto.cause.map(|cause| Box::new(ThrowableInfo::from(*cause))),
            suppressed: proto
                .suppressed
                .map(|list| list.throwables.into_iter().map(ThrowableInfo::from).collect()),
        }
    }
}

impl From<&LoggerContext> for LoggerContextProto {
    fn from(context: &LoggerContext) -> Self {
        Self {
            name: context.name.clone(),
            birth_time: context.birth_time,
            properties: context.properties.as_ref().map(string_map),
        }
    }
}

impl From<LoggerContextProto> for LoggerContext {
    fn from(proto: LoggerContextProto) -> Self {
        Self {
            name: proto.name,
            birth_time: proto.birth_time,
            properties: proto.properties.map(|map| map.entries),
        }
    }
}

impl From<&LoggingEvent> for LoggingEventProto {
    fn from(event: &LoggingEvent) -> Self {
        Self {
            logger: event.logger.clone(),
            level: event.level.map(level_to_wire),
            timestamp: event.timestamp,
            sequence_number: event.sequence_number,
            message: event.message.as_ref().map(MessageProto::from),
            thread_info: event.thread_info.as_ref().map(ThreadInfoProto::from),
            mdc: event.mdc.as_ref().map(string_map),
            ndc: event.ndc.as_ref().map(|ndc| MessageListProto {
                messages: ndc.iter().map(MessageProto::from).collect(),
            }),
            call_stack: event.call_stack.as_deref().map(stack_trace),
            throwable: event.throwable.as_ref().map(ThrowableProto::from),
            logger_context: event.logger_context.as_ref().map(LoggerContextProto::from),
            version: WIRE_VERSION,
        }
    }
}

impl TryFrom<LoggingEventProto> for LoggingEvent {
    type Error = DecodeError;

    fn try_from(proto: LoggingEventProto) -> Result<Self, Self::Error> {
        check_version(proto.version)?;
        Ok(Self {
            logger: proto.logger,
            level: proto.level.map(level_from_wire).transpose()?,
            timestamp: proto.timestamp,
            sequence_number: proto.sequence_number,
            message: proto.message.map(EventMessage::from),
            thread_info: proto.thread_info.map(ThreadInfo::from),
            mdc: proto.mdc.map(|map| map.entries),
            ndc: proto
                .ndc
                .map(|list| list.messages.into_iter().map(EventMessage::from).collect()),
            call_stack: proto.call_stack.map(frames_from),
            throwable: proto.throwable.map(ThrowableInfo::from),
            logger_context: proto.logger_context.map(LoggerContext::from),
        })
    }
}

impl From<&AccessEvent> for AccessEventProto {
    fn from(event: &AccessEvent) -> Self {
        Self {
            timestamp: event.timestamp,
            elapsed_time: event.elapsed_time,
            method: event.method.clone(),
            protocol: event.protocol.clone(),
            remote_address: event.remote_address.clone(),
            remote_host: event.remote_host.clone(),
            remote_user: event.remote_user.clone(),
            request_uri: event.request_uri.clone(),
            request_url: event.request_url.clone(),
            server_name: event.server_name.clone(),
            local_port: event.local_port,
            status_code: event.status_code,
            request_headers: event.request_headers.as_ref().map(string_map),
            response_headers: event.response_headers.as_ref().map(string_map),
            request_parameters: event.request_parameters.as_ref().map(|params| {
                ParameterMapProto {
                    entries: params
                        .iter()
                        .map(|(key, values)| {
                            (
                                key.clone(),
                                StringListProto {
                                    values: values.clone(),
                                },
                            )
                        })
                        .collect(),
                }
            }),
            logger_context: event.logger_context.as_ref().map(LoggerContextProto::from),
            version: WIRE_VERSION,
        }
    }
}

impl TryFrom<AccessEventProto> for AccessEvent {
    type Error = DecodeError;

    fn try_from(proto: AccessEventProto) -> Result<Self, Self::Error> {
        check_version(proto.version)?;
        Ok(Self {
            timestamp: proto.timestamp,
            elapsed_time: proto.elapsed_time,
            method: proto.method,
            protocol: proto.protocol,
            remote_address: proto.remote_address,
            remote_host: proto.remote_host,
            remote_user: proto.remote_user,
            request_uri: proto.request_uri,
            request_url: proto.request_url,
            server_name: proto.server_name,
            local_port: proto.local_port,
            status_code: proto.status_code,
            request_headers: proto.request_headers.map(|map| map.entries),
            response_headers: proto.response_headers.map(|map| map.entries),
            request_parameters: proto.request_parameters.map(|params| {
                params
                    .entries
                    .into_iter()
                    .map(|(key, list)| (key, list.values))
                    .collect()
            }),
            logger_context: proto.logger_context.map(LoggerContext::from),
        })
    }
}
