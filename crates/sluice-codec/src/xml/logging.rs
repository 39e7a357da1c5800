//! XML shape of [`LoggingEvent`]

use std::collections::BTreeMap;

use sluice_core::{
    DecodeError, EncodeError, Level, LoggerContext, LoggingEvent, Message, StackFrame, ThreadInfo,
    ThrowableInfo,
};

use super::node::{Node, XmlWriter, attrs};

pub(crate) const ROOT: &str = "LoggingEvent";

// ============================================================================
// Writing
// ============================================================================

pub(crate) fn write_event(w: &mut XmlWriter, event: &LoggingEvent) -> Result<(), EncodeError> {
    let root_attrs = attrs([
        ("logger", event.logger.clone()),
        ("level", event.level.map(|l| l.to_string())),
        ("timestamp", event.timestamp.map(|t| t.to_string())),
        ("sequenceNumber", event.sequence_number.map(|s| s.to_string())),
    ]);
    w.start(ROOT, &root_attrs)?;

    if let Some(message) = &event.message {
        write_message(w, message)?;
    }
    if let Some(info) = &event.thread_info {
        let info_attrs = attrs([
            ("name", info.name.clone()),
            ("id", info.id.map(|v| v.to_string())),
            ("groupName", info.group_name.clone()),
            ("groupId", info.group_id.map(|v| v.to_string())),
            ("priority", info.priority.map(|v| v.to_string())),
        ]);
        w.empty("threadInfo", &info_attrs)?;
    }
    if let Some(mdc) = &event.mdc {
        write_map(w, "mdc", mdc)?;
    }
    if let Some(ndc) = &event.ndc {
        w.start("ndc", &[])?;
        for message in ndc {
            write_message(w, message)?;
        }
        w.end("ndc")?;
    }
    if let Some(frames) = &event.call_stack {
        write_frames(w, "callStack", frames)?;
    }
    if let Some(throwable) = &event.throwable {
        write_throwable(w, "throwable", throwable)?;
    }
    if let Some(context) = &event.logger_context {
        write_logger_context(w, context)?;
    }

    w.end(ROOT)
}

fn write_message(w: &mut XmlWriter, message: &Message) -> Result<(), EncodeError> {
    w.start("message", &[])?;
    if let Some(pattern) = &message.pattern {
        w.text_element("pattern", &[], pattern)?;
    }
    if let Some(arguments) = &message.arguments {
        w.start("arguments", &[])?;
        for argument in arguments {
            match argument {
                Some(value) => w.text_element("argument", &[], value)?,
                None => w.empty("argument", &[("null", "true".to_string())])?,
            }
        }
        w.end("arguments")?;
    }
    w.end("message")
}

pub(crate) fn write_map(
    w: &mut XmlWriter,
    name: &str,
    map: &BTreeMap<String, String>,
) -> Result<(), EncodeError> {
    w.start(name, &[])?;
    for (key, value) in map {
        w.text_element("entry", &[("key", key.clone())], value)?;
    }
    w.end(name)
}

fn write_frames(w: &mut XmlWriter, name: &str, frames: &[StackFrame]) -> Result<(), EncodeError> {
    w.start(name, &[])?;
    for frame in frames {
        let mut frame_attrs = attrs([
            ("class", frame.declaring_class.clone()),
            ("method", frame.method_name.clone()),
            ("file", frame.file_name.clone()),
            ("line", frame.line_number.map(|v| v.to_string())),
            ("codeLocation", frame.code_location.clone()),
            ("version", frame.version.clone()),
        ]);
        if frame.exact {
            frame_attrs.push(("exact", "true".to_string()));
        }
        w.empty("frame", &frame_attrs)?;
    }
    w.end(name)
}

fn write_throwable(w: &mut XmlWriter, name: &str, throwable: &ThrowableInfo) -> Result<(), EncodeError> {
    let mut throwable_attrs = attrs([("name", throwable.name.clone())]);
    if throwable.omitted_elements > 0 {
        throwable_attrs.push(("omitted", throwable.omitted_elements.to_string()));
    }
    w.start(name, &throwable_attrs)?;
    if let Some(message) = &throwable.message {
        w.text_element("message", &[], message)?;
    }
    if let Some(frames) = &throwable.stack_trace {
        write_frames(w, "stackTrace", frames)?;
    }
    if let Some(cause) = &throwable.cause {
        write_throwable(w, "cause", cause)?;
    }
    if let Some(suppressed) = &throwable.suppressed {
        w.start("suppressed", &[])?;
        for sibling in suppressed {
            write_throwable(w, "throwable", sibling)?;
        }
        w.end("suppressed")?;
    }
    w.end(name)
}

pub(crate) fn write_logger_context(
    w: &mut XmlWriter,
    context: &LoggerContext,
) -> Result<(), EncodeError> {
    let context_attrs = attrs([
        ("name", context.name.clone()),
        ("birthTime", context.birth_time.map(|v| v.to_string())),
    ]);
    w.start("loggerContext", &context_attrs)?;
    if let Some(properties) = &context.properties {
        write_map(w, "properties", properties)?;
    }
    w.end("loggerContext")
}

// ============================================================================
// Reading
// ============================================================================

pub(crate) fn read_event(node: &Node) -> Result<LoggingEvent, DecodeError> {
    node.expect_name(ROOT)?;

    let level = node
        .attr("level")
        .map(|raw| {
            raw.parse::<Level>()
                .map_err(|_| DecodeError::xml(format!("unknown level {:?}", raw)))
        })
        .transpose()?;

    Ok(LoggingEvent {
        logger: node.attr_string("logger"),
        level,
        timestamp: node.attr_parsed("timestamp")?,
        sequence_number: node.attr_parsed("sequenceNumber")?,
        message: node.child("message").map(read_message),
        thread_info: node.child("threadInfo").map(read_thread_info).transpose()?,
        mdc: node.child("mdc").map(read_map).transpose()?,
        ndc: node
            .child("ndc")
            .map(|ndc| ndc.children_named("message").map(read_message).collect()),
        call_stack: node.child("callStack").map(read_frames).transpose()?,
        throwable: node.child("throwable").map(read_throwable).transpose()?,
        logger_context: node
            .child("loggerContext")
            .map(read_logger_context)
            .transpose()?,
    })
}

fn read_message(node: &Node) -> Message {
    Message {
        pattern: node.child_text("pattern"),
        arguments: node.child("arguments").map(|args| {
            args.children_named("argument")
                .map(|arg| match arg.attr("null") {
                    Some("true") => None,
                    _ => Some(arg.text.clone()),
                })
                .collect()
        }),
    }
}

fn read_thread_info(node: &Node) -> Result<ThreadInfo, DecodeError> {
    Ok(ThreadInfo {
        name: node.attr_string("name"),
        id: node.attr_parsed("id")?,
        group_name: node.attr_string("groupName"),
        group_id: node.attr_parsed("groupId")?,
        priority: node.attr_parsed("priority")?,
    })
}

pub(crate) fn read_map(node: &Node) -> Result<BTreeMap<String, String>, DecodeError> {
    node.children_named("entry")
        .map(|entry| {
            let key = entry
                .attr_string("key")
                .ok_or_else(|| DecodeError::xml(format!("<entry> in <{}> without key", node.name)))?;
            Ok((key, entry.text.clone()))
        })
        .collect()
}

fn read_frames(node: &Node) -> Result<Vec<StackFrame>, DecodeError> {
    node.children_named("frame")
        .map(|frame| {
            Ok(StackFrame {
                declaring_class: frame.attr_string("class"),
                method_name: frame.attr_string("method"),
                file_name: frame.attr_string("file"),
                line_number: frame.attr_parsed("line")?,
                code_location: frame.attr_string("codeLocation"),
                version: frame.attr_string("version"),
                exact: frame.attr("exact") == Some("true"),
            })
        })
        .collect()
}

fn read_throwable(node: &Node) -> Result<ThrowableInfo, DecodeError> {
    Ok(ThrowableInfo {
        name: node.attr_string("name"),
        message: node.child_text("message"),
        stack_trace: node.child("stackTrace").map(read_frames).transpose()?,
        omitted_elements: node.attr_parsed("omitted")?.unwrap_or(0),
        cause: node
            .child("cause")
            .map(|cause| read_throwable(cause).map(Box::new))
            .transpose()?,
        suppressed: node
            .child("suppressed")
            .map(|list| {
                list.children_named("throwable")
                    .map(read_throwable)
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?,
    })
}

pub(crate) fn read_logger_context(node: &Node) -> Result<LoggerContext, DecodeError> {
    Ok(LoggerContext {
        name: node.attr_string("name"),
        birth_time: node.attr_parsed("birthTime")?,
        properties: node.child("properties").map(read_map).transpose()?,
    })
}
