//! XML shape of [`AccessEvent`]

use sluice_core::{AccessEvent, DecodeError, EncodeError, ParameterMap};

use super::logging::{read_logger_context, read_map, write_logger_context, write_map};
use super::node::{Node, XmlWriter, attrs};

pub(crate) const ROOT: &str = "AccessEvent";

pub(crate) fn write_event(w: &mut XmlWriter, event: &AccessEvent) -> Result<(), EncodeError> {
    let root_attrs = attrs([
        ("timestamp", event.timestamp.map(|v| v.to_string())),
        ("elapsedTime", event.elapsed_time.map(|v| v.to_string())),
        ("method", event.method.clone()),
        ("protocol", event.protocol.clone()),
        ("remoteAddress", event.remote_address.clone()),
        ("remoteHost", event.remote_host.clone()),
        ("remoteUser", event.remote_user.clone()),
        ("serverName", event.server_name.clone()),
        ("localPort", event.local_port.map(|v| v.to_string())),
        ("statusCode", event.status_code.map(|v| v.to_string())),
    ]);
    w.start(ROOT, &root_attrs)?;

    if let Some(uri) = &event.request_uri {
        w.text_element("requestUri", &[], uri)?;
    }
    if let Some(url) = &event.request_url {
        w.text_element("requestUrl", &[], url)?;
    }
    if let Some(headers) = &event.request_headers {
        write_map(w, "requestHeaders", headers)?;
    }
    if let Some(headers) = &event.response_headers {
        write_map(w, "responseHeaders", headers)?;
    }
    if let Some(params) = &event.request_parameters {
        w.start("requestParameters", &[])?;
        for (name, values) in params {
            w.start("parameter", &[("name", name.clone())])?;
            for value in values {
                w.text_element("value", &[], value)?;
            }
            w.end("parameter")?;
        }
        w.end("requestParameters")?;
    }
    if let Some(context) = &event.logger_context {
        write_logger_context(w, context)?;
    }

    w.end(ROOT)
}

pub(crate) fn read_event(node: &Node) -> Result<AccessEvent, DecodeError> {
    node.expect_name(ROOT)?;

    Ok(AccessEvent {
        timestamp: node.attr_parsed("timestamp")?,
        elapsed_time: node.attr_parsed("elapsedTime")?,
        method: node.attr_string("method"),
        protocol: node.attr_string("protocol"),
        remote_address: node.attr_string("remoteAddress"),
        remote_host: node.attr_string("remoteHost"),
        remote_user: node.attr_string("remoteUser"),
        request_uri: node.child_text("requestUri"),
        request_url: node.child_text("requestUrl"),
        server_name: node.attr_string("serverName"),
        local_port: node.attr_parsed("localPort")?,
        status_code: node.attr_parsed("statusCode")?,
        request_headers: node.child("requestHeaders").map(read_map).transpose()?,
        response_headers: node.child("responseHeaders").map(read_map).transpose()?,
        request_parameters: node
            .child("requestParameters")
            .map(read_parameters)
            .transpose()?,
        logger_context: node
            .child("loggerContext")
            .map(read_logger_context)
            .transpose()?,
    })
}

fn read_parameters(node: &Node) -> Result<ParameterMap, DecodeError> {
    node.children_named("parameter")
        .map(|param| {
            let name = param
                .attr_string("name")
                .ok_or_else(|| DecodeError::xml("<parameter> without name"))?;
            let values = param
                .children_named("value")
                .map(|value| value.text.clone())
                .collect();
            Ok((name, values))
        })
        .collect()
}
