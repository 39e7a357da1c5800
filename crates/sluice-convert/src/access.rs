//! Servlet-style HTTP access records

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use sluice_core::{AccessEvent, HeaderMap, LoggerContext, ParameterMap};

use crate::converter::Converter;

/// An access record as a servlet container reports it
///
/// Headers and parameters are lists of pairs, so repeated names are allowed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpAccessRecord {
    pub timestamp: i64,
    #[serde(default)]
    pub elapsed_millis: Option<i64>,
    pub method: String,
    pub protocol: String,
    pub request_uri: String,
    #[serde(default)]
    pub query_string: Option<String>,
    #[serde(default)]
    pub remote_addr: Option<String>,
    #[serde(default)]
    pub remote_host: Option<String>,
    #[serde(default)]
    pub remote_user: Option<String>,
    #[serde(default)]
    pub server_name: Option<String>,
    #[serde(default)]
    pub local_port: Option<i32>,
    pub status: i32,
    #[serde(default)]
    pub request_headers: Vec<(String, String)>,
    #[serde(default)]
    pub response_headers: Vec<(String, String)>,
    #[serde(default)]
    pub parameters: Vec<(String, String)>,
    #[serde(default)]
    pub context_name: Option<String>,
}

impl HttpAccessRecord {
    /// First request line, e.g. `GET /index.html?x=1 HTTP/1.1`
    pub fn request_line(&self) -> String {
        match &self.query_string {
            Some(query) if !query.is_empty() => format!(
                "{} {}?{} {}",
                self.method, self.request_uri, query, self.protocol
            ),
            _ => format!("{} {} {}", self.method, self.request_uri, self.protocol),
        }
    }
}

/// Fold repeated headers into one comma-separated value
fn header_map(pairs: &[(String, String)]) -> HeaderMap {
    let mut map: HeaderMap = BTreeMap::new();
    for (name, value) in pairs {
        map.entry(name.clone())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.clone());
    }
    map
}

fn parameter_map(pairs: &[(String, String)]) -> ParameterMap {
    let mut map: ParameterMap = BTreeMap::new();
    for (name, value) in pairs {
        map.entry(name.clone()).or_default().push(value.clone());
    }
    map
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HttpAccessConverter;

impl Converter for HttpAccessConverter {
    type Foreign = HttpAccessRecord;
    type Canonical = AccessEvent;

    fn convert(&self, foreign: Option<&HttpAccessRecord>) -> Option<AccessEvent> {
        let record = foreign?;
        Some(AccessEvent {
            timestamp: Some(record.timestamp),
            elapsed_time: record.elapsed_millis,
            method: Some(record.method.clone()),
            protocol: Some(record.protocol.clone()),
            remote_address: record.remote_addr.clone(),
            remote_host: record.remote_host.clone(),
            remote_user: record.remote_user.clone(),
            request_uri: Some(record.request_uri.clone()),
            request_url: Some(record.request_line()),
            server_name: record.server_name.clone(),
            local_port: record.local_port,
            status_code: Some(record.status),
            request_headers: Some(header_map(&record.request_headers)),
            response_headers: Some(header_map(&record.response_headers)),
            request_parameters: Some(parameter_map(&record.parameters)),
            logger_context: record.context_name.as_ref().map(|name| LoggerContext {
                name: Some(name.clone()),
                ..Default::default()
            }),
        })
    }
}
