// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Collector URI assembly.

use crate::config::InputType;
use crate::constants::{COLLECTOR_PATH, DEFAULT_HEC_PORT};
use uuid::Uuid;

/// Where the HTTP Event Collector lives.
///
/// Either a server/port pair from which the collector URI is derived, or a
/// fully-formed URI (`uri_override`) that is used verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HecEndpoint {
    pub server: String,
    pub port: u16,
    pub use_tls: bool,
    pub index: Option<String>,
    pub sourcetype: Option<String>,
    pub uri_override: Option<String>,
}

impl Default for HecEndpoint {
    fn default() -> Self {
        Self {
            server: String::new(),
            port: DEFAULT_HEC_PORT,
            use_tls: true,
            index: None,
            sourcetype: None,
            uri_override: None,
        }
    }
}

impl HecEndpoint {
    #[must_use]
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self {
            uri_override: Some(uri.into()),
            ..Default::default()
        }
    }

    /// Builds the collector URI for the given input type.
    ///
    /// Raw inputs need a channel identifier in the query string; a fresh one
    /// is generated on each call, so callers should build the URI once and
    /// keep it.
    #[must_use]
    pub fn server_uri(&self, input_type: InputType) -> String {
        if let Some(uri) = &self.uri_override {
            return uri.clone();
        }

        let scheme = if self.use_tls { "https" } else { "http" };
        let mut query: Vec<String> = Vec::new();
        let input_path = match input_type {
            InputType::Json => "/event",
            InputType::Raw => {
                query.push(format!("channel={}", Uuid::new_v4()));
                "/raw"
            }
        };
        if let Some(sourcetype) = self.sourcetype.as_deref().filter(|s| !s.is_empty()) {
            query.push(format!("sourcetype={sourcetype}"));
        }
        if let Some(index) = self.index.as_deref().filter(|s| !s.is_empty()) {
            query.push(format!("index={index}"));
        }

        let mut uri = format!(
            "{scheme}://{}:{}{COLLECTOR_PATH}{input_path}",
            self.server, self.port
        );
        if !query.is_empty() {
            uri.push('?');
            uri.push_str(&query.join("&"));
        }
        uri
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_uri_defaults() {
        let endpoint = HecEndpoint::new("splunk.example.com");
        assert_eq!(
            endpoint.server_uri(InputType::Json),
            "https://splunk.example.com:8088/services/collector/event"
        );
    }

    #[test]
    fn test_json_uri_plain_http_with_metadata() {
        let endpoint = HecEndpoint {
            server: "localhost".to_string(),
            port: 9088,
            use_tls: false,
            index: Some("main".to_string()),
            sourcetype: Some("access_combined".to_string()),
            uri_override: None,
        };
        assert_eq!(
            endpoint.server_uri(InputType::Json),
            "http://localhost:9088/services/collector/event?sourcetype=access_combined&index=main"
        );
    }

    #[test]
    fn test_empty_metadata_is_skipped() {
        let endpoint = HecEndpoint {
            index: Some(String::new()),
            ..HecEndpoint::new("localhost")
        };
        assert_eq!(
            endpoint.server_uri(InputType::Json),
            "https://localhost:8088/services/collector/event"
        );
    }

    #[test]
    fn test_raw_uri_has_channel() {
        let endpoint = HecEndpoint {
            index: Some("test".to_string()),
            ..HecEndpoint::new("localhost")
        };
        let uri = endpoint.server_uri(InputType::Raw);
        assert!(uri.starts_with("https://localhost:8088/services/collector/raw?channel="));
        assert!(uri.ends_with("&index=test"));

        let channel = uri
            .split("channel=")
            .nth(1)
            .and_then(|rest| rest.split('&').next())
            .unwrap();
        assert!(Uuid::parse_str(channel).is_ok());
    }

    #[test]
    fn test_uri_override_is_verbatim() {
        let endpoint = HecEndpoint::from_uri("http://127.0.0.1:1234/custom");
        assert_eq!(
            endpoint.server_uri(InputType::Raw),
            "http://127.0.0.1:1234/custom"
        );
    }
}
