// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::StatusCode;

/// Errors returned to the code submitting events.
///
/// Delivery failures never show up here: once a batch is enqueued the caller
/// has moved on, so those go to the failure callback and the logs instead.
#[derive(Debug, thiserror::Error)]
pub enum HecError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to serialize event: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Collector is not running")]
    NotRunning,

    #[error("No tokio runtime to spawn workers on")]
    NoRuntime,
}

/// Why the transport gave up on a request.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to send request after {attempts} attempts: {status}")]
    RetriesExhausted { status: StatusCode, attempts: u32 },

    #[error("Network error after {attempts} attempts: {source}")]
    Network {
        #[source]
        source: reqwest::Error,
        attempts: u32,
    },
}

impl TransportError {
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::RetriesExhausted { attempts, .. } | Self::Network { attempts, .. } => *attempts,
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::RetriesExhausted { status, .. } => Some(*status),
            Self::Network { source, .. } => source.status(),
        }
    }
}
