// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Hostname detection for the `host` field of JSON events.

use std::env;
use tracing::warn;

/// Get the local hostname
///
/// 1. `HOSTNAME` environment variable
/// 2. System hostname (unix only)
/// 3. `"unknown"`
#[must_use]
pub fn get_hostname() -> String {
    if let Ok(hostname) = env::var("HOSTNAME") {
        if !hostname.is_empty() {
            return hostname;
        }
    }

    if let Some(hostname) = system_hostname() {
        return hostname;
    }

    warn!("HEC | Could not determine hostname, using 'unknown'");
    "unknown".to_string()
}

#[cfg(unix)]
fn system_hostname() -> Option<String> {
    match nix::unistd::gethostname() {
        Ok(hostname) => hostname
            .to_str()
            .filter(|h| !h.is_empty())
            .map(str::to_string),
        Err(e) => {
            warn!("HEC | Failed to get system hostname: {}", e);
            None
        }
    }
}

#[cfg(not(unix))]
fn system_hostname() -> Option<String> {
    env::var("COMPUTERNAME").ok().filter(|h| !h.is_empty())
}
