// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::config::HecConfig;
use core::time::Duration;
use std::error::Error;

/// Builds the reqwest client shared by every worker.
///
/// Uses rustls. Certificate verification follows `verify_tls`; it is off by
/// default because most collectors run with self-signed certificates.
pub fn build_client(config: &HecConfig) -> Result<reqwest::Client, Box<dyn Error>> {
    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .timeout(config.request_timeout)
        .pool_idle_timeout(Some(Duration::from_secs(270)))
        .tcp_keepalive(Some(Duration::from_secs(120)))
        .danger_accept_invalid_certs(!config.verify_tls);
    if let Some(proxy) = &config.https_proxy {
        builder = builder.proxy(reqwest::Proxy::https(proxy)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::HecEndpoint;

    #[test]
    fn test_build_client_defaults() {
        let config = HecConfig::new("token", HecEndpoint::new("localhost"));
        assert!(build_client(&config).is_ok());
    }

    #[test]
    fn test_build_client_with_proxy() {
        let config = HecConfig {
            https_proxy: Some("http://proxy.example.com:3128".to_string()),
            verify_tls: true,
            ..HecConfig::new("token", HecEndpoint::new("localhost"))
        };
        assert!(build_client(&config).is_ok());
    }

    #[test]
    fn test_build_client_rejects_bad_proxy() {
        let config = HecConfig {
            https_proxy: Some("not a url".to_string()),
            ..HecConfig::new("token", HecEndpoint::new("localhost"))
        };
        assert!(build_client(&config).is_err());
    }
}
