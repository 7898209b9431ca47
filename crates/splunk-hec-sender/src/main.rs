// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::env;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use serde_json::Value;
use splunk_hec::{HecConfig, HttpEventCollector, InputType, Payload};

#[tokio::main]
pub async fn main() {
    let log_level = env::var("SPLUNK_HEC_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let check_connectivity = env::var("SPLUNK_HEC_CHECK_CONNECTIVITY")
        .map(|val| val.to_lowercase() == "true")
        .unwrap_or(false);

    let config = match HecConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Error creating config on sender startup: {e}");
            return;
        }
    };
    let input_type = config.input_type;

    let mut collector = match HttpEventCollector::start(config) {
        Ok(c) => c,
        Err(e) => {
            error!("Error starting collector: {e}");
            return;
        }
    };

    if check_connectivity && !collector.check_connectivity().await {
        error!("Collector at {} is not reachable. Shutting down.", collector.server_uri());
        collector.stop().await;
        return;
    }

    let mut lines = BufReader::new(io::stdin()).lines();
    let mut submitted: u64 = 0;
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("Error reading stdin: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match collector
            .submit(line_to_payload(&line, input_type), None)
            .await
        {
            Ok(()) => submitted += 1,
            Err(e) => warn!("Skipping event: {e}"),
        }
    }

    debug!("End of input, flushing {} buffered events", collector.buffered_events());
    if let Err(e) = collector.flush_now().await {
        error!("Error flushing events: {e}");
    }

    let stats = collector.stats();
    info!(
        "Submitted {submitted} events: {} batches delivered, {} batches failed, {} retries",
        stats.batches_delivered, stats.batches_failed, stats.retries
    );
    collector.stop().await;
}

/// JSON lines that already carry an `event` member are sent as they are;
/// anything else becomes the event text.
fn line_to_payload(line: &str, input_type: InputType) -> Payload {
    if input_type == InputType::Json {
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(line) {
            if value.get("event").is_some() {
                return Payload::Json(value);
            }
        }
    }
    Payload::Raw(line.to_string())
}
