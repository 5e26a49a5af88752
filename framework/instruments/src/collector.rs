use std::time::Duration;

use anyhow::Context;
use query_harness_core::prelude::SubmissionError;
use query_harness_summary_model::{Measurement, RunRecord};
use serde::Serialize;
use serde_json::Value;

/// Submits run and measurement records to a remote collector.
///
/// The collector exposes `POST {base_url}/store/<data type>`. Every request must be answered with
/// HTTP 200 and a non-empty JSON body, anything else is a [SubmissionError].
pub struct CollectorClient {
    base_url: String,
    agent: ureq::Agent,
}

impl CollectorClient {
    pub fn new(base_url: &str) -> Self {
        let agent = ureq::config::Config::builder()
            .timeout_global(Some(Duration::from_secs(60)))
            .http_status_as_error(false)
            .build()
            .new_agent();

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent,
        }
    }

    /// Store the run record and return the identifier the collector assigned to it.
    pub fn submit_run(&self, run: &RunRecord) -> anyhow::Result<Value> {
        let response = self.send("run", &[run.to_payload()])?;
        match response {
            Value::Array(mut items) => Ok(items.swap_remove(0)),
            other => Ok(other),
        }
    }

    /// Tag every measurement with `run_id` and store them as a single batch.
    pub fn submit_measurements(
        &self,
        run_id: &Value,
        measurements: &mut [Measurement],
    ) -> anyhow::Result<Value> {
        for measurement in measurements.iter_mut() {
            measurement.set_run(run_id.clone());
        }

        self.send("measurement", &*measurements)
    }

    fn send<P: Serialize + ?Sized>(&self, data_type: &str, payload: &P) -> anyhow::Result<Value> {
        let url = format!("{}/store/{}", self.base_url, data_type);
        log::info!("Sending '{data_type}' data to storage at '{}'", self.base_url);
        if log::log_enabled!(log::Level::Debug) {
            log::debug!(
                "Sending payload:\n{}",
                serde_json::to_string_pretty(payload).unwrap_or_default()
            );
        }

        let mut response = self
            .agent
            .post(&url)
            .send_json(payload)
            .with_context(|| format!("Failed to send '{data_type}' data to '{url}'"))?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(SubmissionError::new(format!(
                "Unable to send '{data_type}' data, storage responded with status {status}"
            ))
            .into());
        }

        let body = response
            .body_mut()
            .read_to_string()
            .with_context(|| format!("Failed to read storage response for '{data_type}' data"))?;
        log::debug!("Storage server response:\n{body}");

        let parsed: Value = serde_json::from_str(&body).map_err(|e| {
            SubmissionError::new(format!(
                "Invalid storage server response for '{data_type}' data: {e}"
            ))
        })?;

        if is_empty_response(&parsed) {
            return Err(SubmissionError::new(format!(
                "Invalid storage server response for '{data_type}' data: empty body"
            ))
            .into());
        }

        Ok(parsed)
    }
}

fn is_empty_response(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}
