//! Generic HTTP POST sink for `alert-publishing`'s webhook, paging, and chat target
//! types. The format registry already shapes the payload for each target type; this
//! crate's only job is to ship the resulting JSON body to the target's URL with its
//! configured headers, the way `ninelives-nats`/`ninelives-kafka` ship an already-built
//! `PolicyEvent` over their respective wire — one small sink crate per transport, not
//! per payload shape.

use std::collections::HashMap;
use std::time::Duration;

use alert_publishing::classifier::classify_status;
use alert_publishing::error::PublishingError;
use alert_publishing::model::ErrorKind;
use alert_publishing::sink::Sink;
use async_trait::async_trait;
use serde_json::Value;

/// Ships a formatted alert payload to one target's URL via HTTP POST.
#[derive(Clone)]
pub struct HttpSink {
    name: String,
    url: String,
    headers: HashMap<String, String>,
    client: reqwest::Client,
}

impl HttpSink {
    pub fn new(name: impl Into<String>, url: impl Into<String>, headers: HashMap<String, String>) -> Self {
        Self::with_timeout(name, url, headers, Duration::from_secs(10))
    }

    pub fn with_timeout(
        name: impl Into<String>,
        url: impl Into<String>,
        headers: HashMap<String, String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client config is static and infallible to build");
        Self { name: name.into(), url: url.into(), headers, client }
    }
}

#[async_trait]
impl Sink for HttpSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, payload: Value) -> Result<(), PublishingError> {
        let mut request = self.client.post(&self.url).json(&payload);
        for (key, value) in &self.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                PublishingError::Timeout { elapsed: Duration::default(), limit: Duration::default() }
            } else {
                PublishingError::Transient(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let message = format!("{} responded {status}: {body}", self.name);
        match classify_status(status.as_u16()) {
            ErrorKind::Transient => Err(PublishingError::Transient(message)),
            _ => Err(PublishingError::Permanent(message)),
        }
    }
}
