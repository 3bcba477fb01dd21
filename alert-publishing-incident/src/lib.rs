//! REST client for an incident-management platform (PagerDuty/Opsgenie-shaped),
//! implementing [`alert_publishing::incident_sink::IncidentClient`] so the sink
//! lifecycle adapter in the core crate can drive create/update/resolve over the wire.

use std::collections::HashMap;
use std::time::Duration;

use alert_publishing::classifier::classify_status;
use alert_publishing::error::PublishingError;
use alert_publishing::format::{Formatter, IncidentPlatformFormatter};
use alert_publishing::incident_sink::IncidentClient;
use alert_publishing::model::{EnrichedAlert, ErrorKind};
use async_trait::async_trait;
use serde::Deserialize;

#[derive(Deserialize)]
struct CreateResponse {
    id: String,
}

/// Talks to an incident platform's REST API: `POST /incidents` to create,
/// `PATCH /incidents/{id}` to update, `POST /incidents/{id}/resolve` to resolve.
#[derive(Clone)]
pub struct HttpIncidentClient {
    base_url: String,
    headers: HashMap<String, String>,
    client: reqwest::Client,
}

impl HttpIncidentClient {
    pub fn new(base_url: impl Into<String>, headers: HashMap<String, String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client config is static and infallible to build");
        Self { base_url: base_url.into(), headers, client }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.request(method, format!("{}{path}", self.base_url));
        for (key, value) in &self.headers {
            req = req.header(key.as_str(), value.as_str());
        }
        req
    }

    async fn classify_response(
        response: reqwest::Response,
        context: &str,
    ) -> Result<reqwest::Response, PublishingError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = format!("{context}: {status} {body}");
        match status.as_u16() {
            404 => Err(PublishingError::NotFound(message)),
            409 => Err(PublishingError::Conflict(message)),
            code => match classify_status(code) {
                ErrorKind::Transient => Err(PublishingError::Transient(message)),
                _ => Err(PublishingError::Permanent(message)),
            },
        }
    }
}

#[async_trait]
impl IncidentClient for HttpIncidentClient {
    async fn create(&self, alert: &EnrichedAlert) -> Result<String, PublishingError> {
        let payload = IncidentPlatformFormatter.format(alert)?;
        let response = self
            .request(reqwest::Method::POST, "/incidents")
            .json(&payload)
            .send()
            .await
            .map_err(|e| PublishingError::Transient(format!("incident create: {e}")))?;
        let response = Self::classify_response(response, "incident create").await?;
        let parsed: CreateResponse = response
            .json()
            .await
            .map_err(|e| PublishingError::Permanent(format!("incident create: malformed response: {e}")))?;
        tracing::debug!(fingerprint = %alert.fingerprint, incident_id = %parsed.id, "incident created");
        Ok(parsed.id)
    }

    async fn update(&self, incident_id: &str, alert: &EnrichedAlert) -> Result<(), PublishingError> {
        let payload = IncidentPlatformFormatter.format(alert)?;
        let response = self
            .request(reqwest::Method::PATCH, &format!("/incidents/{incident_id}"))
            .json(&payload)
            .send()
            .await
            .map_err(|e| PublishingError::Transient(format!("incident update: {e}")))?;
        Self::classify_response(response, "incident update").await?;
        tracing::debug!(fingerprint = %alert.fingerprint, incident_id, "incident updated");
        Ok(())
    }

    async fn resolve(&self, incident_id: &str) -> Result<(), PublishingError> {
        let response = self
            .request(reqwest::Method::POST, &format!("/incidents/{incident_id}/resolve"))
            .send()
            .await
            .map_err(|e| PublishingError::Transient(format!("incident resolve: {e}")))?;
        Self::classify_response(response, "incident resolve").await?;
        tracing::debug!(incident_id, "incident resolved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_does_not_panic() {
        let _client = HttpIncidentClient::new("https://incidents.example.invalid", HashMap::new());
    }
}
