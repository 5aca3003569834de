use std::time::Duration;

use async_trait::async_trait;
use dictum_application::SchemaProvider;
use dictum_core::{AppError, AppResult};
use dictum_domain::{DictionaryDefinition, SchemaDefinition};
use serde::Deserialize;
use tracing::warn;
use url::Url;

/// Schema service client fetching dictionary versions over HTTP.
pub struct HttpSchemaProvider {
    http_client: reqwest::Client,
    base_url: Url,
    max_attempts: u8,
    retry_backoff_ms: u64,
}

#[derive(Debug, Deserialize)]
struct DictionaryPayload {
    name: String,
    version: String,
    #[serde(default)]
    schemas: Vec<SchemaDefinition>,
}

impl HttpSchemaProvider {
    /// Creates a provider for the schema service at `base_url`.
    #[must_use]
    pub fn new(
        http_client: reqwest::Client,
        base_url: Url,
        max_attempts: u8,
        retry_backoff_ms: u64,
    ) -> Self {
        Self {
            http_client,
            base_url,
            max_attempts: max_attempts.max(1),
            retry_backoff_ms: retry_backoff_ms.max(50),
        }
    }

    fn dictionary_url(&self, name: &str, version: &str) -> AppResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                AppError::Internal(format!(
                    "schema service url '{}' cannot carry a path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(["dictionaries", "name", name, "version", version]);

        Ok(url)
    }
}

fn parse_dictionary(body: &str, name: &str, version: &str) -> AppResult<DictionaryDefinition> {
    let payload: DictionaryPayload = serde_json::from_str(body).map_err(|error| {
        AppError::Parse(format!(
            "schema service returned a malformed dictionary '{name}' version '{version}': {error}"
        ))
    })?;

    DictionaryDefinition::new(payload.name, payload.version, payload.schemas)
}

#[async_trait]
impl SchemaProvider for HttpSchemaProvider {
    async fn fetch_dictionary(&self, name: &str, version: &str) -> AppResult<DictionaryDefinition> {
        let url = self.dictionary_url(name, version)?;
        let mut attempt = 0_u8;
        let mut last_error: Option<String> = None;

        while attempt < self.max_attempts {
            attempt = attempt.saturating_add(1);
            let response = self.http_client.get(url.clone()).send().await;

            match response {
                Ok(response) if response.status().is_success() => {
                    let body = response.text().await.map_err(|error| {
                        AppError::ServiceUnavailable(format!(
                            "failed to read dictionary '{name}' version '{version}': {error}"
                        ))
                    })?;
                    return parse_dictionary(body.as_str(), name, version);
                }
                Ok(response) if response.status() == reqwest::StatusCode::NOT_FOUND => {
                    return Err(AppError::NotFound(format!(
                        "dictionary '{name}' version '{version}' does not exist in the schema service"
                    )));
                }
                Ok(response)
                    if response.status().is_server_error()
                        || response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS =>
                {
                    last_error = Some(format!(
                        "transient HTTP status {} fetching dictionary '{name}' version '{version}'",
                        response.status()
                    ));
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "<response body unavailable>".to_owned());
                    return Err(AppError::Validation(format!(
                        "schema service rejected dictionary '{name}' version '{version}' with status {status}: {body}"
                    )));
                }
                Err(error) => {
                    last_error = Some(format!("schema service transport error: {error}"));
                }
            }

            if attempt < self.max_attempts {
                warn!(
                    attempt,
                    max_attempts = self.max_attempts,
                    dictionary = name,
                    version,
                    "retrying schema service request"
                );
                let delay = self.retry_backoff_ms.saturating_mul(u64::from(attempt));
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }

        Err(AppError::ServiceUnavailable(last_error.unwrap_or_else(|| {
            "schema service request exhausted retries".to_owned()
        })))
    }
}

#[cfg(test)]
mod tests {
    use dictum_application::SchemaProvider;
    use dictum_core::AppError;
    use url::Url;

    use super::{HttpSchemaProvider, parse_dictionary};

    fn provider(base_url: &str) -> HttpSchemaProvider {
        HttpSchemaProvider::new(
            reqwest::Client::new(),
            Url::parse(base_url).unwrap_or_else(|_| unreachable!()),
            2,
            50,
        )
    }

    #[test]
    fn dictionary_url_appends_path_segments() {
        let provider = provider("http://schemas.local/lectern/");

        let url = provider.dictionary_url("hr dictionary", "1.2");

        assert_eq!(
            url.ok().map(String::from).as_deref(),
            Some("http://schemas.local/lectern/dictionaries/name/hr%20dictionary/version/1.2")
        );
    }

    #[test]
    fn payload_is_checked_for_consistency() {
        let body = r#"{
            "_id": "abc",
            "name": "hr",
            "version": "1.0",
            "schemas": [
                {"name": "person", "fields": [{"name": "personId", "valueType": "string"}]},
                {"name": "person", "fields": []}
            ]
        }"#;

        assert!(matches!(
            parse_dictionary(body, "hr", "1.0"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            parse_dictionary("not json", "hr", "1.0"),
            Err(AppError::Parse(_))
        ));
    }

    #[test]
    fn payload_parses_schemas() {
        let body = r#"{
            "name": "hr",
            "version": "1.0",
            "schemas": [
                {
                    "name": "person",
                    "fields": [
                        {"name": "personId", "valueType": "string", "restrictions": {"required": true}}
                    ],
                    "restrictions": {"uniqueKey": ["personId"]}
                }
            ]
        }"#;

        let parsed = parse_dictionary(body, "hr", "1.0");
        let Ok(parsed) = parsed else {
            panic!("dictionary should parse");
        };
        let Some(person) = parsed.schema("person") else {
            panic!("person schema should exist");
        };
        assert_eq!(person.restrictions.unique_key, vec!["personId".to_owned()]);
        assert!(
            person
                .field("personId")
                .is_some_and(|field| field.restrictions.required)
        );
    }

    #[tokio::test]
    async fn unreachable_service_is_unavailable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0");
        let Ok(listener) = listener else {
            return;
        };
        let port = listener.local_addr().map(|address| address.port());
        drop(listener);
        let Ok(port) = port else {
            return;
        };

        let result = provider(format!("http://127.0.0.1:{port}/").as_str())
            .fetch_dictionary("hr", "1.0")
            .await;

        assert!(matches!(result, Err(AppError::ServiceUnavailable(_))));
    }
}
