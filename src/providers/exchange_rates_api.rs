use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::core::provider::{ProviderError, RateProvider, RateTable, SymbolTable, normalize_code};

/// Client for the exchangeratesapi.io v1 endpoints: a symbol listing and a
/// latest-rates listing anchored to a configurable base currency.
pub struct ExchangeRatesApiProvider {
    base_url: String,
    access_key: String,
    client: reqwest::Client,
}

impl ExchangeRatesApiProvider {
    pub fn new(config: &ProviderConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("cambist/0.1")
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(ExchangeRatesApiProvider {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_key: config.access_key.clone(),
            client,
        })
    }

    /// Issues one GET and hands back the raw body, with transport-level
    /// failures and non-2xx statuses both reported as `Unavailable`.
    async fn get_text(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<String, ProviderError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("Requesting {}", url);

        let mut query = query.to_vec();
        query.push(("access_key", self.access_key.as_str()));

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("request error for {endpoint}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Unavailable(format!(
                "HTTP error: {status} for {endpoint}"
            )));
        }

        response
            .text()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("failed to read body for {endpoint}: {e}")))
    }
}

#[derive(Debug, Deserialize)]
struct SymbolsResponse {
    symbols: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    rates: HashMap<String, f64>,
}

fn validated_symbols(raw: HashMap<String, String>) -> Result<SymbolTable, ProviderError> {
    let mut symbols = SymbolTable::with_capacity(raw.len());
    for (code, name) in raw {
        let code = normalize_code(&code);
        if code.is_empty() {
            return Err(ProviderError::BadResponse(
                "symbol listing contains an empty currency code".to_string(),
            ));
        }
        symbols.insert(code, name);
    }
    Ok(symbols)
}

fn validated_rates(raw: HashMap<String, f64>) -> Result<RateTable, ProviderError> {
    let mut rates = RateTable::with_capacity(raw.len());
    for (code, rate) in raw {
        let code = normalize_code(&code);
        if code.is_empty() {
            return Err(ProviderError::BadResponse(
                "rate listing contains an empty currency code".to_string(),
            ));
        }
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ProviderError::BadResponse(format!(
                "rate for {code} is not a positive number: {rate}"
            )));
        }
        rates.insert(code, rate);
    }
    Ok(rates)
}

#[async_trait]
impl RateProvider for ExchangeRatesApiProvider {
    async fn fetch_symbols(&self) -> Result<SymbolTable, ProviderError> {
        let body = self.get_text("/v1/symbols", &[]).await?;

        let data: SymbolsResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::BadResponse(format!("failed to parse symbol listing: {e}"))
        })?;

        debug!("Fetched {} currency symbols", data.symbols.len());
        validated_symbols(data.symbols)
    }

    async fn fetch_rates(&self, anchor: &str) -> Result<RateTable, ProviderError> {
        let anchor = normalize_code(anchor);
        let body = self.get_text("/v1/latest", &[("base", anchor.as_str())]).await?;

        let data: LatestRatesResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::BadResponse(format!("failed to parse rate listing: {e}"))
        })?;

        debug!(anchor = %anchor, "Fetched {} rates", data.rates.len());
        validated_rates(data.rates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> ExchangeRatesApiProvider {
        ExchangeRatesApiProvider::new(&ProviderConfig {
            base_url: server.uri(),
            access_key: "test-key".to_string(),
            ..ProviderConfig::default()
        })
        .unwrap()
    }

    async fn mount_json(server: &MockServer, endpoint: &str, status: u16, body: &str) {
        Mock::given(method("GET"))
            .and(path(endpoint))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_successful_symbols_fetch() {
        let server = MockServer::start().await;
        let body = r#"{
            "success": true,
            "symbols": {
                "USD": "United States Dollar",
                "pkr": "Pakistani Rupee"
            }
        }"#;

        Mock::given(method("GET"))
            .and(path("/v1/symbols"))
            .and(query_param("access_key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let symbols = provider_for(&server).fetch_symbols().await.unwrap();
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols["USD"], "United States Dollar");
        // Codes are normalized on the way in.
        assert_eq!(symbols["PKR"], "Pakistani Rupee");
    }

    #[tokio::test]
    async fn test_successful_rates_fetch() {
        let server = MockServer::start().await;
        let body = r#"{
            "success": true,
            "base": "EUR",
            "rates": {"USD": 1.09, "PKR": 305.2, "EUR": 1.0}
        }"#;

        Mock::given(method("GET"))
            .and(path("/v1/latest"))
            .and(query_param("access_key", "test-key"))
            .and(query_param("base", "EUR"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let rates = provider_for(&server).fetch_rates("eur").await.unwrap();
        assert_eq!(rates.len(), 3);
        assert_eq!(rates["USD"], 1.09);
        assert_eq!(rates["EUR"], 1.0);
    }

    #[tokio::test]
    async fn test_http_error_is_unavailable() {
        let server = MockServer::start().await;
        mount_json(&server, "/v1/latest", 500, "Server Error").await;

        let result = provider_for(&server).fetch_rates("EUR").await;
        match result {
            Err(ProviderError::Unavailable(detail)) => {
                assert!(detail.contains("500"), "{detail}");
            }
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connection_refused_is_unavailable() {
        // Nothing listens on the mock server once it is dropped.
        let uri = {
            let server = MockServer::start().await;
            server.uri()
        };

        let provider = ExchangeRatesApiProvider::new(&ProviderConfig {
            base_url: uri,
            access_key: "test-key".to_string(),
            ..ProviderConfig::default()
        })
        .unwrap();

        let result = provider.fetch_symbols().await;
        assert!(matches!(result, Err(ProviderError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_malformed_payload_is_bad_response() {
        let server = MockServer::start().await;
        mount_json(&server, "/v1/symbols", 200, "not json at all").await;

        let result = provider_for(&server).fetch_symbols().await;
        match result {
            Err(ProviderError::BadResponse(detail)) => {
                assert!(detail.contains("failed to parse symbol listing"), "{detail}");
            }
            other => panic!("expected BadResponse, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_root_field_is_bad_response() {
        let server = MockServer::start().await;
        // "rate" instead of "rates"
        mount_json(&server, "/v1/latest", 200, r#"{"success": true, "rate": {}}"#).await;

        let result = provider_for(&server).fetch_rates("EUR").await;
        assert!(matches!(result, Err(ProviderError::BadResponse(_))));
    }

    #[tokio::test]
    async fn test_non_positive_rate_is_bad_response() {
        let server = MockServer::start().await;
        mount_json(
            &server,
            "/v1/latest",
            200,
            r#"{"success": true, "rates": {"USD": 1.09, "XAU": 0.0}}"#,
        )
        .await;

        let result = provider_for(&server).fetch_rates("EUR").await;
        match result {
            Err(ProviderError::BadResponse(detail)) => {
                assert!(detail.contains("XAU"), "{detail}");
            }
            other => panic!("expected BadResponse, got {other:?}"),
        }
    }
}
