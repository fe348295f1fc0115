use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{AUTHORIZATION, REFERER};
use std::time::Duration;
use tracing::{debug, error, instrument};

use crate::core::rate::{ExchangeRateProvider, ExchangeRateResult, FetchError, RateQuery};

pub const DEFAULT_BASE_URL: &str = "https://api.apis.net.pe";
pub const REFERER_URL: &str = "https://apis.net.pe/tipo-de-cambio-sunat-api";
const ENDPOINT: &str = "/v1/tipo-cambio-sunat";

// SunatProvider implementation for ExchangeRateProvider
pub struct SunatProvider {
    base_url: String,
    timeout: Option<Duration>,
}

impl SunatProvider {
    pub fn new(base_url: &str) -> Self {
        SunatProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: None,
        }
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Self {
        SunatProvider {
            timeout: Some(timeout),
            ..Self::new(base_url)
        }
    }

    /// Full URL requested for `date`, with `fecha` as the only query parameter.
    pub fn request_url(&self, date: NaiveDate) -> String {
        format!(
            "{}{}?fecha={}",
            self.base_url,
            ENDPOINT,
            date.format("%Y-%m-%d")
        )
    }

    fn client(&self) -> Result<reqwest::Client, reqwest::Error> {
        let mut builder = reqwest::Client::builder().user_agent("tcsunat/0.1");
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        builder.build()
    }
}

impl Default for SunatProvider {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[async_trait]
impl ExchangeRateProvider for SunatProvider {
    #[instrument(
        name = "SunatRateFetch",
        skip(self, query),
        fields(date = %query.date)
    )]
    async fn get_exchange_rate(
        &self,
        query: &RateQuery,
    ) -> Result<ExchangeRateResult, FetchError> {
        let url = self.request_url(query.date);
        debug!("Requesting exchange rate from {}", url);

        let response = self
            .client()?
            .get(&url)
            .header(REFERER, REFERER_URL)
            .header(AUTHORIZATION, format!("Bearer {}", query.token))
            .send()
            .await?;

        let status = response.status();
        debug!(%status, "Received SUNAT response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, body = %body, "Exchange rate request rejected");
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        match serde_json::from_str::<ExchangeRateResult>(&text) {
            Ok(result) => Ok(result),
            Err(e) => {
                error!(
                    error = ?e,
                    response = %text,
                    "Failed to parse exchange rate response"
                );
                Err(FetchError::Decode(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TEST_TOKEN: &str = "apis-token-1.test";

    fn test_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 3, 7).unwrap()
    }

    async fn create_mock_server(response: ResponseTemplate) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(ENDPOINT))
            .and(query_param("fecha", "2023-03-07"))
            .and(header("Referer", REFERER_URL))
            .and(header("Authorization", format!("Bearer {TEST_TOKEN}").as_str()))
            .respond_with(response)
            .mount(&mock_server)
            .await;

        mock_server
    }

    #[test]
    fn test_request_url() {
        let provider = SunatProvider::default();
        assert_eq!(
            provider.request_url(test_date()),
            "https://api.apis.net.pe/v1/tipo-cambio-sunat?fecha=2023-03-07"
        );

        let provider = SunatProvider::new("http://localhost:8080/");
        assert_eq!(
            provider.request_url(NaiveDate::from_ymd_opt(2024, 1, 9).unwrap()),
            "http://localhost:8080/v1/tipo-cambio-sunat?fecha=2024-01-09"
        );
    }

    #[tokio::test]
    async fn test_successful_rate_fetch() {
        let body = json!({"moneda": "PEN", "compra": 3.75, "venta": 3.80});
        let mock_server =
            create_mock_server(ResponseTemplate::new(200).set_body_json(body.clone())).await;

        let provider = SunatProvider::new(&mock_server.uri());
        let query = RateQuery::new(test_date(), TEST_TOKEN);
        let result = provider.get_exchange_rate(&query).await.unwrap();

        assert_eq!(serde_json::to_value(&result).unwrap(), body);
        assert_eq!(result.buy(), Some(3.75));
        assert_eq!(result.sell(), Some(3.80));
    }

    #[tokio::test]
    async fn test_response_keys_keep_service_order() {
        let body = r#"{"venta":3.8,"compra":3.75,"origen":"SUNAT","moneda":"USD","fecha":"2023-03-07"}"#;
        let mock_server =
            create_mock_server(ResponseTemplate::new(200).set_body_string(body)).await;

        let provider = SunatProvider::new(&mock_server.uri());
        let result = provider
            .get_exchange_rate(&RateQuery::new(test_date(), TEST_TOKEN))
            .await
            .unwrap();

        let keys: Vec<&str> = result.as_map().keys().map(String::as_str).collect();
        assert_eq!(keys, ["venta", "compra", "origen", "moneda", "fecha"]);
        assert_eq!(serde_json::to_string(&result).unwrap(), body);
    }

    #[tokio::test]
    async fn test_request_carries_only_fecha_and_exact_token() {
        let token = "tok.en-With+Chars/=";
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&mock_server)
            .await;

        let provider = SunatProvider::new(&mock_server.uri());
        provider
            .get_exchange_rate(&RateQuery::new(test_date(), token))
            .await
            .unwrap();

        let requests = mock_server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.url.path(), ENDPOINT);
        assert_eq!(request.url.query(), Some("fecha=2023-03-07"));
        assert_eq!(
            request.headers.get("authorization").unwrap().to_str().unwrap(),
            format!("Bearer {token}")
        );
        assert_eq!(
            request.headers.get("referer").unwrap().to_str().unwrap(),
            REFERER_URL
        );
        assert!(request.body.is_empty());
    }

    #[tokio::test]
    async fn test_non_json_body_is_decode_error() {
        let mock_server =
            create_mock_server(ResponseTemplate::new(200).set_body_string("not found")).await;

        let provider = SunatProvider::new(&mock_server.uri());
        let result = provider
            .get_exchange_rate(&RateQuery::new(test_date(), TEST_TOKEN))
            .await;

        assert!(matches!(result, Err(FetchError::Decode(_))));
    }

    #[tokio::test]
    async fn test_json_array_is_decode_error() {
        let mock_server =
            create_mock_server(ResponseTemplate::new(200).set_body_string("[3.75, 3.80]")).await;

        let provider = SunatProvider::new(&mock_server.uri());
        let result = provider
            .get_exchange_rate(&RateQuery::new(test_date(), TEST_TOKEN))
            .await;

        assert!(matches!(result, Err(FetchError::Decode(_))));
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let mock_server = create_mock_server(
            ResponseTemplate::new(401).set_body_string(r#"{"message":"Unauthorized"}"#),
        )
        .await;

        let provider = SunatProvider::new(&mock_server.uri());
        let result = provider
            .get_exchange_rate(&RateQuery::new(test_date(), TEST_TOKEN))
            .await;

        match result {
            Err(FetchError::Status { status, body }) => {
                assert_eq!(status, 401);
                assert!(body.contains("Unauthorized"));
            }
            other => panic!("Expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connection_failure_is_transport_error() {
        // Nothing listens on port 1
        let provider = SunatProvider::new("http://127.0.0.1:1");
        let result = provider
            .get_exchange_rate(&RateQuery::new(test_date(), TEST_TOKEN))
            .await;

        assert!(matches!(result, Err(FetchError::Transport(_))));
    }

    #[tokio::test]
    async fn test_timeout_is_transport_error() {
        let mock_server = create_mock_server(
            ResponseTemplate::new(200)
                .set_body_string("{}")
                .set_delay(Duration::from_secs(2)),
        )
        .await;

        let provider =
            SunatProvider::with_timeout(&mock_server.uri(), Duration::from_millis(100));
        let result = provider
            .get_exchange_rate(&RateQuery::new(test_date(), TEST_TOKEN))
            .await;

        match result {
            Err(FetchError::Transport(e)) => assert!(e.is_timeout()),
            other => panic!("Expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_repeated_calls_are_identical() {
        let body = json!({"moneda": "PEN", "compra": 3.75, "venta": 3.80});
        let mock_server = create_mock_server(ResponseTemplate::new(200).set_body_json(body)).await;

        let provider = SunatProvider::new(&mock_server.uri());
        let query = RateQuery::new(test_date(), TEST_TOKEN);
        let first = provider.get_exchange_rate(&query).await.unwrap();
        let second = provider.get_exchange_rate(&query).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(mock_server.received_requests().await.unwrap().len(), 2);
    }
}
