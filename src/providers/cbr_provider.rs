use crate::core::{FeedError, RateFeed, RateRecord};
use crate::providers::cbr_xml;
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Daily rates feed served as XML over plain HTTP GET.
pub struct CbrProvider {
    url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl CbrProvider {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        // The client timeout covers connect, headers and body.
        let client = reqwest::Client::builder()
            .user_agent(concat!("fxfeed/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(CbrProvider {
            url: url.to_string(),
            timeout,
            client,
        })
    }

    fn classify(&self, err: reqwest::Error) -> FeedError {
        let url = self.url.clone();
        if err.is_timeout() {
            FeedError::Timeout {
                url,
                timeout: self.timeout,
            }
        } else if err.is_connect() {
            FeedError::Connection { url, source: err }
        } else {
            FeedError::Transport { url, source: err }
        }
    }

    /// Performs one GET and returns the raw body of a 2xx response.
    pub async fn fetch(&self) -> Result<Vec<u8>, FeedError> {
        info!("Send request: {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::HttpStatus {
                url: self.url.clone(),
                status,
            });
        }

        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        info!(bytes = body.len(), "Response received");
        Ok(body.to_vec())
    }
}

#[async_trait]
impl RateFeed for CbrProvider {
    fn url(&self) -> &str {
        &self.url
    }

    #[instrument(name = "CbrFetch", skip(self), fields(url = %self.url))]
    async fn fetch_rates(&self) -> Result<Vec<RateRecord>, FeedError> {
        let body = self.fetch().await?;
        let records = cbr_xml::parse(&body)?;
        debug!(?records, "Parsed feed");
        info!("Found {} currencies", records.len());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FEED_PATH: &str = "/scripts/XML_daily.asp";

    const FEED_BODY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ValCurs Date="18.10.2026" name="Foreign Currency Market">
    <Valute ID="R01235">
        <NumCode>840</NumCode>
        <CharCode>USD</CharCode>
        <Nominal>1</Nominal>
        <Name>Доллар США</Name>
        <Value>91,2345</Value>
    </Valute>
    <Valute ID="R01239">
        <NumCode>978</NumCode>
        <CharCode>EUR</CharCode>
        <Nominal>1</Nominal>
        <Name>Евро</Name>
        <Value>99,8765</Value>
    </Valute>
</ValCurs>"#;

    async fn create_mock_server(template: ResponseTemplate) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(FEED_PATH))
            .respond_with(template)
            .mount(&mock_server)
            .await;
        mock_server
    }

    fn provider_for(server: &MockServer, timeout: Duration) -> CbrProvider {
        CbrProvider::new(&format!("{}{}", server.uri(), FEED_PATH), timeout).unwrap()
    }

    #[tokio::test]
    async fn test_successful_rates_fetch() {
        let server = create_mock_server(ResponseTemplate::new(200).set_body_string(FEED_BODY)).await;
        let provider = provider_for(&server, Duration::from_secs(5));

        let records = provider.fetch_rates().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].code, "USD");
        assert_eq!(records[0].rate, Decimal::from_str("91.2345").unwrap());
        assert_eq!(records[1].code, "EUR");
    }

    #[tokio::test]
    async fn test_server_error_is_http_status_failure() {
        let server = create_mock_server(ResponseTemplate::new(500)).await;
        let provider = provider_for(&server, Duration::from_secs(5));

        let err = provider.fetch_rates().await.unwrap_err();
        assert_eq!(err.kind(), "http-status");
        assert!(
            err.to_string()
                .starts_with("HTTP error: 500 Internal Server Error for ")
        );
    }

    #[tokio::test]
    async fn test_slow_server_is_timeout_failure() {
        let server = create_mock_server(
            ResponseTemplate::new(200)
                .set_body_string(FEED_BODY)
                .set_delay(Duration::from_secs(3)),
        )
        .await;
        let provider = provider_for(&server, Duration::from_millis(200));

        let err = provider.fetch_rates().await.unwrap_err();
        assert_eq!(err.kind(), "timeout");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connection_failure() {
        // Grab a free port, then release it so nothing is listening there.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let provider = CbrProvider::new(
            &format!("http://127.0.0.1:{port}{FEED_PATH}"),
            Duration::from_secs(5),
        )
        .unwrap();

        let err = provider.fetch_rates().await.unwrap_err();
        assert_eq!(err.kind(), "connection");
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_failure() {
        let server = create_mock_server(
            ResponseTemplate::new(200).set_body_string("<ValCurs><Valute><CharCode>USD"),
        )
        .await;
        let provider = provider_for(&server, Duration::from_secs(5));

        let err = provider.fetch_rates().await.unwrap_err();
        assert!(matches!(err, FeedError::Parse(_)));
        assert_eq!(err.kind(), "xml");
    }
}
