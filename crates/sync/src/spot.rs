use std::time::Duration;

use async_trait::async_trait;
use lucia_core::catalog_import::VendorRecord;
use lucia_core::config::CatalogConfig;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::SyncError;
use crate::source::{CatalogResource, CatalogSource, SessionToken};

/// HTTP client for the Spot Gifts (Stricker) catalog web service.
#[derive(Debug, Clone)]
pub struct SpotCatalogClient {
    client: reqwest::Client,
    api_url: String,
    access_key: SecretString,
    lang: String,
    auth_timeout: Duration,
    fetch_timeout: Duration,
}

#[derive(Deserialize)]
struct AuthenticateResponse {
    #[serde(rename = "Token")]
    token: Option<String>,
}

impl SpotCatalogClient {
    pub fn new(config: &CatalogConfig) -> Result<Self, SyncError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder().default_headers(headers).build().map_err(|error| {
            SyncError::Authentication(format!("failed to build HTTP client: {error}"))
        })?;

        let api_url = if config.api_url.ends_with('/') {
            config.api_url.clone()
        } else {
            format!("{}/", config.api_url)
        };

        Ok(Self {
            client,
            api_url,
            access_key: config.access_key.clone(),
            lang: config.lang.clone(),
            auth_timeout: Duration::from_secs(config.auth_timeout_secs),
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
        })
    }
}

#[async_trait]
impl CatalogSource for SpotCatalogClient {
    async fn authenticate(&self) -> Result<SessionToken, SyncError> {
        info!(event_name = "sync.vendor.authenticate", "authenticating with vendor API");
        let response = self
            .client
            .get(format!("{}authenticateclient", self.api_url))
            .query(&[("AccessKey", self.access_key.expose_secret())])
            .timeout(self.auth_timeout)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|error| SyncError::Authentication(error.without_url().to_string()))?;

        let body: AuthenticateResponse = response
            .json()
            .await
            .map_err(|error| SyncError::Authentication(error.without_url().to_string()))?;

        body.token
            .filter(|token| !token.is_empty())
            .map(SessionToken)
            .ok_or_else(|| SyncError::Authentication("response carried no Token".to_string()))
    }

    async fn fetch(
        &self,
        token: &SessionToken,
        resource: CatalogResource,
    ) -> Result<Vec<VendorRecord>, SyncError> {
        let fetch_error = |message: String| SyncError::Fetch { resource, message };

        let response = self
            .client
            .get(format!("{}{}", self.api_url, resource.path()))
            .query(&[("token", token.0.as_str()), ("lang", self.lang.as_str())])
            .timeout(self.fetch_timeout)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|error| fetch_error(error.without_url().to_string()))?;

        let body =
            response.text().await.map_err(|error| fetch_error(error.without_url().to_string()))?;
        let records = collection_records(&body, resource);

        info!(
            event_name = "sync.vendor.fetched",
            resource = %resource,
            records = records.len(),
            "fetched vendor collection"
        );
        Ok(records)
    }
}

/// Object items of the collection array; a blank, non-JSON or keyless body holds no records.
fn collection_records(body: &str, resource: CatalogResource) -> Vec<VendorRecord> {
    if body.trim().is_empty() {
        return Vec::new();
    }

    let envelope = match serde_json::from_str::<Value>(body) {
        Ok(envelope) => envelope,
        Err(error) => {
            warn!(
                event_name = "sync.vendor.unreadable_body",
                resource = %resource,
                error = %error,
                "vendor body is not JSON; treating as empty"
            );
            return Vec::new();
        }
    };

    match envelope.get(resource.collection_key()) {
        Some(Value::Array(items)) => {
            items.iter().filter_map(|item| item.as_object().cloned()).collect()
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use lucia_core::config::AppConfig;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::SpotCatalogClient;
    use crate::error::SyncError;
    use crate::source::{CatalogResource, CatalogSource, SessionToken};

    fn client(server: &MockServer) -> SpotCatalogClient {
        let mut config = AppConfig::default().catalog;
        config.api_url = format!("{}/api/v1SSL", server.uri());
        config.access_key = "vendor-key".to_string().into();
        SpotCatalogClient::new(&config).expect("client")
    }

    #[tokio::test]
    async fn authenticate_exchanges_access_key_for_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1SSL/authenticateclient"))
            .and(query_param("AccessKey", "vendor-key"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Token": "tok-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let token = client(&server).authenticate().await.expect("token");

        assert_eq!(token, SessionToken("tok-1".to_string()));
    }

    #[tokio::test]
    async fn authenticate_without_token_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1SSL/authenticateclient"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Error": "bad key"})))
            .mount(&server)
            .await;

        let error = client(&server).authenticate().await.expect_err("no token");

        assert!(matches!(error, SyncError::Authentication(_)));
    }

    #[tokio::test]
    async fn fetch_passes_token_and_language() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1SSL/products"))
            .and(query_param("token", "tok-1"))
            .and(query_param("lang", "PT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Products": [
                    {"ProdReference": "MUG-01", "Name": "Caneca"},
                    {"ProdReference": "PEN-02", "Name": "Caneta"}
                ]
            })))
            .mount(&server)
            .await;

        let products = client(&server)
            .fetch(&SessionToken("tok-1".to_string()), CatalogResource::Products)
            .await
            .expect("products");

        assert_eq!(products.len(), 2);
        assert_eq!(products[0]["ProdReference"], json!("MUG-01"));
    }

    #[tokio::test]
    async fn missing_collection_yields_no_records() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1SSL/colors"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Message": "empty"})))
            .mount(&server)
            .await;

        let colors = client(&server)
            .fetch(&SessionToken("tok-1".to_string()), CatalogResource::Colors)
            .await
            .expect("colors");

        assert!(colors.is_empty());
    }

    #[tokio::test]
    async fn empty_or_non_json_bodies_yield_no_records() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1SSL/colors"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1SSL/products"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;
        let client = client(&server);
        let token = SessionToken("tok-1".to_string());

        let colors = client.fetch(&token, CatalogResource::Colors).await.expect("colors");
        let products = client.fetch(&token, CatalogResource::Products).await.expect("products");

        assert!(colors.is_empty());
        assert!(products.is_empty());
    }

    #[tokio::test]
    async fn http_failure_names_the_resource() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1SSL/optionals"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let error = client(&server)
            .fetch(&SessionToken("tok-1".to_string()), CatalogResource::Optionals)
            .await
            .expect_err("503");

        assert!(matches!(error, SyncError::Fetch { resource: CatalogResource::Optionals, .. }));
    }
}
