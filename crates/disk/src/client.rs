//! Yandex Disk client implementation
//!
//! Wraps reqwest and implements the RemoteStore trait from yb-core.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, Response, StatusCode};
use tokio_util::io::ReaderStream;
use url::Url;

use yb_core::config::TimeoutConfig;
use yb_core::{Error, Lookup, RemoteStore, Result, SortKey};

use crate::api::{ApiError, ApiResource, DIR_EXISTS, UploadLink, status_error};

/// Resources endpoint of the Yandex Disk REST API
pub const API_URL: &str = "https://cloud-api.yandex.net/v1/disk/resources";

/// Children fetched per listing request
const PAGE_SIZE: usize = 1000;

/// Yandex Disk client
pub struct DiskClient {
    http: reqwest::Client,
    base: Url,
    token: String,
}

impl DiskClient {
    /// Create a client for the public API
    pub fn new(token: impl Into<String>, timeout: &TimeoutConfig) -> Result<Self> {
        Self::with_base_url(token, API_URL, timeout)
    }

    /// Create a client against another resources endpoint
    pub fn with_base_url(
        token: impl Into<String>,
        base: &str,
        timeout: &TimeoutConfig,
    ) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(Error::Auth("OAuth token is empty".into()));
        }

        let base = Url::parse(base).map_err(|e| Error::Config(format!("Invalid API URL: {e}")))?;
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(timeout.connect_ms))
            .read_timeout(Duration::from_millis(timeout.read_ms))
            .user_agent(concat!("ya-backup/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, base, token })
    }

    /// URL of `endpoint` below the resources URL with the given query
    fn url(&self, endpoint: Option<&str>, query: &[(&str, String)]) -> Result<Url> {
        let mut url = self.base.clone();
        if let Some(endpoint) = endpoint {
            url.path_segments_mut()
                .map_err(|_| Error::Config(format!("API URL {} cannot be a base", self.base)))?
                .pop_if_empty()
                .push(endpoint);
        }
        url.query_pairs_mut()
            .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header(reqwest::header::AUTHORIZATION, format!("OAuth {}", self.token))
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response> {
        self.authorize(request)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))
    }

    /// Fetch one page of a resource and its children
    async fn fetch_page(
        &self,
        path: &str,
        sort: Option<SortKey>,
        offset: usize,
    ) -> Result<Option<ApiResource>> {
        let mut query = vec![
            ("path", path.to_string()),
            ("limit", PAGE_SIZE.to_string()),
            ("offset", offset.to_string()),
        ];
        if let Some(sort) = sort {
            query.push(("sort", sort.as_query()));
        }

        let response = self.send(self.http.get(self.url(None, &query)?)).await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(error_from(response, path).await);
        }

        let resource = response
            .json::<ApiResource>()
            .await
            .map_err(|e| Error::Network(format!("invalid response for {path}: {e}")))?;
        Ok(Some(resource))
    }
}

async fn error_from(response: Response, path: &str) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    status_error(status, &ApiError::parse(&body), path)
}

#[async_trait]
impl RemoteStore for DiskClient {
    async fn lookup(&self, path: &str, sort: Option<SortKey>) -> Result<Lookup> {
        let Some(mut resource) = self.fetch_page(path, sort, 0).await? else {
            return Ok(Lookup::NotFound);
        };

        // Directories larger than one page are fetched page by page
        if let Some(list) = resource.embedded.as_mut() {
            let total = list.total.unwrap_or(list.items.len());
            while list.items.len() < total {
                let offset = list.items.len();
                let Some(page) = self.fetch_page(path, sort, offset).await? else {
                    return Err(Error::Network(format!("{path} vanished while listing")));
                };
                let items = page.embedded.map(|l| l.items).unwrap_or_default();
                if items.is_empty() {
                    break;
                }
                list.items.extend(items);
            }
        }

        Ok(Lookup::Found(resource.into_info()))
    }

    async fn create_dir(&self, path: &str) -> Result<()> {
        let url = self.url(None, &[("path", path.to_string())])?;
        let response = self.send(self.http.put(url)).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = ApiError::parse(&response.text().await.unwrap_or_default());
        if status == StatusCode::CONFLICT && body.error == DIR_EXISTS {
            tracing::debug!(path, "directory already exists");
            return Ok(());
        }
        Err(status_error(status, &body, path))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let url = self.url(None, &[("path", path.to_string())])?;
        let response = self.send(self.http.delete(url)).await?;
        match response.status() {
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => Ok(()),
            StatusCode::ACCEPTED => {
                tracing::debug!(path, "deletion continues asynchronously on the server");
                Ok(())
            }
            status if status.is_success() => Ok(()),
            _ => Err(error_from(response, path).await),
        }
    }

    async fn upload(&self, local: &Path, remote_path: &str, overwrite: bool) -> Result<()> {
        let url = self.url(
            Some("upload"),
            &[
                ("path", remote_path.to_string()),
                ("overwrite", overwrite.to_string()),
            ],
        )?;
        let response = self.send(self.http.get(url)).await?;
        let status = response.status();
        if !status.is_success() {
            let body = ApiError::parse(&response.text().await.unwrap_or_default());
            let cause = status_error(status, &body, remote_path);
            return Err(Error::UploadTarget(format!("{remote_path} ({cause})")));
        }
        let link: UploadLink = response
            .json()
            .await
            .map_err(|e| Error::UploadTarget(format!("{remote_path} ({e})")))?;

        let file = tokio::fs::File::open(local).await?;
        let size = file.metadata().await?.len();
        let method = link
            .method
            .as_deref()
            .and_then(|m| Method::from_bytes(m.as_bytes()).ok())
            .unwrap_or(Method::PUT);
        // The upload URL is pre-signed, it takes no Authorization header
        let response = self
            .http
            .request(method, &link.href)
            .header(reqwest::header::CONTENT_LENGTH, size)
            .body(reqwest::Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(error_from(response, remote_path).await);
        }

        tracing::debug!(remote = remote_path, size, %status, "upload accepted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> DiskClient {
        DiskClient::new("token", &TimeoutConfig::default()).unwrap()
    }

    #[test]
    fn test_empty_token_rejected() {
        let result = DiskClient::new("  ", &TimeoutConfig::default());
        assert!(matches!(result, Err(Error::Auth(_))));
    }

    #[test]
    fn test_invalid_base_url() {
        let result = DiskClient::with_base_url("t", "not a url", &TimeoutConfig::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_resource_url_encodes_path() {
        let url = client()
            .url(None, &[("path", "/backups/my files/a&b".to_string())])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://cloud-api.yandex.net/v1/disk/resources?path=%2Fbackups%2Fmy+files%2Fa%26b"
        );
    }

    #[test]
    fn test_upload_url() {
        let url = client()
            .url(
                Some("upload"),
                &[
                    ("path", "/b/x.tgz".to_string()),
                    ("overwrite", false.to_string()),
                ],
            )
            .unwrap();
        assert_eq!(url.path(), "/v1/disk/resources/upload");
        assert_eq!(url.query(), Some("path=%2Fb%2Fx.tgz&overwrite=false"));
    }

    #[test]
    fn test_custom_base_with_trailing_slash() {
        let client =
            DiskClient::with_base_url("t", "http://localhost:8080/resources/", &TimeoutConfig::default())
                .unwrap();
        let url = client.url(Some("upload"), &[]).unwrap();
        assert_eq!(url.path(), "/resources/upload");
    }

    mod http {
        use super::*;
        use serde_json::json;
        use wiremock::matchers::{header, method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        async fn server_client() -> (MockServer, DiskClient) {
            let server = MockServer::start().await;
            let client = DiskClient::with_base_url(
                "token",
                &format!("{}/resources", server.uri()),
                &TimeoutConfig::default(),
            )
            .unwrap();
            (server, client)
        }

        fn item(name: &str) -> serde_json::Value {
            json!({"name": name, "path": format!("disk:/b/{name}"), "type": "file", "size": 1})
        }

        #[tokio::test]
        async fn test_lookup_follows_pages() {
            let (server, client) = server_client().await;
            Mock::given(method("GET"))
                .and(path("/resources"))
                .and(query_param("offset", "0"))
                .and(header("Authorization", "OAuth token"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "name": "b", "path": "disk:/b", "type": "dir",
                    "_embedded": {"total": 3, "items": [item("a-1"), item("a-2")]}
                })))
                .expect(1)
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path("/resources"))
                .and(query_param("offset", "2"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "name": "b", "path": "disk:/b", "type": "dir",
                    "_embedded": {"total": 3, "items": [item("a-3")]}
                })))
                .expect(1)
                .mount(&server)
                .await;

            let Lookup::Found(info) = client.lookup("/b", None).await.unwrap() else {
                panic!("expected /b to be found");
            };
            let names: Vec<&str> = info.children.iter().map(|c| c.name.as_str()).collect();
            assert_eq!(names, vec!["a-1", "a-2", "a-3"]);
        }

        #[tokio::test]
        async fn test_lookup_missing_and_unauthorized() {
            let (server, client) = server_client().await;
            Mock::given(method("GET"))
                .and(query_param("path", "/gone"))
                .respond_with(ResponseTemplate::new(404))
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(query_param("path", "/secret"))
                .respond_with(ResponseTemplate::new(401).set_body_json(
                    json!({"error": "UnauthorizedError", "description": "Unauthorized"}),
                ))
                .mount(&server)
                .await;

            assert!(matches!(
                client.lookup("/gone", None).await,
                Ok(Lookup::NotFound)
            ));
            assert!(matches!(
                client.lookup("/secret", None).await,
                Err(Error::Auth(_))
            ));
        }

        #[tokio::test]
        async fn test_create_dir_conflicts() {
            let (server, client) = server_client().await;
            Mock::given(method("PUT"))
                .and(query_param("path", "/exists"))
                .respond_with(ResponseTemplate::new(409).set_body_json(json!({"error": DIR_EXISTS})))
                .mount(&server)
                .await;
            Mock::given(method("PUT"))
                .and(query_param("path", "/no/parent"))
                .respond_with(
                    ResponseTemplate::new(409)
                        .set_body_json(json!({"error": "DiskPathDoesntExistsError"})),
                )
                .mount(&server)
                .await;

            assert!(client.create_dir("/exists").await.is_ok());
            assert!(matches!(
                client.create_dir("/no/parent").await,
                Err(Error::Network(_))
            ));
        }

        #[tokio::test]
        async fn test_delete_statuses() {
            let (server, client) = server_client().await;
            for (target, status) in [("/gone", 404), ("/slow", 202), ("/now", 204), ("/broken", 500)] {
                Mock::given(method("DELETE"))
                    .and(query_param("path", target))
                    .respond_with(ResponseTemplate::new(status))
                    .mount(&server)
                    .await;
            }

            assert!(client.delete("/gone").await.is_ok());
            assert!(client.delete("/slow").await.is_ok());
            assert!(client.delete("/now").await.is_ok());
            assert!(matches!(
                client.delete("/broken").await,
                Err(Error::Network(_))
            ));
        }

        #[tokio::test]
        async fn test_upload_link_refused() {
            let (server, client) = server_client().await;
            Mock::given(method("GET"))
                .and(path("/resources/upload"))
                .respond_with(
                    ResponseTemplate::new(409)
                        .set_body_json(json!({"error": "DiskResourceAlreadyExistsError"})),
                )
                .mount(&server)
                .await;
            let temp = tempfile::TempDir::new().unwrap();
            let local = temp.path().join("a.tgz");
            std::fs::write(&local, "data").unwrap();

            let err = client.upload(&local, "/b/a.tgz", false).await.unwrap_err();
            assert!(matches!(err, Error::UploadTarget(_)), "{err:?}");
        }

        #[tokio::test]
        async fn test_upload_streams_file_to_link() {
            let (server, client) = server_client().await;
            Mock::given(method("GET"))
                .and(path("/resources/upload"))
                .and(query_param("path", "/b/a.tgz"))
                .and(query_param("overwrite", "true"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "href": format!("{}/put/1", server.uri()),
                    "method": "PUT",
                    "templated": false
                })))
                .mount(&server)
                .await;
            Mock::given(method("PUT"))
                .and(path("/put/1"))
                .respond_with(ResponseTemplate::new(201))
                .expect(1)
                .mount(&server)
                .await;
            let temp = tempfile::TempDir::new().unwrap();
            let local = temp.path().join("a.tgz");
            std::fs::write(&local, "archive bytes").unwrap();

            client.upload(&local, "/b/a.tgz", true).await.unwrap();

            let requests = server.received_requests().await.unwrap();
            let put = requests
                .iter()
                .find(|r| r.url.path() == "/put/1")
                .unwrap();
            assert_eq!(put.body, b"archive bytes");
            assert!(put.headers.get("authorization").is_none());
        }
    }
}
