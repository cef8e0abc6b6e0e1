use async_trait::async_trait;
use dci_common::{Credentials, HttpConfig, Job, RemoteFile, Topic};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::api::CiApi;
use crate::error::{ClientError, ClientResult};
use crate::signer::Signer;

#[derive(Debug, Deserialize)]
struct Named {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TeamsResponse {
    teams: Vec<Named>,
}

#[derive(Debug, Deserialize)]
struct TopicsResponse {
    topics: Vec<Named>,
}

#[derive(Debug, Deserialize)]
struct ProductsResponse {
    products: Vec<Named>,
}

#[derive(Debug, Deserialize)]
struct ProductResponse {
    product: ProductTopics,
}

#[derive(Debug, Deserialize)]
struct ProductTopics {
    #[serde(default)]
    topics: Vec<Topic>,
}

#[derive(Debug, Deserialize)]
struct JobsResponse {
    jobs: Vec<Job>,
}

#[derive(Debug, Deserialize)]
struct FilesResponse {
    files: Vec<RemoteFile>,
}

/// Signed, retrying HTTP client for the DCI control plane.
///
/// One instance owns one connection pool and is shared by every sync task.
pub struct DciClient {
    http: reqwest::Client,
    api_url: String,
    signer: Signer,
    config: HttpConfig,
}

impl DciClient {
    pub fn new(credentials: &Credentials, config: HttpConfig) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http,
            api_url: credentials.api_url(),
            signer: Signer::new(credentials),
            config,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// GET with retries on connection errors and timeouts only.
    ///
    /// Returns `Ok(None)` once every attempt timed out or failed to connect.
    async fn get(&self, uri: &str) -> ClientResult<Option<reqwest::Response>> {
        let url = reqwest::Url::parse(uri).map_err(|e| ClientError::InvalidUrl(format!("{uri}: {e}")))?;
        let attempts = self.config.retry_attempts.max(1);

        for attempt in 1..=attempts {
            let headers = self.signer.headers(&url, chrono::Utc::now())?;
            match self.http.get(url.clone()).headers(headers).send().await {
                Ok(response) => {
                    if attempt > 1 {
                        info!("GET {} succeeded after {} attempts", uri, attempt);
                    }
                    return Ok(Some(response));
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    warn!("GET {} failed (attempt {}/{}): {}", uri, attempt, attempts, e);
                    if attempt < attempts {
                        tokio::time::sleep(self.config.retry_delay()).await;
                    }
                }
                Err(e) => return Err(ClientError::Http(e)),
            }
        }

        error!("GET {} gave no response after {} attempts", uri, attempts);
        Ok(None)
    }

    /// GET returning the body of a 200 response
    async fn get_text(&self, uri: &str) -> ClientResult<String> {
        let response = self
            .get(uri)
            .await?
            .ok_or_else(|| ClientError::NoData(uri.to_string()))?;

        let status = response.status();
        let body = response.text().await?;
        if status != reqwest::StatusCode::OK {
            error!("GET {}: status: {}, message: {}", uri, status.as_u16(), body);
            return Err(ClientError::Status {
                uri: uri.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    async fn get_json<T: DeserializeOwned>(&self, uri: &str) -> ClientResult<T> {
        let body = self.get_text(uri).await?;
        Ok(serde_json::from_str(&body)?)
    }

    fn first_id(kind: &'static str, name: &str, entities: Vec<Named>) -> ClientResult<String> {
        match entities.into_iter().next() {
            Some(entity) => Ok(entity.id),
            None => {
                error!("{} {} not found", kind, name);
                Err(ClientError::NotFound {
                    kind,
                    name: name.to_string(),
                })
            }
        }
    }
}

#[async_trait]
impl CiApi for DciClient {
    async fn resolve_team(&self, name: &str) -> ClientResult<String> {
        let uri = format!("{}/teams?where=name:{}", self.api_url, name);
        let res: TeamsResponse = self.get_json(&uri).await?;
        Self::first_id("team", name, res.teams)
    }

    async fn resolve_topic(&self, name: &str) -> ClientResult<String> {
        let uri = format!("{}/topics?where=name:{}", self.api_url, name);
        let res: TopicsResponse = self.get_json(&uri).await?;
        Self::first_id("topic", name, res.topics)
    }

    async fn resolve_product(&self, name: &str) -> ClientResult<String> {
        let uri = format!("{}/products?where=name:{}", self.api_url, name);
        let res: ProductsResponse = self.get_json(&uri).await?;
        Self::first_id("product", name, res.products)
    }

    async fn list_jobs(&self, team_id: &str, topic_id: &str) -> ClientResult<Vec<Job>> {
        let uri = format!(
            "{}/jobs?where=team_id:{},topic_id:{}&embed=components",
            self.api_url, team_id, topic_id
        );
        let res: JobsResponse = self.get_json(&uri).await?;
        debug!("{} jobs for team {} on topic {}", res.jobs.len(), team_id, topic_id);
        Ok(res.jobs)
    }

    async fn list_topics_of_product(&self, product_id: &str) -> ClientResult<Vec<Topic>> {
        let uri = format!("{}/products/{}?embed=topics", self.api_url, product_id);
        let res: ProductResponse = self.get_json(&uri).await?;
        Ok(res.product.topics)
    }

    async fn list_files_of_job(&self, job_id: &str) -> ClientResult<Vec<RemoteFile>> {
        let uri = format!("{}/jobs/{}/files", self.api_url, job_id);
        let res: FilesResponse = self.get_json(&uri).await?;
        Ok(res.files)
    }

    async fn fetch_file_content(&self, file_id: &str) -> ClientResult<String> {
        let uri = format!("{}/files/{}/content", self.api_url, file_id);
        self.get_text(&uri).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// What the local server does with one connection
    #[derive(Clone)]
    enum Reply {
        /// Read the request and never answer
        Hang,
        Raw(String),
    }

    fn http(status: &str, body: &str) -> Reply {
        Reply::Raw(format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        ))
    }

    /// Serve `replies` in order, one per connection, repeating the last one.
    /// Returns the base URL and the number of accepted connections.
    async fn serve(replies: Vec<Reply>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&accepted);
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let idx = counter.fetch_add(1, Ordering::SeqCst);
                let reply = replies[idx.min(replies.len() - 1)].clone();
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = socket.read(&mut buf).await;
                    match reply {
                        Reply::Hang => tokio::time::sleep(std::time::Duration::from_secs(5)).await,
                        Reply::Raw(response) => {
                            let _ = socket.write_all(response.as_bytes()).await;
                            let _ = socket.shutdown().await;
                        }
                    }
                });
            }
        });
        (format!("http://{addr}"), accepted)
    }

    fn client_for(url: &str, attempts: u32) -> DciClient {
        let credentials = Credentials::new(url, "remoteci/1", "secret");
        let config = HttpConfig {
            retry_attempts: attempts,
            request_timeout_ms: 200,
            retry_delay_ms: 1,
        };
        DciClient::new(&credentials, config).unwrap()
    }

    fn client(attempts: u32) -> DciClient {
        client_for("http://127.0.0.1:1", attempts)
    }

    #[test]
    fn test_api_url() {
        assert_eq!(client(1).api_url(), "http://127.0.0.1:1/api/v1");
    }

    #[test]
    fn test_first_id_not_found() {
        let err = DciClient::first_id("topic", "RHEL-9.9", Vec::new()).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "topic RHEL-9.9 not found");
    }

    #[test]
    fn test_response_shapes() {
        let jobs: JobsResponse = serde_json::from_str(
            r#"{"jobs": [{"id": "j1", "created_at": "2020-01-01T00:00:00",
                 "components": [{"id": "c1", "name": "RHEL-8.2.0-20200101.n.0"}],
                 "tags": ["ha"]}], "_meta": {"count": 1}}"#,
        )
        .unwrap();
        assert_eq!(jobs.jobs[0].components[0].name, "RHEL-8.2.0-20200101.n.0");

        let product: ProductResponse = serde_json::from_str(
            r#"{"product": {"id": "p1", "topics": [{"id": "t1", "name": "RHEL-8.2"}]}}"#,
        )
        .unwrap();
        assert_eq!(product.product.topics[0].name, "RHEL-8.2");
    }

    #[tokio::test]
    async fn test_connection_errors_exhaust_to_no_data() {
        // Nothing listens on port 1: every attempt is a connection error.
        let err = client(2).fetch_file_content("f1").await.unwrap_err();
        assert!(matches!(err, ClientError::NoData(_)));
    }

    #[tokio::test]
    async fn test_timeouts_are_retried() {
        let (url, accepted) = serve(vec![Reply::Hang, Reply::Hang, http("200 OK", "junit")]).await;
        let content = client_for(&url, 3).fetch_file_content("f1").await.unwrap();
        assert_eq!(content, "junit");
        assert_eq!(accepted.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_timeouts_exhaust_to_no_data() {
        let (url, accepted) = serve(vec![Reply::Hang]).await;
        let err = client_for(&url, 2).fetch_file_content("f1").await.unwrap_err();
        assert!(matches!(err, ClientError::NoData(_)));
        assert_eq!(accepted.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_protocol_errors_are_not_retried() {
        let (url, accepted) = serve(vec![Reply::Raw("not http at all\r\n\r\n".to_string())]).await;
        let err = client_for(&url, 3).fetch_file_content("f1").await.unwrap_err();
        assert!(matches!(err, ClientError::Http(_)));
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_non_ok_status_is_an_error() {
        let (url, accepted) = serve(vec![http("500 Internal Server Error", "boom")]).await;
        let err = client_for(&url, 3).fetch_file_content("f1").await.unwrap_err();
        match err {
            ClientError::Status { uri, status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
                assert!(uri.ends_with("/api/v1/files/f1/content"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_result_set_is_not_found() {
        let (url, _) = serve(vec![http("200 OK", r#"{"topics": [], "_meta": {"count": 0}}"#)]).await;
        let err = client_for(&url, 1).resolve_topic("RHEL-9.9").await.unwrap_err();
        assert!(err.is_not_found());

        let (url, _) = serve(vec![http("200 OK", r#"{"teams": [{"id": "t1", "name": "qa"}]}"#)]).await;
        assert_eq!(client_for(&url, 1).resolve_team("qa").await.unwrap(), "t1");
    }
}
