use std::time::{Duration, SystemTime};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use blob_store::{AppendBlobService, BlobError, BlobResult};
use md5::{Digest, Md5};
use reqwest::{Method, StatusCode};
use url::Url;
use crate::azure::auth::{sign_shared_key, CanonicalRequest, StorageAuth};
use crate::azure::cloud::StorageEndpoint;

/// Azure REST API version used for all requests. Bearer auth needs 2017-11-09 or later.
pub const AZURE_API_VERSION: &str = "2023-11-03";

const OCTET_STREAM: &str = "application/octet-stream";
const BLOCK_COUNT_EXCEEDS_LIMIT: &str = "BlockCountExceedsLimit";

/// Encode everything except unreserved characters and '/', which Azure expects
/// unencoded in blob paths.
const AZURE_BLOB_ENCODE_SET: percent_encoding::AsciiSet = percent_encoding::NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// An `AppendBlobService` backed by the Azure Blob REST API.
#[derive(Clone, Debug)]
pub struct AzureBlobService {
    client: reqwest::Client,
    endpoint: StorageEndpoint,
    auth: StorageAuth,
    compute_checksums: bool,
}

/// One outgoing request, before auth is applied.
struct BlobRequest<'a> {
    method: Method,
    container: &'a str,
    blob: Option<&'a str>,
    query: Vec<(&'static str, String)>,
    extra_ms_headers: Vec<(&'static str, String)>,
    if_none_match: Option<&'static str>,
    body: &'a [u8],
    content_type: Option<&'static str>,
    content_md5: Option<String>,
}

impl<'a> BlobRequest<'a> {
    fn new(method: Method, container: &'a str) -> Self {
        Self {
            method,
            container,
            blob: None,
            query: Vec::new(),
            extra_ms_headers: Vec::new(),
            if_none_match: None,
            body: &[],
            content_type: None,
            content_md5: None,
        }
    }
}

/// A response the caller did not expect, reduced to what error mapping needs.
struct Unexpected {
    status: StatusCode,
    code: Option<String>,
    message: String,
}

impl From<Unexpected> for BlobError {
    fn from(u: Unexpected) -> Self {
        BlobError::Service { status: u.status.as_u16(), code: u.code, message: u.message }
    }
}

fn content_md5(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    BASE64_STANDARD.encode(hasher.finalize())
}

fn map_transport(e: reqwest::Error) -> BlobError {
    if e.is_timeout() {
        BlobError::Timeout
    } else {
        BlobError::Transport(Box::new(e))
    }
}

impl AzureBlobService {
    pub fn new(
        endpoint: StorageEndpoint,
        auth: StorageAuth,
        request_timeout: Duration,
        compute_checksums: bool,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        tracing::info!("azure blob service initialized: endpoint={} auth={:?}", endpoint.base_url, auth);
        Ok(Self { client, endpoint, auth, compute_checksums })
    }

    fn url_for(&self, request: &BlobRequest<'_>) -> BlobResult<Url> {
        let mut raw = format!(
            "{}/{}",
            self.endpoint.base_url,
            percent_encoding::utf8_percent_encode(request.container, &AZURE_BLOB_ENCODE_SET)
        );
        if let Some(blob) = request.blob {
            raw.push('/');
            raw.push_str(&percent_encoding::utf8_percent_encode(blob, &AZURE_BLOB_ENCODE_SET).to_string());
        }
        let mut url = Url::parse(&raw).map_err(|e| BlobError::Transport(Box::new(e)))?;

        let mut query: Vec<String> = request
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        if let StorageAuth::SasToken(token) = &self.auth {
            query.push(token.clone());
        }
        if !query.is_empty() {
            url.set_query(Some(&query.join("&")));
        }
        Ok(url)
    }

    async fn send(&self, request: BlobRequest<'_>) -> BlobResult<Result<StatusCode, Unexpected>> {
        let url = self.url_for(&request)?;
        let date = httpdate::fmt_http_date(SystemTime::now());

        let mut ms_headers = vec![
            ("x-ms-date", date),
            ("x-ms-version", AZURE_API_VERSION.to_string()),
        ];
        ms_headers.extend(request.extra_ms_headers.iter().cloned());

        let mut builder = self
            .client
            .request(request.method.clone(), url.clone())
            .body(request.body.to_vec());
        for (name, value) in &ms_headers {
            builder = builder.header(*name, value);
        }
        if let Some(content_type) = request.content_type {
            builder = builder.header("Content-Type", content_type);
        }
        if let Some(md5) = &request.content_md5 {
            builder = builder.header("Content-MD5", md5);
        }
        if let Some(if_none_match) = request.if_none_match {
            builder = builder.header("If-None-Match", if_none_match);
        }

        match &self.auth {
            StorageAuth::SharedKey { account, key } => {
                let canonical = CanonicalRequest {
                    method: request.method.as_str(),
                    content_length: request.body.len(),
                    content_md5: request.content_md5.as_deref(),
                    content_type: request.content_type,
                    if_none_match: request.if_none_match,
                    ms_headers,
                    path: url.path(),
                    query: request.query.clone(),
                };
                builder = builder.header("Authorization", sign_shared_key(account, key, &canonical)?);
            }
            StorageAuth::Bearer(credential) => {
                let token = credential.current();
                builder = builder.bearer_auth(token.secret());
            }
            StorageAuth::SasToken(_) => {}
        }

        let response = builder.send().await.map_err(map_transport)?;
        let status = response.status();
        if status.is_success() {
            return Ok(Ok(status));
        }

        let code = response
            .headers()
            .get("x-ms-error-code")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let message = response.text().await.unwrap_or_default();
        Ok(Err(Unexpected { status, code, message }))
    }
}

#[async_trait]
impl AppendBlobService for AzureBlobService {
    async fn container_exists(&self, container: &str) -> BlobResult<bool> {
        let mut request = BlobRequest::new(Method::GET, container);
        request.query.push(("restype", "container".to_string()));

        match self.send(request).await? {
            Ok(_) => Ok(true),
            Err(u) if u.status == StatusCode::NOT_FOUND => Ok(false),
            Err(u) => Err(u.into()),
        }
    }

    async fn create_container(&self, container: &str) -> BlobResult<()> {
        let mut request = BlobRequest::new(Method::PUT, container);
        request.query.push(("restype", "container".to_string()));

        match self.send(request).await? {
            Ok(_) => Ok(()),
            Err(u) if u.status == StatusCode::CONFLICT => {
                tracing::debug!("container {} already exists", container);
                Ok(())
            }
            Err(u) => Err(u.into()),
        }
    }

    async fn create_append_blob(&self, container: &str, blob: &str) -> BlobResult<()> {
        let mut request = BlobRequest::new(Method::PUT, container);
        request.blob = Some(blob);
        request.extra_ms_headers.push(("x-ms-blob-type", "AppendBlob".to_string()));
        // never truncate a blob that another flush already filled
        request.if_none_match = Some("*");

        match self.send(request).await? {
            Ok(_) => Ok(()),
            Err(u) if u.status == StatusCode::CONFLICT || u.status == StatusCode::PRECONDITION_FAILED => {
                tracing::debug!("append blob {} already exists", blob);
                Ok(())
            }
            Err(u) if u.status == StatusCode::NOT_FOUND => {
                Err(BlobError::NotFound { resource: container.to_string() })
            }
            Err(u) => Err(u.into()),
        }
    }

    async fn append_block(&self, container: &str, blob: &str, block: &[u8]) -> BlobResult<()> {
        let mut request = BlobRequest::new(Method::PUT, container);
        request.blob = Some(blob);
        request.query.push(("comp", "appendblock".to_string()));
        request.body = block;
        request.content_type = Some(OCTET_STREAM);
        if self.compute_checksums {
            request.content_md5 = Some(content_md5(block));
        }

        match self.send(request).await? {
            Ok(_) => Ok(()),
            Err(u) if u.status == StatusCode::CONFLICT => {
                match u.code.as_deref() {
                    Some(BLOCK_COUNT_EXCEEDS_LIMIT) => {
                        tracing::debug!("append blocks limit reached for {}", blob);
                    }
                    code => {
                        tracing::warn!("append to {} rejected with conflict {:?}, rotating to a new blob", blob, code);
                    }
                }
                Err(BlobError::LimitExceeded { resource: blob.to_string() })
            }
            Err(u) if u.status == StatusCode::NOT_FOUND => {
                Err(BlobError::NotFound { resource: blob.to_string() })
            }
            Err(u) => Err(u.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::oneshot;
    use crate::credential::{AccessToken, SharedCredential};

    fn service(auth: StorageAuth) -> AzureBlobService {
        AzureBlobService::new(
            StorageEndpoint::for_account("acct", "core.windows.net"),
            auth,
            Duration::from_secs(5),
            true,
        )
        .unwrap()
    }

    #[test]
    fn test_blob_url_encoding() {
        let svc = service(StorageAuth::shared_key("acct", "a2V5").unwrap());
        let mut request = BlobRequest::new(Method::PUT, "logs");
        request.blob = Some("app/2024 01/a+b-0.log");
        request.query.push(("comp", "appendblock".to_string()));

        let url = svc.url_for(&request).unwrap();
        assert_eq!(
            url.as_str(),
            "https://acct.blob.core.windows.net/logs/app/2024%2001/a%2Bb-0.log?comp=appendblock"
        );
    }

    #[test]
    fn test_sas_token_appended_to_query() {
        let svc = service(StorageAuth::sas_token("?sv=2020-08-04&sig=abc"));
        let mut request = BlobRequest::new(Method::GET, "logs");
        request.query.push(("restype", "container".to_string()));

        let url = svc.url_for(&request).unwrap();
        assert_eq!(url.query(), Some("restype=container&sv=2020-08-04&sig=abc"));
    }

    #[test]
    fn test_content_md5() {
        assert_eq!(content_md5(b""), "1B2M2Y8AsgTpgAmY7PhCfg==");
        assert_eq!(content_md5(b"hello world"), "XrY7u+Ae7tCTyyK7j1rNww==");
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        let head_end = loop {
            if let Some(pos) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                return String::from_utf8_lossy(&request).to_string();
            }
            request.extend_from_slice(&buf[..n]);
        };
        let head = String::from_utf8_lossy(&request[..head_end]).to_lowercase();
        let body_len = head
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .map(|v| v.trim().parse::<usize>().unwrap())
            .unwrap_or(0);
        while request.len() < head_end + body_len {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        String::from_utf8_lossy(&request).to_string()
    }

    /// Answers one request with `status_line` and an optional `x-ms-error-code`,
    /// and reports the raw request.
    async fn serve_once(
        status_line: &'static str,
        error_code: Option<&'static str>,
    ) -> (StorageEndpoint, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let code_header = error_code.map(|c| format!("x-ms-error-code: {}\r\n", c)).unwrap_or_default();
            let response = format!(
                "HTTP/1.1 {}\r\n{}Content-Length: 0\r\nConnection: close\r\n\r\n",
                status_line, code_header
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            let _ = tx.send(request);
        });

        (StorageEndpoint::custom("acct", &format!("http://{}", addr)).unwrap(), rx)
    }

    fn sas_service(endpoint: StorageEndpoint, timeout: Duration) -> AzureBlobService {
        AzureBlobService::new(endpoint, StorageAuth::sas_token("sig=abc"), timeout, true).unwrap()
    }

    #[tokio::test]
    async fn test_container_exists_statuses() {
        let (endpoint, request) = serve_once("200 OK", None).await;
        assert!(sas_service(endpoint, Duration::from_secs(5)).container_exists("logs").await.unwrap());
        assert!(request.await.unwrap().starts_with("GET /logs?restype=container&sig=abc HTTP/1.1"));

        let (endpoint, _) = serve_once("404 Not Found", Some("ContainerNotFound")).await;
        assert!(!sas_service(endpoint, Duration::from_secs(5)).container_exists("logs").await.unwrap());

        // only 404 means absent
        let (endpoint, _) = serve_once("403 Forbidden", Some("AuthorizationFailure")).await;
        let err = sas_service(endpoint, Duration::from_secs(5)).container_exists("logs").await.unwrap_err();
        assert!(matches!(err, BlobError::Service { status: 403, ref code, .. } if code.as_deref() == Some("AuthorizationFailure")));
    }

    #[tokio::test]
    async fn test_create_container_conflict_is_success() {
        let (endpoint, _) = serve_once("409 Conflict", Some("ContainerAlreadyExists")).await;
        sas_service(endpoint, Duration::from_secs(5)).create_container("logs").await.unwrap();
    }

    #[tokio::test]
    async fn test_create_append_blob_never_truncates() {
        let (endpoint, request) = serve_once("201 Created", None).await;
        sas_service(endpoint, Duration::from_secs(5)).create_append_blob("logs", "a-0.log").await.unwrap();
        let request = request.await.unwrap().to_lowercase();
        assert!(request.starts_with("put /logs/a-0.log?sig=abc http/1.1"));
        assert!(request.contains("x-ms-blob-type: appendblob"));
        assert!(request.contains("if-none-match: *"));

        for status in ["409 Conflict", "412 Precondition Failed"] {
            let (endpoint, _) = serve_once(status, Some("BlobAlreadyExists")).await;
            sas_service(endpoint, Duration::from_secs(5)).create_append_blob("logs", "a-0.log").await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_append_block_statuses() {
        let (endpoint, request) = serve_once("201 Created", None).await;
        sas_service(endpoint, Duration::from_secs(5)).append_block("logs", "a-0.log", b"hello world").await.unwrap();
        let request = request.await.unwrap();
        assert!(request.starts_with("PUT /logs/a-0.log?comp=appendblock&sig=abc HTTP/1.1"));
        assert!(request.to_lowercase().contains("content-md5: xry7u+ae7tctyyk7j1rnww=="));
        assert!(request.ends_with("hello world"));

        let (endpoint, _) = serve_once("409 Conflict", Some("BlockCountExceedsLimit")).await;
        let err = sas_service(endpoint, Duration::from_secs(5)).append_block("logs", "a-0.log", b"x").await.unwrap_err();
        assert!(matches!(err, BlobError::LimitExceeded { ref resource } if resource == "a-0.log"));

        // other conflicts still rotate
        let (endpoint, _) = serve_once("409 Conflict", Some("LeaseIdMissing")).await;
        let err = sas_service(endpoint, Duration::from_secs(5)).append_block("logs", "a-0.log", b"x").await.unwrap_err();
        assert!(err.is_limit_exceeded());

        let (endpoint, _) = serve_once("404 Not Found", Some("BlobNotFound")).await;
        let err = sas_service(endpoint, Duration::from_secs(5)).append_block("logs", "a-0.log", b"x").await.unwrap_err();
        assert!(err.is_not_found());

        let (endpoint, _) = serve_once("500 Internal Server Error", Some("InternalError")).await;
        let err = sas_service(endpoint, Duration::from_secs(5)).append_block("logs", "a-0.log", b"x").await.unwrap_err();
        assert!(matches!(err, BlobError::Service { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_stalled_request_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });
        let endpoint = StorageEndpoint::custom("acct", &format!("http://{}", addr)).unwrap();

        let err = sas_service(endpoint, Duration::from_millis(200))
            .append_block("logs", "a-0.log", b"x")
            .await
            .unwrap_err();
        assert!(matches!(err, BlobError::Timeout));
    }

    #[tokio::test]
    async fn test_bearer_token_read_per_request() {
        let credential = SharedCredential::new(AccessToken::new("first-token"));
        let (endpoint, request) = serve_once("200 OK", None).await;
        let svc = AzureBlobService::new(endpoint, StorageAuth::Bearer(credential.clone()), Duration::from_secs(5), true)
            .unwrap();

        credential.replace(AccessToken::new("second-token"));
        svc.container_exists("logs").await.unwrap();

        let request = request.await.unwrap().to_lowercase();
        assert!(request.contains("authorization: bearer second-token"));
        assert!(!request.contains("first-token"));
    }
}
