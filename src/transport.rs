use async_trait::async_trait;
use futures::StreamExt;
use rand::{distributions::Alphanumeric, Rng};
use reqwest::{header, multipart, Client};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::config::Credential;
use crate::error::{ApiError, NodeError, Result, NO_DETAILS};

const API_KEY_HEADER: &str = "apikey";
const INTEGRATION_HEADER: &str = "kanbanize-integration";
const INTEGRATION_NAME: &str = "n8n";
const CSRF_FIELD: &str = "ci_csrf_token";
const CSRF_TOKEN_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// One outgoing API call. Built fresh for every request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub query: Vec<(String, String)>,
    /// Full URL that replaces `{base}/api/v2{path}` when set.
    pub uri: Option<String>,
    pub headers: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            query: Vec::new(),
            uri: None,
            headers: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::Patch, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The body that actually goes on the wire. Some verbs reject an empty
    /// body, so `{}` and `null` are dropped.
    pub fn payload(&self) -> Option<&Value> {
        match &self.body {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) if map.is_empty() => None,
            Some(body) => Some(body),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    /// Parsed JSON body, or `None` when the body was not JSON.
    pub data: Option<Value>,
    pub raw_body: String,
}

impl ApiResponse {
    pub fn json(status: u16, data: Value) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            raw_body: data.to_string(),
            data: Some(data),
        }
    }

    /// The `data` member of the Businessmap envelope.
    pub fn envelope_data(&self) -> Option<&Value> {
        self.data.as_ref().and_then(|d| d.get("data"))
    }

    /// The parsed body, or JSON null.
    pub fn body(&self) -> Value {
        self.data.clone().unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadContent {
    Buffer(Vec<u8>),
    /// Streamed from disk instead of being held in memory.
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileUpload {
    pub file_name: String,
    pub mime_type: String,
    pub content: UploadContent,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub response: bool,
    #[serde(default)]
    pub resparray: Vec<UploadedFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub link: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Download {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, request: ApiRequest) -> Result<ApiResponse>;

    /// Push a file to the unversioned upload endpoint.
    async fn upload(&self, upload: FileUpload) -> Result<UploadResponse>;

    /// Fetch the bytes behind an attachment link.
    async fn download(&self, link: &str) -> Result<Download>;
}

pub struct HttpTransport {
    credential: Credential,
    client: Client,
}

impl HttpTransport {
    pub fn new(credential: Credential) -> Self {
        Self {
            credential,
            client: Client::new(),
        }
    }

    fn url_for(&self, request: &ApiRequest) -> String {
        request
            .uri
            .clone()
            .unwrap_or_else(|| format!("{}{}", self.credential.api_base(), request.path))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, request: ApiRequest) -> Result<ApiResponse> {
        let url = self.url_for(&request);
        debug!(method = request.method.as_str(), %url, "Businessmap request");

        let mut builder = self
            .client
            .request(request.method.into(), &url)
            .header(API_KEY_HEADER, &self.credential.api_key);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.payload() {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| request_failure(&e.to_string()))?;
        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let raw_body = response
            .text()
            .await
            .map_err(|e| request_failure(&e.to_string()))?;
        let data = serde_json::from_str::<Value>(&raw_body).ok();

        debug!(status, %url, "Businessmap response");

        if status != 200 && status != 204 {
            let err = status_failure(status, headers, raw_body, data.as_ref());
            warn!(status, message = %err.message, "Businessmap request failed");
            return Err(err.into());
        }

        Ok(ApiResponse {
            status,
            headers,
            data,
            raw_body,
        })
    }

    async fn upload(&self, upload: FileUpload) -> Result<UploadResponse> {
        let token = csrf_token();
        let part = match upload.content {
            UploadContent::Buffer(bytes) => multipart::Part::bytes(bytes),
            UploadContent::File(path) => {
                let file = tokio::fs::File::open(&path).await.map_err(|e| {
                    NodeError::operation(
                        "Failed to upload the file",
                        format!("Cannot open {}: {e}", path.display()),
                    )
                })?;
                multipart::Part::stream(reqwest::Body::from(file))
            }
        }
        .file_name(upload.file_name.clone())
        .mime_str(&upload.mime_type)
        .map_err(|e| NodeError::operation("Failed to upload the file", e.to_string()))?;

        let form = multipart::Form::new()
            .text(CSRF_FIELD, token.clone())
            .part("files[]", part);

        let url = self.credential.upload_url();
        debug!(%url, file = %upload.file_name, "Uploading attachment");

        let response = self
            .client
            .post(&url)
            .header(header::COOKIE, format!("{CSRF_FIELD}={token}"))
            .header(API_KEY_HEADER, &self.credential.api_key)
            .header(INTEGRATION_HEADER, INTEGRATION_NAME)
            .multipart(form)
            .send()
            .await
            .map_err(|e| NodeError::operation("Failed to upload the file", sanitize(&e.to_string())))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| NodeError::operation("Failed to upload the file", e.to_string()))?;
        if !status.is_success() {
            return Err(NodeError::operation(
                "Failed to upload the file",
                format!("Upload endpoint answered {status}: {raw}"),
            ));
        }

        serde_json::from_str(&raw).map_err(|_| {
            NodeError::invalid_response(
                "Unexpected upload response format or empty resparray",
                Some(Value::String(raw)),
            )
        })
    }

    async fn download(&self, link: &str) -> Result<Download> {
        let url = if link.starts_with("http://") || link.starts_with("https://") {
            link.to_string()
        } else {
            format!("{}{}", self.credential.origin(), link)
        };
        debug!(%url, "Downloading attachment");

        let failure = |description: String| {
            NodeError::operation(format!("Failed to download file from URL \"{url}\""), description)
        };

        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.credential.api_key)
            .header(INTEGRATION_HEADER, INTEGRATION_NAME)
            .send()
            .await
            .map_err(|e| failure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failure(format!("Server answered {status}")));
        }

        let mime_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let mut stream = response.bytes_stream();
        let mut bytes = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| failure(e.to_string()))?;
            bytes.extend_from_slice(&chunk);
        }
        Ok(Download { bytes, mime_type })
    }
}

fn collect_headers(headers: &header::HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

/// Strip path separators so request URLs never leak into error text.
pub fn sanitize(message: &str) -> String {
    message.replace(['/', '\\'], "")
}

fn request_failure(detail: &str) -> NodeError {
    ApiError::new(sanitize(&format!(
        "An error occurred while making the request: {detail}"
    )))
    .into()
}

fn status_failure(
    status: u16,
    headers: BTreeMap<String, String>,
    raw_body: String,
    data: Option<&Value>,
) -> ApiError {
    let message = data.and_then(embedded_message).unwrap_or_else(|| {
        sanitize(&format!(
            "An error occurred while making the request: Request failed with status code {status}"
        ))
    });
    let description = if raw_body.trim().is_empty() {
        NO_DETAILS.to_string()
    } else {
        raw_body.clone()
    };
    ApiError {
        status: Some(status),
        message,
        description,
        headers,
        raw_body: Some(raw_body),
    }
}

fn embedded_message(data: &Value) -> Option<String> {
    data.pointer("/error/message")
        .or_else(|| data.get("message"))
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(String::from)
}

fn csrf_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CSRF_TOKEN_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header as has_header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport_for(server: &MockServer) -> HttpTransport {
        HttpTransport::new(Credential::new(format!("{}/", server.uri()), "k3y"))
    }

    #[test]
    fn empty_bodies_are_not_sent() {
        assert!(ApiRequest::post("/x").body(json!({})).payload().is_none());
        assert!(ApiRequest::post("/x").body(Value::Null).payload().is_none());
        assert!(ApiRequest::post("/x").payload().is_none());
        assert!(ApiRequest::post("/x").body(json!({ "a": 1 })).payload().is_some());
    }

    #[test]
    fn sanitize_strips_both_slashes() {
        assert_eq!(sanitize(r"http://a/b\c"), "http:abc");
    }

    #[test]
    fn csrf_tokens_are_alphanumeric() {
        let token = csrf_token();
        assert_eq!(token.len(), CSRF_TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    async fn injects_api_key_and_versioned_base() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/cards/"))
            .and(has_header("apikey", "k3y"))
            .and(query_param("card_ids", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "data": [] } })))
            .expect(1)
            .mount(&server)
            .await;

        let response = transport_for(&server)
            .request(ApiRequest::get("/cards/").query("card_ids", 5))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.envelope_data(), Some(&json!({ "data": [] })));
    }

    #[tokio::test]
    async fn empty_object_body_is_omitted_on_the_wire() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v2/webhooks/3"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let response = transport_for(&server)
            .request(ApiRequest::delete("/webhooks/3").body(json!({})))
            .await
            .unwrap();
        assert_eq!(response.status, 204);
        assert!(response.data.is_none());

        let received = server.received_requests().await.unwrap();
        assert!(received[0].body.is_empty());
    }

    #[tokio::test]
    async fn non_json_success_keeps_raw_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/me"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let response = transport_for(&server)
            .request(ApiRequest::get("/me"))
            .await
            .unwrap();
        assert!(response.data.is_none());
        assert_eq!(response.raw_body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn surfaces_embedded_error_message() {
        let server = MockServer::start().await;
        let body = json!({ "error": { "code": "CA01", "message": "The card does not exist." } });
        Mock::given(method("PATCH"))
            .and(path("/api/v2/cards/9"))
            .respond_with(ResponseTemplate::new(404).set_body_json(body.clone()))
            .mount(&server)
            .await;

        let err = transport_for(&server)
            .request(ApiRequest::patch("/cards/9").body(json!({ "is_archived": 1 })))
            .await
            .unwrap_err();
        let NodeError::Api(api) = err else {
            panic!("expected api error");
        };
        assert_eq!(api.status, Some(404));
        assert_eq!(api.message, "The card does not exist.");
        assert_eq!(api.raw_body.as_deref(), Some(body.to_string().as_str()));
    }

    #[tokio::test]
    async fn unexpected_status_gets_generic_sanitized_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/cards"))
            .respond_with(ResponseTemplate::new(201).set_body_string("created/ok"))
            .mount(&server)
            .await;

        let err = transport_for(&server)
            .request(ApiRequest::post("/cards").body(json!({ "title": "x" })))
            .await
            .unwrap_err();
        let NodeError::Api(api) = err else {
            panic!("expected api error");
        };
        assert_eq!(api.status, Some(201));
        assert!(api.message.contains("status code 201"));
        assert!(!api.message.contains('/'));
        assert_eq!(api.description, "created/ok");
    }

    #[tokio::test]
    async fn override_uri_bypasses_base() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/elsewhere"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .mount(&server)
            .await;

        let response = transport_for(&server)
            .request(ApiRequest::get("/ignored").uri(format!("{}/elsewhere", server.uri())))
            .await
            .unwrap();
        assert_eq!(response.data, Some(json!({ "ok": true })));
    }

    #[tokio::test]
    async fn upload_sends_multipart_with_matching_csrf_cookie() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/files"))
            .and(has_header("apikey", "k3y"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": true,
                "resparray": [{ "file_name": "a.txt", "status": "success", "link": "/files/a.txt" }]
            })))
            .mount(&server)
            .await;

        let uploaded = transport_for(&server)
            .upload(FileUpload {
                file_name: "a.txt".into(),
                mime_type: "text/plain".into(),
                content: UploadContent::Buffer(b"hello".to_vec()),
            })
            .await
            .unwrap();
        assert_eq!(uploaded.resparray[0].link, "/files/a.txt");

        let received = server.received_requests().await.unwrap();
        let request = &received[0];
        let cookie = request.headers.get("cookie").unwrap().to_str().unwrap().to_string();
        let token = cookie.strip_prefix("ci_csrf_token=").unwrap();
        let body = String::from_utf8_lossy(&request.body);
        assert!(body.contains("name=\"ci_csrf_token\""));
        assert!(body.contains(token));
        assert!(body.contains("name=\"files[]\"; filename=\"a.txt\""));
        assert!(body.contains("hello"));
    }

    #[tokio::test]
    async fn upload_streams_from_disk() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": true,
                "resparray": [{ "file_name": "b.bin", "status": "success", "link": "/files/b.bin" }]
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("b.bin");
        std::fs::write(&file, b"from-disk").unwrap();

        transport_for(&server)
            .upload(FileUpload {
                file_name: "b.bin".into(),
                mime_type: "application/octet-stream".into(),
                content: UploadContent::File(file),
            })
            .await
            .unwrap();

        let received = server.received_requests().await.unwrap();
        assert!(String::from_utf8_lossy(&received[0].body).contains("from-disk"));
    }

    #[tokio::test]
    async fn download_fetches_relative_link_with_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/abc.pdf"))
            .and(has_header("apikey", "k3y"))
            .and(has_header("kanbanize-integration", "n8n"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(b"%PDF".to_vec(), "application/pdf"),
            )
            .mount(&server)
            .await;

        let file = transport_for(&server).download("/files/abc.pdf").await.unwrap();
        assert_eq!(file.bytes, b"%PDF");
        assert_eq!(file.mime_type.as_deref(), Some("application/pdf"));
    }

    #[tokio::test]
    async fn download_failure_names_the_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = transport_for(&server).download("/files/x").await.unwrap_err();
        assert!(err.to_string().starts_with("Failed to download file from URL"));
    }
}
