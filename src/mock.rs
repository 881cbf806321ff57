use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{NodeError, Result};
use crate::transport::{
    ApiRequest, ApiResponse, Download, FileUpload, Transport, UploadResponse,
};

/// A transport that records every call and answers from a queue.
/// Requests with nothing queued get an empty 200.
#[derive(Default)]
pub struct MockTransport {
    requests: Mutex<Vec<ApiRequest>>,
    uploads: Mutex<Vec<FileUpload>>,
    downloads: Mutex<Vec<String>>,
    replies: Mutex<VecDeque<Result<ApiResponse>>>,
    upload_reply: Mutex<Option<Result<UploadResponse>>>,
    download_reply: Mutex<Option<Result<Download>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, status: u16, body: Value) -> Self {
        self.push(Ok(ApiResponse::json(status, body)));
        self
    }

    pub fn fail(self, err: NodeError) -> Self {
        self.push(Err(err));
        self
    }

    pub fn push(&self, reply: Result<ApiResponse>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn with_upload(self, reply: Result<UploadResponse>) -> Self {
        *self.upload_reply.lock().unwrap() = Some(reply);
        self
    }

    pub fn with_download(self, reply: Result<Download>) -> Self {
        *self.download_reply.lock().unwrap() = Some(reply);
        self
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> ApiRequest {
        self.requests().pop().expect("no request was sent")
    }

    pub fn uploads(&self) -> Vec<FileUpload> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }

    /// Every call of any kind that reached the transport.
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
            + self.uploads.lock().unwrap().len()
            + self.downloads.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ApiResponse::json(200, Value::Null)))
    }

    async fn upload(&self, upload: FileUpload) -> Result<UploadResponse> {
        self.uploads.lock().unwrap().push(upload);
        self.upload_reply
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Ok(UploadResponse::default()))
    }

    async fn download(&self, link: &str) -> Result<Download> {
        self.downloads.lock().unwrap().push(link.to_string());
        self.download_reply
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Ok(Download::default()))
    }
}
