use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use data_encoding::BASE64;
use log::{debug, warn};
use reqwest::Client;
use rocket::tokio::sync::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A decoded file ready to hand to the storage service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
}

impl FileUpload {
    /// The file as a `data:` URI, which is what the upload service accepts.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, BASE64.encode(&self.bytes))
    }

    /// A name that will not collide with earlier uploads of the same file.
    fn public_id(&self) -> String {
        let nonce: u32 = rand::random();
        format!(
            "{}-{nonce:08x} - {}",
            Utc::now().timestamp_millis(),
            self.file_name
        )
    }
}

/// Somewhere uploaded files can be kept, addressed by a stable URL.
#[rocket::async_trait]
pub trait FileStorage: Send + Sync {
    /// Store the file under the given folder and return its public URL.
    async fn upload(&self, file: &FileUpload, folder: &str) -> Result<String>;
}

/// Request body understood by the upload endpoint.
#[derive(Serialize)]
struct UploadRequest<'a> {
    file: String,
    folder: &'a str,
    public_id: String,
    resource_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    upload_preset: Option<&'a str>,
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
}

/// Uploads files to an HTTP endpoint speaking the Cloudinary upload protocol.
pub struct HttpFileStorage {
    client: Client,
    url: String,
    preset: Option<String>,
}

impl HttpFileStorage {
    pub fn new(url: String, preset: Option<String>) -> Self {
        Self {
            client: Client::new(),
            url,
            preset,
        }
    }
}

#[rocket::async_trait]
impl FileStorage for HttpFileStorage {
    async fn upload(&self, file: &FileUpload, folder: &str) -> Result<String> {
        let body = UploadRequest {
            file: file.data_uri(),
            folder,
            public_id: file.public_id(),
            resource_type: "auto",
            upload_preset: self.preset.as_deref(),
        };

        let response = self.client.post(&self.url).json(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!("Upload of '{}' refused with {status}: {text}", file.file_name);
            return Err(Error::Upload(format!("storage service replied {status}")));
        }

        let reply: UploadResponse = response.json().await?;
        let url = reply
            .secure_url
            .ok_or_else(|| Error::Upload("no URL in storage service reply".to_string()))?;
        debug!("Uploaded '{}' to {url}", file.file_name);
        Ok(url)
    }
}

/// Keeps uploads in process memory. Used when no upload service is
/// configured, and in tests.
#[derive(Default)]
pub struct MemoryFileStorage {
    files: Mutex<Vec<(String, FileUpload)>>,
    fail: AtomicBool,
}

impl MemoryFileStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent upload fail (or succeed again).
    pub fn fail_uploads(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// URLs of everything uploaded so far, oldest first.
    pub async fn uploaded(&self) -> Vec<String> {
        self.files
            .lock()
            .await
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }
}

#[rocket::async_trait]
impl FileStorage for MemoryFileStorage {
    async fn upload(&self, file: &FileUpload, folder: &str) -> Result<String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Upload("storage unavailable".to_string()));
        }
        let mut files = self.files.lock().await;
        let url = format!("memory://{folder}/{}/{}", files.len(), file.file_name);
        files.push((url.clone(), file.clone()));
        Ok(url)
    }
}
