//! Outbound requests and the transport that carries them.
//!
//! Building a request is pure: [`build_image_request`] and
//! [`build_merge_request`] turn staged files and options into an
//! [`OutboundRequest`], a plain ordered list of form fields. Only the
//! [`Transport`] implementation touches the network, which keeps the field
//! layout testable without a server and lets tests swap in a fake.
//!
//! ## Wire format
//!
//! | Endpoint | Fields |
//! |----------|--------|
//! | `POST /convert-image` | `file` (binary), `out` (format), `quality` (1–100) |
//! | `POST /merge-pdfs`    | `files` (binary, repeated in merge order) |
//!
//! A 2xx reply carries the artifact bytes; anything else carries error text.

use crate::config::{ClientConfig, ImageOptions};
use crate::error::ConvmergeError;
use crate::file::FileHandle;
use crate::workflow::WorkflowKind;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One multipart form field.
#[derive(Debug, Clone)]
pub enum FormPart {
    File {
        field: &'static str,
        file: FileHandle,
    },
    Text {
        field: &'static str,
        value: String,
    },
}

impl FormPart {
    pub fn field(&self) -> &'static str {
        match self {
            FormPart::File { field, .. } | FormPart::Text { field, .. } => *field,
        }
    }
}

/// A fully-built submission, ready for a [`Transport`].
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub kind: WorkflowKind,
    /// Form fields in the order they are sent.
    pub parts: Vec<FormPart>,
}

impl OutboundRequest {
    /// Endpoint path, e.g. `/convert-image`.
    pub fn endpoint(&self) -> &'static str {
        self.kind.endpoint()
    }

    /// Names of the attached files, in send order.
    pub fn file_names(&self) -> Vec<&str> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                FormPart::File { file, .. } => Some(file.name()),
                FormPart::Text { .. } => None,
            })
            .collect()
    }

    /// Value of the first text field called `field`.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.parts.iter().find_map(|p| match p {
            FormPart::Text { field: f, value } if *f == field => Some(value.as_str()),
            _ => None,
        })
    }
}

/// Request for `/convert-image`.
///
/// `quality` is always sent; the service ignores it for lossless formats.
pub fn build_image_request(file: &FileHandle, options: &ImageOptions) -> OutboundRequest {
    OutboundRequest {
        kind: WorkflowKind::ImageConversion,
        parts: vec![
            FormPart::File {
                field: "file",
                file: file.clone(),
            },
            FormPart::Text {
                field: "out",
                value: options.format.as_str().to_string(),
            },
            FormPart::Text {
                field: "quality",
                value: options.quality.to_string(),
            },
        ],
    }
}

/// Request for `/merge-pdfs`, one `files` field per document in merge order.
pub fn build_merge_request(files: &[FileHandle]) -> OutboundRequest {
    OutboundRequest {
        kind: WorkflowKind::PdfMerge,
        parts: files
            .iter()
            .map(|f| FormPart::File {
                field: "files",
                file: f.clone(),
            })
            .collect(),
    }
}

/// Raw service reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceReply {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ServiceReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Body of the service's `GET /` health endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Carries requests to the conversion service.
///
/// Implementations report connection-level failures as
/// [`ConvmergeError::Transport`] and return every HTTP reply, success or
/// not, as a [`ServiceReply`]. They never retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> Result<ServiceReply, ConvmergeError>;

    async fn health(&self) -> Result<HealthStatus, ConvmergeError> {
        Err(ConvmergeError::Internal(
            "health check not supported by this transport".into(),
        ))
    }
}

/// [`Transport`] over HTTP with a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ConvmergeError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("convmerge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConvmergeError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    async fn to_form(parts: Vec<FormPart>) -> Result<Form, ConvmergeError> {
        let mut form = Form::new();
        for part in parts {
            form = match part {
                FormPart::Text { field, value } => form.text(field, value),
                FormPart::File { field, file } => {
                    let bytes = file.read().await?;
                    let mut body = Part::bytes(bytes).file_name(file.name().to_string());
                    if !file.media_type().is_empty() {
                        body = body.mime_str(file.media_type())?;
                    }
                    form.part(field, body)
                }
            };
        }
        Ok(form)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: OutboundRequest) -> Result<ServiceReply, ConvmergeError> {
        let url = self.config.endpoint_url(request.endpoint());
        debug!("POST {} ({} fields)", url, request.parts.len());

        let form = Self::to_form(request.parts).await?;
        let response = self.client.post(&url).multipart(form).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();

        debug!("{} answered HTTP {} with {} bytes", url, status, body.len());
        Ok(ServiceReply { status, body })
    }

    async fn health(&self) -> Result<HealthStatus, ConvmergeError> {
        let url = self.config.endpoint_url("/");
        let response = self.client.get(&url).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        if !(200..300).contains(&status) {
            return Err(ConvmergeError::from_service_body(status, &body));
        }
        serde_json::from_slice(&body).map_err(|e| {
            ConvmergeError::Transport(format!("unexpected health response: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;

    fn pdf(name: &str) -> FileHandle {
        FileHandle::from_bytes(name, "application/pdf", b"%PDF".to_vec())
    }

    #[test]
    fn image_request_fields() {
        let file = FileHandle::from_bytes("photo.png", "image/png", vec![0u8; 4]);
        let req = build_image_request(&file, &ImageOptions::new(OutputFormat::Jpg, 80));

        assert_eq!(req.endpoint(), "/convert-image");
        let fields: Vec<_> = req.parts.iter().map(FormPart::field).collect();
        assert_eq!(fields, ["file", "out", "quality"]);
        assert_eq!(req.file_names(), ["photo.png"]);
        assert_eq!(req.text("out"), Some("jpg"));
        assert_eq!(req.text("quality"), Some("80"));
    }

    #[test]
    fn inert_quality_is_still_sent() {
        let file = FileHandle::from_bytes("a.jpg", "image/jpeg", vec![]);
        let req = build_image_request(&file, &ImageOptions::new(OutputFormat::Png, 33));
        assert_eq!(req.text("out"), Some("png"));
        assert_eq!(req.text("quality"), Some("33"));
    }

    #[test]
    fn deserialized_options_never_send_quality_zero() {
        let options: ImageOptions =
            serde_json::from_str(r#"{"format":"jpg","quality":0}"#).unwrap();
        let file = FileHandle::from_bytes("a.png", "image/png", vec![]);
        let req = build_image_request(&file, &options);
        assert_eq!(req.text("quality"), Some("1"));
    }

    #[test]
    fn merge_request_keeps_order() {
        let files = [pdf("c.pdf"), pdf("a.pdf"), pdf("b.pdf")];
        let req = build_merge_request(&files);

        assert_eq!(req.endpoint(), "/merge-pdfs");
        assert!(req.parts.iter().all(|p| p.field() == "files"));
        assert_eq!(req.file_names(), ["c.pdf", "a.pdf", "b.pdf"]);
        assert_eq!(req.text("out"), None);
    }

    #[test]
    fn reply_success_range() {
        let reply = |status| ServiceReply {
            status,
            body: vec![],
        };
        assert!(reply(200).is_success());
        assert!(reply(204).is_success());
        assert!(!reply(304).is_success());
        assert!(!reply(500).is_success());
    }

    #[test]
    fn health_status_parses() {
        let h: HealthStatus =
            serde_json::from_str(r#"{"status":"ok","message":"API running. Go to /docs"}"#)
                .unwrap();
        assert!(h.is_ok());
        let h: HealthStatus = serde_json::from_str(r#"{"status":"degraded"}"#).unwrap();
        assert!(!h.is_ok());
        assert_eq!(h.message, None);
    }
}
