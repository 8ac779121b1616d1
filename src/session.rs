//! A client session: the two workflows side by side.
//!
//! The image and merge workflows are independent controllers. They share
//! the HTTP client (stateless, connection pooled) and the download sink,
//! but no mutable state, so both can have a submission in flight at once.

use crate::config::ClientConfig;
use crate::download::{ArtifactSink, Downloader};
use crate::error::ConvmergeError;
use crate::progress::ProgressCallback;
use crate::status::StatusReport;
use crate::transport::{HealthStatus, HttpTransport, Transport};
use crate::workflow::{Workflow, WorkflowKind};
use std::sync::Arc;
use tracing::debug;

/// Both workflows for one user session.
pub struct Session {
    image: Workflow,
    pdf: Workflow,
    transport: Arc<dyn Transport>,
}

impl Session {
    /// Session talking HTTP to `config.base_url` and saving into
    /// `config.output_dir`.
    pub fn new(config: &ClientConfig) -> Result<Self, ConvmergeError> {
        let transport = Arc::new(HttpTransport::new(config)?);
        let sink = Arc::new(Downloader::from_config(config));
        Ok(Self::with_parts(config, transport, sink))
    }

    /// Session over caller-supplied transport and sink.
    pub fn with_parts(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn ArtifactSink>,
    ) -> Self {
        debug!("New session against {}", config.base_url);
        Self {
            image: Workflow::new(
                WorkflowKind::ImageConversion,
                config.image_options(),
                Arc::clone(&transport),
                Arc::clone(&sink),
            ),
            pdf: Workflow::new(
                WorkflowKind::PdfMerge,
                config.image_options(),
                Arc::clone(&transport),
                sink,
            ),
            transport,
        }
    }

    /// Attach the same progress callback to both workflows.
    pub fn with_progress(self, callback: ProgressCallback) -> Self {
        Self {
            image: self.image.with_progress(Arc::clone(&callback)),
            pdf: self.pdf.with_progress(callback),
            transport: self.transport,
        }
    }

    pub fn image(&self) -> &Workflow {
        &self.image
    }

    pub fn pdf(&self) -> &Workflow {
        &self.pdf
    }

    pub fn workflow(&self, kind: WorkflowKind) -> &Workflow {
        match kind {
            WorkflowKind::ImageConversion => &self.image,
            WorkflowKind::PdfMerge => &self.pdf,
        }
    }

    /// Status of both workflows, image first.
    pub fn reports(&self) -> Vec<StatusReport> {
        vec![self.image.report(), self.pdf.report()]
    }

    /// Ask the service whether it is up.
    pub async fn health(&self) -> Result<HealthStatus, ConvmergeError> {
        self.transport.health().await
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("image", &self.image)
            .field("pdf", &self.pdf)
            .field("transport", &"<dyn Transport>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::Delivery;
    use crate::file::FileHandle;
    use crate::transport::{OutboundRequest, ServiceReply};
    use crate::workflow::Phase;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use tokio::sync::Notify;

    /// Holds merge requests until released; answers image requests at once.
    struct SplitTransport {
        merge_gate: Arc<Notify>,
    }

    #[async_trait]
    impl Transport for SplitTransport {
        async fn send(&self, request: OutboundRequest) -> Result<ServiceReply, ConvmergeError> {
            if request.kind == WorkflowKind::PdfMerge {
                self.merge_gate.notified().await;
            }
            Ok(ServiceReply {
                status: 200,
                body: b"ok".to_vec(),
            })
        }
    }

    struct NullSink;

    #[async_trait]
    impl ArtifactSink for NullSink {
        async fn deliver(
            &self,
            payload: Vec<u8>,
            filename: &str,
        ) -> Result<Delivery, ConvmergeError> {
            Ok(Delivery {
                filename: filename.to_string(),
                path: PathBuf::from(filename),
                bytes: payload.len() as u64,
            })
        }
    }

    #[tokio::test]
    async fn workflows_run_independently() {
        let gate = Arc::new(Notify::new());
        let session = Arc::new(Session::with_parts(
            &ClientConfig::default(),
            Arc::new(SplitTransport {
                merge_gate: gate.clone(),
            }),
            Arc::new(NullSink),
        ));

        session.pdf().stage(vec![
            FileHandle::from_bytes("a.pdf", "application/pdf", b"%PDF".to_vec()),
            FileHandle::from_bytes("b.pdf", "application/pdf", b"%PDF".to_vec()),
        ]);
        session
            .image()
            .stage(vec![FileHandle::from_bytes("p.png", "image/png", vec![1])]);

        let merge = {
            let s = Arc::clone(&session);
            tokio::spawn(async move { s.pdf().submit().await })
        };
        while session.pdf().phase() != Phase::Submitting {
            tokio::task::yield_now().await;
        }

        // The merge is stuck in flight; the image workflow is unaffected.
        let image = session.image().submit().await.unwrap();
        assert!(image.is_success());
        assert_eq!(session.image().phase(), Phase::Succeeded);
        assert_eq!(session.pdf().phase(), Phase::Submitting);

        gate.notify_one();
        assert!(merge.await.unwrap().unwrap().is_success());

        let reports = session.reports();
        assert_eq!(reports[0].workflow, WorkflowKind::ImageConversion);
        assert_eq!(reports[1].phase, Phase::Succeeded);
        assert_eq!(reports[1].files.len(), 2);
    }

    #[test]
    fn workflow_lookup_by_kind() {
        let session = Session::new(&ClientConfig::default()).unwrap();
        assert_eq!(
            session.workflow(WorkflowKind::PdfMerge).kind(),
            WorkflowKind::PdfMerge
        );
        assert_eq!(
            session.workflow(WorkflowKind::ImageConversion).kind(),
            WorkflowKind::ImageConversion
        );
    }
}
