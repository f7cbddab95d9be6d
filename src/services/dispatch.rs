use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Job kind tag the preview worker accepts; anything else is skipped.
pub const MEDIA_PROCESSING_JOB: &str = "media-processing";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingJob {
    pub name: String,
    pub media_id: String,
}

impl ProcessingJob {
    pub fn for_media(media_id: impl Into<String>) -> Self {
        Self {
            name: MEDIA_PROCESSING_JOB.to_string(),
            media_id: media_id.into(),
        }
    }
}

/// Boundary to the queue transport. Delivery is at-least-once with an opaque
/// `{media_id}` payload; retry and backoff policy live on the transport side.
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    async fn dispatch(&self, job: ProcessingJob) -> anyhow::Result<()>;
}

/// In-process transport: a bounded tokio channel drained by the preview
/// worker when api and worker run in the same binary.
#[derive(Clone)]
pub struct ChannelDispatcher {
    tx: mpsc::Sender<ProcessingJob>,
}

pub fn processing_channel(capacity: usize) -> (ChannelDispatcher, mpsc::Receiver<ProcessingJob>) {
    let (tx, rx) = mpsc::channel(capacity);
    (ChannelDispatcher { tx }, rx)
}

#[async_trait]
impl JobDispatcher for ChannelDispatcher {
    async fn dispatch(&self, job: ProcessingJob) -> anyhow::Result<()> {
        self.tx
            .send(job)
            .await
            .map_err(|_| anyhow::anyhow!("processing queue is closed"))
    }
}
