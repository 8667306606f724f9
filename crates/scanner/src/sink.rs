use crate::result::ProbeResult;
use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

/// Receives each finished [`ProbeResult`].
///
/// Called concurrently from every scan worker, once per bucket, in
/// completion order.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn emit(&self, result: ProbeResult);
}

#[async_trait]
impl ResultSink for UnboundedSender<ProbeResult> {
    async fn emit(&self, result: ProbeResult) {
        if self.send(result).is_err() {
            tracing::debug!("Result receiver dropped; discarding result");
        }
    }
}
