//! Download a bucket's listed objects into a local tree.

use crate::probe::reason;
use s3scan_storage::error::{ErrorKind as StorageErrorKind, Result as StorageResult};
use s3scan_storage::{BucketName, LocalTree, ObjectDescriptor, ProbeClient};
use tokio::io::AsyncWriteExt;
use tracing::instrument;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorStatus {
    /// Object content written to disk; number of bytes.
    Downloaded(u64),
    /// A `/`-terminated placeholder key, recreated as a directory.
    Directory,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorEntry {
    pub key: String,
    pub status: MirrorStatus,
}

/// Per-object outcome of mirroring one bucket, in listing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorOutcome {
    pub entries: Vec<MirrorEntry>,
}
impl MirrorOutcome {
    pub fn downloaded(&self) -> usize {
        self.entries.iter().filter(|e| matches!(e.status, MirrorStatus::Downloaded(_))).count()
    }

    pub fn failed(&self) -> usize {
        self.entries.iter().filter(|e| matches!(e.status, MirrorStatus::Failed(_))).count()
    }

    pub fn bytes(&self) -> u64 {
        self.entries
            .iter()
            .map(|e| match e.status {
                MirrorStatus::Downloaded(bytes) => bytes,
                _ => 0,
            })
            .sum()
    }
}

/// Recreate `objects` under `<tree root>/<bucket>/`.
///
/// Objects are handled one after the other; a failure only affects the
/// object it happened on. Files are not verified after download.
#[instrument(skip_all, fields(bucket = %bucket, objects = objects.len()))]
pub async fn mirror(
    client: &mut dyn ProbeClient,
    bucket: &BucketName,
    region: &str,
    objects: &[ObjectDescriptor],
    tree: &LocalTree,
) -> MirrorOutcome {
    let mut outcome = MirrorOutcome::default();
    for object in objects {
        let status = match mirror_object(client, bucket, region, object, tree).await {
            Ok(status) => status,
            Err(err) => {
                tracing::warn!(key = %object.key, error = %reason(&err), "Could not mirror object");
                MirrorStatus::Failed(reason(&err))
            },
        };
        outcome.entries.push(MirrorEntry {
            key: object.key.clone(),
            status,
        });
    }
    tracing::info!(downloaded = outcome.downloaded(), failed = outcome.failed(), "Mirrored bucket");
    outcome
}

async fn mirror_object(
    client: &mut dyn ProbeClient,
    bucket: &BucketName,
    region: &str,
    object: &ObjectDescriptor,
    tree: &LocalTree,
) -> StorageResult<MirrorStatus> {
    if object.is_directory_placeholder() {
        tree.create_dir(bucket, &object.key).await?;
        return Ok(MirrorStatus::Directory);
    }
    let mut file = tree.create_file(bucket, &object.key).await?;
    let bytes = client.download_object(bucket, region, &object.key, &mut file).await?;
    file.flush().await.map_err(StorageErrorKind::Io)?;
    tracing::debug!(key = %object.key, bytes, "Downloaded object");
    Ok(MirrorStatus::Downloaded(bytes))
}
