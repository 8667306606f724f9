//! Local mirror directory.
//!
//! Downloaded objects land in `<root>/<bucket>/<key>`, with the key's `/`
//! separators turned into real directories. Files are created with
//! `tokio::fs` for async I/O.

use crate::error::{ErrorKind, Result};
use crate::{BucketName, path::validate as validate_key};
use exn::ResultExt;
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};

/// Root of a local bucket mirror.
///
/// # Examples
///
/// ```no_run
/// use s3scan_storage::{BucketName, LocalTree};
///
/// # async fn example() -> s3scan_storage::error::Result<()> {
/// let tree = LocalTree::new("./dump")?;
/// let bucket = BucketName::normalize("s3://acme-assets");
/// let file = tree.create_file(&bucket, "css/site.css").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LocalTree {
    root: PathBuf,
}
impl LocalTree {
    /// Open (creating if needed) a mirror root.
    ///
    /// Relative paths are resolved against the current working directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the path exists but is not a directory, or cannot
    /// be created.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = std::path::absolute(root.as_ref()).or_raise(|| ErrorKind::InvalidPath(root.as_ref().to_path_buf()))?;
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidPath(root));
            }
        } else {
            // Use non-async here; it happens once at startup and it's not
            // worth making the constructor async.
            sync_create_dir(&root).map_err(ErrorKind::Io)?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding everything mirrored from `bucket`.
    pub fn bucket_dir(&self, bucket: &BucketName) -> Result<PathBuf> {
        Ok(self.root.join(validate_key(bucket.as_str())?))
    }

    /// Local path an object key maps to. Keys that would escape the
    /// bucket directory are rejected.
    pub fn object_path(&self, bucket: &BucketName, key: &str) -> Result<PathBuf> {
        Ok(self.bucket_dir(bucket)?.join(validate_key(key)?))
    }

    /// Create the directory for a `/`-terminated placeholder key.
    pub async fn create_dir(&self, bucket: &BucketName, key: &str) -> Result<PathBuf> {
        let path = self.object_path(bucket, key)?;
        fs::create_dir_all(&path).await.map_err(ErrorKind::Io)?;
        Ok(path)
    }

    /// Create (or truncate) the file for an object key, creating parent
    /// directories as needed.
    pub async fn create_file(&self, bucket: &BucketName, key: &str) -> Result<File> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(ErrorKind::Io)?;
        }
        Ok(File::create(&path).await.map_err(ErrorKind::Io)?)
    }
}
