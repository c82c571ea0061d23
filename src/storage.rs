use anyhow::{Result, anyhow};
use opendal::services::{Fs, Memory, S3};
use opendal::{Operator, layers::RetryLayer};
use std::path::{Path, PathBuf};
use tracing::info;

const ATOMIC_WRITE_DIR: &str = ".ledger-tmp";

/// Storage configuration for the consumption ledger
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub workspace: PathBuf,
}

#[derive(Clone, Debug)]
pub enum StorageBackend {
    Local,
    S3 {
        bucket: String,
        endpoint: Option<String>,
        region: Option<String>,
        access_key_id: String,
        secret_access_key: String,
    },
    /// Process-local, lost on restart. Meant for tests and dry runs.
    Memory,
}

impl StorageConfig {
    pub fn local(workspace: impl Into<PathBuf>) -> Self {
        Self {
            backend: StorageBackend::Local,
            workspace: workspace.into(),
        }
    }

    pub fn memory() -> Self {
        Self {
            backend: StorageBackend::Memory,
            workspace: PathBuf::new(),
        }
    }

    pub fn is_durable(&self) -> bool {
        !matches!(self.backend, StorageBackend::Memory)
    }

    /// Build the operator the ledger reads and writes through
    pub fn build_operator(&self) -> Result<Operator> {
        match &self.backend {
            StorageBackend::Local => build_fs_operator(&self.workspace),
            StorageBackend::S3 {
                bucket,
                endpoint,
                region,
                access_key_id,
                secret_access_key,
            } => build_s3_operator(
                bucket,
                endpoint.as_deref(),
                region.as_deref(),
                access_key_id,
                secret_access_key,
            ),
            StorageBackend::Memory => build_memory_operator(),
        }
    }
}

fn build_fs_operator(root: &Path) -> Result<Operator> {
    info!(root = ?root, "Building filesystem operator");

    let root_str = root
        .to_str()
        .ok_or_else(|| anyhow!("Invalid root path: {:?}", root))?;
    let atomic_dir = root.join(ATOMIC_WRITE_DIR);
    let atomic_dir_str = atomic_dir
        .to_str()
        .ok_or_else(|| anyhow!("Invalid root path: {:?}", root))?;

    let builder = Fs::default().root(root_str).atomic_write_dir(atomic_dir_str);

    Ok(Operator::new(builder)?
        .layer(RetryLayer::new().with_max_times(3))
        .finish())
}

fn build_s3_operator(
    bucket: &str,
    endpoint: Option<&str>,
    region: Option<&str>,
    access_key_id: &str,
    secret_access_key: &str,
) -> Result<Operator> {
    info!(
        bucket = %bucket,
        endpoint = ?endpoint,
        region = ?region,
        "Building S3 operator"
    );

    let mut builder = S3::default();
    builder = builder.bucket(bucket);
    builder = builder.access_key_id(access_key_id);
    builder = builder.secret_access_key(secret_access_key);

    if let Some(region) = region {
        builder = builder.region(region);
    }

    if let Some(endpoint) = endpoint {
        builder = builder.endpoint(endpoint);
    }

    Ok(Operator::new(builder)?
        .layer(RetryLayer::new().with_max_times(3))
        .finish())
}

fn build_memory_operator() -> Result<Operator> {
    info!("Building in-memory operator, ledger will not survive a restart");
    Ok(Operator::new(Memory::default())?.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_operator_writes_under_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig::local(dir.path());
        assert!(config.is_durable());

        let operator = config.build_operator().unwrap();
        operator.write("ledger/probe.json", "[]".to_string()).await.unwrap();

        let on_disk = std::fs::read_to_string(dir.path().join("ledger/probe.json")).unwrap();
        assert_eq!(on_disk, "[]");
    }

    #[tokio::test]
    async fn test_memory_operator_is_shared_between_clones() {
        let config = StorageConfig::memory();
        assert!(!config.is_durable());

        let operator = config.build_operator().unwrap();
        let clone = operator.clone();
        operator.write("probe", b"x".to_vec()).await.unwrap();

        let read = clone.read("probe").await.unwrap();
        assert_eq!(read.to_vec(), b"x".to_vec());
    }
}
