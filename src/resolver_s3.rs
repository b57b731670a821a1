//! Example resolver hook backed by S3: fetches an object to a local temp
//! path on first reference, so the rest of the pipeline (which requires a
//! local file for the `jpeg2k` binding) never has to know the source was
//! remote. Gated behind the `s3-resolver` feature; not wired in by default.
//!
//! Grounded in the donor's S3 client construction and connectivity check in
//! its startup path, adapted from a slide-listing collaborator into an
//! identifier-resolution one.

use std::path::PathBuf;

use aws_sdk_s3::Client;

use crate::error::ResolverError;
use crate::iiif::Identifier;
use crate::resolver::ResolverHook;

pub struct S3Hook {
    client: Client,
    bucket: String,
    cache_dir: PathBuf,
}

impl S3Hook {
    pub async fn new(bucket: impl Into<String>, cache_dir: impl Into<PathBuf>) -> Self {
        let config = aws_config::load_from_env().await;
        Self {
            client: Client::new(&config),
            bucket: bucket.into(),
            cache_dir: cache_dir.into(),
        }
    }
}

#[async_trait::async_trait]
impl ResolverHook for S3Hook {
    async fn resolve(&self, id: &Identifier) -> Result<Option<PathBuf>, ResolverError> {
        let key = id.raw();
        let dest = self.cache_dir.join(key);
        if tokio::fs::metadata(&dest).await.is_ok() {
            return Ok(Some(dest));
        }

        let object = match self.client.get_object().bucket(&self.bucket).key(key).send().await {
            Ok(object) => object,
            Err(_) => return Ok(None),
        };

        let bytes = object
            .body
            .collect()
            .await
            .map_err(|e| ResolverError::HookFailed(format!("reading s3 body: {e}")))?
            .into_bytes();

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ResolverError::HookFailed(format!("creating cache dir: {e}")))?;
        }
        tokio::fs::write(&dest, &bytes)
            .await
            .map_err(|e| ResolverError::HookFailed(format!("writing cached object: {e}")))?;

        Ok(Some(dest))
    }
}
