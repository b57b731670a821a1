//! Identifier resolution (§4.8): maps an opaque [`crate::iiif::Identifier`]
//! to a local filesystem path, trying an ordered chain of hooks before
//! falling back to the default `{tileRoot}/{id}.jp2` join.
//!
//! Grounded in the Go original's `idToPathPlugins`/`getIIIFPath` chain: each
//! hook gets a chance to claim the identifier; the first to return a path
//! wins; if none claim it, the default join applies.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::SingleFlightCache;
use crate::error::ResolverError;
use crate::iiif::Identifier;

/// A single resolution hook. Returning `Ok(None)` means "not mine, try the
/// next hook"; `Ok(Some(path))` claims the identifier.
#[async_trait::async_trait]
pub trait ResolverHook: Send + Sync {
    async fn resolve(&self, id: &Identifier) -> Result<Option<PathBuf>, ResolverError>;
}

/// The default hook: join the identifier's raw form onto the configured
/// tile root. Always claims (never returns `Ok(None)`) since it's the
/// fallback of last resort.
pub struct FilesystemHook {
    root: PathBuf,
}

impl FilesystemHook {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait::async_trait]
impl ResolverHook for FilesystemHook {
    async fn resolve(&self, id: &Identifier) -> Result<Option<PathBuf>, ResolverError> {
        let raw = id.raw();
        if raw.contains("..") {
            return Err(ResolverError::HookFailed("identifier must not contain '..'".into()));
        }
        let path = self.root.join(raw);
        match tokio::fs::metadata(&path).await {
            Ok(_) => Ok(Some(path)),
            Err(_) => Ok(None),
        }
    }
}

/// Resolves identifiers to filesystem paths through an ordered hook chain,
/// single-flighted per identifier so concurrent first-requests for the same
/// id don't duplicate I/O probing (e.g. a remote-storage hook's network call).
pub struct IdResolver {
    hooks: Vec<Arc<dyn ResolverHook>>,
    default: FilesystemHook,
    inflight: SingleFlightCache<String, PathBuf>,
}

impl IdResolver {
    pub fn new(tile_root: impl Into<PathBuf>, hooks: Vec<Arc<dyn ResolverHook>>) -> Self {
        Self {
            hooks,
            default: FilesystemHook::new(tile_root),
            inflight: SingleFlightCache::new(std::num::NonZeroUsize::new(4096).unwrap()),
        }
    }

    pub async fn resolve(&self, id: &Identifier) -> Result<PathBuf, ResolverError> {
        let key = id.raw().to_string();
        self.inflight
            .get_or_compute(key, || async {
                for hook in &self.hooks {
                    match hook.resolve(id).await {
                        Ok(Some(path)) => return Ok(path),
                        Ok(None) => continue,
                        Err(err) => {
                            tracing::warn!(error = %err, "resolver hook failed, skipping to next hook");
                            continue;
                        }
                    }
                }
                match self.default.resolve(id).await? {
                    Some(path) => Ok(path),
                    None => Err(ResolverError::NotFound),
                }
            })
            .await
    }
}

/// Returns `true` if `path` exists and is readable; used by the `check` CLI
/// subcommand to validate the configured tile root up front.
pub async fn validate_tile_root(path: &Path) -> bool {
    tokio::fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
}
