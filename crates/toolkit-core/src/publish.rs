//! Release publishing: create the release, then attach the binary.
//!
//! The binary is checked before anything is created so a missing file never
//! leaves an empty release behind. What happens when the upload itself fails
//! is governed by [`AssetFailurePolicy`].

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::config::AssetFailurePolicy;
use crate::github::{Asset, NewRelease, Release, ReleaseApi, ReleaseError, Repo};

/// Errors from publishing a release.
#[derive(Error, Debug)]
pub enum PublishError {
    /// The binary to attach does not exist.
    #[error("release asset not found: {path}")]
    AssetNotFound {
        /// The missing file.
        path: Utf8PathBuf,
    },

    /// Creating the release failed.
    #[error("could not create release {tag}: {source}")]
    Create {
        /// Tag of the release.
        tag: String,
        /// API failure.
        source: ReleaseError,
    },

    /// Uploading the asset failed after the release was created.
    #[error("could not upload asset to release {tag}: {source}")]
    Upload {
        /// Tag of the release.
        tag: String,
        /// Whether the release was deleted again.
        rolled_back: bool,
        /// API failure.
        source: ReleaseError,
    },

    /// The upload failed and so did deleting the release.
    #[error("could not upload asset to release {tag} ({upload}); deleting the release also failed: {delete}")]
    RollbackFailed {
        /// Tag of the release.
        tag: String,
        /// The upload failure.
        upload: ReleaseError,
        /// The delete failure.
        delete: ReleaseError,
    },
}

/// Result alias for publishing.
pub type PublishResult<T> = Result<T, PublishError>;

/// A binary to attach to the release.
#[derive(Debug, Clone, Copy)]
pub struct AssetUpload<'a> {
    /// Name shown on the release page.
    pub name: &'a str,
    /// Local file to upload.
    pub path: &'a Utf8Path,
}

/// Everything needed to publish one release.
#[derive(Debug, Clone)]
pub struct PublishRequest<'a> {
    /// Target repository.
    pub repo: Repo<'a>,
    /// Tag and display name, e.g. `v1.2.3`.
    pub tag: String,
    /// Release notes.
    pub body: String,
    /// Optional binary.
    pub asset: Option<AssetUpload<'a>>,
}

/// What publishing produced.
#[derive(Debug, Clone, Serialize)]
pub struct PublishOutcome {
    /// The created release.
    pub release: Release,
    /// The uploaded asset, if any.
    pub asset: Option<Asset>,
    /// Upload failure tolerated under [`AssetFailurePolicy::Warn`].
    pub asset_warning: Option<String>,
}

/// Create the release and upload the asset, applying `policy` to upload failures.
#[instrument(skip_all, fields(tag = %request.tag, policy = %policy))]
pub fn publish(
    api: &dyn ReleaseApi,
    request: &PublishRequest<'_>,
    policy: AssetFailurePolicy,
) -> PublishResult<PublishOutcome> {
    if let Some(asset) = request.asset
        && !asset.path.is_file()
    {
        return Err(PublishError::AssetNotFound {
            path: asset.path.to_path_buf(),
        });
    }

    let new_release = NewRelease {
        tag_name: request.tag.clone(),
        name: request.tag.clone(),
        body: request.body.clone(),
    };
    let release = api
        .create_release(request.repo, &new_release)
        .map_err(|source| PublishError::Create {
            tag: request.tag.clone(),
            source,
        })?;

    let Some(upload) = request.asset else {
        return Ok(PublishOutcome {
            release,
            asset: None,
            asset_warning: None,
        });
    };

    match api.upload_asset(request.repo, release.id, upload.name, upload.path) {
        Ok(asset) => Ok(PublishOutcome {
            release,
            asset: Some(asset),
            asset_warning: None,
        }),
        Err(source) => match policy {
            AssetFailurePolicy::Fail => Err(PublishError::Upload {
                tag: request.tag.clone(),
                rolled_back: false,
                source,
            }),
            AssetFailurePolicy::Warn => {
                warn!(error = %source, "asset upload failed; keeping release without binary");
                Ok(PublishOutcome {
                    release,
                    asset: None,
                    asset_warning: Some(source.to_string()),
                })
            }
            AssetFailurePolicy::Rollback => {
                info!(release_id = release.id, "asset upload failed; deleting release");
                match api.delete_release(request.repo, release.id) {
                    Ok(()) => Err(PublishError::Upload {
                        tag: request.tag.clone(),
                        rolled_back: true,
                        source,
                    }),
                    Err(delete) => Err(PublishError::RollbackFailed {
                        tag: request.tag.clone(),
                        upload: source,
                        delete,
                    }),
                }
            }
        },
    }
}
