use anyhow::Result;
use async_trait::async_trait;

pub mod docker;
pub use docker::DockerEngine;

/// One image known to the engine after the pull phase.
#[derive(Debug, Clone)]
pub struct ImageInfo {
    /// Repository tags attached to this image, e.g. `alpine:latest`.
    pub repo_tags: Vec<String>,
    /// Engine-assigned content id for the image.
    pub id: String,
}

/// Boundary to the container image engine.
///
/// The build cycle only needs two capabilities: pulling an image (progress
/// output is the engine's business, not surfaced) and listing the images the
/// engine currently knows together with their ids.
#[async_trait]
pub trait ImageEngine: Send + Sync {
    /// Pull `image` and wait until the pull has fully completed.
    async fn pull(&self, image: &str) -> Result<()>;

    /// List all images with their tags and ids.
    async fn list_images(&self) -> Result<Vec<ImageInfo>>;
}
