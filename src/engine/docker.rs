use super::{ImageEngine, ImageInfo};
use anyhow::Result;
use async_trait::async_trait;
use bollard::image::{CreateImageOptions, ListImagesOptions};
use bollard::Docker;
use futures_util::stream::StreamExt;
use log::debug;

/// [`ImageEngine`] backed by the local Docker daemon.
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connect to the local Docker daemon using default settings.
    /// This handles unix socket on Linux.
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self { docker })
    }
}

#[async_trait]
impl ImageEngine for DockerEngine {
    async fn pull(&self, image: &str) -> Result<()> {
        debug!("Pulling image {}", image);

        let opts = CreateImageOptions {
            from_image: image,
            ..Default::default()
        };

        // Drain the progress stream; only the terminal result matters.
        let mut progress = self.docker.create_image(Some(opts), None, None);
        while let Some(step) = progress.next().await {
            step?;
        }

        Ok(())
    }

    async fn list_images(&self) -> Result<Vec<ImageInfo>> {
        let opts = ListImagesOptions::<String> {
            all: false,
            ..Default::default()
        };
        let images = self.docker.list_images(Some(opts)).await?;

        Ok(images
            .into_iter()
            .map(|img| ImageInfo {
                repo_tags: img.repo_tags,
                id: img.id,
            })
            .collect())
    }
}
