//! Disk persistence for clustering results.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::debug;

use crate::model::Cluster;
use crate::stages::Storage;

/// Storage that writes each cluster into its own subdirectory.
///
/// Layout under the output root:
///
/// ```text
/// cluster_<label>/
///     <image id>        (one file per member image)
///     description.txt   (only when a description exists)
/// ```
#[derive(Debug, Clone)]
pub struct DiskStorage {
    output_dir: PathBuf,
}

impl DiskStorage {
    /// Create a disk storage rooted at `output_dir`. The directory is
    /// created on the first save.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// The configured output root.
    pub fn output_dir(&self) -> &PathBuf {
        &self.output_dir
    }
}

impl Storage for DiskStorage {
    fn save(&self, clusters: &[Cluster]) -> Result<()> {
        for cluster in clusters {
            let dir = self.output_dir.join(format!("cluster_{}", cluster.label));
            fs::create_dir_all(&dir)
                .with_context(|| format!("creating cluster directory {}", dir.display()))?;

            for image in &cluster.images {
                let path = dir.join(&image.id);
                image
                    .data
                    .save(&path)
                    .with_context(|| format!("saving image {}", path.display()))?;
            }

            if let Some(description) = &cluster.description {
                fs::write(dir.join("description.txt"), description)
                    .with_context(|| format!("writing description for cluster {}", cluster.label))?;
            }

            debug!(
                "Saved cluster {} ({} images) to {}",
                cluster.label,
                cluster.images.len(),
                dir.display()
            );
        }

        Ok(())
    }
}
