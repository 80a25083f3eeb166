use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use mosaic_clustering::{HdbscanConfig, ImageClusterer, SelectionMethod};
use mosaic_inference::{RemoteCaptioner, RemoteEmbedder};
use mosaic_pipeline::{DiskStorage, ImageItem, JsonRenderer, Renderer, Storage, run_pipeline};
use mosaic_server::{AppState, UploadLimits, router};

#[derive(Parser)]
#[command(name = "mosaic", about = "Cluster batches of images and describe each group")]
struct Cli {
    /// Base URL of the embedding service
    #[arg(long, default_value = "http://127.0.0.1:8601")]
    embed_url: String,

    /// Base URL of the captioning service
    #[arg(long, default_value = "http://127.0.0.1:8602")]
    caption_url: String,

    /// Smallest group reported as a cluster (values below 2 are clamped)
    #[arg(long, default_value_t = 2)]
    min_cluster_size: usize,

    /// Density-estimation neighborhood size
    #[arg(long, default_value_t = 1)]
    min_samples: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the clustering API over HTTP
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to listen on
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Cluster a folder of images and save the results to disk
    Run {
        /// Folder with input images
        #[arg(long)]
        input: PathBuf,
        /// Output folder (default: output_<timestamp>)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    let clusterer = ImageClusterer::new(HdbscanConfig {
        min_cluster_size: cli.min_cluster_size,
        min_samples: cli.min_samples,
        selection: SelectionMethod::Leaf,
    })?;
    let embedder = RemoteEmbedder::new(&cli.embed_url);
    let describer = RemoteCaptioner::new(&cli.caption_url);

    match cli.command {
        Command::Serve { host, port } => {
            let state = AppState {
                embedder: Arc::new(embedder),
                clusterer: Arc::new(clusterer),
                describer: Arc::new(describer),
                limits: UploadLimits::default(),
            };

            let addr: SocketAddr = format!("{host}:{port}")
                .parse()
                .context("invalid listen address")?;
            info!("Serving clustering API on {addr}");

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, router(state)).await?;
        }
        Command::Run { input, output } => {
            let images = load_images(&input)?;
            let clusters = run_pipeline(images, &embedder, &clusterer, &describer).await?;

            let output = output.unwrap_or_else(|| {
                PathBuf::from(format!(
                    "output_{}",
                    chrono::Local::now().format("%Y%m%d_%H%M%S")
                ))
            });
            DiskStorage::new(&output).save(&clusters)?;

            let rendered = JsonRenderer::new().render(&clusters)?;
            std::fs::write(output.join("clusters.json"), &rendered)
                .context("writing clusters.json")?;

            info!(
                "Clustering and description completed. Results in {}",
                output.display()
            );
        }
    }

    Ok(())
}

/// Load every image with a known extension from `folder`, in path order.
fn load_images(folder: &Path) -> Result<Vec<ImageItem>> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in std::fs::read_dir(folder)
        .with_context(|| format!("reading image folder {}", folder.display()))?
    {
        let path = entry?.path();
        if has_image_extension(&path) {
            paths.push(path);
        }
    }
    paths.sort();

    if paths.is_empty() {
        bail!("no images found in {}", folder.display());
    }

    info!("Loading {} images from {}", paths.len(), folder.display());
    let mut images = Vec::with_capacity(paths.len());
    for path in paths {
        let id = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        let data =
            image::open(&path).with_context(|| format!("opening image {}", path.display()))?;
        images.push(ImageItem::new(id, data));
    }
    Ok(images)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            matches!(ext.as_str(), "jpg" | "jpeg" | "png")
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_extensions_are_case_insensitive() {
        assert!(has_image_extension(Path::new("photo.JPG")));
        assert!(has_image_extension(Path::new("photo.jpeg")));
        assert!(has_image_extension(Path::new("photo.png")));
        assert!(!has_image_extension(Path::new("notes.txt")));
        assert!(!has_image_extension(Path::new("archive")));
    }

    #[test]
    fn missing_folder_is_reported() {
        let err = load_images(Path::new("/definitely/not/a/folder")).unwrap_err();
        assert!(err.to_string().contains("reading image folder"));
    }
}
