//! Local cache of media referenced by blocks.
//!
//! A cached file is identified by its name alone: `<owner id>-<remote file
//! name>`. A file that already exists is never fetched or converted again, so
//! repeated runs are cheap and safe. Failed downloads and conversions are
//! logged and skipped; the returned name stays the same either way.

use crate::error::ResourceError;
use crate::model::MediaSource;
use crate::utils::{derivative_name, is_scalable, resource_basename};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

pub type BoxError = Box<dyn Error + Send + Sync>;

/// Downloads remote resources
#[allow(async_fn_in_trait)]
pub trait ResourceFetcher {
    /// Fetch `url`, returning the status code and body
    async fn get(&self, url: &str, timeout: Duration) -> Result<(u16, Vec<u8>), BoxError>;
}

/// Produces downscaled copies of images
#[allow(async_fn_in_trait)]
pub trait ImageScaler {
    /// Write a copy of `input` fitting in a `max_dim` x `max_dim` box to `output`
    async fn scale(&self, input: &Path, output: &Path, max_dim: u32) -> Result<(), BoxError>;
}

/// Fetcher over a shared reqwest client
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResourceFetcher for HttpFetcher {
    async fn get(&self, url: &str, timeout: Duration) -> Result<(u16, Vec<u8>), BoxError> {
        let response = self.client.get(url).timeout(timeout).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok((status, body.to_vec()))
    }
}

/// Scaler running ImageMagick's `convert` as a child process
#[derive(Debug, Clone)]
pub struct ConvertScaler {
    program: String,
}

impl Default for ConvertScaler {
    fn default() -> Self {
        Self {
            program: "convert".to_string(),
        }
    }
}

impl ConvertScaler {
    /// Use a different executable, e.g. `magick`
    pub fn with_program(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }
}

impl ImageScaler for ConvertScaler {
    async fn scale(&self, input: &Path, output: &Path, max_dim: u32) -> Result<(), BoxError> {
        let status = Command::new(&self.program)
            .arg(input)
            .arg("-geometry")
            .arg(format!("{}x{}", max_dim, max_dim))
            .arg(output)
            .status()
            .await?;
        if status.success() {
            Ok(())
        } else {
            Err(format!("{} exited with {}", self.program, status).into())
        }
    }
}

/// Name-keyed cache of downloaded media and their scaled variants
pub struct ResourceCache<F, S> {
    dir: PathBuf,
    fetcher: F,
    scaler: S,
    timeout: Duration,
    sizes: Vec<u32>,
}

impl<F: ResourceFetcher, S: ImageScaler> ResourceCache<F, S> {
    /// Cache into `dir` with a 10 second timeout and a single 1024px variant
    pub fn new(dir: impl Into<PathBuf>, fetcher: F, scaler: S) -> Self {
        Self {
            dir: dir.into(),
            fetcher,
            scaler,
            timeout: Duration::from_secs(10),
            sizes: vec![1024],
        }
    }

    /// Set the download timeout
    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout = Duration::from_secs(timeout_seconds);
        self
    }

    /// Set the variant sizes; the first one is what pages display
    pub fn with_sizes(mut self, sizes: Vec<u32>) -> Self {
        self.sizes = sizes;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Make sure the resource of `owner_id` is cached and return the local
    /// name pages should reference: the first scaled variant for images, the
    /// downloaded file otherwise.
    pub async fn ensure_cached(
        &self,
        owner_id: &str,
        source: &MediaSource,
    ) -> Result<String, ResourceError> {
        let url = source.url();
        let mut base = resource_basename(url);
        if base.is_empty() {
            ::log::warn!("No file name in {}, caching it as a plain resource", url);
            base = "resource".to_string();
        }

        let name = format!("{}-{}", owner_id, base);
        let path = self.dir.join(&name);
        if path.exists() {
            ::log::debug!("CACHE OK {} -> {}", url, name);
        } else {
            self.download(url, &path).await?;
        }

        if !is_scalable(&name) {
            return Ok(name);
        }

        for dim in &self.sizes {
            let variant = self.dir.join(derivative_name(&name, *dim));
            if variant.exists() || !path.exists() {
                continue;
            }
            match self.scaler.scale(&path, &variant, *dim).await {
                Ok(()) => ::log::debug!("SCALED {} to {}px", name, dim),
                Err(e) => ::log::warn!("Could not scale {} to {}px: {}", name, dim, e),
            }
        }

        Ok(match self.sizes.first() {
            Some(dim) => derivative_name(&name, *dim),
            None => name,
        })
    }

    async fn download(&self, url: &str, path: &Path) -> Result<(), ResourceError> {
        let bytes = match self.fetcher.get(url, self.timeout).await {
            Ok((200, bytes)) => bytes,
            Ok((status, _)) => {
                ::log::warn!("Skipping {}: status {}", url, status);
                return Ok(());
            }
            Err(e) => {
                ::log::warn!("Skipping {}: {}", url, e);
                return Ok(());
            }
        };

        let io_error = |source| ResourceError::Io {
            path: path.display().to_string(),
            source,
        };
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(io_error)?;
        let mut partial = path.as_os_str().to_owned();
        partial.push(".part");
        tokio::fs::write(&partial, &bytes).await.map_err(io_error)?;
        tokio::fs::rename(&partial, path).await.map_err(io_error)?;

        ::log::info!("CACHE {} -> {} {}B", url, path.display(), bytes.len());
        Ok(())
    }
}
