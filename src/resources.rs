use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use image::{ImageBuffer, Rgba};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};
use url::Url;

use crate::branding::BrandingSlotKind;
use crate::config::Catalog;
use crate::layers::LayerKind;
use crate::schema::{RegionGroup, Vec2};

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

fn next_resource_id() -> u64 {
    NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Decoded straight-alpha RGBA8 image.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Bitmap {
    pub fn transparent(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }

    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            anyhow::bail!(
                "bitmap {}x{} expects {} bytes, got {}",
                width,
                height,
                expected,
                pixels.len()
            );
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes).context("failed to decode image bytes")?;
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Self {
            width,
            height,
            pixels: rgba.into_raw(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ])
    }

    /// Number of pixels with non-zero alpha.
    pub fn covered_pixels(&self) -> usize {
        self.pixels.chunks_exact(4).filter(|px| px[3] != 0).count()
    }

    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.width.to_le_bytes());
        hasher.update(self.height.to_le_bytes());
        hasher.update(&self.pixels);
        let digest = hasher.finalize();
        let mut out = String::with_capacity(digest.len() * 2);
        for byte in digest {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        let buffer: ImageBuffer<Rgba<u8>, &[u8]> =
            ImageBuffer::from_raw(self.width, self.height, self.pixels.as_slice())
                .context("bitmap buffer does not match its dimensions")?;
        buffer
            .save_with_format(path, image::ImageFormat::Png)
            .with_context(|| format!("failed to write png {}", path.display()))
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WrapMode {
    Clamp,
    Repeat,
}

/// A resolved graphics resource. Shared read-only through [`ResourceHandle`].
#[derive(Debug)]
pub struct Texture {
    pub id: u64,
    pub source: String,
    pub bitmap: Arc<Bitmap>,
    pub wrap: WrapMode,
    pub repeat: Vec2,
}

impl Texture {
    pub fn new(source: impl Into<String>, bitmap: Bitmap) -> Self {
        Self {
            id: next_resource_id(),
            source: source.into(),
            bitmap: Arc::new(bitmap),
            wrap: WrapMode::Clamp,
            repeat: Vec2::splat(1.0),
        }
    }

    /// Post-process applied to fabric detail maps at load time.
    pub fn tiled(mut self, repeat: Vec2) -> Self {
        self.wrap = WrapMode::Repeat;
        self.repeat = repeat;
        self
    }
}

pub type ResourceHandle = Arc<Texture>;

/// A texture bound with its own UV transform. Tiling never mutates the shared
/// texture; each binding carries its own offset and repeat.
#[derive(Debug, Clone)]
pub struct TextureBinding {
    pub texture: ResourceHandle,
    pub offset: Vec2,
    pub repeat: Vec2,
}

impl TextureBinding {
    pub fn plain(texture: ResourceHandle) -> Self {
        Self {
            texture,
            offset: Vec2::default(),
            repeat: Vec2::splat(1.0),
        }
    }
}

impl PartialEq for TextureBinding {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.texture, &other.texture)
            && self.offset == other.offset
            && self.repeat == other.repeat
    }
}

pub fn apply_tiling(texture: &ResourceHandle, offset: Vec2, repeat: Vec2) -> TextureBinding {
    TextureBinding {
        texture: Arc::clone(texture),
        offset,
        repeat,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Image,
    TextureAsset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetSource {
    Path(String),
    Remote(Url),
}

impl AssetSource {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        match Url::parse(trimmed) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Some(Self::Remote(url)),
            _ => Some(Self::Path(trimmed.to_owned())),
        }
    }
}

impl fmt::Display for AssetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.write_str(path),
            Self::Remote(url) => f.write_str(url.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub kind: RequestKind,
    pub path: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("load request has an empty path")]
    EmptyRequest,
    #[error("failed to fetch '{path}': {message}")]
    Fetch { path: String, message: String },
    #[error("failed to decode '{path}': {message}")]
    Decode { path: String, message: String },
}

pub type LoadFuture = Pin<Box<dyn Future<Output = Result<Bitmap, ResolveError>> + Send>>;

/// Image/texture loader contract. Implementations must be cheap to call; the
/// returned future does the work.
pub trait ImageLoader: Send + Sync {
    fn load(&self, source: &AssetSource) -> LoadFuture;
}

/// Loads rooted paths from the catalog's asset root and, with the `remote`
/// feature, http(s) URLs.
pub struct AssetLoader {
    catalog: Arc<Catalog>,
    #[cfg(feature = "remote")]
    http: reqwest::Client,
}

impl AssetLoader {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            #[cfg(feature = "remote")]
            http: reqwest::Client::new(),
        }
    }
}

impl ImageLoader for AssetLoader {
    fn load(&self, source: &AssetSource) -> LoadFuture {
        match source {
            AssetSource::Path(raw) => {
                let label = raw.clone();
                let path = self.catalog.resolve_asset_path(raw);
                Box::pin(async move {
                    let bytes = tokio::fs::read(&path)
                        .await
                        .map_err(|error| ResolveError::Fetch {
                            path: label.clone(),
                            message: format!("{}: {error}", path.display()),
                        })?;
                    decode_off_thread(label, bytes).await
                })
            }
            #[cfg(feature = "remote")]
            AssetSource::Remote(url) => {
                let http = self.http.clone();
                let url = url.clone();
                Box::pin(async move {
                    let label = url.to_string();
                    let fetch_error = |error: reqwest::Error| ResolveError::Fetch {
                        path: label.clone(),
                        message: error.to_string(),
                    };
                    let response = http
                        .get(url.clone())
                        .send()
                        .await
                        .and_then(reqwest::Response::error_for_status)
                        .map_err(fetch_error)?;
                    let bytes = response.bytes().await.map_err(fetch_error)?;
                    decode_off_thread(label, bytes.to_vec()).await
                })
            }
            #[cfg(not(feature = "remote"))]
            AssetSource::Remote(url) => {
                let path = url.to_string();
                Box::pin(async move {
                    Err(ResolveError::Fetch {
                        path,
                        message: "remote loading requires the `remote` feature".to_owned(),
                    })
                })
            }
        }
    }
}

async fn decode_off_thread(label: String, bytes: Vec<u8>) -> Result<Bitmap, ResolveError> {
    let decode_label = label.clone();
    tokio::task::spawn_blocking(move || Bitmap::decode(&bytes))
        .await
        .map_err(|error| ResolveError::Decode {
            path: decode_label,
            message: error.to_string(),
        })?
        .map_err(|error| ResolveError::Decode {
            path: label,
            message: format!("{error:#}"),
        })
}

/// Who receives a completed resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolveTarget {
    Layer(LayerKind),
    Branding(RegionGroup, BrandingSlotKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(u64);

#[derive(Debug)]
pub struct Completion {
    pub ticket: Ticket,
    pub target: ResolveTarget,
    pub path: String,
    pub result: Result<ResourceHandle, ResolveError>,
}

/// Async resolution pipeline. Requests run concurrently on the tokio runtime
/// that was current at construction; results come back through a queue that
/// only the owning session drains, so every store write happens on one logical
/// thread in completion order.
pub struct Resolver {
    loader: Arc<dyn ImageLoader>,
    runtime: Handle,
    cache: HashMap<String, ResourceHandle>,
    sender: UnboundedSender<Completion>,
    receiver: UnboundedReceiver<Completion>,
    in_flight: usize,
    next_ticket: u64,
}

impl Resolver {
    pub fn new(loader: Arc<dyn ImageLoader>) -> Result<Self> {
        let runtime = Handle::try_current()
            .context("resource resolution requires a running tokio runtime")?;
        let (sender, receiver) = mpsc::unbounded_channel();
        Ok(Self {
            loader,
            runtime,
            cache: HashMap::new(),
            sender,
            receiver,
            in_flight: 0,
            next_ticket: 1,
        })
    }

    pub fn resolve(&mut self, target: ResolveTarget, request: &LoadRequest) -> Ticket {
        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        self.in_flight += 1;

        let path = request.path.trim().to_owned();
        if let Some(handle) = self.cache.get(&path) {
            debug!(path = %path, ?target, "resource cache hit");
            let completion = Completion {
                ticket,
                target,
                path,
                result: Ok(Arc::clone(handle)),
            };
            // The receiver lives in `self`, so the send cannot fail.
            let _ = self.sender.send(completion);
            return ticket;
        }

        let Some(source) = AssetSource::parse(&path) else {
            let _ = self.sender.send(Completion {
                ticket,
                target,
                path,
                result: Err(ResolveError::EmptyRequest),
            });
            return ticket;
        };

        debug!(path = %path, ?target, ?ticket, "resource load started");
        let future = self.loader.load(&source);
        let sender = self.sender.clone();
        self.runtime.spawn(async move {
            let result = future
                .await
                .map(|bitmap| Arc::new(Texture::new(path.clone(), bitmap)));
            let _ = sender.send(Completion {
                ticket,
                target,
                path,
                result,
            });
        });
        ticket
    }

    /// Completions that are ready now, in completion order.
    pub fn drain_ready(&mut self) -> Vec<Completion> {
        let mut out = Vec::new();
        while let Ok(completion) = self.receiver.try_recv() {
            out.push(self.record(completion));
        }
        out
    }

    /// Waits for the next completion, or returns `None` when nothing is in flight.
    pub async fn next_completion(&mut self) -> Option<Completion> {
        if self.in_flight == 0 {
            return None;
        }
        let completion = self.receiver.recv().await?;
        Some(self.record(completion))
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn cached(&self, path: &str) -> Option<&ResourceHandle> {
        self.cache.get(path.trim())
    }

    fn record(&mut self, completion: Completion) -> Completion {
        self.in_flight = self.in_flight.saturating_sub(1);
        match &completion.result {
            Ok(handle) => {
                self.cache
                    .entry(completion.path.clone())
                    .or_insert_with(|| Arc::clone(handle));
            }
            Err(error) => {
                warn!(path = %completion.path, target = ?completion.target, "{error}");
            }
        }
        completion
    }
}
