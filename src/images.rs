//! Images
//!
//! Shopper-attached images arrive as raw bytes behind an [`ImageSource`] and are embedded into
//! the cart as self-contained `data:` URLs so the persisted cart needs nothing else to render.

use std::{
    fmt::{self, Debug, Formatter},
    io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use thiserror::Error;

use crate::customization::EmbeddedImage;

/// Largest image accepted for embedding, in bytes.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Errors raised while reading or embedding an attached image.
#[derive(Debug, Error)]
pub enum ImageError {
    /// The image contents could not be read.
    #[error("failed to read image {file_name}")]
    Read {
        /// Name of the file being read.
        file_name: String,

        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// The file is not an image type the storefront accepts.
    #[error("unsupported image type {0}")]
    UnsupportedType(String),

    /// The image had no content.
    #[error("image {0} is empty")]
    Empty(String),

    /// The image exceeds [`MAX_IMAGE_BYTES`] (size, limit).
    #[error("image is {0} bytes, limit is {1}")]
    TooLarge(usize, usize),
}

/// A raw image waiting to be embedded.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Original file name, kept alongside the embedded image.
    fn file_name(&self) -> &str;

    /// MIME type of the image, e.g. `image/png`.
    fn mime_type(&self) -> &str;

    /// Reads the full image contents.
    async fn read(&self) -> Result<Vec<u8>, ImageError>;
}

/// Image already held in memory.
#[derive(Clone, PartialEq, Eq)]
pub struct InMemoryImage {
    file_name: String,
    mime_type: String,
    bytes: Vec<u8>,
}

impl InMemoryImage {
    /// Creates an in-memory image.
    pub fn new(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }
}

impl Debug for InMemoryImage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryImage")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[async_trait]
impl ImageSource for InMemoryImage {
    fn file_name(&self) -> &str {
        &self.file_name
    }

    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    async fn read(&self) -> Result<Vec<u8>, ImageError> {
        Ok(self.bytes.clone())
    }
}

/// Image stored on disk, read lazily when the item is added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileImage {
    path: PathBuf,
    file_name: String,
    mime_type: String,
}

impl FileImage {
    /// Creates a file-backed image, deriving the MIME type from the extension.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mime_type = mime_type_for(&path).to_string();

        Self {
            path,
            file_name,
            mime_type,
        }
    }

    /// Returns the path of the image on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ImageSource for FileImage {
    fn file_name(&self) -> &str {
        &self.file_name
    }

    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Reads the file, refusing files above [`MAX_IMAGE_BYTES`] without loading them.
    async fn read(&self) -> Result<Vec<u8>, ImageError> {
        let read_error = |source| ImageError::Read {
            file_name: self.file_name.clone(),
            source,
        };

        let size = tokio::fs::metadata(&self.path).await.map_err(read_error)?.len();
        let size = usize::try_from(size).unwrap_or(usize::MAX);

        if size > MAX_IMAGE_BYTES {
            return Err(ImageError::TooLarge(size, MAX_IMAGE_BYTES));
        }

        tokio::fs::read(&self.path).await.map_err(read_error)
    }
}

/// Guesses an image MIME type from a file extension.
pub fn mime_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Reads an image and embeds it as a base64 `data:` URL.
///
/// # Errors
///
/// - [`ImageError::UnsupportedType`]: the MIME type is not `image/*`.
/// - [`ImageError::Read`]: the source could not be read.
/// - [`ImageError::Empty`]: the source had no bytes.
/// - [`ImageError::TooLarge`]: the source exceeds [`MAX_IMAGE_BYTES`].
pub async fn embed(source: &dyn ImageSource) -> Result<EmbeddedImage, ImageError> {
    let mime_type = source.mime_type();

    if !mime_type.starts_with("image/") {
        return Err(ImageError::UnsupportedType(mime_type.to_string()));
    }

    let bytes = source.read().await?;

    if bytes.is_empty() {
        return Err(ImageError::Empty(source.file_name().to_string()));
    }

    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(ImageError::TooLarge(bytes.len(), MAX_IMAGE_BYTES));
    }

    Ok(EmbeddedImage {
        data_url: format!("data:{mime_type};base64,{}", STANDARD.encode(&bytes)),
        file_name: source.file_name().to_string(),
    })
}
