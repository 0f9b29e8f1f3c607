//! Image upload pipeline: validate, decode, shrink, re-encode, store.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::GenericImageView;
use prompthub_common::{AppError, AppResult, StorageService, UploadedFile, generate_image_key};
use serde::{Deserialize, Serialize};

/// Accepted upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// JPEG format
    Jpeg,
    /// PNG format
    Png,
    /// WebP format
    WebP,
    /// GIF format
    Gif,
}

impl ImageFormat {
    /// Get MIME type for this format.
    #[must_use]
    pub const fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
            Self::Gif => "image/gif",
        }
    }

    /// Get file extension for this format.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Gif => "gif",
        }
    }

    /// Detect format from MIME type. Parameters such as `; charset` are ignored.
    #[must_use]
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::WebP),
            "image/gif" => Some(Self::Gif),
            _ => None,
        }
    }
}

/// Image dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDimensions {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

/// Processed image result.
#[derive(Debug)]
pub struct ProcessedImage {
    /// Encoded bytes
    pub data: Vec<u8>,
    /// Stored format
    pub format: ImageFormat,
    /// Stored dimensions
    pub dimensions: ImageDimensions,
}

/// Media processing configuration.
#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// Largest accepted upload in bytes
    pub max_bytes: usize,
    /// Maximum image dimension (width or height)
    pub max_dimension: u32,
    /// JPEG quality for re-encoded images (1-100)
    pub jpeg_quality: u8,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            max_bytes: 2 * 1024 * 1024,
            max_dimension: 1920,
            jpeg_quality: 85,
        }
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedImage {
    pub url: String,
    pub key: String,
    pub size: u64,
    pub content_type: String,
    pub width: u32,
    pub height: u32,
}

/// Media processing service.
#[derive(Clone)]
pub struct MediaService {
    storage: StorageService,
    config: MediaConfig,
}

impl MediaService {
    /// Create a new media service.
    #[must_use]
    pub const fn new(storage: StorageService, config: MediaConfig) -> Self {
        Self { storage, config }
    }

    #[must_use]
    pub const fn config(&self) -> &MediaConfig {
        &self.config
    }

    /// Validate, normalize and store an uploaded image for `user_id`.
    pub async fn upload(
        &self,
        user_id: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> AppResult<UploadedImage> {
        validate_upload(content_type, data.len(), &self.config)?;

        let config = self.config.clone();
        let processed = tokio::task::spawn_blocking(move || normalize_image(&data, &config))
            .await
            .map_err(|e| AppError::Internal(format!("Image task failed: {e}")))??;

        let key = generate_image_key(user_id, processed.format.extension());
        let UploadedFile {
            key,
            url,
            size,
            content_type,
            ..
        } = self
            .storage
            .upload(&key, &processed.data, processed.format.mime_type())
            .await?;

        tracing::info!(
            user_id = %user_id,
            key = %key,
            size = size,
            width = processed.dimensions.width,
            height = processed.dimensions.height,
            "Image uploaded"
        );

        Ok(UploadedImage {
            url,
            key,
            size,
            content_type,
            width: processed.dimensions.width,
            height: processed.dimensions.height,
        })
    }
}

/// Check the declared type and size of an upload before touching its bytes.
pub fn validate_upload(
    content_type: &str,
    len: usize,
    config: &MediaConfig,
) -> AppResult<ImageFormat> {
    if len == 0 {
        return Err(AppError::BadRequest("File is empty".to_string()));
    }
    let format = ImageFormat::from_mime_type(content_type).ok_or_else(|| {
        AppError::BadRequest(format!(
            "Unsupported file type: {content_type} (allowed: jpeg, png, webp, gif)"
        ))
    })?;
    if len > config.max_bytes {
        return Err(AppError::BadRequest(format!(
            "File too large: {len} bytes (max {} bytes)",
            config.max_bytes
        )));
    }
    Ok(format)
}

/// Scale `(width, height)` uniformly so neither side exceeds `max`.
///
/// Sides are rounded to the nearest pixel and never drop below 1.
#[must_use]
pub fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max || longest == 0 {
        return (width, height);
    }
    let longest = u64::from(longest);
    let scale = |side: u32| {
        let scaled = (u64::from(side) * u64::from(max) + longest / 2) / longest;
        u32::try_from(scaled).unwrap_or(max).max(1)
    };
    (scale(width), scale(height))
}

/// Decode an image and produce the stored rendition.
///
/// GIFs are returned byte-identical. Everything else is shrunk to fit
/// `max_dimension` if needed and re-encoded as JPEG.
pub fn normalize_image(data: &[u8], config: &MediaConfig) -> AppResult<ProcessedImage> {
    let sniffed = image::guess_format(data)
        .map_err(|e| AppError::Media(format!("Unrecognized image data: {e}")))?;

    let img = image::load_from_memory(data)
        .map_err(|e| AppError::Media(format!("Failed to decode image: {e}")))?;
    let (width, height) = img.dimensions();

    if sniffed == image::ImageFormat::Gif {
        return Ok(ProcessedImage {
            data: data.to_vec(),
            format: ImageFormat::Gif,
            dimensions: ImageDimensions { width, height },
        });
    }

    let (target_w, target_h) = fit_within(width, height, config.max_dimension);
    let img = if (target_w, target_h) == (width, height) {
        img
    } else {
        tracing::debug!(width, height, target_w, target_h, "Resizing image");
        img.resize_exact(target_w, target_h, FilterType::Triangle)
    };

    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, config.jpeg_quality))
        .map_err(|e| AppError::Media(format!("Failed to encode image: {e}")))?;

    Ok(ProcessedImage {
        data: out,
        format: ImageFormat::Jpeg,
        dimensions: ImageDimensions {
            width: rgb.width(),
            height: rgb.height(),
        },
    })
}
