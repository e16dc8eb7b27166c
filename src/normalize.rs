//! Image normalization pipeline.
//!
//! Every accepted upload goes through the same sequence: validate the claimed
//! extension, decode, resize to the configured bound (Lanczos3), flatten any
//! alpha channel onto white, and re-encode as JPEG under a freshly generated
//! UUID filename. The stored artifact is what every later consumer sees; the
//! original upload bytes are discarded.
//!
//! The resize policy fixes one dimension to the configured bound and derives
//! the other from the source aspect ratio. This intentionally upscales
//! sources smaller than the bound — changing that would silently alter what
//! existing galleries look like, so the behavior is kept as-is.

use crate::config::ImageBounds;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Upload extensions the normalizer accepts.
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("unsupported file extension: {0:?}")]
    UnsupportedFormat(String),
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of a successful normalization: the facts the metadata store needs.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    /// Generated unique name the artifact was saved under.
    pub stored_filename: String,
    /// Absolute path of the written artifact.
    pub stored_path: PathBuf,
    /// Width of the stored artifact, not the original upload.
    pub width: u32,
    /// Height of the stored artifact.
    pub height: u32,
    /// Byte size of the stored artifact on disk.
    pub file_size: u64,
}

/// Return the lowercased extension of `filename` if it is an accepted one.
pub fn allowed_extension(filename: &str) -> Option<String> {
    let ext = filename.rsplit_once('.')?.1.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Sanitize a client-supplied filename for display/audit storage.
///
/// Strips any path components and reduces the rest to ASCII alphanumerics,
/// dots, dashes, and underscores (spaces become underscores). Never used to
/// address the filesystem; stored names are UUID-generated.
pub fn sanitize_filename(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name);
    base.chars()
        .map(|c| if c == ' ' { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect()
}

/// Compute output dimensions preserving the source aspect ratio.
///
/// Wider-than-tall sources fix the output width to `bounds.width` and derive
/// height; everything else (including square) fixes the output height to
/// `bounds.height` and derives width. Derived dimensions are truncated, with
/// a floor of one pixel.
pub fn target_dimensions(source: (u32, u32), bounds: ImageBounds) -> (u32, u32) {
    let (src_w, src_h) = source;
    let aspect = src_w as f64 / src_h as f64;

    if src_w > src_h {
        let w = bounds.width;
        let h = (w as f64 / aspect) as u32;
        (w, h.max(1))
    } else {
        let h = bounds.height;
        let w = (h as f64 * aspect) as u32;
        (w.max(1), h)
    }
}

/// Composite an image onto an opaque white background, dropping alpha.
fn flatten_onto_white(img: &DynamicImage) -> RgbImage {
    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as u16;
        let blend = |c: u8| -> u8 { ((c as u16 * alpha + 255 * (255 - alpha)) / 255) as u8 };
        out.put_pixel(x, y, image::Rgb([blend(r), blend(g), blend(b)]));
    }
    out
}

/// Normalize an uploaded byte stream and persist the artifact.
///
/// Writes exactly one file under `upload_dir` per successful call. On any
/// failure no usable artifact exists and the caller must not create a record.
pub fn normalize(
    bytes: &[u8],
    claimed_filename: &str,
    upload_dir: &Path,
    bounds: ImageBounds,
    jpeg_quality: u8,
) -> Result<NormalizedImage, NormalizeError> {
    let ext = allowed_extension(claimed_filename)
        .ok_or_else(|| NormalizeError::UnsupportedFormat(claimed_filename.to_string()))?;

    // Storage naming is decoupled from user input: no path traversal, no
    // collisions between racing uploads.
    let stored_filename = format!("{}.{}", Uuid::new_v4(), ext);

    let img = image::load_from_memory(bytes).map_err(|e| NormalizeError::Decode(e.to_string()))?;
    let (width, height) = target_dimensions((img.width(), img.height()), bounds);
    let resized = img.resize_exact(width, height, FilterType::Lanczos3);

    // JPEG has no alpha channel; composite transparent sources onto white.
    let flat = if resized.color().has_alpha() {
        flatten_onto_white(&resized)
    } else {
        resized.to_rgb8()
    };

    let stored_path = upload_dir.join(&stored_filename);
    let file = std::fs::File::create(&stored_path)?;
    let writer = BufWriter::new(file);
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(writer, jpeg_quality);
    flat.write_with_encoder(encoder)
        .map_err(|e| NormalizeError::Decode(format!("JPEG encode failed: {}", e)))?;

    let file_size = std::fs::metadata(&stored_path)?.len();

    Ok(NormalizedImage {
        stored_filename,
        stored_path,
        width,
        height,
        file_size,
    })
}
