//! Upload validation and image-to-tensor conversion.
//!
//! Every failure here happens before anything is written or classified:
//! the extension allow-list is checked first, then size, then decode.

use std::path::Path;

use image::imageops::FilterType;
use image::RgbImage;

use super::classifier::{InputSpec, INPUT_CHANNELS};
use super::DiagnosticError;

/// Accepted upload extensions, compared case-insensitively.
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Maximum input image size (in bytes) before rejecting.
pub const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024; // 50 MB

/// Resize filter. Bilinear, matching the training data loader.
const RESIZE_FILTER: FilterType = FilterType::Triangle;

/// A decoded image in model layout: `height x width x 3`, row-major, RGB.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    data: Vec<f32>,
    height: u32,
    width: u32,
}

impl ImageTensor {
    /// Square tensor with every element set to `value`.
    pub fn filled(size: u32, value: f32) -> Self {
        Self {
            data: vec![value; size as usize * size as usize * INPUT_CHANNELS],
            height: size,
            width: size,
        }
    }

    pub fn shape(&self) -> [usize; 3] {
        [self.height as usize, self.width as usize, INPUT_CHANNELS]
    }

    /// `(height, width)`
    pub fn dimensions(&self) -> (u32, u32) {
        (self.height, self.width)
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn pixel(&self, y: u32, x: u32) -> [f32; 3] {
        let offset = (y as usize * self.width as usize + x as usize) * INPUT_CHANNELS;
        [self.data[offset], self.data[offset + 1], self.data[offset + 2]]
    }
}

/// Validate the extension of `file_name` against the allow-list.
/// Returns the lower-cased extension.
pub fn check_extension(file_name: &str) -> Result<String, DiagnosticError> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| {
            DiagnosticError::UnsupportedFormat(format!("'{file_name}' has no file extension"))
        })?;
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(DiagnosticError::UnsupportedFormat(format!(
            ".{ext} (allowed: png, jpg, jpeg)"
        )));
    }
    Ok(ext)
}

/// Decode the image at `path` into a model tensor.
pub fn preprocess_file(path: &Path, spec: &InputSpec) -> Result<ImageTensor, DiagnosticError> {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    check_extension(name)?;

    let size = std::fs::metadata(path)
        .map_err(|e| DiagnosticError::ImageDecode(format!("{}: {e}", path.display())))?
        .len();
    if size > MAX_IMAGE_BYTES as u64 {
        return Err(too_large(size as usize));
    }

    let bytes = std::fs::read(path)
        .map_err(|e| DiagnosticError::ImageDecode(format!("{}: {e}", path.display())))?;
    preprocess_bytes(&bytes, spec)
}

/// Decode uploaded bytes into a model tensor.
pub fn preprocess_bytes(bytes: &[u8], spec: &InputSpec) -> Result<ImageTensor, DiagnosticError> {
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(too_large(bytes.len()));
    }
    let rgb = decode_rgb(bytes)?;
    Ok(to_tensor(&rgb, spec))
}

/// Decode PNG or JPEG bytes to 8-bit RGB.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, DiagnosticError> {
    if bytes.is_empty() {
        return Err(DiagnosticError::ImageDecode("empty image".into()));
    }
    let img = image::load_from_memory(bytes)
        .map_err(|e| DiagnosticError::ImageDecode(format!("Failed to decode image: {e}")))?;
    Ok(img.to_rgb8())
}

fn to_tensor(rgb: &RgbImage, spec: &InputSpec) -> ImageTensor {
    let resized = image::imageops::resize(rgb, spec.size, spec.size, RESIZE_FILTER);

    let mut data = Vec::with_capacity(spec.element_count());
    for pixel in resized.pixels() {
        for (channel, &value) in pixel.0.iter().enumerate() {
            data.push(spec.normalization.apply(channel, value));
        }
    }

    ImageTensor {
        data,
        height: spec.size,
        width: spec.size,
    }
}

fn too_large(len: usize) -> DiagnosticError {
    DiagnosticError::ImageDecode(format!(
        "image is {len} bytes, limit is {MAX_IMAGE_BYTES} bytes"
    ))
}
