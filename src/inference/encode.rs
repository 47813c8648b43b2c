use image::codecs::jpeg::JpegEncoder;
use image::{ImageBuffer, Rgb};

use super::error::{DispatchError, Result};
use crate::camera::types::Frame;

/// How frames are prepared before upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeSettings {
    /// JPEG quality (1-100).
    pub quality: u8,
    /// Frames wider than this are downscaled first; 0 disables downscaling.
    pub max_width: u32,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            quality: 80,
            max_width: 640,
        }
    }
}

/// Compress raw RGB pixel data to JPEG at the given quality (1-100).
pub fn compress_jpeg(data: &[u8], width: u32, height: u32, quality: u8) -> Result<Vec<u8>> {
    let img: ImageBuffer<Rgb<u8>, _> =
        ImageBuffer::from_raw(width, height, data).ok_or_else(|| {
            DispatchError::Encode(format!(
                "{} bytes do not hold a {width}x{height} RGB image",
                data.len()
            ))
        })?;

    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    img.write_with_encoder(encoder)
        .map_err(|e| DispatchError::Encode(e.to_string()))?;
    Ok(buf)
}

/// Target size that fits `max_width`, preserving aspect ratio.
pub fn fit_width(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if max_width == 0 || width <= max_width {
        return (width, height);
    }
    let scaled = (u64::from(height) * u64::from(max_width) / u64::from(width)).max(1);
    (max_width, scaled as u32)
}

/// Resize raw RGB data with `fast_image_resize`.
fn resize_rgb(
    data: &[u8],
    width: u32,
    height: u32,
    dst_width: u32,
    dst_height: u32,
) -> Result<Vec<u8>> {
    use fast_image_resize as fr;
    use fr::images::Image;

    let src_image = Image::from_vec_u8(width, height, data.to_vec(), fr::PixelType::U8x3)
        .map_err(|e| DispatchError::Encode(e.to_string()))?;
    let mut dst_image = Image::new(dst_width, dst_height, fr::PixelType::U8x3);

    let mut resizer = fr::Resizer::new();
    resizer
        .resize(&src_image, &mut dst_image, None)
        .map_err(|e| DispatchError::Encode(e.to_string()))?;

    Ok(dst_image.into_vec())
}

/// Produce the upload payload for one frame.
pub fn encode_frame(frame: &Frame, settings: &EncodeSettings) -> Result<Vec<u8>> {
    if !frame.is_well_formed() {
        return Err(DispatchError::Encode(format!(
            "frame of {} bytes does not match {}x{}",
            frame.data.len(),
            frame.width,
            frame.height
        )));
    }

    let (width, height) = fit_width(frame.width, frame.height, settings.max_width);
    if (width, height) == (frame.width, frame.height) {
        return compress_jpeg(&frame.data, width, height, settings.quality);
    }

    let resized = resize_rgb(&frame.data, frame.width, frame.height, width, height)?;
    compress_jpeg(&resized, width, height, settings.quality)
}
