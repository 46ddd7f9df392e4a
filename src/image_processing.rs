use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, ImageReader};
use std::io::Cursor;
use std::sync::Arc;

use crate::constants::JPEG_QUALITY;
use crate::exif_parser::{apply_orientation, read_orientation};

/// Display-ready image bytes for a preview tile.
#[derive(Clone)]
pub struct ImageSource {
    pub mime_type: &'static str,
    pub data: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageSource")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Creates a scaled JPG image from a DynamicImage.
/// Can optionally pad the image to a square.
fn create_scaled_image(img: DynamicImage, size: u32, pad_to_square: bool) -> Result<(Vec<u8>, u32, u32)> {
    // Triangle is plenty for thumbnails
    let scaled = img.resize(size, size, image::imageops::FilterType::Triangle);

    let rgb = if pad_to_square {
        let mut canvas = image::RgbImage::from_fn(size, size, |_, _| image::Rgb([255, 255, 255]));
        let (width, height) = scaled.dimensions();
        let x_offset = (size - width) / 2;
        let y_offset = (size - height) / 2;
        image::imageops::overlay(&mut canvas, &scaled.to_rgb8(), x_offset as i64, y_offset as i64);
        canvas
    } else {
        scaled.to_rgb8()
    };

    let (width, height) = rgb.dimensions();
    let mut jpeg_data = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg_data, JPEG_QUALITY)
        .encode_image(&rgb)
        .context("Failed to encode JPEG")?;

    Ok((jpeg_data, width, height))
}

/// Decodes a selected file and renders a square preview tile of `size` pixels.
pub fn create_preview(data: &[u8], size: u32) -> Result<ImageSource> {
    let img = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .context("Failed to sniff image format")?
        .decode()
        .context("Failed to decode image")?;

    let img = apply_orientation(img, read_orientation(data));
    let (jpeg, width, height) = create_scaled_image(img, size, true)?;

    Ok(ImageSource {
        mime_type: "image/jpeg",
        data: jpeg.into(),
        width,
        height,
    })
}

#[cfg(test)]
pub(crate) fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30])));
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .expect("encode png");
    out
}
