use image::imageops::FilterType;

use crate::error::Result;

/// Model input produced from an encoded image.
pub struct PreparedImage {
    /// NHWC, RGB, each channel scaled to [0, 1].
    pub data: Vec<f32>,
    pub original_width: u32,
    pub original_height: u32,
}

pub fn prepare_input(image_bytes: &[u8], input_size: u32) -> Result<PreparedImage> {
    let decoded = image::load_from_memory(image_bytes)?;
    let (original_width, original_height) = (decoded.width(), decoded.height());
    tracing::debug!(original_width, original_height, "decoded image");

    let resized = image::imageops::resize(&decoded.to_rgb8(), input_size, input_size, FilterType::Triangle);
    let data = resized
        .pixels()
        .flat_map(|pixel| pixel.0)
        .map(|channel| channel as f32 / 255.0)
        .collect();

    Ok(PreparedImage {
        data,
        original_width,
        original_height,
    })
}

#[cfg(test)]
pub(crate) fn encode_png(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb(rgb));
    let mut bytes = std::io::Cursor::new(Vec::new());
    img.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
    bytes.into_inner()
}
