use std::path::Path;

use anyhow::Context as _;
use image::{DynamicImage, ImageBuffer, ImageFormat};

use crate::{
    channel::{ComposedImage, PixelLayout},
    config::ChannelFormat,
    foundation::error::{ViewbakeError, ViewbakeResult},
};

/// Map a `[0, 1]` value onto an integer code with `max` as the top code.
///
/// Values outside `[0, 1]` clip; NaN encodes as 0.
pub fn quantize(v: f32, max: u16) -> u16 {
    (v.clamp(0.0, 1.0) * f32::from(max)).round() as u16
}

/// Build the in-memory image for `img` under `format`, without touching the filesystem.
pub fn to_dynamic_image(
    img: &ComposedImage,
    format: ChannelFormat,
    png_bit_depth: u8,
) -> ViewbakeResult<DynamicImage> {
    let expected = img.width as usize * img.height as usize * img.layout.channels();
    if img.data.len() != expected {
        return Err(ViewbakeError::render(
            "composed image data does not match width*height*channels",
        ));
    }

    match format {
        ChannelFormat::Exr => float_image(img),
        ChannelFormat::Png => match png_bit_depth {
            8 => quantized_8(img),
            16 => quantized_16(img),
            other => Err(ViewbakeError::config(format!(
                "png bit depth must be 8 or 16 (got {other})"
            ))),
        },
        ChannelFormat::None => Err(ViewbakeError::config(
            "cannot encode a channel whose format is 'none'",
        )),
    }
}

/// Encode and write `img` to `path`.
pub fn write_channel(
    path: &Path,
    img: &ComposedImage,
    format: ChannelFormat,
    png_bit_depth: u8,
) -> ViewbakeResult<()> {
    let dyn_img = to_dynamic_image(img, format, png_bit_depth)?;
    let image_format = match format {
        ChannelFormat::Exr => ImageFormat::OpenExr,
        _ => ImageFormat::Png,
    };
    dyn_img
        .save_with_format(path, image_format)
        .with_context(|| format!("write channel image '{}'", path.display()))?;
    Ok(())
}

fn size_error() -> ViewbakeError {
    ViewbakeError::render("image buffer size mismatch (unexpected)")
}

// OpenEXR output only supports RGB and RGBA float images, so gray is widened to RGB.
fn float_image(img: &ComposedImage) -> ViewbakeResult<DynamicImage> {
    let (w, h) = (img.width, img.height);
    match img.layout {
        PixelLayout::Gray => {
            let data: Vec<f32> = img.data.iter().flat_map(|&v| [v, v, v]).collect();
            let buf = ImageBuffer::from_raw(w, h, data).ok_or_else(size_error)?;
            Ok(DynamicImage::ImageRgb32F(buf))
        }
        PixelLayout::Rgb => {
            let buf = ImageBuffer::from_raw(w, h, img.data.clone()).ok_or_else(size_error)?;
            Ok(DynamicImage::ImageRgb32F(buf))
        }
        PixelLayout::Rgba => {
            let buf = ImageBuffer::from_raw(w, h, img.data.clone()).ok_or_else(size_error)?;
            Ok(DynamicImage::ImageRgba32F(buf))
        }
    }
}

fn quantized_8(img: &ComposedImage) -> ViewbakeResult<DynamicImage> {
    let (w, h) = (img.width, img.height);
    let data: Vec<u8> = img
        .data
        .iter()
        .map(|&v| quantize(v, u16::from(u8::MAX)) as u8)
        .collect();
    Ok(match img.layout {
        PixelLayout::Gray => {
            DynamicImage::ImageLuma8(ImageBuffer::from_raw(w, h, data).ok_or_else(size_error)?)
        }
        PixelLayout::Rgb => {
            DynamicImage::ImageRgb8(ImageBuffer::from_raw(w, h, data).ok_or_else(size_error)?)
        }
        PixelLayout::Rgba => {
            DynamicImage::ImageRgba8(ImageBuffer::from_raw(w, h, data).ok_or_else(size_error)?)
        }
    })
}

fn quantized_16(img: &ComposedImage) -> ViewbakeResult<DynamicImage> {
    let (w, h) = (img.width, img.height);
    let data: Vec<u16> = img.data.iter().map(|&v| quantize(v, u16::MAX)).collect();
    Ok(match img.layout {
        PixelLayout::Gray => {
            DynamicImage::ImageLuma16(ImageBuffer::from_raw(w, h, data).ok_or_else(size_error)?)
        }
        PixelLayout::Rgb => {
            DynamicImage::ImageRgb16(ImageBuffer::from_raw(w, h, data).ok_or_else(size_error)?)
        }
        PixelLayout::Rgba => {
            DynamicImage::ImageRgba16(ImageBuffer::from_raw(w, h, data).ok_or_else(size_error)?)
        }
    })
}
