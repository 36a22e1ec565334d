//! In-process image executors.
//!
//! Decoding and encoding run on the blocking pool. A cancel request does
//! not interrupt a codec call; the job is reported cancelled once it ends.

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::job::ImageSettings;

use super::error::ConverterError;
use super::process::{run_blocking, verify_output};
use super::traits::Executor;
use super::types::{ExecutionContext, ExecutionRequest};

/// Formats that cannot carry an alpha channel.
const OPAQUE_FORMATS: &[&str] = &["jpg", "jpeg", "bmp"];

/// Largest icon edge the ICO encoder accepts.
const ICO_MAX_EDGE: u32 = 256;

/// Decodes with the general codecs, optionally resizes, then encodes.
pub struct ImageExecutor;

/// Decodes camera raw files, then encodes without applying settings.
pub struct RawImageExecutor;

#[async_trait]
impl Executor for ImageExecutor {
    fn name(&self) -> &str {
        "image"
    }

    async fn execute(
        &self,
        request: &ExecutionRequest,
        _ctx: &ExecutionContext,
    ) -> Result<PathBuf, ConverterError> {
        request.prepare_output_dir().await?;
        let input = request.input().to_path_buf();
        let output = request.output_path.clone();
        let format = request.target_format.clone();
        let settings = request.settings.as_image().cloned().unwrap_or_default();

        run_blocking(move || transcode_image(&input, &output, &format, &settings)).await?;
        verify_output(&request.output_path).await
    }
}

#[async_trait]
impl Executor for RawImageExecutor {
    fn name(&self) -> &str {
        "raw_image"
    }

    async fn execute(
        &self,
        request: &ExecutionRequest,
        _ctx: &ExecutionContext,
    ) -> Result<PathBuf, ConverterError> {
        request.prepare_output_dir().await?;
        let input = request.input().to_path_buf();
        let output = request.output_path.clone();
        let format = request.target_format.clone();

        run_blocking(move || {
            let raster = decode_raw(&input)?;
            encode(&DynamicImage::ImageRgb8(raster), &output, &format, None)
        })
        .await?;
        verify_output(&request.output_path).await
    }
}

/// Decodes `input`, applies resize and alpha flattening, and writes `output`.
pub fn transcode_image(
    input: &Path,
    output: &Path,
    format: &str,
    settings: &ImageSettings,
) -> Result<(), ConverterError> {
    let img = image::ImageReader::open(input)?
        .with_guessed_format()?
        .decode()?;

    let img = match settings
        .resize
        .target_dimensions(img.width(), img.height())
    {
        Some((width, height)) => {
            debug!(
                from = ?(img.width(), img.height()),
                to = ?(width, height),
                "Resizing image"
            );
            img.resize_exact(width, height, FilterType::Lanczos3)
        }
        None => img,
    };

    encode(&img, output, format, Some(settings.quality))
}

/// Decodes a camera raw file to an 8-bit RGB raster.
pub fn decode_raw(input: &Path) -> Result<RgbImage, ConverterError> {
    let decoded = imagepipe::simple_decode_8bit(input, 0, 0)
        .map_err(|e| ConverterError::RawDecode {
            reason: e.to_string(),
        })?;
    let (width, height) = (decoded.width as u32, decoded.height as u32);
    RgbImage::from_raw(width, height, decoded.data).ok_or_else(|| ConverterError::RawDecode {
        reason: format!("raster size does not match {}x{}", width, height),
    })
}

/// Composites transparent pixels over white.
pub fn flatten(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let rgba = img.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = u16::from(a);
        let blend = |c: u8| ((u16::from(c) * alpha + 255 * (255 - alpha)) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Writes `img` as `format`. `quality` applies to JPEG only.
pub fn encode(
    img: &DynamicImage,
    output: &Path,
    format: &str,
    quality: Option<u8>,
) -> Result<(), ConverterError> {
    let format = format.to_ascii_lowercase();
    let image_format = ImageFormat::from_extension(&format).ok_or_else(|| {
        ConverterError::invalid_settings(format!("no encoder for '{}'", format))
    })?;

    let fitted;
    let oversized_icon =
        image_format == ImageFormat::Ico && img.width().max(img.height()) > ICO_MAX_EDGE;
    let img = if oversized_icon {
        fitted = img.resize(ICO_MAX_EDGE, ICO_MAX_EDGE, FilterType::Lanczos3);
        &fitted
    } else {
        img
    };

    let flattened;
    let img = if OPAQUE_FORMATS.contains(&format.as_str()) {
        flattened = DynamicImage::ImageRgb8(flatten(img));
        &flattened
    } else if needs_8bit(image_format, img) {
        flattened = if img.color().has_alpha() {
            DynamicImage::ImageRgba8(img.to_rgba8())
        } else {
            DynamicImage::ImageRgb8(img.to_rgb8())
        };
        &flattened
    } else {
        img
    };

    match (image_format, quality) {
        (ImageFormat::Jpeg, Some(quality)) => {
            let writer = BufWriter::new(File::create(output)?);
            let encoder = JpegEncoder::new_with_quality(writer, quality.clamp(1, 100));
            img.write_with_encoder(encoder)?;
        }
        _ => img.save_with_format(output, image_format)?,
    }
    Ok(())
}

// These encoders only take 8-bit RGB(A) input.
fn needs_8bit(format: ImageFormat, img: &DynamicImage) -> bool {
    matches!(
        format,
        ImageFormat::WebP | ImageFormat::Bmp | ImageFormat::Ico | ImageFormat::Gif
    ) && !matches!(img, DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::ImageResize;
    use image::{GenericImageView, Rgba, RgbaImage};
    use tempfile::TempDir;

    fn write_png(dir: &Path, name: &str, width: u32, height: u32, alpha: u8) -> PathBuf {
        let path = dir.join(name);
        let img = RgbaImage::from_pixel(width, height, Rgba([200, 10, 10, alpha]));
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_flatten_over_white() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 0])));
        assert_eq!(flatten(&img).get_pixel(0, 0), &Rgb([255, 255, 255]));

        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([10, 20, 30, 255])));
        assert_eq!(flatten(&img).get_pixel(0, 0), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_png_to_jpg_with_resize() {
        let dir = TempDir::new().unwrap();
        let input = write_png(dir.path(), "in.png", 400, 200, 128);
        let output = dir.path().join("in.jpg");
        let settings = ImageSettings {
            quality: 80,
            resize: ImageResize::Percent(50),
        };

        transcode_image(&input, &output, "jpg", &settings).unwrap();

        let decoded = image::open(&output).unwrap();
        assert_eq!(decoded.dimensions(), (200, 100));
        assert!(!decoded.color().has_alpha());
    }

    #[test]
    fn test_long_edge_portrait() {
        let dir = TempDir::new().unwrap();
        let input = write_png(dir.path(), "tall.png", 100, 300, 255);
        let output = dir.path().join("tall.bmp");
        let settings = ImageSettings {
            quality: 95,
            resize: ImageResize::LongEdge(150),
        };

        transcode_image(&input, &output, "bmp", &settings).unwrap();
        assert_eq!(image::open(&output).unwrap().dimensions(), (50, 150));
    }

    #[test]
    fn test_large_icon_is_fitted() {
        let dir = TempDir::new().unwrap();
        let input = write_png(dir.path(), "icon.png", 1024, 512, 255);
        let output = dir.path().join("icon.ico");
        transcode_image(&input, &output, "ico", &ImageSettings::default()).unwrap();
        assert_eq!(image::open(&output).unwrap().dimensions(), (256, 128));
    }

    #[test]
    fn test_png_keeps_alpha_for_tiff() {
        let dir = TempDir::new().unwrap();
        let input = write_png(dir.path(), "a.png", 8, 8, 10);
        let output = dir.path().join("a.tiff");
        transcode_image(&input, &output, "tiff", &ImageSettings::default()).unwrap();
        assert!(image::open(&output).unwrap().color().has_alpha());
    }

    #[test]
    fn test_unknown_target_format() {
        let dir = TempDir::new().unwrap();
        let input = write_png(dir.path(), "a.png", 4, 4, 255);
        let err = transcode_image(
            &input,
            &dir.path().join("a.xyz"),
            "xyz",
            &ImageSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConverterError::InvalidSettings { .. }));
    }

    #[test]
    fn test_missing_input_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = transcode_image(
            &dir.path().join("missing.png"),
            &dir.path().join("out.jpg"),
            "jpg",
            &ImageSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConverterError::Io(_)));
    }

    #[test]
    fn test_raw_decode_rejects_non_raw() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("fake.cr2");
        std::fs::write(&input, b"not a raw file").unwrap();
        assert!(matches!(
            decode_raw(&input),
            Err(ConverterError::RawDecode { .. })
        ));
    }
}
