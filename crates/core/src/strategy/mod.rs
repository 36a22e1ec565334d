//! Strategy selection: which conversion path handles an input/output pair.
//!
//! Rules are evaluated top to bottom and the first match wins. The PDF and
//! video special cases come before the same-category rules they overlap.

use serde::Serialize;
use std::fmt;

use crate::catalog::{self, Category};

/// A named conversion path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    PdfToDocx,
    PdfToText,
    VideoToGif,
    VideoToAudio,
    VideoToImage,
    MediaTranscode,
    RawImageDecode,
    ImageTranscode,
    DocumentConvert,
    ArchiveRepack,
    Unsupported,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PdfToDocx => "pdf_to_docx",
            Self::PdfToText => "pdf_to_text",
            Self::VideoToGif => "video_to_gif",
            Self::VideoToAudio => "video_to_audio",
            Self::VideoToImage => "video_to_image",
            Self::MediaTranscode => "media_transcode",
            Self::RawImageDecode => "raw_image_decode",
            Self::ImageTranscode => "image_transcode",
            Self::DocumentConvert => "document_convert",
            Self::ArchiveRepack => "archive_repack",
            Self::Unsupported => "unsupported",
        }
    }

    /// Whether the strategy drives the external transcoder.
    pub fn uses_transcoder(&self) -> bool {
        matches!(
            self,
            Self::VideoToGif | Self::VideoToAudio | Self::VideoToImage | Self::MediaTranscode
        )
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Rule = fn(&Selection<'_>) -> Option<Strategy>;

struct Selection<'a> {
    ext: &'a str,
    input: Option<Category>,
    output: Category,
    format: &'a str,
}

/// Ordered rule table; the first rule returning `Some` wins.
const RULES: &[Rule] = &[
    pdf_to_docx,
    pdf_to_text,
    video_to_gif,
    video_to_audio,
    video_to_image,
    same_category,
];

fn pdf_to_docx(s: &Selection<'_>) -> Option<Strategy> {
    (s.ext == "pdf" && s.format == "docx").then_some(Strategy::PdfToDocx)
}

fn pdf_to_text(s: &Selection<'_>) -> Option<Strategy> {
    (s.ext == "pdf" && s.format == "txt").then_some(Strategy::PdfToText)
}

fn video_to_gif(s: &Selection<'_>) -> Option<Strategy> {
    (s.input == Some(Category::Video) && s.format == "gif").then_some(Strategy::VideoToGif)
}

fn video_to_audio(s: &Selection<'_>) -> Option<Strategy> {
    (s.input == Some(Category::Video) && s.output == Category::Audio)
        .then_some(Strategy::VideoToAudio)
}

fn video_to_image(s: &Selection<'_>) -> Option<Strategy> {
    (s.input == Some(Category::Video) && s.output == Category::Image)
        .then_some(Strategy::VideoToImage)
}

fn same_category(s: &Selection<'_>) -> Option<Strategy> {
    if s.input != Some(s.output) {
        return None;
    }
    Some(match s.output {
        Category::Video | Category::Audio => Strategy::MediaTranscode,
        Category::Image if catalog::is_raw_extension(s.ext) => Strategy::RawImageDecode,
        Category::Image => Strategy::ImageTranscode,
        Category::Document | Category::Presentation | Category::Spreadsheet => {
            Strategy::DocumentConvert
        }
        Category::Archive => Strategy::ArchiveRepack,
    })
}

/// Selects the strategy for converting a file with extension `input_ext`
/// (category `input_category`) into `output_format` of `output_category`.
///
/// Never fails: pairs no rule matches resolve to [`Strategy::Unsupported`].
pub fn select(
    input_ext: &str,
    input_category: Option<Category>,
    output_category: Category,
    output_format: &str,
) -> Strategy {
    let ext = catalog::normalize_extension(input_ext);
    let format = catalog::normalize_extension(output_format);
    let selection = Selection {
        ext: &ext,
        input: input_category,
        output: output_category,
        format: &format,
    };
    RULES
        .iter()
        .find_map(|rule| rule(&selection))
        .unwrap_or(Strategy::Unsupported)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pick(ext: &str, out: Category, fmt: &str) -> Strategy {
        select(ext, catalog::category_of(ext), out, fmt)
    }

    #[test]
    fn test_pdf_special_cases_win() {
        assert_eq!(pick("pdf", Category::Document, "docx"), Strategy::PdfToDocx);
        assert_eq!(pick("PDF", Category::Document, ".TXT"), Strategy::PdfToText);
        assert_eq!(pick("docx", Category::Document, "txt"), Strategy::DocumentConvert);
    }

    #[test]
    fn test_video_rules() {
        assert_eq!(pick("mp4", Category::Image, "gif"), Strategy::VideoToGif);
        assert_eq!(pick("mkv", Category::Audio, "mp3"), Strategy::VideoToAudio);
        assert_eq!(pick("mov", Category::Image, "png"), Strategy::VideoToImage);
        assert_eq!(pick("avi", Category::Video, "mkv"), Strategy::MediaTranscode);
    }

    #[test]
    fn test_same_category_rules() {
        assert_eq!(pick("flac", Category::Audio, "wav"), Strategy::MediaTranscode);
        assert_eq!(pick("cr2", Category::Image, "jpg"), Strategy::RawImageDecode);
        assert_eq!(pick("png", Category::Image, "jpg"), Strategy::ImageTranscode);
        assert_eq!(pick("xlsx", Category::Spreadsheet, "csv"), Strategy::DocumentConvert);
        assert_eq!(pick("pptx", Category::Presentation, "pdf"), Strategy::DocumentConvert);
        assert_eq!(pick("rar", Category::Archive, "zip"), Strategy::ArchiveRepack);
    }

    #[test]
    fn test_gif_input_is_not_video_to_gif() {
        assert_eq!(pick("gif", Category::Image, "png"), Strategy::ImageTranscode);
    }

    #[test]
    fn test_unsupported_pairs() {
        assert_eq!(pick("mp3", Category::Video, "mp4"), Strategy::Unsupported);
        assert_eq!(pick("png", Category::Document, "pdf"), Strategy::Unsupported);
        assert_eq!(select("xyz", None, Category::Image, "png"), Strategy::Unsupported);
    }

    #[test]
    fn test_every_catalog_pair_is_supported() {
        for ext in catalog::known_extensions() {
            for group in catalog::target_formats(ext) {
                for format in &group.formats {
                    let strategy = pick(ext, group.category, format);
                    assert_ne!(
                        strategy,
                        Strategy::Unsupported,
                        "{} -> {} ({})",
                        ext,
                        format,
                        group.category
                    );
                }
            }
        }
    }
}
