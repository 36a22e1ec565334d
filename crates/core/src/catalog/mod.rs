//! Format catalog: static mapping from input extension to convertible outputs.
//!
//! The catalog is a pure lookup with no state. Extensions are matched
//! case-insensitively and may be given with or without the leading dot.
//!
//! # Example
//!
//! ```ignore
//! use convoy_core::catalog::{self, Category};
//!
//! assert_eq!(catalog::category_of("MP4"), Some(Category::Video));
//! let groups = catalog::target_formats(".cr2");
//! assert_eq!(groups[0].formats, vec!["png", "jpg", "tiff"]);
//! ```

mod types;

use std::path::Path;

pub use types::{Category, TargetGroup};

type Entry = &'static [(Category, &'static [&'static str])];

/// Camera raw extensions, decoded through the raw pipeline.
pub const RAW_EXTENSIONS: &[&str] = &[
    "3fr", "arw", "cr2", "cr3", "crw", "dcr", "dng", "erf", "mos", "mrw", "orf", "pef", "raf",
    "raw", "rw2", "x3f",
];

/// Video container extensions.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm", "flv", "wmv"];

/// Audio extensions.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "flac", "aac", "wma", "m4a"];

const VIDEO_TARGETS: Entry = &[
    (Category::Video, &["avi", "mkv", "mov"]),
    (Category::Audio, &["mp3", "wav"]),
    (Category::Image, &["png", "jpg", "gif"]),
];
const AUDIO_TARGETS: Entry = &[(Category::Audio, &["wav", "ogg", "flac"])];
const WAV_TARGETS: Entry = &[(Category::Audio, &["mp3", "ogg", "flac"])];
const RAW_TARGETS: Entry = &[(Category::Image, &["png", "jpg", "tiff"])];
const ARCHIVE_ALL: Entry = &[(Category::Archive, &["7z", "zip", "tar"])];

/// Normalizes an extension: lowercase, no leading dot.
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Returns the normalized extension of a path, if any.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(normalize_extension)
}

/// Whether the extension is a camera raw format.
pub fn is_raw_extension(ext: &str) -> bool {
    let ext = normalize_extension(ext);
    RAW_EXTENSIONS.contains(&ext.as_str())
}

fn lookup(ext: &str) -> Option<Entry> {
    let entry: Entry = match ext {
        // Archives
        "7z" => &[(Category::Archive, &["zip", "tar"])],
        "zip" => &[(Category::Archive, &["7z", "tar"])],
        "tar" => &[(Category::Archive, &["7z", "zip"])],
        "rar" | "iso" | "dmg" | "cab" | "gz" | "bz2" | "jar" | "deb" | "ace" | "alz" | "arc"
        | "arj" | "cpio" | "img" | "lha" | "lz" | "lzma" => ARCHIVE_ALL,

        // Images
        "png" => &[(Category::Image, &["jpg", "webp", "bmp", "tiff"])],
        "jpg" | "jpeg" => &[(Category::Image, &["png", "webp", "bmp", "tiff"])],
        "webp" => &[(Category::Image, &["png", "jpg", "bmp", "tiff"])],
        "bmp" => &[(Category::Image, &["png", "jpg", "webp", "tiff"])],
        "tiff" | "tif" => &[(Category::Image, &["png", "jpg", "webp", "bmp"])],
        "heic" | "heif" | "avif" => &[(Category::Image, &["png", "jpg", "webp", "tiff"])],
        "gif" => &[(Category::Image, &["png", "webp"])],
        "ico" => &[(Category::Image, &["png"])],
        "icns" => &[(Category::Image, &["png", "ico"])],
        "psd" | "xcf" => &[(Category::Image, &["png", "jpg", "tiff"])],
        "eps" | "ps" | "ppm" | "jfif" => &[(Category::Image, &["png", "jpg"])],

        // Documents
        "docx" | "doc" => &[(Category::Document, &["pdf", "odt", "txt"])],
        "pdf" => &[(Category::Document, &["docx", "txt"])],
        "odt" | "rtf" | "txt" | "pub" | "xps" => &[(Category::Document, &["pdf", "docx"])],

        // Presentations
        "pptx" | "ppt" => &[(Category::Presentation, &["pdf", "odp"])],
        "odp" => &[(Category::Presentation, &["pdf", "pptx"])],

        // Spreadsheets
        "xlsx" | "xls" => &[(Category::Spreadsheet, &["pdf", "ods", "csv", "xml", "fods"])],
        "ods" => &[(Category::Spreadsheet, &["pdf", "xlsx", "csv", "xml", "fods"])],

        "wav" => WAV_TARGETS,
        other if VIDEO_EXTENSIONS.contains(&other) => VIDEO_TARGETS,
        other if AUDIO_EXTENSIONS.contains(&other) => AUDIO_TARGETS,
        other if RAW_EXTENSIONS.contains(&other) => RAW_TARGETS,
        _ => return None,
    };
    Some(entry)
}

/// Classifies an extension. `None` means unknown and non-convertible.
///
/// The category of an extension is the first output category it maps to,
/// so video files classify as video even though they also offer audio and
/// image targets.
pub fn category_of(ext: &str) -> Option<Category> {
    lookup(&normalize_extension(ext)).and_then(|entry| entry.first().map(|(c, _)| *c))
}

/// Classifies a path by its extension.
pub fn category_of_path(path: &Path) -> Option<Category> {
    extension_of(path).and_then(|ext| category_of(&ext))
}

/// Returns the output formats for an extension, grouped by output category.
///
/// Empty if the extension is unsupported.
pub fn target_formats(ext: &str) -> Vec<TargetGroup> {
    lookup(&normalize_extension(ext))
        .map(|entry| {
            entry
                .iter()
                .map(|(category, formats)| TargetGroup {
                    category: *category,
                    formats: formats.to_vec(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Whether the catalog offers `(category, format)` for the extension.
pub fn supports(ext: &str, category: Category, format: &str) -> bool {
    target_formats(ext)
        .iter()
        .any(|g| g.category == category && g.contains(format))
}

/// Resolves the output category of a format for the extension.
///
/// Returns the first group containing the format.
pub fn category_for_target(ext: &str, format: &str) -> Option<Category> {
    target_formats(ext)
        .into_iter()
        .find(|g| g.contains(format))
        .map(|g| g.category)
}

/// Returns the first offered `(category, format)` pair, used as the default target.
pub fn default_target(ext: &str) -> Option<(Category, &'static str)> {
    lookup(&normalize_extension(ext)).and_then(|entry| {
        entry
            .first()
            .and_then(|(c, formats)| formats.first().map(|f| (*c, *f)))
    })
}

/// All extensions known to the catalog.
pub fn known_extensions() -> Vec<&'static str> {
    const NAMED: &[&str] = &[
        "7z", "zip", "tar", "rar", "iso", "dmg", "cab", "gz", "bz2", "jar", "deb", "ace", "alz",
        "arc", "arj", "cpio", "img", "lha", "lz", "lzma", "png", "jpg", "jpeg", "webp", "bmp",
        "tiff", "tif", "heic", "heif", "avif", "gif", "ico", "icns", "psd", "xcf", "eps", "ps",
        "ppm", "jfif", "docx", "doc", "pdf", "odt", "rtf", "txt", "pub", "xps", "pptx", "ppt",
        "odp", "xlsx", "xls", "ods",
    ];
    NAMED
        .iter()
        .chain(VIDEO_EXTENSIONS)
        .chain(AUDIO_EXTENSIONS)
        .chain(RAW_EXTENSIONS)
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_of_known_sets() {
        assert_eq!(category_of("mp4"), Some(Category::Video));
        assert_eq!(category_of(".MKV"), Some(Category::Video));
        assert_eq!(category_of("flac"), Some(Category::Audio));
        assert_eq!(category_of("wav"), Some(Category::Audio));
        assert_eq!(category_of("cr2"), Some(Category::Image));
        assert_eq!(category_of("heic"), Some(Category::Image));
        assert_eq!(category_of("pdf"), Some(Category::Document));
        assert_eq!(category_of("pptx"), Some(Category::Presentation));
        assert_eq!(category_of("ods"), Some(Category::Spreadsheet));
        assert_eq!(category_of("rar"), Some(Category::Archive));
    }

    #[test]
    fn test_unknown_extension() {
        assert_eq!(category_of("xyz"), None);
        assert_eq!(category_of(""), None);
        assert!(target_formats("xyz").is_empty());
        assert!(default_target("xyz").is_none());
    }

    #[test]
    fn test_video_offers_three_categories() {
        let groups = target_formats("mov");
        let categories: Vec<_> = groups.iter().map(|g| g.category).collect();
        assert_eq!(
            categories,
            vec![Category::Video, Category::Audio, Category::Image]
        );
        assert!(groups[2].contains("gif"));
    }

    #[test]
    fn test_wav_excludes_itself() {
        let groups = target_formats("wav");
        assert_eq!(groups[0].formats, vec!["mp3", "ogg", "flac"]);
        let groups = target_formats("mp3");
        assert_eq!(groups[0].formats, vec!["wav", "ogg", "flac"]);
    }

    #[test]
    fn test_raw_extensions_map_to_image() {
        for ext in RAW_EXTENSIONS {
            assert!(is_raw_extension(ext));
            assert_eq!(
                target_formats(ext),
                vec![TargetGroup {
                    category: Category::Image,
                    formats: vec!["png", "jpg", "tiff"],
                }]
            );
        }
        assert!(!is_raw_extension("jpg"));
    }

    #[test]
    fn test_supports_and_category_for_target() {
        assert!(supports("pdf", Category::Document, "docx"));
        assert!(!supports("pdf", Category::Document, "odt"));
        assert!(supports("mp4", Category::Image, "GIF"));
        assert_eq!(category_for_target("mp4", "mp3"), Some(Category::Audio));
        assert_eq!(category_for_target("mp4", "flac"), None);
    }

    #[test]
    fn test_default_target() {
        assert_eq!(default_target("png"), Some((Category::Image, "jpg")));
        assert_eq!(default_target("mkv"), Some((Category::Video, "avi")));
    }

    #[test]
    fn test_every_known_extension_resolves() {
        for ext in known_extensions() {
            assert!(category_of(ext).is_some(), "missing category for {}", ext);
            assert!(!target_formats(ext).is_empty());
        }
    }

    #[test]
    fn test_extension_of_path() {
        assert_eq!(
            extension_of(Path::new("/a/b/Photo.CR2")),
            Some("cr2".to_string())
        );
        assert_eq!(extension_of(Path::new("/a/b/noext")), None);
        assert_eq!(
            category_of_path(Path::new("clip.webm")),
            Some(Category::Video)
        );
    }
}
