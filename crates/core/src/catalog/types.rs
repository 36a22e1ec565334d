//! Types for the format catalog.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Coarse file kind used for format grouping and strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Image,
    Video,
    Audio,
    Document,
    Presentation,
    Spreadsheet,
    Archive,
}

impl Category {
    /// All categories, in catalog order.
    pub const ALL: [Category; 7] = [
        Category::Image,
        Category::Video,
        Category::Audio,
        Category::Document,
        Category::Presentation,
        Category::Spreadsheet,
        Category::Archive,
    ];

    /// Returns the lowercase name of this category.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
            Self::Presentation => "presentation",
            Self::Spreadsheet => "spreadsheet",
            Self::Archive => "archive",
        }
    }

    /// Whether this category is handled by the office document engine.
    pub fn is_office(&self) -> bool {
        matches!(
            self,
            Self::Document | Self::Presentation | Self::Spreadsheet
        )
    }

    /// Whether this category is handled by the media transcoder.
    pub fn is_media(&self) -> bool {
        matches!(self, Self::Video | Self::Audio)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown category: {}", s))
    }
}

/// Output formats reachable from one input extension within one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetGroup {
    /// Output category.
    pub category: Category,
    /// Output formats (lowercase, no leading dot).
    pub formats: Vec<&'static str>,
}

impl TargetGroup {
    /// Whether this group offers the given format.
    pub fn contains(&self, format: &str) -> bool {
        self.formats.iter().any(|f| f.eq_ignore_ascii_case(format))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trip() {
        for category in Category::ALL {
            let parsed: Category = category.as_str().parse().unwrap();
            assert_eq!(parsed, category);
        }
        assert_eq!("VIDEO".parse::<Category>().unwrap(), Category::Video);
        assert!("movie".parse::<Category>().is_err());
    }

    #[test]
    fn test_category_serialization() {
        let json = serde_json::to_string(&Category::Spreadsheet).unwrap();
        assert_eq!(json, "\"spreadsheet\"");
    }

    #[test]
    fn test_office_and_media() {
        assert!(Category::Presentation.is_office());
        assert!(!Category::Archive.is_office());
        assert!(Category::Audio.is_media());
        assert!(!Category::Image.is_media());
    }
}
