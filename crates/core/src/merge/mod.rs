//! Merge coordinator: joins N inputs of one category into a single output.
//!
//! Preconditions are checked by [`validate_merge`] before any job exists.
//! PDFs are merged page by page in process; videos are joined by the
//! transcoder's concat demuxer without re-encoding.

mod executor;
mod pdf;
mod video;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::catalog::{self, Category};

pub use executor::MergeExecutor;
pub use pdf::merge_pdfs;
pub use video::{concat_args, write_manifest};

/// Kind of merge, fixed by the input category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeKind {
    /// PDF pages appended in order.
    Pdf,
    /// Stream-copy concatenation.
    Video,
}

impl MergeKind {
    pub fn category(&self) -> Category {
        match self {
            Self::Pdf => Category::Document,
            Self::Video => Category::Video,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for MergeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a selection cannot be merged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("Select at least two files to merge (got {count})")]
    TooFewInputs { count: usize },

    #[error("All selected files must be of the same category (found {found})")]
    MixedCategories { found: String },

    #[error("PDF merging only supports .pdf files: {}", .path.display())]
    NonPdfDocument { path: PathBuf },

    #[error("Merging is not supported for '{category}' files")]
    UnsupportedCategory { category: String },

    #[error("Merged {kind} output must end in .{expected}: {}", .path.display())]
    OutputFormatMismatch {
        kind: MergeKind,
        expected: String,
        path: PathBuf,
    },
}

fn category_name(category: Option<Category>) -> &'static str {
    category.map(|c| c.as_str()).unwrap_or("unknown")
}

/// Checks the merge preconditions and returns the merge kind.
///
/// At least two inputs, all of one category, and for documents every
/// input must be a PDF. The output format follows the inputs: a PDF for
/// PDFs, one of the input containers for videos.
pub fn validate_merge(inputs: &[PathBuf], output: &Path) -> Result<MergeKind, MergeError> {
    if inputs.len() < 2 {
        return Err(MergeError::TooFewInputs {
            count: inputs.len(),
        });
    }

    let categories: BTreeSet<&'static str> = inputs
        .iter()
        .map(|p| category_name(catalog::category_of_path(p)))
        .collect();
    if categories.len() > 1 {
        return Err(MergeError::MixedCategories {
            found: categories.into_iter().collect::<Vec<_>>().join(", "),
        });
    }

    let kind = match catalog::category_of_path(&inputs[0]) {
        Some(Category::Document) => {
            if let Some(path) = inputs
                .iter()
                .find(|p| catalog::extension_of(p).as_deref() != Some("pdf"))
            {
                return Err(MergeError::NonPdfDocument { path: path.clone() });
            }
            MergeKind::Pdf
        }
        Some(Category::Video) => MergeKind::Video,
        other => {
            return Err(MergeError::UnsupportedCategory {
                category: category_name(other).to_string(),
            })
        }
    };

    let containers: BTreeSet<String> = inputs
        .iter()
        .filter_map(|p| catalog::extension_of(p))
        .collect();
    let output_ext = catalog::extension_of(output).unwrap_or_default();
    if !containers.contains(&output_ext) {
        return Err(MergeError::OutputFormatMismatch {
            kind,
            expected: containers.into_iter().collect::<Vec<_>>().join(" or ."),
            path: output.to_path_buf(),
        });
    }
    Ok(kind)
}
