use lopdf::{dictionary, Document, Object, ObjectId};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::converter::{ConverterError, ProgressReporter};

/// Page attributes a page may inherit from its parent node.
const INHERITED: &[&[u8]] = &[b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Appends the pages of every input, in order, into one PDF at `output`.
///
/// Progress is reported as inputs appended over total inputs.
pub fn merge_pdfs(
    inputs: &[PathBuf],
    output: &Path,
    progress: &ProgressReporter,
) -> Result<usize, ConverterError> {
    let mut merged = Document::with_version("1.5");
    let mut pages: Vec<ObjectId> = Vec::new();
    let mut max_id = 1;

    for (i, input) in inputs.iter().enumerate() {
        let mut doc = Document::load(input)?;
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        let doc_pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        for page in &doc_pages {
            inherit_attributes(&mut doc, *page);
        }
        debug!(path = %input.display(), pages = doc_pages.len(), "Appending PDF");

        pages.extend(doc_pages);
        merged.objects.extend(doc.objects);
        progress.report_fraction(i + 1, inputs.len());
    }

    merged.max_id = max_id;
    let kids: Vec<Object> = pages.iter().map(|id| Object::Reference(*id)).collect();
    let pages_id = merged.add_object(dictionary! {
        "Type" => "Pages",
        "Kids" => Object::Array(kids),
        "Count" => Object::Integer(pages.len() as i64),
    });
    for page in &pages {
        if let Ok(dict) = merged.get_object_mut(*page).and_then(Object::as_dict_mut) {
            dict.set("Parent", Object::Reference(pages_id));
        }
    }
    let catalog_id = merged.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    merged.trailer.set("Root", Object::Reference(catalog_id));

    // Drops the source catalogs and page trees.
    merged.prune_objects();
    merged.save(output)?;
    Ok(pages.len())
}

/// Copies inheritable attributes from the page's parent onto the page, so
/// they survive re-parenting under the merged page tree.
fn inherit_attributes(doc: &mut Document, page: ObjectId) {
    let inherited: Vec<(Vec<u8>, Object)> = {
        let Ok(page_dict) = doc.get_object(page).and_then(Object::as_dict) else {
            return;
        };
        let parent = page_dict
            .get(b"Parent")
            .and_then(Object::as_reference)
            .and_then(|id| doc.get_object(id))
            .and_then(Object::as_dict);
        let Ok(parent) = parent else {
            return;
        };
        INHERITED
            .iter()
            .filter(|key| !page_dict.has(key))
            .filter_map(|key| parent.get(key).ok().map(|v| (key.to_vec(), v.clone())))
            .collect()
    };

    if let Ok(dict) = doc.get_object_mut(page).and_then(Object::as_dict_mut) {
        for (key, value) in inherited {
            dict.set(key, value);
        }
    }
}
