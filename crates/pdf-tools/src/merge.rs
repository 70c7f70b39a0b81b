//! PDF Merge algorithm
//!
//! Combines multiple PDFs into a single document.

use crate::error::PdfToolError;
use crate::{load_document, save_document};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::BTreeMap;

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Merge multiple PDFs into one
///
/// The algorithm:
/// 1. If empty, return error
/// 2. If single document, return it as-is
/// 3. Use the first document as the destination
/// 4. For each source document:
///    a. Calculate ID offset to avoid conflicts
///    b. Import all objects with remapped IDs
///    c. Append pages to the destination
/// 5. Flatten the page tree so every page hangs off the root `Pages` node
/// 6. Prune orphaned catalogs, compress and return the merged result
pub fn merge_documents(documents: Vec<Vec<u8>>) -> Result<Vec<u8>, PdfToolError> {
    if documents.is_empty() {
        return Err(PdfToolError::InvalidInput("No documents to merge".into()));
    }

    if documents.len() == 1 {
        let only = documents.into_iter().next().unwrap_or_default();
        load_document(&only)?;
        return Ok(only);
    }

    let mut loaded_docs = Vec::with_capacity(documents.len());
    for (i, doc_bytes) in documents.iter().enumerate() {
        let mut doc = load_document(doc_bytes).map_err(|e| {
            PdfToolError::ParseError(format!("Failed to load document {}: {}", i + 1, e))
        })?;
        materialize_inherited_attributes(&mut doc);
        loaded_docs.push(doc);
    }

    let mut dest = loaded_docs.remove(0);
    let mut dest_max_id = dest.max_id;
    let mut dest_page_refs = get_page_references(&dest);

    for source in loaded_docs.into_iter() {
        let source_pages = get_page_references(&source);
        let id_offset = dest_max_id;

        let mut remapped_objects = BTreeMap::new();
        for (old_id, object) in source.objects.into_iter() {
            let new_id = (old_id.0 + id_offset, old_id.1);
            remapped_objects.insert(new_id, remap_object_refs(object, id_offset));
        }
        dest.objects.extend(remapped_objects);

        for old_page_ref in source_pages {
            dest_page_refs.push((old_page_ref.0 + id_offset, old_page_ref.1));
        }

        dest_max_id = (source.max_id + id_offset).max(dest_max_id);
    }

    dest.max_id = dest_max_id;
    update_page_tree(&mut dest, &dest_page_refs)?;

    dest.prune_objects();
    dest.compress();
    save_document(&mut dest)
}

/// Get all page object references from a document, in page order
fn get_page_references(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().values().copied().collect()
}

/// Recursively remap object references in an object
fn remap_object_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_object_refs(o, offset))
                .collect(),
        ),
        Object::Dictionary(dict) => Object::Dictionary(remap_dict(dict, offset)),
        Object::Stream(mut stream) => {
            stream.dict = remap_dict(stream.dict, offset);
            Object::Stream(stream)
        }
        other => other,
    }
}

fn remap_dict(mut dict: Dictionary, offset: u32) -> Dictionary {
    for (_, value) in dict.iter_mut() {
        *value = remap_object_refs(std::mem::replace(value, Object::Null), offset);
    }
    dict
}

/// Copy inherited attributes down onto each page
///
/// Pages are re-hung directly under the root `Pages` node after merging,
/// which would otherwise lose anything they inherited from intermediate nodes.
fn materialize_inherited_attributes(doc: &mut Document) {
    let page_ids: Vec<ObjectId> = get_page_references(doc);

    for page_id in page_ids {
        let mut inherited = Vec::new();
        for key in INHERITABLE {
            if page_has_key(doc, page_id, key) {
                continue;
            }
            if let Some(value) = find_inherited(doc, page_id, key) {
                inherited.push((key.to_vec(), value));
            }
        }

        if let Ok(page) = doc
            .get_object_mut(page_id)
            .and_then(|object| object.as_dict_mut())
        {
            for (key, value) in inherited {
                page.set(key, value);
            }
        }
    }
}

fn page_has_key(doc: &Document, page_id: ObjectId, key: &[u8]) -> bool {
    doc.get_object(page_id)
        .and_then(|object| object.as_dict())
        .map(|page| page.has(key))
        .unwrap_or(false)
}

/// Walk `/Parent` links looking for `key`; bounded to survive cyclic trees
pub(crate) fn find_inherited(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = doc.get_object(page_id).ok()?.as_dict().ok()?;
    for _ in 0..64 {
        if let Ok(value) = current.get(key) {
            return Some(value.clone());
        }
        let parent_id = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = doc.get_object(parent_id).ok()?.as_dict().ok()?;
    }
    None
}

/// Point the root page tree at `page_refs` and reparent every page onto it
fn update_page_tree(doc: &mut Document, page_refs: &[ObjectId]) -> Result<(), PdfToolError> {
    let catalog_id = doc
        .trailer
        .get(b"Root")
        .and_then(|root| root.as_reference())
        .map_err(|_| PdfToolError::OperationError("No Root in trailer".into()))?;

    let pages_id = doc
        .get_object(catalog_id)
        .and_then(|catalog| catalog.as_dict())
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(|pages| pages.as_reference())
        .map_err(|_| PdfToolError::OperationError("No Pages in catalog".into()))?;

    match doc.objects.get_mut(&pages_id) {
        Some(Object::Dictionary(pages_dict)) => {
            let kids = page_refs
                .iter()
                .map(|&id| Object::Reference(id))
                .collect::<Vec<_>>();
            pages_dict.set("Kids", Object::Array(kids));
            pages_dict.set("Count", Object::Integer(page_refs.len() as i64));
        }
        _ => {
            return Err(PdfToolError::OperationError(
                "Invalid pages dictionary".into(),
            ))
        }
    }

    for &page_id in page_refs {
        if let Some(Object::Dictionary(page)) = doc.objects.get_mut(&page_id) {
            page.set("Parent", Object::Reference(pages_id));
        }
    }

    Ok(())
}
