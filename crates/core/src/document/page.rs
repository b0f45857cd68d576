//! Page tree traversal.
//!
//! The /Pages tree is flattened depth-first into a dense, 0-indexed page
//! list. Inheritable attributes (/Resources, /MediaBox, /CropBox, /Rotate)
//! are recorded as they are shadowed by descendants. /Count is advisory;
//! the real count is the number of /Page leaves encountered.

use super::catalog::Document;
use crate::error::{PdfError, Result};
use crate::model::objects::Object;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Attributes a /Pages node passes down to its kids.
#[derive(Debug, Clone, Default)]
struct Inherited {
    resources: Option<Object>,
    mediabox: Option<Object>,
    cropbox: Option<Object>,
    rotate: Option<Object>,
}

impl Inherited {
    fn shadowed_by(&self, dict: &HashMap<String, Object>) -> Self {
        Self {
            resources: dict.get("Resources").cloned().or_else(|| self.resources.clone()),
            mediabox: dict.get("MediaBox").cloned().or_else(|| self.mediabox.clone()),
            cropbox: dict.get("CropBox").cloned().or_else(|| self.cropbox.clone()),
            rotate: dict.get("Rotate").cloned().or_else(|| self.rotate.clone()),
        }
    }
}

/// A resolved page with inherited attributes applied.
#[derive(Debug, Clone)]
pub struct Page {
    /// Object number of the page dictionary
    pub objid: u32,
    /// The page dictionary itself
    pub attrs: HashMap<String, Object>,
    /// Media box (physical page size)
    pub mediabox: [f64; 4],
    /// Crop box, defaulting to the media box
    pub cropbox: [f64; 4],
    /// Page rotation in degrees, normalized to 0/90/180/270
    pub rotate: i64,
    /// Resource dictionary (fonts live under /Font)
    pub resources: HashMap<String, Object>,
}

impl Page {
    /// Page width in default user space units.
    pub fn width(&self) -> f64 {
        self.mediabox[2] - self.mediabox[0]
    }

    /// Page height in default user space units.
    pub fn height(&self) -> f64 {
        self.mediabox[3] - self.mediabox[1]
    }

    /// Concatenation-order list of decoded content streams.
    ///
    /// /Contents is a single stream or an array of streams; damaged members
    /// are skipped. The result is not cached.
    pub fn content_streams(&self, doc: &Document) -> Vec<Vec<u8>> {
        let contents_obj = match self.attrs.get("Contents") {
            Some(obj) => obj,
            None => return Vec::new(),
        };
        let resolved = match doc.resolve(contents_obj) {
            Ok(obj) => obj,
            Err(_) => return Vec::new(),
        };

        match resolved.as_ref() {
            Object::Stream(stream) => match doc.decode_stream(stream) {
                Ok(data) => vec![data],
                Err(e) => {
                    log::warn!("content stream undecodable: {}", e);
                    Vec::new()
                }
            },
            Object::Array(arr) => arr
                .iter()
                .filter_map(|item| {
                    doc.resolve(item).ok().and_then(|obj| {
                        obj.as_ref()
                            .as_stream()
                            .ok()
                            .and_then(|s| doc.decode_stream(s).ok())
                    })
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn from_leaf(
        doc: &Document,
        objid: u32,
        dict: &HashMap<String, Object>,
        inherited: &Inherited,
    ) -> Result<Self> {
        let mediabox = resolve_box(doc, dict.get("MediaBox").or(inherited.mediabox.as_ref()))
            .unwrap_or([0.0, 0.0, 612.0, 792.0]);
        let cropbox = resolve_box(doc, dict.get("CropBox").or(inherited.cropbox.as_ref()))
            .unwrap_or(mediabox);
        let rotate = dict
            .get("Rotate")
            .or(inherited.rotate.as_ref())
            .and_then(|r| doc.resolve(r).ok())
            .and_then(|r| r.as_int().ok())
            .map(|r| ((r % 360) + 360) % 360)
            .unwrap_or(0);
        let resources = dict
            .get("Resources")
            .or(inherited.resources.as_ref())
            .and_then(|r| doc.resolve(r).ok())
            .and_then(|r| r.as_dict().ok().cloned())
            .unwrap_or_default();

        Ok(Self {
            objid,
            attrs: dict.clone(),
            mediabox,
            cropbox,
            rotate,
            resources,
        })
    }
}

fn resolve_box(doc: &Document, obj: Option<&Object>) -> Option<[f64; 4]> {
    let resolved = doc.resolve(obj?).ok()?;
    let arr = resolved.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let mut out = [0.0; 4];
    for (slot, item) in out.iter_mut().zip(arr) {
        *slot = doc.resolve(item).ok()?.as_num().ok()?;
    }
    // Normalize so that (x0, y0) is the lower-left corner.
    if out[0] > out[2] {
        out.swap(0, 2);
    }
    if out[1] > out[3] {
        out.swap(1, 3);
    }
    Some(out)
}

/// Flatten the page tree into an ordered page list.
pub fn collect_pages(doc: &Document) -> Result<Vec<Page>> {
    let root_obj = match doc.dict_get(doc.catalog(), "Pages") {
        Some(obj) => obj,
        None => {
            if doc.mode().is_strict() {
                return Err(PdfError::SyntaxError("catalog has no /Pages".into()));
            }
            log::warn!("catalog has no /Pages, document treated as empty");
            return Ok(Vec::new());
        }
    };
    let root_objid = match doc.catalog().get("Pages") {
        Some(Object::Ref(r)) => Some(r.objid),
        _ => None,
    };

    let mut pages = Vec::new();
    let mut visited = HashSet::new();
    if let Some(objid) = root_objid {
        visited.insert(objid);
    }
    walk_node(doc, root_obj, root_objid, &Inherited::default(), &mut pages, &mut visited)?;
    Ok(pages)
}

fn walk_node(
    doc: &Document,
    node: Arc<Object>,
    objid: Option<u32>,
    inherited: &Inherited,
    pages: &mut Vec<Page>,
    visited: &mut HashSet<u32>,
) -> Result<()> {
    let dict = match node.as_dict() {
        Ok(d) => d,
        Err(_) => return Ok(()),
    };

    let node_type = dict.get("Type").and_then(|t| t.as_name().ok());
    let has_kids = dict.contains_key("Kids");

    if node_type == Some("Page") || (node_type.is_none() && !has_kids) {
        let page = Page::from_leaf(doc, objid.unwrap_or(0), dict, inherited)?;
        pages.push(page);
        return Ok(());
    }

    if !has_kids {
        return Ok(());
    }

    let shadowed = inherited.shadowed_by(dict);
    let kids = match doc.dict_get(dict, "Kids") {
        Some(obj) => obj,
        None => return Ok(()),
    };
    let kids = match kids.as_array() {
        Ok(arr) => arr.clone(),
        Err(_) => return Ok(()),
    };

    for kid in kids {
        let kid_objid = match &kid {
            Object::Ref(r) => {
                // A node reachable twice would loop the traversal.
                if !visited.insert(r.objid) {
                    log::warn!("page tree cycle at object {}", r.objid);
                    continue;
                }
                Some(r.objid)
            }
            _ => None,
        };
        let kid_obj = match doc.resolve(&kid) {
            Ok(obj) => obj,
            Err(e) => {
                if doc.mode().is_strict() {
                    return Err(e);
                }
                continue;
            }
        };
        walk_node(doc, kid_obj, kid_objid, &shadowed, pages, visited)?;
    }

    Ok(())
}
