//! Logical structure tree (tagged PDF).
//!
//! Walks /StructTreeRoot and records, per page, the traversal rank and
//! structure type of every marked-content identifier. Tagged extraction
//! uses the ranks to emit spans in logical rather than drawing order.

use super::catalog::Document;
use crate::model::objects::Object;
use std::collections::{HashMap, HashSet};

/// Per-page view of the structure tree.
#[derive(Debug, Default)]
pub struct PageStructMap {
    /// MCID -> rank in depth-first traversal of the structure tree
    pub order: HashMap<u32, usize>,
    /// MCID -> structure type (/S value of the owning element, e.g. "P", "H1")
    pub kinds: HashMap<u32, String>,
}

impl PageStructMap {
    pub fn rank(&self, mcid: u32) -> Option<usize> {
        self.order.get(&mcid).copied()
    }

    pub fn kind(&self, mcid: u32) -> Option<&str> {
        self.kinds.get(&mcid).map(String::as_str)
    }
}

/// The document's structure tree, flattened to per-page MCID maps keyed by
/// page object number.
#[derive(Debug, Default)]
pub struct StructTree {
    pages: HashMap<u32, PageStructMap>,
}

impl StructTree {
    /// Load the structure tree, or None when the document is untagged.
    pub fn load(doc: &Document) -> Option<Self> {
        let root = doc.dict_get(doc.catalog(), "StructTreeRoot")?;
        let root_dict = root.as_dict().ok()?;

        let mut tree = Self::default();
        let mut walker = Walker {
            doc,
            tree: &mut tree,
            next_rank: 0,
            visited: HashSet::new(),
        };
        walker.walk_kids(root_dict, None, None);
        Some(tree)
    }

    pub fn page_map(&self, page_objid: u32) -> Option<&PageStructMap> {
        self.pages.get(&page_objid)
    }

    /// Total number of MCIDs referenced anywhere in the tree.
    pub fn mcid_count(&self) -> usize {
        self.pages.values().map(|p| p.order.len()).sum()
    }
}

struct Walker<'a> {
    doc: &'a Document,
    tree: &'a mut StructTree,
    next_rank: usize,
    visited: HashSet<u32>,
}

impl Walker<'_> {
    /// Walk an element's /K entry, which may be an MCID, a child element, an
    /// /MCR record, or an array of any of those.
    fn walk_kids(
        &mut self,
        dict: &HashMap<String, Object>,
        page_objid: Option<u32>,
        kind: Option<&str>,
    ) {
        // /Pg names the page integer MCIDs below refer to.
        let page_objid = match dict.get("Pg") {
            Some(Object::Ref(r)) => Some(r.objid),
            _ => page_objid,
        };

        let kids = match dict.get("K") {
            Some(k) => k,
            None => return,
        };
        let resolved = match self.doc.resolve(kids) {
            Ok(obj) => obj,
            Err(_) => return,
        };
        match resolved.as_ref() {
            Object::Array(items) => {
                for item in items.clone() {
                    self.walk_kid(&item, page_objid, kind);
                }
            }
            _ => {
                let obj = resolved.as_ref().clone();
                self.walk_kid(&obj, page_objid, kind);
            }
        }
    }

    fn walk_kid(&mut self, kid: &Object, page_objid: Option<u32>, kind: Option<&str>) {
        if let Object::Ref(r) = kid {
            if !self.visited.insert(r.objid) {
                log::warn!("structure tree cycle at object {}", r.objid);
                return;
            }
        }
        let resolved = match self.doc.resolve(kid) {
            Ok(obj) => obj,
            Err(_) => return,
        };

        match resolved.as_ref() {
            // A bare integer is an MCID on the inherited page.
            Object::Int(mcid) => {
                if let (Some(page), Ok(mcid)) = (page_objid, u32::try_from(*mcid)) {
                    self.record(page, mcid, kind);
                }
            }
            Object::Dict(dict) => {
                let dict_type = dict.get("Type").and_then(|t| t.as_name().ok());
                if dict_type == Some("MCR") {
                    // Marked-content reference: explicit (page, MCID) pair.
                    let page = match dict.get("Pg") {
                        Some(Object::Ref(r)) => Some(r.objid),
                        _ => page_objid,
                    };
                    let mcid = dict
                        .get("MCID")
                        .and_then(|m| m.as_int().ok())
                        .and_then(|m| u32::try_from(m).ok());
                    if let (Some(page), Some(mcid)) = (page, mcid) {
                        self.record(page, mcid, kind);
                    }
                    return;
                }
                if dict_type == Some("OBJR") {
                    // Object references (annotations etc.) carry no text.
                    return;
                }
                // A structure element: recurse with its own /S type.
                let own_kind = dict.get("S").and_then(|s| s.as_name().ok());
                self.walk_kids(dict, page_objid, own_kind.or(kind));
            }
            _ => {}
        }
    }

    fn record(&mut self, page_objid: u32, mcid: u32, kind: Option<&str>) {
        let map = self.tree.pages.entry(page_objid).or_default();
        if map.order.contains_key(&mcid) {
            return;
        }
        map.order.insert(mcid, self.next_rank);
        if let Some(kind) = kind {
            map.kinds.insert(mcid, kind.to_string());
        }
        self.next_rank += 1;
    }
}
