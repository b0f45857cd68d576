//! PDF document: xref parsing and object resolution.
//!
//! Handles:
//! - startxref discovery and the /Prev chain (with cycle detection)
//! - classic xref tables and xref streams
//! - object streams (compressed xref entries)
//! - scan-repair when the xref is broken (permissive mode)
//! - lazy, cached object resolution

use crate::codec::{apply_filters, filter_chain};
use crate::error::{PdfError, Result};
use crate::model::objects::{ObjRef, Object, Stream};
use crate::parser::lexer::{is_whitespace, Keyword, Token};
use crate::parser::object::ObjectParser;
use bytes::Bytes;
use indexmap::IndexMap;
use memmap2::Mmap;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// How forgiving parsing should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// Fail on syntactic violations.
    Strict,
    /// Log, resynchronize, and continue where possible.
    #[default]
    Permissive,
}

impl ParseMode {
    pub const fn is_strict(self) -> bool {
        matches!(self, ParseMode::Strict)
    }
}

/// Options for opening a document.
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    pub mode: ParseMode,
}

/// An xref entry: where an object lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Not resolvable.
    Free,
    /// At an absolute byte offset in the file.
    InUse { offset: usize, genno: u32 },
    /// Inside an object stream, at the given slot index.
    Compressed { stream_objid: u32, index: usize },
}

/// One xref section: entries plus its trailer dictionary.
#[derive(Debug, Default)]
struct XRefSection {
    entries: HashMap<u32, XRefEntry>,
    trailer: HashMap<String, Object>,
}

/// Bounded object cache with least-recently-used eviction.
struct ObjectCache {
    capacity: usize,
    map: IndexMap<u32, Arc<Object>>,
}

impl ObjectCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            map: IndexMap::new(),
        }
    }

    fn get(&mut self, objid: u32) -> Option<Arc<Object>> {
        if self.capacity == 0 {
            return None;
        }
        let pos = self.map.get_index_of(&objid)?;
        let value = Arc::clone(self.map.get_index(pos)?.1);
        if pos + 1 != self.map.len() {
            self.map.move_index(pos, self.map.len() - 1);
        }
        Some(value)
    }

    fn insert(&mut self, objid: u32, value: Arc<Object>) {
        if self.capacity == 0 {
            return;
        }
        if self.map.contains_key(&objid) {
            self.map.shift_remove(&objid);
        }
        self.map.insert(objid, value);
        if self.map.len() > self.capacity {
            self.map.shift_remove_index(0);
        }
    }
}

/// PDF document: provides access to objects, the catalog, and metadata.
///
/// Owns its data as shared bytes, so a loaded document is shareable
/// read-only across worker threads.
pub struct Document {
    data: Bytes,
    mode: ParseMode,
    /// Newest section first; lookups probe in order so later updates win.
    xrefs: Vec<XRefSection>,
    catalog: HashMap<String, Object>,
    info: Vec<HashMap<String, Object>>,
    version: Option<String>,
    cache: Mutex<ObjectCache>,
}

impl Document {
    /// Map a file and parse its document structure.
    pub fn open<P: AsRef<Path>>(path: P, options: OpenOptions) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        Self::from_shared(Bytes::from_owner(mmap), options)
    }

    /// Parse a document held in memory.
    pub fn from_bytes<D: AsRef<[u8]>>(data: D, options: OpenOptions) -> Result<Self> {
        Self::from_shared(Bytes::copy_from_slice(data.as_ref()), options)
    }

    fn from_shared(data: Bytes, options: OpenOptions) -> Result<Self> {
        let mut doc = Self {
            data,
            mode: options.mode,
            xrefs: Vec::new(),
            catalog: HashMap::new(),
            info: Vec::new(),
            version: None,
            cache: Mutex::new(ObjectCache::new(DEFAULT_CACHE_CAPACITY)),
        };
        doc.parse()?;
        Ok(doc)
    }

    /// The raw PDF bytes.
    pub fn bytes(&self) -> &[u8] {
        self.data.as_ref()
    }

    /// The parse mode the document was opened with.
    pub const fn mode(&self) -> ParseMode {
        self.mode
    }

    /// The catalog (document root) dictionary.
    pub fn catalog(&self) -> &HashMap<String, Object> {
        &self.catalog
    }

    /// Info dictionaries across revisions, newest first.
    pub fn info_dicts(&self) -> &[HashMap<String, Object>] {
        &self.info
    }

    /// The PDF version from the header, overridden by /Version if present.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    fn parse(&mut self) -> Result<()> {
        self.version = self.parse_header_version();

        let mut loaded = false;
        match self.find_startxref() {
            Ok(pos) => match self.load_xrefs(pos) {
                Ok(sections) if !sections.is_empty() => {
                    self.xrefs = sections;
                    loaded = true;
                }
                Ok(_) => {}
                Err(e) if self.mode.is_strict() => return Err(e),
                Err(e) => log::warn!("xref load failed ({}), trying scan repair", e),
            },
            Err(e) if self.mode.is_strict() => return Err(e),
            Err(e) => log::warn!("startxref not found ({}), trying scan repair", e),
        }

        if !loaded {
            let xref = self.load_xref_fallback()?;
            self.xrefs.push(xref);
        }

        // Encryption is out of scope and always rejected.
        for xref in &self.xrefs {
            if xref.trailer.contains_key("Encrypt") {
                return Err(PdfError::Encrypted);
            }
        }

        for i in 0..self.xrefs.len() {
            if self.catalog.is_empty() {
                if let Some(root_ref) = self.xrefs[i].trailer.get("Root").cloned() {
                    if let Ok(root_obj) = self.resolve(&root_ref) {
                        if let Ok(dict) = root_obj.as_dict() {
                            self.catalog = dict.clone();
                        }
                    }
                }
            }
            if let Some(info_ref) = self.xrefs[i].trailer.get("Info").cloned() {
                if let Ok(info_obj) = self.resolve(&info_ref) {
                    if let Ok(dict) = info_obj.as_dict() {
                        self.info.push(dict.clone());
                    }
                }
            }
        }

        if let Some(Object::Name(v)) = self.catalog.get("Version") {
            self.version = Some(v.clone());
        }

        if self.catalog.is_empty() {
            if self.mode.is_strict() {
                return Err(PdfError::SyntaxError("no /Root in trailer".into()));
            }
            log::warn!("document has no resolvable catalog");
        }

        Ok(())
    }

    /// Version from the `%PDF-x.y` header within the first kilobyte.
    fn parse_header_version(&self) -> Option<String> {
        let head = &self.data[..self.data.len().min(1024)];
        let pos = head.windows(5).position(|w| w == b"%PDF-")?;
        let rest = &head[pos + 5..];
        let end = rest
            .iter()
            .position(|&b| !(b.is_ascii_digit() || b == b'.'))
            .unwrap_or(rest.len());
        if end == 0 {
            return None;
        }
        std::str::from_utf8(&rest[..end]).ok().map(str::to_string)
    }

    /// Locate the most recent startxref offset near the end of the file.
    fn find_startxref(&self) -> Result<usize> {
        let needle = b"startxref";
        let data = self.data.as_ref();
        if data.len() < needle.len() {
            return Err(PdfError::SyntaxError("PDF too small".into()));
        }

        let search_start = data.len().saturating_sub(1024);
        let hay = &data[search_start..];
        let mut found = None;
        if hay.len() >= needle.len() {
            for pos in 0..=hay.len() - needle.len() {
                if &hay[pos..pos + needle.len()] == needle {
                    found = Some(search_start + pos);
                }
            }
        }
        let i = found.ok_or(PdfError::NoValidXRef)?;

        let rest = &data[i + needle.len()..];
        let mut pos = 0;
        while pos < rest.len() && is_whitespace(rest[pos]) {
            pos += 1;
        }
        let mut end = pos;
        while end < rest.len() && rest[end].is_ascii_digit() {
            end += 1;
        }
        if end == pos {
            return Err(PdfError::NoValidXRef);
        }
        let num_str = std::str::from_utf8(&rest[pos..end]).map_err(|_| PdfError::NoValidXRef)?;
        let offset: usize = num_str.parse().map_err(|_| PdfError::NoValidXRef)?;
        if offset >= data.len() {
            return Err(PdfError::NoValidXRef);
        }
        Ok(offset)
    }

    /// Walk the /Prev chain from the latest section. Cycles are corruption.
    fn load_xrefs(&self, start: usize) -> Result<Vec<XRefSection>> {
        let mut sections = Vec::new();
        let mut visited = HashSet::new();
        let mut pos = start;

        loop {
            if !visited.insert(pos) {
                return Err(PdfError::XRefCycle(pos));
            }

            let xref = self.load_xref_at(pos)?;

            // Hybrid-reference files carry a parallel xref stream.
            let xref_stm = xref
                .trailer
                .get("XRefStm")
                .and_then(|p| p.as_int().ok())
                .map(|n| n as usize);
            let prev = xref
                .trailer
                .get("Prev")
                .and_then(|p| p.as_int().ok())
                .map(|n| n as usize);

            sections.push(xref);

            if let Some(stm_pos) = xref_stm {
                if visited.insert(stm_pos) {
                    match self.load_xref_stream(stm_pos) {
                        Ok(stm) => sections.push(stm),
                        Err(e) => log::warn!("XRefStm at {} failed: {}", stm_pos, e),
                    }
                }
            }

            match prev {
                Some(prev_pos) => pos = prev_pos,
                None => break,
            }
        }

        Ok(sections)
    }

    /// Peek at the section start: `xref` means a classic table, anything
    /// else is tried as an xref stream.
    fn load_xref_at(&self, pos: usize) -> Result<XRefSection> {
        if pos >= self.data.len() {
            return Err(PdfError::NoValidXRef);
        }
        let data = &self.data[pos..];
        if data.starts_with(b"xref") {
            self.load_xref_table(pos)
        } else {
            self.load_xref_stream(pos)
        }
    }

    /// Classic xref table: subsections of `start count` followed by
    /// 20-byte entries, then a trailer dictionary.
    fn load_xref_table(&self, pos: usize) -> Result<XRefSection> {
        let mut xref = XRefSection::default();
        let data = &self.data[pos..];
        let mut cursor = 4; // past "xref"

        loop {
            while cursor < data.len() && is_whitespace(data[cursor]) {
                cursor += 1;
            }
            if cursor >= data.len() {
                break;
            }
            if data[cursor..].starts_with(b"trailer") {
                cursor += 7;
                break;
            }

            let (start_objid, used) = read_decimal(&data[cursor..])?;
            cursor += used;
            while cursor < data.len() && data[cursor] == b' ' {
                cursor += 1;
            }
            let (count, used) = read_decimal(&data[cursor..])?;
            cursor += used;
            skip_line(data, &mut cursor);

            let mut base_objid = start_objid;
            for i in 0..count {
                let (offset, used) = read_decimal(&data[cursor..])?;
                cursor += used;
                while cursor < data.len() && data[cursor] == b' ' {
                    cursor += 1;
                }
                let (genno, used) = read_decimal(&data[cursor..])?;
                cursor += used;
                while cursor < data.len() && data[cursor] == b' ' {
                    cursor += 1;
                }
                let marker = if cursor < data.len() { data[cursor] } else { b'f' };
                cursor += 1;
                skip_line(data, &mut cursor);

                // Some writers start the first subsection at 1 but still
                // emit the object 0 free entry; realign in that case.
                if i == 0 && base_objid > 0 && marker == b'f' && offset == 0 && genno == 65535 {
                    base_objid -= 1;
                }
                let objid = (base_objid + i) as u32;

                let entry = match marker {
                    b'n' => XRefEntry::InUse {
                        offset: offset as usize,
                        genno: genno as u32,
                    },
                    b'f' => XRefEntry::Free,
                    other => {
                        if self.mode.is_strict() {
                            return Err(PdfError::SyntaxError(format!(
                                "bad xref entry marker: {:?}",
                                other as char
                            )));
                        }
                        continue;
                    }
                };
                xref.entries.entry(objid).or_insert(entry);
            }
        }

        // Trailer dictionary follows the `trailer` keyword.
        let trailer_data = &data[cursor.min(data.len())..];
        let mut skip = 0;
        while skip < trailer_data.len() && is_whitespace(trailer_data[skip]) {
            skip += 1;
        }
        if trailer_data[skip..].starts_with(b"<<") {
            let mut parser = ObjectParser::new(&trailer_data[skip..]);
            match parser.parse_object() {
                Ok(trailer_obj) => {
                    if let Ok(dict) = trailer_obj.as_dict() {
                        xref.trailer = dict.clone();
                    }
                }
                Err(e) if self.mode.is_strict() => return Err(e),
                Err(e) => log::warn!("unparseable trailer: {}", e),
            }
        } else if self.mode.is_strict() {
            return Err(PdfError::SyntaxError("missing trailer dictionary".into()));
        }

        Ok(xref)
    }

    /// Xref stream (PDF 1.5+): packed fixed-width records described by /W.
    fn load_xref_stream(&self, pos: usize) -> Result<XRefSection> {
        let obj = self.parse_indirect_at(pos, None)?;
        let stream = obj.as_stream()?;
        if stream.get("Type").and_then(|t| t.as_name().ok()) != Some("XRef") {
            // Tolerated: some writers omit /Type, and the shape check below
            // is what actually matters.
            log::debug!("xref stream at {} missing /Type /XRef", pos);
        }

        let w = stream
            .get("W")
            .ok_or_else(|| PdfError::SyntaxError("missing W in xref stream".into()))?
            .as_array()?;
        if w.len() != 3 {
            return Err(PdfError::SyntaxError("W must have 3 elements".into()));
        }
        let w0 = w[0].as_int()? as usize;
        let w1 = w[1].as_int()? as usize;
        let w2 = w[2].as_int()? as usize;
        let entry_size = w0 + w1 + w2;
        if entry_size == 0 {
            return Err(PdfError::SyntaxError("zero-width xref entries".into()));
        }

        let size = stream
            .get("Size")
            .ok_or_else(|| PdfError::SyntaxError("missing Size in xref stream".into()))?
            .as_int()? as usize;

        let index: Vec<(u32, usize)> = match stream.get("Index") {
            Some(idx) => {
                let arr = idx.as_array()?;
                let mut pairs = Vec::new();
                let mut i = 0;
                while i + 1 < arr.len() {
                    pairs.push((arr[i].as_int()? as u32, arr[i + 1].as_int()? as usize));
                    i += 2;
                }
                pairs
            }
            None => vec![(0, size)],
        };

        let data = self.decode_stream(stream)?;

        let mut xref = XRefSection::default();
        let mut data_pos = 0;
        for (start_objid, count) in index {
            for i in 0..count {
                if data_pos + entry_size > data.len() {
                    break;
                }
                let objid = start_objid + i as u32;
                // Entry kind defaults to 1 (in-use) when the first width is 0.
                let kind = if w0 > 0 {
                    be_int(&data[data_pos..data_pos + w0])
                } else {
                    1
                };
                let field1 = be_int(&data[data_pos + w0..data_pos + w0 + w1]);
                let field2 = be_int(&data[data_pos + w0 + w1..data_pos + entry_size]);
                data_pos += entry_size;

                let entry = match kind {
                    0 => XRefEntry::Free,
                    1 => XRefEntry::InUse {
                        offset: field1 as usize,
                        genno: field2 as u32,
                    },
                    2 => XRefEntry::Compressed {
                        stream_objid: field1 as u32,
                        index: field2 as usize,
                    },
                    _ => continue,
                };
                xref.entries.entry(objid).or_insert(entry);
            }
        }

        // The stream dict doubles as the trailer.
        for (key, value) in &stream.attrs {
            if !matches!(key.as_str(), "Length" | "Filter" | "DecodeParms" | "W" | "Index") {
                xref.trailer.insert(key.clone(), value.clone());
            }
        }

        Ok(xref)
    }

    /// Scan-repair: sweep the file for `N G obj` headers. The last
    /// occurrence of each object number wins, like an incremental update.
    fn load_xref_fallback(&self) -> Result<XRefSection> {
        use regex::bytes::Regex;

        let mut xref = XRefSection::default();
        let re = Regex::new(r"(\d+)\s+(\d+)\s+obj\b").unwrap();

        for cap in re.captures_iter(self.data.as_ref()) {
            let objid = match std::str::from_utf8(&cap[1]).ok().and_then(|s| s.parse::<u64>().ok())
            {
                Some(v) if v <= u32::MAX as u64 => v as u32,
                _ => continue,
            };
            let genno = match std::str::from_utf8(&cap[2]).ok().and_then(|s| s.parse::<u64>().ok())
            {
                Some(v) if v <= u32::MAX as u64 => v as u32,
                _ => continue,
            };
            let pos = cap.get(0).unwrap().start();
            xref.entries.insert(objid, XRefEntry::InUse { offset: pos, genno });
        }

        if let Some(trailer_pos) = self.find_last(b"trailer") {
            let data = &self.data[trailer_pos + 7..];
            let mut skip = 0;
            while skip < data.len() && is_whitespace(data[skip]) {
                skip += 1;
            }
            if data[skip..].starts_with(b"<<") {
                let mut parser = ObjectParser::new(&data[skip..]);
                if let Ok(trailer_obj) = parser.parse_object() {
                    if let Ok(dict) = trailer_obj.as_dict() {
                        xref.trailer = dict.clone();
                    }
                }
            }
        }

        // No trailer at all: hunt for a /Type /Catalog object instead.
        if !xref.trailer.contains_key("Root") {
            let mut root = None;
            for (&objid, entry) in &xref.entries {
                if let XRefEntry::InUse { offset, .. } = entry {
                    if let Ok(obj) = self.parse_indirect_at(*offset, Some(objid)) {
                        if let Ok(dict) = obj.as_dict() {
                            if dict.get("Type").and_then(|t| t.as_name().ok()) == Some("Catalog") {
                                root = Some(objid);
                                break;
                            }
                        }
                    }
                }
            }
            if let Some(objid) = root {
                xref.trailer
                    .insert("Root".to_string(), Object::Ref(ObjRef::new(objid, 0)));
            }
        }

        if xref.entries.is_empty() {
            return Err(PdfError::NoValidXRef);
        }
        log::debug!("scan repair found {} objects", xref.entries.len());
        Ok(xref)
    }

    fn find_last(&self, needle: &[u8]) -> Option<usize> {
        let data = self.data.as_ref();
        (0..data.len().saturating_sub(needle.len()))
            .rev()
            .find(|&i| &data[i..i + needle.len()] == needle)
    }

    /// Look up where an object lives. Probes sections newest-first, so
    /// entries from later incremental updates shadow older ones.
    pub fn lookup(&self, objid: u32) -> Option<XRefEntry> {
        for xref in &self.xrefs {
            if let Some(entry) = xref.entries.get(&objid) {
                return Some(*entry);
            }
        }
        None
    }

    /// Resolve a reference with a generation check.
    ///
    /// A generation mismatch yields Null in permissive mode and an error in
    /// strict mode.
    pub fn resolve_ref(&self, objref: &ObjRef) -> Result<Arc<Object>> {
        match self.lookup(objref.objid) {
            Some(XRefEntry::InUse { genno, .. }) if genno != objref.genno => {
                if self.mode.is_strict() {
                    Err(PdfError::GenerationMismatch {
                        objid: objref.objid,
                        wanted: objref.genno,
                        found: genno,
                    })
                } else {
                    Ok(Arc::new(Object::Null))
                }
            }
            Some(_) => self.getobj(objref.objid),
            None => {
                if self.mode.is_strict() {
                    Err(PdfError::ObjectNotFound(objref.objid))
                } else {
                    Ok(Arc::new(Object::Null))
                }
            }
        }
    }

    /// Resolve an object if it is a reference; pass anything else through.
    ///
    /// Chained references are followed; a reference that ultimately cannot
    /// be resolved yields Null in permissive mode.
    pub fn resolve(&self, obj: &Object) -> Result<Arc<Object>> {
        let mut seen = HashSet::new();
        let mut current = match obj {
            Object::Ref(objref) => {
                seen.insert(objref.objid);
                self.resolve_ref(objref)?
            }
            other => return Ok(Arc::new(other.clone())),
        };
        loop {
            let next = match current.as_ref() {
                Object::Ref(objref) => {
                    if !seen.insert(objref.objid) {
                        // Reference cycle: terminates as null rather than spinning.
                        return Ok(Arc::new(Object::Null));
                    }
                    self.resolve_ref(objref)?
                }
                _ => return Ok(current),
            };
            current = next;
        }
    }

    /// Get an object by number, consulting the cache.
    pub fn getobj(&self, objid: u32) -> Result<Arc<Object>> {
        if objid == 0 {
            return Err(PdfError::ObjectNotFound(0));
        }

        // Thread-local cycle detection: objects whose resolution is already
        // on this thread's stack must not recurse.
        thread_local! {
            static RESOLVING: RefCell<HashSet<u32>> = RefCell::new(HashSet::new());
        }
        struct Guard {
            objid: u32,
        }
        impl Drop for Guard {
            fn drop(&mut self) {
                RESOLVING.with(|set| {
                    set.borrow_mut().remove(&self.objid);
                });
            }
        }

        let is_circular = RESOLVING.with(|set| {
            let mut borrowed = set.borrow_mut();
            if borrowed.contains(&objid) {
                true
            } else {
                borrowed.insert(objid);
                false
            }
        });
        if is_circular {
            return Err(PdfError::SyntaxError(format!(
                "circular reference detected for obj {}",
                objid
            )));
        }
        let _guard = Guard { objid };

        if let Ok(mut cache) = self.cache.lock() {
            if let Some(obj) = cache.get(objid) {
                return Ok(obj);
            }
        }

        let entry = self.lookup(objid).ok_or(PdfError::ObjectNotFound(objid))?;
        let obj = match entry {
            XRefEntry::Free => {
                if self.mode.is_strict() {
                    return Err(PdfError::ObjectNotFound(objid));
                }
                Object::Null
            }
            XRefEntry::InUse { offset, .. } => {
                match self.parse_indirect_at(offset, Some(objid)) {
                    Ok(obj) => obj,
                    Err(e) if self.mode.is_strict() => return Err(e),
                    Err(e) => {
                        log::warn!("object {} unreadable ({}), treating as null", objid, e);
                        Object::Null
                    }
                }
            }
            XRefEntry::Compressed {
                stream_objid,
                index,
            } => match self.parse_object_from_stream(stream_objid, index) {
                Ok(obj) => obj,
                Err(e) if self.mode.is_strict() => return Err(e),
                Err(e) => {
                    log::warn!("object {} unreadable ({}), treating as null", objid, e);
                    Object::Null
                }
            },
        };

        let obj = Arc::new(obj);
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(objid, Arc::clone(&obj));
        }
        Ok(obj)
    }

    /// Parse the indirect object at a byte offset: `N G obj ... endobj`.
    ///
    /// When `expect_objid` is set, the header must name that object; an
    /// in-use xref entry pointing anywhere else is corrupt.
    fn parse_indirect_at(&self, offset: usize, expect_objid: Option<u32>) -> Result<Object> {
        if offset >= self.data.len() {
            return Err(PdfError::SyntaxError(format!(
                "object offset {} beyond end of file",
                offset
            )));
        }
        let data = &self.data[offset..];
        let mut parser = ObjectParser::new(data);

        let objid = match parser.parse_object()? {
            Object::Int(n) if n >= 0 => n as u32,
            other => {
                return Err(PdfError::SyntaxError(format!(
                    "expected object number, got {}",
                    other.type_name()
                )));
            }
        };
        let genno = match parser.parse_object()? {
            Object::Int(n) if n >= 0 => n as u32,
            other => {
                return Err(PdfError::SyntaxError(format!(
                    "expected generation number, got {}",
                    other.type_name()
                )));
            }
        };
        parser.expect_keyword(&Keyword::Obj)?;

        if let Some(expected) = expect_objid {
            if objid != expected {
                return Err(PdfError::SyntaxError(format!(
                    "xref points object {} at header for object {}",
                    expected, objid
                )));
            }
        }

        let obj = parser.parse_object()?;

        // A dictionary followed by `stream` is a stream object.
        if let Object::Dict(attrs) = obj {
            if matches!(parser.peek_token()?, Some(Token::Keyword(Keyword::Stream))) {
                parser.expect_keyword(&Keyword::Stream)?;
                let mut stream = self.parse_stream_body(offset, parser.tell(), attrs)?;
                stream.set_objid(objid, genno);
                return Ok(Object::Stream(Box::new(stream)));
            }
            return Ok(Object::Dict(attrs));
        }

        Ok(obj)
    }

    /// Assemble a stream body. `after_keyword` is the offset (relative to
    /// `base`) just past the `stream` keyword.
    fn parse_stream_body(
        &self,
        base: usize,
        after_keyword: usize,
        attrs: HashMap<String, Object>,
    ) -> Result<Stream> {
        let abs = base + after_keyword;
        let data = self.data.as_ref();

        // Exactly one EOL after `stream`: CR, LF, or CRLF.
        let mut start = abs;
        if start < data.len() && data[start] == b'\r' {
            start += 1;
        }
        if start < data.len() && data[start] == b'\n' {
            start += 1;
        }

        let declared_len = match attrs.get("Length") {
            Some(obj) => {
                let resolved = self.resolve(obj)?;
                resolved.as_int().ok().filter(|&n| n >= 0).map(|n| n as usize)
            }
            None => None,
        };

        let end = match declared_len {
            Some(len) if start + len <= data.len() => {
                let end = start + len;
                if self.endstream_follows(end) {
                    Some(end)
                } else if self.mode.is_strict() {
                    return Err(PdfError::SyntaxError(
                        "endstream does not follow /Length bytes".into(),
                    ));
                } else {
                    None
                }
            }
            Some(_) if self.mode.is_strict() => {
                return Err(PdfError::SyntaxError("/Length beyond end of file".into()));
            }
            Some(_) => None,
            None if self.mode.is_strict() => {
                return Err(PdfError::SyntaxError("stream without valid /Length".into()));
            }
            None => None,
        };

        // Permissive fallback: scan for the endstream keyword.
        let end = match end {
            Some(end) => end,
            None => {
                let tail = &data[start..];
                let pos = find_subsequence(tail, b"endstream").ok_or_else(|| {
                    PdfError::SyntaxError("unterminated stream: no endstream".into())
                })?;
                log::debug!("recovered stream length by scanning for endstream");
                // Trim the EOL that precedes endstream.
                let mut end = start + pos;
                if end > start && data[end - 1] == b'\n' {
                    end -= 1;
                }
                if end > start && data[end - 1] == b'\r' {
                    end -= 1;
                }
                end
            }
        };

        Ok(Stream::new(attrs, self.data.slice(start..end)))
    }

    /// The trailing `endstream` must follow within one line terminator.
    fn endstream_follows(&self, mut pos: usize) -> bool {
        let data = self.data.as_ref();
        if pos < data.len() && data[pos] == b'\r' {
            pos += 1;
        }
        if pos < data.len() && data[pos] == b'\n' {
            pos += 1;
        }
        data[pos.min(data.len())..].starts_with(b"endstream")
    }

    /// Fetch an embedded object from an object stream by slot index.
    fn parse_object_from_stream(&self, stream_objid: u32, index: usize) -> Result<Object> {
        let container = self.getobj(stream_objid)?;
        let stream = container.as_stream()?;

        let n = stream
            .get("N")
            .and_then(|v| v.as_int().ok())
            .ok_or_else(|| PdfError::SyntaxError("object stream missing /N".into()))?
            as usize;
        let first = stream
            .get("First")
            .and_then(|v| v.as_int().ok())
            .ok_or_else(|| PdfError::SyntaxError("object stream missing /First".into()))?
            as usize;

        let data = self.decode_stream(stream)?;

        // Header: N pairs of `objid offset` relative to /First.
        let mut parser = ObjectParser::new(&data);
        let mut pairs = Vec::with_capacity(n);
        for _ in 0..n {
            let objid = parser.parse_object()?.as_int()? as u32;
            let offset = parser.parse_object()?.as_int()? as usize;
            pairs.push((objid, offset));
        }

        let (_, offset) = *pairs
            .get(index)
            .ok_or_else(|| PdfError::SyntaxError("object stream slot out of range".into()))?;
        let body_start = first + offset;
        if body_start > data.len() {
            return Err(PdfError::SyntaxError("object stream offset out of range".into()));
        }

        let mut obj_parser = ObjectParser::new(&data[body_start..]);
        obj_parser.parse_object()
    }

    /// Decode a stream through its declared filter chain.
    pub fn decode_stream(&self, stream: &Stream) -> Result<Vec<u8>> {
        let filter = match stream.get_any(&["Filter", "F"]) {
            Some(f) => Some(self.resolve_deep(f)?),
            None => None,
        };
        let parms = match stream.get_any(&["DecodeParms", "DP"]) {
            Some(p) => Some(self.resolve_deep(p)?),
            None => None,
        };
        let chain = filter_chain(filter.as_ref(), parms.as_ref())?;
        apply_filters(stream.rawdata(), &chain, self.mode.is_strict())
    }

    /// Resolve a reference and, for arrays, each element one level deep.
    fn resolve_deep(&self, obj: &Object) -> Result<Object> {
        let resolved = self.resolve(obj)?;
        match resolved.as_ref() {
            Object::Array(arr) => {
                let mut out = Vec::with_capacity(arr.len());
                for item in arr {
                    out.push(self.resolve(item)?.as_ref().clone());
                }
                Ok(Object::Array(out))
            }
            other => Ok(other.clone()),
        }
    }

    /// Dictionary lookup that resolves indirect values.
    pub fn dict_get(&self, dict: &HashMap<String, Object>, key: &str) -> Option<Arc<Object>> {
        let value = dict.get(key)?;
        match self.resolve(value) {
            Ok(obj) if !obj.is_null() => Some(obj),
            _ => None,
        }
    }

    /// Decode a PDF text string: UTF-16BE with BOM, else PDFDocEncoding
    /// treated as Latin-1.
    pub fn decode_text_string(bytes: &[u8]) -> String {
        if bytes.starts_with(&[0xfe, 0xff]) {
            let units: Vec<u16> = bytes[2..]
                .chunks(2)
                .filter(|c| c.len() == 2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        } else {
            bytes.iter().map(|&b| b as char).collect()
        }
    }
}

/// Read an unsigned decimal, returning (value, bytes consumed).
fn read_decimal(data: &[u8]) -> Result<(i64, usize)> {
    let mut pos = 0;
    while pos < data.len() && data[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos == 0 {
        return Err(PdfError::SyntaxError("expected number".into()));
    }
    let s = std::str::from_utf8(&data[..pos])
        .map_err(|_| PdfError::SyntaxError("invalid number".into()))?;
    let value = s
        .parse()
        .map_err(|_| PdfError::SyntaxError("invalid number".into()))?;
    Ok((value, pos))
}

/// Advance past the rest of the current line and its terminator.
fn skip_line(data: &[u8], cursor: &mut usize) {
    while *cursor < data.len() && data[*cursor] != b'\n' && data[*cursor] != b'\r' {
        *cursor += 1;
    }
    while *cursor < data.len() && (data[*cursor] == b'\n' || data[*cursor] == b'\r') {
        *cursor += 1;
    }
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Big-endian integer from a short byte field.
fn be_int(bytes: &[u8]) -> u64 {
    let mut val: u64 = 0;
    for &b in bytes {
        val = (val << 8) | (b as u64);
    }
    val
}
