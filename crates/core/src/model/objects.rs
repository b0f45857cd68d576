//! PDF object types.
//!
//! A PDF object is a tagged sum. Dictionary access never asserts a type:
//! every accessor returns a kind-checked `Result`.

use crate::error::{PdfError, Result};
use bytes::Bytes;
use std::collections::HashMap;

/// PDF object - the fundamental value type in a PDF file.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Null object
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Real (floating point) value
    Real(f64),
    /// Name object (e.g., /Type, /Font). Stored decoded, without the slash.
    Name(String),
    /// String (byte array; literal and hex strings both land here)
    String(Vec<u8>),
    /// Array of objects
    Array(Vec<Self>),
    /// Dictionary (name -> object mapping)
    Dict(HashMap<String, Self>),
    /// Stream (dictionary + raw byte range)
    Stream(Box<Stream>),
    /// Indirect object reference
    Ref(ObjRef),
}

impl Object {
    /// Check if this is a null object.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub const fn as_bool(&self) -> Result<bool> {
        match self {
            Self::Bool(b) => Ok(*b),
            _ => Err(self.type_error("bool")),
        }
    }

    pub const fn as_int(&self) -> Result<i64> {
        match self {
            Self::Int(n) => Ok(*n),
            _ => Err(self.type_error("int")),
        }
    }

    /// Get numeric value (int or real coerced to f64).
    pub const fn as_num(&self) -> Result<f64> {
        match self {
            Self::Int(n) => Ok(*n as f64),
            Self::Real(n) => Ok(*n),
            _ => Err(self.type_error("number")),
        }
    }

    pub fn as_name(&self) -> Result<&str> {
        match self {
            Self::Name(s) => Ok(s),
            _ => Err(self.type_error("name")),
        }
    }

    pub fn as_string(&self) -> Result<&[u8]> {
        match self {
            Self::String(s) => Ok(s),
            _ => Err(self.type_error("string")),
        }
    }

    pub const fn as_array(&self) -> Result<&Vec<Self>> {
        match self {
            Self::Array(arr) => Ok(arr),
            _ => Err(self.type_error("array")),
        }
    }

    pub const fn as_dict(&self) -> Result<&HashMap<String, Self>> {
        match self {
            Self::Dict(d) => Ok(d),
            _ => Err(self.type_error("dict")),
        }
    }

    pub fn as_stream(&self) -> Result<&Stream> {
        match self {
            Self::Stream(s) => Ok(s),
            _ => Err(self.type_error("stream")),
        }
    }

    pub const fn as_obj_ref(&self) -> Result<&ObjRef> {
        match self {
            Self::Ref(r) => Ok(r),
            _ => Err(self.type_error("ref")),
        }
    }

    const fn type_error(&self, expected: &'static str) -> PdfError {
        PdfError::TypeError {
            expected,
            got: self.type_name(),
        }
    }

    /// Get type name for error messages.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Real(_) => "real",
            Self::Name(_) => "name",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Dict(_) => "dict",
            Self::Stream(_) => "stream",
            Self::Ref(_) => "ref",
        }
    }
}

/// PDF indirect object reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef {
    /// Object number
    pub objid: u32,
    /// Generation number
    pub genno: u32,
}

impl ObjRef {
    pub const fn new(objid: u32, genno: u32) -> Self {
        Self { objid, genno }
    }
}

/// PDF stream - dictionary attributes plus a raw (still encoded) byte range.
///
/// Decoding is performed on demand by the document layer; the stream itself
/// never caches decoded bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    /// Stream dictionary attributes
    pub attrs: HashMap<String, Object>,
    /// Raw (possibly filtered) data, shared with the backing file view
    rawdata: Bytes,
    /// Object ID, set when the stream was parsed as an indirect object
    pub objid: Option<u32>,
    /// Generation number
    pub genno: Option<u32>,
}

impl Stream {
    pub fn new(attrs: HashMap<String, Object>, rawdata: impl Into<Bytes>) -> Self {
        Self {
            attrs,
            rawdata: rawdata.into(),
            objid: None,
            genno: None,
        }
    }

    pub const fn set_objid(&mut self, objid: u32, genno: u32) {
        self.objid = Some(objid);
        self.genno = Some(genno);
    }

    /// Raw (undecoded) data.
    pub fn rawdata(&self) -> &[u8] {
        self.rawdata.as_ref()
    }

    /// Raw data as a shared, zero-copy view.
    pub fn rawdata_bytes(&self) -> Bytes {
        self.rawdata.clone()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Object> {
        self.attrs.get(name)
    }

    /// Get an attribute, trying multiple names (full and abbreviated forms).
    pub fn get_any(&self, names: &[&str]) -> Option<&Object> {
        names.iter().find_map(|name| self.attrs.get(*name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_are_kind_checked() {
        let obj = Object::Int(42);
        assert_eq!(obj.as_int().unwrap(), 42);
        assert_eq!(obj.as_num().unwrap(), 42.0);
        assert!(obj.as_name().is_err());
        assert!(matches!(
            obj.as_dict(),
            Err(PdfError::TypeError {
                expected: "dict",
                got: "int"
            })
        ));
    }

    #[test]
    fn stream_get_any_tries_abbreviations() {
        let mut attrs = HashMap::new();
        attrs.insert("F".to_string(), Object::Name("FlateDecode".into()));
        let stream = Stream::new(attrs, Vec::new());
        assert!(stream.get_any(&["Filter", "F"]).is_some());
    }
}
