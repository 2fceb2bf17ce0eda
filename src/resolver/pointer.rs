//! Reference targets
//!
//! A `$ref` names a document (relative to the document containing the
//! reference) and optionally a JSON pointer into it.

use std::fmt;
use std::path::{Component, Path, PathBuf};

/// A node that references can point at: a document plus a JSON pointer
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefTarget {
    pub document: PathBuf,
    /// RFC 6901 pointer, "" for the document root
    pub pointer: String,
}

impl RefTarget {
    pub fn root(document: impl Into<PathBuf>) -> Self {
        Self {
            document: document.into(),
            pointer: String::new(),
        }
    }
}

impl fmt::Display for RefTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.document.display(), self.pointer)
    }
}

/// Parse a `$ref` value found in `base_document`
pub fn parse_reference(reference: &str, base_document: &Path) -> Result<RefTarget, String> {
    if reference.contains("://") {
        return Err("remote references are not supported".to_string());
    }

    let (document_part, fragment) = match reference.split_once('#') {
        Some((doc, fragment)) => (doc, fragment),
        None => (reference, ""),
    };

    let document = if document_part.is_empty() {
        base_document.to_path_buf()
    } else {
        let base_dir = base_document.parent().unwrap_or(Path::new(""));
        normalize(&base_dir.join(document_part))
    };

    if !fragment.is_empty() && !fragment.starts_with('/') {
        return Err(format!("unsupported fragment '#{}'", fragment));
    }

    Ok(RefTarget {
        document,
        pointer: decode_fragment(fragment),
    })
}

/// Lexically resolve `.` and `..` components
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Undo the URI escaping allowed in fragments (`%20`, `%25`, ...)
fn decode_fragment(fragment: &str) -> String {
    let bytes = fragment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).unwrap_or_else(|_| fragment.to_string())
}
