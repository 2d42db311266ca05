//! Content-hash fingerprinting for cache busting.
//!
//! [`compute_references`] maps each resource to `name.<hash>.ext`,
//! [`rename_resources`] applies that map on disk, and [`apply_references`]
//! rewrites `href` / `src` attributes in HTML that point at mapped paths.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

/// Hex characters of the content hash kept in a fingerprinted name.
pub const HASH_LEN: usize = 8;

/// Matches `href=` / `src=` attributes with double, single or no quotes.
static REFERENCE_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(href|src)(\s*=\s*)(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#)
        .expect("reference attribute regex")
});

/// Original asset path → fingerprinted path, both relative to the output
/// directory with `/` separators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceMap {
    entries: BTreeMap<String, String>,
}

impl ReferenceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, original: impl Into<String>, fingerprinted: impl Into<String>) {
        self.entries.insert(original.into(), fingerprinted.into());
    }

    pub fn get(&self, original: &str) -> Option<&str> {
        self.entries.get(original).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Short hex digest of `content`.
pub fn content_hash(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    let mut hex = hex::encode(digest);
    hex.truncate(HASH_LEN);
    hex
}

/// `dir/name.ext` → `dir/name.<hash>.ext`; a name without extension gets
/// the hash appended.
pub fn fingerprinted_name(path: &str, content: &[u8]) -> String {
    let hash = content_hash(content);
    let (dir, file) = match path.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, path),
    };
    let renamed = match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}.{hash}.{ext}"),
        _ => format!("{file}.{hash}"),
    };
    match dir {
        Some(dir) => format!("{dir}/{renamed}"),
        None => renamed,
    }
}

/// Relative path with `/` separators, as used in references and object keys.
pub fn to_reference(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Hash every file in `files` (relative to `root`) and return the mapping
/// to fingerprinted names. Nothing is renamed.
pub fn compute_references(root: &Path, files: &[PathBuf]) -> Result<ReferenceMap, FingerprintError> {
    let mut map = ReferenceMap::new();
    for file in files {
        let full = root.join(file);
        let content = std::fs::read(&full).map_err(|e| FingerprintError::Read {
            path: full.clone(),
            source: e,
        })?;
        let original = to_reference(file);
        let fingerprinted = fingerprinted_name(&original, &content);
        tracing::debug!(%original, %fingerprinted, "fingerprinted resource");
        map.insert(original, fingerprinted);
    }
    Ok(map)
}

/// Rename each mapped file under `root` to its fingerprinted name.
pub fn rename_resources(root: &Path, map: &ReferenceMap) -> Result<(), FingerprintError> {
    for (original, fingerprinted) in map.iter() {
        let from = root.join(original);
        let to = root.join(fingerprinted);
        std::fs::rename(&from, &to).map_err(|e| FingerprintError::Rename {
            from: from.clone(),
            to: to.clone(),
            source: e,
        })?;
    }
    Ok(())
}

/// Rewrite every `href` / `src` attribute whose path is a key of `map`.
///
/// A leading `/` or `./` and any `?query` / `#fragment` are kept around the
/// replaced path. Attributes that do not match a key exactly are untouched.
pub fn apply_references(html: &str, map: &ReferenceMap) -> String {
    if map.is_empty() {
        return html.to_owned();
    }

    REFERENCE_ATTR
        .replace_all(html, |caps: &regex::Captures<'_>| {
            let whole = &caps[0];
            let (value, quote) = if let Some(v) = caps.get(3) {
                (v.as_str(), "\"")
            } else if let Some(v) = caps.get(4) {
                (v.as_str(), "'")
            } else if let Some(v) = caps.get(5) {
                (v.as_str(), "")
            } else {
                return whole.to_owned();
            };

            match rewrite_value(value, map) {
                Some(rewritten) => format!("{}{}{quote}{rewritten}{quote}", &caps[1], &caps[2]),
                None => whole.to_owned(),
            }
        })
        .into_owned()
}

fn rewrite_value(value: &str, map: &ReferenceMap) -> Option<String> {
    let split_at = value.find(['?', '#']).unwrap_or(value.len());
    let (path, suffix) = value.split_at(split_at);

    let (prefix, bare) = if let Some(rest) = path.strip_prefix("./") {
        ("./", rest)
    } else if let Some(rest) = path.strip_prefix('/') {
        ("/", rest)
    } else {
        ("", path)
    };

    map.get(bare)
        .map(|fingerprinted| format!("{prefix}{fingerprinted}{suffix}"))
}

#[derive(Debug, thiserror::Error)]
pub enum FingerprintError {
    #[error("failed to read {path} for fingerprinting")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to rename {from} to {to}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}
