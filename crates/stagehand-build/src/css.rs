use std::path::{Path, PathBuf};

use crate::fingerprint::{self, FingerprintError, ReferenceMap};

/// Files produced by the CSS stage.
#[derive(Debug, Clone, Default)]
pub struct CssOutput {
    /// Copied paths relative to the output directory, before fingerprinting
    pub files: Vec<PathBuf>,
    /// Original → fingerprinted paths; empty when fingerprinting is off
    pub references: ReferenceMap,
}

/// Copy every `*.css` under `src_dir` into `out_dir`, mirroring the path
/// relative to `src_dir`. With `fingerprint` set, the copies are renamed to
/// `name.<hash>.css` and the returned map records each rename.
pub fn process_css(src_dir: &Path, out_dir: &Path, fingerprint: bool) -> Result<CssOutput, CssError> {
    let sources = find_css(src_dir)?;

    let mut copied = Vec::with_capacity(sources.len());
    for relative in sources {
        let from = src_dir.join(&relative);
        let to = out_dir.join(&relative);
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CssError::CreateDir {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        std::fs::copy(&from, &to).map_err(|e| CssError::Copy {
            path: from.clone(),
            source: e,
        })?;
        copied.push(relative);
    }

    if !fingerprint {
        return Ok(CssOutput {
            files: copied,
            references: ReferenceMap::new(),
        });
    }

    let references = fingerprint::compute_references(out_dir, &copied)?;
    fingerprint::rename_resources(out_dir, &references)?;

    Ok(CssOutput {
        files: copied,
        references,
    })
}

/// Relative paths of all CSS files under `src_dir`, sorted.
fn find_css(src_dir: &Path) -> Result<Vec<PathBuf>, CssError> {
    if !src_dir.is_dir() {
        return Err(CssError::MissingSourceDir(src_dir.to_path_buf()));
    }

    let mut found = Vec::new();
    for entry in walkdir::WalkDir::new(src_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| CssError::Scan {
            path: src_dir.to_path_buf(),
            source: e,
        })?;
        let is_css = entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("css"));
        if entry.file_type().is_file()
            && is_css
            && let Ok(relative) = entry.path().strip_prefix(src_dir)
        {
            found.push(relative.to_path_buf());
        }
    }
    Ok(found)
}

#[derive(Debug, thiserror::Error)]
pub enum CssError {
    #[error("source directory {0} does not exist")]
    MissingSourceDir(PathBuf),
    #[error("failed to scan {path} for stylesheets")]
    Scan {
        path: PathBuf,
        source: walkdir::Error,
    },
    #[error("failed to create directory {path}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to copy stylesheet {path}")]
    Copy {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to fingerprint stylesheets")]
    Fingerprint(#[from] FingerprintError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::content_hash;
    use tempfile::TempDir;

    fn site() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir_all(src.join("css/vendor")).unwrap();
        std::fs::create_dir_all(src.join("js")).unwrap();
        std::fs::write(src.join("style.css"), "body{}").unwrap();
        std::fs::write(src.join("css/vendor/reset.CSS"), "*{margin:0}").unwrap();
        std::fs::write(src.join("js/index.js"), "1").unwrap();
        std::fs::create_dir_all(tmp.path().join("dist")).unwrap();
        tmp
    }

    #[test]
    fn copies_css_tree_verbatim() {
        let tmp = site();
        let out = tmp.path().join("dist");

        let output = process_css(&tmp.path().join("src"), &out, false).unwrap();

        assert_eq!(
            output.files,
            vec![
                PathBuf::from("css/vendor/reset.CSS"),
                PathBuf::from("style.css")
            ]
        );
        assert!(output.references.is_empty());
        assert_eq!(std::fs::read_to_string(out.join("style.css")).unwrap(), "body{}");
        assert!(!out.join("js").exists());
    }

    #[test]
    fn fingerprints_and_maps_every_file() {
        let tmp = site();
        let out = tmp.path().join("dist");

        let output = process_css(&tmp.path().join("src"), &out, true).unwrap();

        let expected = format!("style.{}.css", content_hash(b"body{}"));
        assert_eq!(output.references.get("style.css"), Some(expected.as_str()));
        assert_eq!(output.references.len(), 2);
        assert!(out.join(&expected).exists());
        assert!(!out.join("style.css").exists());
        assert!(output.files.contains(&PathBuf::from("style.css")));
    }

    #[test]
    fn missing_source_dir_errors() {
        let tmp = TempDir::new().unwrap();
        let err = process_css(&tmp.path().join("src"), tmp.path(), false).unwrap_err();
        assert!(matches!(err, CssError::MissingSourceDir(_)));
    }
}
