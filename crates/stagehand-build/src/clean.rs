use std::path::{Component, Path, PathBuf};

/// Delete the whole output directory and recreate it empty.
///
/// `project_dir` and `src_dir` guard against a misconfigured `out_dir`:
/// the output directory may not be empty, contain `..`, be the project
/// root or one of its ancestors, or contain the source tree. Paths are
/// compared both as given and canonicalized.
pub fn clean(out_dir: &Path, project_dir: &Path, src_dir: &Path) -> Result<(), CleanError> {
    if is_unsafe(out_dir, project_dir, src_dir) {
        return Err(CleanError::Unsafe {
            path: out_dir.to_path_buf(),
        });
    }

    if out_dir.exists() {
        tracing::debug!(path = %out_dir.display(), "removing output directory");
        std::fs::remove_dir_all(out_dir).map_err(|e| CleanError::Remove {
            path: out_dir.to_path_buf(),
            source: e,
        })?;
    }
    std::fs::create_dir_all(out_dir).map_err(|e| CleanError::Create {
        path: out_dir.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

fn is_unsafe(out_dir: &Path, project_dir: &Path, src_dir: &Path) -> bool {
    if out_dir.as_os_str().is_empty()
        || out_dir.components().any(|c| matches!(c, Component::ParentDir))
    {
        return true;
    }
    let overlaps = |out: &Path, project: &Path, src: &Path| {
        project.starts_with(out) || src.starts_with(out)
    };
    overlaps(out_dir, project_dir, src_dir)
        || overlaps(
            &canonical(out_dir),
            &canonical(project_dir),
            &canonical(src_dir),
        )
}

/// Canonical form of `path`, or the path as given when it does not exist.
fn canonical(path: &Path) -> PathBuf {
    match path.canonicalize() {
        Ok(resolved) => resolved,
        Err(e) => {
            tracing::trace!(path = %path.display(), error = %e, "not canonicalized");
            path.to_path_buf()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CleanError {
    #[error("refusing to clean {path}: it escapes the output directory, is the project root, or contains the source tree")]
    Unsafe { path: PathBuf },
    #[error("failed to remove output directory {path}")]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to create output directory {path}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
}
