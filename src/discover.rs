//! Finding Word documents in a directory.

use anyhow::{bail, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// List `.docx` files under `dir`, sorted by relative path.
///
/// Word lock files (`~$name.docx`) are always skipped; `exclude_globs` are
/// matched against the path relative to `dir`. Without `recursive` only the
/// top level is searched.
pub fn find_docx_files(dir: &Path, recursive: bool, exclude_globs: &[String]) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("Directory not found: {}", dir.display());
    }

    let include_set = build_globset(&["**/*.docx".to_string()])?;

    let mut excludes = vec!["**/~$*".to_string()];
    excludes.extend(exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut walker = WalkDir::new(dir).follow_links(false);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(dir).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }
        files.push(path.to_path_buf());
    }

    files.sort();
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(GlobBuilder::new(pattern).case_insensitive(true).build()?);
    }
    Ok(builder.build()?)
}
