//! Atomic writes of single files and whole directory trees
//!
//! Everything is first written next to its destination, in the same parent
//! directory, and renamed into place as the last step. A failure before the
//! rename leaves the destination untouched.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::Builder;
use tracing::debug;

use crate::error::VocabError;

const STAGING_PREFIX: &str = ".vocsync-staging-";

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Replace `path` with `content` in one rename
pub fn write_file_atomic(path: &Path, content: &[u8]) -> Result<(), VocabError> {
    let parent = parent_dir(path);
    fs::create_dir_all(&parent)?;
    let mut staged = Builder::new().prefix(STAGING_PREFIX).tempfile_in(&parent)?;
    staged.write_all(content)?;
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|e| e.error)?;
    debug!("Wrote {} ({} bytes)", path.display(), content.len());
    Ok(())
}

/// Build a directory tree with `build` and swap it in for `target`.
///
/// `build` receives an empty directory to populate. An existing `target` is
/// moved aside and removed only after the new tree is in place.
pub fn replace_dir_atomic<F>(target: &Path, build: F) -> Result<(), VocabError>
where
    F: FnOnce(&Path) -> Result<(), VocabError>,
{
    let parent = parent_dir(target);
    fs::create_dir_all(&parent)?;
    let staging = Builder::new().prefix(STAGING_PREFIX).tempdir_in(&parent)?;
    let fresh = staging.path().join("new");
    fs::create_dir(&fresh)?;
    build(&fresh)?;

    let old = staging.path().join("old");
    let had_target = target.exists();
    if had_target {
        fs::rename(target, &old)?;
    }
    if let Err(e) = fs::rename(&fresh, target) {
        if had_target {
            // put the previous tree back
            fs::rename(&old, target)?;
        }
        return Err(e.into());
    }
    debug!("Replaced directory {}", target.display());
    // dropping the staging dir removes the old tree
    staging.close()?;
    Ok(())
}
