//! Delete guard between two versions of a vocabulary, and the file layout
//! rules of a CI workflow

use std::collections::BTreeSet;
use std::path::Path;

use tracing::{debug, error, warn};
use walkdir::WalkDir;

use crate::config::{Config, VocabContext};
use crate::error::{ConfigError, VocabError};
use crate::model::Model;

/// IRIs of concepts and collections present in `previous` but not in `current`.
///
/// Fails with [`VocabError::RemovedEntities`] unless the vocabulary allows
/// deletion, in which case the removals are only logged.
pub fn check_removed(
    previous: &Model,
    current: &Model,
    ctx: &VocabContext,
) -> Result<Vec<String>, VocabError> {
    let mut removed = Vec::new();
    for (kind, iris, now) in [
        (
            "Concept",
            previous.concepts.keys().collect::<Vec<_>>(),
            current.concepts.keys().collect::<BTreeSet<_>>(),
        ),
        (
            "Collection",
            previous.collections.keys().collect::<Vec<_>>(),
            current.collections.keys().collect::<BTreeSet<_>>(),
        ),
    ] {
        for iri in iris.into_iter().filter(|iri| !now.contains(*iri)) {
            if ctx.allow_delete() {
                warn!("Removal of a {} detected: {}", kind, iri);
            } else {
                error!("Removal of a {} detected: {}", kind, iri);
            }
            removed.push(iri.clone());
        }
    }

    if removed.is_empty() {
        debug!("No removals detected");
    } else if !ctx.allow_delete() {
        return Err(VocabError::RemovedEntities(removed));
    }
    Ok(removed)
}

/// Lowercased names of the entries of `dir` with one of `extensions`.
/// Directories count as split trees when `trees` is set. Hidden entries are
/// skipped, anything else is returned in `others`.
fn entry_names(
    dir: &Path,
    extensions: &[&str],
    trees: bool,
) -> Result<(BTreeSet<String>, Vec<String>), VocabError> {
    let mut names = BTreeSet::new();
    let mut others = Vec::new();
    let walker = WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name();
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            VocabError::structure(path, e.to_string())
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let path = entry.path();
        if entry.file_type().is_dir() {
            if trees {
                names.insert(name.to_lowercase());
            } else {
                others.push(name);
            }
            continue;
        }
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match path.file_stem() {
            Some(stem) if extensions.contains(&ext.as_str()) => {
                names.insert(stem.to_string_lossy().to_lowercase());
            }
            _ => others.push(name),
        }
    }
    Ok((names, others))
}

/// Check the files a CI run works on against the configuration.
///
/// `inbox` holds the workbooks submitted for conversion (plus README or
/// text files), `vocab_dir` the published Turtle files or split trees. With
/// `single_vocab` both may hold at most one vocabulary and the names must
/// agree. Every name must be declared in the configuration.
pub fn check_ci_layout(
    config: &Config,
    inbox: &Path,
    vocab_dir: Option<&Path>,
) -> Result<(), VocabError> {
    if config.vocabs.is_empty() {
        warn!("No vocabulary in the configuration, file names are not checked");
        return Ok(());
    }
    if !inbox.is_dir() {
        return Err(VocabError::structure(inbox, "inbox is not a directory"));
    }

    let (inbox_names, others) = entry_names(inbox, &["xlsx"], false)?;
    let stray: Vec<&String> = others
        .iter()
        .filter(|name| {
            let lower = name.to_lowercase();
            !(lower.ends_with(".md") || lower.ends_with(".txt"))
        })
        .collect();
    for name in &stray {
        warn!(
            "Inbox {} should only hold xlsx workbooks and README files, found {}",
            inbox.display(),
            name
        );
    }
    debug!("Inbox vocabularies: {:?}", inbox_names);

    let vocab_names = match vocab_dir {
        Some(dir) if dir.is_dir() => entry_names(dir, &["ttl"], true)?.0,
        Some(dir) => {
            debug!("No vocabulary directory at {}", dir.display());
            BTreeSet::new()
        }
        None => BTreeSet::new(),
    };
    debug!("Published vocabularies: {:?}", vocab_names);

    if config.single_vocab {
        if inbox_names.len() > 1 {
            return Err(ConfigError::SingleVocab(inbox_names.len()).into());
        }
        if vocab_names.len() > 1 {
            return Err(ConfigError::SingleVocab(vocab_names.len()).into());
        }
        if let (Some(new), Some(published)) = (inbox_names.first(), vocab_names.first()) {
            if new != published {
                return Err(VocabError::structure(
                    inbox.join(format!("{}.xlsx", new)),
                    format!("must match the vocabulary name \"{}\"", published),
                ));
            }
        }
    }

    for name in inbox_names.iter().chain(&vocab_names) {
        if config.vocab(name).is_none() {
            error!("Vocabulary \"{}\" is missing in the configuration", name);
            return Err(ConfigError::UnknownVocab(name.clone()).into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::{sample_config, sample_context};
    use crate::config::Overrides;
    use crate::model::tests::{sample_model, VOC};
    use std::fs;

    #[test]
    fn test_no_removal() {
        let ctx = sample_context();
        let model = sample_model();
        assert!(check_removed(&model, &model, &ctx).unwrap().is_empty());
    }

    #[test]
    fn test_removal_forbidden() {
        let ctx = sample_context();
        let previous = sample_model();
        let mut current = previous.clone();
        current.concepts.remove(&format!("{}0000003", VOC));
        current.collections.clear();

        match check_removed(&previous, &current, &ctx) {
            Err(VocabError::RemovedEntities(iris)) => {
                assert_eq!(
                    iris,
                    vec![format!("{}0000003", VOC), format!("{}0000010", VOC)]
                );
            }
            other => panic!("expected removal error, got {:?}", other),
        }
    }

    #[test]
    fn test_removal_allowed() {
        let mut config = sample_config();
        if let Some(vocab) = config.vocabs.get_mut("myvocab") {
            vocab.checks.allow_delete = true;
        }
        let ctx = VocabContext::new("myvocab", &config, Overrides::default()).unwrap();
        let previous = sample_model();
        let mut current = previous.clone();
        current.concepts.remove(&format!("{}0000003", VOC));

        let removed = check_removed(&previous, &current, &ctx).unwrap();
        assert_eq!(removed.len(), 1);
    }

    #[test]
    fn test_new_entities_are_not_removals() {
        let ctx = sample_context();
        let mut previous = sample_model();
        let current = previous.clone();
        previous.concepts.clear();
        previous.collections.clear();
        assert!(check_removed(&previous, &current, &ctx).unwrap().is_empty());
    }

    fn touch(dir: &Path, names: &[&str]) {
        for name in names {
            fs::write(dir.join(name), b"").unwrap();
        }
    }

    #[test]
    fn test_ci_layout_accepts_configured_names() {
        let inbox = tempfile::tempdir().unwrap();
        let vocabs = tempfile::tempdir().unwrap();
        touch(inbox.path(), &["MyVocab.xlsx", "README.md"]);
        touch(vocabs.path(), &["myvocab.ttl"]);
        check_ci_layout(&sample_config(), inbox.path(), Some(vocabs.path())).unwrap();
    }

    #[test]
    fn test_ci_layout_single_vocab_inbox() {
        let inbox = tempfile::tempdir().unwrap();
        touch(inbox.path(), &["myvocab.xlsx", "other.xlsx"]);
        assert!(matches!(
            check_ci_layout(&sample_config(), inbox.path(), None),
            Err(VocabError::Config(ConfigError::SingleVocab(2)))
        ));
    }

    #[test]
    fn test_ci_layout_unknown_vocab() {
        let inbox = tempfile::tempdir().unwrap();
        touch(inbox.path(), &["other.xlsx"]);
        match check_ci_layout(&sample_config(), inbox.path(), None) {
            Err(VocabError::Config(ConfigError::UnknownVocab(name))) => {
                assert_eq!(name, "other");
            }
            other => panic!("expected unknown vocabulary, got {:?}", other),
        }
    }

    #[test]
    fn test_ci_layout_inbox_must_match_published() {
        let inbox = tempfile::tempdir().unwrap();
        let vocabs = tempfile::tempdir().unwrap();
        touch(inbox.path(), &["other.xlsx"]);
        fs::create_dir(vocabs.path().join("myvocab")).unwrap();
        assert!(matches!(
            check_ci_layout(&sample_config(), inbox.path(), Some(vocabs.path())),
            Err(VocabError::Structure { .. })
        ));
    }
}
