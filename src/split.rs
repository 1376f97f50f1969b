//! One-file-per-entity storage of a vocabulary graph
//!
//! A split tree holds `concept_scheme.ttl` (the scheme plus every triple not
//! owned by an entity) and one Turtle file per concept or collection. With the
//! bucketed layout, entities with a permanent ID live in directories covering
//! a fixed ID span, named `{lo}-{hi}` with both bounds zero padded to the ID
//! width. Everything else sits at the root of the tree.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::error::VocabError;
use crate::graph::{Graph, Term, Triple};
use crate::iri::{local_name, IdMatch, IdPattern, PrefixMap};
use crate::staging::replace_dir_atomic;
use crate::turtle;
use crate::vocab::{SKOS_COLLECTION, SKOS_CONCEPT, SKOS_ORDERED_COLLECTION};

pub const SCHEME_FILE: &str = "concept_scheme.ttl";
pub const DEFAULT_BUCKET_SIZE: u64 = 1000;

const ENTITY_CLASSES: [&str; 3] = [SKOS_CONCEPT, SKOS_COLLECTION, SKOS_ORDERED_COLLECTION];

/// How entity files are laid out in a split tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitLayout {
    /// Permanent IDs grouped in directories of `size` consecutive IDs
    Bucketed { size: u64 },
    /// Every file at the root of the tree
    Flat,
}

impl Default for SplitLayout {
    fn default() -> Self {
        SplitLayout::Bucketed {
            size: DEFAULT_BUCKET_SIZE,
        }
    }
}

/// Directory name of the bucket holding `id`
pub fn bucket_name(id: u64, size: u64, width: usize) -> String {
    let lo = id / size * size;
    let hi = lo + size - 1;
    format!("{:0w$}-{:0w$}", lo, hi, w = width)
}

fn parse_bucket_name(name: &str) -> Option<(u64, u64)> {
    let (lo, hi) = name.split_once('-')?;
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !digits(lo) || !digits(hi) {
        return None;
    }
    let (lo, hi) = (lo.parse().ok()?, hi.parse().ok()?);
    (lo <= hi).then_some((lo, hi))
}

fn file_stem(local: &str) -> String {
    let stem: String = local
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() || stem.starts_with('.') {
        format!("entity{}", stem)
    } else {
        stem
    }
}

fn entity_path(iri: &str, layout: SplitLayout, pattern: Option<&IdPattern>) -> PathBuf {
    let local = match pattern.map(|p| (p, p.classify(iri))) {
        Some((pattern, IdMatch::Permanent(id))) => {
            let file = format!("{}.ttl", pattern.format_id(id));
            return match layout {
                SplitLayout::Bucketed { size } => {
                    PathBuf::from(bucket_name(id, size, pattern.width)).join(file)
                }
                SplitLayout::Flat => PathBuf::from(file),
            };
        }
        Some((_, IdMatch::Placeholder(local) | IdMatch::WrongWidth(local))) => local,
        _ => local_name(iri).to_string(),
    };
    PathBuf::from(format!("{}.ttl", file_stem(&local)))
}

/// Collect the triples of `subject` and of every blank node reachable from it
fn collect_owned(graph: &Graph, subject: &Term, claimed: &mut BTreeSet<Term>, out: &mut Graph) {
    let mut pending = vec![subject.clone()];
    while let Some(node) = pending.pop() {
        for triple in graph.about(&node) {
            if triple.object.is_blank() && claimed.insert(triple.object.clone()) {
                pending.push(triple.object.clone());
            }
            out.insert(triple.clone());
        }
    }
}

/// Assign every triple of `graph` to a file path relative to the tree root
pub fn partition(
    graph: &Graph,
    layout: SplitLayout,
    pattern: Option<&IdPattern>,
) -> Result<BTreeMap<PathBuf, Graph>, VocabError> {
    if let SplitLayout::Bucketed { size: 0 } = layout {
        return Err(VocabError::InvalidArgument(
            "bucket size must be at least 1".to_string(),
        ));
    }

    let entities: BTreeSet<Term> = ENTITY_CLASSES
        .iter()
        .flat_map(|class| graph.instances_of(class))
        .filter(|term| term.as_iri().is_some())
        .collect();

    let mut files: BTreeMap<PathBuf, Graph> = BTreeMap::new();
    let mut claimed = BTreeSet::new();
    for entity in &entities {
        let Some(iri) = entity.as_iri() else { continue };
        let path = entity_path(iri, layout, pattern);
        if path == Path::new(SCHEME_FILE) || files.contains_key(&path) {
            return Err(VocabError::structure(
                path,
                format!("file name of {} is already taken", iri),
            ));
        }
        let mut fragment = Graph::new();
        collect_owned(graph, entity, &mut claimed, &mut fragment);
        files.insert(path, fragment);
    }

    let owned: BTreeSet<&Triple> = files.values().flat_map(|g| g.iter()).collect();
    let rest: Graph = graph
        .iter()
        .filter(|t| !owned.contains(t))
        .cloned()
        .collect();
    if !rest.is_empty() {
        files.insert(PathBuf::from(SCHEME_FILE), rest);
    }
    Ok(files)
}

/// Write `graph` as a split tree at `target`, replacing any existing tree.
///
/// Returns the number of files written.
pub fn split(
    graph: &Graph,
    target: &Path,
    layout: SplitLayout,
    pattern: Option<&IdPattern>,
    prefixes: &PrefixMap,
) -> Result<usize, VocabError> {
    let files = partition(graph, layout, pattern)?;
    let count = files.len();
    replace_dir_atomic(target, |root| {
        for (relative, fragment) in &files {
            let path = root.join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, turtle::write(fragment, prefixes))?;
        }
        Ok(())
    })?;
    info!("Split {} triples into {} files in {}", graph.len(), count, target.display());
    Ok(count)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

fn describes_entity(fragment: &Graph) -> Option<String> {
    ENTITY_CLASSES
        .iter()
        .flat_map(|class| fragment.instances_of(class))
        .find_map(|term| term.as_iri().map(str::to_string))
}

/// Read a split tree back into one graph.
///
/// Both the bucketed and the flat layout are accepted. Blank nodes are kept
/// distinct between files.
pub fn join(dir: &Path) -> Result<Graph, VocabError> {
    if !dir.is_dir() {
        return Err(VocabError::structure(dir, "not a directory"));
    }

    let mut graph = Graph::new();
    let mut bucket: Option<(u64, u64)> = None;
    let mut file_count = 0usize;
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e));

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            VocabError::structure(path, e.to_string())
        })?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy();

        if entry.file_type().is_dir() {
            if entry.depth() > 1 {
                return Err(VocabError::structure(path, "nested directory"));
            }
            bucket = Some(
                parse_bucket_name(&name)
                    .ok_or_else(|| VocabError::structure(path, "not an ID bucket directory"))?,
            );
            continue;
        }

        let Some(stem) = name.strip_suffix(".ttl") else {
            return Err(VocabError::structure(path, "not a Turtle file"));
        };
        if entry.depth() > 1 {
            let in_bucket = match (stem.parse::<u64>(), bucket) {
                (Ok(id), Some((lo, hi))) => {
                    stem.bytes().all(|b| b.is_ascii_digit()) && lo <= id && id <= hi
                }
                _ => false,
            };
            if !in_bucket {
                return Err(VocabError::structure(
                    path,
                    "file name is not an ID inside the bucket range",
                ));
            }
        }

        let text = fs::read_to_string(path)?;
        let fragment = turtle::parse(&text, &path.display().to_string())?;
        if name != SCHEME_FILE {
            match describes_entity(&fragment) {
                Some(iri) => debug!("{} holds {}", path.display(), iri),
                None => {
                    return Err(VocabError::structure(
                        path,
                        "does not describe a concept or collection",
                    ))
                }
            }
        }
        graph.extend(scope_blank_nodes(fragment, file_count));
        file_count += 1;
    }

    info!("Joined {} files from {} ({} triples)", file_count, dir.display(), graph.len());
    Ok(graph)
}

fn scope_blank_nodes(fragment: Graph, file: usize) -> Graph {
    let scope = |term: Term| match term {
        Term::Blank(label) => Term::Blank(format!("f{}{}", file, label)),
        other => other,
    };
    fragment
        .into_iter()
        .map(|t| Triple::new(scope(t.subject), t.predicate, scope(t.object)))
        .collect()
}
