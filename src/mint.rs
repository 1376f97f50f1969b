//! Replace placeholder IRIs with permanent numeric IDs
//!
//! Editors add new concepts with IRIs like `myv:horse` and run `make-ids`
//! once they are done. Every placeholder under the requested prefix gets the
//! next ID, in the order the entities appear on the Concepts sheet and then
//! the Collections sheet, and every reference to it is rewritten.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::cell::{parse_cell, format_cell, CellKind, CellValue, Membership};
use crate::config::VocabContext;
use crate::error::VocabError;
use crate::iri::{IdMatch, IdPattern, PrefixMap};
use crate::table::{Table, Tables};

/// Arguments of `make-ids`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintRequest {
    /// Prefix whose placeholders are replaced
    pub prefix: String,
    /// IRI the new IDs are appended to; the permanent IRI part when absent
    pub base_iri: Option<String>,
    /// First ID handed out
    pub start: u64,
}

impl MintRequest {
    /// Parse `"prefix"` or `"prefix:base_iri"` plus the first ID
    pub fn parse(value: &str, start: u64) -> Result<Self, VocabError> {
        if start == 0 {
            return Err(VocabError::InvalidArgument(
                "the start ID must be greater than zero".to_string(),
            ));
        }
        let (prefix, base_iri) = match value.split_once(':') {
            Some((prefix, base)) => {
                let base = base.trim();
                if !base.starts_with("http") {
                    return Err(VocabError::InvalidArgument(
                        "the base IRI must be in IRI form and start with \"http\"".to_string(),
                    ));
                }
                (prefix, Some(base.to_string()))
            }
            None => (value, None),
        };
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Err(VocabError::InvalidArgument(
                "a prefix is required".to_string(),
            ));
        }
        Ok(MintRequest {
            prefix: prefix.to_string(),
            base_iri,
            start,
        })
    }
}

/// Result of minting: rewritten tables plus placeholder to IRI assignments
#[derive(Debug, Clone)]
pub struct Minted {
    pub tables: Tables,
    pub assigned: IndexMap<String, String>,
}

/// Decides which IRIs count as placeholders
struct Placeholders<'a> {
    namespace: &'a str,
    pattern: &'a IdPattern,
}

impl Placeholders<'_> {
    fn matches(&self, iri: &str) -> bool {
        if !iri.starts_with(self.namespace) || iri.len() == self.namespace.len() {
            return false;
        }
        // permanent IDs under the vocabulary namespace stay
        !matches!(self.pattern.classify(iri), IdMatch::Permanent(_))
    }
}

fn iris_of(value: &CellValue) -> Vec<&str> {
    match value {
        CellValue::Iri(iri) => vec![iri.as_str()],
        CellValue::Iris(iris) => iris.iter().map(String::as_str).collect(),
        CellValue::Memberships(items) => items.iter().map(|m| m.collection.as_str()).collect(),
        _ => Vec::new(),
    }
}

fn rewrite(value: CellValue, assigned: &IndexMap<String, String>) -> CellValue {
    let map = |iri: String| assigned.get(&iri).cloned().unwrap_or(iri);
    match value {
        CellValue::Iri(iri) => CellValue::Iri(map(iri)),
        CellValue::Iris(iris) => CellValue::Iris(iris.into_iter().map(map).collect()),
        CellValue::Memberships(items) => CellValue::Memberships(
            items
                .into_iter()
                .map(|m| Membership {
                    collection: map(m.collection),
                    position: m.position,
                })
                .collect(),
        ),
        other => other,
    }
}

fn is_iri_kind(kind: CellKind) -> bool {
    matches!(kind, CellKind::Iri | CellKind::IriList | CellKind::Memberships)
}

/// Parsed IRI cells of a table as (row index, column index, value)
fn iri_cells(table: &Table, prefixes: &PrefixMap) -> Vec<(usize, usize, CellValue)> {
    let mut out = Vec::new();
    for (r, row) in table.rows.iter().enumerate() {
        for (c, column) in table.columns.iter().enumerate() {
            if !is_iri_kind(column.kind) {
                continue;
            }
            // malformed cells are left for the codec to report
            if let Ok(value) = parse_cell(column.kind, row.get(c), prefixes) {
                if value != CellValue::Empty {
                    out.push((r, c, value));
                }
            }
        }
    }
    out
}

/// Entity IRIs of a sheet in document order; the IRI is the first column
fn entity_iris(table: &Table, prefixes: &PrefixMap) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for row in &table.rows {
        if let Ok(CellValue::Iri(iri)) = parse_cell(CellKind::Iri, row.get(0), prefixes) {
            if !out.contains(&iri) {
                out.push(iri);
            }
        }
    }
    out
}

/// Assign permanent IDs to all placeholders under the requested prefix
pub fn mint_ids(
    tables: &Tables,
    request: &MintRequest,
    ctx: &VocabContext,
) -> Result<Minted, VocabError> {
    let prefixes = &ctx.prefixes;
    let pattern = ctx.id_pattern.as_ref().ok_or_else(|| {
        VocabError::InvalidArgument(format!(
            "vocabulary \"{}\" has no configuration, cannot create IDs",
            ctx.name
        ))
    })?;
    let namespace = prefixes.get(&request.prefix).ok_or_else(|| {
        VocabError::InvalidArgument(format!("unknown prefix \"{}\"", request.prefix))
    })?;
    let base = request.base_iri.as_deref().unwrap_or(&pattern.iri_part);
    let placeholders = Placeholders { namespace, pattern };

    let mut entities = entity_iris(&tables.concepts, prefixes);
    for iri in entity_iris(&tables.collections, prefixes) {
        if !entities.contains(&iri) {
            entities.push(iri);
        }
    }
    let existing: BTreeSet<&str> = entities.iter().map(String::as_str).collect();

    let mut assigned: IndexMap<String, String> = IndexMap::new();
    let mut next = request.start;
    for iri in entities.iter().filter(|iri| placeholders.matches(iri)) {
        if next > pattern.max_id() {
            return Err(VocabError::InvalidArgument(format!(
                "ID {} does not fit into {} digits",
                next, pattern.width
            )));
        }
        let new_iri = format!("{}{}", base, pattern.format_id(next));
        if existing.contains(new_iri.as_str()) {
            return Err(VocabError::InvalidArgument(format!(
                "ID {} is already used by {}",
                pattern.format_id(next),
                new_iri
            )));
        }
        debug!("Assigning {} to {}", new_iri, iri);
        assigned.insert(iri.clone(), new_iri);
        next += 1;
    }

    let mut out = tables.clone();
    let mut rewritten = 0usize;
    for table in out.editable_mut() {
        for (r, c, value) in iri_cells(table, prefixes) {
            if !iris_of(&value).iter().any(|iri| assigned.contains_key(*iri)) {
                continue;
            }
            let value = rewrite(value, &assigned);
            table.rows[r].set(c, format_cell(&value, prefixes));
            rewritten += 1;
        }
    }

    let mut remaining: Vec<String> = Vec::new();
    for table in [&out.concepts, &out.collections, &out.mappings] {
        for (r, _, value) in iri_cells(table, prefixes) {
            for iri in iris_of(&value) {
                let is_new = assigned.values().any(|v| v == iri);
                if placeholders.matches(iri) && !is_new {
                    remaining.push(format!(
                        "{}: {}",
                        table.locate(&table.rows[r]),
                        prefixes.compress(iri)
                    ));
                }
            }
        }
    }
    if !remaining.is_empty() {
        return Err(VocabError::InvalidArgument(format!(
            "references to undefined placeholders remain: {}",
            remaining.join(", ")
        )));
    }

    info!(
        "Assigned {} IDs under prefix \"{}\", rewrote {} cells",
        assigned.len(),
        request.prefix,
        rewritten
    );
    Ok(Minted {
        tables: out,
        assigned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{model_to_tables, tables_to_model};
    use crate::config::tests::sample_context;
    use crate::model::tests::{sample_model, VOC};
    use crate::table::{collection_col as cc, concept_col as kc};

    fn temp_context() -> VocabContext {
        let mut ctx = sample_context();
        ctx.prefixes.insert("temp", "https://example.org/temp/");
        ctx
    }

    fn tables_with_placeholders(ctx: &VocabContext) -> Tables {
        let mut tables = model_to_tables(&sample_model(), ctx);
        tables.concepts.push(vec![
            "temp:horse".into(),
            "en".into(),
            "Horse".into(),
            "A horse".into(),
            String::new(),
            "myv:0000001".into(),
        ]);
        tables.concepts.push(vec![
            "temp:foal".into(),
            "en".into(),
            "Foal".into(),
            "A young horse".into(),
            String::new(),
            "temp:horse".into(),
        ]);
        tables.collections.push(vec![
            "temp:farm".into(),
            "en".into(),
            "Farm animals".into(),
            "Animals on a farm".into(),
        ]);
        tables.concepts.rows[3].set(kc::MEMBER_OF, "temp:farm".into());
        tables.concepts.rows[4].set(kc::MEMBER_OF, "temp:farm".into());
        tables.mappings.push(vec!["temp:horse".into(), "https://other.org/horse".into()]);
        tables
    }

    #[test]
    fn test_parse_request() {
        let req = MintRequest::parse("ex:https://example.com/new_", 1001).unwrap();
        assert_eq!(req.prefix, "ex");
        assert_eq!(req.base_iri.as_deref(), Some("https://example.com/new_"));
        assert_eq!(MintRequest::parse("ex", 5).unwrap().base_iri, None);
        assert!(MintRequest::parse("ex:example.com/new_", 5).is_err());
        assert!(MintRequest::parse("ex", 0).is_err());
    }

    #[test]
    fn test_no_placeholder_remains() {
        let ctx = temp_context();
        let tables = tables_with_placeholders(&ctx);
        let request = MintRequest::parse("temp", 20).unwrap();
        let minted = mint_ids(&tables, &request, &ctx).unwrap();

        assert_eq!(minted.assigned.len(), 3);
        assert_eq!(minted.assigned["https://example.org/temp/horse"], format!("{}0000020", VOC));
        assert_eq!(minted.assigned["https://example.org/temp/farm"], format!("{}0000022", VOC));

        let t = &minted.tables;
        for table in [&t.concepts, &t.collections, &t.mappings] {
            for row in &table.rows {
                assert!(row.cells.iter().all(|c| !c.contains("temp:")), "{:?}", row);
            }
        }
        assert_eq!(t.concepts.rows[4].get(kc::PARENTS), "myv:0000020");
        assert_eq!(t.collections.rows[1].get(cc::IRI), "myv:0000022");
        assert_eq!(t.mappings.rows[0].get(0), "myv:0000020");

        let model = tables_to_model(t, &ctx).unwrap();
        assert_eq!(
            model.collections[&format!("{}0000022", VOC)].members,
            vec![format!("{}0000020", VOC), format!("{}0000021", VOC)]
        );
    }

    #[test]
    fn test_base_iri() {
        let ctx = temp_context();
        let tables = tables_with_placeholders(&ctx);
        let request = MintRequest::parse("temp:https://example.com/new_", 1001).unwrap();
        let minted = mint_ids(&tables, &request, &ctx).unwrap();
        assert_eq!(
            minted.assigned["https://example.org/temp/foal"],
            "https://example.com/new_0001002"
        );
    }

    #[test]
    fn test_collision_with_used_id() {
        let ctx = temp_context();
        let tables = tables_with_placeholders(&ctx);
        let request = MintRequest::parse("temp", 2).unwrap();
        let err = mint_ids(&tables, &request, &ctx).unwrap_err();
        assert!(err.to_string().contains("already used"), "{}", err);
    }

    #[test]
    fn test_exceeds_width() {
        let ctx = temp_context();
        let tables = tables_with_placeholders(&ctx);
        let request = MintRequest::parse("temp", 9_999_999).unwrap();
        assert!(mint_ids(&tables, &request, &ctx).is_err());
    }

    #[test]
    fn test_dangling_placeholder_fails() {
        let ctx = temp_context();
        let mut tables = tables_with_placeholders(&ctx);
        tables.concepts.rows[0].set(kc::PARENTS, "temp:unicorn".into());
        let request = MintRequest::parse("temp", 20).unwrap();
        let err = mint_ids(&tables, &request, &ctx).unwrap_err();
        assert!(err.to_string().contains("temp:unicorn"), "{}", err);
    }

    #[test]
    fn test_permanent_ids_under_vocab_prefix_kept() {
        let ctx = sample_context();
        let mut tables = model_to_tables(&sample_model(), &ctx);
        tables.concepts.push(vec![
            "myv:horse".into(),
            "en".into(),
            "Horse".into(),
            "A horse".into(),
        ]);
        let request = MintRequest::parse("myv", 4).unwrap();
        let minted = mint_ids(&tables, &request, &ctx).unwrap();
        assert_eq!(minted.assigned.len(), 1);
        assert_eq!(minted.tables.concepts.rows[0].get(kc::IRI), "myv:0000001");
        assert_eq!(minted.tables.concepts.rows[3].get(kc::IRI), "myv:0000004");
    }
}
