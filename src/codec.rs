//! Model to tables and back
//!
//! Writing lays out one row per entity and language, default language first,
//! with language independent cells on the first row only. Reading collects
//! every problem of every cell before giving up, so one run of the converter
//! shows the editor all that needs fixing.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::cell::{format_cell, parse_cell, CellValue, Membership};
use crate::config::VocabContext;
use crate::error::VocabError;
use crate::iri::{local_name, IdMatch, PrefixMap};
use crate::model::{
    Agent, Collection, Concept, ConceptScheme, Deprecation, LangMap, Mappings, Model,
    SourceProvenance,
};
use crate::table::{collection_col as cc, concept_col as kc, Row, Table, Tables};
use crate::validate::{Severity, ValidationReport, Violation, ViolationKind};
use crate::vocab::OBSOLETE_PREFIX;

/// Keys of the Concept Scheme sheet, in sheet order
pub mod scheme_key {
    pub const IRI: &str = "Vocabulary IRI";
    pub const TITLE: &str = "Title";
    pub const DESCRIPTION: &str = "Description";
    pub const CREATED: &str = "Created Date";
    pub const MODIFIED: &str = "Modified Date";
    pub const CREATOR: &str = "Creator";
    pub const CONTRIBUTOR: &str = "Contributor";
    pub const PUBLISHER: &str = "Publisher";
    pub const CUSTODIAN: &str = "Custodian";
    pub const LICENSE: &str = "License";
    pub const HOMEPAGE: &str = "Homepage";
    pub const CONFORMS_TO: &str = "Conforms To";
    pub const VERSION: &str = "Version";
    pub const HISTORY_NOTE: &str = "History Note";
    pub const CATALOGUE_PID: &str = "Catalogue PID";
    pub const REPOSITORY: &str = "Repository";
}

/// Sort key: permanent numeric IDs ascending, then everything else by IRI
pub fn entity_order(ctx: &VocabContext, iri: &str) -> (u8, u64, String) {
    let numeric = match &ctx.id_pattern {
        Some(pattern) => match pattern.classify(iri) {
            IdMatch::Permanent(id) => Some(id),
            _ => None,
        },
        None => {
            let local = local_name(iri);
            (!local.is_empty() && local.bytes().all(|b| b.is_ascii_digit()))
                .then(|| local.parse().ok())
                .flatten()
        }
    };
    match numeric {
        Some(id) => (0, id, iri.to_string()),
        None => (1, 0, iri.to_string()),
    }
}

fn sorted_iris<'a, I>(ctx: &VocabContext, iris: I) -> Vec<&'a String>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut iris: Vec<&String> = iris.into_iter().collect();
    iris.sort_by_cached_key(|iri| entity_order(ctx, iri));
    iris
}

/// Languages of an entity, default language first. An entity without any
/// text still gets a row in the default language.
fn languages<'a>(default_lang: &str, maps: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    let set: BTreeSet<&String> = maps.into_iter().collect();
    let mut langs: Vec<String> = Vec::with_capacity(set.len().max(1));
    if set.is_empty() || set.iter().any(|l| l.as_str() == default_lang) {
        langs.push(default_lang.to_string());
    }
    langs.extend(
        set.into_iter()
            .filter(|l| l.as_str() != default_lang)
            .cloned(),
    );
    langs
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn agent_lines(agents: &[Agent]) -> String {
    agents
        .iter()
        .map(Agent::to_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn lang_key(key: &str, lang: &str, default_lang: &str) -> String {
    if lang == default_lang {
        key.to_string()
    } else {
        format!("{}@{}", key, lang)
    }
}

/// Lay out a model as workbook tables
pub fn model_to_tables(model: &Model, ctx: &VocabContext) -> Tables {
    let mut tables = Tables::default();
    let prefixes = &ctx.prefixes;
    let default_lang = ctx.default_language();

    tables.scheme = scheme_rows(&model.scheme, default_lang);

    // memberships seen from the member's side
    let mut member_of: BTreeMap<&str, Vec<Membership>> = BTreeMap::new();
    for collection_iri in sorted_iris(ctx, model.collections.keys()) {
        let collection = &model.collections[collection_iri];
        for (index, member) in collection.members.iter().enumerate() {
            member_of.entry(member.as_str()).or_default().push(Membership {
                collection: collection.iri.clone(),
                position: collection.ordered.then_some(index + 1),
            });
        }
    }

    for iri in sorted_iris(ctx, model.concepts.keys()) {
        let concept = &model.concepts[iri];
        let memberships = member_of.get(iri.as_str()).cloned().unwrap_or_default();
        let (ordered, unordered): (Vec<Membership>, Vec<Membership>) =
            memberships.into_iter().partition(|m| m.position.is_some());
        let langs = languages(
            default_lang,
            concept
                .pref_labels
                .keys()
                .chain(concept.definitions.keys())
                .chain(concept.alt_labels.keys()),
        );
        for (i, lang) in langs.iter().enumerate() {
            let mut cells = vec![String::new(); tables.concepts.columns.len()];
            cells[kc::IRI] = prefixes.compress(&concept.iri);
            cells[kc::LANGUAGE] = lang.clone();
            cells[kc::LABEL] = concept.pref_labels.get(lang).cloned().unwrap_or_default();
            cells[kc::DEFINITION] = concept.definitions.get(lang).cloned().unwrap_or_default();
            if let Some(alts) = concept.alt_labels.get(lang) {
                cells[kc::ALT_LABELS] = format_cell(&CellValue::Texts(alts.clone()), prefixes);
            }
            if i == 0 {
                let src = &concept.source;
                let dep = concept.deprecation.as_ref();
                cells[kc::PARENTS] = iris_cell(&concept.parents, prefixes);
                cells[kc::MEMBER_OF] = format_cell(&CellValue::Memberships(unordered.clone()), prefixes);
                cells[kc::MEMBER_OF_ORDERED] =
                    format_cell(&CellValue::Memberships(ordered.clone()), prefixes);
                cells[kc::PROVENANCE] = iri_cell(&concept.provenance_url, prefixes);
                cells[kc::CHANGE_NOTE] = text(&concept.change_note);
                cells[kc::EDITORIAL_NOTE] = text(&concept.editorial_note);
                cells[kc::INFLUENCED_BY] = iris_cell(&src.influenced_by, prefixes);
                cells[kc::SOURCE] = iri_cell(&src.source, prefixes);
                cells[kc::SOURCE_LICENSE] = text(&src.license);
                cells[kc::SOURCE_RIGHTS_HOLDER] = text(&src.rights_holder);
                cells[kc::OBSOLETION_REASON] = dep.map(|d| d.reason.clone()).unwrap_or_default();
                cells[kc::REPLACED_BY] =
                    iri_cell(&dep.and_then(|d| d.replaced_by.clone()), prefixes);
            }
            tables.concepts.push(cells);
        }
    }

    for iri in sorted_iris(ctx, model.collections.keys()) {
        let collection = &model.collections[iri];
        let parents = member_of.get(iri.as_str()).cloned().unwrap_or_default();
        let langs = languages(
            default_lang,
            collection
                .pref_labels
                .keys()
                .chain(collection.definitions.keys()),
        );
        for (i, lang) in langs.iter().enumerate() {
            let mut cells = vec![String::new(); tables.collections.columns.len()];
            cells[cc::IRI] = prefixes.compress(&collection.iri);
            cells[cc::LANGUAGE] = lang.clone();
            cells[cc::LABEL] = collection.pref_labels.get(lang).cloned().unwrap_or_default();
            cells[cc::DEFINITION] = collection.definitions.get(lang).cloned().unwrap_or_default();
            if i == 0 {
                let dep = collection.deprecation.as_ref();
                cells[cc::PARENTS] = format_cell(&CellValue::Memberships(parents.clone()), prefixes);
                cells[cc::ORDERED] = format_cell(&CellValue::Flag(collection.ordered), prefixes);
                cells[cc::PROVENANCE] = iri_cell(&collection.provenance_url, prefixes);
                cells[cc::CHANGE_NOTE] = text(&collection.change_note);
                cells[cc::EDITORIAL_NOTE] = text(&collection.editorial_note);
                cells[cc::OBSOLETION_REASON] = dep.map(|d| d.reason.clone()).unwrap_or_default();
                cells[cc::REPLACED_BY] =
                    iri_cell(&dep.and_then(|d| d.replaced_by.clone()), prefixes);
            }
            tables.collections.push(cells);
        }
    }

    for iri in sorted_iris(ctx, model.concepts.keys()) {
        let m = &model.concepts[iri].mappings;
        if m.is_empty() {
            continue;
        }
        tables.mappings.push(vec![
            prefixes.compress(iri),
            iris_cell(&m.related, prefixes),
            iris_cell(&m.close, prefixes),
            iris_cell(&m.exact, prefixes),
            iris_cell(&m.narrow, prefixes),
            iris_cell(&m.broad, prefixes),
        ]);
    }

    let used = model.used_ids(ctx);
    for usage in ctx.allocator.usage(&used) {
        let range = &usage.range;
        tables.id_ranges.push(vec![
            ctx.allocator.range_label(range),
            range.name.clone().unwrap_or_else(|| range.owner()),
            range.gh_name.clone(),
            range.orcid.clone().unwrap_or_default(),
            range.ror_id.clone().unwrap_or_default(),
            ctx.allocator.usage_label(&usage),
        ]);
    }

    for (prefix, ns) in prefixes.iter() {
        tables.prefixes.push(vec![prefix.to_string(), ns.to_string()]);
    }

    debug!(
        "Laid out {} concept rows, {} collection rows and {} mapping rows",
        tables.concepts.rows.len(),
        tables.collections.rows.len(),
        tables.mappings.rows.len()
    );
    tables
}

fn iri_cell(iri: &Option<String>, prefixes: &PrefixMap) -> String {
    iri.as_deref().map(|i| prefixes.compress(i)).unwrap_or_default()
}

fn iris_cell(iris: &[String], prefixes: &PrefixMap) -> String {
    format_cell(&CellValue::Iris(iris.to_vec()), prefixes)
}

fn scheme_rows(scheme: &ConceptScheme, default_lang: &str) -> Vec<(String, String)> {
    use scheme_key::*;

    let mut rows = vec![(IRI.to_string(), scheme.iri.clone())];
    let langs = languages(default_lang, scheme.titles.keys().chain(scheme.definitions.keys()));
    for lang in &langs {
        if let Some(title) = scheme.titles.get(lang) {
            rows.push((lang_key(TITLE, lang, default_lang), title.clone()));
        }
    }
    for lang in &langs {
        if let Some(description) = scheme.definitions.get(lang) {
            rows.push((lang_key(DESCRIPTION, lang, default_lang), description.clone()));
        }
    }
    let fields = [
        (CREATED, text(&scheme.created)),
        (MODIFIED, text(&scheme.modified)),
        (CREATOR, agent_lines(&scheme.creators)),
        (CONTRIBUTOR, agent_lines(&scheme.contributors)),
        (PUBLISHER, agent_lines(&scheme.publishers)),
        (CUSTODIAN, agent_lines(&scheme.custodians)),
        (LICENSE, text(&scheme.license)),
        (HOMEPAGE, text(&scheme.homepage)),
        (CONFORMS_TO, text(&scheme.conforms_to)),
        (VERSION, text(&scheme.version)),
        (HISTORY_NOTE, text(&scheme.history_note)),
        (CATALOGUE_PID, text(&scheme.catalogue_pid)),
        (REPOSITORY, text(&scheme.repository)),
    ];
    rows.extend(fields.into_iter().map(|(k, v)| (k.to_string(), v)));
    rows
}

fn scheme_from_rows(tables: &Tables, default_lang: &str) -> ConceptScheme {
    use scheme_key::*;

    let mut scheme = ConceptScheme::default();
    let value = |key: &str| tables.scheme_value(key).map(|v| v.trim().to_string());
    let agents = |key: &str| value(key).map(|v| Agent::parse_lines(&v)).unwrap_or_default();

    for (key, v) in &tables.scheme {
        let v = v.trim();
        if v.is_empty() {
            continue;
        }
        let (base, lang) = match key.split_once('@') {
            Some((base, lang)) => (base, lang.to_ascii_lowercase()),
            None => (key.as_str(), default_lang.to_string()),
        };
        match base {
            TITLE => {
                scheme.titles.insert(lang, v.to_string());
            }
            DESCRIPTION => {
                scheme.definitions.insert(lang, v.to_string());
            }
            _ => {}
        }
    }
    scheme.iri = value(IRI).unwrap_or_default();
    scheme.created = value(CREATED);
    scheme.modified = value(MODIFIED);
    scheme.creators = agents(CREATOR);
    scheme.contributors = agents(CONTRIBUTOR);
    scheme.publishers = agents(PUBLISHER);
    scheme.custodians = agents(CUSTODIAN);
    scheme.license = value(LICENSE);
    scheme.homepage = value(HOMEPAGE);
    scheme.conforms_to = value(CONFORMS_TO);
    scheme.version = value(VERSION);
    scheme.history_note = value(HISTORY_NOTE);
    scheme.catalogue_pid = value(CATALOGUE_PID);
    scheme.repository = value(REPOSITORY);
    scheme
}

/// Typed access to the cells of one row; problems go to the shared list
struct RowReader<'a> {
    table: &'a Table,
    row: &'a Row,
    prefixes: &'a PrefixMap,
    violations: &'a mut Vec<Violation>,
}

impl RowReader<'_> {
    fn locator(&self) -> String {
        self.table.locate(self.row)
    }

    fn cell(&mut self, index: usize) -> CellValue {
        let column = &self.table.columns[index];
        let raw = self.row.get(index);
        match parse_cell(column.kind, raw, self.prefixes) {
            Ok(CellValue::Empty) if column.required => {
                self.violations.push(
                    Violation::violation(
                        ViolationKind::MissingField,
                        self.locator(),
                        "required cell is empty",
                    )
                    .with_field(column.header),
                );
                CellValue::Empty
            }
            Ok(value) => value,
            Err(e) => {
                self.violations.push(
                    Violation::violation(e.kind(), self.locator(), e.to_string())
                        .with_field(column.header)
                        .with_value(raw.trim()),
                );
                CellValue::Empty
            }
        }
    }

    fn text(&mut self, index: usize) -> Option<String> {
        match self.cell(index) {
            CellValue::Text(t) | CellValue::Language(t) | CellValue::Choice(t) => Some(t),
            _ => None,
        }
    }

    fn texts(&mut self, index: usize) -> Vec<String> {
        match self.cell(index) {
            CellValue::Texts(items) => items,
            _ => Vec::new(),
        }
    }

    fn iri(&mut self, index: usize) -> Option<String> {
        match self.cell(index) {
            CellValue::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    fn iris(&mut self, index: usize) -> Vec<String> {
        match self.cell(index) {
            CellValue::Iris(iris) => iris,
            _ => Vec::new(),
        }
    }

    fn flag(&mut self, index: usize) -> Option<bool> {
        match self.cell(index) {
            CellValue::Flag(flag) => Some(flag),
            _ => None,
        }
    }

    fn memberships(&mut self, index: usize) -> Vec<Membership> {
        match self.cell(index) {
            CellValue::Memberships(items) => items,
            _ => Vec::new(),
        }
    }
}

/// Language dependent cells of one row
struct LangCells {
    locator: String,
    lang: Option<String>,
    label: Option<String>,
    definition: Option<String>,
    alt_labels: Vec<String>,
}

/// Language independent cells of one concept row
#[derive(Default, Clone, PartialEq)]
struct ConceptStructure {
    parents: Vec<String>,
    memberships: Vec<Membership>,
    provenance: Option<String>,
    change_note: Option<String>,
    editorial_note: Option<String>,
    influenced_by: Vec<String>,
    source: Option<String>,
    source_license: Option<String>,
    source_rights_holder: Option<String>,
    obsoletion_reason: Option<String>,
    replaced_by: Option<String>,
}

#[derive(Default, Clone, PartialEq)]
struct CollectionStructure {
    parents: Vec<Membership>,
    ordered: Option<bool>,
    provenance: Option<String>,
    change_note: Option<String>,
    editorial_note: Option<String>,
    obsoletion_reason: Option<String>,
    replaced_by: Option<String>,
}

/// Rows of one entity in sheet order
type EntityRows<S> = Vec<(LangCells, S)>;

/// Merge the rows of an entity. Structural cells may sit on any row but must
/// agree where given more than once.
fn merge_structure<S: Default + Clone + PartialEq>(
    iri: &str,
    rows: &[(LangCells, S)],
    merge: impl Fn(&mut S, &S) -> Vec<&'static str>,
    violations: &mut Vec<Violation>,
) -> S {
    let mut merged = S::default();
    for (cells, structure) in rows {
        for field in merge(&mut merged, structure) {
            violations.push(
                Violation::violation(
                    ViolationKind::Conflict,
                    &cells.locator,
                    format!("conflicting values for {} across the rows of {}", field, iri),
                )
                .with_field(field),
            );
        }
    }
    merged
}

/// Set `slot` from `value` if it is empty; report a conflict otherwise
fn merge_field<T: PartialEq + Clone + IsBlank>(
    slot: &mut T,
    value: &T,
    field: &'static str,
    conflicts: &mut Vec<&'static str>,
) {
    if value.is_blank() {
        return;
    }
    if slot.is_blank() {
        *slot = value.clone();
    } else if slot != value {
        conflicts.push(field);
    }
}

trait IsBlank {
    fn is_blank(&self) -> bool;
}

impl<T> IsBlank for Option<T> {
    fn is_blank(&self) -> bool {
        self.is_none()
    }
}

impl<T> IsBlank for Vec<T> {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

fn merge_concept_structure(slot: &mut ConceptStructure, row: &ConceptStructure) -> Vec<&'static str> {
    let mut c = Vec::new();
    merge_field(&mut slot.parents, &row.parents, "Parent IRIs", &mut c);
    merge_field(&mut slot.memberships, &row.memberships, "Member of collection(s)", &mut c);
    merge_field(&mut slot.provenance, &row.provenance, "Provenance", &mut c);
    merge_field(&mut slot.change_note, &row.change_note, "Change Note", &mut c);
    merge_field(&mut slot.editorial_note, &row.editorial_note, "Editorial Note", &mut c);
    merge_field(&mut slot.influenced_by, &row.influenced_by, "Influenced by IRIs", &mut c);
    merge_field(&mut slot.source, &row.source, "Source Vocab IRI or URL", &mut c);
    merge_field(&mut slot.source_license, &row.source_license, "Source Vocab License", &mut c);
    merge_field(
        &mut slot.source_rights_holder,
        &row.source_rights_holder,
        "Source Vocab Rights Holder",
        &mut c,
    );
    merge_field(&mut slot.obsoletion_reason, &row.obsoletion_reason, "Obsoletion reason", &mut c);
    merge_field(&mut slot.replaced_by, &row.replaced_by, "dct:isReplacedBy", &mut c);
    c
}

fn merge_collection_structure(
    slot: &mut CollectionStructure,
    row: &CollectionStructure,
) -> Vec<&'static str> {
    let mut c = Vec::new();
    merge_field(&mut slot.parents, &row.parents, "Parent Collection IRIs", &mut c);
    merge_field(&mut slot.ordered, &row.ordered, "Ordered?", &mut c);
    merge_field(&mut slot.provenance, &row.provenance, "Provenance", &mut c);
    merge_field(&mut slot.change_note, &row.change_note, "Change Note", &mut c);
    merge_field(&mut slot.editorial_note, &row.editorial_note, "Editorial Note", &mut c);
    merge_field(&mut slot.obsoletion_reason, &row.obsoletion_reason, "Obsoletion reason", &mut c);
    merge_field(&mut slot.replaced_by, &row.replaced_by, "dct:isReplacedBy", &mut c);
    c
}

/// Fill language maps from the rows of one entity
fn merge_languages<S>(
    iri: &str,
    rows: &[(LangCells, S)],
    labels: &mut LangMap<String>,
    definitions: &mut LangMap<String>,
    alt_labels: Option<&mut LangMap<Vec<String>>>,
    violations: &mut Vec<Violation>,
) {
    let mut seen = BTreeSet::new();
    let mut alts = LangMap::new();
    for (cells, _) in rows {
        let Some(lang) = &cells.lang else {
            continue;
        };
        if !seen.insert(lang.clone()) {
            violations.push(
                Violation::violation(
                    ViolationKind::Conflict,
                    &cells.locator,
                    format!("more than one row for {} in language \"{}\"", iri, lang),
                )
                .with_field("Language Code")
                .with_value(lang),
            );
            continue;
        }
        if let Some(label) = &cells.label {
            labels.insert(lang.clone(), label.clone());
        }
        if let Some(definition) = &cells.definition {
            definitions.insert(lang.clone(), definition.clone());
        }
        if !cells.alt_labels.is_empty() {
            alts.insert(lang.clone(), cells.alt_labels.clone());
        }
    }
    if let Some(target) = alt_labels {
        *target = alts;
    }
}

fn deprecation(
    reason: &Option<String>,
    replaced_by: &Option<String>,
    locator: &str,
    violations: &mut Vec<Violation>,
) -> Option<Deprecation> {
    match reason {
        Some(reason) => Some(Deprecation {
            reason: reason.clone(),
            replaced_by: replaced_by.clone(),
        }),
        None => {
            if replaced_by.is_some() {
                violations.push(
                    Violation::violation(
                        ViolationKind::Deprecation,
                        locator,
                        "a replacement is given but no obsoletion reason",
                    )
                    .with_field("dct:isReplacedBy"),
                );
            }
            None
        }
    }
}

/// Deprecated entities carry the obsolete marker in their default label
fn mark_obsolete(iri: &str, labels: &mut LangMap<String>, default_lang: &str) {
    if let Some(label) = labels.get_mut(default_lang) {
        if !label.starts_with(OBSOLETE_PREFIX) {
            info!("Marking deprecated {} as obsolete in its label", iri);
            *label = format!("{}{}", OBSOLETE_PREFIX, label);
        }
    }
}

/// Read workbook tables into a model, failing with every problem found
pub fn tables_to_model(tables: &Tables, ctx: &VocabContext) -> Result<Model, VocabError> {
    let prefixes = &ctx.prefixes;
    let default_lang = ctx.default_language();
    let mut violations: Vec<Violation> = Vec::new();

    let mut concept_rows: IndexMap<String, EntityRows<ConceptStructure>> = IndexMap::new();
    for row in tables.concepts.rows.iter().filter(|r| !r.is_blank()) {
        let mut r = RowReader {
            table: &tables.concepts,
            row,
            prefixes,
            violations: &mut violations,
        };
        let iri = r.iri(kc::IRI);
        let lang = LangCells {
            locator: r.locator(),
            lang: r.text(kc::LANGUAGE),
            label: r.text(kc::LABEL),
            definition: r.text(kc::DEFINITION),
            alt_labels: r.texts(kc::ALT_LABELS),
        };
        let mut memberships = r.memberships(kc::MEMBER_OF);
        for m in r.memberships(kc::MEMBER_OF_ORDERED) {
            if !memberships.contains(&m) {
                memberships.push(m);
            }
        }
        let structure = ConceptStructure {
            parents: r.iris(kc::PARENTS),
            memberships,
            provenance: r.iri(kc::PROVENANCE),
            change_note: r.text(kc::CHANGE_NOTE),
            editorial_note: r.text(kc::EDITORIAL_NOTE),
            influenced_by: r.iris(kc::INFLUENCED_BY),
            source: r.iri(kc::SOURCE),
            source_license: r.text(kc::SOURCE_LICENSE),
            source_rights_holder: r.text(kc::SOURCE_RIGHTS_HOLDER),
            obsoletion_reason: r.text(kc::OBSOLETION_REASON),
            replaced_by: r.iri(kc::REPLACED_BY),
        };
        if let Some(iri) = iri {
            concept_rows
                .entry(iri)
                .or_default()
                .push((lang, structure));
        }
    }

    let mut collection_rows: IndexMap<String, EntityRows<CollectionStructure>> = IndexMap::new();
    for row in tables.collections.rows.iter().filter(|r| !r.is_blank()) {
        let mut r = RowReader {
            table: &tables.collections,
            row,
            prefixes,
            violations: &mut violations,
        };
        let iri = r.iri(cc::IRI);
        let lang = LangCells {
            locator: r.locator(),
            lang: r.text(cc::LANGUAGE),
            label: r.text(cc::LABEL),
            definition: r.text(cc::DEFINITION),
            alt_labels: Vec::new(),
        };
        let structure = CollectionStructure {
            parents: r.memberships(cc::PARENTS),
            ordered: r.flag(cc::ORDERED),
            provenance: r.iri(cc::PROVENANCE),
            change_note: r.text(cc::CHANGE_NOTE),
            editorial_note: r.text(cc::EDITORIAL_NOTE),
            obsoletion_reason: r.text(cc::OBSOLETION_REASON),
            replaced_by: r.iri(cc::REPLACED_BY),
        };
        if let Some(iri) = iri {
            collection_rows
                .entry(iri)
                .or_default()
                .push((lang, structure));
        }
    }

    let mut model = Model {
        scheme: scheme_from_rows(tables, default_lang),
        ..Default::default()
    };

    // (member, membership, locator) for resolving collection contents
    let mut memberships: Vec<(String, Membership, String)> = Vec::new();

    for (iri, rows) in &concept_rows {
        let structure = merge_structure(iri, rows, merge_concept_structure, &mut violations);
        let locator = rows[0].0.locator.clone();
        let mut concept = Concept {
            iri: iri.clone(),
            parents: structure.parents.clone(),
            change_note: structure.change_note.clone(),
            editorial_note: structure.editorial_note.clone(),
            source: SourceProvenance {
                source: structure.source.clone(),
                license: structure.source_license.clone(),
                rights_holder: structure.source_rights_holder.clone(),
                influenced_by: structure.influenced_by.clone(),
            },
            deprecation: deprecation(
                &structure.obsoletion_reason,
                &structure.replaced_by,
                &locator,
                &mut violations,
            ),
            provenance_url: structure.provenance.clone(),
            ..Default::default()
        };
        merge_languages(
            iri,
            rows,
            &mut concept.pref_labels,
            &mut concept.definitions,
            Some(&mut concept.alt_labels),
            &mut violations,
        );
        if concept.deprecation.is_some() {
            mark_obsolete(iri, &mut concept.pref_labels, default_lang);
        }
        for m in &structure.memberships {
            memberships.push((iri.clone(), m.clone(), locator.clone()));
        }
        model.concepts.insert(iri.clone(), concept);
    }

    for (iri, rows) in &collection_rows {
        let structure = merge_structure(iri, rows, merge_collection_structure, &mut violations);
        let locator = rows[0].0.locator.clone();
        let mut collection = Collection {
            iri: iri.clone(),
            ordered: structure.ordered.unwrap_or(false),
            change_note: structure.change_note.clone(),
            editorial_note: structure.editorial_note.clone(),
            deprecation: deprecation(
                &structure.obsoletion_reason,
                &structure.replaced_by,
                &locator,
                &mut violations,
            ),
            provenance_url: structure.provenance.clone(),
            ..Default::default()
        };
        merge_languages(
            iri,
            rows,
            &mut collection.pref_labels,
            &mut collection.definitions,
            None,
            &mut violations,
        );
        if collection.deprecation.is_some() {
            mark_obsolete(iri, &mut collection.pref_labels, default_lang);
        }
        for m in &structure.parents {
            memberships.push((iri.clone(), m.clone(), locator.clone()));
        }
        model.collections.insert(iri.clone(), collection);
    }

    resolve_memberships(&mut model, memberships, &mut violations);
    read_mappings(tables, ctx, &mut model, &mut violations);

    violations.extend(model.validate_invariants(ctx));
    let observed = model.observed_ids(ctx);
    violations.extend(ctx.allocator.verify(
        &observed,
        ctx.overrides.committer.as_deref(),
        ctx.baseline_ids.as_ref(),
    ));

    let mut report = ValidationReport { violations };
    report.sort();
    let report = report.into_result(Severity::Violation)?;
    report.log();
    info!(
        "Read {} concepts and {} collections from workbook",
        model.concepts.len(),
        model.collections.len()
    );
    Ok(model)
}

/// Fill collection members from the membership cells of their members
fn resolve_memberships(
    model: &mut Model,
    memberships: Vec<(String, Membership, String)>,
    violations: &mut Vec<Violation>,
) {
    let mut ordered: BTreeMap<String, BTreeMap<usize, String>> = BTreeMap::new();
    for (member, m, locator) in memberships {
        let Some(collection) = model.collections.get_mut(&m.collection) else {
            violations.push(
                Violation::violation(
                    ViolationKind::DanglingReference,
                    &locator,
                    "membership in a collection that is not defined on the Collections sheet",
                )
                .with_field("Member of collection(s)")
                .with_value(&m.collection),
            );
            continue;
        };
        match (collection.ordered, m.position) {
            (true, Some(position)) => {
                let positions = ordered.entry(m.collection.clone()).or_default();
                if let Some(other) = positions.get(&position) {
                    violations.push(
                        Violation::violation(
                            ViolationKind::Conflict,
                            &locator,
                            format!("position {} is already taken by {}", position, other),
                        )
                        .with_field("Member of ordered collection # position")
                        .with_value(&m.collection),
                    );
                } else {
                    positions.insert(position, member);
                }
            }
            (true, None) => violations.push(
                Violation::violation(
                    ViolationKind::InvalidValue,
                    &locator,
                    "membership in an ordered collection needs a position",
                )
                .with_field("Member of ordered collection # position")
                .with_value(&m.collection),
            ),
            (false, Some(_)) => violations.push(
                Violation::violation(
                    ViolationKind::InvalidValue,
                    &locator,
                    "position given for a collection that is not ordered",
                )
                .with_field("Member of collection(s)")
                .with_value(&m.collection),
            ),
            (false, None) => {
                if !collection.members.contains(&member) {
                    collection.members.push(member);
                }
            }
        }
    }
    for collection in model.collections.values_mut() {
        match ordered.remove(&collection.iri) {
            Some(positions) => collection.members = positions.into_values().collect(),
            None => collection.members.sort(),
        }
    }
}

fn read_mappings(
    tables: &Tables,
    ctx: &VocabContext,
    model: &mut Model,
    violations: &mut Vec<Violation>,
) {
    let mut seen = BTreeSet::new();
    for row in tables.mappings.rows.iter().filter(|r| !r.is_blank()) {
        let mut r = RowReader {
            table: &tables.mappings,
            row,
            prefixes: &ctx.prefixes,
            violations: &mut *violations,
        };
        let locator = r.locator();
        let iri = r.iri(0);
        let mappings = Mappings {
            related: r.iris(1),
            close: r.iris(2),
            exact: r.iris(3),
            narrow: r.iris(4),
            broad: r.iris(5),
        };
        let Some(iri) = iri else {
            continue;
        };
        let Some(concept) = model.concepts.get_mut(&iri) else {
            violations.push(
                Violation::violation(
                    ViolationKind::DanglingReference,
                    &locator,
                    "mapping row for a concept that is not defined on the Concepts sheet",
                )
                .with_field("Concept IRI")
                .with_value(&iri),
            );
            continue;
        };
        if !seen.insert(iri.clone()) {
            violations.push(
                Violation::violation(
                    ViolationKind::Conflict,
                    &locator,
                    "more than one mapping row for this concept",
                )
                .with_value(&iri),
            );
            continue;
        }
        concept.mappings = mappings;
    }
}
