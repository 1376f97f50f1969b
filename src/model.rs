//! Format-neutral vocabulary model
//!
//! The hub between the table codec and the graph serializer. Loading from
//! Turtle goes through [`crate::extract`], writing through [`crate::emit`].

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

use crate::allocator::ObservedId;
use crate::config::VocabContext;
use crate::error::VocabError;
use crate::format::SourceFormat;
use crate::graph::Graph;
use crate::hierarchy::Hierarchy;
use crate::iri::IdMatch;
use crate::provenance;
use crate::validate::{Violation, ViolationKind};
use crate::vocab::{COLLECTION_OBSOLETION_REASONS, CONCEPT_OBSOLETION_REASONS, OBSOLETE_PREFIX};
use crate::{emit, extract, turtle};

/// Values keyed by language tag
pub type LangMap<T> = BTreeMap<String, T>;

/// A person or organization
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Agent {
    pub name: String,
    /// URL, ORCID or ROR of the agent
    pub iri: Option<String>,
    pub email: Option<String>,
}

impl Agent {
    /// Parse one agent per non-empty line, "<name> <url-or-email>"
    pub fn parse_lines(text: &str) -> Vec<Agent> {
        text.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(Agent::parse_line)
            .collect()
    }

    pub fn parse_line(line: &str) -> Agent {
        let line = line.trim();
        let (name, contact) = match line.rsplit_once(char::is_whitespace) {
            Some((name, last)) if is_contact(last) => (name.trim(), Some(last)),
            _ if is_contact(line) => ("", Some(line)),
            _ => (line, None),
        };
        let contact = contact.map(|c| c.trim_matches(['<', '>']));
        let (iri, email) = match contact {
            Some(c) if c.contains("://") => (Some(c.to_string()), None),
            Some(c) if is_bare_orcid(c) => (Some(format!("https://orcid.org/{}", c)), None),
            Some(c) => (None, Some(c.trim_start_matches("mailto:").to_string())),
            None => (None, None),
        };
        let name = if name.is_empty() {
            iri.clone().or_else(|| email.clone()).unwrap_or_default()
        } else {
            name.to_string()
        };
        Agent { name, iri, email }
    }

    /// Inverse of [`Agent::parse_line`]
    pub fn to_line(&self) -> String {
        match (&self.iri, &self.email) {
            (Some(iri), _) if iri != &self.name => format!("{} {}", self.name, iri),
            (None, Some(email)) if email != &self.name => format!("{} {}", self.name, email),
            _ => self.name.clone(),
        }
    }
}

fn is_contact(token: &str) -> bool {
    let token = token.trim_matches(['<', '>']);
    token.contains("://")
        || token.starts_with("mailto:")
        || (token.contains('@') && !token.starts_with('@'))
        || is_bare_orcid(token)
}

fn is_bare_orcid(token: &str) -> bool {
    token.len() == 19
        && token
            .split('-')
            .all(|g| g.len() == 4 && g.chars().all(|c| c.is_ascii_digit() || c == 'X'))
}

/// Deprecation state of a concept or collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deprecation {
    pub reason: String,
    pub replaced_by: Option<String>,
}

/// Where a concept's content comes from: either a source vocabulary or a
/// list of influencing resources, never both
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceProvenance {
    pub source: Option<String>,
    pub license: Option<String>,
    pub rights_holder: Option<String>,
    pub influenced_by: Vec<String>,
}

impl SourceProvenance {
    pub fn is_empty(&self) -> bool {
        self.source.is_none()
            && self.license.is_none()
            && self.rights_holder.is_none()
            && self.influenced_by.is_empty()
    }
}

/// Mapping relations to concepts of other vocabularies
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Mappings {
    pub related: Vec<String>,
    pub close: Vec<String>,
    pub exact: Vec<String>,
    pub narrow: Vec<String>,
    pub broad: Vec<String>,
}

impl Mappings {
    pub fn is_empty(&self) -> bool {
        self.related.is_empty()
            && self.close.is_empty()
            && self.exact.is_empty()
            && self.narrow.is_empty()
            && self.broad.is_empty()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Vec<String>> {
        [
            &mut self.related,
            &mut self.close,
            &mut self.exact,
            &mut self.narrow,
            &mut self.broad,
        ]
        .into_iter()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConceptScheme {
    pub iri: String,
    pub titles: LangMap<String>,
    pub definitions: LangMap<String>,
    pub created: Option<String>,
    pub modified: Option<String>,
    pub creators: Vec<Agent>,
    pub contributors: Vec<Agent>,
    pub publishers: Vec<Agent>,
    pub custodians: Vec<Agent>,
    pub license: Option<String>,
    pub homepage: Option<String>,
    pub conforms_to: Option<String>,
    pub version: Option<String>,
    pub history_note: Option<String>,
    pub catalogue_pid: Option<String>,
    pub repository: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Concept {
    pub iri: String,
    pub pref_labels: LangMap<String>,
    pub alt_labels: LangMap<Vec<String>>,
    pub definitions: LangMap<String>,
    /// Broader concepts, in source order
    pub parents: Vec<String>,
    pub change_note: Option<String>,
    pub editorial_note: Option<String>,
    pub source: SourceProvenance,
    pub deprecation: Option<Deprecation>,
    pub mappings: Mappings,
    /// Computed reference URL (dct:provenance / rdfs:seeAlso)
    pub provenance_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Collection {
    pub iri: String,
    pub pref_labels: LangMap<String>,
    pub definitions: LangMap<String>,
    /// Sorted for unordered collections, positional for ordered ones
    pub members: Vec<String>,
    pub ordered: bool,
    pub change_note: Option<String>,
    pub editorial_note: Option<String>,
    pub deprecation: Option<Deprecation>,
    pub provenance_url: Option<String>,
}

/// One vocabulary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Model {
    pub scheme: ConceptScheme,
    pub concepts: BTreeMap<String, Concept>,
    pub collections: BTreeMap<String, Collection>,
    /// Triples the model has no field for; kept on the graph side only
    pub extra: Graph,
    /// Problems found while building the model that its types cannot hold
    pub load_issues: Vec<Violation>,
}

impl Model {
    /// Parse Turtle text into a model. Fails without a partial result.
    pub fn load(
        rdf_text: &str,
        source_name: &str,
        ctx: &VocabContext,
        format: SourceFormat,
    ) -> Result<Model, VocabError> {
        let graph = turtle::parse(rdf_text, source_name)?;
        Self::from_graph(graph, source_name, ctx, format)
    }

    pub fn from_graph(
        graph: Graph,
        source_name: &str,
        ctx: &VocabContext,
        format: SourceFormat,
    ) -> Result<Model, VocabError> {
        let graph = format.adapt(graph, source_name)?;
        extract::from_graph(&graph, ctx, source_name)
    }

    pub fn to_graph(&self, ctx: &VocabContext) -> Graph {
        emit::to_graph(self, ctx)
    }

    /// Canonical Turtle; byte-identical for unchanged content
    pub fn to_rdf_text(&self, ctx: &VocabContext) -> String {
        turtle::write(&self.to_graph(ctx), &ctx.prefixes)
    }

    pub fn set_modified(&mut self, date: NaiveDate) {
        self.scheme.modified = Some(date.format("%Y-%m-%d").to_string());
    }

    /// IRIs of all concepts and collections
    pub fn entity_iris(&self) -> BTreeSet<&str> {
        self.concepts
            .keys()
            .chain(self.collections.keys())
            .map(String::as_str)
            .collect()
    }

    /// Concepts and collections carrying a permanent numeric ID
    pub fn observed_ids(&self, ctx: &VocabContext) -> Vec<ObservedId> {
        let Some(pattern) = &ctx.id_pattern else {
            return Vec::new();
        };
        self.entity_iris()
            .into_iter()
            .filter_map(|iri| match pattern.classify(iri) {
                IdMatch::Permanent(id) => Some(ObservedId {
                    id,
                    subject: iri.to_string(),
                }),
                _ => None,
            })
            .collect()
    }

    pub fn used_ids(&self, ctx: &VocabContext) -> BTreeSet<u64> {
        self.observed_ids(ctx).into_iter().map(|o| o.id).collect()
    }

    /// Parent relation of the concepts
    pub fn hierarchy(&self) -> Hierarchy {
        Hierarchy::new(
            self.concepts
                .values()
                .map(|c| (c.iri.as_str(), c.parents.iter())),
        )
    }

    /// Collection containment; cycles here are collections containing
    /// themselves
    fn collection_nesting(&self) -> Hierarchy {
        Hierarchy::new(
            self.collections
                .values()
                .map(|c| (c.iri.as_str(), c.members.iter())),
        )
    }

    /// Check all structural invariants; never stops at the first problem
    pub fn validate_invariants(&self, ctx: &VocabContext) -> Vec<Violation> {
        let mut out = self.load_issues.clone();
        let default_lang = ctx.default_language();

        if self.scheme.iri.is_empty() {
            out.push(missing("ConceptScheme", "IRI"));
        }
        if self.scheme.titles.is_empty() {
            out.push(missing(&self.scheme.iri, "title"));
        }
        if self.scheme.definitions.is_empty() {
            out.push(missing(&self.scheme.iri, "description"));
        }

        for iri in self.concepts.keys() {
            if self.collections.contains_key(iri) {
                out.push(
                    Violation::violation(
                        ViolationKind::DuplicateIri,
                        iri,
                        "IRI is used for a concept and a collection",
                    )
                    .with_value(iri),
                );
            }
        }

        if let Some(pattern) = &ctx.id_pattern {
            for iri in self.entity_iris() {
                match pattern.classify(iri) {
                    IdMatch::WrongWidth(digits) => out.push(
                        Violation::violation(
                            ViolationKind::IdWidth,
                            iri,
                            format!(
                                "ID has {} digits but this vocabulary uses {}",
                                digits.len(),
                                pattern.width
                            ),
                        )
                        .with_value(digits),
                    ),
                    IdMatch::Placeholder(local) => out.push(
                        Violation::info(
                            ViolationKind::Placeholder,
                            iri,
                            "preliminary IRI, run make-ids before publishing",
                        )
                        .with_value(local),
                    ),
                    IdMatch::Permanent(_) | IdMatch::Foreign => {}
                }
            }
        }

        for concept in self.concepts.values() {
            out.extend(self.check_concept(concept, default_lang));
        }
        for collection in self.collections.values() {
            out.extend(self.check_collection(collection, default_lang));
        }

        let hierarchy = self.hierarchy();
        let cycles = hierarchy.cycles();
        for cycle in &cycles {
            out.push(
                Violation::violation(
                    ViolationKind::Cycle,
                    &cycle[0],
                    format!("broader relations form a cycle: {}", cycle.join(" -> ")),
                )
                .with_field("parents"),
            );
        }
        if cycles.is_empty() {
            if !hierarchy.is_empty() && hierarchy.top_concepts().is_empty() {
                out.push(Violation::violation(
                    ViolationKind::NoTopConcept,
                    &self.scheme.iri,
                    "no concept without a parent in this scheme",
                ));
            }
            for edge in hierarchy.redundant_edges() {
                out.push(
                    Violation::warning(
                        ViolationKind::RedundantHierarchy,
                        &edge.concept,
                        format!(
                            "parent {} is already an ancestor through {}",
                            edge.redundant, edge.via
                        ),
                    )
                    .with_field("parents")
                    .with_value(&edge.redundant),
                );
            }
        }

        for cycle in self.collection_nesting().cycles() {
            out.push(Violation::violation(
                ViolationKind::Cycle,
                &cycle[0],
                format!("collections contain themselves: {}", cycle.join(" -> ")),
            ));
        }
        out
    }

    fn check_concept(&self, concept: &Concept, default_lang: &str) -> Vec<Violation> {
        let mut out = Vec::new();
        let iri = concept.iri.as_str();

        if concept.pref_labels.is_empty() {
            out.push(missing(iri, "preferred label"));
        }
        if concept.definitions.is_empty() {
            out.push(missing(iri, "definition"));
        }
        for lang in concept.pref_labels.keys() {
            if !concept.definitions.contains_key(lang) {
                out.push(missing(iri, "definition").with_value(lang));
            }
        }
        for (lang, alts) in &concept.alt_labels {
            if concept.pref_labels.get(lang).is_some_and(|p| alts.contains(p)) {
                out.push(
                    Violation::warning(
                        ViolationKind::Conflict,
                        iri,
                        "alternate label repeats the preferred label",
                    )
                    .with_field("alternate labels")
                    .with_value(lang),
                );
            }
        }

        for parent in &concept.parents {
            if !self.concepts.contains_key(parent) && self.is_local(parent) {
                out.push(dangling(iri, "parents", parent));
            }
        }

        let src = &concept.source;
        if src.source.is_some() && !src.influenced_by.is_empty() {
            out.push(
                Violation::violation(
                    ViolationKind::Provenance,
                    iri,
                    "a concept has either a source vocabulary or influenced-by IRIs, not both",
                )
                .with_field("source vocabulary"),
            );
        }
        if src.source.is_none() && (src.license.is_some() || src.rights_holder.is_some()) {
            out.push(
                Violation::violation(
                    ViolationKind::Provenance,
                    iri,
                    "source license or rights holder given without a source vocabulary",
                )
                .with_field("source vocabulary"),
            );
        }

        out.extend(check_deprecation(
            iri,
            &concept.pref_labels,
            concept.deprecation.as_ref(),
            CONCEPT_OBSOLETION_REASONS,
            default_lang,
        ));
        out
    }

    fn check_collection(&self, collection: &Collection, default_lang: &str) -> Vec<Violation> {
        let mut out = Vec::new();
        let iri = collection.iri.as_str();

        if collection.pref_labels.is_empty() {
            out.push(missing(iri, "preferred label"));
        }
        if collection.definitions.is_empty() {
            out.push(missing(iri, "definition"));
        }
        if collection.members.is_empty() {
            out.push(
                Violation::violation(
                    ViolationKind::EmptyCollection,
                    iri,
                    "collection has no members",
                )
                .with_field("members"),
            );
        }
        for member in &collection.members {
            let known =
                self.concepts.contains_key(member) || self.collections.contains_key(member);
            if !known && self.is_local(member) {
                out.push(dangling(iri, "members", member));
            }
        }
        out.extend(check_deprecation(
            iri,
            &collection.pref_labels,
            collection.deprecation.as_ref(),
            COLLECTION_OBSOLETION_REASONS,
            default_lang,
        ));
        out
    }

    /// Whether an IRI belongs to this vocabulary's namespace
    fn is_local(&self, iri: &str) -> bool {
        let ns_of = |iri: &str| {
            iri.rfind(['/', '#'])
                .map(|pos| iri[..=pos].to_string())
                .unwrap_or_default()
        };
        let namespaces: BTreeSet<String> = self
            .concepts
            .keys()
            .chain(self.collections.keys())
            .map(|i| ns_of(i))
            .collect();
        namespaces.contains(&ns_of(iri))
    }

    /// Overlay scheme metadata from the configuration.
    ///
    /// A field set in the configuration always replaces the graph's value;
    /// fields the configuration leaves empty keep what the graph had.
    pub fn apply_config_metadata(&mut self, ctx: &VocabContext) {
        if let Some(vocab) = &ctx.vocab {
            let scheme = &mut self.scheme;
            let lang = vocab.default_language.clone();

            if scheme.iri != vocab.vocabulary_iri {
                if !scheme.iri.is_empty() {
                    info!(
                        "Replacing scheme IRI {} with configured {}",
                        scheme.iri, vocab.vocabulary_iri
                    );
                }
                scheme.iri = vocab.vocabulary_iri.clone();
            }
            scheme.titles.insert(lang.clone(), vocab.title.clone());
            scheme.definitions.insert(lang, vocab.description.clone());

            overlay(&mut scheme.created, &vocab.created_date);
            overlay(&mut scheme.license, &vocab.license);
            overlay(&mut scheme.homepage, &vocab.homepage);
            overlay(&mut scheme.conforms_to, &vocab.conforms_to);
            overlay(&mut scheme.history_note, &vocab.history_note);
            overlay(&mut scheme.catalogue_pid, &vocab.catalogue_pid);
            overlay(&mut scheme.repository, &vocab.repository);
            overlay_agents(&mut scheme.creators, &vocab.creator);
            overlay_agents(&mut scheme.publishers, &vocab.publisher);
            overlay_agents(&mut scheme.custodians, &vocab.custodian);
        }

        if let Some(version) = &ctx.overrides.version {
            self.scheme.version = Some(version.clone());
        }

        if !ctx.allocator.is_empty() {
            let used = self.used_ids(ctx);
            let derived = ctx.allocator.contributors(&used, &self.scheme.creators);
            if !derived.is_empty() {
                self.scheme.contributors = derived;
            }
        }

        let mut updated = 0usize;
        for concept in self.concepts.values_mut() {
            if let Some(url) = provenance::entity_url(ctx, &concept.iri) {
                concept.provenance_url = Some(url);
                updated += 1;
            }
        }
        for collection in self.collections.values_mut() {
            if let Some(url) = provenance::entity_url(ctx, &collection.iri) {
                collection.provenance_url = Some(url);
                updated += 1;
            }
        }
        debug!("Set provenance URLs for {} entities", updated);
    }
}

fn overlay(target: &mut Option<String>, configured: &Option<String>) {
    if let Some(value) = configured.as_ref().filter(|v| !v.trim().is_empty()) {
        *target = Some(value.trim().to_string());
    }
}

fn overlay_agents(target: &mut Vec<Agent>, configured: &Option<String>) {
    if let Some(text) = configured {
        let agents = Agent::parse_lines(text);
        if !agents.is_empty() {
            *target = agents;
        }
    }
}

fn missing(subject: &str, field: &str) -> Violation {
    Violation::violation(
        ViolationKind::MissingField,
        subject,
        format!("{} is required", field),
    )
    .with_field(field)
}

fn dangling(subject: &str, field: &str, target: &str) -> Violation {
    Violation::violation(
        ViolationKind::DanglingReference,
        subject,
        "reference to an entity that is not defined in this vocabulary",
    )
    .with_field(field)
    .with_value(target)
}

fn check_deprecation(
    iri: &str,
    labels: &LangMap<String>,
    deprecation: Option<&Deprecation>,
    reasons: &[&str],
    default_lang: &str,
) -> Vec<Violation> {
    let mut out = Vec::new();
    let marked = labels
        .get(default_lang)
        .is_some_and(|l| l.starts_with(OBSOLETE_PREFIX));

    match deprecation {
        None if marked => out.push(
            Violation::violation(
                ViolationKind::Deprecation,
                iri,
                format!(
                    "label starts with \"{}\" but no obsoletion reason is given",
                    OBSOLETE_PREFIX.trim_end()
                ),
            )
            .with_field("preferred label"),
        ),
        None => {}
        Some(dep) => {
            if !reasons.contains(&dep.reason.as_str()) {
                out.push(
                    Violation::violation(
                        ViolationKind::Deprecation,
                        iri,
                        "unknown obsoletion reason",
                    )
                    .with_field("obsoletion reason")
                    .with_value(&dep.reason),
                );
            }
            if dep.replaced_by.as_deref() == Some(iri) {
                out.push(
                    Violation::violation(
                        ViolationKind::Deprecation,
                        iri,
                        "an entity cannot be replaced by itself",
                    )
                    .with_field("replaced by"),
                );
            }
            if !marked {
                out.push(
                    Violation::warning(
                        ViolationKind::Deprecation,
                        iri,
                        format!(
                            "deprecated entity label should start with \"{}\"",
                            OBSOLETE_PREFIX.trim_end()
                        ),
                    )
                    .with_field("preferred label"),
                );
            }
        }
    }
    out
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::tests::sample_context;
    use crate::validate::Severity;

    pub(crate) const VOC: &str = "https://example.org/myvocab_";

    pub(crate) fn concept(id: u64, label: &str, parents: &[u64]) -> Concept {
        Concept {
            iri: format!("{}{:07}", VOC, id),
            pref_labels: [("en".to_string(), label.to_string())].into(),
            definitions: [("en".to_string(), format!("Definition of {}", label))].into(),
            parents: parents.iter().map(|p| format!("{}{:07}", VOC, p)).collect(),
            ..Default::default()
        }
    }

    pub(crate) fn sample_model() -> Model {
        let mut model = Model {
            scheme: ConceptScheme {
                iri: "https://example.org/myvocab/".into(),
                titles: [("en".to_string(), "T".to_string())].into(),
                definitions: [("en".to_string(), "A test vocabulary".to_string())].into(),
                created: Some("2024-01-15".into()),
                creators: vec![Agent::parse_line("Jane Doe https://orcid.org/0000-0002-1825-0097")],
                publishers: vec![Agent::parse_line("Example Org https://example.org")],
                ..Default::default()
            },
            ..Default::default()
        };
        for c in [concept(1, "Animal", &[]), concept(2, "Cat", &[1]), concept(3, "Dog", &[1])] {
            model.concepts.insert(c.iri.clone(), c);
        }
        let pets = Collection {
            iri: format!("{}{:07}", VOC, 10),
            pref_labels: [("en".to_string(), "Pets".to_string())].into(),
            definitions: [("en".to_string(), "Animals kept at home".to_string())].into(),
            members: vec![format!("{}{:07}", VOC, 2), format!("{}{:07}", VOC, 3)],
            ..Default::default()
        };
        model.collections.insert(pets.iri.clone(), pets);
        model
    }

    fn kinds(violations: &[Violation], min: Severity) -> Vec<ViolationKind> {
        violations
            .iter()
            .filter(|v| v.severity >= min)
            .map(|v| v.kind)
            .collect()
    }

    #[test]
    fn test_agent_parse_line() {
        let agent = Agent::parse_line("Jane Doe https://orcid.org/0000-0002-1825-0097");
        assert_eq!(agent.name, "Jane Doe");
        assert_eq!(
            agent.iri.as_deref(),
            Some("https://orcid.org/0000-0002-1825-0097")
        );

        let agent = Agent::parse_line("Help Desk help@example.org");
        assert_eq!(agent.email.as_deref(), Some("help@example.org"));
        assert_eq!(agent.to_line(), "Help Desk help@example.org");

        let agent = Agent::parse_line("Just A Name");
        assert_eq!(agent, Agent { name: "Just A Name".into(), iri: None, email: None });

        let agent = Agent::parse_line("Jane 0000-0002-1825-0097");
        assert_eq!(
            agent.iri.as_deref(),
            Some("https://orcid.org/0000-0002-1825-0097")
        );
    }

    #[test]
    fn test_sample_model_is_valid() {
        let ctx = sample_context();
        let violations = sample_model().validate_invariants(&ctx);
        assert!(
            kinds(&violations, Severity::Warning).is_empty(),
            "{:?}",
            violations
        );
    }

    #[test]
    fn test_cycle_violation() {
        let ctx = sample_context();
        let mut model = sample_model();
        let animal = format!("{}{:07}", VOC, 1);
        let cat = format!("{}{:07}", VOC, 2);
        model.concepts.get_mut(&animal).unwrap().parents.push(cat);
        let violations = model.validate_invariants(&ctx);
        assert!(kinds(&violations, Severity::Violation).contains(&ViolationKind::Cycle));
    }

    #[test]
    fn test_empty_collection_and_duplicates() {
        let ctx = sample_context();
        let mut model = sample_model();
        let pets = format!("{}{:07}", VOC, 10);
        model.collections.get_mut(&pets).unwrap().members.clear();
        let cat = model.concepts[&format!("{}{:07}", VOC, 2)].clone();
        model.collections.insert(
            cat.iri.clone(),
            Collection {
                iri: cat.iri.clone(),
                pref_labels: cat.pref_labels.clone(),
                definitions: cat.definitions.clone(),
                members: vec![format!("{}{:07}", VOC, 3)],
                ..Default::default()
            },
        );
        let found = kinds(&model.validate_invariants(&ctx), Severity::Violation);
        assert!(found.contains(&ViolationKind::EmptyCollection));
        assert!(found.contains(&ViolationKind::DuplicateIri));
    }

    #[test]
    fn test_wrong_width_id() {
        let ctx = sample_context();
        let mut model = sample_model();
        let bad = concept(0, "Bad", &[]);
        let iri = format!("{}00012345", VOC);
        model.concepts.insert(iri.clone(), Concept { iri, ..bad });
        let violations = model.validate_invariants(&ctx);
        let width = violations
            .iter()
            .find(|v| v.kind == ViolationKind::IdWidth)
            .unwrap();
        assert_eq!(width.value.as_deref(), Some("00012345"));
    }

    #[test]
    fn test_placeholder_is_info() {
        let ctx = sample_context();
        let mut model = sample_model();
        let iri = format!("{}horse", VOC);
        model
            .concepts
            .insert(iri.clone(), Concept { iri, ..concept(0, "Horse", &[1]) });
        let violations = model.validate_invariants(&ctx);
        assert!(kinds(&violations, Severity::Warning).is_empty());
        assert!(kinds(&violations, Severity::Info).contains(&ViolationKind::Placeholder));
    }

    #[test]
    fn test_provenance_exclusive() {
        let ctx = sample_context();
        let mut model = sample_model();
        let cat = model.concepts.get_mut(&format!("{}{:07}", VOC, 2)).unwrap();
        cat.source.source = Some("https://other.org/voc".into());
        cat.source.influenced_by = vec!["https://other.org/paper".into()];
        let found = kinds(&model.validate_invariants(&ctx), Severity::Violation);
        assert_eq!(found, vec![ViolationKind::Provenance]);
    }

    #[test]
    fn test_deprecation_rules() {
        let ctx = sample_context();
        let mut model = sample_model();
        let cat = model.concepts.get_mut(&format!("{}{:07}", VOC, 2)).unwrap();
        cat.pref_labels.insert("en".into(), "OBSOLETE Cat".into());
        let found = kinds(&model.validate_invariants(&ctx), Severity::Violation);
        assert_eq!(found, vec![ViolationKind::Deprecation]);

        let cat = model.concepts.get_mut(&format!("{}{:07}", VOC, 2)).unwrap();
        cat.deprecation = Some(Deprecation {
            reason: CONCEPT_OBSOLETION_REASONS[1].to_string(),
            replaced_by: Some(format!("{}{:07}", VOC, 3)),
        });
        assert!(kinds(&model.validate_invariants(&ctx), Severity::Warning).is_empty());
    }

    #[test]
    fn test_dangling_parent() {
        let ctx = sample_context();
        let mut model = sample_model();
        let cat = model.concepts.get_mut(&format!("{}{:07}", VOC, 2)).unwrap();
        cat.parents.push(format!("{}{:07}", VOC, 99));
        cat.parents.push("https://other.org/animal".into());
        let violations = model.validate_invariants(&ctx);
        let dangling: Vec<_> = violations
            .iter()
            .filter(|v| v.kind == ViolationKind::DanglingReference)
            .collect();
        assert_eq!(dangling.len(), 1);
        assert!(dangling[0].value.as_deref().unwrap().ends_with("0000099"));
    }

    #[test]
    fn test_apply_config_metadata_config_wins_graph_fills_gaps() {
        let ctx = sample_context();
        let mut model = sample_model();
        model.scheme.titles.insert("en".into(), "Old title".into());
        model.scheme.titles.insert("de".into(), "Alter Titel".into());
        model.scheme.custodians = vec![Agent::parse_line("Keeper keeper@example.org")];
        model.scheme.license = Some("https://old.example.org/license".into());

        model.apply_config_metadata(&ctx);

        assert_eq!(model.scheme.titles["en"], "My Vocabulary");
        assert_eq!(model.scheme.titles["de"], "Alter Titel");
        assert_eq!(
            model.scheme.license.as_deref(),
            Some("https://creativecommons.org/licenses/by/4.0/")
        );
        // not configured, so the graph value survives
        assert_eq!(model.scheme.custodians.len(), 1);
        assert_eq!(model.scheme.iri, "https://example.org/myvocab/");
        // IDs 1..3 and 10 fall into jdoe's range
        assert_eq!(model.scheme.contributors.len(), 1);
        assert_eq!(model.scheme.contributors[0].name, "jdoe");
    }

    #[test]
    fn test_apply_config_sets_provenance_urls() {
        let ctx = sample_context();
        let mut model = sample_model();
        model.apply_config_metadata(&ctx);
        let cat = &model.concepts[&format!("{}{:07}", VOC, 2)];
        assert_eq!(
            cat.provenance_url.as_deref(),
            Some("https://github.com/example/myvocab/blame/main/vocabularies/myvocab/0000002.ttl")
        );
    }
}
