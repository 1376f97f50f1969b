//! Graph to model extraction
//!
//! Every triple the model has a field for is marked as consumed; whatever is
//! left over travels along in [`Model::extra`] so nothing is lost on a round
//! trip.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::config::VocabContext;
use crate::error::VocabError;
use crate::graph::{Graph, Literal, Term, Triple};
use crate::model::{
    Agent, Collection, Concept, ConceptScheme, Deprecation, LangMap, Mappings, Model,
    SourceProvenance,
};
use crate::validate::{Violation, ViolationKind};
use crate::vocab::*;

/// Build the typed model of the single concept scheme in `graph`
pub fn from_graph(
    graph: &Graph,
    ctx: &VocabContext,
    source_name: &str,
) -> Result<Model, VocabError> {
    let schemes: Vec<Term> = graph
        .instances_of(SKOS_CONCEPT_SCHEME)
        .into_iter()
        .filter(|s| s.as_iri().is_some())
        .collect();
    let scheme = match schemes.as_slice() {
        [one] => one.clone(),
        [] => return Err(VocabError::parse(source_name, "no skos:ConceptScheme found")),
        many => {
            let names: Vec<String> = many.iter().map(Term::to_string).collect();
            return Err(VocabError::parse(
                source_name,
                format!("expected exactly one skos:ConceptScheme, found {}", names.join(", ")),
            ));
        }
    };

    let mut extractor = Extractor {
        graph,
        default_lang: ctx.default_language().to_string(),
        consumed: BTreeSet::new(),
        issues: Vec::new(),
    };

    let mut model = Model {
        scheme: extractor.scheme(&scheme),
        ..Default::default()
    };

    let concepts: BTreeSet<Term> = graph.instances_of(SKOS_CONCEPT);
    for term in concepts.iter().filter(|t| t.as_iri().is_some()) {
        let concept = extractor.concept(term, &scheme);
        model.concepts.insert(concept.iri.clone(), concept);
    }
    extractor.inverse_narrower(&mut model, &concepts);

    let mut collections = graph.instances_of(SKOS_COLLECTION);
    collections.extend(graph.instances_of(SKOS_ORDERED_COLLECTION));
    for term in collections.iter().filter(|t| t.as_iri().is_some()) {
        let collection = extractor.collection(term, &scheme);
        model.collections.insert(collection.iri.clone(), collection);
    }

    model.extra = graph
        .iter()
        .filter(|t| !extractor.consumed.contains(*t))
        .cloned()
        .collect();
    model.load_issues = extractor.issues;
    debug!(
        "Extracted {} concepts, {} collections and {} extra triples from {}",
        model.concepts.len(),
        model.collections.len(),
        model.extra.len(),
        source_name
    );
    Ok(model)
}

struct Extractor<'a> {
    graph: &'a Graph,
    default_lang: String,
    consumed: BTreeSet<Triple>,
    issues: Vec<Violation>,
}

impl<'a> Extractor<'a> {
    fn consume(&mut self, s: &Term, p: &str, o: &Term) {
        self.consumed.insert(Triple::new(s.clone(), p, o.clone()));
    }

    /// All objects of `s p`, consumed
    fn take(&mut self, s: &Term, p: &str) -> Vec<Term> {
        let objects: Vec<Term> = self.graph.objects(s, p).cloned().collect();
        for o in &objects {
            self.consume(s, p, o);
        }
        objects
    }

    /// IRI objects only; literals stay in the extra triples
    fn iris(&mut self, s: &Term, p: &str) -> Vec<String> {
        let iris: Vec<String> = self
            .graph
            .objects(s, p)
            .filter_map(Term::as_iri)
            .map(str::to_string)
            .collect();
        for iri in &iris {
            self.consume(s, p, &Term::iri(iri.as_str()));
        }
        iris
    }

    /// A single text value, preferring the default language
    fn text(&mut self, s: &Term, p: &str) -> Option<String> {
        self.literal(s, p).map(|l| l.value)
    }

    /// A note; the model holds one language per note, so notes in another
    /// language are reported before they get re-tagged on output
    fn note(&mut self, s: &Term, p: &str, field: &str) -> Option<String> {
        let literal = self.literal(s, p)?;
        if let Some(lang) = literal
            .lang
            .as_deref()
            .filter(|lang| *lang != self.default_lang)
        {
            warn!(
                "{} of {} is in \"{}\" and will be written as \"{}\"",
                field, s, lang, self.default_lang
            );
            self.issues.push(
                Violation::warning(
                    ViolationKind::InvalidValue,
                    s.to_string(),
                    format!(
                        "{} in language \"{}\" is written back in \"{}\"",
                        field, lang, self.default_lang
                    ),
                )
                .with_field(field)
                .with_value(literal.value.clone()),
            );
        }
        Some(literal.value)
    }

    fn literal(&mut self, s: &Term, p: &str) -> Option<Literal> {
        let literals: Vec<&Term> = self
            .graph
            .objects(s, p)
            .filter(|o| o.as_literal().is_some())
            .collect();
        let chosen = literals
            .iter()
            .find(|o| {
                o.as_literal()
                    .is_some_and(|l| l.lang.as_deref() == Some(self.default_lang.as_str()))
            })
            .or_else(|| literals.first())
            .copied()?
            .clone();
        self.consume(s, p, &chosen);
        chosen.as_literal().cloned()
    }

    /// A single IRI or literal value, as text
    fn value(&mut self, s: &Term, p: &str) -> Option<String> {
        let object = self.graph.object(s, p)?.clone();
        let text = match &object {
            Term::Iri(iri) => iri.clone(),
            Term::Literal(l) => l.value.clone(),
            Term::Blank(_) => return None,
        };
        self.consume(s, p, &object);
        Some(text)
    }

    fn lang_of(&self, term: &Term) -> Option<(String, String)> {
        let lit = term.as_literal()?;
        let lang = lit.lang.clone().unwrap_or_else(|| self.default_lang.clone());
        Some((lang, lit.value.clone()))
    }

    /// One value per language; extra values are reported
    fn lang_map(&mut self, s: &Term, p: &str, field: &str) -> LangMap<String> {
        let mut map = LangMap::new();
        for o in self.take(s, p) {
            let Some((lang, value)) = self.lang_of(&o) else {
                continue;
            };
            if map.contains_key(&lang) {
                self.issues.push(
                    Violation::violation(
                        ViolationKind::DuplicateLanguage,
                        s.to_string(),
                        format!("more than one {} in language \"{}\"", field, lang),
                    )
                    .with_field(field)
                    .with_value(value),
                );
                continue;
            }
            map.insert(lang, value);
        }
        map
    }

    fn lang_lists(&mut self, s: &Term, p: &str) -> LangMap<Vec<String>> {
        let mut map: LangMap<Vec<String>> = LangMap::new();
        for o in self.take(s, p) {
            if let Some((lang, value)) = self.lang_of(&o) {
                map.entry(lang).or_default().push(value);
            }
        }
        map
    }

    fn agents(&mut self, s: &Term, p: &str) -> Vec<Agent> {
        let mut agents = Vec::new();
        for o in self.take(s, p) {
            let agent = match &o {
                Term::Literal(l) => Agent::parse_line(&l.value),
                Term::Iri(iri) if iri.starts_with("mailto:") => {
                    let email = iri.trim_start_matches("mailto:").to_string();
                    Agent {
                        name: email.clone(),
                        iri: None,
                        email: Some(email),
                    }
                }
                Term::Iri(iri) => {
                    let name = self.text(&o, SCHEMA_NAME).unwrap_or_else(|| iri.clone());
                    let email = self.value(&o, SCHEMA_EMAIL).map(strip_mailto);
                    self.consume(&o, SCHEMA_URL, &o);
                    Agent {
                        name,
                        iri: Some(iri.clone()),
                        email,
                    }
                }
                Term::Blank(_) => {
                    let name = self.text(&o, SCHEMA_NAME).unwrap_or_default();
                    let iri = self.value(&o, SCHEMA_URL);
                    let email = self.value(&o, SCHEMA_EMAIL).map(strip_mailto);
                    Agent { name, iri, email }
                }
            };
            agents.push(agent);
        }
        agents
    }

    fn scheme(&mut self, s: &Term) -> ConceptScheme {
        self.consume(s, RDF_TYPE, &Term::iri(SKOS_CONCEPT_SCHEME));
        let mut definitions = self.lang_map(s, SKOS_DEFINITION, "definition");
        if definitions.is_empty() {
            definitions = self.lang_map(s, DCT_DESCRIPTION, "description");
        }
        // recomputed from the concepts on output
        self.take(s, SKOS_HAS_TOP_CONCEPT);

        ConceptScheme {
            iri: s.as_iri().unwrap_or_default().to_string(),
            titles: self.lang_map(s, DCT_TITLE, "title"),
            definitions,
            created: self.value(s, DCT_CREATED),
            modified: self.value(s, DCT_MODIFIED),
            creators: self.agents(s, DCT_CREATOR),
            contributors: self.agents(s, DCT_CONTRIBUTOR),
            publishers: self.agents(s, DCT_PUBLISHER),
            custodians: self.agents(s, SCHEMA_MAINTAINER),
            license: self.value(s, DCT_LICENSE),
            homepage: self.value(s, DCAT_LANDING_PAGE),
            conforms_to: self.value(s, DCT_CONFORMS_TO),
            version: self.value(s, OWL_VERSION_INFO),
            history_note: self.note(s, SKOS_HISTORY_NOTE, "history note"),
            catalogue_pid: self.value(s, RDFS_SEE_ALSO),
            repository: self.value(s, SCHEMA_CODE_REPOSITORY),
        }
    }

    fn deprecation(&mut self, s: &Term) -> Option<Deprecation> {
        let flag = Term::Literal(Literal::boolean(true));
        if !self
            .graph
            .contains(&Triple::new(s.clone(), OWL_DEPRECATED, flag.clone()))
        {
            return None;
        }
        self.consume(s, OWL_DEPRECATED, &flag);
        Some(Deprecation {
            reason: self.text(s, SKOS_HISTORY_NOTE).unwrap_or_default(),
            replaced_by: self.iris(s, DCT_IS_REPLACED_BY).into_iter().next(),
        })
    }

    /// dct:provenance IRI, with its rdfs:seeAlso twin
    fn provenance_url(&mut self, s: &Term) -> Option<String> {
        let url = self.iris(s, DCT_PROVENANCE).into_iter().next()?;
        let twin = Term::iri(url.as_str());
        if self
            .graph
            .contains(&Triple::new(s.clone(), RDFS_SEE_ALSO, twin.clone()))
        {
            self.consume(s, RDFS_SEE_ALSO, &twin);
        }
        Some(url)
    }

    /// Scheme membership triples are rebuilt on output
    fn scheme_links(&mut self, s: &Term, scheme: &Term) {
        for p in [SKOS_IN_SCHEME, SKOS_TOP_CONCEPT_OF] {
            if self
                .graph
                .contains(&Triple::new(s.clone(), p, scheme.clone()))
            {
                self.consume(s, p, scheme);
            }
        }
    }

    fn concept(&mut self, s: &Term, scheme: &Term) -> Concept {
        self.consume(s, RDF_TYPE, &Term::iri(SKOS_CONCEPT));
        self.scheme_links(s, scheme);
        let deprecation = self.deprecation(s);
        let source = SourceProvenance {
            source: self.iris(s, PROV_HAD_PRIMARY_SOURCE).into_iter().next(),
            license: self.value(s, DCT_LICENSE),
            rights_holder: self.value(s, DCT_RIGHTS_HOLDER),
            influenced_by: self.iris(s, PROV_WAS_INFLUENCED_BY),
        };
        Concept {
            iri: s.as_iri().unwrap_or_default().to_string(),
            pref_labels: self.lang_map(s, SKOS_PREF_LABEL, "preferred label"),
            alt_labels: self.lang_lists(s, SKOS_ALT_LABEL),
            definitions: self.lang_map(s, SKOS_DEFINITION, "definition"),
            parents: self.iris(s, SKOS_BROADER),
            change_note: self.note(s, SKOS_CHANGE_NOTE, "change note"),
            editorial_note: self.note(s, SKOS_EDITORIAL_NOTE, "editorial note"),
            source,
            deprecation,
            mappings: Mappings {
                related: self.iris(s, SKOS_RELATED_MATCH),
                close: self.iris(s, SKOS_CLOSE_MATCH),
                exact: self.iris(s, SKOS_EXACT_MATCH),
                narrow: self.iris(s, SKOS_NARROW_MATCH),
                broad: self.iris(s, SKOS_BROAD_MATCH),
            },
            provenance_url: self.provenance_url(s),
        }
    }

    /// `b skos:narrower a` among concepts means `a` has parent `b`
    fn inverse_narrower(&mut self, model: &mut Model, concepts: &BTreeSet<Term>) {
        for parent in concepts {
            for child in self.iris(parent, SKOS_NARROWER) {
                let Some(concept) = model.concepts.get_mut(&child) else {
                    continue;
                };
                let parent_iri = parent.as_iri().unwrap_or_default().to_string();
                if !concept.parents.contains(&parent_iri) {
                    concept.parents.push(parent_iri);
                }
            }
        }
    }

    fn collection(&mut self, s: &Term, scheme: &Term) -> Collection {
        self.consume(s, RDF_TYPE, &Term::iri(SKOS_COLLECTION));
        let ordered_type = Term::iri(SKOS_ORDERED_COLLECTION);
        let ordered = self
            .graph
            .contains(&Triple::new(s.clone(), RDF_TYPE, ordered_type.clone()));
        if ordered {
            self.consume(s, RDF_TYPE, &ordered_type);
        }
        self.scheme_links(s, scheme);
        let deprecation = self.deprecation(s);

        let mut members = self.iris(s, SKOS_MEMBER);
        if ordered {
            if let Some(list) = self.member_list(s) {
                members = list;
            }
        } else {
            members.sort();
        }
        Collection {
            iri: s.as_iri().unwrap_or_default().to_string(),
            pref_labels: self.lang_map(s, SKOS_PREF_LABEL, "preferred label"),
            definitions: self.lang_map(s, SKOS_DEFINITION, "definition"),
            members,
            ordered,
            change_note: self.note(s, SKOS_CHANGE_NOTE, "change note"),
            editorial_note: self.note(s, SKOS_EDITORIAL_NOTE, "editorial note"),
            deprecation,
            provenance_url: self.provenance_url(s),
        }
    }

    /// Items of the skos:memberList, consuming its cells
    fn member_list(&mut self, s: &Term) -> Option<Vec<String>> {
        let head = self.graph.object(s, SKOS_MEMBER_LIST)?.clone();
        let items = self.graph.list_items(&head)?;
        self.consume(s, SKOS_MEMBER_LIST, &head);
        let nil = Term::iri(RDF_NIL);
        let mut cell = head;
        while cell != nil {
            self.take(&cell, RDF_FIRST);
            let Some(rest) = self.take(&cell, RDF_REST).into_iter().next() else {
                break;
            };
            cell = rest;
        }
        Some(
            items
                .iter()
                .filter_map(Term::as_iri)
                .map(str::to_string)
                .collect(),
        )
    }
}

fn strip_mailto(value: String) -> String {
    value.trim_start_matches("mailto:").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample_context;
    use crate::turtle;

    const DOC: &str = r#"
@prefix skos: <http://www.w3.org/2004/02/skos/core#> .
@prefix dcterms: <http://purl.org/dc/terms/> .
@prefix schema: <https://schema.org/> .
@prefix ex: <https://example.org/myvocab_> .
@prefix owl: <http://www.w3.org/2002/07/owl#> .

<https://example.org/myvocab/> a skos:ConceptScheme ;
    dcterms:title "My Vocabulary"@en ;
    skos:definition "Test"@en ;
    dcterms:creator <https://orcid.org/0000-0002-1825-0097> ;
    dcterms:publisher "Example Org https://example.org" ;
    skos:hasTopConcept ex:0000001 .

<https://orcid.org/0000-0002-1825-0097> schema:name "Jane Doe" .

ex:0000001 a skos:Concept ;
    skos:prefLabel "Animal"@en, "Tier"@de ;
    skos:definition "A living thing" ;
    skos:narrower ex:0000002 ;
    skos:inScheme <https://example.org/myvocab/> .

ex:0000002 a skos:Concept ;
    skos:prefLabel "Cat"@en, "Kitty"@en ;
    skos:altLabel "Puss"@en, "Moggy"@en ;
    skos:definition "A cat"@en ;
    owl:deprecated true ;
    skos:historyNote "Unclear" ;
    skos:exactMatch <https://other.org/cat> ;
    ex:custom "kept" .

ex:0000010 a skos:OrderedCollection ;
    skos:prefLabel "Pets"@en ;
    skos:definition "Pets"@en ;
    skos:memberList ( ex:0000002 ex:0000001 ) .
"#;

    fn load() -> Model {
        let graph = turtle::parse(DOC, "doc.ttl").unwrap();
        from_graph(&graph, &sample_context(), "doc.ttl").unwrap()
    }

    #[test]
    fn test_scheme_fields() {
        let model = load();
        assert_eq!(model.scheme.iri, "https://example.org/myvocab/");
        assert_eq!(model.scheme.titles["en"], "My Vocabulary");
        assert_eq!(model.scheme.creators[0].name, "Jane Doe");
        assert_eq!(
            model.scheme.publishers[0].iri.as_deref(),
            Some("https://example.org")
        );
    }

    #[test]
    fn test_untagged_literal_takes_default_language() {
        let model = load();
        let animal = &model.concepts["https://example.org/myvocab_0000001"];
        assert_eq!(animal.definitions["en"], "A living thing");
        assert_eq!(animal.pref_labels["de"], "Tier");
    }

    #[test]
    fn test_narrower_becomes_parent() {
        let model = load();
        let cat = &model.concepts["https://example.org/myvocab_0000002"];
        assert_eq!(cat.parents, vec!["https://example.org/myvocab_0000001"]);
    }

    #[test]
    fn test_duplicate_language_is_reported() {
        let model = load();
        assert_eq!(model.load_issues.len(), 1);
        assert_eq!(model.load_issues[0].kind, ViolationKind::DuplicateLanguage);
    }

    #[test]
    fn test_deprecation_and_mappings() {
        let model = load();
        let cat = &model.concepts["https://example.org/myvocab_0000002"];
        assert_eq!(cat.deprecation.as_ref().unwrap().reason, "Unclear");
        assert_eq!(cat.mappings.exact, vec!["https://other.org/cat"]);
        assert_eq!(cat.alt_labels["en"], vec!["Moggy", "Puss"]);
    }

    #[test]
    fn test_ordered_members_keep_order() {
        let model = load();
        let pets = &model.collections["https://example.org/myvocab_0000010"];
        assert!(pets.ordered);
        assert_eq!(
            pets.members,
            vec![
                "https://example.org/myvocab_0000002",
                "https://example.org/myvocab_0000001"
            ]
        );
    }

    #[test]
    fn test_unknown_triples_are_kept() {
        let model = load();
        assert_eq!(model.extra.len(), 1);
        let t = model.extra.iter().next().unwrap();
        assert_eq!(t.predicate, "https://example.org/myvocab_custom");
    }

    #[test]
    fn test_note_in_other_language_is_reported() {
        let doc = r#"
@prefix skos: <http://www.w3.org/2004/02/skos/core#> .

<https://example.org/myvocab/> a skos:ConceptScheme .

<https://example.org/myvocab_0000001> a skos:Concept ;
    skos:prefLabel "Animal"@en ;
    skos:changeNote "Neu angelegt"@de ;
    skos:editorialNote "Checked"@en .
"#;
        let graph = turtle::parse(doc, "notes.ttl").unwrap();
        let model = from_graph(&graph, &sample_context(), "notes.ttl").unwrap();
        let animal = &model.concepts["https://example.org/myvocab_0000001"];
        assert_eq!(animal.change_note.as_deref(), Some("Neu angelegt"));
        assert_eq!(animal.editorial_note.as_deref(), Some("Checked"));

        assert_eq!(model.load_issues.len(), 1);
        let issue = &model.load_issues[0];
        assert_eq!(issue.severity, crate::validate::Severity::Warning);
        assert_eq!(issue.field.as_deref(), Some("change note"));
        assert_eq!(issue.value.as_deref(), Some("Neu angelegt"));
    }

    #[test]
    fn test_requires_one_scheme() {
        let graph = turtle::parse(
            "<https://e.org/a> a <http://www.w3.org/2004/02/skos/core#Concept> .",
            "x.ttl",
        )
        .unwrap();
        assert!(matches!(
            from_graph(&graph, &sample_context(), "x.ttl"),
            Err(VocabError::Parse { .. })
        ));
    }
}
