//! Model to graph emission

use crate::cell::parse_date;
use crate::config::VocabContext;
use crate::graph::{Graph, Literal, Term};
use crate::iri::{classify_iri, IriKind};
use crate::model::{Agent, Collection, Concept, Deprecation, LangMap, Model};
use crate::vocab::*;

/// Build the graph of a model, including its extra triples
pub fn to_graph(model: &Model, ctx: &VocabContext) -> Graph {
    let mut emitter = Emitter {
        graph: Graph::new(),
        lang: ctx.default_language(),
        scheme: Term::iri(model.scheme.iri.as_str()),
    };
    emitter.scheme(model);

    let tops: Vec<String> = model.hierarchy().top_concepts();
    for concept in model.concepts.values() {
        let is_top = tops.binary_search(&concept.iri).is_ok();
        emitter.concept(model, concept, is_top);
    }
    for (index, collection) in model.collections.values().enumerate() {
        emitter.collection(collection, index);
    }

    let mut graph = emitter.graph;
    graph.extend(model.extra.clone());
    graph
}

struct Emitter<'a> {
    graph: Graph,
    lang: &'a str,
    scheme: Term,
}

impl Emitter<'_> {
    fn lang_literals(&mut self, s: &Term, p: &str, values: &LangMap<String>) {
        for (lang, value) in values {
            self.graph
                .add(s.clone(), p, Term::Literal(Literal::lang(value.as_str(), lang.as_str())));
        }
    }

    fn iris(&mut self, s: &Term, p: &str, iris: &[String]) {
        for iri in iris {
            self.graph.add(s.clone(), p, Term::iri(iri.as_str()));
        }
    }

    fn note(&mut self, s: &Term, p: &str, note: &Option<String>) {
        if let Some(note) = note {
            self.graph
                .add(s.clone(), p, Term::Literal(Literal::lang(note.as_str(), self.lang)));
        }
    }

    fn agents(&mut self, s: &Term, p: &str, agents: &[Agent]) {
        for agent in agents {
            let Some(iri) = &agent.iri else {
                self.graph
                    .add(s.clone(), p, Term::Literal(Literal::plain(agent.to_line())));
                continue;
            };
            let node = Term::iri(iri.as_str());
            self.graph.add(s.clone(), p, node.clone());
            if &agent.name != iri {
                self.graph.add(
                    node.clone(),
                    SCHEMA_NAME,
                    Term::Literal(Literal::plain(agent.name.as_str())),
                );
            }
            self.graph.add(node.clone(), SCHEMA_URL, node.clone());
            if let Some(email) = &agent.email {
                self.graph
                    .add(node, SCHEMA_EMAIL, Term::Literal(Literal::plain(email.as_str())));
            }
        }
    }

    fn scheme(&mut self, model: &Model) {
        let s = self.scheme.clone();
        let scheme = &model.scheme;
        self.graph.add(s.clone(), RDF_TYPE, Term::iri(SKOS_CONCEPT_SCHEME));
        self.lang_literals(&s, DCT_TITLE, &scheme.titles);
        self.lang_literals(&s, SKOS_DEFINITION, &scheme.definitions);
        for (p, date) in [(DCT_CREATED, &scheme.created), (DCT_MODIFIED, &scheme.modified)] {
            if let Some(date) = date {
                self.graph.add(s.clone(), p, date_literal(date));
            }
        }
        self.agents(&s, DCT_CREATOR, &scheme.creators);
        self.agents(&s, DCT_CONTRIBUTOR, &scheme.contributors);
        self.agents(&s, DCT_PUBLISHER, &scheme.publishers);
        self.agents(&s, SCHEMA_MAINTAINER, &scheme.custodians);

        let links = [
            (DCT_LICENSE, &scheme.license),
            (DCAT_LANDING_PAGE, &scheme.homepage),
            (DCT_CONFORMS_TO, &scheme.conforms_to),
            (RDFS_SEE_ALSO, &scheme.catalogue_pid),
            (SCHEMA_CODE_REPOSITORY, &scheme.repository),
        ];
        for (p, value) in links {
            if let Some(value) = value {
                self.graph.add(s.clone(), p, iri_or_literal(value));
            }
        }
        if let Some(version) = &scheme.version {
            self.graph
                .add(s.clone(), OWL_VERSION_INFO, Term::Literal(Literal::plain(version.as_str())));
        }
        self.note(&s, SKOS_HISTORY_NOTE, &scheme.history_note);
    }

    fn deprecation(&mut self, s: &Term, deprecation: &Option<Deprecation>) {
        let Some(dep) = deprecation else {
            return;
        };
        self.graph
            .add(s.clone(), OWL_DEPRECATED, Term::Literal(Literal::boolean(true)));
        if !dep.reason.is_empty() {
            self.graph.add(
                s.clone(),
                SKOS_HISTORY_NOTE,
                Term::Literal(Literal::plain(dep.reason.as_str())),
            );
        }
        if let Some(replacement) = &dep.replaced_by {
            self.graph
                .add(s.clone(), DCT_IS_REPLACED_BY, Term::iri(replacement.as_str()));
        }
    }

    fn provenance_url(&mut self, s: &Term, url: &Option<String>) {
        if let Some(url) = url {
            self.graph.add(s.clone(), DCT_PROVENANCE, Term::iri(url.as_str()));
            self.graph.add(s.clone(), RDFS_SEE_ALSO, Term::iri(url.as_str()));
        }
    }

    fn concept(&mut self, model: &Model, concept: &Concept, is_top: bool) {
        let s = Term::iri(concept.iri.as_str());
        let scheme = self.scheme.clone();
        self.graph.add(s.clone(), RDF_TYPE, Term::iri(SKOS_CONCEPT));
        self.graph.add(s.clone(), SKOS_IN_SCHEME, scheme.clone());
        if is_top {
            self.graph.add(s.clone(), SKOS_TOP_CONCEPT_OF, scheme.clone());
            self.graph.add(scheme, SKOS_HAS_TOP_CONCEPT, s.clone());
        }
        self.lang_literals(&s, SKOS_PREF_LABEL, &concept.pref_labels);
        for (lang, alts) in &concept.alt_labels {
            for alt in alts {
                self.graph.add(
                    s.clone(),
                    SKOS_ALT_LABEL,
                    Term::Literal(Literal::lang(alt.as_str(), lang.as_str())),
                );
            }
        }
        self.lang_literals(&s, SKOS_DEFINITION, &concept.definitions);

        for parent in &concept.parents {
            self.graph.add(s.clone(), SKOS_BROADER, Term::iri(parent.as_str()));
            if model.concepts.contains_key(parent) {
                self.graph.add(Term::iri(parent.as_str()), SKOS_NARROWER, s.clone());
            }
        }

        let m = &concept.mappings;
        self.iris(&s, SKOS_RELATED_MATCH, &m.related);
        self.iris(&s, SKOS_CLOSE_MATCH, &m.close);
        self.iris(&s, SKOS_EXACT_MATCH, &m.exact);
        self.iris(&s, SKOS_NARROW_MATCH, &m.narrow);
        self.iris(&s, SKOS_BROAD_MATCH, &m.broad);

        self.note(&s, SKOS_CHANGE_NOTE, &concept.change_note);
        self.note(&s, SKOS_EDITORIAL_NOTE, &concept.editorial_note);

        let src = &concept.source;
        if let Some(source) = &src.source {
            self.graph
                .add(s.clone(), PROV_HAD_PRIMARY_SOURCE, Term::iri(source.as_str()));
        }
        if let Some(license) = &src.license {
            self.graph.add(s.clone(), DCT_LICENSE, iri_or_literal(license));
        }
        if let Some(holder) = &src.rights_holder {
            self.graph.add(s.clone(), DCT_RIGHTS_HOLDER, iri_or_literal(holder));
        }
        self.iris(&s, PROV_WAS_INFLUENCED_BY, &src.influenced_by);

        self.deprecation(&s, &concept.deprecation);
        self.provenance_url(&s, &concept.provenance_url);
    }

    fn collection(&mut self, collection: &Collection, index: usize) {
        let s = Term::iri(collection.iri.as_str());
        self.graph.add(s.clone(), RDF_TYPE, Term::iri(SKOS_COLLECTION));
        if collection.ordered {
            self.graph
                .add(s.clone(), RDF_TYPE, Term::iri(SKOS_ORDERED_COLLECTION));
        }
        self.graph.add(s.clone(), SKOS_IN_SCHEME, self.scheme.clone());
        self.lang_literals(&s, SKOS_PREF_LABEL, &collection.pref_labels);
        self.lang_literals(&s, SKOS_DEFINITION, &collection.definitions);
        self.iris(&s, SKOS_MEMBER, &collection.members);

        if collection.ordered && !collection.members.is_empty() {
            let cells: Vec<Term> = (0..collection.members.len())
                .map(|i| Term::Blank(format!("c{}m{}", index, i)))
                .collect();
            self.graph.add(s.clone(), SKOS_MEMBER_LIST, cells[0].clone());
            for (i, member) in collection.members.iter().enumerate() {
                let rest = cells
                    .get(i + 1)
                    .cloned()
                    .unwrap_or_else(|| Term::iri(RDF_NIL));
                self.graph.add(cells[i].clone(), RDF_FIRST, Term::iri(member.as_str()));
                self.graph.add(cells[i].clone(), RDF_REST, rest);
            }
        }

        self.note(&s, SKOS_CHANGE_NOTE, &collection.change_note);
        self.note(&s, SKOS_EDITORIAL_NOTE, &collection.editorial_note);
        self.deprecation(&s, &collection.deprecation);
        self.provenance_url(&s, &collection.provenance_url);
    }
}

/// IRIs as nodes, anything else as a plain literal
fn iri_or_literal(value: &str) -> Term {
    match classify_iri(value) {
        IriKind::Absolute => Term::iri(value.trim_matches(['<', '>'])),
        _ => Term::Literal(Literal::plain(value)),
    }
}

/// Dates typed by precision: xsd:gYear, xsd:gYearMonth or xsd:date
fn date_literal(value: &str) -> Term {
    match parse_date(value) {
        Ok(date) => Term::Literal(Literal::typed(date.to_string(), date.datatype())),
        Err(_) => Term::Literal(Literal::plain(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample_context;
    use crate::graph::Triple;
    use crate::model::tests::{sample_model, VOC};
    use crate::model::Mappings;

    fn id(n: u64) -> String {
        format!("{}{:07}", VOC, n)
    }

    #[test]
    fn test_scheme_and_top_concepts() {
        let ctx = sample_context();
        let graph = to_graph(&sample_model(), &ctx);
        let scheme = Term::iri("https://example.org/myvocab/");
        let tops: Vec<&Term> = graph.objects(&scheme, SKOS_HAS_TOP_CONCEPT).collect();
        assert_eq!(tops, vec![&Term::iri(id(1))]);
        assert_eq!(
            graph.object(&scheme, DCT_CREATED),
            Some(&Term::Literal(Literal::typed("2024-01-15", XSD_DATE)))
        );
        assert!(graph.contains(&Triple::new(
            Term::iri(id(1)),
            SKOS_NARROWER,
            Term::iri(id(2))
        )));
        assert!(graph.contains(&Triple::new(
            Term::iri(id(1)),
            SKOS_TOP_CONCEPT_OF,
            scheme.clone()
        )));
        for child in [id(2), id(3)] {
            assert!(graph.object(&Term::iri(child), SKOS_TOP_CONCEPT_OF).is_none());
        }
    }

    #[test]
    fn test_agents() {
        let ctx = sample_context();
        let graph = to_graph(&sample_model(), &ctx);
        let jane = Term::iri("https://orcid.org/0000-0002-1825-0097");
        assert_eq!(
            graph.object(&jane, SCHEMA_NAME),
            Some(&Term::Literal(Literal::plain("Jane Doe")))
        );
    }

    #[test]
    fn test_round_trip_through_graph() {
        let ctx = sample_context();
        let mut model = sample_model();
        let cat = model.concepts.get_mut(&id(2)).unwrap();
        cat.alt_labels.insert("en".into(), vec!["Kitty".into()]);
        cat.mappings = Mappings {
            close: vec!["https://other.org/felis".into()],
            ..Default::default()
        };
        cat.change_note = Some("Split from animals".into());
        let pets = model.collections.get_mut(&id(10)).unwrap();
        pets.ordered = true;
        pets.members = vec![id(3), id(2)];

        let graph = to_graph(&model, &ctx);
        let back = crate::extract::from_graph(&graph, &ctx, "memory").unwrap();
        assert_eq!(back, model);
    }

    #[test]
    fn test_deprecation_triples() {
        let ctx = sample_context();
        let mut model = sample_model();
        model.concepts.get_mut(&id(3)).unwrap().deprecation = Some(Deprecation {
            reason: CONCEPT_OBSOLETION_REASONS[0].into(),
            replaced_by: Some(id(2)),
        });
        let graph = to_graph(&model, &ctx);
        let dog = Term::iri(id(3));
        assert_eq!(
            graph.object(&dog, OWL_DEPRECATED),
            Some(&Term::Literal(Literal::boolean(true)))
        );
        assert_eq!(graph.object(&dog, DCT_IS_REPLACED_BY), Some(&Term::iri(id(2))));
    }
}
