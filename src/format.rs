//! Source format adapters
//!
//! Older vocabularies stored change notes as literal `dct:provenance` and the
//! source vocabulary as `rdfs:isDefinedBy`. The adapter for the current format
//! rejects those shapes instead of guessing.

use std::str::FromStr;

use tracing::info;

use crate::error::VocabError;
use crate::graph::{Graph, Term, Triple};
use crate::vocab::{
    DCT_PROVENANCE, PROV_HAD_PRIMARY_SOURCE, RDFS_IS_DEFINED_BY, SKOS_CHANGE_NOTE, SKOS_COLLECTION,
    SKOS_CONCEPT, SKOS_ORDERED_COLLECTION,
};

/// Era of the Turtle being read, chosen once per run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceFormat {
    #[default]
    Current,
    Legacy,
}

impl FromStr for SourceFormat {
    type Err = VocabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "current" | "strict" => Ok(SourceFormat::Current),
            "legacy" => Ok(SourceFormat::Legacy),
            other => Err(VocabError::InvalidArgument(format!(
                "unknown source format \"{}\", expected \"current\" or \"legacy\"",
                other
            ))),
        }
    }
}

impl SourceFormat {
    /// Bring a parsed graph into the current shape
    pub fn adapt(self, graph: Graph, source_name: &str) -> Result<Graph, VocabError> {
        match self {
            SourceFormat::Current => {
                if let Some(t) = legacy_provenance(&graph).next() {
                    return Err(VocabError::parse(
                        source_name,
                        format!(
                            "{} has a literal dct:provenance; \
                             this is the legacy format, convert with legacy mode enabled",
                            t.subject
                        ),
                    ));
                }
                Ok(graph)
            }
            SourceFormat::Legacy => Ok(upgrade(graph)),
        }
    }
}

fn is_entity(graph: &Graph, subject: &Term) -> bool {
    graph.has_type(subject, SKOS_CONCEPT)
        || graph.has_type(subject, SKOS_COLLECTION)
        || graph.has_type(subject, SKOS_ORDERED_COLLECTION)
}

/// Literal `dct:provenance` on concepts and collections
fn legacy_provenance(graph: &Graph) -> impl Iterator<Item = &Triple> {
    graph.iter().filter(move |t| {
        t.predicate == DCT_PROVENANCE
            && t.object.as_literal().is_some()
            && is_entity(graph, &t.subject)
    })
}

fn upgrade(graph: Graph) -> Graph {
    let mut rewritten = Vec::new();
    for t in legacy_provenance(&graph) {
        rewritten.push((t.clone(), Triple::new(t.subject.clone(), SKOS_CHANGE_NOTE, t.object.clone())));
    }
    for t in graph.iter().filter(|t| t.predicate == RDFS_IS_DEFINED_BY) {
        if is_entity(&graph, &t.subject) {
            rewritten.push((
                t.clone(),
                Triple::new(t.subject.clone(), PROV_HAD_PRIMARY_SOURCE, t.object.clone()),
            ));
        }
    }
    if rewritten.is_empty() {
        return graph;
    }

    info!("Upgraded {} legacy triples", rewritten.len());
    let mut graph = graph;
    for (old, new) in rewritten {
        graph.remove(&old);
        graph.insert(new);
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Literal;
    use crate::vocab::RDF_TYPE;

    fn legacy_graph() -> Graph {
        let mut g = Graph::new();
        let c = Term::iri("https://example.org/voc_0000001");
        g.add(c.clone(), RDF_TYPE, Term::iri(SKOS_CONCEPT));
        g.add(c.clone(), DCT_PROVENANCE, Term::Literal(Literal::lang("Added in 2020", "en")));
        g.add(c, RDFS_IS_DEFINED_BY, Term::iri("https://other.org/voc"));
        g
    }

    #[test]
    fn test_current_rejects_literal_provenance() {
        let err = SourceFormat::Current
            .adapt(legacy_graph(), "voc.ttl")
            .unwrap_err();
        assert!(err.to_string().contains("legacy"));
    }

    #[test]
    fn test_legacy_upgrades() {
        let g = SourceFormat::Legacy.adapt(legacy_graph(), "voc.ttl").unwrap();
        let c = Term::iri("https://example.org/voc_0000001");
        assert!(g.object(&c, DCT_PROVENANCE).is_none());
        assert!(g.object(&c, RDFS_IS_DEFINED_BY).is_none());
        assert_eq!(
            g.object(&c, SKOS_CHANGE_NOTE),
            Some(&Term::Literal(Literal::lang("Added in 2020", "en")))
        );
        assert_eq!(
            g.object(&c, PROV_HAD_PRIMARY_SOURCE),
            Some(&Term::iri("https://other.org/voc"))
        );
    }

    #[test]
    fn test_iri_provenance_is_current() {
        let mut g = Graph::new();
        let c = Term::iri("https://example.org/voc_0000001");
        g.add(c.clone(), RDF_TYPE, Term::iri(SKOS_CONCEPT));
        g.add(c, DCT_PROVENANCE, Term::iri("https://github.com/x/y/blame/main/a.ttl"));
        assert_eq!(SourceFormat::Current.adapt(g.clone(), "voc.ttl").unwrap(), g);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("Legacy".parse::<SourceFormat>().unwrap(), SourceFormat::Legacy);
        assert!("v2".parse::<SourceFormat>().is_err());
    }
}
