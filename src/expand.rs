//! Single-pass inference used before shape validation
//!
//! Adds the inverse SKOS relations and copies scheme-level provenance to
//! concepts that have none of their own. All rules read the input graph only,
//! so one pass is a fixpoint.

use tracing::debug;

use crate::graph::{Graph, Term, Triple};
use crate::vocab::{
    DCT_PROVENANCE, PROV_HAD_PRIMARY_SOURCE, PROV_WAS_DERIVED_FROM, PROV_WAS_INFLUENCED_BY,
    SKOS_BROADER, SKOS_CONCEPT, SKOS_CONCEPT_SCHEME, SKOS_HAS_TOP_CONCEPT, SKOS_HISTORY_NOTE,
    SKOS_NARROWER, SKOS_TOP_CONCEPT_OF,
};

const INVERSES: &[(&str, &str)] = &[
    (SKOS_BROADER, SKOS_NARROWER),
    (SKOS_NARROWER, SKOS_BROADER),
    (SKOS_HAS_TOP_CONCEPT, SKOS_TOP_CONCEPT_OF),
    (SKOS_TOP_CONCEPT_OF, SKOS_HAS_TOP_CONCEPT),
];

const PROVENANCE_PREDICATES: &[&str] = &[
    SKOS_HISTORY_NOTE,
    DCT_PROVENANCE,
    PROV_WAS_DERIVED_FROM,
    PROV_HAD_PRIMARY_SOURCE,
    PROV_WAS_INFLUENCED_BY,
];

/// Return `graph` with inferred triples added. The input is not modified.
pub fn expand(graph: &Graph) -> Graph {
    let mut inferred = Vec::new();

    for t in graph.iter() {
        let Some((_, inverse)) = INVERSES.iter().find(|(p, _)| *p == t.predicate) else {
            continue;
        };
        if t.object.as_literal().is_some() {
            continue;
        }
        inferred.push(Triple::new(t.object.clone(), *inverse, t.subject.clone()));
    }

    let schemes = graph.instances_of(SKOS_CONCEPT_SCHEME);
    let scheme_provenance: Vec<(&str, &Term)> = schemes
        .iter()
        .flat_map(|s| {
            [SKOS_HISTORY_NOTE, DCT_PROVENANCE]
                .into_iter()
                .flat_map(move |p| graph.objects(s, p).map(move |o| (p, o)))
        })
        .collect();
    if !scheme_provenance.is_empty() {
        for concept in graph.instances_of(SKOS_CONCEPT) {
            let has_own = graph
                .about(&concept)
                .any(|t| PROVENANCE_PREDICATES.contains(&t.predicate.as_str()));
            if has_own {
                continue;
            }
            for (predicate, value) in &scheme_provenance {
                inferred.push(Triple::new(concept.clone(), *predicate, (*value).clone()));
            }
        }
    }

    let mut expanded = graph.clone();
    let before = expanded.len();
    expanded.extend(inferred.into_iter().collect());
    debug!("Inference added {} triples", expanded.len() - before);
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Literal;
    use crate::vocab::RDF_TYPE;

    fn ex(local: &str) -> Term {
        Term::iri(format!("https://example.org/{}", local))
    }

    fn sample() -> Graph {
        let mut g = Graph::new();
        g.add(ex("scheme"), RDF_TYPE, Term::iri(SKOS_CONCEPT_SCHEME));
        g.add(
            ex("scheme"),
            SKOS_HISTORY_NOTE,
            Term::Literal(Literal::lang("Compiled by hand", "en")),
        );
        g.add(ex("scheme"), SKOS_HAS_TOP_CONCEPT, ex("a"));
        for c in ["a", "b", "c"] {
            g.add(ex(c), RDF_TYPE, Term::iri(SKOS_CONCEPT));
        }
        g.add(ex("b"), SKOS_BROADER, ex("a"));
        g.add(ex("c"), SKOS_BROADER, ex("a"));
        g.add(ex("c"), PROV_WAS_INFLUENCED_BY, ex("paper"));
        g
    }

    #[test]
    fn test_inverse_relations() {
        let g = expand(&sample());
        assert!(g.contains(&Triple::new(ex("a"), SKOS_NARROWER, ex("b"))));
        assert!(g.contains(&Triple::new(ex("a"), SKOS_TOP_CONCEPT_OF, ex("scheme"))));
    }

    #[test]
    fn test_scheme_provenance_copied_to_concepts_without_own() {
        let g = expand(&sample());
        assert!(g.object(&ex("a"), SKOS_HISTORY_NOTE).is_some());
        assert!(g.object(&ex("b"), SKOS_HISTORY_NOTE).is_some());
        assert!(g.object(&ex("c"), SKOS_HISTORY_NOTE).is_none());
    }

    #[test]
    fn test_idempotent() {
        let once = expand(&sample());
        let twice = expand(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_input_untouched() {
        let g = sample();
        let before = g.clone();
        let _ = expand(&g);
        assert_eq!(g, before);
    }
}
