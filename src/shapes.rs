//! Structural shape profiles
//!
//! A [`ShapeSet`] is a list of node shapes, each targeting the instances of
//! one class and constraining the values of some properties. [`BuiltinShapes`]
//! evaluates them directly over a [`Graph`]. Other validators, for example one
//! backed by a full SHACL engine, plug in through [`ShapeValidator`].

use std::collections::BTreeMap;
use std::str::FromStr;

use tracing::debug;

use crate::error::VocabError;
use crate::graph::{Graph, Term};
use crate::iri::PrefixMap;
use crate::validate::{Severity, Violation, ViolationKind};
use crate::vocab::*;

/// Checks a graph against a set of shapes
pub trait ShapeValidator {
    /// Every result at least `min` severe
    fn validate(&self, graph: &Graph, shapes: &ShapeSet, min: Severity) -> Vec<Violation>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Iri,
    Literal,
}

/// Constraint on the values reached through one or more alternative paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyShape {
    /// Values of all listed predicates count together
    pub paths: &'static [&'static str],
    pub min_count: usize,
    pub max_count: Option<usize>,
    pub node_kind: Option<NodeKind>,
    /// At most one value per language tag
    pub unique_lang: bool,
    /// Allowed literal datatypes
    pub datatypes: Option<&'static [&'static str]>,
    pub severity: Severity,
}

impl PropertyShape {
    pub const fn new(paths: &'static [&'static str]) -> Self {
        PropertyShape {
            paths,
            min_count: 0,
            max_count: None,
            node_kind: None,
            unique_lang: false,
            datatypes: None,
            severity: Severity::Violation,
        }
    }

    pub const fn min(mut self, count: usize) -> Self {
        self.min_count = count;
        self
    }

    pub const fn max(mut self, count: usize) -> Self {
        self.max_count = Some(count);
        self
    }

    pub const fn iri(mut self) -> Self {
        self.node_kind = Some(NodeKind::Iri);
        self
    }

    pub const fn literal(mut self) -> Self {
        self.node_kind = Some(NodeKind::Literal);
        self
    }

    pub const fn unique_lang(mut self) -> Self {
        self.unique_lang = true;
        self
    }

    pub const fn datatypes(mut self, datatypes: &'static [&'static str]) -> Self {
        self.datatypes = Some(datatypes);
        self
    }

    pub const fn warning(mut self) -> Self {
        self.severity = Severity::Warning;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeShape {
    pub target_class: &'static str,
    pub properties: Vec<PropertyShape>,
}

/// A named shape profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeSet {
    pub name: String,
    pub shapes: Vec<NodeShape>,
    /// Require exactly one concept scheme in the graph
    pub single_scheme: bool,
}

const DATE_TYPES: &[&str] = &[XSD_DATE, XSD_GYEAR, XSD_GYEAR_MONTH, XSD_DATE_TIME];

const PROVENANCE_PATHS: &[&str] = &[
    SKOS_HISTORY_NOTE,
    DCT_PROVENANCE,
    PROV_WAS_DERIVED_FROM,
    PROV_HAD_PRIMARY_SOURCE,
    PROV_WAS_INFLUENCED_BY,
];

impl ShapeSet {
    /// Vocabulary publication profile
    pub fn vocpub() -> Self {
        let scheme = NodeShape {
            target_class: SKOS_CONCEPT_SCHEME,
            properties: vec![
                PropertyShape::new(&[DCT_TITLE, SKOS_PREF_LABEL])
                    .min(1)
                    .literal()
                    .unique_lang(),
                PropertyShape::new(&[SKOS_DEFINITION]).min(1).literal().unique_lang(),
                PropertyShape::new(&[DCT_CREATED])
                    .min(1)
                    .max(1)
                    .literal()
                    .datatypes(DATE_TYPES),
                PropertyShape::new(&[DCT_MODIFIED])
                    .min(1)
                    .max(1)
                    .literal()
                    .datatypes(DATE_TYPES),
                PropertyShape::new(&[DCT_CREATOR]).min(1),
                PropertyShape::new(&[DCT_PUBLISHER]).min(1),
                PropertyShape::new(&[SKOS_HAS_TOP_CONCEPT]).min(1).iri(),
                PropertyShape::new(&[OWL_VERSION_INFO]).max(1).literal(),
                PropertyShape::new(&[SKOS_HISTORY_NOTE]).min(1).warning(),
            ],
        };
        let concept = NodeShape {
            target_class: SKOS_CONCEPT,
            properties: vec![
                PropertyShape::new(&[SKOS_PREF_LABEL]).min(1).literal().unique_lang(),
                PropertyShape::new(&[SKOS_DEFINITION]).min(1).literal().unique_lang(),
                PropertyShape::new(&[SKOS_ALT_LABEL]).literal(),
                PropertyShape::new(&[SKOS_IN_SCHEME, SKOS_TOP_CONCEPT_OF]).min(1).iri(),
                PropertyShape::new(&[SKOS_BROADER]).iri(),
                PropertyShape::new(&[SKOS_NARROWER]).iri(),
                PropertyShape::new(&[OWL_DEPRECATED]).max(1).literal(),
                PropertyShape::new(PROVENANCE_PATHS).min(1).warning(),
            ],
        };
        let collection = NodeShape {
            target_class: SKOS_COLLECTION,
            properties: vec![
                PropertyShape::new(&[SKOS_PREF_LABEL]).min(1).literal().unique_lang(),
                PropertyShape::new(&[SKOS_DEFINITION]).min(1).literal().unique_lang(),
                PropertyShape::new(&[SKOS_MEMBER, SKOS_MEMBER_LIST]).min(1),
            ],
        };
        ShapeSet {
            name: "vocpub".to_string(),
            shapes: vec![scheme, concept, collection],
            single_scheme: true,
        }
    }

    /// Labels and definitions only
    pub fn minimal() -> Self {
        ShapeSet {
            name: "minimal".to_string(),
            shapes: vec![
                NodeShape {
                    target_class: SKOS_CONCEPT_SCHEME,
                    properties: vec![PropertyShape::new(&[DCT_TITLE, SKOS_PREF_LABEL]).min(1)],
                },
                NodeShape {
                    target_class: SKOS_CONCEPT,
                    properties: vec![
                        PropertyShape::new(&[SKOS_PREF_LABEL]).min(1).unique_lang(),
                        PropertyShape::new(&[SKOS_DEFINITION]).min(1),
                    ],
                },
            ],
            single_scheme: true,
        }
    }
}

impl FromStr for ShapeSet {
    type Err = VocabError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_lowercase().as_str() {
            "vocpub" => Ok(ShapeSet::vocpub()),
            "minimal" => Ok(ShapeSet::minimal()),
            other => Err(VocabError::InvalidArgument(format!(
                "unknown shape profile \"{}\", expected \"vocpub\" or \"minimal\"",
                other
            ))),
        }
    }
}

impl Default for ShapeSet {
    fn default() -> Self {
        ShapeSet::vocpub()
    }
}

/// Evaluates shape sets without an external engine
#[derive(Debug)]
pub struct BuiltinShapes {
    prefixes: PrefixMap,
}

impl Default for BuiltinShapes {
    fn default() -> Self {
        Self::new()
    }
}

impl BuiltinShapes {
    pub fn new() -> Self {
        BuiltinShapes {
            prefixes: PrefixMap::well_known(),
        }
    }

    fn path_label(&self, paths: &[&str]) -> String {
        paths
            .iter()
            .map(|p| self.prefixes.compress(p))
            .collect::<Vec<_>>()
            .join(" or ")
    }

    fn check_property(&self, graph: &Graph, focus: &Term, shape: &PropertyShape) -> Vec<Violation> {
        let mut out = Vec::new();
        let field = self.path_label(shape.paths);
        let result = |message: String| {
            Violation::new(shape.severity, ViolationKind::Shape, focus_label(focus), message)
                .with_field(field.clone())
        };
        let values: Vec<&Term> = shape
            .paths
            .iter()
            .flat_map(|p| graph.objects(focus, p))
            .collect();

        if values.len() < shape.min_count {
            out.push(result(format!(
                "expected at least {} value(s), found {}",
                shape.min_count,
                values.len()
            )));
        }
        if let Some(max) = shape.max_count {
            if values.len() > max {
                out.push(result(format!(
                    "expected at most {} value(s), found {}",
                    max,
                    values.len()
                )));
            }
        }
        for value in &values {
            let kind_ok = match shape.node_kind {
                Some(NodeKind::Iri) => value.as_iri().is_some(),
                Some(NodeKind::Literal) => value.as_literal().is_some(),
                None => true,
            };
            if !kind_ok {
                out.push(
                    result("value has the wrong node kind".to_string())
                        .with_value(value.to_string()),
                );
            }
            if let (Some(allowed), Some(lit)) = (shape.datatypes, value.as_literal()) {
                let ok = lit.datatype.as_deref().is_some_and(|dt| allowed.contains(&dt));
                if !ok {
                    out.push(
                        result("literal has an unexpected datatype".to_string())
                            .with_value(value.to_string()),
                    );
                }
            }
        }
        if shape.unique_lang {
            let mut per_lang: BTreeMap<&str, usize> = BTreeMap::new();
            for lit in values.iter().filter_map(|v| v.as_literal()) {
                if let Some(lang) = &lit.lang {
                    *per_lang.entry(lang.as_str()).or_default() += 1;
                }
            }
            for (lang, count) in per_lang.into_iter().filter(|(_, n)| *n > 1) {
                out.push(
                    result(format!("{} values share the language tag", count))
                        .with_value(lang),
                );
            }
        }
        out
    }
}

fn focus_label(term: &Term) -> String {
    match term {
        Term::Iri(iri) => iri.clone(),
        other => other.to_string(),
    }
}

impl ShapeValidator for BuiltinShapes {
    fn validate(&self, graph: &Graph, shapes: &ShapeSet, min: Severity) -> Vec<Violation> {
        let mut out = Vec::new();
        if shapes.single_scheme {
            let schemes = graph.instances_of(SKOS_CONCEPT_SCHEME);
            if schemes.len() != 1 {
                out.push(Violation::violation(
                    ViolationKind::Shape,
                    "graph",
                    format!("expected exactly one skos:ConceptScheme, found {}", schemes.len()),
                ));
            }
        }
        for shape in &shapes.shapes {
            let targets = graph.instances_of(shape.target_class);
            debug!(
                "Checking {} instances of {} against {}",
                targets.len(),
                self.prefixes.compress(shape.target_class),
                shapes.name
            );
            for focus in &targets {
                for property in &shape.properties {
                    out.extend(self.check_property(graph, focus, property));
                }
            }
        }
        out.retain(|v| v.severity >= min);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample_context;
    use crate::expand::expand;
    use crate::graph::{Literal, Triple};
    use crate::model::tests::{sample_model, VOC};
    use chrono::NaiveDate;

    fn sample_graph() -> Graph {
        let ctx = sample_context();
        let mut model = sample_model();
        model.set_modified(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        model.scheme.history_note = Some("Created for tests".into());
        expand(&model.to_graph(&ctx))
    }

    fn run(graph: &Graph, shapes: ShapeSet, min: Severity) -> Vec<Violation> {
        BuiltinShapes::new().validate(graph, &shapes, min)
    }

    #[test]
    fn test_sample_conforms() {
        let found = run(&sample_graph(), ShapeSet::vocpub(), Severity::Info);
        assert!(found.is_empty(), "{:?}", found);
    }

    #[test]
    fn test_missing_label() {
        let mut graph = sample_graph();
        let cat = Term::iri(format!("{}0000002", VOC));
        graph.remove(&Triple::new(
            cat.clone(),
            SKOS_PREF_LABEL,
            Term::Literal(Literal::lang("Cat", "en")),
        ));
        let found = run(&graph, ShapeSet::vocpub(), Severity::Violation);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].subject, format!("{}0000002", VOC));
        assert_eq!(found[0].field.as_deref(), Some("skos:prefLabel"));
    }

    #[test]
    fn test_unique_lang() {
        let mut graph = sample_graph();
        let cat = Term::iri(format!("{}0000002", VOC));
        graph.add(cat, SKOS_PREF_LABEL, Term::Literal(Literal::lang("Kitty", "en")));
        let found = run(&graph, ShapeSet::vocpub(), Severity::Violation);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value.as_deref(), Some("en"));
    }

    #[test]
    fn test_second_scheme() {
        let mut graph = sample_graph();
        graph.add(
            Term::iri("https://example.org/other/"),
            RDF_TYPE,
            Term::iri(SKOS_CONCEPT_SCHEME),
        );
        let found = run(&graph, ShapeSet::minimal(), Severity::Violation);
        assert!(found.iter().any(|v| v.subject == "graph"));
    }

    #[test]
    fn test_provenance_warning_filtered_by_severity() {
        let ctx = sample_context();
        let mut model = sample_model();
        model.set_modified(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        let graph = expand(&model.to_graph(&ctx));
        let warnings = run(&graph, ShapeSet::vocpub(), Severity::Warning);
        // scheme history note plus one per concept
        assert_eq!(warnings.len(), 4);
        assert!(run(&graph, ShapeSet::vocpub(), Severity::Violation).is_empty());
    }

    #[test]
    fn test_minimal_is_lenient() {
        let mut graph = sample_graph();
        let scheme = Term::iri("https://example.org/myvocab/");
        let created: Vec<Triple> = graph
            .about(&scheme)
            .filter(|t| t.predicate == DCT_CREATED)
            .cloned()
            .collect();
        for t in &created {
            graph.remove(t);
        }
        assert!(run(&graph, ShapeSet::minimal(), Severity::Info).is_empty());
        assert!(!run(&graph, ShapeSet::vocpub(), Severity::Violation).is_empty());
    }

    #[test]
    fn test_profile_by_name() {
        assert_eq!("VocPub".parse::<ShapeSet>().unwrap().name, "vocpub");
        assert!("shacl-full".parse::<ShapeSet>().is_err());
    }
}
