//! Vocabulary definitions for SKOS vocabularies
//!
//! Namespace and term IRIs used when reading and writing vocabulary graphs,
//! the well-known prefix defaults and the predicate order of canonical output.

pub const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const RDFS_NS: &str = "http://www.w3.org/2000/01/rdf-schema#";
pub const OWL_NS: &str = "http://www.w3.org/2002/07/owl#";
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema#";
pub const SKOS_NS: &str = "http://www.w3.org/2004/02/skos/core#";
pub const DCT_NS: &str = "http://purl.org/dc/terms/";
pub const PROV_NS: &str = "http://www.w3.org/ns/prov#";
pub const SCHEMA_NS: &str = "https://schema.org/";
pub const DCAT_NS: &str = "http://www.w3.org/ns/dcat#";

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const RDF_FIRST: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#first";
pub const RDF_REST: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#rest";
pub const RDF_NIL: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#nil";
pub const RDF_LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";

pub const RDFS_SEE_ALSO: &str = "http://www.w3.org/2000/01/rdf-schema#seeAlso";
pub const RDFS_IS_DEFINED_BY: &str = "http://www.w3.org/2000/01/rdf-schema#isDefinedBy";

pub const OWL_DEPRECATED: &str = "http://www.w3.org/2002/07/owl#deprecated";
pub const OWL_VERSION_INFO: &str = "http://www.w3.org/2002/07/owl#versionInfo";

pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
pub const XSD_DATE: &str = "http://www.w3.org/2001/XMLSchema#date";
pub const XSD_GYEAR: &str = "http://www.w3.org/2001/XMLSchema#gYear";
pub const XSD_GYEAR_MONTH: &str = "http://www.w3.org/2001/XMLSchema#gYearMonth";
pub const XSD_DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";

pub const SKOS_CONCEPT_SCHEME: &str = "http://www.w3.org/2004/02/skos/core#ConceptScheme";
pub const SKOS_CONCEPT: &str = "http://www.w3.org/2004/02/skos/core#Concept";
pub const SKOS_COLLECTION: &str = "http://www.w3.org/2004/02/skos/core#Collection";
pub const SKOS_ORDERED_COLLECTION: &str = "http://www.w3.org/2004/02/skos/core#OrderedCollection";
pub const SKOS_PREF_LABEL: &str = "http://www.w3.org/2004/02/skos/core#prefLabel";
pub const SKOS_ALT_LABEL: &str = "http://www.w3.org/2004/02/skos/core#altLabel";
pub const SKOS_DEFINITION: &str = "http://www.w3.org/2004/02/skos/core#definition";
pub const SKOS_BROADER: &str = "http://www.w3.org/2004/02/skos/core#broader";
pub const SKOS_NARROWER: &str = "http://www.w3.org/2004/02/skos/core#narrower";
pub const SKOS_IN_SCHEME: &str = "http://www.w3.org/2004/02/skos/core#inScheme";
pub const SKOS_HAS_TOP_CONCEPT: &str = "http://www.w3.org/2004/02/skos/core#hasTopConcept";
pub const SKOS_TOP_CONCEPT_OF: &str = "http://www.w3.org/2004/02/skos/core#topConceptOf";
pub const SKOS_MEMBER: &str = "http://www.w3.org/2004/02/skos/core#member";
pub const SKOS_MEMBER_LIST: &str = "http://www.w3.org/2004/02/skos/core#memberList";
pub const SKOS_CHANGE_NOTE: &str = "http://www.w3.org/2004/02/skos/core#changeNote";
pub const SKOS_EDITORIAL_NOTE: &str = "http://www.w3.org/2004/02/skos/core#editorialNote";
pub const SKOS_HISTORY_NOTE: &str = "http://www.w3.org/2004/02/skos/core#historyNote";
pub const SKOS_RELATED_MATCH: &str = "http://www.w3.org/2004/02/skos/core#relatedMatch";
pub const SKOS_CLOSE_MATCH: &str = "http://www.w3.org/2004/02/skos/core#closeMatch";
pub const SKOS_EXACT_MATCH: &str = "http://www.w3.org/2004/02/skos/core#exactMatch";
pub const SKOS_NARROW_MATCH: &str = "http://www.w3.org/2004/02/skos/core#narrowMatch";
pub const SKOS_BROAD_MATCH: &str = "http://www.w3.org/2004/02/skos/core#broadMatch";

pub const DCT_TITLE: &str = "http://purl.org/dc/terms/title";
pub const DCT_DESCRIPTION: &str = "http://purl.org/dc/terms/description";
pub const DCT_CREATED: &str = "http://purl.org/dc/terms/created";
pub const DCT_MODIFIED: &str = "http://purl.org/dc/terms/modified";
pub const DCT_CREATOR: &str = "http://purl.org/dc/terms/creator";
pub const DCT_CONTRIBUTOR: &str = "http://purl.org/dc/terms/contributor";
pub const DCT_PUBLISHER: &str = "http://purl.org/dc/terms/publisher";
pub const DCT_LICENSE: &str = "http://purl.org/dc/terms/license";
pub const DCT_RIGHTS_HOLDER: &str = "http://purl.org/dc/terms/rightsHolder";
pub const DCT_CONFORMS_TO: &str = "http://purl.org/dc/terms/conformsTo";
pub const DCT_PROVENANCE: &str = "http://purl.org/dc/terms/provenance";
pub const DCT_IS_REPLACED_BY: &str = "http://purl.org/dc/terms/isReplacedBy";

pub const PROV_HAD_PRIMARY_SOURCE: &str = "http://www.w3.org/ns/prov#hadPrimarySource";
pub const PROV_WAS_INFLUENCED_BY: &str = "http://www.w3.org/ns/prov#wasInfluencedBy";
pub const PROV_WAS_DERIVED_FROM: &str = "http://www.w3.org/ns/prov#wasDerivedFrom";
pub const PROV_QUALIFIED_ATTRIBUTION: &str = "http://www.w3.org/ns/prov#qualifiedAttribution";

pub const SCHEMA_NAME: &str = "https://schema.org/name";
pub const SCHEMA_URL: &str = "https://schema.org/url";
pub const SCHEMA_EMAIL: &str = "https://schema.org/email";
pub const SCHEMA_CODE_REPOSITORY: &str = "https://schema.org/codeRepository";
pub const SCHEMA_MAINTAINER: &str = "https://schema.org/maintainer";

pub const DCAT_CONTACT_POINT: &str = "http://www.w3.org/ns/dcat#contactPoint";
pub const DCAT_LANDING_PAGE: &str = "http://www.w3.org/ns/dcat#landingPage";

/// Label prefix marking a deprecated concept or collection
pub const OBSOLETE_PREFIX: &str = "OBSOLETE ";

/// Prefixes every vocabulary may use without declaring them
pub const WELL_KNOWN_PREFIXES: &[(&str, &str)] = &[
    ("rdf", RDF_NS),
    ("rdfs", RDFS_NS),
    ("owl", OWL_NS),
    ("xsd", XSD_NS),
    ("skos", SKOS_NS),
    ("dcterms", DCT_NS),
    ("prov", PROV_NS),
    ("schema", SCHEMA_NS),
    ("dcat", DCAT_NS),
];

/// Predicate order within a subject block of canonical output.
///
/// Predicates missing from this list sort after it, alphabetically.
pub const PREDICATE_ORDER: &[&str] = &[
    RDF_TYPE,
    SKOS_PREF_LABEL,
    DCT_TITLE,
    SKOS_ALT_LABEL,
    SKOS_DEFINITION,
    DCT_DESCRIPTION,
    SKOS_IN_SCHEME,
    SKOS_TOP_CONCEPT_OF,
    SKOS_HAS_TOP_CONCEPT,
    SKOS_BROADER,
    SKOS_NARROWER,
    SKOS_MEMBER,
    SKOS_MEMBER_LIST,
    SKOS_RELATED_MATCH,
    SKOS_CLOSE_MATCH,
    SKOS_EXACT_MATCH,
    SKOS_NARROW_MATCH,
    SKOS_BROAD_MATCH,
    DCT_CREATED,
    DCT_MODIFIED,
    DCT_CREATOR,
    DCT_CONTRIBUTOR,
    DCT_PUBLISHER,
    SCHEMA_MAINTAINER,
    DCT_LICENSE,
    DCT_RIGHTS_HOLDER,
    DCT_CONFORMS_TO,
    OWL_VERSION_INFO,
    PROV_HAD_PRIMARY_SOURCE,
    PROV_WAS_INFLUENCED_BY,
    PROV_WAS_DERIVED_FROM,
    SKOS_CHANGE_NOTE,
    SKOS_EDITORIAL_NOTE,
    SKOS_HISTORY_NOTE,
    OWL_DEPRECATED,
    DCT_IS_REPLACED_BY,
    DCT_PROVENANCE,
    RDFS_SEE_ALSO,
    DCAT_LANDING_PAGE,
    SCHEMA_CODE_REPOSITORY,
    SCHEMA_NAME,
    SCHEMA_URL,
    SCHEMA_EMAIL,
    RDF_FIRST,
    RDF_REST,
];

/// Position of a predicate in canonical output
pub fn predicate_rank(predicate: &str) -> usize {
    PREDICATE_ORDER
        .iter()
        .position(|p| *p == predicate)
        .unwrap_or(PREDICATE_ORDER.len())
}

/// Reasons accepted for deprecating a concept
pub const CONCEPT_OBSOLETION_REASONS: &[&str] = &[
    "The concept is not clearly defined and usage has been inconsistent.",
    "This concept was added in error.",
    "More specific concepts were created.",
    "This concept was converted to a collection.",
    "The meaning of the concept is ambiguous.",
    "Lack of evidence that this function/process/component exists.",
];

/// Reasons accepted for deprecating a collection
pub const COLLECTION_OBSOLETION_REASONS: &[&str] = &[
    "The collection is not clearly defined and usage has been inconsistent.",
    "This collection was added in error.",
    "More collections were created.",
    "This collection was converted to a concept.",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicate_rank() {
        assert_eq!(predicate_rank(RDF_TYPE), 0);
        assert!(predicate_rank(SKOS_PREF_LABEL) < predicate_rank(SKOS_BROADER));
        assert_eq!(
            predicate_rank("https://example.org/unknown"),
            PREDICATE_ORDER.len()
        );
    }

    #[test]
    fn test_well_known_prefixes_are_namespaces() {
        for (prefix, ns) in WELL_KNOWN_PREFIXES {
            assert!(!prefix.is_empty());
            assert!(ns.ends_with('#') || ns.ends_with('/'), "{}", ns);
        }
    }
}
