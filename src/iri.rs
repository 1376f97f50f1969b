//! IRI classification, CURIE expansion and numeric ID matching
//!
//! Cells and configuration refer to entities either by full IRI or by
//! `prefix:local` CURIE. This module turns both into absolute IRIs, compresses
//! them back for display, and decides whether an IRI carries a permanent
//! numeric ID of the namespace's fixed width.

use indexmap::IndexMap;
use thiserror::Error;
use url::Url;

use crate::vocab::WELL_KNOWN_PREFIXES;

/// Classification of an IRI-like string as written by a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IriKind {
    /// Absolute IRI: "https://...", "urn:...", "mailto:..." (angle brackets allowed)
    Absolute,
    /// Compact IRI "prefix:local"
    Curie,
    /// Anything else
    Invalid,
}

/// Classify an IRI or CURIE string
pub fn classify_iri(text: &str) -> IriKind {
    let text = strip_brackets(text.trim());
    if text.is_empty() || text.chars().any(char::is_whitespace) {
        IriKind::Invalid
    } else if text.contains("://") || text.starts_with("urn:") || text.starts_with("mailto:") {
        IriKind::Absolute
    } else if let Some((prefix, _)) = text.split_once(':') {
        if is_valid_prefix(prefix) {
            IriKind::Curie
        } else {
            IriKind::Invalid
        }
    } else {
        IriKind::Invalid
    }
}

fn strip_brackets(text: &str) -> &str {
    text.strip_prefix('<')
        .and_then(|t| t.strip_suffix('>'))
        .unwrap_or(text)
}

fn is_valid_prefix(prefix: &str) -> bool {
    let mut chars = prefix.chars();
    match chars.next() {
        None => true,
        Some(c) if c.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
        }
        Some(_) => false,
    }
}

/// Reasons a cell value cannot be turned into an IRI
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IriError {
    #[error("unknown prefix \"{0}\"")]
    UnknownPrefix(String),

    #[error("not an IRI or CURIE")]
    NotAnIri,

    #[error("malformed IRI: {0}")]
    Malformed(String),
}

/// Check that an expanded IRI is well formed
pub fn validate_iri(iri: &str) -> Result<(), IriError> {
    Url::parse(iri)
        .map(|_| ())
        .map_err(|e| IriError::Malformed(e.to_string()))
}

/// Ordered prefix to namespace map
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PrefixMap {
    entries: IndexMap<String, String>,
}

impl PrefixMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map pre-filled with the well-known vocabulary prefixes
    pub fn well_known() -> Self {
        let mut map = Self::new();
        for (prefix, ns) in WELL_KNOWN_PREFIXES {
            map.insert(*prefix, *ns);
        }
        map
    }

    /// Add or replace a prefix
    pub fn insert(&mut self, prefix: impl Into<String>, namespace: impl Into<String>) {
        self.entries.insert(prefix.into(), namespace.into());
    }

    pub fn get(&self, prefix: &str) -> Option<&str> {
        self.entries.get(prefix).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, ns)| (p.as_str(), ns.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Expand a CURIE or absolute IRI into a validated absolute IRI
    pub fn expand(&self, text: &str) -> Result<String, IriError> {
        let trimmed = strip_brackets(text.trim());
        let iri = match classify_iri(trimmed) {
            IriKind::Absolute => trimmed.to_string(),
            IriKind::Curie => {
                let (prefix, local) = trimmed.split_once(':').ok_or(IriError::NotAnIri)?;
                let ns = self
                    .get(prefix)
                    .ok_or_else(|| IriError::UnknownPrefix(prefix.to_string()))?;
                format!("{}{}", ns, local)
            }
            IriKind::Invalid => return Err(IriError::NotAnIri),
        };
        validate_iri(&iri)?;
        Ok(iri)
    }

    /// Split an IRI into prefix and local part using the longest matching
    /// namespace whose local part is safe to write as a CURIE
    pub fn split<'a>(&'a self, iri: &'a str) -> Option<(&'a str, &'a str)> {
        self.entries
            .iter()
            .filter(|(_, ns)| iri.starts_with(ns.as_str()) && iri.len() > ns.len())
            .max_by_key(|(_, ns)| ns.len())
            .map(|(prefix, ns)| (prefix.as_str(), &iri[ns.len()..]))
            .filter(|(_, local)| is_safe_local(local))
    }

    /// Compress an IRI into a CURIE, or return it unchanged when no
    /// namespace matches or the local part would not survive expansion
    pub fn compress(&self, iri: &str) -> String {
        match self.split(iri) {
            Some((prefix, local)) => format!("{}:{}", prefix, local),
            None => iri.to_string(),
        }
    }

    /// Find the prefix whose namespace matches `namespace` exactly
    pub fn prefix_for(&self, namespace: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, ns)| ns.as_str() == namespace)
            .map(|(p, _)| p.as_str())
    }
}

/// Local names that can be written after `prefix:` in both cells and Turtle
pub(crate) fn is_safe_local(local: &str) -> bool {
    local.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_')
        && !local.ends_with('.')
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Last path or fragment segment of an IRI
///
/// "https://example.org/voc/0001234" -> "0001234"
/// "https://example.org/voc#term" -> "term"
pub fn local_name(iri: &str) -> &str {
    let trimmed = iri.trim_end_matches(['/', '#']);
    match trimmed.rfind(['/', '#', ':']) {
        Some(pos) => &trimmed[pos + 1..],
        None => trimmed,
    }
}

/// Result of matching an IRI against a namespace's ID pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdMatch {
    /// Local name is exactly `width` digits
    Permanent(u64),
    /// Local name is all digits but of the wrong length
    WrongWidth(String),
    /// Local name under the namespace that is not numeric
    Placeholder(String),
    /// IRI outside the namespace
    Foreign,
}

/// Permanent IRI part plus fixed digit width of a vocabulary namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdPattern {
    pub iri_part: String,
    pub width: usize,
}

impl IdPattern {
    pub fn new(iri_part: impl Into<String>, width: usize) -> Self {
        IdPattern {
            iri_part: iri_part.into(),
            width,
        }
    }

    /// Classify an IRI. The whole local name must be digits of exactly
    /// `width` characters to count as a permanent ID.
    pub fn classify(&self, iri: &str) -> IdMatch {
        let Some(local) = iri.strip_prefix(self.iri_part.as_str()) else {
            return IdMatch::Foreign;
        };
        if local.is_empty() {
            return IdMatch::Foreign;
        }
        if !local.bytes().all(|b| b.is_ascii_digit()) {
            return IdMatch::Placeholder(local.to_string());
        }
        if local.len() != self.width {
            return IdMatch::WrongWidth(local.to_string());
        }
        match local.parse::<u64>() {
            Ok(id) => IdMatch::Permanent(id),
            Err(_) => IdMatch::WrongWidth(local.to_string()),
        }
    }

    /// Zero-padded ID
    pub fn format_id(&self, id: u64) -> String {
        format!("{:0width$}", id, width = self.width)
    }

    pub fn iri_for(&self, id: u64) -> String {
        format!("{}{}", self.iri_part, self.format_id(id))
    }

    /// Largest ID representable in `width` digits
    pub fn max_id(&self) -> u64 {
        10u64
            .checked_pow(self.width as u32)
            .map(|v| v - 1)
            .unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefixes() -> PrefixMap {
        let mut map = PrefixMap::well_known();
        map.insert("ex", "https://example.org/voc_");
        map.insert("exo", "https://example.org/");
        map
    }

    #[test]
    fn test_classify_iri() {
        assert_eq!(classify_iri("https://example.org/a"), IriKind::Absolute);
        assert_eq!(classify_iri("<https://example.org/a>"), IriKind::Absolute);
        assert_eq!(classify_iri("urn:isbn:123"), IriKind::Absolute);
        assert_eq!(classify_iri("ex:0000001"), IriKind::Curie);
        assert_eq!(classify_iri("plain words"), IriKind::Invalid);
        assert_eq!(classify_iri("no-colon"), IriKind::Invalid);
        assert_eq!(classify_iri("1ex:a"), IriKind::Invalid);
        assert_eq!(classify_iri(""), IriKind::Invalid);
    }

    #[test]
    fn test_expand() {
        let map = prefixes();
        assert_eq!(
            map.expand("ex:0000001").unwrap(),
            "https://example.org/voc_0000001"
        );
        assert_eq!(
            map.expand(" <https://example.org/a> ").unwrap(),
            "https://example.org/a"
        );
        assert_eq!(
            map.expand("skos:Concept").unwrap(),
            "http://www.w3.org/2004/02/skos/core#Concept"
        );
    }

    #[test]
    fn test_expand_errors() {
        let map = prefixes();
        assert_eq!(
            map.expand("nope:thing"),
            Err(IriError::UnknownPrefix("nope".to_string()))
        );
        assert_eq!(map.expand("just text"), Err(IriError::NotAnIri));
        assert!(matches!(
            map.expand("https://exa mple.org"),
            Err(IriError::NotAnIri)
        ));
    }

    #[test]
    fn test_compress_prefers_longest_namespace() {
        let map = prefixes();
        assert_eq!(map.compress("https://example.org/voc_0000001"), "ex:0000001");
        assert_eq!(map.compress("https://example.org/other"), "exo:other");
        assert_eq!(map.compress("https://elsewhere.org/x"), "https://elsewhere.org/x");
    }

    #[test]
    fn test_compress_keeps_unsafe_local() {
        let map = prefixes();
        assert_eq!(
            map.compress("https://example.org/a/b?c"),
            "https://example.org/a/b?c"
        );
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name("https://example.org/voc/0001234"), "0001234");
        assert_eq!(local_name("https://example.org/voc#term"), "term");
        assert_eq!(local_name("https://example.org/voc/"), "voc");
    }

    #[test]
    fn test_id_pattern_exact_width() {
        let pattern = IdPattern::new("https://example.org/voc_", 7);
        assert_eq!(
            pattern.classify("https://example.org/voc_0012345"),
            IdMatch::Permanent(12345)
        );
        // contains the valid seven-digit tail "0012345" but has eight digits
        assert_eq!(
            pattern.classify("https://example.org/voc_00012345"),
            IdMatch::WrongWidth("00012345".to_string())
        );
        assert_eq!(
            pattern.classify("https://example.org/voc_012345"),
            IdMatch::WrongWidth("012345".to_string())
        );
    }

    #[test]
    fn test_id_pattern_placeholder_and_foreign() {
        let pattern = IdPattern::new("https://example.org/voc_", 7);
        assert_eq!(
            pattern.classify("https://example.org/voc_cat"),
            IdMatch::Placeholder("cat".to_string())
        );
        assert_eq!(
            pattern.classify("https://example.org/voc_x0012345"),
            IdMatch::Placeholder("x0012345".to_string())
        );
        assert_eq!(pattern.classify("https://other.org/0012345"), IdMatch::Foreign);
    }

    #[test]
    fn test_id_pattern_format() {
        let pattern = IdPattern::new("https://example.org/voc_", 7);
        assert_eq!(pattern.format_id(42), "0000042");
        assert_eq!(pattern.iri_for(42), "https://example.org/voc_0000042");
        assert_eq!(pattern.max_id(), 9_999_999);
    }
}
