//! In-memory triple store
//!
//! A deliberately small graph: a sorted set of triples with the handful of
//! lookups the extractor, the inference pass and the split transformer need.

use std::collections::BTreeSet;
use std::fmt;

use crate::vocab::{RDF_TYPE, XSD_BOOLEAN, XSD_STRING};

/// An RDF literal
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Literal {
    pub value: String,
    pub lang: Option<String>,
    /// Datatype IRI; `None` for plain strings and language-tagged strings
    pub datatype: Option<String>,
}

impl Literal {
    pub fn plain(value: impl Into<String>) -> Self {
        Literal {
            value: value.into(),
            lang: None,
            datatype: None,
        }
    }

    pub fn lang(value: impl Into<String>, lang: impl Into<String>) -> Self {
        Literal {
            value: value.into(),
            lang: Some(lang.into()),
            datatype: None,
        }
    }

    pub fn typed(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        let datatype = datatype.into();
        if datatype == XSD_STRING {
            return Literal::plain(value);
        }
        Literal {
            value: value.into(),
            lang: None,
            datatype: Some(datatype),
        }
    }

    pub fn boolean(value: bool) -> Self {
        Literal::typed(value.to_string(), XSD_BOOLEAN)
    }
}

/// A node in a triple
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Term {
    Iri(String),
    Blank(String),
    Literal(Literal),
}

impl Term {
    pub fn iri(iri: impl Into<String>) -> Self {
        Term::Iri(iri.into())
    }

    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Term::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Term::Blank(_))
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(iri) => write!(f, "<{}>", iri),
            Term::Blank(id) => write!(f, "_:{}", id),
            Term::Literal(lit) => match (&lit.lang, &lit.datatype) {
                (Some(lang), _) => write!(f, "{:?}@{}", lit.value, lang),
                (None, Some(dt)) => write!(f, "{:?}^^<{}>", lit.value, dt),
                (None, None) => write!(f, "{:?}", lit.value),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Triple {
    pub subject: Term,
    pub predicate: String,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: Term, predicate: impl Into<String>, object: Term) -> Self {
        Triple {
            subject,
            predicate: predicate.into(),
            object,
        }
    }
}

/// A set of triples ordered by (subject, predicate, object)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    triples: BTreeSet<Triple>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a triple, returning whether it was new
    pub fn insert(&mut self, triple: Triple) -> bool {
        self.triples.insert(triple)
    }

    pub fn add(&mut self, subject: Term, predicate: &str, object: Term) -> bool {
        self.insert(Triple::new(subject, predicate, object))
    }

    pub fn remove(&mut self, triple: &Triple) -> bool {
        self.triples.remove(triple)
    }

    pub fn contains(&self, triple: &Triple) -> bool {
        self.triples.contains(triple)
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }

    /// Union another graph into this one
    pub fn extend(&mut self, other: Graph) {
        self.triples.extend(other.triples);
    }

    /// All triples with the given subject
    pub fn about<'a>(&'a self, subject: &'a Term) -> impl Iterator<Item = &'a Triple> + 'a {
        // smallest possible triple for this subject
        let start = Triple::new(subject.clone(), String::new(), Term::Iri(String::new()));
        self.triples
            .range(start..)
            .take_while(move |t| &t.subject == subject)
    }

    /// Objects of `subject predicate ?o`
    pub fn objects<'a>(
        &'a self,
        subject: &'a Term,
        predicate: &'a str,
    ) -> impl Iterator<Item = &'a Term> + 'a {
        self.about(subject)
            .filter(move |t| t.predicate == predicate)
            .map(|t| &t.object)
    }

    /// First object of `subject predicate ?o`, if any
    pub fn object<'a>(&'a self, subject: &'a Term, predicate: &'a str) -> Option<&'a Term> {
        self.objects(subject, predicate).next()
    }

    /// Subjects of `?s predicate object`
    pub fn subjects<'a>(
        &'a self,
        predicate: &'a str,
        object: &'a Term,
    ) -> impl Iterator<Item = &'a Term> + 'a {
        self.triples
            .iter()
            .filter(move |t| t.predicate == predicate && &t.object == object)
            .map(|t| &t.subject)
    }

    /// Distinct subjects typed with `class`
    pub fn instances_of(&self, class: &str) -> BTreeSet<Term> {
        let class = Term::iri(class);
        self.subjects(RDF_TYPE, &class).cloned().collect()
    }

    pub fn has_type(&self, subject: &Term, class: &str) -> bool {
        self.contains(&Triple::new(subject.clone(), RDF_TYPE, Term::iri(class)))
    }

    /// Distinct subjects in order
    pub fn subject_set(&self) -> BTreeSet<&Term> {
        self.triples.iter().map(|t| &t.subject).collect()
    }

    /// Read an rdf:List starting at `head`; `None` if the list is malformed
    pub fn list_items(&self, head: &Term) -> Option<Vec<Term>> {
        use crate::vocab::{RDF_FIRST, RDF_NIL, RDF_REST};

        let mut items = Vec::new();
        let mut node = head.clone();
        let mut seen = BTreeSet::new();
        while node != Term::iri(RDF_NIL) {
            if !seen.insert(node.clone()) {
                return None;
            }
            items.push(self.object(&node, RDF_FIRST)?.clone());
            node = self.object(&node, RDF_REST)?.clone();
        }
        Some(items)
    }
}

impl FromIterator<Triple> for Graph {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        Graph {
            triples: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Graph {
    type Item = Triple;
    type IntoIter = std::collections::btree_set::IntoIter<Triple>;

    fn into_iter(self) -> Self::IntoIter {
        self.triples.into_iter()
    }
}
