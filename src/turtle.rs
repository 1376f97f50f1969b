//! Turtle reading and canonical writing
//!
//! Parsing goes through oxigraph's streaming parser. Writing is done here so
//! the output is canonical: subjects in a fixed order (concept schemes first),
//! predicates in [`crate::vocab::PREDICATE_ORDER`], objects sorted, blank
//! nodes inlined or relabelled deterministically, and only the prefixes that
//! are actually used declared in the header.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use oxigraph::io::{RdfFormat, RdfParser};
use oxigraph::model::{NamedOrBlankNode, Term as OxTerm};

use crate::error::VocabError;
use crate::graph::{Graph, Literal, Term, Triple};
use crate::iri::PrefixMap;
use crate::vocab::{
    predicate_rank, RDF_FIRST, RDF_LANG_STRING, RDF_REST, RDF_TYPE, SKOS_CONCEPT_SCHEME,
    XSD_STRING,
};

/// Parse Turtle text. Any syntax error or undefined prefix fails the whole
/// document.
pub fn parse(text: &str, source_name: &str) -> Result<Graph, VocabError> {
    let mut graph = Graph::new();
    for quad in RdfParser::from_format(RdfFormat::Turtle).for_reader(text.as_bytes()) {
        let quad = quad.map_err(|e| VocabError::parse(source_name, e))?;
        let subject = match quad.subject {
            NamedOrBlankNode::NamedNode(n) => Term::Iri(n.as_str().to_string()),
            NamedOrBlankNode::BlankNode(b) => Term::Blank(b.as_str().to_string()),
        };
        let object = match quad.object {
            OxTerm::NamedNode(n) => Term::Iri(n.as_str().to_string()),
            OxTerm::BlankNode(b) => Term::Blank(b.as_str().to_string()),
            OxTerm::Literal(l) => Term::Literal(convert_literal(&l)),
        };
        graph.insert(Triple::new(subject, quad.predicate.as_str(), object));
    }
    Ok(graph)
}

fn convert_literal(literal: &oxigraph::model::Literal) -> Literal {
    match literal.language() {
        Some(lang) => Literal::lang(literal.value(), lang.to_ascii_lowercase()),
        None => {
            let datatype = literal.datatype().as_str();
            if datatype == XSD_STRING || datatype == RDF_LANG_STRING {
                Literal::plain(literal.value())
            } else {
                Literal::typed(literal.value(), datatype)
            }
        }
    }
}

/// Serialize a graph as canonical Turtle
pub fn write(graph: &Graph, prefixes: &PrefixMap) -> String {
    let graph = relabel_blank_nodes(graph);
    let mut writer = TurtleWriter::new(&graph, prefixes);
    let body = writer.body();

    let mut out = String::new();
    for prefix in &writer.used_prefixes {
        if let Some(ns) = prefixes.get(prefix) {
            let _ = writeln!(out, "@prefix {}: <{}> .", prefix, ns);
        }
    }
    if !writer.used_prefixes.is_empty() {
        out.push('\n');
    }
    out.push_str(&body);
    out
}

/// Give blank nodes labels that depend only on their surroundings.
///
/// Parsers mint random labels; two parses of the same text must still write
/// the same bytes.
pub fn relabel_blank_nodes(graph: &Graph) -> Graph {
    let mut signatures: BTreeMap<&Term, Vec<String>> = BTreeMap::new();
    let mask = |t: &Term| match t {
        Term::Blank(_) => "_".to_string(),
        other => other.to_string(),
    };
    for t in graph.iter() {
        if t.subject.is_blank() {
            signatures
                .entry(&t.subject)
                .or_default()
                .push(format!("> {} {}", t.predicate, mask(&t.object)));
        }
        if t.object.is_blank() {
            signatures
                .entry(&t.object)
                .or_default()
                .push(format!("< {} {}", mask(&t.subject), t.predicate));
        }
    }
    if signatures.is_empty() {
        return graph.clone();
    }

    let mut ordered: Vec<(Vec<String>, &Term)> = signatures
        .into_iter()
        .map(|(term, mut sig)| {
            sig.sort();
            (sig, term)
        })
        .collect();
    ordered.sort();
    let labels: BTreeMap<&Term, Term> = ordered
        .into_iter()
        .enumerate()
        .map(|(i, (_, term))| (term, Term::Blank(format!("b{}", i))))
        .collect();

    let rename = |t: &Term| labels.get(t).cloned().unwrap_or_else(|| t.clone());
    graph
        .iter()
        .map(|t| Triple::new(rename(&t.subject), t.predicate.clone(), rename(&t.object)))
        .collect()
}

struct TurtleWriter<'a> {
    graph: &'a Graph,
    prefixes: &'a PrefixMap,
    used_prefixes: BTreeSet<String>,
    /// Blank nodes written in place as `[ ... ]`
    inline: BTreeSet<Term>,
    /// Blank list heads written in place as `( ... )`
    lists: BTreeMap<Term, Vec<Term>>,
    /// Inner cells of inlined lists, never written on their own
    list_cells: BTreeSet<Term>,
}

impl<'a> TurtleWriter<'a> {
    fn new(graph: &'a Graph, prefixes: &'a PrefixMap) -> Self {
        let mut writer = TurtleWriter {
            graph,
            prefixes,
            used_prefixes: BTreeSet::new(),
            inline: BTreeSet::new(),
            lists: BTreeMap::new(),
            list_cells: BTreeSet::new(),
        };
        writer.plan_inlining();
        writer
    }

    fn plan_inlining(&mut self) {
        let mut refs: BTreeMap<&Term, usize> = BTreeMap::new();
        for t in self.graph.iter() {
            if t.object.is_blank() {
                *refs.entry(&t.object).or_default() += 1;
            }
        }
        let candidates: BTreeSet<Term> = refs
            .iter()
            .filter(|(_, count)| **count == 1)
            .map(|(term, _)| (*term).clone())
            .collect();

        // a candidate is inlined when reachable from a written subject;
        // unreachable ones (blank cycles) get promoted to labelled subjects
        let mut promoted: BTreeSet<Term> = BTreeSet::new();
        let mut reachable: BTreeSet<Term> = BTreeSet::new();
        let mut pending: Vec<Term> = self
            .graph
            .subject_set()
            .into_iter()
            .filter(|s| !candidates.contains(*s))
            .cloned()
            .collect();
        loop {
            while let Some(node) = pending.pop() {
                for t in self.graph.about(&node) {
                    if candidates.contains(&t.object)
                        && !promoted.contains(&t.object)
                        && reachable.insert(t.object.clone())
                    {
                        pending.push(t.object.clone());
                    }
                }
            }
            let orphan = candidates.iter().find(|c| {
                !reachable.contains(*c)
                    && !promoted.contains(*c)
                    && self.graph.about(c).next().is_some()
            });
            match orphan {
                Some(node) => {
                    promoted.insert(node.clone());
                    pending.push(node.clone());
                }
                None => break,
            }
        }
        self.inline = reachable;

        for head in self.inline.clone() {
            if self.list_cells.contains(&head) {
                continue;
            }
            if let Some((items, cells)) = self.well_formed_list(&head) {
                self.list_cells.extend(cells);
                self.lists.insert(head, items);
            }
        }
        // cells swallowed by an enclosing list are not heads of their own
        let cells = self.list_cells.clone();
        self.lists.retain(|head, _| !cells.contains(head));
    }

    /// Items and non-head cells of an inlinable rdf:List
    fn well_formed_list(&self, head: &Term) -> Option<(Vec<Term>, Vec<Term>)> {
        let items = self.graph.list_items(head)?;
        let mut cells = Vec::new();
        let mut node = head.clone();
        for _ in 0..items.len() {
            let triples: Vec<&Triple> = self.graph.about(&node).collect();
            let only_list = triples.len() == 2
                && triples
                    .iter()
                    .all(|t| t.predicate == RDF_FIRST || t.predicate == RDF_REST);
            if !only_list || !self.inline.contains(&node) {
                return None;
            }
            if &node != head {
                cells.push(node.clone());
            }
            node = self.graph.object(&node, RDF_REST)?.clone();
        }
        Some((items, cells))
    }

    fn body(&mut self) -> String {
        let mut subjects: Vec<Term> = self
            .graph
            .subject_set()
            .into_iter()
            .filter(|s| !self.inline.contains(*s) && !self.list_cells.contains(*s))
            .cloned()
            .collect();
        subjects.sort_by_key(|s| (!self.graph.has_type(s, SKOS_CONCEPT_SCHEME), s.clone()));

        let mut out = String::new();
        for (i, subject) in subjects.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let subject_text = self.term(subject);
            out.push_str(&subject_text);
            let block = self.predicate_list(subject, 1);
            out.push_str(&block);
            out.push_str(" .\n");
        }
        out
    }

    /// " p o ;\n    p o1,\n        o2" for the triples of a subject
    fn predicate_list(&mut self, subject: &Term, depth: usize) -> String {
        let mut triples: Vec<&Triple> = self.graph.about(subject).collect();
        triples.sort_by(|a, b| {
            (predicate_rank(&a.predicate), &a.predicate, &a.object).cmp(&(
                predicate_rank(&b.predicate),
                &b.predicate,
                &b.object,
            ))
        });

        let indent = "    ".repeat(depth);
        let mut out = String::new();
        let mut current: Option<&str> = None;
        for t in triples {
            let object = self.term(&t.object);
            if current == Some(t.predicate.as_str()) {
                let _ = write!(out, ",\n{}    {}", indent, object);
                continue;
            }
            if current.is_some() {
                out.push_str(" ;");
            }
            let predicate = if t.predicate == RDF_TYPE {
                "a".to_string()
            } else {
                self.iri(&t.predicate)
            };
            if depth == 1 && current.is_none() {
                let _ = write!(out, " {} {}", predicate, object);
            } else {
                let _ = write!(out, "\n{}{} {}", indent, predicate, object);
            }
            current = Some(t.predicate.as_str());
        }
        out
    }

    fn term(&mut self, term: &Term) -> String {
        match term {
            Term::Iri(iri) => self.iri(iri),
            Term::Literal(lit) => self.literal(lit),
            Term::Blank(label) => {
                if let Some(items) = self.lists.get(term).cloned() {
                    let rendered: Vec<String> = items.iter().map(|i| self.term(i)).collect();
                    format!("( {} )", rendered.join(" "))
                } else if self.inline.contains(term) {
                    let inner = self.predicate_list(term, 2);
                    if inner.is_empty() {
                        "[]".to_string()
                    } else {
                        format!("[{}\n    ]", inner)
                    }
                } else {
                    format!("_:{}", label)
                }
            }
        }
    }

    fn iri(&mut self, iri: &str) -> String {
        match self.prefixes.split(iri) {
            Some((prefix, local)) => {
                self.used_prefixes.insert(prefix.to_string());
                format!("{}:{}", prefix, local)
            }
            None => format!("<{}>", iri),
        }
    }

    fn literal(&mut self, lit: &Literal) -> String {
        let quoted = quote(&lit.value);
        match (&lit.lang, &lit.datatype) {
            (Some(lang), _) => format!("{}@{}", quoted, lang),
            (None, Some(dt)) => {
                let dt = self.iri(dt);
                format!("{}^^{}", quoted, dt)
            }
            (None, None) => quoted,
        }
    }
}

/// Turtle string literal with escapes
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
