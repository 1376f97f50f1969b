//! Broader/narrower hierarchy checks
//!
//! Works on raw parent declarations: concept IRI to the list of parent IRIs
//! as written in the source. Parents outside the declared set are references
//! to other schemes and are ignored for cycle and top-concept purposes.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::error::VocabError;

/// A parent that is also reachable through another declared parent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedundantEdge {
    pub concept: String,
    /// The superfluous parent
    pub redundant: String,
    /// The declared parent through which `redundant` is already an ancestor
    pub via: String,
}

/// Result of a successful normalization
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HierarchyReport {
    pub top_concepts: Vec<String>,
    /// Inverse of the parent relation, children in ascending order
    pub narrower: BTreeMap<String, Vec<String>>,
    pub redundant: Vec<RedundantEdge>,
}

/// Parent relation restricted to one scheme
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    names: Vec<String>,
    /// Edges child -> parents, by index, in declaration order
    parents: Vec<Vec<usize>>,
}

impl Hierarchy {
    pub fn new<'a, I, P>(declarations: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, P)>,
        P: IntoIterator<Item = &'a String>,
    {
        let declarations: Vec<(&str, Vec<&String>)> = declarations
            .into_iter()
            .map(|(c, ps)| (c, ps.into_iter().collect()))
            .collect();

        let mut index: BTreeMap<&str, usize> = BTreeMap::new();
        let mut names = Vec::new();
        for (concept, _) in &declarations {
            if !index.contains_key(concept) {
                index.insert(concept, names.len());
                names.push(concept.to_string());
            }
        }

        let mut parents = vec![Vec::new(); names.len()];
        for (concept, declared) in &declarations {
            let child = index[concept];
            for parent in declared {
                if let Some(&p) = index.get(parent.as_str()) {
                    if !parents[child].contains(&p) {
                        parents[child].push(p);
                    }
                }
            }
        }
        Hierarchy { names, parents }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Run all checks; fails on the first cycle or when no top concept exists
    pub fn normalize(&self) -> Result<HierarchyReport, VocabError> {
        if let Some(cycle) = self.cycles().into_iter().next() {
            return Err(VocabError::Cycle(cycle));
        }
        let top_concepts = self.top_concepts();
        if top_concepts.is_empty() && !self.is_empty() {
            return Err(VocabError::NoTopConcept);
        }
        Ok(HierarchyReport {
            top_concepts,
            narrower: self.narrower(),
            redundant: self.redundant_edges(),
        })
    }

    /// Concepts without a parent inside the scheme, ascending
    pub fn top_concepts(&self) -> Vec<String> {
        let mut tops: Vec<String> = self
            .parents
            .iter()
            .enumerate()
            .filter(|(_, ps)| ps.is_empty())
            .map(|(i, _)| self.names[i].clone())
            .collect();
        tops.sort();
        tops
    }

    pub fn narrower(&self) -> BTreeMap<String, Vec<String>> {
        let mut narrower: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (child, ps) in self.parents.iter().enumerate() {
            for &p in ps {
                narrower
                    .entry(self.names[p].clone())
                    .or_default()
                    .push(self.names[child].clone());
            }
        }
        for children in narrower.values_mut() {
            children.sort();
        }
        narrower
    }

    /// Every cycle as its sorted participants, found as strongly connected
    /// components (Tarjan, iterative)
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let n = self.names.len();
        let mut counter = 0usize;
        let mut indices: Vec<Option<usize>> = vec![None; n];
        let mut lowlink = vec![0usize; n];
        let mut on_stack = vec![false; n];
        let mut stack: Vec<usize> = Vec::new();
        let mut cycles = Vec::new();

        for root in 0..n {
            if indices[root].is_some() {
                continue;
            }
            let mut call_stack: Vec<(usize, usize)> = vec![(root, 0)];
            indices[root] = Some(counter);
            lowlink[root] = counter;
            counter += 1;
            stack.push(root);
            on_stack[root] = true;

            while let Some(&(node, next)) = call_stack.last() {
                if let Some(&w) = self.parents[node].get(next) {
                    if let Some(frame) = call_stack.last_mut() {
                        frame.1 += 1;
                    }
                    match indices[w] {
                        None => {
                            indices[w] = Some(counter);
                            lowlink[w] = counter;
                            counter += 1;
                            stack.push(w);
                            on_stack[w] = true;
                            call_stack.push((w, 0));
                        }
                        Some(w_index) if on_stack[w] => {
                            lowlink[node] = lowlink[node].min(w_index);
                        }
                        Some(_) => {}
                    }
                    continue;
                }

                call_stack.pop();
                if let Some(&(caller, _)) = call_stack.last() {
                    lowlink[caller] = lowlink[caller].min(lowlink[node]);
                }
                if Some(lowlink[node]) == indices[node] {
                    let mut component = Vec::new();
                    while let Some(w) = stack.pop() {
                        on_stack[w] = false;
                        component.push(w);
                        if w == node {
                            break;
                        }
                    }
                    let self_loop = component.len() == 1 && self.parents[node].contains(&node);
                    if component.len() > 1 || self_loop {
                        let mut members: Vec<String> =
                            component.iter().map(|&i| self.names[i].clone()).collect();
                        members.sort();
                        cycles.push(members);
                    }
                }
            }
        }
        cycles.sort();
        cycles
    }

    /// Parents that are already ancestors of another declared parent.
    ///
    /// Only meaningful on an acyclic hierarchy.
    pub fn redundant_edges(&self) -> Vec<RedundantEdge> {
        let mut edges = Vec::new();
        for (child, ps) in self.parents.iter().enumerate() {
            if ps.len() < 2 {
                continue;
            }
            for &via in ps {
                let ancestors = self.ancestors(via);
                for &other in ps {
                    if other != via && ancestors.contains(&other) {
                        edges.push(RedundantEdge {
                            concept: self.names[child].clone(),
                            redundant: self.names[other].clone(),
                            via: self.names[via].clone(),
                        });
                    }
                }
            }
        }
        edges
    }

    fn ancestors(&self, start: usize) -> BTreeSet<usize> {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<usize> = self.parents[start].iter().copied().collect();
        while let Some(node) = queue.pop_front() {
            if seen.insert(node) {
                queue.extend(self.parents[node].iter().copied());
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hierarchy(decls: &[(&str, &[&str])]) -> Hierarchy {
        let owned: Vec<(String, Vec<String>)> = decls
            .iter()
            .map(|(c, ps)| (c.to_string(), ps.iter().map(|p| p.to_string()).collect()))
            .collect();
        Hierarchy::new(owned.iter().map(|(c, ps)| (c.as_str(), ps.iter())))
    }

    #[test]
    fn test_single_concept_is_top() {
        let report = hierarchy(&[("cat", &[])]).normalize().unwrap();
        assert_eq!(report.top_concepts, vec!["cat"]);
        assert!(report.redundant.is_empty());
    }

    #[test]
    fn test_narrower_inverse() {
        let report = hierarchy(&[("a", &[]), ("b", &["a"]), ("c", &["a"])])
            .normalize()
            .unwrap();
        assert_eq!(report.top_concepts, vec!["a"]);
        assert_eq!(report.narrower["a"], vec!["b", "c"]);
        assert!(!report.narrower.contains_key("b"));
    }

    #[test]
    fn test_external_parent_is_ignored() {
        let report = hierarchy(&[("a", &["https://other.org/x"])])
            .normalize()
            .unwrap();
        assert_eq!(report.top_concepts, vec!["a"]);
    }

    #[test]
    fn test_cycle_detected() {
        let h = hierarchy(&[("top", &[]), ("a", &["c", "top"]), ("b", &["a"]), ("c", &["b"])]);
        match h.normalize() {
            Err(VocabError::Cycle(members)) => assert_eq!(members, vec!["a", "b", "c"]),
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_self_loop_is_cycle() {
        let h = hierarchy(&[("top", &[]), ("a", &["a"])]);
        assert_eq!(h.cycles(), vec![vec!["a".to_string()]]);
    }

    #[test]
    fn test_all_cycles_reported() {
        let h = hierarchy(&[
            ("a", &["b"]),
            ("b", &["a"]),
            ("c", &["d"]),
            ("d", &["c"]),
            ("e", &[]),
        ]);
        assert_eq!(h.cycles().len(), 2);
    }

    #[test]
    fn test_long_chain_has_no_cycle() {
        let names: Vec<String> = (0..5000).map(|i| format!("c{}", i)).collect();
        let parents: Vec<Vec<String>> = (0..5000)
            .map(|i| if i == 0 { vec![] } else { vec![names[i - 1].clone()] })
            .collect();
        let h = Hierarchy::new(names.iter().map(String::as_str).zip(parents.iter()));
        assert!(h.cycles().is_empty());
        assert_eq!(h.top_concepts(), vec!["c0"]);
    }

    #[test]
    fn test_cycle_reported_before_missing_top_concept() {
        let h = hierarchy(&[("a", &["b"]), ("b", &["a"])]);
        assert!(matches!(h.normalize(), Err(VocabError::Cycle(_))));
    }

    #[test]
    fn test_redundant_edge() {
        let h = hierarchy(&[("a", &[]), ("b", &["a"]), ("c", &["b", "a"])]);
        let report = h.normalize().unwrap();
        assert_eq!(
            report.redundant,
            vec![RedundantEdge {
                concept: "c".into(),
                redundant: "a".into(),
                via: "b".into(),
            }]
        );
    }

    #[test]
    fn test_multiple_inheritance_is_not_redundant() {
        let h = hierarchy(&[("a", &[]), ("b", &[]), ("c", &["a", "b"])]);
        assert!(h.normalize().unwrap().redundant.is_empty());
    }
}
