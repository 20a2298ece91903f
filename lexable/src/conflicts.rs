// Token precedence DAG, topological priority ordering, and DFA-state
// conflict detection — spec.md 4.4 "Conflicts".
//
// Shape grounded on tree-sitter's `TokenConflictMap`/`TokenConflictStatus`
// (examples/other_examples/12f6156b_...token_conflicts.rs.rs): a status
// per ordered pair of tokens, computed once and then queried by index.
// Adapted here to operate over already-built DFA states (this generator
// never needs tree-sitter's incremental state-set walk, since our DFA is
// fully determinized up front).

use crate::dfa::Dfa;
use crate::nfa::TermId;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictStatus {
    pub does_overlap: bool,
}

#[derive(Debug, Default)]
pub struct PrecedenceGraph {
    /// edge a -> b means "a takes precedence over b"
    before: BTreeMap<TermId, BTreeSet<TermId>>,
    declared_order: Vec<TermId>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    Cyclic(Vec<TermId>),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Cyclic(chain) => write!(
                f,
                "cyclic token precedence: {}",
                chain
                    .iter()
                    .map(|t| t.to_string())
                    .collect::<Vec<_>>()
                    .join(" -> ")
            ),
        }
    }
}

impl PrecedenceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, term: TermId) {
        if !self.declared_order.contains(&term) {
            self.declared_order.push(term);
        }
    }

    pub fn prefer(&mut self, higher: TermId, lower: TermId) {
        self.declare(higher);
        self.declare(lower);
        self.before.entry(higher).or_default().insert(lower);
    }

    fn is_before(&self, a: TermId, b: TermId) -> bool {
        let mut seen = BTreeSet::new();
        let mut stack = vec![a];
        while let Some(x) = stack.pop() {
            if x == b {
                return true;
            }
            if !seen.insert(x) {
                continue;
            }
            if let Some(next) = self.before.get(&x) {
                stack.extend(next.iter().cloned());
            }
        }
        false
    }

    pub fn conflicts(&self, a: TermId, b: TermId) -> bool {
        !self.is_before(a, b) && !self.is_before(b, a)
    }

    /// Kahn's algorithm; a non-empty remainder after exhausting in-degree
    /// zero nodes indicates a cycle, reported with the residual chain.
    pub fn topological_priority(&self) -> Result<BTreeMap<TermId, usize>, Error> {
        let mut in_degree: BTreeMap<TermId, usize> = BTreeMap::new();
        for &term in self.declared_order.iter() {
            in_degree.entry(term).or_insert(0);
        }
        for (_, lowers) in self.before.iter() {
            for &lower in lowers.iter() {
                *in_degree.entry(lower).or_insert(0) += 1;
            }
        }
        let mut ready: Vec<TermId> = self
            .declared_order
            .iter()
            .cloned()
            .filter(|t| in_degree.get(t).cloned().unwrap_or(0) == 0)
            .collect();
        let mut order = Vec::new();
        while let Some(next) = ready.first().cloned() {
            ready.remove(0);
            order.push(next);
            if let Some(lowers) = self.before.get(&next) {
                let mut lowers: Vec<TermId> = lowers.iter().cloned().collect();
                lowers.sort();
                for lower in lowers {
                    let degree = in_degree.get_mut(&lower).unwrap();
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(lower);
                    }
                }
            }
        }
        if order.len() != self.declared_order.len() {
            let remaining: Vec<TermId> = self
                .declared_order
                .iter()
                .cloned()
                .filter(|t| !order.contains(t))
                .collect();
            return Err(Error::Cyclic(remaining));
        }
        Ok(order.into_iter().enumerate().map(|(i, t)| (t, i)).collect())
    }
}

/// All unresolved conflicts within a single DFA: pairs of terms accepted
/// by the same state with no precedence relation between them.
pub fn unresolved_conflicts(dfa: &Dfa, graph: &PrecedenceGraph) -> Vec<(TermId, TermId)> {
    let mut found = BTreeSet::new();
    for state in dfa.states.iter() {
        for i in 0..state.accepting.len() {
            for j in (i + 1)..state.accepting.len() {
                let (a, _) = state.accepting[i];
                let (b, _) = state.accepting[j];
                if graph.conflicts(a, b) {
                    let pair = if a < b { (a, b) } else { (b, a) };
                    found.insert(pair);
                }
            }
        }
    }
    found.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_cycle() {
        let mut g = PrecedenceGraph::new();
        g.prefer(1, 2);
        g.prefer(2, 3);
        g.prefer(3, 1);
        assert!(g.topological_priority().is_err());
    }

    #[test]
    fn linearizes_acyclic_dag() {
        let mut g = PrecedenceGraph::new();
        g.prefer(1, 2);
        g.prefer(2, 3);
        let order = g.topological_priority().unwrap();
        assert!(order[&1] < order[&2]);
        assert!(order[&2] < order[&3]);
    }

    #[test]
    fn undeclared_pair_conflicts() {
        let mut g = PrecedenceGraph::new();
        g.declare(1);
        g.declare(2);
        assert!(g.conflicts(1, 2));
        g.prefer(1, 2);
        assert!(!g.conflicts(1, 2));
    }
}
