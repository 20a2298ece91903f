// Token-group partitioner — spec.md 4.5. Greedy placement of each LR
// state's required terminal set into one of at most 16 mutually
// compatible groups.

use crate::conflicts::PrecedenceGraph;
use crate::nfa::TermId;
use std::collections::BTreeSet;
use std::fmt;

pub const MAX_GROUPS: usize = 16;

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    TooManyGroups,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::TooManyGroups => write!(f, "more than {} token groups required", MAX_GROUPS),
        }
    }
}

#[derive(Debug, Default)]
pub struct Group {
    pub members: BTreeSet<TermId>,
}

/// Greedily assign each state's required-terminal set to an existing
/// group whose membership has no incompatibility with any of those terms,
/// opening a new group otherwise. Returns, per input state (in order), the
/// index of the group it was assigned to.
pub fn partition(
    required_by_state: &[BTreeSet<TermId>],
    graph: &PrecedenceGraph,
) -> Result<(Vec<Group>, Vec<usize>), Error> {
    let mut groups: Vec<Group> = Vec::new();
    let mut assignment = Vec::with_capacity(required_by_state.len());

    for required in required_by_state {
        let mut placed = None;
        'group_search: for (index, group) in groups.iter().enumerate() {
            for &term in required {
                for &member in group.members.iter() {
                    if member != term && graph.conflicts(term, member) {
                        continue 'group_search;
                    }
                }
            }
            placed = Some(index);
            break;
        }
        let index = match placed {
            Some(index) => index,
            None => {
                if groups.len() >= MAX_GROUPS {
                    return Err(Error::TooManyGroups);
                }
                groups.push(Group::default());
                groups.len() - 1
            }
        };
        groups[index].members.extend(required.iter().cloned());
        assignment.push(index);
    }
    Ok((groups, assignment))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compatible_states_share_a_group() {
        let graph = PrecedenceGraph::new();
        let required = vec![
            BTreeSet::from([1, 2]),
            BTreeSet::from([2, 3]),
        ];
        let (groups, assignment) = partition(&required, &graph).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(assignment, vec![0, 0]);
    }

    #[test]
    fn conflicting_terms_open_a_new_group() {
        let mut graph = PrecedenceGraph::new();
        graph.declare(1);
        graph.declare(2);
        // no precedence relation declared between 1 and 2 -> they conflict
        let required = vec![BTreeSet::from([1]), BTreeSet::from([2])];
        let (groups, assignment) = partition(&required, &graph).unwrap();
        assert_eq!(groups.len(), 2);
        assert_ne!(assignment[0], assignment[1]);
    }

    #[test]
    fn exceeding_max_groups_is_fatal() {
        let mut graph = PrecedenceGraph::new();
        for t in 0..(MAX_GROUPS as u32 + 1) {
            graph.declare(t);
        }
        let required: Vec<BTreeSet<TermId>> = (0..(MAX_GROUPS as u32 + 1))
            .map(|t| BTreeSet::from([t]))
            .collect();
        assert_eq!(partition(&required, &graph).unwrap_err(), Error::TooManyGroups);
    }
}
