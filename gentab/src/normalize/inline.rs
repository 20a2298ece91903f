// Copyright 2021 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>
//
// Inlining pass (spec.md 4.1). A rule is inlinable when it is not
// tagged ("interesting"), does not directly self-recurse, has fewer than
// 3 terms, is not in the preserve set, and either has length 1 or no
// *other* rule under the same skip uses its lhs.

use std::collections::BTreeMap;

use crate::rule::{Conflict, Rule};
use crate::symbol::term::Term;

fn is_interesting(term: &Term) -> bool {
    term.tag().is_some()
}

fn self_recursive(rule: &Rule) -> bool {
    rule.parts().iter().any(|t| t == rule.lhs())
}

/// A rule's lhs is inlinable only while exactly one defining rule exists
/// for it; once merging unifies two lhs names this no longer holds, but
/// merging runs after inlining reaches fixpoint so that ordering is safe.
fn is_inlinable(rule: &Rule, rules: &[Rule]) -> bool {
    if is_interesting(rule.lhs()) || rule.lhs().is_preserved() || rule.lhs().is_top() {
        return false;
    }
    if self_recursive(rule) {
        return false;
    }
    if rule.len() >= 3 {
        return false;
    }
    if rule.len() == 1 {
        return true;
    }
    let other_uses = rules.iter().any(|other| {
        other.lhs() != rule.lhs()
            && other.skip() == rule.skip()
            && other.parts().iter().any(|t| t == rule.lhs())
    });
    !other_uses
}

/// Splice `target`'s parts into every occurrence of `target.lhs()` inside
/// `rules`, merging conflict records at the splice boundary (the two
/// adjoining `Conflict`s at the occurrence position collapse into the
/// first and last conflicts of the spliced-in range; the target's own
/// interior conflicts are preserved).
fn splice(rules: &[Rule], target: &Rule) -> Vec<Rule> {
    let mut next_ident = rules.iter().map(|r| r.ident()).max().unwrap_or(0) + 1;
    let mut result = Vec::new();
    for rule in rules {
        if rule.lhs() == target.lhs() {
            continue;
        }
        let mut occurs = false;
        let mut new_parts = Vec::new();
        let mut new_conflicts = vec![rule.conflict_at(0).clone()];
        for (index, part) in rule.parts().iter().enumerate() {
            if part == target.lhs() {
                occurs = true;
                let before = rule.conflict_at(index).clone();
                let after = rule.conflict_at(index + 1).clone();
                if target.is_empty() {
                    *new_conflicts.last_mut().unwrap() = merge_conflict(before, after);
                } else {
                    *new_conflicts.last_mut().unwrap() =
                        merge_conflict(before, target.conflict_at(0).clone());
                    for i in 0..target.len() {
                        new_parts.push(target.parts()[i].clone());
                        let inner = target.conflict_at(i + 1).clone();
                        if i + 1 == target.len() {
                            new_conflicts.push(merge_conflict(inner, after));
                        } else {
                            new_conflicts.push(inner);
                        }
                    }
                }
            } else {
                new_parts.push(part.clone());
                new_conflicts.push(rule.conflict_at(index + 1).clone());
            }
        }
        if occurs {
            result.push(Rule::with_conflicts(
                next_ident,
                rule.lhs().clone(),
                new_parts,
                new_conflicts,
                rule.skip().cloned(),
            ));
            next_ident += 1;
        } else {
            result.push(rule.clone());
        }
    }
    result
}

fn merge_conflict(a: Conflict, b: Conflict) -> Conflict {
    if a.precedence.is_some() {
        a
    } else {
        b
    }
}

/// Repeat until a pass inlines nothing (spec.md 4.1 "Fixpoint").
pub fn inline_to_fixpoint(mut rules: Vec<Rule>) -> Vec<Rule> {
    loop {
        let mut inlined_any = false;
        // Group defining rules by lhs so a single-definition lhs can be
        // identified (a lhs with more than one rule is a genuine choice
        // point and is never inlined, even if each individual rule would
        // otherwise qualify).
        let mut by_lhs: BTreeMap<String, Vec<&Rule>> = BTreeMap::new();
        for rule in rules.iter() {
            by_lhs.entry(rule.lhs().name().to_string()).or_default().push(rule);
        }
        let candidate = by_lhs
            .into_iter()
            .find(|(_, defs)| defs.len() == 1 && is_inlinable(defs[0], &rules))
            .map(|(_, defs)| defs[0].clone());
        if let Some(target) = candidate {
            rules = splice(&rules, &target);
            inlined_any = true;
        }
        if !inlined_any {
            break;
        }
    }
    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexable::Location;
    use crate::symbol::term::Term;

    fn term(name: &str, terminal: bool) -> Term {
        let loc = Location::new("g", 1, 1);
        if terminal {
            Term::new_terminal(name, &loc)
        } else {
            Term::new_non_terminal(name, &loc)
        }
    }

    #[test]
    fn single_use_nonterminal_is_inlined() {
        let top = term("top", false);
        let mid = term("mid", false);
        let a = term("a", true);
        let rule_mid = Rule::new(1, mid.clone(), vec![a], None);
        let rule_top = Rule::new(2, top.clone(), vec![mid], None);
        let rules = vec![rule_top, rule_mid];
        let result = inline_to_fixpoint(rules);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].parts().len(), 1);
        assert_eq!(result[0].parts()[0].name(), "a");
    }
}
