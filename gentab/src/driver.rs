// Copyright 2021 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>
//
// Orchestration (spec.md 2 "Data flow"): surface AST -> normalizer ->
// `(rules, terms, tokens)` -> parallel branches { LR-builder ->
// LALR-collapser ; NFA/DFA builder } -> token-group assignment (uses LR
// states) -> table packer -> emitted artifact. Grounded on the teacher's
// `grammar.rs`'s `TryFrom<Specification> for Grammar` pipeline, which
// runs the equivalent steps (symbol table -> productions -> FIRST sets ->
// parser states) one after another inside a single conversion.
//
// This crate has no grammar-file parser (spec.md 1 "out of scope"), so
// the entry point takes an already-built `ast::Spec` plus a tokenizer
// description, rather than grammar source text.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use lexable::nfa::TermId;
use lexable::{conflicts, dfa, groups, nfa, pack as lex_pack, LexTables};

use crate::ast::Spec;
use crate::diagnostics::Diagnostics;
use crate::lalr::{self, CollapsedState};
use crate::lr1;
use crate::normalize;
use crate::pack as table_pack;
use crate::rule::Rule;
use crate::symbol::term::Term;
use crate::symbol::SymbolTable;

#[derive(Debug)]
pub enum Error {
    Normalize(normalize::Error),
    Automaton(lr1::automaton::Error),
    Tokenizer(nfa::Error),
    TokenPrecedence(conflicts::Error),
    TokenGroups(groups::Error),
    UnresolvedTokenConflict(TermId, TermId),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Normalize(e) => write!(f, "{}", e),
            Error::Automaton(e) => write!(f, "{}", e),
            Error::Tokenizer(e) => write!(f, "{}", e),
            Error::TokenPrecedence(e) => write!(f, "{}", e),
            Error::TokenGroups(e) => write!(f, "{}", e),
            Error::UnresolvedTokenConflict(a, b) => write!(
                f,
                "tokens {} and {} conflict in some context with no precedence between them",
                a, b
            ),
        }
    }
}

impl std::error::Error for Error {}

impl From<normalize::Error> for Error {
    fn from(e: normalize::Error) -> Self {
        Error::Normalize(e)
    }
}

impl From<lr1::automaton::Error> for Error {
    fn from(e: lr1::automaton::Error) -> Self {
        Error::Automaton(e)
    }
}

/// The tokenizer half of the input: token-rule bodies plus the
/// `(terminal, rule name, precedence)` entries to compile against them,
/// and the priority pairs that resolve same-state accept conflicts
/// (spec.md 4.4 "Conflicts").
#[derive(Default)]
pub struct TokenizerInput {
    pub rules: Vec<lexable::TokenRule>,
    pub entries: Vec<(Term, String, i32)>,
    pub priority: Vec<(Term, Term)>,
}

/// Everything the external output-serialization step (out of scope per
/// spec.md 1) needs to emit the two output artifacts described in
/// spec.md 6: the packed parser tables, one `LexTables` per token group,
/// and the name/tag tables a term-id-keyed output module is built from.
pub struct GeneratedArtifact {
    pub tables: table_pack::Tables,
    pub tokenizers: Vec<LexTables>,
    /// Group index assigned to each collapsed state, in state-id order —
    /// the same assignment already folded into `tables.states[i].tokenizer_mask`.
    pub state_groups: Vec<usize>,
    pub term_ids: BTreeMap<Term, u32>,
    pub term_names: Vec<String>,
    pub tag_names: Vec<String>,
    pub rules: Vec<Rule>,
}

/// Naive fixpoint over every non-terminal's FIRST set (spec.md 4.2
/// "FIRST sets"): each `Term::set_firsts_data` call is itself a fixpoint
/// over the rules headed by that term, but it reads other terms' already
/// -cached FIRST sets, so the outer loop here must also iterate to a
/// fixpoint across the whole non-terminal population.
fn compute_firsts(rules: &[Rule], symbols: &SymbolTable) {
    let non_terminals: Vec<Term> = symbols.terms().filter(|t| t.is_non_terminal()).cloned().collect();
    let mut changed = true;
    let mut guard = 0;
    while changed {
        changed = false;
        guard += 1;
        for term in &non_terminals {
            let before = term.firsts();
            term.set_firsts_data(rules);
            if term.firsts() != before {
                changed = true;
            }
        }
        // Defensive recursion-depth cap (spec.md 5): a fixpoint over a
        // finite term population converges in at most |non_terminals|
        // passes, so this can only trip on a driver bug, not real input.
        if guard > non_terminals.len() + 64 {
            break;
        }
    }
}

/// Warn on every named grammar rule never referenced from anywhere in the
/// grammar (spec.md 7 "unused rule"), `@export`ed lhs excluded since those
/// are roots by definition rather than orphans. Checked against the
/// `Term::used_at` trail left by `expand` rather than by scanning the
/// normalized rule list: the inliner splices a rule's own definition out
/// of that list the moment it decides to inline it, whether or not any
/// occurrence was actually found to substitute it into, so an orphaned
/// rule's unreferenced-ness would otherwise vanish along with its body.
fn warn_unused_rules(spec: &Spec, symbols: &SymbolTable, diagnostics: &mut Diagnostics) {
    for rule in spec.grammar_rules() {
        let term = match symbols.terms().find(|t| t.name() == rule.name) {
            Some(term) => term,
            None => continue,
        };
        if term.is_preserved() {
            continue;
        }
        if term.is_unused() {
            diagnostics.warn(
                term.first_definition(),
                format!("unused rule \"{}\"", rule.name),
            );
        }
    }
}

/// Assign a stable term id to every term reachable from `rules` plus the
/// three always-present terms, in name order (spec.md 5 "Ordering
/// guarantees": "deterministic output").
fn assign_term_ids(rules: &[Rule], symbols: &SymbolTable) -> (BTreeMap<Term, u32>, Vec<String>) {
    let mut all: BTreeSet<Term> = BTreeSet::new();
    for rule in rules {
        all.insert(rule.lhs().clone());
        for part in rule.parts() {
            all.insert(part.clone());
        }
    }
    all.insert(symbols.top());
    all.insert(symbols.eof());
    all.insert(symbols.error());
    let mut ids = BTreeMap::new();
    let mut names = Vec::with_capacity(all.len());
    for (index, term) in all.into_iter().enumerate() {
        names.push(term.name().to_string());
        ids.insert(term, index as u32);
    }
    (ids, names)
}

/// The terminal ids a collapsed state's tokenizer must be able to
/// recognize: every terminal it has a shift (or specialize-derived
/// shift) action for (spec.md 4.5 "Algorithm": "collect the set of
/// shift/specialize terms referenced"). `eof`/`error` are structural
/// markers the tokenizer never scans for, so they are excluded.
fn required_terminals(state: &CollapsedState, term_ids: &BTreeMap<Term, u32>) -> BTreeSet<TermId> {
    state
        .actions
        .keys()
        .filter(|term| term.is_terminal() && !term.is_eof() && !term.is_error())
        .filter_map(|term| term_ids.get(term).copied())
        .collect()
}

/// Run the full pipeline: normalize, build+collapse the LR(1) automaton,
/// build the tokenizer DFA(s) partitioned into token groups, and pack
/// everything into flat tables (spec.md 2 "Data flow").
pub fn build(
    spec: &Spec,
    tokenizer: TokenizerInput,
    symbols: &mut SymbolTable,
    diagnostics: &mut Diagnostics,
) -> Result<GeneratedArtifact, Error> {
    let rules = normalize::normalize(spec, symbols, diagnostics)?;
    compute_firsts(&rules, symbols);
    warn_unused_rules(spec, symbols, diagnostics);

    let (term_ids, term_names) = assign_term_ids(&rules, symbols);

    let top = symbols.top();
    let eof = symbols.eof();
    let automaton = lr1::automaton::build(&rules, &top, &eof)?;
    let collapsed = lalr::collapse(&automaton);

    let mut graph = conflicts::PrecedenceGraph::new();
    let mut entry_ids: Vec<(TermId, String, i32)> = Vec::with_capacity(tokenizer.entries.len());
    for (term, rule_name, precedence) in &tokenizer.entries {
        let id = *term_ids
            .get(term)
            .expect("tokenizer entry term must be part of the grammar's term set");
        graph.declare(id);
        entry_ids.push((id, rule_name.clone(), *precedence));
    }
    for (higher, lower) in &tokenizer.priority {
        let higher_id = *term_ids.get(higher).expect("precedence term must be known");
        let lower_id = *term_ids.get(lower).expect("precedence term must be known");
        graph.prefer(higher_id, lower_id);
    }
    let priority = graph.topological_priority().map_err(Error::TokenPrecedence)?;

    let full_nfa = nfa::build(&tokenizer.rules, &entry_ids).map_err(Error::Tokenizer)?;
    let mut full_dfa = dfa::build(&full_nfa);
    dfa::annotate_accepting(&mut full_dfa, &full_nfa, &priority);
    if let Some(&(a, b)) = conflicts::unresolved_conflicts(&full_dfa, &graph).first() {
        return Err(Error::UnresolvedTokenConflict(a, b));
    }

    let required_by_state: Vec<BTreeSet<TermId>> = collapsed
        .iter()
        .map(|state| required_terminals(state, &term_ids))
        .collect();
    let (token_groups, state_groups) =
        groups::partition(&required_by_state, &graph).map_err(Error::TokenGroups)?;

    let mut tokenizers = Vec::with_capacity(token_groups.len());
    for group in &token_groups {
        let filtered: Vec<(TermId, String, i32)> = entry_ids
            .iter()
            .filter(|(id, _, _)| group.members.contains(id))
            .cloned()
            .collect();
        let group_nfa = nfa::build(&tokenizer.rules, &filtered).map_err(Error::Tokenizer)?;
        let mut group_dfa = dfa::build(&group_nfa);
        dfa::annotate_accepting(&mut group_dfa, &group_nfa, &priority);
        tokenizers.push(lex_pack::pack(&group_dfa));
    }

    let mut tables = table_pack::pack(&collapsed, &rules, &term_ids);
    for (record, &group_id) in tables.states.iter_mut().zip(state_groups.iter()) {
        record.tokenizer_mask = 1u16 << group_id;
    }
    // Genuinely stateful skips (spec.md 4.5 "Skip interaction") need their
    // own injected tokenizer states, which this generator doesn't build;
    // reported rather than silently dropped.
    for (state_id, skip) in &tables.stateful_skips {
        diagnostics.warn(
            skip.first_definition(),
            format!(
                "skip rule \"{}\" is self-recursive (state {}); stateful skip rules are not yet inlined into the table",
                skip.name(),
                state_id
            ),
        );
    }

    let tag_names = symbols.tags().map(|tag| tag.name()).collect();

    Ok(GeneratedArtifact {
        tables,
        tokenizers,
        state_groups,
        term_ids,
        term_names,
        tag_names,
        rules,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expression, TopLevelItem};
    use lexable::{TokenExpr, TokenRule};

    fn num_token_input(symbols: &mut SymbolTable) -> (Term, TokenizerInput) {
        let loc = lexable::Location::new("g", 1, 1);
        let num = symbols.new_literal_terminal("num", "num", &loc).unwrap();
        let input = TokenizerInput {
            rules: vec![TokenRule {
                name: "num".to_string(),
                body: TokenExpr::Plus(Box::new(TokenExpr::CharSet(lexable::builtins::DIGIT.clone()))),
            }],
            entries: vec![(num.clone(), "num".to_string(), 0)],
            priority: vec![],
        };
        (num, input)
    }

    #[test]
    fn builds_tables_for_trivial_grammar() {
        let mut symbols = SymbolTable::new();
        let (num, tokenizer) = num_token_input(&mut symbols);
        let mut spec = Spec::new();
        spec.push(TopLevelItem::Top(Expression::Reference {
            name: "num".to_string(),
            args: vec![],
        }));
        let _ = &num;
        let mut diagnostics = Diagnostics::collecting();
        let artifact = build(&spec, tokenizer, &mut symbols, &mut diagnostics).unwrap();
        assert!(!artifact.tables.states.is_empty());
        assert_eq!(artifact.tokenizers.len(), artifact.state_groups.iter().max().unwrap() + 1);
        assert!(artifact.term_ids.contains_key(&symbols.top()));
    }

    #[test]
    fn unused_rule_produces_a_warning() {
        let mut symbols = SymbolTable::new();
        let (_num, tokenizer) = num_token_input(&mut symbols);
        let loc = lexable::Location::new("g", 1, 1);
        let mut spec = Spec::new();
        spec.push(TopLevelItem::Top(Expression::Reference {
            name: "num".to_string(),
            args: vec![],
        }));
        spec.push(TopLevelItem::GrammarRule(crate::ast::Rule {
            name: "orphan".to_string(),
            params: vec![],
            exported: false,
            tag: None,
            body: Expression::Reference {
                name: "num".to_string(),
                args: vec![],
            },
            defined_at: loc,
        }));
        let mut diagnostics = Diagnostics::collecting();
        build(&spec, tokenizer, &mut symbols, &mut diagnostics).unwrap();
        assert!(diagnostics
            .warnings()
            .iter()
            .any(|w| w.message.contains("unused rule \"orphan\"")));
    }
}
