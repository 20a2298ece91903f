// Copyright 2021 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>
//
// Demo driver (grounded on `alap_gen_ng/src/main.rs`): the teacher reads a
// grammar-specification file and compiles it. This crate has no
// grammar-file parser (spec.md 1 "out of scope"), so there is no file to
// open; instead this builds a small arithmetic grammar directly through
// the `ast` builder API and runs it through the same generator pipeline
// the teacher's `TryFrom<Specification> for Grammar` runs, then reports
// the shape of what came out.

use clap::crate_authors;
use structopt::StructOpt;

use gentab::ast::{Expression, Rule as AstRule, Spec, TopLevelItem};
use gentab::diagnostics::Diagnostics;
use gentab::driver::{self, TokenizerInput};
use gentab::symbol::SymbolTable;
use lexable::{Location, TokenExpr, TokenRule};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "gentab",
    about = "LR(1)/LALR table generator demo",
    author = crate_authors!(),
)]
struct CLOptions {
    /// Total number of warnings (unused rules, unknown precedence targets)
    /// the demo grammar is expected to produce.
    #[structopt(short, long, default_value = "0")]
    expect: usize,
}

fn reference(name: &str) -> Expression {
    Expression::Reference {
        name: name.to_string(),
        args: vec![],
    }
}

fn seq(parts: &[&str]) -> Expression {
    Expression::Seq(parts.iter().map(|p| (reference(p), None)).collect())
}

/// `expr -> expr '+' term | term`, `term -> term '*' factor | factor`,
/// `factor -> num | '(' expr ')'` — left-recursive and unambiguous, so it
/// needs no conflict markers or precedence declarations to resolve (unlike
/// spec.md 8's "Arith" scenario, which exercises that machinery directly
/// in `driver`'s own tests).
fn demo_spec(symbols: &mut SymbolTable) -> (Spec, TokenizerInput) {
    let loc = Location::new("demo", 1, 1);
    let num = symbols.new_literal_terminal("num", "num", &loc).unwrap();
    let plus = symbols.new_literal_terminal("plus", "+", &loc).unwrap();
    let star = symbols.new_literal_terminal("star", "*", &loc).unwrap();
    let lparen = symbols.new_literal_terminal("lparen", "(", &loc).unwrap();
    let rparen = symbols.new_literal_terminal("rparen", ")", &loc).unwrap();

    let mut spec = Spec::new();
    spec.push(TopLevelItem::GrammarRule(AstRule {
        name: "expr".to_string(),
        params: vec![],
        exported: false,
        tag: None,
        body: Expression::Choice(vec![seq(&["expr", "plus", "term"]), reference("term")]),
        defined_at: loc.clone(),
    }));
    spec.push(TopLevelItem::GrammarRule(AstRule {
        name: "term".to_string(),
        params: vec![],
        exported: false,
        tag: None,
        body: Expression::Choice(vec![seq(&["term", "star", "factor"]), reference("factor")]),
        defined_at: loc.clone(),
    }));
    spec.push(TopLevelItem::GrammarRule(AstRule {
        name: "factor".to_string(),
        params: vec![],
        exported: false,
        tag: None,
        body: Expression::Choice(vec![
            reference("num"),
            seq(&["lparen", "expr", "rparen"]),
        ]),
        defined_at: loc,
    }));
    spec.push(TopLevelItem::Top(reference("expr")));

    let tokenizer = TokenizerInput {
        rules: vec![
            TokenRule {
                name: "num".to_string(),
                body: TokenExpr::Plus(Box::new(TokenExpr::CharSet(lexable::builtins::DIGIT.clone()))),
            },
            TokenRule {
                name: "plus".to_string(),
                body: TokenExpr::Literal("+".to_string()),
            },
            TokenRule {
                name: "star".to_string(),
                body: TokenExpr::Literal("*".to_string()),
            },
            TokenRule {
                name: "lparen".to_string(),
                body: TokenExpr::Literal("(".to_string()),
            },
            TokenRule {
                name: "rparen".to_string(),
                body: TokenExpr::Literal(")".to_string()),
            },
        ],
        entries: vec![
            (num, "num".to_string(), 0),
            (plus, "plus".to_string(), 0),
            (star, "star".to_string(), 0),
            (lparen, "lparen".to_string(), 0),
            (rparen, "rparen".to_string(), 0),
        ],
        priority: vec![],
    };
    (spec, tokenizer)
}

fn main() {
    let cl_options = CLOptions::from_args();

    let mut symbols = SymbolTable::new();
    let (spec, tokenizer) = demo_spec(&mut symbols);
    let mut diagnostics = Diagnostics::default();

    let artifact = match driver::build(&spec, tokenizer, &mut symbols, &mut diagnostics) {
        Ok(artifact) => artifact,
        Err(driver::Error::Normalize(e)) => {
            eprintln!("{}", e);
            std::process::exit(4);
        }
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(5);
        }
    };

    println!(
        "{} LR states, {} token group(s), {} term(s), {} tag(s)",
        artifact.tables.states.len(),
        artifact.tokenizers.len(),
        artifact.term_names.len(),
        artifact.tag_names.len(),
    );

    if diagnostics.warning_count() != cl_options.expect {
        eprintln!(
            "Unexpected warning count ({}, expected {}), aborting",
            diagnostics.warning_count(),
            cl_options.expect
        );
        std::process::exit(1);
    }
}
