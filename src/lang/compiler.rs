// paracl -- a tree-walking interpreter for the ParaCL language
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! The pipeline driver: lex -> parse -> analyze (on a deep copy) ->
//! execute, logging each phase the way the base crate's `compile_str`
//! logs lexing/parsing/compiling.

use super::arena::Arena;
use super::copy::copy_program;
use super::error::ParaclError;
use super::evaluator::{execute_program, Evaluator, InputStream};
use super::lexer::Lexer;
use super::location::SourceRef;
use super::parser::Parser;

/// Parses and semantically analyzes `source`, logging a framed diagnostic
/// and returning the first error encountered, same as `compile_str` does
/// for its lex/parse errors. On success, runs the evaluator over the
/// original tree and returns once the program finishes or raises a
/// runtime error.
pub fn run<O: std::io::Write>(
    filename: &str,
    source: &str,
    input: Box<dyn InputStream + 'static>,
    output: O,
) -> Result<(), ParaclError> {
    let source_ref = SourceRef::new(filename, source);
    let arena = Arena::new();

    log::info!("lexing {}", filename);
    let tokens = match Lexer::new(source).tokenize() {
        Ok(tokens) => tokens,
        Err(err) => {
            log_error(&source_ref, err.location(), &err);
            return Err(err.into());
        }
    };

    log::info!("parsing {}", filename);
    let root = match Parser::new(&arena, tokens).parse_program() {
        Ok(root) => root,
        Err(err) => {
            log_error(&source_ref, err.location(), &err);
            return Err(err.into());
        }
    };

    log::info!("analyzing {}", filename);
    // §4.8 / §9: the analyzer runs on a deep copy so its writes (cached
    // function analyze results, folded constants, is_constexpr flags)
    // never reach the tree the evaluator is about to execute.
    let analyze_arena = Arena::new();
    let analyze_root = copy_program(&analyze_arena, root);
    if let Err(err) = super::analyzer::analyze_program(analyze_root) {
        log_error(&source_ref, err.location(), &err);
        return Err(err.into());
    }

    log::info!("executing {}", filename);
    let eval = Evaluator::new(&arena, root, input, output);
    if let Err(err) = execute_program(root, &eval) {
        log_error(&source_ref, err.location(), &err);
        return Err(err.into());
    }

    Ok(())
}

fn log_error<E: std::fmt::Display>(source: &SourceRef, loc: super::location::Location, message: &E) {
    log::error!("error: {}\n{}", message, source.frame(loc));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::evaluator::BufferedInput;

    fn run_ok(src: &str, input: &str) -> String {
        let mut out = Vec::new();
        run(
            "<test>",
            src,
            Box::new(BufferedInput::from_str(input)),
            &mut out,
        )
        .expect("pipeline should succeed");
        String::from_utf8(out).unwrap()
    }

    fn run_err(src: &str) -> ParaclError {
        run("<test>", src, Box::new(BufferedInput::from_str("")), Vec::new()).unwrap_err()
    }

    #[test]
    fn full_pipeline_runs_a_program() {
        assert_eq!(run_ok("x = 2 + 3; print x;", ""), "5\n");
    }

    #[test]
    fn a_semantic_error_is_caught_before_any_output_is_produced() {
        // analyze() runs on a copy before execute() ever touches the real
        // tree (§7 "no partial results are published on failure"), so a
        // program whose *first* statement is fine but whose *second* is a
        // static error produces no output at all.
        let err = run_err("print 1; a = [1,2]; a = 3;");
        assert!(matches!(err, ParaclError::Analyze { .. }));
    }

    #[test]
    fn a_runtime_error_surfaces_as_runtime_not_analyze() {
        let err = run_err("x = 1 / 0;");
        assert!(matches!(err, ParaclError::Runtime { .. }));
    }

    #[test]
    fn a_syntax_error_surfaces_as_parse() {
        let err = run_err("x = ;");
        assert!(matches!(err, ParaclError::Parse { .. }));
    }
}
