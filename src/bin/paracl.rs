// paracl -- a tree-walking interpreter for the ParaCL language
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! `paracl` runs a ParaCL source file: lex, parse, analyze, then execute.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use simple_logger;
use structopt::StructOpt;

use paracl::lang::evaluator::BufferedInput;

#[derive(Debug, StructOpt)]
#[structopt(name = "paracl", about = "Running a ParaCL program")]
struct Opt {
    #[structopt(short = "v", long = "verbose")]
    verbose: bool,

    /// The ParaCL source file to run.
    #[structopt(parse(from_os_str))]
    source: PathBuf,

    /// File to read `?` input from instead of stdin.
    #[structopt(long = "input", parse(from_os_str))]
    input: Option<PathBuf>,
}

fn main() -> ExitCode {
    let opt = Opt::from_args();

    let level = if opt.verbose {
        log::Level::Trace
    } else {
        log::Level::Info
    };
    simple_logger::init_with_level(level).unwrap();

    let source = match std::fs::read_to_string(&opt.source) {
        Ok(source) => source,
        Err(err) => {
            log::error!("failed to read {}: {}", opt.source.display(), err);
            return ExitCode::FAILURE;
        }
    };

    let input = match read_input(opt.input.as_deref()) {
        Ok(input) => input,
        Err(err) => {
            log::error!("failed to read input: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let filename = opt.source.to_string_lossy();
    match paracl::lang::compiler::run(&filename, &source, input, io::stdout()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}

fn read_input(path: Option<&std::path::Path>) -> io::Result<Box<dyn paracl::lang::evaluator::InputStream>> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            Ok(Box::new(BufferedInput::from_str(&text)))
        }
        None => Ok(Box::new(BufferedInput::from_reader(io::stdin())?)),
    }
}
