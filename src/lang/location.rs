// paracl -- a tree-walking interpreter for the ParaCL language
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! Source locations and diagnostic framing.
//!
//! Unlike the byte-offset based `Span` this crate's lexer used to track,
//! every location here is a `(row, col, len)` triple computed while
//! scanning, since the core only ever needs to frame a single line.

use std::fmt;
use std::rc::Rc;

/// A location within a source file: 1-based row/column plus a length in
/// characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub row: usize,
    pub col: usize,
    pub len: usize,
}

impl Location {
    pub fn new(row: usize, col: usize, len: usize) -> Self {
        Self { row, col, len }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.col)
    }
}

/// A program's filename and full text, shared by every diagnostic raised
/// while compiling or running it. Cheaply clonable so error values don't
/// need to borrow from the source.
#[derive(Debug, Clone)]
pub struct SourceRef {
    pub filename: Rc<str>,
    pub text: Rc<str>,
}

impl SourceRef {
    pub fn new(filename: &str, text: &str) -> Self {
        Self {
            filename: filename.into(),
            text: text.into(),
        }
    }

    /// Render `loc` as the offending source line with an underline beneath
    /// the offending span, followed by `at <file>:<row>:<col>`.
    pub fn frame(&self, loc: Location) -> String {
        let line = self.text.lines().nth(loc.row.saturating_sub(1)).unwrap_or("");
        let underline: String = std::iter::repeat(' ')
            .take(loc.col.saturating_sub(1))
            .chain(std::iter::repeat('^').take(loc.len.max(1)))
            .collect();
        format!(
            "{}\n{}\nat {}:{}",
            line, underline, self.filename, loc
        )
    }
}
