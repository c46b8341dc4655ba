// paracl -- a tree-walking interpreter for the ParaCL language
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! The four error kinds the core can raise, plus the driver-facing
//! [`ParaclError`] that unifies them.

use snafu::Snafu;

use super::location::Location;

#[derive(Debug, Snafu, PartialEq)]
#[snafu(visibility(pub(crate)))]
pub enum LexError {
    #[snafu(display("unrecognized character {:?}", found))]
    Unrecognized { found: char, location: Location },
    #[snafu(display("unterminated string literal"))]
    UnterminatedString { location: Location },
}

impl LexError {
    pub fn location(&self) -> Location {
        match self {
            LexError::Unrecognized { location, .. } => *location,
            LexError::UnterminatedString { location, .. } => *location,
        }
    }
}

#[derive(Debug, Snafu, PartialEq)]
#[snafu(visibility(pub(crate)))]
pub enum ParseError {
    #[snafu(display("expected {}, found {}", expected, found))]
    Unexpected {
        expected: String,
        found: String,
        location: Location,
    },
    #[snafu(display("invalid integer literal: {}", source))]
    InvalidInt {
        source: std::num::ParseIntError,
        location: Location,
    },
    #[snafu(display("unexpected end of input"))]
    Eof { location: Location },
}

impl ParseError {
    pub fn location(&self) -> Location {
        match self {
            ParseError::Unexpected { location, .. } => *location,
            ParseError::InvalidInt { location, .. } => *location,
            ParseError::Eof { location } => *location,
        }
    }
}

/// Errors raised by the semantic analyzer (§4, §7 "semantic-analysis error").
#[derive(Debug, Snafu, PartialEq)]
#[snafu(visibility(pub(crate)))]
pub enum AnalyzeError {
    #[snafu(display("attempt to index unset variable {:?}", name))]
    IndexBeforeInit { name: String, location: Location },

    #[snafu(display("wrong types in assign: {} vs {}", lhs, rhs))]
    AssignTypeMismatch {
        lhs: &'static str,
        rhs: &'static str,
        location: Location,
    },

    #[snafu(display("wrong levels of arrays in assign: {} vs {}", lhs, rhs))]
    ArrayLevelMismatch {
        lhs: usize,
        rhs: usize,
        location: Location,
    },

    #[snafu(display("expected {}, got {}", expected, got))]
    TypeMismatch {
        expected: &'static str,
        got: &'static str,
        location: Location,
    },

    #[snafu(display("attempt to create function with 2 similar variable names"))]
    DuplicateParameter { name: String, location: Location },

    #[snafu(display(
        "different count of declared arguments({}) and count arguments for function call({})",
        declared,
        given
    ))]
    ArityMismatch {
        declared: usize,
        given: usize,
        location: Location,
    },

    #[snafu(display("missing required return statement"))]
    MissingReturn { location: Location },

    #[snafu(display("attempt to use freed array"))]
    FreedArray { location: Location },

    #[snafu(display("non-positive repeat count {}", count))]
    NonPositiveRepeatCount { count: i64, location: Location },

    #[snafu(display("index {} out of range for array of size {}", index, size))]
    IndexOutOfRange {
        index: i64,
        size: usize,
        location: Location,
    },

    #[snafu(display("attempt to index beyond array nesting"))]
    OverIndexed { location: Location },

    #[snafu(display("expected integer condition, got {}", got))]
    InvalidCondition { got: &'static str, location: Location },
}

impl AnalyzeError {
    pub fn location(&self) -> Location {
        match self {
            AnalyzeError::IndexBeforeInit { location, .. } => *location,
            AnalyzeError::AssignTypeMismatch { location, .. } => *location,
            AnalyzeError::ArrayLevelMismatch { location, .. } => *location,
            AnalyzeError::TypeMismatch { location, .. } => *location,
            AnalyzeError::DuplicateParameter { location, .. } => *location,
            AnalyzeError::ArityMismatch { location, .. } => *location,
            AnalyzeError::MissingReturn { location, .. } => *location,
            AnalyzeError::FreedArray { location, .. } => *location,
            AnalyzeError::NonPositiveRepeatCount { location, .. } => *location,
            AnalyzeError::IndexOutOfRange { location, .. } => *location,
            AnalyzeError::OverIndexed { location, .. } => *location,
            AnalyzeError::InvalidCondition { location, .. } => *location,
        }
    }
}

/// Errors raised while executing (§7 "runtime-execution error").
#[derive(Debug, Snafu, PartialEq)]
#[snafu(visibility(pub(crate)))]
pub enum RuntimeError {
    #[snafu(display("failed to read an integer from input"))]
    BadInput { location: Location },

    #[snafu(display("index {} out of range for array of size {}", index, size))]
    IndexOutOfRange {
        index: i64,
        size: usize,
        location: Location,
    },

    #[snafu(display("non-positive repeat count {}", count))]
    NegativeRepeatCount { count: i64, location: Location },

    #[snafu(display("undef used where a value was required"))]
    UndefInCondition { location: Location },

    #[snafu(display("division by zero"))]
    DivisionByZero { location: Location },

    #[snafu(display("missing return value"))]
    MissingReturnValue { location: Location },

    #[snafu(display("attempt to call a value that is not a function"))]
    NotCallable { location: Location },

    #[snafu(display(
        "different count of declared arguments({}) and count arguments for function call({})",
        declared,
        given
    ))]
    ArityMismatch {
        declared: usize,
        given: usize,
        location: Location,
    },

    #[snafu(display("failed to write output: {}", message))]
    OutputFailed { message: String, location: Location },
}

impl RuntimeError {
    pub fn location(&self) -> Location {
        match self {
            RuntimeError::BadInput { location } => *location,
            RuntimeError::IndexOutOfRange { location, .. } => *location,
            RuntimeError::NegativeRepeatCount { location, .. } => *location,
            RuntimeError::UndefInCondition { location } => *location,
            RuntimeError::DivisionByZero { location } => *location,
            RuntimeError::MissingReturnValue { location } => *location,
            RuntimeError::NotCallable { location } => *location,
            RuntimeError::ArityMismatch { location, .. } => *location,
            RuntimeError::OutputFailed { location, .. } => *location,
        }
    }
}

/// Invariant violations: these should never trigger and indicate a bug in
/// the interpreter itself rather than in the program being interpreted.
#[derive(Debug, Snafu, PartialEq)]
#[snafu(visibility(pub(crate)))]
pub enum InternalError {
    #[snafu(display("stack underflow popping {}", what))]
    StackUnderflow { what: &'static str },
}

/// The union of every error kind the driver can receive from this crate.
#[derive(Debug, Snafu)]
pub enum ParaclError {
    #[snafu(display("{}", source))]
    Lex { source: LexError },
    #[snafu(display("{}", source))]
    Parse { source: ParseError },
    #[snafu(display("{}", source))]
    Analyze { source: AnalyzeError },
    #[snafu(display("{}", source))]
    Runtime { source: RuntimeError },
    #[snafu(display("internal error: {}", source))]
    Internal { source: InternalError },
}

impl ParaclError {
    pub fn location(&self) -> Option<Location> {
        match self {
            ParaclError::Lex { source } => Some(source.location()),
            ParaclError::Parse { source } => Some(source.location()),
            ParaclError::Analyze { source } => Some(source.location()),
            ParaclError::Runtime { source } => Some(source.location()),
            ParaclError::Internal { .. } => None,
        }
    }
}

impl From<LexError> for ParaclError {
    fn from(source: LexError) -> Self {
        ParaclError::Lex { source }
    }
}
impl From<ParseError> for ParaclError {
    fn from(source: ParseError) -> Self {
        ParaclError::Parse { source }
    }
}
impl From<AnalyzeError> for ParaclError {
    fn from(source: AnalyzeError) -> Self {
        ParaclError::Analyze { source }
    }
}
impl From<RuntimeError> for ParaclError {
    fn from(source: RuntimeError) -> Self {
        ParaclError::Runtime { source }
    }
}
impl From<InternalError> for ParaclError {
    fn from(source: InternalError) -> Self {
        ParaclError::Internal { source }
    }
}
