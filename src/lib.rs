// paracl -- a tree-walking interpreter for the ParaCL language
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! ParaCL interpreter core: arena-backed tree, semantic analyzer, and
//! evaluator, plus the pipeline driver that wires lexer -> parser ->
//! analyzer -> evaluator together for the CLI front-end.

pub mod lang;
