// paracl -- a tree-walking interpreter for the ParaCL language
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! The node arena (§2 "Node arena", §3 "Node arena" invariants, §9 "Tree
//! mutation across passes").
//!
//! One [`Arena`] owns every node produced for a single compilation or a
//! single deep copy. It hands out `&'a` references that can be freely
//! copied and stored elsewhere (in other nodes, on the work stack) for as
//! long as the arena itself is alive; there is no reference counting and
//! no per-node deallocation, matching the reference implementation's
//! `buffer_t`, which frees every node in one sweep when the compilation
//! ends.
//!
//! Each node type gets its own `typed_arena::Arena<T>` bucket rather than
//! one arena of a single big enum, the same separation `buffer_t::add_node<NodeT>`
//! has via its one `std::vector<std::unique_ptr<node_t>>` of distinct C++
//! classes downcast by virtual dispatch — here the "downcast" is simply
//! which bucket a reference came from.

use super::ast::{Array, Expr, Function, NameCounter, Scope, Variable};

pub struct Arena<'a> {
    exprs: typed_arena::Arena<Expr<'a>>,
    arrays: typed_arena::Arena<Array<'a>>,
    scopes: typed_arena::Arena<Scope<'a>>,
    variables: typed_arena::Arena<Variable<'a>>,
    functions: typed_arena::Arena<Function<'a>>,
    pub names: NameCounter,
}

impl<'a> Arena<'a> {
    pub fn new() -> Self {
        Arena {
            exprs: typed_arena::Arena::new(),
            arrays: typed_arena::Arena::new(),
            scopes: typed_arena::Arena::new(),
            variables: typed_arena::Arena::new(),
            functions: typed_arena::Arena::new(),
            names: NameCounter::new(),
        }
    }

    pub fn expr(&'a self, e: Expr<'a>) -> &'a Expr<'a> {
        self.exprs.alloc(e)
    }

    pub fn array(&'a self, a: Array<'a>) -> &'a Array<'a> {
        self.arrays.alloc(a)
    }

    pub fn scope(&'a self, s: Scope<'a>) -> &'a Scope<'a> {
        self.scopes.alloc(s)
    }

    pub fn variable(&'a self, v: Variable<'a>) -> &'a Variable<'a> {
        self.variables.alloc(v)
    }

    pub fn function(&'a self, f: Function<'a>) -> &'a Function<'a> {
        self.functions.alloc(f)
    }
}

impl<'a> Default for Arena<'a> {
    fn default() -> Self {
        Self::new()
    }
}
