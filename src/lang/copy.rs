// paracl -- a tree-walking interpreter for the ParaCL language
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! Per-call deep copy (§4.7 "Call binding", §9 "Tree mutation across
//! passes").
//!
//! The reference implementation gives every call its own copy of the
//! called function's parameters and body so that recursion and repeated
//! calls don't clobber each other's variable storage, registering the
//! function's own copy into `global_scope` before copying its body so a
//! recursive self-call resolves to the right frame.
//!
//! Here, calls are already wired directly to a `&Function` (resolved at
//! parse time, §4.7), so a recursive self-call inside a body always
//! refers back to the same *template* `Function`, never to a copy.
//! That means only the parameters and the body need copying per call;
//! nested or recursive calls reached from inside a copy still go through
//! `instantiate_call` again, from the template, the next time they
//! execute. `Copier` keeps a pointer-identity map per node kind so that
//! a name referenced twice inside one body (the common case) is copied
//! once and shared consistently within that call's frame.

use std::cell::RefCell;
use std::collections::HashMap;

use super::arena::Arena;
use super::ast::{Array, ArrayElem, Callee, Expr, Function, Scope, Stmt, Variable};

pub struct CallFrame<'a> {
    pub params: Vec<&'a Variable<'a>>,
    pub body: &'a Scope<'a>,
}

/// `global_scope` is the program's top-level scope: a variable bound
/// there directly (e.g. a function's own name, written by
/// `name = func(...) {...};` at top level) is shared unchanged across
/// every call rather than copied, the way the reference implementation's
/// per-copy `global_scope` table keeps one persistent binding reachable
/// from any call frame (§3 "except through the function's explicit
/// closure over the surrounding `global_scope`"). Only variables actually
/// local to the function being instantiated -- its parameters and
/// anything declared inside its body -- get fresh per-call storage.
pub fn instantiate_call<'a>(
    arena: &'a Arena<'a>,
    func: &'a Function<'a>,
    global_scope: &'a Scope<'a>,
) -> CallFrame<'a> {
    let copier = Copier::new(arena, Some(global_scope));
    let params = func.params.iter().map(|p| copier.copy_variable(p)).collect();
    let body = copier.copy_scope(func.body);
    CallFrame { params, body }
}

/// Deep-copies an entire parsed program (§9 "Tree mutation across passes",
/// invariant 1: "analyzing a program never mutates the tree the evaluator
/// later executes"). The analyzer runs against the returned copy; the
/// original, produced by the parser, is left untouched for `Evaluator`.
/// Unlike a per-call copy, nothing here is shared with the original --
/// the whole tree, including top-level variables, must become
/// independent so the analyzer's writes can never reach the evaluator's
/// tree.
///
/// Function literals reached from the program are not copied eagerly --
/// same as in `instantiate_call` -- since `Function::analyze_call` already
/// caches its per-function analysis result on the shared template and a
/// call always re-instantiates its own fresh body copy at call time.
pub fn copy_program<'a>(arena: &'a Arena<'a>, root: &'a Scope<'a>) -> &'a Scope<'a> {
    let copier = Copier::new(arena, None);
    copier.copy_scope(root)
}

struct Copier<'a> {
    arena: &'a Arena<'a>,
    variables: RefCell<HashMap<usize, &'a Variable<'a>>>,
    arrays: RefCell<HashMap<usize, &'a Array<'a>>>,
    scopes: RefCell<HashMap<usize, &'a Scope<'a>>>,
    /// The copied scope whose statements are currently being copied, so
    /// a freshly copied `Array` can register itself in the right memory
    /// table the way the parser does at first construction (§3
    /// "Lifecycle": "Arrays are added to the enclosing scope's memory
    /// table at the moment of their construction node's copy").
    current_scope: RefCell<Option<&'a Scope<'a>>>,
    /// `Some(global)` during a per-call copy: variables bound directly in
    /// `global` are shared, not copied. `None` during a whole-program
    /// copy, where everything is copied.
    share_root: Option<&'a Scope<'a>>,
}

fn key<T>(p: *const T) -> usize {
    p as usize
}

impl<'a> Copier<'a> {
    fn new(arena: &'a Arena<'a>, share_root: Option<&'a Scope<'a>>) -> Self {
        Copier {
            arena,
            variables: RefCell::new(HashMap::new()),
            arrays: RefCell::new(HashMap::new()),
            scopes: RefCell::new(HashMap::new()),
            current_scope: RefCell::new(None),
            share_root,
        }
    }

    fn copy_variable(&self, v: &'a Variable<'a>) -> &'a Variable<'a> {
        if let Some(global) = self.share_root {
            if global.local_variables().iter().any(|g| std::ptr::eq(*g, v)) {
                return v;
            }
        }
        let k = key(v);
        if let Some(&c) = self.variables.borrow().get(&k) {
            return c;
        }
        let fresh = self.arena.variable(Variable::new(v.name.clone(), v.location.get()));
        self.variables.borrow_mut().insert(k, fresh);
        fresh
    }

    fn copy_array(&self, a: &'a Array<'a>) -> &'a Array<'a> {
        let k = key(a);
        if let Some(&c) = self.arrays.borrow().get(&k) {
            return c;
        }
        let elems: Vec<ArrayElem<'a>> = a.elems.iter().map(|e| self.copy_array_elem(e)).collect();
        let indexes: Vec<&'a Expr<'a>> = a.init_indexes.iter().map(|i| self.copy_expr(i)).collect();
        let fresh = self.arena.array(Array::new(a.location, elems, indexes));
        // Mirror the parser: register the copy with whichever copied
        // scope is currently being built, so scope exit can find and
        // reset/free it the same way it would for the original tree.
        if let Some(scope) = *self.current_scope.borrow() {
            scope.add_array(fresh);
        }
        self.arrays.borrow_mut().insert(k, fresh);
        fresh
    }

    fn copy_array_elem(&self, e: &ArrayElem<'a>) -> ArrayElem<'a> {
        match e {
            ArrayElem::Value(v) => ArrayElem::Value(self.copy_expr(v)),
            ArrayElem::Repeat { value, count } => ArrayElem::Repeat {
                value: self.copy_expr(value),
                count: self.copy_expr(count),
            },
        }
    }

    fn copy_scope(&self, s: &'a Scope<'a>) -> &'a Scope<'a> {
        let k = key(s);
        if let Some(&c) = self.scopes.borrow().get(&k) {
            return c;
        }
        // Only scopes nested *inside* the body being copied have already
        // been registered; a body's own parent (the lexical scope where
        // the function was defined) is outside the copy and simply
        // becomes unreachable, which is fine since nothing past parse
        // time walks `Scope::parent`.
        let parent_copy = s.parent.and_then(|p| self.scopes.borrow().get(&key(p)).copied());
        let fresh = self.arena.scope(Scope::new(s.location, s.kind.get(), parent_copy));
        self.scopes.borrow_mut().insert(k, fresh);

        let outer_scope = self.current_scope.replace(Some(fresh));
        for stmt in s.statements().iter() {
            let copied = self.copy_stmt(stmt);
            fresh.push_statement(copied);
        }
        if let Some(ret) = s.return_expr() {
            fresh.set_return(self.copy_expr(ret));
        }
        self.current_scope.replace(outer_scope);
        fresh
    }

    fn copy_stmt(&self, s: &Stmt<'a>) -> Stmt<'a> {
        match s {
            Stmt::Instruction(e) => Stmt::Instruction(self.copy_expr(e)),
            Stmt::Loop { cond, body } => Stmt::Loop {
                cond: self.copy_expr(cond),
                body: self.copy_scope(body),
            },
            Stmt::Fork { cond, then_body, else_body } => Stmt::Fork {
                cond: self.copy_expr(cond),
                then_body: self.copy_scope(then_body),
                else_body: self.copy_scope(else_body),
            },
            Stmt::Block(scope) => Stmt::Block(self.copy_scope(scope)),
        }
    }

    fn copy_expr(&self, e: &'a Expr<'a>) -> &'a Expr<'a> {
        let new = match e {
            Expr::Number(n) => Expr::Number(*n),
            Expr::Undef => Expr::Undef,
            Expr::Input => Expr::Input,
            Expr::Lvalue { variable, indexes } => Expr::Lvalue {
                variable: self.copy_variable(variable),
                indexes: indexes.iter().map(|i| self.copy_expr(i)).collect(),
            },
            Expr::Assign { target, value } => Expr::Assign {
                target: self.copy_expr(target),
                value: self.copy_expr(value),
            },
            Expr::BinOp { op, left, right } => Expr::BinOp {
                op: *op,
                left: self.copy_expr(left),
                right: self.copy_expr(right),
            },
            Expr::UnOp { op, operand } => Expr::UnOp {
                op: *op,
                operand: self.copy_expr(operand),
            },
            Expr::Print(inner) => Expr::Print(self.copy_expr(inner)),
            Expr::ArrayLit(arr) => Expr::ArrayLit(self.copy_array(arr)),
            Expr::ScopeExpr(scope) => Expr::ScopeExpr(self.copy_scope(scope)),
            // A nested function literal is its own template; it is only
            // ever instantiated when called, so the reference is left
            // untouched rather than eagerly copied here.
            Expr::FunctionLit(f) => Expr::FunctionLit(f),
            Expr::Call { callee, args } => Expr::Call {
                callee: match callee {
                    Callee::ByName(f) => Callee::ByName(f),
                    Callee::ByExpr(inner) => Callee::ByExpr(self.copy_expr(inner)),
                },
                args: args.iter().map(|a| self.copy_expr(a)).collect(),
            },
        };
        self.arena.expr(new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::ast::{ScopeKind, Value};
    use crate::lang::location::Location as Loc;

    fn loc() -> Loc {
        Loc::new(1, 1, 1)
    }

    #[test]
    fn call_frame_gets_independent_variable_storage() {
        let arena = Arena::new();
        let body = arena.scope(Scope::new(loc(), ScopeKind::ExpressionReturn, None));
        let param = arena.variable(Variable::new("n", loc()));
        body.define_variable(param);
        let lvalue = arena.expr(Expr::Lvalue { variable: param, indexes: Vec::new() });
        body.set_return(lvalue);
        let func = arena.function(Function::new(loc(), "f".to_string(), vec![param], body));

        param.set(Value::Int(7));

        let global = arena.scope(Scope::new(loc(), ScopeKind::Statement, None));
        let frame1 = instantiate_call(&arena, func, global);
        let frame2 = instantiate_call(&arena, func, global);
        frame1.params[0].set(Value::Int(1));
        frame2.params[0].set(Value::Int(2));

        assert_eq!(frame1.params[0].get(), Value::Int(1));
        assert_eq!(frame2.params[0].get(), Value::Int(2));
        // the original template variable is untouched by either call
        assert_eq!(param.get(), Value::Int(7));
    }
}
