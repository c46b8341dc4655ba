// paracl -- a tree-walking interpreter for the ParaCL language
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! Semantic analysis (§4, §7 "semantic-analysis error").
//!
//! Walks the tree the parser built, in place, propagating a
//! [`GeneralType`]/array-level/`is_constexpr` summary for every
//! expression (§3 "Analyze") and writing it back into the `Variable`
//! and `Array` nodes it touches. Structural checks (assignment
//! type/level compatibility, duplicate parameters, arity, a missing
//! `return`) are always caught here. Index bound checks
//! (`IndexOutOfRange`, `OverIndexed`) are also caught here whenever the
//! index is a compile-time constant and the array isn't in-heap (§8
//! property 5); a `repeat` count is expanded cell-for-cell when it's
//! constexpr, same as the evaluator's `e_values`. Indexing with a
//! non-constant index, or into an array whose size depends on `?`, is
//! instead the evaluator's job (the matching `RuntimeError` variants),
//! since this pass only has constant-folded values for the subset of
//! the program that happens to be constexpr. `FreedArray` is this
//! pass's own job, not the evaluator's: `Scope::analyze` clears the
//! scope's memory table the same way `Scope::execute` does, so an
//! in-heap array read through a reference that outlives its defining
//! scope (e.g. one returned from a function call) is caught here.

use super::ast::{
    Analyze, Array, ArrayElem, BinOp, Callee, Expr, Function, GeneralType, Scope, ScopeKind, Stmt, UnOp, Value,
};
use super::error::AnalyzeError;
use super::location::Location;

pub fn analyze_program<'a>(root: &'a Scope<'a>) -> Result<(), AnalyzeError> {
    root.analyze()?;
    Ok(())
}

impl<'a> Scope<'a> {
    /// Mirrors `Scope::execute`'s order (§4.6): statements, then the
    /// return expression, then memory cleanup -- so a heap array
    /// declared in this scope and handed out through the return value
    /// is already frozen/freed by the time a caller indexes into it.
    pub fn analyze(&'a self) -> Result<Analyze<'a>, AnalyzeError> {
        for stmt in self.statements().iter() {
            stmt.analyze()?;
        }
        let result = match self.return_expr() {
            Some(expr) => Some(expr.analyze()?),
            None if self.kind.get() == ScopeKind::ExpressionReturn => {
                return Err(AnalyzeError::MissingReturn { location: self.location });
            }
            None => None,
        };
        self.clear_memory();
        match result {
            Some(a) => Ok(a),
            None => Ok(Analyze::default()),
        }
    }
}

/// §9 Open Questions: entering a loop or fork body means its effects
/// can no longer be treated as decided at compile time, however
/// constexpr the condition looks, so every variable the body can touch
/// is force-marked unpredictable *before* the body itself is walked.
fn mark_body_unpredictable(scope: &Scope) {
    for v in scope.local_variables() {
        v.set_predict(false);
    }
}

impl<'a> Stmt<'a> {
    pub fn analyze(&self) -> Result<(), AnalyzeError> {
        match self {
            Stmt::Instruction(expr) => {
                expr.analyze()?;
                Ok(())
            }
            Stmt::Loop { cond, body } => {
                let c = cond.analyze()?;
                check_condition(c, cond.location())?;
                mark_body_unpredictable(body);
                body.analyze()?;
                Ok(())
            }
            Stmt::Fork { cond, then_body, else_body } => {
                let c = cond.analyze()?;
                check_condition(c, cond.location())?;
                mark_body_unpredictable(then_body);
                mark_body_unpredictable(else_body);
                then_body.analyze()?;
                else_body.analyze()?;
                Ok(())
            }
            Stmt::Block(scope) => {
                scope.analyze()?;
                Ok(())
            }
        }
    }
}

impl<'a> Function<'a> {
    pub fn analyze_definition(&self) -> Result<(), AnalyzeError> {
        let mut seen = std::collections::HashSet::new();
        for p in &self.params {
            if !seen.insert(p.name.clone()) {
                return Err(AnalyzeError::DuplicateParameter {
                    name: p.name.clone(),
                    location: p.location.get(),
                });
            }
        }
        Ok(())
    }

    /// The first call analyzes the body and caches its shape; later
    /// calls reuse that cache but are never reported as constexpr,
    /// since a second call may see different argument values (§4.7).
    pub fn analyze_call(&'a self) -> Result<Analyze<'a>, AnalyzeError> {
        if let Some(cached) = self.cached_analyze() {
            return Ok(Analyze::new(cached.value, false));
        }
        // Seed a placeholder before descending: a recursive self-call
        // found while analyzing this very body must not re-enter this
        // function, the same way the reference implementation registers
        // a function's copy into `global_scope` before copying its body.
        self.cache_analyze(Analyze::new(Value::Undef, false));
        let result = self.body.analyze()?;
        self.cache_analyze(result);
        Ok(result)
    }
}

fn check_integer_operand(v: Value, loc: Location) -> Result<(), AnalyzeError> {
    if v.general_type() != GeneralType::Integer {
        return Err(AnalyzeError::TypeMismatch {
            expected: "integer",
            got: v.general_type().name(),
            location: loc,
        });
    }
    Ok(())
}

/// One step of index-chain navigation (§4.3 "Index shift"), shared by reads
/// and writes. `current`'s analyze cells were frozen cell-for-cell by the
/// `ArrayLit` arm above, so a constant index bound-checks directly against
/// them; a non-constant index makes every cell at this level unpredictable
/// and hands back the first cell as a witness for any further indexing or
/// type checks, same as the evaluator falls back to its own first cell once
/// the real index is known.
fn step_into<'a>(current: &'a Array<'a>, idx: Analyze<'a>, loc: Location) -> Result<Analyze<'a>, AnalyzeError> {
    if current.is_freed() {
        return Err(AnalyzeError::FreedArray { location: loc });
    }
    if !current.is_initialized() {
        return Ok(Analyze::new(Value::Undef, false));
    }
    let cells = current.analyze_values();
    match idx.value {
        Value::Int(i) if idx.is_constexpr => {
            if i < 0 || (!current.is_in_heap() && (i as usize) >= cells.len()) {
                return Err(AnalyzeError::IndexOutOfRange {
                    index: i,
                    size: cells.len(),
                    location: loc,
                });
            }
            let pick = if current.is_in_heap() { 0 } else { i as usize };
            Ok(cells.get(pick).copied().unwrap_or_default())
        }
        _ => {
            for k in 0..cells.len() {
                let mut c = cells[k];
                c.is_constexpr = false;
                current.set_analyze_cell(k, c);
            }
            let mut witness = cells.get(0).copied().unwrap_or_default();
            witness.is_constexpr = false;
            Ok(witness)
        }
    }
}

/// Walks a read through `arr[i0][i1]...` (indexes stored innermost-first,
/// so consumed outer-to-inner like [`Array::shift`]).
fn analyze_indexed_read<'a>(
    arr: &'a Array<'a>,
    idx_analyses: &[Analyze<'a>],
    loc: Location,
) -> Result<Analyze<'a>, AnalyzeError> {
    let mut current = arr;
    let mut order = idx_analyses.iter().rev().peekable();
    loop {
        let idx = match order.next() {
            Some(a) => *a,
            None => return Ok(Analyze::new(Value::Array(current), true)),
        };
        let cell = step_into(current, idx, loc)?;
        match cell.value {
            Value::Array(next) => current = next,
            _ if order.peek().is_some() => return Err(AnalyzeError::OverIndexed { location: loc }),
            _ => return Ok(cell),
        }
    }
}

/// Walks all but the last index the same way [`analyze_indexed_read`] does,
/// then bound-checks the final index and records the assigned value's
/// analyze result in that cell. Mirrors [`Array::shift_set`]: cell writes
/// aren't otherwise type-checked, matching the evaluator.
fn analyze_indexed_write<'a>(
    arr: &'a Array<'a>,
    idx_analyses: &[Analyze<'a>],
    loc: Location,
) -> Result<(), AnalyzeError> {
    let mut order: Vec<Analyze<'a>> = idx_analyses.iter().rev().copied().collect();
    let last = order.pop().expect("the parser never builds an empty index list here");
    let mut current = arr;
    for idx in order {
        let cell = step_into(current, idx, loc)?;
        match cell.value {
            Value::Array(next) => current = next,
            _ => return Err(AnalyzeError::OverIndexed { location: loc }),
        }
    }
    if current.is_freed() {
        return Err(AnalyzeError::FreedArray { location: loc });
    }
    if !current.is_initialized() {
        return Ok(());
    }
    let cells = current.analyze_values();
    match last.value {
        Value::Int(i) if last.is_constexpr => {
            if i < 0 || (!current.is_in_heap() && (i as usize) >= cells.len()) {
                return Err(AnalyzeError::IndexOutOfRange {
                    index: i,
                    size: cells.len(),
                    location: loc,
                });
            }
        }
        _ => {
            for k in 0..cells.len() {
                let mut c = cells[k];
                c.is_constexpr = false;
                current.set_analyze_cell(k, c);
            }
        }
    }
    Ok(())
}

/// §4.1 "Loop and fork conditions must not be array or undef" -- stricter
/// than the generic integer-operand check above, which treats `Undef` as
/// integer-kind. Only a condition that is *statically known* to be undef
/// (a literal `undef`, or something that const-folds to it) is rejected
/// here; a condition that is merely unpredictable (`is_constexpr == false`)
/// is deferred to the evaluator's `RuntimeError::UndefInCondition` (§7).
fn check_condition(a: Analyze, loc: Location) -> Result<(), AnalyzeError> {
    if a.value.general_type() == GeneralType::Array {
        return Err(AnalyzeError::TypeMismatch {
            expected: "integer",
            got: "array",
            location: loc,
        });
    }
    if matches!(a.value, Value::Undef) && a.is_constexpr {
        return Err(AnalyzeError::InvalidCondition { got: "undef", location: loc });
    }
    Ok(())
}

fn fold_binop(op: BinOp, a: i64, b: i64) -> Option<i64> {
    Some(match op {
        BinOp::Eq => (a == b) as i64,
        BinOp::Ne => (a != b) as i64,
        BinOp::Le => (a <= b) as i64,
        BinOp::Ge => (a >= b) as i64,
        BinOp::Lt => (a < b) as i64,
        BinOp::Gt => (a > b) as i64,
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::Div => {
            if b == 0 {
                return None;
            }
            a.wrapping_div(b)
        }
        BinOp::Mod => {
            if b == 0 {
                return None;
            }
            a.wrapping_rem(b)
        }
        BinOp::Or | BinOp::And => unreachable!("short-circuit ops handled separately"),
    })
}

impl<'a> Expr<'a> {
    pub fn analyze(&'a self) -> Result<Analyze<'a>, AnalyzeError> {
        match self {
            Expr::Number(n) => Ok(Analyze::known(Value::Int(*n))),
            Expr::Undef => Ok(Analyze::known(Value::Undef)),
            Expr::Input => Ok(Analyze::new(Value::Input, false)),

            Expr::Lvalue { variable, indexes } => {
                let mut idx_analyses = Vec::with_capacity(indexes.len());
                for idx in indexes {
                    let a = idx.analyze()?;
                    check_integer_operand(a.value, idx.location())?;
                    idx_analyses.push(a);
                }
                if indexes.is_empty() {
                    return Ok(variable.get_analyze());
                }
                if !variable.is_set() {
                    return Err(AnalyzeError::IndexBeforeInit {
                        name: variable.name.clone(),
                        location: variable.location.get(),
                    });
                }
                let base = variable.get_analyze();
                let arr = match base.value {
                    Value::Array(arr) => arr,
                    other => {
                        return Err(AnalyzeError::TypeMismatch {
                            expected: "array",
                            got: other.general_type().name(),
                            location: variable.location.get(),
                        });
                    }
                };
                analyze_indexed_read(arr, &idx_analyses, variable.location.get())
            }

            Expr::Assign { target, value } => {
                let rhs = value.analyze()?;
                match target {
                    Expr::Lvalue { variable, indexes } if indexes.is_empty() => {
                        variable.set_analyze(rhs, variable.location.get())?;
                        Ok(rhs)
                    }
                    Expr::Lvalue { variable, indexes } => {
                        let mut idx_analyses = Vec::with_capacity(indexes.len());
                        for idx in indexes {
                            let a = idx.analyze()?;
                            check_integer_operand(a.value, idx.location())?;
                            idx_analyses.push(a);
                        }
                        if !variable.is_set() {
                            return Err(AnalyzeError::IndexBeforeInit {
                                name: variable.name.clone(),
                                location: variable.location.get(),
                            });
                        }
                        let base = variable.get_analyze();
                        let arr = match base.value {
                            Value::Array(arr) => arr,
                            other => {
                                return Err(AnalyzeError::TypeMismatch {
                                    expected: "array",
                                    got: other.general_type().name(),
                                    location: variable.location.get(),
                                });
                            }
                        };
                        analyze_indexed_write(arr, &idx_analyses, variable.location.get())?;
                        Ok(Analyze::new(rhs.value, false))
                    }
                    _ => unreachable!("the parser only ever builds Lvalue assignment targets"),
                }
            }

            Expr::BinOp { op, left, right } if matches!(op, BinOp::Or | BinOp::And) => {
                // Mirrors bin_op.hpp's `evaluate_by_left`/`evaluate` split:
                // a constexpr left operand that already decides the result
                // short-circuits to that operand's own value, matching the
                // evaluator (§4.4) instead of always folding to `Undef`,
                // which previously made even `if (1 || 0)` look like a
                // statically-unknown-typed condition.
                let l = left.analyze()?;
                check_integer_operand(l.value, left.location())?;
                let r = right.analyze()?;
                check_integer_operand(r.value, right.location())?;

                if matches!(l.value, Value::Undef) {
                    return Ok(Analyze::new(Value::Undef, l.is_constexpr));
                }
                if l.is_constexpr {
                    if let Value::Int(lv) = l.value {
                        let short_circuits = match op {
                            BinOp::Or => lv != 0,
                            BinOp::And => lv == 0,
                            _ => unreachable!(),
                        };
                        if short_circuits {
                            return Ok(Analyze::known(l.value));
                        }
                    }
                }
                if matches!(r.value, Value::Undef) {
                    return Ok(Analyze::new(Value::Undef, l.is_constexpr && r.is_constexpr));
                }
                if l.is_constexpr && r.is_constexpr {
                    if let Value::Int(_) = r.value {
                        return Ok(Analyze::new(r.value, true));
                    }
                }
                Ok(Analyze::new(Value::Undef, false))
            }
            Expr::BinOp { op, left, right } => {
                let l = left.analyze()?;
                check_integer_operand(l.value, left.location())?;
                let r = right.analyze()?;
                check_integer_operand(r.value, right.location())?;
                if l.is_constexpr && r.is_constexpr {
                    if let (Value::Int(a), Value::Int(b)) = (l.value, r.value) {
                        if let Some(folded) = fold_binop(*op, a, b) {
                            return Ok(Analyze::known(Value::Int(folded)));
                        }
                    }
                }
                Ok(Analyze::new(Value::Undef, false))
            }

            Expr::UnOp { op, operand } => {
                let o = operand.analyze()?;
                check_integer_operand(o.value, operand.location())?;
                if o.is_constexpr {
                    if let Value::Int(v) = o.value {
                        let folded = match op {
                            UnOp::Plus => v,
                            UnOp::Neg => v.wrapping_neg(),
                            UnOp::Not => (v == 0) as i64,
                        };
                        return Ok(Analyze::known(Value::Int(folded)));
                    }
                }
                Ok(Analyze::new(Value::Undef, false))
            }

            Expr::Print(inner) => inner.analyze(),

            Expr::ArrayLit(arr) => {
                // `analyzed` mirrors the evaluator's expanded `e_values`
                // cell-for-cell (§4.3 "Index shift") wherever a `repeat`
                // count is known at analysis time, so constant indexes into
                // it can be bound-checked here instead of only at runtime
                // (§8 property 5: out-of-bounds on a non-heap array is a
                // semantic-analysis error). A `repeat` whose count depends
                // on `?` (or any other non-constexpr expression) can't be
                // expanded; it contributes one witness cell and marks the
                // array in-heap, same as the evaluator does once it learns
                // the real count.
                let mut analyzed = Vec::new();
                let mut all_constexpr = true;
                let mut element_level: Option<usize> = None;
                for elem in &arr.elems {
                    let (a, extra_constexpr, repeat_count) = match elem {
                        ArrayElem::Value(v) => (v.analyze()?, true, 1),
                        ArrayElem::Repeat { value, count } => {
                            let a = value.analyze()?;
                            let c = count.analyze()?;
                            check_integer_operand(c.value, arr.location)?;
                            let n = match c.value {
                                Value::Int(n) => {
                                    if c.is_constexpr && n <= 0 {
                                        return Err(AnalyzeError::NonPositiveRepeatCount {
                                            count: n,
                                            location: arr.location,
                                        });
                                    }
                                    n
                                }
                                _ => 0,
                            };
                            if c.is_constexpr {
                                (a, true, n as usize)
                            } else {
                                arr.mark_in_heap();
                                (a, false, 1)
                            }
                        }
                    };
                    let lvl = a.value.level();
                    match element_level {
                        Some(expected) if expected != lvl => {
                            return Err(AnalyzeError::ArrayLevelMismatch {
                                lhs: expected,
                                rhs: lvl,
                                location: arr.location,
                            });
                        }
                        Some(_) => {}
                        None => element_level = Some(lvl),
                    }
                    all_constexpr &= a.is_constexpr && extra_constexpr;
                    for _ in 0..repeat_count {
                        analyzed.push(a);
                    }
                }
                arr.freeze_analyze(analyzed, element_level.unwrap_or(0));
                if arr.init_indexes.is_empty() {
                    return Ok(Analyze::new(Value::Array(arr), all_constexpr));
                }
                // The literal is indexed directly at its defining
                // occurrence, e.g. `[1, 2, 3][0]`; walk those indexes the
                // same way an `Lvalue` read does.
                let mut idx_analyses = Vec::with_capacity(arr.init_indexes.len());
                for idx in &arr.init_indexes {
                    let a = idx.analyze()?;
                    check_integer_operand(a.value, idx.location())?;
                    idx_analyses.push(a);
                }
                analyze_indexed_read(arr, &idx_analyses, arr.location)
            }

            Expr::ScopeExpr(scope) => scope.analyze(),

            Expr::FunctionLit(f) => {
                f.analyze_definition()?;
                Ok(Analyze::known(Value::Function(f)))
            }

            Expr::Call { callee, args } => {
                for a in args {
                    let av = a.analyze()?;
                    check_integer_operand(av.value, a.location())?;
                }
                match callee {
                    Callee::ByName(f) => {
                        if f.arity() != args.len() {
                            return Err(AnalyzeError::ArityMismatch {
                                declared: f.arity(),
                                given: args.len(),
                                location: f.location,
                            });
                        }
                        f.analyze_call()
                    }
                    Callee::ByExpr(e) => {
                        let a = e.analyze()?;
                        if let Value::Function(f) = a.value {
                            if a.is_constexpr && f.arity() != args.len() {
                                return Err(AnalyzeError::ArityMismatch {
                                    declared: f.arity(),
                                    given: args.len(),
                                    location: f.location,
                                });
                            }
                        }
                        // A dynamically resolved callee's arity and body
                        // are validated at call time by the evaluator.
                        Ok(Analyze::new(Value::Undef, false))
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::arena::Arena;
    use crate::lang::copy::copy_program;
    use crate::lang::lexer::Lexer;
    use crate::lang::parser::Parser;

    fn analyze(src: &str) -> Result<(), AnalyzeError> {
        let arena = Arena::new();
        let tokens = Lexer::new(src).tokenize().expect("lex");
        let root = Parser::new(&arena, tokens).parse_program().expect("parse");
        let copy_arena = Arena::new();
        let copy_root = copy_program(&copy_arena, root);
        analyze_program(copy_root)
    }

    #[test]
    fn negative_index_unset_variable() {
        let err = analyze("print a[0];").unwrap_err();
        assert!(matches!(err, AnalyzeError::IndexBeforeInit { .. }));
    }

    #[test]
    fn negative_array_to_integer_reassignment() {
        let err = analyze("a = [1,2]; a = 3;").unwrap_err();
        assert!(matches!(err, AnalyzeError::AssignTypeMismatch { .. }));
    }

    #[test]
    fn negative_array_level_mismatch() {
        let err = analyze("a = [[1]]; b = [1,2]; a = b;").unwrap_err();
        assert!(matches!(err, AnalyzeError::ArrayLevelMismatch { .. }));
    }

    #[test]
    fn negative_call_arity_mismatch() {
        let err = analyze("f = func(x){return x;}; f(1,2);").unwrap_err();
        assert!(matches!(err, AnalyzeError::ArityMismatch { .. }));
    }

    #[test]
    fn negative_array_condition() {
        let err = analyze("while ([1,2]) {}").unwrap_err();
        assert!(matches!(err, AnalyzeError::TypeMismatch { .. }));
    }

    #[test]
    fn negative_duplicate_parameter() {
        let err = analyze("f = func(x, x) { return x; }; print f(1, 2);").unwrap_err();
        assert!(matches!(err, AnalyzeError::DuplicateParameter { .. }));
    }

    #[test]
    fn negative_missing_return_in_function_body() {
        // A trailing loop (not a bare expression statement) can never be
        // promoted into an implicit return by `Scope::finish_return`.
        let err = analyze("f = func(x) { while (x) { x = x - 1; } }; print f(1);").unwrap_err();
        assert!(matches!(err, AnalyzeError::MissingReturn { .. }));
    }

    #[test]
    fn negative_call_argument_not_integer() {
        let err = analyze("a = [1,2]; f = func(x){return x;}; print f(a);").unwrap_err();
        assert!(matches!(err, AnalyzeError::TypeMismatch { .. }));
    }

    #[test]
    fn negative_non_positive_repeat_count_constant() {
        let err = analyze("a = repeat(1, 0);").unwrap_err();
        assert!(matches!(err, AnalyzeError::NonPositiveRepeatCount { .. }));
    }

    #[test]
    fn positive_undef_assigned_to_undef_is_accepted() {
        analyze("a = undef; a = undef;").unwrap();
    }

    #[test]
    fn scenario_constant_fold_matches_evaluator_tag() {
        // Invariant 2 (§8): a constant-only expression's analyzed tag
        // agrees with what the evaluator would produce.
        let arena = Arena::new();
        let tokens = Lexer::new("x = 2 + 3;").tokenize().expect("lex");
        let root = Parser::new(&arena, tokens).parse_program().expect("parse");
        let copy_arena = Arena::new();
        let copy_root = copy_program(&copy_arena, root);
        analyze_program(copy_root).expect("analyze");
        let stmts = copy_root.statements();
        let first = stmts.first().expect("one statement was parsed");
        let expr: &Expr = match first {
            Stmt::Instruction(expr) => *expr,
            _ => panic!("expected an instruction statement"),
        };
        let a = expr.analyze().expect("re-analyze is idempotent");
        assert!(matches!(a.value, Value::Int(5)));
        assert!(a.is_constexpr);
    }

    #[test]
    fn negative_index_into_non_array() {
        let err = analyze("x = 1; print x[0];").unwrap_err();
        assert!(matches!(err, AnalyzeError::TypeMismatch { expected: "array", .. }));
    }

    #[test]
    fn negative_constant_index_out_of_range_on_stack_array() {
        let err = analyze("a = [1, 2, 3]; print a[5];").unwrap_err();
        assert!(matches!(err, AnalyzeError::IndexOutOfRange { index: 5, size: 3, .. }));
    }

    #[test]
    fn negative_constant_index_out_of_range_through_repeat_expansion() {
        // `repeat(2, 3)` expands to 3 cells, so the array has 5 total --
        // the same count the evaluator's e_values would produce.
        let err = analyze("a = [1, repeat(2, 3), 4]; print a[10];").unwrap_err();
        assert!(matches!(err, AnalyzeError::IndexOutOfRange { index: 10, size: 5, .. }));
    }

    #[test]
    fn positive_constant_index_into_repeat_array_is_accepted() {
        analyze("a = repeat(9, 3); print a[2];").unwrap();
    }

    #[test]
    fn positive_constant_index_on_heap_array_is_deferred_to_runtime() {
        // The repeat count comes from `?`, so the array is in-heap at
        // analysis time and its real size isn't known yet; a large
        // constant index must not be rejected here.
        analyze("n = ?; a = repeat(0, n); print a[100];").unwrap();
    }

    #[test]
    fn negative_over_indexed_scalar() {
        let err = analyze("a = [1, 2, 3]; print a[0][0];").unwrap_err();
        assert!(matches!(err, AnalyzeError::OverIndexed { .. }));
    }

    #[test]
    fn negative_write_through_out_of_range_constant_index() {
        let err = analyze("a = [1, 2, 3]; a[5] = 9;").unwrap_err();
        assert!(matches!(err, AnalyzeError::IndexOutOfRange { index: 5, size: 3, .. }));
    }

    #[test]
    fn negative_constant_index_out_of_range_on_a_literal_indexed_at_its_own_site() {
        let err = analyze("print [1, 2, 3][9];").unwrap_err();
        assert!(matches!(err, AnalyzeError::IndexOutOfRange { index: 9, size: 3, .. }));
    }

    #[test]
    fn positive_constant_or_condition_is_not_rejected() {
        // A constexpr `1 || 0` must fold to the concrete integer `1`,
        // not an `Undef` that `check_condition` would reject.
        analyze("if (1 || 0) { print 1; } else { print 2; }").unwrap();
    }

    #[test]
    fn positive_constant_and_condition_is_not_rejected() {
        analyze("while (1 && 0) { print 1; }").unwrap();
    }

    #[test]
    fn scenario_or_short_circuit_folds_to_left_value() {
        let arena = Arena::new();
        let tokens = Lexer::new("x = 5 || 0; print x;").tokenize().expect("lex");
        let root = Parser::new(&arena, tokens).parse_program().expect("parse");
        let copy_arena = Arena::new();
        let copy_root = copy_program(&copy_arena, root);
        analyze_program(copy_root).expect("analyze");
        let stmts = copy_root.statements();
        let first = stmts.first().expect("one statement was parsed");
        let expr: &Expr = match first {
            Stmt::Instruction(expr) => *expr,
            _ => panic!("expected an instruction statement"),
        };
        let a = expr.analyze().expect("re-analyze is idempotent");
        assert!(matches!(a.value, Value::Int(5)));
        assert!(a.is_constexpr);
    }

    #[test]
    fn scenario_or_without_short_circuit_folds_to_right_value() {
        let arena = Arena::new();
        let tokens = Lexer::new("x = 0 || 7; print x;").tokenize().expect("lex");
        let root = Parser::new(&arena, tokens).parse_program().expect("parse");
        let copy_arena = Arena::new();
        let copy_root = copy_program(&copy_arena, root);
        analyze_program(copy_root).expect("analyze");
        let stmts = copy_root.statements();
        let first = stmts.first().expect("one statement was parsed");
        let expr: &Expr = match first {
            Stmt::Instruction(expr) => *expr,
            _ => panic!("expected an instruction statement"),
        };
        let a = expr.analyze().expect("re-analyze is idempotent");
        assert!(matches!(a.value, Value::Int(7)));
        assert!(a.is_constexpr);
    }

    #[test]
    fn negative_freed_heap_array_read_after_function_returns_it() {
        // `a` is declared inside `f`'s body and is in-heap (its repeat
        // count comes from `?`); once the body scope's return value has
        // been captured, `Scope::analyze` clears the scope's memory
        // table, freeing `a` for good. Reading through the returned
        // reference afterward must be a semantic-analysis error.
        let err = analyze(
            "f = func() { n = ?; a = repeat(0, n); return a; }; b = f(); print b[0];",
        )
        .unwrap_err();
        assert!(matches!(err, AnalyzeError::FreedArray { .. }));
    }
}
