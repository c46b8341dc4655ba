// paracl -- a tree-walking interpreter for the ParaCL language
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! Execution (§4.5-4.7, §5, §7 "runtime-execution error").
//!
//! Walks the tree the parser built directly -- never the analyzer's deep
//! copy -- so nothing the analyzer wrote (cached `analyze` results,
//! `is_constexpr` flags) is observed here.
//!
//! §4.6 describes a work-stack machine so that entering a return-scope can
//! defer its memory cleanup until after the return value has been read off
//! a value stack. A literal translation of that design into safe Rust
//! would need a bytecode-style suspend/resume machine spanning every
//! expression, since `&'a` references into the arena can't be captured in
//! a trait object closure without either unsafe code or a full rewrite
//! around indices. The return statement is already structurally confined
//! by the parser to be the last statement pushed into its immediately
//! enclosing scope (`Scope::push_statement` stops accepting further
//! statements once a return is set), so nothing ever needs to resume a
//! scope after it has already produced a value -- plain recursion gives
//! the same observable order of cleanup and return that the work-stack
//! description calls for, one `Scope::execute` call per scope entry
//! standing in for the "push statements, then a return-node, then a
//! memory-cleaner" sequence. See DESIGN.md for the full writeup.

use std::cell::RefCell;

use super::arena::Arena;
use super::ast::{
    print_value, Array, ArrayElem, BinOp, Callee, Expr, Function, Scope, Stmt, UnOp, Value,
};
use super::copy::instantiate_call;
use super::error::RuntimeError;
use super::location::Location;

/// One integer at a time, read lazily from wherever the driver points it
/// (§6 "a single text input stream"); `?` pulls through this trait.
pub trait InputStream {
    fn next_int(&mut self, loc: Location) -> Result<i64, RuntimeError>;
}

/// Reads whitespace-separated integers from anything `io::Read`, matching
/// how the driver hands the core "a single text input stream" (§6). The
/// whole stream is buffered up front since ParaCL programs read input in
/// small, unpredictable bursts and re-reading a `BufRead` token at a time
/// is fiddlier than it is worth here.
pub struct BufferedInput {
    tokens: std::vec::IntoIter<String>,
}

impl BufferedInput {
    pub fn from_reader(mut reader: impl std::io::Read) -> std::io::Result<Self> {
        let mut buf = String::new();
        reader.read_to_string(&mut buf)?;
        let tokens: Vec<String> = buf.split_whitespace().map(String::from).collect();
        Ok(BufferedInput { tokens: tokens.into_iter() })
    }

    pub fn from_str(s: &str) -> Self {
        let tokens: Vec<String> = s.split_whitespace().map(String::from).collect();
        BufferedInput { tokens: tokens.into_iter() }
    }
}

impl InputStream for BufferedInput {
    fn next_int(&mut self, loc: Location) -> Result<i64, RuntimeError> {
        let tok = self.tokens.next().ok_or(RuntimeError::BadInput { location: loc })?;
        tok.parse().map_err(|_| RuntimeError::BadInput { location: loc })
    }
}

/// Everything that outlives a single call to [`execute_program`]: the
/// arena every per-call deep copy is allocated from (§9 "one shared arena,
/// not one per call -- see DESIGN.md"), the input stream, and where
/// `print` writes its output.
pub struct Evaluator<'a, O: std::io::Write> {
    arena: &'a Arena<'a>,
    global_scope: &'a Scope<'a>,
    input: RefCell<Box<dyn InputStream + 'static>>,
    output: RefCell<O>,
}

impl<'a, O: std::io::Write> Evaluator<'a, O> {
    pub fn new(
        arena: &'a Arena<'a>,
        global_scope: &'a Scope<'a>,
        input: Box<dyn InputStream + 'static>,
        output: O,
    ) -> Self {
        Evaluator {
            arena,
            global_scope,
            input: RefCell::new(input),
            output: RefCell::new(output),
        }
    }

    fn write_line(&self, s: &str, loc: Location) -> Result<(), RuntimeError> {
        let mut out = self.output.borrow_mut();
        writeln!(out, "{}", s).map_err(|e| RuntimeError::OutputFailed {
            message: e.to_string(),
            location: loc,
        })
    }
}

pub fn execute_program<'a, O: std::io::Write>(
    root: &'a Scope<'a>,
    eval: &Evaluator<'a, O>,
) -> Result<(), RuntimeError> {
    root.execute(eval)?;
    Ok(())
}

fn truthy(v: Value) -> bool {
    match v {
        Value::Int(n) => n != 0,
        // General types other than Integer are rejected before execution
        // is ever reached for a condition (analyzer's `check_condition`);
        // this arm only matters for truthiness of a bare sub-expression
        // such as the left side of `||`/`&&`, where the spec also limits
        // operands to integer-kind values.
        _ => false,
    }
}

impl<'a> Scope<'a> {
    /// §4.6: run every statement in order, clear this scope's memory
    /// table, then -- only for an expression scope -- read the return
    /// value. `finish_return`/`set_return` already guarantee at most one
    /// trailing statement is treated as the return, so there is nothing
    /// left to "resume": the return expression, once reached, is simply
    /// the last thing evaluated before cleanup.
    pub fn execute<O: std::io::Write>(&'a self, eval: &Evaluator<'a, O>) -> Result<Value<'a>, RuntimeError> {
        for stmt in self.statements().iter() {
            stmt.execute(eval)?;
        }
        let result = match self.return_expr() {
            Some(expr) => Some(expr.execute(eval)?),
            None => None,
        };
        self.clear_memory();
        match result {
            Some(v) => Ok(v),
            None => Ok(Value::Undef),
        }
    }
}

impl<'a> Stmt<'a> {
    pub fn execute<O: std::io::Write>(&'a self, eval: &Evaluator<'a, O>) -> Result<(), RuntimeError> {
        match self {
            Stmt::Instruction(expr) => {
                expr.execute(eval)?;
                Ok(())
            }
            Stmt::Loop { cond, body } => {
                loop {
                    let c = cond.execute(eval)?;
                    let loc = cond.location();
                    if matches!(c, Value::Undef) {
                        return Err(RuntimeError::UndefInCondition { location: loc });
                    }
                    if !truthy(c) {
                        break;
                    }
                    body.execute(eval)?;
                }
                Ok(())
            }
            Stmt::Fork { cond, then_body, else_body } => {
                let c = cond.execute(eval)?;
                let loc = cond.location();
                if matches!(c, Value::Undef) {
                    return Err(RuntimeError::UndefInCondition { location: loc });
                }
                if truthy(c) {
                    then_body.execute(eval)?;
                } else {
                    else_body.execute(eval)?;
                }
                Ok(())
            }
            Stmt::Block(scope) => {
                scope.execute(eval)?;
                Ok(())
            }
        }
    }
}

impl<'a> Function<'a> {
    /// §4.7 "Execution": deep-copy parameters and body for this call,
    /// bind arguments left-to-right, then run the body as an expression
    /// scope and return its value.
    pub fn call<O: std::io::Write>(
        &'a self,
        args: &[Value<'a>],
        eval: &Evaluator<'a, O>,
        loc: Location,
    ) -> Result<Value<'a>, RuntimeError> {
        if args.len() != self.arity() {
            return Err(RuntimeError::ArityMismatch {
                declared: self.arity(),
                given: args.len(),
                location: loc,
            });
        }
        let frame = instantiate_call(eval.arena, self, eval.global_scope);
        for (param, value) in frame.params.iter().zip(args.iter()) {
            param.set(*value);
        }
        frame.body.execute(eval)
    }
}

/// Evaluates an array's index expressions and converts them from outer→
/// inner syntactic order to the innermost-first storage order `shift`/
/// `shift_set` expect (§3 "Index vectors are stored innermost-first").
fn eval_indexes<'a, O: std::io::Write>(
    indexes: &'a [&'a Expr<'a>],
    eval: &Evaluator<'a, O>,
) -> Result<Vec<i64>, RuntimeError> {
    // `indexes` is already stored innermost-first by the parser, so
    // evaluating in that order and collecting directly preserves it.
    let mut out = Vec::with_capacity(indexes.len());
    for idx in indexes {
        let v = idx.execute(eval)?;
        let loc = idx.location();
        match v {
            Value::Int(n) => out.push(n),
            Value::Undef => return Err(RuntimeError::IndexOutOfRange { index: -1, size: 0, location: loc }),
            _ => unreachable!("index expressions are checked to be integer-kind by the analyzer"),
        }
    }
    Ok(out)
}

/// `repeat`'s count is heap-triggering when it isn't known at parse time
/// to be a plain literal; the evaluator never sees the analyzer's `INPUT`
/// tag (an input read resolves to a concrete integer immediately), so it
/// approximates "depends on input" this way instead. See DESIGN.md.
fn count_looks_input_dependent(count: &Expr) -> bool {
    !matches!(count, Expr::Number(_))
}

/// Deep-copies a *value*, not a node: a scalar/function value is safe to
/// alias (immutable), but an array value needs genuinely independent
/// backing storage per copy so that `repeat(arr, n)`'s `n` cells don't all
/// end up mutating the same underlying array (§5 "the repeat initializer
/// evaluates value once and replicates deep-copies of its result node").
fn deep_copy_value<'a>(arena: &'a Arena<'a>, v: Value<'a>) -> Value<'a> {
    match v {
        Value::Array(arr) => Value::Array(arena.array(arr.instantiate_copy())),
        other => other,
    }
}

impl<'a> Array<'a> {
    /// Used only by [`deep_copy_value`]: a fresh, independent array with
    /// the same (recursively copied) cell values, already initialized.
    pub fn instantiate_copy(&self) -> Array<'a> {
        let fresh = Array::new(self.location, Vec::new(), Vec::new());
        if self.is_initialized() {
            let values: Vec<Value<'a>> = self.values();
            fresh.freeze(values, Vec::new(), self.element_level());
        }
        if self.is_in_heap() {
            fresh.mark_in_heap();
        }
        fresh
    }
}

impl<'a> Expr<'a> {
    pub fn execute<O: std::io::Write>(&'a self, eval: &Evaluator<'a, O>) -> Result<Value<'a>, RuntimeError> {
        match self {
            Expr::Number(n) => Ok(Value::Int(*n)),
            Expr::Undef => Ok(Value::Undef),
            Expr::Input => {
                let n = eval.input.borrow_mut().next_int(self.location())?;
                Ok(Value::Int(n))
            }

            Expr::Lvalue { variable, indexes } => {
                if indexes.is_empty() {
                    return Ok(variable.get());
                }
                let base = variable.get();
                let arr = match base {
                    Value::Array(arr) => arr,
                    _ => unreachable!("the analyzer rejects indexing a non-array lvalue"),
                };
                let idxs = eval_indexes(indexes, eval)?;
                arr.shift(&idxs, variable.location.get())
            }

            Expr::Assign { target, value } => {
                let rhs = value.execute(eval)?;
                match target {
                    Expr::Lvalue { variable, indexes } if indexes.is_empty() => {
                        variable.set(rhs);
                        Ok(rhs)
                    }
                    Expr::Lvalue { variable, indexes } => {
                        let base = variable.get();
                        let arr = match base {
                            Value::Array(arr) => arr,
                            _ => unreachable!("the analyzer rejects indexing a non-array lvalue"),
                        };
                        let idxs = eval_indexes(indexes, eval)?;
                        arr.shift_set(&idxs, rhs, variable.location.get())?;
                        Ok(rhs)
                    }
                    _ => unreachable!("the parser only ever builds Lvalue assignment targets"),
                }
            }

            Expr::BinOp { op: BinOp::Or, left, right } => {
                let l = left.execute(eval)?;
                if matches!(l, Value::Undef) {
                    return Ok(Value::Undef);
                }
                let lv = as_int(l);
                if lv != 0 {
                    return Ok(l);
                }
                let r = right.execute(eval)?;
                if matches!(r, Value::Undef) {
                    return Ok(Value::Undef);
                }
                Ok(r)
            }
            Expr::BinOp { op: BinOp::And, left, right } => {
                let l = left.execute(eval)?;
                if matches!(l, Value::Undef) {
                    return Ok(Value::Undef);
                }
                let lv = as_int(l);
                if lv == 0 {
                    return Ok(l);
                }
                let r = right.execute(eval)?;
                if matches!(r, Value::Undef) {
                    return Ok(Value::Undef);
                }
                Ok(r)
            }
            Expr::BinOp { op, left, right } => {
                let l = left.execute(eval)?;
                let r = right.execute(eval)?;
                if matches!(l, Value::Undef) || matches!(r, Value::Undef) {
                    return Ok(Value::Undef);
                }
                let (a, b) = (as_int(l), as_int(r));
                let loc = self.location();
                Ok(Value::Int(eval_binop(*op, a, b, loc)?))
            }

            Expr::UnOp { op, operand } => {
                let v = operand.execute(eval)?;
                if matches!(v, Value::Undef) {
                    return Ok(Value::Undef);
                }
                let n = as_int(v);
                let result = match op {
                    UnOp::Plus => n,
                    UnOp::Neg => n.wrapping_neg(),
                    UnOp::Not => (n == 0) as i64,
                };
                Ok(Value::Int(result))
            }

            Expr::Print(inner) => {
                let v = inner.execute(eval)?;
                eval.write_line(&print_value(v), inner.location())?;
                Ok(v)
            }

            Expr::ArrayLit(arr) => {
                if !arr.is_initialized() {
                    initialize_array(arr, eval)?;
                }
                if arr.init_indexes.is_empty() {
                    Ok(Value::Array(arr))
                } else {
                    let idxs = eval_indexes(&arr.init_indexes, eval)?;
                    arr.shift(&idxs, arr.location)
                }
            }

            Expr::ScopeExpr(scope) => scope.execute(eval),

            Expr::FunctionLit(f) => Ok(Value::Function(f)),

            Expr::Call { callee, args } => {
                let mut values = Vec::with_capacity(args.len());
                for a in args {
                    values.push(a.execute(eval)?);
                }
                match callee {
                    Callee::ByName(f) => f.call(&values, eval, f.location),
                    Callee::ByExpr(e) => {
                        let v = e.execute(eval)?;
                        match v {
                            Value::Function(f) => f.call(&values, eval, e.location()),
                            _ => Err(RuntimeError::NotCallable { location: e.location() }),
                        }
                    }
                }
            }
        }
    }
}

fn as_int(v: Value) -> i64 {
    match v {
        Value::Int(n) => n,
        _ => unreachable!("operands are checked to be integer-kind by the analyzer"),
    }
}

fn eval_binop(op: BinOp, a: i64, b: i64, loc: Location) -> Result<i64, RuntimeError> {
    Ok(match op {
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
                return Err(RuntimeError::DivisionByZero { location: loc });
            }
            a.wrapping_div(b)
        }
        BinOp::Mod => {
            if b == 0 {
                return Err(RuntimeError::DivisionByZero { location: loc });
            }
            a.wrapping_rem(b)
        }
        BinOp::Or | BinOp::And => unreachable!("short-circuit ops handled separately"),
    })
}

/// §4.3 "First use initializes it": evaluate the un-evaluated initializer
/// list in source order, expanding each `repeat` into its replicated,
/// independently-owned cells, then freeze the result.
fn initialize_array<'a, O: std::io::Write>(
    arr: &'a Array<'a>,
    eval: &Evaluator<'a, O>,
) -> Result<(), RuntimeError> {
    let mut values = Vec::new();
    let mut in_heap = false;
    let mut element_level: Option<usize> = None;
    for elem in &arr.elems {
        match elem {
            ArrayElem::Value(v) => {
                let val = v.execute(eval)?;
                element_level.get_or_insert(val.level());
                values.push(val);
            }
            ArrayElem::Repeat { value, count } => {
                let count_val = count.execute(eval)?;
                let n = as_int(count_val);
                if n <= 0 {
                    return Err(RuntimeError::NegativeRepeatCount { count: n, location: arr.location });
                }
                if count_looks_input_dependent(count) {
                    in_heap = true;
                }
                // Evaluate `value` once, then replicate independent deep
                // copies so each cell owns its own storage (§5).
                let template = value.execute(eval)?;
                element_level.get_or_insert(template.level());
                for _ in 0..n {
                    values.push(deep_copy_value(eval.arena, template));
                }
            }
        }
    }
    let indexes: Vec<i64> = Vec::new();
    arr.freeze(values, indexes, element_level.unwrap_or(0));
    if in_heap {
        arr.mark_in_heap();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::lexer::Lexer;
    use crate::lang::parser::Parser;

    fn run(src: &str, input: &str) -> Result<String, RuntimeError> {
        let arena = Arena::new();
        let tokens = Lexer::new(src).tokenize().expect("lex");
        let root = Parser::new(&arena, tokens).parse_program().expect("parse");
        super::super::analyzer::analyze_program(root).expect("analyze");
        let mut out = Vec::new();
        {
            let eval = Evaluator::new(&arena, root, Box::new(BufferedInput::from_str(input)), &mut out);
            execute_program(root, &eval)?;
        }
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn scenario_1_plain_arithmetic() {
        assert_eq!(run("x = 2 + 3; print x;", "").unwrap(), "5\n");
    }

    #[test]
    fn scenario_2_input() {
        assert_eq!(run("x = ?; print x + 1;", "41").unwrap(), "42\n");
    }

    #[test]
    fn scenario_3_repeat_array() {
        assert_eq!(run("a = [1, repeat(2, 3), 4]; print a;", "").unwrap(), "[1, 2, 2, 2, 4]\n");
    }

    #[test]
    fn scenario_4_heap_array_write() {
        assert_eq!(run("n = ?; a = repeat(0, n); a[0] = 7; print a[0];", "3").unwrap(), "7\n");
    }

    #[test]
    fn scenario_5_while_loop() {
        assert_eq!(
            run("i = 0; s = 0; while (i < 5) { s = s + i; i = i + 1; } print s;", "").unwrap(),
            "10\n"
        );
    }

    #[test]
    fn scenario_6_function_call() {
        assert_eq!(run("f = func(x, y) { return x * y; }; print f(6, 7);", "").unwrap(), "42\n");
    }

    #[test]
    fn scenario_7_fork() {
        assert_eq!(run("if (0) { print 1; } else { print 2; }", "").unwrap(), "2\n");
    }

    #[test]
    fn scenario_8_nested_indexing() {
        assert_eq!(run("a = [[1,2],[3,4]]; print a[1][0];", "").unwrap(), "3\n");
    }

    #[test]
    fn short_circuit_or_skips_rhs() {
        // if the RHS were evaluated, the undefined assignment target would
        // raise before `print` runs.
        assert_eq!(run("x = 1; print x || (x = ?);", "").unwrap(), "1\n");
    }

    #[test]
    fn short_circuit_and_skips_rhs() {
        assert_eq!(run("x = 0; print x && (x = ?);", "").unwrap(), "0\n");
    }

    #[test]
    fn loop_body_array_reinitializes_each_iteration() {
        // a fresh `[0, 0]` every iteration means writing index 0 on one
        // pass never survives into the next pass's read.
        let out = run(
            "i = 0; while (i < 2) { a = [0, 0]; a[0] = 9; print a[0]; i = i + 1; }",
            "",
        )
        .unwrap();
        assert_eq!(out, "9\n9\n");
    }

    #[test]
    fn heap_array_in_loop_body_reinitializes_each_iteration() {
        // `a`'s repeat count depends on `?`, so it's in-heap; the first
        // iteration's scope exit marks it freed, but a fresh `a` gets
        // built from `arr.elems` again on the second iteration. Runtime
        // indexing must not reject that re-initialized array as freed.
        let out = run(
            "i = 0; n = 2; while (i < 2) { a = repeat(0, n); a[0] = 9; print a[0]; i = i + 1; }",
            "",
        )
        .unwrap();
        assert_eq!(out, "9\n9\n");
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        let err = run("x = 1 / 0; print x;", "").unwrap_err();
        assert!(matches!(err, RuntimeError::DivisionByZero { .. }));
    }

    #[test]
    fn recursive_function_calls_get_independent_frames() {
        let out = run(
            "fact = func(n) { if (n <= 1) { return 1; } return n * fact(n - 1); }; print fact(5);",
            "",
        )
        .unwrap();
        assert_eq!(out, "120\n");
    }

    #[test]
    fn determinism_same_input_same_output() {
        let a = run("n = ?; print n * 2;", "21").unwrap();
        let b = run("n = ?; print n * 2;", "21").unwrap();
        assert_eq!(a, b);
    }
}
