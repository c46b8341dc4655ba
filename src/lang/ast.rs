// paracl -- a tree-walking interpreter for the ParaCL language
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! The tree shape shared by the analyzer and the evaluator: values, the
//! general-type lattice, variables, arrays, scopes, functions, and the
//! expression/statement node enums.
//!
//! Every node that can be referenced from more than one place (variables,
//! arrays, functions, scopes) carries its mutable state behind a `RefCell`
//! and is handed out as an arena-owned `&'a` reference; everything else
//! (operators, literals, call argument lists) is an owned enum payload.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use super::error::{AnalyzeError, RuntimeError};
use super::location::Location;

/// The coarse type lattice used for assignment compatibility (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneralType {
    Integer,
    Array,
    Function,
}

impl GeneralType {
    pub fn name(self) -> &'static str {
        match self {
            GeneralType::Integer => "integer",
            GeneralType::Array => "array",
            GeneralType::Function => "function",
        }
    }
}

/// The five-way runtime tag. `Input` only ever appears in an [`Analyze`]
/// value; the evaluator always resolves it to a concrete `Int` before a
/// [`Value`] is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Integer,
    Undef,
    Array,
    Input,
    Function,
}

impl TypeTag {
    pub fn general(self) -> GeneralType {
        match self {
            TypeTag::Integer | TypeTag::Undef | TypeTag::Input => GeneralType::Integer,
            TypeTag::Array => GeneralType::Array,
            TypeTag::Function => GeneralType::Function,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TypeTag::Integer => "integer",
            TypeTag::Undef => "undef",
            TypeTag::Array => "array",
            TypeTag::Input => "input",
            TypeTag::Function => "function",
        }
    }
}

/// A runtime value: `{tag, node-ref}` from §3, collapsed to a plain `Copy`
/// enum since `Integer`/`Undef`/`Input` never need node identity — only
/// `Array` and `Function` values are references into the arena (see
/// DESIGN.md for why scalars don't get an arena-backed node here).
#[derive(Debug, Clone, Copy)]
pub enum Value<'a> {
    Int(i64),
    Undef,
    Input,
    Array(&'a Array<'a>),
    Function(&'a Function<'a>),
}

impl<'a> Value<'a> {
    pub fn tag(&self) -> TypeTag {
        match self {
            Value::Int(_) => TypeTag::Integer,
            Value::Undef => TypeTag::Undef,
            Value::Input => TypeTag::Input,
            Value::Array(_) => TypeTag::Array,
            Value::Function(_) => TypeTag::Function,
        }
    }

    pub fn general_type(&self) -> GeneralType {
        self.tag().general()
    }

    /// Scalars are level 0; an array is one more than the level of its
    /// elements (assumed uniform, enforced at initialization).
    pub fn level(&self) -> usize {
        match self {
            Value::Array(arr) => 1 + arr.element_level(),
            _ => 0,
        }
    }
}

/// Identity equality for `Array`/`Function` (same node), structural
/// equality for everything else. Used only by tests.
impl<'a> PartialEq for Value<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Undef, Value::Undef) => true,
            (Value::Input, Value::Input) => true,
            (Value::Array(a), Value::Array(b)) => std::ptr::eq(*a, *b),
            (Value::Function(a), Value::Function(b)) => std::ptr::eq(*a, *b),
            _ => false,
        }
    }
}

/// A value together with the analyzer's `is_constexpr` flag (§3).
#[derive(Debug, Clone, Copy)]
pub struct Analyze<'a> {
    pub value: Value<'a>,
    pub is_constexpr: bool,
}

impl<'a> Default for Analyze<'a> {
    fn default() -> Self {
        Analyze {
            value: Value::Undef,
            is_constexpr: true,
        }
    }
}

impl<'a> Analyze<'a> {
    pub fn known(value: Value<'a>) -> Self {
        Analyze {
            value,
            is_constexpr: true,
        }
    }

    pub fn new(value: Value<'a>, is_constexpr: bool) -> Self {
        Analyze { value, is_constexpr }
    }
}

/// A named settable cell (§3 "Variable", §4.2).
pub struct Variable<'a> {
    pub name: String,
    pub location: Cell<Location>,
    state: RefCell<VarState<'a>>,
}

struct VarState<'a> {
    is_set: bool,
    value: Value<'a>,
    analyze: Analyze<'a>,
}

impl<'a> Variable<'a> {
    pub fn new(name: impl Into<String>, location: Location) -> Self {
        Variable {
            name: name.into(),
            location: Cell::new(location),
            state: RefCell::new(VarState {
                is_set: false,
                value: Value::Undef,
                analyze: Analyze::default(),
            }),
        }
    }

    pub fn is_set(&self) -> bool {
        self.state.borrow().is_set
    }

    pub fn get(&self) -> Value<'a> {
        self.state.borrow().value
    }

    pub fn get_analyze(&self) -> Analyze<'a> {
        self.state.borrow().analyze
    }

    /// Unconditional write, used by the evaluator. Indexed writes go
    /// through [`Array::shift_set`] instead.
    pub fn set(&self, value: Value<'a>) {
        let mut s = self.state.borrow_mut();
        s.is_set = true;
        s.value = value;
    }

    /// Analyzer-side write: only type/level-checked against the *prior*
    /// recorded type when the variable was already set (§4.2, §4.1).
    pub fn set_analyze(&self, new: Analyze<'a>, loc: Location) -> Result<(), AnalyzeError> {
        let mut s = self.state.borrow_mut();
        if s.is_set {
            check_assignable(s.analyze.value, new.value, loc)?;
        }
        s.is_set = true;
        s.analyze.is_constexpr &= new.is_constexpr;
        s.analyze.value = new.value;
        Ok(())
    }

    /// Direct overwrite of the predictability flag — see the Open
    /// Questions resolution in SPEC_FULL.md §9: unlike `set_analyze`,
    /// this assigns rather than ANDs, so a later `set_predict(true)` can
    /// restore predictability after a prior `false` write.
    pub fn set_predict(&self, value: bool) {
        self.state.borrow_mut().analyze.is_constexpr = value;
    }
}

fn check_assignable(old: Value, new: Value, loc: Location) -> Result<(), AnalyzeError> {
    let (old_ty, new_ty) = (old.general_type(), new.general_type());
    if old_ty != new_ty {
        return Err(AnalyzeError::AssignTypeMismatch {
            lhs: old_ty.name(),
            rhs: new_ty.name(),
            location: loc,
        });
    }
    if old_ty == GeneralType::Array {
        let (old_level, new_level) = (old.level(), new.level());
        if old_level != new_level {
            return Err(AnalyzeError::ArrayLevelMismatch {
                lhs: old_level,
                rhs: new_level,
                location: loc,
            });
        }
    }
    Ok(())
}

/// One element of an array's un-evaluated initializer list (§3 "Array").
pub enum ArrayElem<'a> {
    Value(&'a Expr<'a>),
    Repeat {
        value: &'a Expr<'a>,
        count: &'a Expr<'a>,
    },
}

struct ArrayState<'a> {
    is_initialized: bool,
    is_in_heap: bool,
    is_freed: bool,
    element_level: usize,
    e_values: Vec<Value<'a>>,
    e_indexes: Vec<i64>,
    a_values: Vec<Analyze<'a>>,
}

/// An array node (§3 "Array", §4.3). Holds its own un-evaluated
/// initializer list until first use, after which `e_values`/`a_values`
/// are frozen until scope exit clears or frees them.
pub struct Array<'a> {
    pub location: Location,
    pub elems: Vec<ArrayElem<'a>>,
    /// Index expressions applied directly on the literal's defining
    /// occurrence, e.g. the `[0]` in `print [1, 2, 3][0];`.
    pub init_indexes: Vec<&'a Expr<'a>>,
    state: RefCell<ArrayState<'a>>,
}

impl<'a> Array<'a> {
    pub fn new(location: Location, elems: Vec<ArrayElem<'a>>, init_indexes: Vec<&'a Expr<'a>>) -> Self {
        Array {
            location,
            elems,
            init_indexes,
            state: RefCell::new(ArrayState {
                is_initialized: false,
                is_in_heap: false,
                is_freed: false,
                element_level: 0,
                e_values: Vec::new(),
                e_indexes: Vec::new(),
                a_values: Vec::new(),
            }),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.state.borrow().is_initialized
    }

    pub fn is_in_heap(&self) -> bool {
        self.state.borrow().is_in_heap
    }

    pub fn is_freed(&self) -> bool {
        self.state.borrow().is_freed
    }

    pub fn size(&self) -> usize {
        self.state.borrow().e_values.len()
    }

    pub fn element_level(&self) -> usize {
        self.state.borrow().element_level
    }

    pub fn values(&self) -> Vec<Value<'a>> {
        self.state.borrow().e_values.clone()
    }

    pub fn get(&self, index: usize) -> Option<Value<'a>> {
        self.state.borrow().e_values.get(index).copied()
    }

    pub fn set_cell(&self, index: usize, value: Value<'a>) {
        self.state.borrow_mut().e_values[index] = value;
    }

    /// Record that this array's storage is backed by input-dependent
    /// (heap) sizing; called while evaluating a `repeat(v, n)` element
    /// whose count came from `?`.
    pub fn mark_in_heap(&self) {
        self.state.borrow_mut().is_in_heap = true;
    }

    pub fn freeze(&self, values: Vec<Value<'a>>, indexes: Vec<i64>, element_level: usize) {
        let mut s = self.state.borrow_mut();
        s.e_values = values;
        s.e_indexes = indexes;
        s.element_level = element_level;
        s.is_initialized = true;
    }

    pub fn freeze_analyze(&self, values: Vec<Analyze<'a>>, element_level: usize) {
        let mut s = self.state.borrow_mut();
        s.a_values = values;
        s.element_level = element_level;
        s.is_initialized = true;
    }

    pub fn analyze_values(&self) -> Vec<Analyze<'a>> {
        self.state.borrow().a_values.clone()
    }

    pub fn set_analyze_cell(&self, index: usize, a: Analyze<'a>) {
        self.state.borrow_mut().a_values[index] = a;
    }

    /// §4.3 "Scope-exit release". Heap arrays die for good; stack arrays
    /// just reset so a loop body can re-initialize them every iteration.
    pub fn clear(&self) {
        let mut s = self.state.borrow_mut();
        s.is_initialized = false;
        if s.is_in_heap {
            s.is_freed = true;
            s.e_values.clear();
            s.e_indexes.clear();
            s.a_values.clear();
        }
    }

    /// Runtime indexing (§4.3 "Index shift"). `indexes` are in the
    /// innermost-first storage order; consumed outer-to-inner.
    ///
    /// Unlike the analyzer (§7's "attempt to use freed array" is a
    /// semantic-analysis error only), execution never checks `is_freed`:
    /// `clear` resets `is_initialized` unconditionally, so an array
    /// re-entered on the next loop iteration re-initializes normally
    /// here regardless of whatever the analyzer's single static pass
    /// recorded about it being in-heap and freed.
    pub fn shift(&'a self, indexes: &[i64], loc: Location) -> Result<Value<'a>, RuntimeError> {
        let mut current = self;
        let mut order = indexes.iter().rev().copied();
        let mut result = Value::Array(current);
        loop {
            let idx = match order.next() {
                Some(idx) => idx,
                None => return Ok(result),
            };
            let size = current.size();
            let in_bounds = idx >= 0 && (idx as usize) < size;
            if !in_bounds {
                return Err(RuntimeError::IndexOutOfRange {
                    index: idx,
                    size,
                    location: loc,
                });
            }
            result = current.get(idx as usize).expect("index checked above");
            match result {
                Value::Array(next) => current = next,
                _ => {
                    // Any remaining indexes would walk past the array's
                    // nesting; that is caught statically by the analyzer
                    // (`OverIndexed`), so at runtime we simply stop here.
                    return Ok(result);
                }
            }
        }
    }

    /// Write through indexes, mirroring [`Array::shift`] but replacing
    /// the terminal cell instead of returning it.
    pub fn shift_set(&'a self, indexes: &[i64], value: Value<'a>, loc: Location) -> Result<(), RuntimeError> {
        let mut current = self;
        let mut order: Vec<i64> = indexes.iter().rev().copied().collect();
        let last = order.pop().expect("indexes non-empty");
        for idx in order {
            let size = current.size();
            if idx < 0 || (idx as usize) >= size {
                return Err(RuntimeError::IndexOutOfRange {
                    index: idx,
                    size,
                    location: loc,
                });
            }
            match current.get(idx as usize).expect("checked above") {
                Value::Array(next) => current = next,
                _ => return Err(RuntimeError::IndexOutOfRange { index: idx, size, location: loc }),
            }
        }
        let size = current.size();
        if last < 0 || (last as usize) >= size {
            return Err(RuntimeError::IndexOutOfRange {
                index: last,
                size,
                location: loc,
            });
        }
        current.set_cell(last as usize, value);
        Ok(())
    }

    /// §4.3 printing: `[e0, e1, …]`, nested arrays recursively, embedded
    /// newlines from a child's own print replaced by `, `.
    pub fn print(&self) -> String {
        let cells: Vec<String> = self.values().into_iter().map(print_value).collect();
        format!("[{}]", cells.join(", "))
    }
}

pub fn print_value(v: Value) -> String {
    match v {
        Value::Int(i) => i.to_string(),
        Value::Undef => "undef".to_string(),
        Value::Input => "?".to_string(),
        Value::Array(arr) => arr.print(),
        Value::Function(f) => format!("function {}", f.name),
    }
}

/// A function node (§3 "Function", §4.7).
pub struct Function<'a> {
    pub location: Location,
    pub name: String,
    pub params: Vec<&'a Variable<'a>>,
    pub body: &'a Scope<'a>,
    cached_analyze: RefCell<Option<Analyze<'a>>>,
}

impl<'a> Function<'a> {
    pub fn new(location: Location, name: String, params: Vec<&'a Variable<'a>>, body: &'a Scope<'a>) -> Self {
        Function {
            location,
            name,
            params,
            body,
            cached_analyze: RefCell::new(None),
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn cached_analyze(&self) -> Option<Analyze<'a>> {
        *self.cached_analyze.borrow()
    }

    pub fn cache_analyze(&self, a: Analyze<'a>) {
        *self.cached_analyze.borrow_mut() = Some(a);
    }
}

/// Per-compilation source of the synthetic names assigned to anonymous
/// functions (§4.7, §9 "Global mutable counter" — deliberately *not* a
/// process-wide `static` the way the reference implementation has it).
pub struct NameCounter {
    next: Cell<u32>,
}

impl NameCounter {
    pub fn new() -> Self {
        NameCounter { next: Cell::new(1) }
    }

    pub fn next_anonymous_name(&self) -> String {
        let n = self.next.get();
        self.next.set(n + 1);
        format!("#default_function_name_{:03}_#", n)
    }
}

/// Two scope shapes share one struct: a plain statement scope never has
/// its `return_expr` consulted for a value by the evaluator, while an
/// expression scope always does (§3 "Scope").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Statement,
    ExpressionReturn,
}

pub struct Scope<'a> {
    pub location: Location,
    pub kind: Cell<ScopeKind>,
    pub parent: Option<&'a Scope<'a>>,
    statements: RefCell<Vec<Stmt<'a>>>,
    return_expr: RefCell<Option<&'a Expr<'a>>>,
    names: RefCell<HashMap<String, &'a Variable<'a>>>,
    arrays: RefCell<Vec<&'a Array<'a>>>,
}

impl<'a> Scope<'a> {
    pub fn new(location: Location, kind: ScopeKind, parent: Option<&'a Scope<'a>>) -> Self {
        Scope {
            location,
            kind: Cell::new(kind),
            parent,
            statements: RefCell::new(Vec::new()),
            return_expr: RefCell::new(None),
            names: RefCell::new(HashMap::new()),
            arrays: RefCell::new(Vec::new()),
        }
    }

    /// Nothing may follow an explicit `return` at the statement level.
    pub fn push_statement(&self, stmt: Stmt<'a>) {
        if self.return_expr.borrow().is_some() {
            return;
        }
        self.statements.borrow_mut().push(stmt);
    }

    pub fn set_return(&self, expr: &'a Expr<'a>) {
        let mut r = self.return_expr.borrow_mut();
        if r.is_none() {
            *r = Some(expr);
        }
    }

    /// If no explicit `return` was given, promote the last statement
    /// (when it is a bare expression statement) into an implicit return.
    /// Used when a statement scope needs to become an expression scope
    /// (function bodies, parenthesized blocks).
    pub fn finish_return(&self) {
        if self.return_expr.borrow().is_some() {
            return;
        }
        let mut stmts = self.statements.borrow_mut();
        if let Some(Stmt::Instruction(expr)) = stmts.last() {
            let expr = *expr;
            stmts.pop();
            drop(stmts);
            *self.return_expr.borrow_mut() = Some(expr);
        }
    }

    pub fn return_expr(&self) -> Option<&'a Expr<'a>> {
        *self.return_expr.borrow()
    }

    pub fn statements(&self) -> std::cell::Ref<'_, Vec<Stmt<'a>>> {
        self.statements.borrow()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.borrow().is_empty() && self.return_expr.borrow().is_none()
    }

    pub fn define_variable(&self, var: &'a Variable<'a>) {
        self.names.borrow_mut().insert(var.name.clone(), var);
    }

    /// Look up a binding local to this scope only (used by deep copy's
    /// "nearest enclosing *copied* scope" rule, §4.2).
    pub fn local_variable(&self, name: &str) -> Option<&'a Variable<'a>> {
        self.names.borrow().get(name).copied()
    }

    /// Walk up the parent chain (§3 invariant: resolution stays within
    /// one function's scope nest).
    pub fn get_variable(&self, name: &str) -> Option<&'a Variable<'a>> {
        if let Some(v) = self.local_variable(name) {
            return Some(v);
        }
        self.parent.and_then(|p| p.get_variable(name))
    }

    /// Every variable bound directly in this scope (not its ancestors).
    /// Used by the analyzer to mark loop/fork bodies unpredictable
    /// before walking them (§9 Open Questions, `set_predict`).
    pub fn local_variables(&self) -> Vec<&'a Variable<'a>> {
        self.names.borrow().values().copied().collect()
    }

    pub fn add_array(&self, arr: &'a Array<'a>) {
        self.arrays.borrow_mut().push(arr);
    }

    pub fn clear_memory(&self) {
        for arr in self.arrays.borrow().iter() {
            arr.clear();
        }
    }
}

/// Binary operators (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Eq,
    Ne,
    Le,
    Ge,
    Lt,
    Gt,
    Or,
    And,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// Unary operators (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Plus,
    Neg,
    Not,
}

/// Either a statically resolved function (call-by-name, §4.7) or an
/// arbitrary expression expected to evaluate to a function value.
pub enum Callee<'a> {
    ByName(&'a Function<'a>),
    ByExpr(&'a Expr<'a>),
}

/// Expression nodes. One inherent `impl` block apiece in `analyzer.rs`
/// and `evaluator.rs` provides `analyze`/`execute`, matching the
/// reference implementation's per-node virtual methods without
/// introducing a trait-object hierarchy (see SPEC_FULL.md §9).
pub enum Expr<'a> {
    Number(i64),
    Undef,
    Input,
    Lvalue {
        variable: &'a Variable<'a>,
        /// Innermost-first; empty for a bare variable read.
        indexes: Vec<&'a Expr<'a>>,
    },
    Assign {
        target: &'a Expr<'a>,
        value: &'a Expr<'a>,
    },
    BinOp {
        op: BinOp,
        left: &'a Expr<'a>,
        right: &'a Expr<'a>,
    },
    UnOp {
        op: UnOp,
        operand: &'a Expr<'a>,
    },
    Print(&'a Expr<'a>),
    ArrayLit(&'a Array<'a>),
    ScopeExpr(&'a Scope<'a>),
    FunctionLit(&'a Function<'a>),
    Call {
        callee: Callee<'a>,
        args: Vec<&'a Expr<'a>>,
    },
}

impl<'a> Expr<'a> {
    pub fn location(&self) -> Location {
        match self {
            Expr::Lvalue { variable, .. } => variable.location.get(),
            Expr::ArrayLit(arr) => arr.location,
            Expr::ScopeExpr(scope) => scope.location,
            Expr::FunctionLit(f) => f.location,
            // Literal/operator nodes don't carry their own location in
            // this tree; callers that need one use the enclosing
            // statement's location instead.
            _ => Location::new(0, 0, 0),
        }
    }
}

/// Statement nodes (§4.5).
pub enum Stmt<'a> {
    Instruction(&'a Expr<'a>),
    Loop {
        cond: &'a Expr<'a>,
        body: &'a Scope<'a>,
    },
    Fork {
        cond: &'a Expr<'a>,
        then_body: &'a Scope<'a>,
        else_body: &'a Scope<'a>,
    },
    Block(&'a Scope<'a>),
}
