// paracl -- a tree-walking interpreter for the ParaCL language
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! Recursive-descent parser building directly into the node arena (§2
//! "Data flow": "parser builds tree into arena"), the same way the
//! reference implementation's own parser calls `buf.add_node<NodeT>`
//! inline rather than building an intermediate tree to convert later.
//!
//! Variable references resolve against a parse-time scope stack exactly
//! the way the reference tree's `node_lvalue_t`/`scope_base_t::get_node`
//! resolve them: the nearest enclosing scope that already binds the name
//! wins, otherwise a fresh [`Variable`] is created in the innermost
//! scope. Function calls resolve "by name" against a flat table the same
//! role as `global_scope` plays during analysis/copy (§4.7), letting a
//! function see its own name while its body is being parsed (recursion).

use std::collections::HashMap;

use super::arena::Arena;
use super::ast::{Array, ArrayElem, BinOp, Callee, Expr, Function, Scope, ScopeKind, Stmt, UnOp, Variable};
use super::error::ParseError;
use super::lexer::{Lexer, Token};
use super::location::Location;

type PResult<T> = Result<T, ParseError>;

pub struct Parser<'a> {
    arena: &'a Arena<'a>,
    tokens: Vec<(Location, Token)>,
    pos: usize,
    scopes: Vec<&'a Scope<'a>>,
    functions: HashMap<String, &'a Function<'a>>,
}

impl<'a> Parser<'a> {
    pub fn new(arena: &'a Arena<'a>, tokens: Vec<(Location, Token)>) -> Self {
        Parser {
            arena,
            tokens,
            pos: 0,
            scopes: Vec::new(),
            functions: HashMap::new(),
        }
    }

    pub fn parse_program(mut self) -> PResult<&'a Scope<'a>> {
        let loc = self.peek_loc();
        let root = self.arena.scope(Scope::new(loc, ScopeKind::Statement, None));
        self.scopes.push(root);
        while !self.is_eof() {
            let stmt = self.parse_stmt()?;
            root.push_statement(stmt);
        }
        self.scopes.pop();
        Ok(root)
    }

    // -- token stream helpers ------------------------------------------------

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn peek_loc(&self) -> Location {
        self.tokens
            .get(self.pos)
            .map(|(l, _)| *l)
            .unwrap_or_else(|| Location::new(0, 0, 0))
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn advance(&mut self) -> PResult<(Location, Token)> {
        let entry = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| ParseError::Eof {
                location: self.peek_loc(),
            })?;
        self.pos += 1;
        Ok(entry)
    }

    fn expect(&mut self, expected: Token) -> PResult<Location> {
        let (loc, tok) = self.advance()?;
        if tok == expected {
            Ok(loc)
        } else {
            Err(ParseError::Unexpected {
                expected: format!("{:?}", expected),
                found: format!("{:?}", tok),
                location: loc,
            })
        }
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_ident(&mut self) -> PResult<(Location, String)> {
        let (loc, tok) = self.advance()?;
        match tok {
            Token::Ident(name) => Ok((loc, name)),
            other => Err(ParseError::Unexpected {
                expected: "identifier".to_string(),
                found: format!("{:?}", other),
                location: loc,
            }),
        }
    }

    // -- scope management -----------------------------------------------------

    fn current_scope(&self) -> &'a Scope<'a> {
        *self.scopes.last().expect("at least the root scope is always active")
    }

    fn push_scope(&mut self, loc: Location, kind: ScopeKind) -> &'a Scope<'a> {
        let parent = Some(self.current_scope());
        let scope = self.arena.scope(Scope::new(loc, kind, parent));
        self.scopes.push(scope);
        scope
    }

    fn pop_scope(&mut self) -> &'a Scope<'a> {
        self.scopes.pop().expect("push_scope/pop_scope balanced")
    }

    fn parse_block_body(&mut self, loc: Location, kind: ScopeKind) -> PResult<&'a Scope<'a>> {
        self.expect(Token::LBrace)?;
        let scope = self.push_scope(loc, kind);
        while !self.eat(&Token::RBrace) {
            if self.is_eof() {
                return Err(ParseError::Eof {
                    location: self.peek_loc(),
                });
            }
            let stmt = self.parse_stmt()?;
            scope.push_statement(stmt);
        }
        self.pop_scope();
        if kind == ScopeKind::ExpressionReturn {
            scope.finish_return();
        }
        Ok(scope)
    }

    /// Resolve a referenced name to a variable, creating it in the
    /// innermost scope on first mention (§4.2, §9 "nearest enclosing
    /// scope" rule applied at tree-construction time).
    fn resolve_variable(&mut self, name: &str, loc: Location) -> &'a Variable<'a> {
        if let Some(v) = self.current_scope().get_variable(name) {
            return v;
        }
        let var = self.arena.variable(Variable::new(name.to_string(), loc));
        self.current_scope().define_variable(var);
        var
    }

    // -- statements -------------------------------------------------------------

    fn parse_stmt(&mut self) -> PResult<Stmt<'a>> {
        match self.peek() {
            Some(Token::Print) => {
                self.advance()?;
                let expr = self.parse_expr()?;
                self.expect(Token::Semi)?;
                Ok(Stmt::Instruction(self.arena.expr(Expr::Print(expr))))
            }
            Some(Token::Return) => {
                self.advance()?;
                let expr = self.parse_expr()?;
                self.expect(Token::Semi)?;
                self.current_scope().set_return(expr);
                // The return itself contributes no further statement node;
                // push_statement on the *caller* is a no-op once return_expr
                // is set, matching §4.6.
                Ok(Stmt::Instruction(expr))
            }
            Some(Token::While) => {
                self.advance()?;
                self.expect(Token::LParen)?;
                let cond = self.parse_expr()?;
                self.expect(Token::RParen)?;
                let body_loc = self.peek_loc();
                let body = self.parse_loop_body(body_loc)?;
                Ok(Stmt::Loop { cond, body })
            }
            Some(Token::If) => {
                self.advance()?;
                self.expect(Token::LParen)?;
                let cond = self.parse_expr()?;
                self.expect(Token::RParen)?;
                let then_loc = self.peek_loc();
                let then_body = self.parse_loop_body(then_loc)?;
                let else_body = if self.eat(&Token::Else) {
                    let else_loc = self.peek_loc();
                    self.parse_loop_body(else_loc)?
                } else {
                    self.arena
                        .scope(Scope::new(then_loc, ScopeKind::Statement, Some(self.current_scope())))
                };
                Ok(Stmt::Fork {
                    cond,
                    then_body,
                    else_body,
                })
            }
            Some(Token::LBrace) => {
                let loc = self.peek_loc();
                let scope = self.parse_block_body(loc, ScopeKind::Statement)?;
                Ok(Stmt::Block(scope))
            }
            _ => {
                let expr = self.parse_expr()?;
                self.expect(Token::Semi)?;
                Ok(Stmt::Instruction(expr))
            }
        }
    }

    /// Loop/fork bodies are always their own nested scope, whether or
    /// not the source spelled out braces (`while (x) y = y - 1;`).
    fn parse_loop_body(&mut self, loc: Location) -> PResult<&'a Scope<'a>> {
        if self.peek() == Some(&Token::LBrace) {
            self.parse_block_body(loc, ScopeKind::Statement)
        } else {
            let scope = self.push_scope(loc, ScopeKind::Statement);
            let stmt = self.parse_stmt()?;
            scope.push_statement(stmt);
            self.pop_scope();
            Ok(scope)
        }
    }

    // -- expressions (precedence climbing, mirroring the grammar in §6) --------

    fn parse_expr(&mut self) -> PResult<&'a Expr<'a>> {
        self.parse_assign()
    }

    fn parse_assign(&mut self) -> PResult<&'a Expr<'a>> {
        let lhs = self.parse_or()?;
        if self.eat(&Token::Assign) {
            let rhs = self.parse_assign()?;
            // A bare `name = func(...) {...};` makes `name` callable by
            // name at later call sites (§4.7), mirroring how the
            // reference tree's function node becomes reachable through
            // `global_scope` under its declaring name.
            if let (Expr::Lvalue { variable, indexes }, Expr::FunctionLit(f)) = (lhs, rhs) {
                if indexes.is_empty() {
                    self.functions.insert(variable.name.clone(), *f);
                }
            }
            return Ok(self.arena.expr(Expr::Assign { target: lhs, value: rhs }));
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> PResult<&'a Expr<'a>> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::OrOr) {
            let rhs = self.parse_and()?;
            lhs = self.arena.expr(Expr::BinOp { op: BinOp::Or, left: lhs, right: rhs });
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> PResult<&'a Expr<'a>> {
        let mut lhs = self.parse_eq()?;
        while self.eat(&Token::AndAnd) {
            let rhs = self.parse_eq()?;
            lhs = self.arena.expr(Expr::BinOp { op: BinOp::And, left: lhs, right: rhs });
        }
        Ok(lhs)
    }

    fn parse_eq(&mut self) -> PResult<&'a Expr<'a>> {
        let mut lhs = self.parse_rel()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinOp::Eq,
                Some(Token::NotEq) => BinOp::Ne,
                _ => break,
            };
            self.advance()?;
            let rhs = self.parse_rel()?;
            lhs = self.arena.expr(Expr::BinOp { op, left: lhs, right: rhs });
        }
        Ok(lhs)
    }

    fn parse_rel(&mut self) -> PResult<&'a Expr<'a>> {
        let mut lhs = self.parse_add()?;
        loop {
            let op = match self.peek() {
                Some(Token::Le) => BinOp::Le,
                Some(Token::Ge) => BinOp::Ge,
                Some(Token::Lt) => BinOp::Lt,
                Some(Token::Gt) => BinOp::Gt,
                _ => break,
            };
            self.advance()?;
            let rhs = self.parse_add()?;
            lhs = self.arena.expr(Expr::BinOp { op, left: lhs, right: rhs });
        }
        Ok(lhs)
    }

    fn parse_add(&mut self) -> PResult<&'a Expr<'a>> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance()?;
            let rhs = self.parse_mul()?;
            lhs = self.arena.expr(Expr::BinOp { op, left: lhs, right: rhs });
        }
        Ok(lhs)
    }

    fn parse_mul(&mut self) -> PResult<&'a Expr<'a>> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Mod,
                _ => break,
            };
            self.advance()?;
            let rhs = self.parse_unary()?;
            lhs = self.arena.expr(Expr::BinOp { op, left: lhs, right: rhs });
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<&'a Expr<'a>> {
        let op = match self.peek() {
            Some(Token::Plus) => Some(UnOp::Plus),
            Some(Token::Minus) => Some(UnOp::Neg),
            Some(Token::Not) => Some(UnOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            self.advance()?;
            let operand = self.parse_unary()?;
            return Ok(self.arena.expr(Expr::UnOp { op, operand }));
        }
        self.parse_postfix()
    }

    /// Indexing only applies to bare variable references here; array
    /// literals consume their own trailing index chain directly in
    /// [`Parser::parse_primary`], before the `Array` node is allocated,
    /// since `Array::init_indexes` is fixed at construction time.
    fn parse_postfix(&mut self) -> PResult<&'a Expr<'a>> {
        let expr = self.parse_primary()?;
        if let Expr::Lvalue { variable, indexes } = expr {
            if indexes.is_empty() && self.peek() == Some(&Token::LBracket) {
                let new_indexes = self.parse_trailing_indexes()?;
                if !new_indexes.is_empty() {
                    return Ok(self.arena.expr(Expr::Lvalue {
                        variable: *variable,
                        indexes: new_indexes,
                    }));
                }
            }
        }
        Ok(expr)
    }

    /// Innermost-first storage (§3 invariant): reverse the left-to-right
    /// outer->inner syntactic order of a run of `[expr]` suffixes.
    fn parse_trailing_indexes(&mut self) -> PResult<Vec<&'a Expr<'a>>> {
        let mut indexes = Vec::new();
        while self.eat(&Token::LBracket) {
            let idx = self.parse_expr()?;
            self.expect(Token::RBracket)?;
            indexes.push(idx);
        }
        indexes.reverse();
        Ok(indexes)
    }

    fn parse_primary(&mut self) -> PResult<&'a Expr<'a>> {
        let (loc, tok) = self.advance()?;
        match tok {
            Token::Int(text) => {
                let value: i64 = text
                    .parse()
                    .map_err(|source| ParseError::InvalidInt { source, location: loc })?;
                Ok(self.arena.expr(Expr::Number(value)))
            }
            Token::Undef => Ok(self.arena.expr(Expr::Undef)),
            Token::Question => Ok(self.arena.expr(Expr::Input)),
            Token::LParen => {
                let inner = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::LBrace => {
                self.pos -= 1;
                let scope = self.parse_block_body(loc, ScopeKind::ExpressionReturn)?;
                Ok(self.arena.expr(Expr::ScopeExpr(scope)))
            }
            Token::LBracket => {
                let elems = self.parse_array_elems()?;
                let indexes = self.parse_trailing_indexes()?;
                let arr = self.arena.array(Array::new(loc, elems, indexes));
                // §3 "Lifecycle": arrays register with their enclosing
                // scope's memory table at construction, so scope exit
                // (loop-body reinit, heap release) can find them.
                self.current_scope().add_array(arr);
                Ok(self.arena.expr(Expr::ArrayLit(arr)))
            }
            Token::Repeat => {
                self.expect(Token::LParen)?;
                let value = self.parse_expr()?;
                self.expect(Token::Comma)?;
                let count = self.parse_expr()?;
                self.expect(Token::RParen)?;
                let indexes = self.parse_trailing_indexes()?;
                let arr = self.arena.array(Array::new(
                    loc,
                    vec![ArrayElem::Repeat { value, count }],
                    indexes,
                ));
                self.current_scope().add_array(arr);
                Ok(self.arena.expr(Expr::ArrayLit(arr)))
            }
            Token::Func => {
                self.expect(Token::LParen)?;
                let param_names = self.parse_param_list()?;
                self.expect(Token::RParen)?;

                let body_loc = self.peek_loc();
                // Two-phase construction mirrors the reference
                // implementation's `node_function_t(..., block=nullptr)`
                // followed by `bind_block`: params need to be live
                // variables inside the body scope before the body is
                // parsed, but the `Function` node itself needs the
                // parsed body to be constructed.
                // Duplicate parameter names are a semantic-analysis
                // concern (`AnalyzeError::DuplicateParameter`), not a
                // syntax error, so they are left for the analyzer.
                let params: Vec<&'a Variable<'a>> = param_names
                    .iter()
                    .map(|(loc, name)| self.arena.variable(Variable::new(name.clone(), *loc)))
                    .collect();

                let parent = Some(self.current_scope());
                let body = self
                    .arena
                    .scope(Scope::new(body_loc, ScopeKind::ExpressionReturn, parent));
                for &p in &params {
                    body.define_variable(p);
                }
                self.scopes.push(body);
                self.expect(Token::LBrace)?;
                while !self.eat(&Token::RBrace) {
                    if self.is_eof() {
                        return Err(ParseError::Eof {
                            location: self.peek_loc(),
                        });
                    }
                    let stmt = self.parse_stmt()?;
                    body.push_statement(stmt);
                }
                self.scopes.pop();
                body.finish_return();

                let name = self.arena.names.next_anonymous_name();
                let func = self.arena.function(Function::new(loc, name, params, body));
                Ok(self.arena.expr(Expr::FunctionLit(func)))
            }
            Token::Ident(name) => {
                if self.peek() == Some(&Token::LParen) {
                    self.advance()?;
                    let args = self.parse_arg_list()?;
                    self.expect(Token::RParen)?;
                    let callee = match self.functions.get(&name) {
                        Some(f) => Callee::ByName(f),
                        None => {
                            let var = self.resolve_variable(&name, loc);
                            Callee::ByExpr(self.arena.expr(Expr::Lvalue {
                                variable: var,
                                indexes: Vec::new(),
                            }))
                        }
                    };
                    return Ok(self.arena.expr(Expr::Call { callee, args }));
                }
                let var = self.resolve_variable(&name, loc);
                Ok(self.arena.expr(Expr::Lvalue {
                    variable: var,
                    indexes: Vec::new(),
                }))
            }
            other => Err(ParseError::Unexpected {
                expected: "expression".to_string(),
                found: format!("{:?}", other),
                location: loc,
            }),
        }
    }

    fn parse_array_elems(&mut self) -> PResult<Vec<ArrayElem<'a>>> {
        let mut elems = Vec::new();
        if self.eat(&Token::RBracket) {
            return Ok(elems);
        }
        loop {
            if self.peek() == Some(&Token::Repeat) {
                self.advance()?;
                self.expect(Token::LParen)?;
                let value = self.parse_expr()?;
                self.expect(Token::Comma)?;
                let count = self.parse_expr()?;
                self.expect(Token::RParen)?;
                elems.push(ArrayElem::Repeat { value, count });
            } else {
                let value = self.parse_expr()?;
                elems.push(ArrayElem::Value(value));
            }
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(Token::RBracket)?;
            break;
        }
        Ok(elems)
    }

    fn parse_param_list(&mut self) -> PResult<Vec<(Location, String)>> {
        let mut params = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            return Ok(params);
        }
        loop {
            let (loc, name) = self.expect_ident()?;
            params.push((loc, name));
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(params)
    }

    fn parse_arg_list(&mut self) -> PResult<Vec<&'a Expr<'a>>> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(args)
    }
}

pub fn parse<'a>(arena: &'a Arena<'a>, source: &str) -> Result<&'a Scope<'a>, super::error::ParaclError> {
    let tokens = Lexer::new(source).tokenize()?;
    let parser = Parser::new(arena, tokens);
    Ok(parser.parse_program()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> usize {
        let arena = Arena::new();
        let tokens = Lexer::new(src).tokenize().expect("lex");
        let root = Parser::new(&arena, tokens).parse_program().expect("parse");
        root.statements().len()
    }

    #[test]
    fn indexes_are_stored_innermost_first() {
        let arena = Arena::new();
        let tokens = Lexer::new("a[1][2];").tokenize().expect("lex");
        let root = Parser::new(&arena, tokens).parse_program().expect("parse");
        let stmts = root.statements();
        let expr: &Expr = match stmts.first() {
            Some(Stmt::Instruction(e)) => *e,
            other => panic!("expected one instruction statement, got {:?}", other.is_some()),
        };
        match expr {
            Expr::Lvalue { indexes, .. } => {
                assert_eq!(indexes.len(), 2);
                match (indexes[0], indexes[1]) {
                    (Expr::Number(inner), Expr::Number(outer)) => {
                        assert_eq!(*inner, 2);
                        assert_eq!(*outer, 1);
                    }
                    _ => panic!("expected numeric index literals"),
                }
            }
            _ => panic!("expected an Lvalue expression"),
        }
    }

    #[test]
    fn a_bare_expression_statement_requires_a_semicolon() {
        let arena = Arena::new();
        let tokens = Lexer::new("1 + 1").tokenize().expect("lex");
        let err = Parser::new(&arena, tokens).parse_program().unwrap_err();
        assert!(matches!(err, ParseError::Eof { .. } | ParseError::Unexpected { .. }));
    }

    #[test]
    fn trailing_statement_after_return_is_dropped() {
        // `Scope::push_statement` stops accepting statements once a
        // `return` has been set (§4.5 "nothing may follow").
        assert_eq!(parse_ok("f = func(x) { return x; print x; }; print f(1);"), 2);
    }

    #[test]
    fn function_without_braces_loop_body_is_its_own_scope() {
        assert_eq!(parse_ok("i = 0; while (i < 3) i = i + 1;"), 2);
    }

    #[test]
    fn an_if_without_else_gets_an_empty_else_scope() {
        let arena = Arena::new();
        let tokens = Lexer::new("if (1) { print 1; }").tokenize().expect("lex");
        let root = Parser::new(&arena, tokens).parse_program().expect("parse");
        match root.statements().first() {
            Some(Stmt::Fork { else_body, .. }) => assert!(else_body.is_empty()),
            other => panic!("expected a fork statement, got {:?}", other.is_some()),
        }
    }
}
