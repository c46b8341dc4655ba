// paracl -- a tree-walking interpreter for the ParaCL language
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! Hand-rolled lexer for ParaCL's C-like concrete syntax (§6 "Language
//! surface"). Structured the same way as the base crate's scheme-like
//! lexer (a `CharIndices` stream plus `lex_*` helpers keyed on the first
//! character), but tracks `(row, col)` as it scans instead of producing
//! byte offsets for a separate line map, since the core wants a
//! `(row, col, len)` triple directly (§6 "Diagnostics").

use super::error::LexError;
use super::location::Location;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Ident(String),
    Int(String),

    // Keywords
    While,
    If,
    Else,
    Print,
    Return,
    Func,
    Repeat,
    Undef,

    // Punctuation
    Assign,
    Semi,
    Comma,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Question,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Not,
    EqEq,
    NotEq,
    Le,
    Ge,
    Lt,
    Gt,
    OrOr,
    AndAnd,
}

pub struct Lexer<'a> {
    input: &'a str,
    chars: std::str::CharIndices<'a>,
    row: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input,
            chars: input.char_indices(),
            row: 1,
            col: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.clone().next().map(|(_, c)| c)
    }

    fn peek2(&self) -> Option<char> {
        self.chars.clone().nth(1).map(|(_, c)| c)
    }

    fn advance(&mut self) -> Option<char> {
        let (_, ch) = self.chars.next()?;
        if ch == '\n' {
            self.row += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn loc(&self, start_row: usize, start_col: usize, len: usize) -> Location {
        Location::new(start_row, start_col, len)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek2() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<(Location, Token)>, LexError> {
        let mut out = Vec::new();
        loop {
            self.skip_trivia();
            let (row, col) = (self.row, self.col);
            let ch = match self.peek() {
                Some(c) => c,
                None => break,
            };

            macro_rules! single {
                ($tok:expr) => {{
                    self.advance();
                    out.push((self.loc(row, col, 1), $tok));
                }};
            }
            macro_rules! double {
                ($second:expr, $tok2:expr, $tok1:expr) => {{
                    self.advance();
                    if self.peek() == Some($second) {
                        self.advance();
                        out.push((self.loc(row, col, 2), $tok2));
                    } else {
                        out.push((self.loc(row, col, 1), $tok1));
                    }
                }};
            }

            match ch {
                '(' => single!(Token::LParen),
                ')' => single!(Token::RParen),
                '{' => single!(Token::LBrace),
                '}' => single!(Token::RBrace),
                '[' => single!(Token::LBracket),
                ']' => single!(Token::RBracket),
                ';' => single!(Token::Semi),
                ',' => single!(Token::Comma),
                '?' => single!(Token::Question),
                '+' => single!(Token::Plus),
                '-' => single!(Token::Minus),
                '*' => single!(Token::Star),
                '/' => single!(Token::Slash),
                '%' => single!(Token::Percent),
                '=' => double!('=', Token::EqEq, Token::Assign),
                '!' => double!('=', Token::NotEq, Token::Not),
                '<' => double!('=', Token::Le, Token::Lt),
                '>' => double!('=', Token::Ge, Token::Gt),
                '|' => double!('|', Token::OrOr, Token::OrOr),
                '&' => double!('&', Token::AndAnd, Token::AndAnd),
                _ if ch.is_ascii_digit() => {
                    let mut text = String::new();
                    while let Some(c) = self.peek() {
                        if c.is_ascii_digit() {
                            text.push(c);
                            self.advance();
                        } else {
                            break;
                        }
                    }
                    let len = text.chars().count();
                    out.push((self.loc(row, col, len), Token::Int(text)));
                }
                _ if is_ident_start(ch) => {
                    let mut text = String::new();
                    while let Some(c) = self.peek() {
                        if is_ident_cont(c) {
                            text.push(c);
                            self.advance();
                        } else {
                            break;
                        }
                    }
                    let len = text.chars().count();
                    let tok = match text.as_str() {
                        "while" => Token::While,
                        "if" => Token::If,
                        "else" => Token::Else,
                        "print" => Token::Print,
                        "return" => Token::Return,
                        "func" => Token::Func,
                        "repeat" => Token::Repeat,
                        "undef" => Token::Undef,
                        _ => Token::Ident(text),
                    };
                    out.push((self.loc(row, col, len), tok));
                }
                other => {
                    self.advance();
                    return Err(LexError::Unrecognized {
                        found: other,
                        location: self.loc(row, col, 1),
                    });
                }
            }
        }
        let _ = self.input;
        Ok(out)
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}

fn is_ident_cont(ch: char) -> bool {
    is_ident_start(ch) || ch.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(src: &str) -> Vec<Token> {
        Lexer::new(src)
            .tokenize()
            .expect("lex")
            .into_iter()
            .map(|(_, t)| t)
            .collect()
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            toks("while foo_bar2 if"),
            vec![Token::While, Token::Ident("foo_bar2".to_string()), Token::If]
        );
    }

    #[test]
    fn two_character_operators_dont_split() {
        assert_eq!(toks("<= >= == != || &&"), vec![
            Token::Le, Token::Ge, Token::EqEq, Token::NotEq, Token::OrOr, Token::AndAnd
        ]);
        assert_eq!(toks("< > = !"), vec![Token::Lt, Token::Gt, Token::Assign, Token::Not]);
    }

    #[test]
    fn line_comments_are_skipped() {
        assert_eq!(toks("1 // ignored until newline\n2"), vec![Token::Int("1".to_string()), Token::Int("2".to_string())]);
    }

    #[test]
    fn row_col_tracked_across_lines() {
        let tokens = Lexer::new("x\ny").tokenize().expect("lex");
        assert_eq!(tokens[0].0, Location::new(1, 1, 1));
        assert_eq!(tokens[1].0, Location::new(2, 1, 1));
    }

    #[test]
    fn unrecognized_character_is_a_lex_error() {
        let err = Lexer::new("x = 1 @ 2;").tokenize().unwrap_err();
        assert!(matches!(err, LexError::Unrecognized { found: '@', .. }));
    }
}
