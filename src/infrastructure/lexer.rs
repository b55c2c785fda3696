//! Indentation Lexer
//!
//! Tokenizes the traced language: INDENT/DEDENT pairs are synthesized from
//! leading whitespace against an indent stack, and logical newlines are
//! suppressed inside brackets. Tabs advance to the next multiple of eight
//! columns.

use crate::domain::ast::ParseError;

/// Token kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),
    // Keywords
    Def,
    Return,
    If,
    Elif,
    Else,
    For,
    While,
    In,
    Pass,
    Break,
    Continue,
    And,
    Or,
    Not,
    True,
    False,
    None,
    // Operators and punctuation
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    Assign,
    EqEq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    // Layout
    Newline,
    Indent,
    Dedent,
    EndOfFile,
}

/// A token with its 1-based source line.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub line: u32,
}

fn keyword(name: &str) -> Option<Tok> {
    let tok = match name {
        "def" => Tok::Def,
        "return" => Tok::Return,
        "if" => Tok::If,
        "elif" => Tok::Elif,
        "else" => Tok::Else,
        "for" => Tok::For,
        "while" => Tok::While,
        "in" => Tok::In,
        "pass" => Tok::Pass,
        "break" => Tok::Break,
        "continue" => Tok::Continue,
        "and" => Tok::And,
        "or" => Tok::Or,
        "not" => Tok::Not,
        "True" => Tok::True,
        "False" => Tok::False,
        "None" => Tok::None,
        _ => return Option::None,
    };
    Some(tok)
}

/// Tokenize a full source text.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    tokens: Vec<Token>,
    indents: Vec<usize>,
    bracket_depth: usize,
    at_line_start: bool,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            tokens: Vec::new(),
            indents: vec![0],
            bracket_depth: 0,
            at_line_start: true,
        }
    }

    fn push(&mut self, tok: Tok) {
        self.tokens.push(Token { tok, line: self.line });
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn run(mut self) -> Result<Vec<Token>, ParseError> {
        loop {
            if self.at_line_start && self.bracket_depth == 0 {
                if !self.handle_line_start()? {
                    break;
                }
                continue;
            }
            let Some(c) = self.peek() else { break };
            match c {
                ' ' | '\t' | '\r' => {
                    self.pos += 1;
                }
                '\n' => {
                    if self.bracket_depth == 0 {
                        self.push(Tok::Newline);
                        self.at_line_start = true;
                    }
                    self.pos += 1;
                    self.line += 1;
                }
                '#' => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.pos += 1;
                    }
                }
                '"' | '\'' => self.string_literal(c)?,
                c if c.is_ascii_digit() => self.number()?,
                c if c.is_alphanumeric() || c == '_' => self.identifier(),
                _ => self.operator(c)?,
            }
        }
        // Close out the final logical line and any open indentation.
        if !self.at_line_start && self.bracket_depth == 0 {
            self.push(Tok::Newline);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(Tok::Dedent);
        }
        self.push(Tok::EndOfFile);
        Ok(self.tokens)
    }

    /// Measure indentation at a logical line start. Returns false at end of
    /// input. Blank and comment-only lines produce no tokens at all.
    fn handle_line_start(&mut self) -> Result<bool, ParseError> {
        let mut column = 0usize;
        while let Some(c) = self.peek() {
            match c {
                ' ' => {
                    column += 1;
                    self.pos += 1;
                }
                '\t' => {
                    column += 8 - column % 8;
                    self.pos += 1;
                }
                '\r' => {
                    self.pos += 1;
                }
                _ => break,
            }
        }
        match self.peek() {
            Option::None => return Ok(false),
            Some('\n') => {
                self.pos += 1;
                self.line += 1;
                return Ok(true);
            }
            Some('#') => {
                while self.peek().is_some_and(|c| c != '\n') {
                    self.pos += 1;
                }
                return Ok(true);
            }
            Some(_) => {}
        }
        let current = *self.indents.last().expect("indent stack is never empty");
        if column > current {
            self.indents.push(column);
            self.push(Tok::Indent);
        } else if column < current {
            while column < *self.indents.last().expect("indent stack is never empty") {
                self.indents.pop();
                self.push(Tok::Dedent);
            }
            if column != *self.indents.last().expect("indent stack is never empty") {
                return Err(ParseError::new(
                    "unindent does not match any outer indentation level",
                    self.line,
                ));
            }
        }
        self.at_line_start = false;
        Ok(true)
    }

    fn string_literal(&mut self, quote: char) -> Result<(), ParseError> {
        self.pos += 1;
        let mut text = String::new();
        loop {
            match self.peek() {
                Option::None | Some('\n') => {
                    return Err(ParseError::new(
                        "EOL while scanning string literal",
                        self.line,
                    ));
                }
                Some('\\') => {
                    self.pos += 1;
                    let escaped = self.peek().ok_or_else(|| {
                        ParseError::new("EOL while scanning string literal", self.line)
                    })?;
                    let resolved = match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '\\' => '\\',
                        '\'' => '\'',
                        '"' => '"',
                        '0' => '\0',
                        other => {
                            // Unknown escapes keep the backslash, like the
                            // source language does.
                            text.push('\\');
                            other
                        }
                    };
                    text.push(resolved);
                    self.pos += 1;
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    break;
                }
                Some(c) => {
                    text.push(c);
                    self.pos += 1;
                }
            }
        }
        self.push(Tok::Str(text));
        Ok(())
    }

    fn number(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let mut is_float = false;
        if self.peek() == Some('.') && self.peek_next().map_or(true, |c| c.is_ascii_digit()) {
            is_float = true;
            self.pos += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if is_float {
            let value: f64 = text
                .parse()
                .map_err(|_| ParseError::new(format!("invalid number literal '{}'", text), self.line))?;
            self.push(Tok::Float(value));
        } else {
            let value: i64 = text
                .parse()
                .map_err(|_| ParseError::new(format!("invalid number literal '{}'", text), self.line))?;
            self.push(Tok::Int(value));
        }
        Ok(())
    }

    fn identifier(&mut self) {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        match keyword(&text) {
            Some(tok) => self.push(tok),
            Option::None => self.push(Tok::Name(text)),
        }
    }

    fn operator(&mut self, c: char) -> Result<(), ParseError> {
        let next = self.peek_next();
        let (tok, width) = match (c, next) {
            ('*', Some('*')) => (Tok::DoubleStar, 2),
            ('*', Some('=')) => (Tok::StarAssign, 2),
            ('*', _) => (Tok::Star, 1),
            ('/', Some('/')) => (Tok::DoubleSlash, 2),
            ('/', Some('=')) => (Tok::SlashAssign, 2),
            ('/', _) => (Tok::Slash, 1),
            ('+', Some('=')) => (Tok::PlusAssign, 2),
            ('+', _) => (Tok::Plus, 1),
            ('-', Some('=')) => (Tok::MinusAssign, 2),
            ('-', _) => (Tok::Minus, 1),
            ('%', _) => (Tok::Percent, 1),
            ('=', Some('=')) => (Tok::EqEq, 2),
            ('=', _) => (Tok::Assign, 1),
            ('!', Some('=')) => (Tok::NotEq, 2),
            ('<', Some('=')) => (Tok::LtE, 2),
            ('<', _) => (Tok::Lt, 1),
            ('>', Some('=')) => (Tok::GtE, 2),
            ('>', _) => (Tok::Gt, 1),
            ('(', _) => (Tok::LParen, 1),
            (')', _) => (Tok::RParen, 1),
            ('[', _) => (Tok::LBracket, 1),
            (']', _) => (Tok::RBracket, 1),
            ('{', _) => (Tok::LBrace, 1),
            ('}', _) => (Tok::RBrace, 1),
            (',', _) => (Tok::Comma, 1),
            (':', _) => (Tok::Colon, 1),
            ('.', _) => (Tok::Dot, 1),
            _ => {
                return Err(ParseError::new(
                    format!("invalid character '{}'", c),
                    self.line,
                ));
            }
        };
        match tok {
            Tok::LParen | Tok::LBracket | Tok::LBrace => self.bracket_depth += 1,
            Tok::RParen | Tok::RBracket | Tok::RBrace => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
            }
            _ => {}
        }
        self.push(tok);
        self.pos += width;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Tok> {
        tokenize(source).unwrap().into_iter().map(|t| t.tok).collect()
    }

    #[test]
    fn test_simple_assignment() {
        assert_eq!(
            kinds("x = 10"),
            vec![
                Tok::Name("x".to_string()),
                Tok::Assign,
                Tok::Int(10),
                Tok::Newline,
                Tok::EndOfFile,
            ]
        );
    }

    #[test]
    fn test_indent_dedent_pairing() {
        let toks = kinds("def f():\n    pass\nx = 1");
        assert!(toks.contains(&Tok::Indent));
        assert!(toks.contains(&Tok::Dedent));
        let indent_pos = toks.iter().position(|t| *t == Tok::Indent).unwrap();
        let dedent_pos = toks.iter().position(|t| *t == Tok::Dedent).unwrap();
        assert!(indent_pos < dedent_pos);
    }

    #[test]
    fn test_dangling_indent_closed_at_eof() {
        let toks = kinds("if x:\n    y = 1");
        assert_eq!(toks.iter().filter(|t| **t == Tok::Indent).count(), 1);
        assert_eq!(toks.iter().filter(|t| **t == Tok::Dedent).count(), 1);
        assert_eq!(*toks.last().unwrap(), Tok::EndOfFile);
    }

    #[test]
    fn test_inconsistent_dedent_is_error() {
        let err = tokenize("if x:\n        a = 1\n    b = 2").unwrap_err();
        assert!(err.message.contains("unindent"));
        assert_eq!(err.line, 3);
    }

    #[test]
    fn test_blank_and_comment_lines_ignored() {
        let toks = kinds("x = 1\n\n# comment\n    # indented comment\ny = 2");
        assert!(!toks.contains(&Tok::Indent));
        assert_eq!(toks.iter().filter(|t| **t == Tok::Newline).count(), 2);
    }

    #[test]
    fn test_newline_suppressed_in_brackets() {
        let toks = kinds("a = [1,\n     2]");
        assert_eq!(toks.iter().filter(|t| **t == Tok::Newline).count(), 1);
        assert!(!toks.contains(&Tok::Indent));
    }

    #[test]
    fn test_string_escapes_and_unterminated() {
        assert_eq!(
            kinds("s = 'a\\nb'")[2],
            Tok::Str("a\nb".to_string())
        );
        let err = tokenize("s = 'oops").unwrap_err();
        assert!(err.message.contains("EOL"));
    }

    #[test]
    fn test_two_char_operators() {
        let toks = kinds("a == b != c <= d >= e // f ** g");
        assert!(toks.contains(&Tok::EqEq));
        assert!(toks.contains(&Tok::NotEq));
        assert!(toks.contains(&Tok::LtE));
        assert!(toks.contains(&Tok::GtE));
        assert!(toks.contains(&Tok::DoubleSlash));
        assert!(toks.contains(&Tok::DoubleStar));
    }

    #[test]
    fn test_float_and_method_dot_disambiguation() {
        assert_eq!(kinds("x = 1.5")[2], Tok::Float(1.5));
        let toks = kinds("a.copy()");
        assert_eq!(toks[1], Tok::Dot);
    }

    #[test]
    fn test_token_lines() {
        let tokens = tokenize("x = 1\ny = 2").unwrap();
        let y = tokens
            .iter()
            .find(|t| t.tok == Tok::Name("y".to_string()))
            .unwrap();
        assert_eq!(y.line, 2);
    }

    #[test]
    fn test_invalid_character() {
        let err = tokenize("x = 1 @ 2").unwrap_err();
        assert!(err.message.contains("invalid character"));
        assert_eq!(err.line, 1);
    }
}
