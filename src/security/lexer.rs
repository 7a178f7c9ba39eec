//! A small Python tokenizer.
//!
//! Produces the token stream the validator walks: names, numbers, string
//! literals, operators, and the NEWLINE/INDENT/DEDENT structure tokens.
//! Comments and the contents of string literals never become names, which is
//! what keeps `"import socket"` inside a string from tripping the deny-list.
//! Names are NFKC-normalized, as CPython does, so `ｅｖａｌ` lexes as `eval`.

use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Name,
    Number,
    Str,
    /// f-string; `text` holds the body between the quotes.
    FStr,
    Op,
    Newline,
    Indent,
    Dedent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
}

impl Token {
    pub fn is_op(&self, op: &str) -> bool {
        self.kind == TokenKind::Op && self.text == op
    }

    pub fn is_name(&self, name: &str) -> bool {
        self.kind == TokenKind::Name && self.text == name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (line {line})")]
pub struct SyntaxError {
    pub message: String,
    pub line: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, line: usize) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }
}

const THREE_CHAR_OPS: &[&str] = &["**=", "//=", ">>=", "<<=", "..."];
const TWO_CHAR_OPS: &[&str] = &[
    "**", "//", "<<", ">>", "<=", ">=", "==", "!=", "->", ":=", "+=", "-=", "*=", "/=", "%=",
    "&=", "|=", "^=", "@=",
];
const ONE_CHAR_OPS: &str = "+-*/%@&|^~<>,:;.=";
const STRING_PREFIXES: &[&str] = &["r", "u", "b", "f", "br", "rb", "fr", "rf"];

pub fn tokenize(source: &str) -> Result<Vec<Token>, SyntaxError> {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    tokens: Vec<Token>,
    brackets: Vec<(char, usize)>,
    indents: Vec<usize>,
    at_line_start: bool,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            tokens: Vec::new(),
            brackets: Vec::new(),
            indents: vec![0],
            at_line_start: true,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn push(&mut self, kind: TokenKind, text: impl Into<String>, line: usize) {
        self.tokens.push(Token {
            kind,
            text: text.into(),
            line,
        });
    }

    /// Consume a `\n`, `\r\n` or lone `\r` at the cursor.
    fn consume_newline(&mut self) {
        if self.peek() == Some('\r') && self.peek_at(1) == Some('\n') {
            self.pos += 2;
        } else {
            self.pos += 1;
        }
        self.line += 1;
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' || c == '\r' {
                break;
            }
            self.pos += 1;
        }
    }

    fn run(mut self) -> Result<Vec<Token>, SyntaxError> {
        while self.pos < self.chars.len() {
            if self.at_line_start && self.brackets.is_empty() {
                let col = self.measure_indent();
                match self.peek() {
                    None => break,
                    Some('#') => {
                        self.skip_comment();
                        continue;
                    }
                    Some('\n') | Some('\r') => {
                        // blank line
                        self.consume_newline();
                        continue;
                    }
                    Some(_) => {
                        self.indent_to(col)?;
                        self.at_line_start = false;
                    }
                }
            }

            let Some(c) = self.peek() else { break };
            match c {
                ' ' | '\t' | '\x0c' => self.pos += 1,
                '#' => self.skip_comment(),
                '\n' | '\r' => {
                    if self.brackets.is_empty() {
                        self.end_logical_line();
                        self.at_line_start = true;
                    }
                    self.consume_newline();
                }
                '\\' => match self.peek_at(1) {
                    Some('\n') | Some('\r') => {
                        self.pos += 1;
                        self.consume_newline();
                    }
                    _ => {
                        return Err(SyntaxError::new(
                            "unexpected character after line continuation character",
                            self.line,
                        ))
                    }
                },
                '\'' | '"' => self.lex_string("")?,
                c if c == '_' || c.is_alphabetic() => self.lex_name()?,
                c if c.is_ascii_digit() => self.lex_number(),
                '.' if self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) => self.lex_number(),
                '(' | '[' | '{' => {
                    self.brackets.push((c, self.line));
                    self.pos += 1;
                    self.push(TokenKind::Op, c, self.line);
                }
                ')' | ']' | '}' => {
                    self.close_bracket(c)?;
                    self.pos += 1;
                    self.push(TokenKind::Op, c, self.line);
                }
                _ => self.lex_operator()?,
            }
        }

        if let Some(&(open, line)) = self.brackets.last() {
            return Err(SyntaxError::new(format!("'{}' was never closed", open), line));
        }
        self.end_logical_line();
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(TokenKind::Dedent, "", self.line);
        }
        Ok(self.tokens)
    }

    /// Skip leading whitespace and return the indentation column (tabs to multiples of 8).
    fn measure_indent(&mut self) -> usize {
        let mut col = 0;
        while let Some(c) = self.peek() {
            match c {
                ' ' => col += 1,
                '\t' => col = (col / 8 + 1) * 8,
                '\x0c' => col = 0,
                _ => break,
            }
            self.pos += 1;
        }
        col
    }

    fn indent_to(&mut self, col: usize) -> Result<(), SyntaxError> {
        let current = *self.indents.last().unwrap_or(&0);
        if col > current {
            self.indents.push(col);
            self.push(TokenKind::Indent, "", self.line);
            return Ok(());
        }
        while col < *self.indents.last().unwrap_or(&0) {
            self.indents.pop();
            self.push(TokenKind::Dedent, "", self.line);
        }
        if col != *self.indents.last().unwrap_or(&0) {
            return Err(SyntaxError::new(
                "unindent does not match any outer indentation level",
                self.line,
            ));
        }
        Ok(())
    }

    fn end_logical_line(&mut self) {
        let needs_newline = matches!(
            self.tokens.last(),
            Some(t) if !matches!(t.kind, TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent)
        );
        if needs_newline {
            self.push(TokenKind::Newline, "", self.line);
        }
    }

    fn close_bracket(&mut self, close: char) -> Result<(), SyntaxError> {
        let expected = match close {
            ')' => '(',
            ']' => '[',
            _ => '{',
        };
        match self.brackets.pop() {
            None => Err(SyntaxError::new(format!("unmatched '{}'", close), self.line)),
            Some((open, _)) if open != expected => Err(SyntaxError::new(
                format!(
                    "closing parenthesis '{}' does not match opening parenthesis '{}'",
                    close, open
                ),
                self.line,
            )),
            Some(_) => Ok(()),
        }
    }

    fn lex_name(&mut self) -> Result<(), SyntaxError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == '_' || c.is_alphanumeric() {
                self.pos += 1;
            } else {
                break;
            }
        }
        let name: String = self.chars[start..self.pos].iter().collect();
        if matches!(self.peek(), Some('\'') | Some('"'))
            && STRING_PREFIXES.contains(&name.to_ascii_lowercase().as_str())
        {
            return self.lex_string(&name);
        }
        let name: String = name.nfkc().collect();
        self.push(TokenKind::Name, name, self.line);
        Ok(())
    }

    fn lex_number(&mut self) {
        let start = self.pos;
        let mut prev = '\0';
        while let Some(c) = self.peek() {
            let exponent_sign = (c == '+' || c == '-') && (prev == 'e' || prev == 'E');
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || exponent_sign {
                prev = c;
                self.pos += 1;
            } else {
                break;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        self.push(TokenKind::Number, text, self.line);
    }

    /// Lex a string literal; the cursor sits on the opening quote.
    fn lex_string(&mut self, prefix: &str) -> Result<(), SyntaxError> {
        let start_line = self.line;
        let quote = self.peek().unwrap_or('"');
        let triple = self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote);
        self.pos += if triple { 3 } else { 1 };

        let mut body = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(if triple {
                    SyntaxError::new(
                        format!(
                            "unterminated triple-quoted string literal (detected at line {})",
                            self.line
                        ),
                        start_line,
                    )
                } else {
                    SyntaxError::new(
                        format!(
                            "unterminated string literal (detected at line {})",
                            start_line
                        ),
                        start_line,
                    )
                });
            };

            if c == '\\' {
                body.push(c);
                self.pos += 1;
                match self.peek() {
                    Some('\n') | Some('\r') => {
                        body.push('\n');
                        self.consume_newline();
                    }
                    Some(escaped) => {
                        body.push(escaped);
                        self.pos += 1;
                    }
                    None => {}
                }
                continue;
            }

            if c == quote {
                if !triple {
                    self.pos += 1;
                    break;
                }
                if self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote) {
                    self.pos += 3;
                    break;
                }
            }

            if c == '\n' || c == '\r' {
                if !triple {
                    return Err(SyntaxError::new(
                        format!(
                            "unterminated string literal (detected at line {})",
                            start_line
                        ),
                        start_line,
                    ));
                }
                body.push('\n');
                self.consume_newline();
                continue;
            }

            body.push(c);
            self.pos += 1;
        }

        let kind = if prefix.to_ascii_lowercase().contains('f') {
            TokenKind::FStr
        } else {
            TokenKind::Str
        };
        self.push(kind, body, start_line);
        Ok(())
    }

    fn lex_operator(&mut self) -> Result<(), SyntaxError> {
        let rest: String = self.chars[self.pos..].iter().take(3).collect();
        for ops in [THREE_CHAR_OPS, TWO_CHAR_OPS] {
            if let Some(op) = ops.iter().find(|op| rest.starts_with(**op)) {
                self.pos += op.chars().count();
                self.push(TokenKind::Op, *op, self.line);
                return Ok(());
            }
        }
        let c = self.chars[self.pos];
        if ONE_CHAR_OPS.contains(c) {
            self.pos += 1;
            self.push(TokenKind::Op, c, self.line);
            return Ok(());
        }
        Err(SyntaxError::new(
            format!("invalid character '{}' (U+{:04X})", c, c as u32),
            self.line,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().iter().map(|t| t.kind).collect()
    }

    fn names(source: &str) -> Vec<String> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .filter(|t| t.kind == TokenKind::Name)
            .map(|t| t.text)
            .collect()
    }

    #[test]
    fn test_simple_statement() {
        use TokenKind::*;
        assert_eq!(
            kinds("print(\"hello\")"),
            vec![Name, Op, Str, Op, Newline]
        );
    }

    #[test]
    fn test_indent_and_dedent() {
        use TokenKind::*;
        let src = "if x:\n    y = 1\nz = 2\n";
        assert_eq!(
            kinds(src),
            vec![Name, Name, Op, Newline, Indent, Name, Op, Number, Newline, Dedent, Name, Op, Number, Newline]
        );
    }

    #[test]
    fn test_blank_and_comment_lines_ignored() {
        let src = "a = 1\n\n    # indented comment\n\nb = 2\n";
        let toks = tokenize(src).unwrap();
        assert!(toks.iter().all(|t| t.kind != TokenKind::Indent));
        assert_eq!(names(src), vec!["a", "b"]);
    }

    #[test]
    fn test_string_contents_are_not_names() {
        assert_eq!(names("x = 'import socket'"), vec!["x"]);
        assert_eq!(names("x = \"\"\"\nexec(1)\n\"\"\""), vec!["x"]);
    }

    #[test]
    fn test_names_are_nfkc_normalized() {
        assert_eq!(names("ｓｏｃｋｅｔ = ℌ"), vec!["socket", "H"]);
    }

    #[test]
    fn test_comments_are_not_names() {
        assert_eq!(names("x = 1  # eval(danger)"), vec!["x"]);
    }

    #[test]
    fn test_string_prefixes() {
        let toks = tokenize("a = rb'\\d' + f\"{b}\" + u'c'").unwrap();
        let strs: Vec<TokenKind> = toks
            .iter()
            .filter(|t| matches!(t.kind, TokenKind::Str | TokenKind::FStr))
            .map(|t| t.kind)
            .collect();
        assert_eq!(strs, vec![TokenKind::Str, TokenKind::FStr, TokenKind::Str]);
    }

    #[test]
    fn test_escaped_quote_in_string() {
        let toks = tokenize(r#"s = "say \"hi\"""#).unwrap();
        assert_eq!(toks[2].kind, TokenKind::Str);
        assert_eq!(toks[3].kind, TokenKind::Newline);
    }

    #[test]
    fn test_brackets_join_lines() {
        let src = "x = foo(\n    1,\n    2,\n)\n";
        let toks = tokenize(src).unwrap();
        assert_eq!(toks.iter().filter(|t| t.kind == TokenKind::Newline).count(), 1);
        assert!(toks.iter().all(|t| t.kind != TokenKind::Indent));
    }

    #[test]
    fn test_backslash_continuation() {
        let src = "x = 1 + \\\n    2\n";
        let toks = tokenize(src).unwrap();
        assert_eq!(toks.iter().filter(|t| t.kind == TokenKind::Newline).count(), 1);
    }

    #[test]
    fn test_multi_char_operators() {
        let toks = tokenize("a **= b // c -> d := e").unwrap();
        let ops: Vec<&str> = toks
            .iter()
            .filter(|t| t.kind == TokenKind::Op)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(ops, vec!["**=", "//", "->", ":="]);
    }

    #[test]
    fn test_numbers() {
        let toks = tokenize("x = 1_000 + 0x1F + 3.5e-2 + .5 + 2j").unwrap();
        let nums: Vec<&str> = toks
            .iter()
            .filter(|t| t.kind == TokenKind::Number)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(nums, vec!["1_000", "0x1F", "3.5e-2", ".5", "2j"]);
    }

    #[test]
    fn test_unclosed_paren() {
        let err = tokenize("def broken(").unwrap_err();
        assert!(err.message.contains("was never closed"));
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_unmatched_close() {
        let err = tokenize("x = 1)").unwrap_err();
        assert!(err.message.contains("unmatched ')'"));
    }

    #[test]
    fn test_mismatched_brackets() {
        let err = tokenize("x = [1, 2)").unwrap_err();
        assert!(err.message.contains("does not match"));
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("x = 'abc\ny = 2").unwrap_err();
        assert!(err.message.contains("unterminated string literal"));
    }

    #[test]
    fn test_unterminated_triple_string() {
        let err = tokenize("x = '''abc\ny = 2").unwrap_err();
        assert!(err.message.contains("unterminated triple-quoted"));
    }

    #[test]
    fn test_bad_dedent() {
        let err = tokenize("if x:\n        a = 1\n    b = 2\n").unwrap_err();
        assert!(err.message.contains("unindent"));
        assert_eq!(err.line, 3);
    }

    #[test]
    fn test_invalid_character() {
        let err = tokenize("x = 1 $ 2").unwrap_err();
        assert!(err.message.contains("invalid character"));
    }

    #[test]
    fn test_crlf_line_endings() {
        let toks = tokenize("a = 1\r\nb = 2\r\n").unwrap();
        assert_eq!(toks.iter().filter(|t| t.kind == TokenKind::Newline).count(), 2);
        assert_eq!(toks.last().unwrap().line, 2);
    }

    #[test]
    fn test_line_numbers() {
        let toks = tokenize("a = 1\n\nb = '''x\ny'''\nc = 3\n").unwrap();
        let c = toks.iter().find(|t| t.is_name("c")).unwrap();
        assert_eq!(c.line, 5);
    }
}
