//! Static vetting of Python source before it is executed.
//!
//! The built-in [`DenyListValidator`] tokenizes the source and walks it
//! statement by statement: it checks block structure and a handful of
//! grammar rules, then looks for deny-listed imports, bare calls to
//! `exec`/`eval`/`compile`/`__import__`, and `name.attr` accesses such as
//! `os.system`.
//!
//! This is a syntactic heuristic, not taint analysis. Aliasing
//! (`import os as o; o.system(...)`), `getattr`, `from os import system` and
//! any other indirection get past it. It is weaker than parsing with a full
//! Python grammar: it catches unbalanced brackets, unterminated strings,
//! indentation and block errors, misplaced keywords and adjacent operands,
//! but not every construct CPython would reject. It is also stricter in one
//! spot: a number glued to a keyword (`1if y else 2`) lexes as one number
//! followed by an operand and is refused, where CPython only warns.

use super::lexer::{tokenize, SyntaxError, Token, TokenKind};
use thiserror::Error;

/// Modules whose import is refused, matched against the top-level package and
/// every dotted prefix of the imported name.
pub const BLOCKED_MODULES: &[&str] = &[
    // network
    "socket",
    "socketserver",
    "ssl",
    "urllib",
    "urllib2",
    "urllib3",
    "http.client",
    "http.server",
    "requests",
    "httpx",
    "aiohttp",
    "ftplib",
    "smtplib",
    "telnetlib",
    "poplib",
    "imaplib",
    "xmlrpc",
    "websocket",
    "websockets",
    "paramiko",
    // process spawning
    "subprocess",
    "ctypes",
    "multiprocessing",
    "pty",
    "pexpect",
    // serialization with code execution
    "pickle",
    "cPickle",
    "marshal",
    "shelve",
    "dill",
    "cloudpickle",
    // reflective import
    "importlib",
];

/// Builtins refused when called by bare name.
pub const BLOCKED_CALLS: &[&str] = &["exec", "eval", "compile", "__import__"];

/// `module.attr` accesses refused when `module` is a plain name.
pub const BLOCKED_ATTRIBUTES: &[&str] = &[
    "os.system",
    "os.popen",
    "os.fork",
    "os.forkpty",
    "os.kill",
    "os.killpg",
    "os.execl",
    "os.execle",
    "os.execlp",
    "os.execlpe",
    "os.execv",
    "os.execve",
    "os.execvp",
    "os.execvpe",
    "os.spawnl",
    "os.spawnle",
    "os.spawnlp",
    "os.spawnlpe",
    "os.spawnv",
    "os.spawnve",
    "os.spawnvp",
    "os.spawnvpe",
    "os.posix_spawn",
    "os.posix_spawnp",
    "os.removedirs",
    "shutil.rmtree",
];

/// Standard-library modules scripts are expected to use. Informational only:
/// enforcement is the deny-list, and an unlisted module is not implied safe.
pub const ALLOWED_MODULES: &[&str] = &[
    "json",
    "csv",
    "datetime",
    "time",
    "math",
    "statistics",
    "decimal",
    "fractions",
    "random",
    "re",
    "string",
    "textwrap",
    "unicodedata",
    "difflib",
    "collections",
    "itertools",
    "functools",
    "operator",
    "heapq",
    "bisect",
    "copy",
    "dataclasses",
    "enum",
    "typing",
    "pathlib",
    "os.path",
    "glob",
    "fnmatch",
    "io",
    "base64",
    "hashlib",
    "uuid",
    "calendar",
    "zoneinfo",
    "pprint",
    "zipfile",
    "gzip",
    "tarfile",
    "sqlite3",
    "xml.etree.ElementTree",
    "html",
];

const KEYWORDS: &[&str] = &[
    "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif",
    "else", "except", "finally", "for", "from", "global", "if", "import", "in", "is", "lambda",
    "nonlocal", "not", "or", "pass", "raise", "return", "try", "while", "with", "yield",
];

/// Keywords that open a compound statement and so need a `:`.
const COMPOUND_KEYWORDS: &[&str] = &[
    "if", "elif", "else", "for", "while", "try", "except", "finally", "with", "def", "class",
];

/// Keywords only valid as the first token of a statement.
const STATEMENT_ONLY_KEYWORDS: &[&str] = &[
    "def", "class", "while", "try", "except", "finally", "with", "elif", "import", "pass",
    "break", "continue", "return", "del", "assert", "raise", "global", "nonlocal",
];

/// Soft keywords that may be followed directly by a name when they lead a statement.
const SOFT_KEYWORDS: &[&str] = &["match", "case", "type"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("Syntax error: {0}")]
    Syntax(#[from] SyntaxError),
    #[error("Blocked import: {0}")]
    Import(String),
    #[error("Blocked function: {0}")]
    Function(String),
}

/// A pre-execution check over Python source.
pub trait CodeValidator: Send + Sync {
    fn validate(&self, source: &str) -> Result<(), Violation>;
}

/// Deny-list walk over the token stream. See the module docs for its limits.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyListValidator;

impl CodeValidator for DenyListValidator {
    fn validate(&self, source: &str) -> Result<(), Violation> {
        let tokens = tokenize(source)?;
        Walker::default().walk(&tokens)
    }
}

/// Validate Python source with the default deny-list.
///
/// Returns `(true, None)` when nothing was found, otherwise `(false, message)`
/// with a `Syntax error: ...`, `Blocked import: ...` or `Blocked function: ...`
/// message for the first violation.
pub fn validate_python_code(source: &str) -> (bool, Option<String>) {
    match DenyListValidator.validate(source) {
        Ok(()) => (true, None),
        Err(violation) => (false, Some(violation.to_string())),
    }
}

fn invalid_syntax(line: usize) -> Violation {
    Violation::Syntax(SyntaxError::new("invalid syntax", line))
}

fn is_keyword(token: &Token) -> bool {
    token.kind == TokenKind::Name && KEYWORDS.contains(&token.text.as_str())
}

/// Index of the first `target` op outside any brackets.
fn find_top_level(tokens: &[&Token], target: &str) -> Option<usize> {
    let mut depth = 0i32;
    for (i, tok) in tokens.iter().enumerate() {
        if tok.kind != TokenKind::Op {
            continue;
        }
        match tok.text.as_str() {
            "(" | "[" | "{" => depth += 1,
            ")" | "]" | "}" => depth -= 1,
            t if t == target && depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

/// Split on `;` outside brackets.
fn split_statements<'t, 'a>(tokens: &'t [&'a Token]) -> Vec<&'t [&'a Token]> {
    let mut parts = Vec::new();
    let mut rest = tokens;
    while let Some(i) = find_top_level(rest, ";") {
        parts.push(&rest[..i]);
        rest = &rest[i + 1..];
    }
    parts.push(rest);
    parts
}

/// Check a module path against the deny-list, including every dotted prefix.
fn check_module(module: &str) -> Result<(), Violation> {
    let mut prefix = String::new();
    for part in module.split('.') {
        if !prefix.is_empty() {
            prefix.push('.');
        }
        prefix.push_str(part);
        if BLOCKED_MODULES.contains(&prefix.as_str()) {
            return Err(Violation::Import(module.to_string()));
        }
    }
    Ok(())
}

/// Parse `a.b.c` starting at `tokens[0]`; returns the name and tokens consumed.
fn dotted_name(tokens: &[&Token]) -> Option<(String, usize)> {
    let first = tokens.first()?;
    if first.kind != TokenKind::Name || is_keyword(first) {
        return None;
    }
    let mut name = first.text.clone();
    let mut used = 1;
    while tokens.get(used).is_some_and(|t| t.is_op(".")) {
        let part = tokens.get(used + 1)?;
        if part.kind != TokenKind::Name || is_keyword(part) {
            return None;
        }
        name.push('.');
        name.push_str(&part.text);
        used += 2;
    }
    Some((name, used))
}

/// Parse `name [as alias]`; returns tokens consumed.
fn skip_alias(tokens: &[&Token]) -> Option<usize> {
    if tokens.first().is_some_and(|t| t.is_name("as")) {
        match tokens.get(1) {
            Some(t) if t.kind == TokenKind::Name && !is_keyword(t) => Some(2),
            _ => None,
        }
    } else {
        Some(0)
    }
}

/// `import a.b as c, d` → `["a.b", "d"]`
fn parse_import(tokens: &[&Token], line: usize) -> Result<Vec<String>, Violation> {
    let mut modules = Vec::new();
    let mut i = 0;
    loop {
        let (name, used) = dotted_name(&tokens[i..]).ok_or_else(|| invalid_syntax(line))?;
        i += used;
        i += skip_alias(&tokens[i..]).ok_or_else(|| invalid_syntax(line))?;
        modules.push(name);
        match tokens.get(i) {
            None => return Ok(modules),
            Some(t) if t.is_op(",") => i += 1,
            Some(_) => return Err(invalid_syntax(line)),
        }
    }
}

/// `from a.b import c as d, e` → `(Some("a.b"), ["c", "e"])`; relative
/// imports return `None` for the module.
fn parse_from_import(
    tokens: &[&Token],
    line: usize,
) -> Result<(Option<String>, Vec<String>), Violation> {
    let mut i = 0;
    let mut relative = false;
    while tokens.get(i).is_some_and(|t| t.is_op(".") || t.is_op("...")) {
        relative = true;
        i += 1;
    }
    let module = match dotted_name(&tokens[i..]) {
        Some((name, used)) => {
            i += used;
            Some(name)
        }
        None if relative => None,
        None => return Err(invalid_syntax(line)),
    };
    if !tokens.get(i).is_some_and(|t| t.is_name("import")) {
        return Err(invalid_syntax(line));
    }
    i += 1;

    let mut names_end = tokens.len();
    if tokens.get(i).is_some_and(|t| t.is_op("*")) {
        if i + 1 != tokens.len() {
            return Err(invalid_syntax(line));
        }
        return Ok((module.filter(|_| !relative), Vec::new()));
    }
    if tokens.get(i).is_some_and(|t| t.is_op("(")) {
        if !tokens.last().is_some_and(|t| t.is_op(")")) {
            return Err(invalid_syntax(line));
        }
        i += 1;
        names_end -= 1;
    }

    let mut names = Vec::new();
    while i < names_end {
        let tok = tokens[i];
        if tok.kind != TokenKind::Name || is_keyword(tok) {
            return Err(invalid_syntax(line));
        }
        names.push(tok.text.clone());
        i += 1;
        i += skip_alias(&tokens[i..names_end]).ok_or_else(|| invalid_syntax(line))?;
        match tokens.get(i) {
            _ if i >= names_end => break,
            Some(t) if t.is_op(",") => i += 1,
            _ => return Err(invalid_syntax(line)),
        }
    }
    if names.is_empty() {
        return Err(invalid_syntax(line));
    }
    Ok((module.filter(|_| !relative), names))
}

/// Pull the `{expression}` parts out of an f-string body.
fn fstring_expressions(body: &str) -> Vec<String> {
    let chars: Vec<char> = body.chars().collect();
    let mut exprs = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '{' if chars.get(i + 1) == Some(&'{') => i += 2,
            '{' => {
                let mut depth = 0;
                let mut quote: Option<char> = None;
                let mut expr = String::new();
                i += 1;
                while i < chars.len() {
                    let c = chars[i];
                    if let Some(q) = quote {
                        if c == q {
                            quote = None;
                        }
                    } else {
                        match c {
                            '\'' | '"' => quote = Some(c),
                            '(' | '[' | '{' => depth += 1,
                            ')' | ']' => depth -= 1,
                            '}' if depth == 0 => break,
                            '}' => depth -= 1,
                            '!' if depth == 0 && chars.get(i + 1) != Some(&'=') => break,
                            ':' if depth == 0 => break,
                            _ => {}
                        }
                    }
                    expr.push(c);
                    i += 1;
                }
                // skip a conversion, then scan the format spec for nested fields
                while i < chars.len() && !matches!(chars[i], ':' | '}') {
                    i += 1;
                }
                if chars.get(i) == Some(&':') {
                    let mut spec = String::new();
                    let mut depth = 0;
                    let mut quote: Option<char> = None;
                    i += 1;
                    while i < chars.len() {
                        let c = chars[i];
                        if let Some(q) = quote {
                            if c == q {
                                quote = None;
                            }
                        } else {
                            match c {
                                '\'' | '"' if depth > 0 => quote = Some(c),
                                '{' => depth += 1,
                                '}' if depth == 0 => break,
                                '}' => depth -= 1,
                                _ => {}
                            }
                        }
                        spec.push(c);
                        i += 1;
                    }
                    exprs.extend(fstring_expressions(&spec));
                }
                i += 1;
                if !expr.trim().is_empty() {
                    exprs.push(expr);
                }
            }
            _ => i += 1,
        }
    }
    exprs
}

/// Look for blocked calls and attribute accesses in an expression's tokens.
fn check_patterns(tokens: &[&Token]) -> Result<(), Violation> {
    for (i, tok) in tokens.iter().enumerate() {
        if tok.kind == TokenKind::FStr {
            for expr in fstring_expressions(&tok.text) {
                // An expression that doesn't tokenize can't run either.
                if let Ok(inner) = tokenize(&expr) {
                    let inner: Vec<&Token> = inner.iter().collect();
                    check_patterns(&inner)?;
                }
            }
            continue;
        }
        if tok.kind != TokenKind::Name {
            continue;
        }

        let (before, after) = ungroup(tokens, i);
        let prev = before.map(|p| tokens[p]);
        // `x.exec(...)` or `a.os.system` is not a bare name
        if prev.is_some_and(|p| p.is_op(".")) {
            continue;
        }
        let next = tokens.get(after);

        if BLOCKED_CALLS.contains(&tok.text.as_str())
            && next.is_some_and(|n| n.is_op("("))
            && !prev.is_some_and(|p| p.is_name("def"))
        {
            return Err(Violation::Function(tok.text.clone()));
        }

        if next.is_some_and(|n| n.is_op(".")) {
            if let Some(attr) = tokens.get(after + 1).filter(|t| t.kind == TokenKind::Name) {
                let dotted = format!("{}.{}", tok.text, attr.text);
                if BLOCKED_ATTRIBUTES.contains(&dotted.as_str()) {
                    return Err(Violation::Function(dotted));
                }
            }
        }
    }
    Ok(())
}

/// Step outward over grouping parentheses wrapped directly around `tokens[i]`,
/// so `(exec)(..)` and `(os).system` read like their bare forms. Returns the
/// index of the token before the group and the index just after it.
fn ungroup(tokens: &[&Token], i: usize) -> (Option<usize>, usize) {
    let (mut start, mut end) = (i, i + 1);
    while start > 0
        && tokens[start - 1].is_op("(")
        && tokens.get(end).is_some_and(|t| t.is_op(")"))
        // `f(exec)` is a call argument, not a group
        && !(start >= 2 && ends_operand(tokens[start - 2]))
    {
        start -= 1;
        end += 1;
    }
    (start.checked_sub(1), end)
}

fn ends_operand(token: &Token) -> bool {
    match token.kind {
        TokenKind::Name => !is_keyword(token),
        TokenKind::Number | TokenKind::Str | TokenKind::FStr => true,
        TokenKind::Op => matches!(token.text.as_str(), ")" | "]" | "}"),
        _ => false,
    }
}

fn starts_operand(token: &Token) -> bool {
    match token.kind {
        TokenKind::Name => !is_keyword(token),
        TokenKind::Number | TokenKind::Str | TokenKind::FStr => true,
        _ => false,
    }
}

fn is_string(token: &Token) -> bool {
    matches!(token.kind, TokenKind::Str | TokenKind::FStr)
}

/// Grammar checks for one simple statement or compound header.
fn check_statement_grammar(tokens: &[&Token]) -> Result<(), Violation> {
    for (i, tok) in tokens.iter().enumerate() {
        if i > 0
            && tok.kind == TokenKind::Name
            && STATEMENT_ONLY_KEYWORDS.contains(&tok.text.as_str())
        {
            return Err(invalid_syntax(tok.line));
        }
    }
    for (i, pair) in tokens.windows(2).enumerate() {
        let (a, b) = (pair[0], pair[1]);
        if i == 0 && SOFT_KEYWORDS.contains(&a.text.as_str()) {
            continue;
        }
        // adjacent string literals concatenate
        if is_string(a) && is_string(b) {
            continue;
        }
        if ends_operand(a) && starts_operand(b) {
            return Err(invalid_syntax(b.line));
        }
    }
    Ok(())
}

#[derive(Default)]
struct Walker {
    /// Line of a block header still waiting for its indented body.
    pending_block: Option<(String, usize)>,
}

impl Walker {
    fn walk(mut self, tokens: &[Token]) -> Result<(), Violation> {
        let mut line: Vec<&Token> = Vec::new();
        let mut indented = false;
        for tok in tokens {
            match tok.kind {
                TokenKind::Indent => {
                    if self.pending_block.is_none() {
                        return Err(Violation::Syntax(SyntaxError::new(
                            "unexpected indent",
                            tok.line,
                        )));
                    }
                    indented = true;
                }
                TokenKind::Dedent => {}
                TokenKind::Newline => {
                    self.logical_line(&line, indented)?;
                    line.clear();
                    indented = false;
                }
                _ => line.push(tok),
            }
        }
        if !line.is_empty() {
            self.logical_line(&line, indented)?;
        }
        if let Some((keyword, header_line)) = self.pending_block.take() {
            return Err(Violation::Syntax(SyntaxError::new(
                format!(
                    "expected an indented block after '{}' statement on line {}",
                    keyword, header_line
                ),
                header_line + 1,
            )));
        }
        Ok(())
    }

    fn logical_line(&mut self, tokens: &[&Token], indented: bool) -> Result<(), Violation> {
        let Some(&first) = tokens.first() else {
            return Ok(());
        };
        let line = first.line;

        if let Some((keyword, header_line)) = self.pending_block.take() {
            if !indented {
                return Err(Violation::Syntax(SyntaxError::new(
                    format!(
                        "expected an indented block after '{}' statement on line {}",
                        keyword, header_line
                    ),
                    line,
                )));
            }
        }

        let lead = if first.is_name("async") {
            tokens.get(1).copied().unwrap_or(first)
        } else {
            first
        };
        let is_compound =
            lead.kind == TokenKind::Name && COMPOUND_KEYWORDS.contains(&lead.text.as_str());
        let ends_with_colon = tokens.last().is_some_and(|t| t.is_op(":"));

        if !is_compound && !ends_with_colon {
            return self.simple_statements(tokens, line);
        }

        let colon = find_top_level(tokens, ":").ok_or_else(|| {
            Violation::Syntax(SyntaxError::new("expected ':'", line))
        })?;
        let header = &tokens[..colon];
        let body = &tokens[colon + 1..];

        // `def name(` and `class name`
        if lead.is_name("def") || lead.is_name("class") {
            let at = header.iter().position(|t| t.is_name(&lead.text)).unwrap_or(0);
            let named = header
                .get(at + 1)
                .is_some_and(|t| t.kind == TokenKind::Name && !is_keyword(t));
            let paren_ok = lead.is_name("class") || header.get(at + 2).is_some_and(|t| t.is_op("("));
            if !named || !paren_ok {
                return Err(invalid_syntax(line));
            }
        }

        // the header's own keyword is allowed in first position only
        let header_rest = if first.is_name("async") { &header[1..] } else { header };
        check_statement_grammar(header_rest)?;
        check_patterns(header)?;

        if body.is_empty() {
            self.pending_block = Some((lead.text.clone(), line));
            Ok(())
        } else {
            self.simple_statements(body, line)
        }
    }

    fn simple_statements(&mut self, tokens: &[&Token], line: usize) -> Result<(), Violation> {
        let statements = split_statements(tokens);
        let count = statements.len();
        for (idx, stmt) in statements.into_iter().enumerate() {
            if stmt.is_empty() {
                // a single trailing `;` is fine, anything else is not
                if idx + 1 == count && idx > 0 {
                    continue;
                }
                return Err(invalid_syntax(line));
            }
            self.simple_statement(stmt)?;
        }
        Ok(())
    }

    fn simple_statement(&mut self, stmt: &[&Token]) -> Result<(), Violation> {
        let first = stmt[0];
        let line = first.line;
        if first.is_name("import") {
            for module in parse_import(&stmt[1..], line)? {
                check_module(&module)?;
            }
            return Ok(());
        }
        if first.is_name("from") {
            let (module, names) = parse_from_import(&stmt[1..], line)?;
            if let Some(module) = module {
                check_module(&module)?;
                for name in names {
                    check_module(&format!("{}.{}", module, name))?;
                }
            }
            return Ok(());
        }
        if first.kind == TokenKind::Name && COMPOUND_KEYWORDS.contains(&first.text.as_str()) {
            // `if x: if y: pass` and friends
            return Err(invalid_syntax(line));
        }
        check_statement_grammar(stmt)?;
        check_patterns(stmt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(source: &str) -> String {
        let (ok, err) = validate_python_code(source);
        assert!(!ok, "expected rejection for: {}", source);
        err.unwrap()
    }

    fn accepted(source: &str) {
        let (ok, err) = validate_python_code(source);
        assert!(ok, "expected acceptance for {:?}, got {:?}", source, err);
        assert!(err.is_none());
    }

    #[test]
    fn test_valid_simple_code() {
        accepted("print(\"hello\")");
    }

    #[test]
    fn test_valid_imports() {
        accepted("\nimport json\nimport csv\nimport datetime\nfrom pathlib import Path\n");
    }

    #[test]
    fn test_blocks_network_imports() {
        for module in ["requests", "socket", "httpx", "aiohttp", "ssl", "urllib"] {
            let err = rejected(&format!("import {}", module));
            assert_eq!(err, format!("Blocked import: {}", module));
        }
    }

    #[test]
    fn test_blocks_process_and_serialization_imports() {
        for module in ["subprocess", "ctypes", "multiprocessing", "pty", "pickle", "marshal", "importlib"] {
            assert!(rejected(&format!("import {}", module)).contains("Blocked import"));
        }
    }

    #[test]
    fn test_blocks_dotted_import() {
        assert_eq!(rejected("import urllib.request"), "Blocked import: urllib.request");
        assert_eq!(rejected("import http.client"), "Blocked import: http.client");
        accepted("import http.cookies");
    }

    #[test]
    fn test_blocks_from_import() {
        assert_eq!(rejected("from subprocess import run"), "Blocked import: subprocess");
        assert_eq!(rejected("from http import client"), "Blocked import: http.client");
        assert!(rejected("from urllib.parse import urlparse").contains("Blocked import"));
    }

    #[test]
    fn test_blocks_aliased_and_multi_import() {
        assert!(rejected("import json, socket as s").contains("Blocked import: socket"));
        assert!(rejected("from os import (path,\n  sep)\nimport pickle as p").contains("pickle"));
    }

    #[test]
    fn test_blocks_import_in_nested_block() {
        let src = "def f():\n    if True:\n        import subprocess\n    return 1\n";
        assert!(rejected(src).contains("Blocked import: subprocess"));
    }

    #[test]
    fn test_blocks_import_after_semicolon_and_inline_body() {
        assert!(rejected("x = 1; import socket").contains("Blocked import"));
        assert!(rejected("if True: import socket").contains("Blocked import"));
    }

    #[test]
    fn test_blocks_exec() {
        assert_eq!(rejected("exec(\"print(1)\")"), "Blocked function: exec");
    }

    #[test]
    fn test_blocks_eval() {
        assert_eq!(rejected("eval(\"1+1\")"), "Blocked function: eval");
    }

    #[test]
    fn test_blocks_compile_and_dunder_import() {
        assert_eq!(rejected("c = compile('1', 'x', 'eval')"), "Blocked function: compile");
        assert_eq!(rejected("__import__('subprocess')"), "Blocked function: __import__");
    }

    #[test]
    fn test_method_named_exec_allowed() {
        accepted("cursor.execute('select 1')\nre.compile('a+')\nobj.eval()");
    }

    #[test]
    fn test_def_named_eval_is_not_a_call() {
        accepted("def eval(x):\n    return x\n");
    }

    #[test]
    fn test_blocks_dangerous_attribute() {
        assert_eq!(rejected("import os; os.system('ls')"), "Blocked function: os.system");
        assert_eq!(rejected("import shutil\nshutil.rmtree('/tmp/x')"), "Blocked function: shutil.rmtree");
        assert!(rejected("f = os.popen").contains("os.popen"));
    }

    #[test]
    fn test_attribute_check_is_syntactic_only() {
        // aliasing is a known bypass of the name.attr heuristic
        accepted("import os as o\no.system('ls')");
        accepted("import os\nos.path.join('a', 'b')");
    }

    #[test]
    fn test_fstring_expressions_checked() {
        assert_eq!(rejected("print(f\"{eval('1')}\")"), "Blocked function: eval");
        assert!(rejected("x = f'{os.system(\"id\")!r:>10}'").contains("os.system"));
        accepted("x = f'{{eval}} {value:>10} {a != b}'");
    }

    #[test]
    fn test_parenthesized_name_still_checked() {
        assert_eq!(rejected("(exec)('print(1)')"), "Blocked function: exec");
        assert_eq!(rejected("((eval))('1')"), "Blocked function: eval");
        assert_eq!(rejected("(os).system('id')"), "Blocked function: os.system");
        assert_eq!(rejected("x = ((os)).popen"), "Blocked function: os.popen");
        // a call argument in parentheses is not a group
        accepted("print(exec)\nwrap(eval)(1)");
    }

    #[test]
    fn test_fstring_format_spec_fields_checked() {
        assert_eq!(rejected("print(f\"{x:{eval('1')}}\")"), "Blocked function: eval");
        assert!(rejected("f'{x!r:>{os.system(\"id\")}}'").contains("os.system"));
        accepted("f'{x:{width}.{precision}}'");
    }

    #[test]
    fn test_fullwidth_names_normalized() {
        assert_eq!(rejected("import ｓｏｃｋｅｔ"), "Blocked import: socket");
        assert_eq!(rejected("ｅｖａｌ('1')"), "Blocked function: eval");
        assert_eq!(rejected("import os\nｏｓ.ｓｙｓｔｅｍ('id')"), "Blocked function: os.system");
    }

    #[test]
    fn test_keyword_glued_to_number_refused() {
        assert!(rejected("x = 1if y else 2").starts_with("Syntax error"));
        accepted("x = 1 if y else 2");
    }

    #[test]
    fn test_strings_and_comments_ignored() {
        accepted("s = 'import socket'\n# eval(danger)\nt = \"\"\"\nexec(x)\n\"\"\"");
    }

    #[test]
    fn test_syntax_error_unclosed() {
        assert!(rejected("def broken(").starts_with("Syntax error"));
    }

    #[test]
    fn test_syntax_error_missing_colon() {
        assert!(rejected("def f()\n    return 1").starts_with("Syntax error"));
        assert!(rejected("if x\n    y = 1").starts_with("Syntax error"));
    }

    #[test]
    fn test_syntax_error_missing_block() {
        let err = rejected("for x in y:\nprint(x)");
        assert!(err.contains("expected an indented block"), "{}", err);
        assert!(rejected("while True:").contains("expected an indented block"));
    }

    #[test]
    fn test_syntax_error_unexpected_indent() {
        assert!(rejected("x = 1\n    y = 2").contains("unexpected indent"));
        assert!(rejected("  x = 1").contains("unexpected indent"));
    }

    #[test]
    fn test_syntax_error_python2_print() {
        assert!(rejected("print \"hello\"").starts_with("Syntax error"));
    }

    #[test]
    fn test_syntax_error_misplaced_keyword() {
        assert!(rejected("x = import os").starts_with("Syntax error"));
        assert!(rejected("y = return").starts_with("Syntax error"));
        assert!(rejected("import").starts_with("Syntax error"));
        assert!(rejected("from x").starts_with("Syntax error"));
    }

    #[test]
    fn test_syntax_error_unterminated_string() {
        assert!(rejected("x = 'abc").contains("unterminated string literal"));
    }

    #[test]
    fn test_realistic_script_accepted() {
        let src = r#"
from __future__ import annotations
import csv
import json
from collections import Counter, defaultdict
from dataclasses import dataclass


@dataclass
class Row:
    name: str
    value: int = 0

    def label(self) -> str:
        return f"{self.name}={self.value:>4}"


async def fetch(items: list[int]) -> dict[str, int]:
    async with lock:
        pass
    return {str(i): i ** 2 for i in items if i % 2 == 0}


def main(path="data.csv"):
    totals = defaultdict(int)
    try:
        with open(path) as f:
            for row in csv.DictReader(f):
                totals[row["name"]] += int(row["value"])
    except (OSError, ValueError) as e:
        print("failed:", e)
    else:
        print(json.dumps(totals, indent=2))
    finally:
        pass
    squares = [x * x for x in range(10)]
    lam = lambda a, b=2: a + b
    first, *rest = squares
    data = {
        "a": 1,
        "b": [1, 2, 3],
    }
    text = ("multi "
            "part")
    value = squares[1:3] if squares else None
    if (n := len(squares)) > 3 and not False:
        print(n, lam(1), Counter(text), data, first, rest, value)
    return value


match command:
    case "go" | "run":
        main()
    case _:
        pass

if __name__ == "__main__":
    main()
"#;
        accepted(src);
    }

    #[test]
    fn test_first_violation_wins() {
        assert_eq!(rejected("import socket\neval('1')"), "Blocked import: socket");
        assert_eq!(rejected("eval('1')\nimport socket"), "Blocked function: eval");
    }

    #[test]
    fn test_custom_validator_plugs_in() {
        struct NoPrint;
        impl CodeValidator for NoPrint {
            fn validate(&self, source: &str) -> Result<(), Violation> {
                if source.contains("print") {
                    return Err(Violation::Function("print".to_string()));
                }
                Ok(())
            }
        }
        let validator: Box<dyn CodeValidator> = Box::new(NoPrint);
        assert!(validator.validate("print(1)").is_err());
        assert!(validator.validate("x = 1").is_ok());
    }

    #[test]
    fn test_allow_list_and_deny_list_disjoint() {
        for module in ALLOWED_MODULES {
            assert!(check_module(module).is_ok(), "{} is both allowed and blocked", module);
        }
    }
}
