//! A small GLSL ES 1.00 front end for the headless backend.
//!
//! Not a compiler: it tokenizes, checks delimiter balance and statement
//! termination, requires `void main()`, and extracts the
//! `attribute`/`uniform`/`varying` interface. That is enough to give the
//! headless backend deterministic compile failures and GL-like parameter
//! activity (a declared parameter nobody reads is optimized out).

use std::collections::{HashMap, HashSet};

use crate::backend::ShaderKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Qualifier {
    Attribute,
    Uniform,
    Varying,
}

/// One interface declaration found at file scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Declaration {
    pub qualifier: Qualifier,
    pub ty: String,
    pub name: String,
    /// Referenced somewhere other than its own declaration.
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Diagnostic {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Number,
    Punct(char),
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    line: usize,
}

const TYPES: &[&str] = &[
    "bool", "int", "float", "vec2", "vec3", "vec4", "bvec2", "bvec3", "bvec4", "ivec2", "ivec3",
    "ivec4", "mat2", "mat3", "mat4", "sampler2D", "samplerCube",
];

const PRECISIONS: &[&str] = &["lowp", "mediump", "highp"];

// Words that may legally be followed by another identifier.
const LEADING_WORDS: &[&str] = &[
    "void", "const", "return", "else", "in", "out", "inout", "uniform", "attribute", "varying",
    "precision", "struct", "invariant", "lowp", "mediump", "highp",
];

/// Check `source` and return its interface declarations, or the diagnostics
/// that make it fail to compile.
pub(crate) fn analyze(kind: ShaderKind, source: &str) -> Result<Vec<Declaration>, Vec<Diagnostic>> {
    let mut diagnostics = Vec::new();
    let tokens = tokenize(source, &mut diagnostics);
    if !diagnostics.is_empty() {
        return Err(diagnostics);
    }

    let matching = match match_delimiters(&tokens) {
        Ok(m) => m,
        Err(d) => return Err(vec![d]),
    };

    let mut parser = Parser {
        kind,
        tokens: &tokens,
        matching: &matching,
        declarations: Vec::new(),
        struct_names: HashSet::new(),
        has_main: false,
        diagnostics: Vec::new(),
    };
    parser.parse_file();

    if !parser.has_main && parser.diagnostics.is_empty() {
        parser.diagnostics.push(Diagnostic {
            line: tokens.last().map_or(1, |t| t.line),
            message: "'main' : missing entry point, no 'void main()' defined".into(),
        });
    }
    if !parser.diagnostics.is_empty() {
        return Err(parser.diagnostics);
    }

    let mut uses: HashMap<&str, usize> = HashMap::new();
    for t in &tokens {
        if let Tok::Ident(name) = &t.tok {
            *uses.entry(name.as_str()).or_default() += 1;
        }
    }
    let mut declarations = parser.declarations;
    for d in &mut declarations {
        d.active = uses.get(d.name.as_str()).copied().unwrap_or(0) >= 2;
    }
    Ok(declarations)
}

/// Render diagnostics the way desktop GL drivers print info logs.
pub(crate) fn format_log(diagnostics: &[Diagnostic]) -> String {
    let mut log = String::new();
    for d in diagnostics {
        log.push_str(&format!("ERROR: 0:{}: {}\n", d.line, d.message));
    }
    log.push_str(&format!(
        "ERROR: {} compilation errors.  No code generated.\n",
        diagnostics.len()
    ));
    log
}

fn tokenize(source: &str, diagnostics: &mut Vec<Diagnostic>) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    let mut line = 1;
    let mut at_line_start = true;

    while let Some(c) = chars.next() {
        if c == '\n' {
            line += 1;
            at_line_start = true;
            continue;
        }
        if c.is_whitespace() {
            continue;
        }

        if c == '#' && at_line_start {
            let mut directive = String::new();
            while let Some(&n) = chars.peek() {
                if n == '\n' {
                    break;
                }
                directive.push(n);
                chars.next();
            }
            if let Some(message) = directive.trim().strip_prefix("error") {
                diagnostics.push(Diagnostic {
                    line,
                    message: format!("'#error' : {}", message.trim()),
                });
            }
            continue;
        }

        if c == '/' && chars.peek() == Some(&'/') {
            while let Some(&n) = chars.peek() {
                if n == '\n' {
                    break;
                }
                chars.next();
            }
            continue;
        }

        if c == '/' && chars.peek() == Some(&'*') {
            chars.next();
            let start = line;
            let mut prev = ' ';
            loop {
                match chars.next() {
                    Some('/') if prev == '*' => break,
                    Some('\n') => {
                        line += 1;
                        prev = '\n';
                    }
                    Some(ch) => prev = ch,
                    None => {
                        diagnostics.push(Diagnostic {
                            line: start,
                            message: "'/*' : unterminated comment".into(),
                        });
                        break;
                    }
                }
            }
            continue;
        }

        at_line_start = false;

        if c.is_ascii_alphabetic() || c == '_' {
            let mut ident = String::from(c);
            while let Some(&n) = chars.peek() {
                if n.is_ascii_alphanumeric() || n == '_' {
                    ident.push(n);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token {
                tok: Tok::Ident(ident),
                line,
            });
            continue;
        }

        let starts_number =
            c.is_ascii_digit() || (c == '.' && chars.peek().is_some_and(|n| n.is_ascii_digit()));
        if starts_number {
            while let Some(&n) = chars.peek() {
                if n.is_ascii_alphanumeric() || n == '.' {
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token {
                tok: Tok::Number,
                line,
            });
            continue;
        }

        match c {
            '(' | ')' | '[' | ']' | '{' | '}' | ';' | ',' | '.' | '+' | '-' | '*' | '/' | '='
            | '<' | '>' | '!' | '&' | '|' | '^' | '?' | ':' | '%' | '~' => tokens.push(Token {
                tok: Tok::Punct(c),
                line,
            }),
            other => diagnostics.push(Diagnostic {
                line,
                message: format!("'{other}' : invalid character"),
            }),
        }
    }
    tokens
}

/// Pair every opening delimiter with its closer, by token index.
fn match_delimiters(tokens: &[Token]) -> Result<HashMap<usize, usize>, Diagnostic> {
    let mut stack: Vec<(usize, char)> = Vec::new();
    let mut matching = HashMap::new();
    for (i, t) in tokens.iter().enumerate() {
        let Tok::Punct(c) = t.tok else { continue };
        match c {
            '(' | '[' | '{' => stack.push((i, c)),
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match stack.pop() {
                    Some((open, oc)) if oc == expected => {
                        matching.insert(open, i);
                    }
                    _ => {
                        return Err(Diagnostic {
                            line: t.line,
                            message: format!("'{c}' : syntax error, unexpected '{c}'"),
                        });
                    }
                }
            }
            _ => {}
        }
    }
    if let Some((open, c)) = stack.pop() {
        return Err(Diagnostic {
            line: tokens[open].line,
            message: format!("'{c}' : syntax error, unexpected end of file"),
        });
    }
    Ok(matching)
}

struct Parser<'a> {
    kind: ShaderKind,
    tokens: &'a [Token],
    matching: &'a HashMap<usize, usize>,
    declarations: Vec<Declaration>,
    struct_names: HashSet<String>,
    has_main: bool,
    diagnostics: Vec<Diagnostic>,
}

impl Parser<'_> {
    fn ident(&self, i: usize) -> Option<&str> {
        match self.tokens.get(i).map(|t| &t.tok) {
            Some(Tok::Ident(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    fn is_punct(&self, i: usize, c: char) -> bool {
        matches!(self.tokens.get(i).map(|t| &t.tok), Some(Tok::Punct(p)) if *p == c)
    }

    fn line(&self, i: usize) -> usize {
        self.tokens
            .get(i)
            .or(self.tokens.last())
            .map_or(1, |t| t.line)
    }

    fn error(&mut self, i: usize, message: String) {
        let line = self.line(i);
        self.diagnostics.push(Diagnostic { line, message });
    }

    fn is_type(&self, word: &str) -> bool {
        TYPES.contains(&word) || self.struct_names.contains(word)
    }

    /// Index just past the next `;` at the current nesting level.
    fn skip_statement(&self, mut i: usize) -> usize {
        while i < self.tokens.len() {
            if let Some(&close) = self.matching.get(&i) {
                i = close + 1;
                continue;
            }
            if self.is_punct(i, ';') {
                return i + 1;
            }
            i += 1;
        }
        i
    }

    fn parse_file(&mut self) {
        let mut i = 0;
        while i < self.tokens.len() {
            match self.tokens[i].tok.clone() {
                Tok::Punct(';') => i += 1,
                Tok::Ident(word) => {
                    i = match word.as_str() {
                        "precision" => self.skip_statement(i),
                        "attribute" => self.parse_declaration(i, Qualifier::Attribute),
                        "uniform" => self.parse_declaration(i, Qualifier::Uniform),
                        "varying" => self.parse_declaration(i, Qualifier::Varying),
                        "struct" => self.parse_struct(i),
                        _ => self.parse_external(i),
                    }
                }
                Tok::Number => {
                    self.error(i, "syntax error, unexpected number".into());
                    i += 1;
                }
                Tok::Punct(c) => {
                    self.error(i, format!("'{c}' : syntax error, unexpected '{c}'"));
                    i = self.matching.get(&i).map_or(i + 1, |close| close + 1);
                }
            }
        }
    }

    fn parse_declaration(&mut self, start: usize, qualifier: Qualifier) -> usize {
        if qualifier == Qualifier::Attribute && self.kind == ShaderKind::Fragment {
            self.error(start, "'attribute' : supported in vertex shaders only".into());
            return self.skip_statement(start);
        }

        let mut i = start + 1;
        if self.ident(i).is_some_and(|w| PRECISIONS.contains(&w)) {
            i += 1;
        }
        let ty = match self.ident(i) {
            Some(t) if self.is_type(t) => t.to_string(),
            other => {
                let found = other.unwrap_or("").to_string();
                self.error(i, format!("'{found}' : syntax error, expected a type"));
                return self.skip_statement(start);
            }
        };
        i += 1;

        loop {
            let name = match self.ident(i) {
                Some(n) if !self.is_type(n) && !LEADING_WORDS.contains(&n) => n.to_string(),
                other => {
                    let found = other.unwrap_or("").to_string();
                    self.error(i, format!("'{found}' : syntax error, expected an identifier"));
                    return self.skip_statement(start);
                }
            };
            i += 1;
            if self.is_punct(i, '[') {
                i = self.matching.get(&i).map_or(i + 1, |close| close + 1);
            }
            self.declarations.push(Declaration {
                qualifier,
                ty: ty.clone(),
                name,
                active: false,
            });

            if self.is_punct(i, ',') {
                i += 1;
                continue;
            }
            if self.is_punct(i, ';') {
                return i + 1;
            }
            self.error(i, "syntax error, expected ';' after declaration".into());
            return self.skip_statement(start);
        }
    }

    fn parse_struct(&mut self, start: usize) -> usize {
        let mut i = start + 1;
        if let Some(name) = self.ident(i) {
            self.struct_names.insert(name.to_string());
            i += 1;
        }
        if !self.is_punct(i, '{') {
            self.error(i, "'struct' : syntax error, expected '{'".into());
            return self.skip_statement(start);
        }
        self.skip_statement(i)
    }

    /// A function definition, a prototype, or a plain global declaration.
    fn parse_external(&mut self, start: usize) -> usize {
        let mut i = start;
        while i < self.tokens.len() {
            if self.is_punct(i, ';') {
                return i + 1;
            }
            if self.is_punct(i, '{') {
                self.error(i, "'{' : syntax error, unexpected '{'".into());
                return self.matching.get(&i).map_or(i + 1, |close| close + 1);
            }
            if self.is_punct(i, '(') {
                let close = self.matching.get(&i).copied().unwrap_or(i);
                let after = close + 1;
                if self.is_punct(after, ';') {
                    return after + 1;
                }
                if self.is_punct(after, '{') {
                    if self.ident(start) == Some("void") && self.ident(start + 1) == Some("main") {
                        self.has_main = true;
                    }
                    let end = self.matching.get(&after).copied().unwrap_or(after);
                    self.check_body(after, end);
                    return end + 1;
                }
                self.error(after, "syntax error, expected a function body".into());
                return self.skip_statement(after);
            }
            i += 1;
        }
        self.error(start, "syntax error, unexpected end of file".into());
        i
    }

    fn check_body(&mut self, open: usize, close: usize) {
        for i in open + 1..=close {
            if self.is_punct(i, '}') {
                let prev = i - 1;
                let terminated =
                    self.is_punct(prev, ';') || self.is_punct(prev, '{') || self.is_punct(prev, '}');
                if !terminated {
                    self.error(prev, "syntax error, expected ';' before '}'".into());
                }
            }
            if let (Some(a), Some(b)) = (self.ident(i), self.ident(i + 1)) {
                if i + 1 < close && !self.is_type(a) && !LEADING_WORDS.contains(&a) {
                    let b = b.to_string();
                    self.error(i + 1, format!("'{b}' : syntax error, unexpected identifier"));
                }
            }
        }
    }
}
