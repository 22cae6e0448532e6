//! Top-level outline of a C# compilation unit.
//!
//! The embedded strategy only accepts sources whose top level consists of
//! declarations. This module finds the top-level items without a full parse:
//! a lexer that understands comments, preprocessor lines and every literal
//! form, and a shallow parser that classifies each member of the compilation
//! unit (and of namespace bodies) and skips over its body.

use crate::error::{Error, Result};

/// Message reported for a top-level statement.
pub const TOP_LEVEL_STATEMENT_MESSAGE: &str = "Top-level statements are not allowed.";

/// Kind of a top-level item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    UsingDirective,
    ExternAlias,
    Namespace,
    TypeDeclaration,
    AssemblyAttribute,
    /// A global statement, including top-level local functions.
    Statement,
}

/// One top-level item and where it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineItem {
    pub kind: ItemKind,

    /// Line number (1-indexed)
    pub line: usize,

    /// Column number (1-indexed)
    pub column: usize,

    /// Declared name, for namespaces and types.
    pub name: Option<String>,
}

/// Ordered top-level items of a source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceOutline {
    items: Vec<OutlineItem>,
}

impl SourceOutline {
    /// Scan a source file. Never fails; malformed input yields a best-effort
    /// outline and syntax errors are left to the compiler.
    pub fn parse(source: &str) -> Self {
        let tokens = Lexer::new(source).tokenize();
        let mut parser = OutlineParser {
            tokens,
            pos: 0,
            items: Vec::new(),
        };
        parser.parse_members(false);
        Self {
            items: parser.items,
        }
    }

    pub fn items(&self) -> &[OutlineItem] {
        &self.items
    }

    pub fn first_statement(&self) -> Option<&OutlineItem> {
        self.items.iter().find(|i| i.kind == ItemKind::Statement)
    }

    /// Reject top-level statements.
    pub fn validate(&self) -> Result<()> {
        match self.first_statement() {
            Some(item) => Err(Error::UnsupportedConstruct {
                line: item.line,
                column: item.column,
                message: TOP_LEVEL_STATEMENT_MESSAGE.to_string(),
            }),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    Ident(String),
    Punct(char),
    Literal,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    line: usize,
    column: usize,
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    /// Only whitespace seen since the last newline.
    at_line_start: bool,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.trim_start_matches('\u{feff}').chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            at_line_start: true,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
            self.at_line_start = true;
        } else {
            self.column += 1;
            if !c.is_whitespace() {
                self.at_line_start = false;
            }
        }
        Some(c)
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();

        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
                continue;
            }

            if c == '#' && self.at_line_start {
                self.skip_line();
                continue;
            }

            if c == '/' && self.peek_at(1) == Some('/') {
                self.skip_line();
                continue;
            }
            if c == '/' && self.peek_at(1) == Some('*') {
                self.bump();
                self.bump();
                while let Some(c) = self.bump() {
                    if c == '*' && self.peek() == Some('/') {
                        self.bump();
                        break;
                    }
                }
                continue;
            }

            let (line, column) = (self.line, self.column);
            let kind = if self.at_string_start() {
                self.skip_string();
                TokenKind::Literal
            } else if c == '\'' {
                self.skip_char_literal();
                TokenKind::Literal
            } else if c.is_ascii_digit() {
                self.skip_number();
                TokenKind::Literal
            } else if is_ident_start(c)
                || (c == '@' && self.peek_at(1).is_some_and(is_ident_start))
            {
                if c == '@' {
                    self.bump();
                }
                TokenKind::Ident(self.read_ident())
            } else {
                self.bump();
                TokenKind::Punct(c)
            };

            tokens.push(Token { kind, line, column });
        }

        tokens
    }

    /// A string literal starts here: any run of `$`/`@` prefixes then `"`.
    fn at_string_start(&self) -> bool {
        let mut i = 0;
        while let Some(c) = self.peek_at(i) {
            match c {
                '$' | '@' => i += 1,
                '"' => return true,
                _ => return false,
            }
        }
        false
    }

    fn skip_string(&mut self) {
        let mut verbatim = false;
        let mut interpolated = false;
        while let Some(c) = self.peek() {
            match c {
                '$' => interpolated = true,
                '@' => verbatim = true,
                _ => break,
            }
            self.bump();
        }

        let mut quotes = 0;
        while self.peek_at(quotes) == Some('"') {
            quotes += 1;
        }

        if quotes >= 3 && !verbatim {
            self.skip_raw_string(quotes);
        } else if quotes == 2 && !verbatim {
            // Empty regular string: `""`.
            self.bump();
            self.bump();
        } else {
            self.bump();
            self.skip_quoted_body(verbatim, interpolated);
        }
    }

    /// Body of a regular or verbatim string after the opening quote.
    fn skip_quoted_body(&mut self, verbatim: bool, interpolated: bool) {
        while let Some(c) = self.bump() {
            match c {
                '\\' if !verbatim => {
                    self.bump();
                }
                '"' if verbatim && self.peek() == Some('"') => {
                    self.bump();
                }
                '"' => return,
                '\n' if !verbatim => return,
                '{' if interpolated => {
                    if self.peek() == Some('{') {
                        self.bump();
                    } else {
                        self.skip_interpolation_hole();
                    }
                }
                _ => {}
            }
        }
    }

    /// Skip an interpolation hole up to its closing brace, including any
    /// nested literals.
    fn skip_interpolation_hole(&mut self) {
        let mut depth = 1;
        while let Some(c) = self.peek() {
            if self.at_string_start() {
                self.skip_string();
                continue;
            }
            match c {
                '\'' => {
                    self.skip_char_literal();
                    continue;
                }
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        self.bump();
                        return;
                    }
                }
                _ => {}
            }
            self.bump();
        }
    }

    /// Raw string: ends at a run of at least `quotes` quotes.
    fn skip_raw_string(&mut self, quotes: usize) {
        for _ in 0..quotes {
            self.bump();
        }
        while self.peek().is_some() {
            let mut run = 0;
            while self.peek_at(run) == Some('"') {
                run += 1;
            }
            if run >= quotes {
                for _ in 0..run {
                    self.bump();
                }
                return;
            }
            if run > 0 {
                for _ in 0..run {
                    self.bump();
                }
            } else {
                self.bump();
            }
        }
    }

    fn skip_char_literal(&mut self) {
        self.bump();
        while let Some(c) = self.bump() {
            match c {
                '\\' => {
                    self.bump();
                }
                '\'' | '\n' => return,
                _ => {}
            }
        }
    }

    fn skip_number(&mut self) {
        while let Some(c) = self.peek() {
            let continues = c.is_ascii_alphanumeric()
                || c == '_'
                || (c == '.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit()));
            if !continues {
                break;
            }
            self.bump();
        }
    }

    fn read_ident(&mut self) -> String {
        let mut ident = String::new();
        while let Some(c) = self.peek() {
            if !is_ident_continue(c) {
                break;
            }
            ident.push(c);
            self.bump();
        }
        ident
    }
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

fn is_ident_continue(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

const MODIFIERS: &[&str] = &[
    "public",
    "private",
    "protected",
    "internal",
    "static",
    "sealed",
    "abstract",
    "partial",
    "unsafe",
    "new",
    "file",
    "readonly",
    "ref",
];

const TYPE_KEYWORDS: &[&str] = &["class", "struct", "interface", "enum", "record", "delegate"];

struct OutlineParser {
    tokens: Vec<Token>,
    pos: usize,
    items: Vec<OutlineItem>,
}

impl OutlineParser {
    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn peek_at(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    fn is_ident(&self, offset: usize, name: &str) -> bool {
        matches!(self.peek_at(offset), Some(TokenKind::Ident(i)) if i == name)
    }

    fn is_punct(&self, offset: usize, c: char) -> bool {
        self.peek_at(offset) == Some(&TokenKind::Punct(c))
    }

    fn position(&self) -> (usize, usize) {
        self.tokens
            .get(self.pos)
            .map(|t| (t.line, t.column))
            .unwrap_or((0, 0))
    }

    fn push(&mut self, kind: ItemKind, (line, column): (usize, usize), name: Option<String>) {
        self.items.push(OutlineItem {
            kind,
            line,
            column,
            name,
        });
    }

    /// Members of the compilation unit or of a namespace block.
    fn parse_members(&mut self, in_block: bool) {
        while let Some(kind) = self.peek() {
            if *kind == TokenKind::Punct('}') {
                self.pos += 1;
                if in_block {
                    return;
                }
                continue;
            }
            self.parse_member();
        }
    }

    fn parse_member(&mut self) {
        let start = self.position();

        if self.is_ident(0, "extern") && self.is_ident(1, "alias") {
            self.skip_past(';');
            self.push(ItemKind::ExternAlias, start, None);
            return;
        }

        if self.is_ident(0, "global") && self.is_ident(1, "using") {
            self.pos += 1;
            self.parse_using(start);
            return;
        }

        if self.is_ident(0, "using") {
            self.parse_using(start);
            return;
        }

        if self.is_ident(0, "namespace") {
            self.pos += 1;
            let name = self.read_qualified_name();
            self.push(ItemKind::Namespace, start, name);
            if self.is_punct(0, '{') {
                self.pos += 1;
                self.parse_members(true);
            } else if self.is_punct(0, ';') {
                // File-scoped: members follow at this level.
                self.pos += 1;
            }
            return;
        }

        if self.is_punct(0, '[')
            && (self.is_ident(1, "assembly") || self.is_ident(1, "module"))
            && self.is_punct(2, ':')
        {
            self.skip_balanced('[', ']');
            self.push(ItemKind::AssemblyAttribute, start, None);
            return;
        }

        self.parse_declaration_or_statement(start);
    }

    /// `using X;`, `using static X;`, `using A = X;` are directives;
    /// `using (...)`, `using var x = ...;` and `using T x = ...;` are statements.
    fn parse_using(&mut self, start: (usize, usize)) {
        self.pos += 1; // using

        if self.is_punct(0, '(') {
            self.skip_statement();
            self.push(ItemKind::Statement, start, None);
            return;
        }

        // Alias targets may be any type, tuples included.
        if matches!(self.peek(), Some(TokenKind::Ident(_))) && self.is_punct(1, '=') {
            self.skip_past(';');
            self.push(ItemKind::UsingDirective, start, None);
            return;
        }

        let body_start = self.pos;
        self.skip_past(';');
        let mut body = &self.tokens[body_start..self.pos];
        if let Some(Token {
            kind: TokenKind::Ident(first),
            ..
        }) = body.first()
        {
            if first == "static" {
                body = &body[1..];
            }
        }

        let is_statement = body.windows(2).any(|pair| {
            matches!(
                (&pair[0].kind, &pair[1].kind),
                (TokenKind::Ident(_), TokenKind::Ident(_))
            )
        }) || body
            .iter()
            .any(|t| matches!(t.kind, TokenKind::Literal | TokenKind::Punct('(')));

        let kind = if is_statement {
            ItemKind::Statement
        } else {
            ItemKind::UsingDirective
        };
        self.push(kind, start, None);
    }

    fn parse_declaration_or_statement(&mut self, start: (usize, usize)) {
        loop {
            if self.is_punct(0, '[') {
                self.skip_balanced('[', ']');
                continue;
            }
            match self.peek() {
                Some(TokenKind::Ident(word)) if MODIFIERS.contains(&word.as_str()) => {
                    self.pos += 1;
                }
                _ => break,
            }
        }

        let keyword = match self.peek() {
            Some(TokenKind::Ident(word)) if TYPE_KEYWORDS.contains(&word.as_str()) => {
                Some(word.clone())
            }
            _ => None,
        };
        // `record` is contextual: `record.Save();` is a statement.
        let keyword = keyword.filter(|k| k != "record" || self.starts_record());

        match keyword {
            Some(keyword) => {
                self.pos += 1;
                // `record struct` / `record class`
                if keyword == "record"
                    && (self.is_ident(0, "struct") || self.is_ident(0, "class"))
                {
                    self.pos += 1;
                }
                let name = self.declared_name(&keyword);
                self.skip_type_body();
                self.push(ItemKind::TypeDeclaration, start, name);
            }
            None => {
                self.skip_statement();
                self.push(ItemKind::Statement, start, None);
            }
        }
    }

    /// `record Name`, `record class Name` or `record struct Name`.
    fn starts_record(&self) -> bool {
        if self.is_ident(1, "class") || self.is_ident(1, "struct") {
            matches!(self.peek_at(2), Some(TokenKind::Ident(_)))
        } else {
            matches!(self.peek_at(1), Some(TokenKind::Ident(_)))
        }
    }

    /// Name following a type keyword; for delegates, the identifier before `(`.
    fn declared_name(&self, keyword: &str) -> Option<String> {
        if keyword == "delegate" {
            let mut last = None;
            for token in &self.tokens[self.pos..] {
                match &token.kind {
                    TokenKind::Ident(name) => last = Some(name.clone()),
                    TokenKind::Punct('(') | TokenKind::Punct(';') => break,
                    _ => {}
                }
            }
            return last;
        }
        match self.peek() {
            Some(TokenKind::Ident(name)) => Some(name.clone()),
            _ => None,
        }
    }

    fn read_qualified_name(&mut self) -> Option<String> {
        let mut name = String::new();
        while let Some(kind) = self.peek() {
            match kind {
                TokenKind::Ident(part) => name.push_str(part),
                TokenKind::Punct('.') => name.push('.'),
                _ => break,
            }
            self.pos += 1;
        }
        (!name.is_empty()).then_some(name)
    }

    /// Skip to the end of a type declaration: a `;` before any body, or the
    /// body's closing brace (plus an optional trailing `;`).
    fn skip_type_body(&mut self) {
        while let Some(kind) = self.peek() {
            match kind {
                TokenKind::Punct(';') => {
                    self.pos += 1;
                    return;
                }
                TokenKind::Punct('{') => {
                    self.skip_balanced('{', '}');
                    if self.is_punct(0, ';') {
                        self.pos += 1;
                    }
                    return;
                }
                TokenKind::Punct('(') => self.skip_balanced('(', ')'),
                _ => self.pos += 1,
            }
        }
    }

    /// Skip one statement: up to a `;` at nesting depth zero, or a block
    /// closing back to depth zero.
    fn skip_statement(&mut self) {
        let mut depth = 0usize;
        while let Some(kind) = self.peek() {
            match kind {
                TokenKind::Punct('(' | '[' | '{') => depth += 1,
                TokenKind::Punct(')' | ']') => depth = depth.saturating_sub(1),
                TokenKind::Punct('}') => {
                    if depth == 0 {
                        // Closing brace of an enclosing namespace.
                        return;
                    }
                    depth -= 1;
                    if depth == 0 {
                        self.pos += 1;
                        let continues = matches!(
                            self.peek(),
                            Some(TokenKind::Punct(';' | '.' | ')' | ',' | '?'))
                        ) || self.is_ident(0, "else")
                            || self.is_ident(0, "catch")
                            || self.is_ident(0, "finally")
                            || self.is_ident(0, "while");
                        if !continues {
                            return;
                        }
                        continue;
                    }
                }
                TokenKind::Punct(';') if depth == 0 => {
                    self.pos += 1;
                    return;
                }
                _ => {}
            }
            self.pos += 1;
        }
    }

    /// Skip a balanced group starting at the current `open` token.
    fn skip_balanced(&mut self, open: char, close: char) {
        let mut depth = 0usize;
        while let Some(kind) = self.peek() {
            match kind {
                TokenKind::Punct(c) if *c == open => depth += 1,
                TokenKind::Punct(c) if *c == close => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        self.pos += 1;
                        return;
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }
    }

    fn skip_past(&mut self, terminator: char) {
        while let Some(kind) = self.peek() {
            let hit = *kind == TokenKind::Punct(terminator);
            self.pos += 1;
            if hit {
                return;
            }
        }
    }
}
