//! Java declaration parser.
//!
//! Produces a small AST of declarations with byte spans. Anything below the
//! member level (statements, expressions, initializers) is skipped.

use crate::{MethodSignature, Span};

pub mod ast {
    use crate::Span;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct CompilationUnit {
        pub package: Option<PackageDecl>,
        pub imports: Vec<ImportDecl>,
        pub types: Vec<TypeDecl>,
        pub range: Span,
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct PackageDecl {
        pub name: String,
        pub range: Span,
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct ImportDecl {
        pub is_static: bool,
        pub is_star: bool,
        pub path: String,
        pub range: Span,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum TypeKind {
        Class,
        Interface,
        Enum,
        Record,
        Annotation,
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct TypeDecl {
        pub kind: TypeKind,
        pub name: String,
        pub range: Span,
        pub body_range: Span,
        pub members: Vec<MemberDecl>,
    }

    /// An annotation as written, e.g. `@javax.annotation.Nullable` or
    /// `@SuppressWarnings("x")`. `range` covers the arguments too.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct AnnotationUse {
        pub name: String,
        pub range: Span,
    }

    impl AnnotationUse {
        pub fn simple_name(&self) -> &str {
            self.name.rsplit('.').next().unwrap_or(&self.name)
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum MemberDecl {
        Field(FieldDecl),
        Method(MethodDecl),
        Initializer(Span),
        Type(TypeDecl),
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct TypeRef {
        pub text: String,
        pub range: Span,
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Declarator {
        pub name: String,
        pub name_range: Span,
    }

    /// One field declaration statement, possibly declaring several variables.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct FieldDecl {
        pub annotations: Vec<AnnotationUse>,
        pub ty: TypeRef,
        pub declarators: Vec<Declarator>,
        pub range: Span,
    }

    impl FieldDecl {
        pub fn names(&self) -> impl Iterator<Item = &str> {
            self.declarators.iter().map(|d| d.name.as_str())
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct ParamDecl {
        pub annotations: Vec<AnnotationUse>,
        pub ty: TypeRef,
        pub name: String,
        pub name_range: Span,
        pub range: Span,
    }

    /// A method or constructor. Constructors have no return type.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct MethodDecl {
        pub annotations: Vec<AnnotationUse>,
        pub return_ty: Option<TypeRef>,
        pub name: String,
        pub name_range: Span,
        pub params: Vec<ParamDecl>,
        pub body_range: Option<Span>,
        pub range: Span,
    }

    impl MethodDecl {
        pub fn is_constructor(&self) -> bool {
            self.return_ty.is_none()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parse {
    compilation_unit: ast::CompilationUnit,
}

impl Parse {
    #[must_use]
    pub fn compilation_unit(&self) -> &ast::CompilationUnit {
        &self.compilation_unit
    }

    pub fn into_compilation_unit(self) -> ast::CompilationUnit {
        self.compilation_unit
    }
}

#[must_use]
pub fn parse(text: &str) -> Parse {
    let tokens = Lexer::new(text).collect();
    let mut parser = Parser::new(tokens);
    let compilation_unit = parser.parse_compilation_unit(text.len());
    Parse { compilation_unit }
}

/// Parses `text` as a single member declaration (used to validate rewritten
/// methods). Returns `None` unless exactly one method was found.
#[must_use]
pub fn parse_single_method(text: &str, enclosing_type: &str) -> Option<ast::MethodDecl> {
    let tokens = Lexer::new(text).collect();
    let mut parser = Parser::new(tokens);
    let member = parser.parse_member_decl(enclosing_type)?;
    if !parser.is_eof() {
        return None;
    }
    match member {
        ast::MemberDecl::Method(method) => Some(method),
        _ => None,
    }
}

impl ast::CompilationUnit {
    /// Resolves a flat class name (`pkg.Outer$Inner` or `pkg.Outer.Inner`)
    /// to its declaration.
    pub fn find_type(&self, flat_name: &str) -> Option<&ast::TypeDecl> {
        let relative = match &self.package {
            Some(pkg) => flat_name
                .strip_prefix(pkg.name.as_str())
                .and_then(|rest| rest.strip_prefix('.'))
                .unwrap_or(flat_name),
            None => flat_name,
        };
        let mut parts = relative.split(['$', '.']);
        let first = parts.next()?;
        let mut current = self.types.iter().find(|ty| ty.name == first)?;
        for part in parts {
            current = current.members.iter().find_map(|member| match member {
                ast::MemberDecl::Type(ty) if ty.name == part => Some(ty),
                _ => None,
            })?;
        }
        Some(current)
    }

    pub fn imports_type(&self, qualified: &str) -> bool {
        let package = qualified.rsplit_once('.').map(|(pkg, _)| pkg).unwrap_or("");
        self.imports.iter().any(|import| {
            !import.is_static && (import.path == qualified || (import.is_star && import.path == package))
        })
    }
}

impl ast::TypeDecl {
    pub fn methods(&self) -> impl Iterator<Item = &ast::MethodDecl> {
        self.members.iter().filter_map(|member| match member {
            ast::MemberDecl::Method(method) => Some(method),
            _ => None,
        })
    }

    pub fn fields(&self) -> impl Iterator<Item = &ast::FieldDecl> {
        self.members.iter().filter_map(|member| match member {
            ast::MemberDecl::Field(field) => Some(field),
            _ => None,
        })
    }

    /// Finds a method by serialized signature, matching name, arity and
    /// simple parameter type names.
    pub fn find_method(&self, signature: &str) -> Option<&ast::MethodDecl> {
        let sig = MethodSignature::parse(signature)?;
        self.methods().find(|method| {
            let types: Vec<String> = method.params.iter().map(|p| p.ty.text.clone()).collect();
            sig.matches(&method.name, &types)
        })
    }

    /// Finds the declaration statement that declares `variable`.
    pub fn find_field(&self, variable: &str) -> Option<&ast::FieldDecl> {
        self.fields().find(|field| field.names().any(|name| name == variable))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Token {
    kind: TokenKind,
    text: String,
    range: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Ident,
    Number,
    StringLiteral,
    CharLiteral,
    At,
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Semi,
    Comma,
    Dot,
    Star,
    Eq,
    Lt,
    Gt,
    Question,
    Unknown,
}

struct Lexer<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Lexer { text, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn peek_char(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn bump_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while matches!(self.peek_char(), Some(c) if c.is_whitespace()) {
                self.bump_char();
            }

            let rem = self.remaining();
            if rem.starts_with("//") {
                while let Some(c) = self.bump_char() {
                    if c == '\n' {
                        break;
                    }
                }
                continue;
            }

            if rem.starts_with("/*") {
                self.pos += 2;
                match self.remaining().find("*/") {
                    Some(end) => self.pos += end + 2,
                    None => self.pos = self.text.len(),
                }
                continue;
            }

            break;
        }
    }

    fn lex_while(&mut self, pred: impl Fn(char) -> bool) {
        while matches!(self.peek_char(), Some(c) if pred(c)) {
            self.bump_char();
        }
    }

    /// Consumes a quoted literal whose opening `quote` was already consumed.
    fn lex_quoted(&mut self, quote: char) {
        while let Some(c) = self.bump_char() {
            match c {
                '\\' => {
                    self.bump_char();
                }
                '\n' => break,
                c if c == quote => break,
                _ => {}
            }
        }
    }

    fn lex_text_block(&mut self) {
        // Opening `"""` already consumed.
        loop {
            let rem = self.remaining();
            if rem.is_empty() {
                break;
            }
            if rem.starts_with("\\") {
                self.pos += 1;
                self.bump_char();
                continue;
            }
            if rem.starts_with("\"\"\"") {
                self.pos += 3;
                break;
            }
            self.bump_char();
        }
    }

    fn next_token(&mut self) -> Option<Token> {
        self.skip_whitespace_and_comments();
        let start = self.pos;
        let ch = self.bump_char()?;

        let kind = match ch {
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ';' => TokenKind::Semi,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            '*' => TokenKind::Star,
            '=' => TokenKind::Eq,
            '<' => TokenKind::Lt,
            '>' => TokenKind::Gt,
            '?' => TokenKind::Question,
            '@' => TokenKind::At,
            '"' => {
                if self.remaining().starts_with("\"\"") {
                    self.pos += 2;
                    self.lex_text_block();
                } else {
                    self.lex_quoted('"');
                }
                TokenKind::StringLiteral
            }
            '\'' => {
                self.lex_quoted('\'');
                TokenKind::CharLiteral
            }
            c if c.is_ascii_digit() => {
                self.lex_while(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
                TokenKind::Number
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                self.lex_while(|c| c.is_alphanumeric() || c == '_' || c == '$');
                TokenKind::Ident
            }
            _ => TokenKind::Unknown,
        };

        let range = Span::new(start, self.pos);
        Some(Token {
            kind,
            text: self.text[start..self.pos].to_string(),
            range,
        })
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

const MODIFIERS: &[&str] = &[
    "public",
    "protected",
    "private",
    "static",
    "final",
    "abstract",
    "default",
    "synchronized",
    "native",
    "transient",
    "volatile",
    "sealed",
    "strictfp",
];

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_n(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n)
    }

    fn at_kind(&self, kind: TokenKind) -> bool {
        self.peek().is_some_and(|token| token.kind == kind)
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        self.peek()
            .is_some_and(|token| token.kind == TokenKind::Ident && token.text == keyword)
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos)?.clone();
        self.pos += 1;
        Some(tok)
    }

    /// End offset of the previously consumed token.
    fn last_end(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|idx| self.tokens.get(idx))
            .map(|t| t.range.end)
            .unwrap_or(0)
    }

    fn expect_kind(&mut self, kind: TokenKind) -> Token {
        match self.bump() {
            Some(tok) => tok,
            None => Token {
                kind,
                text: String::new(),
                range: Span::new(self.last_end(), self.last_end()),
            },
        }
    }

    fn expect_ident(&mut self) -> Token {
        self.expect_kind(TokenKind::Ident)
    }

    fn parse_compilation_unit(&mut self, len: usize) -> ast::CompilationUnit {
        // Package annotations (`@Deprecated package a;`) are rare enough to skip.
        let package = if self.at_keyword("package") {
            Some(self.parse_package_decl())
        } else {
            None
        };

        let mut imports = Vec::new();
        while self.at_keyword("import") {
            imports.push(self.parse_import_decl());
        }

        let mut types = Vec::new();
        while !self.is_eof() {
            if let Some(decl) = self.parse_type_decl() {
                types.push(decl);
            } else {
                self.bump();
            }
        }

        ast::CompilationUnit {
            package,
            imports,
            types,
            range: Span::new(0, len),
        }
    }

    fn parse_package_decl(&mut self) -> ast::PackageDecl {
        let kw = self.expect_ident();
        let (name, _) = self.parse_qualified_name();
        let semi = self.expect_kind(TokenKind::Semi);
        ast::PackageDecl {
            name,
            range: Span::new(kw.range.start, semi.range.end),
        }
    }

    fn parse_import_decl(&mut self) -> ast::ImportDecl {
        let kw = self.expect_ident();
        let mut is_static = false;
        if self.at_keyword("static") {
            is_static = true;
            self.bump();
        }

        let mut parts = vec![self.expect_ident().text];
        let mut is_star = false;
        while self.at_kind(TokenKind::Dot) {
            self.bump();
            if self.at_kind(TokenKind::Star) {
                self.bump();
                is_star = true;
                break;
            }
            parts.push(self.expect_ident().text);
        }

        let semi = self.expect_kind(TokenKind::Semi);
        ast::ImportDecl {
            is_static,
            is_star,
            path: parts.join("."),
            range: Span::new(kw.range.start, semi.range.end),
        }
    }

    fn parse_qualified_name(&mut self) -> (String, Span) {
        let first = self.expect_ident();
        let start = first.range.start;
        let mut end = first.range.end;
        let mut parts = vec![first.text];

        while self.at_kind(TokenKind::Dot) && self.peek_n(1).is_some_and(|t| t.kind == TokenKind::Ident) {
            self.bump();
            let part = self.expect_ident();
            end = part.range.end;
            parts.push(part.text);
        }

        (parts.join("."), Span::new(start, end))
    }

    fn at_type_keyword(&self) -> bool {
        self.peek().is_some_and(|tok| {
            tok.kind == TokenKind::Ident && matches!(tok.text.as_str(), "class" | "interface" | "enum" | "record")
        }) && self.peek_n(1).is_some_and(|t| t.kind == TokenKind::Ident)
    }

    fn at_annotation_type(&self) -> bool {
        self.at_kind(TokenKind::At)
            && self
                .peek_n(1)
                .is_some_and(|t| t.kind == TokenKind::Ident && t.text == "interface")
    }

    fn parse_type_decl(&mut self) -> Option<ast::TypeDecl> {
        let start_pos = self.pos;
        let start = self.peek()?.range.start;
        self.skip_modifiers_and_annotations();
        let decl = self.parse_type_decl_after_modifiers(start);
        if decl.is_none() {
            self.pos = start_pos;
        }
        decl
    }

    fn parse_type_decl_after_modifiers(&mut self, start: usize) -> Option<ast::TypeDecl> {
        let kind = if self.at_annotation_type() {
            self.bump();
            ast::TypeKind::Annotation
        } else if self.at_type_keyword() {
            match self.peek()?.text.as_str() {
                "class" => ast::TypeKind::Class,
                "interface" => ast::TypeKind::Interface,
                "enum" => ast::TypeKind::Enum,
                _ => ast::TypeKind::Record,
            }
        } else {
            return None;
        };
        self.bump();
        let name = self.expect_ident();

        let (members, body_range) = self.parse_type_body(&name.text, kind == ast::TypeKind::Enum);
        Some(ast::TypeDecl {
            kind,
            name: name.text,
            range: Span::new(start, body_range.end),
            body_range,
            members,
        })
    }

    /// Skips modifiers and annotations, returning the annotations seen.
    fn skip_modifiers_and_annotations(&mut self) -> Vec<ast::AnnotationUse> {
        let mut annotations = Vec::new();
        loop {
            if self.at_kind(TokenKind::At) {
                if self.at_annotation_type() {
                    break;
                }
                annotations.push(self.parse_annotation());
                continue;
            }

            if self.at_keyword("non")
                && self.peek_n(1).is_some_and(|t| t.text == "-")
                && self.peek_n(2).is_some_and(|t| t.text == "sealed")
            {
                self.bump();
                self.bump();
                self.bump();
                continue;
            }

            if self
                .peek()
                .is_some_and(|tok| tok.kind == TokenKind::Ident && MODIFIERS.contains(&tok.text.as_str()))
            {
                if self.at_keyword("static") && self.peek_n(1).is_some_and(|t| t.kind == TokenKind::LBrace) {
                    break;
                }
                self.bump();
                continue;
            }

            break;
        }
        annotations
    }

    fn parse_annotation(&mut self) -> ast::AnnotationUse {
        let at = self.expect_kind(TokenKind::At);
        let (name, name_range) = if self.at_kind(TokenKind::Ident) {
            self.parse_qualified_name()
        } else {
            (String::new(), at.range)
        };
        let mut end = name_range.end;
        if self.at_kind(TokenKind::LParen) {
            self.skip_balanced(TokenKind::LParen, TokenKind::RParen);
            end = self.last_end();
        }
        ast::AnnotationUse {
            name,
            range: Span::new(at.range.start, end),
        }
    }

    fn parse_type_body(&mut self, type_name: &str, is_enum: bool) -> (Vec<ast::MemberDecl>, Span) {
        // Type parameters, `extends`, `implements`, `permits` and record headers.
        while !self.is_eof() && !self.at_kind(TokenKind::LBrace) {
            self.bump();
        }
        let lbrace = self.expect_kind(TokenKind::LBrace);

        if is_enum {
            self.skip_enum_constants();
        }

        let mut members = Vec::new();
        while !self.is_eof() && !self.at_kind(TokenKind::RBrace) {
            let before = self.pos;
            match self.parse_member_decl(type_name) {
                Some(member) => members.push(member),
                None => {
                    if self.pos == before {
                        self.bump();
                    }
                }
            }
        }

        let rbrace = self.expect_kind(TokenKind::RBrace);
        (members, Span::new(lbrace.range.start, rbrace.range.end))
    }

    fn skip_enum_constants(&mut self) {
        loop {
            if self.at_kind(TokenKind::Semi) {
                self.bump();
                break;
            }
            if self.at_kind(TokenKind::RBrace) || self.is_eof() {
                break;
            }

            self.skip_modifiers_and_annotations();
            if !self.at_kind(TokenKind::Ident) {
                self.bump();
                continue;
            }
            self.bump();

            if self.at_kind(TokenKind::LParen) {
                self.skip_balanced(TokenKind::LParen, TokenKind::RParen);
            }
            if self.at_kind(TokenKind::LBrace) {
                self.skip_balanced(TokenKind::LBrace, TokenKind::RBrace);
            }
            if self.at_kind(TokenKind::Comma) {
                self.bump();
            }
        }
    }

    fn parse_member_decl(&mut self, enclosing_type: &str) -> Option<ast::MemberDecl> {
        let start = self.peek()?.range.start;

        if self.at_kind(TokenKind::Semi) {
            self.bump();
            return None;
        }

        let annotations = self.skip_modifiers_and_annotations();

        if self.at_keyword("static") && self.peek_n(1).is_some_and(|t| t.kind == TokenKind::LBrace) {
            self.bump();
        }
        if self.at_kind(TokenKind::LBrace) {
            self.skip_balanced(TokenKind::LBrace, TokenKind::RBrace);
            return Some(ast::MemberDecl::Initializer(Span::new(start, self.last_end())));
        }

        if self.at_annotation_type() || self.at_type_keyword() {
            return self
                .parse_type_decl_after_modifiers(start)
                .map(ast::MemberDecl::Type);
        }

        // Generic method/constructor type parameters: `<T extends ...>`
        if self.at_kind(TokenKind::Lt) {
            self.skip_balanced(TokenKind::Lt, TokenKind::Gt);
        }

        if self.peek().is_some_and(|t| t.kind == TokenKind::Ident && t.text == enclosing_type)
            && self.peek_n(1).is_some_and(|t| t.kind == TokenKind::LParen)
        {
            let name = self.expect_ident();
            return Some(ast::MemberDecl::Method(self.parse_method_rest(start, annotations, None, name)));
        }

        // Compact record constructor: `Name { ... }`.
        if self.peek().is_some_and(|t| t.kind == TokenKind::Ident && t.text == enclosing_type)
            && self.peek_n(1).is_some_and(|t| t.kind == TokenKind::LBrace)
        {
            self.bump();
            self.skip_balanced(TokenKind::LBrace, TokenKind::RBrace);
            return Some(ast::MemberDecl::Initializer(Span::new(start, self.last_end())));
        }

        let ty = self.parse_type_ref()?;
        if !self.at_kind(TokenKind::Ident) {
            self.recover_to_member_end();
            return None;
        }
        let name = self.expect_ident();

        if self.at_kind(TokenKind::LParen) {
            return Some(ast::MemberDecl::Method(self.parse_method_rest(
                start,
                annotations,
                Some(ty),
                name,
            )));
        }

        Some(ast::MemberDecl::Field(self.parse_field_rest(start, annotations, ty, name)))
    }

    fn parse_method_rest(
        &mut self,
        start: usize,
        annotations: Vec<ast::AnnotationUse>,
        return_ty: Option<ast::TypeRef>,
        name: Token,
    ) -> ast::MethodDecl {
        let params = self.parse_param_list();
        // Legacy array dimensions after the parameter list: `int m()[]`.
        while self.at_kind(TokenKind::LBracket) {
            self.bump();
            self.expect_kind(TokenKind::RBracket);
        }
        if self.at_keyword("throws") {
            while !self.is_eof() && !self.at_kind(TokenKind::LBrace) && !self.at_kind(TokenKind::Semi) {
                self.bump();
            }
        }
        if self.at_keyword("default") {
            // Annotation element default value.
            while !self.is_eof() && !self.at_kind(TokenKind::Semi) {
                if self.at_kind(TokenKind::LBrace) {
                    self.skip_balanced(TokenKind::LBrace, TokenKind::RBrace);
                    continue;
                }
                if self.at_kind(TokenKind::LParen) {
                    self.skip_balanced(TokenKind::LParen, TokenKind::RParen);
                    continue;
                }
                self.bump();
            }
        }

        let body_range = if self.at_kind(TokenKind::LBrace) {
            let body_start = self.peek().map(|t| t.range.start).unwrap_or(start);
            self.skip_balanced(TokenKind::LBrace, TokenKind::RBrace);
            Some(Span::new(body_start, self.last_end()))
        } else {
            self.expect_kind(TokenKind::Semi);
            None
        };

        ast::MethodDecl {
            annotations,
            return_ty,
            name: name.text,
            name_range: name.range,
            params,
            body_range,
            range: Span::new(start, self.last_end()),
        }
    }

    fn parse_field_rest(
        &mut self,
        start: usize,
        annotations: Vec<ast::AnnotationUse>,
        ty: ast::TypeRef,
        first: Token,
    ) -> ast::FieldDecl {
        let mut declarators = vec![ast::Declarator {
            name: first.text,
            name_range: first.range,
        }];
        loop {
            while self.at_kind(TokenKind::LBracket) {
                self.bump();
                self.expect_kind(TokenKind::RBracket);
            }
            if self.at_kind(TokenKind::Eq) {
                self.bump();
                self.skip_initializer();
            }
            if self.at_kind(TokenKind::Comma) && self.peek_n(1).is_some_and(|t| t.kind == TokenKind::Ident) {
                self.bump();
                let name = self.expect_ident();
                declarators.push(ast::Declarator {
                    name: name.text,
                    name_range: name.range,
                });
                continue;
            }
            break;
        }
        if !self.at_kind(TokenKind::Semi) {
            self.recover_to_member_end();
        } else {
            self.bump();
        }
        ast::FieldDecl {
            annotations,
            ty,
            declarators,
            range: Span::new(start, self.last_end()),
        }
    }

    /// Skips a variable initializer up to the next top-level `,` or `;`.
    fn skip_initializer(&mut self) {
        while let Some(tok) = self.peek() {
            match tok.kind {
                TokenKind::Comma | TokenKind::Semi | TokenKind::RBrace => break,
                TokenKind::LParen => self.skip_balanced(TokenKind::LParen, TokenKind::RParen),
                TokenKind::LBrace => self.skip_balanced(TokenKind::LBrace, TokenKind::RBrace),
                TokenKind::LBracket => self.skip_balanced(TokenKind::LBracket, TokenKind::RBracket),
                TokenKind::Lt if self.type_args_ahead() => self.skip_balanced(TokenKind::Lt, TokenKind::Gt),
                _ => {
                    self.bump();
                }
            }
        }
    }

    /// Heuristic: `<` opens type arguments if a matching `>` follows before
    /// anything that cannot appear in a type argument list.
    fn type_args_ahead(&self) -> bool {
        let mut depth = 0usize;
        for tok in &self.tokens[self.pos..] {
            match tok.kind {
                TokenKind::Lt => depth += 1,
                TokenKind::Gt => {
                    depth -= 1;
                    if depth == 0 {
                        return true;
                    }
                }
                TokenKind::Ident
                | TokenKind::Dot
                | TokenKind::Comma
                | TokenKind::Question
                | TokenKind::LBracket
                | TokenKind::RBracket
                | TokenKind::At => {}
                _ => return false,
            }
        }
        false
    }

    fn recover_to_member_end(&mut self) {
        while let Some(tok) = self.peek() {
            match tok.kind {
                TokenKind::Semi => {
                    self.bump();
                    break;
                }
                TokenKind::RBrace => break,
                TokenKind::LBrace => {
                    self.skip_balanced(TokenKind::LBrace, TokenKind::RBrace);
                    break;
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    fn parse_type_ref(&mut self) -> Option<ast::TypeRef> {
        if !self.at_kind(TokenKind::Ident) {
            return None;
        }
        let first = self.expect_ident();
        let start = first.range.start;
        let mut end = first.range.end;
        let mut text = first.text;

        loop {
            if self.at_kind(TokenKind::Lt) {
                let (generic_text, generic_end) = self.collect_balanced(TokenKind::Lt, TokenKind::Gt);
                text.push_str(&generic_text);
                end = generic_end;
            }
            if self.at_kind(TokenKind::Dot) && self.peek_n(1).is_some_and(|t| t.kind == TokenKind::Ident) {
                self.bump();
                let part = self.expect_ident();
                text.push('.');
                text.push_str(&part.text);
                end = part.range.end;
                continue;
            }
            break;
        }

        while self.at_kind(TokenKind::LBracket) && self.peek_n(1).is_some_and(|t| t.kind == TokenKind::RBracket) {
            self.bump();
            let rb = self.expect_kind(TokenKind::RBracket);
            text.push_str("[]");
            end = rb.range.end;
        }

        if self.at_kind(TokenKind::Dot)
            && self.peek_n(1).is_some_and(|t| t.kind == TokenKind::Dot)
            && self.peek_n(2).is_some_and(|t| t.kind == TokenKind::Dot)
        {
            self.bump();
            self.bump();
            let dot3 = self.expect_kind(TokenKind::Dot);
            text.push_str("...");
            end = dot3.range.end;
        }

        Some(ast::TypeRef {
            text,
            range: Span::new(start, end),
        })
    }

    fn parse_param_list(&mut self) -> Vec<ast::ParamDecl> {
        self.expect_kind(TokenKind::LParen);
        let mut params = Vec::new();
        while !self.is_eof() && !self.at_kind(TokenKind::RParen) {
            let start = self.peek().map(|t| t.range.start).unwrap_or(0);
            let annotations = self.skip_modifiers_and_annotations();
            match self.parse_type_ref() {
                Some(ty) if self.at_kind(TokenKind::Ident) => {
                    let name = self.expect_ident();
                    let mut end = name.range.end;
                    while self.at_kind(TokenKind::LBracket) {
                        self.bump();
                        end = self.expect_kind(TokenKind::RBracket).range.end;
                    }
                    params.push(ast::ParamDecl {
                        annotations,
                        ty,
                        name: name.text,
                        name_range: name.range,
                        range: Span::new(start, end),
                    });
                }
                _ => {
                    if !self.at_kind(TokenKind::RParen) && !self.at_kind(TokenKind::Comma) {
                        self.bump();
                    }
                }
            }

            if self.at_kind(TokenKind::Comma) {
                self.bump();
            }
        }
        self.expect_kind(TokenKind::RParen);
        params
    }

    fn skip_balanced(&mut self, open: TokenKind, close: TokenKind) {
        if !self.at_kind(open) {
            return;
        }
        self.bump();
        let mut depth = 1usize;
        while depth > 0 {
            match self.bump().map(|t| t.kind) {
                Some(k) if k == open => depth += 1,
                Some(k) if k == close => depth -= 1,
                Some(_) => {}
                None => break,
            }
        }
    }

    fn collect_balanced(&mut self, open: TokenKind, close: TokenKind) -> (String, usize) {
        let mut text = String::new();
        let mut end = self.last_end();
        let mut depth = 0usize;
        while let Some(tok) = self.bump() {
            if tok.kind == open {
                depth += 1;
            } else if tok.kind == close {
                depth = depth.saturating_sub(1);
            }
            text.push_str(&tok.text);
            end = tok.range.end;
            if depth == 0 {
                break;
            }
        }
        (text, end)
    }
}
