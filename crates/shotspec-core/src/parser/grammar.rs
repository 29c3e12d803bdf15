// Recursive descent grammar for spec files
// Statements the tooling never inspects (imports, declarations, control
// flow) are skipped as balanced token runs and kept as opaque source.
// Declarations it cannot read at all are kept opaque the same way.
// Function body blocks are never parsed, only their text is retained.

use super::lexer::{tokenize, Token, TokenKind};
use super::{ParseError, Parser};
use crate::ast::*;
use crate::config::Vocabulary;

type PResult<T> = Result<T, ParseError>;

const ASSIGNMENT_OPS: &[&str] = &[
    "=", "+=", "-=", "*=", "/=", "%=", "**=", "<<=", ">>=", ">>>=", "&=", "|=", "^=", "&&=",
    "||=", "??=",
];

const PREFIX_OPS: &[&str] = &["!", "~", "+", "-", "++", "--", "typeof", "void", "delete"];

/// Binding power of binary operators
fn binary_precedence(op: &str) -> Option<u8> {
    let precedence = match op {
        "??" => 1,
        "||" => 2,
        "&&" => 3,
        "|" => 4,
        "^" => 5,
        "&" => 6,
        "==" | "!=" | "===" | "!==" => 7,
        "<" | ">" | "<=" | ">=" | "instanceof" | "in" => 8,
        "<<" | ">>" | ">>>" => 9,
        "+" | "-" => 10,
        "*" | "/" | "%" => 11,
        "**" => 12,
        _ => return None,
    };
    Some(precedence)
}

/// Spec-file parser holding the call vocabulary used to classify chain links
#[derive(Debug, Clone, Default)]
pub struct SpecParser {
    vocabulary: Vocabulary,
}

impl SpecParser {
    pub fn new(vocabulary: Vocabulary) -> Self {
        Self { vocabulary }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }
}

impl Parser for SpecParser {
    fn parse(&mut self, source: &str) -> Result<SpecFile, ParseError> {
        parse_program(source, &self.vocabulary)
    }

    fn name(&self) -> &'static str {
        "spec"
    }
}

pub(super) fn parse_program(source: &str, vocabulary: &Vocabulary) -> PResult<SpecFile> {
    let tokens = tokenize(source)?;
    let quote = preferred_quote(&tokens);
    let mut grammar = Grammar {
        source,
        tokens,
        pos: 0,
        vocabulary,
    };

    let mut statements = Vec::new();
    while !grammar.peek().is_eof() {
        let start = grammar.pos;
        match grammar.statement() {
            Ok(stmt) => statements.push(stmt),
            Err(error) => {
                grammar.pos = start;
                statements.push(grammar.opaque_run(error)?);
            }
        }
    }
    tracing::debug!(statements = statements.len(), "Parsed spec file");

    Ok(SpecFile {
        source: source.to_string(),
        statements,
        quote,
    })
}

fn preferred_quote(tokens: &[Token]) -> char {
    let (single, double) = tokens.iter().fold((0usize, 0usize), |(s, d), t| match t.kind {
        TokenKind::Str { quote: '\'', .. } => (s + 1, d),
        TokenKind::Str { quote: '"', .. } => (s, d + 1),
        _ => (s, d),
    });
    if double > single {
        '"'
    } else {
        '\''
    }
}

struct Grammar<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    vocabulary: &'a Vocabulary,
}

impl<'a> Grammar<'a> {
    // ---- token cursor ----

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_at(&self, n: usize) -> &Token {
        let index = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    fn bump(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if !token.is_eof() {
            self.pos += 1;
        }
        token
    }

    fn prev_end(&self) -> usize {
        if self.pos == 0 {
            0
        } else {
            self.tokens[self.pos - 1].span.end
        }
    }

    fn text(&self, token: &Token) -> &'a str {
        token.text(self.source)
    }

    fn at_punct(&self, punct: &str) -> bool {
        self.peek().is_punct(punct)
    }

    fn is_word(&self, token: &Token, word: &str) -> bool {
        token.is_ident() && self.text(token) == word
    }

    fn at_word(&self, word: &str) -> bool {
        self.is_word(self.peek(), word)
    }

    fn eat_punct(&mut self, punct: &str) -> Option<Token> {
        if self.at_punct(punct) {
            Some(self.bump())
        } else {
            None
        }
    }

    fn expect_punct(&mut self, punct: &str) -> PResult<Token> {
        self.eat_punct(punct)
            .ok_or_else(|| self.error_here(&format!("expected '{punct}'")))
    }

    fn expect_ident(&mut self) -> PResult<String> {
        if self.peek().is_ident() {
            let token = self.bump();
            Ok(self.text(&token).to_string())
        } else {
            Err(self.error_here("expected identifier"))
        }
    }

    fn error_here(&self, message: &str) -> ParseError {
        let token = self.peek();
        let found = if token.is_eof() {
            "end of input".to_string()
        } else {
            format!("'{}'", self.text(token))
        };
        ParseError::at(self.source, token.span.start, format!("{message}, found {found}"))
    }

    fn finish(&self, start: usize, kind: ExprKind) -> Expr {
        Expr::new(kind, Span::new(start, self.prev_end()))
    }

    /// Index of the token closing the bracket at `open`
    fn matching_close(&self, open: usize) -> PResult<usize> {
        let mut depth = 0usize;
        for (index, token) in self.tokens.iter().enumerate().skip(open) {
            match token.kind {
                TokenKind::Punct("(") | TokenKind::Punct("[") | TokenKind::Punct("{") => depth += 1,
                TokenKind::Punct(")") | TokenKind::Punct("]") | TokenKind::Punct("}") => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Ok(index);
                    }
                }
                TokenKind::Eof => break,
                _ => {}
            }
        }
        Err(ParseError::at(
            self.source,
            self.tokens[open].span.start,
            "unbalanced bracket",
        ))
    }

    /// Skip from an opening bracket past its matching close
    fn skip_balanced(&mut self) -> PResult<()> {
        let close = self.matching_close(self.pos)?;
        self.pos = close + 1;
        Ok(())
    }

    // ---- statements ----

    fn statement(&mut self) -> PResult<Stmt> {
        let start = self.peek().span.start;
        let first = self.peek().clone();

        if first.is_punct(";") {
            self.bump();
            return Ok(self.opaque(start));
        }
        if first.is_punct("{") {
            self.skip_balanced()?;
            return Ok(self.opaque(start));
        }
        if first.is_ident() {
            let next = self.peek_at(1);
            match self.text(&first) {
                "import" if !next.is_punct("(") && !next.is_punct(".") => {
                    return self.import_statement(start)
                }
                "export" => return self.export_statement(start),
                "function" | "class" => return self.declaration(start),
                "async" if self.is_word(next, "function") && !next.newline_before => {
                    return self.declaration(start)
                }
                "const" | "let" | "var" => return self.variable_statement(start, false),
                "if" | "for" | "while" | "do" | "switch" | "try" | "return" | "throw"
                | "break" | "continue" => return self.control_statement(start),
                _ => {}
            }
        }

        let expr = self.expression()?;
        let semicolon = self.statement_end()?;
        Ok(Stmt {
            kind: StmtKind::Expr { expr, semicolon },
            span: Span::new(start, self.prev_end()),
        })
    }

    /// Keep a declaration or labelled statement the grammar cannot read
    /// (JSX, for one) as opaque source, ending at a `;` or at the next line
    /// that starts at the statement's own indentation. Anything else, and
    /// runs with unbalanced brackets, keep the original error.
    fn opaque_run(&mut self, error: ParseError) -> PResult<Stmt> {
        let first = self.peek().clone();
        let recoverable = match self.text(&first) {
            "const" | "let" | "var" | "export" | "function" | "class" | "async" => first.is_ident(),
            _ => first.is_ident() && self.peek_at(1).is_punct(":"),
        };
        if !recoverable {
            return Err(error);
        }

        let start = first.span.start;
        let first_pos = self.pos;
        let indent = line_indent(self.source, start);
        loop {
            let token = self.peek().clone();
            match token.kind {
                TokenKind::Eof => break,
                TokenKind::Punct(";") => {
                    self.bump();
                    break;
                }
                TokenKind::Punct("(") | TokenKind::Punct("[") | TokenKind::Punct("{") => {
                    self.skip_balanced().map_err(|_| error.clone())?;
                }
                TokenKind::Punct(")") | TokenKind::Punct("]") | TokenKind::Punct("}") => {
                    return Err(error)
                }
                _ if self.pos > first_pos
                    && token.newline_before
                    && line_indent(self.source, token.span.start) == indent =>
                {
                    break
                }
                _ => {
                    self.bump();
                }
            }
        }
        tracing::warn!(line = error.line, %error, "Keeping unreadable statement as opaque source");
        Ok(self.opaque(start))
    }

    fn opaque(&self, start: usize) -> Stmt {
        Stmt {
            kind: StmtKind::Opaque,
            span: Span::new(start, self.prev_end()),
        }
    }

    /// Consume an explicit `;` or accept an inserted one
    fn statement_end(&mut self) -> PResult<bool> {
        if self.eat_punct(";").is_some() {
            return Ok(true);
        }
        let next = self.peek();
        if next.is_eof() || next.is_punct("}") || next.newline_before {
            Ok(false)
        } else {
            Err(self.error_here("expected ';' or line break"))
        }
    }

    fn import_statement(&mut self, start: usize) -> PResult<Stmt> {
        self.bump();
        // Every static import ends with its module specifier
        loop {
            let token = self.peek().clone();
            match token.kind {
                TokenKind::Eof => return Err(self.error_here("unterminated import")),
                TokenKind::Str { .. } => {
                    self.bump();
                    break;
                }
                TokenKind::Punct("{") => self.skip_balanced()?,
                _ => {
                    self.bump();
                }
            }
        }
        self.statement_end()?;
        Ok(self.opaque(start))
    }

    fn export_statement(&mut self, start: usize) -> PResult<Stmt> {
        self.bump();
        if self.at_word("default") {
            self.bump();
            if self.at_word("function") || self.at_word("class") {
                return self.declaration(start);
            }
            let expr = self.expression()?;
            let semicolon = self.statement_end()?;
            return Ok(Stmt {
                kind: StmtKind::ExportDefault { expr, semicolon },
                span: Span::new(start, self.prev_end()),
            });
        }
        if self.at_word("const") || self.at_word("let") || self.at_word("var") {
            return self.variable_statement(start, true);
        }
        if self.at_word("function") || self.at_word("class") || self.at_word("async") {
            return self.declaration(start);
        }
        // `export { a, b }` and `export * from '...'`
        loop {
            let token = self.peek().clone();
            match token.kind {
                TokenKind::Eof => break,
                TokenKind::Punct(";") => {
                    self.bump();
                    break;
                }
                TokenKind::Punct("{") => self.skip_balanced()?,
                _ if token.newline_before && self.pos > 0 && !self.is_word(&token, "from") => {
                    break
                }
                _ => {
                    self.bump();
                }
            }
        }
        Ok(self.opaque(start))
    }

    /// Function or class declaration: header tokens, then a balanced body
    fn declaration(&mut self, start: usize) -> PResult<Stmt> {
        loop {
            let token = self.peek().clone();
            match token.kind {
                TokenKind::Eof => return Err(self.error_here("expected declaration body")),
                TokenKind::Punct("(") | TokenKind::Punct("[") => self.skip_balanced()?,
                TokenKind::Punct("{") => {
                    self.skip_balanced()?;
                    break;
                }
                _ => {
                    self.bump();
                }
            }
        }
        Ok(self.opaque(start))
    }

    fn variable_statement(&mut self, start: usize, exported: bool) -> PResult<Stmt> {
        let keyword_token = self.bump();
        let keyword = self.text(&keyword_token).to_string();

        if self.peek().is_ident() && self.peek_at(1).is_punct("=") {
            let name = self.expect_ident()?;
            self.bump();
            let init = self.assignment()?;
            if !self.at_punct(",") {
                let semicolon = self.statement_end()?;
                return Ok(Stmt {
                    kind: StmtKind::VarDecl {
                        exported,
                        keyword,
                        name,
                        init,
                        semicolon,
                    },
                    span: Span::new(start, self.prev_end()),
                });
            }
            self.bump();
        }

        // Destructuring, several declarators or no initializer
        loop {
            if self.at_punct("{") || self.at_punct("[") {
                self.skip_balanced()?;
            } else {
                self.expect_ident()?;
            }
            if self.eat_punct("=").is_some() {
                self.assignment()?;
            }
            if self.eat_punct(",").is_none() {
                break;
            }
        }
        self.statement_end()?;
        Ok(self.opaque(start))
    }

    fn control_statement(&mut self, start: usize) -> PResult<Stmt> {
        let keyword = self.bump();
        match self.text(&keyword) {
            "if" | "while" | "for" | "switch" => {
                if self.at_punct("(") {
                    self.skip_balanced()?;
                } else if self.at_word("await") {
                    // for await (...)
                    self.bump();
                    self.skip_balanced()?;
                } else {
                    return Err(self.error_here("expected '('"));
                }
                if self.text(&keyword) == "switch" {
                    self.skip_balanced()?;
                } else {
                    self.statement()?;
                    if self.text(&keyword) == "if" && self.at_word("else") {
                        self.bump();
                        self.statement()?;
                    }
                }
            }
            "do" => {
                self.statement()?;
                if !self.at_word("while") {
                    return Err(self.error_here("expected 'while'"));
                }
                self.bump();
                self.skip_balanced()?;
                self.eat_punct(";");
            }
            "try" => {
                self.skip_balanced()?;
                while self.at_word("catch") || self.at_word("finally") {
                    self.bump();
                    if self.at_punct("(") {
                        self.skip_balanced()?;
                    }
                    self.skip_balanced()?;
                }
            }
            _ => {
                // return, throw, break, continue
                let next = self.peek();
                if !(next.is_eof() || next.newline_before || next.is_punct(";") || next.is_punct("}")) {
                    self.expression()?;
                }
                self.statement_end()?;
            }
        }
        Ok(self.opaque(start))
    }

    // ---- expressions ----

    fn expression(&mut self) -> PResult<Expr> {
        let start = self.peek().span.start;
        let mut expr = self.assignment()?;
        while self.eat_punct(",").is_some() {
            let right = self.assignment()?;
            expr = self.finish(
                start,
                ExprKind::Binary {
                    op: ",".to_string(),
                    left: Box::new(expr),
                    right: Box::new(right),
                },
            );
        }
        Ok(expr)
    }

    fn assignment(&mut self) -> PResult<Expr> {
        if let Some(arrow) = self.arrow_function()? {
            return Ok(arrow);
        }
        let start = self.peek().span.start;
        let left = self.conditional()?;

        if let TokenKind::Punct(op) = self.peek().kind {
            if ASSIGNMENT_OPS.contains(&op) {
                self.bump();
                let right = self.assignment()?;
                return Ok(self.finish(
                    start,
                    ExprKind::Binary {
                        op: op.to_string(),
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                ));
            }
        }
        Ok(left)
    }

    fn conditional(&mut self) -> PResult<Expr> {
        let start = self.peek().span.start;
        let test = self.binary(1)?;
        if self.eat_punct("?").is_none() {
            return Ok(test);
        }
        let consequent = self.assignment()?;
        self.expect_punct(":")?;
        let alternate = self.assignment()?;
        Ok(self.finish(
            start,
            ExprKind::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            },
        ))
    }

    fn binary_op(&self) -> Option<(&'a str, u8)> {
        let token = self.peek();
        let op = match token.kind {
            TokenKind::Punct(p) => p,
            TokenKind::Ident => {
                let word = self.text(token);
                if word == "instanceof" || word == "in" {
                    word
                } else {
                    return None;
                }
            }
            _ => return None,
        };
        binary_precedence(op).map(|precedence| (op, precedence))
    }

    fn binary(&mut self, min_precedence: u8) -> PResult<Expr> {
        let start = self.peek().span.start;
        let mut left = self.unary()?;

        while let Some((op, precedence)) = self.binary_op() {
            if precedence < min_precedence {
                break;
            }
            self.bump();
            // `**` is right-associative
            let next_min = if op == "**" { precedence } else { precedence + 1 };
            let right = self.binary(next_min)?;
            left = self.finish(
                start,
                ExprKind::Binary {
                    op: op.to_string(),
                    left: Box::new(left),
                    right: Box::new(right),
                },
            );
        }
        Ok(left)
    }

    fn unary(&mut self) -> PResult<Expr> {
        let start = self.peek().span.start;
        let token = self.peek().clone();
        let op = match token.kind {
            TokenKind::Punct(p) if PREFIX_OPS.contains(&p) => Some(p.to_string()),
            TokenKind::Ident if PREFIX_OPS.contains(&self.text(&token)) => {
                Some(self.text(&token).to_string())
            }
            _ => None,
        };
        if let Some(op) = op {
            self.bump();
            let operand = self.unary()?;
            return Ok(self.finish(
                start,
                ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
            ));
        }
        if self.at_word("await") {
            self.bump();
            let operand = self.unary()?;
            return Ok(self.finish(start, ExprKind::Await(Box::new(operand))));
        }

        let expr = self.call_chain()?;
        let next = self.peek();
        if (next.is_punct("++") || next.is_punct("--")) && !next.newline_before {
            return Err(self.error_here("postfix update expressions are not supported"));
        }
        Ok(expr)
    }

    /// Primary expression followed by member accesses and calls
    fn call_chain(&mut self) -> PResult<Expr> {
        let start = self.peek().span.start;
        let head = if self.at_word("new") {
            self.new_expression()?
        } else {
            self.primary()?
        };

        let mut links = Vec::new();
        loop {
            let link_start = self.peek().span.start;
            let leading = Span::new(self.prev_end(), link_start);
            let optional = self.at_punct("?.");

            let kind = if self.at_punct(".") || optional {
                self.bump();
                if optional && self.at_punct("(") {
                    LinkKind::Call(self.arguments()?)
                } else if optional && self.at_punct("[") {
                    self.index()?
                } else {
                    let name = self.expect_ident()?;
                    if self.at_punct("(") {
                        let args = self.arguments()?;
                        let role = self.vocabulary.classify(&name);
                        LinkKind::Method { name, args, role }
                    } else {
                        LinkKind::Property(name)
                    }
                }
            } else if self.at_punct("(") {
                LinkKind::Call(self.arguments()?)
            } else if self.at_punct("[") {
                self.index()?
            } else {
                break;
            };

            links.push(Link {
                kind,
                optional,
                span: Some(Span::new(link_start, self.prev_end())),
                leading: Some(leading),
            });
        }

        if links.is_empty() {
            Ok(head)
        } else {
            Ok(self.finish(
                start,
                ExprKind::Chain(Chain {
                    head: Box::new(head),
                    links,
                }),
            ))
        }
    }

    fn index(&mut self) -> PResult<LinkKind> {
        self.expect_punct("[")?;
        let index = self.expression()?;
        self.expect_punct("]")?;
        Ok(LinkKind::Index(Box::new(index)))
    }

    fn new_expression(&mut self) -> PResult<Expr> {
        let start = self.peek().span.start;
        self.bump();

        let callee = if self.at_word("new") {
            self.new_expression()?
        } else {
            let callee_start = self.peek().span.start;
            let head = self.primary()?;
            let mut links = Vec::new();
            while self.at_punct(".") {
                let link_start = self.peek().span.start;
                let leading = Span::new(self.prev_end(), link_start);
                self.bump();
                let name = self.expect_ident()?;
                links.push(Link {
                    kind: LinkKind::Property(name),
                    optional: false,
                    span: Some(Span::new(link_start, self.prev_end())),
                    leading: Some(leading),
                });
            }
            if links.is_empty() {
                head
            } else {
                self.finish(
                    callee_start,
                    ExprKind::Chain(Chain {
                        head: Box::new(head),
                        links,
                    }),
                )
            }
        };

        let args = if self.at_punct("(") {
            Some(self.arguments()?)
        } else {
            None
        };
        Ok(self.finish(
            start,
            ExprKind::New {
                callee: Box::new(callee),
                args,
            },
        ))
    }

    fn arguments(&mut self) -> PResult<Vec<Expr>> {
        self.expect_punct("(")?;
        let mut args = Vec::new();
        while !self.at_punct(")") {
            args.push(self.element()?);
            if self.eat_punct(",").is_none() {
                break;
            }
        }
        self.expect_punct(")")?;
        Ok(args)
    }

    /// Argument or array element, possibly spread
    fn element(&mut self) -> PResult<Expr> {
        let start = self.peek().span.start;
        if self.eat_punct("...").is_some() {
            let inner = self.assignment()?;
            return Ok(self.finish(start, ExprKind::Spread(Box::new(inner))));
        }
        self.assignment()
    }

    fn primary(&mut self) -> PResult<Expr> {
        let start = self.peek().span.start;
        let token = self.peek().clone();

        match &token.kind {
            TokenKind::Ident => {
                let word = self.text(&token);
                match word {
                    "function" => self.function_expression(),
                    "async" if self.is_word(self.peek_at(1), "function") => {
                        self.function_expression()
                    }
                    "new" => self.new_expression(),
                    "class" => Err(self.error_here("class expressions are not supported")),
                    _ => {
                        self.bump();
                        let kind = match word {
                            "this" => ExprKind::This,
                            "true" => ExprKind::Bool(true),
                            "false" => ExprKind::Bool(false),
                            "null" => ExprKind::Null,
                            name => ExprKind::Ident(name.to_string()),
                        };
                        Ok(self.finish(start, kind))
                    }
                }
            }
            TokenKind::Str { value, quote } => {
                self.bump();
                Ok(self.finish(
                    start,
                    ExprKind::Str(StrLit {
                        value: value.clone(),
                        quote: *quote,
                    }),
                ))
            }
            TokenKind::Template { raw, cooked } => {
                self.bump();
                Ok(self.finish(
                    start,
                    ExprKind::Template(TemplateLit {
                        raw: raw.clone(),
                        cooked: cooked.clone(),
                    }),
                ))
            }
            TokenKind::Number => {
                self.bump();
                Ok(self.finish(start, ExprKind::Number(self.text(&token).to_string())))
            }
            TokenKind::Regex => {
                self.bump();
                Ok(self.finish(start, ExprKind::Regex(self.text(&token).to_string())))
            }
            TokenKind::Punct("(") => {
                self.bump();
                let inner = self.expression()?;
                self.expect_punct(")")?;
                Ok(self.finish(start, ExprKind::Paren(Box::new(inner))))
            }
            TokenKind::Punct("[") => self.array(),
            TokenKind::Punct("{") => self.object(),
            TokenKind::Eof => Err(self.error_here("unexpected end of input")),
            _ => Err(self.error_here("expected expression")),
        }
    }

    fn array(&mut self) -> PResult<Expr> {
        let start = self.peek().span.start;
        self.expect_punct("[")?;
        let mut elements = Vec::new();
        loop {
            if self.at_punct("]") {
                break;
            }
            if self.at_punct(",") {
                let at = self.peek().span.start;
                self.bump();
                elements.push(Expr::new(ExprKind::Elision, Span::new(at, at)));
                continue;
            }
            elements.push(self.element()?);
            if self.eat_punct(",").is_none() {
                break;
            }
        }
        self.expect_punct("]")?;
        Ok(self.finish(start, ExprKind::Array(elements)))
    }

    fn object(&mut self) -> PResult<Expr> {
        let start = self.peek().span.start;
        self.expect_punct("{")?;
        let mut properties = Vec::new();
        while !self.at_punct("}") {
            properties.push(self.property()?);
            if self.eat_punct(",").is_none() {
                break;
            }
        }
        self.expect_punct("}")?;
        Ok(self.finish(start, ExprKind::Object(properties)))
    }

    fn property(&mut self) -> PResult<Property> {
        let start = self.peek().span.start;

        if self.eat_punct("...").is_some() {
            let expr = self.assignment()?;
            return Ok(Property {
                kind: PropertyKind::Spread(expr),
                span: Some(Span::new(start, self.prev_end())),
            });
        }

        let mut is_async = false;
        let modifier = self.peek().clone();
        let next = self.peek_at(1);
        let plain_key = next.is_punct(":") || next.is_punct("(") || next.is_punct(",") || next.is_punct("}");
        if modifier.is_ident() && !plain_key && matches!(self.text(&modifier), "async" | "get" | "set") {
            is_async = self.text(&modifier) == "async";
            self.bump();
        }
        self.eat_punct("*");

        let key_token = self.peek().clone();
        let key = match &key_token.kind {
            TokenKind::Ident => {
                self.bump();
                PropKey::Ident(self.text(&key_token).to_string())
            }
            TokenKind::Str { value, quote } => {
                self.bump();
                PropKey::Str(StrLit {
                    value: value.clone(),
                    quote: *quote,
                })
            }
            TokenKind::Number => {
                self.bump();
                PropKey::Number(self.text(&key_token).to_string())
            }
            TokenKind::Punct("[") => {
                self.bump();
                let expr = self.assignment()?;
                self.expect_punct("]")?;
                PropKey::Computed(Box::new(expr))
            }
            _ => return Err(self.error_here("expected property name")),
        };

        let kind = if self.eat_punct(":").is_some() {
            PropertyKind::KeyValue {
                key,
                value: self.assignment()?,
            }
        } else if self.at_punct("(") {
            let params = self.parameter_list()?;
            let body = FunctionBody::Block(self.block_body()?);
            PropertyKind::Method {
                function: Function {
                    kind: FunctionKind::Method,
                    is_async,
                    name: key.name().map(str::to_string),
                    params,
                    parenthesized: true,
                    body,
                },
                key,
            }
        } else if let (PropKey::Ident(name), true) = (&key, self.at_punct(",") || self.at_punct("}")) {
            PropertyKind::Shorthand(name.clone())
        } else {
            return Err(self.error_here("expected ':' after property name"));
        };

        Ok(Property {
            kind,
            span: Some(Span::new(start, self.prev_end())),
        })
    }

    /// `( ... )` returned as the raw text between the parentheses
    fn parameter_list(&mut self) -> PResult<String> {
        if !self.at_punct("(") {
            return Err(self.error_here("expected '('"));
        }
        let open = self.pos;
        let close = self.matching_close(open)?;
        let params = self.source[self.tokens[open].span.end..self.tokens[close].span.start].to_string();
        self.pos = close + 1;
        Ok(params)
    }

    /// `{ ... }` kept as dedented text
    fn block_body(&mut self) -> PResult<Block> {
        if !self.at_punct("{") {
            return Err(self.error_here("expected '{'"));
        }
        let open = self.pos;
        let close = self.matching_close(open)?;
        let open_span = self.tokens[open].span;
        let close_span = self.tokens[close].span;
        self.pos = close + 1;
        Ok(Block {
            code: dedent(&self.source[open_span.end..close_span.start]),
            span: Some(open_span.to(close_span)),
        })
    }

    fn function_expression(&mut self) -> PResult<Expr> {
        let start = self.peek().span.start;
        let is_async = self.at_word("async");
        if is_async {
            self.bump();
        }
        self.bump();
        self.eat_punct("*");
        let name = if self.peek().is_ident() {
            Some(self.expect_ident()?)
        } else {
            None
        };
        let params = self.parameter_list()?;
        let body = FunctionBody::Block(self.block_body()?);
        Ok(self.finish(
            start,
            ExprKind::Function(Function {
                kind: FunctionKind::Expression,
                is_async,
                name,
                params,
                parenthesized: true,
                body,
            }),
        ))
    }

    /// Arrow function starting at the cursor, if there is one
    fn arrow_function(&mut self) -> PResult<Option<Expr>> {
        let start = self.peek().span.start;
        let after_async = self.peek_at(1);
        let is_async = self.at_word("async")
            && !after_async.newline_before
            && (after_async.is_punct("(")
                || (after_async.is_ident() && self.peek_at(2).is_punct("=>")));
        let offset = usize::from(is_async);

        let params_token = self.peek_at(offset).clone();
        let single = params_token.is_ident() && self.peek_at(offset + 1).is_punct("=>");
        let parenthesized = if params_token.is_punct("(") {
            let close = self.matching_close(self.pos + offset)?;
            self.tokens
                .get(close + 1)
                .map(|t| t.is_punct("=>") && !t.newline_before)
                .unwrap_or(false)
        } else {
            false
        };
        if !single && !parenthesized {
            return Ok(None);
        }

        if is_async {
            self.bump();
        }
        let params = if single {
            let token = self.bump();
            self.text(&token).to_string()
        } else {
            self.parameter_list()?
        };
        self.expect_punct("=>")?;

        let body = if self.at_punct("{") {
            FunctionBody::Block(self.block_body()?)
        } else {
            FunctionBody::Expr(Box::new(self.assignment()?))
        };

        Ok(Some(self.finish(
            start,
            ExprKind::Function(Function {
                kind: FunctionKind::Arrow,
                is_async,
                name: None,
                params,
                parenthesized,
                body,
            }),
        )))
    }
}
