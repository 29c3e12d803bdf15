// AST for screenshot spec files
// Covers the subset of JavaScript that spec files are written in. Every node
// parsed from source remembers the byte range it came from; nodes built or
// rewritten by tooling carry no span and are printed from scratch.

pub mod source_gen;
pub use source_gen::{print, SourceContext, ToSource};


use serde::{Deserialize, Serialize};

/// Variant name used by checkpoints called without a name
pub const DEFAULT_VARIANT: &str = "main";

/// Byte range into the original source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn slice<'s>(&self, source: &'s str) -> &'s str {
        &source[self.start..self.end]
    }

    /// Span covering both `self` and `other`
    pub fn to(&self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

/// A parsed specification file
#[derive(Debug, Clone, PartialEq)]
pub struct SpecFile {
    /// Original source text; untouched nodes are printed from it
    pub source: String,
    pub statements: Vec<Stmt>,
    /// Quote character most string literals in the file use
    pub quote: char,
}

impl SpecFile {
    /// Drop spans of every rewritten subtree so the printer regenerates them
    pub fn settle(&mut self) -> bool {
        let mut dirty = false;
        for stmt in &mut self.statements {
            dirty |= stmt.settle();
        }
        dirty
    }

    /// Build a string literal in the file's preferred quote style
    pub fn string_literal(&self, value: &str) -> Expr {
        Expr::synthesized(ExprKind::Str(StrLit {
            value: value.to_string(),
            quote: self.quote,
        }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// Imports, declarations and anything else tooling never looks into
    Opaque,
    Expr {
        expr: Expr,
        semicolon: bool,
    },
    VarDecl {
        exported: bool,
        keyword: String,
        name: String,
        init: Expr,
        semicolon: bool,
    },
    ExportDefault {
        expr: Expr,
        semicolon: bool,
    },
}

impl Stmt {
    pub fn expr(&self) -> Option<&Expr> {
        match &self.kind {
            StmtKind::Opaque => None,
            StmtKind::Expr { expr, .. }
            | StmtKind::VarDecl { init: expr, .. }
            | StmtKind::ExportDefault { expr, .. } => Some(expr),
        }
    }

    pub fn expr_mut(&mut self) -> Option<&mut Expr> {
        match &mut self.kind {
            StmtKind::Opaque => None,
            StmtKind::Expr { expr, .. }
            | StmtKind::VarDecl { init: expr, .. }
            | StmtKind::ExportDefault { expr, .. } => Some(expr),
        }
    }

    pub fn settle(&mut self) -> bool {
        self.expr_mut().map(Expr::settle).unwrap_or(false)
    }

    pub fn is_dirty(&self) -> bool {
        self.expr().map(|e| e.span.is_none()).unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Option<Span>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Ident(String),
    This,
    Str(StrLit),
    Template(TemplateLit),
    /// Numeric literal, kept as written
    Number(String),
    Bool(bool),
    Null,
    Regex(String),
    Array(Vec<Expr>),
    Object(Vec<Property>),
    Function(Function),
    New {
        callee: Box<Expr>,
        args: Option<Vec<Expr>>,
    },
    Chain(Chain),
    Unary {
        op: String,
        operand: Box<Expr>,
    },
    Await(Box<Expr>),
    Binary {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Paren(Box<Expr>),
    Spread(Box<Expr>),
    /// Hole in an array literal: `[a, , b]`
    Elision,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrLit {
    pub value: String,
    pub quote: char,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateLit {
    /// Text between the backticks, as written
    pub raw: String,
    /// Value of a template without substitutions
    pub cooked: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub kind: PropertyKind,
    pub span: Option<Span>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKind {
    KeyValue { key: PropKey, value: Expr },
    Shorthand(String),
    Method { key: PropKey, function: Function },
    Spread(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropKey {
    Ident(String),
    Str(StrLit),
    Number(String),
    Computed(Box<Expr>),
}

impl PropKey {
    /// Key name as a plain string, if it is statically known
    pub fn name(&self) -> Option<&str> {
        match self {
            PropKey::Ident(name) | PropKey::Number(name) => Some(name),
            PropKey::Str(lit) => Some(&lit.value),
            PropKey::Computed(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Arrow,
    Expression,
    Method,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub kind: FunctionKind,
    pub is_async: bool,
    pub name: Option<String>,
    /// Parameter list as written, without the surrounding parentheses
    pub params: String,
    /// Whether the parameter list was written with parentheses
    pub parenthesized: bool,
    pub body: FunctionBody,
}

impl Function {
    /// `async (param) => { code }`
    pub fn async_arrow(param: &str, code: &str) -> Self {
        Self {
            kind: FunctionKind::Arrow,
            is_async: true,
            name: None,
            params: param.to_string(),
            parenthesized: true,
            body: FunctionBody::Block(Block::synthesized(code)),
        }
    }

    /// Source of the body: dedented block contents or the expression body
    pub fn body_source(&self, original: &str) -> String {
        match &self.body {
            FunctionBody::Block(block) => block.code.clone(),
            FunctionBody::Expr(expr) => match expr.span {
                Some(span) => span.slice(original).to_string(),
                None => expr.to_source(&SourceContext::new(original)),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    Block(Block),
    Expr(Box<Expr>),
}

/// Function body block. Its statements are not parsed; only the dedented
/// code between the braces is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub code: String,
    pub span: Option<Span>,
}

impl Block {
    pub fn synthesized(code: &str) -> Self {
        Self {
            code: dedent(code),
            span: None,
        }
    }
}

/// Left-to-right postfix chain: `head.a(x).b[0].c`
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    pub head: Box<Expr>,
    pub links: Vec<Link>,
}

impl Chain {
    /// A builder expression: rooted at `new X(...)` with only method calls after it
    pub fn is_builder(&self) -> bool {
        matches!(self.head.kind, ExprKind::New { .. })
            && !self.links.is_empty()
            && self
                .links
                .iter()
                .all(|link| matches!(link.kind, LinkKind::Method { .. }))
    }

    /// Name of the constructed type, e.g. `ScreenshotTest`
    pub fn constructor_name(&self) -> Option<&str> {
        match &self.head.kind {
            ExprKind::New { callee, .. } => match &callee.kind {
                ExprKind::Ident(name) => Some(name),
                _ => None,
            },
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub kind: LinkKind,
    /// `?.` access
    pub optional: bool,
    pub span: Option<Span>,
    /// Whitespace and comments between the previous chain element and this link
    pub leading: Option<Span>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkKind {
    Property(String),
    Method {
        name: String,
        args: Vec<Expr>,
        role: CallRole,
    },
    Call(Vec<Expr>),
    Index(Box<Expr>),
}

/// What a method call in a builder chain does, resolved while parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallRole {
    Configure,
    BindInteraction,
    Checkpoint,
}

impl Link {
    /// A freshly built `.name(args)` link
    pub fn method(name: &str, args: Vec<Expr>, role: CallRole) -> Self {
        Self {
            kind: LinkKind::Method {
                name: name.to_string(),
                args,
                role,
            },
            optional: false,
            span: None,
            leading: None,
        }
    }

    pub fn method_name(&self) -> Option<&str> {
        match &self.kind {
            LinkKind::Method { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn role(&self) -> Option<CallRole> {
        match &self.kind {
            LinkKind::Method { role, .. } => Some(*role),
            _ => None,
        }
    }

    pub fn args(&self) -> &[Expr] {
        match &self.kind {
            LinkKind::Method { args, .. } | LinkKind::Call(args) => args,
            _ => &[],
        }
    }

    pub fn args_mut(&mut self) -> Option<&mut Vec<Expr>> {
        match &mut self.kind {
            LinkKind::Method { args, .. } | LinkKind::Call(args) => Some(args),
            _ => None,
        }
    }

    /// Variant closed by this link when it is a checkpoint.
    /// A missing or non-literal argument names the default variant.
    pub fn checkpoint_variant(&self) -> Option<&str> {
        match &self.kind {
            LinkKind::Method {
                role: CallRole::Checkpoint,
                args,
                ..
            } => Some(
                args.first()
                    .and_then(Expr::as_str_literal)
                    .unwrap_or(DEFAULT_VARIANT),
            ),
            _ => None,
        }
    }

    fn settle(&mut self) -> bool {
        let mut dirty = self.span.is_none();
        match &mut self.kind {
            LinkKind::Property(_) => {}
            LinkKind::Method { args, .. } | LinkKind::Call(args) => {
                for arg in args {
                    dirty |= arg.settle();
                }
            }
            LinkKind::Index(expr) => dirty |= expr.settle(),
        }
        if dirty {
            self.span = None;
        }
        dirty
    }
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self {
            kind,
            span: Some(span),
        }
    }

    /// Node created by tooling; always printed from scratch
    pub fn synthesized(kind: ExprKind) -> Self {
        Self { kind, span: None }
    }

    /// Value of a string literal or substitution-free template
    pub fn as_str_literal(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Str(lit) => Some(&lit.value),
            ExprKind::Template(TemplateLit {
                cooked: Some(value),
                ..
            }) => Some(value),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match &self.kind {
            ExprKind::Function(function) => Some(function),
            ExprKind::Paren(inner) => inner.as_function(),
            _ => None,
        }
    }

    pub fn as_chain(&self) -> Option<&Chain> {
        match &self.kind {
            ExprKind::Chain(chain) => Some(chain),
            _ => None,
        }
    }

    pub fn as_chain_mut(&mut self) -> Option<&mut Chain> {
        match &mut self.kind {
            ExprKind::Chain(chain) => Some(chain),
            _ => None,
        }
    }

    pub fn is_builder_chain(&self) -> bool {
        self.as_chain().map(Chain::is_builder).unwrap_or(false)
    }

    /// Visit direct child expressions in source order
    pub fn for_each_child<'a>(&'a self, f: &mut dyn FnMut(&'a Expr)) {
        match &self.kind {
            ExprKind::Ident(_)
            | ExprKind::This
            | ExprKind::Str(_)
            | ExprKind::Template(_)
            | ExprKind::Number(_)
            | ExprKind::Bool(_)
            | ExprKind::Null
            | ExprKind::Regex(_)
            | ExprKind::Elision => {}
            ExprKind::Array(elements) => elements.iter().for_each(|e| f(e)),
            ExprKind::Object(properties) => {
                for property in properties {
                    match &property.kind {
                        PropertyKind::KeyValue { key, value } => {
                            if let PropKey::Computed(expr) = key {
                                f(expr);
                            }
                            f(value);
                        }
                        PropertyKind::Method { function, .. } => {
                            if let FunctionBody::Expr(expr) = &function.body {
                                f(expr);
                            }
                        }
                        PropertyKind::Spread(expr) => f(expr),
                        PropertyKind::Shorthand(_) => {}
                    }
                }
            }
            ExprKind::Function(function) => {
                if let FunctionBody::Expr(expr) = &function.body {
                    f(expr);
                }
            }
            ExprKind::New { callee, args } => {
                f(callee);
                if let Some(args) = args {
                    args.iter().for_each(|e| f(e));
                }
            }
            ExprKind::Chain(chain) => {
                f(&chain.head);
                for link in &chain.links {
                    match &link.kind {
                        LinkKind::Property(_) => {}
                        LinkKind::Method { args, .. } | LinkKind::Call(args) => {
                            args.iter().for_each(|e| f(e))
                        }
                        LinkKind::Index(expr) => f(expr),
                    }
                }
            }
            ExprKind::Unary { operand, .. } => f(operand),
            ExprKind::Await(inner) | ExprKind::Paren(inner) | ExprKind::Spread(inner) => f(inner),
            ExprKind::Binary { left, right, .. } => {
                f(left);
                f(right);
            }
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                f(test);
                f(consequent);
                f(alternate);
            }
        }
    }

    /// Mutable counterpart of [`Expr::for_each_child`], same order
    pub fn for_each_child_mut(&mut self, f: &mut dyn FnMut(&mut Expr)) {
        match &mut self.kind {
            ExprKind::Ident(_)
            | ExprKind::This
            | ExprKind::Str(_)
            | ExprKind::Template(_)
            | ExprKind::Number(_)
            | ExprKind::Bool(_)
            | ExprKind::Null
            | ExprKind::Regex(_)
            | ExprKind::Elision => {}
            ExprKind::Array(elements) => elements.iter_mut().for_each(|e| f(e)),
            ExprKind::Object(properties) => {
                for property in properties {
                    match &mut property.kind {
                        PropertyKind::KeyValue { key, value } => {
                            if let PropKey::Computed(expr) = key {
                                f(expr);
                            }
                            f(value);
                        }
                        PropertyKind::Method { function, .. } => {
                            if let FunctionBody::Expr(expr) = &mut function.body {
                                f(expr);
                            }
                        }
                        PropertyKind::Spread(expr) => f(expr),
                        PropertyKind::Shorthand(_) => {}
                    }
                }
            }
            ExprKind::Function(function) => {
                if let FunctionBody::Expr(expr) = &mut function.body {
                    f(expr);
                }
            }
            ExprKind::New { callee, args } => {
                f(callee);
                if let Some(args) = args {
                    args.iter_mut().for_each(|e| f(e));
                }
            }
            ExprKind::Chain(chain) => {
                f(&mut chain.head);
                for link in &mut chain.links {
                    match &mut link.kind {
                        LinkKind::Property(_) => {}
                        LinkKind::Method { args, .. } | LinkKind::Call(args) => {
                            args.iter_mut().for_each(|e| f(e))
                        }
                        LinkKind::Index(expr) => f(expr),
                    }
                }
            }
            ExprKind::Unary { operand, .. } => f(operand),
            ExprKind::Await(inner) | ExprKind::Paren(inner) | ExprKind::Spread(inner) => f(inner),
            ExprKind::Binary { left, right, .. } => {
                f(left);
                f(right);
            }
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                f(test);
                f(consequent);
                f(alternate);
            }
        }
    }

    /// Drop the span of this node if anything below it was rewritten.
    /// Returns true when the node has to be regenerated by the printer.
    pub fn settle(&mut self) -> bool {
        let mut dirty = self.span.is_none();
        match &mut self.kind {
            ExprKind::Chain(chain) => {
                dirty |= chain.head.settle();
                for link in &mut chain.links {
                    dirty |= link.settle();
                }
            }
            ExprKind::Function(function) => {
                dirty |= settle_function(function);
            }
            ExprKind::Object(properties) => {
                for property in properties {
                    let mut property_dirty = property.span.is_none();
                    match &mut property.kind {
                        PropertyKind::KeyValue { key, value } => {
                            if let PropKey::Computed(expr) = key {
                                property_dirty |= expr.settle();
                            }
                            property_dirty |= value.settle();
                        }
                        PropertyKind::Method { function, .. } => {
                            property_dirty |= settle_function(function);
                        }
                        PropertyKind::Spread(expr) => property_dirty |= expr.settle(),
                        PropertyKind::Shorthand(_) => {}
                    }
                    if property_dirty {
                        property.span = None;
                    }
                    dirty |= property_dirty;
                }
            }
            _ => self.for_each_child_mut(&mut |child| dirty |= child.settle()),
        }
        if dirty {
            self.span = None;
        }
        dirty
    }
}

fn settle_function(function: &mut Function) -> bool {
    match &mut function.body {
        FunctionBody::Block(block) => block.span.is_none(),
        FunctionBody::Expr(expr) => expr.settle(),
    }
}

/// Strip the indentation shared by all non-blank lines and trim blank
/// lines at both ends.
pub fn dedent(code: &str) -> String {
    let lines: Vec<&str> = code.lines().collect();
    let first = lines.iter().position(|l| !l.trim().is_empty());
    let last = lines.iter().rposition(|l| !l.trim().is_empty());
    let (first, last) = match (first, last) {
        (Some(first), Some(last)) => (first, last),
        _ => return String::new(),
    };
    let body = &lines[first..=last];

    let common = body
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    body.iter()
        .map(|l| {
            if l.trim().is_empty() {
                ""
            } else {
                l.get(common..).unwrap_or_else(|| l.trim_start()).trim_end()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Leading whitespace of the line containing `offset`
pub fn line_indent(source: &str, offset: usize) -> &str {
    let line_start = source[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line = &source[line_start..];
    let indent_len = line.len() - line.trim_start_matches([' ', '\t']).len();
    &line[..indent_len]
}
