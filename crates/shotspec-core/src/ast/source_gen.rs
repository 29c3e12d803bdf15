// Source code generation from the spec-file AST
// Untouched nodes are copied from the original text byte for byte; only
// nodes whose span was dropped by `settle` are generated here.

use super::*;

/// Printing context: the original text plus the indentation of the line the
/// generated code starts on
#[derive(Debug, Clone)]
pub struct SourceContext<'s> {
    pub original: &'s str,
    pub indent: String,
}

impl<'s> SourceContext<'s> {
    pub fn new(original: &'s str) -> Self {
        Self {
            original,
            indent: String::new(),
        }
    }

    pub fn with_indent(&self, indent: &str) -> Self {
        Self {
            original: self.original,
            indent: indent.to_string(),
        }
    }
}

/// Trait for AST nodes that can produce their source text
pub trait ToSource {
    fn to_source(&self, ctx: &SourceContext<'_>) -> String;
}

/// Print a whole file. Text between statements is kept verbatim, clean
/// statements are sliced from the original, dirty ones are regenerated.
pub fn print(file: &SpecFile) -> String {
    let original = file.source.as_str();
    let mut out = String::with_capacity(original.len() + 64);
    let mut cursor = 0;

    for stmt in &file.statements {
        out.push_str(&original[cursor..stmt.span.start]);
        let ctx = SourceContext::new(original).with_indent(line_indent(original, stmt.span.start));
        out.push_str(&stmt.to_source(&ctx));
        cursor = stmt.span.end;
    }
    out.push_str(&original[cursor..]);
    out
}

impl ToSource for Stmt {
    fn to_source(&self, ctx: &SourceContext<'_>) -> String {
        if !self.is_dirty() {
            return self.span.slice(ctx.original).to_string();
        }
        let terminator = |semicolon: bool| if semicolon { ";" } else { "" };
        match &self.kind {
            StmtKind::Opaque => self.span.slice(ctx.original).to_string(),
            StmtKind::Expr { expr, semicolon } => {
                format!("{}{}", expr.to_source(ctx), terminator(*semicolon))
            }
            StmtKind::VarDecl {
                exported,
                keyword,
                name,
                init,
                semicolon,
            } => format!(
                "{}{keyword} {name} = {}{}",
                if *exported { "export " } else { "" },
                init.to_source(ctx),
                terminator(*semicolon)
            ),
            StmtKind::ExportDefault { expr, semicolon } => format!(
                "export default {}{}",
                expr.to_source(ctx),
                terminator(*semicolon)
            ),
        }
    }
}

impl ToSource for Expr {
    fn to_source(&self, ctx: &SourceContext<'_>) -> String {
        if let Some(span) = self.span {
            return span.slice(ctx.original).to_string();
        }
        match &self.kind {
            ExprKind::Ident(name) => name.clone(),
            ExprKind::This => "this".to_string(),
            ExprKind::Str(lit) => quote_string(&lit.value, lit.quote),
            ExprKind::Template(template) => format!("`{}`", template.raw),
            ExprKind::Number(raw) | ExprKind::Regex(raw) => raw.clone(),
            ExprKind::Bool(value) => value.to_string(),
            ExprKind::Null => "null".to_string(),
            ExprKind::Elision => String::new(),
            ExprKind::Array(elements) => format!("[{}]", join_exprs(elements, ctx)),
            ExprKind::Object(properties) => {
                if properties.is_empty() {
                    "{}".to_string()
                } else {
                    let props = properties
                        .iter()
                        .map(|p| p.to_source(ctx))
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!("{{ {props} }}")
                }
            }
            ExprKind::Function(function) => function.to_source(ctx),
            ExprKind::New { callee, args } => match args {
                Some(args) => format!("new {}({})", callee.to_source(ctx), join_exprs(args, ctx)),
                None => format!("new {}", callee.to_source(ctx)),
            },
            ExprKind::Chain(chain) => chain.to_source(ctx),
            ExprKind::Unary { op, operand } => {
                if op.chars().all(|c| c.is_ascii_alphabetic()) {
                    format!("{op} {}", operand.to_source(ctx))
                } else {
                    format!("{op}{}", operand.to_source(ctx))
                }
            }
            ExprKind::Await(inner) => format!("await {}", inner.to_source(ctx)),
            ExprKind::Binary { op, left, right } => {
                format!("{} {op} {}", left.to_source(ctx), right.to_source(ctx))
            }
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => format!(
                "{} ? {} : {}",
                test.to_source(ctx),
                consequent.to_source(ctx),
                alternate.to_source(ctx)
            ),
            ExprKind::Paren(inner) => format!("({})", inner.to_source(ctx)),
            ExprKind::Spread(inner) => format!("...{}", inner.to_source(ctx)),
        }
    }
}

impl ToSource for Chain {
    fn to_source(&self, ctx: &SourceContext<'_>) -> String {
        let original = ctx.original;
        let mut out = self.head.to_source(ctx);

        // Indentation of existing multi-line links wins over the default
        let existing_indent = self.links.iter().find_map(|link| {
            let leading = link.leading?.slice(original);
            let (_, tail) = leading.rsplit_once('\n')?;
            tail.chars().all(char::is_whitespace).then(|| tail.to_string())
        });
        let multiline = existing_indent.is_some() || self.links.iter().all(|l| l.leading.is_none());
        let link_indent = existing_indent.unwrap_or_else(|| format!("{}  ", ctx.indent));
        // Links sharing the head's line indent their blocks from the statement
        let link_ctx = if multiline {
            ctx.with_indent(&link_indent)
        } else {
            ctx.clone()
        };

        for link in &self.links {
            match link.leading {
                Some(leading) => out.push_str(leading.slice(original)),
                None if multiline => {
                    out.push('\n');
                    out.push_str(&link_indent);
                }
                None => {}
            }
            out.push_str(&link.to_source(&link_ctx));
        }
        out
    }
}

impl ToSource for Link {
    fn to_source(&self, ctx: &SourceContext<'_>) -> String {
        if let Some(span) = self.span {
            return span.slice(ctx.original).to_string();
        }
        let dot = if self.optional { "?." } else { "." };
        match &self.kind {
            LinkKind::Property(name) => format!("{dot}{name}"),
            LinkKind::Method { name, args, .. } => {
                format!("{dot}{name}({})", join_exprs(args, ctx))
            }
            LinkKind::Call(args) => {
                let call_dot = if self.optional { "?." } else { "" };
                format!("{call_dot}({})", join_exprs(args, ctx))
            }
            LinkKind::Index(index) => {
                let index_dot = if self.optional { "?." } else { "" };
                format!("{index_dot}[{}]", index.to_source(ctx))
            }
        }
    }
}

impl ToSource for Property {
    fn to_source(&self, ctx: &SourceContext<'_>) -> String {
        if let Some(span) = self.span {
            return span.slice(ctx.original).to_string();
        }
        match &self.kind {
            PropertyKind::KeyValue { key, value } => {
                format!("{}: {}", key.to_source(ctx), value.to_source(ctx))
            }
            PropertyKind::Shorthand(name) => name.clone(),
            PropertyKind::Method { key, function } => {
                let prefix = if function.is_async { "async " } else { "" };
                format!(
                    "{prefix}{}({}) {}",
                    key.to_source(ctx),
                    function.params,
                    body_source(&function.body, ctx)
                )
            }
            PropertyKind::Spread(expr) => format!("...{}", expr.to_source(ctx)),
        }
    }
}

impl ToSource for PropKey {
    fn to_source(&self, ctx: &SourceContext<'_>) -> String {
        match self {
            PropKey::Ident(name) | PropKey::Number(name) => name.clone(),
            PropKey::Str(lit) => quote_string(&lit.value, lit.quote),
            PropKey::Computed(expr) => format!("[{}]", expr.to_source(ctx)),
        }
    }
}

impl ToSource for Function {
    fn to_source(&self, ctx: &SourceContext<'_>) -> String {
        let prefix = if self.is_async { "async " } else { "" };
        let body = body_source(&self.body, ctx);
        match self.kind {
            FunctionKind::Arrow => {
                if self.parenthesized {
                    format!("{prefix}({}) => {body}", self.params)
                } else {
                    format!("{prefix}{} => {body}", self.params)
                }
            }
            FunctionKind::Expression => {
                let name = self.name.as_deref().map(|n| format!(" {n}")).unwrap_or_default();
                format!("{prefix}function{name}({}) {body}", self.params)
            }
            FunctionKind::Method => {
                let name = self.name.as_deref().unwrap_or_default();
                format!("{prefix}{name}({}) {body}", self.params)
            }
        }
    }
}

fn body_source(body: &FunctionBody, ctx: &SourceContext<'_>) -> String {
    match body {
        FunctionBody::Expr(expr) => expr.to_source(ctx),
        FunctionBody::Block(block) => match block.span {
            Some(span) => span.slice(ctx.original).to_string(),
            None => block_source(&block.code, &ctx.indent),
        },
    }
}

/// `{`, the code indented one level deeper than `indent`, then `}` at `indent`
fn block_source(code: &str, indent: &str) -> String {
    if code.trim().is_empty() {
        return "{}".to_string();
    }
    let mut out = String::from("{\n");
    for line in code.lines() {
        if !line.trim().is_empty() {
            out.push_str(indent);
            out.push_str("  ");
            out.push_str(line);
        }
        out.push('\n');
    }
    out.push_str(indent);
    out.push('}');
    out
}

fn join_exprs(exprs: &[Expr], ctx: &SourceContext<'_>) -> String {
    exprs
        .iter()
        .map(|e| e.to_source(ctx))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Quote `value` as a JavaScript string literal
pub fn quote_string(value: &str, quote: char) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push(quote);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}
