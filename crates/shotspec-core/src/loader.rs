/*!
# Spec Loader

Replays the builder expressions of a spec file against [`ScreenshotTest`]
builders handed out by a [`Harness`]. Whether checkpoints register test cases
or record snapshots is decided by the harness, not by the loader.

- Configuration calls map to builder setters by method name. Their arguments
  must be literals (strings, numbers, booleans, `null`, arrays and plain
  objects of those) and are converted to JSON values first.
- A function passed to an interaction binding becomes a script interaction
  holding the function's body source.
- A checkpoint finalizes the variant named by its string argument.
*/

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::ast::{Expr, ExprKind, Link, PropertyKind, SpecFile};
use crate::builder::page::{ColorScheme, Interaction};
use crate::builder::{BuilderError, PageState, ScreenshotTest, WaitFor};
use crate::chain::{interaction_source, ChainEvent, ChainVisitor, ChainWalker, WalkContext};
use crate::config::Vocabulary;
use crate::parser::{create_parser, ParseError, Parser};
use crate::Harness;

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("Failed to read spec file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Line {line}: {source}")]
    Builder {
        line: usize,
        #[source]
        source: BuilderError,
    },

    #[error("Line {line}: unknown builder method '{method}'")]
    UnknownMethod { method: String, line: usize },

    #[error("Line {line}: argument {index} of '{method}' is not a literal")]
    NonLiteralArgument {
        method: String,
        index: usize,
        line: usize,
    },

    #[error("Line {line}: '{method}' takes {expected} argument(s), got {got}")]
    Arity {
        method: String,
        expected: &'static str,
        got: usize,
        line: usize,
    },

    #[error("Line {line}: invalid argument for '{method}': {message}")]
    InvalidArgument {
        method: String,
        message: String,
        line: usize,
    },
}

/// What a load did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    /// Builder expressions replayed
    pub expressions: usize,
    /// Checkpoints finalized
    pub checkpoints: usize,
    /// Test cases registered (execute mode)
    pub test_cases: usize,
    /// Variant snapshots recorded (introspection mode)
    pub snapshots: usize,
}

/// Loads spec files into a harness
pub struct SpecLoader {
    parser: Box<dyn Parser>,
}

impl Default for SpecLoader {
    fn default() -> Self {
        Self::new(Vocabulary::default())
    }
}

impl SpecLoader {
    pub fn new(vocabulary: Vocabulary) -> Self {
        Self {
            parser: create_parser(vocabulary),
        }
    }

    pub fn load_file(&mut self, path: &Path, harness: &mut Harness) -> Result<LoadSummary, LoadError> {
        let source = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let summary = self.load_source(&source, harness)?;
        tracing::info!(
            path = %path.display(),
            expressions = summary.expressions,
            checkpoints = summary.checkpoints,
            "Loaded spec file"
        );
        Ok(summary)
    }

    pub fn load_source(&mut self, source: &str, harness: &mut Harness) -> Result<LoadSummary, LoadError> {
        let file = self.parser.parse(source)?;
        let cases_before = harness.registrar().len();
        let snapshots_before = harness.sink().len();

        let mut replay = Replay {
            file: &file,
            harness: &mut *harness,
            builder: None,
            summary: LoadSummary::default(),
        };
        ChainWalker::walk(&file, &mut replay)?;

        let mut summary = replay.summary;
        summary.test_cases = harness.registrar().len() - cases_before;
        summary.snapshots = harness.sink().len() - snapshots_before;
        tracing::debug!(?summary, "Replayed spec file");
        Ok(summary)
    }
}

struct Replay<'f, 'h> {
    file: &'f SpecFile,
    harness: &'h mut Harness,
    builder: Option<ScreenshotTest>,
    summary: LoadSummary,
}

impl<'a, 'f, 'h> ChainVisitor<'a> for Replay<'f, 'h> {
    type Error = LoadError;

    fn visit(&mut self, event: ChainEvent<'a>, _ctx: &WalkContext<'a>) -> Result<(), LoadError> {
        match event {
            ChainEvent::Construct { .. } => {
                self.builder = Some(self.harness.builder());
                self.summary.expressions += 1;
            }
            ChainEvent::Configure { link, name } => {
                let call = Call::new(self.file, link, name)?;
                self.update(|builder| configure(builder, &call))?;
            }
            ChainEvent::BindInteraction { interaction, .. } => {
                // Helper references replay by their source text, as the extractors report them
                let interaction =
                    interaction.map(|expr| Interaction::script(interaction_source(expr, &self.file.source)));
                self.update(|builder| Ok(builder.set_page_interaction(interaction)))?;
            }
            ChainEvent::Checkpoint { link, .. } => {
                let line = line_of(&self.file.source, link);
                let variant = link.args().first().and_then(Expr::as_str_literal);
                if let Some(builder) = self.builder.take() {
                    let builder = builder
                        .finalize(self.harness, variant)
                        .map_err(|source| LoadError::Builder { line, source })?;
                    self.builder = Some(builder);
                }
                self.summary.checkpoints += 1;
            }
        }
        Ok(())
    }
}

impl Replay<'_, '_> {
    fn update<F>(&mut self, f: F) -> Result<(), LoadError>
    where
        F: FnOnce(ScreenshotTest) -> Result<ScreenshotTest, LoadError>,
    {
        if let Some(builder) = self.builder.take() {
            self.builder = Some(f(builder)?);
        }
        Ok(())
    }
}

/// A configuration call with its arguments converted to JSON
struct Call<'a> {
    method: &'a str,
    args: Vec<Value>,
    line: usize,
}

impl<'a> Call<'a> {
    fn new(file: &SpecFile, link: &Link, method: &'a str) -> Result<Self, LoadError> {
        let line = line_of(&file.source, link);
        let args = link
            .args()
            .iter()
            .enumerate()
            .map(|(index, arg)| {
                literal(arg).ok_or_else(|| LoadError::NonLiteralArgument {
                    method: method.to_string(),
                    index,
                    line,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { method, args, line })
    }

    fn arity(&self, min: usize, max: usize, expected: &'static str) -> Result<(), LoadError> {
        if self.args.len() < min || self.args.len() > max {
            return Err(LoadError::Arity {
                method: self.method.to_string(),
                expected,
                got: self.args.len(),
                line: self.line,
            });
        }
        Ok(())
    }

    fn invalid(&self, message: impl ToString) -> LoadError {
        LoadError::InvalidArgument {
            method: self.method.to_string(),
            message: message.to_string(),
            line: self.line,
        }
    }

    fn arg<T: DeserializeOwned>(&self, index: usize) -> Result<T, LoadError> {
        let value = self.args.get(index).cloned().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|err| self.invalid(err))
    }

    /// Optional argument; missing and `null` are `None`
    fn opt_arg<T: DeserializeOwned>(&self, index: usize) -> Result<Option<T>, LoadError> {
        match self.args.get(index) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.arg(index).map(Some),
        }
    }
}

fn configure(builder: ScreenshotTest, call: &Call) -> Result<ScreenshotTest, LoadError> {
    let builder = match call.method {
        "only" => {
            call.arity(0, 0, "no")?;
            builder.only()
        }
        "forPage" => {
            call.arity(1, 2, "1 or 2")?;
            let route: String = call.arg(0)?;
            let view_name: Option<String> = call.opt_arg(1)?;
            builder.for_page(&route, view_name.as_deref())
        }
        "forElement" => {
            call.arity(1, 1, "1")?;
            builder.for_element(&call.arg::<String>(0)?)
        }
        "forWidget" => {
            call.arity(1, 1, "1")?;
            builder.for_widget(&call.arg::<String>(0)?)
        }
        "withWidgetProps" => {
            call.arity(1, 1, "1")?;
            builder.with_widget_props(call.arg::<Map<String, Value>>(0)?)
        }
        "forViewports" => {
            call.arity(1, 1, "1")?;
            builder.for_viewports(call.arg::<Vec<String>>(0)?)
        }
        "forColorSchemes" => {
            call.arity(1, 1, "1")?;
            builder.for_color_schemes(call.arg::<Vec<ColorScheme>>(0)?)
        }
        "withPageQuery" => {
            call.arity(1, 1, "1")?;
            builder.with_page_query(call.opt_arg::<Map<String, Value>>(0)?)
        }
        "withRouteMock" => {
            call.arity(2, 3, "2 or 3")?;
            let endpoint: String = call.arg(0)?;
            let content_type: Option<String> = call.opt_arg(2)?;
            builder.with_route_mock(&endpoint, call.args[1].clone(), content_type.as_deref())
        }
        "withWaitFor" => {
            call.arity(1, 1, "1")?;
            builder.with_wait_for(call.arg::<Vec<WaitFor>>(0)?)
        }
        "setPageState" | "setWidgetState" => {
            call.arity(1, 1, "1")?;
            let state: String = call.arg(0)?;
            let state: PageState = state.parse().map_err(|err| call.invalid(err))?;
            builder.set_page_state(state)
        }
        "withTitle" => {
            call.arity(1, 1, "1")?;
            builder.with_title(&call.arg::<String>(0)?)
        }
        other => {
            return Err(LoadError::UnknownMethod {
                method: other.to_string(),
                line: call.line,
            })
        }
    };
    Ok(builder)
}

/// JSON value of a literal expression; `None` for anything computed
fn literal(expr: &Expr) -> Option<Value> {
    match &expr.kind {
        ExprKind::Str(_) | ExprKind::Template(_) => expr.as_str_literal().map(|s| Value::String(s.to_string())),
        ExprKind::Number(text) => number(text).map(Value::Number),
        ExprKind::Bool(value) => Some(Value::Bool(*value)),
        ExprKind::Null => Some(Value::Null),
        ExprKind::Ident(name) if name == "undefined" => Some(Value::Null),
        ExprKind::Paren(inner) => literal(inner),
        ExprKind::Unary { op, operand } if op == "-" => match &operand.kind {
            ExprKind::Number(text) => number(&format!("-{text}")).map(Value::Number),
            _ => None,
        },
        ExprKind::Array(items) => items
            .iter()
            .map(|item| match item.kind {
                ExprKind::Elision => Some(Value::Null),
                _ => literal(item),
            })
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
        ExprKind::Object(properties) => {
            let mut map = Map::new();
            for property in properties {
                match &property.kind {
                    PropertyKind::KeyValue { key, value } => {
                        map.insert(key.name()?.to_string(), literal(value)?);
                    }
                    _ => return None,
                }
            }
            Some(Value::Object(map))
        }
        _ => None,
    }
}

fn number(text: &str) -> Option<Number> {
    let text = text.replace('_', "");
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.as_str()),
    };
    let radix = match digits.get(..2) {
        Some("0x") | Some("0X") => Some(16),
        Some("0o") | Some("0O") => Some(8),
        Some("0b") | Some("0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        let value = i64::from_str_radix(&digits[2..], radix).ok()?;
        return Some(Number::from(if negative { -value } else { value }));
    }
    if let Ok(value) = text.parse::<i64>() {
        return Some(Number::from(value));
    }
    text.parse::<f64>().ok().and_then(Number::from_f64)
}

fn line_of(source: &str, link: &Link) -> usize {
    let offset = link.span.map(|span| span.start).unwrap_or(0).min(source.len());
    source[..offset].matches('\n').count() + 1
}
