//! Builder-chain traversal
//!
//! A builder expression is a chain rooted at `new X(...)` whose every link is
//! a method call. The walker visits builder expressions in source order and
//! reports each call as a [`ChainEvent`], together with the variant the call
//! contributes to: the one closed by the nearest checkpoint to its right.
//! Extraction and patching are built as visitors on top of it.

use crate::ast::{CallRole, Chain, Expr, Link, LinkKind, Span, SpecFile, DEFAULT_VARIANT};

pub mod interactions;
pub mod patcher;
pub mod recording;
pub mod variants;


pub use interactions::{extract_interaction, extract_interactions, interaction_source};
pub use patcher::{ChainPatcher, PatchError, PatchOutcome, PatchResult};
pub use recording::extract_recorded_steps;
pub use variants::extract_variants;

/// One call in a builder expression, classified by role
#[derive(Debug, Clone, Copy)]
pub enum ChainEvent<'a> {
    /// The `new X(...)` root of a builder expression
    Construct { chain: &'a Chain },
    /// Any configuration call that is neither a binding nor a checkpoint
    Configure { link: &'a Link, name: &'a str },
    /// Interaction binding; `interaction` is `None` when called without argument
    BindInteraction {
        link: &'a Link,
        interaction: Option<&'a Expr>,
    },
    /// Checkpoint closing `variant`
    Checkpoint { link: &'a Link, variant: &'a str },
}

/// Position of an event within the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkContext<'a> {
    /// Ordinal of the builder expression in the file
    pub expression: usize,
    /// Index of the top-level statement holding the expression
    pub statement: usize,
    /// Index of the link; `None` for the construct event
    pub link: Option<usize>,
    /// Variant closed by the nearest checkpoint at or after this call
    pub variant: Option<&'a str>,
}

/// Location of a builder expression handed to mutate-mode callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainSite {
    pub expression: usize,
    pub statement: usize,
}

/// Receives builder-chain events in source order
pub trait ChainVisitor<'a> {
    type Error;

    /// Handle one event. Returning an error stops the walk.
    fn visit(&mut self, event: ChainEvent<'a>, ctx: &WalkContext<'a>) -> Result<(), Self::Error>;
}

/// Traverses every builder expression of a spec file
pub struct ChainWalker;

impl ChainWalker {
    /// Visit all builder expressions, pre-order over the statement list.
    /// Function body blocks are not searched.
    pub fn walk<'a, V: ChainVisitor<'a>>(file: &'a SpecFile, visitor: &mut V) -> Result<(), V::Error> {
        let mut next_expression = 0;
        for (statement, stmt) in file.statements.iter().enumerate() {
            if let Some(expr) = stmt.expr() {
                walk_expr(expr, statement, &mut next_expression, visitor)?;
            }
        }
        tracing::debug!(expressions = next_expression, "Walked builder expressions");
        Ok(())
    }

    /// Mutate mode: same order and expression ids as [`ChainWalker::walk`],
    /// with mutable access to each builder chain
    pub fn for_each_chain_mut<E, F>(file: &mut SpecFile, mut f: F) -> Result<(), E>
    where
        F: FnMut(&mut Chain, ChainSite) -> Result<(), E>,
    {
        let mut next_expression = 0;
        for (statement, stmt) in file.statements.iter_mut().enumerate() {
            if let Some(expr) = stmt.expr_mut() {
                walk_expr_mut(expr, statement, &mut next_expression, &mut f)?;
            }
        }
        Ok(())
    }

    /// Number of builder expressions in the file
    pub fn count(file: &SpecFile) -> usize {
        struct Counter(usize);
        impl<'a> ChainVisitor<'a> for Counter {
            type Error = std::convert::Infallible;
            fn visit(&mut self, event: ChainEvent<'a>, _: &WalkContext<'a>) -> Result<(), Self::Error> {
                if let ChainEvent::Construct { .. } = event {
                    self.0 += 1;
                }
                Ok(())
            }
        }
        let mut counter = Counter(0);
        match Self::walk(file, &mut counter) {
            Ok(()) => counter.0,
            Err(never) => match never {},
        }
    }
}

/// Variant each link contributes to, computed right to left
pub fn closing_variants(chain: &Chain) -> Vec<Option<&str>> {
    let mut current = None;
    let mut closing = vec![None; chain.links.len()];
    for (index, link) in chain.links.iter().enumerate().rev() {
        if let Some(variant) = link.checkpoint_variant() {
            current = Some(variant);
        }
        closing[index] = current;
    }
    closing
}

fn walk_expr<'a, V: ChainVisitor<'a>>(
    expr: &'a Expr,
    statement: usize,
    next_expression: &mut usize,
    visitor: &mut V,
) -> Result<(), V::Error> {
    if let Some(chain) = expr.as_chain().filter(|c| c.is_builder()) {
        let expression = *next_expression;
        *next_expression += 1;
        emit_chain(chain, expression, statement, visitor)?;
    }

    let mut result = Ok(());
    expr.for_each_child(&mut |child| {
        if result.is_ok() {
            result = walk_expr(child, statement, next_expression, &mut *visitor);
        }
    });
    result
}

fn emit_chain<'a, V: ChainVisitor<'a>>(
    chain: &'a Chain,
    expression: usize,
    statement: usize,
    visitor: &mut V,
) -> Result<(), V::Error> {
    let closing = closing_variants(chain);
    let construct_ctx = WalkContext {
        expression,
        statement,
        link: None,
        variant: closing.first().copied().flatten(),
    };
    visitor.visit(ChainEvent::Construct { chain }, &construct_ctx)?;

    for (index, link) in chain.links.iter().enumerate() {
        let LinkKind::Method { name, args, role } = &link.kind else {
            continue;
        };
        let ctx = WalkContext {
            expression,
            statement,
            link: Some(index),
            variant: closing[index],
        };
        let event = match role {
            CallRole::Configure => ChainEvent::Configure { link, name },
            CallRole::BindInteraction => ChainEvent::BindInteraction {
                link,
                interaction: args.first(),
            },
            CallRole::Checkpoint => ChainEvent::Checkpoint {
                link,
                variant: closing[index].unwrap_or(DEFAULT_VARIANT),
            },
        };
        visitor.visit(event, &ctx)?;
    }
    Ok(())
}

fn link_spans(chain: &Chain) -> Vec<Option<Span>> {
    chain.links.iter().map(|link| link.span).collect()
}

fn walk_expr_mut<E, F>(
    expr: &mut Expr,
    statement: usize,
    next_expression: &mut usize,
    f: &mut F,
) -> Result<(), E>
where
    F: FnMut(&mut Chain, ChainSite) -> Result<(), E>,
{
    let relinked = match expr.as_chain_mut().filter(|c| c.is_builder()) {
        Some(chain) => {
            let site = ChainSite {
                expression: *next_expression,
                statement,
            };
            *next_expression += 1;
            let before = link_spans(chain);
            f(chain, site)?;
            link_spans(chain) != before
        }
        None => false,
    };
    // A chain whose link list changed is regenerated
    if relinked {
        expr.span = None;
    }

    let mut result = Ok(());
    expr.for_each_child_mut(&mut |child| {
        if result.is_ok() {
            result = walk_expr_mut(child, statement, next_expression, &mut *f);
        }
    });
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Vocabulary;
    use crate::parser::parse_spec_file;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl<'a> ChainVisitor<'a> for Recorder {
        type Error = String;

        fn visit(&mut self, event: ChainEvent<'a>, ctx: &WalkContext<'a>) -> Result<(), String> {
            let label = match event {
                ChainEvent::Construct { .. } => "new".to_string(),
                ChainEvent::Configure { name, .. } => name.to_string(),
                ChainEvent::BindInteraction { interaction, .. } => {
                    format!("bind({})", interaction.is_some())
                }
                ChainEvent::Checkpoint { variant, .. } => format!("test:{variant}"),
            };
            self.events.push(format!(
                "{}#{} {} -> {}",
                ctx.expression,
                ctx.link.map(|l| l.to_string()).unwrap_or_else(|| "-".into()),
                label,
                ctx.variant.unwrap_or("none")
            ));
            if label == "stop" {
                return Err("stopped".into());
            }
            Ok(())
        }
    }

    fn parse(source: &str) -> SpecFile {
        parse_spec_file(source, &Vocabulary::default()).unwrap()
    }

    #[test]
    fn test_events_carry_closing_variant() {
        let file = parse(
            "new B()\n  .forPage('/')\n  .test()\n  .setPageInteraction(fn)\n  .test('booking')\n  .setPageInteraction()\n  .only();",
        );
        let mut recorder = Recorder::default();
        ChainWalker::walk(&file, &mut recorder).unwrap();
        assert_eq!(
            recorder.events,
            vec![
                "0#- new -> main",
                "0#0 forPage -> main",
                "0#1 test:main -> main",
                "0#2 bind(true) -> booking",
                "0#3 test:booking -> booking",
                "0#4 bind(false) -> none",
                "0#5 only -> none",
            ]
        );
    }

    #[test]
    fn test_expression_ids_and_nested_builders() {
        let file = parse(
            "import B from 'b';\nconst a = new B().test('a');\nwrap(new B().test('b'), () => new B().test('c'));\nnew Other();\nfoo.bar().test('x');\n",
        );
        let mut recorder = Recorder::default();
        ChainWalker::walk(&file, &mut recorder).unwrap();
        let constructs: Vec<&String> = recorder.events.iter().filter(|e| e.contains("new")).collect();
        assert_eq!(constructs, vec!["0#- new -> a", "1#- new -> b", "2#- new -> c"]);
        assert_eq!(ChainWalker::count(&file), 3);
    }

    #[test]
    fn test_visitor_error_stops_walk() {
        let file = parse("new B().stop().test('a');\nnew B().test('b');");
        let mut recorder = Recorder::default();
        let err = ChainWalker::walk(&file, &mut recorder).unwrap_err();
        assert_eq!(err, "stopped");
        assert_eq!(recorder.events.len(), 2);
    }

    #[test]
    fn test_mutate_mode_matches_walk_order() {
        let mut file = parse("new B().test('a');\nx(new B().test('b'));");
        let mut sites = Vec::new();
        ChainWalker::for_each_chain_mut(&mut file, |chain, site| {
            sites.push((site, chain.links.len()));
            Ok::<(), ()>(())
        })
        .unwrap();
        assert_eq!(
            sites,
            vec![
                (ChainSite { expression: 0, statement: 0 }, 1),
                (ChainSite { expression: 1, statement: 1 }, 1),
            ]
        );
    }

    #[test]
    fn test_function_bodies_are_not_searched() {
        let file = parse("describe('x', () => {\n  new B().test('hidden');\n});");
        assert_eq!(ChainWalker::count(&file), 0);
    }
}
