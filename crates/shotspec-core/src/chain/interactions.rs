// Interaction extraction
// A binding is held in a pending slot until the next checkpoint closes its
// variant; the checkpoint then clears the slot, as the builder does.

use std::convert::Infallible;

use indexmap::IndexMap;

use super::{ChainEvent, ChainVisitor, ChainWalker, WalkContext};
use crate::ast::{Expr, SourceContext, SpecFile, ToSource};

/// Source text of an interaction argument: the body of a function, or the
/// expression itself when something else (e.g. a helper reference) is passed
pub fn interaction_source(expr: &Expr, original: &str) -> String {
    match expr.as_function() {
        Some(function) => function.body_source(original),
        None => match expr.span {
            Some(span) => span.slice(original).trim().to_string(),
            None => expr.to_source(&SourceContext::new(original)),
        },
    }
}

struct InteractionCollector<'a> {
    original: &'a str,
    pending: Option<&'a Expr>,
    found: IndexMap<String, Option<String>>,
}

impl<'a> ChainVisitor<'a> for InteractionCollector<'a> {
    type Error = Infallible;

    fn visit(&mut self, event: ChainEvent<'a>, _ctx: &WalkContext<'a>) -> Result<(), Infallible> {
        match event {
            ChainEvent::Construct { .. } => self.pending = None,
            ChainEvent::Configure { .. } => {}
            ChainEvent::BindInteraction { interaction, .. } => self.pending = interaction,
            ChainEvent::Checkpoint { variant, .. } => {
                let pending = self.pending.take();
                // First occurrence of a variant wins
                if !self.found.contains_key(variant) {
                    let text = pending.map(|expr| interaction_source(expr, self.original));
                    self.found.insert(variant.to_string(), text);
                }
            }
        }
        Ok(())
    }
}

/// Every variant mapped to the source of its interaction, if it has one
pub fn extract_interactions(file: &SpecFile) -> IndexMap<String, Option<String>> {
    let mut collector = InteractionCollector {
        original: &file.source,
        pending: None,
        found: IndexMap::new(),
    };
    match ChainWalker::walk(file, &mut collector) {
        Ok(()) => {}
        Err(never) => match never {},
    }
    collector.found
}

/// Interaction source bound to `variant`; `None` when the variant does not
/// exist or has no interaction
pub fn extract_interaction(file: &SpecFile, variant: &str) -> Option<String> {
    extract_interactions(file).shift_remove(variant).flatten()
}
