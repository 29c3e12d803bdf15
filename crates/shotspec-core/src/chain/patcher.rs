/*!
# ChainPatcher - Interaction Rewriting

Overrides or removes the page interaction bound to one variant of a spec
file, leaving every other statement, link and argument byte-identical.

Override resolution targets the first checkpoint of the variant:

1. **Replace**: the last binding before the checkpoint gets the new callback;
   earlier bindings before the same checkpoint are dropped.
2. **Insert before checkpoint**: no binding yet, a new one is placed directly
   before the checkpoint.
3. **Create checkpoint**: the variant does not exist; a binding and a new
   checkpoint are placed right after the root construction call of the first
   builder expression of the file. Bindings left after that chain's last
   checkpoint are dropped, as no variant owns them.

The patcher never touches the file system and never formats.
*/

use std::convert::Infallible;

use serde::Serialize;

use super::{ChainEvent, ChainVisitor, ChainWalker, WalkContext};
use crate::ast::{
    dedent, print, CallRole, Expr, ExprKind, Function, Link, SpecFile, DEFAULT_VARIANT,
};
use crate::config::Vocabulary;
use crate::parser::{parse_spec_file, ParseError};

#[derive(thiserror::Error, Debug)]
pub enum PatchError {
    /// The spec file itself does not parse
    #[error("Spec file does not parse: {0}")]
    Source(#[source] ParseError),

    /// The replacement interaction code does not parse
    #[error("Interaction code does not parse: {0}")]
    InvalidCode(#[source] ParseError),

    /// The rewritten file failed to parse back
    #[error("Rewritten source is not valid: {0}")]
    Regenerated(#[source] ParseError),
}

/// What a patch did to the file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum PatchOutcome {
    /// An existing binding got the new callback
    Replaced,
    /// A binding was inserted directly before the variant's checkpoint
    InsertedBeforeCheckpoint,
    /// A binding and a new checkpoint were placed after the first builder's construction call
    CreatedCheckpoint,
    /// Bindings of the variant were removed
    Removed { count: usize },
    /// The variant has no binding; source unchanged
    NoBinding,
    /// No checkpoint for the variant (or no builder expression); source unchanged
    VariantNotFound,
}

impl PatchOutcome {
    pub fn changed(&self) -> bool {
        matches!(
            self,
            PatchOutcome::Replaced
                | PatchOutcome::InsertedBeforeCheckpoint
                | PatchOutcome::CreatedCheckpoint
                | PatchOutcome::Removed { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchResult {
    pub source: String,
    pub outcome: PatchOutcome,
}

impl PatchResult {
    fn unchanged(source: &str, outcome: PatchOutcome) -> Self {
        Self {
            source: source.to_string(),
            outcome,
        }
    }
}

/// Checkpoint of a variant and the bindings attributed to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct VariantSite {
    pub expression: usize,
    pub checkpoint: usize,
    pub bindings: Vec<usize>,
}

/// Finds the first checkpoint closing a variant
struct SiteLocator<'v> {
    variant: &'v str,
    bindings: Vec<usize>,
    first_expression: Option<usize>,
    site: Option<VariantSite>,
}

impl<'a, 'v> ChainVisitor<'a> for SiteLocator<'v> {
    type Error = Infallible;

    fn visit(&mut self, event: ChainEvent<'a>, ctx: &WalkContext<'a>) -> Result<(), Infallible> {
        match event {
            ChainEvent::Construct { .. } => {
                self.bindings.clear();
                self.first_expression.get_or_insert(ctx.expression);
            }
            ChainEvent::Configure { .. } => {}
            ChainEvent::BindInteraction { .. } => self.bindings.extend(ctx.link),
            ChainEvent::Checkpoint { variant, .. } => {
                let bindings = std::mem::take(&mut self.bindings);
                if self.site.is_none() && variant == self.variant {
                    self.site = Some(VariantSite {
                        expression: ctx.expression,
                        checkpoint: ctx.link.unwrap_or_default(),
                        bindings,
                    });
                }
            }
        }
        Ok(())
    }
}

fn locate(file: &SpecFile, variant: &str) -> (Option<VariantSite>, Option<usize>) {
    let mut locator = SiteLocator {
        variant,
        bindings: Vec::new(),
        first_expression: None,
        site: None,
    };
    match ChainWalker::walk(file, &mut locator) {
        Ok(()) => {}
        Err(never) => match never {},
    }
    (locator.site, locator.first_expression)
}

/// Rewrites interaction bindings in spec-file source
#[derive(Debug, Clone)]
pub struct ChainPatcher {
    vocabulary: Vocabulary,
    page_param: String,
}

impl Default for ChainPatcher {
    fn default() -> Self {
        Self::new(Vocabulary::default())
    }
}

impl ChainPatcher {
    pub fn new(vocabulary: Vocabulary) -> Self {
        Self {
            vocabulary,
            page_param: "page".to_string(),
        }
    }

    /// Parameter name of generated callbacks
    pub fn page_param(mut self, name: &str) -> Self {
        self.page_param = name.to_string();
        self
    }

    /// Bind `new_code` as the interaction of `variant`
    pub fn override_interaction(
        &self,
        source: &str,
        variant: &str,
        new_code: &str,
    ) -> Result<PatchResult, PatchError> {
        let mut file = parse_spec_file(source, &self.vocabulary).map_err(PatchError::Source)?;
        let callback = self.callback(new_code)?;
        let (site, first_expression) = locate(&file, variant);

        let outcome = match (site, first_expression) {
            (Some(site), _) => {
                let binding_name = self.vocabulary.binding_name().to_string();
                let mut outcome = PatchOutcome::Replaced;
                self.edit_chain(&mut file, site.expression, |links| {
                    match site.bindings.split_last() {
                        Some((&last, shadowed)) => {
                            if let Some(args) = links[last].args_mut() {
                                *args = vec![callback];
                            }
                            links[last].span = None;
                            for &index in shadowed.iter().rev() {
                                links.remove(index);
                            }
                        }
                        None => {
                            let binding =
                                Link::method(&binding_name, vec![callback], CallRole::BindInteraction);
                            links.insert(site.checkpoint, binding);
                            outcome = PatchOutcome::InsertedBeforeCheckpoint;
                        }
                    }
                });
                outcome
            }
            (None, Some(expression)) => {
                let checkpoint_args = if variant == DEFAULT_VARIANT {
                    Vec::new()
                } else {
                    vec![file.string_literal(variant)]
                };
                let binding = Link::method(
                    self.vocabulary.binding_name(),
                    vec![callback],
                    CallRole::BindInteraction,
                );
                let checkpoint = Link::method(
                    self.vocabulary.checkpoint_name(),
                    checkpoint_args,
                    CallRole::Checkpoint,
                );
                self.edit_chain(&mut file, expression, |links| {
                    // Bindings after the last checkpoint close no variant
                    let closed = links
                        .iter()
                        .rposition(|link| link.role() == Some(CallRole::Checkpoint))
                        .map_or(0, |index| index + 1);
                    let mut index = links.len();
                    while index > closed {
                        index -= 1;
                        if links[index].role() == Some(CallRole::BindInteraction) {
                            links.remove(index);
                        }
                    }
                    links.insert(0, checkpoint);
                    links.insert(0, binding);
                });
                PatchOutcome::CreatedCheckpoint
            }
            (None, None) => {
                tracing::info!(variant, "No builder expression to add the variant to");
                return Ok(PatchResult::unchanged(source, PatchOutcome::VariantNotFound));
            }
        };

        self.finish(file, variant, outcome)
    }

    /// Remove every binding attributed to `variant`
    pub fn remove_interaction(&self, source: &str, variant: &str) -> Result<PatchResult, PatchError> {
        let mut file = parse_spec_file(source, &self.vocabulary).map_err(PatchError::Source)?;

        let site = match locate(&file, variant).0 {
            Some(site) => site,
            None => {
                tracing::info!(variant, "Variant not found");
                return Ok(PatchResult::unchanged(source, PatchOutcome::VariantNotFound));
            }
        };
        if site.bindings.is_empty() {
            tracing::info!(variant, "Variant has no interaction to remove");
            return Ok(PatchResult::unchanged(source, PatchOutcome::NoBinding));
        }

        let count = site.bindings.len();
        self.edit_chain(&mut file, site.expression, |links| {
            for &index in site.bindings.iter().rev() {
                links.remove(index);
            }
        });
        self.finish(file, variant, PatchOutcome::Removed { count })
    }

    /// Wrap dedented code in an async page callback after checking it parses
    fn callback(&self, new_code: &str) -> Result<Expr, PatchError> {
        let code = dedent(new_code);
        parse_spec_file(&code, &self.vocabulary).map_err(PatchError::InvalidCode)?;
        Ok(Expr::synthesized(ExprKind::Function(Function::async_arrow(
            &self.page_param,
            &code,
        ))))
    }

    fn edit_chain(&self, file: &mut SpecFile, expression: usize, edit: impl FnOnce(&mut Vec<Link>)) {
        let mut edit = Some(edit);
        let result: Result<(), Infallible> = ChainWalker::for_each_chain_mut(file, |chain, site| {
            if site.expression == expression {
                if let Some(edit) = edit.take() {
                    edit(&mut chain.links);
                }
            }
            Ok(())
        });
        match result {
            Ok(()) => {}
            Err(never) => match never {},
        }
    }

    fn finish(&self, mut file: SpecFile, variant: &str, outcome: PatchOutcome) -> Result<PatchResult, PatchError> {
        file.settle();
        let source = print(&file);
        parse_spec_file(&source, &self.vocabulary).map_err(PatchError::Regenerated)?;
        tracing::info!(variant, ?outcome, "Patched interaction");
        Ok(PatchResult { source, outcome })
    }
}
