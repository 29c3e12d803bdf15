// Variant listing
use std::convert::Infallible;

use indexmap::IndexSet;

use super::{ChainEvent, ChainVisitor, ChainWalker, WalkContext};
use crate::ast::SpecFile;

#[derive(Default)]
struct VariantCollector<'a> {
    names: IndexSet<&'a str>,
}

impl<'a> ChainVisitor<'a> for VariantCollector<'a> {
    type Error = Infallible;

    fn visit(&mut self, event: ChainEvent<'a>, _ctx: &WalkContext<'a>) -> Result<(), Infallible> {
        if let ChainEvent::Checkpoint { variant, .. } = event {
            self.names.insert(variant);
        }
        Ok(())
    }
}

/// Variant names declared in the file, in source order without duplicates.
/// Checkpoints without a literal name contribute `main`.
pub fn extract_variants(file: &SpecFile) -> Vec<String> {
    let mut collector = VariantCollector::default();
    match ChainWalker::walk(file, &mut collector) {
        Ok(()) => {}
        Err(never) => match never {},
    }
    collector.names.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Vocabulary;
    use crate::parser::parse_spec_file;

    fn variants(source: &str) -> Vec<String> {
        extract_variants(&parse_spec_file(source, &Vocabulary::default()).unwrap())
    }

    #[test]
    fn test_variants_in_source_order() {
        assert_eq!(
            variants("new B()\n  .forPage('/')\n  .test()\n  .setPageInteraction(f)\n  .test('booking')\n  .testFunction('other');"),
            vec!["main", "booking", "other"]
        );
    }

    #[test]
    fn test_duplicates_keep_first_position() {
        assert_eq!(
            variants("new B().test('a').test().test('a');\nnew B().test('b').test();"),
            vec!["a", "main", "b"]
        );
    }

    #[test]
    fn test_no_checkpoints_means_no_variants() {
        assert!(variants("import B from 'b';\nnew B().forPage('/');\ntest('x');").is_empty());
    }
}
