//! Importance of rule bodies.
//!
//! The importance of a body is the highest importance of anything it
//! contains. It's used to decide which branch of a choice goes on the main
//! line, and whether a loop is drawn with its skip path on the main line.

use crate::content::{
    CachedVisitor,
    Reference,
    RuleContent,
    Sequence,
    VisitCache,
    Visitor,
};

#[derive(Debug, Default)]
pub struct ImportanceProvider {
    cache: VisitCache<u32>,
}

impl ImportanceProvider {
    pub fn importance(&mut self, content: &RuleContent) -> u32 {
        self.visit_cached(content)
    }

    fn max_of(&mut self, children: &[RuleContent]) -> u32 {
        children
            .iter()
            .map(|child| self.visit_cached(child))
            .max()
            .unwrap_or(0)
    }
}

impl Visitor for ImportanceProvider {
    type Output = u32;

    fn visit_literal(&mut self, _content: &str) -> u32 {
        1
    }

    fn visit_range(&mut self, _start: &str, _end: &str) -> u32 {
        1
    }

    fn visit_char_set(&mut self, _content: &str) -> u32 {
        1
    }

    fn visit_wildcard(&mut self) -> u32 {
        1
    }

    fn visit_reference(&mut self, reference: &Reference) -> u32 {
        reference
            .get_reference()
            .map(|rule| rule.importance)
            .unwrap_or(1)
    }

    fn visit_doc(&mut self, _value: &str) -> u32 {
        0
    }

    fn visit_negation(&mut self, child: &RuleContent) -> u32 {
        self.visit_cached(child)
    }

    fn visit_zero_plus(&mut self, child: &RuleContent) -> u32 {
        self.visit_cached(child)
    }

    fn visit_one_plus(&mut self, child: &RuleContent) -> u32 {
        self.visit_cached(child)
    }

    fn visit_sequence(&mut self, sequence: &Sequence) -> u32 {
        self.max_of(&sequence.children)
    }

    fn visit_alternative(&mut self, children: &[RuleContent]) -> u32 {
        self.max_of(children)
    }
}

impl CachedVisitor for ImportanceProvider {
    fn cache(&mut self) -> &mut VisitCache<u32> {
        &mut self.cache
    }
}
