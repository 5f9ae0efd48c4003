//! Reachability analysis

use std::collections::HashSet;

use crate::{
    content::{
        Reference,
        RuleContent,
        Sequence,
        Visitor,
    },
    model::Rule,
};

/// Returns all rules that can be reached from `root` by following references,
/// `root` included.
///
/// References that can't be resolved are skipped.
pub fn find_reachable_rules(root: &Rule) -> HashSet<Rule> {
    let mut finder = ReachableFinder {
        seen: HashSet::new(),
    };
    finder.seen.insert(root.clone());
    if let Some(content) = &root.content {
        finder.visit(content);
    }
    finder.seen
}

struct ReachableFinder {
    seen: HashSet<Rule>,
}

impl ReachableFinder {
    fn visit_all<'a>(&mut self, children: impl IntoIterator<Item = &'a RuleContent>) {
        for child in children {
            self.visit(child);
        }
    }
}

impl Visitor for ReachableFinder {
    type Output = ();

    fn visit_literal(&mut self, _content: &str) {}

    fn visit_range(&mut self, _start: &str, _end: &str) {}

    fn visit_char_set(&mut self, _content: &str) {}

    fn visit_wildcard(&mut self) {}

    fn visit_doc(&mut self, _value: &str) {}

    fn visit_reference(&mut self, reference: &Reference) {
        let Some(rule) = reference.get_reference()
        else {
            return;
        };

        if self.seen.insert(rule.clone()) {
            if let Some(content) = &rule.content {
                self.visit(content);
            }
        }
    }

    fn visit_negation(&mut self, child: &RuleContent) {
        self.visit(child);
    }

    fn visit_zero_plus(&mut self, child: &RuleContent) {
        self.visit(child);
    }

    fn visit_one_plus(&mut self, child: &RuleContent) {
        self.visit(child);
    }

    fn visit_sequence(&mut self, sequence: &Sequence) {
        self.visit_all(&sequence.children);
    }

    fn visit_alternative(&mut self, children: &[RuleContent]) {
        self.visit_all(children);
    }
}
