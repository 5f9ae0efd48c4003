//! Turns rule bodies into diagrams.
//!
//! Besides the straightforward translation of every node into a diagram
//! element, the renderer rewrites bodies so that diagrams come out compact:
//!
//!  - left and right recursion are drawn as loops,
//!  - common leading and trailing elements of a rule's branches are factored
//!    out (`x A | x B` becomes `x (A | B)`),
//!  - a loop that repeats the elements next to it is merged with them
//!    (`x y (A x y)*` becomes one-or-more of `x y` with `A` on the way back).

use std::{
    collections::{
        HashMap,
        HashSet,
    },
    str::FromStr,
};

use serde::{
    Deserialize,
    Serialize,
};

use super::{
    importance::ImportanceProvider,
    Element,
    LineBreak,
    TextNode,
};
use crate::{
    content::{
        self,
        Node,
        Reference,
        RuleContent,
        Sequence,
        Visitor,
    },
    model::Rule,
    utils::{
        to_dash_case,
        unescape_literal,
    },
    Error,
};

/// How references to lexer rules that are a single literal are drawn.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LiteralRendering {
    /// The name of the lexer rule.
    Name,

    /// The literal, in quotes.
    #[default]
    Contents,

    /// The literal, without quotes.
    ContentsUnquoted,
}

impl FromStr for LiteralRendering {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(Self::Name),
            "contents" => Ok(Self::Contents),
            "contents-unquoted" => Ok(Self::ContentsUnquoted),
            _ => {
                Err(Error::InvalidOption {
                    option: "literal-rendering",
                    value: s.to_owned(),
                })
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RenderSettings {
    pub literal_rendering: LiteralRendering,

    /// Convert rule names to `dash-case`.
    pub cc_to_dash: bool,
}

/// Renders the diagram of a rule.
///
/// # Panics
///
/// Panics if the rule has no body.
pub fn render(rule: &Rule, settings: &RenderSettings) -> Element {
    assert!(
        rule.content.is_some(),
        "rule {} has no body to render",
        rule.name
    );
    tracing::trace!(rule = %rule.full_name(), "rendering diagram");
    Renderer::new(settings).render(rule)
}

/// Factors common leading and then common trailing elements out of the
/// branches of an alternative: `x A | x B` becomes `x (A | B)` and `A x | B x`
/// becomes `(A | B) x`.
pub fn factor_alternative(children: &[RuleContent]) -> RuleContent {
    if children.len() <= 1 {
        return content::alternative(children.iter().cloned());
    }

    let children = factor_pass(children, Side::Front);
    if children.len() <= 1 {
        return content::alternative(children);
    }

    content::alternative(factor_pass(&children, Side::Back))
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Side {
    Front,
    Back,
}

/// Splits a branch into its first (or last) element and the rest.
fn split_branch(branch: &RuleContent, side: Side) -> (RuleContent, RuleContent) {
    let Some(sequence) = branch.as_sequence()
    else {
        return (branch.clone(), content::empty());
    };

    let n = sequence.children.len();
    match side {
        Side::Front => {
            (
                sequence.children[0].clone(),
                content::sequence_with_linebreaks(
                    sequence.children[1..].iter().cloned(),
                    sequence.linebreaks.iter().skip(1).copied(),
                ),
            )
        }
        Side::Back => {
            (
                sequence.children[n - 1].clone(),
                content::sequence_with_linebreaks(
                    sequence.children[..n - 1].iter().cloned(),
                    sequence.linebreaks.iter().take(n.saturating_sub(2)).copied(),
                ),
            )
        }
    }
}

fn factor_pass(children: &[RuleContent], side: Side) -> Vec<RuleContent> {
    let split = children
        .iter()
        .map(|child| split_branch(child, side))
        .collect::<Vec<_>>();

    let mut groups: HashMap<RuleContent, Vec<usize>> = HashMap::new();
    for (i, (key, _)) in split.iter().enumerate() {
        // empty branches have nothing to share
        if !key.is_empty() {
            groups.entry(key.clone()).or_default().push(i);
        }
    }

    if groups.values().all(|indices| indices.len() <= 1) {
        return children.to_vec();
    }

    let mut factored = vec![];
    for (i, (key, _)) in split.iter().enumerate() {
        match groups.get(key) {
            Some(indices) if indices.len() > 1 => {
                if indices[0] != i {
                    continue;
                }
                let rest = indices
                    .iter()
                    .map(|&j| split[j].1.clone())
                    .collect::<Vec<_>>();
                let rest = factor_alternative(&rest);
                factored.push(match side {
                    Side::Front => content::sequence([key.clone(), rest]),
                    Side::Back => content::sequence([rest, key.clone()]),
                });
            }
            _ => factored.push(children[i].clone()),
        }
    }
    factored
}

/// An item of a sequence that is being folded. Items that were already merged
/// into loops are rendered elements.
#[derive(Clone, Debug)]
enum Item {
    Content(RuleContent),
    Element(Element),
}

impl Item {
    fn is(&self, other: &RuleContent) -> bool {
        matches!(self, Item::Content(content) if content.ptr_eq(other))
    }

    /// Items of the body of a `*` loop.
    fn zero_plus_body(&self) -> Option<(Vec<RuleContent>, Vec<LineBreak>)> {
        let Item::Content(content) = self
        else {
            return None;
        };
        let Node::ZeroPlus(child) = content.node()
        else {
            return None;
        };
        Some(match child.as_sequence() {
            Some(sequence) => (sequence.children.clone(), sequence.linebreaks.clone()),
            None => (vec![child.clone()], vec![]),
        })
    }
}

fn items(contents: &[RuleContent]) -> Vec<Item> {
    contents.iter().cloned().map(Item::Content).collect()
}

fn slice<T: Clone>(items: &[T], range: impl std::slice::SliceIndex<[T], Output = [T]>) -> Vec<T> {
    items.get(range).map(<[T]>::to_vec).unwrap_or_default()
}

struct Renderer<'a> {
    settings: &'a RenderSettings,
    importance: ImportanceProvider,

    /// Rules that are currently being rendered. Inline rules in here are not
    /// inlined again.
    path: HashSet<Rule>,
}

impl<'a> Renderer<'a> {
    fn new(settings: &'a RenderSettings) -> Self {
        Self {
            settings,
            importance: ImportanceProvider::default(),
            path: HashSet::new(),
        }
    }

    fn render(&mut self, rule: &Rule) -> Element {
        self.path.insert(rule.clone());
        let element = self.render_body(rule);
        self.path.remove(rule);
        element
    }

    fn render_body(&mut self, rule: &Rule) -> Element {
        let Some(content) = &rule.content
        else {
            panic!("rule {} has no body to render", rule.name);
        };

        let branches = match content.as_alternative() {
            Some(branches) if !rule.keep_diagram_recursive => branches,
            _ => return self.visit(content),
        };

        let is_self = |content: &RuleContent| {
            content
                .as_reference()
                .and_then(Reference::get_reference)
                .map_or(false, |target| target.ptr_eq(rule))
        };

        #[derive(Copy, Clone, PartialEq, Eq)]
        enum Recursion {
            None,
            Left,
            Right,
        }

        let kinds = branches
            .iter()
            .map(|branch| {
                match branch.as_sequence() {
                    Some(sequence) if is_self(&sequence.children[0]) => Recursion::Left,
                    Some(sequence) if sequence.children.last().map_or(false, |last| is_self(last)) => {
                        Recursion::Right
                    }
                    _ => Recursion::None,
                }
            })
            .collect::<Vec<_>>();

        let n_left = kinds.iter().filter(|k| **k == Recursion::Left).count();
        let n_right = kinds.iter().filter(|k| **k == Recursion::Right).count();

        let folded = if n_left > 0 && n_left >= n_right {
            let (recursive, normal) = partition(branches, &kinds, Recursion::Left, Side::Front);
            let start = factor_alternative(&normal);
            let repeat = factor_alternative(&recursive);
            content::sequence([start, content::zero_plus(repeat)])
        }
        else if n_right > 0 {
            let (recursive, normal) = partition(branches, &kinds, Recursion::Right, Side::Back);
            let repeat = factor_alternative(&recursive);
            let end = factor_alternative(&normal);
            content::sequence([content::zero_plus(repeat), end])
        }
        else {
            factor_alternative(branches)
        };

        self.visit(&folded)
    }

    /// Folds `*` loops into the elements around them, then renders the
    /// sequence.
    fn fold_sequence(&mut self, mut seq: Vec<Item>, mut linebreaks: Vec<LineBreak>) -> Element {
        if seq.is_empty() {
            return Element::Skip;
        }

        // x y z (A B x y z)* -> one-or-more(x y z, repeat: A B)
        for i in (0..seq.len()).rev() {
            let Some((nested, nested_linebreaks)) = seq[i].zero_plus_body()
            else {
                continue;
            };
            let n = nested.len();

            let matched = (1..=n)
                .take_while(|&m| i >= m && seq[i - m].is(&nested[n - m]))
                .count();
            if matched == 0 {
                continue;
            }

            let split = n - matched;
            let repeat = self.fold_sequence(
                items(&nested[..split]),
                slice(&nested_linebreaks, ..split.saturating_sub(1)),
            );
            let main = self.fold_sequence(items(&nested[split..]), slice(&nested_linebreaks, split..));

            let start = i - matched;
            seq.splice(
                start..=i,
                [Item::Element(Element::one_or_more(main, Some(repeat)))],
            );
            linebreaks.drain(start..i);

            return self.fold_sequence(seq, linebreaks);
        }

        // (x y z A B)* x y z -> one-or-more(x y z, repeat: A B)
        for i in 0..seq.len() {
            let Some((nested, nested_linebreaks)) = seq[i].zero_plus_body()
            else {
                continue;
            };
            let n = nested.len();

            let matched = (0..n)
                .take_while(|&j| seq.get(i + j + 1).map_or(false, |item| item.is(&nested[j])))
                .count();
            if matched == 0 {
                continue;
            }

            let main = self.fold_sequence(
                items(&nested[..matched]),
                slice(&nested_linebreaks, ..matched - 1),
            );
            let repeat = self.fold_sequence(
                items(&nested[matched..]),
                slice(&nested_linebreaks, matched..),
            );

            let end = i + matched;
            seq.splice(
                i..=end,
                [Item::Element(Element::one_or_more(main, Some(repeat)))],
            );
            linebreaks.drain(i..end);

            return self.fold_sequence(seq, linebreaks);
        }

        let elements = seq
            .into_iter()
            .map(|item| {
                match item {
                    Item::Content(content) => self.visit(&content),
                    Item::Element(element) => element,
                }
            })
            .collect();
        Element::sequence(elements, linebreaks)
    }

    fn cc_to_dash(&self, name: &str) -> String {
        if self.settings.cc_to_dash {
            to_dash_case(name)
        }
        else {
            name.to_owned()
        }
    }

    fn unquote(&self, text: &str) -> String {
        if text.len() < 2 || !text.starts_with('\'') || !text.ends_with('\'') {
            return text.to_owned();
        }
        let unescaped = unescape_literal(text);
        match self.settings.literal_rendering {
            LiteralRendering::ContentsUnquoted => unescaped,
            _ => format!("'{unescaped}'"),
        }
    }

    fn display_name(&self, rule: &Rule) -> String {
        rule.display_name
            .clone()
            .unwrap_or_else(|| self.cc_to_dash(&rule.name))
    }
}

/// Splits branches into the recursive ones, with the self reference removed,
/// and all others.
fn partition<K: PartialEq>(
    branches: &[RuleContent],
    kinds: &[K],
    recursive_kind: K,
    side: Side,
) -> (Vec<RuleContent>, Vec<RuleContent>) {
    let mut recursive = vec![];
    let mut normal = vec![];
    for (branch, kind) in branches.iter().zip(kinds) {
        if *kind == recursive_kind {
            recursive.push(split_branch(branch, side).1);
        }
        else {
            normal.push(branch.clone());
        }
    }
    (recursive, normal)
}

fn leaf(text: impl Into<String>, css_class: &str) -> Element {
    Element::Terminal(
        TextNode::new(text)
            .with_css_class(Some(css_class))
            .with_text_is_weak(false),
    )
}

impl<'a> Visitor for Renderer<'a> {
    type Output = Element;

    fn visit_literal(&mut self, content: &str) -> Element {
        leaf(self.unquote(content), "literal")
    }

    fn visit_range(&mut self, start: &str, end: &str) -> Element {
        leaf(format!("{start}..{end}"), "range")
    }

    fn visit_char_set(&mut self, content: &str) -> Element {
        leaf(content, "charset")
    }

    fn visit_wildcard(&mut self) -> Element {
        leaf(".", "wildcard")
    }

    fn visit_negation(&mut self, child: &RuleContent) -> Element {
        leaf(Node::Negation(child.clone()).to_string(), "negation")
    }

    fn visit_doc(&mut self, value: &str) -> Element {
        Element::comment(value)
    }

    fn visit_reference(&mut self, reference: &Reference) -> Element {
        let name = reference.name.as_str();

        let Some(rule) = reference.get_reference()
        else {
            if name.starts_with(char::is_uppercase) || name.starts_with('\'') {
                let text = if name.len() >= 2 && name.starts_with('\'') && name.ends_with('\'') {
                    self.unquote(name)
                }
                else {
                    self.cc_to_dash(name)
                };
                return Element::terminal(text);
            }
            return Element::non_terminal(self.cc_to_dash(name));
        };

        if rule.is_inline && rule.content.is_some() && !self.path.contains(&rule) {
            return self.render(&rule);
        }

        let href = rule.full_name();

        if rule.is_lexer() {
            let node = if rule.is_literal()
                && self.settings.literal_rendering != LiteralRendering::Name
            {
                let literal = rule
                    .content
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                TextNode::new(self.unquote(&literal)).with_text_is_weak(false)
            }
            else {
                TextNode::new(self.display_name(&rule))
            };
            Element::Terminal(node.with_href(href).with_css_class(rule.css_class.clone()))
        }
        else {
            Element::NonTerminal(
                TextNode::new(self.display_name(&rule))
                    .with_href(href)
                    .with_css_class(rule.css_class.clone()),
            )
        }
    }

    fn visit_zero_plus(&mut self, child: &RuleContent) -> Element {
        let skip = self.importance.importance(child) == 0;
        Element::zero_or_more(self.visit(child), skip)
    }

    fn visit_one_plus(&mut self, child: &RuleContent) -> Element {
        Element::one_or_more(self.visit(child), None)
    }

    fn visit_sequence(&mut self, sequence: &Sequence) -> Element {
        self.fold_sequence(items(&sequence.children), sequence.linebreaks.clone())
    }

    fn visit_alternative(&mut self, children: &[RuleContent]) -> Element {
        let mut default = 0;
        let mut best = None;
        for (i, child) in children.iter().enumerate() {
            let importance = self.importance.importance(child);
            if best.map_or(true, |best| importance > best) {
                best = Some(importance);
                default = i;
            }
        }

        let items = children.iter().map(|child| self.visit(child)).collect();
        Element::choice(items, default)
    }
}
