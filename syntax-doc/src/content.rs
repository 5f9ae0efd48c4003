//! Rule bodies.
//!
//! A rule body is a tree of [`Node`]s behind a [`RuleContent`] handle. All
//! handles are created by the constructor functions in this module, which
//! normalize the node and look it up in a process-wide intern table. Two
//! structurally equal bodies are therefore always the same handle, and
//! [`RuleContent`] compares and hashes by identity.

use std::{
    collections::{
        HashMap,
        HashSet,
    },
    fmt,
    hash::{
        Hash,
        Hasher,
    },
    sync::{
        Arc,
        Mutex,
        OnceLock,
    },
};

use derivative::Derivative;
use serde::{
    Deserialize,
    Serialize,
};

use crate::model::{
    Model,
    ModelId,
    Rule,
    WeakModel,
};

/// Line break hint between two items of a sequence.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LineBreak {
    /// The layout engine may break here if it needs to.
    #[default]
    Default,

    /// A preferred break position, e.g. between two elements that were written
    /// as separate elements in the grammar source.
    Soft,
}

/// Handle to an interned rule body.
///
/// This internally uses an `Arc`, so it's cheap to clone.
#[derive(Clone)]
pub struct RuleContent(Arc<Node>);

impl RuleContent {
    pub fn node(&self) -> &Node {
        &self.0
    }

    pub fn precedence(&self) -> u8 {
        self.0.precedence()
    }

    pub fn is_empty(&self) -> bool {
        matches!(&*self.0, Node::Sequence(sequence) if sequence.children.is_empty())
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Returns the literal text, if this is a literal.
    pub fn as_literal(&self) -> Option<&str> {
        match &*self.0 {
            Node::Literal(content) => Some(content),
            _ => None,
        }
    }

    /// Returns the reference, if this is a reference.
    pub fn as_reference(&self) -> Option<&Reference> {
        match &*self.0 {
            Node::Reference(reference) => Some(reference),
            _ => None,
        }
    }

    /// Returns the sequence, if this is a non-empty sequence.
    pub fn as_sequence(&self) -> Option<&Sequence> {
        match &*self.0 {
            Node::Sequence(sequence) if !sequence.children.is_empty() => Some(sequence),
            _ => None,
        }
    }

    /// Returns the branches, if this is an alternative.
    pub fn as_alternative(&self) -> Option<&[RuleContent]> {
        match &*self.0 {
            Node::Alternative(children) => Some(children),
            _ => None,
        }
    }
}

impl PartialEq for RuleContent {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for RuleContent {}

impl Hash for RuleContent {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Debug for RuleContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RuleContent({})", self.0)
    }
}

impl fmt::Display for RuleContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Node {
    /// A literal, quotes included.
    Literal(String),

    /// A character range, e.g. `'a'..'z'`.
    Range { start: String, end: String },

    /// A character set, brackets included.
    CharSet(String),

    Wildcard,

    Reference(Reference),

    /// An inline documentation comment.
    Doc(String),

    Negation(RuleContent),

    ZeroPlus(RuleContent),

    OnePlus(RuleContent),

    /// A sequence. The empty sequence is [`empty`].
    Sequence(Sequence),

    Alternative(Vec<RuleContent>),
}

impl Node {
    /// Binding strength, used to decide where parenthesis go when printing.
    pub fn precedence(&self) -> u8 {
        match self {
            Node::Alternative(_) => 0,
            Node::Sequence(_) => 1,
            Node::Negation(_) | Node::ZeroPlus(_) | Node::OnePlus(_) => 3,
            _ => 4,
        }
    }

    fn fmt_child(&self, child: &RuleContent, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if child.precedence() > self.precedence() {
            write!(f, "{child}")
        }
        else {
            write!(f, "({child})")
        }
    }

    fn fmt_joined(
        &self,
        children: &[RuleContent],
        separator: &str,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                f.write_str(separator)?;
            }
            self.fmt_child(child, f)?;
        }
        Ok(())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Literal(content) => f.write_str(content),
            Node::Range { start, end } => write!(f, "{start}..{end}"),
            Node::CharSet(content) => f.write_str(content),
            Node::Wildcard => f.write_str("."),
            Node::Reference(reference) => f.write_str(&reference.name),
            Node::Doc(value) => write!(f, "/** {value} */"),
            Node::Negation(child) => {
                f.write_str("~")?;
                self.fmt_child(child, f)
            }
            Node::ZeroPlus(child) => {
                self.fmt_child(child, f)?;
                f.write_str("*")
            }
            Node::OnePlus(child) => {
                self.fmt_child(child, f)?;
                f.write_str("+")
            }
            Node::Sequence(sequence) => self.fmt_joined(&sequence.children, " ", f),
            Node::Alternative(children) => self.fmt_joined(children, " | ", f),
        }
    }
}

/// Reference to a named rule.
///
/// The reference is resolved lazily, so it may point to rules that are
/// declared later, or that live in an imported grammar.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct Reference {
    #[derivative(Debug = "ignore")]
    model: WeakModel,
    model_id: ModelId,
    pub name: String,
}

impl Reference {
    pub fn model(&self) -> Option<Model> {
        self.model.upgrade()
    }

    /// Looks up the referenced rule in the model this reference was created
    /// in and in its imports.
    pub fn get_reference(&self) -> Option<Rule> {
        self.model()?.lookup(&self.name)
    }
}

impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        self.model_id == other.model_id && self.name == other.name
    }
}

impl Eq for Reference {}

impl Hash for Reference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.model_id.hash(state);
        self.name.hash(state);
    }
}

/// Children of a sequence node.
///
/// Line breaks don't take part in equality.
#[derive(Clone, Debug)]
pub struct Sequence {
    pub children: Vec<RuleContent>,

    /// One entry for every junction between two children.
    pub linebreaks: Vec<LineBreak>,
}

impl PartialEq for Sequence {
    fn eq(&self, other: &Self) -> bool {
        self.children == other.children
    }
}

impl Eq for Sequence {}

impl Hash for Sequence {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.children.hash(state);
    }
}

type InternTable = HashSet<Arc<Node>>;

fn intern_table() -> &'static Mutex<InternTable> {
    static TABLE: OnceLock<Mutex<InternTable>> = OnceLock::new();
    TABLE.get_or_init(Default::default)
}

fn intern(node: Node) -> RuleContent {
    let mut table = intern_table().lock().expect("intern table mutex poisened");
    if let Some(existing) = table.get(&node) {
        return RuleContent(existing.clone());
    }
    let node = Arc::new(node);
    table.insert(node.clone());
    RuleContent(node)
}

/// Drops interned nodes that are not referenced from anywhere else.
///
/// [`render_fragment`](crate::antlr4::render_fragment) calls this once its
/// throwaway model is gone. Otherwise the table only grows, which is fine for
/// grammars that live as long as the process.
///
/// Returns the number of nodes that were dropped.
pub fn prune_interned() -> usize {
    let mut table = intern_table().lock().expect("intern table mutex poisened");
    let before = table.len();

    // dropping a node may release its children, so repeat until nothing changes.
    loop {
        let len = table.len();
        table.retain(|node| Arc::strong_count(node) > 1);
        if table.len() == len {
            break;
        }
    }

    let pruned = before - table.len();
    tracing::trace!(pruned, remaining = table.len(), "pruned intern table");
    pruned
}

/// The empty sequence.
pub fn empty() -> RuleContent {
    static EMPTY: OnceLock<RuleContent> = OnceLock::new();
    EMPTY
        .get_or_init(|| {
            intern(Node::Sequence(Sequence {
                children: vec![],
                linebreaks: vec![],
            }))
        })
        .clone()
}

/// The wildcard `.`.
pub fn wildcard() -> RuleContent {
    static WILDCARD: OnceLock<RuleContent> = OnceLock::new();
    WILDCARD.get_or_init(|| intern(Node::Wildcard)).clone()
}

pub fn literal(content: impl Into<String>) -> RuleContent {
    intern(Node::Literal(content.into()))
}

pub fn range(start: impl Into<String>, end: impl Into<String>) -> RuleContent {
    intern(Node::Range {
        start: start.into(),
        end: end.into(),
    })
}

pub fn char_set(content: impl Into<String>) -> RuleContent {
    intern(Node::CharSet(content.into()))
}

pub fn reference(model: &Model, name: impl Into<String>) -> RuleContent {
    intern(Node::Reference(Reference {
        model: model.downgrade(),
        model_id: model.id(),
        name: name.into(),
    }))
}

pub fn doc(value: impl Into<String>) -> RuleContent {
    intern(Node::Doc(value.into()))
}

pub fn negation(child: RuleContent) -> RuleContent {
    intern(Node::Negation(child))
}

pub fn zero_plus(child: RuleContent) -> RuleContent {
    if child.is_empty() {
        child
    }
    else {
        intern(Node::ZeroPlus(child))
    }
}

pub fn one_plus(child: RuleContent) -> RuleContent {
    if child.is_empty() {
        child
    }
    else {
        intern(Node::OnePlus(child))
    }
}

/// Creates a sequence with default line breaks between its children.
pub fn sequence(children: impl IntoIterator<Item = RuleContent>) -> RuleContent {
    sequence_with_linebreaks(children, [])
}

/// Creates a sequence.
///
/// Nested sequences are flattened and empty children are dropped. A missing
/// line break is treated as [`LineBreak::Default`]. Each remaining junction
/// keeps the line break that preceded its right-hand item.
pub fn sequence_with_linebreaks(
    children: impl IntoIterator<Item = RuleContent>,
    linebreaks: impl IntoIterator<Item = LineBreak>,
) -> RuleContent {
    let mut linebreaks = linebreaks.into_iter();
    let mut flat_children: Vec<RuleContent> = vec![];
    let mut flat_linebreaks = vec![];

    let mut push = |child: &RuleContent, linebreak: LineBreak| {
        if !flat_children.is_empty() {
            flat_linebreaks.push(linebreak);
        }
        flat_children.push(child.clone());
    };

    for (i, child) in children.into_iter().enumerate() {
        let before = if i == 0 {
            LineBreak::Default
        }
        else {
            linebreaks.next().unwrap_or_default()
        };

        match child.node() {
            Node::Sequence(nested) => {
                for (j, nested_child) in nested.children.iter().enumerate() {
                    let linebreak = if j == 0 {
                        before
                    }
                    else {
                        nested.linebreaks.get(j - 1).copied().unwrap_or_default()
                    };
                    push(nested_child, linebreak);
                }
            }
            _ => push(&child, before),
        }
    }

    match flat_children.len() {
        0 => empty(),
        1 => flat_children.pop().unwrap_or_else(empty),
        _ => {
            intern(Node::Sequence(Sequence {
                children: flat_children,
                linebreaks: flat_linebreaks,
            }))
        }
    }
}

/// Creates an alternative.
///
/// Nested alternatives are flattened. Empty branches are kept, they mean
/// "or nothing".
pub fn alternative(children: impl IntoIterator<Item = RuleContent>) -> RuleContent {
    let mut flat_children = vec![];

    for child in children {
        match child.node() {
            Node::Alternative(nested) => flat_children.extend(nested.iter().cloned()),
            _ => flat_children.push(child),
        }
    }

    match flat_children.len() {
        0 => empty(),
        1 => flat_children.pop().unwrap_or_else(empty),
        _ => intern(Node::Alternative(flat_children)),
    }
}

/// Visits a rule body, dispatching on the node kind.
///
/// Every method that isn't overridden falls through to
/// [`visit_default`](Visitor::visit_default), which panics.
pub trait Visitor {
    type Output;

    fn visit(&mut self, content: &RuleContent) -> Self::Output {
        match content.node() {
            Node::Literal(value) => self.visit_literal(value),
            Node::Range { start, end } => self.visit_range(start, end),
            Node::CharSet(value) => self.visit_char_set(value),
            Node::Wildcard => self.visit_wildcard(),
            Node::Reference(reference) => self.visit_reference(reference),
            Node::Doc(value) => self.visit_doc(value),
            Node::Negation(child) => self.visit_negation(child),
            Node::ZeroPlus(child) => self.visit_zero_plus(child),
            Node::OnePlus(child) => self.visit_one_plus(child),
            Node::Sequence(sequence) => self.visit_sequence(sequence),
            Node::Alternative(children) => self.visit_alternative(children),
        }
    }

    fn visit_default(&mut self, kind: &'static str) -> Self::Output {
        panic!("{} can't visit {kind} nodes", std::any::type_name::<Self>())
    }

    fn visit_literal(&mut self, _content: &str) -> Self::Output {
        self.visit_default("literal")
    }

    fn visit_range(&mut self, _start: &str, _end: &str) -> Self::Output {
        self.visit_default("range")
    }

    fn visit_char_set(&mut self, _content: &str) -> Self::Output {
        self.visit_default("char set")
    }

    fn visit_wildcard(&mut self) -> Self::Output {
        self.visit_default("wildcard")
    }

    fn visit_reference(&mut self, _reference: &Reference) -> Self::Output {
        self.visit_default("reference")
    }

    fn visit_doc(&mut self, _value: &str) -> Self::Output {
        self.visit_default("doc")
    }

    fn visit_negation(&mut self, _child: &RuleContent) -> Self::Output {
        self.visit_default("negation")
    }

    fn visit_zero_plus(&mut self, _child: &RuleContent) -> Self::Output {
        self.visit_default("zero-plus")
    }

    fn visit_one_plus(&mut self, _child: &RuleContent) -> Self::Output {
        self.visit_default("one-plus")
    }

    fn visit_sequence(&mut self, _sequence: &Sequence) -> Self::Output {
        self.visit_default("sequence")
    }

    fn visit_alternative(&mut self, _children: &[RuleContent]) -> Self::Output {
        self.visit_default("alternative")
    }
}

pub type VisitCache<T> = HashMap<RuleContent, T>;

/// A visitor that memoizes its results per node.
///
/// Implementors recurse through [`visit_cached`](CachedVisitor::visit_cached)
/// instead of [`visit`](Visitor::visit).
pub trait CachedVisitor: Visitor
where
    Self::Output: Clone,
{
    fn cache(&mut self) -> &mut VisitCache<Self::Output>;

    fn visit_cached(&mut self, content: &RuleContent) -> Self::Output {
        if let Some(output) = self.cache().get(content) {
            return output.clone();
        }
        let output = self.visit(content);
        self.cache().insert(content.clone(), output.clone());
        output
    }
}
