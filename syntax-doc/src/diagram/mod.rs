//! Syntax diagrams
//!
//! A diagram is a tree of [`Element`]s. The [`renderer`] builds them from rule
//! bodies, but they can also be written by hand in a small YAML language, see
//! [`load_description`].
//!
//! Laying out and drawing the diagram is left to the consumer of the tree.

pub mod importance;
pub mod renderer;

use serde::{
    Deserialize,
    Serialize,
};

pub use self::renderer::{
    render,
    LiteralRendering,
    RenderSettings,
};
pub use crate::content::LineBreak;
use crate::Error;

fn default_text_is_weak() -> bool {
    true
}

/// Text of a terminal, non-terminal or comment box.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TextNode {
    pub text: String,

    /// Cross reference target, `grammar.rule`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css_class: Option<String>,

    /// If set, the text may be replaced by the documented name of whatever
    /// `href` resolves to.
    #[serde(default = "default_text_is_weak")]
    pub text_is_weak: bool,
}

impl TextNode {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            href: None,
            css_class: None,
            text_is_weak: true,
        }
    }

    pub fn with_href(mut self, href: impl Into<String>) -> Self {
        self.href = Some(href.into());
        self
    }

    pub fn with_css_class(mut self, css_class: Option<impl Into<String>>) -> Self {
        self.css_class = css_class.map(Into::into);
        self
    }

    pub fn with_text_is_weak(mut self, text_is_weak: bool) -> Self {
        self.text_is_weak = text_is_weak;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Element {
    /// Nothing, a straight line.
    Skip,

    Terminal(TextNode),

    NonTerminal(TextNode),

    Comment(TextNode),

    Sequence {
        items: Vec<Element>,
        linebreaks: Vec<LineBreak>,
    },

    Choice {
        items: Vec<Element>,

        /// Index of the branch that is drawn on the main line.
        default: usize,
    },

    OneOrMore {
        item: Box<Element>,

        /// Drawn on the way back, between repetitions.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        repeat: Option<Box<Element>>,
    },

    ZeroOrMore {
        item: Box<Element>,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        repeat: Option<Box<Element>>,

        /// Draw the skip path on the main line.
        #[serde(default)]
        skip: bool,
    },
}

impl Element {
    pub fn terminal(text: impl Into<String>) -> Self {
        Self::Terminal(TextNode::new(text))
    }

    pub fn non_terminal(text: impl Into<String>) -> Self {
        Self::NonTerminal(TextNode::new(text))
    }

    pub fn comment(text: impl Into<String>) -> Self {
        Self::Comment(TextNode::new(text))
    }

    /// Creates a sequence. Empty sequences become [`Element::Skip`], and a
    /// single item stands for itself.
    pub fn sequence(mut items: Vec<Element>, mut linebreaks: Vec<LineBreak>) -> Self {
        match items.len() {
            0 => Self::Skip,
            1 => items.pop().unwrap_or(Self::Skip),
            n => {
                linebreaks.resize(n - 1, LineBreak::Default);
                Self::Sequence { items, linebreaks }
            }
        }
    }

    pub fn choice(items: Vec<Element>, default: usize) -> Self {
        Self::Choice { items, default }
    }

    pub fn one_or_more(item: Element, repeat: Option<Element>) -> Self {
        Self::OneOrMore {
            item: Box::new(item),
            repeat: repeat.filter(|r| !r.is_skip()).map(Box::new),
        }
    }

    pub fn zero_or_more(item: Element, skip: bool) -> Self {
        Self::ZeroOrMore {
            item: Box::new(item),
            repeat: None,
            skip,
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip)
    }
}

/// Hand-written diagram description.
///
/// A string is a terminal, a list is a sequence. Everything else is a map with
/// exactly one of the keys `terminal`, `non-terminal`, `comment`, `sequence`,
/// `choice`, `optional`, `one-or-more`, `zero-or-more` or `skip`, plus the
/// modifiers that apply to it.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Description {
    Terminal(String),
    Sequence(Vec<Description>),
    Node(Box<NodeDescription>),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
struct NodeDescription {
    terminal: Option<String>,
    non_terminal: Option<String>,
    comment: Option<String>,
    sequence: Option<Vec<Description>>,
    choice: Option<Vec<Description>>,
    optional: Option<Description>,
    one_or_more: Option<Description>,
    zero_or_more: Option<Description>,
    skip: Option<bool>,

    href: Option<String>,
    css_class: Option<String>,
    linebreaks: Option<Vec<LineBreak>>,
    default: Option<usize>,
    repeat: Option<Description>,
}

impl Description {
    fn into_element(self) -> Result<Element, String> {
        match self {
            Description::Terminal(text) => {
                Ok(Element::Terminal(
                    TextNode::new(text).with_text_is_weak(false),
                ))
            }
            Description::Sequence(items) => {
                Ok(Element::sequence(
                    items
                        .into_iter()
                        .map(Description::into_element)
                        .collect::<Result<_, _>>()?,
                    vec![],
                ))
            }
            Description::Node(node) => (*node).into_element(),
        }
    }
}

impl NodeDescription {
    fn into_element(self) -> Result<Element, String> {
        let NodeDescription {
            terminal,
            non_terminal,
            comment,
            sequence,
            choice,
            optional,
            one_or_more,
            zero_or_more,
            skip,
            href,
            css_class,
            linebreaks,
            default,
            repeat,
        } = self;

        let text_node = |text: String| {
            let node = TextNode::new(text)
                .with_css_class(css_class.clone())
                .with_text_is_weak(href.is_some());
            match &href {
                Some(href) => node.with_href(href),
                None => node,
            }
        };
        let convert = |description: Option<Description>| {
            description.map(Description::into_element).transpose()
        };
        let convert_all = |items: Vec<Description>| {
            items
                .into_iter()
                .map(Description::into_element)
                .collect::<Result<Vec<_>, _>>()
        };

        let kinds = [
            terminal.is_some(),
            non_terminal.is_some(),
            comment.is_some(),
            sequence.is_some(),
            choice.is_some(),
            optional.is_some(),
            one_or_more.is_some(),
            zero_or_more.is_some(),
        ]
        .into_iter()
        .filter(|x| *x)
        .count();

        if kinds > 1 {
            return Err("a diagram node must have exactly one kind".to_owned());
        }

        let element = if let Some(text) = terminal {
            Element::Terminal(text_node(text))
        }
        else if let Some(text) = non_terminal {
            Element::NonTerminal(text_node(text))
        }
        else if let Some(text) = comment {
            Element::Comment(text_node(text))
        }
        else if let Some(items) = sequence {
            Element::sequence(convert_all(items)?, linebreaks.unwrap_or_default())
        }
        else if let Some(items) = choice {
            let items = convert_all(items)?;
            let default = default.unwrap_or(0);
            if default >= items.len() {
                return Err(format!(
                    "default branch {default} is out of range for a choice with {} branches",
                    items.len()
                ));
            }
            Element::choice(items, default)
        }
        else if let Some(item) = convert(optional)? {
            let default = if skip.unwrap_or(false) { 0 } else { 1 };
            Element::choice(vec![Element::Skip, item], default)
        }
        else if let Some(item) = convert(one_or_more)? {
            Element::one_or_more(item, convert(repeat)?)
        }
        else if let Some(item) = convert(zero_or_more)? {
            Element::ZeroOrMore {
                item: Box::new(item),
                repeat: convert(repeat)?.filter(|r| !r.is_skip()).map(Box::new),
                skip: skip.unwrap_or(false),
            }
        }
        else if skip == Some(true) {
            Element::Skip
        }
        else {
            return Err("a diagram node must have exactly one kind".to_owned());
        };

        Ok(element)
    }
}

/// Parses a hand-written diagram description.
///
/// ```
/// # use syntax_doc::diagram::{load_description, Element};
/// let element = load_description(
///     r#"
/// - SELECT
/// - choice: [DISTINCT, ALL]
/// - non-terminal: columns
///   href: Sql.columns
/// "#,
/// )
/// .unwrap();
/// assert!(matches!(element, Element::Sequence { .. }));
/// ```
pub fn load_description(yaml: &str) -> Result<Element, Error> {
    let description: Description = serde_yaml::from_str(yaml)?;
    description
        .into_element()
        .map_err(Error::InvalidDiagram)
}
