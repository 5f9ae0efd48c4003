//! Syntax tree of an ANTLR4 grammar.
//!
//! Only what's needed for documentation is kept. Names and comments are
//! slices of the source, so their position can be recovered with
//! [`LineIndex`].

use crate::docs::CommentKind;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grammar<'source> {
    /// Comments before the grammar header.
    pub docs: Vec<CommentToken<'source>>,
    pub kind: GrammarKind,
    pub name: &'source str,
    pub prequels: Vec<Prequel<'source>>,
    pub rules: Vec<RuleSpec<'source>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GrammarKind {
    Lexer,
    Parser,
    Combined,
}

/// A documentation comment. Plain comments are not kept.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CommentToken<'source> {
    pub kind: CommentKind,
    pub text: &'source str,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Prequel<'source> {
    Options(Vec<GrammarOption<'source>>),
    Imports(Vec<&'source str>),
    Tokens(Vec<TokenSpec<'source>>),
    Channels(Vec<&'source str>),
    Action,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrammarOption<'source> {
    pub name: &'source str,
    pub value: &'source str,
}

/// A token declared in a `tokens { ... }` block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenSpec<'source> {
    pub comments: Vec<CommentToken<'source>>,
    pub name: &'source str,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleSpec<'source> {
    /// Comments before the rule.
    pub comments: Vec<CommentToken<'source>>,
    pub name: &'source str,
    pub is_fragment: bool,
    pub body: Alternatives<'source>,
}

impl<'source> RuleSpec<'source> {
    /// Lexer rule names start with an uppercase letter.
    pub fn is_lexer(&self) -> bool {
        self.is_fragment || self.name.starts_with(char::is_uppercase)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alternatives<'source>(pub Vec<Alternative<'source>>);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alternative<'source>(pub Vec<Element<'source>>);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element<'source> {
    pub atom: Atom<'source>,
    pub suffix: Option<Suffix>,
}

/// `?`, `*` or `+`. Non-greedy suffixes are treated like greedy ones.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Suffix {
    Optional,
    ZeroOrMore,
    OneOrMore,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Atom<'source> {
    /// String literal, with quotes.
    Literal(&'source str),

    /// `'a'..'z'`, with quotes.
    Range {
        start: &'source str,
        end: &'source str,
    },

    /// `[a-z]`, with brackets.
    CharSet(&'source str),

    Wildcard,

    /// Reference to a lexer or parser rule.
    Ref(&'source str),

    Not(Box<Atom<'source>>),

    Block(Alternatives<'source>),

    /// `/** ... */` inside a rule body.
    Doc(&'source str),

    /// Actions and predicates.
    Action,
}

/// Maps slices of a source text to line numbers.
#[derive(Clone, Debug)]
pub struct LineIndex<'source> {
    source: &'source str,
    newlines: Vec<usize>,
}

impl<'source> LineIndex<'source> {
    pub fn new(source: &'source str) -> Self {
        Self {
            source,
            newlines: source
                .char_indices()
                .filter(|(_, c)| *c == '\n')
                .map(|(i, _)| i)
                .collect(),
        }
    }

    /// Line (starting at 1) of the byte offset `offset`.
    pub fn line_of_offset(&self, offset: usize) -> usize {
        self.newlines.partition_point(|&newline| newline < offset) + 1
    }

    /// Line (starting at 1) on which `slice` starts. `slice` must be a
    /// subslice of the source, otherwise line 1 is returned.
    pub fn line_of(&self, slice: &str) -> usize {
        let start = self.source.as_ptr() as usize;
        let ptr = slice.as_ptr() as usize;
        if ptr < start || ptr > start + self.source.len() {
            return 1;
        }
        self.line_of_offset(ptr - start)
    }
}
