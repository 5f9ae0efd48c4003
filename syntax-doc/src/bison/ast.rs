//! Syntax tree of a Bison grammar.
//!
//! Code blocks, precedence declarations and the epilogue aren't kept.

use crate::antlr4::ast::CommentToken;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grammar<'source> {
    pub declarations: Vec<Declaration<'source>>,

    /// Comments between the last declaration and `%%`.
    pub trailing_comments: Vec<CommentToken<'source>>,

    pub rules: Vec<RuleSpec<'source>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration<'source> {
    pub comments: Vec<CommentToken<'source>>,
    pub kind: DeclarationKind<'source>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeclarationKind<'source> {
    /// `%token NAME "alias" ...`
    Tokens(Vec<TokenDecl<'source>>),

    /// `%epp NAME "literal"`, the way grmtools names a token.
    Epp(TokenDecl<'source>),

    /// `//@ %token NAME`, for tokens that are never declared to Bison.
    TokenCommand(&'source str),

    /// Anything else: prologue code, `%define`, `%left`, `%type`, ...
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenDecl<'source> {
    pub name: &'source str,

    /// String literal the token can be written as in rules, with quotes.
    pub alias: Option<&'source str>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleSpec<'source> {
    pub comments: Vec<CommentToken<'source>>,
    pub name: &'source str,
    pub body: Vec<Alternative<'source>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alternative<'source>(pub Vec<Element<'source>>);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Element<'source> {
    /// Token or nonterminal name.
    Symbol(&'source str),

    /// Character or string literal, with quotes.
    Literal(&'source str),

    /// `/** ... */` inside a rule body.
    Doc(&'source str),

    /// Actions, predicates, `%empty`, `%prec X` and the like.
    Ignored,
}
