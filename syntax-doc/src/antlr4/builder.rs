//! Turns a parsed grammar into a [`Model`].

use std::path::Path;

use super::{
    ast::{
        Alternative,
        Alternatives,
        Atom,
        CommentToken,
        Element,
        Grammar,
        LineIndex,
        Prequel,
        RuleSpec,
        Suffix,
        TokenSpec,
    },
    parser,
    Antlr4Provider,
};
use crate::{
    content::{
        self,
        LineBreak,
        RuleContent,
    },
    diagnostics::Diagnostic,
    docs::{
        doc_comment_lines,
        load_docs,
        load_section,
        Comment,
        CommentKind,
        ContentCommand,
    },
    model::{
        Model,
        Position,
        Rule,
        RuleData,
        RuleKind,
        Section,
    },
    provider::{
        LoadingOptions,
        ModelProvider,
    },
};

pub(super) struct Builder<'a> {
    provider: &'a Antlr4Provider,
    options: &'a LoadingOptions,
    model: &'a Model,
    lines: LineIndex<'a>,
}

impl<'a> Builder<'a> {
    pub fn new(
        provider: &'a Antlr4Provider,
        options: &'a LoadingOptions,
        model: &'a Model,
        source: &'a str,
    ) -> Self {
        Self {
            provider,
            options,
            model,
            lines: LineIndex::new(source),
        }
    }

    pub fn build(self, grammar: &Grammar<'_>) {
        self.model.set_name(grammar.name);

        let info = load_docs(self.model, self.comments(&grammar.docs), false);
        if !info.documentation.is_empty() {
            self.model.set_docs(Some(info.documentation));
        }

        for prequel in &grammar.prequels {
            match prequel {
                Prequel::Options(options) => {
                    for option in options.iter().filter(|o| o.name == "tokenVocab") {
                        self.add_import(option.value);
                    }
                }
                Prequel::Imports(names) => {
                    for name in names {
                        self.add_import(name);
                    }
                }
                Prequel::Tokens(tokens) => {
                    for token in tokens {
                        self.add_token(token);
                    }
                }
                Prequel::Channels(_) | Prequel::Action => {}
            }
        }

        for rule in &grammar.rules {
            self.add_rule(rule);
        }

        tracing::debug!(
            grammar = grammar.name,
            path = %self.model.path().display(),
            rules = grammar.rules.len(),
            "loaded grammar"
        );
    }

    /// Position of a slice of the source.
    fn position(&self, slice: &str) -> Position {
        Position::new(
            self.model.path(),
            self.lines.line_of(slice) + self.model.offset(),
        )
    }

    fn comments<'s>(&self, tokens: &[CommentToken<'s>]) -> Vec<Comment<'s>> {
        tokens
            .iter()
            .map(|token| {
                Comment {
                    kind: token.kind,
                    text: token.text,
                    line: self.lines.line_of(token.text),
                }
            })
            .collect()
    }

    fn make_section(&self, comments: &[Comment<'_>]) -> Option<Section> {
        let first = comments
            .iter()
            .find(|comment| comment.kind == CommentKind::Header)?;
        Some(Section::new(
            load_section(self.model, comments.iter().copied()),
            Position::new(self.model.path(), first.line + self.model.offset()),
        ))
    }

    fn add_import(&self, name: &str) {
        if self.model.is_in_memory() {
            self.model.report(Diagnostic::error(
                self.position(name),
                "imports are not allowed for in-memory grammars",
            ));
            return;
        }

        let path = self
            .model
            .path()
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(format!("{name}.g4"));
        tracing::debug!(grammar = %self.model.name(), import = %path.display(), "loading import");

        let import = self.provider.from_file(&path, self.options);
        self.model.add_import(import);
    }

    fn add_token(&self, token: &TokenSpec<'_>) {
        let comments = self.comments(&token.comments);
        let section = self.make_section(&comments);
        let info = load_docs(self.model, comments, true);

        let content = info
            .content
            .as_ref()
            .and_then(|command| self.parse_content(command));
        let is_literal = content
            .as_ref()
            .map_or(false, |content| content.as_literal().is_some());

        let mut data = RuleData::new(
            token.name,
            self.model,
            self.position(token.name),
            content,
            RuleKind::Lexer {
                is_literal,
                is_fragment: false,
            },
        );
        data.section = section;
        info.apply(&mut data);

        self.model.add_lexer_rule(Rule::new(data));
    }

    fn add_rule(&self, spec: &RuleSpec<'_>) {
        let comments = self.comments(&spec.comments);
        let section = self.make_section(&comments);
        let info = load_docs(self.model, comments, true);

        let is_lexer = spec.is_lexer();
        let mut content = self.build_alternatives(&spec.body, is_lexer);

        if let Some(command) = &info.content {
            if is_lexer {
                if let Some(replacement) = self.parse_content(command) {
                    content = replacement;
                }
            }
            else {
                self.model.report(Diagnostic::error(
                    command.position.clone(),
                    "'content' command can't appear before parser rules",
                ));
            }
        }

        let kind = if is_lexer {
            RuleKind::Lexer {
                is_literal: content.as_literal().is_some(),
                is_fragment: spec.is_fragment,
            }
        }
        else {
            RuleKind::Parser
        };

        let mut data = RuleData::new(
            spec.name,
            self.model,
            self.position(spec.name),
            Some(content),
            kind,
        );
        data.section = section;
        info.apply(&mut data);

        let rule = Rule::new(data);
        if is_lexer {
            self.model.add_lexer_rule(rule);
        }
        else {
            self.model.add_parser_rule(rule);
        }
    }

    /// Parses the body given to the `content` command. It's always read as a
    /// lexer rule body.
    fn parse_content(&self, command: &ContentCommand) -> Option<RuleContent> {
        match parser::parse_body(&command.text) {
            Ok(body) => Some(self.build_alternatives(&body, true)),
            Err(e) => {
                self.model.report(Diagnostic::error(
                    command.position.clone(),
                    format!("can't parse content:\n{}", e.message),
                ));
                None
            }
        }
    }

    fn build_alternatives(&self, alternatives: &Alternatives<'_>, is_lexer: bool) -> RuleContent {
        content::alternative(
            alternatives
                .0
                .iter()
                .map(|alternative| self.build_sequence(alternative, is_lexer)),
        )
    }

    /// Elements written next to each other in the source are separated by
    /// soft line breaks. Sequences coming from blocks are spliced in with
    /// default line breaks between their own items.
    fn build_sequence(&self, alternative: &Alternative<'_>, is_lexer: bool) -> RuleContent {
        let mut children = vec![];
        let mut linebreaks = vec![];

        for element in &alternative.0 {
            let child = self.build_element(element, is_lexer);
            if child.is_empty() {
                continue;
            }

            if !children.is_empty() {
                linebreaks.push(LineBreak::Soft);
            }

            match child.as_sequence() {
                Some(nested) => {
                    for (i, nested_child) in nested.children.iter().enumerate() {
                        if i > 0 {
                            linebreaks.push(LineBreak::Default);
                        }
                        children.push(nested_child.clone());
                    }
                }
                None => children.push(child),
            }
        }

        content::sequence_with_linebreaks(children, linebreaks)
    }

    fn build_element(&self, element: &Element<'_>, is_lexer: bool) -> RuleContent {
        let content = self.build_atom(&element.atom, is_lexer);
        if content.is_empty() {
            return content;
        }

        match element.suffix {
            None => content,
            Some(Suffix::Optional) => content::alternative([content::empty(), content]),
            Some(Suffix::ZeroOrMore) => content::zero_plus(content),
            Some(Suffix::OneOrMore) => content::one_plus(content),
        }
    }

    fn build_atom(&self, atom: &Atom<'_>, is_lexer: bool) -> RuleContent {
        match atom {
            Atom::Literal("''") => content::empty(),
            Atom::Literal(text) if is_lexer => content::literal(*text),
            // in parser rules, literals refer to the token that matches them
            Atom::Literal(text) => content::reference(self.model, *text),
            Atom::Range { start, end } => content::range(*start, *end),
            Atom::CharSet("[]") => content::empty(),
            Atom::CharSet(text) => content::char_set(*text),
            Atom::Wildcard => content::wildcard(),
            Atom::Ref(name) => content::reference(self.model, *name),
            Atom::Not(inner) => content::negation(self.build_atom(inner, is_lexer)),
            Atom::Block(alternatives) => self.build_alternatives(alternatives, is_lexer),
            Atom::Doc(text) => content::doc(doc_comment_lines(text).join("\n")),
            Atom::Action => content::empty(),
        }
    }
}

/// Builds a lexer rule body given as text, e.g. by the `content` command of
/// another dialect. References are resolved in `model`.
pub(crate) fn build_lexer_body(
    model: &Model,
    text: &str,
) -> Result<RuleContent, parser::SyntaxError> {
    let body = parser::parse_body(text)?;
    let options = LoadingOptions::default();
    let builder = Builder::new(Antlr4Provider::global(), &options, model, text);
    Ok(builder.build_alternatives(&body, true))
}
