use super::ast::{
    Alternative,
    DeclarationKind,
    Element,
    Grammar,
    RuleSpec,
    TokenDecl,
};
use crate::{
    antlr4::{
        ast::{
            CommentToken,
            LineIndex,
        },
        build_lexer_body,
    },
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
    provider::LoadingOptions,
};

pub(super) struct Builder<'a> {
    options: &'a LoadingOptions,
    model: &'a Model,
    lines: LineIndex<'a>,

    /// Comments of declarations that don't declare tokens. They go to the
    /// next token declaration.
    pending: Vec<Comment<'a>>,

    has_model_docs: bool,
}

impl<'a> Builder<'a> {
    pub fn new(options: &'a LoadingOptions, model: &'a Model, source: &'a str) -> Self {
        Self {
            options,
            model,
            lines: LineIndex::new(source),
            pending: vec![],
            has_model_docs: false,
        }
    }

    pub fn build(mut self, grammar: &Grammar<'a>) {
        for declaration in &grammar.declarations {
            let comments = self.comments(&declaration.comments);
            self.pending.extend(comments);

            match &declaration.kind {
                DeclarationKind::Tokens(tokens) => self.add_tokens(tokens),
                DeclarationKind::Epp(token) => self.add_tokens(std::slice::from_ref(token)),
                DeclarationKind::TokenCommand(name) => {
                    self.add_tokens(&[TokenDecl {
                        name: *name,
                        alias: None,
                    }])
                }
                DeclarationKind::Other => {}
            }
        }

        let comments = self.comments(&grammar.trailing_comments);
        self.pending.extend(comments);
        if !self.has_model_docs {
            let pending = std::mem::take(&mut self.pending);
            let info = load_docs(self.model, pending, false);
            if !info.documentation.is_empty() {
                self.model.set_docs(Some(info.documentation));
            }
        }

        for rule in &grammar.rules {
            self.add_rule(rule);
        }

        tracing::debug!(
            grammar = %self.model.name(),
            path = %self.model.path().display(),
            rules = grammar.rules.len(),
            "loaded grammar"
        );
    }

    fn position(&self, slice: &str) -> Position {
        Position::new(
            self.model.path(),
            self.lines.line_of(slice) + self.model.offset(),
        )
    }

    fn comments(&self, tokens: &[CommentToken<'a>]) -> Vec<Comment<'a>> {
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

    /// Declares tokens. Documentation and the name only go to the first of
    /// them, other commands apply to all.
    fn add_tokens(&mut self, tokens: &[TokenDecl<'_>]) {
        let mut comments = std::mem::take(&mut self.pending);

        // the first doc comment of the file documents the grammar
        if !self.has_model_docs {
            if let Some(first) = comments.first().filter(|c| c.kind == CommentKind::Doc) {
                let info = load_docs(self.model, [*first], false);
                self.model.set_docs(Some(info.documentation));
                comments.remove(0);
            }
            self.has_model_docs = true;
        }

        let section = self.make_section(&comments);
        let mut info = load_docs(self.model, comments, true);

        for token in tokens {
            if self.model.lookup_local(token.name).is_some() {
                continue;
            }

            let content = match (&info.content, token.alias) {
                (Some(command), _) => self.parse_content(command),
                (None, Some(alias)) => Some(self.make_literal(alias)),
                (None, None) => None,
            };
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
            data.section = section.clone();
            info.clone().apply(&mut data);
            self.model.add_lexer_rule(Rule::new(data));

            info.name = None;
            info.css_class = None;
            info.documentation.clear();
            info.content = None;
        }
    }

    fn add_rule(&self, spec: &RuleSpec<'_>) {
        let comments = self.comments(&spec.comments);
        let section = self.make_section(&comments);
        let info = load_docs(self.model, comments, true);

        if let Some(command) = &info.content {
            self.model.report(Diagnostic::error(
                command.position.clone(),
                "'content' command can't appear before parser rules",
            ));
        }

        let mut content = content::alternative(
            spec.body
                .iter()
                .map(|alternative| self.build_sequence(alternative)),
        );

        // bison allows several definitions of a nonterminal
        let data = match self.model.lookup_local(spec.name) {
            Some(previous) if !previous.is_lexer() => {
                if let Some(previous_content) = &previous.content {
                    content = content::alternative([previous_content.clone(), content]);
                }
                let mut data = RuleData::new(
                    spec.name,
                    self.model,
                    previous.position.clone(),
                    Some(content),
                    RuleKind::Parser,
                );
                data.section = previous.section.clone();
                info.apply(&mut data);
                let mut documentation = previous.documentation.clone();
                documentation.append(&mut data.documentation);
                data.documentation = documentation;
                data
            }
            _ => {
                let mut data = RuleData::new(
                    spec.name,
                    self.model,
                    self.position(spec.name),
                    Some(content),
                    RuleKind::Parser,
                );
                data.section = section;
                info.apply(&mut data);
                data
            }
        };

        self.model.add_parser_rule(Rule::new(data));
    }

    fn parse_content(&self, command: &ContentCommand) -> Option<RuleContent> {
        match build_lexer_body(self.model, &command.text) {
            Ok(content) => Some(content),
            Err(e) => {
                self.model.report(Diagnostic::error(
                    command.position.clone(),
                    format!("can't parse content:\n{}", e.message),
                ));
                None
            }
        }
    }

    /// All elements of an alternative are separated by soft line breaks.
    fn build_sequence(&self, alternative: &Alternative<'_>) -> RuleContent {
        let children = alternative
            .0
            .iter()
            .map(|element| self.build_element(element))
            .filter(|child| !child.is_empty())
            .collect::<Vec<_>>();
        let linebreaks = vec![LineBreak::Soft; children.len().saturating_sub(1)];
        content::sequence_with_linebreaks(children, linebreaks)
    }

    fn build_element(&self, element: &Element<'_>) -> RuleContent {
        match element {
            Element::Symbol(name) => content::reference(self.model, *name),
            Element::Literal(text) => {
                // literals that name a declared token refer to it
                match self.model.lookup_local(text) {
                    Some(_) => content::reference(self.model, *text),
                    None => self.make_literal(text),
                }
            }
            Element::Doc(text) => content::doc(doc_comment_lines(text).join("\n")),
            Element::Ignored => content::empty(),
        }
    }

    /// In C, single quotes delimit a single character.
    fn make_literal(&self, text: &str) -> RuleContent {
        if self.options.use_c_char_literals && !is_char_literal(text) {
            self.model.report(Diagnostic::error(
                self.position(text),
                format!("{text} is not a valid character literal"),
            ));
        }
        content::literal(text)
    }
}

/// Double-quoted strings are always fine. Single-quoted ones must hold one
/// character or one escape sequence.
fn is_char_literal(text: &str) -> bool {
    let Some(inner) = text.strip_prefix('\'').and_then(|s| s.strip_suffix('\''))
    else {
        return true;
    };

    let mut chars = inner.chars();
    match (chars.next(), chars.next()) {
        (Some('\\'), Some(_)) => {
            // octal and hex escapes are longer
            chars.all(|c| c.is_ascii_hexdigit())
        }
        (Some(_), None) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_checks_char_literals() {
        assert!(is_char_literal("'a'"));
        assert!(is_char_literal("'\\n'"));
        assert!(is_char_literal("'\\x1f'"));
        assert!(is_char_literal("'\\''"));
        assert!(is_char_literal("\"abc\""));
        assert!(!is_char_literal("'abc'"));
        assert!(!is_char_literal("''"));
    }
}
