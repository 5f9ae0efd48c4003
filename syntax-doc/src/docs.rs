//! Documentation comments
//!
//! Rules are documented with `/** ... */` comments written right before them.
//! Their behaviour can be tweaked with command comments of the form
//! `//@ doc:<command> <argument>`:
//!
//!  - `nodoc`, `no-doc`: don't document the rule.
//!  - `inline`: don't document the rule, and inline its diagram wherever it's
//!    referenced.
//!  - `nodiagram`, `no-diagram`: don't render a diagram for the rule.
//!  - `keep-diagram-recursive`: don't turn recursion into loops.
//!  - `unimportant`: same as `importance 0`.
//!  - `importance <n>`: weight used to pick the default branch of a choice.
//!  - `name <text>`: human readable name of the rule.
//!  - `css-class <text>`: extra class for the rule's diagram nodes.
//!  - `content <body>`: replace the rule body for documentation purposes.

use nom::{
    bytes::complete::{
        tag,
        take_while1,
    },
    character::complete::{
        char,
        multispace0,
    },
    combinator::rest,
    error::VerboseError,
    sequence::{
        pair,
        preceded,
        tuple,
    },
    IResult,
};

use crate::{
    diagnostics::Diagnostic,
    model::{
        DocLine,
        Model,
        Position,
        RuleData,
    },
    utils::{
        dedent,
        IsLast,
    },
};

type Res<'a, U> = IResult<&'a str, U, VerboseError<&'a str>>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CommentKind {
    /// `/** ... */`
    Doc,

    /// `//@ ...`
    Command,

    /// `/// ...`
    Header,
}

/// A comment token that carries documentation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Comment<'source> {
    pub kind: CommentKind,

    /// Full text of the comment, including the comment markers.
    pub text: &'source str,

    /// Line the comment starts on, relative to the parsed text.
    pub line: usize,
}

/// The `content` command, to be parsed by the grammar loader.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentCommand {
    pub text: String,
    pub position: Position,
}

/// Everything that was collected from the comments before a rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocInfo {
    pub importance: u32,
    pub is_inline: bool,
    pub is_nodoc: bool,
    pub is_no_diagram: bool,
    pub keep_diagram_recursive: bool,
    pub css_class: Option<String>,
    pub name: Option<String>,
    pub documentation: Vec<DocLine>,
    pub content: Option<ContentCommand>,
}

impl Default for DocInfo {
    fn default() -> Self {
        Self {
            importance: 1,
            is_inline: false,
            is_nodoc: false,
            is_no_diagram: false,
            keep_diagram_recursive: false,
            css_class: None,
            name: None,
            documentation: vec![],
            content: None,
        }
    }
}

impl DocInfo {
    /// Copies the collected flags and documentation into a rule. The
    /// `content` command is left to the loader.
    pub fn apply(self, data: &mut RuleData) {
        data.display_name = self.name;
        data.is_nodoc = self.is_nodoc;
        data.is_inline = self.is_inline;
        data.is_no_diagram = self.is_no_diagram;
        data.keep_diagram_recursive = self.keep_diagram_recursive;
        data.css_class = self.css_class;
        data.importance = self.importance;
        data.documentation = self.documentation;
    }
}

fn parse_command(input: &str) -> Res<(&str, &str)> {
    preceded(
        tuple((
            tag("//@"),
            multispace0,
            tag("doc"),
            multispace0,
            char(':'),
            multispace0,
        )),
        pair(
            take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '-'),
            preceded(multispace0, rest),
        ),
    )(input)
}

/// Collects documentation and commands from the comments before a rule or
/// grammar header.
///
/// Problems are reported on `model`. Header comments are ignored, they're
/// handled by [`load_section`].
pub fn load_docs<'source>(
    model: &Model,
    comments: impl IntoIterator<Item = Comment<'source>>,
    allow_cmd: bool,
) -> DocInfo {
    let mut info = DocInfo::default();

    for comment in comments {
        let position = Position::new(model.path(), comment.line + model.offset());

        match comment.kind {
            CommentKind::Header => {}
            CommentKind::Command => {
                let Ok((_, (cmd, arg))) = parse_command(comment.text)
                else {
                    model.report(Diagnostic::error(
                        position,
                        format!("invalid command {:?}", comment.text),
                    ));
                    continue;
                };

                if !allow_cmd {
                    model.report(Diagnostic::error(position, "commands not allowed here"));
                    continue;
                }

                apply_command(model, &mut info, cmd, arg.trim(), position);
            }
            CommentKind::Doc => {
                let lines = doc_comment_lines(comment.text);
                info.documentation.extend(
                    lines
                        .into_iter()
                        .enumerate()
                        .map(|(i, text)| DocLine::new(position.line + i, text)),
                );
            }
        }
    }

    info
}

fn apply_command(model: &Model, info: &mut DocInfo, cmd: &str, arg: &str, position: Position) {
    let takes_argument = match cmd {
        "nodoc" | "no-doc" => {
            info.is_nodoc = true;
            false
        }
        "inline" => {
            info.is_inline = true;
            false
        }
        "nodiagram" | "no-diagram" => {
            info.is_no_diagram = true;
            false
        }
        "keep-diagram-recursive" => {
            info.keep_diagram_recursive = true;
            false
        }
        "unimportant" => {
            info.importance = 0;
            false
        }
        "importance" => {
            match arg.parse::<i64>() {
                Ok(value) if value < 0 => {
                    model.report(Diagnostic::error(
                        position.clone(),
                        "importance should not be negative",
                    ));
                }
                Ok(value) => info.importance = value.try_into().unwrap_or(u32::MAX),
                Err(_) => {
                    model.report(Diagnostic::error(
                        position.clone(),
                        "importance requires an integer argument",
                    ));
                }
            }
            true
        }
        "name" => {
            if arg.is_empty() {
                model.report(Diagnostic::error(
                    position.clone(),
                    "name command requires an argument",
                ));
            }
            else {
                info.name = Some(arg.to_owned());
            }
            true
        }
        "css-class" => {
            if arg.is_empty() {
                model.report(Diagnostic::error(
                    position.clone(),
                    "css-class command requires an argument",
                ));
            }
            else {
                info.css_class = Some(arg.to_owned());
            }
            true
        }
        "content" => {
            info.content = Some(ContentCommand {
                text: arg.to_owned(),
                position: position.clone(),
            });
            true
        }
        _ => {
            model.report(Diagnostic::error(
                position.clone(),
                format!("unknown command {cmd:?}"),
            ));
            true
        }
    };

    if !takes_argument && !arg.is_empty() {
        model.report(Diagnostic::warning(
            position,
            format!("argument for {cmd:?} command is ignored"),
        ));
    }
}

/// Strips the comment markers and the `*` gutter from a `/** ... */` comment,
/// and dedents its body.
pub fn doc_comment_lines(text: &str) -> Vec<String> {
    let inner = text.strip_prefix("/**").unwrap_or(text);
    let lines = inner.lines().collect::<Vec<_>>();

    if lines.len() <= 1 {
        let line = lines.first().copied().unwrap_or_default();
        return vec![line.strip_suffix("*/").unwrap_or(line).trim().to_owned()];
    }

    let mut out = vec![lines[0].trim().to_owned()];

    let mut body = IsLast::new(lines[1..].iter().copied())
        .map(|(line, is_last)| {
            if is_last {
                line.trim_end()
                    .strip_suffix("*/")
                    .unwrap_or(line)
                    .trim_end()
            }
            else {
                line
            }
        })
        .collect::<Vec<_>>();

    if body.last().map_or(false, |line| line.trim().is_empty()) {
        body.pop();
    }

    if body.iter().all(|line| line.trim_start().starts_with('*')) {
        body = body
            .into_iter()
            .map(|line| &line.trim_start()[1..])
            .collect();
    }

    out.extend(dedent(&body));
    out
}

/// Collects the text of `///` header comments into section documentation.
pub fn load_section<'source>(
    model: &Model,
    comments: impl IntoIterator<Item = Comment<'source>>,
) -> Vec<DocLine> {
    comments
        .into_iter()
        .filter(|comment| comment.kind == CommentKind::Header)
        .map(|comment| {
            DocLine::new(
                comment.line + model.offset(),
                comment.text.trim_start_matches('/').trim(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(kind: CommentKind, text: &str, line: usize) -> Comment<'_> {
        Comment { kind, text, line }
    }

    fn model() -> Model {
        Model::empty("docs-test.g4", 0, true)
    }

    #[test]
    fn it_parses_commands() {
        assert_eq!(
            parse_command("//@ doc:name Fancy Name").unwrap().1,
            ("name", "Fancy Name")
        );
        assert_eq!(parse_command("//@doc : nodoc").unwrap().1, ("nodoc", ""));
        assert!(parse_command("//@ nodoc").is_err());
    }

    #[test]
    fn it_strips_single_line_doc_comments() {
        assert_eq!(doc_comment_lines("/** Hello world. */"), vec!["Hello world."]);
        assert_eq!(doc_comment_lines("/***/"), vec![""]);
    }

    #[test]
    fn it_strips_multi_line_doc_comments() {
        let text = "/** First line.\n     * Second line.\n     *   indented\n     */";
        assert_eq!(
            doc_comment_lines(text),
            vec!["First line.", "Second line.", "  indented"]
        );

        let text = "/**\n    No gutter.\n      Indented.\n*/";
        assert_eq!(doc_comment_lines(text), vec!["", "No gutter.", "  Indented."]);
    }

    #[test]
    fn it_collects_documentation_with_lines() {
        let model = model();
        let info = load_docs(
            &model,
            [comment(CommentKind::Doc, "/** a\n * b\n */", 10)],
            true,
        );
        assert_eq!(
            info.documentation,
            vec![DocLine::new(10, "a"), DocLine::new(11, "b")]
        );
    }

    #[test]
    fn it_applies_commands() {
        let model = model();
        let info = load_docs(
            &model,
            [
                comment(CommentKind::Command, "//@ doc:nodoc", 1),
                comment(CommentKind::Command, "//@ doc:inline", 2),
                comment(CommentKind::Command, "//@ doc:no-diagram", 3),
                comment(CommentKind::Command, "//@ doc:keep-diagram-recursive", 4),
                comment(CommentKind::Command, "//@ doc:importance 5", 5),
                comment(CommentKind::Command, "//@ doc:name Pretty", 6),
                comment(CommentKind::Command, "//@ doc:css-class fancy", 7),
                comment(CommentKind::Command, "//@ doc:content 'a' | 'b'", 8),
            ],
            true,
        );
        assert!(info.is_nodoc);
        assert!(info.is_inline);
        assert!(info.is_no_diagram);
        assert!(info.keep_diagram_recursive);
        assert_eq!(info.importance, 5);
        assert_eq!(info.name.as_deref(), Some("Pretty"));
        assert_eq!(info.css_class.as_deref(), Some("fancy"));
        assert_eq!(info.content.unwrap().text, "'a' | 'b'");
        assert!(model.diagnostics().is_empty());
    }

    #[test]
    fn it_reports_bad_commands() {
        let model = model();
        let info = load_docs(
            &model,
            [
                comment(CommentKind::Command, "//@ doc:importance -1", 1),
                comment(CommentKind::Command, "//@ doc:importance lots", 2),
                comment(CommentKind::Command, "//@ doc:name", 3),
                comment(CommentKind::Command, "//@ doc:frobnicate", 4),
                comment(CommentKind::Command, "//@ doc:nodoc please", 5),
                comment(CommentKind::Command, "//@ whatever", 6),
            ],
            true,
        );
        assert_eq!(info.importance, 1);
        assert!(info.name.is_none());
        assert!(info.is_nodoc);

        let lines = model
            .diagnostics()
            .iter()
            .map(|d| d.position.line)
            .collect::<Vec<_>>();
        assert_eq!(lines, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn it_rejects_commands_where_not_allowed() {
        let model = model();
        let info = load_docs(
            &model,
            [comment(CommentKind::Command, "//@ doc:nodoc", 1)],
            false,
        );
        assert!(!info.is_nodoc);
        assert_eq!(model.diagnostics()[0].message, "commands not allowed here");
    }

    #[test]
    fn it_loads_sections() {
        let model = Model::empty("docs-test.g4", 100, true);
        let docs = load_section(
            &model,
            [
                comment(CommentKind::Header, "/// Expressions", 3),
                comment(CommentKind::Doc, "/** not a header */", 4),
                comment(CommentKind::Header, "///   more", 5),
            ],
        );
        assert_eq!(
            docs,
            vec![DocLine::new(103, "Expressions"), DocLine::new(105, "more")]
        );
    }
}
