//! ANTLR4 grammars
//!
//! Only what matters for documentation is kept from a grammar: its imports,
//! token declarations and the rule bodies. Actions, predicates, lexer
//! commands, labels and modes are dropped.
//!
//! In lexer rules, string literals stay literals. In parser rules they refer to
//! the lexer rule that matches exactly that literal, if there is one.

pub(crate) mod ast;
mod builder;
pub(crate) mod parser;

use std::{
    collections::HashMap,
    path::{
        Path,
        PathBuf,
    },
    str::FromStr,
    sync::{
        Mutex,
        OnceLock,
    },
};

use itertools::Itertools;

pub(crate) use self::builder::build_lexer_body;
use self::builder::Builder;
use crate::{
    content,
    diagnostics::Diagnostic,
    diagram::{
        self,
        Element,
        RenderSettings,
    },
    model::{
        Model,
        Position,
    },
    provider::{
        LoadingOptions,
        ModelProvider,
    },
    Error,
};

/// Loads `.g4` files.
///
/// Loaded models are cached by path, so a grammar that is imported by several
/// others is only loaded once.
#[derive(Debug, Default)]
pub struct Antlr4Provider {
    loaded: Mutex<HashMap<PathBuf, Model>>,
}

impl Antlr4Provider {
    pub fn new() -> Self {
        Self::default()
    }

    /// The provider that is registered by default.
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<Antlr4Provider> = OnceLock::new();
        GLOBAL.get_or_init(Self::new)
    }

    fn populate(&self, model: &Model, text: &str, options: &LoadingOptions) {
        match parser::parse(text) {
            Ok(grammar) => Builder::new(self, options, model, text).build(&grammar),
            Err(e) => {
                model.report(Diagnostic::error(
                    Position::new(model.path(), e.line + model.offset()),
                    format!("syntax error:\n{}", e.message),
                ));
            }
        }
    }
}

impl ModelProvider for Antlr4Provider {
    fn name(&self) -> &str {
        "antlr4"
    }

    fn supported_extensions(&self) -> &[&str] {
        &["g4"]
    }

    fn from_file(&self, path: &Path, options: &LoadingOptions) -> Model {
        let path = path.canonicalize().unwrap_or_else(|_| {
            std::env::current_dir()
                .map(|dir| dir.join(path))
                .unwrap_or_else(|_| path.to_owned())
        });

        // the model is cached before it's populated, so that import cycles
        // end here.
        let model = {
            let mut loaded = self.loaded.lock().expect("model cache mutex poisened");
            if let Some(model) = loaded.get(&path) {
                return model.clone();
            }
            let model = Model::empty(&path, 0, false);
            loaded.insert(path.clone(), model.clone());
            model
        };

        tracing::debug!(path = %path.display(), "loading grammar file");

        match std::fs::read_to_string(&path) {
            Ok(text) => self.populate(&model, &text, options),
            Err(e) => {
                model.report(Diagnostic::error(
                    Position::new(&path, 1),
                    format!("can't load grammar: {e}"),
                ));
            }
        }

        model
    }

    fn from_text(&self, text: &str, path: &Path, offset: usize, imports: &[Model]) -> Model {
        let model = Model::empty(path, offset, true);
        for import in imports {
            model.add_import(import.clone());
        }
        self.populate(&model, text, &LoadingOptions::default());
        model
    }
}

/// Kind of rule body passed to [`render_fragment`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FragmentKind {
    Lexer,
    Parser,
}

impl FromStr for FragmentKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lexer" => Ok(Self::Lexer),
            "parser" => Ok(Self::Parser),
            _ => {
                Err(Error::InvalidOption {
                    option: "fragment-kind",
                    value: s.to_owned(),
                })
            }
        }
    }
}

/// Renders a diagram for a rule body that isn't part of any grammar file.
///
/// References in `body` are looked up in `imports`. `path` and `offset` are
/// only used to report positions.
pub fn render_fragment(
    kind: FragmentKind,
    body: &str,
    path: &Path,
    offset: usize,
    imports: &[Model],
    settings: &RenderSettings,
) -> Result<Element, Error> {
    let (name, text) = match kind {
        FragmentKind::Lexer => ("ROOT", format!("grammar Fragment; ROOT : {body} ;")),
        FragmentKind::Parser => ("root", format!("grammar Fragment; root : {body} ;")),
    };

    let model = Antlr4Provider::global().from_text(&text, path, offset, imports);

    let result = match model.lookup_local(name) {
        Some(rule) if rule.content.is_some() => Ok(diagram::render(&rule, settings)),
        _ => {
            let diagnostics = model.diagnostics();
            if diagnostics.is_empty() {
                Err(Error::Parse("cannot parse the rule".to_owned()))
            }
            else {
                Err(Error::Parse(
                    diagnostics.iter().map(|d| &d.message).join("\n"),
                ))
            }
        }
    };

    // the fragment's model is gone now, and so are the only handles to most of
    // its rule bodies.
    drop(model);
    let pruned = content::prune_interned();
    tracing::trace!(pruned, "rendered fragment");

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        content::{
            self,
            LineBreak,
            Node,
        },
        diagnostics::Severity,
        model::DocLine,
    };

    fn load(text: &str) -> Model {
        Antlr4Provider::new().from_text(text, Path::new("Test.g4"), 0, &[])
    }

    #[test]
    fn it_loads_rules() {
        let model = load(
            "grammar Test;\n\
             expr : term ('+' term)* ;\n\
             term : NUM | '(' expr ')' ;\n\
             NUM : [0-9]+ ;\n\
             fragment DIGIT : '0'..'9' ;\n\
             PLUS : '+' ;\n",
        );

        assert!(model.diagnostics().is_empty());
        assert_eq!(model.name(), "Test");
        assert_eq!(model.get_non_terminals().len(), 2);
        assert_eq!(model.get_terminals().len(), 3);

        let digit = model.lookup("DIGIT").unwrap();
        assert!(digit.is_fragment());
        assert_eq!(digit.content, Some(content::range("'0'", "'9'")));

        let plus = model.lookup("PLUS").unwrap();
        assert!(plus.is_literal());
        assert!(model.lookup("'+'").unwrap().ptr_eq(&plus));

        let expr = model.lookup("expr").unwrap();
        assert_eq!(expr.position.line, 2);
        assert_eq!(expr.to_string(), "expr\n  : term ('+' term)*\n  ;");
    }

    #[test]
    fn it_resolves_parser_literals_to_tokens() {
        let model = load("grammar Test; stmt : 'let' ID ; LET : 'let' ; ID : [a-z]+ ;");
        let stmt = model.lookup("stmt").unwrap();
        let sequence = stmt.content.as_ref().unwrap().as_sequence().unwrap().clone();
        let target = sequence.children[0]
            .as_reference()
            .unwrap()
            .get_reference()
            .unwrap();
        assert_eq!(target.name, "LET");
    }

    #[test]
    fn it_separates_elements_with_soft_linebreaks() {
        let model = load("grammar Test; a : b (c d) e ;");
        let a = model.lookup("a").unwrap();
        let sequence = a.content.as_ref().unwrap().as_sequence().unwrap().clone();
        assert_eq!(sequence.children.len(), 4);
        assert_eq!(
            sequence.linebreaks,
            vec![LineBreak::Soft, LineBreak::Default, LineBreak::Soft]
        );
    }

    #[test]
    fn it_loads_grammars_with_braces_in_action_literals() {
        let model = load(
            "grammar Test;\n\
             @members { int x = '}'; String s = \"{\"; }\n\
             e : ID {System.out.println(\"}\");} ;\n\
             ID : [a-z]+ ;\n",
        );

        assert!(model.diagnostics().is_empty());
        assert_eq!(model.get_all_rules().len(), 2);
        assert!(model.lookup("e").is_some());
    }

    #[test]
    fn it_uses_default_linebreaks_inside_blocks_seen_before() {
        // `c d` is interned with a soft break by `x` before `a` uses it in a block
        let model = load("grammar Test; x : c d ; a : b (c d) e ;");

        let x = model.lookup("x").unwrap();
        let inner = x.content.as_ref().unwrap().as_sequence().unwrap().clone();
        assert_eq!(inner.linebreaks, vec![LineBreak::Soft]);

        let a = model.lookup("a").unwrap();
        let sequence = a.content.as_ref().unwrap().as_sequence().unwrap().clone();
        assert_eq!(sequence.children.len(), 4);
        assert_eq!(
            sequence.linebreaks,
            vec![LineBreak::Soft, LineBreak::Default, LineBreak::Soft]
        );
    }

    #[test]
    fn it_builds_suffixes_and_empty_elements() {
        let model = load("grammar Test; A : 'a'? '' [] {action();} ; b : c* d+ ;");
        let a = model.lookup("A").unwrap();
        assert_eq!(
            a.content,
            Some(content::alternative([
                content::empty(),
                content::literal("'a'")
            ]))
        );
        assert!(!a.is_literal());

        let b = model.lookup("b").unwrap();
        let sequence = b.content.as_ref().unwrap().as_sequence().unwrap().clone();
        assert!(matches!(sequence.children[0].node(), Node::ZeroPlus(_)));
        assert!(matches!(sequence.children[1].node(), Node::OnePlus(_)));
    }

    #[test]
    fn it_keeps_inline_docs() {
        let model = load("grammar Test; a : b /** then c */ c ;");
        let a = model.lookup("a").unwrap();
        let sequence = a.content.as_ref().unwrap().as_sequence().unwrap().clone();
        assert_eq!(sequence.children[1], content::doc("then c"));
    }

    #[test]
    fn it_loads_documentation() {
        let model = load(
            "/** The test grammar. */\n\
             grammar Test;\n\
             \n\
             /** An expression.\n  * Really.\n  */\n\
             //@ doc:importance 3\n\
             //@ doc:name Expression\n\
             expr : NUM ;\n\
             //@ doc:nodoc\n\
             NUM : [0-9]+ ;\n",
        );

        assert_eq!(
            model.docs(),
            Some(vec![DocLine::new(1, "The test grammar.")])
        );

        let expr = model.lookup("expr").unwrap();
        assert_eq!(
            expr.documentation,
            vec![DocLine::new(4, "An expression."), DocLine::new(5, "Really.")]
        );
        assert_eq!(expr.importance, 3);
        assert_eq!(expr.display_name.as_deref(), Some("Expression"));
        assert!(model.lookup("NUM").unwrap().is_nodoc);
    }

    #[test]
    fn it_rejects_commands_before_the_header() {
        let model = load("//@ doc:nodoc\ngrammar Test; a : b ;");
        assert!(model.docs().is_none());
        assert_eq!(model.diagnostics()[0].message, "commands not allowed here");
    }

    #[test]
    fn it_applies_sections_to_the_rule_after_the_header() {
        let model = load(
            "grammar Test;\n\
             a : x ;\n\
             /// Expressions\n\
             b : x ;\n\
             c : x ;\n\
             /// Statements\n\
             d : x ;\n\
             ID : [a-z]+ ;\n",
        );

        let section = |name| model.lookup(name).unwrap().section.clone();
        assert!(section("a").is_none());

        let expressions = section("b").unwrap();
        assert_eq!(expressions.docs, vec![DocLine::new(3, "Expressions")]);
        assert_eq!(expressions.position.line, 3);
        assert!(section("c").is_none());

        let statements = section("d").unwrap();
        assert_ne!(statements, expressions);
        assert_eq!(statements.docs[0].text, "Statements");
        assert!(section("ID").is_none());
    }

    #[test]
    fn it_loads_tokens() {
        let model = load(
            "grammar Test;\n\
             tokens {\n\
             /// Layout\n\
             /** Increases indentation. */\n\
             INDENT,\n\
             //@ doc:content '<dedent>'\n\
             DEDENT\n\
             }\n\
             a : INDENT a DEDENT ;\n",
        );

        let indent = model.lookup("INDENT").unwrap();
        assert!(indent.content.is_none());
        assert!(indent.is_lexer());
        assert_eq!(indent.position.line, 5);
        assert_eq!(indent.documentation[0].text, "Increases indentation.");
        assert_eq!(indent.section.as_ref().unwrap().docs[0].text, "Layout");

        let dedent = model.lookup("DEDENT").unwrap();
        assert_eq!(dedent.content, Some(content::literal("'<dedent>'")));
        assert!(dedent.is_literal());
        assert!(dedent.section.is_none());
        assert!(model.lookup("'<dedent>'").is_some());

        assert!(model.lookup("a").unwrap().section.is_none());
    }

    #[test]
    fn it_replaces_lexer_content() {
        let model = load(
            "grammar Test;\n\
             //@ doc:content 'a' | 'b'\n\
             AB : [ab] ;\n\
             //@ doc:content 'c'\n\
             c : AB ;\n\
             //@ doc:content (\n\
             D : 'd' ;\n",
        );

        let ab = model.lookup("AB").unwrap();
        assert_eq!(
            ab.content,
            Some(content::alternative([
                content::literal("'a'"),
                content::literal("'b'")
            ]))
        );

        let messages = model
            .diagnostics()
            .iter()
            .map(|d| (d.position.line, d.message.clone()))
            .collect::<Vec<_>>();
        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages[0],
            (
                4,
                "'content' command can't appear before parser rules".to_owned()
            )
        );
        assert_eq!(messages[1].0, 6);
        assert!(messages[1].1.starts_with("can't parse content"));

        assert_eq!(model.lookup("D").unwrap().content, Some(content::literal("'d'")));
    }

    #[test]
    fn it_reports_syntax_errors() {
        let model = Antlr4Provider::new().from_text(
            "grammar Broken;\n\na : b\n",
            Path::new("Broken.g4"),
            10,
            &[],
        );
        let diagnostics = model.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Severity::Error);
        assert_eq!(diagnostics[0].position.line, 14);
        assert!(diagnostics[0].message.starts_with("syntax error"));
        assert_eq!(model.name(), "Broken");
        assert!(model.get_all_rules().is_empty());
    }

    #[test]
    fn it_rejects_imports_in_memory() {
        let model = load("grammar Test;\nimport Other;\na : b ;");
        assert_eq!(
            model.diagnostics()[0].message,
            "imports are not allowed for in-memory grammars"
        );
        assert_eq!(model.diagnostics()[0].position.line, 2);
        assert!(model.imports().is_empty());
        assert!(model.lookup("a").is_some());
    }

    #[test]
    fn it_uses_given_imports_in_memory() {
        let base = load("grammar Base; NUM : [0-9]+ ;");
        let model =
            Antlr4Provider::new().from_text("grammar Test; a : NUM ;", Path::new("x.g4"), 0, &[base]);
        assert_eq!(model.lookup("NUM").unwrap().full_name(), "Base.NUM");
    }

    #[test]
    fn it_loads_imports_from_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("Main.g4"),
            "parser grammar Main;\noptions { tokenVocab = Lex; }\nimport Common;\nstmt : expr SEMI ;\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("Lex.g4"),
            "lexer grammar Lex;\nSEMI : ';' ;\nNUM : [0-9]+ ;\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("Common.g4"),
            "grammar Common;\nimport Main;\nexpr : NUM ;\n",
        )
        .unwrap();

        let provider = Antlr4Provider::new();
        let main = provider.from_file(&dir.path().join("Main.g4"), &Default::default());
        assert!(main.diagnostics().is_empty());

        let names = main.imports().iter().map(Model::name).collect::<Vec<_>>();
        assert_eq!(names, vec!["Lex", "Common"]);
        assert_eq!(main.lookup("NUM").unwrap().full_name(), "Lex.NUM");
        assert_eq!(main.lookup("expr").unwrap().full_name(), "Common.expr");

        // Common imports Main back, which must be the same cached model
        let common = main.imports()[1].clone();
        assert!(common.imports()[0].ptr_eq(&main));

        let again = provider.from_file(&dir.path().join("Main.g4"), &Default::default());
        assert!(again.ptr_eq(&main));
    }

    #[test]
    fn it_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Main.g4"), "grammar Main;\nimport Gone;\n").unwrap();

        let main = Antlr4Provider::new().from_file(&dir.path().join("Main.g4"), &Default::default());
        let gone = main.imports()[0].clone();
        assert_eq!(gone.name(), "Gone");
        assert_eq!(gone.diagnostics().len(), 1);
        assert!(gone.diagnostics()[0].message.starts_with("can't load grammar"));
        assert!(gone.get_all_rules().is_empty());
    }

    #[test]
    fn it_renders_fragments() {
        let element = render_fragment(
            FragmentKind::Parser,
            "'a' | 'b'",
            Path::new("doc.md"),
            0,
            &[],
            &Default::default(),
        )
        .unwrap();
        assert!(matches!(element, Element::Choice { .. }));

        let element = render_fragment(
            FragmentKind::Lexer,
            "[0-9]+",
            Path::new("doc.md"),
            0,
            &[],
            &Default::default(),
        )
        .unwrap();
        assert!(matches!(element, Element::OneOrMore { .. }));
    }

    #[test]
    fn it_keeps_imported_bodies_after_rendering_fragments() {
        let imported = Antlr4Provider::new().from_text(
            "grammar Digits; DIGITS : [0-9]+ 'kept after fragments' ;",
            Path::new("Digits.g4"),
            0,
            &[],
        );
        let before = imported.lookup("DIGITS").unwrap().content.clone().unwrap();

        let element = render_fragment(
            FragmentKind::Parser,
            "DIGITS 'dropped after fragments'",
            Path::new("doc.md"),
            0,
            &[imported.clone()],
            &Default::default(),
        )
        .unwrap();
        assert!(matches!(element, Element::Sequence { .. }));

        let after = imported.lookup("DIGITS").unwrap().content.clone().unwrap();
        assert!(after.ptr_eq(&before));
        assert!(content::sequence([
            content::one_plus(content::char_set("[0-9]")),
            content::literal("'kept after fragments'"),
        ])
        .ptr_eq(&before));
    }

    #[test]
    fn it_fails_on_broken_fragments() {
        let result = render_fragment(
            FragmentKind::Parser,
            "'a' |)",
            Path::new("doc.md"),
            0,
            &[],
            &Default::default(),
        );
        match result {
            Err(Error::Parse(message)) => assert!(message.starts_with("syntax error")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn it_parses_fragment_kinds() {
        assert_eq!("lexer".parse::<FragmentKind>().unwrap(), FragmentKind::Lexer);
        assert_eq!("parser".parse::<FragmentKind>().unwrap(), FragmentKind::Parser);
        assert!("other".parse::<FragmentKind>().is_err());
    }
}
