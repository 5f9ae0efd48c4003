//! Bison and Yacc grammars
//!
//! Token declarations become lexer rules without a body. A string alias
//! (`%token NUM "number"`) makes the token a literal, so that rules can refer
//! to it by its alias. Rules keep their symbols and literals. Actions,
//! predicates and `%prec`-like modifiers are dropped.
//!
//! Whether single quotes delimit C character literals is controlled by
//! [`LoadingOptions::use_c_char_literals`]. If they do, a single-quoted
//! literal with more than one character is reported.
//!
//! Documentation comments work as for ANTLR4 grammars. Tokens that Bison never
//! sees can be declared with a `//@ %token NAME` comment.

mod ast;
mod builder;
mod parser;

use std::{
    collections::HashMap,
    path::{
        Path,
        PathBuf,
    },
    sync::{
        Mutex,
        OnceLock,
    },
};

use self::builder::Builder;
use crate::{
    diagnostics::Diagnostic,
    model::{
        Model,
        Position,
    },
    provider::{
        LoadingOptions,
        ModelProvider,
    },
};

/// Loads `.y` files. Models are named after the file.
#[derive(Debug, Default)]
pub struct BisonProvider {
    loaded: Mutex<HashMap<PathBuf, Model>>,
}

impl BisonProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// The provider that is registered by default.
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<BisonProvider> = OnceLock::new();
        GLOBAL.get_or_init(Self::new)
    }

    fn populate(&self, model: &Model, text: &str, options: &LoadingOptions) {
        match parser::parse(text) {
            Ok(grammar) => Builder::new(options, model, text).build(&grammar),
            Err(e) => {
                model.report(Diagnostic::error(
                    Position::new(model.path(), e.line + model.offset()),
                    format!("syntax error:\n{}", e.message),
                ));
            }
        }
    }
}

impl ModelProvider for BisonProvider {
    fn name(&self) -> &str {
        "bison"
    }

    fn supported_extensions(&self) -> &[&str] {
        &["y", "yy"]
    }

    fn from_file(&self, path: &Path, options: &LoadingOptions) -> Model {
        let path = path.canonicalize().unwrap_or_else(|_| {
            std::env::current_dir()
                .map(|dir| dir.join(path))
                .unwrap_or_else(|_| path.to_owned())
        });

        let mut loaded = self.loaded.lock().expect("model cache mutex poisened");
        if let Some(model) = loaded.get(&path) {
            return model.clone();
        }
        let model = Model::empty(&path, 0, false);
        loaded.insert(path.clone(), model.clone());
        drop(loaded);

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        content::{
            self,
            LineBreak,
        },
        model::DocLine,
        provider::find_provider,
    };

    const CALC: &str = "\
/** A calculator. */
%{
#include <math.h>
%}

/// Tokens
/** A number. */
%token <double> NUM
%token PLUS \"+\" MINUS \"-\"
//@ doc:name white space
//@ %token WS
%left '-' '+'

%%

/** A line of input. */
input: %empty
     | input line
     ;

line: '\\n'
    | exp '\\n'  { printf (\"%.10g\\n\", $1); }
    ;

/// Expressions
exp: NUM
   | exp \"+\" exp  { $$ = $1 + $3; }
   | exp MINUS exp  { $$ = $1 - $3; }
   | '(' exp ')'  { $$ = $2; }
   ;
%%
int main(void) { return yyparse(); }
";

    fn load(text: &str) -> Model {
        BisonProvider::new().from_text(text, Path::new("calc.y"), 0, &[])
    }

    #[test]
    fn it_loads_a_grammar() {
        let model = load(CALC);
        assert!(model.diagnostics().is_empty(), "{:?}", model.diagnostics());
        assert_eq!(model.name(), "calc");
        assert_eq!(model.docs(), Some(vec![DocLine::new(1, "A calculator.")]));

        let terminals = model
            .get_terminals()
            .iter()
            .map(|rule| rule.name.clone())
            .collect::<Vec<_>>();
        assert_eq!(terminals, vec!["NUM", "PLUS", "MINUS", "WS"]);

        let non_terminals = model
            .get_non_terminals()
            .iter()
            .map(|rule| rule.name.clone())
            .collect::<Vec<_>>();
        assert_eq!(non_terminals, vec!["input", "line", "exp"]);
    }

    #[test]
    fn it_documents_tokens() {
        let model = load(CALC);

        let num = model.lookup("NUM").unwrap();
        assert!(num.content.is_none());
        assert_eq!(num.documentation, vec![DocLine::new(7, "A number.")]);
        assert_eq!(num.position.line, 8);
        let tokens = num.section.clone().unwrap();
        assert_eq!(tokens.docs[0].text, "Tokens");
        assert_eq!(tokens.position.line, 6);

        let plus = model.lookup("PLUS").unwrap();
        assert!(plus.is_literal());
        assert_eq!(plus.content, Some(content::literal("\"+\"")));
        assert!(model.lookup("\"+\"").unwrap().ptr_eq(&plus));
        assert!(plus.section.is_none());

        let ws = model.lookup("WS").unwrap();
        assert_eq!(ws.display_name.as_deref(), Some("white space"));
        assert_eq!(ws.position.line, 11);
    }

    #[test]
    fn it_builds_rule_bodies() {
        let model = load(CALC);

        let input = model.lookup("input").unwrap();
        assert_eq!(input.documentation, vec![DocLine::new(16, "A line of input.")]);
        assert_eq!(
            input.content,
            Some(content::alternative([
                content::empty(),
                content::sequence([
                    content::reference(&model, "input"),
                    content::reference(&model, "line"),
                ]),
            ]))
        );
        let branch = input.content.as_ref().unwrap().as_alternative().unwrap()[1].clone();
        assert_eq!(
            branch.as_sequence().unwrap().linebreaks,
            vec![LineBreak::Soft]
        );

        let exp = model.lookup("exp").unwrap();
        assert!(exp.section.is_some());
        let branches = exp.content.as_ref().unwrap().as_alternative().unwrap().to_vec();
        assert_eq!(branches.len(), 4);
        assert_eq!(
            branches[1],
            content::sequence([
                content::reference(&model, "exp"),
                content::reference(&model, "\"+\""),
                content::reference(&model, "exp"),
            ])
        );
        assert_eq!(
            branches[3],
            content::sequence([
                content::literal("'('"),
                content::reference(&model, "exp"),
                content::literal("')'"),
            ])
        );
    }

    #[test]
    fn it_merges_rule_definitions() {
        let model = load("%%\na: 'x' ;\n/** More. */\na: 'y' ;\n");
        let a = model.lookup("a").unwrap();
        assert_eq!(model.get_non_terminals().len(), 1);
        assert_eq!(a.position.line, 2);
        assert_eq!(
            a.content,
            Some(content::alternative([
                content::literal("'x'"),
                content::literal("'y'")
            ]))
        );
        assert_eq!(a.documentation, vec![DocLine::new(3, "More.")]);
    }

    #[test]
    fn it_checks_c_char_literals() {
        let text = "%%\na: 'abc' ;\n";

        let model = load(text);
        let diagnostics = model.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].position.line, 2);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strings.y");
        std::fs::write(&path, text).unwrap();
        let options = LoadingOptions {
            use_c_char_literals: false,
        };
        let model = BisonProvider::new().from_file(&path, &options);
        assert!(model.diagnostics().is_empty());
        assert_eq!(
            model.lookup("a").unwrap().content,
            Some(content::literal("'abc'"))
        );
    }

    #[test]
    fn it_rejects_content_commands_on_rules() {
        let model = load(
            "//@ doc:content 'x'\n\
             %token X\n\
             %%\n\
             //@ doc:content 'y'\n\
             a: X ;\n",
        );

        let x = model.lookup("X").unwrap();
        assert_eq!(x.content, Some(content::literal("'x'")));
        assert!(x.is_literal());

        let diagnostics = model.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].position.line, 4);
    }

    #[test]
    fn it_reports_syntax_errors() {
        let model = BisonProvider::new().from_text("%token A\n", Path::new("broken.y"), 5, &[]);
        assert!(model.get_all_rules().is_empty());
        let diagnostics = model.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.starts_with("syntax error"));
    }

    #[test]
    fn it_is_registered() {
        let provider = find_provider(Path::new("grammar.y")).unwrap();
        assert_eq!(provider.name(), "bison");
    }
}
