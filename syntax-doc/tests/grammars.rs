use std::path::Path;

use syntax_doc::{
    autodoc::{
        self,
        AutodocSettings,
        DocItem,
        Ordering,
    },
    diagram::{
        self,
        Element,
        TextNode,
    },
    model::Model,
    provider::load_file,
    reachable::find_reachable_rules,
};
use tempfile::TempDir;

fn write_grammars(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, text) in files {
        std::fs::write(dir.path().join(name), text).unwrap();
    }
    dir
}

fn load(dir: &Path, name: &str) -> Model {
    let model = load_file(dir.join(name), &Default::default()).unwrap();
    assert!(
        model.diagnostics().is_empty(),
        "diagnostics: {:?}",
        model.diagnostics()
    );
    model
}

const CALC: &str = "grammar Calc;
/** A statement. */
stmt : expr ';' ;
/** An expression. */
expr : NUM | expr '+' expr ;
/** A number. */
NUM : [0-9]+ ;
";

#[test]
fn it_documents_a_small_grammar() {
    let dir = write_grammars(&[("Calc.g4", CALC)]);
    let model = load(dir.path(), "Calc.g4");

    let rules = autodoc::make_order(&model, &Default::default());
    let names = rules.iter().map(|r| r.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["stmt", "expr", "NUM"]);

    let stmt = model.lookup("stmt").unwrap();
    let mut reachable = find_reachable_rules(&stmt)
        .iter()
        .map(|rule| rule.full_name())
        .collect::<Vec<_>>();
    reachable.sort();
    assert_eq!(reachable, vec!["Calc.NUM", "Calc.expr", "Calc.stmt"]);

    match diagram::render(&stmt, &Default::default()) {
        Element::Sequence { items, .. } => {
            assert_eq!(
                items,
                vec![
                    Element::NonTerminal(TextNode::new("expr").with_href("Calc.expr")),
                    Element::terminal("';'"),
                ]
            );
        }
        other => panic!("unexpected diagram: {other:?}"),
    }

    let expr = model.lookup("expr").unwrap();
    match diagram::render(&expr, &Default::default()) {
        Element::Sequence { items, .. } => {
            assert_eq!(items.len(), 2);
            assert_eq!(
                items[0],
                Element::Terminal(TextNode::new("NUM").with_href("Calc.NUM"))
            );
            assert!(matches!(items[1], Element::ZeroOrMore { skip: false, .. }));
        }
        other => panic!("unexpected diagram: {other:?}"),
    }
}

#[test]
fn it_serializes_the_outline() {
    let dir = write_grammars(&[("Calc.g4", CALC)]);
    let model = load(dir.path(), "Calc.g4");

    let doc = autodoc::document(&model, &Default::default());
    let yaml = serde_yaml::to_string(&doc).unwrap();
    assert!(yaml.contains("target: Calc.expr"));
    assert!(yaml.contains("text: A number."));
}

#[test]
fn it_resolves_diamond_imports() {
    let dir = write_grammars(&[
        ("A.g4", "grammar A;\nimport B, C;\na : b c ;\n"),
        ("B.g4", "grammar B;\nimport D;\nb : d ;\n"),
        ("C.g4", "grammar C;\nimport D;\nc : d ;\n"),
        ("D.g4", "grammar D;\nd : 'd' ;\n"),
    ]);
    let a = load(dir.path(), "A.g4");

    let names = a
        .iter_import_tree()
        .iter()
        .map(Model::name)
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["A", "B", "C", "D"]);

    let b = a.imports()[0].clone();
    let c = a.imports()[1].clone();
    assert!(b.imports()[0].ptr_eq(&c.imports()[0]));

    let root = a.lookup("a").unwrap();
    let mut reachable = find_reachable_rules(&root)
        .iter()
        .map(|rule| rule.full_name())
        .collect::<Vec<_>>();
    reachable.sort();
    assert_eq!(reachable, vec!["A.a", "B.b", "C.c", "D.d"]);
}

#[test]
fn it_filters_by_a_root_rule_in_another_grammar() {
    let dir = write_grammars(&[
        (
            "Main.g4",
            "grammar Main;\nstmt : expr ;\nexpr : ID ;\nunused : ID ;\nID : [a-z]+ ;\n",
        ),
        ("Other.g4", "grammar Other;\nimport Main;\nstart : stmt ;\n"),
    ]);
    let main = load(dir.path(), "Main.g4");

    let settings = AutodocSettings {
        undocumented: true,
        root_rule: Some("Other.start".to_owned()),
        ..Default::default()
    };
    let rules = autodoc::make_order(&main, &settings);
    let names = rules.iter().map(|r| r.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["stmt", "expr", "ID"]);

    let settings = AutodocSettings {
        undocumented: true,
        root_rule: Some("Other.g4 start".to_owned()),
        base_path: dir.path().to_owned(),
        ..Default::default()
    };
    let rules = autodoc::make_order(&main, &settings);
    assert_eq!(rules.len(), 3);

    let settings = AutodocSettings {
        undocumented: true,
        root_rule: Some("Missing.start".to_owned()),
        ..Default::default()
    };
    let rules = autodoc::make_order(&main, &settings);
    let names = rules.iter().map(|r| r.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["stmt", "expr", "unused", "ID"]);
}

#[test]
fn it_orders_deterministically() {
    let dir = write_grammars(&[(
        "Order.g4",
        "grammar Order;\nzeta : ALPHA ;\nBeta : 'b' ;\nalpha : Beta ;\nALPHA : 'a' ;\n",
    )]);
    let model = load(dir.path(), "Order.g4");

    let by_name = AutodocSettings {
        undocumented: true,
        ordering: Ordering::ByName,
        ..Default::default()
    };
    let first = autodoc::make_order(&model, &by_name);
    let second = autodoc::make_order(&model, &by_name);
    assert_eq!(first, second);
    let names = first.iter().map(|r| r.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["alpha", "zeta", "ALPHA", "Beta"]);

    let by_source = AutodocSettings {
        undocumented: true,
        ..Default::default()
    };
    let rules = autodoc::make_order(&model, &by_source);
    let names = rules.iter().map(|r| r.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["zeta", "alpha", "Beta", "ALPHA"]);

    let doc = autodoc::document(&model, &by_source);
    assert!(doc.items.iter().all(|item| matches!(item, DocItem::Rule(_))));
}

const SUMS: &str = "\
/** Sums of numbers. */
/** A number. */
%token NUM
%token PLUS \"+\"
%%
/** A sum. */
sum: NUM \"+\" NUM { $$ = $1 + $3; } ;
";

#[test]
fn it_documents_a_bison_grammar() {
    let dir = write_grammars(&[("sums.y", SUMS)]);
    let model = load(dir.path(), "sums.y");
    assert_eq!(model.name(), "sums");
    assert_eq!(model.docs().unwrap()[0].text, "Sums of numbers.");

    let mut names = autodoc::make_order(&model, &Default::default())
        .iter()
        .map(|rule| rule.name.clone())
        .collect::<Vec<_>>();
    names.sort();
    assert_eq!(names, vec!["NUM", "sum"]);

    let sum = model.lookup("sum").unwrap();
    match diagram::render(&sum, &Default::default()) {
        Element::Sequence { items, .. } => {
            assert_eq!(
                items,
                vec![
                    Element::Terminal(TextNode::new("NUM").with_href("sums.NUM")),
                    Element::Terminal(
                        TextNode::new("\"+\"")
                            .with_href("sums.PLUS")
                            .with_text_is_weak(false)
                    ),
                    Element::Terminal(TextNode::new("NUM").with_href("sums.NUM")),
                ]
            );
        }
        other => panic!("unexpected diagram: {other:?}"),
    }
}
