//! Grammar model
//!
//! A [`Model`] holds everything that was loaded from one grammar file: its
//! name and documentation, the grammars it imports and its rules.

use std::{
    collections::{
        HashMap,
        HashSet,
        VecDeque,
    },
    fmt,
    hash::{
        Hash,
        Hasher,
    },
    path::{
        Path,
        PathBuf,
    },
    sync::{
        atomic::{
            AtomicU64,
            Ordering,
        },
        Arc,
        RwLock,
        RwLockReadGuard,
        RwLockWriteGuard,
        Weak,
    },
};

use derivative::Derivative;
use serde::Serialize;

use crate::{
    content::RuleContent,
    diagnostics::Diagnostic,
};

/// Unique id of a model, stable for the lifetime of the process.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub struct ModelId(u64);

impl ModelId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A location in a grammar file.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Position {
    pub file: PathBuf,
    pub line: usize,
}

impl Position {
    pub fn new(file: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

/// A single line of documentation together with the source line it came
/// from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DocLine {
    pub line: usize,
    pub text: String,
}

impl DocLine {
    pub fn new(line: usize, text: impl Into<String>) -> Self {
        Self {
            line,
            text: text.into(),
        }
    }
}

#[derive(Debug)]
pub struct SectionData {
    pub docs: Vec<DocLine>,
    pub position: Position,
}

/// A section header, i.e. a group of header comments that precede a block of
/// rules.
///
/// Sections compare by identity.
#[derive(Clone, Debug, derive_more::Deref)]
pub struct Section(Arc<SectionData>);

impl Section {
    pub fn new(docs: Vec<DocLine>, position: Position) -> Self {
        Self(Arc::new(SectionData { docs, position }))
    }
}

impl PartialEq for Section {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Section {}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RuleKind {
    Lexer {
        /// The rule body is a single literal.
        is_literal: bool,
        is_fragment: bool,
    },
    Parser,
}

#[derive(Derivative)]
#[derivative(Debug)]
pub struct RuleData {
    pub name: String,

    /// Human readable name, set by the `name` documentation command.
    pub display_name: Option<String>,

    #[derivative(Debug = "ignore")]
    pub model: WeakModel,

    pub position: Position,

    /// `None` for tokens that are declared without a body.
    pub content: Option<RuleContent>,

    pub kind: RuleKind,

    pub is_nodoc: bool,
    pub is_inline: bool,
    pub is_no_diagram: bool,
    pub keep_diagram_recursive: bool,
    pub css_class: Option<String>,
    pub importance: u32,

    pub documentation: Vec<DocLine>,

    #[derivative(Debug = "ignore")]
    pub section: Option<Section>,
}

impl RuleData {
    /// Creates rule data with default metadata.
    pub fn new(
        name: impl Into<String>,
        model: &Model,
        position: Position,
        content: Option<RuleContent>,
        kind: RuleKind,
    ) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            model: model.downgrade(),
            position,
            content,
            kind,
            is_nodoc: false,
            is_inline: false,
            is_no_diagram: false,
            keep_diagram_recursive: false,
            css_class: None,
            importance: 1,
            documentation: vec![],
            section: None,
        }
    }
}

/// A lexer or parser rule.
///
/// Rules are immutable once loaded and compare by identity. This internally
/// uses an `Arc`, so it's cheap to clone.
#[derive(Clone, Debug, derive_more::Deref)]
pub struct Rule(Arc<RuleData>);

impl Rule {
    pub fn new(data: RuleData) -> Self {
        Self(Arc::new(data))
    }

    pub fn model(&self) -> Option<Model> {
        self.model.upgrade()
    }

    pub fn is_lexer(&self) -> bool {
        matches!(self.kind, RuleKind::Lexer { .. })
    }

    pub fn is_parser(&self) -> bool {
        matches!(self.kind, RuleKind::Parser)
    }

    pub fn is_fragment(&self) -> bool {
        matches!(
            self.kind,
            RuleKind::Lexer {
                is_fragment: true,
                ..
            }
        )
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self.kind,
            RuleKind::Lexer {
                is_literal: true,
                ..
            }
        )
    }

    /// Name of the owning grammar and of the rule, separated by a dot.
    pub fn full_name(&self) -> String {
        match self.model() {
            Some(model) => format!("{}.{}", model.name(), self.name),
            None => self.name.clone(),
        }
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Rule {}

impl Hash for Rule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        match &self.content {
            None => writeln!(f, "  : <implicit>")?,
            Some(content) => {
                match content.as_alternative() {
                    Some(children) => {
                        for (i, child) in children.iter().enumerate() {
                            let sep = if i == 0 { ':' } else { '|' };
                            writeln!(f, "  {sep} {child}")?;
                        }
                    }
                    None => writeln!(f, "  : {content}")?,
                }
            }
        }
        write!(f, "  ;")
    }
}

/// Rules of one kind, in declaration order.
#[derive(Debug, Default)]
struct RuleTable {
    rules: Vec<Rule>,
    by_name: HashMap<String, Rule>,
}

impl RuleTable {
    fn insert(&mut self, rule: Rule) {
        if let Some(previous) = self.by_name.insert(rule.name.clone(), rule.clone()) {
            if let Some(slot) = self.rules.iter_mut().find(|r| r.ptr_eq(&previous)) {
                *slot = rule;
                return;
            }
        }
        self.rules.push(rule);
    }

    /// Makes the rule findable under another name, e.g. its literal.
    fn alias(&mut self, alias: String, rule: Rule) {
        self.by_name.insert(alias, rule);
    }
}

#[derive(Debug, Default)]
struct ModelData {
    name: String,
    docs: Option<Vec<DocLine>>,
    imports: Vec<Model>,
    terminals: RuleTable,
    non_terminals: RuleTable,
    diagnostics: Vec<Diagnostic>,
}

struct ModelInner {
    id: ModelId,
    path: PathBuf,
    in_memory: bool,
    offset: usize,
    data: RwLock<ModelData>,
}

/// A loaded grammar.
///
/// This internally uses an `Arc`, so it's cheap to clone. Models compare by
/// identity.
#[derive(Clone)]
pub struct Model {
    inner: Arc<ModelInner>,
}

impl Model {
    /// Creates an empty model. Its name defaults to the file stem of `path`.
    ///
    /// `offset` is added to all line numbers, for grammars that are embedded
    /// into some other file.
    pub fn empty(path: impl Into<PathBuf>, offset: usize, in_memory: bool) -> Self {
        let path = path.into();
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            inner: Arc::new(ModelInner {
                id: ModelId::next(),
                path,
                in_memory,
                offset,
                data: RwLock::new(ModelData {
                    name,
                    ..Default::default()
                }),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, ModelData> {
        self.inner.data.read().expect("model lock poisened")
    }

    fn write(&self) -> RwLockWriteGuard<'_, ModelData> {
        self.inner.data.write().expect("model lock poisened")
    }

    pub fn id(&self) -> ModelId {
        self.inner.id
    }

    pub fn downgrade(&self) -> WeakModel {
        WeakModel(Arc::downgrade(&self.inner))
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Name of the grammar.
    pub fn name(&self) -> String {
        self.read().name.clone()
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Whether this model was loaded from a text snippet rather than a file.
    pub fn is_in_memory(&self) -> bool {
        self.inner.in_memory
    }

    pub fn offset(&self) -> usize {
        self.inner.offset
    }

    /// Documentation from the top of the grammar file, if there was any.
    pub fn docs(&self) -> Option<Vec<DocLine>> {
        self.read().docs.clone()
    }

    pub fn imports(&self) -> Vec<Model> {
        self.read().imports.clone()
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.read().diagnostics.clone()
    }

    /// Looks up a rule in this model only. Parser rules shadow lexer rules.
    pub fn lookup_local(&self, name: &str) -> Option<Rule> {
        let data = self.read();
        data.non_terminals
            .by_name
            .get(name)
            .or_else(|| data.terminals.by_name.get(name))
            .cloned()
    }

    /// Looks up a rule in this model and then in all transitively imported
    /// models, in the order of [`iter_import_tree`](Self::iter_import_tree).
    pub fn lookup(&self, name: &str) -> Option<Rule> {
        self.iter_import_tree()
            .into_iter()
            .find_map(|model| model.lookup_local(name))
    }

    /// Returns this model and all models it imports, directly or indirectly.
    ///
    /// Models are visited breadth-first in import declaration order, and each
    /// model is returned exactly once, even if imports form a cycle.
    pub fn iter_import_tree(&self) -> Vec<Model> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        let mut models = vec![];

        seen.insert(self.id());
        queue.push_back(self.clone());

        while let Some(model) = queue.pop_front() {
            for import in model.imports() {
                if seen.insert(import.id()) {
                    queue.push_back(import);
                }
            }
            models.push(model);
        }

        models
    }

    /// Lexer rules, in declaration order.
    pub fn get_terminals(&self) -> Vec<Rule> {
        self.read().terminals.rules.clone()
    }

    /// Parser rules, in declaration order.
    pub fn get_non_terminals(&self) -> Vec<Rule> {
        self.read().non_terminals.rules.clone()
    }

    /// Lexer rules followed by parser rules.
    pub fn get_all_rules(&self) -> Vec<Rule> {
        let data = self.read();
        data.terminals
            .rules
            .iter()
            .chain(data.non_terminals.rules.iter())
            .cloned()
            .collect()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        self.write().name = name.into();
    }

    pub fn set_docs(&self, docs: Option<Vec<DocLine>>) {
        self.write().docs = docs;
    }

    pub fn add_import(&self, model: Model) {
        let mut data = self.write();
        if !data.imports.iter().any(|m| m.ptr_eq(&model)) {
            data.imports.push(model);
        }
    }

    pub fn add_lexer_rule(&self, rule: Rule) {
        let mut data = self.write();
        if let Some(literal) = rule
            .is_literal()
            .then(|| rule.content.as_ref().and_then(|c| c.as_literal()))
            .flatten()
        {
            data.terminals.alias(literal.to_owned(), rule.clone());
        }
        data.terminals.insert(rule);
    }

    pub fn add_parser_rule(&self, rule: Rule) {
        self.write().non_terminals.insert(rule);
    }

    /// Logs a diagnostic and keeps it with the model.
    pub fn report(&self, diagnostic: Diagnostic) {
        diagnostic.log();
        self.write().diagnostics.push(diagnostic);
    }
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Model {}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("path", &self.path())
            .finish()
    }
}

/// A non-owning handle to a [`Model`].
#[derive(Clone, Debug, Default)]
pub struct WeakModel(Weak<ModelInner>);

impl WeakModel {
    pub fn upgrade(&self) -> Option<Model> {
        Some(Model {
            inner: self.0.upgrade()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content;

    fn lexer_rule(model: &Model, name: &str, content: RuleContent) -> Rule {
        let is_literal = content.as_literal().is_some();
        Rule::new(RuleData::new(
            name,
            model,
            Position::new(model.path(), 1),
            Some(content),
            RuleKind::Lexer {
                is_literal,
                is_fragment: false,
            },
        ))
    }

    fn parser_rule(model: &Model, name: &str, line: usize, content: RuleContent) -> Rule {
        Rule::new(RuleData::new(
            name,
            model,
            Position::new(model.path(), line),
            Some(content),
            RuleKind::Parser,
        ))
    }

    fn model(name: &str) -> Model {
        let model = Model::empty(format!("{name}.g4"), 0, true);
        model.set_name(name);
        model
    }

    #[test]
    fn it_prefers_parser_rules_locally() {
        let m = model("M");
        m.add_lexer_rule(lexer_rule(&m, "x", content::literal("'x'")));
        m.add_parser_rule(parser_rule(&m, "x", 2, content::wildcard()));
        assert!(m.lookup_local("x").unwrap().is_parser());
        assert!(m.lookup_local("y").is_none());
    }

    #[test]
    fn it_finds_literal_aliases() {
        let m = model("M");
        m.add_lexer_rule(lexer_rule(&m, "PLUS", content::literal("'+'")));
        let rule = m.lookup("'+'").unwrap();
        assert_eq!(rule.name, "PLUS");
        assert!(rule.is_literal());
        assert_eq!(m.get_terminals().len(), 1);
    }

    #[test]
    fn it_replaces_redefined_rules_in_place() {
        let m = model("M");
        m.add_parser_rule(parser_rule(&m, "a", 1, content::wildcard()));
        m.add_parser_rule(parser_rule(&m, "b", 2, content::wildcard()));
        m.add_parser_rule(parser_rule(&m, "a", 3, content::empty()));
        let names = m
            .get_non_terminals()
            .iter()
            .map(|r| (r.name.clone(), r.position.line))
            .collect::<Vec<_>>();
        assert_eq!(names, vec![("a".to_owned(), 3), ("b".to_owned(), 2)]);
    }

    #[test]
    fn it_visits_diamond_imports_once() {
        let a = model("A");
        let b = model("B");
        let c = model("C");
        let d = model("D");
        a.add_import(b.clone());
        a.add_import(c.clone());
        b.add_import(d.clone());
        c.add_import(d.clone());

        let names = a.iter_import_tree().iter().map(Model::name).collect::<Vec<_>>();
        assert_eq!(names, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn it_survives_import_cycles() {
        let a = model("A");
        let b = model("B");
        a.add_import(b.clone());
        b.add_import(a.clone());
        b.add_parser_rule(parser_rule(&b, "only_in_b", 1, content::wildcard()));

        assert_eq!(a.iter_import_tree().len(), 2);
        assert_eq!(b.iter_import_tree().len(), 2);
        assert_eq!(a.lookup("only_in_b").unwrap().full_name(), "B.only_in_b");
        assert!(a.lookup("missing").is_none());
    }

    #[test]
    fn it_resolves_duplicates_breadth_first() {
        let a = model("A");
        let b = model("B");
        let c = model("C");
        let d = model("D");
        a.add_import(b.clone());
        a.add_import(c.clone());
        b.add_import(d.clone());
        c.add_parser_rule(parser_rule(&c, "dup", 1, content::wildcard()));
        d.add_parser_rule(parser_rule(&d, "dup", 1, content::wildcard()));

        assert_eq!(a.lookup("dup").unwrap().full_name(), "C.dup");
    }

    #[test]
    fn it_resolves_references_lazily() {
        let m = model("M");
        let body = content::reference(&m, "later");
        assert!(body.as_reference().unwrap().get_reference().is_none());
        m.add_parser_rule(parser_rule(&m, "later", 5, content::wildcard()));
        let rule = body.as_reference().unwrap().get_reference().unwrap();
        assert_eq!(rule.name, "later");
    }

    #[test]
    fn it_formats_rules() {
        let m = model("M");
        let body = content::alternative([
            content::sequence([content::reference(&m, "expr"), content::literal("'+'")]),
            content::reference(&m, "term"),
        ]);
        let rule = parser_rule(&m, "expr", 1, body);
        assert_eq!(rule.to_string(), "expr\n  : expr '+'\n  | term\n  ;");
    }
}
