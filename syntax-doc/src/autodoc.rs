//! Picks, orders and describes the rules of a grammar for documentation.
//!
//! [`make_order`] decides which rules are documented and in what order.
//! [`document`] builds a complete outline of a grammar from that: its
//! documentation, section headers and, for each rule, its documentation and
//! diagram. Turning the outline into pages is up to the caller.

use std::{
    path::{
        Path,
        PathBuf,
    },
    str::FromStr,
};

use itertools::Itertools;
use serde::{
    Deserialize,
    Serialize,
};

use crate::{
    diagram::{
        self,
        Element,
        LiteralRendering,
        RenderSettings,
    },
    model::{
        DocLine,
        Model,
        Position,
        Rule,
        Section,
    },
    provider::{
        find_provider,
        load_file,
        LoadingOptions,
    },
    reachable::find_reachable_rules,
    utils::to_dash_case,
    Error,
};

/// Whether lexer or parser rules come first.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Grouping {
    /// Don't group.
    Mixed,
    LexerFirst,
    #[default]
    ParserFirst,
}

impl FromStr for Grouping {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mixed" => Ok(Self::Mixed),
            "lexer-first" => Ok(Self::LexerFirst),
            "parser-first" => Ok(Self::ParserFirst),
            _ => {
                Err(Error::InvalidOption {
                    option: "grouping",
                    value: s.to_owned(),
                })
            }
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Ordering {
    /// Order of declaration, by file and line.
    #[default]
    BySource,

    /// Alphabetically, ignoring case.
    ByName,
}

impl FromStr for Ordering {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "by-source" => Ok(Self::BySource),
            "by-name" => Ok(Self::ByName),
            _ => {
                Err(Error::InvalidOption {
                    option: "ordering",
                    value: s.to_owned(),
                })
            }
        }
    }
}

/// Settings for documenting a grammar.
///
/// In YAML, the loading and render settings sit next to the other keys:
///
/// ```yaml
/// grouping: lexer-first
/// fragments: true
/// literal-rendering: contents-unquoted
/// cc-to-dash: true
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AutodocSettings {
    pub lexer_rules: bool,
    pub parser_rules: bool,

    /// Document fragment lexer rules.
    pub fragments: bool,

    /// Document rules without documentation comments.
    pub undocumented: bool,

    /// Emit section headers. Only effective when ordering by source.
    pub honor_sections: bool,

    pub grouping: Grouping,
    pub ordering: Ordering,
    pub diagrams: bool,

    /// Only document rules reachable from this rule. One of `rule`,
    /// `grammar.rule` or `path/to/file.g4 rule`.
    pub root_rule: Option<String>,

    /// Directory that relative grammar paths are resolved against.
    pub base_path: PathBuf,

    #[serde(flatten)]
    pub loading: LoadingOptions,

    #[serde(flatten)]
    pub render: RenderSettings,
}

impl Default for AutodocSettings {
    fn default() -> Self {
        Self {
            lexer_rules: true,
            parser_rules: true,
            fragments: false,
            undocumented: false,
            honor_sections: true,
            grouping: Grouping::default(),
            ordering: Ordering::default(),
            diagrams: true,
            root_rule: None,
            base_path: PathBuf::from("."),
            loading: LoadingOptions::default(),
            render: RenderSettings::default(),
        }
    }
}

impl AutodocSettings {
    /// Applies the overrides of a nested documentation block.
    pub fn merged(&self, overrides: &SettingsOverrides) -> Self {
        let mut settings = self.clone();

        merge(&mut settings.lexer_rules, &overrides.lexer_rules);
        merge(&mut settings.parser_rules, &overrides.parser_rules);
        merge(&mut settings.fragments, &overrides.fragments);
        merge(&mut settings.undocumented, &overrides.undocumented);
        merge(&mut settings.honor_sections, &overrides.honor_sections);
        merge(&mut settings.grouping, &overrides.grouping);
        merge(&mut settings.ordering, &overrides.ordering);
        merge(&mut settings.diagrams, &overrides.diagrams);
        merge(&mut settings.base_path, &overrides.base_path);
        merge(
            &mut settings.loading.use_c_char_literals,
            &overrides.use_c_char_literals,
        );
        merge(
            &mut settings.render.literal_rendering,
            &overrides.literal_rendering,
        );
        merge(&mut settings.render.cc_to_dash, &overrides.cc_to_dash);

        if overrides.root_rule.is_some() {
            settings.root_rule = overrides.root_rule.clone();
        }

        settings
    }
}

fn merge<T: Clone>(value: &mut T, value_override: &Option<T>) {
    if let Some(value_override) = value_override {
        *value = value_override.clone();
    }
}

/// Settings of a nested documentation block. Anything that is not set is
/// inherited.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SettingsOverrides {
    pub lexer_rules: Option<bool>,
    pub parser_rules: Option<bool>,
    pub fragments: Option<bool>,
    pub undocumented: Option<bool>,
    pub honor_sections: Option<bool>,
    pub grouping: Option<Grouping>,
    pub ordering: Option<Ordering>,
    pub diagrams: Option<bool>,
    pub root_rule: Option<String>,
    pub base_path: Option<PathBuf>,
    pub use_c_char_literals: Option<bool>,
    pub literal_rendering: Option<LiteralRendering>,
    pub cc_to_dash: Option<bool>,
}

/// Where the root rule is found.
#[derive(Clone, Debug, PartialEq, Eq)]
enum RootRule<'a> {
    /// `rule`, in the documented grammar.
    Local(&'a str),

    /// `grammar.rule`, next to the documented grammar.
    Grammar { grammar: &'a str, rule: &'a str },

    /// `path rule`, with `path` relative to the base path.
    File { path: &'a str, rule: &'a str },
}

impl<'a> RootRule<'a> {
    fn parse(s: &'a str) -> Self {
        let s = s.trim();
        if let Some((path, rule)) = s.rsplit_once(char::is_whitespace) {
            Self::File {
                path: path.trim_end(),
                rule,
            }
        }
        else if let Some((grammar, rule)) = s.rsplit_once('.') {
            Self::Grammar { grammar, rule }
        }
        else {
            Self::Local(s)
        }
    }

    fn resolve(&self, model: &Model, settings: &AutodocSettings) -> Result<Rule, Error> {
        let (model, rule) = match *self {
            Self::Local(rule) => (model.clone(), rule),
            Self::Grammar { grammar, rule } => {
                let base = model.path().parent().unwrap_or_else(|| Path::new(""));
                let provider = find_provider(model.path())
                    .ok_or_else(|| Error::UnknownGrammarFormat(model.path().to_owned()))?;
                let model = provider
                    .from_name(base, grammar, &settings.loading)
                    .ok_or_else(|| Error::UnknownGrammar(grammar.to_owned()))?;
                (model, rule)
            }
            Self::File { path, rule } => {
                (
                    load_file(settings.base_path.join(path), &settings.loading)?,
                    rule,
                )
            }
        };

        model.lookup(rule).ok_or_else(|| {
            Error::UnknownRule {
                grammar: model.name(),
                rule: rule.to_owned(),
            }
        })
    }
}

/// Returns the rules of `model` that should be documented, in order.
///
/// A root rule that can't be found is logged, and the rules aren't filtered
/// by it.
pub fn make_order(model: &Model, settings: &AutodocSettings) -> Vec<Rule> {
    let mut rules = vec![];

    if settings.lexer_rules {
        rules.extend(
            model
                .get_terminals()
                .into_iter()
                .filter(|rule| settings.fragments || !rule.is_fragment()),
        );
    }
    if settings.parser_rules {
        rules.extend(model.get_non_terminals());
    }

    match settings.ordering {
        Ordering::BySource => rules.sort_by(|a, b| a.position.cmp(&b.position)),
        Ordering::ByName => rules.sort_by_cached_key(|rule| rule.name.to_lowercase()),
    }

    match settings.grouping {
        Grouping::Mixed => {}
        Grouping::LexerFirst => rules.sort_by_key(|rule| !rule.is_lexer()),
        Grouping::ParserFirst => rules.sort_by_key(|rule| rule.is_lexer()),
    }

    let mut rules = rules
        .into_iter()
        .filter(|rule| !rule.is_nodoc && !rule.is_inline)
        .unique()
        .collect::<Vec<_>>();

    if let Some(root_rule) = &settings.root_rule {
        match RootRule::parse(root_rule).resolve(model, settings) {
            Ok(root) => {
                let reachable = find_reachable_rules(&root);
                tracing::debug!(root = %root.full_name(), reachable = reachable.len(), "filtering by root rule");
                rules.retain(|rule| reachable.contains(rule));
            }
            Err(e) => {
                tracing::error!(grammar = %model.name(), root_rule, "can't use root rule: {e}");
            }
        }
    }

    if !settings.undocumented {
        rules.retain(|rule| !rule.documentation.is_empty());
    }

    rules
}

/// Outline of a grammar's documentation.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct GrammarDoc {
    pub name: String,

    /// Cross reference target of the grammar.
    pub target: String,

    pub docs: Vec<DocLine>,
    pub imports: Vec<String>,
    pub items: Vec<DocItem>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocItem {
    Section(SectionDoc),
    Rule(RuleDoc),
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SectionDoc {
    pub position: Position,
    pub docs: Vec<DocLine>,
}

impl From<&Section> for SectionDoc {
    fn from(section: &Section) -> Self {
        Self {
            position: section.position.clone(),
            docs: section.docs.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RuleDoc {
    #[serde(skip)]
    pub rule: Rule,

    /// Cross reference target, `grammar.rule`.
    pub target: String,

    /// Name to show in the documentation.
    pub name: String,

    pub position: Position,
    pub docs: Vec<DocLine>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagram: Option<Element>,
}

impl RuleDoc {
    pub fn new(rule: &Rule, settings: &AutodocSettings) -> Self {
        let name = match &rule.display_name {
            Some(name) => name.clone(),
            None if settings.render.cc_to_dash => to_dash_case(&rule.name),
            None => rule.name.clone(),
        };

        let diagram = (settings.diagrams && !rule.is_no_diagram && rule.content.is_some())
            .then(|| diagram::render(rule, &settings.render));

        Self {
            rule: rule.clone(),
            target: rule.full_name(),
            name,
            position: rule.position.clone(),
            docs: rule.documentation.clone(),
            diagram,
        }
    }
}

/// Builds the documentation outline of a grammar.
pub fn document(model: &Model, settings: &AutodocSettings) -> GrammarDoc {
    let rules = make_order(model, settings);
    let honor_sections = settings.honor_sections && settings.ordering == Ordering::BySource;

    let mut items = vec![];
    let mut section: Option<Section> = None;

    for rule in &rules {
        if honor_sections && rule.section != section {
            if let Some(new_section) = &rule.section {
                items.push(DocItem::Section(new_section.into()));
            }
            section = rule.section.clone();
        }
        items.push(DocItem::Rule(RuleDoc::new(rule, settings)));
    }

    tracing::debug!(grammar = %model.name(), rules = rules.len(), "documented grammar");

    GrammarDoc {
        name: model.name(),
        target: model.name(),
        docs: model.docs().unwrap_or_default(),
        imports: model.imports().iter().map(Model::name).collect(),
        items,
    }
}
