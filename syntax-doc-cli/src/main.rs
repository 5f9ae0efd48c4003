use std::path::{
    Path,
    PathBuf,
};

use color_eyre::eyre::{
    eyre,
    Error,
};
use serde::Serialize;
use structopt::StructOpt;
use syntax_doc::{
    antlr4::{
        render_fragment,
        FragmentKind,
    },
    autodoc::{
        self,
        AutodocSettings,
        Grouping,
        Ordering,
        SettingsOverrides,
    },
    diagram::{
        self,
        LiteralRendering,
    },
    model::Model,
    provider::load_file,
    reachable::find_reachable_rules,
};

#[derive(Debug, StructOpt)]
struct Args {
    /// YAML file with documentation settings.
    #[structopt(short, long)]
    settings: Option<PathBuf>,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Prints the documentation outline of a grammar.
    Rules {
        grammar: PathBuf,

        #[structopt(long)]
        grouping: Option<Grouping>,

        #[structopt(long)]
        ordering: Option<Ordering>,

        #[structopt(long)]
        root_rule: Option<String>,

        #[structopt(long, conflicts_with = "no-fragments")]
        fragments: bool,

        #[structopt(long)]
        no_fragments: bool,

        #[structopt(long, conflicts_with = "no-undocumented")]
        undocumented: bool,

        #[structopt(long)]
        no_undocumented: bool,

        #[structopt(long, conflicts_with = "no-diagrams")]
        diagrams: bool,

        #[structopt(long)]
        no_diagrams: bool,
    },

    /// Prints the diagram of a rule.
    Diagram {
        grammar: PathBuf,
        rule: String,

        #[structopt(long)]
        literal_rendering: Option<LiteralRendering>,

        #[structopt(long, conflicts_with = "no-cc-to-dash")]
        cc_to_dash: bool,

        #[structopt(long)]
        no_cc_to_dash: bool,
    },

    /// Prints all rules that can be reached from a rule.
    Reachable { grammar: PathBuf, rule: String },

    /// Prints the diagram of a rule body that is given on the command line.
    Fragment {
        #[structopt(long, default_value = "parser")]
        kind: FragmentKind,

        body: String,
    },

    /// Checks a YAML diagram description and prints it back.
    Describe { file: PathBuf },
}

impl Args {
    fn load_settings(&self) -> Result<AutodocSettings, Error> {
        match &self.settings {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                Ok(serde_yaml::from_str(&text)?)
            }
            None => Ok(AutodocSettings::default()),
        }
    }

    pub fn run(self) -> Result<(), Error> {
        let settings = self.load_settings()?;

        match self.command {
            Command::Rules {
                grammar,
                grouping,
                ordering,
                root_rule,
                fragments,
                no_fragments,
                undocumented,
                no_undocumented,
                diagrams,
                no_diagrams,
            } => {
                let settings = settings.merged(&SettingsOverrides {
                    grouping,
                    ordering,
                    root_rule,
                    fragments: switch(fragments, no_fragments),
                    undocumented: switch(undocumented, no_undocumented),
                    diagrams: switch(diagrams, no_diagrams),
                    ..Default::default()
                });

                let model = load(&grammar, &settings)?;
                print_yaml(&autodoc::document(&model, &settings))?;
            }
            Command::Diagram {
                grammar,
                rule,
                literal_rendering,
                cc_to_dash,
                no_cc_to_dash,
            } => {
                let settings = settings.merged(&SettingsOverrides {
                    literal_rendering,
                    cc_to_dash: switch(cc_to_dash, no_cc_to_dash),
                    ..Default::default()
                });

                let model = load(&grammar, &settings)?;
                let rule = model
                    .lookup(&rule)
                    .ok_or_else(|| eyre!("no rule {rule} in grammar {}", model.name()))?;
                if rule.content.is_none() {
                    return Err(eyre!("rule {} has no body", rule.full_name()));
                }

                print_yaml(&diagram::render(&rule, &settings.render))?;
            }
            Command::Reachable { grammar, rule } => {
                let model = load(&grammar, &settings)?;
                let rule = model
                    .lookup(&rule)
                    .ok_or_else(|| eyre!("no rule {rule} in grammar {}", model.name()))?;

                let mut names = find_reachable_rules(&rule)
                    .iter()
                    .map(|rule| rule.full_name())
                    .collect::<Vec<_>>();
                names.sort();

                for name in names {
                    println!("{name}");
                }
            }
            Command::Fragment { kind, body } => {
                let element = render_fragment(
                    kind,
                    &body,
                    Path::new("<command line>"),
                    0,
                    &[],
                    &settings.render,
                )?;
                print_yaml(&element)?;
            }
            Command::Describe { file } => {
                let text = std::fs::read_to_string(&file)?;
                print_yaml(&diagram::load_description(&text)?)?;
            }
        }

        Ok(())
    }
}

/// A `--flag`/`--no-flag` pair. Neither leaves the settings file alone.
fn switch(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

fn load(path: &Path, settings: &AutodocSettings) -> Result<Model, Error> {
    let path = settings.base_path.join(path);
    let model = load_file(&path, &settings.loading)?;

    let errors = model.diagnostics().len();
    if errors > 0 {
        tracing::warn!(path = %path.display(), errors, "grammar loaded with errors");
    }

    Ok(model)
}

fn print_yaml(value: &impl Serialize) -> Result<(), Error> {
    print!("{}", serde_yaml::to_string(value)?);
    Ok(())
}

fn main() -> Result<(), Error> {
    dotenvy::dotenv().ok();
    color_eyre::install()?;
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let args = Args::from_args();
    args.run()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules_overrides(args: &[&str]) -> AutodocSettings {
        let args = Args::from_iter_safe(
            ["syntax-doc", "rules", "Calc.g4"]
                .into_iter()
                .chain(args.iter().copied()),
        )
        .unwrap();
        let Command::Rules {
            fragments,
            no_fragments,
            undocumented,
            no_undocumented,
            diagrams,
            no_diagrams,
            ..
        } = args.command
        else {
            panic!("expected the rules command");
        };

        let settings = AutodocSettings {
            fragments: true,
            undocumented: true,
            ..Default::default()
        };
        settings.merged(&SettingsOverrides {
            fragments: switch(fragments, no_fragments),
            undocumented: switch(undocumented, no_undocumented),
            diagrams: switch(diagrams, no_diagrams),
            ..Default::default()
        })
    }

    #[test]
    fn it_keeps_settings_without_flags() {
        let settings = rules_overrides(&[]);
        assert!(settings.fragments);
        assert!(settings.undocumented);
        assert!(settings.diagrams);
    }

    #[test]
    fn it_turns_settings_off_with_no_flags() {
        let settings =
            rules_overrides(&["--no-fragments", "--no-undocumented", "--no-diagrams"]);
        assert!(!settings.fragments);
        assert!(!settings.undocumented);
        assert!(!settings.diagrams);
    }

    #[test]
    fn it_rejects_conflicting_flags() {
        let result = Args::from_iter_safe([
            "syntax-doc",
            "rules",
            "Calc.g4",
            "--fragments",
            "--no-fragments",
        ]);
        assert!(result.is_err());
    }
}
