#![cfg_attr(docsrs, feature(doc_cfg))]

//! Documentation tooling for formal grammars.
//!
//! Grammars are loaded by a [`ModelProvider`](provider::ModelProvider) into a
//! [`Model`](model::Model). Rule bodies are kept as interned
//! [`RuleContent`](content::RuleContent) trees, which the [`diagram`] module
//! turns into syntax diagrams. The [`autodoc`] module picks and orders the
//! rules that should be documented.
//!
//! # Grammar dialects
//!
//! ANTLR4 grammars are supported with the `antlr4` feature and Bison grammars
//! with the `bison` feature. Both are enabled by default. Other dialects can be
//! added with
//! [`register_provider`](provider::register_provider).
//!
//! # Example
//!
//! ```
//! # use std::path::Path;
//! # use syntax_doc::{antlr4::Antlr4Provider, diagram, provider::ModelProvider};
//! let model = Antlr4Provider::global().from_text(
//!     "grammar Calc; expr : expr '+' NUM | NUM ; NUM : [0-9]+ ;",
//!     Path::new("Calc.g4"),
//!     0,
//!     &[],
//! );
//!
//! let expr = model.lookup("expr").unwrap();
//! let element = diagram::render(&expr, &Default::default());
//! assert!(matches!(element, diagram::Element::OneOrMore { .. }));
//! ```

#[cfg_attr(docsrs, doc(cfg(feature = "antlr4")))]
#[cfg(feature = "antlr4")]
pub mod antlr4;
#[cfg_attr(docsrs, doc(cfg(feature = "bison")))]
#[cfg(feature = "bison")]
pub mod bison;
pub mod autodoc;
pub mod content;
pub mod diagnostics;
pub mod diagram;
pub mod docs;
pub mod model;
pub mod provider;
pub mod reachable;
mod utils;

use std::path::PathBuf;

pub use crate::utils::to_dash_case;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error")]
    Io(#[from] std::io::Error),

    #[error("parse error:\n{0}")]
    Parse(String),

    #[error("invalid value {value:?} for option '{option}'")]
    InvalidOption { option: &'static str, value: String },

    #[error("can't decode diagram description")]
    DiagramDescription(#[from] serde_yaml::Error),

    #[error("invalid diagram description: {0}")]
    InvalidDiagram(String),

    #[error("can't determine file format for {0}")]
    UnknownGrammarFormat(PathBuf),

    #[error("can't find grammar {0}")]
    UnknownGrammar(String),

    #[error("can't find rule {rule} in grammar {grammar}")]
    UnknownRule { grammar: String, rule: String },
}
