//! Grammar loaders
//!
//! Each grammar dialect is handled by a [`ModelProvider`]. Providers are kept
//! in a process-wide registry and picked by file extension.

use std::{
    path::{
        Path,
        PathBuf,
    },
    sync::{
        Mutex,
        OnceLock,
    },
};

use serde::{
    Deserialize,
    Serialize,
};

use crate::{
    model::Model,
    Error,
};

/// Options that are passed to a provider when loading a grammar.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LoadingOptions {
    /// Treat single-quoted tokens as C character literals, for dialects where
    /// this is ambiguous. The Bison loader then reports single-quoted literals
    /// with more than one character. ANTLR4 grammars don't use it.
    pub use_c_char_literals: bool,
}

impl Default for LoadingOptions {
    fn default() -> Self {
        Self {
            use_c_char_literals: true,
        }
    }
}

/// Loads grammars of one dialect.
pub trait ModelProvider: Send + Sync {
    /// Name of the dialect.
    fn name(&self) -> &str;

    /// File extensions this provider handles, without the leading dot.
    fn supported_extensions(&self) -> &[&str];

    fn can_handle(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.supported_extensions().contains(&ext))
            .unwrap_or_default()
    }

    /// Loads a grammar from a file.
    ///
    /// This never fails. If the file can't be read or parsed, the problem is
    /// reported on the returned model, which is then empty or partial.
    fn from_file(&self, path: &Path, options: &LoadingOptions) -> Model;

    /// Loads a grammar from a snippet of text. `path` and `offset` are only
    /// used to report positions.
    fn from_text(&self, text: &str, path: &Path, offset: usize, imports: &[Model]) -> Model;

    /// Loads a grammar by name from the directory `base`, trying each of the
    /// supported extensions.
    fn from_name(&self, base: &Path, name: &str, options: &LoadingOptions) -> Option<Model> {
        self.supported_extensions().iter().find_map(|ext| {
            let path = base.join(format!("{name}.{ext}"));
            path.is_file().then(|| self.from_file(&path, options))
        })
    }
}

type Registry = Vec<&'static dyn ModelProvider>;

fn registry() -> &'static Mutex<Registry> {
    static REGISTRY: OnceLock<Mutex<Registry>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        #[allow(unused_mut)]
        let mut providers: Registry = vec![];
        #[cfg(feature = "antlr4")]
        providers.push(crate::antlr4::Antlr4Provider::global());
        #[cfg(feature = "bison")]
        providers.push(crate::bison::BisonProvider::global());
        Mutex::new(providers)
    })
}

/// Registers a provider. Providers registered later take precedence.
pub fn register_provider(provider: &'static dyn ModelProvider) {
    tracing::debug!(name = provider.name(), "registering grammar provider");
    registry()
        .lock()
        .expect("provider registry mutex poisened")
        .push(provider);
}

/// Finds a provider that can load the given file.
pub fn find_provider(path: &Path) -> Option<&'static dyn ModelProvider> {
    registry()
        .lock()
        .expect("provider registry mutex poisened")
        .iter()
        .rev()
        .find(|provider| provider.can_handle(path))
        .copied()
}

/// Loads a grammar file with whichever provider handles its extension.
pub fn load_file(path: impl AsRef<Path>, options: &LoadingOptions) -> Result<Model, Error> {
    let path = path.as_ref();
    let provider =
        find_provider(path).ok_or_else(|| Error::UnknownGrammarFormat(PathBuf::from(path)))?;
    Ok(provider.from_file(path, options))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy;

    impl ModelProvider for Dummy {
        fn name(&self) -> &str {
            "dummy"
        }

        fn supported_extensions(&self) -> &[&str] {
            &["dummy-grammar"]
        }

        fn from_file(&self, path: &Path, _options: &LoadingOptions) -> Model {
            Model::empty(path, 0, false)
        }

        fn from_text(&self, _text: &str, path: &Path, offset: usize, _imports: &[Model]) -> Model {
            Model::empty(path, offset, true)
        }
    }

    static DUMMY: Dummy = Dummy;

    #[test]
    fn it_finds_providers_by_extension() {
        register_provider(&DUMMY);
        let provider = find_provider(Path::new("foo/bar.dummy-grammar")).unwrap();
        assert_eq!(provider.name(), "dummy");
        assert!(find_provider(Path::new("foo/bar.unknown")).is_none());
        assert!(matches!(
            load_file("foo.unknown", &LoadingOptions::default()),
            Err(Error::UnknownGrammarFormat(_))
        ));
    }

    #[test]
    fn it_loads_by_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Lang.dummy-grammar"), "").unwrap();
        let model = DUMMY
            .from_name(dir.path(), "Lang", &Default::default())
            .unwrap();
        assert_eq!(model.name(), "Lang");
        assert!(DUMMY
            .from_name(dir.path(), "Missing", &Default::default())
            .is_none());
    }
}
