use std::collections::HashMap;

use runbot_piston::{Runtime, ScriptFile};

/// The one backend language that rejects anonymous source files.
pub const NAMED_SOURCE_LANGUAGE: &str = "java";
const NAMED_SOURCE_FILE_NAME: &str = "Main.java";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Public struct `LanguageEntry` used across runbot components.
pub struct LanguageEntry {
    pub language: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Maps canonical language names and their aliases to the same entry.
pub struct LanguageTable {
    entries: HashMap<String, LanguageEntry>,
}

impl LanguageTable {
    /// Builds the table from the backend runtime listing. Later runtimes win on name clashes.
    pub fn from_runtimes(runtimes: &[Runtime]) -> Self {
        let mut table = Self::default();
        for runtime in runtimes {
            table.insert(&runtime.language, &runtime.version, &runtime.aliases);
        }
        table
    }

    pub fn insert(&mut self, language: &str, version: &str, aliases: &[String]) {
        let entry = LanguageEntry {
            language: language.to_string(),
            version: version.to_string(),
        };
        for alias in aliases {
            self.entries.insert(alias.clone(), entry.clone());
        }
        self.entries.insert(language.to_string(), entry);
    }

    pub fn resolve(&self, token: &str) -> Option<&LanguageEntry> {
        self.entries.get(token)
    }

    /// Canonical entries (aliases excluded), sorted by language name.
    pub fn canonical_languages(&self) -> Vec<&LanguageEntry> {
        let mut languages = self
            .entries
            .iter()
            .filter(|(name, entry)| *name == &entry.language)
            .map(|(_, entry)| entry)
            .collect::<Vec<_>>();
        languages.sort_by(|left, right| left.language.cmp(&right.language));
        languages
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Wraps `code` as a backend source file, naming it only when the language requires it.
pub fn build_script(code: &str, languages: &LanguageTable, language_token: &str) -> ScriptFile {
    let canonical = languages
        .resolve(language_token)
        .map(|entry| entry.language.as_str());
    let name = (canonical == Some(NAMED_SOURCE_LANGUAGE))
        .then(|| NAMED_SOURCE_FILE_NAME.to_string());
    ScriptFile {
        name,
        content: code.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{build_script, LanguageTable};
    use runbot_piston::Runtime;

    fn runtime(language: &str, version: &str, aliases: &[&str]) -> Runtime {
        Runtime {
            language: language.to_string(),
            version: version.to_string(),
            aliases: aliases.iter().map(|alias| alias.to_string()).collect(),
            runtime: None,
        }
    }

    fn table() -> LanguageTable {
        LanguageTable::from_runtimes(&[
            runtime("python", "3.10.0", &["py", "py3", "python3"]),
            runtime("java", "15.0.2", &["jdk"]),
            runtime("javascript", "18.15.0", &["js", "node"]),
        ])
    }

    #[test]
    fn unit_language_table_resolves_names_and_aliases_to_one_entry() {
        let table = table();
        let by_name = table.resolve("python").expect("python");
        let by_alias = table.resolve("py3").expect("py3");
        assert_eq!(by_name, by_alias);
        assert_eq!(by_alias.version, "3.10.0");
        assert!(table.resolve("PY").is_none());
        assert!(!table.is_empty());
    }

    #[test]
    fn functional_build_script_names_java_sources_only() {
        let table = table();
        let java = build_script("class Main {}", &table, "jdk");
        assert_eq!(java.name.as_deref(), Some("Main.java"));
        assert_eq!(java.content, "class Main {}");

        let python = build_script("print(1)", &table, "py");
        assert_eq!(python.name, None);

        let unknown = build_script("x", &table, "cobol");
        assert_eq!(unknown.name, None);
    }

    #[test]
    fn functional_canonical_languages_exclude_aliases_and_sort_by_name() {
        let listed = table()
            .canonical_languages()
            .into_iter()
            .map(|entry| format!("{}@{}", entry.language, entry.version))
            .collect::<Vec<_>>();
        assert_eq!(
            listed,
            vec!["java@15.0.2", "javascript@18.15.0", "python@3.10.0"]
        );
    }

    #[test]
    fn regression_later_runtime_overrides_shared_alias() {
        let table = LanguageTable::from_runtimes(&[
            runtime("node", "16.0.0", &["js"]),
            runtime("javascript", "18.15.0", &["js"]),
        ]);
        assert_eq!(table.resolve("js").map(|entry| entry.language.as_str()), Some("javascript"));
        assert_eq!(table.resolve("node").map(|entry| entry.version.as_str()), Some("16.0.0"));
    }
}
