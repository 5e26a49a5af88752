//! Turns scenario files into the queries or configuration record they describe.
//!
//! Supported kinds are:
//! - `.py` and `.sh`, generator scripts that print queries to stdout, run with `python3` or `sh`
//! - `.cypher`, queries in textual form
//! - `.json`, a single configuration record
//!
//! A [ScenarioFileRef] can be loaded any number of times. Every load re-reads the file or re-runs
//! the script, so generator scripts are free to produce different queries on each iteration.

use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::string::FromUtf8Error;

/// Separates statements in query text.
const STATEMENT_TERMINATOR: char = ';';

/// The kind of a scenario file, decided by its extension when the file is discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// An executable that prints queries, run with the given interpreter
    Script { interpreter: &'static str },
    /// Queries separated by `;`
    StaticText,
    /// A JSON configuration record
    Config,
}

impl FileKind {
    pub fn from_path(path: &Path) -> Result<Self, ContentError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("py") => Ok(FileKind::Script {
                interpreter: "python3",
            }),
            Some("sh") => Ok(FileKind::Script { interpreter: "sh" }),
            Some("cypher") => Ok(FileKind::StaticText),
            Some("json") => Ok(FileKind::Config),
            other => Err(ContentError::UnsupportedKind {
                path: path.to_path_buf(),
                extension: other.unwrap_or_default().to_string(),
            }),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            FileKind::Script { .. } | FileKind::StaticText => "queries",
            FileKind::Config => "a configuration record",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("Unsupported file kind '.{extension}' for '{}'", .path.display())]
    UnsupportedKind { path: PathBuf, extension: String },
    #[error("Failed to read '{}'", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Interpreter '{interpreter}' for '{}' not found", .path.display())]
    MissingInterpreter {
        path: PathBuf,
        interpreter: &'static str,
        #[source]
        source: which::Error,
    },
    #[error("Script '{}' failed with {status}: {stderr}", .path.display())]
    ScriptFailed {
        path: PathBuf,
        status: ExitStatus,
        stderr: String,
    },
    #[error("Script '{}' produced output that is not UTF-8", .path.display())]
    NotUtf8 {
        path: PathBuf,
        #[source]
        source: FromUtf8Error,
    },
    #[error("Failed to parse configuration record '{}'", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Expected '{}' to contain {expected} but it contains {actual}", .path.display())]
    UnexpectedContent {
        path: PathBuf,
        expected: &'static str,
        actual: &'static str,
    },
}

/// A scenario file together with the kind inferred from its extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioFileRef {
    path: PathBuf,
    kind: FileKind,
}

impl ScenarioFileRef {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, ContentError> {
        let path = path.into();
        let kind = FileKind::from_path(&path)?;
        Ok(Self { path, kind })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    /// Produce a fresh sequence from the file.
    pub fn load(&self) -> Result<LoadedContent, ContentError> {
        log::debug!("Loading content from '{}'", self.path.display());
        match self.kind {
            FileKind::StaticText => Ok(LoadedContent::Queries(Queries::new(self.read()?))),
            FileKind::Script { interpreter } => {
                Ok(LoadedContent::Queries(Queries::new(self.run_script(interpreter)?)))
            }
            FileKind::Config => {
                let record = serde_json::from_str(&self.read()?).map_err(|source| {
                    ContentError::Json {
                        path: self.path.clone(),
                        source,
                    }
                })?;
                Ok(LoadedContent::Record(record))
            }
        }
    }

    /// Load the file and require it to yield queries.
    pub fn load_queries(&self) -> Result<Queries, ContentError> {
        match self.load()? {
            LoadedContent::Queries(queries) => Ok(queries),
            LoadedContent::Record(_) => Err(self.unexpected("queries")),
        }
    }

    /// Load the file and require it to yield a configuration record.
    pub fn load_record(&self) -> Result<serde_json::Value, ContentError> {
        match self.load()? {
            LoadedContent::Record(record) => Ok(record),
            LoadedContent::Queries(_) => Err(self.unexpected("a configuration record")),
        }
    }

    fn unexpected(&self, expected: &'static str) -> ContentError {
        ContentError::UnexpectedContent {
            path: self.path.clone(),
            expected,
            actual: self.kind.describe(),
        }
    }

    fn read(&self) -> Result<String, ContentError> {
        std::fs::read_to_string(&self.path).map_err(|source| ContentError::Io {
            path: self.path.clone(),
            source,
        })
    }

    fn run_script(&self, interpreter: &'static str) -> Result<String, ContentError> {
        let interpreter_path =
            which::which(interpreter).map_err(|source| ContentError::MissingInterpreter {
                path: self.path.clone(),
                interpreter,
                source,
            })?;

        let output = Command::new(interpreter_path)
            .arg(&self.path)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ContentError::Io {
                path: self.path.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ContentError::ScriptFailed {
                path: self.path.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        String::from_utf8(output.stdout).map_err(|source| ContentError::NotUtf8 {
            path: self.path.clone(),
            source,
        })
    }
}

/// What a [ScenarioFileRef] yields when it is loaded.
#[derive(Debug)]
pub enum LoadedContent {
    Queries(Queries),
    /// Exactly one configuration record
    Record(serde_json::Value),
}

/// Lazily splits raw query text into trimmed, non-empty statements.
///
/// Newlines are collapsed to spaces first so that a statement may span several lines.
#[derive(Debug, Clone)]
pub struct Queries {
    text: String,
    position: usize,
}

impl Queries {
    pub fn new(raw: String) -> Self {
        Self {
            text: raw.replace(|c: char| c == '\n' || c == '\r', " "),
            position: 0,
        }
    }
}

impl Iterator for Queries {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        while self.position < self.text.len() {
            let rest = &self.text[self.position..];
            let end = rest.find(STATEMENT_TERMINATOR).unwrap_or(rest.len());
            let fragment = rest[..end].trim();
            self.position += end + STATEMENT_TERMINATOR.len_utf8();

            if !fragment.is_empty() {
                return Some(fragment.to_string());
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn splits_and_trims_statements() {
        let queries: Vec<String> =
            Queries::new("CREATE (n);  \n MATCH (n) RETURN n;;".to_string()).collect();

        assert_eq!(vec!["CREATE (n)", "MATCH (n) RETURN n"], queries);
    }

    #[test]
    fn keeps_trailing_statement_without_terminator() {
        let queries: Vec<String> =
            Queries::new("MATCH (n)\nRETURN n;\n  CREATE (m)".to_string()).collect();

        assert_eq!(vec!["MATCH (n) RETURN n", "CREATE (m)"], queries);
    }

    #[test]
    fn whitespace_only_text_yields_nothing() {
        assert_eq!(0, Queries::new(" ;\n ; \r\n".to_string()).count());
    }

    #[test]
    fn kind_follows_extension() {
        assert_eq!(
            FileKind::StaticText,
            FileKind::from_path(Path::new("g/run.cypher")).unwrap()
        );
        assert_eq!(
            FileKind::Config,
            FileKind::from_path(Path::new("g/s.config.json")).unwrap()
        );
        assert_eq!(
            FileKind::Script {
                interpreter: "python3"
            },
            FileKind::from_path(Path::new("g/setup.py")).unwrap()
        );
        assert!(matches!(
            FileKind::from_path(Path::new("g/setup.txt")),
            Err(ContentError::UnsupportedKind { .. })
        ));
        assert!(matches!(
            FileKind::from_path(Path::new("g/setup")),
            Err(ContentError::UnsupportedKind { .. })
        ));
    }
}
