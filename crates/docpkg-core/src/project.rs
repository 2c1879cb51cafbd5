//! Project model
//!
//! A project is the declarative source of truth for a package: which files
//! feed which `(database, container, operation)`. Globs are expanded against
//! the project file's directory after `$(name)` variable substitution.

use docpkg_model::OperationType;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use wildmatch::WildMatch;

/// Maximum UTF-8 length of a database or container name
pub const MAX_NAME_BYTES: usize = 256;

/// Variable that carries the package version
pub const VERSION_VARIABLE: &str = "version";

/// Project parsing and validation errors
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    /// Project file could not be read
    #[error("cannot read project {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Project file is not valid project JSON
    #[error("malformed project {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Database or container name breaks the naming rules
    #[error("invalid {kind} name '{name}': {reason}")]
    InvalidName {
        kind: &'static str,
        name: String,
        reason: &'static str,
    },

    /// Unknown operation type
    #[error("{0}")]
    UnknownOperation(#[from] docpkg_model::UnknownOperation),

    /// Glob references an undefined variable
    #[error("undefined variable '$({name})' in '{pattern}'")]
    UndefinedVariable { name: String, pattern: String },

    /// Unterminated `$(` in a glob
    #[error("unterminated variable reference in '{0}'")]
    UnterminatedVariable(String),

    /// Source directory could not be walked
    #[error("cannot scan {path}: {message}")]
    Scan { path: PathBuf, message: String },
}

/// Project root
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Project {
    pub databases: Vec<DatabaseProject>,
}

/// One database
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseProject {
    pub name: String,
    #[serde(default)]
    pub containers: Vec<ContainerProject>,
}

/// One container
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContainerProject {
    pub name: String,
    #[serde(default)]
    pub operations: Vec<OperationProject>,
}

/// One operation with its document globs
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OperationProject {
    #[serde(rename = "type")]
    pub operation: String,
    #[serde(default, alias = "documentGlobs")]
    pub documents: Vec<String>,
}

/// A file matched by a glob, tagged with its destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSource {
    pub path: PathBuf,
    pub database: String,
    pub container: String,
    pub operation: OperationType,
}

impl ProjectSource {
    fn dedup_key(&self) -> (OperationType, String, String, String) {
        (
            self.operation,
            self.database.clone(),
            self.container.clone(),
            self.path.to_string_lossy().to_lowercase(),
        )
    }
}

/// Sources of one `(database, container, operation)` group, paths in ordinal order
pub type SourceGroups = BTreeMap<(String, String, OperationType), Vec<PathBuf>>;

impl Project {
    /// Load and validate a project file
    ///
    /// # Errors
    /// Returns [`ProjectError`] if the file is unreadable, malformed or invalid
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| ProjectError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let project: Self = serde_json::from_slice(&bytes).map_err(|source| {
            ProjectError::Malformed {
                path: path.to_path_buf(),
                source,
            }
        })?;
        project.validate()?;
        Ok(project)
    }

    /// Validate names and operation types
    ///
    /// # Errors
    /// Returns the first rule violation found
    pub fn validate(&self) -> Result<(), ProjectError> {
        for database in &self.databases {
            validate_name("database", &database.name)?;
            for container in &database.containers {
                validate_name("container", &container.name)?;
                for operation in &container.operations {
                    operation.operation.parse::<OperationType>()?;
                }
            }
        }
        Ok(())
    }

    /// Expand every glob into deduplicated sources
    ///
    /// Globs are matched against paths relative to `base_dir`, using `/` as the
    /// separator.
    ///
    /// # Errors
    /// Returns error on undefined variables or unreadable directories
    pub fn sources(
        &self,
        base_dir: &Path,
        variables: &BTreeMap<String, String>,
    ) -> Result<Vec<ProjectSource>, ProjectError> {
        let files = list_files(base_dir)?;
        let mut seen = HashSet::new();
        let mut sources = Vec::new();

        for database in &self.databases {
            for container in &database.containers {
                for operation in &container.operations {
                    let op: OperationType = operation.operation.parse()?;
                    for pattern in &operation.documents {
                        let pattern = substitute(pattern, variables)?;
                        let matcher = GlobMatcher::new(&pattern);
                        let mut matched = 0usize;
                        for relative in files.iter().filter(|f| matcher.is_match(f)) {
                            matched += 1;
                            let source = ProjectSource {
                                path: base_dir.join(relative),
                                database: database.name.clone(),
                                container: container.name.clone(),
                                operation: op,
                            };
                            if seen.insert(source.dedup_key()) {
                                sources.push(source);
                            }
                        }
                        if matched == 0 {
                            tracing::warn!(
                                database = %database.name,
                                container = %container.name,
                                operation = %op,
                                pattern = %pattern,
                                "glob matched no files"
                            );
                        }
                    }
                }
            }
        }
        Ok(sources)
    }
}

/// Group sources by destination; groups and paths in ordinal order
#[must_use]
pub fn group_sources(sources: Vec<ProjectSource>) -> SourceGroups {
    let mut groups = SourceGroups::new();
    for source in sources {
        groups
            .entry((source.database, source.container, source.operation))
            .or_default()
            .push(source.path);
    }
    for paths in groups.values_mut() {
        paths.sort_by(|a, b| a.to_string_lossy().cmp(&b.to_string_lossy()));
    }
    groups
}

fn validate_name(kind: &'static str, name: &str) -> Result<(), ProjectError> {
    let reason = if name.is_empty() {
        "name must not be empty"
    } else if name.len() > MAX_NAME_BYTES {
        "name exceeds 256 bytes"
    } else if name.contains(['/', '\\', '?', '#']) {
        "name must not contain '/', '\\', '?' or '#'"
    } else {
        return Ok(());
    };
    Err(ProjectError::InvalidName {
        kind,
        name: name.to_string(),
        reason,
    })
}

/// Replace `$(name)` references with variable values
///
/// # Errors
/// Returns error on undefined or unterminated references
pub fn substitute(
    pattern: &str,
    variables: &BTreeMap<String, String>,
) -> Result<String, ProjectError> {
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;
    while let Some(start) = rest.find("$(") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find(')')
            .ok_or_else(|| ProjectError::UnterminatedVariable(pattern.to_string()))?;
        let name = &after[..end];
        let value = variables
            .get(name)
            .ok_or_else(|| ProjectError::UndefinedVariable {
                name: name.to_string(),
                pattern: pattern.to_string(),
            })?;
        out.push_str(value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Relative `/`-separated paths of every file under `base_dir`
fn list_files(base_dir: &Path) -> Result<Vec<String>, ProjectError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(base_dir).follow_links(true) {
        let entry = entry.map_err(|e| ProjectError::Scan {
            path: base_dir.to_path_buf(),
            message: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(base_dir) {
            let parts: Vec<_> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            files.push(parts.join("/"));
        }
    }
    files.sort();
    Ok(files)
}

/// Path glob matched one `/`-separated segment at a time
///
/// `*` and `?` never cross a `/`. A `**` segment matches zero or more
/// directories.
struct GlobMatcher {
    segments: Vec<GlobSegment>,
}

enum GlobSegment {
    AnyDirectories,
    Name(WildMatch),
}

impl GlobMatcher {
    fn new(pattern: &str) -> Self {
        let pattern = pattern.replace('\\', "/");
        let pattern = pattern.strip_prefix("./").unwrap_or(&pattern);
        let segments = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s {
                "**" => GlobSegment::AnyDirectories,
                name => GlobSegment::Name(WildMatch::new(name)),
            })
            .collect();
        Self { segments }
    }

    fn is_match(&self, path: &str) -> bool {
        let parts: Vec<&str> = path.split('/').collect();
        match_segments(&self.segments, &parts)
    }
}

fn match_segments(segments: &[GlobSegment], parts: &[&str]) -> bool {
    match segments.split_first() {
        None => parts.is_empty(),
        Some((GlobSegment::AnyDirectories, rest)) => {
            (0..=parts.len()).any(|skip| match_segments(rest, &parts[skip..]))
        }
        Some((GlobSegment::Name(name), rest)) => parts
            .split_first()
            .is_some_and(|(part, tail)| name.matches(part) && match_segments(rest, tail)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn project(json: &str) -> Project {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn parse_and_validate_project() {
        let p = project(
            r#"{"databases":[{"name":"shop","containers":[{"name":"items",
               "operations":[{"type":"Upsert","documents":["items/*.json"]},
                             {"type":"delete","documentGlobs":["gone.json"]}]}]}]}"#,
        );
        p.validate().unwrap();
        let ops = &p.databases[0].containers[0].operations;
        assert_eq!(ops[1].documents, vec!["gone.json"]);
    }

    #[test]
    fn unknown_fields_are_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.json");
        std::fs::write(&path, r#"{"databases":[],"extra":1}"#).unwrap();
        assert!(matches!(Project::load(&path), Err(ProjectError::Malformed { .. })));
    }

    #[test]
    fn invalid_names_and_operations_are_rejected() {
        let empty = project(r#"{"databases":[{"name":"","containers":[]}]}"#);
        assert!(matches!(empty.validate(), Err(ProjectError::InvalidName { kind: "database", .. })));

        let long = format!(
            r#"{{"databases":[{{"name":"db","containers":[{{"name":"{}"}}]}}]}}"#,
            "c".repeat(MAX_NAME_BYTES + 1)
        );
        assert!(matches!(
            project(&long).validate(),
            Err(ProjectError::InvalidName { kind: "container", .. })
        ));

        let bad_op = project(
            r#"{"databases":[{"name":"db","containers":[{"name":"c","operations":[{"type":"merge"}]}]}]}"#,
        );
        assert!(matches!(bad_op.validate(), Err(ProjectError::UnknownOperation(_))));
    }

    #[test]
    fn variable_substitution() {
        let v = vars(&[("version", "1.2"), ("env", "prod")]);
        assert_eq!(substitute("v$(version)/$(env)/*.json", &v).unwrap(), "v1.2/prod/*.json");
        assert_eq!(substitute("plain/*.json", &v).unwrap(), "plain/*.json");
        assert!(matches!(
            substitute("$(missing)/x", &v),
            Err(ProjectError::UndefinedVariable { ref name, .. }) if name == "missing"
        ));
        assert!(matches!(substitute("$(version", &v), Err(ProjectError::UnterminatedVariable(_))));
    }

    #[test]
    fn glob_double_star_matches_zero_or_more_directories() {
        let m = GlobMatcher::new("**/*.json");
        assert!(m.is_match("a.json"));
        assert!(m.is_match("x/y/a.json"));
        assert!(!m.is_match("a.txt"));

        let m = GlobMatcher::new("data/**/*.json");
        assert!(m.is_match("data/a.json"));
        assert!(m.is_match("data/x/a.json"));
        assert!(!m.is_match("other/a.json"));
    }

    #[test]
    fn glob_star_stays_within_one_directory() {
        let m = GlobMatcher::new("items/*.json");
        assert!(m.is_match("items/x.json"));
        assert!(!m.is_match("items/sub/x.json"));

        let m = GlobMatcher::new("./items/?.json");
        assert!(m.is_match("items/a.json"));
        assert!(!m.is_match("items/ab.json"));
        assert!(!GlobMatcher::new("*.json").is_match("dir/a.json"));
    }

    #[test]
    fn sources_are_expanded_deduplicated_and_grouped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("v1/items")).unwrap();
        for name in ["b.json", "a.json"] {
            std::fs::write(dir.path().join("v1/items").join(name), "[]").unwrap();
        }
        std::fs::write(dir.path().join("v1/notes.txt"), "").unwrap();

        let p = project(
            r#"{"databases":[{"name":"shop","containers":[{"name":"items","operations":[
                {"type":"upsert","documents":["v$(version)/items/*.json","v1/items/a.json"]},
                {"type":"delete","documents":["v1/items/b.json"]}]}]}]}"#,
        );
        let sources = p.sources(dir.path(), &vars(&[("version", "1")])).unwrap();
        assert_eq!(sources.len(), 3);

        let groups = group_sources(sources);
        let keys: Vec<_> = groups.keys().map(|(_, _, op)| *op).collect();
        assert_eq!(keys, vec![OperationType::Delete, OperationType::Upsert]);

        let upserts = &groups[&("shop".to_string(), "items".to_string(), OperationType::Upsert)];
        let names: Vec<_> = upserts
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
    }
}
