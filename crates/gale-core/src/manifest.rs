//! # West Manifest
//!
//! Model of the `west.yml` workspace manifest: remotes, defaults, projects
//! and the group filter deciding which projects a checkout tracks.
//!
//! ```yaml
//! manifest:
//!   remotes:
//!     - name: upstream
//!       url-base: https://github.com/zephyrproject-rtos
//!   defaults:
//!     remote: upstream
//!     revision: main
//!   group-filter: [+gale, -optional]
//!   projects:
//!     - name: zephyr
//!       path: projects/zephyr
//!       import:
//!         path-allowlist: [modules/hal/nordic]
//! ```
//!
//! Parsing is lenient (unknown keys are ignored); [`Manifest::validate`]
//! reports structural problems: duplicate paths, undeclared groups, and
//! projects that resolve to no URL.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{GaleError, Result};

/// Revision used when neither the project nor the defaults name one.
pub const DEFAULT_REVISION: &str = "master";

/// Project name reserved for the manifest repository itself.
pub const RESERVED_PROJECT_NAME: &str = "manifest";

// =============================================================================
// DOCUMENT
// =============================================================================

#[derive(Debug, Deserialize)]
struct ManifestDocument {
    manifest: Manifest,
}

/// The `manifest:` section of a west.yml file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Manifest {
    /// Minimum west version the manifest requires.
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub remotes: Vec<Remote>,
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub projects: Vec<ManifestProject>,
    #[serde(default)]
    pub group_filter: Vec<String>,
    #[serde(default, rename = "self")]
    pub self_entry: Option<SelfEntry>,
    #[serde(skip)]
    source: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Remote {
    pub name: String,
    pub url_base: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Defaults {
    pub remote: Option<String>,
    pub revision: Option<String>,
}

/// One repository of the workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ManifestProject {
    pub name: String,
    /// Checkout path relative to the topdir; defaults to the name.
    pub path: Option<String>,
    /// Branch, tag or commit hash.
    #[serde(default)]
    pub revision: Option<String>,
    pub remote: Option<String>,
    /// Full fetch URL; excludes `remote`.
    pub url: Option<String>,
    /// Repository path under the remote's url-base; defaults to the name.
    pub repo_path: Option<String>,
    /// File declaring west extension commands.
    pub west_commands: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    pub import: Option<Import>,
}

/// The manifest repository's own entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SelfEntry {
    pub path: Option<String>,
    pub west_commands: Option<String>,
    pub import: Option<Import>,
}

/// Whether (and what) to import from a project's own manifest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Import {
    /// Import the project's `west.yml` (`true`) or nothing (`false`).
    Enabled(bool),
    /// Import the given manifest file or directory.
    File(String),
    Filtered(ImportFilter),
}

/// Import with allow-lists, e.g. only selected modules of a vendor SDK.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ImportFilter {
    pub file: Option<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub name_allowlist: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub path_allowlist: Vec<String>,
    pub path_prefix: Option<String>,
}

/// Accept a single string or a list of strings.
fn string_list<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}

impl ManifestProject {
    /// Checkout path relative to the topdir.
    pub fn effective_path(&self) -> &str {
        self.path.as_deref().unwrap_or(&self.name)
    }
}

// =============================================================================
// GROUP FILTER
// =============================================================================

/// Ordered `+group` / `-group` switches.
///
/// Groups are enabled unless disabled; when a group appears several times
/// the last entry wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupFilter {
    entries: Vec<(bool, String)>,
}

impl GroupFilter {
    /// Parse filter entries; every entry must start with `+` or `-`.
    pub fn parse<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self::default();
        for entry in entries {
            let entry = entry.as_ref().trim();
            if entry.is_empty() {
                continue;
            }
            let parsed = parse_filter_entry(entry).ok_or_else(|| {
                GaleError::InvalidOptions(format!(
                    "group filter entry '{}' must start with '+' or '-'",
                    entry
                ))
            })?;
            filter.entries.push(parsed);
        }
        Ok(filter)
    }

    /// Append `other`'s entries; they take precedence.
    pub fn extend(&mut self, other: &GroupFilter) {
        self.entries.extend(other.entries.iter().cloned());
    }

    pub fn is_enabled(&self, group: &str) -> bool {
        self.entries
            .iter()
            .rev()
            .find(|(_, name)| name == group)
            .map(|(enabled, _)| *enabled)
            .unwrap_or(true)
    }

    /// A project with no groups is always active; otherwise it needs one
    /// enabled group.
    pub fn is_active(&self, groups: &[String]) -> bool {
        groups.is_empty() || groups.iter().any(|group| self.is_enabled(group))
    }

    /// Group names mentioned by the filter.
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, name)| name.as_str())
    }
}

fn parse_filter_entry(entry: &str) -> Option<(bool, String)> {
    let (enabled, name) = if let Some(name) = entry.strip_prefix('+') {
        (true, name)
    } else if let Some(name) = entry.strip_prefix('-') {
        (false, name)
    } else {
        return None;
    };
    (!name.is_empty()).then(|| (enabled, name.to_string()))
}

fn is_valid_group_name(group: &str) -> bool {
    !group.is_empty()
        && !group.starts_with(['+', '-'])
        && !group.chars().any(|c| c.is_whitespace() || c == ',' || c == ':')
}

// =============================================================================
// VALIDATION
// =============================================================================

/// A structural problem in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ManifestIssue {
    DuplicatePath {
        path: String,
        first: String,
        second: String,
    },
    DuplicateName {
        name: String,
    },
    ReservedName {
        name: String,
    },
    UndeclaredGroup {
        project: String,
        group: String,
    },
    InvalidGroupName {
        project: String,
        group: String,
    },
    InvalidFilterEntry {
        entry: String,
    },
    UnknownRemote {
        project: String,
        remote: String,
    },
    NoRemote {
        project: String,
    },
}

impl fmt::Display for ManifestIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicatePath {
                path,
                first,
                second,
            } => write!(f, "projects '{}' and '{}' share the path '{}'", first, second, path),
            Self::DuplicateName { name } => write!(f, "project '{}' is declared more than once", name),
            Self::ReservedName { name } => {
                write!(f, "project name '{}' is reserved for the manifest repository", name)
            }
            Self::UndeclaredGroup { project, group } => write!(
                f,
                "project '{}' uses group '{}', which is not declared in group-filter",
                project, group
            ),
            Self::InvalidGroupName { project, group } => {
                write!(f, "project '{}' has an invalid group name '{}'", project, group)
            }
            Self::InvalidFilterEntry { entry } => {
                write!(f, "group-filter entry '{}' must start with '+' or '-'", entry)
            }
            Self::UnknownRemote { project, remote } => {
                write!(f, "project '{}' uses unknown remote '{}'", project, remote)
            }
            Self::NoRemote { project } => write!(
                f,
                "project '{}' has no url, no remote and there is no default remote",
                project
            ),
        }
    }
}

// =============================================================================
// MANIFEST OPERATIONS
// =============================================================================

impl Manifest {
    /// Parse the content of a west.yml file.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let document: ManifestDocument = serde_yaml::from_str(content)?;
        Ok(document.manifest)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut manifest = Self::from_yaml(&content)?;
        manifest.source = Some(path.to_path_buf());
        Ok(manifest)
    }

    /// File the manifest was loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn project(&self, name: &str) -> Option<&ManifestProject> {
        self.projects.iter().find(|p| p.name == name)
    }

    pub fn remote(&self, name: &str) -> Option<&Remote> {
        self.remotes.iter().find(|r| r.name == name)
    }

    /// The manifest's own group filter. Malformed entries are skipped
    /// ([`Manifest::validate`] reports them).
    pub fn group_filter(&self) -> GroupFilter {
        GroupFilter {
            entries: self
                .group_filter
                .iter()
                .filter_map(|entry| parse_filter_entry(entry.trim()))
                .collect(),
        }
    }

    /// Fetch URL of a project, if it resolves to one.
    pub fn resolve_url(&self, project: &ManifestProject) -> Option<String> {
        if let Some(url) = &project.url {
            return Some(url.clone());
        }
        let remote_name = project.remote.as_ref().or(self.defaults.remote.as_ref())?;
        let remote = self.remote(remote_name)?;
        let repo_path = project.repo_path.as_deref().unwrap_or(&project.name);
        Some(format!(
            "{}/{}",
            remote.url_base.trim_end_matches('/'),
            repo_path
        ))
    }

    /// Revision a project is checked out at.
    pub fn revision_of<'a>(&'a self, project: &'a ManifestProject) -> &'a str {
        project
            .revision
            .as_deref()
            .or(self.defaults.revision.as_deref())
            .unwrap_or(DEFAULT_REVISION)
    }

    /// Projects tracked by a checkout, given extra filter entries (for
    /// example from the command line) applied after the manifest's own.
    pub fn active_projects(&self, extra: &GroupFilter) -> Vec<&ManifestProject> {
        let mut filter = self.group_filter();
        filter.extend(extra);
        self.projects
            .iter()
            .filter(|project| filter.is_active(&project.groups))
            .collect()
    }

    /// Every structural problem found, in declaration order.
    pub fn validate(&self) -> Vec<ManifestIssue> {
        let mut issues = Vec::new();

        for entry in &self.group_filter {
            if parse_filter_entry(entry.trim()).is_none() {
                issues.push(ManifestIssue::InvalidFilterEntry {
                    entry: entry.clone(),
                });
            }
        }
        let declared: BTreeSet<&str> = self
            .group_filter
            .iter()
            .map(|entry| entry.trim().trim_start_matches(['+', '-']))
            .collect();

        let mut names = BTreeSet::new();
        let mut paths: BTreeMap<String, &str> = BTreeMap::new();

        for project in &self.projects {
            let name = project.name.as_str();
            if name == RESERVED_PROJECT_NAME {
                issues.push(ManifestIssue::ReservedName {
                    name: name.to_string(),
                });
            }
            if !names.insert(name) {
                issues.push(ManifestIssue::DuplicateName {
                    name: name.to_string(),
                });
            }

            let path = normalize_path(project.effective_path());
            if let Some(first) = paths.get(&path) {
                issues.push(ManifestIssue::DuplicatePath {
                    path: path.clone(),
                    first: (*first).to_string(),
                    second: name.to_string(),
                });
            } else {
                paths.insert(path, name);
            }

            for group in &project.groups {
                if !is_valid_group_name(group) {
                    issues.push(ManifestIssue::InvalidGroupName {
                        project: name.to_string(),
                        group: group.clone(),
                    });
                } else if !declared.contains(group.as_str()) {
                    issues.push(ManifestIssue::UndeclaredGroup {
                        project: name.to_string(),
                        group: group.clone(),
                    });
                }
            }

            if project.url.is_none() {
                match project.remote.as_ref().or(self.defaults.remote.as_ref()) {
                    Some(remote) if self.remote(remote).is_none() => {
                        issues.push(ManifestIssue::UnknownRemote {
                            project: name.to_string(),
                            remote: remote.clone(),
                        });
                    }
                    Some(_) => {}
                    None => issues.push(ManifestIssue::NoRemote {
                        project: name.to_string(),
                    }),
                }
            }
        }

        issues
    }

    /// Fail with every issue found, if any.
    pub fn check(&self) -> Result<()> {
        let issues = self.validate();
        if issues.is_empty() {
            return Ok(());
        }
        Err(GaleError::InvalidManifest {
            path: self
                .source
                .clone()
                .unwrap_or_else(|| PathBuf::from("west.yml")),
            issues,
        })
    }
}

fn normalize_path(path: &str) -> String {
    path.trim_start_matches("./")
        .trim_end_matches('/')
        .to_string()
}
