//! Identity and name mapping between organizations.
//!
//! Mapping files are flat CSVs (header row first, `source,target[,target2]`)
//! loaded once per run and held read-only. Lookup is best-effort: a key
//! absent from the table maps to itself. Applying a mapping is a pure
//! transform; the unmapped originals are never mutated.

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

use crate::team::{Member, RepositoryGrant, Team};

/// Errors loading a mapping file.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("unable to read mapping file: {0}")]
    Csv(#[from] csv::Error),
}

/// Which target column of a mapping file to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MappingColumn {
    /// Column 1, the primary target value.
    #[default]
    Primary,
    /// Column 2, the alternate ("GEI-style") target value.
    Alternate,
}

impl MappingColumn {
    /// Infer the column from the file path: a path containing `gei` selects
    /// the alternate column.
    ///
    /// This substring convention is load-bearing for existing mapping files
    /// and is kept exactly as-is; a mapping file whose path happens to
    /// contain "gei" will silently select the alternate column.
    pub fn infer_from_path(path: &Path) -> Self {
        if path.to_string_lossy().contains("gei") {
            Self::Alternate
        } else {
            Self::Primary
        }
    }
}

/// A source→target lookup table loaded from a mapping file.
#[derive(Debug, Default, Clone)]
pub struct Mapping {
    entries: HashMap<String, String>,
}

impl Mapping {
    /// Load a mapping file, discarding the header row.
    ///
    /// Rows missing the selected target column are skipped. Rows may have a
    /// variable number of fields.
    pub fn load(path: &Path, column: MappingColumn) -> Result<Self, MappingError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;

        let mut entries = HashMap::new();
        for record in reader.records() {
            let record = record?;
            let Some(source) = record.get(0) else {
                continue;
            };
            let target = match column {
                MappingColumn::Primary => record.get(1),
                MappingColumn::Alternate => record.get(2),
            };
            if let Some(target) = target {
                entries.insert(source.to_string(), target.to_string());
            }
        }

        Ok(Self { entries })
    }

    /// Build a mapping from in-memory pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            entries: pairs.into_iter().collect(),
        }
    }

    /// Look up a key, falling back to the key itself when absent.
    pub fn lookup<'a>(&'a self, key: &'a str) -> &'a str {
        self.entries.get(key).map(String::as_str).unwrap_or(key)
    }

    /// Number of entries in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Rewrites member handles and repository names to target equivalents.
///
/// Member handles are keyed by login; repository names are keyed by
/// `source-org/repo-name`, so the source organization is supplied at
/// application time (the repository-scoped collector maps under a different
/// owner per repository).
#[derive(Debug, Default)]
pub struct Mapper {
    members: Option<Mapping>,
    repositories: Option<Mapping>,
}

impl Mapper {
    /// A mapper with no tables; every value maps to itself.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a member-handle mapping table.
    #[must_use]
    pub fn with_member_mapping(mut self, mapping: Mapping) -> Self {
        self.members = Some(mapping);
        self
    }

    /// Attach a repository-name mapping table.
    #[must_use]
    pub fn with_repository_mapping(mut self, mapping: Mapping) -> Self {
        self.repositories = Some(mapping);
        self
    }

    /// Map a member login to its target handle.
    pub fn map_login(&self, login: &str) -> String {
        match &self.members {
            Some(mapping) => mapping.lookup(login).to_string(),
            None => login.to_string(),
        }
    }

    /// Map a repository name under the given source organization.
    pub fn map_repository(&self, source_org: &str, name: &str) -> String {
        let Some(mapping) = &self.repositories else {
            return name.to_string();
        };
        let key = format!("{source_org}/{name}");
        let mapped = mapping.lookup(&key);
        if mapped == key {
            name.to_string()
        } else {
            mapped.to_string()
        }
    }

    /// Produce a new team with member handles and repository names mapped.
    ///
    /// Pure: the input team is left untouched.
    pub fn map_team(&self, team: &Team, source_org: &str) -> Team {
        let members = team
            .members
            .iter()
            .map(|member| Member {
                login: self.map_login(&member.login),
                email: member.email.clone(),
                role: member.role,
            })
            .collect();
        let repositories = team
            .repositories
            .iter()
            .map(|grant| RepositoryGrant {
                name: self.map_repository(source_org, &grant.name),
                permission: grant.permission,
            })
            .collect();

        Team {
            members,
            repositories,
            ..team.clone()
        }
    }
}
