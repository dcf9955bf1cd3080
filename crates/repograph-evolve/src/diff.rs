//! Diff parser: turns VCS name-status output into entity-level changes.
//!
//! For each changed file the probe runs against the before/after revisions
//! and the entity lists are paired by `(entityType, qualifiedName)`. The
//! parser refuses to invent structure: entities not produced by the probe
//! do not appear in the result.

use crate::error::VcsError;
use crate::vcs::VcsProbe;
use repograph_core::model::{EntityKind, entity_id, normalize_path};
use repograph_probe::imports::ImportRecord;
use repograph_probe::languages::Language;
use repograph_probe::probe;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One entity-level change extracted from the diff.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangedEntity {
    /// Canonical line-less ID: `<filePath>:<entityType>:<entityName>`.
    pub id: String,
    pub entity_type: EntityKind,
    pub entity_name: String,
    pub qualified_name: String,
    pub file_path: PathBuf,
    pub start_line: Option<u32>,
    pub end_line: Option<u32>,
    pub source_code: String,
}

/// A modified entity: paired before/after descriptors.
#[derive(Debug, Clone, PartialEq)]
pub struct ModifiedPair {
    pub old: ChangedEntity,
    pub new: ChangedEntity,
}

/// Entity-level view of a commit range.
#[derive(Debug, Default)]
pub struct DiffResult {
    pub insertions: Vec<ChangedEntity>,
    pub deletions: Vec<ChangedEntity>,
    pub modifications: Vec<ModifiedPair>,
    /// Import records per changed file (normalized path), taken from the
    /// later revision. Feeds the Evolver's dependency injection.
    pub file_imports: BTreeMap<String, Vec<ImportRecord>>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.insertions.is_empty() && self.deletions.is_empty() && self.modifications.is_empty()
    }
}

/// File-level status after rename/copy splitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FileStatus {
    Added,
    Deleted,
    Modified,
}

/// Parse raw name-status text. Whitespace-only and malformed lines are
/// skipped; `R<score>` splits into delete + add, `C<score>` adds only.
pub(crate) fn parse_name_status(text: &str) -> Vec<(FileStatus, PathBuf)> {
    let mut out = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let status = fields[0].trim();
        match status.chars().next() {
            Some('A') if fields.len() >= 2 => {
                out.push((FileStatus::Added, PathBuf::from(fields[1])));
            }
            Some('D') if fields.len() >= 2 => {
                out.push((FileStatus::Deleted, PathBuf::from(fields[1])));
            }
            Some('M') if fields.len() >= 2 => {
                out.push((FileStatus::Modified, PathBuf::from(fields[1])));
            }
            Some('R') if fields.len() >= 3 => {
                out.push((FileStatus::Deleted, PathBuf::from(fields[1])));
                out.push((FileStatus::Added, PathBuf::from(fields[2])));
            }
            Some('C') if fields.len() >= 3 => {
                out.push((FileStatus::Added, PathBuf::from(fields[2])));
            }
            _ => tracing::debug!(line, "skipping malformed name-status line"),
        }
    }
    out
}

/// A commit range: `A..B`, `A...B`, or a single revision (compared against
/// the working tree).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRange {
    pub old: String,
    /// `None` means the later side is the working tree.
    pub new: Option<String>,
}

impl CommitRange {
    pub fn parse(range: &str) -> Self {
        for separator in ["...", ".."] {
            if let Some((old, new)) = range.split_once(separator)
                && !old.is_empty()
                && !new.is_empty()
            {
                return Self {
                    old: old.to_string(),
                    new: Some(new.to_string()),
                };
            }
        }
        Self {
            old: range.to_string(),
            new: None,
        }
    }
}

/// Consumes name-status output and produces a [`DiffResult`].
pub struct DiffParser<'a> {
    vcs: &'a dyn VcsProbe,
    repo: &'a Path,
}

impl<'a> DiffParser<'a> {
    pub fn new(vcs: &'a dyn VcsProbe, repo: &'a Path) -> Self {
        Self { vcs, repo }
    }

    pub fn parse(&self, range: &str) -> Result<DiffResult, VcsError> {
        let raw = self.vcs.name_status(self.repo, range)?;
        let commits = CommitRange::parse(range);
        let mut result = DiffResult::default();

        for (status, path) in parse_name_status(&raw) {
            let Some(language) = path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(Language::from_extension)
            else {
                // Unsupported language: drop the file entirely.
                continue;
            };

            match status {
                FileStatus::Added => {
                    let Some(source) = self.later_content(&commits, &path)? else {
                        continue;
                    };
                    let probed = probe(&source, language.tag(), &path);
                    result
                        .file_imports
                        .insert(normalize_path(&path), probed.imports);
                    result.insertions.push(file_entity(&path, &source));
                    result
                        .insertions
                        .extend(probed.entities.into_iter().map(|e| to_changed(&path, e)));
                }
                FileStatus::Deleted => {
                    let Some(source) = self.earlier_content(&commits, &path)? else {
                        continue;
                    };
                    let probed = probe(&source, language.tag(), &path);
                    result.deletions.push(file_entity(&path, &source));
                    result
                        .deletions
                        .extend(probed.entities.into_iter().map(|e| to_changed(&path, e)));
                }
                FileStatus::Modified => {
                    let Some(old_source) = self.earlier_content(&commits, &path)? else {
                        continue;
                    };
                    let Some(new_source) = self.later_content(&commits, &path)? else {
                        continue;
                    };
                    let old_probe = probe(&old_source, language.tag(), &path);
                    let new_probe = probe(&new_source, language.tag(), &path);
                    result
                        .file_imports
                        .insert(normalize_path(&path), new_probe.imports);

                    let mut old_entities = vec![file_entity(&path, &old_source)];
                    old_entities
                        .extend(old_probe.entities.into_iter().map(|e| to_changed(&path, e)));
                    let mut new_entities = vec![file_entity(&path, &new_source)];
                    new_entities
                        .extend(new_probe.entities.into_iter().map(|e| to_changed(&path, e)));

                    pair_entities(old_entities, new_entities, &mut result);
                }
            }
        }
        Ok(result)
    }

    fn earlier_content(
        &self,
        commits: &CommitRange,
        path: &Path,
    ) -> Result<Option<String>, VcsError> {
        let bytes = self.vcs.file_at_revision(self.repo, &commits.old, path)?;
        Ok(bytes.map(|b| String::from_utf8_lossy(&b).into_owned()))
    }

    fn later_content(
        &self,
        commits: &CommitRange,
        path: &Path,
    ) -> Result<Option<String>, VcsError> {
        match &commits.new {
            Some(rev) => {
                let bytes = self.vcs.file_at_revision(self.repo, rev, path)?;
                Ok(bytes.map(|b| String::from_utf8_lossy(&b).into_owned()))
            }
            None => Ok(std::fs::read_to_string(self.repo.join(path)).ok()),
        }
    }
}

/// Pair before/after entity lists by `(entityType, qualifiedName)`.
fn pair_entities(
    old_entities: Vec<ChangedEntity>,
    new_entities: Vec<ChangedEntity>,
    result: &mut DiffResult,
) {
    let mut old_by_key: BTreeMap<(&'static str, String), ChangedEntity> = old_entities
        .into_iter()
        .map(|e| ((e.entity_type.as_str(), e.qualified_name.clone()), e))
        .collect();

    for new in new_entities {
        let key = (new.entity_type.as_str(), new.qualified_name.clone());
        match old_by_key.remove(&key) {
            Some(old) => {
                if old.source_code != new.source_code {
                    result.modifications.push(ModifiedPair { old, new });
                }
            }
            None => result.insertions.push(new),
        }
    }
    // Unpaired old entities are deletions.
    result.deletions.extend(old_by_key.into_values());
}

/// The always-emitted file-level entity (`kind = file`, qualified name =
/// file path), the anchor for cross-file dependency edges.
fn file_entity(path: &Path, source: &str) -> ChangedEntity {
    let normalized = normalize_path(path);
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(&normalized)
        .to_string();
    ChangedEntity {
        id: entity_id(path, EntityKind::File, &normalized),
        entity_type: EntityKind::File,
        entity_name: name,
        qualified_name: normalized,
        file_path: path.to_path_buf(),
        start_line: Some(1),
        end_line: Some(source.lines().count().max(1) as u32),
        source_code: source.to_string(),
    }
}

fn to_changed(path: &Path, record: repograph_probe::EntityRecord) -> ChangedEntity {
    ChangedEntity {
        id: entity_id(path, record.kind, &record.qualified_name),
        entity_type: record.kind,
        entity_name: record.name,
        qualified_name: record.qualified_name,
        file_path: path.to_path_buf(),
        start_line: Some(record.start_line),
        end_line: Some(record.end_line),
        source_code: record.source_slice,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_name_status_basic() {
        let parsed = parse_name_status("A\tsrc/new.ts\nM\tsrc/mod.ts\nD\tsrc/gone.ts\n");
        assert_eq!(
            parsed,
            vec![
                (FileStatus::Added, PathBuf::from("src/new.ts")),
                (FileStatus::Modified, PathBuf::from("src/mod.ts")),
                (FileStatus::Deleted, PathBuf::from("src/gone.ts")),
            ]
        );
    }

    #[test]
    fn test_parse_name_status_rename_splits() {
        let parsed = parse_name_status("R100\tsrc/old.ts\tsrc/new.ts\n");
        assert_eq!(
            parsed,
            vec![
                (FileStatus::Deleted, PathBuf::from("src/old.ts")),
                (FileStatus::Added, PathBuf::from("src/new.ts")),
            ]
        );
    }

    #[test]
    fn test_parse_name_status_copy_adds_only() {
        let parsed = parse_name_status("C100\tsrc/a.ts\tsrc/b.ts\n");
        assert_eq!(parsed, vec![(FileStatus::Added, PathBuf::from("src/b.ts"))]);
    }

    #[test]
    fn test_parse_name_status_skips_noise() {
        let parsed = parse_name_status("\n   \nX\tweird\nA\n M broken\nA\tok.ts\n");
        assert_eq!(parsed, vec![(FileStatus::Added, PathBuf::from("ok.ts"))]);
    }

    #[test]
    fn test_commit_range_parse() {
        assert_eq!(
            CommitRange::parse("abc..def"),
            CommitRange {
                old: "abc".to_string(),
                new: Some("def".to_string())
            }
        );
        assert_eq!(
            CommitRange::parse("abc...def"),
            CommitRange {
                old: "abc".to_string(),
                new: Some("def".to_string())
            }
        );
        assert_eq!(
            CommitRange::parse("abc"),
            CommitRange {
                old: "abc".to_string(),
                new: None
            }
        );
    }

    #[test]
    fn test_pair_entities_modification_requires_changed_source() {
        let entity = |name: &str, source: &str| ChangedEntity {
            id: format!("a.ts:function:{name}"),
            entity_type: EntityKind::Function,
            entity_name: name.to_string(),
            qualified_name: name.to_string(),
            file_path: PathBuf::from("a.ts"),
            start_line: Some(1),
            end_line: Some(2),
            source_code: source.to_string(),
        };
        let mut result = DiffResult::default();
        pair_entities(
            vec![entity("same", "body"), entity("changed", "v1"), entity("gone", "x")],
            vec![entity("same", "body"), entity("changed", "v2"), entity("fresh", "y")],
            &mut result,
        );
        assert_eq!(result.modifications.len(), 1);
        assert_eq!(result.modifications[0].old.qualified_name, "changed");
        assert_eq!(result.insertions.len(), 1);
        assert_eq!(result.insertions[0].qualified_name, "fresh");
        assert_eq!(result.deletions.len(), 1);
        assert_eq!(result.deletions[0].qualified_name, "gone");
    }
}
