use super::{ChangeKind, ChangeRecord};
use tracing::warn;

/// One instruction for the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagingAction {
    /// Open a new file for add. A deferred add belongs to a later pass and is
    /// not executed by this run.
    Add { path: String, deferred: bool },
    Delete { path: String },
    /// Case-only rename, keeping history.
    Move { from: String, to: String },
    /// Open for edit. `expect_unchanged` marks files whose content already
    /// matched, which the revert pass is expected to drop.
    Edit { path: String, expect_unchanged: bool },
    /// Revert whichever of these opened files have identical content.
    RevertIfUnchanged { paths: Vec<String> },
}

impl StagingAction {
    /// Relative path whose source content must land in the workspace before
    /// this action is staged.
    pub fn copy_path(&self) -> Option<&str> {
        match self {
            StagingAction::Add {
                path,
                deferred: false,
            } => Some(path.as_str()),
            StagingAction::Edit { path, .. } => Some(path.as_str()),
            StagingAction::Move { to, .. } => Some(to.as_str()),
            _ => None,
        }
    }
}

/// Ordered staging actions for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub actions: Vec<StagingAction>,
    /// Case renames on a case-insensitive server need a second run after this
    /// changelist is submitted.
    pub second_pass_required: bool,
}

impl Plan {
    pub fn adds(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().filter_map(|a| match a {
            StagingAction::Add {
                path,
                deferred: false,
            } => Some(path.as_str()),
            _ => None,
        })
    }

    pub fn deferred(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().filter_map(|a| match a {
            StagingAction::Add {
                path,
                deferred: true,
            } => Some(path.as_str()),
            _ => None,
        })
    }

    pub fn deletes(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().filter_map(|a| match a {
            StagingAction::Delete { path } => Some(path.as_str()),
            _ => None,
        })
    }

    pub fn moves(&self) -> impl Iterator<Item = (&str, &str)> {
        self.actions.iter().filter_map(|a| match a {
            StagingAction::Move { from, to } => Some((from.as_str(), to.as_str())),
            _ => None,
        })
    }

    pub fn edits(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().filter_map(|a| match a {
            StagingAction::Edit { path, .. } => Some(path.as_str()),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Turn resolved records into staging actions.
///
/// Records are expected in identity-key order, which the actions keep. Every
/// edit, changed or not, is listed once more in a trailing
/// `RevertIfUnchanged`.
pub fn plan(records: &[ChangeRecord<'_>]) -> Plan {
    let mut plan = Plan::default();
    let mut edited = Vec::new();

    for record in records {
        match (record.kind, record.source, record.destination) {
            (ChangeKind::Add, Some(source), _) => plan.actions.push(StagingAction::Add {
                path: source.path.clone(),
                deferred: false,
            }),
            (ChangeKind::Delete, _, Some(destination)) => {
                plan.actions.push(StagingAction::Delete {
                    path: destination.path.clone(),
                })
            }
            (ChangeKind::Move, Some(source), Some(destination)) => {
                plan.actions.push(StagingAction::Move {
                    from: destination.path.clone(),
                    to: source.path.clone(),
                })
            }
            (ChangeKind::CaseAmbiguous, Some(source), Some(destination)) => {
                plan.actions.push(StagingAction::Delete {
                    path: destination.path.clone(),
                });
                plan.actions.push(StagingAction::Add {
                    path: source.path.clone(),
                    deferred: true,
                });
                plan.second_pass_required = true;
            }
            (
                kind @ (ChangeKind::RealEdit | ChangeKind::EditCandidate | ChangeKind::Unchanged),
                Some(_),
                Some(destination),
            ) => {
                plan.actions.push(StagingAction::Edit {
                    path: destination.path.clone(),
                    expect_unchanged: kind == ChangeKind::Unchanged,
                });
                edited.push(destination.path.clone());
            }
            (kind, _, _) => warn!("Skipping incomplete {:?} record for {}", kind, record.key),
        }
    }

    if !edited.is_empty() {
        plan.actions
            .push(StagingAction::RevertIfUnchanged { paths: edited });
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FileEntry;

    fn record<'a>(
        kind: ChangeKind,
        source: Option<&'a FileEntry>,
        destination: Option<&'a FileEntry>,
    ) -> ChangeRecord<'a> {
        let key = source.or(destination).map(|e| e.path.as_str()).unwrap_or("");
        ChangeRecord {
            key,
            kind,
            source,
            destination,
        }
    }

    #[test]
    fn test_plan_covers_every_kind() {
        let added = FileEntry::source("new.txt", 1, false);
        let removed = FileEntry::destination("old.txt", 1, false, None);
        let edited_src = FileEntry::source("same.txt", 1, false);
        let edited_dst = FileEntry::destination("same.txt", 1, false, None);
        let moved_src = FileEntry::source("Upper.txt", 1, false);
        let moved_dst = FileEntry::destination("upper.txt", 1, false, None);

        let records = vec![
            record(ChangeKind::Add, Some(&added), None),
            record(ChangeKind::Delete, None, Some(&removed)),
            record(ChangeKind::Unchanged, Some(&edited_src), Some(&edited_dst)),
            record(ChangeKind::Move, Some(&moved_src), Some(&moved_dst)),
        ];
        let plan = plan(&records);

        assert_eq!(
            plan.actions,
            vec![
                StagingAction::Add {
                    path: "new.txt".into(),
                    deferred: false
                },
                StagingAction::Delete {
                    path: "old.txt".into()
                },
                StagingAction::Edit {
                    path: "same.txt".into(),
                    expect_unchanged: true
                },
                StagingAction::Move {
                    from: "upper.txt".into(),
                    to: "Upper.txt".into()
                },
                StagingAction::RevertIfUnchanged {
                    paths: vec!["same.txt".into()]
                },
            ]
        );
        assert!(!plan.second_pass_required);
    }

    #[test]
    fn test_case_ambiguous_splits_and_defers() {
        let source = FileEntry::source("README.md", 1, false);
        let destination = FileEntry::destination("readme.md", 1, false, None);
        let records = vec![record(ChangeKind::CaseAmbiguous, Some(&source), Some(&destination))];

        let plan = plan(&records);

        assert!(plan.second_pass_required);
        assert_eq!(plan.deletes().collect::<Vec<_>>(), vec!["readme.md"]);
        assert_eq!(plan.deferred().collect::<Vec<_>>(), vec!["README.md"]);
        assert_eq!(plan.adds().count(), 0);
        assert!(plan.actions.iter().all(|a| a.copy_path().is_none()));
    }

    #[test]
    fn test_no_revert_without_edits() {
        let added = FileEntry::source("new.txt", 1, false);
        let plan = plan(&[record(ChangeKind::Add, Some(&added), None)]);
        assert_eq!(plan.actions.len(), 1);
        assert_eq!(plan.actions[0].copy_path(), Some("new.txt"));
    }
}
