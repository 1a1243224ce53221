use crate::enums::ConflictResolution;
use crate::error::{PaintError, Result};
use crate::labels::{LabelId, LabelTable};

/// Identity-management operation over the whole label volume.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LabelCommand {
    Rename {
        label: LabelId,
        name: String,
    },
    /// Move `old` to `new`. Into an existing `new` this needs an explicit
    /// `resolution`, otherwise it fails with `IdConflict`.
    ChangeId {
        old: LabelId,
        new: LabelId,
        resolution: Option<ConflictResolution>,
    },
    Merge {
        old: LabelId,
        new: LabelId,
    },
    /// Destructive: the previous occupants of `new` become background.
    Replace {
        old: LabelId,
        new: LabelId,
    },
    Delete {
        label: LabelId,
    },
}

/// A command checked against the label table, ready to execute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Plan {
    Rename { label: LabelId, name: String },
    Move { old: LabelId, new: LabelId },
    Merge { old: LabelId, new: LabelId },
    Replace { old: LabelId, new: LabelId },
    Delete { label: LabelId },
    Noop,
}

impl LabelCommand {
    pub fn rename(label: LabelId, name: impl Into<String>) -> Self {
        LabelCommand::Rename {
            label,
            name: name.into(),
        }
    }

    pub fn change_id(old: LabelId, new: LabelId) -> Self {
        LabelCommand::ChangeId {
            old,
            new,
            resolution: None,
        }
    }

    /// Turn the command into a plan, or fail without touching anything.
    pub(crate) fn resolve(self, labels: &LabelTable) -> Result<Plan> {
        match self {
            LabelCommand::Rename { label, name } => {
                labels.require(label)?;
                Ok(Plan::Rename { label, name })
            }
            LabelCommand::ChangeId {
                old,
                new,
                resolution,
            } => {
                labels.require(old)?;
                if old == new {
                    return Ok(Plan::Noop);
                }
                if !labels.contains(new) {
                    return Ok(Plan::Move { old, new });
                }
                match resolution {
                    None => Err(PaintError::IdConflict {
                        old: old.get(),
                        new: new.get(),
                    }),
                    Some(ConflictResolution::Merge) => Ok(Plan::Merge { old, new }),
                    Some(ConflictResolution::Replace) => Ok(Plan::Replace { old, new }),
                }
            }
            LabelCommand::Merge { old, new } => {
                labels.require(old)?;
                labels.require(new)?;
                if old == new {
                    return Ok(Plan::Noop);
                }
                Ok(Plan::Merge { old, new })
            }
            LabelCommand::Replace { old, new } => {
                labels.require(old)?;
                labels.require(new)?;
                if old == new {
                    return Ok(Plan::Noop);
                }
                Ok(Plan::Replace { old, new })
            }
            LabelCommand::Delete { label } => {
                labels.require(label)?;
                Ok(Plan::Delete { label })
            }
        }
    }
}
