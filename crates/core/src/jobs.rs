//! Backup and restore status machines.
//!
//! Backup: PENDING → COLLECTING_DATA → PACKAGING → COMPLETED, with FAILED
//! reachable from every non-terminal state.
//!
//! Restore: PENDING → VALIDATING → RESTORING_DB → RESTORING_FILES →
//! COMPLETED, with FAILED reachable from every non-terminal state.

use serde::{Deserialize, Serialize};

/// Rejected status change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} transition: {from} -> {to}")]
pub struct TransitionError {
    pub kind: &'static str,
    pub from: &'static str,
    pub to: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackupStatus {
    Pending,
    CollectingData,
    Packaging,
    Completed,
    Failed,
}

impl BackupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupStatus::Pending => "PENDING",
            BackupStatus::CollectingData => "COLLECTING_DATA",
            BackupStatus::Packaging => "PACKAGING",
            BackupStatus::Completed => "COMPLETED",
            BackupStatus::Failed => "FAILED",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BackupStatus::Pending => "En cola",
            BackupStatus::CollectingData => "Recopilando datos",
            BackupStatus::Packaging => "Empaquetando",
            BackupStatus::Completed => "Completado",
            BackupStatus::Failed => "Fallido",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BackupStatus::Completed | BackupStatus::Failed)
    }

    pub fn can_transition_to(&self, next: BackupStatus) -> bool {
        use BackupStatus::*;
        match (self, next) {
            (Pending, CollectingData) | (CollectingData, Packaging) | (Packaging, Completed) => {
                true
            }
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Validated transition.
    pub fn advance(self, next: BackupStatus) -> Result<BackupStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                kind: "backup",
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RestoreStatus {
    Pending,
    Validating,
    RestoringDb,
    RestoringFiles,
    Completed,
    Failed,
}

impl RestoreStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestoreStatus::Pending => "PENDING",
            RestoreStatus::Validating => "VALIDATING",
            RestoreStatus::RestoringDb => "RESTORING_DB",
            RestoreStatus::RestoringFiles => "RESTORING_FILES",
            RestoreStatus::Completed => "COMPLETED",
            RestoreStatus::Failed => "FAILED",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RestoreStatus::Pending => "En cola",
            RestoreStatus::Validating => "Validando",
            RestoreStatus::RestoringDb => "Restaurando base de datos",
            RestoreStatus::RestoringFiles => "Restaurando archivos",
            RestoreStatus::Completed => "Completado",
            RestoreStatus::Failed => "Fallido",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RestoreStatus::Completed | RestoreStatus::Failed)
    }

    pub fn can_transition_to(&self, next: RestoreStatus) -> bool {
        use RestoreStatus::*;
        match (self, next) {
            (Pending, Validating)
            | (Validating, RestoringDb)
            | (RestoringDb, RestoringFiles)
            | (RestoringFiles, Completed) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn advance(self, next: RestoreStatus) -> Result<RestoreStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                kind: "restore",
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }
}
