//! Safety - syntax checks, sandboxed edits, snapshots and rollback

mod editor;
mod snapshot;
mod syntax;
mod validator;

pub use editor::{AppliedChange, EditSession, FileEditor, WriteOutcome};
pub use snapshot::{PathGuard, RollbackReport, RoundSnapshot};
pub use syntax::{SyntaxKind, check_syntax, is_valid};
pub use validator::{SafetyValidator, ValidationReport};
