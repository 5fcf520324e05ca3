//! Queue inspection and editing commands.

use std::path::PathBuf;

use serde_json::json;

use crate::cli::args::OutputFormat;
use crate::error::Error;
use crate::output::{format_dead_letters, format_enqueued, format_pending, format_status, to_json};
use crate::sync::{ChangeId, ChangeType, PendingChange, SyncQueue};

/// Arguments for `enqueue`.
#[derive(Debug, Default)]
pub struct EnqueueArgs {
    pub change_type: String,
    pub payload: Option<String>,
    pub payload_file: Option<PathBuf>,
    pub target: Option<String>,
    pub id: Option<String>,
}

impl EnqueueArgs {
    fn into_change(self) -> Result<PendingChange, Error> {
        let change_type: ChangeType = self.change_type.parse().map_err(|e| {
            let known: Vec<&str> = ChangeType::ALL.iter().map(ChangeType::as_str).collect();
            Error::InvalidInput(format!("{e} (expected one of: {})", known.join(", ")))
        })?;

        if let Some(target) = self.target {
            return Self::delete_change(change_type, &target, self.id);
        }

        let payload = match (self.payload, self.payload_file) {
            (Some(inline), _) => inline.into_bytes(),
            (None, Some(path)) => std::fs::read(&path)?,
            (None, None) => {
                return Err(Error::InvalidInput(
                    "either --payload or --payload-file is required".to_string(),
                ))
            },
        };
        // The backend only accepts JSON bodies.
        serde_json::from_slice::<serde_json::Value>(&payload)?;

        Ok(match self.id {
            Some(id) if id.trim().is_empty() => {
                return Err(Error::InvalidInput("change id must not be empty".to_string()))
            },
            Some(id) => PendingChange::with_id(id, change_type, payload),
            None => PendingChange::new(change_type, payload),
        })
    }

    fn delete_change(change_type: ChangeType, target: &str, id: Option<String>) -> Result<PendingChange, Error> {
        if target.trim().is_empty() {
            return Err(Error::InvalidInput("--target must not be empty".to_string()));
        }
        let mut change = PendingChange::delete(change_type, target).ok_or_else(|| {
            Error::InvalidInput(format!("--target only applies to delete types, not {change_type}"))
        })?;
        match id {
            Some(id) if id.trim().is_empty() => {
                Err(Error::InvalidInput("change id must not be empty".to_string()))
            },
            Some(id) => {
                change.id = ChangeId::from(id);
                Ok(change)
            },
            None => Ok(change),
        }
    }
}

/// Show queue status.
///
/// # Errors
///
/// Returns an error if output formatting fails.
pub fn status(queue: &SyncQueue, format: OutputFormat) -> Result<String, Error> {
    format_status(&queue.snapshot(), format)
}

/// List pending changes in queue order.
///
/// # Errors
///
/// Returns an error if output formatting fails.
pub fn list(queue: &SyncQueue, limit: usize, format: OutputFormat) -> Result<String, Error> {
    format_pending(&queue.pending(), limit, format)
}

/// Validate and queue a change.
///
/// # Errors
///
/// Returns an error for an unknown change type, a non-JSON payload, a
/// duplicate id, or a storage failure.
pub fn enqueue(queue: &SyncQueue, args: EnqueueArgs, format: OutputFormat) -> Result<String, Error> {
    let change = args.into_change()?;
    queue.enqueue(change.clone())?;
    format_enqueued(&change, queue.pending_count(), format)
}

/// Remove a pending change.
///
/// # Errors
///
/// Returns `Error::NotFound` if no change has this id.
pub fn dequeue(queue: &SyncQueue, id: &str, format: OutputFormat) -> Result<String, Error> {
    let id = ChangeId::from(id);
    if !queue.dequeue(&id)? {
        return Err(Error::NotFound(format!("change {id}")));
    }

    match format {
        OutputFormat::Json => to_json(&json!({"removed": id, "pending": queue.pending_count()})),
        OutputFormat::Pretty => Ok(format!("Removed change {id}")),
    }
}

/// Remove every pending change.
///
/// # Errors
///
/// Returns `Error::InvalidInput` without `--force`, or a storage error.
pub fn clear(queue: &SyncQueue, force: bool, format: OutputFormat) -> Result<String, Error> {
    if !force {
        return Err(Error::InvalidInput(
            "Use --force to clear all pending changes".to_string(),
        ));
    }
    let count = queue.clear()?;

    match format {
        OutputFormat::Json => to_json(&json!({"cleared": count})),
        OutputFormat::Pretty => Ok(format!("Cleared {count} pending changes from queue")),
    }
}

/// List dead-lettered changes, newest first.
///
/// # Errors
///
/// Returns an error if output formatting fails.
pub fn dead_letters(queue: &SyncQueue, limit: usize, format: OutputFormat) -> Result<String, Error> {
    format_dead_letters(&queue.dead_letters(), limit, format)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::sync::remote::MockRemoteApply;
    use crate::sync::MemoryStore;

    fn create_test_queue() -> SyncQueue {
        SyncQueue::new(Arc::new(MemoryStore::new()), Arc::new(MockRemoteApply::new()))
    }

    fn args(change_type: &str, payload: &str) -> EnqueueArgs {
        EnqueueArgs {
            change_type: change_type.to_string(),
            payload: Some(payload.to_string()),
            ..EnqueueArgs::default()
        }
    }

    #[test]
    fn test_enqueue_and_list() {
        let queue = create_test_queue();
        enqueue(&queue, args("milestone_create", r#"{"id":"m1"}"#), OutputFormat::Json).unwrap();

        let pending = queue.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].change_type, ChangeType::MilestoneCreate);

        let output = list(&queue, 10, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["items"][0]["payload"]["id"], "m1");
    }

    #[test]
    fn test_enqueue_rejects_unknown_type() {
        let queue = create_test_queue();
        let err = enqueue(&queue, args("add-todo", "{}"), OutputFormat::Pretty).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(err.to_string().contains("baby-update"));
    }

    #[test]
    fn test_enqueue_rejects_non_json_payload() {
        let queue = create_test_queue();
        let err = enqueue(&queue, args("baby-update", "not json"), OutputFormat::Pretty).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    fn test_enqueue_requires_payload() {
        let queue = create_test_queue();
        let args = EnqueueArgs {
            change_type: "baby-update".to_string(),
            ..EnqueueArgs::default()
        };
        assert!(matches!(
            enqueue(&queue, args, OutputFormat::Pretty),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_enqueue_delete_by_target() {
        let queue = create_test_queue();
        let args = EnqueueArgs {
            change_type: "milestone-delete".to_string(),
            target: Some("m1".to_string()),
            id: Some("del-1".to_string()),
            ..EnqueueArgs::default()
        };
        enqueue(&queue, args, OutputFormat::Pretty).unwrap();

        let pending = queue.pending();
        assert_eq!(pending[0].id, ChangeId::from("del-1"));
        assert_eq!(pending[0].change_type, ChangeType::MilestoneDelete);
        assert_eq!(pending[0].target_id(), Some("m1".to_string()));
    }

    #[test]
    fn test_target_rejected_for_non_delete_type() {
        let queue = create_test_queue();
        let args = EnqueueArgs {
            change_type: "milestone-create".to_string(),
            target: Some("m1".to_string()),
            ..EnqueueArgs::default()
        };
        let err = enqueue(&queue, args, OutputFormat::Pretty).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(err.to_string().contains("milestone-create"));
        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    fn test_enqueue_duplicate_id() {
        let queue = create_test_queue();
        let with_id = || EnqueueArgs {
            id: Some("dup".to_string()),
            ..args("baby-update", "{}")
        };
        enqueue(&queue, with_id(), OutputFormat::Pretty).unwrap();
        let err = enqueue(&queue, with_id(), OutputFormat::Pretty).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_dequeue_missing_is_not_found() {
        let queue = create_test_queue();
        assert!(matches!(
            dequeue(&queue, "nope", OutputFormat::Pretty),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_clear_requires_force() {
        let queue = create_test_queue();
        enqueue(&queue, args("baby-update", "{}"), OutputFormat::Pretty).unwrap();

        assert!(clear(&queue, false, OutputFormat::Pretty).is_err());
        assert_eq!(queue.pending_count(), 1);

        let output = clear(&queue, true, OutputFormat::Pretty).unwrap();
        assert_eq!(output, "Cleared 1 pending changes from queue");
        assert_eq!(queue.pending_count(), 0);
    }
}
