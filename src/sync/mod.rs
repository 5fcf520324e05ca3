//! Offline change queue and sync engine.
//!
//! Changes recorded while the device is offline are buffered in a durable,
//! ordered queue and replayed against the backend when connectivity returns.
//!
//! Features:
//! - FIFO replay that stops at the first retryable failure
//! - Retry cap with dead-lettering and optional exponential backoff
//! - Persistence after every mutation through a pluggable store
//! - Edge-triggered sync on reconnect plus a periodic scheduler

pub mod change;
pub mod connectivity;
pub mod payload;
pub mod policy;
pub mod queue;
pub mod remote;
pub mod report;
pub mod scheduler;
pub mod status;
pub mod store;

pub use change::{ChangeId, ChangeType, PendingChange, UnknownChangeType};
pub use connectivity::{spawn_connectivity_listener, ConnectivityMonitor};
pub use payload::{
    Appointment, BabyProfile, EmergencyContact, Milestone, RecordRef, TrackingKind,
    TrackingRecord,
};
pub use policy::{Backoff, RetryPolicy, DEFAULT_MAX_RETRIES};
pub use queue::{QueueError, QueueSnapshot, StatusCallback, SyncQueue};
pub use remote::{ApplyError, HttpRemote, RemoteApply};
pub use report::{BlockedChange, SkipReason, SyncReport};
pub use scheduler::{SyncScheduler, DEFAULT_SYNC_INTERVAL};
pub use status::{DeadLetter, SyncEvent, SyncStatus};
pub use store::{ChangeStore, MemoryStore, StoreError};
