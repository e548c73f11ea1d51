//! Converge Cloud
//!
//! Reconciliation engine for cloud objects whose lifecycle is asynchronous: a
//! create, update or delete call returns immediately while the object moves
//! through intermediate states. This crate turns those calls into synchronous
//! operations that finish when the object converges, fails or times out.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │              ResourceController                  │
//! │   create / read / update / delete / wait         │
//! └─────────┬───────────────────────────┬───────────┘
//!           │ mutating calls            │ waits
//! ┌─────────▼─────────┐     ┌───────────▼───────────┐
//! │  trait Mutator    │     │ await_converged       │
//! │  trait Accessor   │◄────┤ await_removal         │
//! └───────────────────┘     │   └ StatusClassifier  │
//!                           └───────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use converge_cloud::{GlobalState, ResourceController, ResourceKind};
//! use tokio_util::sync::CancellationToken;
//!
//! let controller = ResourceController::for_kind(backend, ResourceKind::NodePool);
//! let mut state = GlobalState::new();
//! let applied = controller
//!     .create(payload, &mut state, &CancellationToken::new())
//!     .await?;
//! println!("{} is {}", applied.resource, applied.snapshot.status);
//! ```

pub mod changes;
pub mod controller;
pub mod error;
pub mod kind;
pub mod poll;
pub mod provider;
pub mod state;
pub mod status;
pub mod testing;

// Re-exports
pub use changes::{Change, ChangeSet};
pub use controller::{Applied, ResourceController};
pub use error::{CloudError, Result};
pub use kind::{KindProfile, PollTiming, ResourceKind, ResourceRef, UpdateGroup};
pub use poll::{Failure, PollSpec, ReconcileOutcome, await_converged, await_removal};
pub use provider::{Accessor, Backend, Mutator};
pub use state::{GlobalState, Observation, ResourceState, ResourceStatus, StateLock, StateManager};
pub use status::{Progress, StatusClassifier, StatusSnapshot};
