//! `monthgate-core`: keeps one channel per calendar month inside a category
//! and grants each membership tier visibility into the buckets its window
//! covers.
//!
//! ```text
//! Config ──► WindowTable ──► AccessPlan (allowed sets per tier)
//!                                │
//! Directory ◄── Reconciler ◄─────┘
//!   list / create / set_overwrite
//! ```

pub mod allowed;
pub mod config;
pub mod directory;
pub mod ensure;
pub mod error;
pub mod guard;
pub mod memory;
pub mod period;
pub mod reconcile;
pub mod report;
pub mod window;

pub use allowed::{allowed_set, AccessPlan, TierPlan};
pub use config::{Config, TierConfig};
pub use directory::{Category, Channel, Directory, DirectoryError, Overwrite};
pub use ensure::{Bucket, EnsureOutcome};
pub use error::{GateError, Result};
pub use guard::{RunGuard, RunPermit};
pub use period::{parse_channel_name, PeriodKey};
pub use reconcile::Reconciler;
pub use report::{ReconciliationReport, WriteFailure, WriteTarget};
pub use window::{Tier, WindowTable};
