//! Algorithm implementations for reconciliation.
//!
//! - `diff`: single-pass keyed list diff producing a patch plan

mod diff;

pub use diff::{DiffStats, IdentityKey, KeyedDiff, KindKey, NewOp, OldOp, diff_keyed};
