// SPDX-License-Identifier: MPL-2.0

//! Error taxonomy for resolution.
//!
//! Per-resolvent failures are not errors: a resolvent for which no
//! candidate satisfies every constraint gets an
//! [`UnableToMake`](crate::Decision::UnableToMake) decision and
//! resolution carries on. Only cross-cutting faults surface here.

use thiserror::Error;

use crate::constraint::Constraint;
use crate::decision::Decision;
use crate::resolvent::Resolvent;

/// A decision made earlier no longer satisfies a constraint that arrived
/// later, and the mismatch cannot be fixed incrementally because the old
/// decision's dependencies have already been expanded.
///
/// The caller is expected to restart resolution from scratch, feeding
/// [`suggested_preset`](SuggestRestart::suggested_preset) back in as an
/// initial constraint so the fresh run makes the right choice up front.
/// [`resolve`](crate::resolve) runs this retry loop for you.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("decision for {resolvent} needs revisiting: had decided to {previous_decision}, \
         but constraint {problematic_constraint} now requires {new_decision}")]
pub struct SuggestRestart {
    /// The resolvent whose decision went stale.
    pub resolvent: Resolvent,
    /// What had been decided before the conflicting constraint arrived.
    pub previous_decision: Decision,
    /// The late constraint the previous decision does not satisfy.
    pub problematic_constraint: Constraint,
    /// What would be decided now, with the late constraint in place.
    pub new_decision: Decision,
    /// Preset constraint to seed into the restarted resolution.
    pub suggested_preset: Constraint,
}

/// Errors terminating a [`resolve`](crate::resolve) or deserialise call.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The provider's `should_cancel` asked for an early stop.
    #[error("resolution cancelled: {0}")]
    Cancelled(String),

    /// An early decision conflicts with a later-discovered requirement;
    /// restart with the carried preset constraint.
    #[error(transparent)]
    SuggestRestart(#[from] Box<SuggestRestart>),

    /// A version string could not be parsed.
    #[error("cannot parse version {0:?}")]
    VersionParse(String),

    /// A serialised resolution is corrupt (unknown class name, missing or
    /// leftover member, bad token).
    #[error("serialisation error: {0}")]
    Serialisation(String),

    /// An internal invariant was violated. This is a bug in the library
    /// or corrupted input, never a user-facing recoverable condition.
    #[error("internal error: {0}")]
    Internal(String),
}
