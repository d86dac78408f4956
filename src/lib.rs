// SPDX-License-Identifier: MPL-2.0

//! Slot-aware dependency resolution for a Portage-like package manager.
//!
//! Given a set of target package specs, an environment of installable
//! and installed packages, and a policy for choosing versions, slots and
//! destinations, the resolver produces an ordered, consistent set of
//! install/remove/reinstall decisions satisfying every dependency
//! constraint, or reports precisely why it cannot.
//!
//! The unit of resolution is the [Resolvent]: one package name, in one
//! slot, destined for one install target. The [Resolver] walks outward
//! from the targets, accumulating [Constraint]s per resolvent and
//! deciding each one; the orderer then linearizes the taken decisions
//! over a dependency graph, breaking cycles deterministically and
//! annotating any it has to force. Failures to decide a single
//! resolvent are ordinary outcomes
//! ([UnableToMake](Decision::UnableToMake)), not errors.
//!
//! ## Example
//!
//! ```
//! use slotsolve::{
//!     resolve, OfflineProvider, PackageDepSpec, PackageId, PackageName, RepositoryName, Version,
//! };
//!
//! let mut provider = OfflineProvider::new();
//! provider.add_candidate(PackageId::new(
//!     PackageName::new("app/hello"),
//!     Version::from(1),
//!     None,
//!     RepositoryName::new("repo"),
//! ));
//!
//! let resolved = resolve(
//!     &provider,
//!     [PackageDepSpec::anything(PackageName::new("app/hello"))],
//! )?;
//! assert_eq!(resolved.taken_change_or_remove_decisions.len(), 1);
//! # Ok::<(), slotsolve::ResolveError>(())
//! ```
//!
//! Where [OfflineProvider] stands in for whatever implements [Provider]:
//! the seam through which the resolver queries repositories, the
//! installed world, and caller policy.
//!
//! A finished [Resolved] can be written to a line-oriented text format
//! and read back (see [Resolved::serialise_to_string]), so an
//! interactive confirm-then-continue workflow can span process
//! invocations.

mod constraint;
mod decider;
mod decision;
mod dependency;
mod error;
mod internal;
mod name;
mod orderer;
mod provider;
mod reason;
mod resolution;
mod resolved;
mod resolvent;
mod serialise;
mod spec;
mod type_aliases;

pub use constraint::{Constraint, Constraints, UseExisting};
pub use decider::{resolve, Resolver};
pub use decision::{
    BreakDecision, ChangeType, ChangesToMakeDecision, Decision, ExistingNoChangeDecision,
    RemoveDecision, RequiredConfirmation, UnableToMakeDecision, UnsuitableCandidate,
};
pub use dependency::{Classifier, DependencyLabel, SanitisedDependency};
pub use error::{ResolveError, SuggestRestart};
pub use name::{PackageId, PackageName, RepositoryName, SetName, SlotName, Version};
pub use provider::{OfflineProvider, Provider};
pub use reason::{DependencyReason, Reason};
pub use resolution::{Arrow, Resolution};
pub use resolved::{ConfirmableDecision, OrderedDecision, OrdererNotes, Resolved};
pub use resolvent::{DestinationType, Resolvent};
pub use serialise::{Deserialisation, Deserialisator, ObjectWriter, Serialise, Serialiser};
pub use spec::{BlockDepSpec, PackageDepSpec, PackageOrBlockDepSpec};
pub use type_aliases::{Map, Set};
pub use version_ranges::Ranges;
