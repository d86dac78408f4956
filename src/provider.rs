// SPDX-License-Identifier: MPL-2.0

//! The seam between the resolver and whatever knows about repositories,
//! installed packages and user policy.

use crate::constraint::UseExisting;
use crate::decision::{ChangeType, Decision, RequiredConfirmation};
use crate::dependency::SanitisedDependency;
use crate::name::{PackageId, PackageName, RepositoryName, SlotName};
use crate::reason::Reason;
use crate::resolvent::{DestinationType, Resolvent};
use crate::spec::PackageDepSpec;
use crate::type_aliases::Map;

/// Answers the resolver's questions about the world. The required
/// methods describe what exists; the provided methods are policy hooks
/// with the defaults most callers want.
pub trait Provider {
    /// Installable occurrences matching the spec and usable at the given
    /// destination, in ascending version order.
    fn find_candidates(&self, spec: &PackageDepSpec, destination: DestinationType)
        -> Vec<PackageId>;

    /// Installed occurrences belonging to the resolvent's slot, in
    /// ascending version order.
    fn installed_ids(&self, resolvent: &Resolvent) -> Vec<PackageId>;

    fn dependencies_of(&self, id: &PackageId) -> Vec<SanitisedDependency>;

    /// Whether an occurrence with this name, version and slot is
    /// installed, regardless of which repository it originally came
    /// from.
    fn is_installed(&self, id: &PackageId) -> bool;

    /// Every slot the package is known in, installable or installed.
    /// Used to fan out slotless specs and blockers.
    fn slots_for(&self, package: &PackageName) -> Vec<SlotName>;

    /// The repository that would receive an install for this resolvent,
    /// or `None` if its destination cannot take one.
    fn destination_for(&self, resolvent: &Resolvent) -> Option<RepositoryName>;

    /// Whether a dependency should constrain the resolution. Dependencies
    /// this declines are ignored, except that suggestions are still
    /// recorded as untaken.
    fn care_about_dependency(&self, _resolvent: &Resolvent, dep: &SanitisedDependency) -> bool {
        !dep.is_suggestion()
    }

    /// How willing this constraint is to be satisfied by an installed
    /// package.
    fn use_existing(
        &self,
        _resolvent: &Resolvent,
        _spec: &PackageDepSpec,
        _reason: &Reason,
    ) -> UseExisting {
        UseExisting::IfPossible
    }

    /// Confirmations the user must give before the decision may be
    /// executed.
    fn confirm_if_necessary(
        &self,
        _resolvent: &Resolvent,
        decision: &Decision,
    ) -> Vec<RequiredConfirmation> {
        let mut confirmations = Vec::new();
        match decision {
            Decision::ChangesToMake(d) => {
                if d.change_type == ChangeType::Downgrade {
                    confirmations.push(RequiredConfirmation::Downgrade);
                }
                if !d.best {
                    confirmations.push(RequiredConfirmation::NotBest);
                }
            }
            Decision::Remove(d) => {
                if d.ids.iter().any(|id| self.is_system_package(id.name())) {
                    confirmations.push(RequiredConfirmation::RemoveSystemPackage);
                }
            }
            Decision::Break(_) => confirmations.push(RequiredConfirmation::Break),
            _ => {}
        }
        confirmations
    }

    /// Whether removing this package endangers the system.
    fn is_system_package(&self, _package: &PackageName) -> bool {
        false
    }

    /// Transient installed packages are re-made rather than reused when
    /// anything else about the resolvent changes.
    fn is_transient(&self, _id: &PackageId) -> bool {
        false
    }

    /// Whether an installed package with no remaining candidates may be
    /// left broken instead of failing the resolution.
    fn allowed_to_break(&self, _id: &PackageId) -> bool {
        false
    }

    /// Polled once per worked resolvent; an `Err` aborts the resolution
    /// with [`ResolveError::Cancelled`](crate::ResolveError::Cancelled).
    fn should_cancel(&self) -> Result<(), String> {
        Ok(())
    }
}

/// A [Provider] with all dependency information available in memory,
/// for tests and examples.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OfflineProvider {
    candidates: Vec<PackageId>,
    installed: Vec<PackageId>,
    dependencies: Map<PackageId, Vec<SanitisedDependency>>,
    system: Vec<PackageName>,
    transient: Vec<PackageId>,
    breakable: Vec<PackageId>,
    /// Packages that cannot be turned into binaries, excluded from
    /// `CreateBinary` candidate lists.
    unbinaryable: Vec<PackageName>,
    destinations: Vec<(DestinationType, RepositoryName)>,
    use_existing: Option<UseExisting>,
    take_suggestions: bool,
}

impl OfflineProvider {
    /// Creates an empty provider with a single `installed` repository
    /// receiving `InstallToSlash` installs.
    pub fn new() -> Self {
        Self {
            destinations: vec![(
                DestinationType::InstallToSlash,
                RepositoryName::new("installed"),
            )],
            ..Self::default()
        }
    }

    /// Registers an installable occurrence. Candidates registered for
    /// the same package should be added in ascending version order.
    pub fn add_candidate(&mut self, id: PackageId) -> &mut Self {
        self.candidates.push(id);
        self
    }

    /// Registers an installed occurrence.
    pub fn add_installed(&mut self, id: PackageId) -> &mut Self {
        self.installed.push(id);
        self
    }

    /// Registers one dependency of an occurrence; may be called
    /// repeatedly to accumulate.
    pub fn add_dependency(&mut self, id: &PackageId, dep: SanitisedDependency) -> &mut Self {
        self.dependencies.entry(id.clone()).or_default().push(dep);
        self
    }

    pub fn add_system_package(&mut self, package: PackageName) -> &mut Self {
        self.system.push(package);
        self
    }

    pub fn add_transient(&mut self, id: PackageId) -> &mut Self {
        self.transient.push(id);
        self
    }

    pub fn add_breakable(&mut self, id: PackageId) -> &mut Self {
        self.breakable.push(id);
        self
    }

    pub fn add_unbinaryable(&mut self, package: PackageName) -> &mut Self {
        self.unbinaryable.push(package);
        self
    }

    /// Routes a destination type to a repository. Replaces any earlier
    /// routing for the same type.
    pub fn set_destination(
        &mut self,
        destination: DestinationType,
        repository: RepositoryName,
    ) -> &mut Self {
        self.destinations.retain(|(d, _)| *d != destination);
        self.destinations.push((destination, repository));
        self
    }

    /// Overrides the default willingness to reuse installed packages for
    /// every constraint.
    pub fn set_use_existing(&mut self, use_existing: UseExisting) -> &mut Self {
        self.use_existing = Some(use_existing);
        self
    }

    /// Makes suggestions count as real dependencies.
    pub fn set_take_suggestions(&mut self, take: bool) -> &mut Self {
        self.take_suggestions = take;
        self
    }

    fn same_occurrence(a: &PackageId, b: &PackageId) -> bool {
        a.name() == b.name() && a.version() == b.version() && a.slot() == b.slot()
    }
}

impl Provider for OfflineProvider {
    fn find_candidates(
        &self,
        spec: &PackageDepSpec,
        destination: DestinationType,
    ) -> Vec<PackageId> {
        let mut found: Vec<PackageId> = self
            .candidates
            .iter()
            .filter(|id| spec.matches(id))
            .filter(|id| {
                destination != DestinationType::CreateBinary
                    || !self.unbinaryable.contains(id.name())
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.version().cmp(b.version()));
        found
    }

    fn installed_ids(&self, resolvent: &Resolvent) -> Vec<PackageId> {
        let mut found: Vec<PackageId> = self
            .installed
            .iter()
            .filter(|id| {
                *id.name() == resolvent.package
                    && (resolvent.slot.is_none() || id.slot() == resolvent.slot.as_ref())
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.version().cmp(b.version()));
        found
    }

    fn dependencies_of(&self, id: &PackageId) -> Vec<SanitisedDependency> {
        self.dependencies.get(id).cloned().unwrap_or_default()
    }

    fn is_installed(&self, id: &PackageId) -> bool {
        self.installed
            .iter()
            .any(|installed| Self::same_occurrence(installed, id))
    }

    fn slots_for(&self, package: &PackageName) -> Vec<SlotName> {
        let mut slots: Vec<SlotName> = self
            .candidates
            .iter()
            .chain(&self.installed)
            .filter(|id| id.name() == package)
            .filter_map(|id| id.slot().cloned())
            .collect();
        slots.sort();
        slots.dedup();
        slots
    }

    fn destination_for(&self, resolvent: &Resolvent) -> Option<RepositoryName> {
        self.destinations
            .iter()
            .find(|(d, _)| *d == resolvent.destination)
            .map(|(_, r)| r.clone())
    }

    fn care_about_dependency(&self, _resolvent: &Resolvent, dep: &SanitisedDependency) -> bool {
        self.take_suggestions || !dep.is_suggestion()
    }

    fn use_existing(
        &self,
        _resolvent: &Resolvent,
        _spec: &PackageDepSpec,
        _reason: &Reason,
    ) -> UseExisting {
        self.use_existing.unwrap_or(UseExisting::IfPossible)
    }

    fn is_system_package(&self, package: &PackageName) -> bool {
        self.system.contains(package)
    }

    fn is_transient(&self, id: &PackageId) -> bool {
        self.transient.iter().any(|t| Self::same_occurrence(t, id))
    }

    fn allowed_to_break(&self, id: &PackageId) -> bool {
        self.breakable.iter().any(|b| Self::same_occurrence(b, id))
    }
}
