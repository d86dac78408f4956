// SPDX-License-Identifier: MPL-2.0

//! The decision engine.
//!
//! Starting from the user's targets, the decider walks outward through
//! dependency edges, creating a [Resolution] per [Resolvent] and
//! deciding each one against every constraint seen so far. Expansion is
//! a FIFO work queue rather than recursion, so dependency depth never
//! touches the stack and termination follows from constraint
//! deduplication: a resolvent is only requeued when its constraint set
//! actually grows.
//!
//! A decision made early can be invalidated by a constraint discovered
//! later, after the early decision's dependencies were already expanded.
//! That cannot be fixed incrementally, so the decider reports
//! [SuggestRestart] and the [resolve] entry point reruns resolution with
//! the corrective constraint seeded in from the start.

use std::cmp::Ordering;
use std::collections::VecDeque;

use log::{debug, info};

use crate::constraint::{Constraint, Constraints, UseExisting};
use crate::decision::{
    ChangeType, ChangesToMakeDecision, Decision, ExistingNoChangeDecision, RemoveDecision,
    RequiredConfirmation, UnableToMakeDecision, UnsuitableCandidate,
};
use crate::error::{ResolveError, SuggestRestart};
use crate::name::{PackageId, SetName};
use crate::orderer;
use crate::provider::Provider;
use crate::reason::{DependencyReason, Reason};
use crate::resolution::{Arrow, Resolution};
use crate::resolved::Resolved;
use crate::resolvent::{DestinationType, Resolvent};
use crate::spec::{BlockDepSpec, PackageDepSpec, PackageOrBlockDepSpec};
use crate::type_aliases::{FxIndexMap, Set};

/// How many times [resolve] will accept a [SuggestRestart] before giving
/// up and surfacing it. Each restart pins at least one decision, so in
/// practice one or two suffice.
const MAX_RESTARTS: usize = 10;

/// Resolves the given target specs against the provider, retrying with
/// pinned presets whenever an early decision turns out to conflict with
/// a later-discovered requirement.
#[cold]
pub fn resolve<P: Provider>(
    provider: &P,
    targets: impl IntoIterator<Item = PackageDepSpec>,
) -> Result<Resolved, ResolveError> {
    let targets: Vec<PackageDepSpec> = targets.into_iter().collect();
    let mut carried: Vec<(Resolvent, Constraint)> = Vec::new();
    let mut attempts = 0;
    loop {
        let mut resolver = Resolver::new();
        for spec in &targets {
            resolver.add_target(spec.clone());
        }
        for (resolvent, constraint) in &carried {
            resolver.add_initial_constraint(resolvent.clone(), constraint.clone());
        }
        match resolver.resolve(provider) {
            Err(ResolveError::SuggestRestart(restart)) if attempts < MAX_RESTARTS => {
                info!("restarting resolution: {restart}");
                attempts += 1;
                carried.push((restart.resolvent.clone(), restart.suggested_preset.clone()));
            }
            other => return other,
        }
    }
}

struct TargetEntry {
    set: Option<SetName>,
    spec: PackageDepSpec,
    destination: DestinationType,
    removal: bool,
}

/// The decision engine. Owns the resolution table for the duration of a
/// [resolve](Resolver::resolve) call; the returned [Resolved] is an
/// independent snapshot, so the resolver can be reused or discarded
/// afterwards.
pub struct Resolver {
    resolutions: FxIndexMap<Resolvent, Resolution>,
    queue: VecDeque<Resolvent>,
    queued: Set<Resolvent>,
    targets: Vec<TargetEntry>,
    presets: Vec<PackageId>,
    initial_constraints: Vec<(Resolvent, Constraint)>,
    removal_resolvents: Set<Resolvent>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            resolutions: FxIndexMap::default(),
            queue: VecDeque::new(),
            queued: Set::default(),
            targets: Vec::new(),
            presets: Vec::new(),
            initial_constraints: Vec::new(),
            removal_resolvents: Set::default(),
        }
    }

    /// Adds a top-level install target destined for the system root.
    pub fn add_target(&mut self, spec: PackageDepSpec) {
        self.add_target_with_destination(spec, DestinationType::InstallToSlash);
    }

    pub fn add_target_with_destination(
        &mut self,
        spec: PackageDepSpec,
        destination: DestinationType,
    ) {
        self.targets.push(TargetEntry {
            set: None,
            spec,
            destination,
            removal: false,
        });
    }

    /// Adds a named set of install targets; constraints they produce
    /// carry the set name in their provenance.
    pub fn add_set(&mut self, name: SetName, specs: impl IntoIterator<Item = PackageDepSpec>) {
        for spec in specs {
            self.targets.push(TargetEntry {
                set: Some(name.clone()),
                spec,
                destination: DestinationType::InstallToSlash,
                removal: false,
            });
        }
    }

    /// Adds a removal target: installed occurrences matching the spec
    /// get [Remove](Decision::Remove) decisions.
    pub fn add_removal_target(&mut self, spec: PackageDepSpec) {
        self.targets.push(TargetEntry {
            set: None,
            spec,
            destination: DestinationType::InstallToSlash,
            removal: true,
        });
    }

    /// Registers an installed package for which nothing is wanted, so it
    /// participates in resolution (and may be removed if something
    /// blocks it) without forcing any action.
    pub fn add_preset(&mut self, id: PackageId) {
        self.presets.push(id);
    }

    /// Seeds a constraint before any target is worked. The restart loop
    /// in [resolve] uses this to pin decisions.
    pub fn add_initial_constraint(&mut self, resolvent: Resolvent, constraint: Constraint) {
        self.initial_constraints.push((resolvent, constraint));
    }

    /// Discards the given targets and every resolution reachable only
    /// through them. Shared dependencies survive; purging specs that
    /// were never targets changes nothing.
    pub fn purge(&mut self, specs: &[PackageDepSpec]) {
        self.targets.retain(|t| !specs.contains(&t.spec));
        for resolution in self.resolutions.values_mut() {
            let dropped = resolution.constraints.retain(|c| {
                !(c.reason.is_target() && specs.contains(c.spec.package_spec()))
            });
            if dropped {
                resolution.decision = None;
                resolution.already_ordered = false;
                resolution.arrows.clear();
            }
        }
        loop {
            let orphaned: Vec<Resolvent> = self
                .resolutions
                .iter()
                .filter(|(_, r)| r.constraints.is_empty())
                .map(|(resolvent, _)| resolvent.clone())
                .collect();
            if orphaned.is_empty() {
                break;
            }
            for resolvent in &orphaned {
                debug!("purging {resolvent}");
                self.resolutions.shift_remove(resolvent);
            }
            for resolution in self.resolutions.values_mut() {
                let dropped = resolution.constraints.retain(|c| {
                    c.reason
                        .dependency_reason()
                        .is_none_or(|dr| !orphaned.contains(&dr.from_resolvent))
                });
                if dropped {
                    resolution.decision = None;
                    resolution.already_ordered = false;
                    resolution.arrows.clear();
                }
            }
        }
    }

    /// Runs the work queue to completion and orders the outcome.
    pub fn resolve<P: Provider>(&mut self, provider: &P) -> Result<Resolved, ResolveError> {
        self.seed(provider)?;
        while let Some(resolvent) = self.queue.pop_front() {
            self.queued.remove(&resolvent);
            provider.should_cancel().map_err(ResolveError::Cancelled)?;
            self.work(provider, resolvent)?;
        }
        self.propagate_unable();
        info!("decided {} resolvents", self.resolutions.len());
        orderer::order(&mut self.resolutions)
    }

    fn seed<P: Provider>(&mut self, provider: &P) -> Result<(), ResolveError> {
        self.removal_resolvents.clear();

        let initials = self.initial_constraints.clone();
        for (resolvent, constraint) in initials {
            self.apply_constraint(provider, resolvent, constraint)?;
        }

        let presets = self.presets.clone();
        for id in presets {
            let resolvent = Resolvent::of(&id, DestinationType::InstallToSlash);
            let constraint = Constraint {
                reason: Reason::Preset,
                spec: PackageOrBlockDepSpec::Package(PackageDepSpec::anything(id.name().clone())),
                use_existing: UseExisting::IfPossible,
                to_destination: false,
                nothing_is_fine_too: true,
                untaken: false,
            };
            self.apply_constraint(provider, resolvent, constraint)?;
        }

        let targets: Vec<(Option<SetName>, PackageDepSpec, DestinationType, bool)> = self
            .targets
            .iter()
            .map(|t| (t.set.clone(), t.spec.clone(), t.destination, t.removal))
            .collect();
        for (set, spec, destination, removal) in targets {
            let wrap = |reason: Reason| match &set {
                Some(name) => Reason::Set {
                    name: name.clone(),
                    inner: Box::new(reason),
                },
                None => reason,
            };
            if removal {
                for resolvent in removal_resolvents_for_spec(provider, &spec) {
                    self.removal_resolvents.insert(resolvent.clone());
                    let constraint = Constraint {
                        reason: wrap(Reason::Target),
                        spec: PackageOrBlockDepSpec::Block(BlockDepSpec::new(spec.clone(), true)),
                        use_existing: UseExisting::IfPossible,
                        to_destination: false,
                        nothing_is_fine_too: true,
                        untaken: false,
                    };
                    self.apply_constraint(provider, resolvent, constraint)?;
                }
            } else {
                for resolvent in resolvents_for_spec(provider, &spec, destination) {
                    let reason = wrap(Reason::Target);
                    let use_existing = provider.use_existing(&resolvent, &spec, &reason);
                    let constraint = Constraint {
                        reason,
                        spec: PackageOrBlockDepSpec::Package(spec.clone()),
                        use_existing,
                        to_destination: true,
                        nothing_is_fine_too: false,
                        untaken: false,
                    };
                    self.apply_constraint(provider, resolvent, constraint)?;
                }
            }
        }

        // A purge may have left decided-but-now-undecided resolutions
        // behind; put them back on the queue.
        let undecided: Vec<Resolvent> = self
            .resolutions
            .iter()
            .filter(|(_, r)| r.decision.is_none())
            .map(|(resolvent, _)| resolvent.clone())
            .collect();
        for resolvent in undecided {
            self.enqueue(resolvent);
        }
        Ok(())
    }

    fn enqueue(&mut self, resolvent: Resolvent) {
        if self.queued.insert(resolvent.clone()) {
            self.queue.push_back(resolvent);
        }
    }

    /// Records a constraint against a resolvent, creating its resolution
    /// on first reference. If the resolvent already carries a decision
    /// the new constraint is verified against it; a stale decision whose
    /// dependencies were never expanded is quietly re-decided, anything
    /// else escalates.
    fn apply_constraint<P: Provider>(
        &mut self,
        provider: &P,
        resolvent: Resolvent,
        constraint: Constraint,
    ) -> Result<(), ResolveError> {
        let is_removal = self.removal_resolvents.contains(&resolvent);
        let resolution = self
            .resolutions
            .entry(resolvent.clone())
            .or_insert_with(|| Resolution::new(resolvent.clone()));
        if !resolution.constraints.add(constraint.clone()) {
            return Ok(());
        }
        debug!("constraint on {resolvent}: {constraint}");

        let needs_enqueue = match &resolution.decision {
            None => true,
            Some(decision) if decision_satisfies(decision, &constraint) => false,
            Some(decision) => {
                if resolution.already_ordered {
                    return Err(ResolveError::Internal(format!(
                        "constraint {constraint} arrived for {resolvent} after ordering"
                    )));
                }
                match decision {
                    // These expanded no dependencies, so re-deciding in
                    // place is safe.
                    Decision::NothingNoChange { .. } | Decision::Remove(_) | Decision::Break(_) => {
                        resolution.decision = None;
                        true
                    }
                    _ => {
                        let previous = decision.clone();
                        let new_decision = compute_decision(
                            provider,
                            &resolvent,
                            &resolution.constraints,
                            is_removal,
                        );
                        if let Decision::UnableToMake(_) = &new_decision {
                            info!("decision for {resolvent} invalidated by {constraint}, now unable");
                            resolution.decision = Some(new_decision);
                            false
                        } else {
                            let suggested_preset = match new_decision.origin_or_existing_id() {
                                Some(id) => Constraint {
                                    reason: Reason::Preset,
                                    spec: PackageOrBlockDepSpec::Package(PackageDepSpec::exactly(
                                        id,
                                    )),
                                    use_existing: UseExisting::IfPossible,
                                    to_destination: false,
                                    nothing_is_fine_too: false,
                                    untaken: false,
                                },
                                None => Constraint {
                                    reason: Reason::Preset,
                                    ..constraint.clone()
                                },
                            };
                            return Err(Box::new(SuggestRestart {
                                resolvent,
                                previous_decision: previous,
                                problematic_constraint: constraint,
                                new_decision,
                                suggested_preset,
                            })
                            .into());
                        }
                    }
                }
            }
        };
        if needs_enqueue {
            self.enqueue(resolvent);
        }
        Ok(())
    }

    /// Decides one popped resolvent and expands the chosen package's
    /// dependencies.
    fn work<P: Provider>(
        &mut self,
        provider: &P,
        resolvent: Resolvent,
    ) -> Result<(), ResolveError> {
        let is_removal = self.removal_resolvents.contains(&resolvent);
        let mut decision = {
            let resolution = match self.resolutions.get(&resolvent) {
                Some(resolution) => resolution,
                None => {
                    return Err(ResolveError::Internal(format!(
                        "queued resolvent {resolvent} has no resolution"
                    )))
                }
            };
            if resolution.decision.is_some() {
                return Ok(());
            }
            compute_decision(provider, &resolvent, &resolution.constraints, is_removal)
        };

        if matches!(
            decision,
            Decision::ChangesToMake(_) | Decision::Remove(_) | Decision::Break(_)
        ) {
            let confirmations = provider.confirm_if_necessary(&resolvent, &decision);
            set_confirmations(&mut decision, confirmations);
        }
        info!("decided {resolvent}: {decision}");

        let expand_from = match &decision {
            Decision::ChangesToMake(d) => Some(d.origin_id.clone()),
            Decision::ExistingNoChange(d) => Some(d.existing_id.clone()),
            _ => None,
        };

        // Blockers order the removal against the blocker's own install: a
        // strong block insists the removal happens first, a weak block
        // lets it trail the install (and lets cycle breaking drop the
        // hint entirely).
        let mut arrows: Vec<(Resolvent, Arrow)> = Vec::new();
        if matches!(decision, Decision::Remove(_)) {
            if let Some(resolution) = self.resolutions.get(&resolvent) {
                for constraint in &resolution.constraints {
                    let Some(block) = constraint.spec.as_block() else {
                        continue;
                    };
                    let Some(dr) = constraint.reason.dependency_reason() else {
                        continue;
                    };
                    if block.strong() {
                        arrows.push((
                            dr.from_resolvent.clone(),
                            Arrow {
                                to_resolvent: resolvent.clone(),
                                ignorable_pass: 0,
                                comment: format!("removed before {} arrives", dr.from_id),
                            },
                        ));
                    } else {
                        arrows.push((
                            resolvent.clone(),
                            Arrow {
                                to_resolvent: dr.from_resolvent.clone(),
                                ignorable_pass: 2,
                                comment: format!("removed to satisfy {}", dr.from_id),
                            },
                        ));
                    }
                }
            }
        }
        if let Some(resolution) = self.resolutions.get_mut(&resolvent) {
            resolution.decision = Some(decision);
        }
        for (owner, arrow) in arrows {
            if let Some(resolution) = self.resolutions.get_mut(&owner) {
                if !resolution
                    .arrows
                    .iter()
                    .any(|a| a.to_resolvent == arrow.to_resolvent)
                {
                    resolution.arrows.push(arrow);
                }
            }
        }

        if let Some(id) = expand_from {
            self.expand_dependencies(provider, &resolvent, &id)?;
        }
        Ok(())
    }

    fn expand_dependencies<P: Provider>(
        &mut self,
        provider: &P,
        resolvent: &Resolvent,
        id: &PackageId,
    ) -> Result<(), ResolveError> {
        for dep in provider.dependencies_of(id) {
            let cared = provider.care_about_dependency(resolvent, &dep);
            // Uncared-for suggestions are still recorded, as untaken, so
            // they can be shown without being acted on.
            let untaken = !cared && dep.is_suggestion();
            if !cared && !untaken {
                continue;
            }
            match &dep.spec {
                PackageOrBlockDepSpec::Package(spec) => {
                    let destination = if resolvent.destination == DestinationType::CreateBinary
                        && dep.classifier().build
                    {
                        // Build dependencies of a binary creation must be
                        // usable on the build host itself.
                        DestinationType::InstallToSlash
                    } else {
                        resolvent.destination
                    };
                    for target in resolvents_for_spec(provider, spec, destination) {
                        let already_met = provider
                            .installed_ids(&target)
                            .iter()
                            .any(|installed| spec.matches(installed));
                        let reason = Reason::Dependency(DependencyReason {
                            from_id: id.clone(),
                            from_resolvent: resolvent.clone(),
                            dependency: dep.clone(),
                            already_met,
                        });
                        let use_existing = provider.use_existing(&target, spec, &reason);
                        let constraint = Constraint {
                            reason,
                            spec: PackageOrBlockDepSpec::Package(spec.clone()),
                            use_existing,
                            to_destination: true,
                            nothing_is_fine_too: false,
                            untaken,
                        };
                        self.apply_constraint(provider, target, constraint)?;
                    }
                }
                PackageOrBlockDepSpec::Block(block) => {
                    let destination = match resolvent.destination {
                        // Creating a binary does not conflict with the
                        // installed world.
                        DestinationType::CreateBinary => DestinationType::InstallToSlash,
                        other => other,
                    };
                    for target in resolvents_for_block(provider, block, destination) {
                        let already_met = !provider
                            .installed_ids(&target)
                            .iter()
                            .any(|installed| block.blocked().matches(installed));
                        let reason = Reason::Dependency(DependencyReason {
                            from_id: id.clone(),
                            from_resolvent: resolvent.clone(),
                            dependency: dep.clone(),
                            already_met,
                        });
                        let constraint = Constraint {
                            reason,
                            spec: PackageOrBlockDepSpec::Block(block.clone()),
                            use_existing: UseExisting::IfPossible,
                            to_destination: false,
                            nothing_is_fine_too: true,
                            untaken,
                        };
                        self.apply_constraint(provider, target, constraint)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// A resolvent whose chosen package turned out unresolvable drags
    /// everything that hard-depends on that choice down with it, until
    /// no decision rests on an unable dependency.
    fn propagate_unable(&mut self) {
        loop {
            let mut stale: Vec<(Resolvent, PackageId, Resolvent)> = Vec::new();
            for (resolvent, resolution) in &self.resolutions {
                let Some(Decision::UnableToMake(_)) = &resolution.decision else {
                    continue;
                };
                for constraint in &resolution.constraints {
                    if constraint.untaken || constraint.nothing_is_fine_too {
                        continue;
                    }
                    let Some(dr) = constraint.reason.dependency_reason() else {
                        continue;
                    };
                    if dr.already_met {
                        continue;
                    }
                    let Some(dependent) = self.resolutions.get(&dr.from_resolvent) else {
                        continue;
                    };
                    match &dependent.decision {
                        Some(
                            decision @ (Decision::ChangesToMake(_) | Decision::ExistingNoChange(_)),
                        ) if decision.origin_or_existing_id() == Some(&dr.from_id) => {
                            stale.push((
                                dr.from_resolvent.clone(),
                                dr.from_id.clone(),
                                resolvent.clone(),
                            ));
                        }
                        _ => {}
                    }
                }
            }
            let mut changed = false;
            for (dependent, id, unable_dep) in stale {
                let Some(resolution) = self.resolutions.get_mut(&dependent) else {
                    continue;
                };
                if matches!(resolution.decision, Some(Decision::UnableToMake(_))) {
                    continue;
                }
                let taken = resolution
                    .decision
                    .as_ref()
                    .is_some_and(|decision| decision.taken());
                info!("{dependent} is unable: its dependency {unable_dep} is unresolvable");
                resolution.decision = Some(Decision::UnableToMake(UnableToMakeDecision {
                    unsuitable_candidates: vec![UnsuitableCandidate {
                        id,
                        unmet_constraints: vec![format!(
                            "unresolvable dependency on {unable_dep}"
                        )],
                    }],
                    taken,
                }));
                changed = true;
            }
            if !changed {
                break;
            }
        }
    }
}

fn id_in_resolvent(id: &PackageId, resolvent: &Resolvent) -> bool {
    *id.name() == resolvent.package
        && (resolvent.slot.is_none() || id.slot() == resolvent.slot.as_ref())
}

/// The resolvent a package spec lands on: the exact slot when the spec
/// names one, otherwise the slot of the best installable candidate,
/// falling back to the best installed occurrence, falling back to the
/// slotless resolvent.
fn resolvents_for_spec<P: Provider>(
    provider: &P,
    spec: &PackageDepSpec,
    destination: DestinationType,
) -> Vec<Resolvent> {
    if let Some(slot) = spec.exact_slot() {
        return vec![Resolvent::new(
            spec.package().clone(),
            Some(slot.clone()),
            destination,
        )];
    }
    let candidates = provider.find_candidates(spec, destination);
    if let Some(best) = candidates.last() {
        return vec![Resolvent::new(
            spec.package().clone(),
            best.slot().cloned(),
            destination,
        )];
    }
    let anywhere = Resolvent::new(spec.package().clone(), None, destination);
    let installed = provider.installed_ids(&anywhere);
    if let Some(best) = installed.last() {
        return vec![Resolvent::new(
            spec.package().clone(),
            best.slot().cloned(),
            destination,
        )];
    }
    vec![anywhere]
}

/// Blocks fan out over every known slot of the blocked package.
fn resolvents_for_block<P: Provider>(
    provider: &P,
    block: &BlockDepSpec,
    destination: DestinationType,
) -> Vec<Resolvent> {
    let package = block.blocked().package().clone();
    let slots = provider.slots_for(&package);
    if slots.is_empty() {
        vec![Resolvent::new(package, None, destination)]
    } else {
        slots
            .into_iter()
            .map(|slot| Resolvent::new(package.clone(), Some(slot), destination))
            .collect()
    }
}

fn removal_resolvents_for_spec<P: Provider>(
    provider: &P,
    spec: &PackageDepSpec,
) -> Vec<Resolvent> {
    let anywhere = Resolvent::new(
        spec.package().clone(),
        None,
        DestinationType::InstallToSlash,
    );
    let mut out: Vec<Resolvent> = Vec::new();
    for id in provider
        .installed_ids(&anywhere)
        .iter()
        .filter(|id| spec.matches(id))
    {
        let resolvent = Resolvent::of(id, DestinationType::InstallToSlash);
        if !out.contains(&resolvent) {
            out.push(resolvent);
        }
    }
    out
}

fn constraint_satisfied_by(constraint: &Constraint, id: &PackageId) -> bool {
    match &constraint.spec {
        PackageOrBlockDepSpec::Package(spec) => spec.matches(id),
        PackageOrBlockDepSpec::Block(block) => !block.blocked().matches(id),
    }
}

fn decision_satisfies(decision: &Decision, constraint: &Constraint) -> bool {
    match decision {
        Decision::NothingNoChange { .. } | Decision::Remove(_) | Decision::Break(_) => {
            match &constraint.spec {
                PackageOrBlockDepSpec::Package(_) => constraint.nothing_is_fine_too,
                PackageOrBlockDepSpec::Block(_) => true,
            }
        }
        // Adding a constraint to an unsolvable set keeps it unsolvable.
        Decision::UnableToMake(_) => true,
        // A kept install must match the spec and still be allowed by the
        // constraint's willingness to reuse existing packages.
        Decision::ExistingNoChange(d) => {
            constraint_satisfied_by(constraint, &d.existing_id)
                && match constraint.use_existing {
                    UseExisting::IfPossible => true,
                    UseExisting::IfSameVersion => d.is_same_version,
                    UseExisting::IfSame => d.is_same,
                    UseExisting::Never => false,
                }
        }
        Decision::ChangesToMake(d) => constraint_satisfied_by(constraint, &d.origin_id),
    }
}

fn set_confirmations(decision: &mut Decision, confirmations: Vec<RequiredConfirmation>) {
    match decision {
        Decision::ChangesToMake(d) => d.required_confirmations = confirmations,
        Decision::Remove(d) => d.required_confirmations = confirmations,
        Decision::Break(d) => d.required_confirmations = confirmations,
        _ => {}
    }
}

/// The decision table: given everything currently required of a
/// resolvent, pick the outcome that satisfies all of it, or explain per
/// candidate why none does.
fn compute_decision<P: Provider>(
    provider: &P,
    resolvent: &Resolvent,
    constraints: &Constraints,
    is_removal_target: bool,
) -> Decision {
    let taken = !constraints.all_untaken();
    let installed = provider.installed_ids(resolvent);

    if is_removal_target {
        return if installed.is_empty() {
            Decision::NothingNoChange { taken }
        } else {
            Decision::Remove(RemoveDecision {
                ids: installed,
                was_unused: false,
                required_confirmations: Vec::new(),
                taken,
            })
        };
    }

    let satisfies_all =
        |id: &PackageId| constraints.iter().all(|c| constraint_satisfied_by(c, id));

    // Constraints that tolerate absence never force an install on their
    // own; only harder package constraints do.
    let wants_package = constraints
        .iter()
        .any(|c| !c.spec.is_block() && !c.nothing_is_fine_too);

    if !wants_package {
        return if installed.is_empty() {
            Decision::NothingNoChange { taken }
        } else if let Some(keep) = installed.iter().rev().find(|id| satisfies_all(id)) {
            Decision::ExistingNoChange(ExistingNoChangeDecision {
                existing_id: keep.clone(),
                is_same: true,
                is_same_version: true,
                is_transient: provider.is_transient(keep),
                taken,
            })
        } else {
            Decision::Remove(RemoveDecision {
                ids: installed,
                was_unused: true,
                required_confirmations: Vec::new(),
                taken,
            })
        };
    }

    // Candidate pool: the union over all package constraint specs,
    // restricted to this resolvent, ascending.
    let mut pool: Vec<PackageId> = Vec::new();
    let mut seen: Set<PackageId> = Set::default();
    for constraint in constraints {
        if let PackageOrBlockDepSpec::Package(spec) = &constraint.spec {
            for id in provider.find_candidates(spec, resolvent.destination) {
                if id_in_resolvent(&id, resolvent) && seen.insert(id.clone()) {
                    pool.push(id);
                }
            }
        }
    }
    pool.sort_by(|a, b| {
        a.version()
            .cmp(b.version())
            .then_with(|| a.uniquely_identifying_spec().cmp(&b.uniquely_identifying_spec()))
    });

    let best_satisfying = pool.iter().rev().find(|id| satisfies_all(id));
    let existing_choice = installed.iter().rev().find(|id| satisfies_all(id));

    let chosen_existing = existing_choice.filter(|existing| {
        match constraints.strictest_use_existing() {
            UseExisting::Never => false,
            UseExisting::IfPossible => true,
            UseExisting::IfSameVersion => {
                best_satisfying.is_some_and(|best| best.version() == existing.version())
            }
            UseExisting::IfSame => best_satisfying.is_some_and(|best| {
                best.version() == existing.version() && best.slot() == existing.slot()
            }),
        }
    });

    if let Some(existing) = chosen_existing {
        let is_same_version =
            best_satisfying.is_none_or(|best| best.version() == existing.version());
        let is_same = best_satisfying
            .is_none_or(|best| best.version() == existing.version() && best.slot() == existing.slot());
        return Decision::ExistingNoChange(ExistingNoChangeDecision {
            existing_id: existing.clone(),
            is_same,
            is_same_version,
            is_transient: provider.is_transient(existing),
            taken,
        });
    }

    if let Some(origin) = best_satisfying {
        let destination = provider.destination_for(resolvent);
        if constraints.any_to_destination() && destination.is_none() {
            let unsuitable = pool
                .iter()
                .map(|id| UnsuitableCandidate {
                    id: id.clone(),
                    unmet_constraints: vec![format!(
                        "no repository accepts {} installs",
                        resolvent.destination
                    )],
                })
                .collect();
            return Decision::UnableToMake(UnableToMakeDecision {
                unsuitable_candidates: unsuitable,
                taken,
            });
        }
        let change_type = if let Some(replaced) = installed.last() {
            match origin.version().cmp(replaced.version()) {
                Ordering::Greater => ChangeType::Upgrade,
                Ordering::Equal => ChangeType::Reinstall,
                Ordering::Less => ChangeType::Downgrade,
            }
        } else {
            let anywhere = Resolvent::new(resolvent.package.clone(), None, resolvent.destination);
            let other_slots = provider
                .installed_ids(&anywhere)
                .iter()
                .any(|id| !id_in_resolvent(id, resolvent));
            if other_slots {
                ChangeType::NewSlot
            } else {
                ChangeType::New
            }
        };
        let best = pool.last() == Some(origin);
        return Decision::ChangesToMake(ChangesToMakeDecision {
            origin_id: origin.clone(),
            destination,
            change_type,
            replacing: installed,
            best,
            required_confirmations: Vec::new(),
            taken,
        });
    }

    // Nothing satisfies everything. An installed package that something
    // still requires may be deliberately left broken if policy allows.
    if let Some(existing) = installed.last() {
        if provider.allowed_to_break(existing) {
            return Decision::Break(crate::decision::BreakDecision {
                existing_id: existing.clone(),
                required_confirmations: Vec::new(),
                taken,
            });
        }
    }

    // Diagnostics cover every occurrence of the package here, not just
    // the spec-matching pool: a candidate ruled out by a version
    // requirement is reported together with that requirement.
    let mut rejected = pool;
    for id in provider.find_candidates(
        &PackageDepSpec::anything(resolvent.package.clone()),
        resolvent.destination,
    ) {
        if id_in_resolvent(&id, resolvent) && !rejected.contains(&id) {
            rejected.push(id);
        }
    }
    rejected.sort_by(|a, b| {
        a.version()
            .cmp(b.version())
            .then_with(|| a.uniquely_identifying_spec().cmp(&b.uniquely_identifying_spec()))
    });
    let unsuitable = rejected
        .iter()
        .chain(installed.iter())
        .map(|id| UnsuitableCandidate {
            id: id.clone(),
            unmet_constraints: constraints
                .iter()
                .filter(|c| !constraint_satisfied_by(c, id))
                .map(|c| c.to_string())
                .collect(),
        })
        .collect();
    Decision::UnableToMake(UnableToMakeDecision {
        unsuitable_candidates: unsuitable,
        taken,
    })
}
