// SPDX-License-Identifier: MPL-2.0

//! Decisions: the chosen outcome for each resolvent.

use std::fmt::{self, Display};
use std::str::FromStr;

use crate::error::ResolveError;
use crate::name::{PackageId, RepositoryName};
use crate::serialise::{Deserialisation, Deserialisator, Serialise, Serialiser};

/// What kind of change a [`ChangesToMakeDecision`] is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeType {
    /// Nothing with this name installed anywhere.
    New,
    /// Other slots installed, this slot is new.
    NewSlot,
    /// Same slot installed at a lower version.
    Upgrade,
    /// Same slot installed at the same version.
    Reinstall,
    /// Same slot installed at a higher version.
    Downgrade,
}

impl Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChangeType::New => "new",
            ChangeType::NewSlot => "new_slot",
            ChangeType::Upgrade => "upgrade",
            ChangeType::Reinstall => "reinstall",
            ChangeType::Downgrade => "downgrade",
        })
    }
}

impl FromStr for ChangeType {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(ChangeType::New),
            "new_slot" => Ok(ChangeType::NewSlot),
            "upgrade" => Ok(ChangeType::Upgrade),
            "reinstall" => Ok(ChangeType::Reinstall),
            "downgrade" => Ok(ChangeType::Downgrade),
            _ => Err(ResolveError::Serialisation(format!(
                "unknown change type {s:?}"
            ))),
        }
    }
}

/// Why a decision needs explicit user approval before execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequiredConfirmation {
    /// The chosen version is lower than the installed one.
    Downgrade,
    /// The chosen version is not the best available.
    NotBest,
    /// A resolvent is being left intentionally broken.
    Break,
    /// A system-protected package is being removed.
    RemoveSystemPackage,
}

impl Display for RequiredConfirmation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RequiredConfirmation::Downgrade => "downgrade",
            RequiredConfirmation::NotBest => "not_best",
            RequiredConfirmation::Break => "break",
            RequiredConfirmation::RemoveSystemPackage => "remove_system_package",
        })
    }
}

impl FromStr for RequiredConfirmation {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "downgrade" => Ok(RequiredConfirmation::Downgrade),
            "not_best" => Ok(RequiredConfirmation::NotBest),
            "break" => Ok(RequiredConfirmation::Break),
            "remove_system_package" => Ok(RequiredConfirmation::RemoveSystemPackage),
            _ => Err(ResolveError::Serialisation(format!(
                "unknown confirmation token {s:?}"
            ))),
        }
    }
}

/// An already-installed package satisfies every constraint; keep it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExistingNoChangeDecision {
    pub existing_id: PackageId,
    /// The installed occurrence equals the best installable one.
    pub is_same: bool,
    /// The installed version equals the best installable version.
    pub is_same_version: bool,
    /// The installed package is transient (e.g. a leftover virtual).
    pub is_transient: bool,
    pub taken: bool,
}

/// Install a fresh package occurrence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangesToMakeDecision {
    /// The occurrence to install from.
    pub origin_id: PackageId,
    /// The concrete repository the change lands in, where known.
    pub destination: Option<RepositoryName>,
    pub change_type: ChangeType,
    /// Installed occurrences this change replaces (same slot, or same
    /// version in another slot).
    pub replacing: Vec<PackageId>,
    /// Whether the origin is the best candidate overall, not merely the
    /// best acceptable one.
    pub best: bool,
    pub required_confirmations: Vec<RequiredConfirmation>,
    pub taken: bool,
}

/// Remove installed occurrences.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoveDecision {
    pub ids: Vec<PackageId>,
    /// True when removal is because nothing requires the package any
    /// more; false when the user asked for it.
    pub was_unused: bool,
    pub required_confirmations: Vec<RequiredConfirmation>,
    pub taken: bool,
}

/// Leave the resolvent intentionally broken (an installed package stays
/// although a block now matches it).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BreakDecision {
    pub existing_id: PackageId,
    pub required_confirmations: Vec<RequiredConfirmation>,
    pub taken: bool,
}

/// One candidate that could not be used, and why.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnsuitableCandidate {
    pub id: PackageId,
    /// Description of each constraint the candidate failed.
    pub unmet_constraints: Vec<String>,
}

/// No candidate satisfies every constraint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnableToMakeDecision {
    pub unsuitable_candidates: Vec<UnsuitableCandidate>,
    pub taken: bool,
}

/// The chosen outcome for one resolvent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Nothing installed, nothing wanted; no action.
    NothingNoChange { taken: bool },
    ExistingNoChange(ExistingNoChangeDecision),
    ChangesToMake(ChangesToMakeDecision),
    Remove(RemoveDecision),
    Break(BreakDecision),
    UnableToMake(UnableToMakeDecision),
}

impl Decision {
    pub fn taken(&self) -> bool {
        match self {
            Decision::NothingNoChange { taken } => *taken,
            Decision::ExistingNoChange(d) => d.taken,
            Decision::ChangesToMake(d) => d.taken,
            Decision::Remove(d) => d.taken,
            Decision::Break(d) => d.taken,
            Decision::UnableToMake(d) => d.taken,
        }
    }

    /// Confirmations this decision is waiting on, if any.
    pub fn required_confirmations(&self) -> &[RequiredConfirmation] {
        match self {
            Decision::ChangesToMake(d) => &d.required_confirmations,
            Decision::Remove(d) => &d.required_confirmations,
            Decision::Break(d) => &d.required_confirmations,
            _ => &[],
        }
    }

    /// Whether the caller must act on this decision: an install, a
    /// removal, or a deliberately accepted break.
    pub fn is_change_or_remove(&self) -> bool {
        matches!(
            self,
            Decision::ChangesToMake(_) | Decision::Remove(_) | Decision::Break(_)
        )
    }

    /// The package the decision settles on, for change and keep
    /// decisions.
    pub fn origin_or_existing_id(&self) -> Option<&PackageId> {
        match self {
            Decision::ExistingNoChange(d) => Some(&d.existing_id),
            Decision::ChangesToMake(d) => Some(&d.origin_id),
            Decision::Break(d) => Some(&d.existing_id),
            _ => None,
        }
    }
}

impl Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::NothingNoChange { .. } => f.write_str("no change"),
            Decision::ExistingNoChange(d) => write!(f, "keep {}", d.existing_id),
            Decision::ChangesToMake(d) => write!(f, "{} {}", d.change_type, d.origin_id),
            Decision::Remove(d) => {
                f.write_str("remove")?;
                for id in &d.ids {
                    write!(f, " {id}")?;
                }
                Ok(())
            }
            Decision::Break(d) => write!(f, "break {}", d.existing_id),
            Decision::UnableToMake(d) => write!(
                f,
                "unable to make ({} unsuitable candidates)",
                d.unsuitable_candidates.len()
            ),
        }
    }
}

fn confirmation_strings(confirmations: &[RequiredConfirmation]) -> Vec<String> {
    confirmations.iter().map(|c| c.to_string()).collect()
}

fn deserialise_confirmations(
    d: Deserialisation,
) -> Result<Vec<RequiredConfirmation>, ResolveError> {
    d.into_container()?
        .into_iter()
        .map(|item| item.as_str()?.parse())
        .collect()
}

fn id_strings(ids: &[PackageId]) -> Vec<String> {
    ids.iter().map(|id| id.uniquely_identifying_spec()).collect()
}

fn deserialise_ids(d: Deserialisation) -> Result<Vec<PackageId>, ResolveError> {
    d.into_container()?
        .into_iter()
        .map(|item| PackageId::from_uniquely_identifying_spec(item.as_str()?))
        .collect()
}

impl Serialise for UnsuitableCandidate {
    fn serialise(&self, s: &mut Serialiser) {
        s.object("UnsuitableCandidate")
            .member_str("id", &self.id.uniquely_identifying_spec())
            .member_str_container("unmet_constraints", &self.unmet_constraints);
    }
}

impl UnsuitableCandidate {
    pub fn deserialise(d: Deserialisation) -> Result<Self, ResolveError> {
        let mut v = Deserialisator::new(d, "UnsuitableCandidate")?;
        let id = PackageId::from_uniquely_identifying_spec(&v.member_str("id")?)?;
        let unmet_constraints = v
            .find_remove_member("unmet_constraints")?
            .into_container()?
            .into_iter()
            .map(|item| item.as_str().map(str::to_owned))
            .collect::<Result<Vec<_>, _>>()?;
        v.finish()?;
        Ok(UnsuitableCandidate {
            id,
            unmet_constraints,
        })
    }
}

impl Serialise for UnableToMakeDecision {
    fn serialise(&self, s: &mut Serialiser) {
        s.object("UnableToMakeDecision")
            .member_container("unsuitable_candidates", &self.unsuitable_candidates)
            .member_bool("taken", self.taken);
    }
}

impl UnableToMakeDecision {
    pub fn deserialise(d: Deserialisation) -> Result<Self, ResolveError> {
        let mut v = Deserialisator::new(d, "UnableToMakeDecision")?;
        let unsuitable_candidates = v
            .find_remove_member("unsuitable_candidates")?
            .into_container()?
            .into_iter()
            .map(UnsuitableCandidate::deserialise)
            .collect::<Result<Vec<_>, _>>()?;
        let taken = v.member_bool("taken")?;
        v.finish()?;
        Ok(UnableToMakeDecision {
            unsuitable_candidates,
            taken,
        })
    }
}

impl Serialise for Decision {
    fn serialise(&self, s: &mut Serialiser) {
        match self {
            Decision::NothingNoChange { taken } => {
                s.object("NothingNoChangeDecision").member_bool("taken", *taken);
            }
            Decision::ExistingNoChange(d) => {
                s.object("ExistingNoChangeDecision")
                    .member_str("existing_id", &d.existing_id.uniquely_identifying_spec())
                    .member_bool("is_same", d.is_same)
                    .member_bool("is_same_version", d.is_same_version)
                    .member_bool("is_transient", d.is_transient)
                    .member_bool("taken", d.taken);
            }
            Decision::ChangesToMake(d) => {
                let w = s
                    .object("ChangesToMakeDecision")
                    .member_str("origin_id", &d.origin_id.uniquely_identifying_spec());
                let w = match &d.destination {
                    Some(repository) => w.member_str("destination", repository.as_str()),
                    None => w.member_null("destination"),
                };
                w.member_str("change_type", &d.change_type.to_string())
                    .member_str_container("replacing", &id_strings(&d.replacing))
                    .member_bool("best", d.best)
                    .member_str_container(
                        "required_confirmations",
                        &confirmation_strings(&d.required_confirmations),
                    )
                    .member_bool("taken", d.taken);
            }
            Decision::Remove(d) => {
                s.object("RemoveDecision")
                    .member_str_container("ids", &id_strings(&d.ids))
                    .member_bool("was_unused", d.was_unused)
                    .member_str_container(
                        "required_confirmations",
                        &confirmation_strings(&d.required_confirmations),
                    )
                    .member_bool("taken", d.taken);
            }
            Decision::Break(d) => {
                s.object("BreakDecision")
                    .member_str("existing_id", &d.existing_id.uniquely_identifying_spec())
                    .member_str_container(
                        "required_confirmations",
                        &confirmation_strings(&d.required_confirmations),
                    )
                    .member_bool("taken", d.taken);
            }
            Decision::UnableToMake(d) => d.serialise(s),
        }
    }
}

impl Decision {
    pub fn deserialise(d: Deserialisation) -> Result<Self, ResolveError> {
        match d.class_name() {
            Some("NothingNoChangeDecision") => {
                let mut v = Deserialisator::new(d, "NothingNoChangeDecision")?;
                let taken = v.member_bool("taken")?;
                v.finish()?;
                Ok(Decision::NothingNoChange { taken })
            }
            Some("ExistingNoChangeDecision") => {
                let mut v = Deserialisator::new(d, "ExistingNoChangeDecision")?;
                let existing_id =
                    PackageId::from_uniquely_identifying_spec(&v.member_str("existing_id")?)?;
                let is_same = v.member_bool("is_same")?;
                let is_same_version = v.member_bool("is_same_version")?;
                let is_transient = v.member_bool("is_transient")?;
                let taken = v.member_bool("taken")?;
                v.finish()?;
                Ok(Decision::ExistingNoChange(ExistingNoChangeDecision {
                    existing_id,
                    is_same,
                    is_same_version,
                    is_transient,
                    taken,
                }))
            }
            Some("ChangesToMakeDecision") => {
                let mut v = Deserialisator::new(d, "ChangesToMakeDecision")?;
                let origin_id =
                    PackageId::from_uniquely_identifying_spec(&v.member_str("origin_id")?)?;
                let destination = {
                    let m = v.find_remove_member("destination")?;
                    if m.is_null() {
                        None
                    } else {
                        Some(RepositoryName::new(m.as_str()?))
                    }
                };
                let change_type = v.member_str("change_type")?.parse()?;
                let replacing = deserialise_ids(v.find_remove_member("replacing")?)?;
                let best = v.member_bool("best")?;
                let required_confirmations =
                    deserialise_confirmations(v.find_remove_member("required_confirmations")?)?;
                let taken = v.member_bool("taken")?;
                v.finish()?;
                Ok(Decision::ChangesToMake(ChangesToMakeDecision {
                    origin_id,
                    destination,
                    change_type,
                    replacing,
                    best,
                    required_confirmations,
                    taken,
                }))
            }
            Some("RemoveDecision") => {
                let mut v = Deserialisator::new(d, "RemoveDecision")?;
                let ids = deserialise_ids(v.find_remove_member("ids")?)?;
                let was_unused = v.member_bool("was_unused")?;
                let required_confirmations =
                    deserialise_confirmations(v.find_remove_member("required_confirmations")?)?;
                let taken = v.member_bool("taken")?;
                v.finish()?;
                Ok(Decision::Remove(RemoveDecision {
                    ids,
                    was_unused,
                    required_confirmations,
                    taken,
                }))
            }
            Some("BreakDecision") => {
                let mut v = Deserialisator::new(d, "BreakDecision")?;
                let existing_id =
                    PackageId::from_uniquely_identifying_spec(&v.member_str("existing_id")?)?;
                let required_confirmations =
                    deserialise_confirmations(v.find_remove_member("required_confirmations")?)?;
                let taken = v.member_bool("taken")?;
                v.finish()?;
                Ok(Decision::Break(BreakDecision {
                    existing_id,
                    required_confirmations,
                    taken,
                }))
            }
            Some("UnableToMakeDecision") => {
                Ok(Decision::UnableToMake(UnableToMakeDecision::deserialise(d)?))
            }
            other => Err(ResolveError::Serialisation(format!(
                "unknown decision class {other:?}"
            ))),
        }
    }
}
