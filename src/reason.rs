// SPDX-License-Identifier: MPL-2.0

//! Why a constraint exists: the provenance chain behind every
//! requirement the resolver handles.

use std::fmt::{self, Display};

use crate::dependency::SanitisedDependency;
use crate::error::ResolveError;
use crate::name::{PackageId, SetName};
use crate::resolvent::Resolvent;
use crate::serialise::{Deserialisation, Deserialisator, Serialise, Serialiser};

/// The data behind a [`Reason::Dependency`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DependencyReason {
    /// The package whose metadata declared the edge.
    pub from_id: PackageId,
    /// The resolvent that package was decided under.
    pub from_resolvent: Resolvent,
    /// The edge itself.
    pub dependency: SanitisedDependency,
    /// Whether an installed package already satisfies the edge. Met
    /// edges impose weaker ordering requirements.
    pub already_met: bool,
}

/// Provenance of a constraint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reason {
    /// A user-specified top-level target.
    Target,
    /// A dependency edge from another resolvent's decision.
    Dependency(DependencyReason),
    /// A package that is already installed and for which no action is
    /// wanted.
    Preset,
    /// Wraps another reason, naming the set it came through.
    Set { name: SetName, inner: Box<Reason> },
}

impl Reason {
    /// The dependency data, unwrapping through any set nesting.
    pub fn dependency_reason(&self) -> Option<&DependencyReason> {
        match self {
            Reason::Dependency(dep) => Some(dep),
            Reason::Set { inner, .. } => inner.dependency_reason(),
            _ => None,
        }
    }

    /// Whether this traces back to a user target, through any sets.
    pub fn is_target(&self) -> bool {
        match self {
            Reason::Target => true,
            Reason::Set { inner, .. } => inner.is_target(),
            _ => false,
        }
    }

    /// Whether this traces back to a preset, through any sets.
    pub fn is_preset(&self) -> bool {
        match self {
            Reason::Preset => true,
            Reason::Set { inner, .. } => inner.is_preset(),
            _ => false,
        }
    }
}

impl Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::Target => f.write_str("target"),
            Reason::Dependency(dep) => {
                write!(f, "dependency of {} via {}", dep.from_id, dep.dependency)
            }
            Reason::Preset => f.write_str("preset"),
            Reason::Set { name, inner } => write!(f, "set {name} ({inner})"),
        }
    }
}

impl Serialise for Reason {
    fn serialise(&self, s: &mut Serialiser) {
        match self {
            Reason::Target => {
                s.object("TargetReason");
            }
            Reason::Dependency(dep) => {
                s.object("DependencyReason")
                    .member_str("from_id", &dep.from_id.uniquely_identifying_spec())
                    .member("from_resolvent", &dep.from_resolvent)
                    .member("dependency", &dep.dependency)
                    .member_bool("already_met", dep.already_met);
            }
            Reason::Preset => {
                s.object("PresetReason");
            }
            Reason::Set { name, inner } => {
                s.object("SetReason")
                    .member_str("name", name.as_str())
                    .member("inner", inner.as_ref());
            }
        }
    }
}

impl Reason {
    pub fn deserialise(d: Deserialisation) -> Result<Self, ResolveError> {
        match d.class_name() {
            Some("TargetReason") => {
                Deserialisator::new(d, "TargetReason")?.finish()?;
                Ok(Reason::Target)
            }
            Some("DependencyReason") => {
                let mut v = Deserialisator::new(d, "DependencyReason")?;
                let from_id =
                    PackageId::from_uniquely_identifying_spec(&v.member_str("from_id")?)?;
                let from_resolvent = Resolvent::deserialise(v.find_remove_member("from_resolvent")?)?;
                let dependency =
                    SanitisedDependency::deserialise(v.find_remove_member("dependency")?)?;
                let already_met = v.member_bool("already_met")?;
                v.finish()?;
                Ok(Reason::Dependency(DependencyReason {
                    from_id,
                    from_resolvent,
                    dependency,
                    already_met,
                }))
            }
            Some("PresetReason") => {
                Deserialisator::new(d, "PresetReason")?.finish()?;
                Ok(Reason::Preset)
            }
            Some("SetReason") => {
                let mut v = Deserialisator::new(d, "SetReason")?;
                let name = SetName::new(v.member_str("name")?);
                let inner = Box::new(Reason::deserialise(v.find_remove_member("inner")?)?);
                v.finish()?;
                Ok(Reason::Set { name, inner })
            }
            other => Err(ResolveError::Serialisation(format!(
                "unknown reason class {other:?}"
            ))),
        }
    }
}
