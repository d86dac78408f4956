// SPDX-License-Identifier: MPL-2.0

//! Constraints and the per-resolution constraint accumulator.

use std::fmt::{self, Display};
use std::str::FromStr;

use crate::error::ResolveError;
use crate::reason::Reason;
use crate::serialise::{Deserialisation, Deserialisator, Serialise, Serialiser};
use crate::spec::PackageOrBlockDepSpec;

/// How willing a constraint is to be satisfied by an already-installed
/// package instead of a fresh install. Variants are ordered from most to
/// least permissive; folding a set of constraints takes the maximum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UseExisting {
    /// Any installed package matching the spec will do.
    IfPossible,
    /// Only if the installed version equals the best installable one.
    IfSameVersion,
    /// Only if the installed package is the same occurrence (version and
    /// slot) as the best installable one.
    IfSame,
    /// Never; always re-make.
    Never,
}

impl Display for UseExisting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UseExisting::IfPossible => "if_possible",
            UseExisting::IfSameVersion => "if_same_version",
            UseExisting::IfSame => "if_same",
            UseExisting::Never => "never",
        })
    }
}

impl FromStr for UseExisting {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "if_possible" => Ok(UseExisting::IfPossible),
            "if_same_version" => Ok(UseExisting::IfSameVersion),
            "if_same" => Ok(UseExisting::IfSame),
            "never" => Ok(UseExisting::Never),
            _ => Err(ResolveError::Serialisation(format!(
                "unknown use_existing token {s:?}"
            ))),
        }
    }
}

/// One requirement imposed on a resolvent. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Constraint {
    pub reason: Reason,
    pub spec: PackageOrBlockDepSpec,
    pub use_existing: UseExisting,
    /// Whether the requirement must hold at the resolvent's destination
    /// (as opposed to merely somewhere, as with blocks).
    pub to_destination: bool,
    /// Whether the absence of any matching package also satisfies this
    /// constraint.
    pub nothing_is_fine_too: bool,
    /// Untaken constraints (e.g. from suggestions the user opted to see)
    /// are recorded and decided but never executed.
    pub untaken: bool,
}

impl Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {}", self.spec, self.reason)?;
        if self.untaken {
            f.write_str(" (untaken)")?;
        }
        Ok(())
    }
}

impl Serialise for Constraint {
    fn serialise(&self, s: &mut Serialiser) {
        s.object("Constraint")
            .member("reason", &self.reason)
            .member("spec", &self.spec)
            .member_str("use_existing", &self.use_existing.to_string())
            .member_bool("to_destination", self.to_destination)
            .member_bool("nothing_is_fine_too", self.nothing_is_fine_too)
            .member_bool("untaken", self.untaken);
    }
}

impl Constraint {
    pub fn deserialise(d: Deserialisation) -> Result<Self, ResolveError> {
        let mut v = Deserialisator::new(d, "Constraint")?;
        let reason = Reason::deserialise(v.find_remove_member("reason")?)?;
        let spec = PackageOrBlockDepSpec::deserialise(v.find_remove_member("spec")?)?;
        let use_existing = v.member_str("use_existing")?.parse()?;
        let to_destination = v.member_bool("to_destination")?;
        let nothing_is_fine_too = v.member_bool("nothing_is_fine_too")?;
        let untaken = v.member_bool("untaken")?;
        v.finish()?;
        Ok(Constraint {
            reason,
            spec,
            use_existing,
            to_destination,
            nothing_is_fine_too,
            untaken,
        })
    }
}

/// Insertion-ordered accumulator of the constraints on one resolvent,
/// with the folded values every decision needs cached as constraints
/// arrive.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Constraints {
    constraints: Vec<Constraint>,
    strictest_use_existing: Option<UseExisting>,
    nothing_is_fine_too: bool,
    any_to_destination: bool,
}

impl Constraints {
    pub fn new() -> Self {
        Self {
            constraints: Vec::new(),
            strictest_use_existing: None,
            nothing_is_fine_too: true,
            any_to_destination: false,
        }
    }

    /// Adds a constraint unless an equivalent one (same reason, same
    /// spec) is already present. Returns whether anything changed.
    pub fn add(&mut self, constraint: Constraint) -> bool {
        if self
            .constraints
            .iter()
            .any(|c| c.reason == constraint.reason && c.spec == constraint.spec)
        {
            return false;
        }
        self.fold(&constraint);
        self.constraints.push(constraint);
        true
    }

    fn fold(&mut self, constraint: &Constraint) {
        self.strictest_use_existing = Some(match self.strictest_use_existing {
            Some(existing) => existing.max(constraint.use_existing),
            None => constraint.use_existing,
        });
        self.nothing_is_fine_too &= constraint.nothing_is_fine_too;
        self.any_to_destination |= constraint.to_destination;
    }

    /// Drops constraints not matching the predicate, refolding the
    /// cached values. Returns whether anything was dropped.
    pub fn retain(&mut self, f: impl FnMut(&Constraint) -> bool) -> bool {
        let before = self.constraints.len();
        self.constraints.retain(f);
        if self.constraints.len() == before {
            return false;
        }
        self.strictest_use_existing = None;
        self.nothing_is_fine_too = true;
        self.any_to_destination = false;
        let kept = std::mem::take(&mut self.constraints);
        for constraint in &kept {
            self.fold(constraint);
        }
        self.constraints = kept;
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// The strictest willingness-to-reuse across all constraints.
    pub fn strictest_use_existing(&self) -> UseExisting {
        self.strictest_use_existing.unwrap_or(UseExisting::IfPossible)
    }

    /// Whether every constraint tolerates no package at all.
    pub fn nothing_is_fine_too(&self) -> bool {
        self.nothing_is_fine_too
    }

    /// Whether any constraint requires presence at the destination.
    pub fn any_to_destination(&self) -> bool {
        self.any_to_destination
    }

    /// Whether every constraint is untaken (so any resulting decision is
    /// recorded but not executed).
    pub fn all_untaken(&self) -> bool {
        !self.constraints.is_empty() && self.constraints.iter().all(|c| c.untaken)
    }
}

impl<'a> IntoIterator for &'a Constraints {
    type Item = &'a Constraint;
    type IntoIter = std::slice::Iter<'a, Constraint>;

    fn into_iter(self) -> Self::IntoIter {
        self.constraints.iter()
    }
}

impl Serialise for Constraints {
    fn serialise(&self, s: &mut Serialiser) {
        s.object("Constraints")
            .member_container("constraints", &self.constraints);
    }
}

impl Constraints {
    pub fn deserialise(d: Deserialisation) -> Result<Self, ResolveError> {
        let mut v = Deserialisator::new(d, "Constraints")?;
        let mut constraints = Constraints::new();
        for item in v.find_remove_member("constraints")?.into_container()? {
            constraints.add(Constraint::deserialise(item)?);
        }
        v.finish()?;
        Ok(constraints)
    }
}
