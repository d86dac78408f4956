// SPDX-License-Identifier: MPL-2.0

//! Dependency specs: what a constraint asks for.

use std::fmt::{self, Display};
use std::ops::Bound;

use version_ranges::Ranges;

use crate::error::ResolveError;
use crate::name::{PackageId, PackageName, RepositoryName, SlotName, Version};
use crate::serialise::{Deserialisation, Deserialisator, Serialise, Serialiser};

/// A spec selecting package occurrences: a name plus optional version,
/// slot and repository requirements.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PackageDepSpec {
    package: PackageName,
    version_requirement: Ranges<Version>,
    exact_slot: Option<SlotName>,
    in_repository: Option<RepositoryName>,
}

impl PackageDepSpec {
    /// A spec matching any occurrence of `package`.
    pub fn anything(package: PackageName) -> Self {
        Self {
            package,
            version_requirement: Ranges::full(),
            exact_slot: None,
            in_repository: None,
        }
    }

    /// A spec matching exactly one package occurrence, by name, version
    /// and slot. The repository is deliberately left open so an installed
    /// copy matches as well as the origin.
    pub fn exactly(id: &PackageId) -> Self {
        let mut spec = Self::anything(id.name().clone())
            .with_version_requirement(Ranges::singleton(id.version().clone()));
        if let Some(slot) = id.slot() {
            spec = spec.with_exact_slot(slot.clone());
        }
        spec
    }

    pub fn with_version_requirement(mut self, requirement: Ranges<Version>) -> Self {
        self.version_requirement = requirement;
        self
    }

    pub fn with_exact_slot(mut self, slot: SlotName) -> Self {
        self.exact_slot = Some(slot);
        self
    }

    pub fn with_in_repository(mut self, repository: RepositoryName) -> Self {
        self.in_repository = Some(repository);
        self
    }

    pub fn package(&self) -> &PackageName {
        &self.package
    }

    pub fn version_requirement(&self) -> &Ranges<Version> {
        &self.version_requirement
    }

    pub fn exact_slot(&self) -> Option<&SlotName> {
        self.exact_slot.as_ref()
    }

    pub fn in_repository(&self) -> Option<&RepositoryName> {
        self.in_repository.as_ref()
    }

    /// Whether `id` satisfies every requirement of this spec.
    pub fn matches(&self, id: &PackageId) -> bool {
        if *id.name() != self.package {
            return false;
        }
        if !self.version_requirement.contains(id.version()) {
            return false;
        }
        if let Some(slot) = &self.exact_slot {
            if id.slot() != Some(slot) {
                return false;
            }
        }
        if let Some(repository) = &self.in_repository {
            if id.repository() != repository {
                return false;
            }
        }
        true
    }
}

impl Display for PackageDepSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.package)?;
        if self.version_requirement != Ranges::full() {
            write!(f, "[{}]", self.version_requirement)?;
        }
        if let Some(slot) = &self.exact_slot {
            write!(f, ":{slot}")?;
        }
        if let Some(repository) = &self.in_repository {
            write!(f, "::{repository}")?;
        }
        Ok(())
    }
}

/// A spec forbidding what its inner spec matches.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockDepSpec {
    blocked: PackageDepSpec,
    strong: bool,
}

impl BlockDepSpec {
    pub fn new(blocked: PackageDepSpec, strong: bool) -> Self {
        Self { blocked, strong }
    }

    pub fn blocked(&self) -> &PackageDepSpec {
        &self.blocked
    }

    /// Strong blocks must be resolved before the blocker is installed;
    /// weak blocks may be resolved afterwards.
    pub fn strong(&self) -> bool {
        self.strong
    }
}

impl Display for BlockDepSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", if self.strong { "!!" } else { "!" }, self.blocked)
    }
}

/// Either a requirement or a block.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PackageOrBlockDepSpec {
    Package(PackageDepSpec),
    Block(BlockDepSpec),
}

impl PackageOrBlockDepSpec {
    /// The inner package spec, blocked or not.
    pub fn package_spec(&self) -> &PackageDepSpec {
        match self {
            PackageOrBlockDepSpec::Package(spec) => spec,
            PackageOrBlockDepSpec::Block(block) => block.blocked(),
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(self, PackageOrBlockDepSpec::Block(_))
    }

    pub fn as_block(&self) -> Option<&BlockDepSpec> {
        match self {
            PackageOrBlockDepSpec::Package(_) => None,
            PackageOrBlockDepSpec::Block(block) => Some(block),
        }
    }
}

impl Display for PackageOrBlockDepSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageOrBlockDepSpec::Package(spec) => spec.fmt(f),
            PackageOrBlockDepSpec::Block(block) => block.fmt(f),
        }
    }
}

fn encode_bound(b: &Bound<Version>) -> Option<String> {
    match b {
        Bound::Included(v) => Some(format!("incl {v}")),
        Bound::Excluded(v) => Some(format!("excl {v}")),
        Bound::Unbounded => None,
    }
}

fn decode_bound(d: Deserialisation) -> Result<Bound<Version>, ResolveError> {
    if d.is_null() {
        return Ok(Bound::Unbounded);
    }
    let s = d.as_str()?;
    match s.split_once(' ') {
        Some(("incl", v)) => Ok(Bound::Included(v.parse()?)),
        Some(("excl", v)) => Ok(Bound::Excluded(v.parse()?)),
        _ => Err(ResolveError::Serialisation(format!("bad bound {s:?}"))),
    }
}

struct Segment<'a>(&'a Bound<Version>, &'a Bound<Version>);

impl Serialise for Segment<'_> {
    fn serialise(&self, s: &mut Serialiser) {
        let w = s.object("seg");
        let w = match encode_bound(self.0) {
            Some(start) => w.member_str("start", &start),
            None => w.member_null("start"),
        };
        match encode_bound(self.1) {
            Some(end) => w.member_str("end", &end),
            None => w.member_null("end"),
        };
    }
}

fn deserialise_segment(d: Deserialisation) -> Result<Ranges<Version>, ResolveError> {
    let mut v = Deserialisator::new(d, "seg")?;
    let start = decode_bound(v.find_remove_member("start")?)?;
    let end = decode_bound(v.find_remove_member("end")?)?;
    v.finish()?;
    Ok(Ranges::from_range_bounds((start, end)))
}

impl Serialise for PackageDepSpec {
    fn serialise(&self, s: &mut Serialiser) {
        let segments: Vec<Segment<'_>> = self
            .version_requirement
            .iter()
            .map(|(start, end)| Segment(start, end))
            .collect();
        let w = s
            .object("PackageDepSpec")
            .member_str("package", self.package.as_str())
            .member_container("version_requirement", &segments);
        let w = match &self.exact_slot {
            Some(slot) => w.member_str("exact_slot", slot.as_str()),
            None => w.member_null("exact_slot"),
        };
        match &self.in_repository {
            Some(repository) => w.member_str("in_repository", repository.as_str()),
            None => w.member_null("in_repository"),
        };
    }
}

impl PackageDepSpec {
    pub fn deserialise(d: Deserialisation) -> Result<Self, ResolveError> {
        let mut v = Deserialisator::new(d, "PackageDepSpec")?;
        let package = PackageName::new(v.member_str("package")?);
        let mut requirement = Ranges::empty();
        for item in v.find_remove_member("version_requirement")?.into_container()? {
            requirement = requirement.union(&deserialise_segment(item)?);
        }
        let exact_slot = {
            let m = v.find_remove_member("exact_slot")?;
            if m.is_null() {
                None
            } else {
                Some(SlotName::new(m.as_str()?))
            }
        };
        let in_repository = {
            let m = v.find_remove_member("in_repository")?;
            if m.is_null() {
                None
            } else {
                Some(RepositoryName::new(m.as_str()?))
            }
        };
        v.finish()?;
        let mut spec =
            PackageDepSpec::anything(package).with_version_requirement(requirement);
        if let Some(slot) = exact_slot {
            spec = spec.with_exact_slot(slot);
        }
        if let Some(repository) = in_repository {
            spec = spec.with_in_repository(repository);
        }
        Ok(spec)
    }
}

impl Serialise for BlockDepSpec {
    fn serialise(&self, s: &mut Serialiser) {
        s.object("BlockDepSpec")
            .member("blocked", &self.blocked)
            .member_bool("strong", self.strong);
    }
}

impl BlockDepSpec {
    pub fn deserialise(d: Deserialisation) -> Result<Self, ResolveError> {
        let mut v = Deserialisator::new(d, "BlockDepSpec")?;
        let blocked = PackageDepSpec::deserialise(v.find_remove_member("blocked")?)?;
        let strong = v.member_bool("strong")?;
        v.finish()?;
        Ok(BlockDepSpec::new(blocked, strong))
    }
}

impl Serialise for PackageOrBlockDepSpec {
    fn serialise(&self, s: &mut Serialiser) {
        match self {
            PackageOrBlockDepSpec::Package(spec) => spec.serialise(s),
            PackageOrBlockDepSpec::Block(block) => block.serialise(s),
        }
    }
}

impl PackageOrBlockDepSpec {
    pub fn deserialise(d: Deserialisation) -> Result<Self, ResolveError> {
        match d.class_name() {
            Some("PackageDepSpec") => Ok(PackageOrBlockDepSpec::Package(
                PackageDepSpec::deserialise(d)?,
            )),
            Some("BlockDepSpec") => {
                Ok(PackageOrBlockDepSpec::Block(BlockDepSpec::deserialise(d)?))
            }
            other => Err(ResolveError::Serialisation(format!(
                "unknown dep spec class {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::PackageId;

    fn id(s: &str) -> PackageId {
        PackageId::from_uniquely_identifying_spec(s).unwrap()
    }

    #[test]
    fn matching_honours_every_requirement() {
        let spec = PackageDepSpec::anything(PackageName::new("app/foo"))
            .with_version_requirement(Ranges::higher_than("2.0".parse::<Version>().unwrap()))
            .with_exact_slot(SlotName::new("0"));
        assert!(spec.matches(&id("app/foo-2.1:0::gentoo")));
        assert!(!spec.matches(&id("app/foo-1.9:0::gentoo")));
        assert!(!spec.matches(&id("app/foo-2.1:1::gentoo")));
        assert!(!spec.matches(&id("app/bar-2.1:0::gentoo")));
    }

    #[test]
    fn exactly_matches_only_that_occurrence() {
        let spec = PackageDepSpec::exactly(&id("app/foo-2.1:0::gentoo"));
        assert!(spec.matches(&id("app/foo-2.1:0::gentoo")));
        // same id merged into another repository still matches
        assert!(spec.matches(&id("app/foo-2.1:0::installed")));
        assert!(!spec.matches(&id("app/foo-2.2:0::gentoo")));
    }
}
