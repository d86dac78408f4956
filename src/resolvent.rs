// SPDX-License-Identifier: MPL-2.0

//! The unit of resolution: one package name, in one slot, headed for one
//! destination.

use std::fmt::{self, Display};
use std::str::FromStr;

use crate::error::ResolveError;
use crate::name::{PackageId, PackageName, SlotName};
use crate::serialise::{Deserialisation, Deserialisator, Serialise, Serialiser};

/// Where a decided change is realised.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DestinationType {
    /// Install into the running system root.
    InstallToSlash,
    /// Install into a chroot.
    InstallToChroot,
    /// Build a binary package without installing it.
    CreateBinary,
}

impl Display for DestinationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DestinationType::InstallToSlash => "slash",
            DestinationType::InstallToChroot => "chroot",
            DestinationType::CreateBinary => "binary",
        })
    }
}

impl FromStr for DestinationType {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "slash" => Ok(DestinationType::InstallToSlash),
            "chroot" => Ok(DestinationType::InstallToChroot),
            "binary" => Ok(DestinationType::CreateBinary),
            _ => Err(ResolveError::Serialisation(format!(
                "unknown destination type {s:?}"
            ))),
        }
    }
}

/// The key the resolver decides about: (package, slot-or-null,
/// destination). A null slot means the slot is not yet pinned down, e.g.
/// a dependency spec for a package with no known candidates.
///
/// The derived `Ord` is the stable tie-break order used wherever the
/// orderer needs a deterministic fallback.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Resolvent {
    pub package: PackageName,
    pub slot: Option<SlotName>,
    pub destination: DestinationType,
}

impl Resolvent {
    pub fn new(package: PackageName, slot: Option<SlotName>, destination: DestinationType) -> Self {
        Self {
            package,
            slot,
            destination,
        }
    }

    /// The resolvent a concrete package occurrence belongs to.
    pub fn of(id: &PackageId, destination: DestinationType) -> Self {
        Self::new(id.name().clone(), id.slot().cloned(), destination)
    }
}

impl Display for Resolvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.package)?;
        if let Some(slot) = &self.slot {
            write!(f, ":{slot}")?;
        }
        match self.destination {
            DestinationType::InstallToSlash => Ok(()),
            other => write!(f, "->{other}"),
        }
    }
}

impl Serialise for Resolvent {
    fn serialise(&self, s: &mut Serialiser) {
        let w = s
            .object("Resolvent")
            .member_str("package", self.package.as_str());
        let w = match &self.slot {
            Some(slot) => w.member_str("slot", slot.as_str()),
            None => w.member_null("slot"),
        };
        w.member_str("destination", &self.destination.to_string());
    }
}

impl Resolvent {
    pub fn deserialise(d: Deserialisation) -> Result<Self, ResolveError> {
        let mut v = Deserialisator::new(d, "Resolvent")?;
        let package = PackageName::new(v.member_str("package")?);
        let slot = {
            let m = v.find_remove_member("slot")?;
            if m.is_null() {
                None
            } else {
                Some(SlotName::new(m.as_str()?))
            }
        };
        let destination = v.member_str("destination")?.parse()?;
        v.finish()?;
        Ok(Resolvent::new(package, slot, destination))
    }
}
