// SPDX-License-Identifier: MPL-2.0

//! Names, versions and package identities.
//!
//! These are deliberately thin: real-world version grammars, use flags
//! and metadata live in the repository collaborator. The core only needs
//! structural equality, a total order on versions, and a stable textual
//! form for each identity.

use std::fmt::{self, Display};
use std::str::FromStr;

use crate::error::ResolveError;

macro_rules! name_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw string.
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// The underlying string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }
    };
}

name_newtype! {
    /// A qualified package name, e.g. `app-editors/vim`.
    PackageName
}
name_newtype! {
    /// A slot name. Packages in different slots of the same name may be
    /// installed side by side.
    SlotName
}
name_newtype! {
    /// A repository name.
    RepositoryName
}
name_newtype! {
    /// The name of a package set, e.g. `world`.
    SetName
}

/// A dotted numeric version, totally ordered component-wise.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Version(Vec<u32>);

impl Version {
    /// Builds a version from its numeric components.
    pub fn new(components: impl Into<Vec<u32>>) -> Self {
        Self(components.into())
    }

    /// The numeric components.
    pub fn components(&self) -> &[u32] {
        &self.0
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.0.iter().enumerate() {
            if i != 0 {
                f.write_str(".")?;
            }
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ResolveError::VersionParse(s.into()));
        }
        s.split('.')
            .map(|c| c.parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map(Version)
            .map_err(|_| ResolveError::VersionParse(s.into()))
    }
}

impl From<u32> for Version {
    fn from(n: u32) -> Self {
        Version(vec![n])
    }
}

/// The identity of one known package occurrence: name, version, slot and
/// the repository it lives in. Structural equality throughout.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PackageId {
    name: PackageName,
    version: Version,
    slot: Option<SlotName>,
    repository: RepositoryName,
}

impl PackageId {
    pub fn new(
        name: PackageName,
        version: Version,
        slot: Option<SlotName>,
        repository: RepositoryName,
    ) -> Self {
        Self {
            name,
            version,
            slot,
            repository,
        }
    }

    pub fn name(&self) -> &PackageName {
        &self.name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn slot(&self) -> Option<&SlotName> {
        self.slot.as_ref()
    }

    pub fn repository(&self) -> &RepositoryName {
        &self.repository
    }

    /// A spec string matching exactly this package and nothing else, e.g.
    /// `app-editors/vim-9.1:0::gentoo`. Used as the serialised form.
    pub fn uniquely_identifying_spec(&self) -> String {
        match &self.slot {
            Some(slot) => format!(
                "{}-{}:{}::{}",
                self.name, self.version, slot, self.repository
            ),
            None => format!("{}-{}::{}", self.name, self.version, self.repository),
        }
    }

    /// Parses the output of [`uniquely_identifying_spec`](Self::uniquely_identifying_spec).
    pub fn from_uniquely_identifying_spec(s: &str) -> Result<Self, ResolveError> {
        let bad = || ResolveError::Serialisation(format!("bad package id spec {s:?}"));
        let (rest, repository) = s.rsplit_once("::").ok_or_else(bad)?;
        let (name_and_version, slot) = match rest.split_once(':') {
            Some((nv, slot)) if !slot.is_empty() => (nv, Some(SlotName::new(slot))),
            Some(_) => return Err(bad()),
            None => (rest, None),
        };
        // The version starts at the rightmost '-' whose suffix parses.
        let mut split = None;
        for (i, ch) in name_and_version.char_indices().rev() {
            if ch == '-' && name_and_version[i + 1..].parse::<Version>().is_ok() {
                split = Some(i);
                break;
            }
        }
        let i = split.ok_or_else(bad)?;
        let name = &name_and_version[..i];
        if name.is_empty() {
            return Err(bad());
        }
        let version = name_and_version[i + 1..].parse::<Version>()?;
        Ok(PackageId::new(
            PackageName::new(name),
            version,
            slot,
            RepositoryName::new(repository),
        ))
    }
}

impl Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uniquely_identifying_spec())
    }
}
