// SPDX-License-Identifier: MPL-2.0

//! Normalised dependency edges.
//!
//! The repository collaborator flattens its raw dependency trees into
//! [`SanitisedDependency`] values: one spec plus the set of labels that
//! were active on it. The resolver only ever looks at the derived
//! [`Classifier`].

use std::fmt::{self, Display};
use std::str::FromStr;

use crate::error::ResolveError;
use crate::serialise::{Deserialisation, Deserialisator, Serialise, Serialiser};
use crate::spec::PackageOrBlockDepSpec;

/// A dependency label as declared in package metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DependencyLabel {
    Build,
    Install,
    Compile,
    Fetch,
    Run,
    Post,
    Test,
    Suggestion,
    Recommendation,
}

impl Display for DependencyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DependencyLabel::Build => "build",
            DependencyLabel::Install => "install",
            DependencyLabel::Compile => "compile",
            DependencyLabel::Fetch => "fetch",
            DependencyLabel::Run => "run",
            DependencyLabel::Post => "post",
            DependencyLabel::Test => "test",
            DependencyLabel::Suggestion => "suggestion",
            DependencyLabel::Recommendation => "recommendation",
        })
    }
}

impl FromStr for DependencyLabel {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "build" => DependencyLabel::Build,
            "install" => DependencyLabel::Install,
            "compile" => DependencyLabel::Compile,
            "fetch" => DependencyLabel::Fetch,
            "run" => DependencyLabel::Run,
            "post" => DependencyLabel::Post,
            "test" => DependencyLabel::Test,
            "suggestion" => DependencyLabel::Suggestion,
            "recommendation" => DependencyLabel::Recommendation,
            _ => {
                return Err(ResolveError::Serialisation(format!(
                    "unknown dependency label {s:?}"
                )))
            }
        })
    }
}

/// What an active label set means for scheduling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Classifier {
    /// The dependency must be present before the dependent builds.
    pub build: bool,
    /// The dependency must be present for the dependent to run.
    pub run: bool,
    /// The dependency may be scheduled after the dependent.
    pub post: bool,
    /// The dependency must be present before the dependent is fetched.
    pub fetch: bool,
}

impl Classifier {
    pub fn from_labels(labels: &[DependencyLabel]) -> Self {
        let mut c = Classifier::default();
        for label in labels {
            match label {
                DependencyLabel::Build
                | DependencyLabel::Install
                | DependencyLabel::Compile
                | DependencyLabel::Test => c.build = true,
                DependencyLabel::Fetch => c.fetch = true,
                DependencyLabel::Run => c.run = true,
                DependencyLabel::Post
                | DependencyLabel::Suggestion
                | DependencyLabel::Recommendation => c.post = true,
            }
        }
        c
    }
}

/// One normalised dependency edge, with provenance for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SanitisedDependency {
    pub spec: PackageOrBlockDepSpec,
    pub active_labels: Vec<DependencyLabel>,
    /// Human name of the metadata key this edge came from, e.g.
    /// "Build dependencies".
    pub metadata_key_human_name: String,
    /// Raw name of that key, e.g. "DEPEND".
    pub metadata_key_raw_name: String,
}

impl SanitisedDependency {
    pub fn new(
        spec: PackageOrBlockDepSpec,
        active_labels: Vec<DependencyLabel>,
        metadata_key_human_name: impl Into<String>,
        metadata_key_raw_name: impl Into<String>,
    ) -> Self {
        Self {
            spec,
            active_labels,
            metadata_key_human_name: metadata_key_human_name.into(),
            metadata_key_raw_name: metadata_key_raw_name.into(),
        }
    }

    pub fn classifier(&self) -> Classifier {
        Classifier::from_labels(&self.active_labels)
    }

    /// Whether every active label marks this edge as merely suggested.
    pub fn is_suggestion(&self) -> bool {
        !self.active_labels.is_empty()
            && self.active_labels.iter().all(|l| {
                matches!(
                    l,
                    DependencyLabel::Suggestion | DependencyLabel::Recommendation
                )
            })
    }
}

impl Display for SanitisedDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.spec, self.metadata_key_human_name)
    }
}

impl Serialise for SanitisedDependency {
    fn serialise(&self, s: &mut Serialiser) {
        let labels: Vec<String> = self.active_labels.iter().map(|l| l.to_string()).collect();
        s.object("SanitisedDependency")
            .member("spec", &self.spec)
            .member_str_container("active_labels", &labels)
            .member_str("metadata_key_human_name", &self.metadata_key_human_name)
            .member_str("metadata_key_raw_name", &self.metadata_key_raw_name);
    }
}

impl SanitisedDependency {
    pub fn deserialise(d: Deserialisation) -> Result<Self, ResolveError> {
        let mut v = Deserialisator::new(d, "SanitisedDependency")?;
        let spec = PackageOrBlockDepSpec::deserialise(v.find_remove_member("spec")?)?;
        let active_labels = v
            .find_remove_member("active_labels")?
            .into_container()?
            .into_iter()
            .map(|item| item.as_str()?.parse())
            .collect::<Result<Vec<_>, _>>()?;
        let metadata_key_human_name = v.member_str("metadata_key_human_name")?;
        let metadata_key_raw_name = v.member_str("metadata_key_raw_name")?;
        v.finish()?;
        Ok(SanitisedDependency {
            spec,
            active_labels,
            metadata_key_human_name,
            metadata_key_raw_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifier_buckets_labels() {
        let c = Classifier::from_labels(&[DependencyLabel::Build, DependencyLabel::Run]);
        assert!(c.build && c.run && !c.post && !c.fetch);

        let c = Classifier::from_labels(&[DependencyLabel::Suggestion]);
        assert!(c.post && !c.build && !c.run);

        let c = Classifier::from_labels(&[DependencyLabel::Fetch]);
        assert!(c.fetch && !c.build);
    }

    #[test]
    fn suggestions_need_every_label_soft() {
        use crate::name::PackageName;
        use crate::spec::PackageDepSpec;

        let spec = PackageOrBlockDepSpec::Package(PackageDepSpec::anything(PackageName::new(
            "app/foo",
        )));
        let soft = SanitisedDependency::new(
            spec.clone(),
            vec![DependencyLabel::Suggestion],
            "Suggested dependencies",
            "SDEPEND",
        );
        assert!(soft.is_suggestion());

        let hard = SanitisedDependency::new(
            spec,
            vec![DependencyLabel::Suggestion, DependencyLabel::Run],
            "Run dependencies",
            "RDEPEND",
        );
        assert!(!hard.is_suggestion());
    }
}
