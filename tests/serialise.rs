// SPDX-License-Identifier: MPL-2.0

//! Round-trip coverage for the resumption format.

use proptest::prelude::*;

use slotsolve::{
    resolve, Arrow, BlockDepSpec, ChangeType, ChangesToMakeDecision, Constraint, Constraints,
    Decision, DependencyLabel, DependencyReason, Deserialisation, DestinationType,
    ExistingNoChangeDecision, OfflineProvider, PackageDepSpec, PackageId, PackageName,
    PackageOrBlockDepSpec, Ranges, Reason, RemoveDecision, RepositoryName, RequiredConfirmation,
    Resolution, Resolved, Resolvent, SanitisedDependency, Serialise, Serialiser, SetName,
    SlotName, UnableToMakeDecision, UnsuitableCandidate, UseExisting, Version,
};

fn to_text<T: Serialise>(value: &T) -> String {
    let mut s = Serialiser::new();
    value.serialise(&mut s);
    s.into_string()
}

fn id(name: &str, version: u32) -> PackageId {
    PackageId::new(
        PackageName::new(name),
        Version::from(version),
        Some(SlotName::new("0")),
        RepositoryName::new("repo"),
    )
}

fn installed(name: &str, version: u32) -> PackageId {
    PackageId::new(
        PackageName::new(name),
        Version::from(version),
        Some(SlotName::new("0")),
        RepositoryName::new("installed"),
    )
}

fn dep(name: &str, labels: &[DependencyLabel]) -> SanitisedDependency {
    SanitisedDependency::new(
        PackageOrBlockDepSpec::Package(PackageDepSpec::anything(PackageName::new(name))),
        labels.to_vec(),
        "Dependencies",
        "DEPENDENCIES",
    )
}

/// A full resolution with keeps, installs, removals, a downgrade pending
/// confirmation, an untaken suggestion and an unresolvable resolvent
/// survives a trip through the text format.
#[test]
fn resolved_output_round_trips() {
    let mut provider = OfflineProvider::new();
    provider
        .add_candidate(id("app/main", 1))
        .add_candidate(id("app/kept", 1))
        .add_installed(installed("app/kept", 1))
        .add_installed(installed("app/blocked", 1))
        .add_candidate(id("app/down", 1))
        .add_installed(installed("app/down", 2))
        .add_candidate(id("app/extra", 1))
        .add_dependency(&id("app/main", 1), dep("app/kept", &[DependencyLabel::Build]))
        .add_dependency(
            &id("app/main", 1),
            SanitisedDependency::new(
                PackageOrBlockDepSpec::Block(BlockDepSpec::new(
                    PackageDepSpec::anything(PackageName::new("app/blocked")),
                    true,
                )),
                vec![DependencyLabel::Build],
                "Dependencies",
                "DEPENDENCIES",
            ),
        )
        .add_dependency(
            &id("app/main", 1),
            SanitisedDependency::new(
                PackageOrBlockDepSpec::Package(
                    PackageDepSpec::anything(PackageName::new("app/missing"))
                        .with_version_requirement(Ranges::higher_than(Version::from(5))),
                ),
                vec![DependencyLabel::Post],
                "Dependencies",
                "DEPENDENCIES",
            ),
        )
        .add_dependency(
            &id("app/main", 1),
            dep("app/extra", &[DependencyLabel::Suggestion]),
        )
        .add_dependency(&id("app/main", 1), dep("app/down", &[DependencyLabel::Run]));
    provider.set_use_existing(UseExisting::IfSameVersion);

    let resolved = resolve(
        &provider,
        [PackageDepSpec::anything(PackageName::new("app/main"))],
    )
    .unwrap();

    let text = resolved.serialise_to_string();
    let back = Resolved::deserialise_string(&text).unwrap();
    assert_eq!(resolved, back);
}

#[test]
fn garbage_text_is_rejected() {
    assert!(Resolved::deserialise_string("not a serialisation").is_err());
    assert!(Resolved::deserialise_string("Resolved(").is_err());
    // A well-formed object of the wrong class is rejected too.
    assert!(Resolved::deserialise_string("Arrow();").is_err());
}

fn arb_version() -> impl Strategy<Value = Version> {
    prop::collection::vec(0u32..50, 1..4).prop_map(Version::new)
}

fn arb_package_name() -> impl Strategy<Value = PackageName> {
    prop::sample::select(vec!["app/a", "app/b", "dev/lib", "sys/base"])
        .prop_map(PackageName::new)
}

fn arb_slot() -> impl Strategy<Value = Option<SlotName>> {
    prop::option::of(prop::sample::select(vec!["0", "1", "2"]).prop_map(SlotName::new))
}

fn arb_repository() -> impl Strategy<Value = RepositoryName> {
    prop::sample::select(vec!["repo", "installed", "binrepo"]).prop_map(RepositoryName::new)
}

fn arb_package_id() -> impl Strategy<Value = PackageId> {
    (arb_package_name(), arb_version(), arb_slot(), arb_repository())
        .prop_map(|(name, version, slot, repository)| {
            PackageId::new(name, version, slot, repository)
        })
}

fn arb_destination() -> impl Strategy<Value = DestinationType> {
    prop::sample::select(vec![
        DestinationType::InstallToSlash,
        DestinationType::InstallToChroot,
        DestinationType::CreateBinary,
    ])
}

fn arb_resolvent() -> impl Strategy<Value = Resolvent> {
    (arb_package_name(), arb_slot(), arb_destination())
        .prop_map(|(package, slot, destination)| Resolvent::new(package, slot, destination))
}

fn arb_ranges() -> impl Strategy<Value = Ranges<Version>> {
    prop_oneof![
        Just(Ranges::full()),
        arb_version().prop_map(Ranges::singleton),
        arb_version().prop_map(Ranges::higher_than),
        arb_version().prop_map(Ranges::strictly_lower_than),
        (arb_version(), arb_version()).prop_map(|(a, b)| {
            Ranges::higher_than(a).intersection(&Ranges::strictly_lower_than(b))
        }),
    ]
}

fn arb_package_spec() -> impl Strategy<Value = PackageDepSpec> {
    (
        arb_package_name(),
        arb_ranges(),
        arb_slot(),
        prop::option::of(arb_repository()),
    )
        .prop_map(|(package, requirement, slot, repository)| {
            let mut spec =
                PackageDepSpec::anything(package).with_version_requirement(requirement);
            if let Some(slot) = slot {
                spec = spec.with_exact_slot(slot);
            }
            if let Some(repository) = repository {
                spec = spec.with_in_repository(repository);
            }
            spec
        })
}

fn arb_spec() -> impl Strategy<Value = PackageOrBlockDepSpec> {
    prop_oneof![
        arb_package_spec().prop_map(PackageOrBlockDepSpec::Package),
        (arb_package_spec(), any::<bool>())
            .prop_map(|(spec, strong)| PackageOrBlockDepSpec::Block(BlockDepSpec::new(
                spec, strong
            ))),
    ]
}

fn arb_labels() -> impl Strategy<Value = Vec<DependencyLabel>> {
    prop::collection::vec(
        prop::sample::select(vec![
            DependencyLabel::Build,
            DependencyLabel::Install,
            DependencyLabel::Compile,
            DependencyLabel::Fetch,
            DependencyLabel::Run,
            DependencyLabel::Post,
            DependencyLabel::Test,
            DependencyLabel::Suggestion,
            DependencyLabel::Recommendation,
        ]),
        0..4,
    )
}

fn arb_dependency() -> impl Strategy<Value = SanitisedDependency> {
    (arb_spec(), arb_labels(), ".*", ".*").prop_map(|(spec, labels, human, raw)| {
        SanitisedDependency::new(spec, labels, human, raw)
    })
}

fn arb_reason() -> impl Strategy<Value = Reason> {
    let leaf = prop_oneof![
        Just(Reason::Target),
        Just(Reason::Preset),
        (arb_package_id(), arb_resolvent(), arb_dependency(), any::<bool>()).prop_map(
            |(from_id, from_resolvent, dependency, already_met)| {
                Reason::Dependency(DependencyReason {
                    from_id,
                    from_resolvent,
                    dependency,
                    already_met,
                })
            }
        ),
    ];
    leaf.prop_recursive(2, 4, 1, |inner| {
        (prop::sample::select(vec!["world", "system"]), inner).prop_map(|(name, reason)| {
            Reason::Set {
                name: SetName::new(name),
                inner: Box::new(reason),
            }
        })
    })
}

fn arb_use_existing() -> impl Strategy<Value = UseExisting> {
    prop::sample::select(vec![
        UseExisting::IfPossible,
        UseExisting::IfSameVersion,
        UseExisting::IfSame,
        UseExisting::Never,
    ])
}

fn arb_constraint() -> impl Strategy<Value = Constraint> {
    (
        arb_reason(),
        arb_spec(),
        arb_use_existing(),
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(
            |(reason, spec, use_existing, to_destination, nothing_is_fine_too, untaken)| {
                Constraint {
                    reason,
                    spec,
                    use_existing,
                    to_destination,
                    nothing_is_fine_too,
                    untaken,
                }
            },
        )
}

fn arb_confirmations() -> impl Strategy<Value = Vec<RequiredConfirmation>> {
    prop::collection::vec(
        prop::sample::select(vec![
            RequiredConfirmation::Downgrade,
            RequiredConfirmation::NotBest,
            RequiredConfirmation::Break,
            RequiredConfirmation::RemoveSystemPackage,
        ]),
        0..3,
    )
}

fn arb_change_type() -> impl Strategy<Value = ChangeType> {
    prop::sample::select(vec![
        ChangeType::New,
        ChangeType::NewSlot,
        ChangeType::Upgrade,
        ChangeType::Reinstall,
        ChangeType::Downgrade,
    ])
}

fn arb_decision() -> impl Strategy<Value = Decision> {
    prop_oneof![
        any::<bool>().prop_map(|taken| Decision::NothingNoChange { taken }),
        (
            arb_package_id(),
            any::<bool>(),
            any::<bool>(),
            any::<bool>(),
            any::<bool>()
        )
            .prop_map(
                |(existing_id, is_same, is_same_version, is_transient, taken)| {
                    Decision::ExistingNoChange(ExistingNoChangeDecision {
                        existing_id,
                        is_same,
                        is_same_version,
                        is_transient,
                        taken,
                    })
                }
            ),
        (
            arb_package_id(),
            prop::option::of(arb_repository()),
            arb_change_type(),
            prop::collection::vec(arb_package_id(), 0..3),
            any::<bool>(),
            arb_confirmations(),
            any::<bool>(),
        )
            .prop_map(
                |(origin_id, destination, change_type, replacing, best, confirmations, taken)| {
                    Decision::ChangesToMake(ChangesToMakeDecision {
                        origin_id,
                        destination,
                        change_type,
                        replacing,
                        best,
                        required_confirmations: confirmations,
                        taken,
                    })
                }
            ),
        (
            prop::collection::vec(arb_package_id(), 1..3),
            any::<bool>(),
            arb_confirmations(),
            any::<bool>(),
        )
            .prop_map(|(ids, was_unused, confirmations, taken)| {
                Decision::Remove(RemoveDecision {
                    ids,
                    was_unused,
                    required_confirmations: confirmations,
                    taken,
                })
            }),
        (
            prop::collection::vec(
                (arb_package_id(), prop::collection::vec(".*", 0..3)).prop_map(
                    |(id, unmet_constraints)| UnsuitableCandidate {
                        id,
                        unmet_constraints,
                    }
                ),
                0..3,
            ),
            any::<bool>(),
        )
            .prop_map(|(unsuitable_candidates, taken)| {
                Decision::UnableToMake(UnableToMakeDecision {
                    unsuitable_candidates,
                    taken,
                })
            }),
    ]
}

fn arb_resolution() -> impl Strategy<Value = Resolution> {
    (
        arb_resolvent(),
        prop::collection::vec(arb_constraint(), 0..3),
        prop::option::of(arb_decision()),
        any::<bool>(),
        prop::collection::vec(
            (arb_resolvent(), 0u8..4, ".*").prop_map(|(to_resolvent, ignorable_pass, comment)| {
                Arrow {
                    to_resolvent,
                    ignorable_pass,
                    comment,
                }
            }),
            0..3,
        ),
    )
        .prop_map(|(resolvent, constraints, decision, already_ordered, arrows)| {
            let mut resolution = Resolution::new(resolvent);
            for constraint in constraints {
                resolution.constraints.add(constraint);
            }
            resolution.decision = decision;
            resolution.already_ordered = already_ordered;
            resolution.arrows = arrows;
            resolution
        })
}

proptest! {
    #[test]
    fn decision_round_trips(decision in arb_decision()) {
        let text = to_text(&decision);
        let back = Decision::deserialise(Deserialisation::parse(&text).unwrap()).unwrap();
        prop_assert_eq!(decision, back);
    }

    #[test]
    fn constraint_round_trips(constraint in arb_constraint()) {
        let text = to_text(&constraint);
        let back = Constraint::deserialise(Deserialisation::parse(&text).unwrap()).unwrap();
        prop_assert_eq!(constraint, back);
    }

    #[test]
    fn resolution_round_trips(resolution in arb_resolution()) {
        let text = to_text(&resolution);
        let back = Resolution::deserialise(Deserialisation::parse(&text).unwrap()).unwrap();
        prop_assert_eq!(resolution, back);
    }

    #[test]
    fn constraints_refold_after_the_trip(constraints in prop::collection::vec(arb_constraint(), 0..4)) {
        let mut original = Constraints::new();
        for constraint in constraints {
            original.add(constraint);
        }
        let text = to_text(&original);
        let back = Constraints::deserialise(Deserialisation::parse(&text).unwrap()).unwrap();
        prop_assert_eq!(original.strictest_use_existing(), back.strictest_use_existing());
        prop_assert_eq!(original.nothing_is_fine_too(), back.nothing_is_fine_too());
        prop_assert_eq!(original, back);
    }
}
