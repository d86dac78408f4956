// SPDX-License-Identifier: MPL-2.0

//! Turns the finished resolution table into one valid execution order.
//!
//! Every taken change or removal becomes one or two nodes in the NAG
//! (a fetch stage and a completion stage), dependency constraints and
//! recorded arrows become edges, and the strongly connected components
//! of the result are linearized. A component that is a genuine cycle is
//! re-decomposed with progressively weaker edge classes removed until it
//! falls apart; if nothing helps, the members are scheduled in their
//! natural order and annotated, so ordering itself never fails.

use log::{debug, info};

use crate::decision::Decision;
use crate::error::ResolveError;
use crate::internal::{EdgeProperties, Id, Nag, NagIndex, Role};
use crate::resolution::Resolution;
use crate::resolved::{ConfirmableDecision, OrderedDecision, OrdererNotes, Resolved};
use crate::resolvent::Resolvent;
use crate::type_aliases::{FxIndexMap, Map, Set};

/// The pass after which a still-connected component is declared
/// unsolvable. Pass 1 ignores post-only edges, pass 2 also ignores
/// edges whose every dependency is already met, pass 3 also ignores
/// pure run-time edges. Build edges and hard edges are never ignored.
const LAST_PASS: u8 = 3;

pub(crate) fn order(
    resolutions: &mut FxIndexMap<Resolvent, Resolution>,
) -> Result<Resolved, ResolveError> {
    let mut nag = Nag::new();
    let mut schedulable: Set<Resolvent> = Set::default();
    let mut untaken_changes = Vec::new();
    let mut taken_unable = Vec::new();
    let mut untaken_unable = Vec::new();
    let mut unconfirmed = Vec::new();

    for (resolvent, resolution) in resolutions.iter() {
        let decision = resolution.decision.as_ref().ok_or_else(|| {
            ResolveError::Internal(format!("{resolvent} reached the orderer with no decision"))
        })?;
        match decision {
            Decision::UnableToMake(unable) => {
                if unable.taken {
                    taken_unable.push((resolvent.clone(), unable.clone()));
                } else {
                    untaken_unable.push((resolvent.clone(), unable.clone()));
                }
            }
            d if d.is_change_or_remove() && d.taken() => {
                schedulable.insert(resolvent.clone());
                let done = nag.add_node(NagIndex {
                    resolvent: resolvent.clone(),
                    role: Role::Done,
                });
                if matches!(d, Decision::ChangesToMake(_)) {
                    let fetched = nag.add_node(NagIndex {
                        resolvent: resolvent.clone(),
                        role: Role::Fetched,
                    });
                    nag.add_edge(
                        fetched,
                        done,
                        EdgeProperties {
                            build: true,
                            run: false,
                            post: false,
                            build_all_met: false,
                            run_all_met: true,
                            hard: true,
                        },
                    );
                }
            }
            d if d.is_change_or_remove() => {
                untaken_changes.push((resolvent.clone(), d.clone()));
            }
            _ => {}
        }
        if decision.taken() && !decision.required_confirmations().is_empty() {
            unconfirmed.push(ConfirmableDecision {
                resolvent: resolvent.clone(),
                decision: decision.clone(),
                confirmations: decision.required_confirmations().to_vec(),
            });
        }
    }

    let mut self_notes: Map<Resolvent, String> = Map::default();
    for (resolvent, resolution) in resolutions.iter() {
        // Recorded arrows: the pointed-to resolvent goes first.
        for arrow in &resolution.arrows {
            let from = nag.find_node(&NagIndex {
                resolvent: arrow.to_resolvent.clone(),
                role: Role::Done,
            });
            let to = nag.find_node(&NagIndex {
                resolvent: resolvent.clone(),
                role: Role::Done,
            });
            if let (Some(from), Some(to)) = (from, to) {
                let props = if arrow.ignorable_pass == 0 {
                    EdgeProperties {
                        build: true,
                        run: false,
                        post: false,
                        build_all_met: false,
                        run_all_met: true,
                        hard: true,
                    }
                } else {
                    EdgeProperties {
                        build: false,
                        run: true,
                        post: false,
                        build_all_met: true,
                        run_all_met: true,
                        hard: false,
                    }
                };
                debug!("arrow edge {} -> {} ({})", arrow.to_resolvent, resolvent, arrow.comment);
                nag.add_edge(from, to, props);
            }
        }

        // Dependency constraints on this resolvent: it must be in place
        // before whoever asked for it. Blocks are covered by arrows.
        for constraint in &resolution.constraints {
            if constraint.untaken || constraint.spec.is_block() {
                continue;
            }
            let Some(dr) = constraint.reason.dependency_reason() else {
                continue;
            };
            if dr.from_resolvent == *resolvent {
                self_notes
                    .entry(resolvent.clone())
                    .or_insert_with(|| format!("Dependent on own {}", dr.dependency));
                continue;
            }
            if !schedulable.contains(resolvent) || !schedulable.contains(&dr.from_resolvent) {
                continue;
            }
            let classifier = dr.dependency.classifier();
            let build = classifier.build || classifier.fetch;
            let props = EdgeProperties {
                build,
                run: classifier.run,
                post: classifier.post && !build && !classifier.run,
                build_all_met: dr.already_met || !build,
                run_all_met: dr.already_met || !classifier.run,
                hard: false,
            };
            let Some(from) = nag.find_node(&NagIndex {
                resolvent: resolvent.clone(),
                role: Role::Done,
            }) else {
                continue;
            };
            // A pure fetch dependency only has to be in place before the
            // dependent starts fetching.
            let to_role = if classifier.fetch {
                Role::Fetched
            } else {
                Role::Done
            };
            let to = nag
                .find_node(&NagIndex {
                    resolvent: dr.from_resolvent.clone(),
                    role: to_role,
                })
                .or_else(|| {
                    nag.find_node(&NagIndex {
                        resolvent: dr.from_resolvent.clone(),
                        role: Role::Done,
                    })
                });
            if let Some(to) = to {
                nag.add_edge(from, to, props);
            }
        }
    }

    let mut taken_ordered: Vec<OrderedDecision> = Vec::new();
    for component in nag.ordered_sccs(None, |e| edge_ok(0, e)) {
        schedule(
            &nag,
            component,
            0,
            "",
            resolutions,
            &self_notes,
            &mut taken_ordered,
        )?;
    }
    info!(
        "ordered {} decisions ({} unable, {} awaiting confirmation)",
        taken_ordered.len(),
        taken_unable.len(),
        unconfirmed.len()
    );

    Ok(Resolved {
        taken_change_or_remove_decisions: taken_ordered,
        untaken_change_or_remove_decisions: untaken_changes,
        taken_unable_to_make_decisions: taken_unable,
        untaken_unable_to_make_decisions: untaken_unable,
        taken_unconfirmed_decisions: unconfirmed,
        resolutions: resolutions.values().cloned().collect(),
    })
}

fn edge_ok(pass: u8, e: &EdgeProperties) -> bool {
    if e.hard {
        return true;
    }
    let post_only = e.post && !e.build && !e.run;
    let all_met = e.build_all_met && e.run_all_met;
    let run_only = e.run && !e.build;
    match pass {
        0 => true,
        1 => !post_only,
        2 => !post_only && !all_met,
        _ => !post_only && !all_met && !run_only,
    }
}

fn schedule(
    nag: &Nag,
    members: Vec<Id<NagIndex>>,
    pass: u8,
    note: &str,
    resolutions: &mut FxIndexMap<Resolvent, Resolution>,
    self_notes: &Map<Resolvent, String>,
    out: &mut Vec<OrderedDecision>,
) -> Result<(), ResolveError> {
    if members.len() == 1 {
        return emit(nag, members[0], note, resolutions, self_notes, out);
    }
    if pass >= LAST_PASS {
        let note = format!("In unsolvable cycle: {}", member_names(nag, &members));
        info!("{note}");
        for id in members {
            emit(nag, id, &note, resolutions, self_notes, out)?;
        }
        return Ok(());
    }
    let keep: Set<Id<NagIndex>> = members.iter().copied().collect();
    let sub = nag.ordered_sccs(Some(&keep), |e| edge_ok(pass + 1, e));
    if sub.len() <= 1 {
        return schedule(nag, members, pass + 1, note, resolutions, self_notes, out);
    }
    let cycle_note = if note.is_empty() {
        let names = member_names(nag, &members);
        if pass + 1 == 2 {
            format!("In dependency cycle with existing packages: {names}")
        } else {
            format!("In dependency cycle: {names}")
        }
    } else {
        note.to_string()
    };
    debug!("{cycle_note}");
    for component in sub {
        schedule(
            nag,
            component,
            pass + 1,
            &cycle_note,
            resolutions,
            self_notes,
            out,
        )?;
    }
    Ok(())
}

fn emit(
    nag: &Nag,
    id: Id<NagIndex>,
    note: &str,
    resolutions: &mut FxIndexMap<Resolvent, Resolution>,
    self_notes: &Map<Resolvent, String>,
    out: &mut Vec<OrderedDecision>,
) -> Result<(), ResolveError> {
    let index = nag.node(id);
    if index.role != Role::Done {
        return Ok(());
    }
    let resolution = resolutions.get_mut(&index.resolvent).ok_or_else(|| {
        ResolveError::Internal(format!("scheduled {} has no resolution", index.resolvent))
    })?;
    resolution.already_ordered = true;
    let decision = resolution.decision.clone().ok_or_else(|| {
        ResolveError::Internal(format!("scheduled {} has no decision", index.resolvent))
    })?;
    let cycle_breaking = if note.is_empty() {
        self_notes
            .get(&index.resolvent)
            .cloned()
            .unwrap_or_default()
    } else {
        note.to_string()
    };
    out.push(OrderedDecision {
        resolvent: index.resolvent.clone(),
        decision,
        notes: OrdererNotes { cycle_breaking },
    });
    Ok(())
}

fn member_names(nag: &Nag, members: &[Id<NagIndex>]) -> String {
    let mut names: Vec<String> = Vec::new();
    for id in members {
        let name = nag.node(*id).resolvent.to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names.join(", ")
}
