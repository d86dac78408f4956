// SPDX-License-Identifier: MPL-2.0

//! The resolver's output: an owned, immutable snapshot of everything
//! that was decided, with the work to execute in order.

use crate::decision::{Decision, RequiredConfirmation, UnableToMakeDecision};
use crate::error::ResolveError;
use crate::resolution::Resolution;
use crate::resolvent::Resolvent;
use crate::serialise::{Deserialisation, Deserialisator, Serialise, Serialiser};

/// Annotations the orderer attaches to a scheduled decision.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrdererNotes {
    /// Non-empty when the decision was scheduled as part of breaking a
    /// dependency cycle; names the cycle members.
    pub cycle_breaking: String,
}

/// One entry of the ordered job list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderedDecision {
    pub resolvent: Resolvent,
    pub decision: Decision,
    pub notes: OrdererNotes,
}

/// A decision awaiting explicit user approval.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmableDecision {
    pub resolvent: Resolvent,
    pub decision: Decision,
    pub confirmations: Vec<RequiredConfirmation>,
}

/// Everything [`resolve`](crate::resolve) produced, partitioned by what
/// the caller should do about it. All lists are in deterministic order;
/// `taken_change_or_remove_decisions` is in execution order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Resolved {
    /// Work to execute, in order.
    pub taken_change_or_remove_decisions: Vec<OrderedDecision>,
    /// Decisions made but not selected for execution (untaken
    /// constraints only, e.g. suggestions shown to the user).
    pub untaken_change_or_remove_decisions: Vec<(Resolvent, Decision)>,
    /// Resolvents that could not be decided and whose constraints are
    /// taken.
    pub taken_unable_to_make_decisions: Vec<(Resolvent, UnableToMakeDecision)>,
    /// Resolvents that could not be decided, wanted only by untaken
    /// constraints.
    pub untaken_unable_to_make_decisions: Vec<(Resolvent, UnableToMakeDecision)>,
    /// Decisions pending confirmation before execution.
    pub taken_unconfirmed_decisions: Vec<ConfirmableDecision>,
    /// Full snapshot of the resolution table, for resumption and
    /// diagnostics.
    pub resolutions: Vec<Resolution>,
}

impl Resolved {
    /// The resolvents to act on, in execution order.
    pub fn execution_order(&self) -> impl Iterator<Item = &Resolvent> {
        self.taken_change_or_remove_decisions
            .iter()
            .map(|d| &d.resolvent)
    }

    /// Serialises the whole result to the resumption format.
    pub fn serialise_to_string(&self) -> String {
        let mut s = Serialiser::new();
        self.serialise(&mut s);
        s.into_string()
    }

    /// Parses what [`serialise_to_string`](Self::serialise_to_string)
    /// produced.
    pub fn deserialise_string(text: &str) -> Result<Self, ResolveError> {
        Self::deserialise(Deserialisation::parse(text)?)
    }
}

struct ResolventWithDecision<'a>(&'a Resolvent, &'a Decision);

impl Serialise for ResolventWithDecision<'_> {
    fn serialise(&self, s: &mut Serialiser) {
        s.object("ResolventWithDecision")
            .member("resolvent", self.0)
            .member("decision", self.1);
    }
}

fn deserialise_pair(d: Deserialisation) -> Result<(Resolvent, Decision), ResolveError> {
    let mut v = Deserialisator::new(d, "ResolventWithDecision")?;
    let resolvent = Resolvent::deserialise(v.find_remove_member("resolvent")?)?;
    let decision = Decision::deserialise(v.find_remove_member("decision")?)?;
    v.finish()?;
    Ok((resolvent, decision))
}

fn deserialise_unable_pair(
    d: Deserialisation,
) -> Result<(Resolvent, UnableToMakeDecision), ResolveError> {
    let (resolvent, decision) = deserialise_pair(d)?;
    match decision {
        Decision::UnableToMake(unable) => Ok((resolvent, unable)),
        other => Err(ResolveError::Serialisation(format!(
            "expected an unable-to-make decision, got {other}"
        ))),
    }
}

impl Serialise for OrderedDecision {
    fn serialise(&self, s: &mut Serialiser) {
        s.object("OrderedDecision")
            .member("resolvent", &self.resolvent)
            .member("decision", &self.decision)
            .member_str("cycle_breaking", &self.notes.cycle_breaking);
    }
}

impl OrderedDecision {
    pub fn deserialise(d: Deserialisation) -> Result<Self, ResolveError> {
        let mut v = Deserialisator::new(d, "OrderedDecision")?;
        let resolvent = Resolvent::deserialise(v.find_remove_member("resolvent")?)?;
        let decision = Decision::deserialise(v.find_remove_member("decision")?)?;
        let cycle_breaking = v.member_str("cycle_breaking")?;
        v.finish()?;
        Ok(OrderedDecision {
            resolvent,
            decision,
            notes: OrdererNotes { cycle_breaking },
        })
    }
}

impl Serialise for ConfirmableDecision {
    fn serialise(&self, s: &mut Serialiser) {
        let confirmations: Vec<String> =
            self.confirmations.iter().map(|c| c.to_string()).collect();
        s.object("ConfirmableDecision")
            .member("resolvent", &self.resolvent)
            .member("decision", &self.decision)
            .member_str_container("confirmations", &confirmations);
    }
}

impl ConfirmableDecision {
    pub fn deserialise(d: Deserialisation) -> Result<Self, ResolveError> {
        let mut v = Deserialisator::new(d, "ConfirmableDecision")?;
        let resolvent = Resolvent::deserialise(v.find_remove_member("resolvent")?)?;
        let decision = Decision::deserialise(v.find_remove_member("decision")?)?;
        let confirmations = v
            .find_remove_member("confirmations")?
            .into_container()?
            .into_iter()
            .map(|item| item.as_str()?.parse())
            .collect::<Result<Vec<_>, _>>()?;
        v.finish()?;
        Ok(ConfirmableDecision {
            resolvent,
            decision,
            confirmations,
        })
    }
}

impl Serialise for Resolved {
    fn serialise(&self, s: &mut Serialiser) {
        let untaken: Vec<ResolventWithDecision<'_>> = self
            .untaken_change_or_remove_decisions
            .iter()
            .map(|(r, d)| ResolventWithDecision(r, d))
            .collect();
        let taken_unable: Vec<(Resolvent, Decision)> = self
            .taken_unable_to_make_decisions
            .iter()
            .map(|(r, u)| (r.clone(), Decision::UnableToMake(u.clone())))
            .collect();
        let taken_unable: Vec<ResolventWithDecision<'_>> = taken_unable
            .iter()
            .map(|(r, d)| ResolventWithDecision(r, d))
            .collect();
        let untaken_unable: Vec<(Resolvent, Decision)> = self
            .untaken_unable_to_make_decisions
            .iter()
            .map(|(r, u)| (r.clone(), Decision::UnableToMake(u.clone())))
            .collect();
        let untaken_unable: Vec<ResolventWithDecision<'_>> = untaken_unable
            .iter()
            .map(|(r, d)| ResolventWithDecision(r, d))
            .collect();
        s.object("Resolved")
            .member_container(
                "taken_change_or_remove_decisions",
                &self.taken_change_or_remove_decisions,
            )
            .member_container("untaken_change_or_remove_decisions", &untaken)
            .member_container("taken_unable_to_make_decisions", &taken_unable)
            .member_container("untaken_unable_to_make_decisions", &untaken_unable)
            .member_container(
                "taken_unconfirmed_decisions",
                &self.taken_unconfirmed_decisions,
            )
            .member_container("resolutions", &self.resolutions);
    }
}

impl Resolved {
    pub fn deserialise(d: Deserialisation) -> Result<Self, ResolveError> {
        let mut v = Deserialisator::new(d, "Resolved")?;
        let taken_change_or_remove_decisions = v
            .find_remove_member("taken_change_or_remove_decisions")?
            .into_container()?
            .into_iter()
            .map(OrderedDecision::deserialise)
            .collect::<Result<Vec<_>, _>>()?;
        let untaken_change_or_remove_decisions = v
            .find_remove_member("untaken_change_or_remove_decisions")?
            .into_container()?
            .into_iter()
            .map(deserialise_pair)
            .collect::<Result<Vec<_>, _>>()?;
        let taken_unable_to_make_decisions = v
            .find_remove_member("taken_unable_to_make_decisions")?
            .into_container()?
            .into_iter()
            .map(deserialise_unable_pair)
            .collect::<Result<Vec<_>, _>>()?;
        let untaken_unable_to_make_decisions = v
            .find_remove_member("untaken_unable_to_make_decisions")?
            .into_container()?
            .into_iter()
            .map(deserialise_unable_pair)
            .collect::<Result<Vec<_>, _>>()?;
        let taken_unconfirmed_decisions = v
            .find_remove_member("taken_unconfirmed_decisions")?
            .into_container()?
            .into_iter()
            .map(ConfirmableDecision::deserialise)
            .collect::<Result<Vec<_>, _>>()?;
        let resolutions = v
            .find_remove_member("resolutions")?
            .into_container()?
            .into_iter()
            .map(Resolution::deserialise)
            .collect::<Result<Vec<_>, _>>()?;
        v.finish()?;
        Ok(Resolved {
            taken_change_or_remove_decisions,
            untaken_change_or_remove_decisions,
            taken_unable_to_make_decisions,
            untaken_unable_to_make_decisions,
            taken_unconfirmed_decisions,
            resolutions,
        })
    }
}
