// SPDX-License-Identifier: MPL-2.0

//! The per-resolvent accumulator the decider works on.

use crate::constraint::Constraints;
use crate::decision::Decision;
use crate::error::ResolveError;
use crate::resolvent::Resolvent;
use crate::serialise::{Deserialisation, Deserialisator, Serialise, Serialiser};

/// An ordering hint recorded by the decider for the orderer: the target
/// resolvent must be scheduled before this one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Arrow {
    pub to_resolvent: Resolvent,
    /// From which cycle-breaking pass onwards the arrow may be ignored.
    /// Zero means never.
    pub ignorable_pass: u8,
    /// Human-readable justification, for diagnostics.
    pub comment: String,
}

/// Everything known about one resolvent: the constraints seen so far,
/// the current decision, and ordering state.
///
/// A decision may be revised while constraints are still arriving, but
/// becomes immutable once `already_ordered` is set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub resolvent: Resolvent,
    pub constraints: Constraints,
    pub decision: Option<Decision>,
    pub already_ordered: bool,
    pub arrows: Vec<Arrow>,
}

impl Resolution {
    pub fn new(resolvent: Resolvent) -> Self {
        Self {
            resolvent,
            constraints: Constraints::new(),
            decision: None,
            already_ordered: false,
            arrows: Vec::new(),
        }
    }
}

impl Serialise for Arrow {
    fn serialise(&self, s: &mut Serialiser) {
        s.object("Arrow")
            .member("to_resolvent", &self.to_resolvent)
            .member_usize("ignorable_pass", self.ignorable_pass as usize)
            .member_str("comment", &self.comment);
    }
}

impl Arrow {
    pub fn deserialise(d: Deserialisation) -> Result<Self, ResolveError> {
        let mut v = Deserialisator::new(d, "Arrow")?;
        let to_resolvent = Resolvent::deserialise(v.find_remove_member("to_resolvent")?)?;
        let ignorable_pass = v.member_usize("ignorable_pass")? as u8;
        let comment = v.member_str("comment")?;
        v.finish()?;
        Ok(Arrow {
            to_resolvent,
            ignorable_pass,
            comment,
        })
    }
}

impl Serialise for Resolution {
    fn serialise(&self, s: &mut Serialiser) {
        let w = s
            .object("Resolution")
            .member("resolvent", &self.resolvent)
            .member("constraints", &self.constraints);
        let w = match &self.decision {
            Some(decision) => w.member("decision", decision),
            None => w.member_null("decision"),
        };
        w.member_bool("already_ordered", self.already_ordered)
            .member_container("arrows", &self.arrows);
    }
}

impl Resolution {
    pub fn deserialise(d: Deserialisation) -> Result<Self, ResolveError> {
        let mut v = Deserialisator::new(d, "Resolution")?;
        let resolvent = Resolvent::deserialise(v.find_remove_member("resolvent")?)?;
        let constraints = Constraints::deserialise(v.find_remove_member("constraints")?)?;
        let decision = {
            let m = v.find_remove_member("decision")?;
            if m.is_null() {
                None
            } else {
                Some(Decision::deserialise(m)?)
            }
        };
        let already_ordered = v.member_bool("already_ordered")?;
        let arrows = v
            .find_remove_member("arrows")?
            .into_container()?
            .into_iter()
            .map(Arrow::deserialise)
            .collect::<Result<Vec<_>, _>>()?;
        v.finish()?;
        Ok(Resolution {
            resolvent,
            constraints,
            decision,
            already_ordered,
            arrows,
        })
    }
}
