// SPDX-License-Identifier: MPL-2.0

//! Non-public machinery behind the resolver.

pub(crate) mod arena;
pub(crate) mod nag;

pub(crate) use arena::{HashArena, Id};
pub(crate) use nag::{EdgeProperties, Nag, NagIndex, Role};
