// SPDX-License-Identifier: MPL-2.0

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::ops::Index;

use crate::type_aliases::Map;

/// The index of a value allocated in an arena that has a lifetime scoped
/// to the arena it belongs to. Indices are cheap to copy, compare and
/// hash, unlike the values they stand for.
pub(crate) struct Id<T> {
    raw: u32,
    _ty: PhantomData<fn() -> T>,
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for Id<T> {}

impl<T> Hash for Id<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let type_name = std::any::type_name::<T>().rsplit("::").next().unwrap_or("?");
        write!(f, "Id::<{}>({})", type_name, self.raw)
    }
}

impl<T> Id<T> {
    fn from(n: u32) -> Self {
        Self {
            raw: n,
            _ty: PhantomData,
        }
    }

    pub(crate) fn into_raw(self) -> usize {
        self.raw as usize
    }
}

/// An arena deduplicating hashable values: allocating an already-present
/// value returns the existing index.
#[derive(Clone)]
pub(crate) struct HashArena<T: Hash + Eq> {
    ids: Map<T, Id<T>>,
    data: Vec<T>,
}

impl<T: Hash + Eq + fmt::Debug> fmt::Debug for HashArena<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashArena")
            .field("data", &self.data)
            .finish()
    }
}

impl<T: Hash + Eq + Clone> HashArena<T> {
    pub(crate) fn new() -> Self {
        Self {
            ids: Map::default(),
            data: Vec::new(),
        }
    }

    pub(crate) fn alloc(&mut self, value: T) -> Id<T> {
        if let Some(id) = self.ids.get(&value) {
            return *id;
        }
        let id = Id::from(self.data.len() as u32);
        self.ids.insert(value.clone(), id);
        self.data.push(value);
        id
    }

    pub(crate) fn find(&self, value: &T) -> Option<Id<T>> {
        self.ids.get(value).copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (Id<T>, &T)> {
        self.data
            .iter()
            .enumerate()
            .map(|(i, v)| (Id::from(i as u32), v))
    }
}

impl<T: Hash + Eq> Index<Id<T>> for HashArena<T> {
    type Output = T;
    fn index(&self, id: Id<T>) -> &T {
        &self.data[id.raw as usize]
    }
}
