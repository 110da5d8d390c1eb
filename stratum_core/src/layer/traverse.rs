// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree traversal utilities.

use super::id::{INVALID, LayerId};
use super::store::LayerStore;

/// An iterator over the direct children of a layer, first to last.
///
/// Created by [`LayerStore::children`].
#[derive(Debug)]
pub struct Children<'a> {
    store: &'a LayerStore,
    front: u32,
    back: u32,
}

impl<'a> Children<'a> {
    pub(crate) fn new(store: &'a LayerStore, first: u32, last: u32) -> Self {
        Self {
            store,
            front: first,
            back: last,
        }
    }

    fn finish(&mut self) {
        self.front = INVALID;
        self.back = INVALID;
    }
}

impl Iterator for Children<'_> {
    type Item = LayerId;

    fn next(&mut self) -> Option<LayerId> {
        if self.front == INVALID {
            return None;
        }
        let idx = self.front;
        if idx == self.back {
            self.finish();
        } else {
            self.front = self.store.next_sibling[idx as usize];
        }
        Some(self.store.handle(idx))
    }
}

impl DoubleEndedIterator for Children<'_> {
    fn next_back(&mut self) -> Option<LayerId> {
        if self.back == INVALID {
            return None;
        }
        let idx = self.back;
        if idx == self.front {
            self.finish();
        } else {
            self.back = self.store.prev_sibling[idx as usize];
        }
        Some(self.store.handle(idx))
    }
}

/// An iterator over the ancestors of a layer, nearest first.
///
/// Created by [`LayerStore::ancestors`].
#[derive(Debug)]
pub struct Ancestors<'a> {
    store: &'a LayerStore,
    current: u32,
}

impl<'a> Ancestors<'a> {
    pub(crate) fn new(store: &'a LayerStore, start: u32) -> Self {
        Self {
            store,
            current: store.parent[start as usize],
        }
    }
}

impl Iterator for Ancestors<'_> {
    type Item = LayerId;

    fn next(&mut self) -> Option<LayerId> {
        if self.current == INVALID {
            return None;
        }
        let idx = self.current;
        self.current = self.store.parent[idx as usize];
        Some(self.store.handle(idx))
    }
}
