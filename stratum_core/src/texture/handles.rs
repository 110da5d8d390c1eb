// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Registry of GPU resources shared by handle.

use alloc::collections::BTreeMap;

use super::TextureError;

#[derive(Debug)]
struct Entry<R> {
    resource: R,
    opens: u32,
}

/// Resources a producer has shared with the backend, keyed by handle.
///
/// Shared-handle textures [`open`](Self::open) a handle when they receive
/// it and [`release`](Self::release) it when they switch to another handle
/// or are dropped. The open count lets tests and diagnostics check that
/// every open is paired with a release.
#[derive(Debug)]
pub struct SharedHandleTable<R> {
    entries: BTreeMap<u64, Entry<R>>,
}

impl<R> Default for SharedHandleTable<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> SharedHandleTable<R> {
    /// Creates an empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Makes `resource` available under `handle`, replacing any previous
    /// registration.
    pub fn register(&mut self, handle: u64, resource: R) {
        let opens = self.entries.get(&handle).map_or(0, |e| e.opens);
        self.entries.insert(handle, Entry { resource, opens });
    }

    /// Removes a registration, returning its resource.
    pub fn unregister(&mut self, handle: u64) -> Option<R> {
        self.entries.remove(&handle).map(|e| e.resource)
    }

    /// Number of outstanding opens of `handle`.
    #[must_use]
    pub fn open_count(&self, handle: u64) -> u32 {
        self.entries.get(&handle).map_or(0, |e| e.opens)
    }

    /// Releases one open of `handle`. Releasing an unregistered or unopened
    /// handle is ignored.
    pub fn release(&mut self, handle: u64) {
        if let Some(e) = self.entries.get_mut(&handle) {
            e.opens = e.opens.saturating_sub(1);
        }
    }
}

impl<R: Clone> SharedHandleTable<R> {
    /// Opens `handle`, returning its resource.
    ///
    /// # Errors
    ///
    /// Returns [`TextureError::UnknownHandle`] if nothing is registered.
    pub fn open(&mut self, handle: u64) -> Result<R, TextureError> {
        let e = self
            .entries
            .get_mut(&handle)
            .ok_or(TextureError::UnknownHandle(handle))?;
        e.opens += 1;
        Ok(e.resource.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_and_release_balance() {
        let mut table = SharedHandleTable::new();
        table.register(5, "tex");
        assert_eq!(table.open(5), Ok("tex"));
        assert_eq!(table.open(5), Ok("tex"));
        assert_eq!(table.open_count(5), 2);
        table.release(5);
        table.release(5);
        table.release(5);
        assert_eq!(table.open_count(5), 0);
    }

    #[test]
    fn unknown_handle_is_an_error() {
        let mut table: SharedHandleTable<u8> = SharedHandleTable::new();
        assert_eq!(table.open(9), Err(TextureError::UnknownHandle(9)));
    }

    #[test]
    fn reregistering_keeps_open_count() {
        let mut table = SharedHandleTable::new();
        table.register(1, 10);
        let _ = table.open(1);
        table.register(1, 11);
        assert_eq!(table.open_count(1), 1);
        assert_eq!(table.open(1), Ok(11));
    }
}
