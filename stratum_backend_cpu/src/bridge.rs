// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Producer-side plumbing: a thread-safe async image registry and a
//! de-allocator that hands released descriptors back to producers.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hashbrown::HashMap;
use stratum_core::image::SharedImage;
use stratum_core::producer::{
    AsyncContainerId, AsyncFrame, AsyncImageRegistry, SurfaceDeallocator,
};

#[derive(Debug, Default)]
struct Slot {
    image: Option<SharedImage>,
    /// `image` was published and no buffered consumer has taken it yet.
    fresh: bool,
    version: u32,
}

#[derive(Debug, Default)]
struct Container {
    version: AtomicU32,
    slot: Mutex<Slot>,
    compositor_id: AtomicU64,
}

/// Async image containers shared between producer threads and the
/// rendering thread.
///
/// Producers [`publish`](Self::publish) from any thread; the compositor
/// polls through [`AsyncImageRegistry`]. The image is stored and the
/// version bumped with release ordering under one lock, and the version is
/// read with acquire ordering, so a changed version always comes with its
/// image.
///
/// Each container holds one descriptor at a time. A buffered compositor
/// that takes the published image leaves its previous one in the slot, and
/// the next [`publish`](Self::publish) hands that back to the producer.
#[derive(Debug, Default)]
pub struct ImageBridge {
    containers: Mutex<HashMap<AsyncContainerId, Arc<Container>>>,
    next_id: AtomicU64,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // Every write is a single store, so a poisoned lock still holds a whole value.
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ImageBridge {
    /// Creates a bridge with no containers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty container.
    pub fn create_container(&self) -> AsyncContainerId {
        let id = AsyncContainerId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        lock(&self.containers).insert(id, Arc::new(Container::default()));
        id
    }

    /// Removes a container, returning its last image.
    pub fn remove_container(&self, id: AsyncContainerId) -> Option<SharedImage> {
        let container = lock(&self.containers).remove(&id)?;
        lock(&container.slot).image.take()
    }

    fn container(&self, id: AsyncContainerId) -> Option<Arc<Container>> {
        lock(&self.containers).get(&id).cloned()
    }

    /// Makes `image` the container's current image and bumps its version.
    ///
    /// Returns the descriptor the container held so the producer can
    /// recycle it: a frame nobody took, or one a buffered compositor handed
    /// back. Hands `image` straight back if the container does not exist.
    pub fn publish(&self, id: AsyncContainerId, image: SharedImage) -> Option<SharedImage> {
        let Some(container) = self.container(id) else {
            tracing::warn!(?id, "publish to unknown container");
            return Some(image);
        };
        let mut slot = lock(&container.slot);
        let previous = slot.image.replace(image);
        slot.fresh = true;
        slot.version = container.version.fetch_add(1, Ordering::Release).wrapping_add(1);
        previous
    }

    /// Withdraws the current image; consumers skip the container until the
    /// next publish.
    pub fn clear(&self, id: AsyncContainerId) -> Option<SharedImage> {
        let container = self.container(id)?;
        let mut slot = lock(&container.slot);
        let previous = slot.image.take();
        slot.fresh = false;
        slot.version = container.version.fetch_add(1, Ordering::Release).wrapping_add(1);
        previous
    }

    /// The compositor bound to the container, if any.
    #[must_use]
    pub fn compositor_id(&self, id: AsyncContainerId) -> Option<u64> {
        let bound = self.container(id)?.compositor_id.load(Ordering::Relaxed);
        (bound != 0).then_some(bound)
    }
}

impl AsyncImageRegistry for ImageBridge {
    fn version(&self, id: AsyncContainerId) -> u32 {
        self.container(id)
            .map_or(0, |c| c.version.load(Ordering::Acquire))
    }

    fn image(&self, id: AsyncContainerId) -> Option<AsyncFrame> {
        let container = self.container(id)?;
        let slot = lock(&container.slot);
        if !slot.fresh {
            return None;
        }
        Some(AsyncFrame {
            image: slot.image.clone()?,
            version: slot.version,
        })
    }

    fn swap_image(
        &self,
        id: AsyncContainerId,
        previous: SharedImage,
    ) -> Result<AsyncFrame, SharedImage> {
        let Some(container) = self.container(id) else {
            return Err(previous);
        };
        let mut slot = lock(&container.slot);
        if !slot.fresh {
            return Err(previous);
        }
        let Some(image) = slot.image.take() else {
            return Err(previous);
        };
        slot.image = (!previous.is_null()).then_some(previous);
        slot.fresh = false;
        Ok(AsyncFrame {
            image,
            version: slot.version,
        })
    }

    fn bind_compositor_id(&self, id: AsyncContainerId, compositor_id: u64) {
        if let Some(c) = self.container(id) {
            c.compositor_id.store(compositor_id, Ordering::Relaxed);
        }
    }
}

/// De-allocator that sends released descriptors over a channel.
///
/// Created by [`return_channel`]; the producer drains the paired receiver
/// and frees or recycles what arrives. Empty descriptors are not sent.
#[derive(Debug)]
pub struct ReturnChannel {
    tx: Sender<SharedImage>,
}

/// Creates a [`ReturnChannel`] and the receiver producers drain.
#[must_use]
pub fn return_channel() -> (ReturnChannel, Receiver<SharedImage>) {
    let (tx, rx) = mpsc::channel();
    (ReturnChannel { tx }, rx)
}

impl SurfaceDeallocator for ReturnChannel {
    fn destroy_shared_surface(&self, image: SharedImage) {
        if image.is_null() {
            return;
        }
        if self.tx.send(image).is_err() {
            tracing::debug!("producer hung up; released descriptor dropped");
        }
    }
}
