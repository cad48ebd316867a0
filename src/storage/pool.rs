//! # Clock Replacement Pool
//!
//! A fixed array of buffer frames recycled with the classic clock (second
//! chance) policy. Each frame carries a reference bit that accesses set; the
//! sweep hand clears reference bits as it passes and selects the first
//! unpinned frame whose bit is already clear. The sweep gives up after two
//! full revolutions, which is only possible when every frame is pinned.
//!
//! ## Locking
//!
//! The address map and the clock hand live under one `RwLock`: `allocate`
//! takes the write half, `get` and `visit` the read half. Reference bits and
//! pin counts are atomics, so marking an access under the shared lock is
//! fine.
//!
//! Frames returned by `get`/`allocate` are pinned before the pool lock is
//! released, so the clock cannot steal a frame between lookup and use.
//! Callers wrap the frame in a `PageGuard` which unpins on drop.

use std::sync::Arc;

use eyre::{bail, ensure, Result};
use hashbrown::HashMap;
use parking_lot::RwLock;

use super::frame::BufferFrame;

#[derive(Debug)]
struct PoolInner {
    addresses: HashMap<u32, usize>,
    hand: usize,
}

#[derive(Debug)]
pub struct ClockPool {
    frames: Vec<Arc<BufferFrame>>,
    inner: RwLock<PoolInner>,
}

impl ClockPool {
    pub fn new(capacity: usize) -> Self {
        let frames = (0..capacity.max(1))
            .map(|_| Arc::new(BufferFrame::new()))
            .collect();
        Self {
            frames,
            inner: RwLock::new(PoolInner {
                addresses: HashMap::with_capacity(capacity),
                hand: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.frames.len()
    }

    /// Looks up a resident page. On a hit the frame is pinned and its
    /// reference bit set.
    pub fn get(&self, id: u32) -> Option<Arc<BufferFrame>> {
        let inner = self.inner.read();
        let &index = inner.addresses.get(&id)?;
        let frame = &self.frames[index];
        frame.pin();
        Some(Arc::clone(frame))
    }

    /// Binds a frame to `id`, evicting a victim if needed. The victim's
    /// dirty content is flushed through `flush` before the frame is zeroed
    /// and rebound. The returned frame is pinned.
    pub fn allocate<F>(&self, id: u32, flush: F) -> Result<Arc<BufferFrame>>
    where
        F: FnOnce(u32, &[u8]) -> Result<()>,
    {
        let mut inner = self.inner.write();
        ensure!(
            !inner.addresses.contains_key(&id),
            "page {} is already resident",
            id
        );

        let victim_index = self.sweep(&mut inner)?;
        let victim = &self.frames[victim_index];

        // Uninitialized frames were never mapped; removing by their zero id
        // here could evict an unrelated page bound to id 0.
        if victim.is_initialized() {
            inner.addresses.remove(&victim.id());
        }

        victim.bind(id, flush)?;
        victim.pin();
        inner.addresses.insert(id, victim_index);
        Ok(Arc::clone(victim))
    }

    /// Visits every resident frame in no particular order.
    pub fn visit<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&BufferFrame) -> Result<()>,
    {
        let inner = self.inner.read();
        for &index in inner.addresses.values() {
            f(&self.frames[index])?;
        }
        Ok(())
    }

    fn sweep(&self, inner: &mut PoolInner) -> Result<usize> {
        for _ in 0..self.frames.len() * 2 {
            let index = inner.hand;
            inner.hand = (inner.hand + 1) % self.frames.len();

            let frame = &self.frames[index];
            if frame.is_pinned() {
                continue;
            }
            if frame.is_referenced() {
                frame.clear_referenced();
                continue;
            }
            return Ok(index);
        }

        bail!(
            "unable to evict any page, all {} frames are pinned",
            self.frames.len()
        )
    }
}
