//! Particle state storage.
//!
//! Positions and velocities live in two representations:
//!
//! - the **primary** struct-of-arrays buffers (`Vec<DVec3>`) every phase
//!   computes on, and
//! - a **host** cache of flat `f64` triples handed to callers.
//!
//! The two are synchronized explicitly: [`ParticleStore::pull`] refreshes
//! the host copy from the primary buffers, [`ParticleStore::push`] uploads
//! caller writes back into them. Callers never write the primary buffers
//! directly.

use std::ops::Range;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::error::{alloc_filled, SimError};

/// Which per-particle array an accessor refers to.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum ParticleArray {
    Position,
    Velocity,
}

/// Synchronization state of one array's host cache.
#[derive(Clone, Debug, Default)]
struct HostSync {
    /// Primary buffer changed since the last pull
    stale: bool,
    /// Host range written by the caller but not yet pushed
    dirty: Option<Range<usize>>,
}

impl HostSync {
    fn mark_dirty(&mut self, range: Range<usize>) {
        self.dirty = Some(match self.dirty.take() {
            Some(prev) => prev.start.min(range.start)..prev.end.max(range.end),
            None => range,
        });
    }
}

/// Fixed-size particle buffers.
pub struct ParticleStore {
    len: usize,
    positions: Vec<DVec3>,
    velocities: Vec<DVec3>,
    host_positions: Vec<f64>,
    host_velocities: Vec<f64>,
    position_sync: HostSync,
    velocity_sync: HostSync,
}

impl ParticleStore {
    /// Allocate zeroed buffers for `len` particles.
    pub fn new(len: usize) -> Result<Self, SimError> {
        let flat = len
            .checked_mul(3)
            .ok_or(SimError::Allocation { what: "host cache", len })?;
        Ok(Self {
            len,
            positions: alloc_filled("position", len, DVec3::ZERO)?,
            velocities: alloc_filled("velocity", len, DVec3::ZERO)?,
            host_positions: alloc_filled("host position", flat, 0.0)?,
            host_velocities: alloc_filled("host velocity", flat, 0.0)?,
            position_sync: HostSync::default(),
            velocity_sync: HostSync::default(),
        })
    }

    /// Number of particles.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn positions(&self) -> &[DVec3] {
        &self.positions
    }

    pub fn velocities(&self) -> &[DVec3] {
        &self.velocities
    }

    /// Mutable access to both primary buffers for the integrate phase.
    ///
    /// Marks both host caches stale.
    pub fn primary_mut(&mut self) -> (&mut [DVec3], &mut [DVec3]) {
        self.position_sync.stale = true;
        self.velocity_sync.stale = true;
        (&mut self.positions, &mut self.velocities)
    }

    /// Replace every particle's state from the primary side (used by reset).
    ///
    /// Pending host writes are discarded.
    pub fn overwrite(&mut self, positions: &[DVec3], velocities: &[DVec3]) {
        debug_assert_eq!(positions.len(), self.len);
        debug_assert_eq!(velocities.len(), self.len);
        self.positions.copy_from_slice(positions);
        self.velocities.copy_from_slice(velocities);
        self.position_sync = HostSync { stale: true, dirty: None };
        self.velocity_sync = HostSync { stale: true, dirty: None };
    }

    /// Refresh the host cache of `which` if the primary buffer moved on.
    pub fn pull(&mut self, which: ParticleArray) {
        // Unpushed writes must reach the primary store first, or the pull
        // would overwrite them.
        self.push(which);
        let (primary, host, sync) = self.parts_mut(which);
        if !sync.stale {
            return;
        }
        for (dst, v) in host.chunks_exact_mut(3).zip(primary.iter()) {
            dst.copy_from_slice(&v.to_array());
        }
        sync.stale = false;
    }

    /// Upload caller writes of `which` into the primary buffer.
    pub fn push(&mut self, which: ParticleArray) {
        let (primary, host, sync) = self.parts_mut(which);
        let Some(range) = sync.dirty.take() else {
            return;
        };
        for i in range {
            primary[i] = DVec3::new(host[i * 3], host[i * 3 + 1], host[i * 3 + 2]);
        }
    }

    /// Upload pending writes of both arrays.
    pub fn push_all(&mut self) {
        self.push(ParticleArray::Position);
        self.push(ParticleArray::Velocity);
    }

    /// Current snapshot of `which` as flat xyz triples.
    pub fn read(&mut self, which: ParticleArray) -> &[f64] {
        self.pull(which);
        match which {
            ParticleArray::Position => &self.host_positions,
            ParticleArray::Velocity => &self.host_velocities,
        }
    }

    /// Overwrite particles `[start, start + count)` of `which` from flat xyz triples.
    ///
    /// The write lands in the host cache and reaches the primary buffer on
    /// the next [`push`](Self::push).
    pub fn write(
        &mut self,
        which: ParticleArray,
        data: &[f64],
        start: usize,
        count: usize,
    ) -> Result<(), SimError> {
        let end = start
            .checked_add(count)
            .filter(|&end| end <= self.len)
            .ok_or(SimError::OutOfRange {
                which,
                start,
                count,
                len: self.len,
            })?;
        if data.len() != count * 3 {
            return Err(SimError::DataLength {
                count,
                expected: count * 3,
                actual: data.len(),
            });
        }
        if count == 0 {
            return Ok(());
        }

        // Make the untouched part of the host cache current before it can
        // be pushed alongside the new data.
        self.pull(which);
        let (_, host, sync) = self.parts_mut(which);
        host[start * 3..end * 3].copy_from_slice(data);
        sync.mark_dirty(start..end);
        Ok(())
    }

    /// True if `which` has host writes waiting for a push.
    pub fn has_pending_writes(&self, which: ParticleArray) -> bool {
        match which {
            ParticleArray::Position => self.position_sync.dirty.is_some(),
            ParticleArray::Velocity => self.velocity_sync.dirty.is_some(),
        }
    }

    fn parts_mut(&mut self, which: ParticleArray) -> (&mut [DVec3], &mut [f64], &mut HostSync) {
        match which {
            ParticleArray::Position => (
                &mut self.positions,
                &mut self.host_positions,
                &mut self.position_sync,
            ),
            ParticleArray::Velocity => (
                &mut self.velocities,
                &mut self.host_velocities,
                &mut self.velocity_sync,
            ),
        }
    }
}
