//! Caller-visible errors.

use thiserror::Error;

use crate::store::ParticleArray;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("grid size must be at least 1 on every axis, got {x}x{y}x{z}")]
    InvalidGridSize { x: u32, y: u32, z: u32 },

    #[error("failed to allocate {what} buffer of {len} elements")]
    Allocation { what: &'static str, len: usize },

    #[error("{which:?} range [{start}, {start}+{count}) exceeds {len} particles")]
    OutOfRange {
        which: ParticleArray,
        start: usize,
        count: usize,
        len: usize,
    },

    #[error("expected {expected} values ({count} particles x 3), got {actual}")]
    DataLength {
        count: usize,
        expected: usize,
        actual: usize,
    },

    #[error("lattice holds {capacity} particles but {requested} were requested")]
    LatticeCapacity { capacity: usize, requested: usize },

    #[error("particle system has not been reset yet")]
    NotReady,

    #[error("failed to access parameter file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse parameters: {0}")]
    Json(#[from] serde_json::Error),
}

/// Allocate a buffer of `len` copies of `value`, reporting failure instead of aborting.
pub(crate) fn alloc_filled<T: Clone>(
    what: &'static str,
    len: usize,
    value: T,
) -> Result<Vec<T>, SimError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| SimError::Allocation { what, len })?;
    buf.resize(len, value);
    Ok(buf)
}
