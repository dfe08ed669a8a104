//! Error type shared by every allocator in the crate.
//!
//! Running out of space is an expected outcome and callers are supposed to
//! handle it. The remaining variants describe contract violations (bad
//! alignment, foreign pointers, out-of-range indices) and are reported
//! instead of aborting.

use thiserror::Error;

/// Errors returned by the allocators and containers in this crate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
  /// The arena has no room left for the request.
  #[error("arena out of space: requested {requested} bytes, {available} bytes available")]
  OutOfSpace {
    /// Bytes requested, including alignment padding.
    requested: usize,
    /// Bytes left between the bump pointer and the end of the buffer.
    available: usize,
  },

  /// Every chunk of the pool is handed out.
  #[error("pool out of chunks: all {chunk_count} chunks are in use")]
  OutOfChunks {
    /// Total number of chunks in the pool.
    chunk_count: usize,
  },

  /// Alignment was zero or not a power of two.
  #[error("alignment {alignment} is not a power of two")]
  InvalidAlignment {
    /// The rejected alignment.
    alignment: usize,
  },

  /// The pointer does not belong to this allocator's backing buffer.
  #[error("pointer {addr:#x} is outside the allocator's backing buffer")]
  ForeignPointer {
    /// Address of the offending pointer.
    addr: usize,
  },

  /// The pointer lies inside the pool but not on a chunk boundary.
  #[error("pointer {addr:#x} is not on a {chunk_size}-byte chunk boundary")]
  MisalignedChunk {
    /// Address of the offending pointer.
    addr: usize,
    /// The pool's chunk size.
    chunk_size: usize,
  },

  /// A chunk was freed while every chunk of the pool was already free.
  #[error("pointer {addr:#x} freed into a pool with no chunks in use")]
  PoolFull {
    /// Address of the offending pointer.
    addr: usize,
  },

  /// Index outside the valid range of a sequence.
  #[error("index {index} out of bounds for length {len}")]
  IndexOutOfBounds {
    /// The rejected index.
    index: usize,
    /// Length of the sequence at the time of the call.
    len: usize,
  },

  /// A size computation overflowed `usize`.
  #[error("capacity overflow")]
  CapacityOverflow,

  /// The system allocator returned null.
  #[error("failed to allocate {bytes} bytes")]
  AllocFailed {
    /// Size of the failed request.
    bytes: usize,
  },

  /// Pool chunks must be able to hold a free-list node.
  #[error("chunk size {chunk_size} is smaller than the {min}-byte free-list node")]
  ChunkTooSmall {
    /// Chunk size after alignment rounding.
    chunk_size: usize,
    /// Minimum chunk size.
    min: usize,
  },

  /// The pool's buffer cannot hold a single chunk.
  #[error("chunk size {chunk_size} exceeds the {usable} usable bytes of the pool")]
  PoolTooSmall {
    /// Chunk size after alignment rounding.
    chunk_size: usize,
    /// Usable bytes after aligning the buffer start.
    usable: usize,
  },

  /// A tracked heap was asked to release memory it never handed out.
  #[error("pointer {addr:#x} is not an active tracked allocation")]
  UntrackedPointer {
    /// Address of the offending pointer.
    addr: usize,
  },

  /// Tracker configuration failed validation.
  #[error("invalid tracker configuration: {reason}")]
  InvalidConfig {
    /// What was wrong with it.
    reason: String,
  },
}

/// Result alias used throughout the crate.
pub type Result<T, E = AllocError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_display_messages() {
    let err = AllocError::OutOfSpace {
      requested: 64,
      available: 12,
    };
    assert_eq!(
      err.to_string(),
      "arena out of space: requested 64 bytes, 12 bytes available"
    );

    let err = AllocError::ForeignPointer { addr: 0x1000 };
    assert_eq!(
      err.to_string(),
      "pointer 0x1000 is outside the allocator's backing buffer"
    );

    let err = AllocError::IndexOutOfBounds { index: 5, len: 3 };
    assert_eq!(err.to_string(), "index 5 out of bounds for length 3");
  }
}
