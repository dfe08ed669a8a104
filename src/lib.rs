//! # memkit - Low-Level Memory Primitives
//!
//! This crate provides a handful of building blocks for programs that want
//! control over where their memory comes from:
//!
//! - [`DynArray`]: a growable array that owns its heap block
//! - [`Arena`]: a bump allocator over a caller-supplied buffer, with
//!   [`TempArena`] scopes for scratch work
//! - [`Pool`]: a fixed-size chunk allocator with an intrusive free list
//! - [`TrackedHeap`] / [`AllocTable`]: a debug tracker that records every
//!   live heap allocation for leak and usage reports
//!
//! ## Crate Structure
//!
//! ```text
//!   memkit
//!   ├── align      - Alignment helpers (align_forward, align_to!)
//!   ├── size       - kib/mib/gib and human-readable byte counts
//!   ├── error      - AllocError
//!   ├── array      - DynArray<T>
//!   ├── arena      - Arena, TempArena
//!   ├── pool       - Pool
//!   └── tracker    - AllocTable, TrackedHeap, reports
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use memkit::{Arena, Pool};
//!
//! let mut backing = [0u8; 1024];
//! let mut arena = Arena::new(&mut backing);
//!
//! let x = arena.alloc(std::mem::size_of::<u64>()).unwrap().cast::<u64>();
//! unsafe { x.as_ptr().write(42) };
//!
//! {
//!   // Everything allocated in this scope is rewound at its end.
//!   let mut scratch = arena.begin_temp();
//!   scratch.alloc(512).unwrap();
//! }
//! assert!(arena.remaining() > 512);
//!
//! let mut chunks = [0u8; 1024];
//! let mut pool = Pool::new(&mut chunks, 64).unwrap();
//! let a = pool.alloc().unwrap();
//! pool.free(a.as_ptr()).unwrap();
//! assert_eq!(pool.alloc().unwrap(), a);
//! ```
//!
//! ## How It Works
//!
//! Both allocators are views over memory they do not own:
//!
//! ```text
//!   Arena:
//!   ┌─────┬─────┬─────┬─────────────────────────────────────────┐
//!   │ A1  │ A2  │ A3  │              free space                 │
//!   └─────┴─────┴─────┴─────────────────────────────────────────┘
//!               ▲     ▲
//!               │     └── cur_offset (next allocation)
//!               └──────── prev_offset (resizable in place)
//!
//!   Pool:
//!   ┌───────┬───────┬───────┬───────┬───────┬───────┐
//!   │ used  │ free  │ used  │ free  │ free  │ used  │
//!   └───────┴───┬───┴───────┴───▲───┴──┬─▲──┴───────┘
//!     head ─────┼───────────────┘      │ │
//!               └──────────────────────┼─┘ ...
//! ```
//!
//! The arena never frees single blocks; clearing it or ending a
//! [`TempArena`] rewinds the offsets. The pool threads its free list
//! through the free chunks themselves, so it needs no memory of its own.
//!
//! The tracker is an open-addressed hash table keyed by address. Each live
//! block has one active record holding its size and allocation number;
//! released blocks leave tombstones until the next rehash.
//!
//! ## Errors
//!
//! Every fallible operation returns [`Result`]. Running out of space is a
//! normal outcome the caller handles; contract violations (bad alignment,
//! out-of-range index, foreign pointer) are reported the same way instead
//! of aborting.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: no internal synchronization
//! - **No use-after-clear detection**: arena and pool pointers are raw
//! - **Limited double-free detection in pools**: only a free into a pool
//!   with no chunks in use is rejected; otherwise a chunk freed twice
//!   corrupts the free list
//! - **Unix-only tracked heap**: [`TrackedHeap`] calls the C allocator
//!   through `libc`
//!
//! ## Safety
//!
//! Allocating is safe. Reading or writing through the returned pointers is
//! not, and stays valid only as long as the allocator has not reclaimed
//! the block.

pub mod align;
pub mod arena;
pub mod array;
pub mod error;
pub mod pool;
pub mod size;
pub mod tracker;

pub use arena::{Arena, TempArena};
pub use array::DynArray;
pub use error::{AllocError, Result};
pub use pool::Pool;
pub use tracker::{AllocTable, TableConfig, TrackedHeap};
