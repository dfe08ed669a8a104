use std::{
  alloc::Layout,
  marker::PhantomData,
  ops::{Deref, DerefMut},
  ptr::{self, NonNull},
};

use tracing::debug;

use crate::{
  align::{DEFAULT_ARENA_ALIGNMENT, align_forward, check_alignment},
  error::{AllocError, Result},
};

/// Linear (bump) allocator over a caller-owned buffer.
///
/// ```text
///   data                prev_offset     cur_offset          total_size
///   │                   │               │                   │
///   ▼                   ▼               ▼                   ▼
///   ┌─────┬──┬─────────┬───────────────┬───────────────────┐
///   │ A1  │▒▒│   A2    │      A3       │    free space     │
///   └─────┴──┴─────────┴───────────────┴───────────────────┘
///          ▲
///          └── alignment padding
/// ```
///
/// Every allocation bumps `cur_offset` forward. Only the most recent one
/// (the one starting at `prev_offset`) can be grown or shrunk in place.
/// Individual frees are no-ops; [`Arena::clear`] reclaims everything.
///
/// The arena borrows its backing buffer for `'buf` and never frees it.
/// Pointers it hands out are raw: reading or writing through them after
/// [`Arena::clear`] or after a [`TempArena`] rewind is the caller's bug.
pub struct Arena<'buf> {
  data: NonNull<u8>,
  total_size: usize,
  prev_offset: usize,
  cur_offset: usize,
  _buf: PhantomData<&'buf mut [u8]>,
}

impl<'buf> Arena<'buf> {
  pub fn new(buf: &'buf mut [u8]) -> Self {
    let total_size = buf.len();
    debug!(total_size, "arena initialized");

    Self {
      data: NonNull::from(buf).cast::<u8>(),
      total_size,
      prev_offset: 0,
      cur_offset: 0,
      _buf: PhantomData,
    }
  }

  /// Allocates `size` bytes aligned to [`DEFAULT_ARENA_ALIGNMENT`].
  pub fn alloc(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>> {
    self.alloc_align(size, DEFAULT_ARENA_ALIGNMENT)
  }

  /// Allocates `size` bytes at an address that is a multiple of
  /// `alignment`.
  ///
  /// Fails with [`AllocError::OutOfSpace`] without touching the offsets if
  /// the aligned block does not fit.
  pub fn alloc_align(
    &mut self,
    size: usize,
    alignment: usize,
  ) -> Result<NonNull<u8>> {
    let base = self.base();
    let aligned = align_forward(base + self.cur_offset, alignment)?;
    let offset = aligned - base;

    let end = offset
      .checked_add(size)
      .ok_or(AllocError::CapacityOverflow)?;

    if end > self.total_size {
      return Err(AllocError::OutOfSpace {
        requested: end - self.cur_offset,
        available: self.remaining(),
      });
    }

    self.prev_offset = offset;
    self.cur_offset = end;

    // SAFETY: `offset <= end <= total_size`, so the pointer stays within
    // (or one past the end of) the backing buffer.
    Ok(unsafe { NonNull::new_unchecked(self.data.as_ptr().add(offset)) })
  }

  pub fn alloc_layout(
    &mut self,
    layout: Layout,
  ) -> Result<NonNull<u8>> {
    self.alloc_align(layout.size(), layout.align())
  }

  /// Copies `bytes` into a fresh allocation.
  pub fn alloc_copy(
    &mut self,
    bytes: &[u8],
  ) -> Result<NonNull<u8>> {
    let ptr = self.alloc(bytes.len())?;
    // SAFETY: the allocation is `bytes.len()` bytes; `bytes` is a shared
    // borrow and cannot overlap memory we just reserved.
    unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr(), bytes.len()) };
    Ok(ptr)
  }

  /// [`Arena::resize_align`] with the default alignment.
  pub fn resize(
    &mut self,
    mem: Option<NonNull<u8>>,
    old_size: usize,
    new_size: usize,
  ) -> Result<NonNull<u8>> {
    self.resize_align(mem, old_size, new_size, DEFAULT_ARENA_ALIGNMENT)
  }

  /// Resizes a block previously returned by this arena.
  ///
  /// * `None` or `old_size == 0` behaves like [`Arena::alloc_align`].
  /// * The most recent allocation is resized in place and keeps its
  ///   address.
  /// * Any other block of this arena is moved to a new allocation and the
  ///   first `min(old_size, new_size)` bytes are copied over.
  /// * A pointer outside the arena is rejected with
  ///   [`AllocError::ForeignPointer`].
  pub fn resize_align(
    &mut self,
    mem: Option<NonNull<u8>>,
    old_size: usize,
    new_size: usize,
    alignment: usize,
  ) -> Result<NonNull<u8>> {
    check_alignment(alignment)?;

    let old = match mem {
      Some(old) if old_size != 0 => old,
      _ => return self.alloc_align(new_size, alignment),
    };

    if !self.contains(old.as_ptr()) {
      return Err(AllocError::ForeignPointer {
        addr: old.as_ptr() as usize,
      });
    }

    let old_offset = old.as_ptr() as usize - self.base();
    // Only the address of `old` is trusted; accesses go through our own base.
    // SAFETY: `contains` put `old_offset` inside the buffer.
    let old = unsafe { NonNull::new_unchecked(self.data.as_ptr().add(old_offset)) };

    if old_offset == self.prev_offset {
      let end = self
        .prev_offset
        .checked_add(new_size)
        .ok_or(AllocError::CapacityOverflow)?;

      if end > self.total_size {
        return Err(AllocError::OutOfSpace {
          requested: new_size,
          available: self.total_size - self.prev_offset,
        });
      }

      self.cur_offset = end;
      return Ok(old);
    }

    let new = self.alloc_align(new_size, alignment)?;
    let copy_size = old_size
      .min(new_size)
      .min(self.total_size - old_offset);

    // SAFETY: both ranges lie inside the backing buffer. `ptr::copy`
    // tolerates overlap.
    unsafe { ptr::copy(old.as_ptr(), new.as_ptr(), copy_size) };

    Ok(new)
  }

  /// Does nothing: a bump allocator cannot free individual blocks.
  pub fn free(
    &mut self,
    _ptr: *mut u8,
  ) {
  }

  /// Resets both offsets, invalidating every allocation.
  pub fn clear(&mut self) {
    self.prev_offset = 0;
    self.cur_offset = 0;
  }

  /// Starts a scratch scope that rewinds the arena when it ends.
  pub fn begin_temp(&mut self) -> TempArena<'_, 'buf> {
    TempArena::begin(self)
  }

  pub fn total_size(&self) -> usize {
    self.total_size
  }

  /// Current bump offset.
  pub fn offset(&self) -> usize {
    self.cur_offset
  }

  /// Offset of the most recent allocation.
  pub fn prev_offset(&self) -> usize {
    self.prev_offset
  }

  pub fn remaining(&self) -> usize {
    self.total_size - self.cur_offset
  }

  /// Returns `true` if `ptr` points into the backing buffer.
  pub fn contains(
    &self,
    ptr: *const u8,
  ) -> bool {
    let addr = ptr as usize;
    addr >= self.base() && addr < self.base() + self.total_size
  }

  #[inline]
  fn base(&self) -> usize {
    self.data.as_ptr() as usize
  }
}

/// A saved pair of arena offsets that is restored when the scope ends.
///
/// Ending the scope (explicitly with [`TempArena::end`] or by dropping it)
/// rewinds the arena to exactly the offsets it had at
/// [`TempArena::begin`], no matter how many allocations happened in
/// between. The guard dereferences to the arena, so scratch allocations
/// and nested scopes go through it:
///
/// ```rust
/// use memkit::Arena;
///
/// let mut buf = [0u8; 256];
/// let mut arena = Arena::new(&mut buf);
/// arena.alloc(16).unwrap();
///
/// let before = arena.offset();
/// {
///   let mut scratch = arena.begin_temp();
///   scratch.alloc(64).unwrap();
///   let mut inner = scratch.begin_temp();
///   inner.alloc(32).unwrap();
/// }
/// assert_eq!(arena.offset(), before);
/// ```
///
/// Since a nested scope borrows its parent, scopes always end in reverse
/// order of creation.
pub struct TempArena<'a, 'buf> {
  arena: &'a mut Arena<'buf>,
  prev_offset: usize,
  cur_offset: usize,
}

impl<'a, 'buf> TempArena<'a, 'buf> {
  pub fn begin(arena: &'a mut Arena<'buf>) -> Self {
    Self {
      prev_offset: arena.prev_offset,
      cur_offset: arena.cur_offset,
      arena,
    }
  }

  /// Ends the scope. Same as dropping the guard.
  pub fn end(self) {}
}

impl Drop for TempArena<'_, '_> {
  fn drop(&mut self) {
    self.arena.prev_offset = self.prev_offset;
    self.arena.cur_offset = self.cur_offset;
  }
}

impl<'buf> Deref for TempArena<'_, 'buf> {
  type Target = Arena<'buf>;

  fn deref(&self) -> &Arena<'buf> {
    self.arena
  }
}

impl<'buf> DerefMut for TempArena<'_, 'buf> {
  fn deref_mut(&mut self) -> &mut Arena<'buf> {
    self.arena
  }
}
