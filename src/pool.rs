use std::{
  marker::PhantomData,
  mem,
  ptr::NonNull,
};

use tracing::debug;

use crate::{
  align::{DEFAULT_POOL_ALIGNMENT, align_forward, check_alignment},
  error::{AllocError, Result},
};

/// Free-list link stored inside every free chunk.
///
/// Chunks may be aligned to less than a pointer, so the link is always
/// accessed with unaligned reads and writes.
#[derive(Clone, Copy)]
#[repr(C)]
struct FreeNode {
  next: Option<NonNull<FreeNode>>,
}

/// Fixed-size chunk allocator over a caller-owned buffer.
///
/// ```text
///   head ─────┐
///             ▼
///   ┌────────┬────────┬────────┬────────┬────────┐
///   │ in use │ free ──┼──┐     │ in use │ free ──┼──► None
///   └────────┴────────┴──┼─────┴────────┴────────┘
///                        │         ▲
///                        └─────────┘ (free chunks link to each other)
/// ```
///
/// Allocation pops the head of the free list and freeing pushes onto it,
/// so the most recently freed chunk is the next one handed out.
///
/// Freeing a chunk while every chunk is already free is rejected with
/// [`AllocError::PoolFull`]. Any other double free is not detected and
/// corrupts the free list, though the free count still bounds how many
/// chunks [`Pool::alloc`] hands out.
pub struct Pool<'buf> {
  data: NonNull<u8>,
  total_size: usize,
  chunk_size: usize,
  chunk_count: usize,
  free_count: usize,
  head: Option<NonNull<FreeNode>>,
  _buf: PhantomData<&'buf mut [u8]>,
}

impl<'buf> Pool<'buf> {
  /// Creates a pool of `chunk_size` chunks aligned to
  /// [`DEFAULT_POOL_ALIGNMENT`].
  pub fn new(
    buf: &'buf mut [u8],
    chunk_size: usize,
  ) -> Result<Self> {
    Self::with_alignment(buf, chunk_size, DEFAULT_POOL_ALIGNMENT)
  }

  /// Creates a pool whose chunks start on `chunk_alignment` boundaries.
  ///
  /// The start of `buf` is pushed forward to the alignment (the skipped
  /// bytes are lost) and `chunk_size` is rounded up to a multiple of it.
  /// Every chunk starts out free.
  pub fn with_alignment(
    buf: &'buf mut [u8],
    chunk_size: usize,
    chunk_alignment: usize,
  ) -> Result<Self> {
    check_alignment(chunk_alignment)?;

    let start = buf.as_mut_ptr() as usize;
    let padding = align_forward(start, chunk_alignment)? - start;
    let usable = buf.len().saturating_sub(padding);

    let chunk_size = align_forward(chunk_size, chunk_alignment)?;
    let min = mem::size_of::<FreeNode>();

    if chunk_size < min {
      return Err(AllocError::ChunkTooSmall { chunk_size, min });
    }
    if chunk_size > usable {
      return Err(AllocError::PoolTooSmall { chunk_size, usable });
    }

    // SAFETY: `padding < buf.len()` since at least one chunk fits after it.
    let data = unsafe { NonNull::new_unchecked(buf.as_mut_ptr().add(padding)) };

    let mut pool = Self {
      data,
      total_size: usable,
      chunk_size,
      chunk_count: usable / chunk_size,
      free_count: 0,
      head: None,
      _buf: PhantomData,
    };
    pool.clear();

    debug!(
      chunk_size,
      chunk_count = pool.chunk_count,
      "pool initialized"
    );

    Ok(pool)
  }

  /// Hands out a free chunk.
  ///
  /// Fails with [`AllocError::OutOfChunks`] when every chunk is in use.
  pub fn alloc(&mut self) -> Result<NonNull<u8>> {
    let out_of_chunks = AllocError::OutOfChunks {
      chunk_count: self.chunk_count,
    };
    if self.free_count == 0 {
      return Err(out_of_chunks);
    }
    let node = self.head.ok_or(out_of_chunks)?;

    // SAFETY: every node on the free list is a chunk of this pool holding
    // a link written by `push`.
    let next = unsafe { node.as_ptr().read_unaligned() }.next;
    self.head = next;
    self.free_count -= 1;

    Ok(node.cast())
  }

  /// Returns a chunk to the pool. A null pointer is ignored.
  pub fn free(
    &mut self,
    ptr: *mut u8,
  ) -> Result<()> {
    let Some(chunk) = NonNull::new(ptr) else {
      return Ok(());
    };

    let addr = chunk.as_ptr() as usize;
    if !self.contains(chunk.as_ptr()) {
      return Err(AllocError::ForeignPointer { addr });
    }
    let offset = addr - self.base();
    if offset % self.chunk_size != 0 {
      return Err(AllocError::MisalignedChunk {
        addr,
        chunk_size: self.chunk_size,
      });
    }
    if self.free_count == self.chunk_count {
      return Err(AllocError::PoolFull { addr });
    }

    // Only the address of `ptr` is trusted; the link is written through our
    // own base pointer.
    // SAFETY: `offset` is the start of one of our chunks.
    unsafe {
      let chunk = NonNull::new_unchecked(self.data.as_ptr().add(offset));
      self.push(chunk.cast());
    }

    Ok(())
  }

  /// Marks every chunk as free again, whatever the caller still holds.
  pub fn clear(&mut self) {
    self.head = None;
    self.free_count = 0;

    // Pushed back to front so the first allocations come out in address
    // order.
    for i in (0..self.chunk_count).rev() {
      // SAFETY: `i * chunk_size + chunk_size <= total_size`.
      unsafe {
        let chunk = self.data.as_ptr().add(i * self.chunk_size);
        self.push(NonNull::new_unchecked(chunk).cast());
      }
    }
  }

  pub fn chunk_size(&self) -> usize {
    self.chunk_size
  }

  /// Number of chunks carved out of the buffer.
  pub fn chunk_count(&self) -> usize {
    self.chunk_count
  }

  /// Number of chunks on the free list.
  pub fn free_count(&self) -> usize {
    self.free_count
  }

  /// Usable bytes after aligning the buffer start.
  pub fn total_size(&self) -> usize {
    self.total_size
  }

  /// Returns `true` if `ptr` points into one of the pool's chunks.
  pub fn contains(
    &self,
    ptr: *const u8,
  ) -> bool {
    let addr = ptr as usize;
    addr >= self.base() && addr < self.base() + self.chunk_count * self.chunk_size
  }

  #[inline]
  fn base(&self) -> usize {
    self.data.as_ptr() as usize
  }

  /// # Safety
  ///
  /// `node` must be the start of a chunk of this pool that is not on the
  /// free list.
  unsafe fn push(
    &mut self,
    node: NonNull<FreeNode>,
  ) {
    unsafe { node.as_ptr().write_unaligned(FreeNode { next: self.head }) };
    self.head = Some(node);
    self.free_count += 1;
  }
}
