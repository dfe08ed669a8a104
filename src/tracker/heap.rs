use std::{
  io::{self, Write},
  ptr::NonNull,
};

use libc::{c_void, calloc, free, malloc, realloc};
use tracing::{trace, warn};

use super::{
  config::TableConfig,
  table::{AllocTable, Query},
};
use crate::{
  error::{AllocError, Result},
  size::PrettySize,
};

/// A `malloc`-family front end that mirrors every block into an
/// [`AllocTable`].
///
/// Use it in place of the raw C allocator where leak and usage reports are
/// wanted. Every operation emits a `trace` event with the allocation
/// number, size, address and the running total.
///
/// ```rust
/// use memkit::TrackedHeap;
///
/// let mut heap = TrackedHeap::new();
/// let block = heap.malloc(64).unwrap();
/// assert!(heap.query(block.as_ptr()).active);
///
/// unsafe { heap.free(block.as_ptr()).unwrap() };
/// assert!(heap.is_empty());
/// ```
///
/// Blocks still live when the heap is dropped are released and reported
/// with a `warn` event.
#[derive(Debug, Default)]
pub struct TrackedHeap {
  table: AllocTable,
}

impl TrackedHeap {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_config(config: TableConfig) -> Result<Self> {
    Ok(Self {
      table: AllocTable::with_config(config)?,
    })
  }

  /// Allocates `size` uninitialized bytes.
  pub fn malloc(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>> {
    // `malloc(0)` may legally return null; ask for one byte instead.
    // SAFETY: plain libc allocation.
    let raw = unsafe { malloc(size.max(1)) };
    let ptr = NonNull::new(raw.cast::<u8>()).ok_or(AllocError::AllocFailed { bytes: size })?;

    let alloc_no = self.table.set(ptr.as_ptr() as usize, size);
    trace!(
      alloc_no,
      size,
      ptr = ?ptr.as_ptr(),
      total = %PrettySize::new(self.table.total_bytes()),
      "malloc"
    );

    Ok(ptr)
  }

  /// Allocates `count * stride` zeroed bytes.
  pub fn calloc(
    &mut self,
    count: usize,
    stride: usize,
  ) -> Result<NonNull<u8>> {
    let size = count
      .checked_mul(stride)
      .ok_or(AllocError::CapacityOverflow)?;

    // SAFETY: plain libc allocation.
    let raw = unsafe {
      if size == 0 {
        calloc(1, 1)
      } else {
        calloc(count, stride)
      }
    };
    let ptr = NonNull::new(raw.cast::<u8>()).ok_or(AllocError::AllocFailed { bytes: size })?;

    let alloc_no = self.table.set(ptr.as_ptr() as usize, size);
    trace!(
      alloc_no,
      size,
      ptr = ?ptr.as_ptr(),
      total = %PrettySize::new(self.table.total_bytes()),
      "calloc"
    );

    Ok(ptr)
  }

  /// Resizes a block from this heap. A null `ptr` allocates.
  ///
  /// When the block moves, the old address is released in the table and
  /// the new one gets a fresh allocation number. On failure the old block
  /// is left untouched and still tracked.
  ///
  /// # Safety
  ///
  /// `ptr` must be null or a live block returned by this heap; after a
  /// successful call it must no longer be used.
  pub unsafe fn realloc(
    &mut self,
    ptr: *mut u8,
    size: usize,
  ) -> Result<NonNull<u8>> {
    if ptr.is_null() {
      return self.malloc(size);
    }

    let old_addr = ptr as usize;
    if !self.table.get(old_addr).active {
      warn!(ptr = ?ptr, "realloc of untracked pointer refused");
      return Err(AllocError::UntrackedPointer { addr: old_addr });
    }

    // SAFETY: `ptr` is a live libc block, checked above.
    let raw = unsafe { realloc(ptr.cast::<c_void>(), size.max(1)) };
    let new = NonNull::new(raw.cast::<u8>()).ok_or(AllocError::AllocFailed { bytes: size })?;

    if new.as_ptr() != ptr {
      self.table.unset(old_addr);
    }
    let alloc_no = self.table.set(new.as_ptr() as usize, size);
    trace!(
      alloc_no,
      size,
      ptr = ?new.as_ptr(),
      moved = new.as_ptr() != ptr,
      total = %PrettySize::new(self.table.total_bytes()),
      "realloc"
    );

    Ok(new)
  }

  /// Releases a block from this heap. A null `ptr` is ignored.
  ///
  /// Pointers the heap does not know about are refused with
  /// [`AllocError::UntrackedPointer`] and not passed to `free`.
  ///
  /// # Safety
  ///
  /// `ptr` must be null or a block returned by this heap, and must not be
  /// used afterwards.
  pub unsafe fn free(
    &mut self,
    ptr: *mut u8,
  ) -> Result<()> {
    if ptr.is_null() {
      return Ok(());
    }

    let addr = ptr as usize;
    if !self.table.get(addr).active {
      warn!(ptr = ?ptr, "free of untracked pointer refused");
      return Err(AllocError::UntrackedPointer { addr });
    }

    // SAFETY: `ptr` is a live libc block, checked above.
    unsafe { free(ptr.cast::<c_void>()) };
    self.table.unset(addr);

    trace!(
      ptr = ?ptr,
      total = %PrettySize::new(self.table.total_bytes()),
      "free"
    );

    Ok(())
  }

  /// Reports whether `ptr` is a live block and its size.
  pub fn query(
    &self,
    ptr: *const u8,
  ) -> Query {
    self.table.get(ptr as usize)
  }

  /// `true` when every block has been released.
  pub fn is_empty(&self) -> bool {
    self.table.is_empty()
  }

  pub fn table(&self) -> &AllocTable {
    &self.table
  }

  pub fn print_stats<W: Write>(
    &self,
    out: &mut W,
    print_chunks: bool,
  ) -> io::Result<()> {
    self.table.print_stats(out, print_chunks)
  }

  /// Releases every live block and forgets all records, restarting the
  /// allocation numbering.
  pub fn reset(&mut self) {
    self.release_all();
    self.table.reset();
  }

  fn release_all(&mut self) {
    for record in self.table.chronological() {
      // SAFETY: active records are exactly the live libc blocks of this heap.
      unsafe { free(record.addr as *mut c_void) };
    }
  }
}

impl Drop for TrackedHeap {
  fn drop(&mut self) {
    if self.table.is_empty() {
      return;
    }

    warn!(
      chunks = self.table.active_count(),
      bytes = self.table.total_bytes(),
      "tracked heap dropped with live allocations"
    );
    self.release_all();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_malloc_free() {
    let mut heap = TrackedHeap::new();

    let a = heap.malloc(100).unwrap();
    assert_eq!(
      heap.query(a.as_ptr()),
      Query {
        active: true,
        size: 100,
      }
    );

    unsafe { heap.free(a.as_ptr()).unwrap() };
    assert!(heap.is_empty());
  }

  #[test]
  fn test_calloc_zeroed() {
    let mut heap = TrackedHeap::new();

    let block = heap.calloc(16, 4).unwrap();
    let bytes = unsafe { std::slice::from_raw_parts(block.as_ptr(), 64) };
    assert!(bytes.iter().all(|&b| b == 0));
    assert_eq!(heap.query(block.as_ptr()).size, 64);

    assert_eq!(
      heap.calloc(usize::MAX, 2),
      Err(AllocError::CapacityOverflow)
    );

    unsafe { heap.free(block.as_ptr()).unwrap() };
  }

  #[test]
  fn test_realloc_keeps_data_and_accounting() {
    let mut heap = TrackedHeap::new();

    unsafe {
      let a = heap.malloc(8).unwrap();
      std::ptr::copy_nonoverlapping(b"abcdefgh".as_ptr(), a.as_ptr(), 8);

      let b = heap.realloc(a.as_ptr(), 4096).unwrap();
      assert_eq!(std::slice::from_raw_parts(b.as_ptr(), 8), b"abcdefgh");
      assert_eq!(heap.table().active_count(), 1);
      assert_eq!(heap.table().total_bytes(), 4096);
      assert_eq!(heap.query(b.as_ptr()).size, 4096);
      if b != a {
        assert!(!heap.query(a.as_ptr()).active);
      }

      heap.free(b.as_ptr()).unwrap();
    }
    assert!(heap.is_empty());
  }

  #[test]
  fn test_realloc_null_allocates() {
    let mut heap = TrackedHeap::new();

    let block = unsafe { heap.realloc(std::ptr::null_mut(), 32).unwrap() };
    assert_eq!(heap.query(block.as_ptr()).size, 32);
    unsafe { heap.free(block.as_ptr()).unwrap() };
  }

  #[test]
  fn test_untracked_pointers_refused() {
    let mut heap = TrackedHeap::new();
    let mut local = [0u8; 4];
    let ptr = local.as_mut_ptr();

    unsafe {
      assert_eq!(
        heap.free(ptr),
        Err(AllocError::UntrackedPointer { addr: ptr as usize })
      );
      assert_eq!(
        heap.realloc(ptr, 8),
        Err(AllocError::UntrackedPointer { addr: ptr as usize })
      );
      assert_eq!(heap.free(std::ptr::null_mut()), Ok(()));
    }
  }

  #[test]
  fn test_double_free_refused() {
    let mut heap = TrackedHeap::new();
    let a = heap.malloc(16).unwrap();

    unsafe {
      heap.free(a.as_ptr()).unwrap();
      assert!(matches!(
        heap.free(a.as_ptr()),
        Err(AllocError::UntrackedPointer { .. })
      ));
    }
  }

  #[test]
  fn test_report_lists_live_blocks() {
    let mut heap = TrackedHeap::new();
    let a = heap.malloc(10).unwrap();
    let b = heap.malloc(20).unwrap();
    unsafe { heap.free(a.as_ptr()).unwrap() };

    let mut out = Vec::new();
    heap.print_stats(&mut out, true).unwrap();
    let report = String::from_utf8(out).unwrap();

    assert!(report.contains(&format!("#1: 20 bytes at {:#x}", b.as_ptr() as usize)));
    assert!(report.contains("number of chunks: 1"));
  }

  #[test]
  fn test_reset_and_drop_release_blocks() {
    let mut heap = TrackedHeap::new();
    heap.malloc(10).unwrap();
    heap.malloc(20).unwrap();

    heap.reset();
    assert!(heap.is_empty());
    assert_eq!(heap.table().total_count(), 0);

    heap.malloc(30).unwrap();
    drop(heap);
  }
}
