use std::{
  alloc::{self, Layout},
  cmp::Ordering,
  fmt, mem,
  ops::{Deref, DerefMut},
  ptr::{self, NonNull},
  slice,
};

use tracing::trace;

use crate::error::{AllocError, Result};

/// A growable, contiguous sequence of `Copy` elements that owns its heap
/// block directly.
///
/// The buffer is absent until the first operation that needs room, and
/// grows geometrically: when `count + n` exceeds the capacity, the new
/// capacity is `max(count + n, 2 * capacity, 2)`. Capacity only goes back
/// to zero through [`DynArray::free`] (or drop).
///
/// ```text
///   capacity = 8, count = 5
///   ┌────┬────┬────┬────┬────┬────┬────┬────┐
///   │ e0 │ e1 │ e2 │ e3 │ e4 │    │    │    │
///   └────┴────┴────┴────┴────┴────┴────┴────┘
///                             ▲
///                             └── next push lands here
/// ```
///
/// Elements are `Copy` so that removal, pop and whole-buffer copies are
/// plain memory moves with nothing to drop.
pub struct DynArray<T: Copy> {
  ptr: NonNull<T>,
  cap: usize,
  len: usize,
}

// SAFETY: `DynArray` owns its buffer exclusively, like `Vec<T>`.
unsafe impl<T: Copy + Send> Send for DynArray<T> {}
// SAFETY: shared access only hands out `&T`.
unsafe impl<T: Copy + Sync> Sync for DynArray<T> {}

impl<T: Copy> DynArray<T> {
  /// Creates an empty sequence. Nothing is allocated.
  pub const fn new() -> Self {
    Self {
      ptr: NonNull::dangling(),
      cap: 0,
      len: 0,
    }
  }

  /// Creates a sequence holding a copy of `elems`.
  pub fn from_slice(elems: &[T]) -> Result<Self> {
    let mut arr = Self::new();
    arr.concat(elems)?;
    Ok(arr)
  }

  /// Number of element slots in the buffer.
  #[inline]
  pub fn capacity(&self) -> usize {
    self.cap
  }

  /// Number of live elements.
  #[inline]
  pub fn len(&self) -> usize {
    self.len
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  /// Ensures room for at least `n` elements in total.
  pub fn reserve(
    &mut self,
    n: usize,
  ) -> Result<()> {
    self.grow_for(n)
  }

  /// Appends `elem`. On failure the sequence is left untouched.
  pub fn push(
    &mut self,
    elem: T,
  ) -> Result<()> {
    let required = self.required(1)?;
    self.grow_for(required)?;

    // SAFETY: `len < cap` after growing.
    unsafe { self.ptr.as_ptr().add(self.len).write(elem) };
    self.len += 1;

    Ok(())
  }

  /// Removes the last element and returns it, or `None` if empty.
  ///
  /// The slot is not cleared and the capacity is kept.
  pub fn pop(&mut self) -> Option<T> {
    if self.len == 0 {
      return None;
    }

    self.len -= 1;
    // SAFETY: the slot at the old `len - 1` is initialized.
    Some(unsafe { self.ptr.as_ptr().add(self.len).read() })
  }

  /// Inserts `elem` at `index`, shifting `[index, len)` one slot right.
  ///
  /// `index == len` appends.
  pub fn insert(
    &mut self,
    index: usize,
    elem: T,
  ) -> Result<()> {
    if index > self.len {
      return Err(AllocError::IndexOutOfBounds {
        index,
        len: self.len,
      });
    }

    let required = self.required(1)?;
    self.grow_for(required)?;

    // SAFETY: `index <= len < cap`, the shifted range ends at `len + 1 <= cap`.
    unsafe {
      let base = self.ptr.as_ptr();
      ptr::copy(base.add(index), base.add(index + 1), self.len - index);
      base.add(index).write(elem);
    }
    self.len += 1;

    Ok(())
  }

  /// Removes and returns the element at `index`, shifting the tail left.
  pub fn remove(
    &mut self,
    index: usize,
  ) -> Result<T> {
    if index >= self.len {
      return Err(AllocError::IndexOutOfBounds {
        index,
        len: self.len,
      });
    }

    // SAFETY: `index < len`, every slot in `[index, len)` is initialized.
    let elem = unsafe {
      let base = self.ptr.as_ptr();
      let elem = base.add(index).read();
      ptr::copy(base.add(index + 1), base.add(index), self.len - index - 1);
      elem
    };
    self.len -= 1;

    Ok(elem)
  }

  /// Appends every element of `elems`.
  pub fn concat(
    &mut self,
    elems: &[T],
  ) -> Result<()> {
    let required = self.required(elems.len())?;
    self.grow_for(required)?;

    // SAFETY: room for `elems.len()` more elements; `elems` cannot alias
    // our buffer while we hold `&mut self`.
    unsafe {
      ptr::copy_nonoverlapping(
        elems.as_ptr(),
        self.ptr.as_ptr().add(self.len),
        elems.len(),
      );
    }
    self.len += elems.len();

    Ok(())
  }

  /// Returns an independent copy with the same capacity and contents.
  pub fn try_clone(&self) -> Result<Self> {
    let mut copy = Self::new();
    if self.cap == 0 {
      return Ok(copy);
    }

    copy.set_capacity(self.cap)?;

    // SAFETY: both buffers are `cap * size_of::<T>()` bytes and distinct.
    // The whole buffer is copied as raw bytes, including unused slots.
    unsafe {
      ptr::copy_nonoverlapping(
        self.ptr.as_ptr().cast::<u8>(),
        copy.ptr.as_ptr().cast::<u8>(),
        self.cap * mem::size_of::<T>(),
      );
    }
    copy.len = self.len;

    Ok(copy)
  }

  /// Sorts the live elements with `compare`. Not stable.
  pub fn sort_by<F>(
    &mut self,
    compare: F,
  ) where
    F: FnMut(&T, &T) -> Ordering,
  {
    self.as_mut_slice().sort_unstable_by(compare);
  }

  /// Sets the count to zero and keeps the buffer.
  pub fn clear(&mut self) {
    self.len = 0;
  }

  /// Releases the buffer and returns to the empty state.
  pub fn free(&mut self) {
    if self.cap != 0 && mem::size_of::<T>() != 0 {
      // SAFETY: the buffer was allocated with exactly this layout.
      unsafe { alloc::dealloc(self.ptr.as_ptr().cast(), Self::layout_unchecked(self.cap)) };
    }

    self.ptr = NonNull::dangling();
    self.cap = 0;
    self.len = 0;
  }

  pub fn last(&self) -> Option<&T> {
    self.as_slice().last()
  }

  pub fn as_slice(&self) -> &[T] {
    // SAFETY: `ptr` is valid (or dangling with `len == 0`) for `len` elements.
    unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
  }

  pub fn as_mut_slice(&mut self) -> &mut [T] {
    // SAFETY: as above, and `&mut self` guarantees uniqueness.
    unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
  }

  fn required(
    &self,
    additional: usize,
  ) -> Result<usize> {
    self
      .len
      .checked_add(additional)
      .ok_or(AllocError::CapacityOverflow)
  }

  fn grow_for(
    &mut self,
    min_cap: usize,
  ) -> Result<()> {
    if min_cap <= self.cap {
      return Ok(());
    }

    let new_cap = min_cap.max(self.cap.saturating_mul(2)).max(2);
    self.set_capacity(new_cap)
  }

  fn set_capacity(
    &mut self,
    new_cap: usize,
  ) -> Result<()> {
    debug_assert!(new_cap >= self.len);

    if mem::size_of::<T>() == 0 {
      self.cap = new_cap;
      return Ok(());
    }

    let new_layout = Layout::array::<T>(new_cap).map_err(|_| AllocError::CapacityOverflow)?;

    let raw = if self.cap == 0 {
      // SAFETY: `new_layout` has non-zero size.
      unsafe { alloc::alloc(new_layout) }
    } else {
      // SAFETY: the current buffer was allocated with `layout_unchecked(cap)`
      // and the new size was validated by `Layout::array`.
      unsafe {
        alloc::realloc(
          self.ptr.as_ptr().cast(),
          Self::layout_unchecked(self.cap),
          new_layout.size(),
        )
      }
    };

    let ptr = NonNull::new(raw.cast::<T>()).ok_or(AllocError::AllocFailed {
      bytes: new_layout.size(),
    })?;

    trace!(from = self.cap, to = new_cap, "dyn array grown");

    self.ptr = ptr;
    self.cap = new_cap;

    Ok(())
  }

  /// # Safety
  ///
  /// `Layout::array::<T>(cap)` must have succeeded before.
  unsafe fn layout_unchecked(cap: usize) -> Layout {
    unsafe { Layout::from_size_align_unchecked(cap * mem::size_of::<T>(), mem::align_of::<T>()) }
  }
}

impl<T: Copy + Ord> DynArray<T> {
  pub fn sort(&mut self) {
    self.as_mut_slice().sort_unstable();
  }
}

impl<T: Copy> Drop for DynArray<T> {
  fn drop(&mut self) {
    self.free();
  }
}

impl<T: Copy> Default for DynArray<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Copy> Deref for DynArray<T> {
  type Target = [T];

  fn deref(&self) -> &[T] {
    self.as_slice()
  }
}

impl<T: Copy> DerefMut for DynArray<T> {
  fn deref_mut(&mut self) -> &mut [T] {
    self.as_mut_slice()
  }
}

impl<T: Copy + fmt::Debug> fmt::Debug for DynArray<T> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("DynArray")
      .field("capacity", &self.cap)
      .field("count", &self.len)
      .field("data", &self.as_slice())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty() {
    let arr: DynArray<i32> = DynArray::new();
    assert_eq!(arr.capacity(), 0);
    assert_eq!(arr.len(), 0);
    assert!(arr.is_empty());
    assert_eq!(arr.last(), None);
  }

  #[test]
  fn test_push_and_insert() {
    let mut arr = DynArray::new();

    arr.push(-1).unwrap();
    arr.push(2).unwrap();
    assert_eq!(arr.capacity(), 2);
    assert_eq!(arr.len(), 2);
    assert_eq!(arr.as_slice(), &[-1, 2]);

    arr.insert(1, 0).unwrap();
    assert_eq!(arr.as_slice(), &[-1, 0, 2]);

    arr.insert(2, 1).unwrap();
    assert_eq!(arr.as_slice(), &[-1, 0, 1, 2]);
    assert_eq!(arr.capacity(), 4);
  }

  #[test]
  fn test_insert_at_end_and_out_of_range() {
    let mut arr = DynArray::from_slice(&[1, 2]).unwrap();
    arr.insert(2, 3).unwrap();
    assert_eq!(arr.as_slice(), &[1, 2, 3]);

    assert_eq!(
      arr.insert(5, 9),
      Err(AllocError::IndexOutOfBounds { index: 5, len: 3 })
    );
    assert_eq!(arr.as_slice(), &[1, 2, 3]);
  }

  #[test]
  fn test_reserve_then_concat() {
    let mut arr = DynArray::from_slice(&[-1, 0, 1, 2]).unwrap();

    arr.reserve(9).unwrap();
    assert_eq!(arr.capacity(), 9);
    assert_eq!(arr.len(), 4);

    arr.concat(&[3, 4, 5, 6, 7, 8]).unwrap();
    assert_eq!(arr.len(), 10);
    assert_eq!(arr.capacity(), 18);
    assert_eq!(arr.as_slice(), &[-1, 0, 1, 2, 3, 4, 5, 6, 7, 8]);
  }

  #[test]
  fn test_reserve_smaller_is_noop() {
    let mut arr = DynArray::from_slice(&[1u8; 10]).unwrap();
    let cap = arr.capacity();
    arr.reserve(3).unwrap();
    assert_eq!(arr.capacity(), cap);
  }

  #[test]
  fn test_pop_and_remove() {
    let mut arr = DynArray::from_slice(&[-1, 0, 1, 2, 3]).unwrap();

    assert_eq!(arr.pop(), Some(3));
    assert_eq!(arr.as_slice(), &[-1, 0, 1, 2]);

    assert_eq!(arr.remove(0), Ok(-1));
    assert_eq!(arr.as_slice(), &[0, 1, 2]);

    assert_eq!(arr.remove(2), Ok(2));
    assert_eq!(arr.as_slice(), &[0, 1]);

    assert_eq!(
      arr.remove(2),
      Err(AllocError::IndexOutOfBounds { index: 2, len: 2 })
    );
  }

  #[test]
  fn test_pop_empty_keeps_capacity() {
    let mut arr = DynArray::from_slice(&[7]).unwrap();
    let cap = arr.capacity();
    assert_eq!(arr.pop(), Some(7));
    assert_eq!(arr.pop(), None);
    assert_eq!(arr.capacity(), cap);
  }

  #[test]
  fn test_copy_is_independent() {
    let mut src = DynArray::from_slice(&[1, 2, 3]).unwrap();
    src.reserve(10).unwrap();

    let mut dst = src.try_clone().unwrap();
    assert_eq!(dst.capacity(), src.capacity());
    assert_eq!(dst.as_slice(), src.as_slice());
    assert_ne!(dst.as_ptr(), src.as_ptr());

    dst.push(4).unwrap();
    dst[0] = 100;
    assert_eq!(src.len(), 3);
    assert_eq!(src.as_slice(), &[1, 2, 3]);
    assert_eq!(dst.as_slice(), &[100, 2, 3, 4]);
  }

  #[test]
  fn test_copy_of_empty() {
    let src: DynArray<u64> = DynArray::new();
    let dst = src.try_clone().unwrap();
    assert_eq!(dst.capacity(), 0);
    assert!(dst.is_empty());
  }

  #[test]
  fn test_sort() {
    let mut arr = DynArray::new();
    arr.push(3).unwrap();
    arr.push(2).unwrap();
    arr.push(1).unwrap();

    arr.sort_by(|a: &i32, b| a.cmp(b));
    assert_eq!(arr.as_slice(), &[1, 2, 3]);

    arr.sort_by(|a, b| b.cmp(a));
    assert_eq!(arr.as_slice(), &[3, 2, 1]);

    arr.sort();
    assert_eq!(arr.as_slice(), &[1, 2, 3]);
  }

  #[test]
  fn test_clear_and_free() {
    let mut arr = DynArray::from_slice(&[1, 2, 3]).unwrap();
    let cap = arr.capacity();

    arr.clear();
    assert_eq!(arr.len(), 0);
    assert_eq!(arr.capacity(), cap);

    arr.push(9).unwrap();
    assert_eq!(arr.as_slice(), &[9]);

    arr.free();
    assert_eq!(arr.len(), 0);
    assert_eq!(arr.capacity(), 0);

    // Usable again after free.
    arr.push(5).unwrap();
    assert_eq!(arr.as_slice(), &[5]);
  }

  #[test]
  fn test_doubling() {
    let mut arr = DynArray::new();
    let mut reallocs = 0;
    let mut last_cap = arr.capacity();

    for n in 1..=1000usize {
      arr.push(n).unwrap();
      assert!(arr.capacity() >= n);
      assert!(arr.capacity() <= (2 * n).max(2));
      if arr.capacity() != last_cap {
        reallocs += 1;
        last_cap = arr.capacity();
      }
    }

    // 2, 4, 8, ..., 1024
    assert_eq!(reallocs, 10);
    assert_eq!(arr.capacity(), 1024);
  }

  #[test]
  fn test_zero_sized_elements() {
    let mut arr = DynArray::new();
    for _ in 0..5 {
      arr.push(()).unwrap();
    }
    assert_eq!(arr.len(), 5);
    assert_eq!(arr.pop(), Some(()));
    assert_eq!(arr.len(), 4);
    let copy = arr.try_clone().unwrap();
    assert_eq!(copy.len(), 4);
  }

  #[test]
  fn test_capacity_overflow() {
    let mut arr: DynArray<u64> = DynArray::new();
    assert_eq!(arr.reserve(usize::MAX), Err(AllocError::CapacityOverflow));
    assert_eq!(arr.capacity(), 0);
  }

  #[cfg(not(miri))]
  mod proptests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
      Push(i32),
      Pop,
      Insert(usize, i32),
      Remove(usize),
      Concat(Vec<i32>),
    }

    fn op() -> impl Strategy<Value = Op> {
      prop_oneof![
        any::<i32>().prop_map(Op::Push),
        Just(Op::Pop),
        (0usize..40, any::<i32>()).prop_map(|(i, e)| Op::Insert(i, e)),
        (0usize..40).prop_map(Op::Remove),
        proptest::collection::vec(any::<i32>(), 0..8).prop_map(Op::Concat),
      ]
    }

    proptest! {
      #[test]
      fn matches_vec_model(ops in proptest::collection::vec(op(), 1..64)) {
        let mut arr = DynArray::new();
        let mut model: Vec<i32> = Vec::new();

        for op in ops {
          match op {
            Op::Push(e) => {
              arr.push(e).unwrap();
              model.push(e);
            }
            Op::Pop => {
              prop_assert_eq!(arr.pop(), model.pop());
            }
            Op::Insert(i, e) => {
              let res = arr.insert(i, e);
              if i <= model.len() {
                prop_assert!(res.is_ok());
                model.insert(i, e);
              } else {
                prop_assert!(res.is_err());
              }
            }
            Op::Remove(i) => {
              let res = arr.remove(i);
              if i < model.len() {
                prop_assert_eq!(res, Ok(model.remove(i)));
              } else {
                prop_assert!(res.is_err());
              }
            }
            Op::Concat(elems) => {
              arr.concat(&elems).unwrap();
              model.extend_from_slice(&elems);
            }
          }

          prop_assert!(arr.len() <= arr.capacity());
          prop_assert_eq!(arr.as_slice(), model.as_slice());
        }
      }

      #[test]
      fn copy_never_aliases(elems in proptest::collection::vec(any::<u16>(), 0..32), extra in any::<u16>()) {
        let src = DynArray::from_slice(&elems).unwrap();
        let mut dst = src.try_clone().unwrap();
        dst.push(extra).unwrap();
        prop_assert_eq!(src.as_slice(), elems.as_slice());
        prop_assert_eq!(dst.len(), elems.len() + 1);
      }
    }
  }
}
