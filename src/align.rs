use std::mem;

use crate::error::{AllocError, Result};

/// Default alignment for arena allocations: two machine words.
pub const DEFAULT_ARENA_ALIGNMENT: usize = 2 * mem::size_of::<usize>();

/// Default chunk alignment for pools.
pub const DEFAULT_POOL_ALIGNMENT: usize = 8;

/// Rounds `value` up to the next multiple of `alignment`.
///
/// `alignment` must be a power of two; the macro does not check it. Use
/// [`align_forward`] when the alignment comes from a caller.
///
/// # Examples
///
/// ```rust
/// use memkit::align_to;
///
/// assert_eq!(align_to!(13usize, 8usize), 16);
/// assert_eq!(align_to!(16usize, 8usize), 16);
/// assert_eq!(align_to!(0usize, 64usize), 0);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $alignment:expr) => {
    ($value + ($alignment - 1)) & !($alignment - 1)
  };
}

/// Returns `true` if `x` is a non-zero power of two.
#[inline]
pub const fn is_power_of_two(x: usize) -> bool {
  x != 0 && (x & (x - 1)) == 0
}

/// Checks that `alignment` can be used to align addresses.
#[inline]
pub fn check_alignment(alignment: usize) -> Result<()> {
  if is_power_of_two(alignment) {
    Ok(())
  } else {
    Err(AllocError::InvalidAlignment { alignment })
  }
}

/// Pushes `addr` forward to the next address that is a multiple of
/// `alignment`. Already aligned addresses are returned unchanged.
///
/// Fails with [`AllocError::InvalidAlignment`] for alignments that are not
/// a power of two, and with [`AllocError::CapacityOverflow`] if the aligned
/// address does not fit in a `usize`.
pub fn align_forward(
  addr: usize,
  alignment: usize,
) -> Result<usize> {
  check_alignment(alignment)?;

  // Same as `addr % alignment` for powers of two.
  let modulo = addr & (alignment - 1);
  if modulo == 0 {
    return Ok(addr);
  }

  addr
    .checked_add(alignment - modulo)
    .ok_or(AllocError::CapacityOverflow)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_align_to() {
    let ptr_size = mem::size_of::<usize>();

    let mut alignments = Vec::new();

    for i in 0..10 {
      let sizes = (ptr_size * i + 1)..=(ptr_size * (i + 1));

      let expected_alignment = ptr_size * (i + 1);

      alignments.push((sizes, expected_alignment));
    }

    for (sizes, expected) in alignments {
      for size in sizes {
        assert_eq!(expected, align_to!(size, ptr_size));
      }
    }
  }

  #[test]
  fn test_power_of_two() {
    assert!(!is_power_of_two(0));
    assert!(is_power_of_two(1));
    assert!(is_power_of_two(2));
    assert!(!is_power_of_two(3));
    assert!(is_power_of_two(4096));
    assert!(!is_power_of_two(4097));
  }

  #[test]
  fn test_align_forward() {
    assert_eq!(align_forward(0, 16).unwrap(), 0);
    assert_eq!(align_forward(1, 16).unwrap(), 16);
    assert_eq!(align_forward(16, 16).unwrap(), 16);
    assert_eq!(align_forward(17, 8).unwrap(), 24);
    assert_eq!(align_forward(5, 1).unwrap(), 5);
  }

  #[test]
  fn test_align_forward_rejects_bad_alignment() {
    assert_eq!(
      align_forward(10, 12),
      Err(AllocError::InvalidAlignment { alignment: 12 })
    );
    assert_eq!(
      align_forward(10, 0),
      Err(AllocError::InvalidAlignment { alignment: 0 })
    );
  }

  #[test]
  fn test_align_forward_overflow() {
    assert_eq!(
      align_forward(usize::MAX, 8),
      Err(AllocError::CapacityOverflow)
    );
  }

  #[test]
  fn test_default_alignments() {
    assert!(is_power_of_two(DEFAULT_ARENA_ALIGNMENT));
    assert!(is_power_of_two(DEFAULT_POOL_ALIGNMENT));
    assert_eq!(DEFAULT_ARENA_ALIGNMENT, 2 * mem::size_of::<*const u8>());
  }
}
