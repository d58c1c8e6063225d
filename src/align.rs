/// Rounds `value` up to the allocator's alignment boundary, or to an explicit
/// power of two when a second argument is given.
///
/// # Examples
///
/// ```rust
/// use fitalloc::{ALIGNMENT, align};
///
/// match ALIGNMENT {
///     8 => assert_eq!(align!(13), 16), // 64 bit machine.
///     4 => assert_eq!(align!(11), 12), // 32 bit machine.
///     _ => {},
/// };
///
/// assert_eq!(align!(100, 64), 128);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    $crate::align!($value, $crate::ALIGNMENT)
  };
  ($value:expr, $to:expr) => {
    (($value) + ($to) - 1) & !(($to) - 1)
  };
}

/// Same as [`align!`] but returns `None` instead of wrapping around when the
/// rounded value does not fit in a `usize`.
pub fn checked_align(value: usize) -> Option<usize> {
  value
    .checked_add(crate::ALIGNMENT - 1)
    .map(|v| v & !(crate::ALIGNMENT - 1))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ALIGNMENT;

  #[test]
  fn test_align() {
    let mut alignments = Vec::new();

    for i in 0..10 {
      let sizes = (ALIGNMENT * i + 1)..=(ALIGNMENT * (i + 1));

      let expected_alignment = ALIGNMENT * (i + 1);

      alignments.push((sizes, expected_alignment));
    }

    for (sizes, expected) in alignments {
      for size in sizes {
        assert_eq!(expected, align!(size));
        assert_eq!(Some(expected), checked_align(size));
      }
    }
  }

  #[test]
  fn test_align_zero_and_explicit_boundary() {
    assert_eq!(align!(0), 0);
    assert_eq!(align!(1, 32), 32);
    assert_eq!(align!(33, 32), 64);
    assert_eq!(align!(4096, 4096), 4096);
  }

  #[test]
  fn test_checked_align_overflow() {
    assert_eq!(checked_align(usize::MAX), None);
    assert_eq!(checked_align(usize::MAX - ALIGNMENT + 2), None);
    assert_eq!(
      checked_align(usize::MAX - ALIGNMENT + 1),
      Some(usize::MAX - ALIGNMENT + 1)
    );
  }
}
