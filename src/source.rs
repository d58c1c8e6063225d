//! Where the heap's one contiguous region comes from.

use std::ptr::{self, NonNull};

use libc::{c_void, intptr_t, sbrk};
use log::{debug, warn};

use crate::{ALIGNMENT, align};

/// The environment primitive behind a [`Heap`](crate::Heap): one request for
/// `bytes` contiguous, writable bytes.
///
/// Implementations return a base aligned to [`ALIGNMENT`], or `None` when the
/// environment refuses. The memory must stay valid for as long as the source
/// itself is alive.
pub trait HeapSource {
  fn grant(
    &mut self,
    bytes: usize,
  ) -> Option<NonNull<u8>>;
}

/// Extends the program break with `sbrk(2)`.
#[derive(Debug, Default)]
pub struct Sbrk;

impl HeapSource for Sbrk {
  fn grant(
    &mut self,
    bytes: usize,
  ) -> Option<NonNull<u8>> {
    // SAFETY: `sbrk(0)` only queries the current break.
    let brk = unsafe { sbrk(0) } as usize;
    let padding = align!(brk) - brk;
    let total = bytes.checked_add(padding)?;
    let increment = intptr_t::try_from(total).ok()?;

    // SAFETY: the break only moves forward; nothing else in this crate owns
    // the bytes above the old break.
    let address = unsafe { sbrk(increment) };

    if address == usize::MAX as *mut c_void {
      warn!("sbrk({total}) failed, program break stays at {brk:#x}");
      return None;
    }

    debug!("sbrk granted {total} bytes at {address:?}");
    NonNull::new((address as *mut u8).wrapping_add(padding))
  }
}

/// An anonymous private mapping, unmapped when the source is dropped.
#[derive(Debug, Default)]
pub struct Mmap {
  mapping: Option<(NonNull<u8>, usize)>,
}

impl Mmap {
  pub fn new() -> Self {
    Self::default()
  }
}

impl HeapSource for Mmap {
  fn grant(
    &mut self,
    bytes: usize,
  ) -> Option<NonNull<u8>> {
    if bytes == 0 || self.mapping.is_some() {
      return None;
    }

    // SAFETY: a fresh anonymous mapping aliases nothing.
    let address = unsafe {
      libc::mmap(
        ptr::null_mut(),
        bytes,
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
        -1,
        0,
      )
    };

    if address == libc::MAP_FAILED {
      warn!("mmap of {bytes} bytes failed");
      return None;
    }

    let base = NonNull::new(address.cast::<u8>())?;
    debug!("mmap granted {bytes} bytes at {base:?}");
    self.mapping = Some((base, bytes));
    Some(base)
  }
}

impl Drop for Mmap {
  fn drop(&mut self) {
    if let Some((base, bytes)) = self.mapping.take() {
      // SAFETY: exactly the range returned by `mmap` in `grant`.
      unsafe {
        libc::munmap(base.as_ptr().cast(), bytes);
      }
    }
  }
}

/// Bytes owned by the process's global allocator, optionally capped at
/// `limit` so that a grant can be refused on purpose.
#[derive(Debug, Default)]
pub struct Buffer {
  limit: Option<usize>,
  storage: Option<Box<[u64]>>,
}

impl Buffer {
  pub fn new() -> Self {
    Self::default()
  }

  /// A buffer that refuses any grant larger than `limit` bytes.
  pub fn with_limit(limit: usize) -> Self {
    Self { limit: Some(limit), storage: None }
  }
}

impl HeapSource for Buffer {
  fn grant(
    &mut self,
    bytes: usize,
  ) -> Option<NonNull<u8>> {
    if self.storage.is_some() || self.limit.is_some_and(|limit| bytes > limit) {
      return None;
    }

    let words = bytes.div_ceil(size_of::<u64>());
    let storage = self.storage.insert(vec![0u64; words].into_boxed_slice());
    debug_assert!(align_of::<u64>() >= ALIGNMENT);

    NonNull::new(storage.as_mut_ptr().cast::<u8>())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_buffer_grants_once() {
    let mut buffer = Buffer::new();

    let base = buffer.grant(100).unwrap();
    assert_eq!(base.as_ptr() as usize % ALIGNMENT, 0);
    assert!(buffer.grant(100).is_none());
  }

  #[test]
  fn test_buffer_limit_refuses() {
    let mut buffer = Buffer::with_limit(64);

    assert!(buffer.grant(65).is_none());
    assert!(buffer.grant(64).is_some());
  }

  #[test]
  fn test_mmap_grant_is_writable() {
    let mut mmap = Mmap::new();

    let base = mmap.grant(4096).unwrap();
    assert_eq!(base.as_ptr() as usize % ALIGNMENT, 0);

    unsafe {
      base.as_ptr().write_bytes(0xAB, 4096);
      assert_eq!(*base.as_ptr().add(4095), 0xAB);
    }

    assert!(mmap.grant(4096).is_none());
  }

  #[test]
  fn test_mmap_zero_bytes_refused() {
    assert!(Mmap::new().grant(0).is_none());
  }
}
