use std::ptr::NonNull;

use crate::{
  ALIGNMENT,
  block::{Block, HEADER_SIZE, Header, RawHeader},
};

/// The one contiguous range of bytes granted by the environment. All header
/// traffic goes through [`Block`] offsets, and every access is checked to lie
/// inside the range.
pub(crate) struct Region {
  base: NonNull<u8>,
  len: usize,
}

impl Region {
  /// # Safety
  ///
  /// `base` must be valid for reads and writes of `len` bytes for as long as
  /// the region is used, and aligned to [`ALIGNMENT`].
  pub unsafe fn new(
    base: NonNull<u8>,
    len: usize,
  ) -> Self {
    debug_assert_eq!(base.as_ptr() as usize % ALIGNMENT, 0);
    Self { base, len }
  }

  pub fn base(&self) -> NonNull<u8> {
    self.base
  }

  pub fn len(&self) -> usize {
    self.len
  }

  fn check(
    &self,
    block: Block,
  ) {
    let offset = block.offset();
    assert!(
      offset % ALIGNMENT == 0 && offset <= self.len.saturating_sub(HEADER_SIZE),
      "block {block} lies outside the {}-byte heap region",
      self.len
    );
  }

  pub fn header(
    &self,
    block: Block,
  ) -> Header {
    self.check(block);
    // SAFETY: `check` keeps the whole header inside the region, and the
    // offset is aligned, as is the base.
    let raw = unsafe {
      self
        .base
        .as_ptr()
        .add(block.offset())
        .cast::<RawHeader>()
        .read()
    };
    raw.into()
  }

  pub fn set_header(
    &mut self,
    block: Block,
    header: Header,
  ) {
    self.check(block);
    // SAFETY: see `header`.
    unsafe {
      self
        .base
        .as_ptr()
        .add(block.offset())
        .cast::<RawHeader>()
        .write(header.into());
    }
  }

  /// Applies `f` to the header of `block` and writes it back.
  pub fn update(
    &mut self,
    block: Block,
    f: impl FnOnce(&mut Header),
  ) {
    let mut header = self.header(block);
    f(&mut header);
    self.set_header(block, header);
  }

  pub fn address(
    &self,
    offset: usize,
  ) -> usize {
    self.base().as_ptr() as usize + offset
  }

  /// Pointer to the payload of `block`.
  pub fn payload_of(
    &self,
    block: Block,
  ) -> NonNull<u8> {
    self.check(block);
    // SAFETY: the header fits inside the region, so its end is at most one
    // past the region's last byte.
    unsafe { self.base.add(block.payload()) }
  }

  /// Offset of `ptr` from the base, if it falls within the region.
  pub fn offset_of(
    &self,
    ptr: NonNull<u8>,
  ) -> Option<usize> {
    let offset = (ptr.as_ptr() as usize).checked_sub(self.base.as_ptr() as usize)?;
    (offset < self.len).then_some(offset)
  }
}
