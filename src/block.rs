use std::{fmt, mem};

use crate::align;

/// Handle to a block: the byte offset of its header from the start of the
/// managed region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Block(usize);

impl Block {
  pub const fn new(offset: usize) -> Self {
    Self(offset)
  }

  pub const fn offset(self) -> usize {
    self.0
  }

  /// Offset of the first payload byte.
  pub const fn payload(self) -> usize {
    self.0 + HEADER_SIZE
  }

  /// Offset one past the last payload byte of a block holding `size` bytes.
  /// For a physically contiguous successor this is where its header starts.
  pub const fn end(
    self,
    size: usize,
  ) -> usize {
    self.0 + HEADER_SIZE + size
  }
}

impl fmt::Display for Block {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "+{:#x}", self.0)
  }
}

/// A block is either linked into the directory (`Free`) or handed out
/// (`Taken`). Sentinels are permanently `Taken`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
  Free,
  Taken,
}

/// Typed view of a block header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
  pub state: State,
  /// Payload bytes, excluding the header itself.
  pub size: usize,
  pub prev: Option<Block>,
  pub next: Option<Block>,
}

impl Header {
  pub fn new(
    state: State,
    size: usize,
    prev: Option<Block>,
    next: Option<Block>,
  ) -> Self {
    Self { state, size, prev, next }
  }

  pub fn is_free(&self) -> bool {
    self.state == State::Free
  }
}

/// In-band layout written at the start of every block.
#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct RawHeader {
  taken: bool,
  size: usize,
  next: usize,
  prev: usize,
}

const NO_LINK: usize = usize::MAX;

/// Size of the in-band header, rounded up to the alignment boundary.
pub const HEADER_SIZE: usize = align!(mem::size_of::<RawHeader>());

impl From<Header> for RawHeader {
  fn from(header: Header) -> Self {
    Self {
      taken: header.state == State::Taken,
      size: header.size,
      next: header.next.map_or(NO_LINK, Block::offset),
      prev: header.prev.map_or(NO_LINK, Block::offset),
    }
  }
}

impl From<RawHeader> for Header {
  fn from(raw: RawHeader) -> Self {
    let link = |offset| (offset != NO_LINK).then_some(Block(offset));

    Self {
      state: if raw.taken { State::Taken } else { State::Free },
      size: raw.size,
      next: link(raw.next),
      prev: link(raw.prev),
    }
  }
}
