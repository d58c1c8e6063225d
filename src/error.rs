use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum Error {
  /// The heap source refused to hand out the backing region.
  #[error("the environment refused to grant {bytes} bytes for the heap")]
  GrantDenied { bytes: usize },

  #[error("a {capacity}-byte heap cannot hold its sentinels (need at least {minimum} bytes)")]
  CapacityTooSmall { capacity: usize, minimum: usize },

  #[error("cannot reserve zero bytes")]
  ZeroSize,

  /// No free block can hold the (aligned) request.
  #[error("out of memory: no free block can hold {bytes} bytes")]
  OutOfMemory { bytes: usize },

  #[error("the heap has not been initialized")]
  Uninitialized,

  #[error("{address:#x} does not point into the heap")]
  OutOfRegion { address: usize },

  #[error("{address:#x} is not aligned to a payload boundary")]
  Misaligned { address: usize },

  /// The header in front of the pointer describes a block that cannot exist.
  #[error("the header in front of {address:#x} is corrupt")]
  CorruptHeader { address: usize },

  /// Double release, or a pointer into the middle of a block.
  #[error("{address:#x} is not a reserved block")]
  NotTaken { address: usize },
}
