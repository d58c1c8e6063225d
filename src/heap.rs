use std::ptr::NonNull;

use log::{debug, trace, warn};

use crate::{
  ALIGNMENT, MAX_HEAP_SIZE,
  align::checked_align,
  block::{Block, HEADER_SIZE, Header, State},
  error::{Error, Result},
  region::Region,
  source::{HeapSource, Sbrk},
};

/// The prologue sentinel always sits at the very start of the region.
const PROLOGUE: Block = Block::new(0);

/// A best-fit allocator over one fixed-size region obtained from `S`.
///
/// The block directory is an address-ordered doubly linked list threaded
/// through the in-band headers. It holds the free blocks plus the prologue
/// and epilogue sentinels; taken blocks are unlinked.
///
/// A `Heap` is single-threaded: it is neither `Send` nor `Sync`, and sharing
/// one between threads needs external synchronization.
pub struct Heap<S: HeapSource> {
  source: S,
  capacity: usize,
  region: Option<Region>,
}

impl Default for Heap<Sbrk> {
  fn default() -> Self {
    Self::new(Sbrk)
  }
}

impl<S: HeapSource> Heap<S> {
  /// A heap of [`MAX_HEAP_SIZE`] bytes. Nothing is requested from `source`
  /// until the first [`reserve`](Self::reserve) or
  /// [`initialize`](Self::initialize).
  pub fn new(source: S) -> Self {
    Self::with_capacity(source, MAX_HEAP_SIZE)
  }

  pub fn with_capacity(
    source: S,
    capacity: usize,
  ) -> Self {
    Self {
      source,
      capacity: checked_align(capacity).unwrap_or(!(ALIGNMENT - 1)),
      region: None,
    }
  }

  /// Total bytes of the region, sentinels included.
  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn is_initialized(&self) -> bool {
    self.region.is_some()
  }

  pub(crate) fn region(&self) -> Option<&Region> {
    self.region.as_ref()
  }

  /// Whether `ptr` points anywhere into the managed region.
  pub fn contains(
    &self,
    ptr: NonNull<u8>,
  ) -> bool {
    self
      .region
      .as_ref()
      .is_some_and(|region| region.offset_of(ptr).is_some())
  }

  /// Payload bytes currently sitting in free blocks.
  pub fn free_bytes(&self) -> usize {
    self.region.as_ref().map_or(0, |region| {
      Directory::new(region)
        .filter(|(_, header)| header.is_free())
        .map(|(_, header)| header.size)
        .sum()
    })
  }

  /// Obtains the backing region and lays out the prologue, one free block
  /// spanning the interior, and the epilogue.
  ///
  /// Does nothing if the heap is already initialized. If the source refuses
  /// the grant the heap stays uninitialized and a later call tries again.
  pub fn initialize(&mut self) -> Result<()> {
    if self.region.is_some() {
      return Ok(());
    }

    let capacity = self.capacity;
    let minimum = 3 * HEADER_SIZE;
    if capacity < minimum {
      return Err(Error::CapacityTooSmall { capacity, minimum });
    }

    let Some(base) = self.source.grant(capacity) else {
      warn!("heap source refused {capacity} bytes");
      return Err(Error::GrantDenied { bytes: capacity });
    };

    if base.as_ptr() as usize % ALIGNMENT != 0 {
      warn!("heap source returned misaligned base {base:?}");
      return Err(Error::GrantDenied { bytes: capacity });
    }

    // SAFETY: the source hands out `capacity` writable bytes at `base` that
    // live as long as the source, which this heap owns.
    let mut region = unsafe { Region::new(base, capacity) };

    let first = Block::new(HEADER_SIZE);
    let epilogue = Block::new(capacity - HEADER_SIZE);

    region.set_header(PROLOGUE, Header::new(State::Taken, 0, None, Some(first)));
    region.set_header(
      first,
      Header::new(State::Free, capacity - minimum, Some(PROLOGUE), Some(epilogue)),
    );
    region.set_header(epilogue, Header::new(State::Taken, 0, Some(first), None));

    debug!(
      "heap initialized: {capacity} bytes at {base:?}, {} free",
      capacity - minimum
    );
    self.region = Some(region);

    Ok(())
  }

  /// Hands out at least `bytes` bytes aligned to [`ALIGNMENT`], taken from
  /// the smallest free block that can hold them.
  pub fn reserve(
    &mut self,
    bytes: usize,
  ) -> Result<NonNull<u8>> {
    if bytes == 0 {
      return Err(Error::ZeroSize);
    }

    self.initialize()?;
    let Some(region) = self.region.as_mut() else {
      return Err(Error::Uninitialized);
    };

    let size = checked_align(bytes).ok_or(Error::OutOfMemory { bytes })?;
    let Some((block, header)) = best_fit(region, size) else {
      trace!("reserve({bytes}): no free block holds {size} bytes");
      return Err(Error::OutOfMemory { bytes });
    };
    let (prev, next) = links(block, &header);

    let taken = if header.size - size >= HEADER_SIZE + ALIGNMENT {
      let rest = Block::new(block.end(size));
      let rest_size = header.size - size - HEADER_SIZE;

      region.set_header(rest, Header::new(State::Free, rest_size, Some(prev), Some(next)));
      link(region, prev, rest);
      link(region, rest, next);

      trace!("reserve({bytes}): split {block} ({}) into {size} + {rest} ({rest_size})", header.size);
      size
    } else {
      link(region, prev, next);

      trace!("reserve({bytes}): took all of {block} ({})", header.size);
      header.size
    };

    region.set_header(block, Header::new(State::Taken, taken, None, None));

    Ok(region.payload_of(block))
  }

  /// Returns a reserved block to the directory and coalesces it with any
  /// physically adjacent free neighbours.
  ///
  /// Pointers outside the region, misaligned pointers, and blocks that are
  /// not currently taken are rejected without touching the directory.
  ///
  /// # Safety
  ///
  /// `ptr` must have come from [`reserve`](Self::reserve) on this heap, and
  /// the caller must not use the payload afterwards. A pointer into the
  /// middle of a reserved payload can slip past the checks above and corrupt
  /// the heap.
  pub unsafe fn release(
    &mut self,
    ptr: NonNull<u8>,
  ) -> Result<()> {
    let Some(region) = self.region.as_mut() else {
      return Err(Error::Uninitialized);
    };

    let block = taken_block(region, ptr)?;
    let mut size = region.header(block).size;
    let (prev, mut next) = slot(region, block);

    let next_header = region.header(next);
    if next_header.is_free() && block.end(size) == next.offset() {
      trace!("release: {block} absorbs {next} ({})", next_header.size);
      size += HEADER_SIZE + next_header.size;
      next = links(next, &next_header).1;
    }

    let prev_header = region.header(prev);
    if prev_header.is_free() && prev.end(prev_header.size) == block.offset() {
      trace!("release: {prev} ({}) absorbs {block} ({size})", prev_header.size);
      region.update(prev, |h| {
        h.size += HEADER_SIZE + size;
        h.next = Some(next);
      });
      region.update(next, |h| h.prev = Some(prev));
      region.update(block, |h| h.state = State::Free);
    } else {
      trace!("release: {block} ({size}) back between {prev} and {next}");
      region.set_header(block, Header::new(State::Free, size, Some(prev), Some(next)));
      link(region, prev, block);
      link(region, block, next);
    }

    Ok(())
  }
}

/// Walks the block directory from the prologue to the epilogue.
pub(crate) struct Directory<'a> {
  region: &'a Region,
  cursor: Option<Block>,
}

impl<'a> Directory<'a> {
  pub fn new(region: &'a Region) -> Self {
    Self {
      region,
      cursor: Some(PROLOGUE),
    }
  }
}

impl Iterator for Directory<'_> {
  type Item = (Block, Header);

  fn next(&mut self) -> Option<Self::Item> {
    let block = self.cursor?;
    let header = self.region.header(block);
    self.cursor = header.next;
    Some((block, header))
  }
}

/// Smallest directory block holding at least `size` bytes; the first one
/// seen wins a tie. Sentinels have size zero and never qualify.
fn best_fit(
  region: &Region,
  size: usize,
) -> Option<(Block, Header)> {
  let mut best: Option<(Block, Header)> = None;

  for (block, header) in Directory::new(region) {
    debug_assert!(header.is_free() || header.size == 0);

    if header.size >= size && best.is_none_or(|(_, b)| header.size < b.size) {
      best = Some((block, header));
    }
  }

  best
}

/// Directory neighbours of `block`, which must be linked.
fn links(
  block: Block,
  header: &Header,
) -> (Block, Block) {
  match (header.prev, header.next) {
    (Some(prev), Some(next)) => (prev, next),
    _ => panic!("block {block} is not linked between the sentinels"),
  }
}

fn link(
  region: &mut Region,
  prev: Block,
  next: Block,
) {
  region.update(prev, |h| h.next = Some(next));
  region.update(next, |h| h.prev = Some(prev));
}

/// The directory nodes `block` sorts between. The prologue is always below
/// it and the epilogue always above, so the walk terminates.
fn slot(
  region: &Region,
  block: Block,
) -> (Block, Block) {
  let mut prev = PROLOGUE;
  let mut cursor = PROLOGUE;

  while cursor < block {
    prev = cursor;
    cursor = match region.header(cursor).next {
      Some(next) => next,
      None => panic!("directory ends before {block}"),
    };
  }

  (prev, cursor)
}

/// Recovers and validates the header in front of a payload pointer.
fn taken_block(
  region: &Region,
  ptr: NonNull<u8>,
) -> Result<Block> {
  let address = ptr.as_ptr() as usize;
  let offset = region.offset_of(ptr).ok_or(Error::OutOfRegion { address })?;

  if offset % ALIGNMENT != 0 {
    return Err(Error::Misaligned { address });
  }

  let epilogue = region.len() - HEADER_SIZE;
  if offset < 2 * HEADER_SIZE || offset > epilogue {
    return Err(Error::OutOfRegion { address });
  }

  let block = Block::new(offset - HEADER_SIZE);
  let header = region.header(block);

  if !matches!(header.state, State::Taken) {
    return Err(Error::NotTaken { address });
  }

  let fits = header.size > 0
    && header.size % ALIGNMENT == 0
    && header.size <= epilogue - offset;
  if !fits {
    return Err(Error::CorruptHeader { address });
  }

  Ok(block)
}
