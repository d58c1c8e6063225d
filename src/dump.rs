use std::fmt;

use log::debug;

use crate::{
  block::State,
  heap::{Directory, Heap},
  source::HeapSource,
};

/// One directory node as seen by [`Heap::dump`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Node {
  /// Header offset from the start of the region.
  pub offset: usize,
  /// Header address.
  pub address: usize,
  pub size: usize,
  pub state: State,
  pub prev: Option<usize>,
  pub next: Option<usize>,
}

/// Snapshot of the block directory, prologue first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Dump {
  pub nodes: Vec<Node>,
}

impl Dump {
  pub fn free(&self) -> impl Iterator<Item = &Node> {
    self.nodes.iter().filter(|node| node.state == State::Free)
  }
}

impl<S: HeapSource> Heap<S> {
  /// Reads the directory without changing it. Empty before initialization.
  pub fn dump(&self) -> Dump {
    let Some(region) = self.region() else {
      return Dump::default();
    };

    let nodes = Directory::new(region)
      .map(|(block, header)| Node {
        offset: block.offset(),
        address: region.address(block.offset()),
        size: header.size,
        state: header.state,
        prev: header.prev.map(|prev| region.address(prev.offset())),
        next: header.next.map(|next| region.address(next.offset())),
      })
      .collect();

    Dump { nodes }
  }
}

fn link(address: Option<usize>) -> String {
  address.map_or_else(|| "nil".to_owned(), |address| format!("{address:#x}"))
}

impl fmt::Display for Node {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(
      f,
      "size: {}, taken: {}, head: {:#x}, prev: {}, next: {}",
      self.size,
      self.state == State::Taken,
      self.address,
      link(self.prev),
      link(self.next),
    )
  }
}

impl fmt::Display for Dump {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    for node in &self.nodes {
      writeln!(f, "\t{node}")?;
    }
    Ok(())
  }
}

/// Prints the block directory of `heap` to stdout.
pub fn print_freelist<S: HeapSource>(heap: &Heap<S>) {
  print!("{}", heap.dump());
}

/// Emits the block directory of `heap` at `debug` level, one record per node.
pub fn log_freelist<S: HeapSource>(heap: &Heap<S>) {
  for node in heap.dump().nodes {
    debug!("{node}");
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{HEADER_SIZE, source::Buffer};
  use test_log::test;

  #[test]
  fn test_dump_before_initialize_is_empty() {
    let heap = Heap::with_capacity(Buffer::new(), 1024);

    assert!(heap.dump().nodes.is_empty());
    assert_eq!(heap.dump().to_string(), "");
  }

  #[test]
  fn test_dump_lists_directory_in_order() {
    let mut heap = Heap::with_capacity(Buffer::new(), 1024);
    let ptr = heap.reserve(16).unwrap();

    let dump = heap.dump();
    let [prologue, free, epilogue] = dump.nodes.as_slice() else {
      panic!("expected three nodes, got {dump}");
    };

    assert_eq!(prologue.state, State::Taken);
    assert_eq!(prologue.prev, None);
    assert_eq!(prologue.next, Some(free.address));
    assert_eq!(free.address, ptr.as_ptr() as usize + 16);
    assert_eq!(free.prev, Some(prologue.address));
    assert_eq!(free.next, Some(epilogue.address));
    assert_eq!(epilogue.offset, 1024 - HEADER_SIZE);
    assert_eq!(epilogue.next, None);
    assert_eq!(dump.free().count(), 1);
  }

  #[test]
  fn test_dump_display() {
    let mut heap = Heap::with_capacity(Buffer::new(), 1024);
    heap.initialize().unwrap();

    let text = heap.dump().to_string();
    let lines: Vec<_> = text.lines().collect();

    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("\tsize: 0, taken: true, head: 0x"));
    assert!(lines[0].contains("prev: nil"));
    assert!(lines[1].starts_with(&format!("\tsize: {}, taken: false", 1024 - 3 * HEADER_SIZE)));
    assert!(lines[2].ends_with("next: nil"));

    log_freelist(&heap);
  }
}
