//! # fitalloc - A Best-Fit Heap in One Region
//!
//! This crate provides a `reserve` / `release` allocator that lives entirely
//! in user space on top of a single, fixed-size region requested once from
//! the environment (`sbrk(2)` by default).
//!
//! ## Overview
//!
//! Every block carries its header in-band, directly in front of the payload.
//! Free blocks are threaded into an address-ordered doubly linked list, the
//! *block directory*, bounded by two permanent sentinels:
//!
//! ```text
//!   Heap Region:
//!
//!   ┌──────────┬────────┬─────────┬────────┬─────────┬────────┬──────┬──────────┐
//!   │ Prologue │ Header │ Payload │ Header │ Payload │ Header │ Free │ Epilogue │
//!   │ taken, 0 │ taken  │  (A)    │ free   │         │ taken  │ ...  │ taken, 0 │
//!   └──────────┴────────┴─────────┴────────┴─────────┴────────┴──────┴──────────┘
//!        │                            ▲  │                                 ▲
//!        └────────────────────────────┘  └─────────────────────────────────┘
//!                     directory links (free blocks and sentinels only)
//! ```
//!
//! Taken blocks are physically present but unlinked, so the best-fit scan
//! only ever sees free blocks.
//!
//! ## Crate Structure
//!
//! ```text
//!   fitalloc
//!   ├── align      - Alignment macro (align!) and checked rounding
//!   ├── block      - Header format and block handles (internal)
//!   ├── region     - Bounds-checked header access (internal)
//!   ├── source     - HeapSource: Sbrk, Mmap, Buffer
//!   ├── heap       - Heap: initialize, reserve, release
//!   ├── dump       - Directory snapshots for debugging
//!   └── error      - Error type
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use fitalloc::{Buffer, Heap};
//!
//! let mut heap = Heap::with_capacity(Buffer::new(), 4096);
//!
//! let ptr = heap.reserve(64)?.cast::<u64>();
//! unsafe {
//!     ptr.write(42);
//!     assert_eq!(ptr.read(), 42);
//!     heap.release(ptr.cast())?;
//! }
//! # Ok::<(), fitalloc::Error>(())
//! ```
//!
//! ## How It Works
//!
//! `reserve(n)` rounds `n` up to [`ALIGNMENT`] and picks the smallest free
//! block that holds it. If enough is left over for another header and some
//! payload, the block is split and the remainder takes its place in the
//! directory:
//!
//! ```text
//!   Before:  ┌────────┬──────────────────────────────────┐
//!            │ Header │            free: S               │
//!            └────────┴──────────────────────────────────┘
//!
//!   After:   ┌────────┬───────────┬────────┬─────────────┐
//!            │ Header │ taken: n  │ Header │ free: S-n-H │
//!            └────────┴───────────┴────────┴─────────────┘
//!                     ▲
//!                     └── Pointer returned to user
//! ```
//!
//! `release(ptr)` puts the block back at its sorted position and merges it
//! with a physically adjacent free successor first, then with a physically
//! adjacent free predecessor.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: a [`Heap`] is neither `Send` nor `Sync`
//! - **Fixed size**: the region never grows and is never given back early
//! - **One alignment**: every payload is aligned to [`ALIGNMENT`]
//!
//! ## Safety
//!
//! `release` is `unsafe`: the pointer must come from `reserve` on the same
//! heap and must not be used afterwards. Obviously bad pointers (outside the
//! region, misaligned, already released) are reported as errors.

use std::mem;

pub mod align;
mod block;
mod dump;
mod error;
mod heap;
mod region;
mod source;

/// Every payload, and the header size, is a multiple of this.
pub const ALIGNMENT: usize = mem::size_of::<usize>();

/// Capacity of a heap built with [`Heap::new`] or [`Heap::default`].
pub const MAX_HEAP_SIZE: usize = 1024 * 1024;

pub use block::{HEADER_SIZE, State};
pub use dump::{Dump, Node, log_freelist, print_freelist};
pub use error::{Error, Result};
pub use heap::Heap;
pub use source::{Buffer, HeapSource, Mmap, Sbrk};
