use std::{env, io::Read, ptr};

use fitalloc::{Heap, MAX_HEAP_SIZE, Sbrk, print_freelist};
use libc::sbrk;

/// Waits until the user presses ENTER, if the demo was started with `--step`.
/// Useful when you want to inspect memory state with tools like `pmap` or
/// `gdb` between steps.
fn pause(step: bool) {
  if step {
    println!("\n>>> Press ENTER to continue...");
    let _ = std::io::stdin().bytes().next();
  }
}

/// Prints the current program break using `sbrk(0)`.
unsafe fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { sbrk(0) },
  );
}

fn main() -> Result<(), fitalloc::Error> {
  env_logger::init();

  let step = env::args().any(|arg| arg == "--step");
  let capacity = env::args()
    .skip(1)
    .find_map(|arg| arg.parse::<usize>().ok())
    .unwrap_or(MAX_HEAP_SIZE);

  let mut heap = Heap::with_capacity(Sbrk, capacity);

  unsafe {
    print_program_break("start");

    // --------------------------------------------------------------------
    // 1) Set up the heap: one sbrk call, two sentinels, one free block.
    // --------------------------------------------------------------------
    heap.initialize()?;
    println!("\n[1] Initialized a {}-byte heap", heap.capacity());
    print_program_break("after initialize");
    print_freelist(&heap);
    pause(step);

    // --------------------------------------------------------------------
    // 2) Reserve a few blocks and write into them.
    // --------------------------------------------------------------------
    let first = heap.reserve(4)?.cast::<u32>();
    first.write(0xDEADBEEF);
    println!("\n[2] Reserved u32 at {:?}, value = 0x{:X}", first, first.read());

    let second = heap.reserve(12)?;
    ptr::write_bytes(second.as_ptr(), 0xAB, 12);
    println!("[2] Reserved 12 bytes at {:?} (rounded up to the alignment)", second);

    let third = heap.reserve(64)?;
    println!("[2] Reserved 64 bytes at {:?}", third);
    print_freelist(&heap);
    pause(step);

    // --------------------------------------------------------------------
    // 3) Release the middle block: it rejoins the directory on its own,
    //    since both physical neighbours are taken.
    // --------------------------------------------------------------------
    heap.release(second)?;
    println!("\n[3] Released {:?}", second);
    print_freelist(&heap);
    pause(step);

    // --------------------------------------------------------------------
    // 4) A small request is served from the hole, the best fit.
    // --------------------------------------------------------------------
    let fourth = heap.reserve(2)?;
    println!(
      "\n[4] Reserved 2 bytes at {:?}: {}",
      fourth,
      if fourth == second {
        "reused the released block"
      } else {
        "placed somewhere else"
      }
    );
    pause(step);

    // --------------------------------------------------------------------
    // 5) Release everything: neighbours coalesce back into one free block.
    // --------------------------------------------------------------------
    heap.release(first.cast())?;
    heap.release(fourth)?;
    heap.release(third)?;
    println!("\n[5] Released everything, {} bytes free", heap.free_bytes());
    print_freelist(&heap);

    // --------------------------------------------------------------------
    // 6) The region is never handed back; the OS reclaims it at exit.
    // --------------------------------------------------------------------
    print_program_break("end");
  }

  Ok(())
}
