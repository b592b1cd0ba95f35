//! The locked variant: one shared arena, one mutex (`M_list`) guarding it,
//! `M_sbrk` (owned by [`crate::os`]) serializing OS growth.
//!
//! ```text
//!   alloc_locked(n)
//!        │
//!        ▼
//!   lock(M_list) ──▶ best-fit / carve ──▶ hit? ──yes──▶ unlock, return
//!                          │
//!                          no
//!                          ▼
//!                 unlock(M_list)            ◀── never hold both locks
//!                          │                     at once
//!                          ▼
//!                    os growth (M_sbrk)
//!                          │
//!                          ▼
//!                 lock(M_list) again
//!                          │
//!                          ▼
//!                 insert + retry search
//! ```

use std::ptr;
use std::sync::{Mutex, OnceLock};

use crate::align::bytes_to_units;
use crate::arena::Arena;
use crate::block::Header;
use crate::os;

struct LockedAllocator {
  list: Mutex<Arena>,
}

static ALLOCATOR: OnceLock<LockedAllocator> = OnceLock::new();

fn allocator() -> &'static LockedAllocator {
  ALLOCATOR.get_or_init(|| LockedAllocator { list: Mutex::new(Arena::new(0)) })
}

/// Thread-safe allocation via the global mutex. Returns null on overflow
/// or OS-growth failure; never panics on a well-formed request.
pub fn alloc_locked(bytes: usize) -> *mut u8 {
  let Some(units) = bytes_to_units(bytes) else {
    return ptr::null_mut();
  };

  let allocator = allocator();
  let mut guard = allocator.list.lock().unwrap();

  if !guard.is_init() {
    // M_list must not be held across a call into the OS-growth primitive —
    // staking the sentinel takes M_sbrk internally, so drop the free-list
    // lock first and re-check after re-acquiring it, the same way the
    // retry loop below does for ordinary growth.
    drop(guard);
    let sentinel = os::stake_sentinel(0);
    guard = allocator.list.lock().unwrap();
    match sentinel {
      Some(sentinel) => guard.init_with(sentinel),
      None => return ptr::null_mut(),
    }
  }

  loop {
    if let Some(header) = guard.try_best_fit(units) {
      return Header::payload(header);
    }

    // M_list must not be held across the OS-growth call: growth
    // serializes on the separate M_sbrk lock, and holding both at once
    // risks a nested-lock deadlock.
    drop(guard);
    let grown = os::grow(units, 0);
    guard = allocator.list.lock().unwrap();

    match grown {
      Some(header) => guard.insert_coalesce(header),
      None => return ptr::null_mut(),
    }
  }
}

/// Frees a payload previously returned by [`alloc_locked`].
///
/// # Safety
/// `payload` must have been returned by `alloc_locked` on this allocator
/// and not freed since. Passing any other pointer is undefined behavior.
pub unsafe fn free_locked(payload: *mut u8) {
  if payload.is_null() {
    return;
  }
  let allocator = allocator();
  let mut guard = allocator.list.lock().unwrap();
  unsafe { guard.free(payload) };
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn round_trips_a_handful_of_sizes() {
    let mut ptrs = Vec::new();
    for size in [1usize, 8, 64, 256, 4096] {
      let p = alloc_locked(size);
      assert!(!p.is_null(), "allocation of {size} bytes failed");
      unsafe { ptr::write_bytes(p, 0xAB, size) };
      ptrs.push((p, size));
    }
    for (p, size) in &ptrs {
      unsafe { assert_eq!(std::slice::from_raw_parts(*p, *size)[0], 0xAB) };
    }
    for (p, _) in ptrs {
      unsafe { free_locked(p) };
    }
  }

  #[test]
  fn freeing_null_is_a_noop() {
    unsafe { free_locked(ptr::null_mut()) };
  }

  #[test]
  fn zero_byte_request_still_returns_a_usable_pointer() {
    let p = alloc_locked(0);
    assert!(!p.is_null());
    unsafe { free_locked(p) };
  }

  #[test]
  fn overflowing_request_returns_null() {
    assert!(alloc_locked(usize::MAX).is_null());
  }
}
