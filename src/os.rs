//! OS growth path.
//!
//! Memory is acquired from the operating system through the classic
//! "extend the data segment by a signed byte count, return the previous
//! end, return a sentinel on failure" primitive — `sbrk(2)` on the real
//! system. The allocator treats this as an external collaborator it
//! merely serializes access to, which is the license for the [`OsHeap`]
//! trait below: production code always talks to [`SystemHeap`], tests talk
//! to a deterministic double instead of racing on the process's real break
//! across the test binary's threads.

use std::mem;
use std::sync::Mutex;

use crate::align::UNIT;
use crate::block::Header;

/// Below this many units, a growth request is rounded up (the
/// minimum-growth policy) to amortize the cost of the syscall. Chosen as a
/// page-friendly value.
pub(crate) const MIN_ALLOC: usize = 1024;

/// The sentinel `sbrk` returns on failure, reinterpreted as a byte
/// pointer — the classic `usize::MAX as *mut c_void` check.
pub(crate) const FAILED: *mut u8 = usize::MAX as *mut u8;

/// Abstraction over the single OS primitive this crate needs: extend (or,
/// in principle, shrink — the allocator never actually does) the
/// managed region by a signed byte count.
pub trait OsHeap: Send + Sync {
  /// # Safety
  /// Implementations typically wrap a raw syscall; callers must serialize
  /// access themselves (this crate does so via [`SBRK_LOCK`]) since the
  /// underlying resource — the process data segment — is process-global.
  unsafe fn sbrk(&self, increment: isize) -> *mut u8;
}

/// The real `sbrk(2)` binding.
pub struct SystemHeap;

impl OsHeap for SystemHeap {
  unsafe fn sbrk(&self, increment: isize) -> *mut u8 {
    unsafe { libc::sbrk(increment as libc::intptr_t) as *mut u8 }
  }
}

/// `M_sbrk`: the single dedicated mutex serializing every OS-growth call,
/// shared by both allocator variants so that at most one thread is ever
/// extending the segment at a time regardless of which arena triggered the
/// growth.
static SBRK_LOCK: Mutex<SystemHeap> = Mutex::new(SystemHeap);

/// Scales a growth request up to the minimum-growth policy:
/// `u * (MIN_ALLOC / u)`, the largest multiple of `u` not exceeding
/// `MIN_ALLOC`, when `u` is below `MIN_ALLOC`.
fn growth_units(requested: usize) -> usize {
  if requested >= MIN_ALLOC { requested } else { requested * (MIN_ALLOC / requested) }
}

/// Requests at least `units` worth of fresh memory from the OS and wraps
/// it as a single, unlinked free block tagged for thread `tid` (zero in
/// the locked variant). Returns `None` on growth failure or on overflow
/// while converting the grown unit count to bytes — in both cases no
/// state has changed and the caller may retry later.
///
/// This function touches only `M_sbrk`, never the free-list mutex —
/// centralizing that discipline here is what keeps the locked variant
/// from ever holding both locks at once.
pub(crate) fn grow(units: usize, tid: u64) -> Option<*mut Header> {
  grow_with(&*SBRK_LOCK.lock().unwrap(), units, tid)
}

/// Stakes out the arena's sentinel via the OS-growth primitive itself,
/// rather than through ordinary heap allocation.
///
/// A freshly-constructed [`crate::arena::Arena`] has no sentinel yet; it
/// gets one lazily, on first use, by asking the OS for exactly one unit —
/// just enough to host the header, no payload. The point of going through
/// `sbrk` for this (instead of, say, `Box::new`) is that `sbrk` only ever
/// grows the segment upward: whatever address it returns here is
/// guaranteed to be lower than every subsequent growth for this arena,
/// which is exactly the ordering the cyclic free list needs from its
/// anchor (the wrap-point invariant) without having to know anything
/// about where Rust's own global allocator happens to place its heap
/// allocations relative to the data segment.
pub(crate) fn stake_sentinel(tid: u64) -> Option<*mut Header> {
  stake_sentinel_with(&*SBRK_LOCK.lock().unwrap(), tid)
}

/// Same as [`stake_sentinel`] but against an explicit [`OsHeap`].
pub(crate) fn stake_sentinel_with(os: &dyn OsHeap, tid: u64) -> Option<*mut Header> {
  let prev = unsafe { os.sbrk(UNIT as isize) };
  if prev == FAILED {
    return None;
  }
  let header = prev as *mut Header;
  unsafe {
    (*header).size = 0;
    (*header).tid = tid;
    (*header).next = header;
  }
  Some(header)
}

/// Same as [`grow`] but against an explicit [`OsHeap`], so tests can drive
/// the engine without touching the real process break.
pub(crate) fn grow_with(os: &dyn OsHeap, units: usize, tid: u64) -> Option<*mut Header> {
  let target_units = growth_units(units);
  let bytes = target_units.checked_mul(UNIT)?;

  let prev = unsafe { os.sbrk(bytes as isize) };
  if prev == FAILED {
    log::debug!("os growth failed: requested {target_units} units ({bytes} bytes)");
    return None;
  }

  log::debug!("os growth: requested {units} units, granted {target_units} units at {prev:p}");

  let header = prev as *mut Header;
  unsafe {
    (*header).size = target_units;
    (*header).tid = tid;
    (*header).next = std::ptr::null_mut();
  }
  Some(header)
}


#[cfg(test)]
mod tests {
  use super::mock::MockHeap;
  use super::*;

  #[test]
  fn small_requests_are_scaled_to_min_alloc() {
    assert_eq!(growth_units(1), MIN_ALLOC);
    assert_eq!(growth_units(MIN_ALLOC / 3), (MIN_ALLOC / 3) * (MIN_ALLOC / (MIN_ALLOC / 3)));
  }

  #[test]
  fn requests_at_or_above_min_alloc_are_unscaled() {
    assert_eq!(growth_units(MIN_ALLOC), MIN_ALLOC);
    assert_eq!(growth_units(MIN_ALLOC * 4), MIN_ALLOC * 4);
  }

  #[test]
  fn grow_with_mock_returns_a_wrapped_free_block() {
    let heap = MockHeap::with_capacity(1 << 20);
    let header = grow_with(&heap, 8, 7).expect("growth should succeed");
    unsafe {
      assert!((*header).size >= MIN_ALLOC);
      assert_eq!((*header).tid, 7);
    }
  }

  #[test]
  fn grow_with_mock_fails_past_capacity() {
    let heap = MockHeap::with_capacity(mem::size_of::<Header>() * 4);
    assert!(grow_with(&heap, 1, 0).is_none());
  }

  #[test]
  fn staked_sentinel_is_zero_sized_and_self_looped() {
    let heap = MockHeap::with_capacity(1 << 16);
    let sentinel = stake_sentinel_with(&heap, 3).expect("staking should succeed");
    unsafe {
      assert_eq!((*sentinel).size, 0);
      assert_eq!((*sentinel).next, sentinel);
      assert_eq!((*sentinel).tid, 3);
    }
  }

  #[test]
  fn sentinel_is_staked_below_every_later_growth() {
    let heap = MockHeap::with_capacity(1 << 16);
    let sentinel = stake_sentinel_with(&heap, 0).expect("staking should succeed");
    let block = grow_with(&heap, 8, 0).expect("growth should succeed");
    assert!((sentinel as usize) < (block as usize));
  }
}
