//! The lock-free, per-thread variant: each thread owns a private arena in
//! thread-local storage, reached without ever touching the locked
//! variant's `M_list`. Only OS growth still serializes, on the shared
//! `M_sbrk` in [`crate::os`] — the one contention point that can't be
//! avoided, since the process has exactly one data segment.
//!
//! Every block a thread's arena ever holds is tagged with that thread's
//! id. [`free_nolock`] checks the tag before touching anything: a pointer
//! allocated on another thread is dropped silently rather than inserted
//! into the wrong arena, which would corrupt both arenas' address
//! ordering.

use std::cell::RefCell;
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::align::bytes_to_units;
use crate::arena::Arena;
use crate::block::Header;
use crate::os;

static NEXT_TID: AtomicU64 = AtomicU64::new(1);

thread_local! {
  static TID: u64 = NEXT_TID.fetch_add(1, Ordering::Relaxed);
  static LOCAL_ARENA: RefCell<Arena> = RefCell::new(Arena::new(current_tid()));
}

/// A stable identifier for the calling thread, assigned on first use and
/// held for the thread's lifetime. `std::thread::ThreadId` doesn't expose
/// a numeric form on stable Rust, so this crate mints its own.
fn current_tid() -> u64 {
  TID.with(|tid| *tid)
}

/// Allocation on the calling thread's own arena; never touches `M_list`.
/// Returns null on overflow or OS-growth failure.
pub fn alloc_nolock(bytes: usize) -> *mut u8 {
  let Some(units) = bytes_to_units(bytes) else {
    return ptr::null_mut();
  };
  let tid = current_tid();

  LOCAL_ARENA.with(|cell| {
    let mut arena = cell.borrow_mut();

    if !arena.is_init() {
      let Some(sentinel) = os::stake_sentinel(tid) else {
        return ptr::null_mut();
      };
      arena.init_with(sentinel);
    }

    loop {
      if let Some(header) = arena.try_best_fit(units) {
        return Header::payload(header);
      }
      match os::grow(units, tid) {
        Some(header) => arena.insert_coalesce(header),
        None => return ptr::null_mut(),
      }
    }
  })
}

/// Frees a payload previously returned by [`alloc_nolock`]. Must be
/// called on the same thread that allocated it; a call from any other
/// thread is silently dropped rather than inserted into this thread's
/// arena.
///
/// # Safety
/// `payload` must have been returned by `alloc_nolock` (on some thread)
/// and not freed since.
pub unsafe fn free_nolock(payload: *mut u8) {
  if payload.is_null() {
    return;
  }
  let tid = current_tid();
  let header = unsafe { Header::of(payload) };

  LOCAL_ARENA.with(|cell| {
    let owner = unsafe { (*header).tid };
    if owner != tid {
      log::warn!("dropping free of a pointer owned by thread {owner} on thread {tid}");
      return;
    }
    cell.borrow_mut().insert_coalesce(header);
  });
}
