//! The free-list engine: the circular, address-ordered free list; best-fit
//! search; split-from-tail carving; and address-ordered insertion with
//! two-sided coalescing. This is the core the rest of the crate is built
//! around — everything in [`crate::locked`] and [`crate::nolock`] is a
//! thin concurrency discipline wrapped around one [`Arena`] each.
//!
//! An `Arena` knows nothing about mutexes or threads; it is a plain,
//! single-threaded data structure. That separation is what lets both
//! concurrency variants share this exact engine.

use std::ptr;

use crate::block::Header;

/// A circular, address-ordered free list plus its sentinel.
///
/// ```text
///           head
///            │
///            ▼
///   ┌──────┐   ┌──────┐   ┌──────┐
///   │ base │──▶│  b1  │──▶│  b2  │──┐
///   │ sz=0 │   └──────┘   └──────┘  │
///   └──────┘▲                      │
///            └──────────────────────┘
/// ```
///
/// `base` is the zero-sized sentinel: a permanent list
/// member whose payload is never handed out, used as a stable entry point
/// and as the anchor the cyclic comparisons are made relative to. It is
/// placed lazily, via [`crate::os::stake_sentinel`], the first time this
/// arena is used — see that function's docs for why going through the
/// OS-growth primitive (rather than an ordinary Rust heap allocation)
/// matters for keeping the address-order invariant well-founded.
pub struct Arena {
  base: *mut Header,
  /// Cursor used to give the next search locality; always a live member
  /// of the list once initialized, never dangling.
  head: *mut Header,
  tid: u64,
}

// SAFETY: an `Arena`'s raw pointers all point into memory obtained from
// the OS-growth primitive and linked into this arena's own list. Sending
// it to another thread is sound as long as access is externally
// synchronized, which both the locked and per-thread variants guarantee
// (a `Mutex<Arena>` and one arena per thread respectively).
unsafe impl Send for Arena {}

impl Arena {
  /// Builds an arena with no sentinel yet. Call [`Arena::init_with`]
  /// before using it.
  pub fn new(tid: u64) -> Self {
    Self { base: ptr::null_mut(), head: ptr::null_mut(), tid }
  }

  /// Whether the sentinel has been staked out yet (on first allocation).
  pub fn is_init(&self) -> bool {
    !self.base.is_null()
  }

  /// Completes lazy sentinel placement. A no-op if already initialized.
  /// The caller is responsible for obtaining `sentinel` from
  /// [`crate::os::stake_sentinel`] (or an equivalent in tests).
  pub fn init_with(&mut self, sentinel: *mut Header) {
    if self.is_init() {
      return;
    }
    self.base = sentinel;
    self.head = sentinel;
  }

  /// Best-fit search followed by split-from-tail carving when the match
  /// isn't exact.
  ///
  /// Walks the cyclic list starting one past `head`, tracking the
  /// smallest block whose size is at least `units` (ties go to whichever
  /// was seen first). Two things can end the walk early:
  ///
  /// * an **exact** match (`size == units`) is unlinked and returned on
  ///   the spot, without finishing the lap;
  /// * otherwise, the walk runs for exactly one full lap (it stops the
  ///   moment it revisits `head`) and, if a candidate was recorded,
  ///   carves it.
  ///
  /// Returns `None` if no block anywhere in the arena is big enough —
  /// the caller is expected to grow the arena via [`crate::os::grow`] and
  /// retry, which is guaranteed to terminate.
  ///
  /// # Panics
  /// Debug-asserts if called before [`Arena::init_with`].
  pub fn try_best_fit(&mut self, units: usize) -> Option<*mut Header> {
    debug_assert!(self.is_init(), "arena used before its sentinel was staked");
    unsafe {
      let head = self.head;
      let mut prev = head;
      let mut cur = (*prev).next;

      let mut best: Option<*mut Header> = None;
      let mut best_prev: *mut Header = ptr::null_mut();

      loop {
        if (*cur).size >= units {
          if (*cur).size == units {
            (*prev).next = (*cur).next;
            self.head = prev;
            return Some(cur);
          }
          if best.is_none_or(|b| (*cur).size < (*b).size) {
            best = Some(cur);
            best_prev = prev;
          }
        }

        if cur == head {
          break;
        }
        prev = cur;
        cur = (*cur).next;
      }

      best.map(|block| self.carve(best_prev, block, units))
    }
  }

  /// Splits `best` (of size `B`, preceded in the list by `prev`) by
  /// carving `units` off its high-address end: `best` shrinks in
  /// place to `B - units`, a fresh header of size `units` is written at
  /// `best + (B - units)`, and that new header is what's returned. `best`
  /// itself stays linked with its `next` untouched — only its `size`
  /// field changes — so the common path never has to patch the
  /// surrounding list pointers.
  unsafe fn carve(&mut self, prev: *mut Header, best: *mut Header, units: usize) -> *mut Header {
    unsafe {
      let remaining = (*best).size - units;
      (*best).size = remaining;

      let carved = best.add(remaining);
      (*carved).size = units;
      (*carved).tid = (*best).tid;

      self.head = prev;
      carved
    }
  }

  /// Frees a previously allocated payload pointer: recovers its
  /// header and hands it to [`Arena::insert_coalesce`].
  ///
  /// # Safety
  /// `payload` must have been returned by this arena's allocation path and
  /// not freed since.
  pub unsafe fn free(&mut self, payload: *mut u8) {
    let header = unsafe { Header::of(payload) };
    self.insert_coalesce(header);
  }

  /// Address-ordered insertion with two-sided coalescing.
  ///
  /// Finds the unique free-list node `t` such that `a` (the block being
  /// freed) falls in the open cyclic interval `(t, t.next)`, then performs
  /// up to two merges:
  ///
  /// * **upper merge** — if `a`'s end touches `t.next`, `t.next` is
  ///   absorbed into `a`;
  /// * **lower merge** — if `t`'s end touches `a`, `a` (now possibly
  ///   already grown by the upper merge) is absorbed into `t`.
  ///
  /// The upper merge must run first: if both trigger, the lower merge
  /// folds `a` into `t` using `a`'s *already-updated* size and `next`, so
  /// the order here isn't cosmetic.
  pub fn insert_coalesce(&mut self, a: *mut Header) {
    debug_assert!(self.is_init(), "arena used before its sentinel was staked");
    unsafe {
      let mut t = self.head;
      loop {
        let tn = (*t).next;
        let normal_segment = t < tn && a > t && a < tn;
        let wrap_point = t >= tn && (a > t || a < tn);
        if normal_segment || wrap_point {
          break;
        }
        t = tn;
      }

      let tn = (*t).next;

      if a.add((*a).size) == tn {
        (*a).size += (*tn).size;
        (*a).next = (*tn).next;
      } else {
        (*a).next = tn;
      }

      if t.add((*t).size) == a {
        (*t).size += (*a).size;
        (*t).next = (*a).next;
      } else {
        (*t).next = a;
      }

      self.head = t;
      self.debug_check();
    }
  }

  /// Consistency walk, including the per-thread tagging check, compiled
  /// in for debug/test builds only — a no-op in release, same trade-off
  /// as `ralloc`'s `Bookkeeper::check()`.
  #[cfg(not(debug_assertions))]
  fn debug_check(&self) {}

  #[cfg(debug_assertions)]
  fn debug_check(&self) {
    unsafe {
      let head = self.head;
      let mut cur = head;
      let mut wraps = 0u32;
      let mut steps = 0u64;

      loop {
        let next = (*cur).next;
        assert!(!next.is_null(), "free list node has a null next pointer");

        if cur >= next {
          wraps += 1;
          assert!(wraps <= 1, "free list has more than one wrap point");
        } else {
          assert!(cur.add((*cur).size) < next, "adjacent free blocks were left contiguous");
        }
        assert_eq!((*cur).tid, self.tid, "block tagged for a different arena's thread");

        cur = next;
        steps += 1;
        assert!(steps <= 1_000_000, "free list does not appear to be cyclic");
        if cur == head {
          break;
        }
      }

      assert_eq!((*self.base).size, 0, "sentinel size must stay zero");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::os::grow_with;
  use crate::os::mock::MockHeap;
  use crate::os::stake_sentinel_with;

  fn init_arena(tid: u64, heap: &MockHeap) -> Arena {
    let mut arena = Arena::new(tid);
    let sentinel = stake_sentinel_with(heap, tid).expect("staking should succeed");
    arena.init_with(sentinel);
    arena
  }

  #[test]
  fn fresh_arena_has_no_candidate() {
    let heap = MockHeap::with_capacity(1 << 16);
    let mut arena = init_arena(0, &heap);
    assert!(arena.try_best_fit(4).is_none());
  }

  #[test]
  fn exact_fit_unlinks_down_to_sentinel_only() {
    let heap = MockHeap::with_capacity(1 << 16);
    let mut arena = init_arena(0, &heap);

    // Grow generously, then shrink the header to an exact known size so
    // the minimum-growth policy can't perturb this test's numbers.
    let block = grow_with(&heap, 64, 0).expect("mock growth should succeed");
    unsafe { (*block).size = 7 };
    arena.insert_coalesce(block);

    let got = arena.try_best_fit(7).expect("exact-sized block must be found");
    unsafe { assert_eq!((*got).size, 7) };

    // With the only real block removed, the arena holds just the sentinel.
    assert!(arena.try_best_fit(1).is_none());
  }

  #[test]
  fn best_fit_picks_the_smallest_block_that_still_fits() {
    let heap = MockHeap::with_capacity(1 << 20);
    let mut arena = init_arena(0, &heap);

    // Stage three disjoint free blocks of distinct sizes. Each grow_with
    // call requests more than it keeps, so what's left over after
    // shrinking the header keeps the blocks from butting up against each
    // other (and thus from coalescing back into one).
    let sizes = [4usize, 8, 16];
    let mut headers = Vec::new();
    for &size in &sizes {
      let block = grow_with(&heap, size + 64, 0).expect("growth should succeed");
      unsafe { (*block).size = size };
      headers.push(block);
    }
    for h in headers {
      arena.insert_coalesce(h);
    }

    let found = arena.try_best_fit(5).expect("a block of size >= 5 must exist");
    unsafe { assert_eq!((*found).size, 8) };
  }

  #[test]
  fn two_sided_coalesce_merges_three_into_one() {
    // Build three contiguous same-sized blocks by hand (as if carved from
    // one larger growth) and free them out of address order.
    let heap = MockHeap::with_capacity(1 << 16);
    let mut arena = init_arena(0, &heap);

    let whole = grow_with(&heap, 30, 0).expect("growth should succeed");
    let total_size = unsafe { (*whole).size };
    let third = total_size / 3;

    let a = whole;
    let b = unsafe { a.add(third) };
    let c = unsafe { b.add(third) };
    unsafe {
      (*a).size = third;
      (*b).size = third;
      (*c).size = total_size - 2 * third;
    }

    arena.insert_coalesce(a);
    arena.insert_coalesce(c);
    arena.insert_coalesce(b);

    // The arena should now contain exactly one non-sentinel free block
    // spanning the whole region.
    let found = arena.try_best_fit(total_size).expect("coalesced block must satisfy the whole size");
    unsafe { assert_eq!((*found).size, total_size) };
    assert!(arena.try_best_fit(1).is_none());
  }
}
