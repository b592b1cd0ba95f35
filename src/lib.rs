//! # flalloc - A Free-List Memory Allocator
//!
//! This crate provides a **best-fit, address-ordered free-list allocator**
//! implemented in Rust, managing memory by extending the process's data
//! segment via the `sbrk` system call. It is the free-list counterpart to a
//! bump allocator: rather than only ever moving a pointer forward, it tracks
//! every freed block and reuses it.
//!
//! ## Overview
//!
//! ```text
//!   Free-List Allocator Concept:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                         HEAP MEMORY                                  │
//!   │                                                                      │
//!   │   ┌─────┐   ┌──────┐   ┌─────┐   ┌──────────┐   ┌──────────────────┐ │
//!   │   │ A1  │   │ free │   │ A3  │   │   free   │   │   Program Break  │ │
//!   │   └─────┘   └──────┘   └─────┘   └──────────┘   └──────────────────┘ │
//!   │                ▲                      ▲                             │
//!   │                └──── free list ───────┘  (address-ordered, cyclic)  │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   Freed blocks are kept on a list and reused by a later allocation that
//!   fits, rather than always growing the heap.
//! ```
//!
//! ## Crate structure
//!
//! ```text
//!   flalloc
//!   ├── align    - byte-to-unit conversion
//!   ├── block    - the in-band block header
//!   ├── os       - the sbrk-backed growth primitive, behind an OsHeap trait
//!   ├── arena    - the free-list engine: best-fit search, splitting, coalescing
//!   ├── locked   - the locked variant: one shared arena behind a mutex
//!   ├── nolock   - the per-thread variant: one arena per thread, no free-list lock
//!   └── global   - GlobalAlloc adapters over the two variants above
//! ```
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use flalloc::{alloc_locked, free_locked};
//!
//! let ptr = alloc_locked(64);
//! assert!(!ptr.is_null());
//! unsafe {
//!     ptr.write(42);
//!     free_locked(ptr);
//! }
//! ```
//!
//! Or, to make this the process's global allocator:
//!
//! ```rust,ignore
//! #[global_allocator]
//! static ALLOCATOR: flalloc::Locked = flalloc::Locked;
//! ```
//!
//! ## Two concurrency variants
//!
//! Both variants share the exact same single-threaded engine in
//! [`arena::Arena`]; they differ only in how concurrent access is
//! disciplined.
//!
//! * **Locked** ([`locked`]) — one arena, shared by every thread, guarded
//!   by a single mutex. Simple, always correct, but every allocation and
//!   free serializes on that one lock.
//! * **Per-thread** ([`nolock`]) — one private arena per thread, reached
//!   through thread-local storage. No free-list lock at all; a free must
//!   happen on the same thread that performed the matching allocation, or
//!   it is silently dropped rather than risking cross-arena corruption.
//!
//! Both still serialize on a single OS-growth mutex ([`os`]), since the
//! process has exactly one data segment to extend.
//!
//! ## How it works
//!
//! Memory is obtained from the OS in page-friendly chunks via `sbrk(2)`:
//!
//! ```text
//!   Program Memory Layout:
//!
//!   High Address ┌─────────────────────┐
//!                │       Stack         │ ↓ grows down
//!                │         │           │
//!                │         ▼           │
//!                │                     │
//!                │         ▲           │
//!                │         │           │
//!                │       Heap          │ ↑ grows up (sbrk)
//!                ├─────────────────────┤ ← Program Break
//!                │   Uninitialized     │
//!                │       Data          │
//!                ├─────────────────────┤
//!                │   Initialized       │
//!                │       Data          │
//!                ├─────────────────────┤
//!                │       Text          │
//!   Low Address  └─────────────────────┘
//! ```
//!
//! Every block, free or live, is preceded by a [`block::Header`]; sizes are
//! counted in header-sized units rather than bytes. Freed blocks are kept
//! on a circular, address-ordered list (see [`arena`] for the search,
//! split, and coalesce laws) rather than handed back to the OS.
//!
//! ## Limitations
//!
//! - **Unix-only**: requires `libc` and `sbrk` (POSIX systems).
//! - **Never shrinks**: memory returned to a free list is reused by later
//!   allocations but never returned to the OS.
//! - **Natural alignment only**: the payload is aligned to the header's own
//!   alignment, not to an arbitrary caller-requested alignment.
//! - **No realloc**: growing or shrinking an existing allocation in place
//!   is out of scope; [`global`]'s adapters fall back to the default
//!   allocate-copy-free behavior.
//!
//! ## Safety
//!
//! This crate is inherently unsafe, as it deals with raw memory management
//! and a raw OS primitive. Freeing an invalid pointer, double-freeing, or
//! freeing a per-thread allocation from the wrong thread are all undefined
//! behavior or (in the last case) a silently dropped free — see each
//! function's own safety docs.

mod align;
mod arena;
mod block;
mod global;
mod locked;
mod nolock;
mod os;

pub use global::{Locked, PerThread};
pub use locked::{alloc_locked, free_locked};
pub use nolock::{alloc_nolock, free_nolock};
