//! The in-band block header.

/// Metadata prepended to every block the engine manages, free or live.
///
/// `size_of::<Header>()` is the allocation unit: every block's `size`
/// field, and every growth request, is counted in multiples of this
/// struct's size rather than in bytes. The header is naturally aligned to
/// the platform's strictest scalar alignment, so the payload that follows
/// it inherits that alignment for free.
#[repr(C)]
pub struct Header {
  /// Next free block in cyclic, address-ordered order. Meaningless while
  /// the block is live (handed out to a caller).
  pub next: *mut Header,
  /// Total block size in units, header included.
  pub size: usize,
  /// Owning thread, set only by the per-thread variant. Zero and unused
  /// in the locked variant.
  pub tid: u64,
}

impl Header {
  /// The payload address: one unit past this header.
  pub fn payload(this: *mut Header) -> *mut u8 {
    unsafe { this.add(1) as *mut u8 }
  }

  /// Recovers the header for a payload pointer previously handed out by
  /// [`Header::payload`].
  ///
  /// # Safety
  /// `payload` must have been returned by a prior allocation from this
  /// engine and must not have been freed yet.
  pub unsafe fn of(payload: *mut u8) -> *mut Header {
    unsafe { (payload as *mut Header).sub(1) }
  }
}
