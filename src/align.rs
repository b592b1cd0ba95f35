//! Byte-to-unit conversion.
//!
//! All allocator arithmetic happens in *header units*: one unit is
//! `size_of::<Header>()` bytes. A block's `size` field, a growth request,
//! and every pointer step taken while walking the free list are all
//! counted in these units rather than bytes.

use crate::block::Header;

/// The size, in bytes, of one allocation unit — the block header itself.
pub const UNIT: usize = core::mem::size_of::<Header>();

/// Converts a caller-supplied byte count into a unit count that includes
/// room for the block header.
///
/// `units = ceil(bytes / UNIT) + 1`, computed with checked arithmetic so a
/// request large enough to overflow the calculation yields `None` instead
/// of wrapping.
pub fn bytes_to_units(bytes: usize) -> Option<usize> {
  let rounded = bytes.checked_add(UNIT - 1)?;
  (rounded / UNIT).checked_add(1)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn zero_bytes_is_one_unit() {
    assert_eq!(bytes_to_units(0), Some(1));
  }

  #[test]
  fn rounds_up_to_next_unit_plus_header() {
    assert_eq!(bytes_to_units(1), Some(2));
    assert_eq!(bytes_to_units(UNIT), Some(2));
    assert_eq!(bytes_to_units(UNIT + 1), Some(3));
  }

  #[test]
  fn overflow_is_rejected() {
    assert_eq!(bytes_to_units(usize::MAX), None);
  }
}
