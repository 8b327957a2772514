//! This module provides a set of shared, low-level utility functions used
//! throughout the vtile core.
//!
//! Every decoder threads a single `Cursor<&[u8]>` through its calls. The helpers
//! here are the only places that advance it by raw byte counts, so bounds
//! checking lives in one spot.

use std::io::Cursor;

use crate::error::VtileError;

//==================================================================================
// 1. Cursor Helpers
//==================================================================================

/// Returns the number of unread bytes behind the cursor.
pub fn remaining(cursor: &Cursor<&[u8]>) -> usize {
    let pos = cursor.position() as usize;
    cursor.get_ref().len().saturating_sub(pos)
}

/// Reads one byte and advances the cursor.
pub fn read_u8(cursor: &mut Cursor<&[u8]>) -> Result<u8, VtileError> {
    let bytes = take_bytes(cursor, 1)?;
    Ok(bytes[0])
}

/// Borrows the next `len` bytes and advances the cursor past them.
pub fn take_bytes<'a>(cursor: &mut Cursor<&'a [u8]>, len: usize) -> Result<&'a [u8], VtileError> {
    let pos = cursor.position() as usize;
    let buffer: &'a [u8] = cursor.get_ref();
    let end = pos.checked_add(len).ok_or_else(|| VtileError::Truncated {
        offset: pos,
        needed: len,
        available: buffer.len().saturating_sub(pos),
    })?;
    let bytes = buffer.get(pos..end).ok_or_else(|| VtileError::Truncated {
        offset: pos,
        needed: len,
        available: buffer.len().saturating_sub(pos),
    })?;
    cursor.set_position(end as u64);
    Ok(bytes)
}

/// Upper bound for a decoded element count, so a corrupt header cannot make a
/// decoder allocate or loop without limit.
pub const MAX_DECODED_VALUES: usize = 1 << 28;

/// Converts a count from a header into a `usize`, rejecting implausible values.
pub fn checked_count(count: u32, what: &str) -> Result<usize, VtileError> {
    let count = count as usize;
    if count > MAX_DECODED_VALUES {
        return Err(VtileError::Leb128DecodeError(format!(
            "{} count {} exceeds the maximum of {}",
            what, count, MAX_DECODED_VALUES
        )));
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_bytes_advances_and_bounds_checks() {
        let data = [1u8, 2, 3, 4];
        let mut cursor = Cursor::new(&data[..]);
        assert_eq!(take_bytes(&mut cursor, 3).unwrap(), &[1, 2, 3]);
        assert_eq!(remaining(&cursor), 1);
        let err = take_bytes(&mut cursor, 2).unwrap_err();
        assert!(matches!(err, VtileError::Truncated { offset: 3, needed: 2, available: 1 }));
        assert_eq!(read_u8(&mut cursor).unwrap(), 4);
        assert!(read_u8(&mut cursor).is_err());
    }
}
