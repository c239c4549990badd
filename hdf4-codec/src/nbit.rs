//! N-bit unpacking
//!
//! Each element keeps only `bit_length` bits, ending at `start_bit`
//! (bit 0 is the least significant). Packed fields are stored back to back,
//! most significant bit first. Unpacking puts each field back in place,
//! fills the other bits with zeros or ones, and optionally sign-extends.

use hdf4_format::{DataType, FormatError, NBitParams, Result};

fn low_mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Validated field geometry for one element type
#[derive(Debug, Clone, Copy)]
struct Field {
    size: usize,
    bits: u32,
    low: u32,
    top: u32,
}

impl Field {
    fn new(params: &NBitParams) -> Result<Self> {
        let size = DataType::from_number_type(params.number_type as u8)?.size();
        let width = (size * 8) as i32;
        let bits = params.bit_length;
        let top = params.start_bit;
        if bits <= 0 || bits > width || top < bits - 1 || top >= width {
            return Err(FormatError::Corrupt(format!(
                "N-bit field of {} bits at bit {} does not fit a {}-byte element",
                bits, top, size
            )));
        }
        Ok(Self {
            size,
            bits: bits as u32,
            low: (top - bits + 1) as u32,
            top: top as u32,
        })
    }

    fn element_mask(&self) -> u64 {
        low_mask(self.size as u32 * 8)
    }
}

struct BitReader<'a> {
    bytes: &'a [u8],
    bit: usize,
}

impl<'a> BitReader<'a> {
    fn read(&mut self, bits: u32) -> Option<u64> {
        if self.bit + bits as usize > self.bytes.len() * 8 {
            return None;
        }
        let mut value = 0u64;
        for _ in 0..bits {
            let byte = self.bytes[self.bit / 8];
            let set = (byte >> (7 - self.bit % 8)) & 1;
            value = (value << 1) | set as u64;
            self.bit += 1;
        }
        Some(value)
    }
}

/// Unpack N-bit data into `uncompressed_length` big-endian element bytes.
///
/// A short packed stream yields fewer elements.
pub fn unpack(packed: &[u8], params: &NBitParams, uncompressed_length: usize) -> Result<Vec<u8>> {
    let field = Field::new(params)?;
    let count = uncompressed_length / field.size;
    let element_mask = field.element_mask();
    let field_mask = low_mask(field.bits) << field.low;
    let base = if params.fill_one {
        element_mask & !field_mask
    } else {
        0
    };
    let above = element_mask & !low_mask(field.top + 1);

    let mut reader = BitReader {
        bytes: packed,
        bit: 0,
    };
    let mut out = Vec::with_capacity(count * field.size);
    for _ in 0..count {
        let Some(raw) = reader.read(field.bits) else {
            break;
        };
        let mut value = base | (raw << field.low);
        if params.sign_extend {
            if (raw >> (field.bits - 1)) & 1 == 1 {
                value |= above;
            } else {
                value &= !above;
            }
        }
        out.extend_from_slice(&value.to_be_bytes()[8 - field.size..]);
    }
    Ok(out)
}

/// Pack big-endian elements, keeping only the configured field.
///
/// The inverse of [`unpack`] for values that fit the field.
pub fn pack(elements: &[u8], params: &NBitParams) -> Result<Vec<u8>> {
    let field = Field::new(params)?;
    let mut out = Vec::new();
    let mut acc = 0u8;
    let mut filled = 0u32;
    for element in elements.chunks_exact(field.size) {
        let mut raw = [0u8; 8];
        raw[8 - field.size..].copy_from_slice(element);
        let value = (u64::from_be_bytes(raw) >> field.low) & low_mask(field.bits);
        for i in (0..field.bits).rev() {
            acc = (acc << 1) | ((value >> i) & 1) as u8;
            filled += 1;
            if filled == 8 {
                out.push(acc);
                acc = 0;
                filled = 0;
            }
        }
    }
    if filled > 0 {
        out.push(acc << (8 - filled));
    }
    Ok(out)
}
