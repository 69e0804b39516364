use byteorder::{BigEndian, ByteOrder};

/// The widest datagram a packed instruction can produce: 32 bits of fields plus the opcode bits.
pub const MAX_PACKED_SIZE: usize = 5;

/// Whether a signed value survives truncation to `bits` bits followed by sign extension.
#[inline]
pub const fn fits_signed(value: i32, bits: u8) -> bool {
    if bits == 0 {
        return value == 0;
    }

    let half = 1i32 << (bits - 1);
    -half <= value && value < half
}

/// Whether an unsigned value fits into `bits` bits.
#[inline]
pub const fn fits_unsigned(value: i32, bits: u8) -> bool {
    0 <= value && (value as i64) < (1i64 << bits)
}

/// Interprets the lowest `bits` bits of `raw` as a two's complement number. (N-bit numbers)
#[inline]
pub const fn sign_extend(raw: u64, bits: u8) -> i32 {
    if bits == 0 {
        return 0;
    }

    let shift = 64 - bits as u32;
    ((raw << shift) as i64 >> shift) as i32
}

#[inline]
const fn low_mask(bits: u8) -> u64 {
    (1u64 << bits) - 1
}

/// Layout of four bit fields inside one datagram.
///
/// Fields are packed with the first field in the most significant position and the fourth field
/// in the least significant position. The packed value is then written big-endian over
/// `num_bits / 8 + 1` bytes, so the leading (opcode) byte carries the topmost `num_bits % 8` bits.
/// The instruction owning the layout adds its code offset to that leading byte.
///
/// Example for widths 5, 6, 5, 4 (20 bits, 3 bytes, 16 codes):
///
/// ```plain
/// .- Byte[0] --------------.- Byte[1] --------------.- Byte[2] --------------.
/// |  7  6  5  4  3  2  1  0 |  7  6  5  4  3  2  1  0 |  7  6  5  4  3  2  1  0 |
/// | code offset + f0[4..1]  |f0[0]|       f1      |f2[4]|  f2[3..0]  |  f3[3..0]  |
/// `-----------------------------------------------------------------------------`
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLayout {
    bits: [u8; 4],
    shifts: [u32; 4],
    num_bits: u32,
    signed: bool,
}

impl FieldLayout {
    /// Creates a layout for the given field widths. Widths must not exceed 8 bits each.
    pub const fn new(bits: [u8; 4], signed: bool) -> Self {
        let shift3 = 0;
        let shift2 = shift3 + bits[3] as u32;
        let shift1 = shift2 + bits[2] as u32;
        let shift0 = shift1 + bits[1] as u32;
        let num_bits = shift0 + bits[0] as u32;

        Self {
            bits,
            shifts: [shift0, shift1, shift2, shift3],
            num_bits,
            signed,
        }
    }

    /// Number of bytes in one datagram, including the opcode byte.
    #[inline]
    pub const fn num_bytes(&self) -> usize {
        (self.num_bits / 8 + 1) as usize
    }

    /// Number of opcode values needed to carry the field bits that spill into the opcode byte.
    #[inline]
    pub const fn num_codes(&self) -> u32 {
        1 << (self.num_bits % 8)
    }

    /// Packs the fields, or returns `None` if any of them doesn't fit its width.
    ///
    /// A field of width 0 only fits the value 0.
    pub fn pack(&self, fields: [i32; 4]) -> Option<u64> {
        let mut packed = 0u64;

        for ((&value, &bits), &shift) in fields.iter().zip(&self.bits).zip(&self.shifts) {
            let fits = if self.signed {
                fits_signed(value, bits)
            } else {
                fits_unsigned(value, bits)
            };

            if !fits {
                return None;
            }

            packed |= (value as u64 & low_mask(bits)) << shift;
        }

        Some(packed)
    }

    /// Extracts the fields, sign extending them if this is a signed layout.
    pub fn unpack(&self, packed: u64) -> [i32; 4] {
        let mut fields = [0; 4];

        for ((field, &bits), &shift) in fields.iter_mut().zip(&self.bits).zip(&self.shifts) {
            let raw = (packed >> shift) & low_mask(bits);
            *field = if self.signed {
                sign_extend(raw, bits)
            } else {
                raw as i32
            };
        }

        fields
    }

    /// Writes a packed value as a datagram into `dst`, returning the number of bytes written.
    pub fn write(&self, packed: u64, code_offset: u8, dst: &mut [u8]) -> usize {
        let num_bytes = self.num_bytes();
        BigEndian::write_uint(&mut dst[..num_bytes], packed, num_bytes);

        // the leading byte is always below `num_codes()`, so this can't leave the code window
        dst[0] += code_offset;
        num_bytes
    }

    /// Reads a packed value back from a datagram. `datagram[0]` must already have the code offset
    /// subtracted.
    pub fn read(&self, datagram: &[u8]) -> u64 {
        let num_bytes = self.num_bytes();
        BigEndian::read_uint(&datagram[..num_bytes], num_bytes)
    }
}
