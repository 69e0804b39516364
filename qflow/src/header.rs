//! The image container around a stream.
//!
//! ```plain
//! .- Header ---------------------------------------------------------------------.
//! | magic "QOIF" | width: u32be | height: u32be | format: 2 bytes                |
//! |------------------------------------------------------------------------------|
//! | chain: u8 count, count * 3-byte entries (see InstructionKind::to_entry)      |
//! | lengths: u8 count, count * u8 explicit variable lengths                      |
//! `------------------------------------------------------------------------------`
//! ```
//!
//! The header is followed by the stream, which ends with the footer.

use core::fmt;

pub const MAGIC: &[u8; 4] = b"QOIF";

/// Largest accepted width and height.
pub const MAX_DIMENSION: u32 = 32768;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderInfo {
    pub width: u32,
    pub height: u32,
    pub format: ComponentFormat,
}

impl HeaderInfo {
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

pub(crate) fn valid_dimensions(width: u32, height: u32) -> bool {
    (1..=MAX_DIMENSION).contains(&width) && (1..=MAX_DIMENSION).contains(&height)
}

/// How many significant bits each channel of an image uses, counted from the top.
///
/// An image whose red values are all multiples of 8 only needs 5 bits of red, for example. A
/// channel that is 0 everywhere needs no bits at all. This is informational only; decoders don't
/// need it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComponentFormat {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl ComponentFormat {
    pub fn analyze(pixels: &[[u8; 4]]) -> Self {
        let used = pixels.iter().fold([0u8; 4], |mut used, pixel| {
            for (used, &value) in used.iter_mut().zip(pixel) {
                *used |= value;
            }
            used
        });

        let [r, g, b, a] = used.map(bits_required);
        Self { r, g, b, a }
    }

    pub fn to_bytes(self) -> [u8; 2] {
        [self.r << 4 | self.g, self.b << 4 | self.a]
    }

    pub fn from_bytes([rg, ba]: [u8; 2]) -> Self {
        Self {
            r: rg >> 4,
            g: rg & 0xF,
            b: ba >> 4,
            a: ba & 0xF,
        }
    }
}

#[inline]
fn bits_required(used: u8) -> u8 {
    if used == 0 {
        0
    } else {
        8 - used.trailing_zeros() as u8
    }
}

impl fmt::Display for ComponentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bits={}/{}/{}/{}", self.r, self.g, self.b, self.a)
    }
}
