use crate::{
    decode::{read_payload, DecodeError},
    instruction::{CodeRange, Instruction},
    Color, PixelContext, Run,
};
use core::fmt;
use std::io::Cursor;

const MASK_R: u8 = 0b1000;
const MASK_G: u8 = 0b0100;
const MASK_B: u8 = 0b0010;
const MASK_A: u8 = 0b0001;

/// Emits the literal values of only those channels that changed.
///
/// ```plain
/// .- MASKA ------------------.---------.---------.---------.---------.
/// |         Byte[0]          | (R)     | (G)     | (B)     | (A)     |
/// |--------------------------+---------+---------+---------+---------|
/// | code offset + r g b a    | present only for set mask bits        |
/// `------------------------------------------------------------------`
/// ```
///
/// Without alpha, the always-zero alpha bit is dropped so the instruction only needs 8 codes, and
/// any change of alpha is rejected. A pixel without changes is rejected as well. The first code of
/// the window is therefore never emitted by the no-alpha variant.
#[derive(Debug, Clone)]
pub struct MaskInstruction {
    alpha: bool,
    range: CodeRange,
}

impl MaskInstruction {
    pub const fn new(alpha: bool) -> Self {
        Self {
            alpha,
            range: CodeRange::new(0, 1),
        }
    }

    #[inline]
    fn mask_to_code(&self, mask: u8) -> u8 {
        let bits = if self.alpha { mask } else { mask >> 1 };
        self.range.offset + bits
    }

    #[inline]
    fn code_to_mask(&self, code: u8) -> u8 {
        let bits = code - self.range.offset;
        if self.alpha {
            bits & 0b1111
        } else {
            (bits & 0b111) << 1
        }
    }
}

impl Instruction for MaskInstruction {
    fn fixed_code_count(&self) -> u32 {
        if self.alpha {
            16
        } else {
            8
        }
    }

    fn min_size(&self) -> usize {
        2
    }

    fn max_size(&self) -> usize {
        if self.alpha {
            5
        } else {
            4
        }
    }

    fn set_code_range(&mut self, range: CodeRange) {
        self.range = range;
    }

    fn code_range(&self) -> CodeRange {
        self.range
    }

    fn encode(&mut self, pixel: &PixelContext, scratch: &mut [u8]) -> Option<usize> {
        let delta = pixel.delta;
        if !self.alpha && delta.da != 0 {
            return None;
        }

        let color = pixel.current;
        let channels = [
            (delta.dr, color.r, MASK_R),
            (delta.dg, color.g, MASK_G),
            (delta.db, color.b, MASK_B),
            (delta.da, color.a, MASK_A),
        ];

        let mut mask = 0;
        let mut len = 1;
        for (diff, value, bit) in channels {
            if diff != 0 {
                scratch[len] = value;
                mask |= bit;
                len += 1;
            }
        }

        if mask == 0 {
            return None;
        }

        scratch[0] = self.mask_to_code(mask);
        Some(len)
    }

    fn decode(
        &mut self,
        code: u8,
        src: &mut Cursor<&[u8]>,
        last: Color,
    ) -> Result<Run, DecodeError> {
        let mask = self.code_to_mask(code);

        let mut payload = [0; 4];
        let payload = &mut payload[..mask.count_ones() as usize];
        read_payload(src, payload)?;

        let mut values = payload.iter().copied();
        let mut channel = |bit: u8, unchanged: u8| {
            if mask & bit != 0 {
                values.next().unwrap_or(unchanged)
            } else {
                unchanged
            }
        };

        let r = channel(MASK_R, last.r);
        let g = channel(MASK_G, last.g);
        let b = channel(MASK_B, last.b);
        let a = channel(MASK_A, last.a);

        Ok(Run::single(Color::new(r, g, b, a)))
    }

    fn can_repeat_bytes(&self) -> bool {
        true
    }

    fn parameters(&self, datagram: &[u8]) -> Vec<i32> {
        let mask = self.code_to_mask(datagram[0]);
        core::iter::once(i32::from(mask))
            .chain(datagram[1..].iter().map(|&v| i32::from(v)))
            .collect()
    }
}

impl fmt::Display for MaskInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.alpha { "MASKA" } else { "MASK" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(mask: &mut MaskInstruction, previous: Color, current: Color) -> Option<Vec<u8>> {
        let mut scratch = [0; 5];
        let len = mask.encode(&PixelContext::new(previous, current), &mut scratch)?;

        let mut src = Cursor::new(&scratch[1..len]);
        let run = mask.decode(scratch[0], &mut src, previous).unwrap();
        assert_eq!(run.color, current);
        assert_eq!(src.position() as usize, len - 1);

        Some(scratch[..len].to_vec())
    }

    #[test]
    fn emits_changed_channels_in_order() {
        let mut mask = MaskInstruction::new(true);
        mask.set_code_range(CodeRange::new(16, 16));

        let previous = Color::new(1, 2, 3, 4);
        let datagram = roundtrip(&mut mask, previous, Color::new(9, 2, 7, 4)).unwrap();
        assert_eq!(datagram, [16 + 0b1010, 9, 7]);

        let datagram = roundtrip(&mut mask, previous, Color::new(9, 8, 7, 6)).unwrap();
        assert_eq!(datagram, [16 + 0b1111, 9, 8, 7, 6]);
    }

    #[test]
    fn rejects_unchanged_pixels() {
        let mut mask = MaskInstruction::new(true);
        let color = Color::new(1, 2, 3, 4);
        assert!(roundtrip(&mut mask, color, color).is_none());
    }

    #[test]
    fn compacted_masks_without_alpha_are_lossless() {
        let mut mask = MaskInstruction::new(false);
        mask.set_code_range(CodeRange::new(100, 8));

        let previous = Color::new(10, 20, 30, 255);
        for bits in 1u8..8 {
            let current = Color::new(
                if bits & 0b100 != 0 { 11 } else { 10 },
                if bits & 0b010 != 0 { 21 } else { 20 },
                if bits & 0b001 != 0 { 31 } else { 30 },
                255,
            );

            let datagram = roundtrip(&mut mask, previous, current).unwrap();
            assert_eq!(datagram[0], 100 + bits);
            assert_eq!(datagram.len(), 1 + bits.count_ones() as usize);
        }

        // no alpha bits: alpha changes are left to other instructions
        assert!(roundtrip(&mut mask, previous, Color::new(10, 20, 30, 0)).is_none());
    }
}
