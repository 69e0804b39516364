use crate::{
    instruction::{
        packed::{PackedInstruction, PackedTransform},
        BitWidths,
    },
    ChromaDelta, Color, PixelContext, RawDelta,
};

/// Fields are the per-channel differences to the previous pixel: dr, dg, db, da.
#[derive(Debug, Clone, Copy)]
pub struct RawDeltaFields;

impl PackedTransform for RawDeltaFields {
    const NAME: &'static str = "DELTA";
    const SIGNED: bool = true;

    #[inline]
    fn fields(pixel: &PixelContext, _bits: BitWidths) -> Option<[i32; 4]> {
        // a zero-width alpha field only fits da == 0
        Some(pixel.delta.components())
    }

    #[inline]
    fn apply(fields: [i32; 4], _bits: BitWidths, last: Color) -> Color {
        RawDelta::from_components(fields).apply(last)
    }
}

/// Fields are the chroma-decorrelated differences to the previous pixel: dy, cb, cr, da.
///
/// The bit widths are assigned positionally, so `r` sizes dy, `g` sizes cb and `b` sizes cr.
#[derive(Debug, Clone, Copy)]
pub struct ChromaFields;

impl PackedTransform for ChromaFields {
    const NAME: &'static str = "CHROMA";
    const SIGNED: bool = true;

    #[inline]
    fn fields(pixel: &PixelContext, _bits: BitWidths) -> Option<[i32; 4]> {
        Some(pixel.chroma.components())
    }

    #[inline]
    fn apply(fields: [i32; 4], _bits: BitWidths, last: Color) -> Color {
        ChromaDelta::from_components(fields).apply(last)
    }
}

/// Encodes a pixel as a small difference to the previous pixel in RGB(A) space.
pub type DeltaInstruction = PackedInstruction<RawDeltaFields>;

/// Encodes a pixel as a small difference to the previous pixel in Strutz' A2 color space. See
/// [`ChromaDelta`].
pub type ChromaInstruction = PackedInstruction<ChromaFields>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{CodeRange, Instruction};
    use crate::START_COLOR;
    use std::io::Cursor;

    fn roundtrip(
        instruction: &mut dyn Instruction,
        previous: Color,
        current: Color,
    ) -> Option<Vec<u8>> {
        let mut scratch = [0; 8];
        let len = instruction.encode(&PixelContext::new(previous, current), &mut scratch)?;
        let datagram = scratch[..len].to_vec();

        let mut src = Cursor::new(&datagram[1..]);
        let run = instruction.decode(datagram[0], &mut src, previous).unwrap();
        assert_eq!(run, crate::Run::single(current));
        assert_eq!(src.position() as usize, len - 1);

        Some(datagram)
    }

    #[test]
    fn delta222_accepts_small_steps_only() {
        let mut delta = DeltaInstruction::new(BitWidths::new(2, 2, 2, 0).unwrap());
        assert_eq!(delta.fixed_code_count(), 64);
        delta.set_code_range(CodeRange::new(64, 64));

        let base = Color::new(100, 100, 100, 255);

        let datagram = roundtrip(&mut delta, base, Color::new(101, 98, 100, 255)).unwrap();
        // dr = 1, dg = -2, db = 0
        assert_eq!(datagram, [64 + 0b01_10_00]);

        assert!(roundtrip(&mut delta, base, Color::new(102, 100, 100, 255)).is_none());
        assert!(roundtrip(&mut delta, base, Color::new(100, 100, 100, 254)).is_none());
    }

    #[test]
    fn delta_wraps_around_channel_range() {
        let mut delta = DeltaInstruction::new(BitWidths::new(2, 2, 2, 2).unwrap());
        delta.set_code_range(CodeRange::new(7, 1));

        let datagram =
            roundtrip(&mut delta, Color::new(255, 0, 255, 0), Color::new(0, 255, 0, 1)).unwrap();
        assert_eq!(datagram[0], 7);
        assert_eq!(datagram.len(), 2);
    }

    #[test]
    fn chroma_prefers_correlated_changes() {
        let mut chroma = ChromaInstruction::new(BitWidths::new(2, 2, 2, 0).unwrap());
        chroma.set_code_range(CodeRange::new(0, 64));
        let mut delta = DeltaInstruction::new(BitWidths::new(2, 2, 2, 0).unwrap());
        delta.set_code_range(CodeRange::new(0, 64));

        // all channels brighten by 1: dy = 1, cb = 0, cr = 0
        let previous = Color::new(10, 20, 30, 255);
        let current = Color::new(11, 21, 31, 255);
        assert!(roundtrip(&mut chroma, previous, current).is_some());
        assert!(roundtrip(&mut delta, previous, current).is_some());

        // brighten by 5: too big for a raw delta, but not for luma-only chroma with 4 bits
        let mut chroma4 = ChromaInstruction::new(BitWidths::new(4, 2, 2, 0).unwrap());
        chroma4.set_code_range(CodeRange::new(0, 1));
        let current = Color::new(15, 25, 35, 255);
        assert!(roundtrip(&mut delta, previous, current).is_none());
        assert!(roundtrip(&mut chroma4, previous, current).is_some());
    }

    #[test]
    fn chroma_alpha_needs_alpha_bits() {
        let mut chroma = ChromaInstruction::new(BitWidths::new(2, 2, 2, 0).unwrap());
        chroma.set_code_range(CodeRange::new(0, 64));
        assert!(roundtrip(&mut chroma, START_COLOR, Color::new(0, 0, 0, 1)).is_none());

        let mut chroma = ChromaInstruction::new(BitWidths::new(2, 2, 2, 2).unwrap());
        chroma.set_code_range(CodeRange::new(0, 1));
        assert!(roundtrip(&mut chroma, START_COLOR, Color::new(0, 0, 0, 1)).is_some());
    }

    #[test]
    fn names() {
        let chroma = ChromaInstruction::new(BitWidths::new(2, 2, 2, 2).unwrap());
        assert_eq!(chroma.to_string(), "CHROMA2222");
        let delta = DeltaInstruction::new(BitWidths::new(4, 5, 4, 0).unwrap());
        assert_eq!(delta.to_string(), "DELTA454");
    }
}
