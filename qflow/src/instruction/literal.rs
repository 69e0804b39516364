use crate::{
    instruction::{
        packed::{PackedInstruction, PackedTransform},
        BitWidths,
    },
    Color, PixelContext,
};

/// Fields are the absolute channel values: r, g, b, a.
///
/// Without alpha bits the pixel must keep the alpha of the previous pixel.
#[derive(Debug, Clone, Copy)]
pub struct LiteralFields;

impl PackedTransform for LiteralFields {
    const NAME: &'static str = "RGBA";
    const SIGNED: bool = false;

    #[inline]
    fn fields(pixel: &PixelContext, bits: BitWidths) -> Option<[i32; 4]> {
        let Color { r, g, b, a } = pixel.current;

        let a = if bits.has_alpha() {
            i32::from(a)
        } else if pixel.delta.da == 0 {
            0
        } else {
            return None;
        };

        Some([i32::from(r), i32::from(g), i32::from(b), a])
    }

    #[inline]
    fn apply([r, g, b, a]: [i32; 4], bits: BitWidths, last: Color) -> Color {
        let a = if bits.has_alpha() { a as u8 } else { last.a };
        Color::new(r as u8, g as u8, b as u8, a)
    }
}

/// Encodes the absolute channel values of a pixel.
///
/// Reduced-precision instances (e.g. 5-6-5) only accept colors whose channels fit their widths
/// without loss. An 8-8-8-8 instance accepts every color and should terminate every chain.
pub type LiteralInstruction = PackedInstruction<LiteralFields>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{CodeRange, Instruction};
    use crate::Run;
    use std::io::Cursor;

    #[test]
    fn full_precision_takes_everything() {
        let mut rgba = LiteralInstruction::new(BitWidths::RGBA8888);
        assert_eq!(rgba.fixed_code_count(), 1);
        assert_eq!(rgba.max_size(), 5);
        rgba.set_code_range(CodeRange::new(0, 1));

        let mut scratch = [0; 5];
        let current = Color::new(0xFF, 0x80, 0x01, 0x7F);
        let pixel = PixelContext::new(Color::new(1, 2, 3, 4), current);
        assert_eq!(rgba.encode(&pixel, &mut scratch), Some(5));
        assert_eq!(scratch, [0x00, 0xFF, 0x80, 0x01, 0x7F]);

        let mut src = Cursor::new(&scratch[1..]);
        let run = rgba.decode(scratch[0], &mut src, pixel.previous).unwrap();
        assert_eq!(run, Run::single(current));
    }

    #[test]
    fn reduced_precision_rejects_wide_values() {
        let mut rgb565 = LiteralInstruction::new(BitWidths::new(5, 6, 5, 0).unwrap());
        assert_eq!(rgb565.fixed_code_count(), 1);
        assert_eq!(rgb565.max_size(), 3);
        rgb565.set_code_range(CodeRange::new(200, 1));

        let previous = Color::new(0, 0, 0, 255);
        let mut scratch = [0; 5];

        let fits = PixelContext::new(previous, Color::new(31, 63, 31, 255));
        assert_eq!(rgb565.encode(&fits, &mut scratch), Some(3));
        assert_eq!(scratch[..3], [200, 0xFF, 0xFF]);

        let mut src = Cursor::new(&scratch[1..3]);
        let run = rgb565.decode(200, &mut src, previous).unwrap();
        assert_eq!(run.color, fits.current);

        let too_red = PixelContext::new(previous, Color::new(32, 0, 0, 255));
        assert_eq!(rgb565.encode(&too_red, &mut scratch), None);

        let new_alpha = PixelContext::new(previous, Color::new(0, 0, 0, 254));
        assert_eq!(rgb565.encode(&new_alpha, &mut scratch), None);
    }

    #[test]
    fn truncated_payload_is_an_error() {
        let mut rgba = LiteralInstruction::new(BitWidths::RGBA8888);
        rgba.set_code_range(CodeRange::new(0, 1));

        let mut src = Cursor::new(&[1u8, 2][..]);
        assert!(rgba.decode(0, &mut src, Color::default()).is_err());
    }
}
