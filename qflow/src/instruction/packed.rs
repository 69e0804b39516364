use crate::{
    decode::{read_payload, DecodeError},
    instruction::{BitWidths, CodeRange, Instruction},
    utils::{FieldLayout, MAX_PACKED_SIZE},
    Color, PixelContext, Run,
};
use core::{fmt, marker::PhantomData};
use std::io::Cursor;

/// What a [`PackedInstruction`] stores in its four bit fields.
pub trait PackedTransform {
    const NAME: &'static str;
    /// Whether the fields are two's complement numbers.
    const SIGNED: bool;

    /// The four field values for a pixel, or `None` if the transform can't represent it at all.
    fn fields(pixel: &PixelContext, bits: BitWidths) -> Option<[i32; 4]>;

    /// Reconstructs the color from decoded fields.
    fn apply(fields: [i32; 4], bits: BitWidths, last: Color) -> Color;
}

/// An instruction that stores four numbers at configurable bit widths, directly following the
/// code offset. See [`FieldLayout`] for the bit arrangement.
///
/// A pixel is only accepted if every field survives the round trip through its bit width, so
/// narrow instances fall through to wider ones later in the chain.
#[derive(Debug, Clone)]
pub struct PackedInstruction<T> {
    bits: BitWidths,
    layout: FieldLayout,
    range: CodeRange,
    _transform: PhantomData<T>,
}

impl<T: PackedTransform> PackedInstruction<T> {
    pub fn new(bits: BitWidths) -> Self {
        Self {
            bits,
            layout: FieldLayout::new(bits.to_array(), T::SIGNED),
            range: CodeRange::default(),
            _transform: PhantomData,
        }
    }
}

impl<T: PackedTransform> Instruction for PackedInstruction<T> {
    fn fixed_code_count(&self) -> u32 {
        self.layout.num_codes()
    }

    fn max_size(&self) -> usize {
        self.layout.num_bytes()
    }

    fn set_code_range(&mut self, range: CodeRange) {
        self.range = range;
    }

    fn code_range(&self) -> CodeRange {
        self.range
    }

    fn encode(&mut self, pixel: &PixelContext, scratch: &mut [u8]) -> Option<usize> {
        let fields = T::fields(pixel, self.bits)?;
        let packed = self.layout.pack(fields)?;

        Some(self.layout.write(packed, self.range.offset, scratch))
    }

    fn decode(
        &mut self,
        code: u8,
        src: &mut Cursor<&[u8]>,
        last: Color,
    ) -> Result<Run, DecodeError> {
        let num_bytes = self.layout.num_bytes();

        let mut datagram = [0; MAX_PACKED_SIZE];
        datagram[0] = code - self.range.offset;
        read_payload(src, &mut datagram[1..num_bytes])?;

        let fields = self.layout.unpack(self.layout.read(&datagram));
        Ok(Run::single(T::apply(fields, self.bits, last)))
    }

    fn can_repeat_bytes(&self) -> bool {
        true
    }

    fn parameters(&self, datagram: &[u8]) -> Vec<i32> {
        let mut unbiased = [0; MAX_PACKED_SIZE];
        let num_bytes = self.layout.num_bytes().min(datagram.len());
        unbiased[..num_bytes].copy_from_slice(&datagram[..num_bytes]);
        unbiased[0] = unbiased[0].wrapping_sub(self.range.offset);

        let fields = self.layout.unpack(self.layout.read(&unbiased));
        let used = if self.bits.has_alpha() { 4 } else { 3 };
        fields[..used].to_vec()
    }
}

impl<T: PackedTransform> fmt::Display for PackedInstruction<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::NAME, self.bits)
    }
}
