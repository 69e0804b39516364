use crate::{
    decode::DecodeError,
    instruction::{CodeRange, Instruction},
    Color, PixelContext, Run, START_COLOR,
};
use core::fmt;
use std::io::Cursor;

/// Repeats the previous pixel.
///
/// The repeat count is written in bijective base-N, N being the number of codes assigned to this
/// instruction, least significant digit first. Each opcode is one digit. Unlike positional
/// notation there is no zero digit, so no count ever needs a redundant leading "zero" symbol. With
/// N = 10 the counts map to:
///
/// ```plain
///   1 -> [0]        10 -> [9]
///  11 -> [0, 0]     20 -> [9, 0]     110 -> [9, 9]
/// 111 -> [0, 0, 0]
/// ```
///
/// Runs have no upper bound. Encoding is deferred until the run ends, so [`encode`] only counts
/// and the datagrams are emitted from [`pre_encode`] or [`post_encode`].
///
/// [`encode`]: Instruction::encode
/// [`pre_encode`]: Instruction::pre_encode
/// [`post_encode`]: Instruction::post_encode
#[derive(Debug, Clone)]
pub struct RunLengthInstruction {
    range: CodeRange,

    // encoder state
    repeat_count: u32,

    // decoder state
    last_color: Color,
    repeat_multiplier: u32,
}

impl RunLengthInstruction {
    pub const fn new() -> Self {
        Self {
            range: CodeRange::new(0, 1),
            repeat_count: 0,
            last_color: START_COLOR,
            repeat_multiplier: 1,
        }
    }
}

impl Default for RunLengthInstruction {
    fn default() -> Self {
        Self::new()
    }
}

/// Appends `count` in bijective base-`base` notation, one opcode per digit.
pub(crate) fn write_bijective(count: u32, range: CodeRange, sink: &mut Vec<u8>) {
    debug_assert!(count >= 1);

    let base = i64::from(range.count);
    let mut remaining = i64::from(count) - 1;

    loop {
        let digit = remaining % base;
        sink.push(range.offset + digit as u8);

        remaining = (remaining - digit) / base - 1;
        if remaining < 0 {
            break;
        }
    }
}

impl Instruction for RunLengthInstruction {
    fn fixed_code_count(&self) -> u32 {
        0
    }

    fn min_size(&self) -> usize {
        0
    }

    fn max_size(&self) -> usize {
        // encode() never emits anything
        0
    }

    fn set_code_range(&mut self, range: CodeRange) {
        self.range = range;
    }

    fn code_range(&self) -> CodeRange {
        self.range
    }

    fn reset(&mut self) {
        self.repeat_count = 0;
        self.last_color = START_COLOR;
        self.repeat_multiplier = 1;
    }

    fn pre_encode(&mut self, pixel: &PixelContext, sink: &mut Vec<u8>) {
        if !pixel.is_repeat() {
            self.post_encode(sink);
        }
    }

    fn encode(&mut self, pixel: &PixelContext, _scratch: &mut [u8]) -> Option<usize> {
        if pixel.is_repeat() {
            self.repeat_count += 1;
            Some(0)
        } else {
            None
        }
    }

    fn post_encode(&mut self, sink: &mut Vec<u8>) {
        if self.repeat_count >= 1 {
            write_bijective(self.repeat_count, self.range, sink);
            self.repeat_count = 0;
        }
    }

    fn decode(
        &mut self,
        code: u8,
        _src: &mut Cursor<&[u8]>,
        last: Color,
    ) -> Result<Run, DecodeError> {
        let digit = u32::from(code - self.range.offset);
        let count = (digit + 1).saturating_mul(self.repeat_multiplier);
        self.repeat_multiplier = self.repeat_multiplier.saturating_mul(self.range.count);

        Ok(Run { color: last, count })
    }

    fn post_decode(&mut self, color: Color) {
        if self.last_color != color {
            self.last_color = color;
            self.repeat_multiplier = 1;
        }
    }

    fn can_repeat_bytes(&self) -> bool {
        true
    }

    fn parameters(&self, datagram: &[u8]) -> Vec<i32> {
        datagram
            .iter()
            .map(|&code| i32::from(code - self.range.offset) + 1)
            .collect()
    }
}

impl fmt::Display for RunLengthInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RLE{}", self.range.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_count(codes: &[u8], range: CodeRange) -> u32 {
        let mut rle = RunLengthInstruction::new();
        rle.set_code_range(range);

        let color = Color::new(1, 2, 3, 4);
        rle.post_decode(color);

        let mut src = Cursor::new(&[][..]);
        codes
            .iter()
            .map(|&code| {
                let run = rle.decode(code, &mut src, color).unwrap();
                rle.post_decode(run.color);
                run.count
            })
            .sum()
    }

    #[test]
    fn bijective_digits() {
        let range = CodeRange::new(0, 10);
        let encode = |count| {
            let mut sink = Vec::new();
            write_bijective(count, range, &mut sink);
            sink
        };

        assert_eq!(encode(1), [0]);
        assert_eq!(encode(10), [9]);
        assert_eq!(encode(11), [0, 0]);
        assert_eq!(encode(20), [9, 0]);
        assert_eq!(encode(110), [9, 9]);
        assert_eq!(encode(111), [0, 0, 0]);
    }

    #[test]
    fn bijective_roundtrip_and_injective() {
        for base in [2, 3, 7, 10, 64, 255] {
            let range = CodeRange::new(255 - (base - 1) as u8, base);
            let mut seen = std::collections::HashSet::new();

            for count in 1..=2000 {
                let mut sink = Vec::new();
                write_bijective(count, range, &mut sink);
                assert!(sink.iter().all(|&code| range.contains(code)));
                assert_eq!(decode_count(&sink, range), count, "base {base}, count {count}");
                assert!(seen.insert(sink), "base {base}, count {count} is ambiguous");
            }
        }
    }

    #[test]
    fn defers_until_run_ends() {
        let mut rle = RunLengthInstruction::new();
        rle.set_code_range(CodeRange::new(246, 10));

        let gray = Color::new(9, 9, 9, 255);
        let mut sink = Vec::new();
        let mut scratch = [0; 4];

        for _ in 0..12 {
            let pixel = PixelContext::new(gray, gray);
            rle.pre_encode(&pixel, &mut sink);
            assert_eq!(rle.encode(&pixel, &mut scratch), Some(0));
        }
        assert!(sink.is_empty());

        let pixel = PixelContext::new(gray, START_COLOR);
        rle.pre_encode(&pixel, &mut sink);
        assert_eq!(rle.encode(&pixel, &mut scratch), None);

        // 12 = bijective [1, 0]
        assert_eq!(sink, [247, 246]);
    }
}
