use crate::{
    decode::DecodeError,
    instruction::{CodeRange, Instruction},
    Color, PixelContext, Run, START_COLOR,
};
use core::fmt;
use std::io::Cursor;

/// Re-emits a recently seen color.
///
/// Keeps a ring of N colors, N being the number of codes assigned to this instruction. Each opcode
/// is an index into the ring. Colors that miss the ring replace the oldest entry, whichever
/// instruction ends up encoding them.
///
/// A pixel equal to its predecessor is never encoded by this instruction, so two consecutive
/// datagrams can't carry the same index. That makes its opcodes usable as the stream footer.
#[derive(Debug, Clone)]
pub struct HistoryInstruction {
    range: CodeRange,
    recent_colors: Vec<Color>,
    write_index: usize,

    // decoder state
    pixel_decoded: bool,
}

impl HistoryInstruction {
    pub fn new() -> Self {
        Self {
            range: CodeRange::new(0, 1),
            recent_colors: vec![START_COLOR],
            write_index: 0,
            pixel_decoded: false,
        }
    }

    #[inline]
    fn find(&self, color: Color) -> Option<usize> {
        self.recent_colors.iter().position(|&c| c == color)
    }

    #[inline]
    fn insert(&mut self, color: Color) {
        self.recent_colors[self.write_index] = color;
        self.write_index = (self.write_index + 1) % self.recent_colors.len();
    }

    fn insert_if_absent(&mut self, color: Color) {
        if self.find(color).is_none() {
            self.insert(color);
        }
    }
}

impl Default for HistoryInstruction {
    fn default() -> Self {
        Self::new()
    }
}

impl Instruction for HistoryInstruction {
    fn fixed_code_count(&self) -> u32 {
        0
    }

    fn max_size(&self) -> usize {
        1
    }

    fn set_code_range(&mut self, range: CodeRange) {
        self.range = range;
        self.recent_colors = vec![START_COLOR; range.count as usize];
        self.write_index = 0;
    }

    fn code_range(&self) -> CodeRange {
        self.range
    }

    fn reset(&mut self) {
        self.recent_colors.fill(START_COLOR);
        self.write_index = 0;
        self.pixel_decoded = false;
    }

    fn pre_encode(&mut self, pixel: &PixelContext, _sink: &mut Vec<u8>) {
        // Mirror what the decoder does in post_decode() for colors this instruction never got
        // offered because an earlier instruction in the chain took them.
        self.insert_if_absent(pixel.previous);
    }

    fn encode(&mut self, pixel: &PixelContext, scratch: &mut [u8]) -> Option<usize> {
        if pixel.is_repeat() {
            return None;
        }

        match self.find(pixel.current) {
            Some(index) => {
                scratch[0] = self.range.offset + index as u8;
                Some(1)
            }
            None => {
                self.insert(pixel.current);
                None
            }
        }
    }

    fn decode(
        &mut self,
        code: u8,
        _src: &mut Cursor<&[u8]>,
        _last: Color,
    ) -> Result<Run, DecodeError> {
        self.pixel_decoded = true;

        let index = usize::from(code - self.range.offset);
        Ok(Run::single(self.recent_colors[index]))
    }

    fn post_decode(&mut self, color: Color) {
        if self.pixel_decoded {
            self.pixel_decoded = false;
        } else {
            self.insert_if_absent(color);
        }
    }

    fn can_repeat_bytes(&self) -> bool {
        false
    }

    fn parameters(&self, datagram: &[u8]) -> Vec<i32> {
        vec![i32::from(datagram[0] - self.range.offset)]
    }
}

impl fmt::Display for HistoryInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HIST{}", self.range.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(offset: u8, count: u32) -> HistoryInstruction {
        let mut hist = HistoryInstruction::new();
        hist.set_code_range(CodeRange::new(offset, count));
        hist.reset();
        hist
    }

    #[test]
    fn hits_after_miss() {
        let mut hist = history(100, 4);
        let mut scratch = [0; 1];

        let red = Color::new(255, 0, 0, 255);
        let blue = Color::new(0, 0, 255, 255);

        assert_eq!(hist.encode(&PixelContext::new(START_COLOR, red), &mut scratch), None);
        assert_eq!(hist.encode(&PixelContext::new(red, blue), &mut scratch), None);
        assert_eq!(hist.encode(&PixelContext::new(blue, red), &mut scratch), Some(1));
        assert_eq!(scratch[0], 100);
        assert_eq!(hist.encode(&PixelContext::new(red, blue), &mut scratch), Some(1));
        assert_eq!(scratch[0], 101);
    }

    #[test]
    fn never_encodes_repeats() {
        let mut hist = history(0, 4);
        let mut scratch = [0; 1];

        let pixel = PixelContext::new(START_COLOR, START_COLOR);
        assert_eq!(hist.encode(&pixel, &mut scratch), None);
    }

    #[test]
    fn ring_evicts_oldest() {
        let mut hist = history(0, 2);
        let mut scratch = [0; 1];
        let colors = [1, 2, 3].map(|v| Color::new(v, v, v, 255));

        let mut previous = START_COLOR;
        for color in colors {
            assert_eq!(hist.encode(&PixelContext::new(previous, color), &mut scratch), None);
            previous = color;
        }

        // 1 was overwritten by 3
        assert_eq!(hist.encode(&PixelContext::new(previous, colors[0]), &mut scratch), None);
        assert_eq!(hist.encode(&PixelContext::new(colors[0], colors[1]), &mut scratch), None);
    }

    #[test]
    fn decoder_tracks_foreign_colors_once() {
        let mut hist = history(10, 3);
        let green = Color::new(0, 255, 0, 255);
        let mut src = Cursor::new(&[][..]);

        hist.post_decode(green);
        hist.post_decode(green);
        assert_eq!(hist.recent_colors, [green, START_COLOR, START_COLOR]);

        let run = hist.decode(10, &mut src, START_COLOR).unwrap();
        assert_eq!(run, Run::single(green));

        // own decode doesn't get recorded twice
        hist.post_decode(run.color);
        assert_eq!(hist.write_index, 1);
    }
}
