//! The encoding strategies a [`StreamCodec`](crate::StreamCodec) chains together.
//!
//! Every instruction owns a window of the 256 possible opcode values. While encoding, the codec
//! offers each pixel to the instructions in chain order, and the first one able to represent it
//! wins. While decoding, the opcode alone identifies the instruction that produced a datagram.

use crate::{
    codec::{ConfigError, InvalidBitWidthSnafu, UnknownInstructionSnafu},
    decode::DecodeError,
    Color, PixelContext, Run,
};
use core::{fmt, str::FromStr};
use snafu::{ensure, OptionExt};
use std::io::Cursor;

mod delta;
mod history;
mod literal;
mod mask;
mod packed;
mod run_length;

pub use delta::{ChromaInstruction, DeltaInstruction};
pub use history::HistoryInstruction;
pub use literal::LiteralInstruction;
pub use mask::MaskInstruction;
pub use packed::{PackedInstruction, PackedTransform};
pub use run_length::RunLengthInstruction;

/// The opcode window `offset..offset + count` assigned to an instruction by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeRange {
    pub offset: u8,
    pub count: u32,
}

impl CodeRange {
    pub const fn new(offset: u8, count: u32) -> Self {
        Self { offset, count }
    }

    #[inline]
    pub const fn contains(&self, code: u8) -> bool {
        let code = code as u32;
        let offset = self.offset as u32;
        offset <= code && code < offset + self.count
    }

    /// The last opcode of the window.
    #[inline]
    pub const fn last(&self) -> u8 {
        (self.offset as u32 + self.count - 1) as u8
    }
}

impl Default for CodeRange {
    fn default() -> Self {
        Self::new(0, 1)
    }
}

/// The contract between the [`StreamCodec`](crate::StreamCodec) and one encoding strategy.
///
/// Instructions hold per-session state and must not be shared between codecs.
pub trait Instruction: fmt::Display {
    /// Number of opcode values this instruction needs, or 0 if it accepts any share of the
    /// variable code pool.
    fn fixed_code_count(&self) -> u32;

    /// The smallest datagram this instruction emits.
    fn min_size(&self) -> usize {
        self.max_size()
    }

    /// The largest datagram [`encode`](Instruction::encode) emits. 0 if it never emits from
    /// there, but only from the deferred hooks.
    fn max_size(&self) -> usize;

    fn set_code_range(&mut self, range: CodeRange);

    fn code_range(&self) -> CodeRange;

    /// Clears all per-session state.
    fn reset(&mut self) {}

    /// Called on every instruction for every pixel before the main encode pass, to give it the
    /// opportunity to emit deferred datagrams.
    fn pre_encode(&mut self, _pixel: &PixelContext, _sink: &mut Vec<u8>) {}

    /// Attempts to encode the pixel into `scratch`.
    ///
    /// Returns the number of bytes written, or `None` if this instruction can't represent the
    /// pixel and the next one in the chain should be tried. `Some(0)` means the pixel was consumed
    /// without emitting anything (yet).
    fn encode(&mut self, pixel: &PixelContext, scratch: &mut [u8]) -> Option<usize>;

    /// Emits any deferred datagram. Called at the end of the stream.
    fn post_encode(&mut self, _sink: &mut Vec<u8>) {}

    /// Decodes the datagram led by `code`, which lies within this instruction's code range,
    /// consuming its payload bytes from `src`.
    fn decode(
        &mut self,
        code: u8,
        src: &mut Cursor<&[u8]>,
        last: Color,
    ) -> Result<Run, DecodeError>;

    /// Called on every instruction after any instruction decoded a color.
    fn post_decode(&mut self, _color: Color) {}

    /// Whether two back-to-back datagrams of this instruction may share the same opcode.
    fn can_repeat_bytes(&self) -> bool;

    /// The parameters encoded in one of this instruction's datagrams, for diagnostics.
    fn parameters(&self, _datagram: &[u8]) -> Vec<i32> {
        Vec::new()
    }
}

/// Number of bits each channel is encoded with.
///
/// `r`, `g` and `b` must be in `1..=8`, `a` in `0..=8`. An `a` of 0 means the instruction can't
/// represent any change of alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitWidths {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl BitWidths {
    pub const RGBA8888: BitWidths = BitWidths::new_unchecked(8, 8, 8, 8);

    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Result<Self, ConfigError> {
        for (channel, bits, min) in [('r', r, 1), ('g', g, 1), ('b', b, 1), ('a', a, 0)] {
            ensure!(
                (min..=8).contains(&bits),
                InvalidBitWidthSnafu { channel, bits, min }
            );
        }

        Ok(Self::new_unchecked(r, g, b, a))
    }

    pub(crate) const fn new_unchecked(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    #[inline]
    pub const fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    #[inline]
    pub const fn has_alpha(self) -> bool {
        self.a > 0
    }
}

impl fmt::Display for BitWidths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.r, self.g, self.b)?;
        if self.has_alpha() {
            write!(f, "{}", self.a)?;
        }
        Ok(())
    }
}

/// Configuration for one instruction of a chain.
///
/// Parses from and displays as the symbolic instruction names, e.g. `rle`, `hist`, `delta222`,
/// `chroma2222`, `mask`, `maska` or `rgba8888`. A 3-digit bit width suffix means no alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstructionKind {
    RunLength,
    History,
    Delta(BitWidths),
    Chroma(BitWidths),
    Mask { alpha: bool },
    Literal(BitWidths),
}

impl InstructionKind {
    /// Creates a fresh instruction with empty session state.
    pub fn build(self) -> Box<dyn Instruction> {
        match self {
            InstructionKind::RunLength => Box::new(RunLengthInstruction::new()),
            InstructionKind::History => Box::new(HistoryInstruction::new()),
            InstructionKind::Delta(bits) => Box::new(DeltaInstruction::new(bits)),
            InstructionKind::Chroma(bits) => Box::new(ChromaInstruction::new(bits)),
            InstructionKind::Mask { alpha } => Box::new(MaskInstruction::new(alpha)),
            InstructionKind::Literal(bits) => Box::new(LiteralInstruction::new(bits)),
        }
    }
}

impl InstructionKind {
    const TAG_RUN_LENGTH: u8 = 0;
    const TAG_HISTORY: u8 = 1;
    const TAG_DELTA: u8 = 2;
    const TAG_CHROMA: u8 = 3;
    const TAG_MASK: u8 = 4;
    const TAG_MASK_ALPHA: u8 = 5;
    const TAG_LITERAL: u8 = 6;

    /// Serializes into a chain table entry: the tag, then the bit widths as nibbles.
    ///
    /// ```plain
    /// .- Entry ----------------------------------------------------------------.
    /// |         Byte[0]         |         Byte[1]         |      Byte[2]       |
    /// |-------------------------+------------+------------+---------+----------|
    /// |           tag           |   bits r   |   bits g   | bits b  |  bits a  |
    /// `------------------------------------------------------------------------`
    /// ```
    pub fn to_entry(self) -> [u8; 3] {
        let (tag, bits) = match self {
            InstructionKind::RunLength => (Self::TAG_RUN_LENGTH, None),
            InstructionKind::History => (Self::TAG_HISTORY, None),
            InstructionKind::Delta(bits) => (Self::TAG_DELTA, Some(bits)),
            InstructionKind::Chroma(bits) => (Self::TAG_CHROMA, Some(bits)),
            InstructionKind::Mask { alpha: false } => (Self::TAG_MASK, None),
            InstructionKind::Mask { alpha: true } => (Self::TAG_MASK_ALPHA, None),
            InstructionKind::Literal(bits) => (Self::TAG_LITERAL, Some(bits)),
        };

        match bits {
            Some(BitWidths { r, g, b, a }) => [tag, r << 4 | g, b << 4 | a],
            None => [tag, 0, 0],
        }
    }

    /// Parses a chain table entry. `None` if the tag or bit widths are invalid.
    pub fn from_entry([tag, rg, ba]: [u8; 3]) -> Option<Self> {
        let bits = || BitWidths::new(rg >> 4, rg & 0xF, ba >> 4, ba & 0xF).ok();

        let kind = match tag {
            Self::TAG_RUN_LENGTH => InstructionKind::RunLength,
            Self::TAG_HISTORY => InstructionKind::History,
            Self::TAG_DELTA => InstructionKind::Delta(bits()?),
            Self::TAG_CHROMA => InstructionKind::Chroma(bits()?),
            Self::TAG_MASK => InstructionKind::Mask { alpha: false },
            Self::TAG_MASK_ALPHA => InstructionKind::Mask { alpha: true },
            Self::TAG_LITERAL => InstructionKind::Literal(bits()?),
            _ => return None,
        };

        Some(kind)
    }
}

impl fmt::Display for InstructionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstructionKind::RunLength => f.write_str("RLE"),
            InstructionKind::History => f.write_str("HIST"),
            InstructionKind::Delta(bits) => write!(f, "DELTA{bits}"),
            InstructionKind::Chroma(bits) => write!(f, "CHROMA{bits}"),
            InstructionKind::Mask { alpha: false } => f.write_str("MASK"),
            InstructionKind::Mask { alpha: true } => f.write_str("MASKA"),
            InstructionKind::Literal(bits) => write!(f, "RGBA{bits}"),
        }
    }
}

impl FromStr for InstructionKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();

        match name.as_str() {
            "rle" => return Ok(InstructionKind::RunLength),
            "hist" => return Ok(InstructionKind::History),
            "mask" => return Ok(InstructionKind::Mask { alpha: false }),
            "maska" => return Ok(InstructionKind::Mask { alpha: true }),
            _ => {}
        }

        let split = name
            .find(|c: char| c.is_ascii_digit())
            .context(UnknownInstructionSnafu { name: s })?;
        let (prefix, digits) = name.split_at(split);

        let bits = digits
            .chars()
            .map(|c| c.to_digit(10).map(|d| d as u8))
            .collect::<Option<Vec<u8>>>()
            .context(UnknownInstructionSnafu { name: s })?;

        let bits = match bits[..] {
            [r, g, b] => BitWidths::new(r, g, b, 0)?,
            [r, g, b, a] => BitWidths::new(r, g, b, a)?,
            _ => return UnknownInstructionSnafu { name: s }.fail(),
        };

        match prefix {
            "delta" => Ok(InstructionKind::Delta(bits)),
            "chroma" => Ok(InstructionKind::Chroma(bits)),
            "rgba" | "rgb" => Ok(InstructionKind::Literal(bits)),
            _ => UnknownInstructionSnafu { name: s }.fail(),
        }
    }
}
