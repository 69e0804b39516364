//! A configurable, lossless pixel stream codec in the spirit of the
//! [QOI Image format](https://qoiformat.org/).
//!
//! Where QOI has a fixed set of operations at fixed opcodes, a qflow stream is produced by a
//! configurable chain of [instructions](instruction). The codec offers every pixel to the
//! instructions in chain order and the first one that can represent it emits a datagram. The
//! leading byte of every datagram (the opcode) identifies the instruction, so the 256 opcode values
//! are partitioned among the instructions of the chain.
//!
//! # Instructions
//!
//! - [`RunLengthInstruction`]: repeats the previous pixel, with a bijective base-N run length.
//! - [`HistoryInstruction`]: re-emits one of the N most recent colors.
//! - [`DeltaInstruction`]: small per-channel difference to the previous pixel.
//! - [`ChromaInstruction`]: small difference in a decorrelated luma/chroma space.
//! - [`MaskInstruction`]: the literal values of only the changed channels.
//! - [`LiteralInstruction`]: absolute channel values, possibly at reduced precision.
//!
//! Instructions with bit fields need a fixed number of opcodes, e.g. 64 for a 2-2-2 delta.
//! Run-length and history take any number of opcodes, and share whatever the fixed instructions
//! leave over.
//!
//! # Stream format
//!
//! A stream is a sequence of datagrams with no length information. It ends with
//! [`max_instruction_size`](StreamCodec::max_instruction_size) copies of the
//! [footer code](StreamCodec::footer_code): the first opcode of the first instruction that can't
//! produce the same opcode twice in a row. Two consecutive footer codes can therefore only be the
//! footer.
//!
//! The default chain partitions the opcodes like this:
//!
//! ```plain
//! .- Opcode ----------.-------------------.------------------------.
//! | 0xf6..=0xff  (10) | RLE10             | 1 byte per digit       |
//! | 0x5a..=0xf5 (156) | HIST156           | 1 byte, 0x5a is footer |
//! | 0x1a..=0x59  (64) | CHROMA222         | 1 byte                 |
//! | 0x19         (1)  | CHROMA2222        | 2 bytes                |
//! | 0x11..=0x18   (8) | MASK              | 2..=4 bytes            |
//! | 0x01..=0x10  (16) | MASKA             | 2..=5 bytes            |
//! | 0x00         (1)  | RGBA8888          | 5 bytes                |
//! `----------------------------------------------------------------`
//! ```
//!
//! # Image container
//!
//! [`encode`](encode::encode) and [`decode`](decode::decode) wrap a stream with a header that
//! describes the chain, see [`header`].

pub mod codec;
pub mod color;
pub mod decode;
pub mod encode;
pub mod header;
pub mod instruction;
pub mod stats;
pub mod utils;

pub use codec::{ConfigError, StreamCodec, DEFAULT_CHAIN, DEFAULT_RUN_LENGTH};
pub use color::{ChromaDelta, Color, PixelContext, RawDelta, Run, START_COLOR};
pub use decode::{DecodeError, DecodeOutput, SliceDecodeOutput, VecDecodeOutput};
pub use encode::EncodeError;
pub use header::{ComponentFormat, HeaderInfo};
pub use instruction::{
    BitWidths, ChromaInstruction, CodeRange, DeltaInstruction, HistoryInstruction, Instruction,
    InstructionKind, LiteralInstruction, MaskInstruction, RunLengthInstruction,
};
pub use stats::{InstructionCounter, Record, Statistics};

/// Maps decoded colors to the element type of an output buffer.
pub trait ColorFormat {
    type OutputElement: Copy + core::fmt::Debug;

    fn to_output(color: Color) -> Self::OutputElement;
}

/// `[r, g, b, a]`
#[derive(Debug, Clone, Copy)]
pub struct Rgba8;

impl ColorFormat for Rgba8 {
    type OutputElement = [u8; 4];

    #[inline]
    fn to_output(color: Color) -> Self::OutputElement {
        color.to_rgba()
    }
}

/// `0xRRGGBBAA`
#[derive(Debug, Clone, Copy)]
pub struct Rgba32;

impl ColorFormat for Rgba32 {
    type OutputElement = u32;

    #[inline]
    fn to_output(color: Color) -> Self::OutputElement {
        u32::from_be_bytes(color.to_rgba())
    }
}
