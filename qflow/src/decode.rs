use crate::{
    codec::ConfigError,
    header::{valid_dimensions, ComponentFormat, HeaderInfo, MAGIC},
    instruction::InstructionKind,
    Rgba8, StreamCodec,
};
use byteorder::{BigEndian, ReadBytesExt};
use log::trace;
use snafu::{ensure, OptionExt, ResultExt, Snafu};
use std::io::{Cursor, Read};

mod output;

pub(crate) use output::LimitedDecodeOutput;
pub use output::{DecodeOutput, SliceDecodeOutput, VecDecodeOutput};

#[derive(Debug, Snafu)]
#[snafu(module)]
pub enum DecodeError {
    UnexpectedEof,
    InvalidMagic,
    #[snafu(display("Invalid image dimensions: {width}x{height}"))]
    InvalidDimensions {
        width: u32,
        height: u32,
    },
    OutputTooSmall,
    #[snafu(display("Unknown instruction table entry: {entry:02x?}"))]
    UnknownInstruction {
        entry: [u8; 3],
    },
    #[snafu(display("Invalid instruction chain: {source}"))]
    InvalidChain {
        source: ConfigError,
    },
    #[snafu(display("No instruction owns opcode 0x{code:02x}"))]
    UnknownOpcode {
        code: u8,
    },
}

/// Reads the payload bytes following an opcode.
pub(crate) fn read_payload(src: &mut Cursor<&[u8]>, payload: &mut [u8]) -> Result<(), DecodeError> {
    src.read_exact(payload)
        .ok()
        .context(decode_error::UnexpectedEofSnafu)
}

/// Reads the container header and rebuilds the codec it describes.
///
/// Returns the header, the codec (reset and ready to decode), and the offset of the stream in
/// `data`.
pub fn read_header(data: &[u8]) -> Result<(HeaderInfo, StreamCodec, usize), DecodeError> {
    let mut src = Cursor::new(data);

    macro_rules! r {
        ($e:expr) => {
            $e.ok().context(decode_error::UnexpectedEofSnafu)?
        };
    }

    let mut magic = [0; 4];
    r!(src.read_exact(&mut magic));
    ensure!(&magic == MAGIC, decode_error::InvalidMagicSnafu);

    let width = r!(src.read_u32::<BigEndian>());
    let height = r!(src.read_u32::<BigEndian>());
    ensure!(
        valid_dimensions(width, height),
        decode_error::InvalidDimensionsSnafu { width, height }
    );

    let mut format = [0; 2];
    r!(src.read_exact(&mut format));
    let format = ComponentFormat::from_bytes(format);

    let chain_len = r!(src.read_u8());
    let mut chain = Vec::with_capacity(usize::from(chain_len));
    for _ in 0..chain_len {
        let mut entry = [0; 3];
        r!(src.read_exact(&mut entry));

        let kind = InstructionKind::from_entry(entry)
            .context(decode_error::UnknownInstructionSnafu { entry })?;
        chain.push(kind);
    }

    let mut codec = StreamCodec::new(chain).context(decode_error::InvalidChainSnafu)?;

    let lengths_len = r!(src.read_u8());
    for index in 0..usize::from(lengths_len) {
        let length = r!(src.read_u8());
        codec
            .set_variable_length(index, u32::from(length))
            .context(decode_error::InvalidChainSnafu)?;
    }
    codec.reset();

    let header = HeaderInfo {
        width,
        height,
        format,
    };
    trace!("{width}x{height}, {format}, {codec:?}");

    Ok((header, codec, src.position() as usize))
}

/// Decodes an image into `output`.
///
/// Returns the number of pixels written, which is always the pixel count of the image.
pub fn decode(
    data: &[u8],
    output: impl DecodeOutput,
) -> Result<(usize, HeaderInfo), DecodeError> {
    let (header, mut codec, offset) = read_header(data)?;
    let pixel_count = header.pixel_count();

    ensure!(
        output
            .remaining()
            .map(|remaining| remaining >= pixel_count)
            .unwrap_or(true),
        decode_error::OutputTooSmallSnafu
    );

    let mut output = LimitedDecodeOutput::new(output, pixel_count);
    let decoded = codec.decode(&data[offset..], &mut output)?;
    ensure!(decoded == pixel_count, decode_error::UnexpectedEofSnafu);

    Ok((decoded, header))
}

/// Decodes an image, appending its pixels to `w`.
pub fn decode_to_vec(data: &[u8], w: &mut Vec<[u8; 4]>) -> Result<HeaderInfo, DecodeError> {
    let mut output = VecDecodeOutput::<Rgba8>::new(core::mem::take(w), None);
    let result = decode(data, &mut output);
    *w = output.into_inner();

    result.map(|(_, header)| header)
}
