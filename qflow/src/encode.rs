use crate::{
    header::{valid_dimensions, ComponentFormat, MAGIC},
    Color, StreamCodec,
};
use byteorder::{BigEndian, WriteBytesExt};
use log::trace;
use snafu::{ensure, OptionExt, ResultExt, Snafu};
use std::io::Write;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum EncodeError {
    #[snafu(display(
        "Invalid image dimensions: {width} * {height} == {} pixels, but {pixel_count} pixels were given (each dimension must be in 1..=32768)",
        *width as u64 * *height as u64
    ))]
    InvalidDimensions {
        width: u32,
        height: u32,
        pixel_count: usize,
    },
    WriteIo {
        source: std::io::Error,
    },
    #[snafu(display("None of the instructions could encode {color}"))]
    Unencodable { color: Color },
    #[snafu(display("The instruction chain can't be stored in an image header"))]
    UnsupportedChain,
}

/// Encodes an image into `w`, replacing the session state of `codec`.
pub fn encode_to_vec(
    codec: &mut StreamCodec,
    width: u32,
    height: u32,
    pixels: &[[u8; 4]],
    w: &mut Vec<u8>,
) -> Result<(), EncodeError> {
    validate_dimensions(width, height, pixels)?;

    codec.reset();
    encode_header(codec, width, height, pixels, &mut *w)?;

    for &pixel in pixels {
        codec.encode(Color::from_rgba(pixel), w)?;
    }
    codec.finish(w);

    Ok(())
}

/// Encodes an image into a writer, one row at a time.
pub fn encode<W: Write>(
    codec: &mut StreamCodec,
    width: u32,
    height: u32,
    pixels: &[[u8; 4]],
    mut w: W,
) -> Result<(), EncodeError> {
    validate_dimensions(width, height, pixels)?;

    codec.reset();
    encode_header(codec, width, height, pixels, &mut w)?;

    let mut buf = Vec::with_capacity(width as usize * codec.max_instruction_size());
    for row in pixels.chunks(width as usize) {
        for &pixel in row {
            codec.encode(Color::from_rgba(pixel), &mut buf)?;
        }

        w.write_all(&buf).context(WriteIoSnafu)?;
        buf.clear();
    }

    codec.finish(&mut buf);
    w.write_all(&buf).context(WriteIoSnafu)
}

fn validate_dimensions(width: u32, height: u32, pixels: &[[u8; 4]]) -> Result<(), EncodeError> {
    ensure!(
        valid_dimensions(width, height) && width as usize * height as usize == pixels.len(),
        InvalidDimensionsSnafu {
            width,
            height,
            pixel_count: pixels.len()
        }
    );

    Ok(())
}

/// Writes the container header, including everything a decoder needs to rebuild `codec`.
pub fn encode_header<W: Write>(
    codec: &StreamCodec,
    width: u32,
    height: u32,
    pixels: &[[u8; 4]],
    mut w: W,
) -> Result<(), EncodeError> {
    let chain = codec.chain().context(UnsupportedChainSnafu)?;
    let chain_len = u8::try_from(chain.len()).ok().context(UnsupportedChainSnafu)?;
    let lengths = codec
        .variable_lengths()
        .iter()
        .map(|&length| u8::try_from(length).ok())
        .collect::<Option<Vec<u8>>>()
        .context(UnsupportedChainSnafu)?;
    let lengths_len = u8::try_from(lengths.len()).ok().context(UnsupportedChainSnafu)?;

    let format = ComponentFormat::analyze(pixels);
    trace!("{width}x{height}, {format}");

    macro_rules! w {
        ($e:expr) => {
            $e.context(WriteIoSnafu)?
        };
    }

    w!(w.write_all(MAGIC));
    w!(w.write_u32::<BigEndian>(width));
    w!(w.write_u32::<BigEndian>(height));
    w!(w.write_all(&format.to_bytes()));

    w!(w.write_u8(chain_len));
    for kind in chain {
        w!(w.write_all(&kind.to_entry()));
    }

    w!(w.write_u8(lengths_len));
    w!(w.write_all(&lengths));

    Ok(())
}
