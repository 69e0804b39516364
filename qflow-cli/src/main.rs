use argh::FromArgs;
use image::{DynamicImage, ImageFormat, RgbaImage};
use log::{debug, info, log_enabled, Level, LevelFilter};
use qflow::{InstructionCounter, InstructionKind, Rgba8, StreamCodec, VecDecodeOutput};
use std::{cell::RefCell, error::Error, fs::File, io::BufReader, rc::Rc, str::FromStr};

/// qflow cli encoder and decoder.
#[derive(FromArgs)]
struct Cli {
    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Encode(Encode),
    Decode(Decode),
    Verify(Verify),
}

/// Encodes an image as qflow.
#[derive(FromArgs)]
#[argh(subcommand, name = "encode")]
struct Encode {
    /// input format, optional (png, jpg, bmp, tiff)
    #[argh(option)]
    format: Option<Format>,

    /// comma separated instruction chain, e.g. rle,hist,chroma222,rgba8888
    #[argh(option)]
    chain: Option<Chain>,

    /// opcode count of a variable-length instruction, as INDEX=COUNT. May be repeated.
    #[argh(option)]
    length: Vec<Length>,

    /// print how often each instruction was used
    #[argh(switch)]
    stats: bool,

    /// the input file
    #[argh(positional)]
    input: String,
    /// the output file
    #[argh(positional)]
    output: String,
}

/// Decodes a qflow image.
#[derive(FromArgs)]
#[argh(subcommand, name = "decode")]
struct Decode {
    /// output format (png, jpg, bmp, tiff)
    #[argh(option)]
    format: Format,

    /// print how often each instruction was used
    #[argh(switch)]
    stats: bool,

    /// the input file
    #[argh(positional)]
    input: String,
    /// the output file
    #[argh(positional)]
    output: String,
}

/// Encodes and decodes an image in memory and checks that nothing changed.
#[derive(FromArgs)]
#[argh(subcommand, name = "verify")]
struct Verify {
    /// comma separated instruction chain, e.g. rle,hist,chroma222,rgba8888
    #[argh(option)]
    chain: Option<Chain>,

    /// opcode count of a variable-length instruction, as INDEX=COUNT. May be repeated.
    #[argh(option)]
    length: Vec<Length>,

    /// the input file
    #[argh(positional)]
    input: String,
}

#[derive(Debug, Clone, Copy)]
enum Format {
    Png,
    Jpg,
    Bmp,
    Tiff,
}

impl FromStr for Format {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        #[rustfmt::skip]
        let Some(format) = s.eq_ignore_ascii_case("png").then_some(Format::Png)
               .or_else(|| s.eq_ignore_ascii_case("jpg").then_some(Format::Jpg))
               .or_else(|| s.eq_ignore_ascii_case("bmp").then_some(Format::Bmp))
               .or_else(|| s.eq_ignore_ascii_case("tiff").then_some(Format::Tiff))
        else { return Err("invalid string"); };

        Ok(format)
    }
}

impl From<Format> for ImageFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Png => ImageFormat::Png,
            Format::Jpg => ImageFormat::Jpeg,
            Format::Bmp => ImageFormat::Bmp,
            Format::Tiff => ImageFormat::Tiff,
        }
    }
}

struct Chain(Vec<InstructionKind>);

impl FromStr for Chain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(|name| name.parse().map_err(|e| format!("{e}")))
            .collect::<Result<Vec<_>, _>>()
            .map(Chain)
    }
}

struct Length {
    index: usize,
    count: u32,
}

impl FromStr for Length {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (index, count) = s.split_once('=').ok_or("expected INDEX=COUNT")?;

        Ok(Length {
            index: index.trim().parse().map_err(|_| "invalid index")?,
            count: count.trim().parse().map_err(|_| "invalid count")?,
        })
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let Cli { command } = argh::from_env();

    match command {
        Command::Encode(options) => encode(options),
        Command::Decode(options) => decode(options),
        Command::Verify(options) => verify(options),
    }
}

fn build_codec(chain: Option<Chain>, lengths: &[Length]) -> Result<StreamCodec, Box<dyn Error>> {
    let mut codec = match chain {
        Some(Chain(chain)) => StreamCodec::new(chain)?,
        None => StreamCodec::default_chain()?,
    };

    for &Length { index, count } in lengths {
        codec.set_variable_length(index, count)?;
    }
    codec.reset();

    debug!("{codec:?}");
    Ok(codec)
}

fn load_image(input: &str, format: Option<Format>) -> Result<RgbaImage, Box<dyn Error>> {
    let image = match format {
        Some(format) => {
            image::io::Reader::with_format(BufReader::new(File::open(input)?), format.into())
                .decode()?
        }
        None => image::io::Reader::open(input)?
            .with_guessed_format()?
            .decode()?,
    };

    Ok(image.into_rgba8())
}

fn raw_pixels(image: &RgbaImage) -> Vec<[u8; 4]> {
    image.pixels().map(|p| p.0).collect()
}

fn print_stats(counter: &InstructionCounter) {
    println!("{}", counter.summary());
    println!("#total: {}", counter.total());
}

fn encode(options: Encode) -> Result<(), Box<dyn Error>> {
    let Encode {
        format,
        chain,
        length,
        stats,
        input,
        output,
    } = options;

    let image = load_image(&input, format)?;
    let (width, height) = image.dimensions();
    info!("Encoding {width}x{height} image");

    let mut codec = build_codec(chain, &length)?;
    let counter = Rc::new(RefCell::new(InstructionCounter::new(log_enabled!(Level::Trace))));
    if stats {
        codec.set_statistics(Some(Box::new(counter.clone())));
    }

    let mut v = Vec::with_capacity(1024 * 1024);
    qflow::encode::encode_to_vec(&mut codec, width, height, &raw_pixels(&image), &mut v)?;

    std::fs::write(&output, &v)?;
    info!("Written {} bytes to `{output}`", v.len());

    if stats {
        print_stats(&counter.borrow());
    }

    Ok(())
}

fn decode(options: Decode) -> Result<(), Box<dyn Error>> {
    let Decode {
        format,
        stats,
        input,
        output,
    } = options;

    let qflow_input = std::fs::read(&input)?;
    info!("Decoding `{input}`");

    let (header, mut codec, offset) = qflow::decode::read_header(&qflow_input)?;
    let pixel_count = header.pixel_count();
    info!(
        "{}x{} image, {}, chain {}",
        header.width,
        header.height,
        header.format,
        codec
            .code_ranges()
            .iter()
            .zip(codec.instructions())
            .map(|(range, instruction)| format!("{instruction}@{}", range.offset))
            .collect::<Vec<_>>()
            .join(",")
    );

    let counter = Rc::new(RefCell::new(InstructionCounter::new(log_enabled!(Level::Trace))));
    if stats {
        codec.set_statistics(Some(Box::new(counter.clone())));
    }

    let mut out = VecDecodeOutput::<Rgba8>::new(Vec::with_capacity(pixel_count), Some(pixel_count));
    let decoded = codec.decode(&qflow_input[offset..], &mut out)?;
    if decoded != pixel_count {
        return Err(format!("stream ended after {decoded} of {pixel_count} pixels").into());
    }

    let raw = out.into_inner().concat();
    let image = RgbaImage::from_vec(header.width, header.height, raw)
        .ok_or("failed to create image")?;

    match format {
        // no alpha channel
        Format::Jpg => DynamicImage::ImageRgba8(image)
            .into_rgb8()
            .save_with_format(&output, ImageFormat::Jpeg)?,
        format => image.save_with_format(&output, format.into())?,
    }

    info!("Written {}x{} image to `{output}`", header.width, header.height);

    if stats {
        print_stats(&counter.borrow());
    }

    Ok(())
}

fn verify(options: Verify) -> Result<(), Box<dyn Error>> {
    let Verify {
        chain,
        length,
        input,
    } = options;

    let image = load_image(&input, None)?;
    let (width, height) = image.dimensions();
    let pixels = raw_pixels(&image);

    let mut codec = build_codec(chain, &length)?;
    let mut encoded = Vec::with_capacity(pixels.len());
    qflow::encode::encode_to_vec(&mut codec, width, height, &pixels, &mut encoded)?;

    let mut decoded = Vec::with_capacity(pixels.len());
    qflow::decode::decode_to_vec(&encoded, &mut decoded)?;

    if let Some(index) = pixels.iter().zip(&decoded).position(|(a, b)| a != b) {
        return Err(format!(
            "pixel {index} differs: {:?} != {:?}",
            pixels[index], decoded[index]
        )
        .into());
    }

    let raw_size = pixels.len() * 4;
    info!(
        "`{input}`: {width}x{height}, {} bytes ({:.1}% of {raw_size})",
        encoded.len(),
        encoded.len() as f64 * 100.0 / raw_size as f64
    );

    Ok(())
}
