use qflow::{Color, InstructionCounter, InstructionKind, Rgba8, StreamCodec, VecDecodeOutput};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{cell::RefCell, rc::Rc};

fn codec(names: &[&str], lengths: &[(usize, u32)]) -> StreamCodec {
    let chain = names
        .iter()
        .map(|name| name.parse::<InstructionKind>().unwrap())
        .collect();

    let mut codec = StreamCodec::new(chain).unwrap();
    for &(index, length) in lengths {
        codec.set_variable_length(index, length).unwrap();
    }
    codec.reset();
    codec
}

fn encode(codec: &mut StreamCodec, colors: &[Color]) -> Vec<u8> {
    codec.reset();

    let mut stream = Vec::new();
    for &color in colors {
        codec.encode(color, &mut stream).unwrap();
    }
    codec.finish(&mut stream);

    stream
}

/// Decodes until the footer, without a pixel budget.
fn decode(codec: &mut StreamCodec, stream: &[u8]) -> Vec<Color> {
    codec.reset();

    let mut output = VecDecodeOutput::<Rgba8>::new(Vec::new(), None);
    let count = codec.decode(stream, &mut output).unwrap();

    let colors = output
        .into_inner()
        .into_iter()
        .map(Color::from_rgba)
        .collect::<Vec<_>>();
    assert_eq!(colors.len(), count);
    colors
}

fn random_colors(rng: &mut StdRng, len: usize) -> Vec<Color> {
    let palette = (0..12).map(|_| Color::from_rgba(rng.random())).collect::<Vec<_>>();

    let mut colors = Vec::with_capacity(len);
    let mut previous = Color::new(0, 0, 0, 0);

    for _ in 0..len {
        let color = match rng.random_range(0..10) {
            0..=2 => previous,
            3..=5 => {
                let step = |v: u8, rng: &mut StdRng| {
                    v.wrapping_add(rng.random_range(0..7)).wrapping_sub(3)
                };
                Color::new(
                    step(previous.r, rng),
                    step(previous.g, rng),
                    step(previous.b, rng),
                    if rng.random_bool(0.1) { rng.random() } else { previous.a },
                )
            }
            6..=7 => palette[rng.random_range(0..palette.len())],
            _ => Color::from_rgba(rng.random()),
        };

        colors.push(color);
        previous = color;
    }

    colors
}

#[test]
fn four_pixel_scenario() {
    let mut codec = StreamCodec::default_chain().unwrap();
    let colors = [
        Color::new(128, 128, 128, 255),
        Color::new(255, 128, 255, 255),
        Color::new(255, 255, 255, 128),
        Color::new(128, 128, 128, 128),
    ];

    let stream = encode(&mut codec, &colors);
    assert_eq!(
        stream,
        [
            16, 128, 128, 128, 255, // MASKA rgba
            22, 255, 255, // MASK rb
            6, 255, 128, // MASKA ga
            24, 128, 128, 128, // MASK rgb
            90, 90, 90, 90, 90, // footer
        ]
    );

    assert_eq!(decode(&mut codec, &stream), colors);
}

#[test]
fn long_runs_use_several_digits() {
    let mut codec = codec(&["rle", "hist", "rgba8888"], &[(0, 10)]);
    let first = Color::new(1, 2, 3, 4);
    let second = Color::new(5, 6, 7, 8);

    let mut colors = vec![first; 1 + 110];
    colors.extend([second; 1 + 111]);

    let stream = encode(&mut codec, &colors);
    assert_eq!(
        stream,
        [
            0, 1, 2, 3, 4, // first
            255, 255, // 110 = [9, 9]
            0, 5, 6, 7, 8, // second
            246, 246, 246, // 111 = [0, 0, 0]
            1, 1, 1, 1, 1, // footer
        ]
    );

    assert_eq!(decode(&mut codec, &stream), colors);
}

#[test]
fn single_footer_code_is_an_opcode() {
    let mut codec = StreamCodec::default_chain().unwrap();
    let footer = codec.footer_code();

    let a = Color::new(10, 20, 30, 255);
    let b = Color::new(200, 100, 50, 255);

    // a is the first history entry, so re-emitting it uses the footer code
    for colors in [vec![a, b, a, b], vec![a, b, a], vec![a, b, a, a, a]] {
        let stream = encode(&mut codec, &colors);
        let footer_len = codec.max_instruction_size();

        let body = &stream[..stream.len() - footer_len];
        assert!(body.contains(&footer), "{stream:?}");
        assert!(stream[stream.len() - footer_len..].iter().all(|&b| b == footer));

        assert_eq!(decode(&mut codec, &stream), colors);
    }
}

#[test]
fn trailing_bytes_after_footer_are_ignored() {
    let mut codec = StreamCodec::default_chain().unwrap();

    let a = Color::new(10, 20, 30, 255);
    let b = Color::new(200, 100, 50, 255);
    let cases = [
        vec![Color::new(1, 2, 3, 255), Color::new(50, 60, 70, 255)],
        // ends with a history hit on the footer code
        vec![a, b, a],
        vec![],
    ];

    for colors in cases {
        let mut stream = encode(&mut codec, &colors);
        stream.extend([0xab, 0xcd]);
        assert_eq!(decode(&mut codec, &stream), colors);

        stream.extend([0; 16]);
        assert_eq!(decode(&mut codec, &stream), colors);
    }
}

#[test]
fn random_streams_roundtrip() {
    let chains: &[(&[&str], &[(usize, u32)])] = &[
        (&["rle", "hist", "chroma222", "chroma2222", "mask", "maska", "rgba8888"], &[(0, 10)]),
        (
            &["rle", "hist", "delta222", "delta4444", "chroma444", "rgb565", "mask", "rgba8888"],
            &[(0, 32)],
        ),
        (&["hist", "rle", "delta2221", "rgba8888"], &[(0, 100)]),
        (&["chroma222", "mask", "hist", "maska", "rle", "rgba8888"], &[(0, 2)]),
        (&["rgb565", "delta222", "hist", "rle", "rgba8888"], &[(0, 7)]),
        (&["rle", "rle", "hist", "hist", "rgba8888"], &[(0, 3), (1, 2), (2, 64)]),
        (&["hist", "rle", "rgba8888"], &[(0, 1)]),
    ];

    let mut rng = StdRng::seed_from_u64(0x9f10);

    for &(names, lengths) in chains {
        let mut codec = codec(names, lengths);

        for len in [0, 1, 2, 17, 1000, 5000] {
            let colors = random_colors(&mut rng, len);
            let stream = encode(&mut codec, &colors);

            assert_eq!(decode(&mut codec, &stream), colors, "{names:?}, {len} pixels");
        }
    }
}

#[test]
fn pixel_budget_stops_decoding() {
    let mut codec = StreamCodec::default_chain().unwrap();
    let mut rng = StdRng::seed_from_u64(7);
    let colors = random_colors(&mut rng, 300);
    let stream = encode(&mut codec, &colors);

    for budget in [0, 1, 150, 300] {
        codec.reset();
        let mut output = VecDecodeOutput::<Rgba8>::new(Vec::new(), Some(budget));
        assert_eq!(codec.decode(&stream, &mut output).unwrap(), budget);

        let decoded = output.into_inner();
        let expected = colors[..budget].iter().map(|c| c.to_rgba()).collect::<Vec<_>>();
        assert_eq!(decoded, expected);
    }
}

#[test]
fn every_color_is_encodable() {
    let mut codec = StreamCodec::default_chain().unwrap();
    let mut rng = StdRng::seed_from_u64(42);
    let mut sink = Vec::new();

    let extremes = [0u8, 1, 127, 128, 254, 255];
    let mut colors = Vec::new();
    for r in extremes {
        for g in extremes {
            for b in extremes {
                for a in extremes {
                    colors.push(Color::new(r, g, b, a));
                }
            }
        }
    }
    colors.extend((0..100_000).map(|_| Color::from_rgba(rng.random())));

    for &color in &colors {
        codec.encode(color, &mut sink).unwrap();
    }
    codec.finish(&mut sink);

    assert_eq!(decode(&mut codec, &sink), colors);
}

#[test]
fn statistics_count_datagrams() {
    let counter = Rc::new(RefCell::new(InstructionCounter::new(false)));

    let mut codec = StreamCodec::default_chain().unwrap();
    codec.set_statistics(Some(Box::new(counter.clone())));

    let red = Color::new(255, 0, 0, 255);
    let colors = [red, red, red, Color::new(254, 1, 0, 255), red];
    let stream = encode(&mut codec, &colors);

    {
        let counter = counter.borrow();
        assert_eq!(counter.count("CHROMA2222"), 1);
        assert_eq!(counter.count("RLE10"), 1);
        assert_eq!(counter.count("CHROMA222"), 1);
        assert_eq!(counter.count("HIST156"), 1);
        assert_eq!(counter.total(), 4);
    }

    counter.borrow_mut().clear();
    assert_eq!(decode(&mut codec, &stream), colors);
    assert_eq!(counter.borrow().total(), 4);

    assert!(codec.take_statistics().is_some());
    assert!(codec.take_statistics().is_none());
}
