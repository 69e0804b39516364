use crate::{
    decode::{DecodeError, DecodeOutput},
    encode::{EncodeError, UnencodableSnafu},
    instruction::{BitWidths, CodeRange, Instruction, InstructionKind},
    stats::{Record, Statistics},
    Color, PixelContext, Run, START_COLOR,
};
use core::fmt;
use log::debug;
use snafu::{ensure, Snafu};
use std::io::Cursor;

/// The chain used when nothing else is configured.
pub const DEFAULT_CHAIN: [InstructionKind; 7] = [
    InstructionKind::RunLength,
    InstructionKind::History,
    InstructionKind::Chroma(BitWidths::new_unchecked(2, 2, 2, 0)),
    InstructionKind::Chroma(BitWidths::new_unchecked(2, 2, 2, 2)),
    InstructionKind::Mask { alpha: false },
    InstructionKind::Mask { alpha: true },
    InstructionKind::Literal(BitWidths::RGBA8888),
];

/// Number of codes the run-length instruction of [`DEFAULT_CHAIN`] gets.
pub const DEFAULT_RUN_LENGTH: u32 = 10;

const NUM_CODES: u32 = 256;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display("Invalid bit width for channel {channel}: {bits} is not in {min}..=8"))]
    InvalidBitWidth { channel: char, bits: u8, min: u8 },
    #[snafu(display("Unknown instruction: {name:?}"))]
    UnknownInstruction { name: String },
    #[snafu(display("At least 2 instructions are required, got {count}"))]
    TooFewInstructions { count: usize },
    #[snafu(display("At least one variable-length instruction is required"))]
    NoVariableInstruction,
    #[snafu(display("Code space overflow: {required} > 256"))]
    CodeSpaceOverflow { required: u32 },
    #[snafu(display("At least one non-repeatable instruction is required"))]
    NoFooterInstruction,
    #[snafu(display("Variable length index {index} is out of range, expected 0..{count}"))]
    VariableLengthIndex { index: usize, count: usize },
    #[snafu(display("Variable length {length} is out of range, expected 1..={max}"))]
    VariableLength { length: u32, max: u32 },
}

/// Encodes and decodes a stream of colors with a chain of [`Instruction`]s.
///
/// The 256 opcode values are handed out to the instructions in chain order, starting from the top:
/// the first instruction gets the highest opcodes, the last one ends at 0. Instructions with a
/// fixed code count always get exactly that many. The remaining codes are shared by the variable
/// instructions, each of which gets an explicit length except the last, which gets the rest.
///
/// A codec holds the state of one session. Call [`reset`](StreamCodec::reset) before every stream.
pub struct StreamCodec {
    instructions: Vec<Box<dyn Instruction>>,
    chain: Option<Vec<InstructionKind>>,

    max_instruction_size: usize,
    num_fixed_codes: u32,
    variable_lengths: Vec<u32>,

    previous_color: Color,
    footer_code: u8,

    scratch: Vec<u8>,
    statistics: Option<Box<dyn Statistics>>,
}

impl StreamCodec {
    pub fn new(chain: Vec<InstructionKind>) -> Result<Self, ConfigError> {
        let instructions = chain.iter().map(|kind| kind.build()).collect();

        let mut codec = Self::from_instructions(instructions)?;
        codec.chain = Some(chain);
        Ok(codec)
    }

    /// [`DEFAULT_CHAIN`] with [`DEFAULT_RUN_LENGTH`] run-length codes.
    pub fn default_chain() -> Result<Self, ConfigError> {
        let mut codec = Self::new(DEFAULT_CHAIN.to_vec())?;
        codec.set_variable_length(0, DEFAULT_RUN_LENGTH)?;
        codec.reset();
        Ok(codec)
    }

    /// Creates a codec from instruction instances, which must not be used by any other codec.
    ///
    /// Codecs created this way can't be written to an image container, since the instructions
    /// can't be described by [`InstructionKind`]s.
    pub fn from_instructions(instructions: Vec<Box<dyn Instruction>>) -> Result<Self, ConfigError> {
        ensure!(
            instructions.len() >= 2,
            TooFewInstructionsSnafu {
                count: instructions.len()
            }
        );

        let num_variable = instructions
            .iter()
            .filter(|instruction| instruction.fixed_code_count() == 0)
            .count();
        ensure!(num_variable > 0, NoVariableInstructionSnafu);

        let num_fixed_codes = instructions
            .iter()
            .map(|instruction| instruction.fixed_code_count())
            .sum::<u32>();
        let required = num_fixed_codes + num_variable as u32;
        ensure!(required <= NUM_CODES, CodeSpaceOverflowSnafu { required });

        ensure!(
            instructions.iter().any(|instruction| !instruction.can_repeat_bytes()),
            NoFooterInstructionSnafu
        );

        let max_instruction_size = instructions
            .iter()
            .map(|instruction| instruction.max_size())
            .max()
            .unwrap_or(0)
            .max(1);

        let mut codec = Self {
            instructions,
            chain: None,
            max_instruction_size,
            num_fixed_codes,
            variable_lengths: vec![1; num_variable - 1],
            previous_color: START_COLOR,
            footer_code: 0,
            scratch: vec![0; max_instruction_size],
            statistics: None,
        };
        codec.reset();

        Ok(codec)
    }

    /// The chain this codec was built from, if it was built from [`InstructionKind`]s.
    pub fn chain(&self) -> Option<&[InstructionKind]> {
        self.chain.as_deref()
    }

    pub fn instructions(&self) -> &[Box<dyn Instruction>] {
        &self.instructions
    }

    /// The largest datagram any instruction emits, which is also the length of the footer.
    pub fn max_instruction_size(&self) -> usize {
        self.max_instruction_size
    }

    /// Number of codes shared by the variable instructions.
    pub fn num_variable_codes(&self) -> u32 {
        NUM_CODES - self.num_fixed_codes
    }

    /// Number of explicitly configurable variable lengths: one less than the number of variable
    /// instructions.
    pub fn num_variable_lengths(&self) -> usize {
        self.variable_lengths.len()
    }

    /// The explicit variable lengths.
    pub fn variable_lengths(&self) -> &[u32] {
        &self.variable_lengths
    }

    /// The number of codes of the variable instruction with the given index, counting only
    /// variable instructions. `index == num_variable_lengths()` gives the implicit remainder.
    pub fn variable_length(&self, index: usize) -> Option<u32> {
        match index.cmp(&self.variable_lengths.len()) {
            core::cmp::Ordering::Less => Some(self.variable_lengths[index]),
            core::cmp::Ordering::Equal => Some(self.remaining_variable_codes() as u32),
            core::cmp::Ordering::Greater => None,
        }
    }

    fn remaining_variable_codes(&self) -> i64 {
        let explicit = self.variable_lengths.iter().map(|&l| i64::from(l)).sum::<i64>();
        i64::from(self.num_variable_codes()) - explicit
    }

    /// Sets the number of codes of a variable instruction. Takes effect on the next
    /// [`reset`](StreamCodec::reset).
    ///
    /// The given length is honored exactly. If the implicit last variable instruction would be
    /// left without codes, the other explicit lengths are shrunk, starting from the last one, but
    /// never below 1.
    pub fn set_variable_length(&mut self, index: usize, length: u32) -> Result<(), ConfigError> {
        let count = self.variable_lengths.len();
        ensure!(index < count, VariableLengthIndexSnafu { index, count });

        let max = self.num_variable_codes() - count as u32;
        ensure!(
            (1..=max).contains(&length),
            VariableLengthSnafu { length, max }
        );

        self.variable_lengths[index] = length;

        let remaining = self.remaining_variable_codes();
        if remaining < 1 {
            // e.g. [6, 10, 100] (+140 implicit), setting index 2 to 252:
            // [6, 10, 252] (-12) -> [6, 1, 252] (-3) -> [2, 1, 252] (1)
            let mut excess = (1 - remaining) as u32;

            for i in (0..count).rev() {
                if i == index {
                    continue;
                }

                let amount = excess.min(self.variable_lengths[i] - 1);
                self.variable_lengths[i] -= amount;
                excess -= amount;

                if excess == 0 {
                    break;
                }
            }
        }

        Ok(())
    }

    /// The opcode that marks the end of a stream: the first code of the first instruction that
    /// can't emit the same opcode twice in a row.
    pub fn footer_code(&self) -> u8 {
        self.footer_code
    }

    /// The opcode window of every instruction, in chain order.
    pub fn code_ranges(&self) -> Vec<CodeRange> {
        self.instructions
            .iter()
            .map(|instruction| instruction.code_range())
            .collect()
    }

    /// Assigns the opcode windows, selects the footer code and clears all session state.
    pub fn reset(&mut self) {
        self.assign_code_ranges();

        self.previous_color = START_COLOR;
        if let Some(footer) = self
            .instructions
            .iter()
            .find(|instruction| !instruction.can_repeat_bytes())
        {
            self.footer_code = footer.code_range().offset;
        }

        for instruction in &mut self.instructions {
            instruction.reset();
        }
    }

    fn assign_code_ranges(&mut self) {
        let mut code_offset = NUM_CODES;
        let mut variable_index = 0;

        for i in 0..self.instructions.len() {
            let mut count = self.instructions[i].fixed_code_count();
            if count == 0 {
                count = self.variable_length(variable_index).unwrap_or(1);
                variable_index += 1;
            }

            code_offset -= count;
            let range = CodeRange::new(code_offset as u8, count);
            self.instructions[i].set_code_range(range);

            if count == 1 {
                debug!("{}: 0x{:02x} ({count})", self.instructions[i], range.offset);
            } else {
                debug!(
                    "{}: 0x{:02x}..0x{:02x} ({count})",
                    self.instructions[i],
                    range.offset,
                    range.last()
                );
            }
        }
    }

    /// Reports every datagram to the given collaborator. `None` disables reporting.
    pub fn set_statistics(&mut self, statistics: Option<Box<dyn Statistics>>) {
        self.statistics = statistics;
    }

    pub fn take_statistics(&mut self) -> Option<Box<dyn Statistics>> {
        self.statistics.take()
    }

    /// Encodes the next color of the stream into `sink`.
    ///
    /// Fails only if no instruction in the chain can represent the color, which can't happen for
    /// chains containing an 8-8-8-8 literal.
    pub fn encode(&mut self, color: Color, sink: &mut Vec<u8>) -> Result<(), EncodeError> {
        let pixel = PixelContext::new(self.previous_color, color);

        self.pre_encode(&pixel, sink);
        self.main_encode(&pixel, sink)?;

        self.previous_color = color;
        Ok(())
    }

    fn pre_encode(&mut self, pixel: &PixelContext, sink: &mut Vec<u8>) {
        for instruction in &mut self.instructions {
            let start = sink.len();
            instruction.pre_encode(pixel, sink);

            if let Some(statistics) = &mut self.statistics {
                if sink.len() > start {
                    report(
                        statistics.as_mut(),
                        instruction.as_ref(),
                        &sink[start..],
                        pixel.previous,
                    );
                }
            }
        }
    }

    fn main_encode(&mut self, pixel: &PixelContext, sink: &mut Vec<u8>) -> Result<(), EncodeError> {
        for instruction in &mut self.instructions {
            if let Some(len) = instruction.encode(pixel, &mut self.scratch) {
                let datagram = &self.scratch[..len];
                sink.extend_from_slice(datagram);

                if let Some(statistics) = &mut self.statistics {
                    if len > 0 {
                        report(statistics.as_mut(), instruction.as_ref(), datagram, pixel.current);
                    }
                }

                return Ok(());
            }
        }

        UnencodableSnafu {
            color: pixel.current,
        }
        .fail()
    }

    /// Flushes all deferred datagrams and appends the footer. Ends the session.
    pub fn finish(&mut self, sink: &mut Vec<u8>) {
        for instruction in &mut self.instructions {
            let start = sink.len();
            instruction.post_encode(sink);

            if let Some(statistics) = &mut self.statistics {
                if sink.len() > start {
                    report(
                        statistics.as_mut(),
                        instruction.as_ref(),
                        &sink[start..],
                        self.previous_color,
                    );
                }
            }
        }

        sink.extend(core::iter::repeat(self.footer_code).take(self.max_instruction_size));
    }

    /// Decodes the datagram starting with `code`, whose payload follows at the position of `src`.
    ///
    /// Call [`post_decode`](StreamCodec::post_decode) with the resulting color afterwards.
    pub fn decode_run(
        &mut self,
        code: u8,
        src: &mut Cursor<&[u8]>,
        last: Color,
    ) -> Result<Run, DecodeError> {
        let start = src.position() as usize;

        let instruction = self
            .instructions
            .iter_mut()
            .find(|instruction| code >= instruction.code_range().offset)
            .ok_or(DecodeError::UnknownOpcode { code })?;

        let run = instruction.decode(code, src, last)?;

        if let Some(statistics) = &mut self.statistics {
            let end = src.position() as usize;

            let mut datagram = Vec::with_capacity(1 + end - start);
            datagram.push(code);
            datagram.extend_from_slice(&src.get_ref()[start..end]);

            report(statistics.as_mut(), instruction.as_ref(), &datagram, run.color);
        }

        Ok(run)
    }

    /// Lets every instruction observe a decoded color.
    pub fn post_decode(&mut self, color: Color) {
        for instruction in &mut self.instructions {
            instruction.post_decode(color);
        }
    }

    /// Decodes a stream until the footer, the end of `data`, or until `output` is full.
    ///
    /// Returns the number of pixels written to `output`. Stops early instead of failing when fewer
    /// than [`max_instruction_size`](StreamCodec::max_instruction_size) bytes are left before an
    /// opcode. Bytes after the footer are not read.
    pub fn decode(
        &mut self,
        data: &[u8],
        output: &mut impl DecodeOutput,
    ) -> Result<usize, DecodeError> {
        let start_position = output.current_output_position();
        let mut src = Cursor::new(data);
        let mut previous_was_footer = false;

        loop {
            if output.remaining() == Some(0) {
                break;
            }

            let position = src.position() as usize;
            if data.len() - position < self.max_instruction_size {
                break;
            }

            let code = data[position];
            src.set_position(position as u64 + 1);

            // A single footer code is an ordinary opcode. It can't occur twice in a row, so a
            // genuine one is followed either by another opcode or by the whole footer.
            let is_footer = code == self.footer_code;
            if is_footer && (previous_was_footer || self.is_footer_run(&data[position..])) {
                break;
            }

            let run = self.decode_run(code, &mut src, self.previous_color)?;

            let count = run.count as usize;
            let count = output.remaining().map_or(count, |remaining| count.min(remaining));
            output.write_run(run.color, count);

            self.previous_color = run.color;
            self.post_decode(run.color);
            previous_was_footer = is_footer;
        }

        Ok(output.current_output_position() - start_position)
    }

    /// Whether `rest` starts with exactly one footer, regardless of what follows it.
    fn is_footer_run(&self, rest: &[u8]) -> bool {
        let run = rest.iter().take_while(|&&b| b == self.footer_code).count();

        // a one byte footer looks like a History hit unless the data ends there
        run == self.max_instruction_size && (run > 1 || rest.len() == 1)
    }
}

fn report(
    statistics: &mut dyn Statistics,
    instruction: &dyn Instruction,
    datagram: &[u8],
    color: Color,
) {
    let name = instruction.to_string();
    let parameters = instruction.parameters(datagram);

    statistics.record(&Record {
        datagram,
        name: &name,
        parameters: &parameters,
        color,
    });
}

impl fmt::Debug for StreamCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamCodec")
            .field(
                "instructions",
                &self
                    .instructions
                    .iter()
                    .map(|instruction| instruction.to_string())
                    .collect::<Vec<_>>(),
            )
            .field("code_ranges", &self.code_ranges())
            .field("footer_code", &self.footer_code)
            .field("max_instruction_size", &self.max_instruction_size)
            .finish_non_exhaustive()
    }
}
