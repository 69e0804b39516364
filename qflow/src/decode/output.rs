use crate::{Color, ColorFormat};

/// Where decoded pixels go.
pub trait DecodeOutput {
    /// Writes `count` pixels of the same color. `count` never exceeds
    /// [`remaining`](DecodeOutput::remaining).
    fn write_run(&mut self, color: Color, count: usize);

    /// Returns the number of pixels that can still be written.
    ///
    /// `None` if the output is unbounded.
    fn remaining(&self) -> Option<usize>;

    fn current_output_position(&self) -> usize;
}

impl<O: DecodeOutput + ?Sized> DecodeOutput for &mut O {
    #[inline]
    fn write_run(&mut self, color: Color, count: usize) {
        (**self).write_run(color, count);
    }

    #[inline]
    fn remaining(&self) -> Option<usize> {
        (**self).remaining()
    }

    #[inline]
    fn current_output_position(&self) -> usize {
        (**self).current_output_position()
    }
}

/// Appends to a vector, optionally up to a total length.
#[derive(Debug, Clone)]
pub struct VecDecodeOutput<C: ColorFormat> {
    output: Vec<C::OutputElement>,
    limit: Option<usize>,
}

impl<C: ColorFormat> VecDecodeOutput<C> {
    pub fn new(output: Vec<C::OutputElement>, limit: Option<usize>) -> Self {
        Self { output, limit }
    }

    pub fn into_inner(self) -> Vec<C::OutputElement> {
        self.output
    }
}

impl<C: ColorFormat> DecodeOutput for VecDecodeOutput<C> {
    #[inline]
    fn write_run(&mut self, color: Color, count: usize) {
        let element = C::to_output(color);
        self.output.extend(core::iter::repeat(element).take(count));
    }

    #[inline]
    fn remaining(&self) -> Option<usize> {
        self.limit
            .map(|limit| limit.saturating_sub(self.output.len()))
    }

    #[inline]
    fn current_output_position(&self) -> usize {
        self.output.len()
    }
}

/// Fills a slice from the start.
#[derive(Debug)]
pub struct SliceDecodeOutput<'a, C: ColorFormat> {
    output: &'a mut [C::OutputElement],
    output_idx: usize,
}

impl<'a, C: ColorFormat> SliceDecodeOutput<'a, C> {
    #[inline]
    pub fn new(slice: &'a mut [C::OutputElement]) -> Self {
        Self {
            output: slice,
            output_idx: 0,
        }
    }
}

impl<C: ColorFormat> DecodeOutput for SliceDecodeOutput<'_, C> {
    #[inline]
    fn write_run(&mut self, color: Color, count: usize) {
        let end = (self.output_idx + count).min(self.output.len());
        self.output[self.output_idx..end].fill(C::to_output(color));
        self.output_idx = end;
    }

    #[inline]
    fn remaining(&self) -> Option<usize> {
        Some(self.output.len() - self.output_idx)
    }

    #[inline]
    fn current_output_position(&self) -> usize {
        self.output_idx
    }
}

/// Stops another output after a fixed number of pixels.
pub(crate) struct LimitedDecodeOutput<O> {
    inner: O,
    end: usize,
}

impl<O: DecodeOutput> LimitedDecodeOutput<O> {
    pub(crate) fn new(inner: O, count: usize) -> Self {
        let end = inner.current_output_position() + count;
        Self { inner, end }
    }
}

impl<O: DecodeOutput> DecodeOutput for LimitedDecodeOutput<O> {
    #[inline]
    fn write_run(&mut self, color: Color, count: usize) {
        self.inner.write_run(color, count);
    }

    #[inline]
    fn remaining(&self) -> Option<usize> {
        let left = self.end.saturating_sub(self.inner.current_output_position());
        Some(self.inner.remaining().map_or(left, |remaining| remaining.min(left)))
    }

    #[inline]
    fn current_output_position(&self) -> usize {
        self.inner.current_output_position()
    }
}
