use core::fmt;

/// The color every session starts from, and the initial content of every history slot.
pub const START_COLOR: Color = Color::new(0, 0, 0, 0);

/// A straight (non-premultiplied) RGBA color with 8 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    #[inline]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    #[inline]
    pub const fn from_rgba([r, g, b, a]: [u8; 4]) -> Self {
        Self { r, g, b, a }
    }

    #[inline]
    pub const fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Color({:3}, {:3}, {:3}, {:3})", self.r, self.g, self.b, self.a)
    }
}

/// Per-channel difference between two colors, each wrapped into a signed byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawDelta {
    pub dr: i8,
    pub dg: i8,
    pub db: i8,
    pub da: i8,
}

impl RawDelta {
    #[inline]
    pub const fn new(dr: i8, dg: i8, db: i8, da: i8) -> Self {
        Self { dr, dg, db, da }
    }

    /// The delta that turns `previous` into `current`.
    #[inline]
    pub const fn between(previous: Color, current: Color) -> Self {
        Self {
            dr: current.r.wrapping_sub(previous.r) as i8,
            dg: current.g.wrapping_sub(previous.g) as i8,
            db: current.b.wrapping_sub(previous.b) as i8,
            da: current.a.wrapping_sub(previous.a) as i8,
        }
    }

    #[inline]
    pub const fn apply(self, base: Color) -> Color {
        Color {
            r: base.r.wrapping_add(self.dr as u8),
            g: base.g.wrapping_add(self.dg as u8),
            b: base.b.wrapping_add(self.db as u8),
            a: base.a.wrapping_add(self.da as u8),
        }
    }

    /// The components in packing order: R, G, B, A.
    #[inline]
    pub const fn components(self) -> [i32; 4] {
        [self.dr as i32, self.dg as i32, self.db as i32, self.da as i32]
    }

    #[inline]
    pub const fn from_components([dr, dg, db, da]: [i32; 4]) -> Self {
        Self::new(dr as i8, dg as i8, db as i8, da as i8)
    }
}

/// Color difference in Strutz' A2 color space.
///
/// From "Adaptive Selection of Colour Transformations for Reversible Image Compression" (Tilo
/// Strutz):
///
/// ```plain
/// [Y ]   [0  1  0] [R]
/// [CB] = [0 -1  1] [G]
/// [CR]   [1 -1  0] [B]
/// ```
///
/// which sequences as `Y = G`, `CB = B - G`, `CR = R - G`.
///
/// The transform is lossless and dynamic-range preserving (8 bits in, 8 bits out) when every
/// component wraps modulo 256. It is also localized: small differences in R, G and B always result
/// in small differences in Y, CB and CR. That guarantee only holds while the component differences
/// stay within half of the channel range (128).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChromaDelta {
    pub dy: i8,
    pub cb: i8,
    pub cr: i8,
    pub da: i8,
}

impl ChromaDelta {
    #[inline]
    pub const fn new(dy: i8, cb: i8, cr: i8, da: i8) -> Self {
        Self { dy, cb, cr, da }
    }

    #[inline]
    pub const fn between(previous: Color, current: Color) -> Self {
        let RawDelta { dr, dg, db, da } = RawDelta::between(previous, current);

        Self {
            dy: dg,
            cb: db.wrapping_sub(dg),
            cr: dr.wrapping_sub(dg),
            da,
        }
    }

    #[inline]
    pub const fn apply(self, base: Color) -> Color {
        let dy = self.dy as u8;

        Color {
            r: base.r.wrapping_add(dy).wrapping_add(self.cr as u8),
            g: base.g.wrapping_add(dy),
            b: base.b.wrapping_add(dy).wrapping_add(self.cb as u8),
            a: base.a.wrapping_add(self.da as u8),
        }
    }

    /// The components in packing order: Y, CB, CR, A.
    #[inline]
    pub const fn components(self) -> [i32; 4] {
        [self.dy as i32, self.cb as i32, self.cr as i32, self.da as i32]
    }

    #[inline]
    pub const fn from_components([dy, cb, cr, da]: [i32; 4]) -> Self {
        Self::new(dy as i8, cb as i8, cr as i8, da as i8)
    }
}

/// One or more identical consecutive pixels produced by a single decode step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    pub color: Color,
    pub count: u32,
}

impl Run {
    #[inline]
    pub const fn single(color: Color) -> Self {
        Self { color, count: 1 }
    }
}

/// Everything the instructions need to know about the pixel being encoded. Built once per pixel
/// and shared by every instruction in the chain.
#[derive(Debug, Clone, Copy)]
pub struct PixelContext {
    pub previous: Color,
    pub current: Color,
    pub delta: RawDelta,
    pub chroma: ChromaDelta,
}

impl PixelContext {
    pub const fn new(previous: Color, current: Color) -> Self {
        Self {
            previous,
            current,
            delta: RawDelta::between(previous, current),
            chroma: ChromaDelta::between(previous, current),
        }
    }

    #[inline]
    pub fn is_repeat(&self) -> bool {
        self.current == self.previous
    }
}
