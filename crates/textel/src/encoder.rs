//! Cell sampling and redundancy-aware escape encoding.
//!
//! The raster is walked in a grid set by the row stride and resolution
//! mode, each sampled pixel is matched to a palette index, and indices
//! are written out as escape-coded text one line per sampled row. A color
//! escape is only emitted when it differs from the previous cell's.

use crate::palette::{Palette, PaletteEntry, RenderCode, Thresholds};
use crate::{RenderError, Result};

/// The glyph used in half-block mode: foreground paints the top pixel,
/// background the bottom one.
pub const UPPER_HALF_BLOCK: char = '\u{2580}';

/// Reset-to-normal escape appended at the end of every ANSI/xterm line.
const SGR_RESET: &str = "\x1b[0m";

/// mIRC color-code introducer.
const IRC_COLOR: char = '\x03';

/// Mode flags and sampling parameters, resolved once before rendering.
///
/// `irc` takes precedence over `xterm`; `grayscale` only has an effect
/// together with `xterm`. See [`Palette::resolve`] for the full palette
/// selection rules.
#[derive(Clone, Debug)]
pub struct RenderOptions {
    /// Emit mIRC color codes instead of ANSI escapes.
    pub irc: bool,
    /// Use the xterm-256 palette and `38;5;`/`48;5;` escapes.
    pub xterm: bool,
    /// Half-block mode: one output row covers two image rows.
    pub high_res: bool,
    /// Restrict the xterm palette to the grayscale ramp.
    pub grayscale: bool,
    /// Vertical sampling stride in image rows; must be at least 1.
    pub step: usize,
    /// Exclusion floor for near-black matches; 0 disables.
    pub black_threshold: f64,
    /// Exclusion floor for near-white matches; 0 disables.
    pub white_threshold: f64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            irc: false,
            xterm: false,
            high_res: false,
            grayscale: false,
            step: 2,
            black_threshold: 0.0,
            white_threshold: 0.0,
        }
    }
}

/// Renders a packed RGB raster (3 bytes per pixel, row-major) to
/// escape-coded text, one newline-terminated line per sampled row.
///
/// # Example
/// ```
/// use textel::{render, RenderOptions};
///
/// let rgb = [0u8, 0, 0, 255, 255, 255]; // 2x1: black, white
/// let opts = RenderOptions { step: 1, ..RenderOptions::default() };
/// let text = render(&rgb, 2, 1, &opts)?;
/// assert_eq!(text, "\x1b[40m \x1b[47;1m \x1b[0m\n");
/// # Ok::<(), textel::RenderError>(())
/// ```
#[must_use = "this returns the rendered text"]
pub fn render(rgb: &[u8], width: usize, height: usize, opts: &RenderOptions) -> Result<String> {
    let lines = render_lines(rgb, width, height, opts)?;
    let mut out = String::new();
    for line in lines {
        out.push_str(&line);
    }
    Ok(out)
}

/// Like [`render`], but returns a lazy iterator producing one line at a
/// time. Rows are sampled at `y = 0, step, 2*step, ...`.
///
/// # Errors
///
/// Fails fast on a zero dimension ([`RenderError::InvalidDimensions`]),
/// a buffer that isn't `width * height * 3` bytes
/// ([`RenderError::BufferSizeMismatch`]), or a zero step
/// ([`RenderError::InvalidStep`]). Sampling itself cannot fail: in
/// half-block mode the row below the last one reads as black.
pub fn render_lines<'a>(
    rgb: &'a [u8],
    width: usize,
    height: usize,
    opts: &RenderOptions,
) -> Result<Lines<'a>> {
    if width == 0 || height == 0 {
        return Err(RenderError::InvalidDimensions { width, height });
    }
    let expected = width * height * 3;
    if rgb.len() != expected {
        return Err(RenderError::BufferSizeMismatch {
            expected,
            actual: rgb.len(),
        });
    }
    if opts.step == 0 {
        return Err(RenderError::InvalidStep);
    }

    let thresholds = Thresholds {
        black: opts.black_threshold,
        white: opts.white_threshold,
    };

    Ok(Lines {
        rgb,
        width,
        height,
        palette: Palette::resolve(opts),
        thresholds: thresholds.is_active().then_some(thresholds),
        irc: opts.irc,
        high_res: opts.high_res,
        step: opts.step,
        y: 0,
    })
}

/// Lazy line producer returned by [`render_lines`].
///
/// The palette is resolved once at construction; each call to `next`
/// samples and encodes one output row.
pub struct Lines<'a> {
    rgb: &'a [u8],
    width: usize,
    height: usize,
    palette: Palette,
    thresholds: Option<Thresholds>,
    irc: bool,
    high_res: bool,
    step: usize,
    y: usize,
}

/// Per-line encoder state for redundancy elimination. `None` at the start
/// of a line, so the first cell always writes its full fragment.
#[derive(Default)]
struct EncoderState {
    prev_fore: Option<usize>,
    prev_back: Option<usize>,
}

impl Iterator for Lines<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.y >= self.height {
            return None;
        }
        let line = self.encode_row(self.y);
        self.y += self.step;
        Some(line)
    }
}

impl Lines<'_> {
    /// Reads the pixel at `(x, y)`, substituting black below the bottom
    /// edge (half-block mode reads one row past the last sampled row when
    /// the height is odd).
    fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        if y >= self.height {
            return [0, 0, 0];
        }
        let i = (y * self.width + x) * 3;
        [self.rgb[i], self.rgb[i + 1], self.rgb[i + 2]]
    }

    fn nearest(&self, rgb: [u8; 3]) -> usize {
        match &self.thresholds {
            Some(thresholds) => self.palette.nearest_thresholded(rgb, thresholds),
            None => self.palette.nearest(rgb),
        }
    }

    fn encode_row(&self, y: usize) -> String {
        let mut out = String::with_capacity(self.width * 8 + 8);
        let mut state = EncoderState::default();

        for x in 0..self.width {
            if self.high_res {
                let fore = self.nearest(self.pixel(x, y));
                let back = self.nearest(self.pixel(x, y + 1));
                self.encode_half_block(&mut out, &mut state, fore, back);
            } else {
                let back = self.nearest(self.pixel(x, y));
                self.encode_block(&mut out, &mut state, back);
            }
        }

        if !self.irc {
            out.push_str(SGR_RESET);
        }
        out.push('\n');
        out
    }

    /// Standard mode: a space on the cell's background color.
    fn encode_block(&self, out: &mut String, state: &mut EncoderState, back: usize) {
        if state.prev_back != Some(back) {
            push_back(out, &self.palette.entries()[back]);
            state.prev_back = Some(back);
        }
        out.push(' ');
    }

    /// Half-block mode: foreground is the top pixel, background the
    /// bottom one. Whichever of the two is unchanged from the previous
    /// cell keeps its escape suppressed.
    fn encode_half_block(
        &self,
        out: &mut String,
        state: &mut EncoderState,
        fore: usize,
        back: usize,
    ) {
        let entries = self.palette.entries();
        let fore_changed = state.prev_fore != Some(fore);
        let back_changed = state.prev_back != Some(back);

        match (fore_changed, back_changed) {
            (false, false) => {}
            (true, false) => push_fore(out, &entries[fore]),
            // mIRC has no background-only form, so a background change
            // restates the (unchanged) foreground as well.
            (false, true) if self.irc => push_pair(out, &entries[fore], &entries[back]),
            (false, true) => push_back(out, &entries[back]),
            (true, true) => push_pair(out, &entries[fore], &entries[back]),
        }

        state.prev_fore = Some(fore);
        state.prev_back = Some(back);
        out.push(UPPER_HALF_BLOCK);
    }
}

/// Foreground-only fragment.
fn push_fore(out: &mut String, entry: &PaletteEntry) {
    match entry.code {
        RenderCode::Sgr { fore, .. } => {
            out.push_str("\x1b[");
            out.push_str(fore);
            out.push('m');
        }
        RenderCode::Irc(code) => {
            out.push(IRC_COLOR);
            out.push_str(code);
        }
        RenderCode::Xterm(code) => {
            out.push_str("\x1b[38;5;");
            push_number(out, code);
            out.push('m');
        }
    }
}

/// Background-only fragment. For mIRC this pairs the color with itself,
/// which is the standard-mode "space on a colored background" form.
fn push_back(out: &mut String, entry: &PaletteEntry) {
    match entry.code {
        RenderCode::Sgr { back, .. } => {
            out.push_str("\x1b[");
            out.push_str(back);
            out.push('m');
        }
        RenderCode::Irc(code) => {
            out.push(IRC_COLOR);
            out.push_str(code);
            out.push(',');
            out.push_str(code);
        }
        RenderCode::Xterm(code) => {
            out.push_str("\x1b[48;5;");
            push_number(out, code);
            out.push('m');
        }
    }
}

/// Combined foreground + background fragment.
fn push_pair(out: &mut String, fore: &PaletteEntry, back: &PaletteEntry) {
    match (fore.code, back.code) {
        (RenderCode::Sgr { fore, .. }, RenderCode::Sgr { back, .. }) => {
            out.push_str("\x1b[");
            out.push_str(fore);
            out.push(';');
            out.push_str(back);
            out.push('m');
        }
        (RenderCode::Irc(fore), RenderCode::Irc(back)) => {
            out.push(IRC_COLOR);
            out.push_str(fore);
            out.push(',');
            out.push_str(back);
        }
        // Entries come from one palette, so the families always agree;
        // xterm needs two escapes either way.
        _ => {
            push_fore(out, fore);
            push_back(out, back);
        }
    }
}

/// Writes a color code as decimal digits without allocating.
fn push_number(out: &mut String, n: u8) {
    if n >= 100 {
        out.push((b'0' + n / 100) as char);
    }
    if n >= 10 {
        out.push((b'0' + (n / 10) % 10) as char);
    }
    out.push((b'0' + n % 10) as char);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Builds a packed raster from pixel rows.
    fn raster(rows: &[&[[u8; 3]]]) -> (Vec<u8>, usize, usize) {
        let height = rows.len();
        let width = rows[0].len();
        let mut rgb = Vec::with_capacity(width * height * 3);
        for row in rows {
            assert_eq!(row.len(), width);
            for pixel in *row {
                rgb.extend_from_slice(pixel);
            }
        }
        (rgb, width, height)
    }

    #[test]
    fn rejects_zero_dimensions() {
        let opts = RenderOptions::default();
        assert!(matches!(
            render(&[], 0, 1, &opts),
            Err(RenderError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            render(&[], 1, 0, &opts),
            Err(RenderError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn rejects_short_buffer() {
        let opts = RenderOptions::default();
        let err = render(&[0u8; 5], 1, 2, &opts).unwrap_err();
        assert!(matches!(
            err,
            RenderError::BufferSizeMismatch {
                expected: 6,
                actual: 5
            }
        ));
    }

    #[test]
    fn rejects_zero_step() {
        let opts = RenderOptions {
            step: 0,
            ..RenderOptions::default()
        };
        assert!(matches!(
            render(&[0u8; 3], 1, 1, &opts),
            Err(RenderError::InvalidStep)
        ));
    }

    #[test]
    fn solid_line_emits_one_escape() {
        let white = [255, 255, 255];
        let (rgb, w, h) = raster(&[&[white, white, white, white]]);
        let opts = RenderOptions {
            step: 1,
            ..RenderOptions::default()
        };
        let text = render(&rgb, w, h, &opts).unwrap();
        assert_eq!(text, "\x1b[47;1m    \x1b[0m\n");
    }

    #[test]
    fn irc_lines_have_no_reset() {
        let white = [255, 255, 255];
        let (rgb, w, h) = raster(&[&[white, white, white, white]]);
        let opts = RenderOptions {
            irc: true,
            step: 1,
            ..RenderOptions::default()
        };
        let text = render(&rgb, w, h, &opts).unwrap();
        // White is mIRC color 0; one self-paired code, then plain spaces.
        assert_eq!(text, "\x030,0    \n");
    }

    #[test]
    fn background_change_reemits_escape() {
        let maroon = [128, 0, 0];
        let navy = [0, 0, 128];
        let (rgb, w, h) = raster(&[&[maroon, maroon, navy]]);
        let opts = RenderOptions {
            step: 1,
            ..RenderOptions::default()
        };
        let text = render(&rgb, w, h, &opts).unwrap();
        assert_eq!(text, "\x1b[41m  \x1b[44m \x1b[0m\n");
    }

    #[test]
    fn state_resets_between_lines() {
        let maroon = [128, 0, 0];
        let (rgb, w, h) = raster(&[&[maroon], &[maroon]]);
        let opts = RenderOptions {
            step: 1,
            ..RenderOptions::default()
        };
        let text = render(&rgb, w, h, &opts).unwrap();
        // Both lines restate the color even though it never changed.
        assert_eq!(text, "\x1b[41m \x1b[0m\n\x1b[41m \x1b[0m\n");
    }

    #[test]
    fn half_block_suppresses_unchanged_foreground() {
        let maroon = [128, 0, 0];
        let navy = [0, 0, 128];
        let (rgb, w, h) = raster(&[&[maroon, maroon], &[maroon, navy]]);
        let opts = RenderOptions {
            high_res: true,
            step: 2,
            ..RenderOptions::default()
        };
        let text = render(&rgb, w, h, &opts).unwrap();
        // Cell 1: full pair. Cell 2: foreground unchanged, background-only.
        assert_eq!(text, "\x1b[31;41m\u{2580}\x1b[44m\u{2580}\x1b[0m\n");
    }

    #[test]
    fn half_block_suppresses_unchanged_background() {
        let maroon = [128, 0, 0];
        let navy = [0, 0, 128];
        let (rgb, w, h) = raster(&[&[maroon, navy], &[maroon, maroon]]);
        let opts = RenderOptions {
            high_res: true,
            step: 2,
            ..RenderOptions::default()
        };
        let text = render(&rgb, w, h, &opts).unwrap();
        assert_eq!(text, "\x1b[31;41m\u{2580}\x1b[34m\u{2580}\x1b[0m\n");
    }

    #[test]
    fn half_block_identical_cells_emit_bare_glyphs() {
        let teal = [0, 128, 128];
        let (rgb, w, h) = raster(&[&[teal, teal, teal], &[teal, teal, teal]]);
        let opts = RenderOptions {
            high_res: true,
            step: 2,
            ..RenderOptions::default()
        };
        let text = render(&rgb, w, h, &opts).unwrap();
        assert_eq!(text, "\x1b[36;46m\u{2580}\u{2580}\u{2580}\x1b[0m\n");
    }

    #[test]
    fn half_block_bottom_edge_reads_black() {
        let silver = [192, 192, 192];
        let (rgb, w, h) = raster(&[&[silver]]);
        let opts = RenderOptions {
            high_res: true,
            step: 2,
            ..RenderOptions::default()
        };
        let text = render(&rgb, w, h, &opts).unwrap();
        // Height 1: the background pixel at y=1 is out of bounds and
        // must sample as black, not fail.
        assert_eq!(text, "\x1b[37;40m\u{2580}\x1b[0m\n");
    }

    #[test]
    fn irc_background_change_restates_foreground() {
        // mIRC white=0, black=1, red=4.
        let white = [255, 255, 255];
        let black = [0, 0, 0];
        let red = [255, 0, 0];
        let (rgb, w, h) = raster(&[&[white, white], &[black, red]]);
        let opts = RenderOptions {
            irc: true,
            high_res: true,
            step: 2,
            ..RenderOptions::default()
        };
        let text = render(&rgb, w, h, &opts).unwrap();
        assert_eq!(text, "\x030,1\u{2580}\x030,4\u{2580}\n");
    }

    #[test]
    fn xterm_half_block_uses_two_escapes() {
        let black = [0, 0, 0];
        let (rgb, w, h) = raster(&[&[black], &[black]]);
        let opts = RenderOptions {
            xterm: true,
            high_res: true,
            step: 2,
            ..RenderOptions::default()
        };
        let text = render(&rgb, w, h, &opts).unwrap();
        assert_eq!(text, "\x1b[38;5;0m\x1b[48;5;0m\u{2580}\x1b[0m\n");
    }

    #[test]
    fn xterm_grayscale_codes_are_offset() {
        let (rgb, w, h) = raster(&[&[[8, 8, 8]]]);
        let opts = RenderOptions {
            xterm: true,
            grayscale: true,
            step: 1,
            ..RenderOptions::default()
        };
        let text = render(&rgb, w, h, &opts).unwrap();
        assert_eq!(text, "\x1b[48;5;232m \x1b[0m\n");
    }

    #[test]
    fn step_skips_rows() {
        let maroon = [128, 0, 0];
        let row = [maroon];
        let rows: Vec<&[[u8; 3]]> = vec![&row, &row, &row, &row, &row];
        let (rgb, w, h) = raster(&rows);
        let opts = RenderOptions {
            step: 2,
            ..RenderOptions::default()
        };
        let lines: Vec<String> = render_lines(&rgb, w, h, &opts).unwrap().collect();
        // y = 0, 2, 4
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn lines_are_newline_terminated() {
        let (rgb, w, h) = raster(&[&[[0, 0, 0]]]);
        let opts = RenderOptions {
            step: 1,
            ..RenderOptions::default()
        };
        for line in render_lines(&rgb, w, h, &opts).unwrap() {
            assert!(line.ends_with('\n'));
        }
    }

    #[test]
    fn push_number_covers_all_widths() {
        let mut out = String::new();
        push_number(&mut out, 0);
        push_number(&mut out, 42);
        push_number(&mut out, 255);
        assert_eq!(out, "042255");
    }
}
