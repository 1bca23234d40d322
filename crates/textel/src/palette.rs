//! Fixed output palettes and perceptual nearest-color matching.
//!
//! A [`Palette`] is resolved once per render from the mode flags in
//! [`RenderOptions`] and is immutable afterwards: every entry carries its
//! RGB value, its precomputed CIELAB coordinates and chroma, and the
//! escape-code fragment that selects it in the active output protocol.

use crate::color::Lab;
use crate::encoder::RenderOptions;

/// The protocol-specific code that selects a palette entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderCode {
    /// ANSI SGR parameter strings, e.g. `"31"` / `"41"`, bright `"31;1"`.
    Sgr {
        fore: &'static str,
        back: &'static str,
    },
    /// mIRC color number as decimal digits, `"0"` through `"15"`.
    Irc(&'static str),
    /// xterm-256 color code. Grayscale ramp entries store `index + 232`
    /// since codes 232-255 are reserved for grays.
    Xterm(u8),
}

/// One selectable output color.
#[derive(Clone, Copy, Debug)]
pub struct PaletteEntry {
    pub rgb: [u8; 3],
    pub lab: Lab,
    pub code: RenderCode,
    chroma: f64,
}

impl PaletteEntry {
    fn new(rgb: [u8; 3], code: RenderCode) -> Self {
        let lab = Lab::from_rgb(rgb[0], rgb[1], rgb[2]);
        Self {
            rgb,
            lab,
            code,
            chroma: lab.chroma(),
        }
    }
}

/// Near-black / near-white exclusion floors for the matcher.
///
/// When active, a candidate entry is skipped if it is the black entry
/// (index 0) or bright white (index 15) closer than `black`, or the plain
/// white entry (index 7) or bright white closer than `white`. A zero
/// floor disables the corresponding rule; [`Thresholds::default`] is
/// fully inactive.
#[derive(Clone, Copy, Debug, Default)]
pub struct Thresholds {
    pub black: f64,
    pub white: f64,
}

impl Thresholds {
    /// Returns true if either exclusion rule can ever fire.
    pub fn is_active(&self) -> bool {
        self.black > 0.0 || self.white > 0.0
    }
}

/// Standard ANSI palette: the 8 base colors followed by their bright
/// variants.
const ANSI_RGB: [[u8; 3]; 16] = [
    [0, 0, 0],
    [128, 0, 0],
    [0, 128, 0],
    [128, 128, 0],
    [0, 0, 128],
    [128, 0, 128],
    [0, 128, 128],
    [192, 192, 192],
    [128, 128, 128],
    [255, 0, 0],
    [0, 255, 0],
    [255, 255, 0],
    [0, 0, 255],
    [255, 0, 255],
    [0, 255, 255],
    [255, 255, 255],
];

/// RGB approximations of mIRC colors 0-15.
const IRC_RGB: [[u8; 3]; 16] = [
    [255, 255, 255],
    [0, 0, 0],
    [0, 0, 127],
    [0, 147, 0],
    [255, 0, 0],
    [127, 0, 0],
    [156, 0, 156],
    [252, 127, 0],
    [255, 255, 0],
    [0, 252, 0],
    [0, 147, 147],
    [0, 255, 255],
    [0, 0, 252],
    [255, 0, 255],
    [127, 127, 127],
    [210, 210, 210],
];

const SGR_FORE: [&str; 16] = [
    "30", "31", "32", "33", "34", "35", "36", "37", //
    "30;1", "31;1", "32;1", "33;1", "34;1", "35;1", "36;1", "37;1",
];

const SGR_BACK: [&str; 16] = [
    "40", "41", "42", "43", "44", "45", "46", "47", //
    "40;1", "41;1", "42;1", "43;1", "44;1", "45;1", "46;1", "47;1",
];

const IRC_CODES: [&str; 16] = [
    "0", "1", "2", "3", "4", "5", "6", "7", //
    "8", "9", "10", "11", "12", "13", "14", "15",
];

/// Channel levels of the xterm 6x6x6 color cube (codes 16-231).
const CUBE_LEVELS: [u8; 6] = [0, 95, 135, 175, 215, 255];

/// First xterm code of the grayscale ramp.
const GRAY_RAMP_OFFSET: u8 = 232;

/// An ordered, immutable set of output colors with cached Lab values.
#[derive(Clone, Debug)]
pub struct Palette {
    entries: Vec<PaletteEntry>,
}

impl Palette {
    /// Resolves the palette selected by a set of mode flags.
    ///
    /// Precedence, first match wins:
    /// 1. `irc` — the 16 mIRC colors
    /// 2. `high_res` without `xterm` — the 8 base ANSI colors (half-block
    ///    cells double the escape width, so the color set is halved to
    ///    keep lines bounded)
    /// 3. `xterm` and `grayscale` — the 24-entry grayscale ramp
    /// 4. `xterm` — the 16 ANSI colors followed by the 216-entry cube,
    ///    palette index == xterm code
    /// 5. otherwise — the full 16-color ANSI palette
    pub fn resolve(opts: &RenderOptions) -> Self {
        if opts.irc {
            Self::build(IRC_RGB, |i| RenderCode::Irc(IRC_CODES[i]))
        } else if opts.high_res && !opts.xterm {
            Self::build(ANSI_RGB[..8].iter().copied(), |i| RenderCode::Sgr {
                fore: SGR_FORE[i],
                back: SGR_BACK[i],
            })
        } else if opts.xterm && opts.grayscale {
            let ramp = (0..24u8).map(|i| {
                let v = 8 + 10 * i;
                [v, v, v]
            });
            Self::build(ramp, |i| RenderCode::Xterm(GRAY_RAMP_OFFSET + i as u8))
        } else if opts.xterm {
            let cube = (0..216usize).map(|i| {
                [
                    CUBE_LEVELS[i / 36],
                    CUBE_LEVELS[(i / 6) % 6],
                    CUBE_LEVELS[i % 6],
                ]
            });
            Self::build(ANSI_RGB.into_iter().chain(cube), |i| {
                RenderCode::Xterm(i as u8)
            })
        } else {
            Self::build(ANSI_RGB, |i| RenderCode::Sgr {
                fore: SGR_FORE[i],
                back: SGR_BACK[i],
            })
        }
    }

    fn build(
        colors: impl IntoIterator<Item = [u8; 3]>,
        code: impl Fn(usize) -> RenderCode,
    ) -> Self {
        let entries: Vec<PaletteEntry> = colors
            .into_iter()
            .enumerate()
            .map(|(i, rgb)| PaletteEntry::new(rgb, code(i)))
            .collect();
        debug_assert!(!entries.is_empty());
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[PaletteEntry] {
        &self.entries
    }

    /// Returns the index of the perceptually closest entry.
    ///
    /// The query is converted to Lab once, then every entry is scanned
    /// linearly. Ties keep the lowest index.
    pub fn nearest(&self, rgb: [u8; 3]) -> usize {
        self.scan(Lab::from_rgb(rgb[0], rgb[1], rgb[2]), |_, _| false)
    }

    /// Like [`Palette::nearest`], with the exclusion policy of
    /// [`Thresholds`] layered on top. If the policy rejects every entry,
    /// the unfiltered best match is returned.
    pub fn nearest_thresholded(&self, rgb: [u8; 3], thresholds: &Thresholds) -> usize {
        self.scan(Lab::from_rgb(rgb[0], rgb[1], rgb[2]), |index, distance| {
            ((index == 0 || index == 15) && distance < thresholds.black)
                || ((index == 7 || index == 15) && distance < thresholds.white)
        })
    }

    fn scan(&self, query: Lab, skip: impl Fn(usize, f64) -> bool) -> usize {
        let c1 = query.chroma();

        let mut best = f64::INFINITY;
        let mut best_index = 0usize;
        let mut best_allowed: Option<(f64, usize)> = None;

        for (index, entry) in self.entries.iter().enumerate() {
            let distance = delta_e(query, c1, entry);
            if distance < best {
                best = distance;
                best_index = index;
            }
            if skip(index, distance) {
                continue;
            }
            if best_allowed.is_none_or(|(d, _)| distance < d) {
                best_allowed = Some((distance, index));
            }
        }

        best_allowed.map_or(best_index, |(_, index)| index)
    }
}

/// CIE94-flavored color difference.
///
/// The hue term is kept squared (`dA^2 + dB^2 - dC^2`) and divided by the
/// squared hue weight instead of being square-rooted first. That is not
/// textbook CIE94, but it is the metric the palettes are matched under;
/// changing it reshuffles matches. `dH` is non-negative by the reverse
/// triangle inequality, so the outer square root is total.
fn delta_e(query: Lab, c1: f64, entry: &PaletteEntry) -> f64 {
    let c2 = entry.chroma;
    let d_l = query.l - entry.lab.l;
    let d_c = c1 - c2;
    let d_a = query.a - entry.lab.a;
    let d_b = query.b - entry.lab.b;
    let d_h = d_a * d_a + d_b * d_b - d_c * d_c;

    let s_c = 1.0 + 0.045 * c1;
    let s_h = 1.0 + 0.015 * c2;

    (d_l * d_l + (d_c / s_c) * (d_c / s_c) + d_h / (s_h * s_h)).sqrt()
}
