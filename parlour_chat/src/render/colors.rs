//! Truecolour styling for names and system notices.

use rand::{seq::SliceRandom, Rng};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    fn random(rng: &mut impl Rng) -> Self {
        Rgb(rng.gen(), rng.gen(), rng.gen())
    }
}

/// A named foreground colour from the fixed palette.
#[derive(Debug, Clone, Copy)]
pub struct PaletteColor {
    pub name: &'static str,
    pub rgb: Rgb,
}

pub const GREEN: Rgb = Rgb(0, 255, 0);
pub const CYAN: Rgb = Rgb(0, 255, 255);
pub const MAGENTA: Rgb = Rgb(255, 0, 255);
pub const YELLOW: Rgb = Rgb(255, 255, 0);
pub const ORANGE: Rgb = Rgb(255, 153, 0);
pub const RED: Rgb = Rgb(255, 0, 0);
pub const BLUE: Rgb = Rgb(0, 153, 255);
pub const PINK: Rgb = Rgb(255, 105, 180);
pub const PURPLE: Rgb = Rgb(153, 102, 255);
pub const WHITE: Rgb = Rgb(255, 255, 255);

pub const PALETTE: &[PaletteColor] = &[
    PaletteColor { name: "green", rgb: GREEN },
    PaletteColor { name: "cyan", rgb: CYAN },
    PaletteColor { name: "magenta", rgb: MAGENTA },
    PaletteColor { name: "yellow", rgb: YELLOW },
    PaletteColor { name: "orange", rgb: ORANGE },
    PaletteColor { name: "red", rgb: RED },
    PaletteColor { name: "blue", rgb: BLUE },
    PaletteColor { name: "pink", rgb: PINK },
    PaletteColor { name: "purple", rgb: PURPLE },
    PaletteColor { name: "white", rgb: WHITE },
];

const RESET: &str = "\x1b[0m";

/// Foreground and optional background colour applied to a username.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameStyle {
    pub fg: Rgb,
    pub bg: Option<Rgb>,
}

impl NameStyle {
    pub fn plain(fg: Rgb) -> Self {
        Self { fg, bg: None }
    }

    /// Pick a style for a new name: one time in ten a random background,
    /// and a foreground that is random four times in ten and otherwise
    /// drawn from [`PALETTE`].
    pub fn random(rng: &mut impl Rng) -> Self {
        let bg = rng.gen_bool(0.1).then(|| Rgb::random(rng));
        let fg = if rng.gen_bool(0.4) {
            Rgb::random(rng)
        } else {
            PALETTE.choose(rng).map(|c| c.rgb).unwrap_or(WHITE)
        };
        Self { fg, bg }
    }

    pub fn paint(&self, text: &str) -> String {
        let Rgb(r, g, b) = self.fg;
        match self.bg {
            Some(Rgb(br, bg, bb)) => format!(
                "\x1b[38;2;{};{};{}m\x1b[48;2;{};{};{}m{}{}",
                r, g, b, br, bg, bb, text, RESET
            ),
            None => format!("\x1b[38;2;{};{};{}m{}{}", r, g, b, text, RESET),
        }
    }
}

pub fn paint(rgb: Rgb, text: &str) -> String {
    NameStyle::plain(rgb).paint(text)
}

pub fn green(text: &str) -> String {
    paint(GREEN, text)
}

pub fn blue(text: &str) -> String {
    paint(BLUE, text)
}

pub fn yellow(text: &str) -> String {
    paint(YELLOW, text)
}

pub fn red(text: &str) -> String {
    paint(RED, text)
}

pub fn cyan(text: &str) -> String {
    paint(CYAN, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::strip_ansi;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn painted_text_strips_back() {
        let style = NameStyle {
            fg: Rgb(1, 2, 3),
            bg: Some(Rgb(4, 5, 6)),
        };
        let painted = style.paint("alice");
        assert_eq!(painted, "\x1b[38;2;1;2;3m\x1b[48;2;4;5;6malice\x1b[0m");
        assert_eq!(strip_ansi(&painted), "alice");
    }

    #[test]
    fn random_styles_vary() {
        let mut rng = StdRng::seed_from_u64(7);
        let styles: Vec<_> = (0..200).map(|_| NameStyle::random(&mut rng)).collect();

        assert!(styles.iter().any(|s| s.bg.is_some()));
        assert!(styles.iter().any(|s| s.bg.is_none()));
        assert!(styles.iter().any(|s| PALETTE.iter().any(|c| c.rgb == s.fg)));
    }
}
