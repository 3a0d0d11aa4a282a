//! Palettes and theme colours
//!
//! Constant, ordered colour tables. Auto-assignment rotates through the
//! selected palette; the `hash:` prefix switches to label-hashed
//! selection so a series keeps its colour across graphs.

use crate::chart::{Color, Theme};

/// An ordered, named colour table
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    name: String,
    colors: Vec<Color>,
}

impl Palette {
    /// The classic eight-colour rotation
    pub fn default_palette() -> Palette {
        Palette {
            name: "default".to_string(),
            colors: vec![
                Color::rgb(255, 0, 0),
                Color::rgb(0, 255, 0),
                Color::rgb(0, 0, 255),
                Color::rgb(255, 0, 255),
                Color::rgb(255, 255, 0),
                Color::rgb(0, 255, 255),
                Color::rgb(255, 192, 203),
                Color::rgb(255, 165, 0),
            ],
        }
    }

    /// The Green-Armytage colour-alphabet palette
    ///
    /// Chosen for mutual distinguishability; holds up with many more
    /// lines than the default rotation.
    pub fn armytage() -> Palette {
        Palette {
            name: "armytage".to_string(),
            colors: vec![
                Color::rgb(0, 117, 220),
                Color::rgb(153, 63, 0),
                Color::rgb(76, 0, 92),
                Color::rgb(0, 92, 49),
                Color::rgb(43, 206, 72),
                Color::rgb(255, 204, 153),
                Color::rgb(128, 128, 128),
                Color::rgb(148, 255, 181),
                Color::rgb(143, 124, 0),
                Color::rgb(157, 204, 0),
                Color::rgb(194, 0, 136),
                Color::rgb(0, 51, 128),
                Color::rgb(255, 164, 5),
                Color::rgb(255, 168, 187),
                Color::rgb(66, 102, 0),
                Color::rgb(255, 0, 16),
                Color::rgb(94, 241, 242),
                Color::rgb(0, 153, 143),
                Color::rgb(224, 255, 102),
                Color::rgb(116, 10, 255),
                Color::rgb(153, 0, 0),
                Color::rgb(255, 255, 128),
                Color::rgb(255, 255, 0),
                Color::rgb(255, 80, 5),
            ],
        }
    }

    /// Luma-mapped rendition of the default rotation
    pub fn grayscale() -> Palette {
        let base = Palette::default_palette();
        Palette {
            name: "grayscale".to_string(),
            colors: base
                .colors
                .iter()
                .map(|c| {
                    let v = c.luma();
                    Color::rgb(v, v, v)
                })
                .collect(),
        }
    }

    /// Look up a palette by name
    pub fn by_name(name: &str) -> Option<Palette> {
        match name {
            "default" => Some(Palette::default_palette()),
            "armytage" => Some(Palette::armytage()),
            "grayscale" => Some(Palette::grayscale()),
            _ => None,
        }
    }

    /// Palette name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of colours
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    /// Check if the palette holds no colours
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Colour `i`, wrapping past the end
    pub fn color(&self, i: usize) -> Color {
        self.colors[i % self.colors.len()]
    }

    /// All colours in order
    pub fn colors(&self) -> &[Color] {
        &self.colors
    }
}

/// A palette plus the assignment mode
#[derive(Debug, Clone, PartialEq)]
pub struct PaletteSelection {
    pub palette: Palette,
    /// Pick colours by label hash instead of rotation
    pub hashed: bool,
}

impl PaletteSelection {
    /// Parse a palette spec, e.g. `armytage` or `hash:armytage`
    pub fn parse(spec: &str) -> Option<PaletteSelection> {
        let (hashed, name) = match spec.strip_prefix("hash:") {
            Some(rest) => (true, rest),
            None => (false, spec),
        };
        Palette::by_name(name).map(|palette| PaletteSelection { palette, hashed })
    }
}

/// FNV-1a hash of a label, for hashed palette selection
pub fn hash_label(label: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in label.as_bytes() {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Fixed colours a theme draws its chrome with
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThemeColors {
    pub background: Color,
    pub text: Color,
    pub axis: Color,
    pub grid: Color,
}

impl Theme {
    /// Chrome colours for this theme
    pub fn colors(&self) -> ThemeColors {
        match self {
            Theme::Light => ThemeColors {
                background: Color::rgb(255, 255, 255),
                text: Color::rgb(0, 0, 0),
                axis: Color::rgb(0, 0, 0),
                grid: Color::rgb(204, 204, 204),
            },
            Theme::Dark => ThemeColors {
                background: Color::rgb(16, 16, 16),
                text: Color::rgb(200, 200, 200),
                axis: Color::rgb(200, 200, 200),
                grid: Color::rgb(64, 64, 64),
            },
        }
    }
}
