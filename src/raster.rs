use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{ShowError, ShowResult};

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
const GLYPH_ADVANCE: u32 = GLYPH_WIDTH + 1;
const LINE_ADVANCE: u32 = GLYPH_HEIGHT + 1;

// Rows top to bottom, bit 4 is the leftmost column.
const GLYPHS: &[(char, [u8; 7])] = &[
    (' ', [0, 0, 0, 0, 0, 0, 0]),
    ('A', [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001]),
    ('B', [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110]),
    ('C', [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110]),
    ('D', [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110]),
    ('E', [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111]),
    ('F', [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000]),
    ('G', [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111]),
    ('H', [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001]),
    ('I', [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110]),
    ('J', [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100]),
    ('K', [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001]),
    ('L', [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111]),
    ('M', [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001]),
    ('N', [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001]),
    ('O', [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110]),
    ('P', [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000]),
    ('Q', [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101]),
    ('R', [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001]),
    ('S', [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110]),
    ('T', [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100]),
    ('U', [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110]),
    ('V', [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100]),
    ('W', [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010]),
    ('X', [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001]),
    ('Y', [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100]),
    ('Z', [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111]),
    ('0', [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110]),
    ('1', [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110]),
    ('2', [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111]),
    ('3', [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110]),
    ('4', [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010]),
    ('5', [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110]),
    ('6', [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110]),
    ('7', [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000]),
    ('8', [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110]),
    ('9', [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100]),
    ('!', [0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00000, 0b00100]),
    ('?', [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b00000, 0b00100]),
    ('.', [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b01100]),
    (',', [0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b00100, 0b01000]),
    ('-', [0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000]),
    ('\'', [0b01100, 0b00100, 0b01000, 0b00000, 0b00000, 0b00000, 0b00000]),
    (':', [0b00000, 0b01100, 0b01100, 0b00000, 0b01100, 0b01100, 0b00000]),
    ('&', [0b01100, 0b10010, 0b10100, 0b01000, 0b10101, 0b10010, 0b01101]),
];

fn glyph(ch: char) -> ShowResult<&'static [u8; 7]> {
    let upper = ch.to_ascii_uppercase();
    GLYPHS
        .iter()
        .find(|(c, _)| *c == upper)
        .map(|(_, rows)| rows)
        .ok_or(ShowError::UnsupportedGlyph(ch))
}

// Lit pixels are listed in row-major order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Raster {
    resolution: u32,
    bits: Vec<bool>,
    lit: Vec<u32>,
}

impl Raster {
    pub fn rasterize(text: &str, resolution: u32) -> ShowResult<Self> {
        let mut raster = Self {
            resolution,
            bits: vec![false; (resolution * resolution) as usize],
            lit: Vec::new(),
        };

        let lines: Vec<Vec<&'static [u8; 7]>> = text
            .lines()
            .map(|line| line.chars().map(glyph).collect::<ShowResult<Vec<_>>>())
            .collect::<ShowResult<_>>()?;

        let blank = lines
            .iter()
            .flatten()
            .all(|rows| rows.iter().all(|bits| *bits == 0));
        if blank {
            return Ok(raster);
        }
        let widest = lines.iter().map(Vec::len).max().unwrap_or(0) as u32;

        let text_width = widest * GLYPH_ADVANCE - 1;
        let text_height = lines.len() as u32 * LINE_ADVANCE - 1;
        let scale = (resolution / text_width).min(resolution / text_height);
        if scale == 0 {
            return Err(ShowError::TextTooLarge {
                text: text.to_string(),
                resolution,
            });
        }

        let top = (resolution - text_height * scale) / 2;
        for (line_index, line) in lines.iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            let line_width = line.len() as u32 * GLYPH_ADVANCE - 1;
            let left = (resolution - line_width * scale) / 2;
            let line_top = top + line_index as u32 * LINE_ADVANCE * scale;

            for (glyph_index, rows) in line.iter().enumerate() {
                let glyph_left = left + glyph_index as u32 * GLYPH_ADVANCE * scale;
                for (gy, bits) in rows.iter().enumerate() {
                    for gx in 0..GLYPH_WIDTH {
                        if bits & (1 << (GLYPH_WIDTH - 1 - gx)) == 0 {
                            continue;
                        }
                        raster.fill_block(
                            glyph_left + gx * scale,
                            line_top + gy as u32 * scale,
                            scale,
                        );
                    }
                }
            }
        }

        raster.lit = raster
            .bits
            .iter()
            .enumerate()
            .filter_map(|(pixel, lit)| lit.then_some(pixel as u32))
            .collect();
        Ok(raster)
    }

    fn fill_block(&mut self, x: u32, y: u32, scale: u32) {
        for row in y..y + scale {
            let start = (row * self.resolution + x) as usize;
            self.bits[start..start + scale as usize].fill(true);
        }
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn pixel_count(&self) -> u32 {
        self.resolution * self.resolution
    }

    pub fn lit_pixels(&self) -> &[u32] {
        &self.lit
    }

    pub fn is_lit(&self, pixel: u32) -> bool {
        self.bits.get(pixel as usize).copied().unwrap_or(false)
    }

    // Row 0 is the top.
    pub fn pixel_coords(&self, pixel: u32) -> (u32, u32) {
        (pixel % self.resolution, pixel / self.resolution)
    }
}

#[derive(Clone, Debug, Default)]
pub struct RasterCache {
    entries: HashMap<(String, u32), Arc<Raster>>,
}

impl RasterCache {
    pub fn get_or_rasterize(&mut self, text: &str, resolution: u32) -> ShowResult<Arc<Raster>> {
        let key = (text.to_string(), resolution);
        if let Some(raster) = self.entries.get(&key) {
            return Ok(Arc::clone(raster));
        }

        let raster = Arc::new(Raster::rasterize(text, resolution)?);
        debug!(
            text,
            resolution,
            lit = raster.lit_pixels().len(),
            "rasterized text"
        );
        self.entries.insert(key, Arc::clone(&raster));
        Ok(raster)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_digit_scales_to_fill_raster() {
        // 5x7 glyph in 32x32: scale 4 gives a 20x28 block.
        let raster = Raster::rasterize("8", 32).unwrap();
        let lit = raster.lit_pixels();
        let cols: Vec<u32> = lit.iter().map(|&p| raster.pixel_coords(p).0).collect();
        let rows: Vec<u32> = lit.iter().map(|&p| raster.pixel_coords(p).1).collect();

        assert_eq!(cols.iter().min(), Some(&6));
        assert_eq!(cols.iter().max(), Some(&25));
        assert_eq!(rows.iter().min(), Some(&2));
        assert_eq!(rows.iter().max(), Some(&29));
        // "8" has 17 lit cells in the font.
        assert_eq!(lit.len(), 17 * 16);
    }

    #[test]
    fn lit_pixels_are_sorted_and_match_bits() {
        let raster = Raster::rasterize("HI!\nOK", 64).unwrap();
        let lit = raster.lit_pixels();
        assert!(lit.windows(2).all(|w| w[0] < w[1]));
        assert!(lit.iter().all(|&p| raster.is_lit(p)));
        let count = (0..raster.pixel_count()).filter(|&p| raster.is_lit(p)).count();
        assert_eq!(count, lit.len());
    }

    #[test]
    fn lowercase_is_drawn_as_uppercase() {
        assert_eq!(
            Raster::rasterize("go", 32).unwrap(),
            Raster::rasterize("GO", 32).unwrap()
        );
    }

    #[test]
    fn blank_text_has_no_lit_pixels() {
        assert!(Raster::rasterize("", 16).unwrap().lit_pixels().is_empty());
        assert!(Raster::rasterize("   ", 16).unwrap().lit_pixels().is_empty());
    }

    #[test]
    fn rejects_unknown_glyphs_and_oversized_text() {
        assert_eq!(
            Raster::rasterize("A#", 32),
            Err(ShowError::UnsupportedGlyph('#'))
        );
        assert!(matches!(
            Raster::rasterize("TOO LONG FOR THIS", 32),
            Err(ShowError::TextTooLarge { .. })
        ));
    }

    #[test]
    fn cache_shares_repeated_text() {
        let mut cache = RasterCache::default();
        let a = cache.get_or_rasterize("HELLO", 64).unwrap();
        let b = cache.get_or_rasterize("HELLO", 64).unwrap();
        let c = cache.get_or_rasterize("HELLO", 32).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(cache.len(), 2);
    }
}
