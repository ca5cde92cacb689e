use crate::render;
use render::{Context, Texture, TextureOptions};

use font8x8::{UnicodeFonts, BASIC_FONTS};

/// The atlas is a fixed 16×16 grid of 64×64 cells. The overlay shader
/// inverts the same index ↔ cell mapping when it selects a glyph by
/// luminance, so these numbers are part of the shader contract.
pub const ATLAS_SIZE: u32 = 1024;
pub const GRID: u32 = 16;
pub const CELL_SIZE: u32 = ATLAS_SIZE / GRID;

/// A ramp longer than the grid is truncated to the cells that exist.
const MAX_GLYPHS: usize = (GRID * GRID) as usize;

// The source font is 8×8; scaled 6× it fills 48 of the 64-pixel cell.
const SCALE: u32 = 6;
const MARGIN: u32 = (CELL_SIZE - 8 * SCALE) / 2;

/// A single-channel texture holding the rasterized character ramp. Built once
/// at startup; changing the glyph set requires reconstructing the engine.
pub struct GlyphAtlas {
    pub texture: Texture,
    pub count: usize,
}

impl GlyphAtlas {
    pub fn new(context: &Context, glyph_set: &str) -> Result<Self, render::Problem> {
        let pixels = rasterize_atlas(glyph_set);

        let mut texture = Texture::new(
            context,
            ATLAS_SIZE,
            ATLAS_SIZE,
            TextureOptions::linear(glow::R8),
        )?;
        texture.upload(ATLAS_SIZE, ATLAS_SIZE, &pixels)?;

        Ok(Self {
            texture,
            count: glyph_set.chars().count().min(MAX_GLYPHS),
        })
    }
}

/// The grid cell for a linear glyph index.
pub fn cell_origin(index: usize) -> (u32, u32) {
    let row = index as u32 / GRID;
    let col = index as u32 % GRID;
    (col * CELL_SIZE, row * CELL_SIZE)
}

/// Rasterizes the ramp into an R8 buffer, one byte per pixel, with row 0 at
/// v = 0. Characters missing from the font rasterize blank.
pub fn rasterize_atlas(glyph_set: &str) -> Vec<u8> {
    let mut pixels = vec![0u8; (ATLAS_SIZE * ATLAS_SIZE) as usize];

    for (index, character) in glyph_set.chars().take(MAX_GLYPHS).enumerate() {
        let Some(bitmap) = BASIC_FONTS.get(character) else {
            continue;
        };

        let (cell_x, cell_y) = cell_origin(index);

        for (glyph_y, row_bits) in bitmap.iter().enumerate() {
            for glyph_x in 0..8u32 {
                if row_bits & (1 << glyph_x) == 0 {
                    continue;
                }

                // Scale each font pixel to a SCALE×SCALE block, centered in
                // the cell. Font rows run top-down; texture rows bottom-up.
                for sub_y in 0..SCALE {
                    let y = cell_y + CELL_SIZE
                        - 1
                        - (MARGIN + glyph_y as u32 * SCALE + sub_y);
                    for sub_x in 0..SCALE {
                        let x = cell_x + MARGIN + glyph_x * SCALE + sub_x;
                        pixels[(y * ATLAS_SIZE + x) as usize] = 0xff;
                    }
                }
            }
        }
    }

    pixels
}

#[cfg(test)]
mod test {
    use super::*;

    fn cell_pixels<'a>(pixels: &'a [u8], index: usize) -> impl Iterator<Item = u8> + 'a {
        let (cell_x, cell_y) = cell_origin(index);
        (0..CELL_SIZE).flat_map(move |y| {
            (0..CELL_SIZE)
                .map(move |x| pixels[((cell_y + y) * ATLAS_SIZE + cell_x + x) as usize])
        })
    }

    #[test]
    fn index_maps_to_row_major_cells() {
        assert_eq!(cell_origin(0), (0, 0));
        assert_eq!(cell_origin(15), (15 * CELL_SIZE, 0));
        assert_eq!(cell_origin(16), (0, CELL_SIZE));
        assert_eq!(cell_origin(37), (5 * CELL_SIZE, 2 * CELL_SIZE));
    }

    #[test]
    fn space_rasterizes_blank_and_at_sign_does_not() {
        let pixels = rasterize_atlas(" @");

        assert!(cell_pixels(&pixels, 0).all(|p| p == 0));
        assert!(cell_pixels(&pixels, 1).any(|p| p == 0xff));
    }

    #[test]
    fn glyphs_stay_inside_their_cells() {
        let pixels = rasterize_atlas("@@");

        // Identical characters must produce identical cells; everything
        // outside the first two cells stays empty.
        let first: Vec<u8> = cell_pixels(&pixels, 0).collect();
        let second: Vec<u8> = cell_pixels(&pixels, 1).collect();
        assert_eq!(first, second);

        for index in 2..(GRID * GRID) as usize {
            assert!(cell_pixels(&pixels, index).all(|p| p == 0));
        }
    }

    #[test]
    fn ramp_longer_than_the_grid_is_truncated() {
        let ramp: String = std::iter::repeat('@').take(257).collect();
        let pixels = rasterize_atlas(&ramp);

        assert_eq!(pixels.len(), (ATLAS_SIZE * ATLAS_SIZE) as usize);
        // The last cell that exists is still drawn.
        assert!(cell_pixels(&pixels, MAX_GLYPHS - 1).any(|p| p == 0xff));
    }

    #[test]
    fn default_ramp_fits_the_atlas() {
        let ramp = crate::settings::DEFAULT_GLYPH_SET;
        assert_eq!(ramp.chars().count(), 17);
        let pixels = rasterize_atlas(ramp);
        assert_eq!(pixels.len(), (ATLAS_SIZE * ATLAS_SIZE) as usize);
    }
}
