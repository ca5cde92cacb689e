use crate::glyphs::GlyphAtlas;
use crate::pointer::Pointer;
use crate::settings::Theme;
use crate::{data, render};
use render::{
    Buffer, Context, Framebuffer, Texture, TextureOptions, Uniform, UniformValue,
    VertexArrayObject,
};

use glow::HasContext;
use std::rc::Rc;

static QUAD_VERT_SHADER: &str = include_str!(concat!(env!("OUT_DIR"), "/shaders/quad.vert"));
static SCENE_FRAG_SHADER: &str = include_str!(concat!(env!("OUT_DIR"), "/shaders/scene.frag"));
static ASCII_FRAG_SHADER: &str = include_str!(concat!(env!("OUT_DIR"), "/shaders/ascii.frag"));
static COMPOSITE_FRAG_SHADER: &str =
    include_str!(concat!(env!("OUT_DIR"), "/shaders/composite.frag"));

/// Side length of the generated fallback color wheel.
const COLOR_WHEEL_SIZE: u32 = 64;

/// Renders the two composition layers and blends them over the page
/// background: a raymarched scene reduced to luminance and a hit mask, then a
/// character overlay driven by that luminance.
pub struct Drawer {
    context: Context,

    physical_width: u32,
    physical_height: u32,

    /// Character cell size in physical pixels.
    char_size: f32,

    #[allow(unused)]
    plane_vertices: Buffer,
    vertex_buffer: VertexArrayObject,

    scene_layer: Framebuffer,
    overlay_layer: Framebuffer,

    glyph_atlas: GlyphAtlas,
    color_wheel: Texture,

    scene_pass: render::Program,
    ascii_pass: render::Program,
    composite_pass: render::Program,
}

impl Drawer {
    pub fn new(
        context: &Context,
        physical_width: u32,
        physical_height: u32,
        char_size: f32,
        glyph_set: &str,
    ) -> Result<Self, render::Problem> {
        let scene_layer = Framebuffer::new(
            context,
            physical_width,
            physical_height,
            TextureOptions::linear(glow::RGBA16F),
        )?;
        let overlay_layer = Framebuffer::new(
            context,
            physical_width,
            physical_height,
            TextureOptions::linear(glow::RGBA8),
        )?;

        let glyph_atlas = GlyphAtlas::new(context, glyph_set)?;

        // Built-in default, used until the host supplies an image.
        let mut color_wheel = Texture::new(
            context,
            COLOR_WHEEL_SIZE,
            COLOR_WHEEL_SIZE,
            TextureOptions::linear(glow::RGBA8),
        )?;
        color_wheel.upload(
            COLOR_WHEEL_SIZE,
            COLOR_WHEEL_SIZE,
            &default_color_wheel(COLOR_WHEEL_SIZE),
        )?;

        let plane_vertices = Buffer::from_f32(
            context,
            &data::PLANE_VERTICES,
            glow::ARRAY_BUFFER,
            glow::STATIC_DRAW,
        )?;

        let scene_pass = render::Program::new(context, (QUAD_VERT_SHADER, SCENE_FRAG_SHADER))?;
        let ascii_pass = render::Program::new(context, (QUAD_VERT_SHADER, ASCII_FRAG_SHADER))?;
        let composite_pass =
            render::Program::new(context, (QUAD_VERT_SHADER, COMPOSITE_FRAG_SHADER))?;

        let vertex_buffer = VertexArrayObject::new(
            context,
            &scene_pass,
            &[(
                &plane_vertices,
                render::VertexBufferLayout {
                    name: "position",
                    size: 2,
                    type_: glow::FLOAT,
                    ..Default::default()
                },
            )],
        )?;

        Ok(Self {
            context: Rc::clone(context),

            physical_width,
            physical_height,

            char_size,

            plane_vertices,
            vertex_buffer,

            scene_layer,
            overlay_layer,

            glyph_atlas,
            color_wheel,

            scene_pass,
            ascii_pass,
            composite_pass,
        })
    }

    /// Layers track the drawable size exactly, so a resize drops and
    /// recreates them. Simulation textures are unaffected. Both layers are
    /// allocated before either is swapped in, so a failure leaves the old
    /// pair intact and matching `physical_width`/`physical_height`.
    pub fn resize(&mut self, physical_width: u32, physical_height: u32) -> Result<(), render::Problem> {
        let scene_layer = Framebuffer::new(
            &self.context,
            physical_width,
            physical_height,
            TextureOptions::linear(glow::RGBA16F),
        )?;
        let overlay_layer = Framebuffer::new(
            &self.context,
            physical_width,
            physical_height,
            TextureOptions::linear(glow::RGBA8),
        )?;

        self.scene_layer = scene_layer;
        self.overlay_layer = overlay_layer;
        self.physical_width = physical_width;
        self.physical_height = physical_height;

        Ok(())
    }

    pub fn set_char_size(&mut self, char_size: f32) {
        self.char_size = char_size;
    }

    /// Decodes and uploads a replacement for the built-in color wheel. A bad
    /// image is logged and ignored; the previous wheel stays in place.
    pub fn set_color_wheel(&mut self, encoded_bytes: &[u8]) {
        let image = match image::load_from_memory(encoded_bytes) {
            Ok(image) => image.to_rgba8(),
            Err(msg) => {
                log::error!("Cannot decode the color wheel image: {}", msg);
                return;
            }
        };

        let (width, height) = image.dimensions();
        if let Err(problem) = self.color_wheel.upload(width, height, image.as_raw()) {
            log::error!("Cannot upload the color wheel image: {}", problem);
        }
    }

    pub fn draw_scene(
        &self,
        elapsed_time: f32,
        dye_texture: &Framebuffer,
        pointer: &Pointer,
        theme: Theme,
        reduced_motion: bool,
    ) {
        let resolution = [self.physical_width as f32, self.physical_height as f32];
        let pointer_position = [pointer.x, pointer.y];

        self.scene_layer.draw_to(&self.context, || unsafe {
            self.context.bind_vertex_array(Some(self.vertex_buffer.id));

            self.scene_pass.use_program();
            self.scene_pass.set_uniforms(&[
                &Uniform {
                    name: "dyeTexture",
                    value: UniformValue::Texture2D(0),
                },
                &Uniform {
                    name: "pointer",
                    value: UniformValue::Vec2(&pointer_position),
                },
                &Uniform {
                    name: "elapsedTime",
                    value: UniformValue::Float(elapsed_time),
                },
                &Uniform {
                    name: "resolution",
                    value: UniformValue::Vec2(&resolution),
                },
                &Uniform {
                    name: "reducedMotion",
                    value: UniformValue::Float(if reduced_motion { 1.0 } else { 0.0 }),
                },
                &Uniform {
                    name: "theme",
                    value: UniformValue::Float(theme.blend_factor()),
                },
            ]);

            self.context.active_texture(glow::TEXTURE0);
            self.context
                .bind_texture(glow::TEXTURE_2D, Some(dye_texture.texture));

            self.context.draw_arrays(glow::TRIANGLES, 0, 6);
            self.context.bind_vertex_array(None);
        });
    }

    pub fn draw_overlay(&self, elapsed_time: f32, dye_texture: &Framebuffer, theme: Theme) {
        let resolution = [self.physical_width as f32, self.physical_height as f32];

        self.overlay_layer.draw_to(&self.context, || unsafe {
            self.context.bind_vertex_array(Some(self.vertex_buffer.id));

            self.ascii_pass.use_program();
            self.ascii_pass.set_uniforms(&[
                &Uniform {
                    name: "sceneTexture",
                    value: UniformValue::Texture2D(0),
                },
                &Uniform {
                    name: "glyphTexture",
                    value: UniformValue::Texture2D(1),
                },
                &Uniform {
                    name: "dyeTexture",
                    value: UniformValue::Texture2D(2),
                },
                &Uniform {
                    name: "colorWheelTexture",
                    value: UniformValue::Texture2D(3),
                },
                &Uniform {
                    name: "charCount",
                    value: UniformValue::Float(self.glyph_atlas.count as f32),
                },
                &Uniform {
                    name: "charSize",
                    value: UniformValue::Float(self.char_size),
                },
                &Uniform {
                    name: "elapsedTime",
                    value: UniformValue::Float(elapsed_time),
                },
                &Uniform {
                    name: "resolution",
                    value: UniformValue::Vec2(&resolution),
                },
                &Uniform {
                    name: "theme",
                    value: UniformValue::Float(theme.blend_factor()),
                },
            ]);

            self.context.active_texture(glow::TEXTURE0);
            self.context
                .bind_texture(glow::TEXTURE_2D, Some(self.scene_layer.texture));

            self.context.active_texture(glow::TEXTURE1);
            self.context
                .bind_texture(glow::TEXTURE_2D, Some(self.glyph_atlas.texture.id));

            self.context.active_texture(glow::TEXTURE2);
            self.context
                .bind_texture(glow::TEXTURE_2D, Some(dye_texture.texture));

            self.context.active_texture(glow::TEXTURE3);
            self.context
                .bind_texture(glow::TEXTURE_2D, Some(self.color_wheel.id));

            self.context.draw_arrays(glow::TRIANGLES, 0, 6);
            self.context.bind_vertex_array(None);
        });
    }

    /// Blends the overlay over the theme background into the default
    /// framebuffer. The scene layer never reaches the screen directly; it
    /// only drives glyph selection.
    pub fn composite(&self, theme: Theme) {
        let background_color = theme.background_color();

        unsafe {
            self.context.bind_framebuffer(glow::DRAW_FRAMEBUFFER, None);
            self.context.viewport(
                0,
                0,
                self.physical_width as i32,
                self.physical_height as i32,
            );

            self.context.bind_vertex_array(Some(self.vertex_buffer.id));

            self.composite_pass.use_program();
            self.composite_pass.set_uniforms(&[
                &Uniform {
                    name: "overlayTexture",
                    value: UniformValue::Texture2D(0),
                },
                &Uniform {
                    name: "backgroundColor",
                    value: UniformValue::Vec3(&background_color),
                },
            ]);

            self.context.active_texture(glow::TEXTURE0);
            self.context
                .bind_texture(glow::TEXTURE_2D, Some(self.overlay_layer.texture));

            self.context.draw_arrays(glow::TRIANGLES, 0, 6);
            self.context.bind_vertex_array(None);
        }
    }
}

/// A hue wheel: white at the center, fully saturated at the rim, opaque
/// everywhere. Same HSV formulation as the overlay shader.
fn default_color_wheel(size: u32) -> Vec<u8> {
    let mut pixels = Vec::with_capacity((4 * size * size) as usize);
    let center = (size as f32 - 1.0) / 2.0;

    for y in 0..size {
        for x in 0..size {
            let dx = (x as f32 - center) / center;
            let dy = (y as f32 - center) / center;

            let hue = dy.atan2(dx) / (2.0 * std::f32::consts::PI) + 0.5;
            let saturation = (dx * dx + dy * dy).sqrt().min(1.0);
            let [red, green, blue] = hsv_to_rgb(hue, saturation, 1.0);

            pixels.extend_from_slice(&[red, green, blue, 0xff]);
        }
    }

    pixels
}

fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> [u8; 3] {
    let channel = |offset: f32| {
        let k = (offset + hue * 6.0).rem_euclid(6.0);
        let chroma = value - value * saturation * k.min(4.0 - k).clamp(0.0, 1.0);
        (chroma * 255.0).round() as u8
    };

    [channel(5.0), channel(3.0), channel(1.0)]
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_color_wheel_is_opaque_with_a_white_center_and_colored_rim() {
        let size = 16u32;
        let pixels = default_color_wheel(size);
        assert_eq!(pixels.len(), (4 * size * size) as usize);

        assert!(pixels.chunks_exact(4).all(|pixel| pixel[3] == 0xff));

        let pixel_at = |x: u32, y: u32| {
            let offset = (4 * (y * size + x)) as usize;
            &pixels[offset..offset + 3]
        };

        // Near the center saturation is close to zero.
        assert!(pixel_at(7, 7).iter().all(|&channel| channel > 200));

        // At the rim one channel dominates another.
        let rim = pixel_at(7, 0);
        let brightest = rim.iter().max().copied().unwrap_or(0);
        let darkest = rim.iter().min().copied().unwrap_or(0);
        assert!(brightest as i32 - darkest as i32 > 100);
    }

    #[test]
    fn hsv_primaries_map_to_rgb_corners() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), [255, 0, 0]);
        assert_eq!(hsv_to_rgb(1.0 / 3.0, 1.0, 1.0), [0, 255, 0]);
        assert_eq!(hsv_to_rgb(2.0 / 3.0, 1.0, 1.0), [0, 0, 255]);
        assert_eq!(hsv_to_rgb(0.5, 0.0, 1.0), [255, 255, 255]);
    }
}
