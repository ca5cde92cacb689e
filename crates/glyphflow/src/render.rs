use glow::HasContext;
use rustc_hash::FxHashMap;
use std::cell::{Ref, RefCell};
use std::rc::Rc;
use thiserror::Error;

pub type Context = Rc<glow::Context>;
type GlDataType = u32;
type Result<T> = std::result::Result<T, Problem>;

#[derive(Error, Debug)]
pub enum Problem {
    #[error("Cannot create buffer")]
    CannotCreateBuffer,

    #[error("Cannot create texture")]
    CannotCreateTexture,

    #[error("Cannot create framebuffer")]
    CannotCreateFramebuffer,

    #[error("{}", match .0 {
        Some(log) => format!("Cannot compile shader: {}", log),
        None => "Cannot compile shader".to_string(),
    })]
    CannotCreateShader(Option<String>),

    #[error("Cannot create program")]
    CannotCreateProgram,

    #[error("Cannot link program: {0}")]
    CannotLinkProgram(String),

    #[error("Unexpected data size. Expected: {expected:?}. Actual: {actual:?}")]
    WrongDataSize { expected: usize, actual: usize },

    #[error("Unsupported texture format")]
    UnsupportedTextureFormat,

    #[error("Vertex attribute type is not supported")]
    CannotBindUnsupportedVertexType,
}

#[derive(Debug)]
pub struct Buffer {
    context: Context,
    pub id: glow::Buffer,
    pub size: usize,
    pub type_: u32,
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.context.delete_buffer(self.id);
        }
    }
}

impl Buffer {
    pub fn from_bytes(
        context: &Context,
        data: &[u8],
        buffer_type: u32,
        usage: u32,
    ) -> Result<Self> {
        let buffer = unsafe {
            let buffer = context
                .create_buffer()
                .map_err(|_| Problem::CannotCreateBuffer)?;

            context.bind_buffer(buffer_type, Some(buffer));
            context.buffer_data_u8_slice(buffer_type, data, usage);
            context.bind_buffer(buffer_type, None);

            buffer
        };

        Ok(Self {
            context: Rc::clone(context),
            id: buffer,
            size: data.len(),
            type_: buffer_type,
        })
    }

    pub fn from_f32(context: &Context, data: &[f32], buffer_type: u32, usage: u32) -> Result<Self> {
        Self::from_bytes(context, bytemuck::cast_slice(data), buffer_type, usage)
    }
}

#[derive(Clone, Copy)]
pub struct TextureOptions {
    pub mag_filter: GlDataType,
    pub min_filter: GlDataType,
    pub wrap_s: GlDataType,
    pub wrap_t: GlDataType,
    pub format: GlDataType,
}

impl Default for TextureOptions {
    fn default() -> Self {
        TextureOptions {
            mag_filter: glow::NEAREST,
            min_filter: glow::NEAREST,
            wrap_s: glow::CLAMP_TO_EDGE,
            wrap_t: glow::CLAMP_TO_EDGE,
            format: glow::RGBA16F,
        }
    }
}

impl TextureOptions {
    pub fn linear(format: GlDataType) -> Self {
        TextureOptions {
            mag_filter: glow::LINEAR,
            min_filter: glow::LINEAR,
            format,
            ..Default::default()
        }
    }
}

/// A standalone sampled texture. Used for data the pipeline only ever reads,
/// like the glyph atlas and the color wheel.
pub struct Texture {
    context: Context,
    pub id: glow::Texture,
    pub width: u32,
    pub height: u32,
    options: TextureOptions,
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            self.context.delete_texture(self.id);
        }
    }
}

impl Texture {
    pub fn new(context: &Context, width: u32, height: u32, options: TextureOptions) -> Result<Self> {
        let texture = unsafe {
            let texture = context
                .create_texture()
                .map_err(|_| Problem::CannotCreateTexture)?;

            context.bind_texture(glow::TEXTURE_2D, Some(texture));
            context.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MAG_FILTER,
                options.mag_filter as i32,
            );
            context.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                options.min_filter as i32,
            );
            context.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, options.wrap_s as i32);
            context.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, options.wrap_t as i32);
            context.bind_texture(glow::TEXTURE_2D, None);

            texture
        };

        Ok(Self {
            context: Rc::clone(context),
            id: texture,
            width,
            height,
            options,
        })
    }

    /// Uploads new image data, replacing the texture storage. The texture
    /// keeps its sampling options but takes on the new size.
    pub fn upload(&mut self, width: u32, height: u32, data: &[u8]) -> Result<()> {
        let TextureFormat {
            internal_format,
            format,
            type_,
            size,
        } = detect_texture_format(self.options.format)?;

        let expected_size = size * (width * height) as usize;
        if data.len() != expected_size {
            return Err(Problem::WrongDataSize {
                expected: expected_size,
                actual: data.len(),
            });
        }

        unsafe {
            self.context.bind_texture(glow::TEXTURE_2D, Some(self.id));
            self.context.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                internal_format as i32,
                width as i32,
                height as i32,
                0,
                format,
                type_,
                Some(data),
            );
            self.context.bind_texture(glow::TEXTURE_2D, None);
        }

        self.width = width;
        self.height = height;

        Ok(())
    }
}

/// An owned texture with an attached framebuffer. Dropping it releases both
/// GL objects; there is no in-place resize, callers drop and recreate.
pub struct Framebuffer {
    context: Context,
    pub id: glow::Framebuffer,
    pub width: u32,
    pub height: u32,
    pub texture: glow::Texture,
    pub options: TextureOptions,
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.context
                .bind_framebuffer(glow::FRAMEBUFFER, Some(self.id));
            self.context.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                None,
                0,
            );
            self.context.bind_framebuffer(glow::FRAMEBUFFER, None);
            self.context.delete_framebuffer(self.id);
            self.context.delete_texture(self.texture);
        }
    }
}

impl Framebuffer {
    pub fn new(
        context: &Context,
        width: u32,
        height: u32,
        options: TextureOptions,
    ) -> Result<Self> {
        let (framebuffer, texture) = unsafe {
            let texture = context
                .create_texture()
                .map_err(|_| Problem::CannotCreateTexture)?;

            context.bind_texture(glow::TEXTURE_2D, Some(texture));
            context.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MAG_FILTER,
                options.mag_filter as i32,
            );
            context.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                options.min_filter as i32,
            );
            context.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, options.wrap_s as i32);
            context.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, options.wrap_t as i32);
            context.bind_texture(glow::TEXTURE_2D, None);

            let framebuffer = context
                .create_framebuffer()
                .map_err(|_| Problem::CannotCreateFramebuffer)?;

            (framebuffer, texture)
        };

        let framebuffer = Self {
            context: Rc::clone(context),
            id: framebuffer,
            width,
            height,
            texture,
            options,
        };

        framebuffer.with_data::<u8>(None)?;

        Ok(framebuffer)
    }

    pub fn with_data<T: bytemuck::Pod>(&self, data: Option<&[T]>) -> Result<()> {
        let TextureFormat {
            internal_format,
            format,
            type_,
            size,
        } = detect_texture_format(self.options.format)?;

        let expected_size = size * ((self.width * self.height) as usize);
        if let Some(buffer) = data {
            if buffer.len() != expected_size {
                return Err(Problem::WrongDataSize {
                    expected: expected_size,
                    actual: buffer.len(),
                });
            }
        }

        unsafe {
            self.context
                .bind_texture(glow::TEXTURE_2D, Some(self.texture));
            self.context.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                internal_format as i32,
                self.width as i32,
                self.height as i32,
                0,
                format,
                type_,
                data.map(|buffer| bytemuck::cast_slice(buffer)),
            );
            self.context.bind_texture(glow::TEXTURE_2D, None);

            self.context
                .bind_framebuffer(glow::FRAMEBUFFER, Some(self.id));
            self.context.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(self.texture),
                0,
            );
            self.context.bind_framebuffer(glow::FRAMEBUFFER, None);
        }

        Ok(())
    }

    pub fn zero_out(&self) {
        self.clear_color_with(&[0.0, 0.0, 0.0, 0.0])
    }

    pub fn clear_color_with(&self, color: &[f32; 4]) {
        unsafe {
            self.context
                .bind_framebuffer(glow::FRAMEBUFFER, Some(self.id));

            self.context
                .viewport(0, 0, self.width as i32, self.height as i32);
            self.context
                .clear_color(color[0], color[1], color[2], color[3]);
            self.context.clear(glow::COLOR_BUFFER_BIT);

            self.context.bind_framebuffer(glow::FRAMEBUFFER, None);
        }
    }

    pub fn draw_to<T>(&self, context: &Context, draw_call: T)
    where
        T: Fn(),
    {
        unsafe {
            context.bind_framebuffer(glow::DRAW_FRAMEBUFFER, Some(self.id));
            context.viewport(0, 0, self.width as i32, self.height as i32);
            draw_call();
            context.bind_framebuffer(glow::DRAW_FRAMEBUFFER, None);
        }
    }
}

/// A read/write pair of equally sized framebuffers. `swap` exchanges the
/// roles in O(1) and is involutive; the read and write targets are never the
/// same framebuffer.
pub struct DoubleFramebuffer {
    pub width: u32,
    pub height: u32,
    front: RefCell<Framebuffer>,
    back: RefCell<Framebuffer>,
}

impl DoubleFramebuffer {
    pub fn new(
        context: &Context,
        width: u32,
        height: u32,
        options: TextureOptions,
    ) -> Result<Self> {
        let front = Framebuffer::new(context, width, height, options)?;
        let back = Framebuffer::new(context, width, height, options)?;
        Ok(Self {
            width,
            height,
            front: RefCell::new(front),
            back: RefCell::new(back),
        })
    }

    pub fn with_data<T: bytemuck::Pod>(&self, data: Option<&[T]>) -> Result<()> {
        self.front.borrow().with_data(data)?;
        self.back.borrow().with_data(data)?;

        Ok(())
    }

    pub fn zero_out(&self) {
        self.current().zero_out();
        self.next().zero_out();
    }

    pub fn current(&self) -> Ref<Framebuffer> {
        self.front.borrow()
    }

    pub fn next(&self) -> Ref<Framebuffer> {
        self.back.borrow()
    }

    pub fn swap(&self) {
        self.front.swap(&self.back);
    }

    /// Binds the write buffer, hands the read buffer to the draw call, and
    /// swaps afterwards. Every solver sub-step goes through here, which keeps
    /// the read-before-write invariant in one place.
    pub fn draw_to<T>(&self, context: &Context, draw_call: T)
    where
        T: Fn(&Framebuffer),
    {
        let framebuffer = self.next();

        unsafe {
            context.bind_framebuffer(glow::DRAW_FRAMEBUFFER, Some(framebuffer.id));
            context.viewport(0, 0, framebuffer.width as i32, framebuffer.height as i32);
            draw_call(&self.current());
            context.bind_framebuffer(glow::DRAW_FRAMEBUFFER, None);
        }

        drop(framebuffer);
        self.swap();
    }
}

pub struct Program {
    context: Context,
    pub program: glow::Program,
    attributes: FxHashMap<String, AttributeInfo>,
    uniforms: FxHashMap<String, UniformInfo>,
}

impl Drop for Program {
    fn drop(&mut self) {
        unsafe {
            self.context.delete_program(self.program);
        }
    }
}

impl Program {
    pub fn new(context: &Context, shaders: (&str, &str)) -> Result<Self> {
        let vertex_shader = compile_shader(context, glow::VERTEX_SHADER, shaders.0)?;
        let fragment_shader = compile_shader(context, glow::FRAGMENT_SHADER, shaders.1)?;

        let program = unsafe {
            let program = context
                .create_program()
                .map_err(|_| Problem::CannotCreateProgram)?;
            context.attach_shader(program, vertex_shader);
            context.attach_shader(program, fragment_shader);
            context.link_program(program);

            if !context.get_program_link_status(program) {
                return Err(Problem::CannotLinkProgram(
                    context.get_program_info_log(program),
                ));
            }

            // Delete the shaders to free up memory
            context.detach_shader(program, vertex_shader);
            context.detach_shader(program, fragment_shader);
            context.delete_shader(vertex_shader);
            context.delete_shader(fragment_shader);

            program
        };

        // Get attribute locations
        let mut attributes = FxHashMap::default();
        unsafe {
            let attribute_count = context.get_active_attributes(program);
            for num in 0..attribute_count {
                if let Some(info) = context.get_active_attribute(program, num) {
                    if let Some(location) = context.get_attrib_location(program, &info.name) {
                        attributes.insert(
                            info.name,
                            AttributeInfo {
                                type_: info.atype,
                                size: info.size as u32,
                                location,
                            },
                        );
                    }
                }
            }
        }

        // Get uniform locations
        let mut uniforms = FxHashMap::default();
        unsafe {
            let uniform_count = context.get_active_uniforms(program);
            for num in 0..uniform_count {
                if let Some(info) = context.get_active_uniform(program, num) {
                    if let Some(location) = context.get_uniform_location(program, &info.name) {
                        uniforms.insert(
                            info.name,
                            UniformInfo {
                                type_: info.utype,
                                size: info.size,
                                location,
                            },
                        );
                    }
                }
            }
        }

        Ok(Program {
            context: Rc::clone(context),
            program,
            attributes,
            uniforms,
        })
    }

    pub fn use_program(&self) {
        unsafe {
            self.context.use_program(Some(self.program));
        }
    }

    pub fn set_uniforms(&self, uniforms: &[&Uniform]) {
        for uniform in uniforms.iter() {
            self.set_uniform(uniform);
        }
    }

    // Uniforms the linker optimised away have no location; setting them is a
    // no-op rather than an error.
    pub fn set_uniform(&self, uniform: &Uniform) {
        let context = &self.context;
        self.use_program();

        unsafe {
            match uniform.value {
                UniformValue::SignedInt(value) => {
                    context.uniform_1_i32(self.get_uniform_location(uniform.name).as_ref(), value)
                }

                UniformValue::Float(value) => {
                    context.uniform_1_f32(self.get_uniform_location(uniform.name).as_ref(), value)
                }

                UniformValue::Vec2(value) => context.uniform_2_f32(
                    self.get_uniform_location(uniform.name).as_ref(),
                    value[0],
                    value[1],
                ),

                UniformValue::Vec3(value) => context.uniform_3_f32(
                    self.get_uniform_location(uniform.name).as_ref(),
                    value[0],
                    value[1],
                    value[2],
                ),

                UniformValue::Texture2D(id) => {
                    context.uniform_1_i32(
                        self.get_uniform_location(uniform.name).as_ref(),
                        id as i32,
                    );
                }
            }
        }
    }

    pub fn get_attrib_location(&self, name: &str) -> Option<u32> {
        self.attributes.get(name).map(|info| info.location)
    }

    pub fn get_uniform_location(&self, name: &str) -> Option<glow::UniformLocation> {
        self.uniforms.get(name).map(|info| info.location.clone())
    }
}

#[derive(Clone)]
struct AttributeInfo {
    type_: u32,
    size: u32,
    location: u32,
}

#[derive(Clone)]
struct UniformInfo {
    type_: u32,
    size: i32,
    location: glow::UniformLocation,
}

pub struct Uniform<'a> {
    pub name: &'static str,
    pub value: UniformValue<'a>,
}

#[derive(Clone)]
pub enum UniformValue<'a> {
    SignedInt(i32),
    Float(f32),
    Vec2(&'a [f32; 2]),
    Vec3(&'a [f32; 3]),
    Texture2D(u32),
}

pub fn compile_shader(context: &Context, shader_type: u32, source: &str) -> Result<glow::Shader> {
    unsafe {
        let shader = context
            .create_shader(shader_type)
            .map_err(|_| Problem::CannotCreateShader(None))?;
        context.shader_source(shader, source);
        context.compile_shader(shader);

        if context.get_shader_compile_status(shader) {
            Ok(shader)
        } else {
            Err(Problem::CannotCreateShader(Some(
                context.get_shader_info_log(shader),
            )))
        }
    }
}

#[derive(Default)]
pub struct VertexBufferLayout {
    pub name: &'static str,
    pub size: u32,
    pub type_: u32,
    pub stride: u32,
    pub offset: u32,
}

pub struct VertexArrayObject {
    context: Context,
    pub id: glow::VertexArray,
}

impl Drop for VertexArrayObject {
    fn drop(&mut self) {
        unsafe {
            self.context.delete_vertex_array(self.id);
        }
    }
}

impl VertexArrayObject {
    pub fn new(
        context: &Context,
        program: &Program,
        vertices: &[(&Buffer, VertexBufferLayout)],
    ) -> Result<Self> {
        let id = unsafe {
            context
                .create_vertex_array()
                .map_err(|_| Problem::CannotCreateBuffer)?
        };

        let vao = Self {
            id,
            context: Rc::clone(context),
        };

        unsafe {
            vao.context.bind_vertex_array(Some(vao.id));

            for (vertex, layout) in vertices.iter() {
                bind_attributes(&vao.context, program, vertex, layout)?;
            }

            vao.context.bind_vertex_array(None);
        }

        Ok(vao)
    }
}

pub fn bind_attributes(
    context: &Context,
    program: &Program,
    buffer: &Buffer,
    buffer_layout: &VertexBufferLayout,
) -> Result<()> {
    unsafe {
        context.bind_buffer(glow::ARRAY_BUFFER, Some(buffer.id));

        if let Some(location) = program.get_attrib_location(buffer_layout.name) {
            context.enable_vertex_attrib_array(location);

            match buffer_layout.type_ {
                glow::FLOAT => context.vertex_attrib_pointer_f32(
                    location,
                    buffer_layout.size as i32,
                    buffer_layout.type_,
                    false,
                    buffer_layout.stride as i32,
                    buffer_layout.offset as i32,
                ),
                _ => return Err(Problem::CannotBindUnsupportedVertexType),
            };
        }

        context.bind_buffer(glow::ARRAY_BUFFER, None);
    }

    Ok(())
}

struct TextureFormat {
    internal_format: GlDataType,
    format: GlDataType,
    type_: GlDataType,
    size: usize,
}

// https://www.khronos.org/registry/webgl/specs/latest/2.0/#TEXTURE_TYPES_FORMATS_FROM_DOM_ELEMENTS_TABLE
fn detect_texture_format(internal_format: GlDataType) -> Result<TextureFormat> {
    match internal_format {
        glow::R8 => Ok(TextureFormat {
            internal_format,
            format: glow::RED,
            type_: glow::UNSIGNED_BYTE,
            size: 1,
        }),
        glow::R16F => Ok(TextureFormat {
            internal_format,
            format: glow::RED,
            type_: glow::HALF_FLOAT,
            size: 1,
        }),
        glow::RG16F => Ok(TextureFormat {
            internal_format,
            format: glow::RG,
            type_: glow::HALF_FLOAT,
            size: 2,
        }),
        glow::RGBA8 => Ok(TextureFormat {
            internal_format,
            format: glow::RGBA,
            type_: glow::UNSIGNED_BYTE,
            size: 4,
        }),
        glow::RGBA16F => Ok(TextureFormat {
            internal_format,
            format: glow::RGBA,
            type_: glow::HALF_FLOAT,
            size: 4,
        }),
        _ => Err(Problem::UnsupportedTextureFormat),
    }
}
