use crate::pointer::Splat;
use crate::{data, render};
use render::{
    Buffer, Context, DoubleFramebuffer, Framebuffer, TextureOptions, Uniform, UniformValue,
    VertexArrayObject,
};

use glow::HasContext;
use half::f16;
use std::cell::Ref;
use std::rc::Rc;

static QUAD_VERT_SHADER: &str = include_str!(concat!(env!("OUT_DIR"), "/shaders/quad.vert"));
static SPLAT_FRAG_SHADER: &str = include_str!(concat!(env!("OUT_DIR"), "/shaders/splat.frag"));
static ADVECTION_FRAG_SHADER: &str =
    include_str!(concat!(env!("OUT_DIR"), "/shaders/advection.frag"));
static CURL_FRAG_SHADER: &str = include_str!(concat!(env!("OUT_DIR"), "/shaders/curl.frag"));
static VORTICITY_FRAG_SHADER: &str =
    include_str!(concat!(env!("OUT_DIR"), "/shaders/vorticity.frag"));
static DIVERGENCE_FRAG_SHADER: &str =
    include_str!(concat!(env!("OUT_DIR"), "/shaders/divergence.frag"));
static SOLVE_PRESSURE_FRAG_SHADER: &str =
    include_str!(concat!(env!("OUT_DIR"), "/shaders/solve_pressure.frag"));
static SUBTRACT_GRADIENT_FRAG_SHADER: &str =
    include_str!(concat!(env!("OUT_DIR"), "/shaders/subtract_gradient.frag"));

// Fixed cost over accuracy: the solve is not convergence-checked.
const PRESSURE_ITERATIONS: u32 = 8;
const CURL_STRENGTH: f32 = 0.3;

// Both strictly < 1 so the fields decay to rest without input.
const VELOCITY_DISSIPATION: f32 = 0.97;
const DYE_DISSIPATION: f32 = 0.985;

const SPLAT_RADIUS: f32 = 0.012;

/// Advances the velocity and dye fields one timestep on a fixed square grid.
pub struct Fluid {
    context: Context,

    texel_size: [f32; 2],

    #[allow(unused)]
    plane_vertices: Buffer,
    vertex_buffer: VertexArrayObject,

    velocity_textures: DoubleFramebuffer,
    dye_textures: DoubleFramebuffer,
    pressure_textures: DoubleFramebuffer,
    divergence_texture: Framebuffer,
    curl_texture: Framebuffer,

    splat_pass: render::Program,
    advection_pass: render::Program,
    curl_pass: render::Program,
    vorticity_pass: render::Program,
    divergence_pass: render::Program,
    pressure_pass: render::Program,
    subtract_gradient_pass: render::Program,
}

impl Fluid {
    pub fn new(context: &Context, resolution: u32) -> Result<Self, render::Problem> {
        let texel_size = [1.0 / resolution as f32, 1.0 / resolution as f32];

        // Framebuffers, zero-initialised.
        let half_float_zero = f16::from_f32(0.0);
        let zero_array_of_r16 = vec![half_float_zero; (resolution * resolution) as usize];
        let zero_array_of_rg16 = vec![half_float_zero; (2 * resolution * resolution) as usize];
        let zero_array_of_rgba16 = vec![half_float_zero; (4 * resolution * resolution) as usize];

        let velocity_textures = DoubleFramebuffer::new(
            context,
            resolution,
            resolution,
            TextureOptions::linear(glow::RG16F),
        )?;
        velocity_textures.with_data(Some(&zero_array_of_rg16))?;

        let dye_textures = DoubleFramebuffer::new(
            context,
            resolution,
            resolution,
            TextureOptions::linear(glow::RGBA16F),
        )?;
        dye_textures.with_data(Some(&zero_array_of_rgba16))?;

        let pressure_textures = DoubleFramebuffer::new(
            context,
            resolution,
            resolution,
            TextureOptions::linear(glow::R16F),
        )?;
        pressure_textures.with_data(Some(&zero_array_of_r16))?;

        let divergence_texture = Framebuffer::new(
            context,
            resolution,
            resolution,
            TextureOptions::linear(glow::R16F),
        )?;
        divergence_texture.with_data(Some(&zero_array_of_r16))?;

        let curl_texture = Framebuffer::new(
            context,
            resolution,
            resolution,
            TextureOptions::linear(glow::R16F),
        )?;
        curl_texture.with_data(Some(&zero_array_of_r16))?;

        // Geometry
        let plane_vertices = Buffer::from_f32(
            context,
            &data::PLANE_VERTICES,
            glow::ARRAY_BUFFER,
            glow::STATIC_DRAW,
        )?;

        let splat_pass = render::Program::new(context, (QUAD_VERT_SHADER, SPLAT_FRAG_SHADER))?;
        let advection_pass =
            render::Program::new(context, (QUAD_VERT_SHADER, ADVECTION_FRAG_SHADER))?;
        let curl_pass = render::Program::new(context, (QUAD_VERT_SHADER, CURL_FRAG_SHADER))?;
        let vorticity_pass =
            render::Program::new(context, (QUAD_VERT_SHADER, VORTICITY_FRAG_SHADER))?;
        let divergence_pass =
            render::Program::new(context, (QUAD_VERT_SHADER, DIVERGENCE_FRAG_SHADER))?;
        let pressure_pass =
            render::Program::new(context, (QUAD_VERT_SHADER, SOLVE_PRESSURE_FRAG_SHADER))?;
        let subtract_gradient_pass =
            render::Program::new(context, (QUAD_VERT_SHADER, SUBTRACT_GRADIENT_FRAG_SHADER))?;

        let vertex_buffer = VertexArrayObject::new(
            context,
            &advection_pass,
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

            texel_size,

            plane_vertices,
            vertex_buffer,

            velocity_textures,
            dye_textures,
            pressure_textures,
            divergence_texture,
            curl_texture,

            splat_pass,
            advection_pass,
            curl_pass,
            vorticity_pass,
            divergence_pass,
            pressure_pass,
            subtract_gradient_pass,
        })
    }

    /// One solver step. Drains the splat queue exactly once, whatever its
    /// length. The timestep is pre-clamped by the engine.
    pub fn step(&self, timestep: f32, aspect_ratio: f32, splats: &mut Vec<Splat>) {
        unsafe {
            self.context.bind_vertex_array(Some(self.vertex_buffer.id));
        }

        // Queued impulses apply sequentially, each reading the previous
        // splat’s output. Overlapping splats are order-dependent on purpose.
        for splat in splats.drain(..) {
            self.splat(&splat, aspect_ratio);
        }

        self.advect_velocity(timestep);
        self.compute_curl();
        self.apply_vorticity(timestep);
        self.compute_divergence();
        self.solve_pressure();
        self.subtract_gradient();
        self.advect_dye(timestep);

        unsafe {
            self.context.bind_vertex_array(None);
        }
    }

    fn splat(&self, splat: &Splat, aspect_ratio: f32) {
        self.splat_into(
            &self.velocity_textures,
            [splat.x, splat.y],
            [splat.dx, splat.dy, 0.0],
            SPLAT_RADIUS,
            aspect_ratio,
        );

        // Dye splats are wider and offset so even small movements leave a
        // visible color trace.
        self.splat_into(
            &self.dye_textures,
            [splat.x, splat.y],
            [
                splat.dx.abs() * 8.0 + 3.0,
                splat.dy.abs() * 8.0 + 4.0,
                (splat.dx + splat.dy).abs() * 6.0 + 5.0,
            ],
            SPLAT_RADIUS * 3.0,
            aspect_ratio,
        );
    }

    fn splat_into(
        &self,
        target: &DoubleFramebuffer,
        point: [f32; 2],
        color: [f32; 3],
        radius: f32,
        aspect_ratio: f32,
    ) {
        target.draw_to(&self.context, |target_texture| unsafe {
            self.splat_pass.use_program();
            self.splat_pass.set_uniforms(&[
                &Uniform {
                    name: "targetTexture",
                    value: UniformValue::Texture2D(0),
                },
                &Uniform {
                    name: "splatPoint",
                    value: UniformValue::Vec2(&point),
                },
                &Uniform {
                    name: "splatColor",
                    value: UniformValue::Vec3(&color),
                },
                &Uniform {
                    name: "splatRadius",
                    value: UniformValue::Float(radius),
                },
                &Uniform {
                    name: "aspectRatio",
                    value: UniformValue::Float(aspect_ratio),
                },
            ]);

            self.context.active_texture(glow::TEXTURE0);
            self.context
                .bind_texture(glow::TEXTURE_2D, Some(target_texture.texture));

            self.context.draw_arrays(glow::TRIANGLES, 0, 6);
        });
    }

    fn advect_velocity(&self, timestep: f32) {
        self.velocity_textures
            .draw_to(&self.context, |velocity_texture| unsafe {
                self.advection_pass.use_program();
                self.advection_pass.set_uniforms(&[
                    &Uniform {
                        name: "velocityTexture",
                        value: UniformValue::Texture2D(0),
                    },
                    &Uniform {
                        name: "sourceTexture",
                        value: UniformValue::Texture2D(0),
                    },
                    &Uniform {
                        name: "deltaTime",
                        value: UniformValue::Float(timestep),
                    },
                    &Uniform {
                        name: "dissipation",
                        value: UniformValue::Float(VELOCITY_DISSIPATION),
                    },
                    &Uniform {
                        name: "texelSize",
                        value: UniformValue::Vec2(&self.texel_size),
                    },
                ]);

                self.context.active_texture(glow::TEXTURE0);
                self.context
                    .bind_texture(glow::TEXTURE_2D, Some(velocity_texture.texture));

                self.context.draw_arrays(glow::TRIANGLES, 0, 6);
            });
    }

    fn compute_curl(&self) {
        self.curl_texture.draw_to(&self.context, || unsafe {
            self.curl_pass.use_program();
            self.curl_pass.set_uniforms(&[
                &Uniform {
                    name: "velocityTexture",
                    value: UniformValue::Texture2D(0),
                },
                &Uniform {
                    name: "texelSize",
                    value: UniformValue::Vec2(&self.texel_size),
                },
            ]);

            self.context.active_texture(glow::TEXTURE0);
            self.context.bind_texture(
                glow::TEXTURE_2D,
                Some(self.velocity_textures.current().texture),
            );

            self.context.draw_arrays(glow::TRIANGLES, 0, 6);
        });
    }

    fn apply_vorticity(&self, timestep: f32) {
        self.velocity_textures
            .draw_to(&self.context, |velocity_texture| unsafe {
                self.vorticity_pass.use_program();
                self.vorticity_pass.set_uniforms(&[
                    &Uniform {
                        name: "velocityTexture",
                        value: UniformValue::Texture2D(0),
                    },
                    &Uniform {
                        name: "curlTexture",
                        value: UniformValue::Texture2D(1),
                    },
                    &Uniform {
                        name: "curlStrength",
                        value: UniformValue::Float(CURL_STRENGTH),
                    },
                    &Uniform {
                        name: "deltaTime",
                        value: UniformValue::Float(timestep),
                    },
                    &Uniform {
                        name: "texelSize",
                        value: UniformValue::Vec2(&self.texel_size),
                    },
                ]);

                self.context.active_texture(glow::TEXTURE0);
                self.context
                    .bind_texture(glow::TEXTURE_2D, Some(velocity_texture.texture));

                self.context.active_texture(glow::TEXTURE1);
                self.context
                    .bind_texture(glow::TEXTURE_2D, Some(self.curl_texture.texture));

                self.context.draw_arrays(glow::TRIANGLES, 0, 6);
            });
    }

    fn compute_divergence(&self) {
        self.divergence_texture.draw_to(&self.context, || unsafe {
            self.divergence_pass.use_program();
            self.divergence_pass.set_uniforms(&[
                &Uniform {
                    name: "velocityTexture",
                    value: UniformValue::Texture2D(0),
                },
                &Uniform {
                    name: "texelSize",
                    value: UniformValue::Vec2(&self.texel_size),
                },
            ]);

            self.context.active_texture(glow::TEXTURE0);
            self.context.bind_texture(
                glow::TEXTURE_2D,
                Some(self.velocity_textures.current().texture),
            );

            self.context.draw_arrays(glow::TRIANGLES, 0, 6);
        });
    }

    fn solve_pressure(&self) {
        // No warm start: the solve restarts from zero every frame.
        self.pressure_textures.current().zero_out();

        self.pressure_pass.use_program();
        self.pressure_pass.set_uniforms(&[
            &Uniform {
                name: "divergenceTexture",
                value: UniformValue::Texture2D(0),
            },
            &Uniform {
                name: "pressureTexture",
                value: UniformValue::Texture2D(1),
            },
            &Uniform {
                name: "texelSize",
                value: UniformValue::Vec2(&self.texel_size),
            },
        ]);

        unsafe {
            self.context.active_texture(glow::TEXTURE0);
            self.context
                .bind_texture(glow::TEXTURE_2D, Some(self.divergence_texture.texture));
        }

        for _ in 0..PRESSURE_ITERATIONS {
            self.pressure_textures
                .draw_to(&self.context, |pressure_texture| unsafe {
                    self.context.active_texture(glow::TEXTURE1);
                    self.context
                        .bind_texture(glow::TEXTURE_2D, Some(pressure_texture.texture));

                    self.context.draw_arrays(glow::TRIANGLES, 0, 6);
                });
        }
    }

    fn subtract_gradient(&self) {
        self.velocity_textures
            .draw_to(&self.context, |velocity_texture| unsafe {
                self.subtract_gradient_pass.use_program();
                self.subtract_gradient_pass.set_uniforms(&[
                    &Uniform {
                        name: "pressureTexture",
                        value: UniformValue::Texture2D(0),
                    },
                    &Uniform {
                        name: "velocityTexture",
                        value: UniformValue::Texture2D(1),
                    },
                    &Uniform {
                        name: "texelSize",
                        value: UniformValue::Vec2(&self.texel_size),
                    },
                ]);

                self.context.active_texture(glow::TEXTURE0);
                self.context.bind_texture(
                    glow::TEXTURE_2D,
                    Some(self.pressure_textures.current().texture),
                );

                self.context.active_texture(glow::TEXTURE1);
                self.context
                    .bind_texture(glow::TEXTURE_2D, Some(velocity_texture.texture));

                self.context.draw_arrays(glow::TRIANGLES, 0, 6);
            });
    }

    fn advect_dye(&self, timestep: f32) {
        self.dye_textures
            .draw_to(&self.context, |dye_texture| unsafe {
                self.advection_pass.use_program();
                self.advection_pass.set_uniforms(&[
                    &Uniform {
                        name: "velocityTexture",
                        value: UniformValue::Texture2D(0),
                    },
                    &Uniform {
                        name: "sourceTexture",
                        value: UniformValue::Texture2D(1),
                    },
                    &Uniform {
                        name: "deltaTime",
                        value: UniformValue::Float(timestep),
                    },
                    &Uniform {
                        name: "dissipation",
                        value: UniformValue::Float(DYE_DISSIPATION),
                    },
                    &Uniform {
                        name: "texelSize",
                        value: UniformValue::Vec2(&self.texel_size),
                    },
                ]);

                self.context.active_texture(glow::TEXTURE0);
                self.context.bind_texture(
                    glow::TEXTURE_2D,
                    Some(self.velocity_textures.current().texture),
                );

                self.context.active_texture(glow::TEXTURE1);
                self.context
                    .bind_texture(glow::TEXTURE_2D, Some(dye_texture.texture));

                self.context.draw_arrays(glow::TRIANGLES, 0, 6);
            });
    }

    pub fn get_dye(&self) -> Ref<Framebuffer> {
        self.dye_textures.current()
    }
}
