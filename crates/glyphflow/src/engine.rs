use crate::drawer::Drawer;
use crate::fluid::Fluid;
use crate::pointer::{Pointer, Splat};
use crate::render;
use crate::settings::{Settings, Theme};
use render::Context;

use glow::HasContext;
use thiserror::Error;

/// Frame deltas are clamped so a backgrounded tab or a long pause can’t
/// destabilise the advection when frames resume.
const MAX_TIMESTEP: f32 = 0.033;

/// The shader clock wraps to keep float precision after long sessions.
const ELAPSED_WRAP: f32 = 1000.0;

#[derive(Error, Debug)]
pub enum Problem {
    #[error("Cannot read the settings: {0}")]
    ReadSettings(String),

    #[error(transparent)]
    Render(#[from] render::Problem),
}

/// Where the engine is in its life. All transitions are explicit; rendering
/// only happens in `Running`, and `Destroyed` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Running,
    Stopped,
    Destroyed,
}

impl Lifecycle {
    pub fn start(self) -> Self {
        match self {
            Lifecycle::Created | Lifecycle::Stopped => Lifecycle::Running,
            other => other,
        }
    }

    pub fn stop(self) -> Self {
        match self {
            Lifecycle::Running => Lifecycle::Stopped,
            other => other,
        }
    }

    pub fn destroy(self) -> Self {
        Lifecycle::Destroyed
    }
}

struct ResizeRequest {
    logical_width: u32,
    logical_height: u32,
    physical_width: u32,
    physical_height: u32,
}

/// The GPU side of the engine, bundled so `destroy` can release every
/// resource in one move while the engine itself stays callable.
struct Pipeline {
    fluid: Fluid,
    drawer: Drawer,
}

pub struct Engine {
    settings: Settings,
    lifecycle: Lifecycle,

    logical_width: u32,
    logical_height: u32,
    physical_width: u32,
    physical_height: u32,

    pointer: Pointer,
    splats: Vec<Splat>,

    elapsed_time: f32,
    last_timestamp: Option<f64>,
    pending_resize: Option<ResizeRequest>,

    pipeline: Option<Pipeline>,
}

impl Engine {
    pub fn new(
        context: &Context,
        logical_width: u32,
        logical_height: u32,
        physical_width: u32,
        physical_height: u32,
        settings: Settings,
    ) -> Result<Self, Problem> {
        log::info!(
            "Creating engine: {}×{} logical, {}×{} physical, {:?} quality",
            logical_width,
            logical_height,
            physical_width,
            physical_height,
            settings.quality
        );

        // Both layers write premultiplied or final color; nothing uses
        // fixed-function blending.
        unsafe {
            context.disable(glow::BLEND);
            context.disable(glow::DEPTH_TEST);
        }

        let fluid = Fluid::new(context, settings.quality.resolution())?;

        let char_size = settings.char_size_for_width(logical_width)
            * (physical_width as f32 / logical_width as f32);
        let drawer = Drawer::new(
            context,
            physical_width,
            physical_height,
            char_size,
            &settings.glyph_set,
        )?;

        Ok(Self {
            settings,
            lifecycle: Lifecycle::Created,

            logical_width,
            logical_height,
            physical_width,
            physical_height,

            pointer: Pointer::default(),
            splats: Vec::new(),

            elapsed_time: 0.0,
            last_timestamp: None,
            pending_resize: None,

            pipeline: Some(Pipeline { fluid, drawer }),
        })
    }

    pub fn start(&mut self) {
        if !self.is_running() {
            // Re-arm the frame clock so the first frame after a resume
            // doesn’t see the whole pause as one delta.
            self.last_timestamp = None;
        }
        self.lifecycle = self.lifecycle.start();
    }

    pub fn stop(&mut self) {
        self.lifecycle = self.lifecycle.stop();
    }

    /// Releases all GPU resources. Idempotent; every other method becomes a
    /// no-op afterwards.
    pub fn destroy(&mut self) {
        self.lifecycle = self.lifecycle.destroy();
        self.pipeline.take();
        self.splats.clear();
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle == Lifecycle::Running
    }

    /// Renders one frame. `timestamp` is the host clock in milliseconds, as
    /// handed out by requestAnimationFrame or an equivalent.
    pub fn animate(&mut self, timestamp: f64) {
        if self.lifecycle != Lifecycle::Running {
            return;
        }
        let Some(pipeline) = &mut self.pipeline else {
            return;
        };

        if let Some(request) = self.pending_resize.take() {
            let backing_size_changed = request.physical_width != self.physical_width
                || request.physical_height != self.physical_height;

            self.logical_width = request.logical_width;
            self.logical_height = request.logical_height;
            self.physical_width = request.physical_width;
            self.physical_height = request.physical_height;

            if backing_size_changed {
                if let Err(problem) = pipeline
                    .drawer
                    .resize(request.physical_width, request.physical_height)
                {
                    log::error!("Cannot resize the layers: {}", problem);
                }
            }

            let char_size = self.settings.char_size_for_width(request.logical_width)
                * (request.physical_width as f32 / request.logical_width as f32);
            pipeline.drawer.set_char_size(char_size);
        }

        let timestep = match self.last_timestamp {
            Some(last) => clamp_timestep(timestamp - last),
            None => 0.0,
        };
        self.last_timestamp = Some(timestamp);
        self.elapsed_time = wrap_elapsed(self.elapsed_time + timestep);

        self.pointer.decay();

        // Reduced motion freezes the simulation entirely. Queued splats stay
        // queued and take effect if motion is re-enabled.
        if !self.settings.reduced_motion {
            let aspect_ratio = self.physical_width as f32 / self.physical_height as f32;
            pipeline
                .fluid
                .step(timestep, aspect_ratio, &mut self.splats);
        }

        let dye = pipeline.fluid.get_dye();
        pipeline.drawer.draw_scene(
            self.elapsed_time,
            &dye,
            &self.pointer,
            self.settings.theme,
            self.settings.reduced_motion,
        );
        pipeline
            .drawer
            .draw_overlay(self.elapsed_time, &dye, self.settings.theme);
        drop(dye);

        pipeline.drawer.composite(self.settings.theme);
    }

    /// Pointer position in logical pixels, origin top-left. Normalizes into
    /// simulation space (y up) and queues a splat when the pointer moved.
    pub fn update_pointer(&mut self, x: f32, y: f32) {
        if self.lifecycle == Lifecycle::Destroyed {
            return;
        }

        let normalized_x = x / self.logical_width as f32;
        let normalized_y = 1.0 - y / self.logical_height as f32;

        if let Some(splat) = self.pointer.update(normalized_x, normalized_y) {
            self.splats.push(splat);
        }
    }

    /// Pointer left the surface.
    pub fn clear_pointer(&mut self) {
        self.pointer.clear();
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.settings.theme = theme;
    }

    pub fn set_reduced_motion(&mut self, reduced_motion: bool) {
        self.settings.reduced_motion = reduced_motion;
    }

    /// Overrides the character cell size, in logical pixels.
    pub fn set_char_size(&mut self, char_size: f32) {
        self.settings.char_size = Some(char_size);

        if let Some(pipeline) = &mut self.pipeline {
            let pixel_ratio = self.physical_width as f32 / self.logical_width as f32;
            pipeline.drawer.set_char_size(char_size * pixel_ratio);
        }
    }

    /// Records a new surface size. The swap is deferred to the next frame so
    /// a burst of resize events costs one layer reallocation, not many.
    pub fn resize(
        &mut self,
        logical_width: u32,
        logical_height: u32,
        physical_width: u32,
        physical_height: u32,
    ) {
        if self.lifecycle == Lifecycle::Destroyed {
            return;
        }

        self.pending_resize = Some(ResizeRequest {
            logical_width,
            logical_height,
            physical_width,
            physical_height,
        });
    }

    /// Replaces the built-in color wheel with an encoded PNG or JPEG the
    /// host fetched. Optional; a generated hue wheel is in place from
    /// construction. Decode failures are logged, not fatal.
    pub fn set_color_wheel(&mut self, encoded_bytes: &[u8]) {
        if let Some(pipeline) = &mut self.pipeline {
            pipeline.drawer.set_color_wheel(encoded_bytes);
        }
    }
}

fn clamp_timestep(delta_milliseconds: f64) -> f32 {
    ((delta_milliseconds / 1000.0) as f32).clamp(0.0, MAX_TIMESTEP)
}

fn wrap_elapsed(elapsed: f32) -> f32 {
    elapsed % ELAPSED_WRAP
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lifecycle_follows_created_running_stopped() {
        let lifecycle = Lifecycle::Created;
        assert_eq!(lifecycle.stop(), Lifecycle::Created);

        let running = lifecycle.start();
        assert_eq!(running, Lifecycle::Running);
        assert_eq!(running.start(), Lifecycle::Running);

        let stopped = running.stop();
        assert_eq!(stopped, Lifecycle::Stopped);
        assert_eq!(stopped.start(), Lifecycle::Running);
    }

    #[test]
    fn destroyed_is_terminal() {
        let destroyed = Lifecycle::Running.destroy();
        assert_eq!(destroyed, Lifecycle::Destroyed);
        assert_eq!(destroyed.start(), Lifecycle::Destroyed);
        assert_eq!(destroyed.stop(), Lifecycle::Destroyed);
        assert_eq!(destroyed.destroy(), Lifecycle::Destroyed);
    }

    #[test]
    fn timestep_is_clamped_to_one_frame() {
        assert!((clamp_timestep(16.0) - 0.016).abs() < 1e-6);
        assert_eq!(clamp_timestep(500.0), 0.033);
        assert_eq!(clamp_timestep(5000.0), 0.033);
        // A clock that goes backwards must not advect in reverse.
        assert_eq!(clamp_timestep(-200.0), 0.0);
    }

    #[test]
    fn elapsed_time_wraps() {
        assert_eq!(wrap_elapsed(999.0), 999.0);
        assert!((wrap_elapsed(1000.5) - 0.5).abs() < 1e-3);
    }
}
