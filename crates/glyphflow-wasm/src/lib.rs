#![cfg(target_arch = "wasm32")]

use glyphflow::{Engine, Settings, Theme};

use gloo_utils::format::JsValueSerdeExt;
use serde::Serialize;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::Window;

#[wasm_bindgen]
pub struct GlyphFlow {
    canvas: web_sys::HtmlCanvasElement,
    #[allow(dead_code)]
    context: Rc<glow::Context>,
    logical_width: u32,
    logical_height: u32,
    pixel_ratio: f64,
    instance: Engine,
}

#[wasm_bindgen]
impl GlyphFlow {
    #[wasm_bindgen(constructor)]
    pub fn new(canvas_id: &str, settings_object: &JsValue) -> Result<GlyphFlow, JsValue> {
        console_log::init_with_level(log::Level::Debug).expect("cannot enable logging");

        let (canvas, gl, logical_width, logical_height, physical_width, physical_height, pixel_ratio) =
            get_rendering_context(canvas_id)?;
        let context = Rc::new(gl);

        let mut settings: Settings = match settings_object.into_serde() {
            Ok(settings) => settings,
            Err(msg) => return Err(JsValue::from_str(&msg.to_string())),
        };

        // Weak machines get the small grid no matter what was requested, and
        // an OS-level reduced-motion preference always wins.
        settings.quality = settings
            .quality
            .clamp_for_cpus(hardware_concurrency(&window()));
        settings.reduced_motion = settings.reduced_motion || prefers_reduced_motion(&window());

        let instance = Engine::new(
            &context,
            logical_width,
            logical_height,
            physical_width,
            physical_height,
            settings,
        )
        .map_err(|err| JsValue::from_str(&err.to_string()))?;

        Ok(Self {
            canvas,
            context,
            logical_width,
            logical_height,
            pixel_ratio,
            instance,
        })
    }

    pub fn animate(&mut self, timestamp: f64) {
        self.instance.animate(timestamp);
    }

    pub fn start(&mut self) {
        self.instance.start();
    }

    pub fn stop(&mut self) {
        self.instance.stop();
    }

    pub fn destroy(&mut self) {
        self.instance.destroy();
    }

    /// Pointer position in CSS pixels relative to the canvas.
    #[wasm_bindgen(js_name = updatePointer)]
    pub fn update_pointer(&mut self, x: f32, y: f32) {
        self.instance.update_pointer(x, y);
    }

    #[wasm_bindgen(js_name = clearPointer)]
    pub fn clear_pointer(&mut self) {
        self.instance.clear_pointer();
    }

    /// 0 = dark, anything else = light.
    #[wasm_bindgen(js_name = setTheme)]
    pub fn set_theme(&mut self, theme_index: u32) {
        self.instance.set_theme(Theme::from_index(theme_index));
    }

    #[wasm_bindgen(js_name = setReducedMotion)]
    pub fn set_reduced_motion(&mut self, reduced_motion: bool) {
        self.instance.set_reduced_motion(reduced_motion);
    }

    /// Character cell size in CSS pixels.
    #[wasm_bindgen(js_name = setCharSize)]
    pub fn set_char_size(&mut self, char_size: f32) {
        self.instance.set_char_size(char_size);
    }

    /// An encoded PNG or JPEG to replace the color wheel.
    #[wasm_bindgen(js_name = loadColorWheel)]
    pub fn load_color_wheel(&mut self, encoded_bytes: &[u8]) {
        self.instance.set_color_wheel(encoded_bytes);
    }

    pub fn resize(&mut self, logical_width: u32, logical_height: u32) {
        if (self.logical_width != logical_width) || (self.logical_height != logical_height) {
            let (physical_width, physical_height) =
                physical_from_logical_size(logical_width, logical_height, self.pixel_ratio);

            self.canvas.set_width(physical_width);
            self.canvas.set_height(physical_height);

            self.instance.resize(
                logical_width,
                logical_height,
                physical_width,
                physical_height,
            );

            self.logical_width = logical_width;
            self.logical_height = logical_height;
        }
    }
}

pub fn get_rendering_context(
    element_id: &str,
) -> Result<(web_sys::HtmlCanvasElement, glow::Context, u32, u32, u32, u32, f64), JsValue> {
    use web_sys::WebGl2RenderingContext as GL;

    set_panic_hook();

    let window = window();
    let document = window.document().expect("I expected to find a document");
    let html_canvas = document
        .get_element_by_id(element_id)
        .ok_or_else(|| {
            JsValue::from_str(&format!(
                "I expected to find a canvas element with id `{}`",
                element_id
            ))
        })?
        .dyn_into::<web_sys::HtmlCanvasElement>()?;

    let pixel_ratio: f64 = window.device_pixel_ratio();
    let logical_width = html_canvas.client_width() as u32;
    let logical_height = html_canvas.client_height() as u32;
    let (physical_width, physical_height) =
        physical_from_logical_size(logical_width, logical_height, pixel_ratio);
    html_canvas.set_width(physical_width);
    html_canvas.set_height(physical_height);

    let options = ContextOptions {
        // Disabling alpha can lead to poor performance on some platforms.
        alpha: true,
        depth: false,
        stencil: false,
        desynchronized: false,
        antialias: false,
        fail_if_major_performance_caveat: false,
        power_preference: "default",
        premultiplied_alpha: true,
        preserve_drawing_buffer: false,
    }
    .serialize()?;

    let gl = if let Ok(Some(gl)) =
        html_canvas.get_context_with_context_options("webgl2", &options)
    {
        let gl = gl.dyn_into::<GL>()?;
        gl.get_extension("OES_texture_float")?;
        gl.get_extension("OES_texture_float_linear")?;
        gl.get_extension("EXT_color_buffer_float")?;

        gl.disable(GL::BLEND);
        gl.disable(GL::DEPTH_TEST);

        glow::Context::from_webgl2_context(gl)
    } else {
        // The page shows its static fallback; nothing to render into.
        return Err(JsValue::from_str(
            "Can’t create the WebGl2 rendering context",
        ));
    };

    Ok((
        html_canvas,
        gl,
        logical_width,
        logical_height,
        physical_width,
        physical_height,
        pixel_ratio,
    ))
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ContextOptions {
    pub alpha: bool,
    pub depth: bool,
    pub stencil: bool,
    pub desynchronized: bool,
    pub antialias: bool,
    pub fail_if_major_performance_caveat: bool,
    pub power_preference: &'static str,
    pub premultiplied_alpha: bool,
    pub preserve_drawing_buffer: bool,
}

impl ContextOptions {
    pub fn serialize(&self) -> Result<JsValue, JsValue> {
        JsValue::from_serde(self).map_err(|msg| JsValue::from_str(&msg.to_string()))
    }
}

pub fn window() -> Window {
    web_sys::window().expect("The global `window` doesn’t exist")
}

fn hardware_concurrency(window: &Window) -> u32 {
    window.navigator().hardware_concurrency() as u32
}

fn prefers_reduced_motion(window: &Window) -> bool {
    match window.match_media("(prefers-reduced-motion: reduce)") {
        Ok(Some(media_query)) => media_query.matches(),
        _ => false,
    }
}

// https://github.com/rustwasm/console_error_panic_hook#readme
pub fn set_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn physical_from_logical_size(
    logical_width: u32,
    logical_height: u32,
    pixel_ratio: f64,
) -> (u32, u32) {
    (
        (pixel_ratio * f64::from(logical_width)) as u32,
        (pixel_ratio * f64::from(logical_height)) as u32,
    )
}
