mod data;
mod drawer;
mod fluid;
mod glyphs;
mod pointer;
mod render;

pub mod engine;
pub mod settings;

pub use engine::{Engine, Lifecycle, Problem};
pub use render::Context;
pub use settings::{Quality, Settings, Theme};
