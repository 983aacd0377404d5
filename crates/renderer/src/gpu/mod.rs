//! `wgpu` presentation backend.
//!
//! - `context` owns instance/device/surface wiring and swapchain resizes.
//! - `pipeline` compiles the GLSL stages and builds layouts once per device.
//! - `uniforms` mirrors the shared `Scene` block.
//! - `state` implements [`Presenter`](crate::present::Presenter) on top of them.

mod context;
mod pipeline;
mod state;
mod uniforms;

pub(crate) use state::GpuPresenter;
