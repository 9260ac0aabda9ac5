//! Software rasterizer core emulating the handheld's fixed-function GPU.
//!
//! The display-list interpreter (out of scope here) writes the register
//! bank and calls [`Gpu::submit_primitive`]; this crate turns those
//! submissions into pixels in the 32-bit color buffer and updates to the
//! 16-bit depth buffer, exactly as the hardware would.

pub mod clipper;
pub mod framebuffer;
pub mod gpu;
pub mod lighting;
pub mod math;
pub mod rasterizer;
pub mod state;
pub mod texture;
pub mod transform;
pub mod vertex;

pub use gpu::Gpu;
pub use lighting::{Lighting, NullLighting};
pub use state::{GePrimitive, GpuState};
pub use transform::{SubmitError, TransformUnit};
pub use vertex::{VertexData, VertexReader, VertexType};
