pub mod base;
pub mod frame;
pub mod overlay;

// Re-export main types
pub use base::BaseCompositor;
pub use frame::{blend_pixel, FrameCompositor};
pub use overlay::{OverlayRenderer, ScreenPoint, ScreenProjection};
