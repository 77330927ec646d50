#![forbid(unsafe_code)]

pub mod canvas;
pub mod decode;
pub mod error;
pub mod fade;
pub mod rating;

pub use canvas::{FlipAxis, PixelCanvas, PixelFormat, Rotation, ScaleFilter};
pub use decode::{
    ScalePolicy, decode_from_bytes, decode_scaled, decode_with_size_hint, probe_dimensions,
    resolve_target,
};
pub use error::{CoverkitError, CoverkitResult};
pub use fade::{FadeConfig, FadeScheduler, Tick, TickRequest, TickToken};
pub use rating::RatingIconCache;
