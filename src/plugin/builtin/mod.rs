//! Built-in plugins.

pub mod background;
pub mod binning;
pub mod crop;
pub mod frame_loader;
pub mod peak_fit;
pub mod scale_offset;
pub mod sum;

pub use background::PolynomialBackground;
pub use binning::Binning;
pub use crop::Crop;
pub use frame_loader::FrameLoader;
pub use peak_fit::{PeakFit, PEAK_FIT_LABELS};
pub use scale_offset::ScaleOffset;
pub use sum::SumFrame;
