//! Individual preprocessing steps

pub mod contrast;
pub mod denoise;
pub mod deskew;
pub mod grayscale;
pub mod morphology;
pub mod normalize;
pub mod resize;
pub mod sharpen;
pub mod threshold;
