//! Document-to-text extraction.
//!
//! Uploaded images are cleaned up (deskew, adaptive thresholding,
//! morphological filtering) and recognized with one retry on harsher
//! parameters; PDFs contribute their text layer or embedded page images.
//! A text-completion service, when configured, repairs recognition errors,
//! stitches pages together and splits the result into sections.

pub mod buffer;
pub mod completion;
pub mod config;
pub mod correction;
pub mod document;
pub mod engine;
pub mod engines;
pub mod error;
pub mod extract;
pub mod merge;
pub mod notice;
pub mod preprocessing;
pub mod prompts;
pub mod recognition;
pub mod server;
pub mod structure;
