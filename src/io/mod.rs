// src/io/mod.rs
pub mod reader;
pub mod writer;

pub use reader::{decode_rgb, decode_tiff, from_base64};
pub use writer::{encode_gray_jpeg, encode_jpeg, encode_png, to_base64, write_artifact};
