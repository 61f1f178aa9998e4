pub mod image;

pub use image::{ImageRepository, InMemoryImageRepository};
