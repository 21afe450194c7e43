pub mod image;
pub mod image_list;

pub use image::*;
pub use image_list::*;
