pub mod tracking;
pub mod video;
