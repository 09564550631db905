pub mod analysis;
pub mod classifier;
pub mod image_service;
pub mod ranking;
pub mod source;
