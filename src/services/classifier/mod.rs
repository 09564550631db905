pub mod impl_fake;
pub mod impl_onnx;
pub mod inference;
pub mod interface;
pub mod model_manager;
