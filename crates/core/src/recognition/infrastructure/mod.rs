mod execution_provider;
pub mod math;
pub mod onnx_arcface_encoder;
pub mod onnx_yolo_detector;
