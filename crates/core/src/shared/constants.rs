pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const EMBEDDING_MODEL_NAME: &str = "w600k_r50.onnx";
pub const EMBEDDING_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/w600k_r50.onnx";

/// Directory name used under the platform config/cache/data roots.
pub const APP_DIR_NAME: &str = "Clara";

/// Fixed sentinel in cell (1, 1) of every attendance sheet.
pub const ROLL_HEADER: &str = "Roll Number";

/// Frames are scaled to this resolution before detection.
pub const WORKING_WIDTH: u32 = 960;
pub const WORKING_HEIGHT: u32 = 540;

/// Maximum embedding distance accepted as a match. Tighter than the usual
/// 0.6 default: precision over recall.
pub const DEFAULT_TOLERANCE: f64 = 0.4;

/// Samples per nominal second of video.
pub const DEFAULT_SAMPLE_RATE: f64 = 2.0;
/// Minimum number of samples per video.
pub const DEFAULT_SAMPLE_FLOOR: usize = 10;
/// Reported fps below this is treated as this.
pub const MIN_EFFECTIVE_FPS: f64 = 30.0;

/// UTC+05:30, the civil timezone attendance dates are recorded in.
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 330;

pub const DEFAULT_SCAN_BUDGET_SECS: u64 = 600;
pub const DEFAULT_LEASE_SECS: u64 = 3600;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 300;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
