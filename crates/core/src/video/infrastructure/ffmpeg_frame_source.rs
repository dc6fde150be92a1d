use std::path::Path;

use crate::shared::constants::{WORKING_HEIGHT, WORKING_WIDTH};
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::frame_source::FrameSource;

/// Decodes planned video frames via ffmpeg-next (libavformat + libavcodec).
///
/// Decoding is sequential; frames that are not in the plan are decoded but
/// never converted. Planned frames are rotated upright and scaled to the
/// output size as RGB24.
///
/// [`frames_at`](FrameSource::frames_at) consumes the stream, so it should be
/// called once per [`open`](FrameSource::open).
pub struct FfmpegFrameSource {
    input_ctx: Option<ffmpeg_next::format::context::Input>,
    video_stream_index: usize,
    metadata: Option<VideoMetadata>,
    output_width: u32,
    output_height: u32,
}

// Safety: FfmpegFrameSource is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegFrameSource {}

impl FfmpegFrameSource {
    pub fn new(output_width: u32, output_height: u32) -> Self {
        Self {
            input_ctx: None,
            video_stream_index: 0,
            metadata: None,
            output_width,
            output_height,
        }
    }

    fn planned_frames(
        &mut self,
        plan: &[usize],
    ) -> Result<PlannedFrames<'_>, Box<dyn std::error::Error>> {
        let rotation = self.metadata.as_ref().map_or(0, |m| m.rotation);
        let video_stream_index = self.video_stream_index;
        let (scaled_width, scaled_height) = if rotation == 90 || rotation == 270 {
            (self.output_height, self.output_width)
        } else {
            (self.output_width, self.output_height)
        };

        let ictx = self
            .input_ctx
            .as_mut()
            .ok_or("FfmpegFrameSource: not opened")?;
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg_next::format::Pixel::RGB24,
            scaled_width,
            scaled_height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        Ok(PlannedFrames {
            ictx,
            decoder,
            scaler,
            video_stream_index,
            plan: plan.to_vec(),
            cursor: 0,
            next_index: 0,
            last: None,
            scaled_width,
            scaled_height,
            rotation,
            flushing: false,
            done: false,
        })
    }
}

impl Default for FfmpegFrameSource {
    fn default() -> Self {
        Self::new(WORKING_WIDTH, WORKING_HEIGHT)
    }
}

impl FrameSource for FfmpegFrameSource {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let ictx = ffmpeg_next::format::input(path)?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;

        let video_stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let fps = rational_to_f64(stream.rate());
        let stream_duration = if stream.duration() > 0 {
            Some(stream.duration() as f64 * rational_to_f64(stream.time_base()))
        } else {
            None
        };
        let container_duration = if ictx.duration() > 0 {
            Some(ictx.duration() as f64 / ffmpeg_next::ffi::AV_TIME_BASE as f64)
        } else {
            None
        };
        let total_frames = estimate_total_frames(
            stream.frames(),
            stream_duration.or(container_duration),
            fps,
        );

        let metadata = VideoMetadata {
            width: decoder.width(),
            height: decoder.height(),
            fps,
            total_frames,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source_path: Some(path.to_path_buf()),
            rotation: extract_rotation(&stream),
        };
        log::debug!(
            "Opened {}: {}x{} {:.2} fps, {} frames, rotation {}",
            path.display(),
            metadata.width,
            metadata.height,
            metadata.fps,
            metadata.total_frames,
            metadata.rotation
        );

        self.video_stream_index = video_stream_index;
        self.metadata = Some(metadata.clone());
        self.input_ctx = Some(ictx);

        Ok(metadata)
    }

    fn frames_at(
        &mut self,
        plan: &[usize],
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        match self.planned_frames(plan) {
            Ok(frames) => Box::new(frames),
            Err(e) => Box::new(std::iter::once(Err(e))),
        }
    }

    fn close(&mut self) {
        self.input_ctx = None;
        self.metadata = None;
    }
}

/// Lazy iterator that walks the stream once, converting only planned frames.
struct PlannedFrames<'a> {
    ictx: &'a mut ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    video_stream_index: usize,
    plan: Vec<usize>,
    cursor: usize,
    /// Index the next decoded frame will have.
    next_index: usize,
    last: Option<Frame>,
    scaled_width: u32,
    scaled_height: u32,
    rotation: i32,
    flushing: bool,
    done: bool,
}

impl PlannedFrames<'_> {
    fn receive(&mut self) -> Option<ffmpeg_next::util::frame::video::Video> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        self.decoder.receive_frame(&mut decoded).ok().map(|_| decoded)
    }

    fn next_decoded(&mut self) -> Option<ffmpeg_next::util::frame::video::Video> {
        if let Some(decoded) = self.receive() {
            return Some(decoded);
        }
        if self.flushing {
            return None;
        }

        loop {
            let Some((stream, packet)) = self.ictx.packets().next() else {
                let _ = self.decoder.send_eof();
                self.flushing = true;
                return self.receive();
            };

            if stream.index() != self.video_stream_index {
                continue;
            }

            if self.decoder.send_packet(&packet).is_err() {
                continue;
            }

            if let Some(decoded) = self.receive() {
                return Some(decoded);
            }
        }
    }

    fn convert(
        &mut self,
        decoded: &ffmpeg_next::util::frame::video::Video,
        index: usize,
    ) -> Result<Frame, Box<dyn std::error::Error>> {
        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler.run(decoded, &mut rgb_frame)?;
        let pixels = extract_rgb_pixels(&rgb_frame, self.scaled_width, self.scaled_height);
        let (pixels, width, height) =
            rotate_rgb(pixels, self.scaled_width, self.scaled_height, self.rotation);
        Ok(Frame::new(pixels, width, height, 3, index))
    }
}

impl Iterator for PlannedFrames<'_> {
    type Item = Result<Frame, Box<dyn std::error::Error>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let Some(&target) = self.plan.get(self.cursor) else {
            self.done = true;
            return None;
        };
        self.cursor += 1;

        if let Some(last) = self.last.as_ref().filter(|f| f.index() == target) {
            return Some(Ok(last.clone()));
        }
        if target < self.next_index {
            self.done = true;
            return Some(Err(format!(
                "frame {target} requested after frame {} was decoded",
                self.next_index - 1
            )
            .into()));
        }

        loop {
            let Some(decoded) = self.next_decoded() else {
                self.done = true;
                return Some(Err(format!(
                    "frame {target} is past the end of the stream ({} frames decoded)",
                    self.next_index
                )
                .into()));
            };
            let index = self.next_index;
            self.next_index += 1;
            if index < target {
                continue;
            }

            return match self.convert(&decoded, index) {
                Ok(frame) => {
                    self.last = Some(frame.clone());
                    Some(Ok(frame))
                }
                Err(e) => {
                    self.done = true;
                    Some(Err(e))
                }
            };
        }
    }
}

fn rational_to_f64(r: ffmpeg_next::Rational) -> f64 {
    if r.denominator() != 0 {
        r.numerator() as f64 / r.denominator() as f64
    } else {
        0.0
    }
}

/// Frame count from the container, or estimated from duration when the
/// container does not record it.
fn estimate_total_frames(stream_frames: i64, duration_secs: Option<f64>, fps: f64) -> usize {
    if stream_frames > 0 {
        return stream_frames as usize;
    }
    match duration_secs {
        Some(secs) if secs.is_finite() && fps.is_finite() && fps > 0.0 => {
            (secs * fps).round().max(0.0) as usize
        }
        _ => 0,
    }
}

/// Extracts the rotation angle from a video stream.
///
/// Tries stream side data (DisplayMatrix) first, then falls back to the
/// `"rotate"` metadata tag. Returns 0, 90, 180, or 270.
fn extract_rotation(stream: &ffmpeg_next::format::stream::Stream) -> i32 {
    for side_data in stream.side_data() {
        if side_data.kind() == ffmpeg_next::codec::packet::side_data::Type::DisplayMatrix {
            if let Some(angle) = parse_display_matrix(side_data.data()) {
                return normalize_rotation(angle);
            }
        }
    }

    if let Some(rotate_str) = stream.metadata().get("rotate") {
        if let Ok(angle) = rotate_str.parse::<i32>() {
            return normalize_rotation(angle);
        }
    }

    0
}

/// Parses a 3x3 display matrix (9 x i32, 16.16 fixed-point, little-endian)
/// to the clockwise rotation in degrees.
///
/// The matrix describes the transform needed for display, so the angle of
/// its first row vector is negated.
fn parse_display_matrix(data: &[u8]) -> Option<i32> {
    if data.len() < 36 {
        return None;
    }

    let m00 = i32::from_le_bytes(data[0..4].try_into().ok()?) as f64 / 65536.0;
    let m10 = i32::from_le_bytes(data[4..8].try_into().ok()?) as f64 / 65536.0;

    let angle_deg = -m10.atan2(m00).to_degrees().round() as i32;
    Some(angle_deg)
}

/// Snaps an angle to one of 0, 90, 180, or 270.
fn normalize_rotation(angle: i32) -> i32 {
    match angle.rem_euclid(360) {
        45..=134 => 90,
        135..=224 => 180,
        225..=315 => 270,
        _ => 0,
    }
}

/// Rotates a tightly packed RGB buffer clockwise by `rotation` degrees.
///
/// Returns the new buffer and its dimensions.
fn rotate_rgb(pixels: Vec<u8>, width: u32, height: u32, rotation: i32) -> (Vec<u8>, u32, u32) {
    let (w, h) = (width as usize, height as usize);
    let src = |x: usize, y: usize| (y * w + x) * 3;
    match rotation {
        90 | 180 | 270 => {}
        _ => return (pixels, width, height),
    }

    let (out_w, out_h) = if rotation == 180 { (w, h) } else { (h, w) };
    let mut out = vec![0u8; pixels.len()];
    for y in 0..out_h {
        for x in 0..out_w {
            let from = match rotation {
                90 => src(y, h - 1 - x),
                180 => src(w - 1 - x, h - 1 - y),
                _ => src(w - 1 - y, x),
            };
            let to = (y * out_w + x) * 3;
            out[to..to + 3].copy_from_slice(&pixels[from..from + 3]);
        }
    }
    (out, out_w as u32, out_h as u32)
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer,
/// dropping per-row stride padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}
