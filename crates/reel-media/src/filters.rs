//! FFmpeg filter graphs and output constants for vertical scene videos.

use std::path::Path;

/// Output frame width in pixels.
pub const OUTPUT_WIDTH: u32 = 1080;

/// Output frame height in pixels.
pub const OUTPUT_HEIGHT: u32 = 1920;

/// Output frame rate.
pub const FRAME_RATE: u32 = 30;

pub const PIXEL_FORMAT: &str = "yuv420p";
pub const VIDEO_CODEC: &str = "libx264";
pub const AUDIO_CODEC: &str = "aac";

/// Narration is resampled to this rate before muxing.
pub const AUDIO_SAMPLE_RATE: u32 = 44_100;

/// Scale a still into the frame preserving aspect ratio, then center-pad.
pub fn fit_and_pad() -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,\
         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,\
         setsar=1,\
         format={PIXEL_FORMAT}",
        w = OUTPUT_WIDTH,
        h = OUTPUT_HEIGHT,
    )
}

/// Filter graph that pads `count` looped image inputs and concatenates
/// them in input order into `[outv]`.
pub fn silent_concat_graph(count: usize) -> String {
    let fit = fit_and_pad();
    let mut graph = String::new();

    for i in 0..count {
        graph.push_str(&format!("[{i}:v]{fit}[v{i}];"));
    }
    for i in 0..count {
        graph.push_str(&format!("[v{i}]"));
    }
    graph.push_str(&format!("concat=n={count}:v=1:a=0[outv]"));

    graph
}

/// Filter graph for one narrated segment: input 0 is the looped image,
/// input 1 the narration. Audio is trimmed to `duration` and padded
/// with silence when shorter.
pub fn segment_graph(duration: u32) -> String {
    format!(
        "[0:v]{fit}[v];[1:a]aresample={AUDIO_SAMPLE_RATE},atrim=0:{duration},apad=whole_dur={duration}[a]",
        fit = fit_and_pad(),
    )
}

/// One line of a concat-demuxer list file.
pub fn concat_list_entry(path: &Path) -> String {
    let escaped = path
        .to_string_lossy()
        .replace('\\', "\\\\")
        .replace('\'', "'\\''");
    format!("file '{escaped}'")
}
