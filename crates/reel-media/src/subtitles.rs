//! SRT subtitle generation from scene timing.

use reel_models::Scene;

/// Build an SRT document with one cue per scene.
///
/// Cue `i` spans from the sum of the preceding durations to that sum plus
/// its own duration.
pub fn generate_srt(scenes: &[Scene]) -> String {
    let mut out = String::new();
    let mut start_ms: u64 = 0;

    for (index, scene) in scenes.iter().enumerate() {
        let end_ms = start_ms + u64::from(scene.duration_sec) * 1000;
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            index + 1,
            format_timestamp(start_ms),
            format_timestamp(end_ms),
            scene.text.trim()
        ));
        start_ms = end_ms;
    }

    out
}

/// Format milliseconds as `HH:MM:SS,mmm`.
pub fn format_timestamp(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1000;
    let millis = ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "00:00:00,000");
        assert_eq!(format_timestamp(3_725_042), "01:02:05,042");
    }

    #[test]
    fn test_generate_srt_cumulative() {
        let scenes = vec![
            Scene::new("What if...", 3, "a"),
            Scene::new("Exactly this.", 2, "b"),
            Scene::new("The end.", 2, "c"),
        ];
        let srt = generate_srt(&scenes);
        assert!(srt.starts_with("1\n00:00:00,000 --> 00:00:03,000\nWhat if...\n\n"));
        assert!(srt.contains("2\n00:00:03,000 --> 00:00:05,000\nExactly this.\n"));
        assert!(srt.contains("3\n00:00:05,000 --> 00:00:07,000\nThe end.\n"));
    }

    #[test]
    fn test_generate_srt_empty() {
        assert!(generate_srt(&[]).is_empty());
    }
}
