//! Scene definitions produced by the script generator.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use thiserror::Error;

/// Shortest allowed scene, in whole seconds.
pub const MIN_SCENE_SECS: u32 = 2;

/// Longest allowed scene, in whole seconds.
pub const MAX_SCENE_SECS: u32 = 6;

/// Duration assumed when a script entry omits one.
pub const DEFAULT_SCENE_SECS: u32 = 2;

/// Upper bound on scenes per clip.
pub const MAX_SCENES: usize = 5;

/// One narrated segment of the output video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    /// Narration line
    pub text: String,
    /// Scene length in whole seconds
    pub duration_sec: u32,
    /// Description handed to the image generator
    pub visual: String,
}

impl Scene {
    pub fn new(text: impl Into<String>, duration_sec: u32, visual: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            duration_sec,
            visual: visual.into(),
        }
    }
}

/// Sum of scene durations in seconds.
pub fn total_duration(scenes: &[Scene]) -> u32 {
    scenes.iter().map(|s| s.duration_sec).sum()
}

/// Script shape requested from the providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// 3–5 scenes, 7–15 seconds total
    #[default]
    Normal,
    /// Exactly one scene of 5–6 seconds
    Fast,
}

impl GenerationMode {
    pub fn from_fast_flag(fast: bool) -> Self {
        if fast {
            Self::Fast
        } else {
            Self::Normal
        }
    }

    pub fn is_fast(&self) -> bool {
        matches!(self, Self::Fast)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Fast => "fast",
        }
    }

    /// Target total clip length in seconds.
    pub fn target_total_secs(&self) -> RangeInclusive<u32> {
        match self {
            Self::Normal => 7..=15,
            Self::Fast => 5..=6,
        }
    }

    /// Allowed per-scene duration in seconds.
    pub fn scene_secs(&self) -> RangeInclusive<u32> {
        match self {
            Self::Normal => MIN_SCENE_SECS..=MAX_SCENE_SECS,
            Self::Fast => 5..=MAX_SCENE_SECS,
        }
    }

    /// Maximum number of scenes kept from a script.
    pub fn max_scenes(&self) -> usize {
        match self {
            Self::Normal => MAX_SCENES,
            Self::Fast => 1,
        }
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structural problems with a scene list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptShapeError {
    #[error("script has no scenes")]
    Empty,

    #[error("script has {count} scenes, at most {max} allowed")]
    TooManyScenes { count: usize, max: usize },

    #[error("scene {index} lasts {duration}s, outside {min}..={max}s")]
    DurationOutOfRange {
        index: usize,
        duration: u32,
        min: u32,
        max: u32,
    },

    #[error("script lasts {total}s, outside {min}..={max}s")]
    TotalOutOfRange { total: u32, min: u32, max: u32 },
}

/// Spread one-second adjustments over the scenes until the total lands in
/// the mode's target range.
///
/// Short scripts grow their shortest scene, long scripts shrink their
/// longest, never leaving the per-scene range. A scene count that cannot
/// reach the target is left as close as it gets.
pub fn fit_to_target(scenes: &mut [Scene], mode: GenerationMode) {
    let per_scene = mode.scene_secs();
    let target = mode.target_total_secs();
    let mut total = total_duration(scenes);

    while total < *target.start() {
        let Some(scene) = scenes
            .iter_mut()
            .min_by_key(|s| s.duration_sec)
            .filter(|s| s.duration_sec < *per_scene.end())
        else {
            break;
        };
        scene.duration_sec += 1;
        total += 1;
    }

    while total > *target.end() {
        let Some(scene) = scenes
            .iter_mut()
            .rev()
            .max_by_key(|s| s.duration_sec)
            .filter(|s| s.duration_sec > *per_scene.start())
        else {
            break;
        };
        scene.duration_sec -= 1;
        total -= 1;
    }
}

/// Check scene count, per-scene durations and total length for a mode.
pub fn validate_script(scenes: &[Scene], mode: GenerationMode) -> Result<(), ScriptShapeError> {
    if scenes.is_empty() {
        return Err(ScriptShapeError::Empty);
    }
    if scenes.len() > mode.max_scenes() {
        return Err(ScriptShapeError::TooManyScenes {
            count: scenes.len(),
            max: mode.max_scenes(),
        });
    }
    let allowed = mode.scene_secs();
    for (index, scene) in scenes.iter().enumerate() {
        if !allowed.contains(&scene.duration_sec) {
            return Err(ScriptShapeError::DurationOutOfRange {
                index,
                duration: scene.duration_sec,
                min: *allowed.start(),
                max: *allowed.end(),
            });
        }
    }
    let target = mode.target_total_secs();
    let total = total_duration(scenes);
    if !target.contains(&total) {
        return Err(ScriptShapeError::TotalOutOfRange {
            total,
            min: *target.start(),
            max: *target.end(),
        });
    }
    Ok(())
}
