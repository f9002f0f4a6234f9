//! Script generation: prompt in, ordered scenes out.

use std::sync::Arc;

use reel_models::{
    fit_to_target, validate_script, GenerationMode, Scene, DEFAULT_SCENE_SECS, MAX_SCENE_SECS,
    MIN_SCENE_SECS,
};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{AiError, AiResult, ProviderError};
use crate::provider::{FallbackChain, ScriptProvider};

const NORMAL_SYSTEM_PROMPT: &str = r#"You are a writer for short funny "What if" video clips (7-15 seconds total).
Given a user idea, output a JSON array of 3-5 scenes. Each scene must have:
- "text": one short line of dialogue or narration (max 8 words), funny or absurd
- "durationSec": an integer from 2 to 6
- "visual": one sentence description for image generation (scene, characters, style)
Total duration must be 7-15 seconds. Tone: light, humorous, no preaching.
Output ONLY a valid JSON array, no markdown, no code block."#;

const FAST_SYSTEM_PROMPT: &str = r#"You are a writer for very short funny "What if" video clips.
Given a user idea, output a JSON array with exactly 1 scene. The scene must have:
- "text": one short punchline (max 10 words), funny or absurd
- "durationSec": 5 or 6
- "visual": one sentence description for image generation (scene, characters, style)
Tone: light, humorous, no preaching.
Output ONLY a valid JSON array, no markdown, no code block."#;

/// Turns a prompt into scenes using a ranked chain of text providers.
#[derive(Clone)]
pub struct ScriptGenerator {
    chain: FallbackChain<dyn ScriptProvider>,
}

impl ScriptGenerator {
    pub fn new(chain: FallbackChain<dyn ScriptProvider>) -> Self {
        Self { chain }
    }

    /// Generate scenes for `prompt`.
    ///
    /// With no usable provider the result is a fixed mock script. A
    /// provider answer that is not a JSON array is an error and no further
    /// provider is tried.
    pub async fn generate(&self, prompt: &str, mode: GenerationMode) -> AiResult<Vec<Scene>> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(AiError::invalid_prompt("prompt is empty"));
        }

        let system = system_prompt(mode);
        let user = prompt.to_string();
        let reply = self
            .chain
            .run(|provider: Arc<dyn ScriptProvider>| {
                let user = user.clone();
                async move {
                    let name = provider.name().to_string();
                    provider
                        .complete(system, &user)
                        .await
                        .map(|text| text.map(|t| (name, t)))
                }
            })
            .await?;

        let scenes = match reply {
            Some((provider, text)) => {
                let scenes = parse_script(&text, mode)
                    .map_err(|reason| ProviderError::other(&provider, reason))?;
                info!(provider = %provider, mode = %mode, scenes = scenes.len(), "Script generated");
                scenes
            }
            None => {
                warn!(mode = %mode, "Using mock script");
                mock_scenes(prompt, mode)
            }
        };

        Ok(scenes)
    }
}

pub fn system_prompt(mode: GenerationMode) -> &'static str {
    match mode {
        GenerationMode::Normal => NORMAL_SYSTEM_PROMPT,
        GenerationMode::Fast => FAST_SYSTEM_PROMPT,
    }
}

/// Remove a surrounding ```` ```json ```` fence, if any.
pub fn strip_code_fences(text: &str) -> &str {
    let mut text = text.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // Drop the language tag on the opening line.
        text = match rest.find('\n') {
            Some(newline) if rest[..newline].chars().all(|c| c.is_ascii_alphanumeric()) => {
                &rest[newline + 1..]
            }
            _ => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
        };
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Parse and coerce a provider reply into scenes for `mode`.
///
/// Durations are clamped per scene, then spread so the total fits the
/// mode's target. A reply that still misses it is rejected.
pub fn parse_script(text: &str, mode: GenerationMode) -> Result<Vec<Scene>, String> {
    let body = strip_code_fences(text);
    if body.is_empty() {
        return Err("empty script response".to_string());
    }

    let parsed: Value =
        serde_json::from_str(body).map_err(|e| format!("script is not valid JSON: {e}"))?;
    let Value::Array(entries) = parsed else {
        return Err("script must be a JSON array".to_string());
    };
    if entries.is_empty() {
        return Err("script has no scenes".to_string());
    }

    let allowed = mode.scene_secs();
    let mut scenes: Vec<Scene> = entries
        .iter()
        .take(mode.max_scenes())
        .map(|entry| {
            let mut scene = coerce_scene(entry);
            scene.duration_sec = scene.duration_sec.clamp(*allowed.start(), *allowed.end());
            scene
        })
        .collect();

    fit_to_target(&mut scenes, mode);
    validate_script(&scenes, mode).map_err(|e| e.to_string())?;

    Ok(scenes)
}

fn coerce_scene(entry: &Value) -> Scene {
    Scene {
        text: coerce_text(entry.get("text")),
        duration_sec: coerce_duration(entry.get("durationSec")),
        visual: coerce_text(entry.get("visual")),
    }
}

fn coerce_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn coerce_duration(value: Option<&Value>) -> u32 {
    let seconds = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match seconds {
        Some(s) if s.is_finite() => {
            s.round().clamp(f64::from(MIN_SCENE_SECS), f64::from(MAX_SCENE_SECS)) as u32
        }
        _ => DEFAULT_SCENE_SECS,
    }
}

/// Deterministic script used when no provider is available.
pub fn mock_scenes(prompt: &str, mode: GenerationMode) -> Vec<Scene> {
    match mode {
        GenerationMode::Normal => vec![
            Scene::new("What if...", 3, format!("Scene about: {prompt}, cartoon style, 9:16")),
            Scene::new("Exactly this.", 2, format!("Continuation: {prompt}, bright, vertical")),
            Scene::new("The end.", 2, format!("Final scene: {prompt}, comedy")),
        ],
        GenerationMode::Fast => vec![Scene::new(
            "What if... exactly this.",
            5,
            format!("Scene about: {prompt}, cartoon style, 9:16"),
        )],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorKind;
    use crate::provider::testing::{Reply, Scripted};
    use crate::provider::Capability;
    use reel_models::total_duration;

    fn generator(providers: Vec<Arc<Scripted>>) -> ScriptGenerator {
        let chain = providers
            .into_iter()
            .fold(FallbackChain::new(Capability::Script), |chain, p| {
                chain.with_provider(p as Arc<dyn ScriptProvider>)
            });
        ScriptGenerator::new(chain)
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("```\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("```json[1]```"), "[1]");
        assert_eq!(strip_code_fences("  [1]  "), "[1]");
    }

    #[test]
    fn test_parse_script_coerces_entries() {
        let text = r#"```json
[
  {"text": "Cats rule", "durationSec": 2.6, "visual": "cat king"},
  {"text": 42, "visual": "dog jester"},
  {"text": "Bow", "durationSec": "9", "visual": "throne room"}
]
```"#;
        let scenes = parse_script(text, GenerationMode::Normal).unwrap();
        assert_eq!(scenes.len(), 3);
        assert_eq!(scenes[0].duration_sec, 3);
        assert_eq!(scenes[1].text, "42");
        assert_eq!(scenes[1].duration_sec, DEFAULT_SCENE_SECS);
        assert_eq!(scenes[2].duration_sec, MAX_SCENE_SECS);
    }

    #[test]
    fn test_parse_script_caps_scene_count() {
        let entry = r#"{"text":"a","durationSec":2,"visual":"v"}"#;
        let text = format!("[{}]", vec![entry; 7].join(","));
        assert_eq!(parse_script(&text, GenerationMode::Normal).unwrap().len(), 5);

        let fast = parse_script(&text, GenerationMode::Fast).unwrap();
        assert_eq!(fast.len(), 1);
        assert_eq!(fast[0].duration_sec, 5);
        assert!(validate_script(&fast, GenerationMode::Fast).is_ok());
    }

    #[test]
    fn test_parse_script_stretches_short_total() {
        let text = r#"[{"text":"a","durationSec":2,"visual":"v"},{"text":"b","durationSec":2,"visual":"w"}]"#;
        let scenes = parse_script(text, GenerationMode::Normal).unwrap();
        assert_eq!(scenes.len(), 2);
        assert!(GenerationMode::Normal.target_total_secs().contains(&total_duration(&scenes)));
    }

    #[test]
    fn test_parse_script_shrinks_long_total() {
        let entry = r#"{"text":"a","durationSec":6,"visual":"v"}"#;
        let text = format!("[{}]", vec![entry; 5].join(","));
        let scenes = parse_script(&text, GenerationMode::Normal).unwrap();
        assert_eq!(scenes.len(), 5);
        assert_eq!(total_duration(&scenes), 15);
        assert!(scenes.iter().all(|s| (MIN_SCENE_SECS..=MAX_SCENE_SECS).contains(&s.duration_sec)));
    }

    #[test]
    fn test_parse_script_rejects_unreachable_total() {
        let err = parse_script(r#"[{"text":"a","durationSec":2,"visual":"v"}]"#, GenerationMode::Normal)
            .unwrap_err();
        assert!(err.contains("outside 7..=15"), "{err}");
    }

    #[test]
    fn test_parse_script_rejects_non_array() {
        assert!(parse_script(r#"{"scenes": []}"#, GenerationMode::Normal).is_err());
        assert!(parse_script("[]", GenerationMode::Normal).is_err());
        assert!(parse_script("   ", GenerationMode::Normal).is_err());
        assert!(parse_script("Sure! Here is your script", GenerationMode::Normal).is_err());
    }

    #[test]
    fn test_mock_scenes_shape() {
        let normal = mock_scenes("cats", GenerationMode::Normal);
        assert!(validate_script(&normal, GenerationMode::Normal).is_ok());
        assert!(GenerationMode::Normal.target_total_secs().contains(&total_duration(&normal)));
        assert!(normal[0].visual.contains("cats"));

        let fast = mock_scenes("cats", GenerationMode::Fast);
        assert!(validate_script(&fast, GenerationMode::Fast).is_ok());
        assert!(GenerationMode::Fast.target_total_secs().contains(&total_duration(&fast)));
    }

    #[tokio::test]
    async fn test_no_providers_uses_mock() {
        let scenes = generator(vec![]).generate("cats", GenerationMode::Normal).await.unwrap();
        assert_eq!(scenes, mock_scenes("cats", GenerationMode::Normal));
    }

    #[tokio::test]
    async fn test_quota_then_second_provider() {
        let first = Scripted::new("openai-chat", Reply::Fail(ProviderErrorKind::QuotaExceeded));
        let second = Scripted::new(
            "groq",
            Reply::Text(r#"[{"text":"Hi","durationSec":3,"visual":"v"},{"text":"Yo","durationSec":4,"visual":"w"}]"#.into()),
        );
        let scenes = generator(vec![first, second])
            .generate("cats", GenerationMode::Normal)
            .await
            .unwrap();
        assert_eq!(total_duration(&scenes), 7);
    }

    #[tokio::test]
    async fn test_malformed_output_aborts_chain() {
        let first = Scripted::new("openai-chat", Reply::Text("not json".into()));
        let second = Scripted::new("groq", Reply::Text("[]".into()));
        let err = generator(vec![first, second.clone()])
            .generate("cats", GenerationMode::Normal)
            .await
            .unwrap_err();

        match err {
            AiError::Provider(e) => {
                assert_eq!(e.provider, "openai-chat");
                assert_eq!(e.kind, ProviderErrorKind::Other);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(second.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_prompt_rejected() {
        let err = generator(vec![]).generate("   ", GenerationMode::Fast).await.unwrap_err();
        assert!(matches!(err, AiError::InvalidPrompt(_)));
    }
}
