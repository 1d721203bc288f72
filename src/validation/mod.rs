pub mod fields;

use crate::error::{GenerationError, Result};
use crate::models::{
    Acceleration, AspectRatio, GenerationRequest, KlingDuration, KlingInput, ModelInput,
    RawGenerationRequest, SoraAspectRatio, SoraFrames, SoraInput, SoraSize, VideoModel,
    WanInput, WanResolution,
};
use fields::{
    bounded_integer, bounded_number, choice, optional_boolean, optional_string, required_string,
};
use serde_json::{Map, Value};

const NEGATIVE_PROMPT_MAX: usize = 500;
const SEED_MAX: i64 = 2_147_483_647;

/// Decode a `{ model, input }` body and validate it. A body that is not an
/// object carries no model at all.
pub fn normalize_body(body: &Value) -> Result<GenerationRequest> {
    let raw = match body {
        Value::Object(_) => serde_json::from_value::<RawGenerationRequest>(body.clone())?,
        _ => RawGenerationRequest::default(),
    };
    normalize_raw(&raw)
}

pub fn normalize_raw(raw: &RawGenerationRequest) -> Result<GenerationRequest> {
    let model = match &raw.model {
        Some(Value::String(model)) => model.as_str(),
        _ => return Err(GenerationError::validation("Unsupported model.")),
    };
    let empty = Value::Object(Map::new());
    normalize(model, raw.input.as_ref().unwrap_or(&empty))
}

/// Validate `input` against the parameter set of `model`. Fields the model
/// does not know are dropped.
pub fn normalize(model: &str, input: &Value) -> Result<GenerationRequest> {
    let model: VideoModel = model.parse()?;
    let fields = input.as_object();
    let get = |name: &str| fields.and_then(|map| map.get(name));

    let prompt = required_string(get("prompt"), "prompt", model.prompt_limit())?;

    let input = match model {
        VideoModel::Kling => ModelInput::Kling(KlingInput {
            prompt,
            duration: choice(get("duration"), Some(KlingDuration::Five))?
                .unwrap_or(KlingDuration::Five),
            aspect_ratio: choice::<AspectRatio>(get("aspect_ratio"), None)?,
            negative_prompt: optional_string(
                get("negative_prompt"),
                "negative_prompt",
                NEGATIVE_PROMPT_MAX,
            )?,
            cfg_scale: bounded_number(get("cfg_scale"), "cfg_scale", 0.0, 1.0)?,
        }),
        VideoModel::Wan => ModelInput::Wan(WanInput {
            prompt,
            resolution: choice(get("resolution"), Some(WanResolution::P720))?
                .unwrap_or(WanResolution::P720),
            aspect_ratio: choice::<AspectRatio>(get("aspect_ratio"), None)?,
            enable_prompt_expansion: optional_boolean(get("enable_prompt_expansion"), false),
            seed: bounded_integer(get("seed"), "seed", 0, SEED_MAX)?.map(|seed| seed as u32),
            acceleration: choice(get("acceleration"), Some(Acceleration::Off))?
                .unwrap_or(Acceleration::Off),
        }),
        VideoModel::Sora => ModelInput::Sora(SoraInput {
            prompt,
            aspect_ratio: choice::<SoraAspectRatio>(get("aspect_ratio"), None)?,
            n_frames: choice(get("n_frames"), Some(SoraFrames::Ten))?.unwrap_or(SoraFrames::Ten),
            size: choice(get("size"), Some(SoraSize::Standard))?.unwrap_or(SoraSize::Standard),
            remove_watermark: optional_boolean(get("remove_watermark"), true),
        }),
    };

    log::debug!("Normalized input for {}", model);
    Ok(GenerationRequest::new(input))
}
