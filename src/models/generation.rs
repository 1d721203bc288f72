use crate::error::GenerationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The render models the provider exposes to us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoModel {
    #[serde(rename = "kling/v2-1-master-text-to-video")]
    Kling,
    #[serde(rename = "wan/2-2-a14b-text-to-video-turbo")]
    Wan,
    #[serde(rename = "sora-2-pro-text-to-video")]
    Sora,
}

impl VideoModel {
    pub const ALL: [VideoModel; 3] = [VideoModel::Kling, VideoModel::Wan, VideoModel::Sora];

    pub fn as_str(&self) -> &'static str {
        match self {
            VideoModel::Kling => "kling/v2-1-master-text-to-video",
            VideoModel::Wan => "wan/2-2-a14b-text-to-video-turbo",
            VideoModel::Sora => "sora-2-pro-text-to-video",
        }
    }

    /// Maximum prompt length in characters.
    pub fn prompt_limit(&self) -> usize {
        match self {
            VideoModel::Sora => 10_000,
            VideoModel::Kling | VideoModel::Wan => 5_000,
        }
    }
}

impl fmt::Display for VideoModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoModel {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VideoModel::ALL
            .into_iter()
            .find(|model| model.as_str() == s)
            .ok_or_else(|| GenerationError::validation("Unsupported model."))
    }
}

/// An enumerated request field: its wire name and the values it accepts.
pub trait Choice: Sized + Copy + 'static {
    const FIELD: &'static str;
    const OPTIONS: &'static [(&'static str, Self)];

    fn from_wire(value: &str) -> Option<Self> {
        Self::OPTIONS
            .iter()
            .find(|(wire, _)| *wire == value)
            .map(|(_, choice)| *choice)
    }

    fn wire_values() -> Vec<&'static str> {
        Self::OPTIONS.iter().map(|(wire, _)| *wire).collect()
    }
}

macro_rules! choice_enum {
    ($(#[$meta:meta])* $name:ident, $field:literal { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $wire)] $variant,)+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }
        }

        impl Choice for $name {
            const FIELD: &'static str = $field;
            const OPTIONS: &'static [(&'static str, Self)] = &[$(($wire, $name::$variant)),+];
        }
    };
}

choice_enum!(KlingDuration, "duration" { Five => "5", Ten => "10" });

choice_enum!(AspectRatio, "aspect_ratio" {
    Widescreen => "16:9",
    Vertical => "9:16",
    Square => "1:1",
});

choice_enum!(WanResolution, "resolution" {
    P480 => "480p",
    P580 => "580p",
    P720 => "720p",
});

choice_enum!(Acceleration, "acceleration" { Off => "none", Regular => "regular" });

choice_enum!(
    /// Sora only distinguishes orientation, not an exact ratio.
    SoraAspectRatio, "aspect_ratio" { Portrait => "portrait", Landscape => "landscape" }
);

choice_enum!(SoraFrames, "n_frames" { Ten => "10", Fifteen => "15" });

choice_enum!(SoraSize, "size" { Standard => "standard", High => "high" });

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KlingInput {
    pub prompt: String,
    pub duration: KlingDuration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<AspectRatio>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cfg_scale: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WanInput {
    pub prompt: String,
    pub resolution: WanResolution,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<AspectRatio>,
    pub enable_prompt_expansion: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u32>,
    pub acceleration: Acceleration,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoraInput {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<SoraAspectRatio>,
    pub n_frames: SoraFrames,
    pub size: SoraSize,
    pub remove_watermark: bool,
}

/// Validated, provider-ready parameters; one variant per model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ModelInput {
    Kling(KlingInput),
    Wan(WanInput),
    Sora(SoraInput),
}

impl ModelInput {
    pub fn model(&self) -> VideoModel {
        match self {
            ModelInput::Kling(_) => VideoModel::Kling,
            ModelInput::Wan(_) => VideoModel::Wan,
            ModelInput::Sora(_) => VideoModel::Sora,
        }
    }

    pub fn prompt(&self) -> &str {
        match self {
            ModelInput::Kling(input) => &input.prompt,
            ModelInput::Wan(input) => &input.prompt,
            ModelInput::Sora(input) => &input.prompt,
        }
    }
}

/// A submission that has passed validation. The model is derived from the
/// input variant so the two cannot disagree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    model: VideoModel,
    input: ModelInput,
}

impl GenerationRequest {
    pub fn new(input: ModelInput) -> Self {
        Self {
            model: input.model(),
            input,
        }
    }

    pub fn model(&self) -> VideoModel {
        self.model
    }

    pub fn input(&self) -> &ModelInput {
        &self.input
    }
}

/// Body accepted by `POST /generations`, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawGenerationRequest {
    #[serde(default)]
    pub model: Option<serde_json::Value>,
    #[serde(default)]
    pub input: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_model_ids_roundtrip_through_from_str() {
        for model in VideoModel::ALL {
            assert_eq!(model.as_str().parse::<VideoModel>().unwrap(), model);
        }
        assert!("veo-3".parse::<VideoModel>().is_err());
    }

    #[test]
    fn test_prompt_limits() {
        assert_eq!(VideoModel::Sora.prompt_limit(), 10_000);
        assert_eq!(VideoModel::Kling.prompt_limit(), 5_000);
        assert_eq!(VideoModel::Wan.prompt_limit(), 5_000);
    }

    #[test]
    fn test_choice_lookup() {
        assert_eq!(AspectRatio::from_wire("9:16"), Some(AspectRatio::Vertical));
        assert_eq!(AspectRatio::from_wire("4:3"), None);
        assert_eq!(WanResolution::wire_values(), vec!["480p", "580p", "720p"]);
        assert_eq!(SoraFrames::FIELD, "n_frames");
    }

    #[test]
    fn test_request_serializes_without_absent_fields() {
        let request = GenerationRequest::new(ModelInput::Kling(KlingInput {
            prompt: "a fox".into(),
            duration: KlingDuration::Five,
            aspect_ratio: None,
            negative_prompt: None,
            cfg_scale: Some(0.5),
        }));
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "model": "kling/v2-1-master-text-to-video",
                "input": { "prompt": "a fox", "duration": "5", "cfg_scale": 0.5 }
            })
        );
    }
}
