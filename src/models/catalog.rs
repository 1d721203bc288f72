use super::generation::VideoModel;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub provider: String,
    pub description: String,
    pub tags: Vec<String>,
    pub prompt_limit: usize,
}

impl ModelInfo {
    pub fn for_model(model: VideoModel) -> Self {
        let (name, description, tags): (&str, &str, &[&str]) = match model {
            VideoModel::Kling => (
                "Kling v2.1",
                "Cinematic output with negative prompts and CFG tuning.",
                &["Duration", "CFG", "Negative prompt"],
            ),
            VideoModel::Wan => (
                "Wan 2.2 Turbo",
                "Fast renders with resolution and seed controls.",
                &["Resolution", "Seed", "Acceleration"],
            ),
            VideoModel::Sora => (
                "Sora 2 Pro",
                "High-fidelity storytelling with frame and size control.",
                &["Frames", "Size", "Watermark"],
            ),
        };

        Self {
            id: model.as_str().to_string(),
            name: name.to_string(),
            provider: "kie.ai".to_string(),
            description: description.to_string(),
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
            prompt_limit: model.prompt_limit(),
        }
    }
}

pub fn supported_models() -> Vec<ModelInfo> {
    VideoModel::ALL.into_iter().map(ModelInfo::for_model).collect()
}
