//! Engine Configuration
//!
//! JSON-backed settings the host hands to `AnimationEngine::with_config`.

use std::fs;
use std::path::Path;
use std::rc::Rc;

use serde::Deserialize;

use crate::normalizer::{
    AnimationStyleNormalizer, NoopAnimationStyleNormalizer, WebAnimationsStyleNormalizer,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StyleNormalizerKind {
    Noop,
    #[default]
    WebAnimations,
}

impl StyleNormalizerKind {
    pub fn create(self) -> Rc<dyn AnimationStyleNormalizer> {
        match self {
            StyleNormalizerKind::Noop => Rc::new(NoopAnimationStyleNormalizer),
            StyleNormalizerKind::WebAnimations => Rc::new(WebAnimationsStyleNormalizer),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnimationEngineConfig {
    /// Start with every animation disabled (all transitions finish instantly).
    pub disable_animations: bool,
    pub style_normalizer: StyleNormalizerKind,
}

impl AnimationEngineConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> anyhow::Result<Self> {
        let config: AnimationEngineConfig = serde_json::from_str(content)?;
        Ok(config)
    }
}
