//! Supported segmentation models and their preprocessing parameters
//!
//! All four models are U²-Net variants published as ONNX weight files. They differ in
//! input resolution, normalization and output layout, which is captured in [`ModelInfo`].

use crate::error::{BgRemovalError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Base URL of the published U²-Net ONNX weights
const WEIGHTS_BASE_URL: &str = "https://github.com/danielgatis/rembg/releases/download/v0.0.0";

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Identifier of a pretrained weight set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum ModelId {
    /// General purpose background removal
    #[default]
    #[serde(rename = "u2net")]
    #[cfg_attr(feature = "cli", value(name = "u2net"))]
    U2net,
    /// Lightweight variant, faster but less accurate
    #[serde(rename = "u2netp")]
    #[cfg_attr(feature = "cli", value(name = "u2netp"))]
    U2netp,
    /// Tuned for human segmentation
    #[serde(rename = "u2net_human_seg")]
    #[cfg_attr(feature = "cli", value(name = "u2net_human_seg"))]
    U2netHumanSeg,
    /// Tuned for clothing segmentation
    ///
    /// The upper, lower and full-body classes are merged into one mask (`1 - p(background)`),
    /// so the output is a single cutout of all clothing rather than one image per class.
    #[serde(rename = "u2net_cloth_seg")]
    #[cfg_attr(
        feature = "cli",
        value(
            name = "u2net_cloth_seg",
            help = "Clothing segmentation; all clothing classes merged into one mask"
        )
    )]
    U2netClothSeg,
}

/// How the network output encodes the foreground
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// One saliency channel; the first output is min-max normalized into a mask
    Saliency,
    /// Per-class logits with class 0 as background
    MultiClass {
        /// Number of class channels
        classes: usize,
    },
}

/// Static description of a model's weights and tensor layout
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelInfo {
    pub id: ModelId,
    /// Square input resolution expected by the network
    pub input_size: u32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
    pub output: OutputKind,
    pub description: &'static str,
}

impl ModelId {
    /// All supported models in listing order
    pub const ALL: [Self; 4] = [
        Self::U2net,
        Self::U2netp,
        Self::U2netHumanSeg,
        Self::U2netClothSeg,
    ];

    /// Identifier string used on the wire and on the command line
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::U2net => "u2net",
            Self::U2netp => "u2netp",
            Self::U2netHumanSeg => "u2net_human_seg",
            Self::U2netClothSeg => "u2net_cloth_seg",
        }
    }

    /// Human readable description shown by `/models` and `--list-models`
    #[must_use]
    pub fn description(self) -> &'static str {
        self.info().description
    }

    /// Name of the weight file inside the model cache
    #[must_use]
    pub fn file_name(self) -> String {
        format!("{}.onnx", self.as_str())
    }

    /// Download location of the weight file
    #[must_use]
    pub fn download_url(self) -> String {
        format!("{}/{}", WEIGHTS_BASE_URL, self.file_name())
    }

    #[must_use]
    pub fn info(self) -> ModelInfo {
        match self {
            Self::U2net => ModelInfo {
                id: self,
                input_size: 320,
                mean: IMAGENET_MEAN,
                std: IMAGENET_STD,
                output: OutputKind::Saliency,
                description: "General purpose background removal (default)",
            },
            Self::U2netp => ModelInfo {
                id: self,
                input_size: 320,
                mean: IMAGENET_MEAN,
                std: IMAGENET_STD,
                output: OutputKind::Saliency,
                description: "Lightweight version, faster but less accurate",
            },
            Self::U2netHumanSeg => ModelInfo {
                id: self,
                input_size: 320,
                mean: IMAGENET_MEAN,
                std: IMAGENET_STD,
                output: OutputKind::Saliency,
                description: "Optimized for human segmentation",
            },
            Self::U2netClothSeg => ModelInfo {
                id: self,
                input_size: 768,
                mean: [0.5, 0.5, 0.5],
                std: [0.5, 0.5, 0.5],
                output: OutputKind::MultiClass { classes: 4 },
                description: "Optimized for clothing segmentation",
            },
        }
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelId {
    type Err = BgRemovalError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|model| model.as_str() == s)
            .ok_or_else(|| BgRemovalError::invalid_input(format!("Unknown model: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display_round_trip() {
        for model in ModelId::ALL {
            assert_eq!(model.as_str().parse::<ModelId>().unwrap(), model);
            assert_eq!(model.to_string(), model.as_str());
        }
    }

    #[test]
    fn test_unknown_model_is_rejected() {
        let err = "isnet".parse::<ModelId>().unwrap_err();
        assert!(matches!(err, BgRemovalError::InvalidInput(_)));
        assert_eq!(err.to_string(), "Unknown model: isnet");
    }

    #[test]
    fn test_model_metadata() {
        assert_eq!(ModelId::default(), ModelId::U2net);
        assert_eq!(ModelId::U2net.info().input_size, 320);
        assert_eq!(ModelId::U2netClothSeg.info().input_size, 768);
        assert_eq!(
            ModelId::U2netClothSeg.info().output,
            OutputKind::MultiClass { classes: 4 }
        );
        assert_eq!(
            ModelId::U2netp.download_url(),
            "https://github.com/danielgatis/rembg/releases/download/v0.0.0/u2netp.onnx"
        );
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_cloth_model_help_describes_merged_mask() {
        use clap::ValueEnum;

        let value = ModelId::U2netClothSeg.to_possible_value().unwrap();
        assert_eq!(value.get_name(), "u2net_cloth_seg");
        assert!(value.get_help().unwrap().to_string().contains("merged into one mask"));
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&ModelId::U2netHumanSeg).unwrap();
        assert_eq!(json, "\"u2net_human_seg\"");
        let parsed: ModelId = serde_json::from_str("\"u2net_cloth_seg\"").unwrap();
        assert_eq!(parsed, ModelId::U2netClothSeg);
    }
}
