//! Per-frame detection types.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Sampling decision attached to every decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FrameTag {
    /// Frame is always sent to the detection oracle.
    MustDetect,
    /// Frame is kept as a candidate between two mandatory frames.
    MaybeInclude,
    /// Frame is dropped immediately.
    Skip,
}

impl FrameTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameTag::MustDetect => "must_detect",
            FrameTag::MaybeInclude => "maybe_include",
            FrameTag::Skip => "skip",
        }
    }

    /// Returns true if the frame should be retained by the sampler.
    pub fn is_retained(&self) -> bool {
        !matches!(self, FrameTag::Skip)
    }
}

/// A pixel-space bounding box (left, top, right, bottom).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BoundingBox {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl BoundingBox {
    /// Create a new bounding box.
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> f64 {
        (self.right - self.left).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.bottom - self.top).max(0.0)
    }

    /// Center point (x, y).
    pub fn center(&self) -> (f64, f64) {
        (
            (self.left + self.right) / 2.0,
            (self.top + self.bottom) / 2.0,
        )
    }

    /// Check the box has positive extent.
    pub fn is_valid(&self) -> bool {
        self.width() > 0.0 && self.height() > 0.0
    }
}

/// A positive detection returned by the detection oracle.
///
/// Absence of a detection is modelled as `Option::<DetectionHit>::None`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DetectionHit {
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    pub confidence: f64,
    pub class_id: u32,
}

impl DetectionHit {
    pub fn new(bbox: BoundingBox, confidence: f64, class_id: u32) -> Self {
        Self {
            bbox,
            confidence,
            class_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_geometry() {
        let bbox = BoundingBox::new(10.0, 20.0, 50.0, 40.0);
        assert_eq!(bbox.width(), 40.0);
        assert_eq!(bbox.height(), 20.0);
        assert_eq!(bbox.center(), (30.0, 30.0));
        assert!(bbox.is_valid());
        assert!(!BoundingBox::new(5.0, 5.0, 5.0, 9.0).is_valid());
    }

    #[test]
    fn test_hit_serializes_box_field() {
        let hit = DetectionHit::new(BoundingBox::new(0.0, 0.0, 1.0, 1.0), 0.9, 0);
        let json = serde_json::to_value(hit).unwrap();
        assert!(json.get("box").is_some());
        assert_eq!(json["class_id"], 0);
    }

    #[test]
    fn test_tag_retention() {
        assert!(FrameTag::MustDetect.is_retained());
        assert!(FrameTag::MaybeInclude.is_retained());
        assert!(!FrameTag::Skip.is_retained());
    }
}
