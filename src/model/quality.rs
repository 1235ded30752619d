use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    Excellent,
    Good,
    Acceptable,
    Poor,
}

impl QualityLevel {
    /// ≥90 excellent, ≥75 good, ≥60 acceptable, else poor.
    pub fn from_score(score: u32) -> Self {
        match score {
            90..=u32::MAX => Self::Excellent,
            75..=89 => Self::Good,
            60..=74 => Self::Acceptable,
            _ => Self::Poor,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub overall_score: u32,
    pub accessibility_score: u32,
    pub brand_score: u32,
    pub clarity_score: u32,
    #[serde(default)]
    pub issues_found: Vec<String>,
    #[serde(default)]
    pub fixes_applied: Vec<String>,
    pub requires_manual_review: bool,
    pub quality_level: QualityLevel,
}

impl Default for QualityMetrics {
    fn default() -> Self {
        Self {
            overall_score: 100,
            accessibility_score: 100,
            brand_score: 100,
            clarity_score: 100,
            issues_found: Vec::new(),
            fixes_applied: Vec::new(),
            requires_manual_review: false,
            quality_level: QualityLevel::Excellent,
        }
    }
}

/// Aggregate quality tracking for the whole presentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowQualityState {
    pub overall_presentation_score: u32,
    pub total_slides_assessed: u32,
    pub slides_requiring_fixes: u32,
    pub auto_fixes_applied: u32,
    pub manual_review_required: bool,
    #[serde(default)]
    pub quality_gate_failures: Vec<String>,
    #[serde(default)]
    pub quality_improvements: Vec<String>,
}

impl Default for WorkflowQualityState {
    fn default() -> Self {
        Self {
            overall_presentation_score: 100,
            total_slides_assessed: 0,
            slides_requiring_fixes: 0,
            auto_fixes_applied: 0,
            manual_review_required: false,
            quality_gate_failures: Vec::new(),
            quality_improvements: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_level_thresholds() {
        assert_eq!(QualityLevel::from_score(100), QualityLevel::Excellent);
        assert_eq!(QualityLevel::from_score(90), QualityLevel::Excellent);
        assert_eq!(QualityLevel::from_score(89), QualityLevel::Good);
        assert_eq!(QualityLevel::from_score(75), QualityLevel::Good);
        assert_eq!(QualityLevel::from_score(74), QualityLevel::Acceptable);
        assert_eq!(QualityLevel::from_score(60), QualityLevel::Acceptable);
        assert_eq!(QualityLevel::from_score(59), QualityLevel::Poor);
        assert_eq!(QualityLevel::from_score(0), QualityLevel::Poor);
    }
}
