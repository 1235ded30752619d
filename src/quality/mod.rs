//! Quality Gate: per-slide assessment (citation validity, brand
//! compliance, accessibility, content bounds) and aggregate scoring.

mod cv;

pub use cv::{ContrastReport, CvClient, FakeCvClient, HttpCvClient};

use serde_json::Value;

use crate::model::{QualityLevel, QualityMetrics, Slide, WorkflowQualityState, WorkflowState};

const MANUAL_REVIEW_THRESHOLD: u32 = 60;
const BRAND_DELTA_E_TOLERANCE: f64 = 15.0;
const MIN_BULLETS: usize = 2;
const MAX_BULLETS: usize = 5;
const MAX_TITLE_WORDS: usize = 8;
const MAX_BULLET_WORDS: usize = 12;

pub struct QualityGate<'a> {
    cv_client: &'a dyn CvClient,
}

/// One slide's worth of checks plus the resulting metrics.
pub struct SlideAssessment {
    pub slide_id: crate::ids::SlideId,
    pub metrics: QualityMetrics,
}

impl<'a> QualityGate<'a> {
    pub fn new(cv_client: &'a dyn CvClient) -> Self {
        Self { cv_client }
    }

    /// Assesses every slide in `state`, returning per-slide metrics and
    /// the recomputed aggregate `WorkflowQualityState`. Does not mutate
    /// `state`; the caller applies the result via a mutation.
    pub async fn assess(&self, state: &WorkflowState) -> (Vec<SlideAssessment>, WorkflowQualityState) {
        let brand_palette = brand_palette_from_metadata(&state.metadata);

        let mut assessments = Vec::with_capacity(state.slides.len());
        for slide in &state.slides {
            let metrics = self.assess_slide(state, slide, brand_palette.as_deref()).await;
            assessments.push(SlideAssessment {
                slide_id: slide.id.clone(),
                metrics,
            });
        }

        let aggregate = aggregate_quality_state(&assessments);
        (assessments, aggregate)
    }

    async fn assess_slide(&self, state: &WorkflowState, slide: &Slide, brand_palette: Option<&[String]>) -> QualityMetrics {
        let mut issues = Vec::new();

        let citation_validity = self.check_citations(state, slide, &mut issues);
        let brand_score = self.check_brand(slide, brand_palette, &mut issues);
        let accessibility_score = self.check_accessibility(slide, &mut issues).await;
        let clarity_score = self.check_content_bounds(slide, &mut issues);

        let overall_score = (0.3 * accessibility_score as f64
            + 0.3 * brand_score as f64
            + 0.2 * clarity_score as f64
            + 0.2 * citation_validity as f64)
            .round() as u32;

        let requires_manual_review = overall_score < MANUAL_REVIEW_THRESHOLD;

        QualityMetrics {
            overall_score,
            accessibility_score,
            brand_score,
            clarity_score,
            issues_found: issues,
            fixes_applied: Vec::new(),
            requires_manual_review,
            quality_level: QualityLevel::from_score(overall_score),
        }
    }

    fn check_citations(&self, state: &WorkflowState, slide: &Slide, issues: &mut Vec<String>) -> u32 {
        let known = match &slide.section_id {
            Some(section_id) => state.rag.known_chunk_keys_for_section(section_id),
            None => state.rag.known_chunk_keys(),
        };
        let missing: Vec<&crate::ids::ChunkKey> = slide.citations.iter().filter(|c| !known.contains(c)).collect();
        for chunk_key in &missing {
            issues.push(format!("citation {} does not resolve to a known chunk", chunk_key));
        }
        100u32.saturating_sub(10 * missing.len() as u32)
    }

    fn check_brand(&self, slide: &Slide, brand_palette: Option<&[String]>, issues: &mut Vec<String>) -> u32 {
        let Some(palette) = brand_palette else {
            return 100;
        };
        let Some(Value::Array(colors)) = slide.design.get("colors") else {
            return 100;
        };

        let mut violations = 0u32;
        for color in colors {
            if let Some(hex) = color.as_str() {
                let within_tolerance = palette
                    .iter()
                    .any(|brand_hex| color_delta_e(hex, brand_hex) <= BRAND_DELTA_E_TOLERANCE);
                if !within_tolerance {
                    violations += 1;
                    issues.push(format!("color {hex} exceeds brand tolerance"));
                }
            }
        }
        100u32.saturating_sub(15 * violations)
    }

    async fn check_accessibility(&self, slide: &Slide, issues: &mut Vec<String>) -> u32 {
        let report = self.cv_client.assess_contrast(slide).await;
        let body_ok = report.body_text_ratio >= 4.5;
        let large_ok = report.large_text_ratio >= 3.0;
        if !body_ok {
            issues.push(format!("body text contrast {:.2} below 4.5", report.body_text_ratio));
        }
        if !large_ok {
            issues.push(format!("large text contrast {:.2} below 3.0", report.large_text_ratio));
        }
        if body_ok && large_ok {
            100
        } else {
            0
        }
    }

    fn check_content_bounds(&self, slide: &Slide, issues: &mut Vec<String>) -> u32 {
        let mut score = 100u32;

        if !(MIN_BULLETS..=MAX_BULLETS).contains(&slide.content.len()) {
            score = score.saturating_sub(20);
            issues.push(format!("bullet count {} outside [2,5]", slide.content.len()));
        }

        let title_words = slide.title.split_whitespace().count();
        if title_words > MAX_TITLE_WORDS {
            score = score.saturating_sub(15);
            issues.push(format!("title word count {title_words} exceeds {MAX_TITLE_WORDS}"));
        }

        for bullet in &slide.content {
            let words = bullet.split_whitespace().count();
            if words > MAX_BULLET_WORDS {
                score = score.saturating_sub(10);
                issues.push(format!("bullet exceeds {MAX_BULLET_WORDS} words: \"{bullet}\""));
            }
        }

        score
    }
}

fn brand_palette_from_metadata(metadata: &std::collections::HashMap<String, Value>) -> Option<Vec<String>> {
    let palette = metadata.get("brand_palette")?;
    let Value::Array(colors) = palette else {
        return None;
    };
    Some(colors.iter().filter_map(|c| c.as_str().map(str::to_string)).collect())
}

/// Rough perceptual color distance between two `#rrggbb` hex colors.
/// Not a true CIE Delta-E; a Euclidean approximation in RGB space,
/// adequate for a ±tolerance brand check.
fn color_delta_e(a: &str, b: &str) -> f64 {
    let (Some(a), Some(b)) = (parse_hex_rgb(a), parse_hex_rgb(b)) else {
        return f64::MAX;
    };
    let dr = a.0 as f64 - b.0 as f64;
    let dg = a.1 as f64 - b.1 as f64;
    let db = a.2 as f64 - b.2 as f64;
    (dr * dr + dg * dg + db * db).sqrt()
}

fn parse_hex_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some((r, g, b))
}

fn aggregate_quality_state(assessments: &[SlideAssessment]) -> WorkflowQualityState {
    if assessments.is_empty() {
        return WorkflowQualityState::default();
    }

    let total = assessments.len() as u32;
    let sum: u32 = assessments.iter().map(|a| a.metrics.overall_score).sum();
    let overall_presentation_score = sum / total;
    let slides_requiring_fixes = assessments.iter().filter(|a| !a.metrics.issues_found.is_empty()).count() as u32;
    let manual_review_required =
        overall_presentation_score < MANUAL_REVIEW_THRESHOLD || assessments.iter().any(|a| a.metrics.requires_manual_review);

    let quality_gate_failures = assessments
        .iter()
        .filter(|a| a.metrics.requires_manual_review)
        .map(|a| format!("slide {} scored {}", a.slide_id, a.metrics.overall_score))
        .collect();

    WorkflowQualityState {
        overall_presentation_score,
        total_slides_assessed: total,
        slides_requiring_fixes,
        auto_fixes_applied: 0,
        manual_review_required,
        quality_gate_failures,
        quality_improvements: Vec::new(),
    }
}
