use std::collections::HashMap;

use crate::app::config::AlertConfig;
use crate::pipeline::Detections;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct DetectionSummary {
    /// <class name, instance count>
    pub per_class: HashMap<String, u32>,
    pub high_confidence: u32,
    pub low_confidence: u32,
    pub normal_confidence: u32,
}

pub fn summarize_detections(dets: &Detections, alerts: &AlertConfig) -> DetectionSummary {
    let mut summary = DetectionSummary::default();
    for det in dets {
        *summary.per_class.entry(det.class_name.clone()).or_insert(0) += 1;
        if det.confidence > alerts.high_threshold {
            summary.high_confidence += 1;
        } else if det.confidence < alerts.low_threshold {
            summary.low_confidence += 1;
        } else {
            summary.normal_confidence += 1;
        }
    }
    summary
}

/// Logs one line per detection plus the totals. Low confidence detections
/// are logged as warnings.
pub fn log_detections(dets: &Detections, alerts: &AlertConfig) -> DetectionSummary {
    for det in dets {
        let percent = det.confidence * 100.0;
        if det.confidence < alerts.low_threshold {
            tracing::warn!(class = %det.class_name, "low confidence detection: {percent:.1}%");
        } else if det.confidence > alerts.high_threshold {
            tracing::info!(class = %det.class_name, "high confidence detection: {percent:.1}%");
        } else {
            tracing::debug!(class = %det.class_name, "detection: {percent:.1}%");
        }
    }
    let summary = summarize_detections(dets, alerts);
    tracing::info!(
        total = dets.len(),
        high = summary.high_confidence,
        low = summary.low_confidence,
        classes = ?summary.per_class,
        "detection summary"
    );
    summary
}
