use crate::models::{ExperienceLevel, MetricSnapshot};

pub const EXPERIENCE_PER_LEVEL: f64 = 100.0;

impl ExperienceLevel {
    pub fn from_total(total_experience: f64) -> ExperienceLevel {
        let level = (total_experience / EXPERIENCE_PER_LEVEL).floor() as u32 + 1;
        let progress = total_experience % EXPERIENCE_PER_LEVEL;
        ExperienceLevel {
            level,
            progress,
            progress_percent: progress / EXPERIENCE_PER_LEVEL * 100.0,
        }
    }
}

/// Experience earned by one period snapshot: a tenth of its numeric values.
pub fn experience_from_metrics(metrics: &MetricSnapshot) -> f64 {
    metrics.numeric_values().map(|(_, value)| value).sum::<f64>() / 10.0
}

/// Experience to add for a period snapshot, given what the period has already
/// awarded. The award is a high-water mark: lowering values and raising them
/// back never pays out twice. Never negative.
pub fn experience_gain(awarded: f64, current: &MetricSnapshot) -> f64 {
    (experience_from_metrics(current) - awarded).max(0.0)
}
