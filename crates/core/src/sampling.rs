use serde::{Deserialize, Serialize};

/// How finely a video is cut: audio window length and keyframe spacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingParameters {
    pub segment_length_ms: u64,
    pub frame_interval_s: u64,
}

/// (duration strictly greater than, segment length ms, frame interval s), longest first.
const SAMPLING_TABLE: &[(f64, u64, u64)] = &[
    (1200.0, 120_000, 120),
    (900.0, 90_000, 90),
    (600.0, 60_000, 60),
    (300.0, 30_000, 30),
];

const FALLBACK: SamplingParameters = SamplingParameters {
    segment_length_ms: 10_000,
    frame_interval_s: 10,
};

impl SamplingParameters {
    /// Fixed coarse sampling used when the caller asks for a summary.
    pub const SUMMARY_MODE: SamplingParameters = SamplingParameters {
        segment_length_ms: 120_000,
        frame_interval_s: 120,
    };

    /// Pick parameters for a media duration. Zero, negative and NaN durations
    /// land in the finest bucket.
    pub fn derive(duration_seconds: f64) -> Self {
        SAMPLING_TABLE
            .iter()
            .find(|(threshold, _, _)| duration_seconds > *threshold)
            .map(|&(_, segment_length_ms, frame_interval_s)| SamplingParameters {
                segment_length_ms,
                frame_interval_s,
            })
            .unwrap_or(FALLBACK)
    }
}
