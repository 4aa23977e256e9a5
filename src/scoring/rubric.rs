//! ETS speaking rubric: per-task levels and the section score conversion.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Level {
    pub score: u8,
    pub label: &'static str,
    pub short: &'static str,
    pub description: &'static str,
}

pub const LEVELS: [Level; 5] = [
    Level {
        score: 0,
        label: "0 points",
        short: "No response / off topic / not English",
        description: "No attempt, entirely off topic, or not answered in English.",
    },
    Level {
        score: 1,
        label: "1 point",
        short: "Seriously deficient",
        description: "Does not effectively address the task. Hard to understand or very little content; serious problems with coherence, development or language.",
    },
    Level {
        score: 2,
        label: "2 points",
        short: "Clearly limited",
        description: "Partially addresses the task. Limited clarity; content or reasoning is underdeveloped; noticeable language problems that may obscure meaning.",
    },
    Level {
        score: 3,
        label: "3 points",
        short: "Generally adequate",
        description: "Generally addresses the task. Mostly clear and coherent with adequate development; some problems with expression, grammar or fluency that do not seriously affect understanding.",
    },
    Level {
        score: 4,
        label: "4 points",
        short: "Fully addressed",
        description: "Fully addresses the task. Clear and fluent; well developed and coherent; only minor errors that do not affect understanding.",
    },
];

/// Section score (0-30) for each raw total (0-16) of the four tasks.
const RAW_TO_SCALED: [u8; 17] = [0, 8, 14, 18, 22, 24, 26, 27, 28, 28, 29, 29, 30, 30, 30, 30, 30];

/// Convert a raw total to the section scale. Input is rounded and clamped to 0-16.
pub fn raw_to_scaled(raw_total: f64) -> u8 {
    if raw_total.is_nan() {
        return 0;
    }
    let raw = raw_total.round().clamp(0.0, 16.0) as usize;
    RAW_TO_SCALED[raw]
}

#[derive(Debug, Serialize)]
pub struct Conversion {
    pub raw: u8,
    pub scaled: u8,
}

#[derive(Debug, Serialize)]
pub struct Rubric {
    pub levels: &'static [Level],
    pub conversion: Vec<Conversion>,
}

pub fn rubric() -> Rubric {
    Rubric {
        levels: &LEVELS,
        conversion: (0u8..=16)
            .map(|raw| Conversion {
                raw,
                scaled: RAW_TO_SCALED[raw as usize],
            })
            .collect(),
    }
}
