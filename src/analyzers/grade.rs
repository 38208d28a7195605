use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Excellent,
    Good,
    Fair,
    Poor,
    Critical,
}

/// Converts a `[0, 100]` score into a display band.
///
/// | Range  | Band      |
/// |--------|-----------|
/// | >= 90  | excellent |
/// | >= 80  | good      |
/// | >= 70  | fair      |
/// | >= 60  | poor      |
/// | < 60   | critical  |
pub fn grade(score: u8) -> Band {
    match score {
        s if s >= 90 => Band::Excellent,
        s if s >= 80 => Band::Good,
        s if s >= 70 => Band::Fair,
        s if s >= 60 => Band::Poor,
        _ => Band::Critical,
    }
}
