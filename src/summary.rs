use crate::feedback::Criteria;
use std::ops::AddAssign;

/// Frame counts per criterion.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub(crate) struct FrameTally {
    pub(crate) total: u64,
    pub(crate) knee: u64,
    /// Frames where the hip angle and the depth ratio were both good.
    pub(crate) hip: u64,
    pub(crate) back: u64,
}

impl FrameTally {
    pub(crate) fn record(&mut self, criteria: Criteria) {
        self.total += 1;
        self.knee += u64::from(criteria.knees_good);
        self.hip += u64::from(criteria.hips_and_depth_good());
        self.back += u64::from(criteria.back_good);
    }
}

impl AddAssign for FrameTally {
    fn add_assign(&mut self, rhs: Self) {
        self.total += rhs.total;
        self.knee += rhs.knee;
        self.hip += rhs.hip;
        self.back += rhs.back;
    }
}

/// Lifetime counters of one detector.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub(crate) struct Tally {
    pub(crate) attempts: u64,
    pub(crate) perfect: u64,
    pub(crate) imperfect: u64,
    /// Only frames that belonged to perfect repetitions.
    pub(crate) frames: FrameTally,
}

/// `floor(100 * good / total)`, or 0 when there is nothing to divide by.
pub(crate) fn percentage(good: u64, total: u64) -> u64 {
    if total == 0 {
        0
    } else {
        good * 100 / total
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub(crate) struct Summary {
    pub(crate) attempts: u64,
    pub(crate) perfect: u64,
    pub(crate) imperfect: u64,
    pub(crate) knee_percentage: u64,
    pub(crate) hip_percentage: u64,
    pub(crate) back_percentage: u64,
    pub(crate) knee_good_frames: u64,
    pub(crate) hip_good_frames: u64,
    pub(crate) back_good_frames: u64,
    pub(crate) frames_in_perfect_repetitions: u64,
}

impl From<&Tally> for Summary {
    fn from(tally: &Tally) -> Self {
        let FrameTally {
            total,
            knee,
            hip,
            back,
        } = tally.frames;

        Self {
            attempts: tally.attempts,
            perfect: tally.perfect,
            imperfect: tally.imperfect,
            knee_percentage: percentage(knee, total),
            hip_percentage: percentage(hip, total),
            back_percentage: percentage(back, total),
            knee_good_frames: knee,
            hip_good_frames: hip,
            back_good_frames: back,
            frames_in_perfect_repetitions: total,
        }
    }
}
