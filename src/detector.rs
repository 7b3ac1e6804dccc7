use crate::{
    error::Error,
    feedback::{self, Checkpoints, Criteria},
    geometry::Measurements,
    pose::{Frame, Keypoint},
    summary::{FrameTally, Summary, Tally},
};
use rand::Rng;
use tracing::{debug, info};

const DEFAULT_STANDING_KNEE_ANGLE: &str = "130";
const DEFAULT_SQUATTING_KNEE_ANGLE: &str = "120";
const DEFAULT_KNEE_MIN: &str = "50";
const DEFAULT_KNEE_MAX: &str = "110";
const DEFAULT_HIP_MIN: &str = "60";
const DEFAULT_HIP_MAX: &str = "120";
const DEFAULT_MIN_DEPTH_RATIO: &str = "0.85";
const DEFAULT_BACK_LEAN_MIN: &str = "0";
const DEFAULT_BACK_LEAN_MAX: &str = "45";
const DEFAULT_SUFFICIENT_DEPTH_KNEE_ANGLE: &str = "110";

/// How often, in frames, a measurement snapshot is logged.
const LOG_EVERY_N_FRAMES: u64 = 30;

/// Angle limits, in degrees unless noted, used to grade a squat.
#[derive(Debug, Clone, Copy, PartialEq, structopt::StructOpt)]
pub(crate) struct Thresholds {
    /// Average knee angle at or above which the lifter is standing.
    #[structopt(long, default_value = DEFAULT_STANDING_KNEE_ANGLE)]
    pub(crate) standing_knee_angle: f32,
    /// Average knee angle below which the lifter is squatting.
    #[structopt(long, default_value = DEFAULT_SQUATTING_KNEE_ANGLE)]
    pub(crate) squatting_knee_angle: f32,
    #[structopt(long, default_value = DEFAULT_KNEE_MIN)]
    pub(crate) knee_min: f32,
    #[structopt(long, default_value = DEFAULT_KNEE_MAX)]
    pub(crate) knee_max: f32,
    #[structopt(long, default_value = DEFAULT_HIP_MIN)]
    pub(crate) hip_min: f32,
    #[structopt(long, default_value = DEFAULT_HIP_MAX)]
    pub(crate) hip_max: f32,
    /// Minimum hip-to-knee height ratio.
    #[structopt(long, default_value = DEFAULT_MIN_DEPTH_RATIO)]
    pub(crate) min_depth_ratio: f32,
    #[structopt(long, default_value = DEFAULT_BACK_LEAN_MIN)]
    pub(crate) back_lean_min: f32,
    #[structopt(long, default_value = DEFAULT_BACK_LEAN_MAX)]
    pub(crate) back_lean_max: f32,
    /// The lowest knee angle of a repetition must be below this to count.
    #[structopt(long, default_value = DEFAULT_SUFFICIENT_DEPTH_KNEE_ANGLE)]
    pub(crate) sufficient_depth_knee_angle: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            standing_knee_angle: DEFAULT_STANDING_KNEE_ANGLE.parse().unwrap(),
            squatting_knee_angle: DEFAULT_SQUATTING_KNEE_ANGLE.parse().unwrap(),
            knee_min: DEFAULT_KNEE_MIN.parse().unwrap(),
            knee_max: DEFAULT_KNEE_MAX.parse().unwrap(),
            hip_min: DEFAULT_HIP_MIN.parse().unwrap(),
            hip_max: DEFAULT_HIP_MAX.parse().unwrap(),
            min_depth_ratio: DEFAULT_MIN_DEPTH_RATIO.parse().unwrap(),
            back_lean_min: DEFAULT_BACK_LEAN_MIN.parse().unwrap(),
            back_lean_max: DEFAULT_BACK_LEAN_MAX.parse().unwrap(),
            sufficient_depth_knee_angle: DEFAULT_SUFFICIENT_DEPTH_KNEE_ANGLE.parse().unwrap(),
        }
    }
}

impl Thresholds {
    /// Reject non-finite values and inverted bands or ranges.
    pub(crate) fn validate(&self) -> Result<(), Error> {
        [
            ("standing knee angle", self.standing_knee_angle),
            ("squatting knee angle", self.squatting_knee_angle),
            ("knee min", self.knee_min),
            ("knee max", self.knee_max),
            ("hip min", self.hip_min),
            ("hip max", self.hip_max),
            ("min depth ratio", self.min_depth_ratio),
            ("back lean min", self.back_lean_min),
            ("back lean max", self.back_lean_max),
            ("sufficient depth knee angle", self.sufficient_depth_knee_angle),
        ]
        .iter()
        .try_for_each(|&(name, value)| {
            if value.is_finite() {
                Ok(())
            } else {
                Err(Error::InvalidThreshold { name, value })
            }
        })?;

        if self.standing_knee_angle < self.squatting_knee_angle {
            return Err(Error::InvalidHysteresisBand {
                standing: self.standing_knee_angle,
                squatting: self.squatting_knee_angle,
            });
        }

        [
            ("knee", self.knee_min, self.knee_max),
            ("hip", self.hip_min, self.hip_max),
            ("back lean", self.back_lean_min, self.back_lean_max),
        ]
        .iter()
        .try_for_each(|&(name, min, max)| {
            if min > max {
                Err(Error::InvalidRange { name, min, max })
            } else {
                Ok(())
            }
        })
    }

    pub(crate) fn knees_good(&self, knee_angle: f32) -> bool {
        (self.knee_min..=self.knee_max).contains(&knee_angle)
    }

    pub(crate) fn hips_good(&self, hip_angle: f32) -> bool {
        (self.hip_min..=self.hip_max).contains(&hip_angle)
    }

    pub(crate) fn depth_good(&self, depth_ratio: f32) -> bool {
        depth_ratio >= self.min_depth_ratio
    }

    pub(crate) fn back_good(&self, back_lean: f32) -> bool {
        (self.back_lean_min..=self.back_lean_max).contains(&back_lean)
    }

    pub(crate) fn criteria(&self, measurements: &Measurements) -> Criteria {
        Criteria {
            knees_good: self.knees_good(measurements.knee_angle),
            hips_good: self.hips_good(measurements.hip_angle),
            depth_good: self.depth_good(measurements.depth_ratio),
            back_good: self.back_good(measurements.back_lean),
        }
    }

    /// Decide the state change for one frame. The first matching arm wins.
    pub(crate) fn transition(&self, phase: &Phase, knee_angle: f32) -> Transition {
        let standing = knee_angle >= self.standing_knee_angle;
        let squatting = knee_angle < self.squatting_knee_angle;

        match phase {
            Phase::Standing if squatting => Transition::Start,
            Phase::Squatting(_) if standing => Transition::Complete,
            _ if standing => Transition::Settle,
            _ => Transition::Hold,
        }
    }
}

/// Accumulators of the repetition in progress.
#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) struct Repetition {
    pub(crate) frames: FrameTally,
    pub(crate) min_knee_angle: f32,
    /// Whether any frame so far was lower-body perfect.
    pub(crate) best_form: bool,
}

impl Repetition {
    fn new(knee_angle: f32) -> Self {
        Self {
            frames: FrameTally::default(),
            min_knee_angle: knee_angle,
            best_form: false,
        }
    }

    fn record(&mut self, knee_angle: f32, criteria: Criteria) {
        self.frames.record(criteria);
        if knee_angle < self.min_knee_angle {
            self.min_knee_angle = knee_angle;
        }
        self.best_form |= criteria.lower_body_perfect();
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) enum Phase {
    Standing,
    Squatting(Repetition),
}

impl Phase {
    pub(crate) fn in_repetition(&self) -> bool {
        matches!(self, Self::Squatting(_))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Transition {
    /// Standing, knees bent below the squatting threshold.
    Start,
    /// Squatting, knees back above the standing threshold.
    Complete,
    /// Above the standing threshold with nothing to complete.
    Settle,
    /// Inside the hysteresis band, or squatting without having stood up.
    Hold,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FrameAnalysis {
    pub(crate) pose_detected: bool,
    /// Lower-body perfect on this frame.
    pub(crate) is_squat_position: bool,
    pub(crate) knee_angle: f32,
    pub(crate) hip_angle: f32,
    pub(crate) back_angle: f32,
    pub(crate) hip_depth: f32,
    pub(crate) feedback: String,
    pub(crate) checkpoints: Checkpoints,
}

impl FrameAnalysis {
    pub(crate) fn no_pose() -> Self {
        Self {
            pose_detected: false,
            is_squat_position: false,
            knee_angle: 0.0,
            hip_angle: 0.0,
            back_angle: 0.0,
            hip_depth: 0.0,
            feedback: "No pose detected".to_owned(),
            checkpoints: Checkpoints::new(),
        }
    }

    fn new(measurements: &Measurements, criteria: Criteria, in_repetition: bool) -> Self {
        Self {
            pose_detected: true,
            is_squat_position: criteria.lower_body_perfect(),
            knee_angle: measurements.knee_angle,
            hip_angle: measurements.hip_angle,
            back_angle: measurements.back_lean,
            hip_depth: measurements.depth_ratio,
            feedback: feedback::live_feedback(criteria, in_repetition),
            checkpoints: feedback::checkpoints(criteria),
        }
    }
}

/// The outcome of the most recently completed repetition.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CompletedRepetition {
    pub(crate) perfect: bool,
    pub(crate) min_knee_angle: f32,
    /// The analysis of the frame on which the repetition completed.
    pub(crate) analysis: FrameAnalysis,
}

/// Counts squats in a stream of keypoint frames and grades each repetition.
///
/// Frames must be fed in capture order. One detector serves one session.
#[derive(Debug, Clone)]
pub(crate) struct SquatDetector {
    thresholds: Thresholds,
    phase: Phase,
    tally: Tally,
    last_repetition: Option<CompletedRepetition>,
    completion_pending: bool,
    frame_count: u64,
    last_log_frame: u64,
}

impl SquatDetector {
    pub(crate) fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            phase: Phase::Standing,
            tally: Tally::default(),
            last_repetition: None,
            completion_pending: false,
            frame_count: 0,
            last_log_frame: 0,
        }
    }

    /// Analyze one frame. Frames with fewer than 33 keypoints leave the state untouched.
    pub(crate) fn process(&mut self, keypoints: &[Keypoint]) -> FrameAnalysis {
        self.frame_count += 1;

        match Frame::new(keypoints) {
            Ok(frame) => self.process_frame(&frame),
            Err(error) => {
                debug!(frame = self.frame_count, %error, "skipping frame");
                FrameAnalysis::no_pose()
            }
        }
    }

    fn process_frame(&mut self, frame: &Frame) -> FrameAnalysis {
        let measurements = Measurements::from_frame(frame);
        let criteria = self.thresholds.criteria(&measurements);
        let knee_angle = measurements.knee_angle;

        self.log_snapshot(&measurements);

        if let Phase::Squatting(repetition) = &mut self.phase {
            repetition.record(knee_angle, criteria);
        }

        let completed = match self.thresholds.transition(&self.phase, knee_angle) {
            Transition::Start => {
                self.phase = Phase::Squatting(Repetition::new(knee_angle));
                info!(
                    message = "squat started",
                    frame = self.frame_count,
                    knee_angle = knee_angle
                );
                None
            }
            Transition::Complete => match std::mem::replace(&mut self.phase, Phase::Standing) {
                Phase::Squatting(repetition) => Some(repetition),
                Phase::Standing => None,
            },
            Transition::Settle => {
                self.phase = Phase::Standing;
                None
            }
            Transition::Hold => None,
        };

        let analysis = FrameAnalysis::new(&measurements, criteria, self.phase.in_repetition());

        if let Some(repetition) = completed {
            self.complete(repetition, &measurements, criteria, &analysis);
        }

        analysis
    }

    fn complete(
        &mut self,
        repetition: Repetition,
        measurements: &Measurements,
        criteria: Criteria,
        analysis: &FrameAnalysis,
    ) {
        self.tally.attempts += 1;
        self.completion_pending = true;

        let sufficient_depth =
            repetition.min_knee_angle < self.thresholds.sufficient_depth_knee_angle;
        let perfect = repetition.best_form && sufficient_depth;

        info!(
            message = "squat completed",
            frame = self.frame_count,
            lowest_knee_angle = repetition.min_knee_angle,
            knee_angle = measurements.knee_angle,
            knees_good = criteria.knees_good,
            hip_angle = measurements.hip_angle,
            hips_good = criteria.hips_good,
            depth_ratio = measurements.depth_ratio,
            depth_good = criteria.depth_good,
            back_lean = measurements.back_lean,
            back_good = criteria.back_good,
            best_form = repetition.best_form,
            sufficient_depth
        );

        if perfect {
            self.tally.perfect += 1;
            self.tally.frames += repetition.frames;
            info!(message = "perfect squat", count = self.tally.perfect);
        } else {
            self.tally.imperfect += 1;
            info!(
                message = "imperfect squat, not counted",
                sufficient_depth,
                best_form = repetition.best_form
            );
        }

        info!(
            attempts = self.tally.attempts,
            perfect = self.tally.perfect,
            imperfect = self.tally.imperfect
        );

        self.last_repetition = Some(CompletedRepetition {
            perfect,
            min_knee_angle: repetition.min_knee_angle,
            analysis: analysis.clone(),
        });
    }

    fn log_snapshot(&mut self, measurements: &Measurements) {
        if self.frame_count - self.last_log_frame < LOG_EVERY_N_FRAMES {
            return;
        }
        self.last_log_frame = self.frame_count;

        debug!(
            frame = self.frame_count,
            knee_angle = measurements.knee_angle,
            hip_angle = measurements.hip_angle,
            back_lean = measurements.back_lean,
            depth_ratio = measurements.depth_ratio,
            squatting = self.phase.in_repetition(),
            attempts = self.tally.attempts,
            perfect = self.tally.perfect,
            imperfect = self.tally.imperfect
        );
    }

    /// Whether a repetition completed since the last call. Clears the flag.
    pub(crate) fn poll_completion(&mut self) -> bool {
        std::mem::replace(&mut self.completion_pending, false)
    }

    pub(crate) fn was_last_repetition_perfect(&self) -> bool {
        self.last_repetition
            .as_ref()
            .map_or(false, |repetition| repetition.perfect)
    }

    pub(crate) fn completion_feedback<R>(&self, was_perfect: bool, rng: &mut R) -> String
    where
        R: Rng + ?Sized,
    {
        feedback::completion_feedback(
            was_perfect,
            self.count(),
            self.last_repetition.as_ref(),
            &self.thresholds,
            rng,
        )
    }

    pub(crate) fn summary(&self) -> Summary {
        Summary::from(&self.tally)
    }

    /// Number of perfect repetitions.
    pub(crate) fn count(&self) -> u64 {
        self.tally.perfect
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::new(self.thresholds);
        info!("all counters reset to zero");
    }

    #[cfg(test)]
    pub(crate) fn phase(&self) -> &Phase {
        &self.phase
    }

    #[cfg(test)]
    pub(crate) fn frame_count(&self) -> u64 {
        self.frame_count
    }

    #[cfg(test)]
    pub(crate) fn tally(&self) -> &Tally {
        &self.tally
    }
}
