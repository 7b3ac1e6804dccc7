use crate::{
    detector::{SquatDetector, Thresholds},
    pose::Keypoint,
    protocol::{AnalysisMessage, Request, Response},
};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

const CALORIES_PER_SQUAT: f64 = 0.12;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct Accuracy {
    pub(crate) knee: u64,
    pub(crate) hip: u64,
    pub(crate) back: u64,
}

/// End-of-session summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct Report {
    pub(crate) session_id: Uuid,
    pub(crate) duration_seconds: i64,
    pub(crate) squat_count: u64,
    pub(crate) calories: f64,
    pub(crate) total_attempts: u64,
    pub(crate) correct_squats: u64,
    pub(crate) missed_squats: u64,
    pub(crate) accuracy: Accuracy,
    pub(crate) start_time: DateTime<Utc>,
    pub(crate) end_time: DateTime<Utc>,
}

fn calories(squat_count: u64) -> f64 {
    (squat_count as f64 * CALORIES_PER_SQUAT * 10.0).round() / 10.0
}

/// One workout: a detector plus the bookkeeping around it.
pub(crate) struct Session<R> {
    id: Uuid,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    frames_received: u64,
    detector: SquatDetector,
    rng: R,
}

impl<R> Session<R>
where
    R: Rng,
{
    pub(crate) fn new(thresholds: Thresholds, rng: R) -> Self {
        let id = Uuid::new_v4();
        info!(message = "started session", session = %id);
        Self {
            id,
            started_at: Utc::now(),
            ended_at: None,
            frames_received: 0,
            detector: SquatDetector::new(thresholds),
            rng,
        }
    }

    pub(crate) fn count(&self) -> u64 {
        self.detector.count()
    }

    pub(crate) fn frames_received(&self) -> u64 {
        self.frames_received
    }

    /// Seconds from the start until the end, or until now while active.
    pub(crate) fn duration_seconds(&self) -> i64 {
        (self.ended_at.unwrap_or_else(Utc::now) - self.started_at).num_seconds()
    }

    pub(crate) fn handle(&mut self, request: Request) -> Response {
        match request {
            Request::Frame { landmarks } => self.handle_frame(landmarks.unwrap_or_default()),
            Request::Reset => {
                self.detector.reset();
                Response::ResetComplete {
                    message: "Counter reset",
                }
            }
            Request::Ping => Response::Pong,
            Request::Stats => self.stats(),
        }
    }

    fn handle_frame(&mut self, landmarks: Vec<Keypoint>) -> Response {
        self.frames_received += 1;

        let analysis = self.detector.process(&landmarks);
        if !analysis.pose_detected {
            return Response::NoPose {
                message: analysis.feedback,
            };
        }

        let voice_feedback = if self.detector.poll_completion() {
            let was_perfect = self.detector.was_last_repetition_perfect();
            Some(self.detector.completion_feedback(was_perfect, &mut self.rng))
        } else {
            None
        };

        Response::PoseResults {
            landmarks,
            squat_analysis: AnalysisMessage::from(analysis),
            squat_count: self.detector.count(),
            voice_feedback,
            timestamp: Utc::now(),
        }
    }

    pub(crate) fn stats(&self) -> Response {
        Response::Stats {
            session_id: self.id,
            squat_count: self.detector.count(),
            duration_seconds: self.duration_seconds(),
            frame_count: self.frames_received,
            statistics: self.detector.summary(),
        }
    }

    /// Close the session. The end time is fixed by the first call.
    pub(crate) fn end(&mut self) -> Report {
        let end_time = *self.ended_at.get_or_insert_with(Utc::now);
        let summary = self.detector.summary();
        let squat_count = self.detector.count();
        let duration_seconds = self.duration_seconds();

        info!(
            message = "ended session",
            session = %self.id,
            squat_count,
            duration_seconds,
            attempts = summary.attempts,
            perfect = summary.perfect,
            imperfect = summary.imperfect,
            knee_percentage = summary.knee_percentage,
            hip_percentage = summary.hip_percentage,
            back_percentage = summary.back_percentage
        );

        Report {
            session_id: self.id,
            duration_seconds,
            squat_count,
            calories: calories(squat_count),
            total_attempts: summary.attempts,
            correct_squats: summary.perfect,
            missed_squats: summary.imperfect,
            accuracy: Accuracy {
                knee: summary.knee_percentage,
                hip: summary.hip_percentage,
                back: summary.back_percentage,
            },
            start_time: self.started_at,
            end_time,
        }
    }
}
