use crate::{
    detector::FrameAnalysis, error::Error, feedback::Checkpoints, pose::Keypoint,
    session::Report, summary::Summary,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One line of input.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum Request {
    Frame {
        #[serde(default)]
        landmarks: Option<Vec<Keypoint>>,
    },
    Reset,
    Ping,
    Stats,
}

impl Request {
    pub(crate) fn parse(line: &str, line_number: usize) -> Result<Self, Error> {
        serde_json::from_str(line).map_err(|e| Error::ParseMessage(e, line_number))
    }
}

fn round_to(value: f32, places: i32) -> f32 {
    let scale = 10.0_f32.powi(places);
    (value * scale).round() / scale
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct AnalysisMessage {
    pub(crate) is_squat_position: bool,
    pub(crate) knee_angle: f32,
    pub(crate) hip_angle: f32,
    pub(crate) back_angle: f32,
    pub(crate) hip_depth: f32,
    pub(crate) form_feedback: String,
    pub(crate) checkpoint_results: Checkpoints,
}

impl From<FrameAnalysis> for AnalysisMessage {
    fn from(analysis: FrameAnalysis) -> Self {
        Self {
            is_squat_position: analysis.is_squat_position,
            knee_angle: round_to(analysis.knee_angle, 1),
            hip_angle: round_to(analysis.hip_angle, 1),
            back_angle: round_to(analysis.back_angle, 1),
            hip_depth: round_to(analysis.hip_depth, 2),
            form_feedback: analysis.feedback,
            checkpoint_results: analysis.checkpoints,
        }
    }
}

/// One line of output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum Response {
    PoseResults {
        landmarks: Vec<Keypoint>,
        squat_analysis: AnalysisMessage,
        squat_count: u64,
        voice_feedback: Option<String>,
        timestamp: DateTime<Utc>,
    },
    NoPose {
        message: String,
    },
    ResetComplete {
        message: &'static str,
    },
    Pong,
    Stats {
        session_id: Uuid,
        squat_count: u64,
        duration_seconds: i64,
        frame_count: u64,
        statistics: Summary,
    },
    Error {
        message: String,
    },
    SessionSummary(Report),
}

impl Response {
    /// Write the response as a single JSON line.
    pub(crate) fn write_line<W>(&self, mut writer: W) -> Result<(), Error>
    where
        W: std::io::Write,
    {
        serde_json::to_writer(&mut writer, self).map_err(Error::SerializeResponse)?;
        writer.write_all(b"\n").map_err(Error::WriteResponse)?;
        writer.flush().map_err(Error::WriteResponse)
    }
}
