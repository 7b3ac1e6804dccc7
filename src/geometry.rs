use crate::pose::{Frame, Keypoint, Pair};

/// Angle at `mid` formed by the rays towards `first` and `last`, in degrees within [0, 180].
///
/// Coincident points do not error: `atan2(0, 0)` is 0, so a zero-length ray
/// contributes a bearing of 0.
pub(crate) fn angle(first: Keypoint, mid: Keypoint, last: Keypoint) -> f32 {
    let radians = (last.y - mid.y).atan2(last.x - mid.x) - (first.y - mid.y).atan2(first.x - mid.x);
    let mut angle = radians.to_degrees();

    if angle < 0.0 {
        angle += 360.0;
    }
    if angle > 180.0 {
        angle = 360.0 - angle;
    }
    angle
}

fn midpoint(pair: Pair) -> (f32, f32) {
    (
        (pair.left.x + pair.right.x) / 2.0,
        (pair.left.y + pair.right.y) / 2.0,
    )
}

/// Lean of the torso, hip midpoint to shoulder midpoint, measured from the vertical axis.
pub(crate) fn back_lean(shoulders: Pair, hips: Pair) -> f32 {
    let (shoulder_x, shoulder_y) = midpoint(shoulders);
    let (hip_x, hip_y) = midpoint(hips);
    (shoulder_x - hip_x).atan2(shoulder_y - hip_y).to_degrees().abs()
}

/// Ratio of the hip midpoint's vertical coordinate to the knee midpoint's.
///
/// With the vertical axis pointing down, values near or above 1 mean the
/// hips have dropped to knee height. Returns 0 when the knees sit at 0.
pub(crate) fn hip_depth_ratio(hips: Pair, knees: Pair) -> f32 {
    let (_, hip_y) = midpoint(hips);
    let (_, knee_y) = midpoint(knees);

    if knee_y == 0.0 {
        return 0.0;
    }
    hip_y / knee_y
}

/// Everything the detector measures on one frame.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub(crate) struct Measurements {
    pub(crate) knee_angle: f32,
    pub(crate) hip_angle: f32,
    pub(crate) back_lean: f32,
    pub(crate) depth_ratio: f32,
}

impl Measurements {
    pub(crate) fn from_frame(frame: &Frame) -> Self {
        let Frame {
            shoulders,
            hips,
            knees,
            ankles,
        } = *frame;

        let left_knee = angle(hips.left, knees.left, ankles.left);
        let right_knee = angle(hips.right, knees.right, ankles.right);
        let left_hip = angle(shoulders.left, hips.left, knees.left);
        let right_hip = angle(shoulders.right, hips.right, knees.right);

        Self {
            knee_angle: (left_knee + right_knee) / 2.0,
            hip_angle: (left_hip + right_hip) / 2.0,
            back_lean: back_lean(shoulders, hips),
            depth_ratio: hip_depth_ratio(hips, knees),
        }
    }
}
