use crate::error::Error;

/// Number of landmarks the upstream pose model emits per frame.
pub(crate) const NUM_KEYPOINTS: usize = 33;

/// The landmarks the detector looks at, by their index in a frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum KeypointKind {
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
}

impl KeypointKind {
    #[inline]
    pub(crate) fn idx(self) -> usize {
        self as usize
    }
}

/// A single landmark. `z` and `visibility` are carried through untouched.
#[derive(Debug, Copy, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub(crate) struct Keypoint {
    pub(crate) x: f32,
    pub(crate) y: f32,
    #[serde(default)]
    pub(crate) z: f32,
    #[serde(default)]
    pub(crate) visibility: f32,
}

impl Keypoint {
    #[cfg(test)]
    pub(crate) fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            ..Default::default()
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) struct Pair {
    pub(crate) left: Keypoint,
    pub(crate) right: Keypoint,
}

/// The lower-body joints of one validated keypoint frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) struct Frame {
    pub(crate) shoulders: Pair,
    pub(crate) hips: Pair,
    pub(crate) knees: Pair,
    pub(crate) ankles: Pair,
}

impl Frame {
    pub(crate) fn new(keypoints: &[Keypoint]) -> Result<Self, Error> {
        use KeypointKind::*;

        if keypoints.len() < NUM_KEYPOINTS {
            return Err(Error::InvalidFrame {
                expected: NUM_KEYPOINTS,
                got: keypoints.len(),
            });
        }

        let pair = |left: KeypointKind, right: KeypointKind| Pair {
            left: keypoints[left.idx()],
            right: keypoints[right.idx()],
        };

        Ok(Self {
            shoulders: pair(LeftShoulder, RightShoulder),
            hips: pair(LeftHip, RightHip),
            knees: pair(LeftKnee, RightKnee),
            ankles: pair(LeftAnkle, RightAnkle),
        })
    }
}

pub(crate) mod constants {
    use crate::pose::KeypointKind::{self, *};

    pub(crate) const SHOULDERS: [KeypointKind; 2] = [LeftShoulder, RightShoulder];
    pub(crate) const HIPS: [KeypointKind; 2] = [LeftHip, RightHip];
    pub(crate) const KNEES: [KeypointKind; 2] = [LeftKnee, RightKnee];
    pub(crate) const ANKLES: [KeypointKind; 2] = [LeftAnkle, RightAnkle];
}

#[cfg(test)]
mod tests {
    use super::{Frame, Keypoint, KeypointKind, NUM_KEYPOINTS};
    use crate::error::Error;

    #[test]
    fn landmark_count() {
        assert_eq!(NUM_KEYPOINTS, 33);
        assert_eq!(KeypointKind::LeftShoulder.idx(), 11);
        assert_eq!(KeypointKind::RightHip.idx(), 24);
        assert_eq!(KeypointKind::RightAnkle.idx(), 28);
    }

    #[test]
    fn empty_frame_is_rejected() {
        assert!(matches!(
            Frame::new(&[]),
            Err(Error::InvalidFrame {
                expected: 33,
                got: 0
            })
        ));
    }

    #[test]
    fn short_frame_is_rejected() {
        let keypoints = vec![Keypoint::default(); 32];
        assert!(matches!(
            Frame::new(&keypoints),
            Err(Error::InvalidFrame { got: 32, .. })
        ));
    }

    #[test]
    fn joints_are_picked_by_index() {
        let keypoints = (0..NUM_KEYPOINTS + 2)
            .map(|i| Keypoint::new(i as f32, -(i as f32)))
            .collect::<Vec<_>>();
        let frame = Frame::new(&keypoints).unwrap();
        assert_eq!(frame.shoulders.left.x, 11.0);
        assert_eq!(frame.shoulders.right.x, 12.0);
        assert_eq!(frame.hips.left.x, 23.0);
        assert_eq!(frame.hips.right.y, -24.0);
        assert_eq!(frame.knees.left.x, 25.0);
        assert_eq!(frame.knees.right.x, 26.0);
        assert_eq!(frame.ankles.left.x, 27.0);
        assert_eq!(frame.ankles.right.x, 28.0);
    }

    #[test]
    fn missing_depth_and_visibility_default_to_zero() {
        let keypoint: Keypoint = serde_json::from_str(r#"{"x": 0.25, "y": 0.75}"#).unwrap();
        assert_eq!(keypoint, Keypoint::new(0.25, 0.75));
    }
}
