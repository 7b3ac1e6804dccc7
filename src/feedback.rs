use crate::{
    detector::{CompletedRepetition, Thresholds},
    pose::{constants, KeypointKind},
};
use rand::Rng;
use std::collections::BTreeMap;

/// Pass/fail of each form check on a single frame.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub(crate) struct Criteria {
    pub(crate) knees_good: bool,
    pub(crate) hips_good: bool,
    pub(crate) depth_good: bool,
    pub(crate) back_good: bool,
}

impl Criteria {
    /// Knees, hips and depth together. The back is never required.
    pub(crate) fn lower_body_perfect(self) -> bool {
        self.knees_good && self.hips_good && self.depth_good
    }

    /// The hip bucket folds the depth check in.
    pub(crate) fn hips_and_depth_good(self) -> bool {
        self.hips_good && self.depth_good
    }
}

/// Joint index to "this joint currently fails its check".
pub(crate) type Checkpoints = BTreeMap<usize, bool>;

pub(crate) fn checkpoints(criteria: Criteria) -> Checkpoints {
    let flag = |joints: &'static [KeypointKind], bad: bool| {
        joints.iter().map(move |joint| (joint.idx(), bad))
    };

    flag(&constants::SHOULDERS, !criteria.back_good)
        .chain(flag(&constants::HIPS, !criteria.hips_and_depth_good()))
        .chain(flag(&constants::KNEES, !criteria.knees_good))
        .chain(flag(&constants::ANKLES, !criteria.depth_good))
        .collect()
}

const MAX_REPORTED_ISSUES: usize = 2;

/// Status line for the current frame.
pub(crate) fn live_feedback(criteria: Criteria, in_repetition: bool) -> String {
    if !in_repetition {
        return "Ready to squat".to_owned();
    }
    if criteria.lower_body_perfect() {
        return "Perfect form!".to_owned();
    }

    // depth counts toward both "Hips" and "Depth"
    let issues = [
        (!criteria.hips_and_depth_good(), "Hips"),
        (!criteria.knees_good, "Knees"),
        (!criteria.depth_good, "Depth"),
    ]
    .iter()
    .filter_map(|&(failed, label)| if failed { Some(label) } else { None })
    .take(MAX_REPORTED_ISSUES)
    .collect::<Vec<_>>();

    if issues.is_empty() {
        "Keep going".to_owned()
    } else {
        format!("Fix: {}", issues.join(", "))
    }
}

pub(crate) const PERFECT_PHRASES: [&str; 5] = [
    "Great job! Perfect squat! {count}",
    "Nice form! Keep going! {count}",
    "Excellent squat, well done! {count}",
    "Perfect! That's {count}",
    "Amazing form! {count} squats",
];

fn perfect_phrase<R>(count: u64, rng: &mut R) -> String
where
    R: Rng + ?Sized,
{
    let phrase = PERFECT_PHRASES[rng.gen_range(0..PERFECT_PHRASES.len())];
    phrase.replace("{count}", &count.to_string())
}

/// What went wrong with the last completed repetition, most important first.
fn imperfect_advice(last: Option<&CompletedRepetition>, thresholds: &Thresholds) -> &'static str {
    let repetition = match last {
        Some(repetition) => repetition,
        None => return "Please adjust your form",
    };
    let analysis = &repetition.analysis;

    if repetition.min_knee_angle >= thresholds.sufficient_depth_knee_angle {
        "Go deeper. Bend your knees more"
    } else if !thresholds.knees_good(analysis.knee_angle) {
        "Please adjust your form. Check your knee position"
    } else if !thresholds.hips_good(analysis.hip_angle) {
        "Please adjust your form. Push your hips back"
    } else if !thresholds.depth_good(analysis.hip_depth) {
        "Please adjust your form. Go deeper"
    } else {
        "Please adjust your form"
    }
}

/// Spoken feedback once a repetition completes.
pub(crate) fn completion_feedback<R>(
    was_perfect: bool,
    count: u64,
    last: Option<&CompletedRepetition>,
    thresholds: &Thresholds,
    rng: &mut R,
) -> String
where
    R: Rng + ?Sized,
{
    if was_perfect {
        perfect_phrase(count, rng)
    } else {
        imperfect_advice(last, thresholds).to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_GOOD: Criteria = Criteria {
        knees_good: true,
        hips_good: true,
        depth_good: true,
        back_good: true,
    };

    mod live_feedback_tests {
        use super::*;

        #[test]
        fn outside_repetition() {
            assert_eq!(live_feedback(ALL_GOOD, false), "Ready to squat");
            assert_eq!(live_feedback(Criteria::default(), false), "Ready to squat");
        }

        #[test]
        fn perfect_inside_repetition() {
            assert_eq!(live_feedback(ALL_GOOD, true), "Perfect form!");
        }

        #[test]
        fn bad_back_alone_is_still_perfect() {
            let criteria = Criteria {
                back_good: false,
                ..ALL_GOOD
            };
            assert_eq!(live_feedback(criteria, true), "Perfect form!");
        }

        #[test]
        fn shallow_reports_hips_and_depth() {
            let criteria = Criteria {
                depth_good: false,
                ..ALL_GOOD
            };
            assert_eq!(live_feedback(criteria, true), "Fix: Hips, Depth");
        }

        #[test]
        fn at_most_two_issues() {
            assert_eq!(live_feedback(Criteria::default(), true), "Fix: Hips, Knees");
        }

        #[test]
        fn knees_only() {
            let criteria = Criteria {
                knees_good: false,
                ..ALL_GOOD
            };
            assert_eq!(live_feedback(criteria, true), "Fix: Knees");
        }

        #[test]
        fn hip_angle_only() {
            let criteria = Criteria {
                hips_good: false,
                ..ALL_GOOD
            };
            assert_eq!(live_feedback(criteria, true), "Fix: Hips");
        }
    }

    mod checkpoints_tests {
        use super::*;

        #[test]
        fn all_good_flags_nothing() {
            let checkpoints = checkpoints(ALL_GOOD);
            assert_eq!(checkpoints.len(), 8);
            assert!(checkpoints.values().all(|&bad| !bad));
        }

        #[test]
        fn depth_flags_hips_and_ankles() {
            let checkpoints = checkpoints(Criteria {
                depth_good: false,
                ..ALL_GOOD
            });
            let flagged = checkpoints
                .iter()
                .filter_map(|(&joint, &bad)| if bad { Some(joint) } else { None })
                .collect::<Vec<_>>();
            assert_eq!(flagged, vec![23, 24, 27, 28]);
        }

        #[test]
        fn back_flags_shoulders() {
            let checkpoints = checkpoints(Criteria {
                back_good: false,
                ..ALL_GOOD
            });
            assert!(checkpoints[&11]);
            assert!(checkpoints[&12]);
            assert!(!checkpoints[&25]);
        }

        #[test]
        fn knees_flag_both_sides() {
            let checkpoints = checkpoints(Criteria {
                knees_good: false,
                ..ALL_GOOD
            });
            assert!(checkpoints[&25]);
            assert!(checkpoints[&26]);
            assert!(!checkpoints[&23]);
        }
    }

    mod completion_feedback_tests {
        use super::*;
        use crate::detector::FrameAnalysis;
        use rand::{rngs::StdRng, SeedableRng};

        fn completed(min_knee_angle: f32, knee: f32, hip: f32, depth: f32) -> CompletedRepetition {
            CompletedRepetition {
                perfect: false,
                min_knee_angle,
                analysis: FrameAnalysis {
                    knee_angle: knee,
                    hip_angle: hip,
                    hip_depth: depth,
                    ..FrameAnalysis::no_pose()
                },
            }
        }

        fn advice(last: Option<&CompletedRepetition>) -> String {
            let mut rng = StdRng::seed_from_u64(0);
            completion_feedback(false, 0, last, &Thresholds::default(), &mut rng)
        }

        #[test]
        fn perfect_phrase_is_from_the_template_set() {
            let mut rng = StdRng::seed_from_u64(7);
            let expected = PERFECT_PHRASES
                .iter()
                .map(|phrase| phrase.replace("{count}", "3"))
                .collect::<Vec<_>>();
            for _ in 0..50 {
                let phrase =
                    completion_feedback(true, 3, None, &Thresholds::default(), &mut rng);
                assert!(expected.contains(&phrase), "unexpected phrase: {}", phrase);
            }
        }

        #[test]
        fn no_repetition_yet() {
            assert_eq!(advice(None), "Please adjust your form");
        }

        #[test]
        fn not_deep_enough() {
            let last = completed(115.0, 80.0, 90.0, 1.0);
            assert_eq!(advice(Some(&last)), "Go deeper. Bend your knees more");
        }

        #[test]
        fn knee_out_of_range() {
            let last = completed(90.0, 140.0, 90.0, 1.0);
            assert_eq!(
                advice(Some(&last)),
                "Please adjust your form. Check your knee position"
            );
        }

        #[test]
        fn hip_out_of_range() {
            let last = completed(90.0, 90.0, 150.0, 1.0);
            assert_eq!(
                advice(Some(&last)),
                "Please adjust your form. Push your hips back"
            );
        }

        #[test]
        fn depth_too_shallow() {
            let last = completed(90.0, 90.0, 90.0, 0.5);
            assert_eq!(advice(Some(&last)), "Please adjust your form. Go deeper");
        }

        #[test]
        fn nothing_specific() {
            let last = completed(90.0, 90.0, 90.0, 1.0);
            assert_eq!(advice(Some(&last)), "Please adjust your form");
        }
    }
}
