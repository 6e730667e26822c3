//! Picks the feature test that labels a tree-phase merge.

use std::collections::BTreeSet;

use crate::feature::{FeatureKind, FeatureSchema, FeatureValue, FeatureVector};
use crate::tree::FeatureTest;

/// The chosen test. When `flipped` is set, the right cluster passes the test
/// and must take daughter slot 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Split {
    pub test: FeatureTest,
    pub flipped: bool,
    /// Members routed to their own cluster's side.
    pub correct: usize,
}

fn discrete(v: FeatureValue) -> Option<i32> {
    match v {
        FeatureValue::Byte(b) => Some(b as i32),
        FeatureValue::Short(s) => Some(s as i32),
        FeatureValue::Continuous(_) => None,
    }
}

fn candidates(schema: &FeatureSchema, feature: usize, all: &[&FeatureVector]) -> Vec<FeatureTest> {
    match schema.kind_of(feature) {
        Some(FeatureKind::Byte) | Some(FeatureKind::Short) => {
            let values: BTreeSet<i32> = all
                .iter()
                .filter_map(|fv| fv.value(feature).and_then(discrete))
                .collect();
            values
                .into_iter()
                .map(|value| FeatureTest::Equals { feature, value })
                .collect()
        }
        Some(FeatureKind::Continuous) => {
            let mut values: Vec<f32> = all
                .iter()
                .filter_map(|fv| fv.value(feature).map(FeatureValue::as_f32))
                .collect();
            values.sort_by(f32::total_cmp);
            values.dedup();
            if values.len() == 1 {
                return vec![FeatureTest::LessThan {
                    feature,
                    threshold: values[0],
                }];
            }
            values
                .windows(2)
                .map(|w| FeatureTest::LessThan {
                    feature,
                    threshold: midpoint(w[0], w[1]),
                })
                .collect()
        }
        None => Vec::new(),
    }
}

/// Threshold strictly above `lo` and at most `hi`, for `lo < hi`.
fn midpoint(lo: f32, hi: f32) -> f32 {
    let mid = ((f64::from(lo) + f64::from(hi)) / 2.0) as f32;
    if mid > lo { mid } else { hi }
}

fn passing(test: &FeatureTest, members: &[&FeatureVector]) -> usize {
    members
        .iter()
        .filter(|fv| test.passes(fv).unwrap_or(false))
        .count()
}

/// Returns the test that best separates `left` from `right`.
///
/// Candidates are scanned by ascending feature index, then ascending value;
/// a later candidate only wins with a strictly higher score, and the direct
/// orientation is tried before the flipped one.
pub(crate) fn choose_split(
    schema: &FeatureSchema,
    left: &[&FeatureVector],
    right: &[&FeatureVector],
) -> Option<Split> {
    let all: Vec<&FeatureVector> = left.iter().chain(right.iter()).copied().collect();
    let mut best: Option<Split> = None;

    for feature in 0..schema.len() {
        for test in candidates(schema, feature, &all) {
            let pass_left = passing(&test, left);
            let pass_right = passing(&test, right);
            let direct = pass_left + (right.len() - pass_right);
            let flipped = pass_right + (left.len() - pass_left);

            for (correct, flipped) in [(direct, false), (flipped, true)] {
                if best.is_none_or(|b| correct > b.correct) {
                    best = Some(Split {
                        test,
                        flipped,
                        correct,
                    });
                }
            }
        }
    }
    best
}
