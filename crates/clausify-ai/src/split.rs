//! Stratified train/eval split keyed on label id.
//!
//! The eval partition holds `ceil(eval_fraction * n)` samples. Every class
//! puts one member in each partition. The remaining eval slots go to each
//! class in proportion to its size (largest remainder first, lower class id
//! on ties). Members are shuffled with a seeded RNG, so the split is
//! reproducible for a fixed seed.

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SplitError {
    #[error("no samples to split")]
    Empty,

    #[error("eval fraction must be in (0, 1), got {0}")]
    InvalidFraction(f64),

    #[error("the least populated class (label id {label}) has only {count} member; every class needs at least 2")]
    ClassTooSmall { label: usize, count: usize },

    #[error("eval size {eval} is smaller than the number of classes {classes}")]
    EvalTooSmall { eval: usize, classes: usize },

    #[error("train size {train} is smaller than the number of classes {classes}")]
    TrainTooSmall { train: usize, classes: usize },
}

/// Sample indices of each partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub eval: Vec<usize>,
}

struct Allocation {
    members: Vec<usize>,
    take: usize,
    remainder: f64,
}

pub fn stratified_split(
    label_ids: &[usize],
    eval_fraction: f64,
    seed: u64,
) -> Result<Split, SplitError> {
    if label_ids.is_empty() {
        return Err(SplitError::Empty);
    }
    if !(eval_fraction > 0.0 && eval_fraction < 1.0) {
        return Err(SplitError::InvalidFraction(eval_fraction));
    }

    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &label) in label_ids.iter().enumerate() {
        by_class.entry(label).or_default().push(i);
    }

    if let Some((&label, members)) = by_class.iter().min_by_key(|(_, m)| m.len()) {
        if members.len() < 2 {
            return Err(SplitError::ClassTooSmall {
                label,
                count: members.len(),
            });
        }
    }

    let n = label_ids.len();
    let classes = by_class.len();
    let n_eval = (eval_fraction * n as f64).ceil() as usize;
    let n_train = n - n_eval;
    if n_eval < classes {
        return Err(SplitError::EvalTooSmall {
            eval: n_eval,
            classes,
        });
    }
    if n_train < classes {
        return Err(SplitError::TrainTooSmall {
            train: n_train,
            classes,
        });
    }

    // One eval slot per class up front; the spare slots follow each class's
    // proportional share beyond that first one.
    let extra = |len: usize| (n_eval as f64 * len as f64 / n as f64 - 1.0).max(0.0);
    let demand: f64 = by_class.values().map(|m| extra(m.len())).sum();
    let spare = (n_eval - classes) as f64;
    let mut allocations: Vec<Allocation> = by_class
        .into_values()
        .map(|members| {
            let share = if demand > 0.0 {
                spare * extra(members.len()) / demand
            } else {
                0.0
            };
            let take = (1 + share.floor() as usize).min(members.len() - 1);
            Allocation {
                take,
                remainder: share - share.floor(),
                members,
            }
        })
        .collect();

    // Hand out the rounding remainder, largest fractional part first.
    let mut order: Vec<usize> = (0..allocations.len()).collect();
    order.sort_by(|&a, &b| {
        allocations[b]
            .remainder
            .partial_cmp(&allocations[a].remainder)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });
    let mut remaining = n_eval - allocations.iter().map(|a| a.take).sum::<usize>();
    while remaining > 0 {
        let mut progressed = false;
        for &i in &order {
            if remaining == 0 {
                break;
            }
            let alloc = &mut allocations[i];
            if alloc.take + 1 < alloc.members.len() {
                alloc.take += 1;
                remaining -= 1;
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n_train);
    let mut eval = Vec::with_capacity(n_eval);
    for mut alloc in allocations {
        alloc.members.shuffle(&mut rng);
        eval.extend_from_slice(&alloc.members[..alloc.take]);
        train.extend_from_slice(&alloc.members[alloc.take..]);
    }
    train.shuffle(&mut rng);
    eval.shuffle(&mut rng);

    tracing::debug!(train = train.len(), eval = eval.len(), classes, "stratified split");
    Ok(Split { train, eval })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn labels(counts: &[usize]) -> Vec<usize> {
        counts
            .iter()
            .enumerate()
            .flat_map(|(label, &count)| std::iter::repeat(label).take(count))
            .collect()
    }

    fn class_count(ids: &[usize], indices: &[usize], label: usize) -> usize {
        indices.iter().filter(|&&i| ids[i] == label).count()
    }

    #[test]
    fn eighty_twenty_sizes() {
        let ids = labels(&[50, 50]);
        let split = stratified_split(&ids, 0.2, 42).unwrap();
        assert_eq!(split.train.len(), 80);
        assert_eq!(split.eval.len(), 20);
        assert_eq!(class_count(&ids, &split.eval, 0), 10);
        assert_eq!(class_count(&ids, &split.eval, 1), 10);
    }

    #[test]
    fn eval_size_rounds_up() {
        let ids = labels(&[6, 5]);
        let split = stratified_split(&ids, 0.2, 42).unwrap();
        assert_eq!(split.eval.len(), 3);
        assert_eq!(split.train.len(), 8);
    }

    #[test]
    fn every_index_used_exactly_once() {
        let ids = labels(&[7, 13, 4, 9]);
        let split = stratified_split(&ids, 0.2, 7).unwrap();
        let all: HashSet<usize> = split.train.iter().chain(&split.eval).copied().collect();
        assert_eq!(all.len(), ids.len());
        assert_eq!(split.train.len() + split.eval.len(), ids.len());
    }

    #[test]
    fn every_class_keeps_training_members() {
        let ids = labels(&[2, 2, 2, 30]);
        let split = stratified_split(&ids, 0.2, 42).unwrap();
        for label in 0..4 {
            assert!(class_count(&ids, &split.train, label) >= 1, "label {label}");
        }
    }

    #[test]
    fn every_class_lands_in_both_partitions() {
        for counts in [&[2, 98][..], &[3, 3, 94], &[2, 2, 2, 30], &[4, 50, 7]] {
            let ids = labels(counts);
            let split = stratified_split(&ids, 0.2, 42).unwrap();
            assert_eq!(split.eval.len(), (0.2 * ids.len() as f64).ceil() as usize);
            for label in 0..counts.len() {
                assert!(class_count(&ids, &split.eval, label) >= 1, "{counts:?} label {label} eval");
                assert!(class_count(&ids, &split.train, label) >= 1, "{counts:?} label {label} train");
            }
        }
    }

    #[test]
    fn large_class_absorbs_spare_eval_slots() {
        let ids = labels(&[2, 98]);
        let split = stratified_split(&ids, 0.2, 42).unwrap();
        assert_eq!(class_count(&ids, &split.eval, 0), 1);
        assert_eq!(class_count(&ids, &split.eval, 1), 19);
    }

    #[test]
    fn same_seed_same_split() {
        let ids = labels(&[20, 15, 9]);
        let a = stratified_split(&ids, 0.2, 42).unwrap();
        let b = stratified_split(&ids, 0.2, 42).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn singleton_class_is_rejected() {
        let ids = labels(&[5, 1]);
        assert_eq!(
            stratified_split(&ids, 0.2, 42),
            Err(SplitError::ClassTooSmall { label: 1, count: 1 })
        );
    }

    #[test]
    fn eval_smaller_than_class_count_is_rejected() {
        let ids = labels(&[2, 2, 2, 2, 2, 2]);
        // ceil(0.2 * 12) = 3 < 6 classes
        assert_eq!(
            stratified_split(&ids, 0.2, 42),
            Err(SplitError::EvalTooSmall { eval: 3, classes: 6 })
        );
    }

    #[test]
    fn invalid_fraction_and_empty_input() {
        assert_eq!(stratified_split(&[0, 0], 1.0, 1), Err(SplitError::InvalidFraction(1.0)));
        assert_eq!(stratified_split(&[], 0.2, 1), Err(SplitError::Empty));
    }
}
