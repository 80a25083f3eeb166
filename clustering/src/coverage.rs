//! Total-coverage resolution for provisional labels.
//!
//! Plain density clustering discards outliers; the pipeline's contract is
//! that no image is ever dropped. This module rewrites every [`NOISE`]
//! label into a fresh singleton label so the final label set partitions the
//! whole batch.

use tracing::debug;

use crate::hdbscan::NOISE;

/// Replace each [`NOISE`] entry with a new label, scanning in input order.
///
/// The counter starts at `max(non-negative labels) + 1` (0 when the
/// algorithm found no clusters at all), so minted labels never collide with
/// genuine ones. Former noise items become singleton clusters in input
/// order, which keeps the result reproducible across runs.
///
/// Postcondition: no entry is negative.
pub fn resolve_noise(labels: &mut [i64]) {
    let mut next = labels
        .iter()
        .copied()
        .filter(|&l| l >= 0)
        .max()
        .map_or(0, |max| max + 1);

    let mut reassigned = 0usize;
    for label in labels.iter_mut() {
        if *label == NOISE {
            *label = next;
            next += 1;
            reassigned += 1;
        }
    }

    if reassigned > 0 {
        debug!("Reassigned {reassigned} noise points to singleton clusters");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn noise_becomes_singletons_seeded_past_the_max_label() {
        let mut labels = vec![0, NOISE, 4, NOISE, 0];
        resolve_noise(&mut labels);
        assert_eq!(labels, vec![0, 5, 4, 6, 0]);
    }

    #[test]
    fn all_noise_counts_up_from_zero() {
        let mut labels = vec![NOISE, NOISE, NOISE];
        resolve_noise(&mut labels);
        assert_eq!(labels, vec![0, 1, 2]);
    }

    #[test]
    fn labels_without_noise_are_untouched() {
        let mut labels = vec![2, 0, 1, 2];
        resolve_noise(&mut labels);
        assert_eq!(labels, vec![2, 0, 1, 2]);
    }

    #[test]
    fn empty_input_is_a_no_op() {
        let mut labels: Vec<i64> = Vec::new();
        resolve_noise(&mut labels);
        assert!(labels.is_empty());
    }

    #[test]
    fn no_entry_is_negative_afterwards() {
        let mut labels = vec![NOISE, 7, NOISE, 3, NOISE, NOISE];
        resolve_noise(&mut labels);
        assert!(labels.iter().all(|&l| l >= 0));

        // Minted labels are pairwise distinct and distinct from real ones.
        let mut seen = std::collections::HashSet::new();
        for &l in &labels {
            seen.insert(l);
        }
        assert_eq!(seen.len(), 6); // {7, 3} plus four singletons
    }
}
