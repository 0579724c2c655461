//! Uniform random subsets

use rand::seq::index;
use rand::Rng;

/// Picks `count` distinct positions out of `0..len` uniformly, returned in
/// ascending order. Asking for more than `len` yields every position.
pub fn random_positions<R: Rng + ?Sized>(rng: &mut R, len: usize, count: usize) -> Vec<usize> {
    let amount = count.min(len);
    let mut positions = index::sample(rng, len, amount).into_vec();
    positions.sort_unstable();
    positions
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn test_positions_are_distinct_and_in_range() {
        let mut rng = SmallRng::seed_from_u64(7);
        let picked = random_positions(&mut rng, 50, 10);
        assert_eq!(picked.len(), 10);
        assert!(picked.windows(2).all(|w| w[0] < w[1]));
        assert!(picked.iter().all(|p| *p < 50));
    }

    #[test]
    fn test_oversized_request_returns_everything() {
        let mut rng = SmallRng::seed_from_u64(1);
        assert_eq!(random_positions(&mut rng, 4, 10), vec![0, 1, 2, 3]);
        assert!(random_positions(&mut rng, 0, 3).is_empty());
    }

    #[test]
    fn test_every_position_reachable() {
        let mut rng = SmallRng::seed_from_u64(42);
        let mut seen = [false; 8];
        for _ in 0..200 {
            for p in random_positions(&mut rng, 8, 2) {
                seen[p] = true;
            }
        }
        assert!(seen.iter().all(|s| *s));
    }
}
