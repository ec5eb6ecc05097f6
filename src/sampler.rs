use rand::Rng;

/// An item paired with its selection weight; lives only while a round is built
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedCandidate<T> {
    pub item: T,
    pub weight: f64,
}

impl<T> WeightedCandidate<T> {
    pub fn new(item: T, weight: f64) -> Self {
        Self { item, weight }
    }
}

/// Negative, NaN and infinite weights count as zero
fn sanitize(weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        0.0
    }
}

/// Turn weights into probabilities summing to 1. A zero total falls back to
/// a uniform distribution; an empty input yields an empty output.
pub fn normalize(weights: &[f64]) -> Vec<f64> {
    if weights.is_empty() {
        return Vec::new();
    }

    let cleaned: Vec<f64> = weights.iter().copied().map(sanitize).collect();
    let total: f64 = cleaned.iter().sum();

    if total > 0.0 && total.is_finite() {
        cleaned.into_iter().map(|w| w / total).collect()
    } else {
        vec![1.0 / weights.len() as f64; weights.len()]
    }
}

/// Index of the first entry whose cumulative probability reaches `draw`.
/// Zero-probability entries are never chosen.
fn pick_index(probabilities: &[f64], draw: f64) -> usize {
    let mut cumulative = 0.0;
    let mut last_positive = probabilities.len() - 1;

    for (idx, &p) in probabilities.iter().enumerate() {
        if p <= 0.0 {
            continue;
        }
        cumulative += p;
        last_positive = idx;
        if cumulative >= draw {
            return idx;
        }
    }

    // rounding left the total just under the draw
    last_positive
}

/// Weighted selection using the thread-local RNG
pub fn sample<T: Clone>(candidates: &[WeightedCandidate<T>], count: usize, allow_repeats: bool) -> Vec<T> {
    sample_with(candidates, count, allow_repeats, &mut rand::thread_rng())
}

/// Draw `count` items in selection order.
///
/// Without repeats, each drawn item leaves the pool and the remaining
/// weights are re-normalized before the next draw; exactly
/// `min(count, candidates.len())` distinct items come back. With repeats,
/// the distribution is fixed and exactly `count` draws are made.
pub fn sample_with<T: Clone, R: Rng + ?Sized>(
    candidates: &[WeightedCandidate<T>],
    count: usize,
    allow_repeats: bool,
    rng: &mut R,
) -> Vec<T> {
    if candidates.is_empty() {
        return Vec::new();
    }

    if allow_repeats {
        let weights: Vec<f64> = candidates.iter().map(|c| c.weight).collect();
        let probabilities = normalize(&weights);
        return (0..count)
            .map(|_| candidates[pick_index(&probabilities, rng.gen::<f64>())].item.clone())
            .collect();
    }

    let mut pool: Vec<&WeightedCandidate<T>> = candidates.iter().collect();
    let target = count.min(pool.len());
    let mut selected = Vec::with_capacity(target);

    while selected.len() < target {
        let weights: Vec<f64> = pool.iter().map(|c| c.weight).collect();
        let probabilities = normalize(&weights);
        let idx = pick_index(&probabilities, rng.gen::<f64>());
        selected.push(pool.swap_remove(idx).item.clone());
    }

    selected
}
