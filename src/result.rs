//! Result accumulators for nearest-neighbor search.
//!
//! The search core does not rank candidates itself; it offers every scored
//! `(distance, index)` pair to a caller-supplied accumulator. `full()` doubles
//! as the "stop exploring once the budget runs out" signal in best-bin-first
//! search: an exhausted check budget only halts descent when the accumulator
//! reports it has all the candidates it wants.

/// Best-effort accumulator for scored candidates.
pub trait ResultSet {
    /// Offer a scored candidate. The accumulator decides whether to keep it.
    fn add_point(&mut self, distance: f32, index: u32);

    /// Whether the accumulator has collected all the candidates it wants.
    fn full(&self) -> bool;
}

/// Bounded best-k accumulator.
///
/// Keeps the `k` smallest distances seen so far, replacing the current worst
/// entry when a better candidate arrives.
#[derive(Debug, Clone)]
pub struct KnnResultSet {
    k: usize,
    entries: Vec<(f32, u32)>,
}

impl KnnResultSet {
    /// Create an accumulator for the `k` nearest neighbors.
    #[must_use]
    pub fn new(k: usize) -> Self {
        Self {
            k,
            entries: Vec::with_capacity(k),
        }
    }

    /// Number of candidates currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no candidates have been collected yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current worst (largest) retained distance, or `INFINITY` when not full.
    #[must_use]
    pub fn worst_distance(&self) -> f32 {
        if self.entries.len() < self.k {
            f32::INFINITY
        } else {
            self.entries
                .iter()
                .map(|&(d, _)| d)
                .fold(f32::NEG_INFINITY, f32::max)
        }
    }

    /// Consume the accumulator, returning `(index, distance)` pairs in
    /// ascending distance order (ties by index).
    #[must_use]
    pub fn into_sorted_vec(mut self) -> Vec<(u32, f32)> {
        self.entries
            .sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        self.entries.into_iter().map(|(d, i)| (i, d)).collect()
    }
}

impl ResultSet for KnnResultSet {
    fn add_point(&mut self, distance: f32, index: u32) {
        if self.k == 0 {
            return;
        }
        if self.entries.len() < self.k {
            self.entries.push((distance, index));
            return;
        }
        // Replace the worst entry if this candidate beats it.
        if let Some(worst) = self
            .entries
            .iter()
            .enumerate()
            .max_by(|a, b| a.1 .0.total_cmp(&b.1 .0))
            .map(|(i, _)| i)
        {
            if distance < self.entries[worst].0 {
                self.entries[worst] = (distance, index);
            }
        }
    }

    fn full(&self) -> bool {
        self.entries.len() >= self.k
    }
}

/// Accumulator collecting every candidate within a fixed radius.
///
/// Never reports `full()`, so a radius search always runs its check budget
/// to exhaustion.
#[derive(Debug, Clone)]
pub struct RadiusResultSet {
    radius: f32,
    entries: Vec<(f32, u32)>,
}

impl RadiusResultSet {
    /// Create an accumulator keeping candidates with `distance <= radius`.
    #[must_use]
    pub fn new(radius: f32) -> Self {
        Self {
            radius,
            entries: Vec::new(),
        }
    }

    /// Number of candidates collected.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no candidates have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consume the accumulator, returning `(index, distance)` pairs in
    /// ascending distance order (ties by index).
    #[must_use]
    pub fn into_sorted_vec(mut self) -> Vec<(u32, f32)> {
        self.entries
            .sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        self.entries.into_iter().map(|(d, i)| (i, d)).collect()
    }
}

impl ResultSet for RadiusResultSet {
    fn add_point(&mut self, distance: f32, index: u32) {
        if distance <= self.radius {
            self.entries.push((distance, index));
        }
    }

    fn full(&self) -> bool {
        false
    }
}
