//! Fixed-capacity history of curvature pairs.
//!
//! The history is a ring of `capacity` [`IterationRecord`]s addressed by a
//! write cursor. Every update overwrites the record under the cursor and
//! advances it modulo the capacity, so once the ring is full the oldest pair
//! is evicted silently. The buffer is allocated once per run and never
//! resized.
//!
//! ```text
//! capacity = 3, after 4 updates:
//!
//!   slot:    0    1    2
//!   pair:   p3   p1   p2      end = 1, k = 4, bound = 3
//!   chronological order: p1, p2, p3
//! ```

use geomopt_core::types::{DVector, Scalar};

/// One curvature pair of the history.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationRecord<T: Scalar> {
    /// Scratch weight of the two-loop recursion
    pub alpha: T,
    /// Step between two consecutive accepted points, in primitive coordinates (s)
    pub step: DVector<T>,
    /// Difference of the primitive gradients at those points (y)
    pub grad_diff: DVector<T>,
}

impl<T: Scalar> IterationRecord<T> {
    fn zeros(dim: usize) -> Self {
        Self {
            alpha: T::zero(),
            step: DVector::zeros(dim),
            grad_diff: DVector::zeros(dim),
        }
    }
}

/// Ring buffer of curvature pairs.
#[derive(Debug, Clone)]
pub struct HistoryBuffer<T: Scalar> {
    records: Vec<IterationRecord<T>>,
    end: usize,
    k: usize,
    dim: usize,
}

impl<T: Scalar> HistoryBuffer<T> {
    /// Allocates `capacity` zero records of dimension `dim`.
    pub fn new(capacity: usize, dim: usize) -> Self {
        let mut buffer = Self {
            records: Vec::new(),
            end: 0,
            k: 0,
            dim,
        };
        buffer.reset(capacity, dim);
        buffer
    }

    /// Reallocates the ring and clears the cursor and update counter.
    pub fn reset(&mut self, capacity: usize, dim: usize) {
        self.records = (0..capacity).map(|_| IterationRecord::zeros(dim)).collect();
        self.end = 0;
        self.k = 0;
        self.dim = dim;
    }

    /// Overwrites the record under the cursor, then advances the cursor.
    ///
    /// Does nothing on a zero-capacity buffer.
    pub fn record(&mut self, step: DVector<T>, grad_diff: DVector<T>) {
        let capacity = self.capacity();
        if capacity == 0 {
            return;
        }
        let slot = &mut self.records[self.end];
        slot.alpha = T::zero();
        slot.step = step;
        slot.grad_diff = grad_diff;
        self.end = (self.end + 1) % capacity;
        self.k += 1;
    }

    /// Steps and gradient differences of the `bound` most recent records, oldest first.
    ///
    /// `bound` is clamped to the number of valid records.
    pub fn snapshot(&self, bound: usize) -> (Vec<&DVector<T>>, Vec<&DVector<T>>) {
        self.chronological(bound)
            .map(|r| (&r.step, &r.grad_diff))
            .unzip()
    }

    /// The `bound` most recent records in chronological order.
    pub fn chronological(&self, bound: usize) -> impl Iterator<Item = &IterationRecord<T>> + '_ {
        let capacity = self.capacity();
        let bound = bound.min(self.bound());
        // The newest record sits just before the cursor.
        let start = (self.end + capacity - bound) % capacity.max(1);
        (0..bound).map(move |i| &self.records[(start + i) % capacity])
    }

    /// Mutable access to the `bound` most recent records, oldest first.
    pub(crate) fn chronological_mut(&mut self, bound: usize) -> Vec<&mut IterationRecord<T>> {
        let capacity = self.capacity();
        let bound = bound.min(self.bound());
        let start = (self.end + capacity - bound) % capacity.max(1);
        let (tail, head) = self.records.split_at_mut(start);
        // Ring order from `start`: head, then wrap into tail.
        head.iter_mut().chain(tail.iter_mut()).take(bound).collect()
    }

    /// Number of valid records, `min(k, capacity)`.
    pub fn bound(&self) -> usize {
        self.k.min(self.capacity())
    }

    /// Total number of updates since the last reset.
    pub fn update_count(&self) -> usize {
        self.k
    }

    /// Write cursor.
    pub fn cursor(&self) -> usize {
        self.end
    }

    /// Number of slots in the ring.
    pub fn capacity(&self) -> usize {
        self.records.len()
    }

    /// Dimension of the stored vectors.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// True before the first update.
    pub fn is_empty(&self) -> bool {
        self.k == 0
    }
}
