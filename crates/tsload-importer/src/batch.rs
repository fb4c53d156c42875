//! Bounded point batches

use tsload_core::Point;

/// Default number of points per write
pub const DEFAULT_BATCH_SIZE: usize = 5000;

/// Collects points until a batch reaches capacity
#[derive(Debug)]
pub struct BatchAccumulator {
    points: Vec<Point>,
    capacity: usize,
}

impl BatchAccumulator {
    /// Create an empty accumulator; a capacity of zero is treated as one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a point to the current batch
    pub fn append(&mut self, point: Point) {
        self.points.push(point);
    }

    /// Points in the current batch
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Whether the current batch has reached capacity
    pub fn is_full(&self) -> bool {
        self.points.len() >= self.capacity
    }

    /// The current batch, without taking it
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Take the current batch and start a fresh one
    pub fn drain(&mut self) -> Vec<Point> {
        std::mem::replace(&mut self.points, Vec::with_capacity(self.capacity))
    }
}

impl Default for BatchAccumulator {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}
