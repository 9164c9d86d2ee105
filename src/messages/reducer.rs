//! Message combiners.

/// A commutative, associative function folding all messages sent to one node
/// within a superstep into a single value.
pub trait Reducer: Send + Sync {
    /// The value a destination starts from before its first message.
    fn identity(&self) -> f64;

    fn reduce(&self, current: f64, message: f64) -> f64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sum;

impl Reducer for Sum {
    fn identity(&self) -> f64 {
        0.0
    }

    fn reduce(&self, current: f64, message: f64) -> f64 {
        current + message
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Min;

impl Reducer for Min {
    fn identity(&self) -> f64 {
        f64::INFINITY
    }

    fn reduce(&self, current: f64, message: f64) -> f64 {
        current.min(message)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Max;

impl Reducer for Max {
    fn identity(&self) -> f64 {
        f64::NEG_INFINITY
    }

    fn reduce(&self, current: f64, message: f64) -> f64 {
        current.max(message)
    }
}

/// Counts messages, ignoring their values.
#[derive(Debug, Clone, Copy, Default)]
pub struct Count;

impl Reducer for Count {
    fn identity(&self) -> f64 {
        0.0
    }

    fn reduce(&self, current: f64, _message: f64) -> f64 {
        current + 1.0
    }
}
