//! Structural memory estimates.
//!
//! An estimate is a tree of named components, each sized from the node count
//! and the concurrency of a run. It describes what the engine will allocate,
//! it does not measure anything.

use itertools::Itertools;
use log::debug;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRange {
    min: u64,
    max: u64,
}

impl MemoryRange {
    pub fn of(bytes: u64) -> Self {
        Self {
            min: bytes,
            max: bytes,
        }
    }

    pub fn of_range(min: u64, max: u64) -> Self {
        debug_assert!(min <= max);
        Self { min, max }
    }

    pub fn empty() -> Self {
        Self::of(0)
    }

    pub fn min(&self) -> u64 {
        self.min
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    pub fn add(&self, other: MemoryRange) -> Self {
        Self {
            min: self.min.saturating_add(other.min),
            max: self.max.saturating_add(other.max),
        }
    }

    pub fn times(&self, count: u64) -> Self {
        Self {
            min: self.min.saturating_mul(count),
            max: self.max.saturating_mul(count),
        }
    }
}

impl fmt::Display for MemoryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            write!(f, "{}", human_readable(self.min))
        } else {
            write!(
                f,
                "[{} ... {}]",
                human_readable(self.min),
                human_readable(self.max)
            )
        }
    }
}

fn human_readable(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["Bytes", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

type PerNode = Box<dyn Fn(u64) -> MemoryRange + Send + Sync>;

enum Component {
    Fixed(String, MemoryRange),
    PerNode(String, PerNode),
    PerThread(String, MemoryRange),
    Nested(MemoryEstimation),
}

pub struct MemoryEstimation {
    description: String,
    components: Vec<Component>,
}

impl MemoryEstimation {
    pub fn builder(description: &str) -> MemoryEstimationBuilder {
        MemoryEstimationBuilder {
            estimation: MemoryEstimation {
                description: String::from(description),
                components: vec![],
            },
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn estimate(&self, node_count: u64, concurrency: usize) -> MemoryTree {
        let components = self
            .components
            .iter()
            .map(|component| match component {
                Component::Fixed(description, range) => MemoryTree::leaf(description, *range),
                Component::PerNode(description, f) => MemoryTree::leaf(description, f(node_count)),
                Component::PerThread(description, range) => {
                    MemoryTree::leaf(description, range.times(concurrency as u64))
                }
                Component::Nested(estimation) => estimation.estimate(node_count, concurrency),
            })
            .collect_vec();
        let memory_usage = components
            .iter()
            .fold(MemoryRange::empty(), |acc, tree| acc.add(tree.memory_usage));
        MemoryTree {
            description: self.description.clone(),
            memory_usage,
            components,
        }
    }
}

pub struct MemoryEstimationBuilder {
    estimation: MemoryEstimation,
}

impl MemoryEstimationBuilder {
    pub fn fixed(mut self, description: &str, range: MemoryRange) -> Self {
        self.estimation
            .components
            .push(Component::Fixed(String::from(description), range));
        self
    }

    pub fn per_node<F>(mut self, description: &str, f: F) -> Self
    where
        F: Fn(u64) -> MemoryRange + Send + Sync + 'static,
    {
        self.estimation
            .components
            .push(Component::PerNode(String::from(description), Box::new(f)));
        self
    }

    pub fn per_thread(mut self, description: &str, range: MemoryRange) -> Self {
        self.estimation
            .components
            .push(Component::PerThread(String::from(description), range));
        self
    }

    pub fn add(mut self, estimation: MemoryEstimation) -> Self {
        self.estimation.components.push(Component::Nested(estimation));
        self
    }

    pub fn build(self) -> MemoryEstimation {
        self.estimation
    }
}

/// The result of applying a [`MemoryEstimation`] to concrete dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryTree {
    description: String,
    memory_usage: MemoryRange,
    components: Vec<MemoryTree>,
}

impl MemoryTree {
    fn leaf(description: &str, memory_usage: MemoryRange) -> Self {
        Self {
            description: String::from(description),
            memory_usage,
            components: vec![],
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn memory_usage(&self) -> MemoryRange {
        self.memory_usage
    }

    pub fn components(&self) -> &[MemoryTree] {
        &self.components
    }

    fn render(&self, depth: usize) -> String {
        let line = format!(
            "{}{}: {}",
            "  ".repeat(depth),
            self.description,
            self.memory_usage
        );
        std::iter::once(line)
            .chain(self.components.iter().map(|c| c.render(depth + 1)))
            .join("\n")
    }
}

impl fmt::Display for MemoryTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(0))
    }
}

/// Available system memory in bytes, if the platform reports it.
pub fn available_memory() -> Option<u64> {
    match sys_info::mem_info() {
        Ok(info) => Some(info.avail.saturating_mul(1024)),
        Err(e) => {
            debug!("available memory unknown: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimation() -> MemoryEstimation {
        MemoryEstimation::builder("root")
            .fixed("header", MemoryRange::of(16))
            .per_node("values", |n| MemoryRange::of(8 * n))
            .per_thread("buffers", MemoryRange::of_range(10, 20))
            .add(
                MemoryEstimation::builder("nested")
                    .per_node("bits", |n| MemoryRange::of((n + 63) / 64 * 8))
                    .build(),
            )
            .build()
    }

    #[test]
    fn test_estimate() {
        let tree = estimation().estimate(100, 4);
        assert_eq!(
            tree.memory_usage(),
            MemoryRange::of_range(16 + 800 + 40 + 16, 16 + 800 + 80 + 16)
        );
        assert_eq!(tree.components().len(), 4);
        assert_eq!(tree.components()[3].description(), "nested");
        assert_eq!(tree.components()[3].memory_usage(), MemoryRange::of(16));
    }

    #[test]
    fn test_display() {
        assert_eq!(MemoryRange::of(512).to_string(), "512 Bytes");
        assert_eq!(MemoryRange::of(2048).to_string(), "2.00 KiB");
        assert_eq!(
            MemoryRange::of_range(1, 1024 * 1024).to_string(),
            "[1 Bytes ... 1.00 MiB]"
        );
        let rendered = estimation().estimate(1, 1).to_string();
        assert_eq!(
            rendered,
            "root: [42 Bytes ... 52 Bytes]\n  header: 16 Bytes\n  values: 8 Bytes\n  \
             buffers: [10 Bytes ... 20 Bytes]\n  nested: 8 Bytes\n    bits: 8 Bytes"
        );
    }

    #[test]
    fn test_saturating() {
        let range = MemoryRange::of(u64::MAX).add(MemoryRange::of(1)).times(2);
        assert_eq!(range, MemoryRange::of(u64::MAX));
    }
}
