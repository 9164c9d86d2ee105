//! Reference computations.

pub use connected_components::ConnectedComponents;
pub use page_rank::PageRank;
pub use shortest_paths::ShortestPaths;

mod connected_components;
mod page_rank;
mod shortest_paths;
