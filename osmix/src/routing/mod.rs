//! Routing engine: CSR graph construction, shortest-path
//! search under a choice of metric, and route reporting.

pub mod astar;
pub mod bidirectional;
pub mod dijkstra;
pub mod graph;
pub mod heap;
pub mod path;
pub mod stats;

pub use astar::astar;
pub use bidirectional::bidirectional_bfs;
pub use dijkstra::dijkstra;
pub use graph::{build_graph, default_speeds, find_nearest_routable, Edge, Graph};
pub use path::{Metric, PathSegment};
pub use stats::{route_path_info, route_statistics, RouteStatistics, WaySegment};
