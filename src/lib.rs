//!
//! soflow computes the [System Optimum](https://en.wikipedia.org/wiki/Route_assignment)
//! traffic assignment of a road network with affine edge cost functions and
//! a multi-commodity origin-destination demand.
//!
//! ```text
//! function aff (f) m*f+n
//! node A
//! node B
//! dedge AB A B aff 2 1
//! od A|B A B 10
//! ```
//!
pub mod so_flow;
