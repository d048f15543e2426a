//! mock network files used in tests
use super::network::Network;
use super::parser::parse_network;

/// single edge A->B with cost `2*f+1`, 10 units from A to B
pub const SINGLE_EDGE: &str = "\
function aff (f) m*f+n
node A
node B
dedge AB A B aff 2 1
od A|B A B 10
";

/// two parallel edges A->B with costs `f+2` and `f/2+5`
pub const PARALLEL: &str = "\
function mul (f) m*f+n
function div (f) f/m+n
node A
node B
dedge fast A B mul 1 2
dedge slow A B div 2 5
od A|B A B 10
";

/// network cited from Braess (1968), 6 units from s to t
pub const BRAESS: &str = "\
# Braess paradox network
function slow (f) m*f
function plus (f) f+c   # free-flow cost c
node s
node a
node b
node t
dedge sa s a slow 10
dedge at a t plus 50
dedge sb s b plus 50
dedge bt b t slow 10
dedge ab a b plus 10
od s|t s t 6
";

/// one od pair whose origin equals its destination
pub const SELF_DEMAND: &str = "\
function aff (f) m*f+n
node A
node B
dedge AB A B aff 1 1
od A|A A A 5
od A|B A B 4
";

/// function with two parameters on line 2
pub const TWO_PARAMETERS: &str = "\
node A
function g (f, x) f*x+1
node B
";

/// no path from A to D
pub const DISCONNECTED: &str = "\
function aff (f) m*f+n
node A
node B
node C
node D
dedge AB A B aff 1 0
dedge CD C D aff 1 0
od A|D A D 5
";

/// two od pairs sharing the middle edge of a line A-B-C
pub const TWO_COMMODITIES: &str = "\
function aff (f) m*f+n
node A
node B
node C
edge AB A B aff 1 0
edge BC B C aff 1 1
od A|C A C 4
od B|C B C 2
";

pub fn mock_network(text: &str) -> Network {
    parse_network(text).unwrap()
}
