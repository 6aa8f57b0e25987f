// Trendscope: keyword trend research and opportunity discovery
//
// This is the library root. `trends` and `cache` fetch and persist upstream
// data, `analysis` turns it into metrics and scores, `pipeline` wires the
// two together for the CLI flows.

pub mod analysis;
pub mod cache;
pub mod config;
pub mod output;
pub mod pipeline;
pub mod trends;
