// Orchestration: batch fetching plus the research and discovery flows.

pub mod batch;
pub mod discover;
pub mod research;
