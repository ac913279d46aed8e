//! Event dispatching
//!
//! The [`EventPipeline`] owns everything resolved at startup (mappings with
//! prepared action flows, the rule catalog, the state stores) and turns one
//! raw payload into one response:
//!
//! 1. Normalize the payload into an [`Event`](crate::events::Event)
//! 2. Match it against the mapping table
//! 3. Drop duplicate mappings
//! 4. Run each remaining mapping's action flow, in match order
//! 5. Merge the partial responses
//! 6. Render the per-kind wire format
//!
//! Mappings are isolated from each other: an aborted flow only loses its own
//! contribution, unless the mapping is marked critical.

pub mod pipeline;

pub use pipeline::{EventPipeline, COUNTERS_DIR, RECORDS_FILE};
