//! Query dialect translation
//!
//! - `translator.rs` - outgoing URL tokens and incoming result envelopes
//! - `results.rs` - type resolution for result nodes

mod results;
mod translator;

pub use results::entity_type_name_for_node;
pub use translator::{
    COUNT_FALSE, COUNT_TRUE, INLINE_COUNT_ALL_PAGES, INLINE_COUNT_NONE, QueryResult,
    normalize_query_response, translate_query_url,
};
