//! Merging of several networks into one
//!
//! - `column_matcher`: identity column per network
//! - `matching_table`: which source columns feed which output column
//! - `engine`: set combination of nodes and edges
//! - `assembler`: builds the merged network, tables and view
//! - `session`: selection and options state around a merge

pub mod assembler;
pub mod column_matcher;
pub mod engine;
pub mod matching_table;
pub mod session;

pub use assembler::{create_merged_network_with_view, MergeContext};
pub use column_matcher::MatchingColumns;
pub use engine::{combine, CombinedNetwork, Identity, MergeOptions, MergeType};
pub use matching_table::{
    create_matching_table, MatchedColumn, MatchingTable, MatchingTableRow, MatchingTableStore,
    TableKind,
};
pub use session::{MergeSession, DEFAULT_OUTPUT_NAME};
