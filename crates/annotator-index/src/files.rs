//! File names the analyzer writes into its output directory.

pub const ERRORS: &str = "errors.tsv";
pub const FIXES: &str = "fixes.tsv";
pub const CALL_GRAPH: &str = "call_graph.tsv";
pub const FIELD_GRAPH: &str = "field_graph.tsv";
pub const METHOD_INFO: &str = "method_info.tsv";
pub const CLASS_INFO: &str = "class_info.tsv";
pub const FIELD_INIT: &str = "field_init.tsv";

/// Every report file, in the order the loaders read them.
pub const ALL: [&str; 7] = [ERRORS, FIXES, CALL_GRAPH, FIELD_GRAPH, METHOD_INFO, CLASS_INFO, FIELD_INIT];
