//! Heuristic extraction of normalized job records from raw feed items.

mod extractor;

pub use extractor::{RawItem, extract_record, synthesize_external_id};
