//! OpenSearch query builders.

use serde_json::{json, Value};

/// Number of documents fetched per page when reading an index back.
pub const FETCH_PAGE_SIZE: usize = 1000;

/// Build a query matching every document of one data type.
pub fn build_type_query(data_type: &str) -> Value {
    json!({
        "query": {
            "term": { "type": data_type }
        }
    })
}

/// Build one page of a full index scan.
///
/// Pages are sorted on the document id and continued with `search_after`,
/// which keeps memory on the server side flat regardless of index size.
pub fn build_scan_page_query(size: usize, search_after: Option<&Value>) -> Value {
    let mut query = json!({
        "size": size,
        "query": { "match_all": {} },
        "sort": [ { "id": "asc" } ]
    });

    if let Some(after) = search_after {
        query["search_after"] = after.clone();
    }

    query
}
