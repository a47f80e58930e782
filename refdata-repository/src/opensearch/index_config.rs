//! OpenSearch index configuration and mappings.
//!
//! Two indices are maintained: one for vocabulary terms and one for
//! organizations. Both are created up front if absent; there is no migration
//! path, an index with an incompatible mapping has to be deleted first.

use serde_json::{json, Value};

/// Index holding every vocabulary term, all data types mixed.
pub const REFERENCE_DATA_INDEX: &str = "reference_data";

/// Index holding organizations and sub-units.
pub const ORGANIZATION_DATA_INDEX: &str = "organization_data";

/// An index name together with its settings and mappings.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    pub name: String,
    pub schema: Value,
}

impl IndexSpec {
    /// Both reference data indices.
    pub fn all() -> Vec<IndexSpec> {
        vec![
            IndexSpec {
                name: REFERENCE_DATA_INDEX.to_string(),
                schema: reference_data_schema(),
            },
            IndexSpec {
                name: ORGANIZATION_DATA_INDEX.to_string(),
                schema: organization_data_schema(),
            },
        ]
    }
}

fn settings() -> Value {
    json!({
        "number_of_shards": 1,
        "number_of_replicas": 1
    })
}

/// Properties shared by both indices.
fn common_properties() -> serde_json::Map<String, Value> {
    let properties = json!({
        "id": { "type": "keyword" },
        "type": { "type": "keyword" },
        "code": { "type": "keyword" },
        "uri": { "type": "keyword" },
        "scheme": { "type": "keyword" },
        "same_as": { "type": "keyword" },
        "label": {
            "type": "object",
            "dynamic": true
        }
    });

    match properties {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}

/// Settings and mappings of the vocabulary term index.
pub fn reference_data_schema() -> Value {
    let mut properties = common_properties();
    properties.insert("parent_ids".to_string(), json!({ "type": "keyword" }));
    properties.insert("child_ids".to_string(), json!({ "type": "keyword" }));
    properties.insert("has_children".to_string(), json!({ "type": "boolean" }));
    properties.insert("wkt".to_string(), json!({ "type": "keyword", "index": false }));
    properties.insert("input_file_format".to_string(), json!({ "type": "keyword" }));
    properties.insert("output_format_version".to_string(), json!({ "type": "keyword" }));
    properties.insert("internal_code".to_string(), json!({ "type": "keyword" }));

    json!({
        "settings": settings(),
        "mappings": {
            "properties": properties
        }
    })
}

/// Settings and mappings of the organization index.
pub fn organization_data_schema() -> Value {
    let mut properties = common_properties();
    properties.insert("parent_id".to_string(), json!({ "type": "keyword" }));
    properties.insert("org_csc".to_string(), json!({ "type": "keyword" }));

    json!({
        "settings": settings(),
        "mappings": {
            "properties": properties
        }
    })
}
