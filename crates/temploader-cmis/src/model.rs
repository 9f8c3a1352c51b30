//! Succinct JSON responses of the browser binding

use crate::error::CmisError;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use temploader::Handle;
use time::OffsetDateTime;

/// Part of a repository info response this crate needs
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryInfo {
    pub repository_id: String,
    pub root_folder_id: String,
    pub root_folder_url: String,
}

/// Pick `repository_id` out of a service document
pub fn parse_repositories(body: Value, repository_id: &str) -> Result<RepositoryInfo, CmisError> {
    let mut repositories: HashMap<String, RepositoryInfo> = serde_json::from_value(body)
        .map_err(|e| CmisError::Response(format!("invalid repository info: {}", e)))?;
    repositories
        .remove(repository_id)
        .ok_or_else(|| CmisError::RepositoryNotFound(repository_id.to_string()))
}

#[derive(Debug, Deserialize)]
struct SuccinctObject {
    #[serde(rename = "succinctProperties")]
    properties: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ChildEntry {
    object: SuccinctObject,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChildList {
    #[serde(default)]
    objects: Vec<ChildEntry>,
    #[serde(default)]
    has_more_items: bool,
}

/// One page of a children listing
#[derive(Debug)]
pub struct ChildPage {
    pub children: Vec<Handle>,
    pub has_more_items: bool,
}

fn string_property(properties: &Map<String, Value>, id: &str) -> Option<String> {
    match properties.get(id)? {
        Value::String(s) => Some(s.clone()),
        // multi-valued properties arrive as arrays
        Value::Array(values) => values.first().and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn integer_property(properties: &Map<String, Value>, id: &str) -> Option<i64> {
    match properties.get(id)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn into_handle(object: SuccinctObject) -> Result<Handle, CmisError> {
    let properties = &object.properties;
    let id = string_property(properties, "cmis:objectId")
        .ok_or_else(|| CmisError::Response("object without cmis:objectId".into()))?;
    let name = string_property(properties, "cmis:name").unwrap_or_default();

    // Dates are epoch milliseconds in succinct responses
    let last_modified = match integer_property(properties, "cmis:lastModificationDate") {
        Some(millis) => OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * 1_000_000)
            .map_err(|e| CmisError::Response(format!("invalid modification date on {}: {}", id, e)))?,
        None => OffsetDateTime::UNIX_EPOCH,
    };

    let handle = match string_property(properties, "cmis:baseTypeId").as_deref() {
        Some("cmis:folder") => Handle::folder(id, name, last_modified),
        _ => Handle::document(
            id,
            name,
            last_modified,
            string_property(properties, "cmis:contentStreamMimeType"),
            integer_property(properties, "cmis:contentStreamLength").map(|len| len.max(0) as u64),
        ),
    };
    Ok(handle)
}

/// Parse a `cmisselector=object` response
pub fn parse_object(body: Value) -> Result<Handle, CmisError> {
    let object: SuccinctObject = serde_json::from_value(body)
        .map_err(|e| CmisError::Response(format!("invalid object: {}", e)))?;
    into_handle(object)
}

/// `cmis:path` of a folder object response
pub fn object_path(body: &Value) -> Option<String> {
    let properties = body.get("succinctProperties")?.as_object()?;
    string_property(properties, "cmis:path")
}

/// Parse a `cmisselector=children` response
pub fn parse_children(body: Value) -> Result<ChildPage, CmisError> {
    let list: ChildList = serde_json::from_value(body)
        .map_err(|e| CmisError::Response(format!("invalid children listing: {}", e)))?;
    let children = list
        .objects
        .into_iter()
        .map(|entry| into_handle(entry.object))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ChildPage {
        children,
        has_more_items: list.has_more_items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use temploader::ObjectKind;

    #[test]
    fn test_parse_document() {
        let handle = parse_object(json!({
            "succinctProperties": {
                "cmis:objectId": "a1b2;1.0",
                "cmis:name": "view.ftl",
                "cmis:baseTypeId": "cmis:document",
                "cmis:lastModificationDate": 1_704_067_201_250i64,
                "cmis:contentStreamMimeType": "text/plain",
                "cmis:contentStreamLength": 42,
                "cmis:secondaryObjectTypeIds": ["P:cm:titled"]
            }
        }))
        .unwrap();

        assert_eq!(handle.id.as_ref(), "a1b2;1.0");
        assert_eq!(handle.name, "view.ftl");
        assert_eq!(handle.kind, ObjectKind::Document);
        assert_eq!(handle.last_modified_millis(), 1_704_067_201_250);
        assert_eq!(handle.mime_type.as_deref(), Some("text/plain"));
        assert_eq!(handle.content_length, Some(42));
    }

    #[test]
    fn test_parse_folder_without_date() {
        let handle = parse_object(json!({
            "succinctProperties": {
                "cmis:objectId": "f1",
                "cmis:name": "templates",
                "cmis:baseTypeId": "cmis:folder"
            }
        }))
        .unwrap();

        assert!(handle.is_folder());
        assert_eq!(handle.last_modified_millis(), 0);
        assert_eq!(handle.content_length, None);
    }

    #[test]
    fn test_object_path() {
        let body = json!({ "succinctProperties": {
            "cmis:objectId": "f1",
            "cmis:baseTypeId": "cmis:folder",
            "cmis:path": "/templates/email"
        } });
        assert_eq!(object_path(&body).as_deref(), Some("/templates/email"));

        let document = json!({ "succinctProperties": { "cmis:objectId": "d1" } });
        assert_eq!(object_path(&document), None);
    }

    #[test]
    fn test_object_without_id_is_rejected() {
        let result = parse_object(json!({ "succinctProperties": { "cmis:name": "x" } }));
        assert!(matches!(result, Err(CmisError::Response(_))));
    }

    #[test]
    fn test_parse_children_page() {
        let page = parse_children(json!({
            "objects": [
                { "object": { "succinctProperties": {
                    "cmis:objectId": "f2", "cmis:name": "email", "cmis:baseTypeId": "cmis:folder"
                } } },
                { "object": { "succinctProperties": {
                    "cmis:objectId": "d1", "cmis:name": "view.ftl", "cmis:baseTypeId": "cmis:document"
                } } }
            ],
            "hasMoreItems": true,
            "numItems": 3
        }))
        .unwrap();

        assert_eq!(page.children.len(), 2);
        assert_eq!(page.children[0].name, "email");
        assert!(page.children[1].is_document());
        assert!(page.has_more_items);

        let empty = parse_children(json!({ "objects": [], "numItems": 0 })).unwrap();
        assert!(empty.children.is_empty());
        assert!(!empty.has_more_items);
    }

    #[test]
    fn test_parse_repositories() {
        let body = json!({
            "A1": {
                "repositoryId": "A1",
                "repositoryName": "Main Repository",
                "rootFolderId": "100",
                "rootFolderUrl": "http://cmis/browser/A1/root",
                "repositoryUrl": "http://cmis/browser/A1"
            }
        });

        let info = parse_repositories(body.clone(), "A1").unwrap();
        assert_eq!(info.root_folder_id, "100");
        assert_eq!(info.root_folder_url, "http://cmis/browser/A1/root");

        assert!(matches!(
            parse_repositories(body, "B2"),
            Err(CmisError::RepositoryNotFound(_))
        ));
    }
}
