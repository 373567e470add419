use std::path::Path;

use serde_json::{Map, Value};

use crate::error::PayloadError;
use crate::smax::{BulkPayload, EntityRecord, Operation};

/// Reads a CSV file and turns every data row into an entity of `entity_type`.
pub async fn read_bulk_payload(
    path: &Path,
    entity_type: &str,
    operation: Operation,
) -> Result<BulkPayload, PayloadError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| PayloadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    bulk_payload(&contents, entity_type, operation).ok_or_else(|| PayloadError::MissingHeader {
        path: path.to_path_buf(),
    })
}

/// The first line names the fields; cells are trimmed and empty ones become `null`.
/// Returns `None` when there is no header.
pub fn bulk_payload(contents: &str, entity_type: &str, operation: Operation) -> Option<BulkPayload> {
    let mut lines = contents.lines();

    let header = lines.next().map(str::trim).filter(|line| !line.is_empty())?;
    let headers: Vec<&str> = header.split(',').map(str::trim).collect();

    let entities = lines
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let values: Vec<&str> = line.split(',').map(str::trim).collect();

            let properties: Map<String, Value> = headers
                .iter()
                .enumerate()
                .map(|(index, field)| {
                    let value = values
                        .get(index)
                        .filter(|value| !value.is_empty())
                        .map_or(Value::Null, |value| Value::String((*value).to_string()));

                    ((*field).to_string(), value)
                })
                .collect();

            EntityRecord {
                entity_type: entity_type.to_string(),
                properties,
            }
        })
        .collect();

    Some(BulkPayload {
        entities,
        operation,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn single_row_create_payload() {
        let payload = bulk_payload("Id,DisplayLabel\n42,Hello\n", "Request", Operation::Create).unwrap();

        assert_eq!(
            serde_json::to_string(&payload).unwrap(),
            r#"{"entities":[{"entity_type":"Request","properties":{"Id":"42","DisplayLabel":"Hello"}}],"operation":"CREATE"}"#
        );
    }

    #[test]
    fn cells_are_trimmed_and_missing_cells_are_null() {
        let payload = bulk_payload(
            " Id , DisplayLabel , Priority \r\n 7 ,  ,\r\n\r\n8,Second\r\n",
            "Request",
            Operation::Update,
        )
        .unwrap();

        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "entities": [
                    {"entity_type": "Request", "properties": {"Id": "7", "DisplayLabel": null, "Priority": null}},
                    {"entity_type": "Request", "properties": {"Id": "8", "DisplayLabel": "Second", "Priority": null}}
                ],
                "operation": "UPDATE"
            })
        );
    }

    #[test]
    fn header_only_file_has_no_entities() {
        let payload = bulk_payload("Id,DisplayLabel\n", "Person", Operation::Create).unwrap();
        assert!(payload.entities.is_empty());
    }

    #[test]
    fn empty_file_has_no_header() {
        assert!(bulk_payload("", "Request", Operation::Create).is_none());
        assert!(bulk_payload("\n42,Hello\n", "Request", Operation::Create).is_none());
    }

    #[tokio::test]
    async fn reads_payload_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.csv");
        tokio::fs::write(&path, "Id,DisplayLabel\n42,Hello\n").await.unwrap();

        let payload = read_bulk_payload(&path, "Request", Operation::Create).await.unwrap();
        assert_eq!(payload.entities.len(), 1);
        assert_eq!(payload.entities[0].properties["DisplayLabel"], "Hello");
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let err = read_bulk_payload(Path::new("/nonexistent/records.csv"), "Request", Operation::Create)
            .await
            .unwrap_err();

        assert!(matches!(err, PayloadError::Io { .. }));
    }
}
