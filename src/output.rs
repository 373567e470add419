use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::config::OutputMode;
use crate::error::OutputError;
use crate::smax::{Attachment, AttachmentList};

/// Subfolder of the output folder that receives one file per entity.
pub const JSON_SUBFOLDER: &str = "json_field";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpSummary {
    Printed,
    Saved { written: usize, folder: PathBuf },
}

/// Prints or persists an entity-array document, after replacing the
/// configured stringified-JSON fields with their parsed value.
#[derive(Debug, Clone)]
pub struct JsonDump {
    output: OutputMode,
    folder: Option<PathBuf>,
    fields: Vec<String>,
}

impl JsonDump {
    pub const fn new(output: OutputMode, folder: Option<PathBuf>, fields: Vec<String>) -> Self {
        Self {
            output,
            folder,
            fields,
        }
    }

    pub async fn dump(&self, mut document: Value) -> Result<DumpSummary, OutputError> {
        convert_embedded_fields(&mut document, &self.fields);

        let entities = document
            .get("entities")
            .and_then(Value::as_array)
            .ok_or(OutputError::MissingEntities)?;

        match self.output {
            OutputMode::Console => {
                println!("{}", serde_json::to_string_pretty(&document)?);
                Ok(DumpSummary::Printed)
            }
            OutputMode::File => {
                let folder = self
                    .folder
                    .as_ref()
                    .ok_or(OutputError::MissingFolder)?
                    .join(JSON_SUBFOLDER);
                create_dir(&folder).await?;

                let mut written = 0;
                for entity in entities {
                    let Some(id) = entity.pointer("/properties/Id").and_then(id_string) else {
                        tracing::warn!("Entity does not contain 'Id' property, skipping");
                        continue;
                    };

                    let path = folder.join(format!("{id}.json"));
                    write_file(&path, serde_json::to_string_pretty(entity)?.as_bytes()).await?;
                    written += 1;
                }

                Ok(DumpSummary::Saved { written, folder })
            }
        }
    }
}

/// Replaces string properties that hold a JSON object with the object itself.
pub fn convert_embedded_fields(document: &mut Value, fields: &[String]) {
    let Some(entities) = document.get_mut("entities").and_then(Value::as_array_mut) else {
        return;
    };

    for properties in entities
        .iter_mut()
        .filter_map(|entity| entity.get_mut("properties").and_then(Value::as_object_mut))
    {
        for field in fields {
            let Some(Value::String(raw)) = properties.get(field) else {
                continue;
            };

            if !(raw.starts_with('{') && raw.ends_with('}')) {
                continue;
            }

            match serde_json::from_str::<Value>(raw) {
                Ok(parsed) => {
                    properties.insert(field.clone(), parsed);
                }
                Err(err) => {
                    tracing::warn!(field = %field, error = %err, "Could not parse field in entity");
                }
            }
        }
    }
}

fn id_string(id: &Value) -> Option<String> {
    match id {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// Collects the attachments stored as stringified JSON in `field` of every entity.
pub fn attachments(document: &Value, field: &str) -> Result<Vec<Attachment>, OutputError> {
    let entities = document
        .get("entities")
        .and_then(Value::as_array)
        .ok_or(OutputError::MissingEntities)?;

    let mut found = Vec::new();

    for entity in entities {
        let Some(record_id) = entity.pointer("/properties/Id").and_then(id_string) else {
            tracing::warn!("Entity does not contain 'Id' property, skipping");
            continue;
        };

        let list = match entity.get("properties").and_then(|properties| properties.get(field)) {
            Some(Value::String(raw)) => serde_json::from_str::<AttachmentList>(raw),
            Some(value @ Value::Object(_)) => serde_json::from_value::<AttachmentList>(value.clone()),
            _ => continue,
        };

        match list {
            Ok(list) => found.extend(list.items.into_iter().map(|item| Attachment {
                record_id: record_id.clone(),
                id: item.properties.id,
                file_name: item.properties.file_name,
                file_extension: item.properties.file_extension,
                is_hidden: item.properties.is_hidden,
            })),
            Err(err) => {
                tracing::warn!(record_id = %record_id, error = %err, "Could not parse attachments");
            }
        }
    }

    Ok(found)
}

pub fn describe_attachment(attachment: &Attachment) -> String {
    format!(
        "Record ID:{}, File ID:{}, File Name:{}, Extension:{}, Is Hidden:{}",
        attachment.record_id,
        attachment.id,
        attachment.file_name,
        attachment.file_extension,
        attachment.is_hidden
    )
}

/// Where a downloaded attachment is stored: `{folder}/{record id}/{file name}`.
/// Only the final component of a name is used.
pub fn attachment_path(folder: &Path, attachment: &Attachment) -> PathBuf {
    let name = Path::new(&attachment.file_name)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| {
            if attachment.file_extension.is_empty() {
                attachment.id.clone()
            } else {
                format!("{}.{}", attachment.id, attachment.file_extension)
            }
        });

    let record = Path::new(&attachment.record_id)
        .file_name()
        .map_or_else(|| "unknown".to_string(), |id| id.to_string_lossy().into_owned());

    folder.join(record).join(name)
}

pub async fn save_attachment(
    folder: &Path,
    attachment: &Attachment,
    contents: &[u8],
) -> Result<PathBuf, OutputError> {
    let path = attachment_path(folder, attachment);

    if let Some(parent) = path.parent() {
        create_dir(parent).await?;
    }
    write_file(&path, contents).await?;

    Ok(path)
}

async fn create_dir(path: &Path) -> Result<(), OutputError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| OutputError::Io {
            path: path.to_path_buf(),
            source,
        })
}

async fn write_file(path: &Path, contents: &[u8]) -> Result<(), OutputError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| OutputError::Io {
            path: path.to_path_buf(),
            source,
        })
}
