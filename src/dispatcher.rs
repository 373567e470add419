use std::fmt::Write as _;

use crate::config::{Action, ConnectionConfig, OutputMode};
use crate::error::{DispatchError, OutputError, PayloadError};
use crate::output::{self, DumpSummary, JsonDump};
use crate::payload;
use crate::smax::{BulkPayload, Operation, RequestPipeline, Verb};

/// Runs the configured action through the pipeline, or describes it when
/// `verbose` is set.
pub struct ActionDispatcher<'a> {
    config: &'a ConnectionConfig,
    pipeline: &'a RequestPipeline<'a>,
}

impl<'a> ActionDispatcher<'a> {
    pub const fn new(config: &'a ConnectionConfig, pipeline: &'a RequestPipeline<'a>) -> Self {
        Self { config, pipeline }
    }

    pub async fn run(&self) -> Result<String, DispatchError> {
        if self.config.verbose {
            return self.describe().await;
        }

        match self.config.action {
            Action::Get => self.get_data().await,
            Action::Create => self.post_data(Operation::Create).await,
            Action::Update => self.post_data(Operation::Update).await,
            Action::Json => self.json_action().await,
            Action::GetAttachments => self.attachments_action().await,
        }
    }

    async fn get_data(&self) -> Result<String, DispatchError> {
        let url = self.pipeline.urls().entity_url(&self.config.layout);
        let response = self
            .pipeline
            .execute(Action::Get, &url, Verb::Get, None)
            .await?;

        Ok(response.pretty())
    }

    async fn post_data(&self, operation: Operation) -> Result<String, DispatchError> {
        let payload = self.bulk_payload(operation).await?;
        let body = serde_json::to_string(&payload).map_err(PayloadError::from)?;

        tracing::info!(records = payload.entities.len(), "Posting bulk payload");

        let url = self.pipeline.urls().bulk_url();
        let response = self
            .pipeline
            .execute(self.config.action, &url, Verb::Post, Some(body))
            .await?;

        Ok(response.pretty())
    }

    async fn json_action(&self) -> Result<String, DispatchError> {
        let url = self
            .pipeline
            .urls()
            .entity_url(&self.config.json_action_field);
        let response = self
            .pipeline
            .execute(Action::Json, &url, Verb::Get, None)
            .await?;

        let dump = JsonDump::new(
            self.config.json_action_output,
            self.config.json_action_output_folder.clone(),
            self.config.json_action_fields(),
        );

        Ok(match dump.dump(response.body).await? {
            DumpSummary::Printed => "JSON field is printed".to_string(),
            DumpSummary::Saved { written, folder } => {
                format!("JSON field is saved: {written} file(s) in {}", folder.display())
            }
        })
    }

    async fn attachments_action(&self) -> Result<String, DispatchError> {
        let field = &self.config.att_action_field;
        let url = self.pipeline.urls().entity_url(field);
        let response = self
            .pipeline
            .execute(Action::GetAttachments, &url, Verb::Get, None)
            .await?;

        let found = output::attachments(&response.body, field)?;

        match self.config.att_action_output {
            OutputMode::Console => {
                for attachment in &found {
                    println!("{}", output::describe_attachment(attachment));
                }

                Ok(format!("{} attachment(s) found", found.len()))
            }
            OutputMode::File => {
                let folder = self
                    .config
                    .att_action_output_folder
                    .as_deref()
                    .ok_or(OutputError::MissingFolder)?;

                for (index, attachment) in found.iter().enumerate() {
                    let url = self.pipeline.urls().file_url(&attachment.id);
                    let contents = self
                        .pipeline
                        .execute_raw(Action::GetAttachments, &url)
                        .await?;
                    let path = output::save_attachment(folder, attachment, &contents).await?;

                    tracing::info!(
                        "[Attachment] [{}/{}] Saved {}",
                        index + 1,
                        found.len(),
                        path.display()
                    );
                }

                Ok(format!(
                    "{} attachment(s) saved to {}",
                    found.len(),
                    folder.display()
                ))
            }
        }
    }

    async fn bulk_payload(&self, operation: Operation) -> Result<BulkPayload, PayloadError> {
        let path = self.config.csv.as_deref().ok_or(PayloadError::MissingCsv)?;

        payload::read_bulk_payload(path, &self.config.entity, operation).await
    }

    /// What would be sent, without touching the network.
    pub async fn describe(&self) -> Result<String, DispatchError> {
        let urls = self.pipeline.urls();
        let auth_body = serde_json::to_string_pretty(&self.pipeline.auth_body())
            .map_err(PayloadError::from)?;

        let mut out = String::new();
        let _ = writeln!(out, "Request parameters:");
        let _ = writeln!(out, "1) Authorization URL: {}", urls.authorization_url());
        let _ = writeln!(out, "Authorization body:\n{auth_body}\n");

        let (verb, operation) = match self.config.action {
            Action::Get => {
                let _ = writeln!(out, "2) URL: {}", urls.entity_url(&self.config.layout));
                (Verb::Get, None)
            }
            Action::Json => {
                let _ = writeln!(
                    out,
                    "2) URL: {}",
                    urls.entity_url(&self.config.json_action_field)
                );
                (Verb::Get, None)
            }
            Action::GetAttachments => {
                let _ = writeln!(
                    out,
                    "2)\n\tURL 1: {}\n\tURL 2: {}",
                    urls.entity_url(&self.config.att_action_field),
                    urls.file_url("<File ID from previous request>")
                );
                (Verb::Get, None)
            }
            Action::Create => {
                let _ = writeln!(out, "2) URL: {}", urls.bulk_url());
                (Verb::Post, Some(Operation::Create))
            }
            Action::Update => {
                let _ = writeln!(out, "2) URL: {}", urls.bulk_url());
                (Verb::Post, Some(Operation::Update))
            }
        };

        let _ = writeln!(out, "3) Action: {}", self.config.action);
        let _ = writeln!(out, "4) HTTP action: <{verb}>");

        if let Some(operation) = operation {
            let payload = self.bulk_payload(operation).await?;
            let body = serde_json::to_string_pretty(&payload).map_err(PayloadError::from)?;
            let _ = writeln!(out, "5) POST Body:\n{body}");
        }

        Ok(out)
    }
}
