use std::{fmt, path::PathBuf, str::FromStr, time::Duration};

use anyhow::Context;
use clap::{parser::ValueSource, ArgMatches, FromArgMatches, Parser};

use crate::error::ValidationError;

/// Tenant ids at or below this value are rejected.
pub const MIN_TENANT_ID: u64 = 10_000_000;

/// Options that may appear in a `--config-file`, by clap argument id.
const CONFIG_KEYS: &[&str] = &[
    "action",
    "csv",
    "entity",
    "filter",
    "layout",
    "password",
    "smax_protocol",
    "smax_host",
    "smax_port",
    "smax_secure_port",
    "tenant",
    "username",
    "verbose",
    "json_action_field",
    "json_action_output",
    "json_action_output_folder",
    "att_action_field",
    "att_action_output",
    "att_action_output_folder",
    "request_timeout_secs",
];

#[derive(Debug, Clone, Parser)]
#[command(name = "smax-client", about = "Command-line client for the SMAX REST API")]
pub struct Cli {
    /// Action (GET is default, CREATE, UPDATE, JSON, GETATTACHMENTS)
    #[arg(long, default_value = "GET")]
    pub action: String,

    /// Full name of a key=value config file
    #[arg(long)]
    pub config_file: Option<PathBuf>,

    /// CSV file name (required if action is not GET)
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Entity name
    #[arg(short, long, default_value = "Request")]
    pub entity: String,

    /// Filter (like "Id='52641'")
    #[arg(long)]
    pub filter: Option<String>,

    /// Layout (fields)
    #[arg(short, long, default_value = "Id,DisplayLabel")]
    pub layout: String,

    #[arg(short = 'P', long, env = "SMAX_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Protocol (http | https)
    #[arg(short = 'p', long, default_value = "https")]
    pub smax_protocol: String,

    /// FQDN of the SMAX server
    #[arg(short = 's', long)]
    pub smax_host: Option<String>,

    /// Connection port
    #[arg(short = 'c', long, default_value_t = 80)]
    pub smax_port: u16,

    /// HTTPS port
    #[arg(short = 'z', long, default_value_t = 443)]
    pub smax_secure_port: u16,

    /// Tenant ID
    #[arg(short, long)]
    pub tenant: Option<u64>,

    #[arg(short = 'U', long, env = "SMAX_USERNAME")]
    pub username: Option<String>,

    /// Describe the requests instead of sending them
    #[arg(short, long)]
    pub verbose: bool,

    /// Field(s) requested by the JSON action, comma separated
    #[arg(long)]
    pub json_action_field: Option<String>,

    /// JSON action output (console | file)
    #[arg(long, default_value = "console")]
    pub json_action_output: String,

    #[arg(long)]
    pub json_action_output_folder: Option<PathBuf>,

    /// Field holding the attachments
    #[arg(long)]
    pub att_action_field: Option<String>,

    /// Attachments action output (console | file)
    #[arg(long, default_value = "console")]
    pub att_action_output: String,

    #[arg(long)]
    pub att_action_output_folder: Option<PathBuf>,

    /// Optional deadline for every HTTP exchange, in seconds
    #[arg(long)]
    pub request_timeout_secs: Option<u64>,
}

impl Cli {
    /// Builds the options from parsed arguments and fills everything the
    /// command line left unset from `--config-file`.
    pub fn from_matches(matches: &ArgMatches) -> anyhow::Result<Self> {
        let mut cli = Self::from_arg_matches(matches).context("Failed to read arguments")?;

        if let Some(path) = cli.config_file.clone() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Impossible to open the config file: {}", path.display()))?;

            cli.merge_config(&contents, matches)
                .with_context(|| format!("Invalid config file: {}", path.display()))?;
        }

        Ok(cli)
    }

    pub fn merge_config(
        &mut self,
        contents: &str,
        matches: &ArgMatches,
    ) -> Result<(), ValidationError> {
        for (number, line) in contents.lines().enumerate() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(ValidationError::new(format!(
                    "line {}: expected key=value",
                    number + 1
                )));
            };

            let id = key.trim().replace('-', "_");

            if !CONFIG_KEYS.contains(&id.as_str()) {
                return Err(ValidationError::new(format!(
                    "line {}: unrecognised option '{}'",
                    number + 1,
                    key.trim()
                )));
            }

            if matches!(
                matches.value_source(&id),
                Some(ValueSource::CommandLine | ValueSource::EnvVariable)
            ) {
                tracing::debug!(option = %id, "config file value overridden");
                continue;
            }

            self.set_option(&id, value.trim())?;
        }

        Ok(())
    }

    fn set_option(&mut self, id: &str, value: &str) -> Result<(), ValidationError> {
        match id {
            "action" => self.action = value.to_string(),
            "csv" => self.csv = Some(PathBuf::from(value)),
            "entity" => self.entity = value.to_string(),
            "filter" => self.filter = Some(value.to_string()),
            "layout" => self.layout = value.to_string(),
            "password" => self.password = Some(value.to_string()),
            "smax_protocol" => self.smax_protocol = value.to_string(),
            "smax_host" => self.smax_host = Some(value.to_string()),
            "smax_port" => self.smax_port = parse_number(id, value)?,
            "smax_secure_port" => self.smax_secure_port = parse_number(id, value)?,
            "tenant" => self.tenant = Some(parse_number(id, value)?),
            "username" => self.username = Some(value.to_string()),
            "verbose" => self.verbose = parse_flag(id, value)?,
            "json_action_field" => self.json_action_field = Some(value.to_string()),
            "json_action_output" => self.json_action_output = value.to_string(),
            "json_action_output_folder" => {
                self.json_action_output_folder = Some(PathBuf::from(value));
            }
            "att_action_field" => self.att_action_field = Some(value.to_string()),
            "att_action_output" => self.att_action_output = value.to_string(),
            "att_action_output_folder" => {
                self.att_action_output_folder = Some(PathBuf::from(value));
            }
            "request_timeout_secs" => self.request_timeout_secs = Some(parse_number(id, value)?),
            _ => return Err(ValidationError::new(format!("unrecognised option '{id}'"))),
        }

        Ok(())
    }
}

fn parse_number<T: FromStr>(id: &str, value: &str) -> Result<T, ValidationError> {
    value
        .parse()
        .map_err(|_| ValidationError::new(format!("'{value}' is not a valid value for {id}")))
}

fn parse_flag(id: &str, value: &str) -> Result<bool, ValidationError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ValidationError::new(format!(
            "'{value}' is not a valid value for {id}"
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http,
    Https,
}

impl FromStr for Protocol {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.eq_ignore_ascii_case("http") {
            Ok(Self::Http)
        } else if value.eq_ignore_ascii_case("https") {
            Ok(Self::Https)
        } else {
            Err(ValidationError::new(
                "Unsupported protocol. Acceptable values are: http, https.",
            ))
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => f.write_str("http"),
            Self::Https => f.write_str("https"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Get,
    Create,
    Update,
    Json,
    GetAttachments,
}

impl FromStr for Action {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "GET" => Ok(Self::Get),
            "CREATE" => Ok(Self::Create),
            "UPDATE" => Ok(Self::Update),
            "JSON" => Ok(Self::Json),
            "GETATTACHMENTS" => Ok(Self::GetAttachments),
            _ => Err(ValidationError::new(
                "Action should be GET | UPDATE | CREATE | JSON | GETATTACHMENTS",
            )),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Json => "JSON",
            Self::GetAttachments => "GETATTACHMENTS",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Console,
    File,
}

impl FromStr for OutputMode {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.eq_ignore_ascii_case("console") {
            Ok(Self::Console)
        } else if value.eq_ignore_ascii_case("file") {
            Ok(Self::File)
        } else {
            Err(ValidationError::new(
                "Acceptable action's output values are: file, console.",
            ))
        }
    }
}

/// Validated connection and action settings, built once per process.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
    pub secure_port: u16,
    pub tenant: u64,
    pub entity: String,
    pub layout: String,
    pub username: String,
    pub password: String,
    pub filter: Option<String>,
    pub action: Action,
    pub csv: Option<PathBuf>,
    pub verbose: bool,
    pub json_action_field: String,
    pub json_action_output: OutputMode,
    pub json_action_output_folder: Option<PathBuf>,
    pub att_action_field: String,
    pub att_action_output: OutputMode,
    pub att_action_output_folder: Option<PathBuf>,
    pub request_timeout: Option<Duration>,
}

impl ConnectionConfig {
    /// Port the main request connects to.
    pub const fn connect_port(&self) -> u16 {
        match self.protocol {
            Protocol::Http => self.port,
            Protocol::Https => self.secure_port,
        }
    }

    /// The comma separated JSON action field split into field names.
    pub fn json_action_fields(&self) -> Vec<String> {
        self.json_action_field
            .split(',')
            .map(str::trim)
            .filter(|field| !field.is_empty())
            .map(ToString::to_string)
            .collect()
    }
}

fn required(value: Option<String>, message: &str) -> Result<String, ValidationError> {
    value
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ValidationError::new(message))
}

impl TryFrom<Cli> for ConnectionConfig {
    type Error = ValidationError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let host = required(cli.smax_host, "Host should not be EMPTY.")?;

        if cli.entity.trim().is_empty() {
            return Err(ValidationError::new("Entity should not be EMPTY."));
        }

        let tenant = cli
            .tenant
            .filter(|tenant| *tenant > MIN_TENANT_ID)
            .ok_or_else(|| {
                ValidationError::new(format!("Tenant ID should be greater than {MIN_TENANT_ID}."))
            })?;

        if cli.layout.trim().is_empty() {
            return Err(ValidationError::new("Layout should not be EMPTY."));
        }

        let username = required(cli.username, "Username should not be EMPTY.")?;
        let password = required(cli.password, "Password should not be EMPTY.")?;

        if cli.smax_port == 0 || cli.smax_secure_port == 0 {
            return Err(ValidationError::new(
                "Port should be in the range [1, 65535]",
            ));
        }

        let protocol: Protocol = cli.smax_protocol.parse()?;
        let action: Action = cli.action.parse()?;

        let csv = cli.csv.filter(|path| !path.as_os_str().is_empty());
        if action != Action::Get && csv.is_none() {
            return Err(ValidationError::new("CSV is mandatory for CREATE or UPDATE"));
        }

        let json_action_field = cli.json_action_field.unwrap_or_default();
        let json_action_output: OutputMode = if action == Action::Json {
            if json_action_field.trim().is_empty() {
                return Err(ValidationError::new("Json action field should not be EMPTY."));
            }

            let output = cli.json_action_output.parse()?;
            if output == OutputMode::File && cli.json_action_output_folder.is_none() {
                return Err(ValidationError::new("Output folder should not be empty"));
            }
            output
        } else {
            cli.json_action_output.parse().unwrap_or(OutputMode::Console)
        };

        let att_action_field = cli.att_action_field.unwrap_or_default();
        let att_action_output: OutputMode = if action == Action::GetAttachments {
            if att_action_field.trim().is_empty() {
                return Err(ValidationError::new("Attachment field should not be EMPTY."));
            }

            if cli.att_action_output_folder.is_none() {
                return Err(ValidationError::new(
                    "Attachment folder parameter should not be EMPTY.",
                ));
            }

            cli.att_action_output.parse()?
        } else {
            cli.att_action_output.parse().unwrap_or(OutputMode::Console)
        };

        let request_timeout = match cli.request_timeout_secs {
            Some(0) => {
                return Err(ValidationError::new(
                    "Request timeout should be greater than 0.",
                ))
            }
            secs => secs.map(Duration::from_secs),
        };

        Ok(Self {
            protocol,
            host,
            port: cli.smax_port,
            secure_port: cli.smax_secure_port,
            tenant,
            entity: cli.entity,
            layout: cli.layout,
            username,
            password,
            filter: cli.filter.filter(|filter| !filter.is_empty()),
            action,
            csv,
            verbose: cli.verbose,
            json_action_field,
            json_action_output,
            json_action_output_folder: cli.json_action_output_folder,
            att_action_field,
            att_action_output,
            att_action_output_folder: cli.att_action_output_folder,
            request_timeout,
        })
    }
}
