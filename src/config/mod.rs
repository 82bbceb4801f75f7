//! Configuration and command-line surface of the ADT client.

use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::resource::ObjectKind;

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "abapcli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Command-line client for SAP ABAP Development Tools (ADT)")]
pub struct Args {
    #[command(flatten)]
    pub conn: ConnArgs,

    /// Enable debug logging
    #[arg(short, long, env = "ABAPCLI_VERBOSE")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Connection parameters, sourced from flags or environment.
#[derive(clap::Args, Debug, Clone)]
pub struct ConnArgs {
    /// Application server hostname
    #[arg(long, env = "SAP_HOST")]
    pub host: Option<String>,

    /// HTTP(S) port; defaults to 44300 with SSL, 8000 without
    #[arg(long, env = "SAP_PORT")]
    pub port: Option<u16>,

    /// SAP logical client number, e.g. 001
    #[arg(long, env = "SAP_CLIENT")]
    pub client: Option<String>,

    /// Logon user
    #[arg(long, env = "SAP_USER")]
    pub user: Option<String>,

    /// Logon password; prompted when omitted
    #[arg(long, env = "SAP_PASSWORD")]
    pub password: Option<String>,

    /// Use plain HTTP instead of HTTPS
    #[arg(long, env = "SAP_NO_SSL")]
    pub no_ssl: bool,

    /// Skip TLS certificate verification
    #[arg(long, env = "SAP_SSL_SKIP_VERIFY")]
    pub no_ssl_verify: bool,

    /// HTTP request timeout in seconds
    #[arg(long, default_value = "900", env = "ABAPCLI_HTTP_TIMEOUT")]
    pub http_timeout: u64,

    /// Delay between status polls in seconds
    #[arg(long, default_value = "2", env = "ABAPCLI_POLL_INTERVAL")]
    pub poll_interval: u64,

    /// Total deadline for polled operations in seconds
    #[arg(long, default_value = "600", env = "ABAPCLI_POLL_TIMEOUT")]
    pub poll_timeout: u64,
}

/// Output format for run reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
    Checkstyle,
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create a development object
    Create {
        kind: ObjectKind,
        name: String,
        description: String,
        /// Development package the object is created in
        #[arg(short, long, default_value = "$TMP")]
        package: String,
    },
    /// Print the main source of an object
    Read { kind: ObjectKind, name: String },
    /// Upload the main source of an object
    Write {
        kind: ObjectKind,
        name: String,
        /// Path to the source file, or - for stdin
        source: String,
    },
    /// Activate one or more objects
    Activate {
        kind: ObjectKind,
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// ABAP Unit test runs
    Aunit {
        #[command(subcommand)]
        command: AunitCommand,
    },
    /// ATC static checks
    Atc {
        #[command(subcommand)]
        command: AtcCommand,
    },
    /// abapGit repository management
    Abapgit {
        #[command(subcommand)]
        command: AbapgitCommand,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum AunitCommand {
    /// Run ABAP Unit tests for an object and report findings
    Run {
        kind: ObjectKind,
        name: String,
        #[arg(short, long, default_value = "human")]
        output: OutputFormat,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum AtcCommand {
    /// Print ATC customizing (system check variant)
    Customizing,
    /// Run ATC checks for one or more objects
    Run {
        kind: ObjectKind,
        #[arg(required = true)]
        names: Vec<String>,
        /// Check variant; defaults to the system variant
        #[arg(short = 'r', long)]
        variant: Option<String>,
        /// Maximum number of findings
        #[arg(short, long, default_value = "100")]
        max_verdicts: u32,
        /// Exit non-zero when a finding with this or higher priority is returned
        #[arg(short, long, default_value = "2")]
        error_level: u8,
        #[arg(short, long, default_value = "human")]
        output: OutputFormat,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum AbapgitCommand {
    /// List linked repositories
    Repos,
    /// Link a repository to a package
    Link {
        url: String,
        package: String,
        #[arg(short, long, default_value = "refs/heads/main")]
        branch: String,
    },
    /// Pull the repository linked to a package
    Pull { package: String },
}

/// Resolved connection configuration, one per CLI invocation.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub client: String,
    pub user: String,
    pub password: String,
    pub ssl: bool,
    pub ssl_verify: bool,
    pub http_timeout: Duration,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
}

impl ConnectionConfig {
    /// Scheme://host:port prefix of every request URL.
    pub fn base_url(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

impl ConnArgs {
    /// Resolve the connection configuration, prompting for the password
    /// when it was neither passed nor found in the environment.
    pub fn resolve(self) -> Result<ConnectionConfig> {
        let host = self
            .host
            .ok_or_else(|| Error::Config("missing SAP host (--host or SAP_HOST)".to_string()))?;
        let client = self
            .client
            .ok_or_else(|| Error::Config("missing SAP client (--client or SAP_CLIENT)".to_string()))?;
        let user = self
            .user
            .ok_or_else(|| Error::Config("missing SAP user (--user or SAP_USER)".to_string()))?;

        let password = match self.password {
            Some(password) => password,
            None => prompt_password(&user)?,
        };

        let ssl = !self.no_ssl;
        let port = self.port.unwrap_or(if ssl { 44300 } else { 8000 });

        Ok(ConnectionConfig {
            host,
            port,
            client,
            user,
            password,
            ssl,
            ssl_verify: !self.no_ssl_verify,
            http_timeout: Duration::from_secs(self.http_timeout),
            poll_interval: Duration::from_secs(self.poll_interval),
            poll_timeout: Duration::from_secs(self.poll_timeout),
        })
    }
}

fn prompt_password(user: &str) -> Result<String> {
    let mut stderr = std::io::stderr();
    write!(stderr, "Password for {}: ", user)?;
    stderr.flush()?;

    let mut password = String::new();
    std::io::stdin().lock().read_line(&mut password)?;
    let password = password.trim_end_matches(['\r', '\n']).to_string();

    if password.is_empty() {
        return Err(Error::Config("empty password".to_string()));
    }
    Ok(password)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn conn_args() -> ConnArgs {
        ConnArgs {
            host: Some("vhcalnplci.example".to_string()),
            port: None,
            client: Some("001".to_string()),
            user: Some("DEVELOPER".to_string()),
            password: Some("secret".to_string()),
            no_ssl: false,
            no_ssl_verify: false,
            http_timeout: 900,
            poll_interval: 2,
            poll_timeout: 600,
        }
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_resolve_defaults() {
        let config = conn_args().resolve().unwrap();
        assert_eq!(config.port, 44300);
        assert!(config.ssl);
        assert!(config.ssl_verify);
        assert_eq!(config.base_url(), "https://vhcalnplci.example:44300");
        assert_eq!(config.http_timeout, Duration::from_secs(900));
    }

    #[test]
    fn test_resolve_plain_http_port_default() {
        let mut args = conn_args();
        args.no_ssl = true;
        let config = args.resolve().unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.base_url(), "http://vhcalnplci.example:8000");
    }

    #[test]
    fn test_resolve_missing_host_fails() {
        let mut args = conn_args();
        args.host = None;
        let err = args.resolve().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("SAP_HOST"));
    }

    #[test]
    fn test_parse_activate_batch() {
        let args = Args::try_parse_from([
            "abapcli",
            "--host",
            "h",
            "--client",
            "001",
            "--user",
            "DEVELOPER",
            "--password",
            "pw",
            "activate",
            "class",
            "ZCL_A",
            "ZCL_B",
            "ZCL_C",
        ])
        .unwrap();

        match args.command {
            Command::Activate { kind, names } => {
                assert_eq!(kind, ObjectKind::Class);
                assert_eq!(names, vec!["ZCL_A", "ZCL_B", "ZCL_C"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_atc_run_flags() {
        let args = Args::try_parse_from([
            "abapcli",
            "--host",
            "h",
            "--client",
            "001",
            "--user",
            "U",
            "--password",
            "pw",
            "atc",
            "run",
            "program",
            "ZHELLO",
            "--error-level",
            "3",
            "--output",
            "checkstyle",
        ])
        .unwrap();

        match args.command {
            Command::Atc {
                command:
                    AtcCommand::Run {
                        kind,
                        names,
                        error_level,
                        max_verdicts,
                        output,
                        variant,
                    },
            } => {
                assert_eq!(kind, ObjectKind::Program);
                assert_eq!(names, vec!["ZHELLO"]);
                assert_eq!(error_level, 3);
                assert_eq!(max_verdicts, 100);
                assert_eq!(output, OutputFormat::Checkstyle);
                assert!(variant.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
