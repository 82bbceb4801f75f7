//! abapcli - command-line client for SAP ABAP Development Tools (ADT).

use clap::Parser;
use std::io::Read;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use abapcli_rs::config::{
    AbapgitCommand, Args, AtcCommand, AunitCommand, Command, OutputFormat,
};
use abapcli_rs::error::{Error, Result};
use abapcli_rs::ops::{self, RunFailure};
use abapcli_rs::poll::PollConfig;
use abapcli_rs::report;
use abapcli_rs::resource::ObjectRef;
use abapcli_rs::session::SessionClient;
use abapcli_rs::types::RunStatus;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if args.verbose {
            "abapcli=debug,abapcli_rs=debug"
        } else {
            "abapcli=info,abapcli_rs=info"
        })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(args).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

async fn run(args: Args) -> Result<i32> {
    let config = args.conn.resolve()?;
    let poll_config = PollConfig {
        interval: config.poll_interval,
        timeout: config.poll_timeout,
        immediate_first: true,
    };

    debug!(host = %config.host, client = %config.client, "Connecting");
    let mut session = SessionClient::new(&config)?;

    match args.command {
        Command::Create {
            kind,
            name,
            description,
            package,
        } => {
            let obj = ObjectRef::new(kind, name).in_package(package);
            ops::object::create(&mut session, &obj, &description).await?;
            info!("Created {} {}", obj.kind, obj.name);
            Ok(0)
        }

        Command::Read { kind, name } => {
            let obj = ObjectRef::new(kind, name);
            let source = ops::object::read_source(&mut session, &obj).await?;
            print!("{}", source);
            Ok(0)
        }

        Command::Write { kind, name, source } => {
            let text = read_source_arg(&source).await?;
            let obj = ObjectRef::new(kind, name);
            ops::object::write_source(&mut session, &obj, &text).await?;
            info!("Wrote {} {}", obj.kind, obj.name);
            Ok(0)
        }

        Command::Activate { kind, names } => {
            let objects: Vec<ObjectRef> =
                names.into_iter().map(|n| ObjectRef::new(kind, n)).collect();
            let batch = ops::object::activate(&mut session, &objects).await?;
            print!("{}", report::activation_human(&batch));
            Ok(if batch.all_ok() { 0 } else { 1 })
        }

        Command::Aunit {
            command: AunitCommand::Run { kind, name, output },
        } => {
            let obj = ObjectRef::new(kind, name);
            match ops::aunit::run(&mut session, &poll_config, &obj).await {
                Ok(result) => {
                    match output {
                        OutputFormat::Human => print!("{}", report::aunit_human(&result)),
                        OutputFormat::Json => println!("{}", report::json(&result)?),
                        OutputFormat::Checkstyle => {
                            return Err(Error::Config(
                                "checkstyle output is only available for atc run".to_string(),
                            ));
                        }
                    }
                    let failed = result.status == RunStatus::Failed
                        || result
                            .findings
                            .iter()
                            .any(|f| f.severity == abapcli_rs::types::Severity::Error);
                    Ok(if failed { 1 } else { 0 })
                }
                Err(RunFailure { partial, source }) => {
                    if let Some(partial) = partial {
                        print!("{}", report::aunit_human(&partial));
                    }
                    Err(source)
                }
            }
        }

        Command::Atc { command } => match command {
            AtcCommand::Customizing => {
                let customizing = ops::atc::customizing(&mut session).await?;
                println!("System Check Variant: {}", customizing.system_check_variant);
                Ok(0)
            }
            AtcCommand::Run {
                kind,
                names,
                variant,
                max_verdicts,
                error_level,
                output,
            } => {
                let variant = match variant {
                    Some(variant) => variant,
                    None => {
                        ops::atc::customizing(&mut session)
                            .await?
                            .system_check_variant
                    }
                };
                let objects: Vec<ObjectRef> =
                    names.into_iter().map(|n| ObjectRef::new(kind, n)).collect();

                let atc_report =
                    ops::atc::run(&mut session, &poll_config, &objects, &variant, max_verdicts)
                        .await?;

                match output {
                    OutputFormat::Human => print!("{}", report::atc_human(&atc_report)),
                    OutputFormat::Json => println!("{}", report::json(&atc_report)?),
                    OutputFormat::Checkstyle => {
                        print!("{}", report::atc_checkstyle(&atc_report))
                    }
                }

                let failed = !atc_report.all_ok()
                    || atc_report.verdicts_at_or_above(error_level) > 0;
                Ok(if failed { 1 } else { 0 })
            }
        },

        Command::Abapgit { command } => match command {
            AbapgitCommand::Repos => {
                let repos = ops::abapgit::repos(&mut session).await?;
                print!("{}", report::repos_human(&repos));
                Ok(0)
            }
            AbapgitCommand::Link {
                url,
                package,
                branch,
            } => {
                ops::abapgit::link(&mut session, &url, &package, &branch).await?;
                info!("Linked {} to {}", url, package);
                Ok(0)
            }
            AbapgitCommand::Pull { package } => {
                match ops::abapgit::pull(&mut session, &poll_config, &package).await {
                    Ok(result) => {
                        print!("{}", report::pull_human(&result));
                        Ok(if result.status == RunStatus::Succeeded { 0 } else { 1 })
                    }
                    Err(RunFailure { partial, source }) => {
                        if let Some(partial) = partial {
                            print!("{}", report::pull_human(&partial));
                        }
                        Err(source)
                    }
                }
            }
        },
    }
}

/// Read source text from a file path, or stdin when the argument is -.
async fn read_source_arg(source: &str) -> Result<String> {
    if source == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        Ok(text)
    } else {
        Ok(tokio::fs::read_to_string(source).await?)
    }
}
