//! `docpkg` command line

mod credentials;

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use docpkg_core::{
    checkpoint, deploy, describe_package, diff, format_sources, pack, snapshot, summary_json,
    DeployOptions, DeployOutcome, DiffOptions, PackOptions, PartitionSummary,
};
use docpkg_model::Profile;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("docpkg")
        .version(docpkg_core::VERSION)
        .about("Versioned, replayable change packages for document databases")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log at debug level"),
        )
        .subcommand(
            Command::new("pack")
                .about("Compile a project into a package")
                .arg(path_arg("project", "Project file"))
                .arg(path_arg("package", "Output package"))
                .arg(
                    Arg::new("version")
                        .long("version")
                        .help("Package version, also available to globs as $(version)"),
                )
                .arg(
                    Arg::new("variable")
                        .long("variable")
                        .action(ArgAction::Append)
                        .value_parser(parse_variable)
                        .help("Glob variable as name=value"),
                ),
        )
        .subcommand(credentials::args(
            Command::new("deploy")
                .about("Replay packages against a live account")
                .arg(
                    Arg::new("packages")
                        .required(true)
                        .num_args(1..)
                        .value_parser(value_parser!(PathBuf))
                        .help("Packages, applied in order"),
                )
                .arg(
                    Arg::new("profile")
                        .long("profile")
                        .value_parser(value_parser!(PathBuf))
                        .help("Only apply documents listed in this profile"),
                )
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Read live state and report statuses without mutating"),
                ),
        ))
        .subcommand(credentials::args(
            Command::new("checkpoint")
                .about("Capture a rollback package for the given packages")
                .arg(
                    Arg::new("paths")
                        .required(true)
                        .num_args(2..)
                        .value_name("PACKAGE... ROLLBACK")
                        .value_parser(value_parser!(PathBuf))
                        .help("Packages to capture followed by the rollback package to write"),
                ),
        ))
        .subcommand(credentials::args(
            Command::new("snapshot")
                .about("Capture the documents listed in a profile")
                .arg(path_arg("profile", "Profile file"))
                .arg(path_arg("package", "Output package")),
        ))
        .subcommand(credentials::args(
            Command::new("diff")
                .about("Compare two packages")
                .arg(path_arg("package1", "Left package"))
                .arg(path_arg("package2", "Right package"))
                .arg(
                    Arg::new("profile")
                        .long("profile")
                        .value_parser(value_parser!(PathBuf))
                        .help("Write created and updated keys to this profile"),
                )
                .arg(
                    Arg::new("exit-code")
                        .long("exit-code")
                        .action(ArgAction::SetTrue)
                        .help("Exit with 1 when differences are found and no profile was written"),
                ),
        ))
        .subcommand(
            Command::new("show")
                .about("Describe a package")
                .arg(path_arg("package", "Package to describe"))
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("format")
                .about("Normalize project source files in place")
                .arg(
                    Arg::new("sources")
                        .required(true)
                        .num_args(1..)
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON source files"),
                ),
        )
}

fn path_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help(help)
}

fn parse_variable(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected name=value, got '{raw}'")),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = if verbose {
        EnvFilter::new(default_level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli().get_matches();
    init_logging(matches.get_flag("verbose"));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    match run(&matches, cancel).await {
        Ok(code) => code,
        Err(error) => {
            let causes: Vec<_> = error.chain().collect();
            for cause in causes.iter().rev() {
                eprintln!("error: {cause}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(matches: &ArgMatches, cancel: CancellationToken) -> Result<ExitCode> {
    match matches.subcommand() {
        Some(("pack", args)) => run_pack(args, &cancel).await,
        Some(("deploy", args)) => run_deploy(args, cancel).await,
        Some(("checkpoint", args)) => run_checkpoint(args, cancel).await,
        Some(("snapshot", args)) => run_snapshot(args, cancel).await,
        Some(("diff", args)) => run_diff(args, cancel).await,
        Some(("show", args)) => run_show(args),
        Some(("format", args)) => run_format(args),
        _ => bail!("unknown command"),
    }
}

fn required_path<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a PathBuf> {
    args.get_one::<PathBuf>(name)
        .with_context(|| format!("missing <{name}>"))
}

fn print_partitions(partitions: &[PartitionSummary]) {
    for summary in partitions {
        println!("  {} ({} documents)", summary.partition, summary.documents);
    }
}

async fn run_pack(args: &ArgMatches, cancel: &CancellationToken) -> Result<ExitCode> {
    let project = required_path(args, "project")?;
    let output = required_path(args, "package")?;

    let mut options = PackOptions::new();
    if let Some(version) = args.get_one::<String>("version") {
        options = options.with_version(version);
    }
    for (name, value) in args
        .get_many::<(String, String)>("variable")
        .into_iter()
        .flatten()
    {
        options = options.with_variable(name, value);
    }

    let report = pack(project, output, &options, cancel)
        .await
        .with_context(|| format!("failed to pack {}", project.display()))?;

    println!(
        "Packed {} documents in {} partitions into {}",
        report.document_count(),
        report.partitions.len(),
        report.path.display()
    );
    print_partitions(&report.partitions);
    Ok(ExitCode::SUCCESS)
}

async fn run_deploy(args: &ArgMatches, cancel: CancellationToken) -> Result<ExitCode> {
    let packages: Vec<PathBuf> = args
        .get_many::<PathBuf>("packages")
        .into_iter()
        .flatten()
        .cloned()
        .collect();

    let mut options = DeployOptions::new().with_dry_run(args.get_flag("dry-run"));
    if let Some(path) = args.get_one::<PathBuf>("profile") {
        let profile = Profile::load(path)
            .with_context(|| format!("failed to load profile {}", path.display()))?;
        options = options.with_profile(profile);
    }

    let store = credentials::client(args)?;
    let report = deploy(&packages, &store, &options, cancel)
        .await
        .context("deploy failed")?;

    for entry in &report.entries {
        let status = entry
            .status
            .map_or_else(|| "-".to_string(), |s| s.to_string());
        let outcome = match entry.outcome {
            DeployOutcome::Applied => "applied",
            DeployOutcome::Benign => "unchanged",
            DeployOutcome::Excluded => "excluded",
        };
        println!("  {:<7} {status:>3} {outcome:<9} {}", entry.operation, entry.key);
    }
    println!(
        "{}{} applied, {} unchanged, {} excluded",
        if report.dry_run { "[dry run] " } else { "" },
        report.applied(),
        report.benign(),
        report.excluded()
    );
    Ok(ExitCode::SUCCESS)
}

async fn run_checkpoint(args: &ArgMatches, cancel: CancellationToken) -> Result<ExitCode> {
    let paths: Vec<PathBuf> = args
        .get_many::<PathBuf>("paths")
        .into_iter()
        .flatten()
        .cloned()
        .collect();
    let Some((output, packages)) = paths.split_last() else {
        bail!("expected at least one package and a rollback package");
    };

    let store = credentials::client(args)?;
    let report = checkpoint(packages, output, &store, cancel)
        .await
        .context("checkpoint failed")?;

    println!(
        "Captured {} documents, {} rollback entries written to {}",
        report.captured,
        report.rollback_count(),
        report.path.display()
    );
    print_partitions(&report.partitions);
    Ok(ExitCode::SUCCESS)
}

async fn run_snapshot(args: &ArgMatches, cancel: CancellationToken) -> Result<ExitCode> {
    let profile_path = required_path(args, "profile")?;
    let output = required_path(args, "package")?;
    let profile = Profile::load(profile_path)
        .with_context(|| format!("failed to load profile {}", profile_path.display()))?;

    let store = credentials::client(args)?;
    let report = snapshot(&profile, output, &store, cancel)
        .await
        .context("snapshot failed")?;

    println!(
        "Captured {} documents ({} missing) into {}",
        report.document_count(),
        report.missing,
        report.path.display()
    );
    print_partitions(&report.partitions);
    Ok(ExitCode::SUCCESS)
}

async fn run_diff(args: &ArgMatches, cancel: CancellationToken) -> Result<ExitCode> {
    let left = required_path(args, "package1")?;
    let right = required_path(args, "package2")?;
    let mut options = DiffOptions::new();
    if let Some(path) = args.get_one::<PathBuf>("profile") {
        options = options.with_profile(path);
    }

    let store = credentials::client(args)?;
    let report = diff(left, right, &store, &options, cancel)
        .await
        .context("diff failed")?;

    for (label, entries) in [
        ("created", &report.created),
        ("updated", &report.updated),
        ("deleted", &report.deleted),
    ] {
        for entry in entries {
            println!("{label:<8} {entry}");
        }
    }
    if let Some(profile) = &report.profile {
        println!("Profile written to {}", profile.display());
    }
    if !report.has_differences() {
        println!("No differences");
    }

    if args.get_flag("exit-code") && report.differences_found() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn run_show(args: &ArgMatches) -> Result<ExitCode> {
    let path = required_path(args, "package")?;
    let summary = describe_package(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&summary_json(&summary))?);
    } else {
        print!("{summary}");
    }
    Ok(ExitCode::SUCCESS)
}

fn run_format(args: &ArgMatches) -> Result<ExitCode> {
    let sources: Vec<PathBuf> = args
        .get_many::<PathBuf>("sources")
        .into_iter()
        .flatten()
        .cloned()
        .collect();
    let outcomes = format_sources(&sources).context("format failed")?;

    for outcome in &outcomes {
        let state = if outcome.changed { "formatted" } else { "unchanged" };
        println!("{state:<9} {}", outcome.path.display());
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn parse_variable_pairs() {
        assert_eq!(
            parse_variable("env=prod").unwrap(),
            ("env".to_string(), "prod".to_string())
        );
        assert_eq!(
            parse_variable("query=a=b").unwrap(),
            ("query".to_string(), "a=b".to_string())
        );
        assert!(parse_variable("novalue").is_err());
        assert!(parse_variable("=x").is_err());
    }

    #[test]
    fn checkpoint_takes_rollback_path_last() {
        let matches = cli()
            .try_get_matches_from([
                "docpkg", "checkpoint", "a.zip", "b.zip", "rollback.zip", "--endpoint", "https://x/",
            ])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        let paths: Vec<_> = args.get_many::<PathBuf>("paths").unwrap().cloned().collect();
        assert_eq!(paths.last(), Some(&PathBuf::from("rollback.zip")));
        assert_eq!(paths.len(), 3);
    }

    #[test]
    fn pack_collects_variables() {
        let matches = cli()
            .try_get_matches_from([
                "docpkg", "pack", "project.json", "out.zip", "--version", "1.2", "--variable", "env=dev",
                "--variable", "region=eu",
            ])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        let vars: Vec<_> = args.get_many::<(String, String)>("variable").unwrap().collect();
        assert_eq!(vars.len(), 2);
        assert_eq!(args.get_one::<String>("version").map(String::as_str), Some("1.2"));
    }
}
