use anyhow::Context;
use clap::{value_parser, Arg, ArgMatches, Command};
use grader_core::compare::ImageComparator;
use grader_core::{
    AdapterError, Grader, GraderConfig, GradingPipeline, MetricsFacade, PayloadParseError,
    PayloadPart, Scorer, SsimComparator, Submission, XQueueAdapter,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::AsyncReadExt;

/// Exit code for a submission that could not be graded
const EXIT_GRADING_FAILED: u8 = 2;

fn config_arg() -> Arg {
    Arg::new("config")
        .long("config")
        .value_name("FILE")
        .value_parser(value_parser!(PathBuf))
        .help("TOML configuration file")
}

fn cli() -> Command {
    Command::new("render-grader")
        .version(grader_core::VERSION)
        .about("Grade submitted renders against a reference image")
        .subcommand_required(true)
        .subcommand(
            Command::new("grade")
                .about("Grade one submission envelope and print the reply")
                .arg(config_arg())
                .arg(
                    Arg::new("input")
                        .long("input")
                        .value_name("FILE")
                        .value_parser(value_parser!(PathBuf))
                        .help("Envelope JSON file (defaults to stdin)"),
                ),
        )
        .subcommand(
            Command::new("compare")
                .about("Compare two images and print the similarity")
                .arg(config_arg())
                .arg(
                    Arg::new("reference")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Reference image"),
                )
                .arg(
                    Arg::new("candidate")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Candidate image"),
                ),
        )
        .subcommand(
            Command::new("worker")
                .about("Grade one envelope from stdin and write the reply to stdout")
                .hide(true)
                .arg(config_arg()),
        )
}

fn config_path(args: &ArgMatches) -> Option<&Path> {
    args.get_one::<PathBuf>("config").map(PathBuf::as_path)
}

fn path_arg<'a>(args: &'a ArgMatches, name: &str) -> anyhow::Result<&'a Path> {
    args.get_one::<PathBuf>(name)
        .map(PathBuf::as_path)
        .with_context(|| format!("missing argument <{name}>"))
}

async fn grade(args: &ArgMatches) -> anyhow::Result<ExitCode> {
    let config = GraderConfig::load(config_path(args))?;
    let grader = Grader::from_config(&config, Arc::new(MetricsFacade))?;

    let raw = match args.get_one::<PathBuf>("input") {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut raw = String::new();
            tokio::io::stdin().read_to_string(&mut raw).await?;
            raw
        }
    };

    let result = match serde_json::from_str::<Submission>(&raw) {
        Ok(submission) => grader.handle(submission).await,
        Err(e) => Err(AdapterError::PayloadParse(
            PayloadParseError::new(PayloadPart::Envelope, &e).to_string(),
        )),
    };

    match result {
        Ok(reply) => {
            println!("{}", serde_json::to_string(&reply)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            tracing::error!("grading failed: {}", e);
            Ok(ExitCode::from(EXIT_GRADING_FAILED))
        }
    }
}

fn compare(args: &ArgMatches) -> anyhow::Result<ExitCode> {
    let config = GraderConfig::load(config_path(args))?;
    let reference = path_arg(args, "reference")?;
    let candidate = path_arg(args, "candidate")?;

    let similarity = SsimComparator::new().compare(reference, candidate);
    let outcome = Scorer::new(config.similarity_threshold).score(similarity);

    let report = serde_json::json!({
        "similarity": similarity,
        "verdict": outcome.verdict(),
        "score": outcome.score(),
        "msg": outcome.message(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::SUCCESS)
}

async fn worker(args: &ArgMatches) -> anyhow::Result<ExitCode> {
    let config = GraderConfig::for_worker(config_path(args))?;
    let pipeline = GradingPipeline::from_config(&config)?;
    let adapter = XQueueAdapter::new(pipeline, Arc::new(MetricsFacade));

    grader_kernel::worker::serve(&adapter, tokio::io::stdin(), tokio::io::stdout())
        .await
        .context("worker i/o")?;
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    grader_core::logging::init();

    let matches = cli().get_matches();
    match matches.subcommand() {
        Some(("grade", args)) => grade(args).await,
        Some(("compare", args)) => compare(args),
        Some(("worker", args)) => worker(args).await,
        _ => unreachable!("subcommand is required"),
    }
}
