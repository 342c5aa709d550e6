//! `wireforge` command-line front end

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use wf_artifact::{extract_code, CodeDigest};
use wf_cache::ResultCache;
use wf_core::{EngineConfig, GenerationEvent, GenerationOrchestrator, OpenAiClient};
use wf_sandbox::{ChannelTransport, SandboxRuntime, SecurityPolicyBuilder};
use wf_validation::{AutoRepairEngine, CodeSafetyValidator, InteractivityValidator, SyntaxChecker};

fn cli() -> Command {
    Command::new("wireforge")
        .version(wf_core::VERSION)
        .about("Generate interactive UI components and run them behind a sandbox policy")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("generate")
                .about("Generate a component from a prompt")
                .arg(Arg::new("prompt").required(true).help("Natural-language description"))
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML configuration file"),
                )
                .arg(Arg::new("model").long("model").help("Model identifier"))
                .arg(
                    Arg::new("stream")
                        .long("stream")
                        .action(ArgAction::SetTrue)
                        .help("Consume the model output as a stream"),
                )
                .arg(
                    Arg::new("out")
                        .long("out")
                        .value_parser(value_parser!(PathBuf))
                        .help("Write the sandbox document to this path"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the full result as JSON"),
                ),
        )
        .subcommand(
            Command::new("validate")
                .about("Run safety, interactivity and syntax checks on a code file")
                .arg(Arg::new("file").required(true).help("Source file, or - for stdin")),
        )
        .subcommand(
            Command::new("repair")
                .about("Auto-repair a static component and print the result")
                .arg(Arg::new("file").required(true).help("Source file, or - for stdin")),
        )
        .subcommand(
            Command::new("policy")
                .about("Issue a sandbox security policy and print its CSP")
                .arg(
                    Arg::new("allow-network")
                        .long("allow-network")
                        .action(ArgAction::SetTrue)
                        .help("Do not deny connect-src"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    match matches.subcommand() {
        Some(("generate", args)) => generate(args).await,
        Some(("validate", args)) => validate(args),
        Some(("repair", args)) => repair(args),
        Some(("policy", args)) => policy(args),
        _ => bail!("unknown subcommand"),
    }
}

async fn generate(args: &ArgMatches) -> Result<()> {
    let prompt = args.get_one::<String>("prompt").context("missing prompt")?;

    let mut config = match args.get_one::<PathBuf>("config") {
        Some(path) => EngineConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => EngineConfig::new().with_env_overrides(),
    };
    if let Some(model) = args.get_one::<String>("model") {
        config = config.with_model(model.as_str());
    }
    if args.get_flag("stream") {
        config = config.with_streaming(true);
    }

    let client = Arc::new(OpenAiClient::from_config(&config)?);
    let cache = Arc::new(ResultCache::new(config.cache_capacity));
    let host_origin = config.host_origin.clone();
    let orchestrator = Arc::new(GenerationOrchestrator::new(client, cache, config));

    let mut events = orchestrator.events();
    let reporter = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                GenerationEvent::StateChanged { state, .. } => tracing::info!(%state, "State"),
                GenerationEvent::Diagnostic { message, .. } => tracing::info!("{message}"),
                GenerationEvent::Chunk { text, .. } => eprint!("{text}"),
            }
        }
    });

    let outcome = tokio::select! {
        result = orchestrator.generate(prompt) => result,
        _ = tokio::signal::ctrl_c() => {
            orchestrator.cancel();
            bail!("generation cancelled");
        }
    };
    reporter.abort();

    let result = match outcome {
        Ok(result) => result,
        Err(error) => {
            for suggestion in error.category().suggestions() {
                eprintln!("  - {suggestion}");
            }
            return Err(error.into());
        }
    };

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.code);
        eprintln!(
            "{} | retries: {} | cache hit: {} | digest: {}",
            result.interactivity.summary(),
            result.retry_count,
            result.cache_hit,
            CodeDigest::of(&result.code).short()
        );
    }

    if let Some(out) = args.get_one::<PathBuf>("out") {
        write_sandbox_document(&result.code, &host_origin, out).await?;
    }
    Ok(())
}

/// Mount through an in-process transport and persist the loaded document
async fn write_sandbox_document(code: &str, host_origin: &str, out: &Path) -> Result<()> {
    let (transport, mut peer) = ChannelTransport::pair();
    let runtime = SandboxRuntime::new(transport).with_host_origin(host_origin);

    let report = runtime.mount(code).await?;
    let document = peer.next_document().await.context("sandbox transport closed")?;
    std::fs::write(out, &document.html).with_context(|| format!("writing {}", out.display()))?;

    tracing::info!(
        path = %out.display(),
        mount_id = report.mount_id,
        frame_sandbox = %report.frame_sandbox,
        "Wrote sandbox document"
    );
    Ok(())
}

fn validate(args: &ArgMatches) -> Result<()> {
    let code = read_code(args)?;

    let safety = CodeSafetyValidator::new().validate(&code);
    let interactivity = InteractivityValidator::new().assess(&code);
    let syntax = SyntaxChecker::new().check(&code);

    let syntax_errors = match &syntax {
        Ok(()) => Vec::new(),
        Err(e) => e.messages(),
    };
    let report = serde_json::json!({
        "safety": &safety,
        "interactivity": &interactivity,
        "syntax": syntax_errors,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !safety.valid || syntax.is_err() {
        std::process::exit(1);
    }
    Ok(())
}

fn repair(args: &ArgMatches) -> Result<()> {
    let code = read_code(args)?;
    let validator = InteractivityValidator::new();

    let before = validator.assess(&code);
    let outcome = AutoRepairEngine::new().repair(&code);
    let after = validator.assess(&outcome.code);

    println!("{}", outcome.code);
    match outcome.skipped {
        Some(reason) => eprintln!("repair skipped: {reason}"),
        None => {
            for action in &outcome.actions {
                eprintln!("  - {action}");
            }
            eprintln!("{} -> {}", before.summary(), after.summary());
        }
    }
    Ok(())
}

fn policy(args: &ArgMatches) -> Result<()> {
    let policy = SecurityPolicyBuilder::new()
        .with_network_denied(!args.get_flag("allow-network"))
        .issue();

    if args.get_flag("json") {
        let value = serde_json::json!({
            "nonce": policy.nonce,
            "csp": policy.csp(),
            "frame_sandbox": policy.frame_sandbox_attribute(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("Content-Security-Policy: {}", policy.csp());
        println!("sandbox=\"{}\"", policy.frame_sandbox_attribute());
    }
    Ok(())
}

/// Read a source file (or stdin for `-`) and strip any markdown fence
fn read_code(args: &ArgMatches) -> Result<String> {
    let file = args.get_one::<String>("file").context("missing file")?;
    let raw = if file == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(file).with_context(|| format!("reading {file}"))?
    };
    Ok(extract_code(&raw))
}
