use anyhow::Result;
use hf_push::{
    config::DEFAULT_CHECKPOINT, resolve_token, uploader::verify_remote_copy, CheckpointUploader,
    HubClient, HuggingFaceLoader, PushConfig,
};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// cargo run --bin push_to_hf -- --repo-id YOUR_USERNAME/signdetr-pretrained

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn command() -> clap::Command {
    clap::Command::new("push_to_hf")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Push a model checkpoint to the Hugging Face Hub")
        .arg(
            clap::Arg::new("checkpoint")
                .help(format!("Path to checkpoint file [default: {}]", DEFAULT_CHECKPOINT))
                .long("checkpoint")
                .value_parser(clap::value_parser!(PathBuf))
                .required(false),
        )
        .arg(
            clap::Arg::new("repo_id")
                .help("Hugging Face repo ID (e.g., 'username/signdetr-pretrained')")
                .long("repo-id")
                .required(false),
        )
        .arg(
            clap::Arg::new("token")
                .help("HF token (optional if already logged in via 'huggingface-cli login')")
                .long("token")
                .required(false),
        )
        .arg(
            clap::Arg::new("config")
                .help("TOML file with push settings")
                .long("config")
                .value_parser(clap::value_parser!(PathBuf))
                .required(false),
        )
        .arg(
            clap::Arg::new("endpoint")
                .help("Hub endpoint (defaults to HF_ENDPOINT or https://huggingface.co)")
                .long("endpoint")
                .required(false),
        )
        .arg(
            clap::Arg::new("private")
                .help("Create the repository as private")
                .long("private")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            clap::Arg::new("commit_message")
                .help("Commit summary for the upload")
                .long("commit-message")
                .required(false),
        )
        .arg(
            clap::Arg::new("cache_dir")
                .help("Directory for --verify downloads (defaults to the hub cache under HF_HOME)")
                .long("cache-dir")
                .value_parser(clap::value_parser!(PathBuf))
                .required(false),
        )
        .arg(
            clap::Arg::new("verify")
                .help("Download the uploaded file again and compare checksums")
                .long("verify")
                .action(clap::ArgAction::SetTrue),
        )
}

fn config_from_matches(matches: &clap::ArgMatches) -> Result<PushConfig> {
    let mut config = PushConfig::from_env();
    if let Some(path) = matches.get_one::<PathBuf>("config") {
        config = config.from_toml_file(path)?;
    }
    if let Some(endpoint) = matches.get_one::<String>("endpoint") {
        config = config.endpoint(endpoint);
    }
    if let Some(checkpoint) = matches.get_one::<PathBuf>("checkpoint") {
        config = config.checkpoint(checkpoint.to_owned());
    }
    if let Some(repo_id) = matches.get_one::<String>("repo_id") {
        config = config.repo_id(repo_id);
    }
    if let Some(message) = matches.get_one::<String>("commit_message") {
        config = config.commit_message(message);
    }
    if let Some(cache_dir) = matches.get_one::<PathBuf>("cache_dir") {
        config = config.cache_dir(cache_dir.to_owned());
    }
    if matches.get_flag("private") {
        config = config.private(true);
    }
    config.validated()
}

#[tokio::main]
pub async fn main() -> Result<()> {
    init_tracing();
    let mut command = command();
    let matches = command.get_matches_mut();

    let config = config_from_matches(&matches)?;
    let repo_id = match config.repo_id.clone() {
        Some(repo_id) => repo_id,
        None => command
            .error(
                clap::error::ErrorKind::MissingRequiredArgument,
                "--repo-id is required (or set repo_id in the --config file)",
            )
            .exit(),
    };
    let checkpoint = config.checkpoint.clone();
    let token = resolve_token(matches.get_one::<String>("token").cloned());

    let client = HubClient::new(config.clone())?;
    let mut uploader = CheckpointUploader::new(client, config.clone());
    let report = uploader
        .upload(&checkpoint, &repo_id, token.as_ref())
        .await?;

    if matches.get_flag("verify") {
        let loader = HuggingFaceLoader::new(token.map(|t| t.expose_secret().to_string()))
            .config(config)
            .model_from_repo_id(&repo_id);
        let remote = loader.load_file(&report.path_in_repo).await?;
        verify_remote_copy(&repo_id, &checkpoint, &remote).await?;
        println!("Verified: {}", loader.file_url(&report.path_in_repo)?);
    }

    Ok(())
}
