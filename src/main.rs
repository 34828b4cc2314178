use anyhow::{Context, Result, bail};
use clap::Parser;
use marketlens::analysis::{
    AnalysisOrchestrator, AnalysisRequest, ErrorKind, ImageInput, SurfaceId, SurfaceOutcome,
};
use marketlens::cli::{AnalyzeArgs, Args, Commands, ConfigDiscovery, LoadedSettings};
use marketlens::config::SettingsHandle;
use marketlens::llm::{CredentialResolver, ProviderId};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("marketlens=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let loaded = ConfigDiscovery::load(args.config.as_deref())
        .context("Failed to load configuration")?;

    match args.command {
        Commands::Analyze(analyze) => run_analyze(analyze, loaded).await,
        Commands::Providers => {
            show_providers(&loaded);
            Ok(ExitCode::SUCCESS)
        }
        Commands::SetKey { provider, key } => {
            set_key(provider, &key, loaded, args.config.as_deref())?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::ShowConfig => {
            ConfigDiscovery::show_discovery_info();
            if let Some(source) = &loaded.source {
                println!("Loaded from: {:?}", source);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_analyze(args: AnalyzeArgs, loaded: LoadedSettings) -> Result<ExitCode> {
    let mut request = AnalysisRequest::new(args.kind, args.market, args.query);
    if let Some(period) = args.period {
        request = request.with_period(period);
    }
    if let Some(anchor) = args.price_anchor {
        request = request.with_price_anchor(anchor);
    }
    if let Some(path) = &args.image {
        let image = ImageInput::from_file(path)
            .await
            .with_context(|| format!("Failed to read image {:?}", path))?;
        request = request.with_image(image);
    }

    let orchestrator = AnalysisOrchestrator::new(SettingsHandle::new(loaded.settings))?;

    if args.dry_run {
        let directive = match orchestrator.preview(&request, args.provider) {
            Ok(directive) => directive,
            Err(error) => return Ok(report_failure(&error.user_message(), error.kind)),
        };
        println!("--- system ---\n{}", directive.system_message);
        println!("--- prompt ---\n{}", directive.prompt);
        if let Some(image) = &directive.image {
            println!("--- image ---\n{} ({} base64 chars)", image.mime_type, image.data.len());
        }
        return Ok(ExitCode::SUCCESS);
    }

    let surface = SurfaceId::from(args.kind.as_str());
    let outcome = orchestrator
        .analyze_with_llm(&surface, request, args.provider)
        .await;

    match outcome {
        SurfaceOutcome::Committed(Ok(result)) => {
            info!(
                provider = %result.provider_used(),
                model = result.model(),
                "Analysis ready"
            );
            println!("{}", serde_json::to_string_pretty(&result.envelope())?);
            Ok(ExitCode::SUCCESS)
        }
        SurfaceOutcome::Committed(Err(error)) => {
            if let Some(raw) = &error.raw_content {
                eprintln!("Raw provider output:\n{}", raw);
            }
            Ok(report_failure(&error.user_message(), error.kind))
        }
        SurfaceOutcome::Superseded { generation, current } => {
            bail!(
                "analysis {} was superseded by {} before it completed",
                generation,
                current
            )
        }
    }
}

fn report_failure(message: &str, kind: ErrorKind) -> ExitCode {
    eprintln!("❌ {}", message);
    match kind {
        ErrorKind::Auth => {
            eprintln!("Hint: run `marketlens set-key <provider> <key>` to store a key.")
        }
        ErrorKind::Quota | ErrorKind::Network => {
            eprintln!("Hint: run `marketlens show-config` to check which settings are active.")
        }
        ErrorKind::Validation => {}
    }
    ExitCode::from(match kind {
        ErrorKind::Auth => 2,
        ErrorKind::Quota => 3,
        ErrorKind::Network => 4,
        ErrorKind::Validation => 5,
    })
}

fn show_providers(loaded: &LoadedSettings) {
    let resolver = CredentialResolver::from_env();
    println!("Providers (default: {}):", loaded.settings.default_provider);
    println!();

    for provider in ProviderId::ALL {
        let caps = provider.capabilities();
        let model = loaded
            .settings
            .provider(provider)
            .and_then(|p| p.model.clone())
            .unwrap_or_else(|| provider.default_model().to_string());
        let credential = match resolver.resolve(provider, &loaded.settings) {
            Some(resolved) => format!("✓ {}", resolved.source),
            None => {
                let (primary, alias) = provider.credential_env();
                format!("✗ missing (set {} or {})", primary, alias)
            }
        };

        println!("  {} - {}", provider, provider.display_name());
        println!("      model:      {}", model);
        println!(
            "      vision: {}  web search: {}  forced JSON: {}",
            yes_no(caps.supports_vision),
            yes_no(caps.supports_web_search),
            yes_no(caps.supports_forced_json)
        );
        println!("      credential: {}", credential);
    }
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn set_key(
    provider: ProviderId,
    key: &str,
    loaded: LoadedSettings,
    config_override: Option<&Path>,
) -> Result<()> {
    if key.trim().is_empty() {
        bail!("refusing to save an empty key for {}", provider);
    }

    let target: PathBuf = match (config_override, loaded.source) {
        (Some(path), _) => path.to_path_buf(),
        (None, Some(source)) => source,
        (None, None) => ConfigDiscovery::default_save_path()
            .context("Could not determine home directory for the settings file")?,
    };

    let mut settings = loaded.settings;
    settings.save_provider_key(provider, key);
    settings
        .to_toml_file(&target)
        .with_context(|| format!("Failed to save settings to {:?}", target))?;

    println!("✅ Saved {} key to {:?}", provider.display_name(), target);
    Ok(())
}
