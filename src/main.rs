use anyhow::Context;
use clap::Parser;
use mobility_middleware::config::cli::{Command, ProvidersArgs};
use mobility_middleware::core::ConfigProvider;
use mobility_middleware::utils::error::ErrorSeverity;
use mobility_middleware::utils::{logger, validation::Validate};
use mobility_middleware::{
    CliArgs, HttpDirectoryClient, LogFormat, MiddlewareConfig, MiddlewareError,
    MobilityAggregator, ProviderDirectoryCache, ProviderRegistrator,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    let config = match MiddlewareConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            logger::init_cli_logger(args.verbose);
            tracing::error!("❌ Failed to load configuration from {}: {}", args.config, e);
            exit_with(&e);
        }
    };

    // 初始化日誌
    match config.log_format() {
        LogFormat::Compact => logger::init_cli_logger(args.verbose),
        LogFormat::Json => logger::init_json_logger(args.verbose),
    }

    tracing::info!("Starting mobility-middleware");
    if args.verbose {
        tracing::debug!("Configuration: {:?}", config);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        exit_with(&e);
    }

    if let Err(e) = run(args.command, config).await {
        tracing::error!("❌ {:#}", e);
        match e.downcast_ref::<MiddlewareError>() {
            Some(err) => exit_with(err),
            None => {
                eprintln!("❌ {:#}", e);
                std::process::exit(1);
            }
        }
    }
}

fn exit_with(e: &MiddlewareError) -> ! {
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}

async fn run(command: Command, config: MiddlewareConfig) -> anyhow::Result<()> {
    let directory = Arc::new(
        HttpDirectoryClient::new(config.directory_url())
            .with_timeout(Duration::from_secs(config.request_timeout_seconds())),
    );
    let cache = Arc::new(ProviderDirectoryCache::new(directory.clone()));

    if let Command::Serve = command {
        return serve(config, directory, cache).await;
    }

    // 單次查詢：先同步載入一次目錄
    let snapshot = cache.refresh().await;
    tracing::info!(
        "📚 Directory generation {} loaded with {} providers",
        snapshot.generation(),
        snapshot.len()
    );

    let aggregator = MobilityAggregator::new(cache, config.fan_out_settings());

    match command {
        Command::Serve => Ok(()),
        Command::Providers(ProvidersArgs {
            ids,
            modes,
            mobility_types,
            apis,
        }) => {
            let mut providers = aggregator
                .providers_matching(
                    &modes.into_iter().collect(),
                    &mobility_types.into_iter().collect(),
                    &apis.into_iter().collect(),
                )
                .await;
            if !ids.is_empty() {
                providers.retain(|p| ids.contains(&p.id));
            }
            print_json(&providers)
        }
        Command::Places(places) => {
            let result = aggregator
                .search_places(&places.to_query(), &places.tokens.token_source())
                .await;
            print_json(&result)
        }
        Command::Options(options) => {
            let result = aggregator
                .get_options(&options.to_query(), &options.tokens.token_source())
                .await;
            print_json(&result)
        }
        Command::Bookings(bookings) => {
            let result = aggregator
                .get_bookings(
                    &bookings.service_ids(),
                    bookings.state,
                    &bookings.tokens.token_source(),
                )
                .await;
            print_json(&result)
        }
    }
}

async fn serve(
    config: MiddlewareConfig,
    directory: Arc<HttpDirectoryClient>,
    cache: Arc<ProviderDirectoryCache>,
) -> anyhow::Result<()> {
    let refresh = cache.spawn_refresh_task(config.refresh_schedule());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let registration = ProviderRegistrator::new(
        directory,
        config.provider.clone(),
        config.registration_settings(),
    )
    .spawn(shutdown_rx);

    tracing::info!("🚀 Serving, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    tracing::info!("🛑 Shutting down...");
    let _ = shutdown_tx.send(true);
    refresh.shutdown().await;

    let outcome = registration
        .await
        .context("Registration task panicked")?;
    tracing::info!("Registration outcome: {:?}", outcome);

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(MiddlewareError::SerializationError)
        .context("Failed to render result")?;
    println!("{}", rendered);
    Ok(())
}
