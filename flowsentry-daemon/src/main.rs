use anyhow::Result;
use clap::Parser;

use flowsentry_core::config::FlowsentryConfig;
use flowsentry_daemon::cli::DaemonCli;
use flowsentry_daemon::orchestrator::Orchestrator;
use flowsentry_daemon::logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    // 설정 로드 (파일 → 환경변수 → CLI 순으로 오버라이드)
    let mut config = match FlowsentryConfig::load(&cli.config).await {
        Ok(config) => config,
        Err(e) => {
            // 설정 파일이 없는 개발 환경은 기본값으로 기동
            eprintln!(
                "warning: failed to load config from {}: {e}, using defaults",
                cli.config.display()
            );
            let mut config = FlowsentryConfig::default();
            config.apply_env_overrides();
            config
        }
    };

    if let Some(level) = &cli.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.general.log_format = format.clone();
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    if cli.validate {
        println!("configuration OK: {}", cli.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!("flowsentry-daemon starting");

    let mut orchestrator = Orchestrator::build_from_config(config).await?;

    // --eval: 평가만 수행하고 종료
    if let Some(target) = &cli.eval {
        orchestrator.start_modules().await?;

        let model_ids = if target == "all" {
            orchestrator.model_ids()
        } else {
            vec![target.clone()]
        };

        for model_id in model_ids {
            let report = orchestrator.evaluate(&model_id).await;
            println!("{}", report.to_json()?);
        }

        orchestrator.shutdown().await?;
        return Ok(());
    }

    orchestrator.run().await?;

    tracing::info!("flowsentry-daemon shut down");
    Ok(())
}
