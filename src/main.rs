use anyhow::Context;
use clap::Parser;
use desk_shell::cli::Args;
use desk_shell::launch::{launch_isolated, serve_host};
use desk_shell::{driver, launch, logging, providers, EnvConfig};
use shell_protocol::{ApprovalMode, InitializeParams};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = EnvConfig::from_env();
    logging::init(&config);

    if args.host {
        let backend = providers::backend_for_id(&config.provider).map_err(anyhow::Error::msg)?;
        serve_host(
            backend,
            config.host_config(),
            tokio::io::stdin(),
            tokio::io::stdout(),
        )
        .await
        .context("host pipe failed")?;
        return Ok(());
    }

    let target_dir = match args.target_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("failed to resolve current directory")?,
    };

    let mut shell = if args.isolated {
        let program = std::env::current_exe().context("failed to locate the desk-shell binary")?;
        launch_isolated(program).context("failed to start the host process")?
    } else {
        let backend = providers::backend_for_id(&config.provider).map_err(anyhow::Error::msg)?;
        launch(backend, config.host_config())
    };

    let mut params = InitializeParams::new(target_dir.clone());
    params.approval_mode = args.approval_mode.map(ApprovalMode::from);
    params.model = args.model;
    let session = shell
        .initialize_with(params)
        .await
        .with_context(|| format!("failed to initialize session in {}", target_dir.display()))?;
    tracing::info!(session_id = %session.session_id, "session ready");

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    driver::run(&mut shell.runtime, stdin, &mut stdout).await?;

    shell.shutdown().await;
    Ok(())
}
