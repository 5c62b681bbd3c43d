use std::path::PathBuf;

use clap::Parser;
use skillbase::{
    api::{ApiDoc, AppState, build_router},
    chatbot::AiClient,
    config::{AiConfig, Config},
    db::init_database,
    utils::init_log,
};
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "skillbase.toml")]
    config: PathBuf,

    /// Override the database path from the configuration
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Override the listen port from the configuration
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory for daily-rotated log files; logs to stdout when absent
    #[arg(short, long)]
    log: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _guard = init_log(args.log);

    let mut config = Config::load(&args.config)?;
    if let Some(database) = args.database {
        config.database = database;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    let db = init_database(&config.database).await?;

    let ai = AiConfig::from_env().map(|ai_config| AiClient::new(&ai_config));
    if ai.is_none() {
        info!("OPENAI_* environment not set, chat assistant disabled");
    }

    let state = AppState {
        db,
        ai,
        upload_dir: config.upload_dir.clone(),
    };
    let app = build_router(state, &config.cors_origin)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!("Starting server at http://{}:{}", config.host, config.port);
    info!(
        "Swagger UI available at http://{}:{}/swagger-ui/",
        config.host, config.port
    );
    axum::serve(listener, app).await?;

    Ok(())
}
