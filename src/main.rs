use clap::{Parser, ValueEnum};
use dengue_risk_rs::app_state::{DEFAULT_MAX_PAYLOAD_SIZE, ServiceConfig, ServiceState};
use dengue_risk_rs::server::{init_logging, startup};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Dengue risk prediction API", long_about = None)]
struct Args {
    #[arg(
        long,
        default_value = "0.0.0.0",
        help = "Host address to bind the server to"
    )]
    host: String,

    #[arg(long, env = "PORT", default_value_t = 8080, help = "Port number to listen on")]
    port: u16,

    #[arg(
        long,
        env = "MODEL_PATH",
        default_value = "dengue_risk_model.json",
        help = "Path to the exported classifier artifact"
    )]
    model_path: PathBuf,

    #[arg(
        long,
        default_value_t = DEFAULT_MAX_PAYLOAD_SIZE,
        help = "Largest accepted /predict body in bytes"
    )]
    max_payload_size: usize,

    #[arg(long, value_enum, default_value_t = LogLevel::Info, help = "Log level")]
    log_level: LogLevel,
}

impl Args {
    fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            host: self.host.clone(),
            port: self.port,
            model_path: self.model_path.clone(),
            max_payload_size: self.max_payload_size,
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    init_logging(args.log_level.into());

    let config = args.service_config();
    // Load before binding so no request can observe a half-initialised service.
    let state = ServiceState::load(&config);

    startup(config, state).await
}
