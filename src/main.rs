use bowser::Browser;
use bowser::core::config::{self, BowserConfig, Overrides};
use clap::Parser;
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::fs::File;

#[derive(Parser)]
#[command(name = "bowser", about = "Audio-first document browser")]
struct Args {
    /// Document to open: a path, a file:// URL or an http(s) URL
    location: Option<String>,

    /// Run without keyboard input and log to the terminal; stop with Ctrl+C
    #[arg(long)]
    headless: bool,

    /// Frames per second for input and audio
    #[arg(long)]
    frame_rate: Option<u32>,

    /// Default navigation theme for containers
    #[arg(long)]
    theme: Option<String>,

    /// Log level: error, warn, info, debug or trace
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    let (file_config, config_error) = match config::load_config() {
        Ok(config) => (config, None),
        Err(e) => (BowserConfig::default(), Some(e)),
    };
    let resolved = config::resolve(
        &file_config,
        &Overrides {
            frame_rate: args.frame_rate,
            theme: args.theme.clone(),
            log_level: args.log_level.clone(),
        },
    );

    // File logger always; terminal logger too when nothing else owns the terminal
    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();
    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    if let Ok(log_file) = File::create(&resolved.log_file) {
        loggers.push(WriteLogger::new(
            resolved.log_level,
            log_config.clone(),
            log_file,
        ));
    }
    if args.headless {
        loggers.push(TermLogger::new(
            resolved.log_level,
            log_config,
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ));
    }
    let _ = CombinedLogger::init(loggers);

    if let Some(e) = config_error {
        log::warn!("Using default config: {}", e);
    }
    log::info!("Bowser starting up with config: {:?}", resolved);

    let mut browser = Browser::new(resolved)?;
    browser.start(args.location.as_deref(), !args.headless)?;

    if args.headless {
        tokio::signal::ctrl_c().await?;
        browser.stop();
    } else {
        browser = tokio::task::spawn_blocking(move || {
            browser.join();
            browser
        })
        .await?;
    }

    log::info!("Bowser shutting down");
    drop(browser);
    Ok(())
}
