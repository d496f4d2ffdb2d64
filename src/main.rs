use anyhow::Result;
use clap::Parser;
use config::LurkCliConfig;
use log::{error, info, LevelFilter};
use log4rs::{
    append::console::ConsoleAppender,
    config::{Appender, Config, Deserializers, Root},
    encode::pattern::PatternEncoder,
};
use lurk_socks5::{common::error::LurkError, server::LurkServer};
use std::{path::Path, sync::Arc};

mod config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging()?;
    // Parse config
    let config = LurkCliConfig::parse();
    // Create server
    let server = Arc::new(LurkServer::new(config.server_config()));
    info!("Starting with {:?}", server.config());

    // Stop accepting clients on Ctrl-C
    let closing = Arc::clone(&server);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            closing.close();
        }
    });

    // Bind and serve clients until closed
    match server.listen_and_serve().await {
        Err(err) if matches!(err.downcast_ref::<LurkError>(), Some(LurkError::ServerClosed)) => {
            info!("Server has been closed");
            Ok(())
        }
        Err(err) => {
            error!("Server has finished with error: {}", err);
            Err(err)
        }
        Ok(()) => Ok(()),
    }
}

fn init_logging() -> Result<()> {
    if Path::new(config::LOG4RS_CONFIG_FILE_PATH).exists() {
        return log4rs::init_file(config::LOG4RS_CONFIG_FILE_PATH, Deserializers::default());
    }

    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(config::LOG4RS_FALLBACK_PATTERN)))
        .build();

    let log_config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Info))?;

    log4rs::init_config(log_config)?;

    Ok(())
}
