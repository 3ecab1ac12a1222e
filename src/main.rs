use log::{error, info, warn, LevelFilter, Metadata, Record};
use rcon_probe::{players, RconError, Session, SessionConfig};
use std::{env, process};

struct SimpleLogger;

impl log::Log for SimpleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            println!("{} - {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

#[tokio::main]
async fn main() {
    let level = env::var("LOG_LEVEL")
        .ok()
        .and_then(|level| level.parse().ok())
        .unwrap_or(LevelFilter::Info);
    let _ = log::set_logger(&SimpleLogger).map(|()| log::set_max_level(level));

    let config = match SessionConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("configuration: {}", err);
            process::exit(2);
        }
    };

    let report = Session::new(config).run().await;

    if let Some(auth) = report.auth() {
        info!("auth reply: {} bytes - {:02x?}", auth.received().len(), auth.received());
        if let Some(packet) = auth.packet() {
            info!(
                "auth reply id {}, type {}, body {:?}",
                packet.id(),
                packet.packet_type(),
                packet.body()
            );
        }
    }

    if let Some(command) = report.command() {
        info!("command reply: {} bytes", command.received().len());
        match command.packet() {
            Some(packet) => {
                let preview = command.body_preview().unwrap_or_default();
                info!("body: {}...", preview);
                info!("{} players online", players::parse_player_info(packet.body()).len());
            }
            None => warn!("command reply too short to decode"),
        }
    }

    match report.error() {
        None => info!("rcon credentials work"),
        Some(RconError::AuthenticationError) => error!("wrong password"),
        Some(RconError::InsufficientData { received }) => error!(
            "too little data: expected at least 12 bytes, got {} - {:02x?}",
            received.len(),
            received
        ),
        Some(RconError::UnexpectedResponseType(packet_type)) => {
            warn!("unexpected response type {}", packet_type)
        }
        Some(err) => match std::error::Error::source(err) {
            Some(source) => error!("{}: {}", err, source),
            None => error!("{}", err),
        },
    }

    info!("finished in state {:?}", report.state());
    process::exit(report.exit_code());
}
