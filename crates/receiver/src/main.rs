//! # Hydrolink Receptor
//!
//! Escuta o módulo de rádio na UART, decodifica os frames de telemetria e
//! de alerta e publica cada medição no dashboard.
//!
//! Um watchdog avisa quando o transmissor fica em silêncio por mais de
//! `offline_timeout_secs` e quando a recepção volta.

mod cloud;
mod pipeline;
mod serial_thread;
mod watchdog;

use cloud::LogSink;
use crossbeam_channel::RecvTimeoutError;
use hydrolink_core::config::AppConfig;
use pipeline::Forwarder;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use watchdog::OfflineWatchdog;

fn main() {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── Config ──
    let config_path = AppConfig::default_path();
    let config = AppConfig::load(&config_path);

    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }
    for problem in config.validate() {
        warn!("Config: {problem}");
    }

    let recv_cfg = config.receiver;
    let tick_interval = Duration::from_millis(recv_cfg.tick_interval_ms);

    // ── Thread da UART ──
    let rx = match serial_thread::spawn_serial_thread(
        recv_cfg.port.clone(),
        recv_cfg.baud,
        Duration::from_millis(recv_cfg.read_timeout_ms),
    ) {
        Ok(rx) => rx,
        Err(e) => {
            error!("Falha ao criar thread da UART: {e}");
            std::process::exit(1);
        }
    };

    let watchdog = OfflineWatchdog::new(Duration::from_secs(recv_cfg.offline_timeout_secs));
    let mut forwarder = Forwarder::new(LogSink, recv_cfg.channels, watchdog, recv_cfg.hex_payload);

    info!(
        "Receptor ativo em {} @ {} baud (offline após {}s)",
        recv_cfg.port, recv_cfg.baud, recv_cfg.offline_timeout_secs
    );

    // ── Loop principal ──
    loop {
        match rx.recv_timeout(tick_interval) {
            Ok(msg) => forwarder.handle_frame(&msg.raw, Instant::now()),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                error!("Thread da UART encerrou");
                std::process::exit(1);
            }
        }
        forwarder.tick(Instant::now());
    }
}
