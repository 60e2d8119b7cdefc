//! Encaminhamento: linha recebida → decodificação → dashboard.
//!
//! Frames inválidos são descartados sem tocar no watchdog; só telemetria
//! decodificada conta como sinal de vida do enlace.

use crate::cloud::CloudSink;
use crate::watchdog::{OfflineWatchdog, WatchdogEvent};
use hydrolink_core::config::CloudChannels;
use hydrolink_core::protocol::{DecodeError, InboundFrame, parse_inbound, unwrap_hex_payload};
use hydrolink_core::types::Measurement;
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct Forwarder<S> {
    sink: S,
    channels: CloudChannels,
    watchdog: OfflineWatchdog,
    hex_payload: bool,
}

impl<S: CloudSink> Forwarder<S> {
    pub fn new(
        sink: S,
        channels: CloudChannels,
        watchdog: OfflineWatchdog,
        hex_payload: bool,
    ) -> Self {
        Self {
            sink,
            channels,
            watchdog,
            hex_payload,
        }
    }

    /// Processa uma linha vinda do rádio.
    pub fn handle_frame(&mut self, raw: &[u8], now: Instant) {
        match self.parse(raw) {
            Ok(InboundFrame::Telemetry(m)) => {
                info!(
                    "Recebido: Temp {:.2} °C | EC {:.2} | pH {:.2} | TDS {:.2}",
                    m.temperature, m.conductivity, m.ph, m.tds
                );
                self.forward(&m);
                if let Some(event) = self.watchdog.record_frame(now) {
                    self.on_watchdog(event);
                }
            }
            Ok(InboundFrame::Alert(text)) => {
                warn!("Alerta remoto: {text}");
                publish_event(&mut self.sink, &self.channels.alert_event, &text);
            }
            Err(e) => {
                debug!("Frame descartado ({e}): {}", String::from_utf8_lossy(raw));
            }
        }
    }

    /// Verificação periódica do enlace.
    pub fn tick(&mut self, now: Instant) {
        if let Some(event) = self.watchdog.tick(now) {
            self.on_watchdog(event);
        }
    }

    /// No modo hexadecimal tenta primeiro o payload decodificado e, se ele
    /// não for um frame válido, a linha como veio.
    fn parse(&self, raw: &[u8]) -> Result<InboundFrame, DecodeError> {
        if self.hex_payload {
            if let Some(frame) = unwrap_hex_payload(raw).and_then(|p| parse_inbound(&p).ok()) {
                return Ok(frame);
            }
        }
        parse_inbound(raw)
    }

    fn forward(&mut self, m: &Measurement) {
        let c = &self.channels;
        let metrics = [
            (&c.temperature, m.temperature),
            (&c.conductivity, m.conductivity),
            (&c.ph, m.ph),
            (&c.tds, m.tds),
        ];
        for (channel, value) in metrics {
            if let Err(e) = self.sink.post_metric(channel, value) {
                warn!("Falha ao publicar {channel}: {e}");
            }
        }
    }

    fn on_watchdog(&mut self, event: WatchdogEvent) {
        match event {
            WatchdogEvent::Offline { silent_for } => {
                let text = format!(
                    "Nenhum dado recebido há {}s. Verifique o transmissor.",
                    silent_for.as_secs()
                );
                warn!("{text}");
                publish_event(&mut self.sink, &self.channels.offline_event, &text);
            }
            WatchdogEvent::Recovered => {
                info!("Enlace restabelecido");
                publish_event(
                    &mut self.sink,
                    &self.channels.recovered_event,
                    "Recepção de dados retomada.",
                );
            }
        }
    }

    #[cfg(test)]
    pub fn sink(&self) -> &S {
        &self.sink
    }
}

fn publish_event<S: CloudSink>(sink: &mut S, event_id: &str, description: &str) {
    if let Err(e) = sink.post_event(event_id, description) {
        warn!("Falha ao publicar evento {event_id}: {e}");
    }
}
