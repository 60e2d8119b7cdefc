//! # Hydrolink Transmissor
//!
//! Amostra temperatura, pH, condutividade e TDS da água e envia cada
//! ciclo pelo módulo LoRa ligado à UART (`AT+SEND=<hex>`).
//!
//! Num PC o barramento one-wire e as sondas analógicas vêm da bancada
//! simulada configurada em `[sender.bench]`.

mod bench;
mod ds18b20;
mod link;
mod onewire;
mod sampler;

use bench::{BenchFrontEnd, SimulatedProbe, VirtualClock};
use ds18b20::Ds18b20;
use embedded_hal::delay::DelayNs;
use hydrolink_core::alerts;
use hydrolink_core::config::{AlertThresholds, AppConfig, INTERVAL_RANGE_SECS, SenderConfig};
use hydrolink_core::transport::{SerialTransport, Transport};
use hydrolink_core::types::Measurement;
use link::{LinkError, TelemetryLink};
use onewire::{BusLine, OneWireBus};
use sampler::{AnalogFrontEnd, Sampler};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

fn main() {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── Carregar config ──
    let config_path = AppConfig::default_path();
    let config = AppConfig::load(&config_path);

    // Salva config padrão se não existir
    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }
    for problem in config.validate() {
        warn!("Config: {problem}");
    }

    let sender_cfg = &config.sender;
    let interval = cycle_interval(sender_cfg.interval_secs);
    let response_timeout = Duration::from_millis(sender_cfg.response_timeout_ms);

    // ── UART do módulo de rádio ──
    let transport = match SerialTransport::open(&sender_cfg.port, sender_cfg.baud) {
        Ok(transport) => transport,
        Err(e) => {
            error!("Falha ao abrir {}: {e}", sender_cfg.port);
            std::process::exit(1);
        }
    };
    let mut link = TelemetryLink::new(transport, sender_cfg.send_command.as_str(), response_timeout);

    // ── Sondas (bancada) ──
    let bench_cfg = &sender_cfg.bench;
    let clock = VirtualClock::new();
    let probe = SimulatedProbe::new(clock.clone(), bench_cfg.water_celsius, bench_cfg.probe_connected);
    let sensor = Ds18b20::new(OneWireBus::new(probe, clock))
        .with_crc_check(sender_cfg.verify_scratchpad_crc);
    let mut sampler = Sampler::new(
        sensor,
        BenchFrontEnd::new(bench_cfg),
        sender_cfg.calibration.clone(),
        sender_cfg.fallback_celsius,
    );

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   💧 HYDROLINK TRANSMISSOR – ATIVO");
    println!("══════════════════════════════════════════════");
    println!("  UART:      {} @ {} baud", sender_cfg.port, sender_cfg.baud);
    println!("  Intervalo: {:.1}s", interval.as_secs_f64());
    println!("  Resposta:  {} ms", sender_cfg.response_timeout_ms);
    println!("  CRC DS18B20: {}", if sender_cfg.verify_scratchpad_crc { "verificado" } else { "ignorado" });
    println!("══════════════════════════════════════════════");
    println!();

    // ── Loop principal ──
    loop {
        let cycle_start = Instant::now();

        run_cycle(&mut sampler, &mut link, &sender_cfg.alerts);

        // Dormir pelo tempo restante do intervalo
        let elapsed = cycle_start.elapsed();
        if elapsed < interval {
            std::thread::sleep(interval - elapsed);
        }
    }
}

/// Período do ciclo. Fora da faixa válida (inclusive NaN) vale o padrão.
fn cycle_interval(secs: f64) -> Duration {
    if INTERVAL_RANGE_SECS.contains(&secs) {
        return Duration::from_secs_f64(secs);
    }
    let fallback = SenderConfig::default().interval_secs;
    warn!("Intervalo {secs}s inválido; usando {fallback}s");
    Duration::from_secs_f64(fallback)
}

/// Um ciclo completo: amostra, alerta (se houver) e telemetria.
fn run_cycle<L, D, A, T>(
    sampler: &mut Sampler<L, D, A>,
    link: &mut TelemetryLink<T>,
    thresholds: &AlertThresholds,
) -> Measurement
where
    L: BusLine,
    D: DelayNs,
    A: AnalogFrontEnd,
    T: Transport,
{
    let m = sampler.sample();
    info!(
        "Temp: {:.2} °C | EC: {:.2} uS/cm | pH: {:.2} | TDS: {:.2} ppm",
        m.temperature, m.conductivity, m.ph, m.tds
    );

    if let Some(text) = alerts::evaluate(&m, thresholds) {
        warn!("{text}");
        report("alerta", link.send_alert(&text));
    }

    report("telemetria", link.send(&m));
    m
}

fn report(kind: &str, result: Result<String, LinkError>) {
    match result {
        Ok(response) => info!("Resposta do módulo ({kind}): {response}"),
        Err(e @ LinkError::NoResponse(_)) => warn!("{kind}: {e}"),
        Err(e) => error!("{kind}: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydrolink_core::config::Calibration;
    use hydrolink_core::protocol::{self, InboundFrame};
    use std::io;

    /// Grava cada comando escrito, responde sempre "OK".
    #[derive(Default)]
    struct RecordingTransport {
        commands: Vec<String>,
    }

    impl Transport for RecordingTransport {
        fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
            self.commands.push(String::from_utf8_lossy(bytes).into_owned());
            Ok(bytes.len())
        }

        fn read(&mut self, buf: &mut [u8], _timeout: Duration) -> io::Result<usize> {
            buf[..2].copy_from_slice(b"OK");
            Ok(2)
        }
    }

    struct Volts(f32, f32, f32);

    impl AnalogFrontEnd for Volts {
        fn read_mv(&mut self, probe: sampler::Probe) -> Option<f32> {
            Some(match probe {
                sampler::Probe::Ec => self.0,
                sampler::Probe::Ph => self.1,
                sampler::Probe::Tds => self.2,
            })
        }
    }

    fn station(
        water_celsius: f32,
        volts: Volts,
    ) -> (
        Sampler<SimulatedProbe, VirtualClock, Volts>,
        TelemetryLink<RecordingTransport>,
    ) {
        let clock = VirtualClock::new();
        let probe = SimulatedProbe::new(clock.clone(), water_celsius, true);
        let sensor = Ds18b20::new(OneWireBus::new(probe, clock));
        let sampler = Sampler::new(sensor, volts, Calibration::default(), 25.0);
        let link = TelemetryLink::new(
            RecordingTransport::default(),
            "AT+SEND=",
            Duration::from_millis(2000),
        );
        (sampler, link)
    }

    /// Decodifica o payload hexadecimal de um comando gravado.
    fn payload(command: &str) -> InboundFrame {
        let raw = protocol::unwrap_hex_payload(command.as_bytes()).unwrap();
        protocol::parse_inbound(&raw).unwrap()
    }

    #[test]
    fn invalid_interval_falls_back_to_default() {
        let default = Duration::from_secs_f64(SenderConfig::default().interval_secs);
        assert_eq!(cycle_interval(5.0), Duration::from_secs(5));
        assert_eq!(cycle_interval(-1.0), default);
        assert_eq!(cycle_interval(f64::NAN), default);
        assert_eq!(cycle_interval(0.0), default);
        assert_eq!(cycle_interval(f64::INFINITY), default);
    }

    #[test]
    fn nominal_cycle_sends_only_telemetry() {
        // 22 °C, EC no ponto de referência, pH ~7
        let (mut sampler, mut link) = station(22.0, Volts(0.0, 1500.0, 100.0));
        let m = run_cycle(&mut sampler, &mut link, &AlertThresholds::default());

        let commands = &link.transport().commands;
        assert_eq!(commands.len(), 1);
        match payload(&commands[0]) {
            InboundFrame::Telemetry(received) => {
                assert_eq!(received.temperature, 22.0);
                assert!((received.ph - m.ph).abs() < 0.01);
            }
            other => panic!("esperava telemetria, veio {other:?}"),
        }
    }

    #[test]
    fn alert_goes_out_before_telemetry() {
        // pH ~9: 15.509 - 5.6548 * V = 9 → V ≈ 1151 mV
        let (mut sampler, mut link) = station(22.0, Volts(0.0, 1151.0, 100.0));
        run_cycle(&mut sampler, &mut link, &AlertThresholds::default());

        let commands = &link.transport().commands;
        assert_eq!(commands.len(), 2);
        match payload(&commands[0]) {
            InboundFrame::Alert(text) => {
                assert!(text.starts_with("Alerta pH:"));
                assert_eq!(text.matches("Alerta").count(), 1);
            }
            other => panic!("esperava alerta, veio {other:?}"),
        }
        assert!(matches!(payload(&commands[1]), InboundFrame::Telemetry(_)));
    }
}
