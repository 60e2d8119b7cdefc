//! Configuração unificada via TOML.
//!
//! Um único `config.toml` descreve os dois nós do enlace. Calibração e
//! limites de alerta são valores explícitos, repassados às funções de
//! conversão e de alerta em vez de constantes globais.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// ──────────────────────────────────────────────
// Calibração
// ──────────────────────────────────────────────

/// Calibração de dois pontos da sonda de condutividade.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EcCalibration {
    /// Tensão do ponto de referência 1 (mV)
    pub ref1_mv: f32,
    /// Condutividade do ponto de referência 1 (µS/cm)
    pub ref1_us: f32,
    /// Tensão do ponto de referência 2 (mV)
    pub ref2_mv: f32,
    /// Condutividade do ponto de referência 2 (µS/cm)
    pub ref2_us: f32,
    /// Coeficiente de compensação por °C em torno de 25 °C
    pub temp_coefficient: f32,
}

impl Default for EcCalibration {
    fn default() -> Self {
        Self {
            ref1_mv: 244.0,
            ref1_us: 1548.0,
            ref2_mv: 3100.0,
            ref2_us: 14120.0,
            temp_coefficient: 0.0185,
        }
    }
}

/// Reta de calibração da sonda de pH (tensão em volts).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhCalibration {
    pub slope: f32,
    pub intercept: f32,
}

impl Default for PhCalibration {
    fn default() -> Self {
        Self {
            slope: -5.6548,
            intercept: 15.509,
        }
    }
}

/// Curva cúbica do fabricante da sonda de TDS.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TdsCalibration {
    pub temp_coefficient: f32,
    pub cubic: f32,
    pub square: f32,
    pub linear: f32,
    pub scale: f32,
}

impl Default for TdsCalibration {
    fn default() -> Self {
        Self {
            temp_coefficient: 0.02,
            cubic: 133.42,
            square: -255.86,
            linear: 857.39,
            scale: 0.5,
        }
    }
}

/// Calibração completa das três sondas analógicas.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    pub ec: EcCalibration,
    pub ph: PhCalibration,
    pub tds: TdsCalibration,
}

// ──────────────────────────────────────────────
// Alertas
// ──────────────────────────────────────────────

/// Faixas ideais de qualidade da água.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    pub ph_min: f32,
    pub ph_max: f32,
    pub tds_max: f32,
    pub conductivity_max: f32,
    pub temperature_min: f32,
    pub temperature_max: f32,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            ph_min: 6.5,
            ph_max: 8.5,
            tds_max: 500.0,
            conductivity_max: 1000.0,
            temperature_min: 20.0,
            temperature_max: 25.0,
        }
    }
}

// ──────────────────────────────────────────────
// Bancada (execução sem hardware)
// ──────────────────────────────────────────────

/// Sonda simulada usada quando o transmissor roda num PC.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Simula o DS18B20 conectado ao barramento
    pub probe_connected: bool,
    /// Temperatura da água simulada (°C)
    pub water_celsius: f32,
    /// Tensões calibradas das sondas (mV)
    pub ec_mv: f32,
    pub ph_mv: f32,
    pub tds_mv: f32,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            probe_connected: true,
            water_celsius: 22.5,
            ec_mv: 400.0,
            ph_mv: 1500.0,
            tds_mv: 250.0,
        }
    }
}

// ──────────────────────────────────────────────
// Transmissor
// ──────────────────────────────────────────────

/// Faixa aceita para `interval_secs`.
pub const INTERVAL_RANGE_SECS: std::ops::RangeInclusive<f64> = 0.1..=3600.0;

/// Configuração do nó transmissor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Porta serial do módulo de rádio
    pub port: String,
    /// Baud rate da UART do módulo
    pub baud: u32,
    /// Intervalo entre ciclos de amostragem em segundos
    pub interval_secs: f64,
    /// Janela de espera pela resposta do módulo (ms), única para todo envio
    pub response_timeout_ms: u64,
    /// Comando AT que envelopa o payload hexadecimal
    pub send_command: String,
    /// Temperatura usada quando o sensor nunca respondeu (°C)
    pub fallback_celsius: f32,
    /// Valida o CRC do scratchpad do DS18B20
    pub verify_scratchpad_crc: bool,
    pub calibration: Calibration,
    pub alerts: AlertThresholds,
    pub bench: BenchConfig,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".into(),
            baud: 9600,
            interval_secs: 2.0,
            response_timeout_ms: 2000,
            send_command: "AT+SEND=".into(),
            fallback_celsius: 25.0,
            verify_scratchpad_crc: false,
            calibration: Calibration::default(),
            alerts: AlertThresholds::default(),
            bench: BenchConfig::default(),
        }
    }
}

// ──────────────────────────────────────────────
// Receptor
// ──────────────────────────────────────────────

/// Identificadores de canais e eventos no dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudChannels {
    pub temperature: String,
    pub conductivity: String,
    pub ph: String,
    pub tds: String,
    pub alert_event: String,
    pub offline_event: String,
    pub recovered_event: String,
}

impl Default for CloudChannels {
    fn default() -> Self {
        Self {
            temperature: "temperature".into(),
            conductivity: "conductivity".into(),
            ph: "ph".into(),
            tds: "tds".into(),
            alert_event: "water_alert".into(),
            offline_event: "link_offline".into(),
            recovered_event: "link_recovered".into(),
        }
    }
}

/// Configuração do nó receptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Porta serial do módulo de rádio
    pub port: String,
    /// Baud rate da UART do módulo
    pub baud: u32,
    /// Timeout de cada leitura da UART (ms)
    pub read_timeout_ms: u64,
    /// Frames chegam com o payload ainda em hexadecimal
    pub hex_payload: bool,
    /// Silêncio máximo antes de declarar o enlace offline (s)
    pub offline_timeout_secs: u64,
    /// Período do tick do watchdog (ms)
    pub tick_interval_ms: u64,
    pub channels: CloudChannels,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".into(),
            baud: 9600,
            read_timeout_ms: 5000,
            hex_payload: false,
            offline_timeout_secs: 60,
            tick_interval_ms: 1000,
            channels: CloudChannels::default(),
        }
    }
}

// ──────────────────────────────────────────────
// Raiz
// ──────────────────────────────────────────────

/// Configuração raiz do aplicativo (unifica transmissor e receptor).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sender: SenderConfig,
    pub receiver: ReceiverConfig,
}

impl AppConfig {
    /// Carrega configuração de um arquivo TOML.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<AppConfig>(&content) {
                    Ok(config) => {
                        info!("Configuração carregada de {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        warn!("Erro ao parsear {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    warn!("Erro ao ler {}: {}", path.display(), e);
                }
            }
        }

        info!("Usando configuração padrão");
        AppConfig::default()
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content = toml::to_string_pretty(self).map_err(|e| e.to_string())?;
        std::fs::write(path, content).map_err(|e| e.to_string())?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Retorna o caminho padrão do config.toml.
    pub fn default_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join("config.toml")
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let sender = &self.sender;
        let receiver = &self.receiver;

        if sender.port.is_empty() {
            errors.push("Porta serial do transmissor não configurada".into());
        }
        if sender.baud == 0 {
            errors.push("Baud rate do transmissor não pode ser 0".into());
        }
        if !INTERVAL_RANGE_SECS.contains(&sender.interval_secs) {
            errors.push(format!(
                "Intervalo do transmissor inválido: {} (0.1–3600.0)",
                sender.interval_secs
            ));
        }
        if sender.response_timeout_ms == 0 {
            errors.push("Janela de resposta do módulo não pode ser 0".into());
        }
        let ec = &sender.calibration.ec;
        if ec.ref1_mv == ec.ref2_mv {
            errors.push(format!(
                "Pontos de calibração de EC coincidem em {} mV",
                ec.ref1_mv
            ));
        }
        let alerts = &sender.alerts;
        if alerts.ph_min > alerts.ph_max {
            errors.push(format!(
                "Faixa de pH invertida: {}–{}",
                alerts.ph_min, alerts.ph_max
            ));
        }
        if alerts.temperature_min > alerts.temperature_max {
            errors.push(format!(
                "Faixa de temperatura invertida: {}–{}",
                alerts.temperature_min, alerts.temperature_max
            ));
        }

        if receiver.port.is_empty() {
            errors.push("Porta serial do receptor não configurada".into());
        }
        if receiver.baud == 0 {
            errors.push("Baud rate do receptor não pode ser 0".into());
        }
        if receiver.offline_timeout_secs == 0 {
            errors.push("Timeout de offline não pode ser 0".into());
        }
        if receiver.tick_interval_ms == 0 {
            errors.push("Tick do watchdog não pode ser 0".into());
        }

        errors
    }
}
