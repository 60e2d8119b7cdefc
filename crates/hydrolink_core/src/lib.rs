//! # Hydrolink Core
//!
//! Crate compartilhada pelos dois nós do enlace de qualidade da água:
//! tipos de medição, fórmulas de conversão, protocolo texto/hexadecimal,
//! alertas e configuração TOML.
//!
//! ## Módulos
//! - [`types`] – Medição e tensões das sondas
//! - [`conversion`] – Tensão calibrada → pH, EC e TDS com compensação térmica
//! - [`protocol`] – Montagem do comando AT e decodificação no receptor
//! - [`alerts`] – Faixas ideais e mensagem de alerta
//! - [`config`] – Configuração unificada via TOML
//! - [`transport`] – Seam do transporte serial

pub mod types;
pub mod conversion;
pub mod protocol;
pub mod alerts;
pub mod config;
pub mod transport;

// Re-exports convenientes
pub use types::Measurement;
pub use protocol::{decode, DecodeError, InboundFrame};
pub use config::{AppConfig, SenderConfig, ReceiverConfig};
pub use transport::Transport;
