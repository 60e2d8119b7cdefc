//! Enlace de telemetria sobre o módulo de rádio.
//!
//! Modelo best-effort: escreve o comando, espera uma única janela de
//! resposta e devolve o que o módulo disse. Sem retry, sem número de
//! sequência. Um frame perdido é superado pela próxima amostra.

use hydrolink_core::protocol::{encode_alert, encode_telemetry};
use hydrolink_core::transport::Transport;
use hydrolink_core::types::Measurement;
use std::io;
use std::time::Duration;
use tracing::{debug, warn};

/// Tamanho do buffer de resposta do módulo.
const RX_BUFFER_SIZE: usize = 1024;

/// Erros do enlace. Nenhum é fatal para o ciclo.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Erro UART TX: {0}")]
    Write(#[from] io::Error),

    #[error("Módulo não respondeu em {0:?}")]
    NoResponse(Duration),
}

/// Emissor de frames sobre um [`Transport`].
pub struct TelemetryLink<T> {
    transport: T,
    command: String,
    response_timeout: Duration,
    rx_buf: Vec<u8>,
}

impl<T: Transport> TelemetryLink<T> {
    pub fn new(transport: T, command: impl Into<String>, response_timeout: Duration) -> Self {
        Self {
            transport,
            command: command.into(),
            response_timeout,
            rx_buf: vec![0u8; RX_BUFFER_SIZE],
        }
    }

    /// Transmite uma medição e devolve a resposta do módulo.
    pub fn send(&mut self, m: &Measurement) -> Result<String, LinkError> {
        let command = encode_telemetry(m, &self.command);
        self.exchange(&command)
    }

    /// Transmite um alerta pelo mesmo caminho da telemetria.
    pub fn send_alert(&mut self, text: &str) -> Result<String, LinkError> {
        let command = encode_alert(text, &self.command);
        self.exchange(&command)
    }

    fn exchange(&mut self, command: &str) -> Result<String, LinkError> {
        debug!("TX: {}", command.trim_end());

        let written = self.transport.write(command.as_bytes())?;
        if written == 0 {
            return Err(LinkError::Write(io::ErrorKind::WriteZero.into()));
        }

        let received = match self.transport.read(&mut self.rx_buf, self.response_timeout) {
            Ok(n) => n,
            Err(e) => {
                warn!("Erro UART RX: {e}");
                0
            }
        };

        let response = String::from_utf8_lossy(&self.rx_buf[..received]);
        let response = response.trim();
        if response.is_empty() {
            return Err(LinkError::NoResponse(self.response_timeout));
        }
        Ok(response.to_string())
    }

    #[cfg(test)]
    pub fn transport(&self) -> &T {
        &self.transport
    }
}
