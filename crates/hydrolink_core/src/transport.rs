//! Transporte serial até o módulo de rádio.
//!
//! Os nós só enxergam escrita bloqueante e leitura com timeout. Timeout ou
//! leitura vazia voltam como `Ok(0)`, "sem dados", nunca como erro.

use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::Duration;
use tracing::info;

/// Primitivas de transporte usadas pelo enlace.
pub trait Transport {
    /// Escreve todos os bytes e retorna quantos foram enviados.
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize>;

    /// Lê o que chegar até `timeout`. `Ok(0)` significa sem dados.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;
}

/// Porta serial real (UART do módulo LoRa).
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Abre a porta em 8N1 sem controle de fluxo.
    pub fn open(path: &str, baud: u32) -> io::Result<Self> {
        let port = serialport::new(path, baud)
            .timeout(Duration::from_millis(100))
            .open()?;
        info!("Porta serial {path} aberta a {baud} baud");
        Ok(Self { port })
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(bytes.len())
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        self.port.set_timeout(timeout)?;
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if is_no_data(&e) => Ok(0),
            Err(e) => Err(e),
        }
    }
}

/// Timeout normal de leitura, não é falha.
pub fn is_no_data(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}
