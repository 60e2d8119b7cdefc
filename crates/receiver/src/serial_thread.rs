//! Thread de leitura que escuta a UART do rádio e envia linhas para o loop
//! principal via channel.

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use hydrolink_core::transport::{SerialTransport, Transport};
use std::io;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Maior linha aceita antes de ser entregue mesmo sem `\n`.
const MAX_LINE: usize = 1024;

/// Espera antes de tentar reabrir a porta.
const REOPEN_DELAY: Duration = Duration::from_secs(2);

/// Linha recebida do rádio, sem o terminador.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkMessage {
    pub raw: Vec<u8>,
}

/// Inicia a thread de leitura. Retorna o receiver do channel.
pub fn spawn_serial_thread(
    port: String,
    baud: u32,
    read_timeout: Duration,
) -> io::Result<Receiver<LinkMessage>> {
    let (tx, rx) = bounded::<LinkMessage>(64);

    std::thread::Builder::new()
        .name("uart-receiver".into())
        .spawn(move || {
            reader_loop(&tx, &port, baud, read_timeout);
        })?;

    Ok(rx)
}

fn reader_loop(tx: &Sender<LinkMessage>, port: &str, baud: u32, read_timeout: Duration) {
    loop {
        match SerialTransport::open(port, baud) {
            Ok(mut transport) => {
                info!("Receiver escutando em {port} @ {baud} baud");
                if let Err(e) = pump(&mut transport, tx, read_timeout) {
                    warn!("Erro ao ler {port}: {e}. Reabrindo em 2s...");
                    std::thread::sleep(REOPEN_DELAY);
                } else {
                    // Loop principal encerrou
                    return;
                }
            }
            Err(e) => {
                error!("Falha ao abrir {port}: {e}. Tentando novamente em 2s...");
                std::thread::sleep(REOPEN_DELAY);
            }
        }
    }
}

/// Lê do transporte até um erro de I/O ou até o channel ser fechado.
fn pump<T: Transport>(
    transport: &mut T,
    tx: &Sender<LinkMessage>,
    read_timeout: Duration,
) -> io::Result<()> {
    let mut lines = LineAssembler::default();
    let mut buf = [0u8; 256];

    loop {
        let n = transport.read(&mut buf, read_timeout)?;
        let ready = if n == 0 {
            lines.flush().into_iter().collect()
        } else {
            lines.push(&buf[..n])
        };

        for raw in ready {
            // Non-blocking send: se o loop está lento, descarta a linha
            match tx.try_send(LinkMessage { raw }) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => debug!("Channel cheio, descartando linha"),
                Err(TrySendError::Disconnected(_)) => return Ok(()),
            }
        }
    }
}

/// Monta linhas terminadas em `\n` a partir dos bytes da UART.
///
/// `\r` final é removido e linhas vazias são ignoradas. Uma linha que passa
/// de [`MAX_LINE`] bytes é entregue como está.
#[derive(Debug, Default)]
pub struct LineAssembler {
    pending: Vec<u8>,
}

impl LineAssembler {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        for &byte in bytes {
            if byte == b'\n' {
                out.extend(self.flush());
                continue;
            }
            self.pending.push(byte);
            if self.pending.len() >= MAX_LINE {
                out.extend(self.flush());
            }
        }
        out
    }

    /// Entrega o que estiver acumulado, como após um timeout de leitura.
    pub fn flush(&mut self) -> Option<Vec<u8>> {
        let mut line = std::mem::take(&mut self.pending);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        (!line.is_empty()).then_some(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[test]
    fn splits_on_newline_and_strips_cr() {
        let mut lines = LineAssembler::default();
        let out = lines.push(b"+RCV=1,5,TEMP:1\r\nOK\r\n");
        assert_eq!(out, vec![b"+RCV=1,5,TEMP:1".to_vec(), b"OK".to_vec()]);
        assert_eq!(lines.flush(), None);
    }

    #[test]
    fn keeps_partial_line_across_reads() {
        let mut lines = LineAssembler::default();
        assert!(lines.push(b"TEMP:22.5").is_empty());
        let out = lines.push(b"0C\n");
        assert_eq!(out, vec![b"TEMP:22.50C".to_vec()]);
    }

    #[test]
    fn flush_delivers_unterminated_line() {
        let mut lines = LineAssembler::default();
        lines.push(b"ALERT:x");
        assert_eq!(lines.flush(), Some(b"ALERT:x".to_vec()));
        assert_eq!(lines.flush(), None);
    }

    #[test]
    fn oversized_line_is_cut() {
        let mut lines = LineAssembler::default();
        let out = lines.push(&[b'A'; MAX_LINE + 10]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].len(), MAX_LINE);
        assert_eq!(lines.flush(), Some(vec![b'A'; 10]));
    }

    #[test]
    fn blank_lines_are_skipped() {
        let mut lines = LineAssembler::default();
        assert!(lines.push(b"\r\n\n").is_empty());
    }

    /// Entrega blocos em sequência e depois falha.
    struct ChunkTransport {
        chunks: VecDeque<Vec<u8>>,
    }

    impl Transport for ChunkTransport {
        fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
            Ok(bytes.len())
        }

        fn read(&mut self, buf: &mut [u8], _timeout: Duration) -> io::Result<usize> {
            match self.chunks.pop_front() {
                Some(chunk) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
                None => Err(io::ErrorKind::BrokenPipe.into()),
            }
        }
    }

    #[test]
    fn pump_forwards_lines_and_flushes_on_silence() {
        let mut transport = ChunkTransport {
            chunks: VecDeque::from(vec![
                b"TEMP:1C,EC:2,pH:3,TDS:4\n".to_vec(),
                b"ALERT:x".to_vec(),
                Vec::new(),
            ]),
        };
        let (tx, rx) = bounded(64);

        let result = pump(&mut transport, &tx, Duration::from_millis(10));
        assert!(result.is_err());

        let got: Vec<Vec<u8>> = rx.try_iter().map(|m| m.raw).collect();
        assert_eq!(
            got,
            vec![b"TEMP:1C,EC:2,pH:3,TDS:4".to_vec(), b"ALERT:x".to_vec()]
        );
    }

    #[test]
    fn full_channel_drops_newest_lines() {
        let mut transport = ChunkTransport {
            chunks: VecDeque::from(vec![b"a\nb\nc\n".to_vec()]),
        };
        let (tx, rx) = bounded(2);

        let _ = pump(&mut transport, &tx, Duration::from_millis(10));
        let got: Vec<Vec<u8>> = rx.try_iter().map(|m| m.raw).collect();
        assert_eq!(got, vec![b"a".to_vec(), b"b".to_vec()]);
    }
}
