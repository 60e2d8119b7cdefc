//! Protocolo de enlace texto/hexadecimal.
//!
//! Formato transmitido pelo nó sensor:
//!
//! ```text
//! AT+SEND=<hex>\r\n
//!          └── hex ASCII maiúsculo, 2 dígitos por byte, sem separadores, de:
//!              T:TEMP:<t.2>C,EC:<ec.2>,pH:<ph.2>,TDS:<tds 04.2>
//!              ALERT:<texto do alerta>
//! ```
//!
//! O receptor interpreta o texto puro `TEMP:<f>C,EC:<f>,pH:<f>,TDS:<f>` em
//! qualquer posição do frame. A aceitação é tudo-ou-nada: sem os quatro
//! campos o frame inteiro é descartado.

use crate::types::Measurement;
use std::fmt::Write;

/// Marcador que abre o registro de telemetria.
pub const FRAME_MARKER: &str = "TEMP:";

/// Marcador que abre um frame de alerta.
pub const ALERT_MARKER: &str = "ALERT:";

/// Número de campos de um registro completo.
pub const FIELD_COUNT: usize = 4;

/// Separadores que seguem cada campo, na ordem temperatura, EC, pH, TDS.
const FIELD_TERMINATORS: [&str; FIELD_COUNT] = ["C,EC:", ",pH:", ",TDS:", ""];

/// Menor sequência hexadecimal considerada um payload.
const MIN_HEX_PAYLOAD: usize = 4;

/// Erros de decodificação no receptor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Marcador TEMP: não encontrado no frame")]
    FrameNotFound,

    #[error("Frame incompleto: {found} de 4 campos")]
    FieldCountMismatch { found: usize },
}

/// Frame reconhecido pelo receptor.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Telemetry(Measurement),
    Alert(String),
}

// ──────────────────────────────────────────────
// Transmissão
// ──────────────────────────────────────────────

/// Registro ASCII de uma medição, antes da codificação hexadecimal.
pub fn format_record(m: &Measurement) -> String {
    format!(
        "T:TEMP:{:.2}C,EC:{:.2},pH:{:.2},TDS:{:04.2}",
        m.temperature, m.conductivity, m.ph, m.tds
    )
}

/// Registro ASCII de um alerta.
pub fn format_alert(text: &str) -> String {
    format!("{ALERT_MARKER}{text}")
}

/// Codifica cada byte como dois dígitos hexadecimais maiúsculos.
pub fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02X}");
    }
    out
}

/// Envelopa o payload no comando do módulo de rádio.
pub fn command_envelope(command: &str, payload: &str) -> String {
    format!("{command}{payload}\r\n")
}

/// Comando completo que transmite uma medição.
pub fn encode_telemetry(m: &Measurement, command: &str) -> String {
    command_envelope(command, &hex_encode(format_record(m).as_bytes()))
}

/// Comando completo que transmite um alerta.
pub fn encode_alert(text: &str, command: &str) -> String {
    command_envelope(command, &hex_encode(format_alert(text).as_bytes()))
}

// ──────────────────────────────────────────────
// Recepção
// ──────────────────────────────────────────────

/// Decodifica um frame de telemetria em texto puro.
///
/// Falha com [`DecodeError::FrameNotFound`] sem o marcador `TEMP:` e com
/// [`DecodeError::FieldCountMismatch`] se menos de quatro campos forem
/// extraídos. Nunca devolve uma medição parcial.
///
/// Cada ocorrência do marcador é tentada em ordem; vale o primeiro registro
/// completo. Se nenhum fecha, o erro traz o maior número de campos lidos.
pub fn decode(raw: &[u8]) -> Result<Measurement, DecodeError> {
    let text = String::from_utf8_lossy(raw);
    let mut best: Option<usize> = None;

    for (start, _) in text.match_indices(FRAME_MARKER) {
        match decode_record(&text[start + FRAME_MARKER.len()..]) {
            Ok(m) => return Ok(m),
            Err(found) => best = Some(best.map_or(found, |b| b.max(found))),
        }
    }

    match best {
        Some(found) => Err(DecodeError::FieldCountMismatch { found }),
        None => Err(DecodeError::FrameNotFound),
    }
}

/// Lê os quatro campos logo após um marcador. `Err` traz quantos foram lidos.
fn decode_record(mut cursor: &str) -> Result<Measurement, usize> {
    let mut fields = [0.0f32; FIELD_COUNT];
    let mut found = 0;

    for (slot, terminator) in fields.iter_mut().zip(FIELD_TERMINATORS) {
        let Some((value, rest)) = take_number(cursor) else {
            break;
        };
        *slot = value;
        found += 1;

        match rest.strip_prefix(terminator) {
            Some(next) => cursor = next,
            None => break,
        }
    }

    if found < FIELD_COUNT {
        return Err(found);
    }

    let [temperature, conductivity, ph, tds] = fields;
    Ok(Measurement {
        temperature,
        ph,
        conductivity,
        tds,
    })
}

/// Classifica um frame recebido em telemetria ou alerta.
///
/// Quando os dois marcadores aparecem, vale o que vier primeiro.
pub fn parse_inbound(raw: &[u8]) -> Result<InboundFrame, DecodeError> {
    let text = String::from_utf8_lossy(raw);
    let telemetry_at = text.find(FRAME_MARKER);
    let alert_at = text.find(ALERT_MARKER);

    match (alert_at, telemetry_at) {
        (Some(alert), telemetry) if telemetry.is_none_or(|t| alert < t) => {
            let body = text[alert + ALERT_MARKER.len()..].trim();
            Ok(InboundFrame::Alert(body.to_string()))
        }
        _ => decode(raw).map(InboundFrame::Telemetry),
    }
}

/// Recupera o payload de um frame que ainda traz o conteúdo em hexadecimal.
///
/// Escolhe a maior sequência de dígitos hexadecimais de comprimento par.
pub fn unwrap_hex_payload(raw: &[u8]) -> Option<Vec<u8>> {
    let best = raw
        .split(|b| !b.is_ascii_hexdigit())
        .filter(|run| run.len() >= MIN_HEX_PAYLOAD && run.len() % 2 == 0)
        .max_by_key(|run| run.len())?;

    best.chunks_exact(2)
        .map(|pair| {
            let digits = std::str::from_utf8(pair).ok()?;
            u8::from_str_radix(digits, 16).ok()
        })
        .collect()
}

/// Extrai o maior prefixo numérico (`[+-]dígitos[.dígitos]`) de `input`.
fn take_number(input: &str) -> Option<(f32, &str)> {
    let bytes = input.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let int_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    let mut digits = end - int_start;

    if bytes.get(end) == Some(&b'.') {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while bytes.get(frac_end).is_some_and(u8::is_ascii_digit) {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }

    if digits == 0 {
        return None;
    }
    let value = input[..end].parse::<f32>().ok()?;
    Some((value, &input[end..]))
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
