//! Sensor de temperatura DS18B20 sobre o barramento one-wire.
//!
//! Cada leitura tem duas fases independentes, sem estado guardado entre
//! leituras:
//!
//! 1. conversão: reset → SKIP ROM → CONVERT T → espera de 750 ms
//! 2. leitura: reset → SKIP ROM → READ SCRATCHPAD → 9 bytes
//!
//! O CRC do scratchpad não é conferido por padrão; [`Ds18b20::with_crc_check`]
//! liga a validação.

use crate::onewire::{BusLine, OneWireBus};
use embedded_hal::delay::DelayNs;
use std::fmt;

pub const SKIP_ROM: u8 = 0xCC;
pub const CONVERT_T: u8 = 0x44;
pub const READ_SCRATCHPAD: u8 = 0xBE;

/// Pior caso de conversão em 12 bits, imposto pelo dispositivo.
pub const CONVERSION_MS: u32 = 750;

pub const SCRATCHPAD_LEN: usize = 9;

/// Fase em que o sensor deixou de responder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Convert,
    Read,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Convert => f.write_str("conversão"),
            Phase::Read => f.write_str("pós-conversão"),
        }
    }
}

/// Erros do sensor. Todos recuperáveis: o ciclo segue com a temperatura
/// de fallback.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SensorError {
    #[error("DS18B20 não detectado na fase de {0}")]
    BusNotPresent(Phase),

    #[error("CRC do scratchpad inválido: lido 0x{expected:02X}, calculado 0x{computed:02X}")]
    CrcMismatch { expected: u8, computed: u8 },
}

/// Driver do DS18B20 único no barramento.
pub struct Ds18b20<L, D> {
    bus: OneWireBus<L, D>,
    verify_crc: bool,
}

impl<L: BusLine, D: DelayNs> Ds18b20<L, D> {
    pub fn new(bus: OneWireBus<L, D>) -> Self {
        Self {
            bus,
            verify_crc: false,
        }
    }

    pub fn with_crc_check(mut self, verify: bool) -> Self {
        self.verify_crc = verify;
        self
    }

    /// Fase 1: dispara a conversão e bloqueia até ela terminar.
    pub fn convert(&mut self) -> Result<(), SensorError> {
        if !self.bus.reset() {
            return Err(SensorError::BusNotPresent(Phase::Convert));
        }
        self.bus.write_byte(SKIP_ROM);
        self.bus.write_byte(CONVERT_T);
        self.bus.delay_ms(CONVERSION_MS);
        Ok(())
    }

    /// Fase 2: lê os 9 bytes do scratchpad.
    pub fn read_scratchpad(&mut self) -> Result<[u8; SCRATCHPAD_LEN], SensorError> {
        if !self.bus.reset() {
            return Err(SensorError::BusNotPresent(Phase::Read));
        }
        self.bus.write_byte(SKIP_ROM);
        self.bus.write_byte(READ_SCRATCHPAD);

        let mut pad = [0u8; SCRATCHPAD_LEN];
        for byte in pad.iter_mut() {
            *byte = self.bus.read_byte();
        }

        if self.verify_crc {
            let computed = crc8(&pad[..SCRATCHPAD_LEN - 1]);
            let expected = pad[SCRATCHPAD_LEN - 1];
            if computed != expected {
                return Err(SensorError::CrcMismatch { expected, computed });
            }
        }
        Ok(pad)
    }

    /// Leitura completa em °C.
    pub fn read_celsius(&mut self) -> Result<f32, SensorError> {
        self.convert()?;
        let pad = self.read_scratchpad()?;
        Ok(decode_temperature(&pad))
    }

    #[cfg(test)]
    pub fn bus(&self) -> &OneWireBus<L, D> {
        &self.bus
    }

    #[cfg(test)]
    pub fn bus_mut(&mut self) -> &mut OneWireBus<L, D> {
        &mut self.bus
    }
}

/// Bytes 0 (LSB) e 1 (MSB) em complemento de dois, resolução de 1/16 °C.
pub fn decode_temperature(pad: &[u8; SCRATCHPAD_LEN]) -> f32 {
    f32::from(i16::from_le_bytes([pad[0], pad[1]])) / 16.0
}

/// CRC-8 Dallas/Maxim (X⁸ + X⁵ + X⁴ + 1, refletido).
pub fn crc8(bytes: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in bytes {
        let mut b = byte;
        for _ in 0..8 {
            let mix = (crc ^ b) & 0x01;
            crc >>= 1;
            if mix != 0 {
                crc ^= 0x8C;
            }
            b >>= 1;
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::{SimulatedProbe, VirtualClock};

    fn sensor(water_celsius: f32) -> Ds18b20<SimulatedProbe, VirtualClock> {
        let clock = VirtualClock::new();
        let probe = SimulatedProbe::new(clock.clone(), water_celsius, true);
        Ds18b20::new(OneWireBus::new(probe, clock))
    }

    fn pad(lsb: u8, msb: u8) -> [u8; SCRATCHPAD_LEN] {
        [lsb, msb, 0x4B, 0x46, 0x7F, 0xFF, 0x0C, 0x10, 0x00]
    }

    #[test]
    fn decodes_power_on_value() {
        assert_eq!(decode_temperature(&pad(0x50, 0x05)), 85.0);
    }

    #[test]
    fn decodes_negative_and_fractional_values() {
        assert_eq!(decode_temperature(&pad(0x5E, 0xFF)), -10.125);
        assert_eq!(decode_temperature(&pad(0x91, 0x01)), 25.0625);
        assert_eq!(decode_temperature(&pad(0x00, 0x00)), 0.0);
        assert_eq!(decode_temperature(&pad(0x90, 0xFC)), -55.0);
    }

    #[test]
    fn decode_matches_signed_formula_for_all_words() {
        for word in (0..=u16::MAX).step_by(7) {
            let [lsb, msb] = word.to_le_bytes();
            let expected = f32::from((u16::from(msb) << 8 | u16::from(lsb)) as i16) / 16.0;
            assert_eq!(decode_temperature(&pad(lsb, msb)), expected);
        }
    }

    #[test]
    fn crc_matches_maxim_reference_rom() {
        // ROM de exemplo da application note 27
        assert_eq!(crc8(&[0x02, 0x1C, 0xB8, 0x01, 0x00, 0x00, 0x00]), 0xA2);
        assert_eq!(crc8(&[0x02, 0x1C, 0xB8, 0x01, 0x00, 0x00, 0x00, 0xA2]), 0);
    }

    #[test]
    fn reads_temperature_through_the_bus() {
        let mut sensor = sensor(23.5);
        assert_eq!(sensor.read_celsius(), Ok(23.5));
        assert_eq!(sensor.bus().line().resets(), 2);
        assert_eq!(sensor.bus().line().last_command(), Some(READ_SCRATCHPAD));
    }

    #[test]
    fn conversion_blocks_for_worst_case_latency() {
        let mut sensor = sensor(20.0);
        let start = sensor.bus().line().clock().now_us();
        sensor.convert().unwrap();
        let elapsed = sensor.bus().line().clock().now_us() - start;
        assert!(elapsed >= u64::from(CONVERSION_MS) * 1_000);
    }

    #[test]
    fn scratchpad_before_conversion_holds_power_on_value() {
        let mut sensor = sensor(20.0);
        let pad = sensor.read_scratchpad().unwrap();
        assert_eq!(decode_temperature(&pad), 85.0);
    }

    #[test]
    fn missing_device_aborts_reading() {
        let mut sensor = sensor(20.0);
        sensor.bus_mut().line_mut().set_connected(false);
        assert_eq!(
            sensor.read_celsius(),
            Err(SensorError::BusNotPresent(Phase::Convert))
        );
    }

    #[test]
    fn device_lost_after_conversion_fails_read_phase() {
        let mut sensor = sensor(20.0);
        sensor.bus_mut().line_mut().set_drop_after_convert(true);
        assert_eq!(
            sensor.read_celsius(),
            Err(SensorError::BusNotPresent(Phase::Read))
        );
        // Respondeu ao reset da conversão, não ao da leitura
        assert_eq!(sensor.bus().line().resets(), 2);
    }

    #[test]
    fn crc_is_ignored_unless_enabled() {
        let mut sensor = sensor(21.0);
        sensor.bus_mut().line_mut().set_crc_fault(true);
        assert_eq!(sensor.read_celsius(), Ok(21.0));

        let mut sensor = sensor.with_crc_check(true);
        assert!(matches!(
            sensor.read_celsius(),
            Err(SensorError::CrcMismatch { .. })
        ));
    }

    #[test]
    fn follows_water_temperature_changes() {
        let mut sensor = sensor(20.0);
        assert_eq!(sensor.read_celsius(), Ok(20.0));
        sensor.bus_mut().line_mut().set_water_celsius(-3.25);
        assert_eq!(sensor.read_celsius(), Ok(-3.25));
    }
}
