//! Driver bit-a-bit do barramento one-wire.
//!
//! Sem periférico dedicado: cada slot é temporizado por software sobre uma
//! única linha digital com pull-up. Os tempos abaixo são os do protocolo;
//! arredondá-los costuma resultar num sensor mudo, não num erro.
//!
//! ```text
//! reset   ▔▔\______480µs______/▔▔▔70µs▔▔[amostra]▔▔▔410µs▔▔▔
//! write 1 ▔▔\_10µs_/▔▔▔▔▔▔55µs▔▔▔▔▔▔
//! write 0 ▔▔\________65µs________/▔5µs▔
//! read    ▔▔\_3µs_/▔10µs▔[amostra]▔▔▔53µs▔▔▔
//! ```

use embedded_hal::delay::DelayNs;

pub const RESET_LOW_US: u32 = 480;
pub const PRESENCE_SAMPLE_US: u32 = 70;
pub const RESET_RECOVERY_US: u32 = 410;

pub const WRITE_ONE_LOW_US: u32 = 10;
pub const WRITE_ONE_HIGH_US: u32 = 55;
pub const WRITE_ZERO_LOW_US: u32 = 65;
pub const WRITE_ZERO_HIGH_US: u32 = 5;

pub const READ_LOW_US: u32 = 3;
pub const READ_SAMPLE_US: u32 = 10;
pub const READ_RECOVERY_US: u32 = 53;

/// Direção do pino.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Output,
    Input,
}

/// Linha digital do barramento.
///
/// Operações síncronas; a temporização fica a cargo do [`DelayNs`].
pub trait BusLine {
    fn set_direction(&mut self, direction: Direction);
    fn set_level(&mut self, high: bool);
    fn is_high(&mut self) -> bool;
}

/// Mestre one-wire sobre uma linha e um atraso em microssegundos.
pub struct OneWireBus<L, D> {
    line: L,
    delay: D,
}

impl<L: BusLine, D: DelayNs> OneWireBus<L, D> {
    pub fn new(line: L, delay: D) -> Self {
        Self { line, delay }
    }

    /// Pulso de reset. Retorna `true` se algum dispositivo respondeu com
    /// pulso de presença.
    pub fn reset(&mut self) -> bool {
        self.line.set_direction(Direction::Output);
        self.line.set_level(false);
        self.delay.delay_us(RESET_LOW_US);

        self.line.set_direction(Direction::Input);
        self.delay.delay_us(PRESENCE_SAMPLE_US);
        let present = !self.line.is_high();
        self.delay.delay_us(RESET_RECOVERY_US);

        present
    }

    pub fn write_bit(&mut self, bit: bool) {
        self.line.set_direction(Direction::Output);
        self.line.set_level(false);
        if bit {
            self.delay.delay_us(WRITE_ONE_LOW_US);
            self.line.set_level(true);
            self.delay.delay_us(WRITE_ONE_HIGH_US);
        } else {
            self.delay.delay_us(WRITE_ZERO_LOW_US);
            self.line.set_level(true);
            self.delay.delay_us(WRITE_ZERO_HIGH_US);
        }
    }

    pub fn read_bit(&mut self) -> bool {
        self.line.set_direction(Direction::Output);
        self.line.set_level(false);
        self.delay.delay_us(READ_LOW_US);

        self.line.set_direction(Direction::Input);
        self.delay.delay_us(READ_SAMPLE_US);
        let bit = self.line.is_high();
        self.delay.delay_us(READ_RECOVERY_US);

        bit
    }

    /// LSB primeiro.
    pub fn write_byte(&mut self, value: u8) {
        for i in 0..8 {
            self.write_bit((value >> i) & 1 == 1);
        }
    }

    /// LSB primeiro.
    pub fn read_byte(&mut self) -> u8 {
        let mut value = 0u8;
        for _ in 0..8 {
            value >>= 1;
            if self.read_bit() {
                value |= 0x80;
            }
        }
        value
    }

    /// Atraso longo no mesmo relógio do barramento (ex.: conversão).
    pub fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }

    #[cfg(test)]
    pub fn line(&self) -> &L {
        &self.line
    }

    #[cfg(test)]
    pub fn line_mut(&mut self) -> &mut L {
        &mut self.line
    }
}
