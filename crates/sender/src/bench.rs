//! Bancada de testes: DS18B20 simulado sobre relógio virtual.
//!
//! Num PC não há GPIO, então o transmissor fala com um modelo do sensor.
//! O [`VirtualClock`] avança microssegundos virtuais a cada atraso do
//! barramento e o [`SimulatedProbe`] reage às bordas da linha como o chip
//! real: presença após o reset, bits escritos pela largura do pulso baixo,
//! bits lidos segurando a linha em 0. Cada slot fica registrado para que os
//! testes confiram os tempos sem depender do relógio de parede.

use crate::ds18b20::{self, CONVERT_T, READ_SCRATCHPAD, SCRATCHPAD_LEN, SKIP_ROM};
use crate::onewire::{BusLine, Direction};
use crate::sampler::{AnalogFrontEnd, Probe};
use embedded_hal::delay::DelayNs;
use hydrolink_core::config::BenchConfig;
use std::cell::Cell;
use std::rc::Rc;
use tracing::warn;

/// Pulso baixo mínimo reconhecido como reset.
const RESET_MIN_US: u64 = 480;
/// Pulso baixo máximo lido como bit 1.
const WRITE_ONE_MAX_US: u64 = 15;
/// Atraso e duração do pulso de presença.
const PRESENCE_DELAY_US: u64 = 15;
const PRESENCE_LEN_US: u64 = 120;
/// Quanto tempo o sensor segura a linha ao transmitir um 0.
const ZERO_HOLD_US: u64 = 30;
/// Duração mínima de um slot de bit.
const SLOT_MIN_US: u64 = 60;
/// Fim da janela em que o bit lido é válido.
const READ_VALID_US: u64 = 15;

/// Valor de power-on do scratchpad: 85 °C.
const POWER_ON_RAW: i16 = 0x0550;

// ──────────────────────────────────────────────
// Relógio virtual
// ──────────────────────────────────────────────

/// Relógio compartilhado entre o atraso do barramento e a sonda simulada.
#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    now_ns: Rc<Cell<u64>>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_us(&self) -> u64 {
        self.now_ns.get() / 1_000
    }
}

impl DelayNs for VirtualClock {
    fn delay_ns(&mut self, ns: u32) {
        self.now_ns.set(self.now_ns.get() + u64::from(ns));
    }
}

// ──────────────────────────────────────────────
// Sonda simulada
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    WriteOne,
    WriteZero,
    Read,
}

/// Slot de bit observado na linha.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub kind: SlotKind,
    pub start_us: u64,
    pub low_us: u64,
    /// Quando o mestre amostrou a linha, relativo à borda de descida
    pub sample_after_us: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Idle,
    RomCommand,
    FunctionCommand,
    Transmit { bit: usize },
}

/// Modelo de um DS18B20 sozinho no barramento.
#[derive(Debug)]
pub struct SimulatedProbe {
    clock: VirtualClock,
    connected: bool,
    water_celsius: f32,
    scratchpad: [u8; SCRATCHPAD_LEN],
    crc_fault: bool,
    drop_after_convert: bool,

    direction: Direction,
    level_high: bool,
    fall_at: Option<u64>,
    presence: Option<(u64, u64)>,
    hold_low_until: u64,

    mode: Mode,
    rx_byte: u8,
    rx_bits: u8,

    slots: Vec<Slot>,
    pending_read: Option<usize>,
    commands: Vec<u8>,
    resets: usize,
}

impl SimulatedProbe {
    pub fn new(clock: VirtualClock, water_celsius: f32, connected: bool) -> Self {
        Self {
            clock,
            connected,
            water_celsius,
            scratchpad: scratchpad_for(POWER_ON_RAW),
            crc_fault: false,
            drop_after_convert: false,
            direction: Direction::Input,
            level_high: true,
            fall_at: None,
            presence: None,
            hold_low_until: 0,
            mode: Mode::Idle,
            rx_byte: 0,
            rx_bits: 0,
            slots: Vec::new(),
            pending_read: None,
            commands: Vec::new(),
            resets: 0,
        }
    }

    #[cfg(test)]
    pub fn clock(&self) -> &VirtualClock {
        &self.clock
    }

    #[cfg(test)]
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    #[cfg(test)]
    pub fn set_water_celsius(&mut self, celsius: f32) {
        self.water_celsius = celsius;
    }

    #[cfg(test)]
    /// Faz as próximas conversões gravarem um CRC inválido.
    pub fn set_crc_fault(&mut self, fault: bool) {
        self.crc_fault = fault;
    }

    /// Faz a sonda sumir do barramento logo após o próximo CONVERT T.
    #[cfg(test)]
    pub fn set_drop_after_convert(&mut self, drop: bool) {
        self.drop_after_convert = drop;
    }

    #[cfg(test)]
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    #[cfg(test)]
    pub fn resets(&self) -> usize {
        self.resets
    }

    #[cfg(test)]
    pub fn last_command(&self) -> Option<u8> {
        self.commands.last().copied()
    }

    fn host_low(&self) -> bool {
        self.direction == Direction::Output && !self.level_high
    }

    /// Aplica uma mudança no pino e trata a borda resultante.
    fn update(&mut self, change: impl FnOnce(&mut Self)) {
        let was_low = self.host_low();
        change(self);
        let is_low = self.host_low();

        let now = self.clock.now_us();
        match (was_low, is_low) {
            (false, true) => self.on_fall(now),
            (true, false) => self.on_release(now),
            _ => {}
        }
    }

    fn on_fall(&mut self, now: u64) {
        self.fall_at = Some(now);
        self.pending_read = None;

        if let Some(prev) = self.slots.last() {
            let total = now - prev.start_us;
            if total < SLOT_MIN_US {
                warn!(
                    "Slot {:?} de {}µs (baixo {}µs), mínimo {}µs",
                    prev.kind, total, prev.low_us, SLOT_MIN_US
                );
            }
            if prev.kind == SlotKind::Read && prev.sample_after_us.is_none() {
                warn!("Slot de leitura em {}µs sem amostragem do mestre", prev.start_us);
            }
        }

        if let Mode::Transmit { bit } = self.mode {
            let byte = self.scratchpad[bit / 8];
            if self.connected && (byte >> (bit % 8)) & 1 == 0 {
                self.hold_low_until = now + ZERO_HOLD_US;
            }
        }
    }

    fn on_release(&mut self, now: u64) {
        let Some(start) = self.fall_at.take() else {
            return;
        };
        let low = now - start;

        if low >= RESET_MIN_US {
            self.resets += 1;
            self.slots.clear();
            self.commands.clear();
            self.rx_byte = 0;
            self.rx_bits = 0;
            if self.connected {
                let begin = now + PRESENCE_DELAY_US;
                self.presence = Some((begin, begin + PRESENCE_LEN_US));
                self.mode = Mode::RomCommand;
            } else {
                self.presence = None;
                self.mode = Mode::Idle;
            }
            return;
        }

        let kind = match self.direction {
            Direction::Input => SlotKind::Read,
            Direction::Output if low <= WRITE_ONE_MAX_US => SlotKind::WriteOne,
            Direction::Output => SlotKind::WriteZero,
        };
        self.slots.push(Slot {
            kind,
            start_us: start,
            low_us: low,
            sample_after_us: None,
        });
        if kind == SlotKind::Read {
            self.pending_read = Some(self.slots.len() - 1);
        }

        if !self.connected {
            return;
        }
        match self.mode {
            Mode::Transmit { bit } => {
                let next = bit + 1;
                self.mode = if next < SCRATCHPAD_LEN * 8 {
                    Mode::Transmit { bit: next }
                } else {
                    Mode::Idle
                };
            }
            Mode::RomCommand | Mode::FunctionCommand => {
                // O sensor amostra ~30µs após a descida: pulso curto vale 1
                let bit = low <= WRITE_ONE_MAX_US;
                self.rx_byte |= u8::from(bit) << self.rx_bits;
                self.rx_bits += 1;
                if self.rx_bits == 8 {
                    let byte = self.rx_byte;
                    self.rx_byte = 0;
                    self.rx_bits = 0;
                    self.on_command(byte);
                }
            }
            Mode::Idle => {}
        }
    }

    fn on_command(&mut self, command: u8) {
        self.commands.push(command);
        self.mode = match (self.mode, command) {
            (Mode::RomCommand, SKIP_ROM) => Mode::FunctionCommand,
            (Mode::FunctionCommand, CONVERT_T) => {
                let raw = (self.water_celsius * 16.0).round() as i16;
                self.scratchpad = scratchpad_for(raw);
                if self.crc_fault {
                    self.scratchpad[SCRATCHPAD_LEN - 1] ^= 0xFF;
                }
                if self.drop_after_convert {
                    self.connected = false;
                }
                Mode::Idle
            }
            (Mode::FunctionCommand, READ_SCRATCHPAD) => Mode::Transmit { bit: 0 },
            _ => Mode::Idle,
        };
    }
}

impl BusLine for SimulatedProbe {
    fn set_direction(&mut self, direction: Direction) {
        self.update(|p| p.direction = direction);
    }

    fn set_level(&mut self, high: bool) {
        self.update(|p| p.level_high = high);
    }

    fn is_high(&mut self) -> bool {
        let now = self.clock.now_us();

        if let Some(index) = self.pending_read.take() {
            let slot = &mut self.slots[index];
            let after = now - slot.start_us;
            slot.sample_after_us = Some(after);
            if after >= READ_VALID_US {
                warn!("Amostra do slot de leitura em {after}µs, fora da janela de {READ_VALID_US}µs");
            }
        }

        if self.host_low() {
            return false;
        }
        if self.presence.is_some_and(|(begin, end)| (begin..end).contains(&now)) {
            return false;
        }
        now >= self.hold_low_until
    }
}

/// Scratchpad do DS18B20 com a temperatura crua e CRC válido.
fn scratchpad_for(raw: i16) -> [u8; SCRATCHPAD_LEN] {
    let [lsb, msb] = raw.to_le_bytes();
    let mut pad = [lsb, msb, 0x4B, 0x46, 0x7F, 0xFF, 0x0C, 0x10, 0x00];
    pad[SCRATCHPAD_LEN - 1] = ds18b20::crc8(&pad[..SCRATCHPAD_LEN - 1]);
    pad
}

// ──────────────────────────────────────────────
// Front-end analógico de bancada
// ──────────────────────────────────────────────

/// Tensões fixas vindas da configuração.
#[derive(Debug, Clone)]
pub struct BenchFrontEnd {
    ec_mv: f32,
    ph_mv: f32,
    tds_mv: f32,
}

impl BenchFrontEnd {
    pub fn new(config: &BenchConfig) -> Self {
        Self {
            ec_mv: config.ec_mv,
            ph_mv: config.ph_mv,
            tds_mv: config.tds_mv,
        }
    }
}

impl AnalogFrontEnd for BenchFrontEnd {
    fn read_mv(&mut self, probe: Probe) -> Option<f32> {
        let mv = match probe {
            Probe::Ec => self.ec_mv,
            Probe::Ph => self.ph_mv,
            Probe::Tds => self.tds_mv,
        };
        mv.is_finite().then_some(mv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_advances_only_on_delay() {
        let mut clock = VirtualClock::new();
        let shared = clock.clone();
        assert_eq!(shared.now_us(), 0);
        clock.delay_us(480);
        clock.delay_ms(2);
        assert_eq!(shared.now_us(), 2_480);
    }

    #[test]
    fn power_on_scratchpad_reads_85c() {
        let pad = scratchpad_for(POWER_ON_RAW);
        assert_eq!(&pad[..2], &[0x50, 0x05]);
        assert_eq!(ds18b20::crc8(&pad), 0);
    }

    #[test]
    fn idle_line_is_high() {
        let mut probe = SimulatedProbe::new(VirtualClock::new(), 20.0, true);
        assert!(probe.is_high());
    }

    #[test]
    fn presence_pulse_follows_reset() {
        let mut clock = VirtualClock::new();
        let mut probe = SimulatedProbe::new(clock.clone(), 20.0, true);
        probe.set_direction(Direction::Output);
        probe.set_level(false);
        clock.delay_us(480);
        probe.set_direction(Direction::Input);
        assert!(probe.is_high(), "presença só começa após 15µs");
        clock.delay_us(70);
        assert!(!probe.is_high());
        clock.delay_us(410);
        assert!(probe.is_high());
    }

    #[test]
    fn short_pulse_is_not_a_reset() {
        let mut clock = VirtualClock::new();
        let mut probe = SimulatedProbe::new(clock.clone(), 20.0, true);
        probe.set_direction(Direction::Output);
        probe.set_level(false);
        clock.delay_us(400);
        probe.set_level(true);
        assert_eq!(probe.resets(), 0);
    }

    #[test]
    fn bench_front_end_serves_configured_voltages() {
        let mut fe = BenchFrontEnd::new(&BenchConfig {
            ec_mv: 244.0,
            ph_mv: f32::NAN,
            ..BenchConfig::default()
        });
        assert_eq!(fe.read_mv(Probe::Ec), Some(244.0));
        assert_eq!(fe.read_mv(Probe::Ph), None);
    }
}
