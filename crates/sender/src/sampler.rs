//! Ciclo de amostragem: temperatura + tensões → [`Measurement`].
//!
//! Falhas do sensor nunca derrubam o ciclo. Sem leitura válida, vale a
//! última temperatura boa ou, se nunca houve uma, o fallback configurado,
//! para que as compensações térmicas continuem definidas.

use crate::ds18b20::Ds18b20;
use crate::onewire::BusLine;
use embedded_hal::delay::DelayNs;
use hydrolink_core::config::Calibration;
use hydrolink_core::types::{Measurement, ProbeVoltages};
use std::fmt;
use tracing::{debug, warn};

/// Sondas analógicas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Ec,
    Ph,
    Tds,
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Probe::Ec => f.write_str("EC"),
            Probe::Ph => f.write_str("pH"),
            Probe::Tds => f.write_str("TDS"),
        }
    }
}

/// Front-end analógico: devolve a tensão já calibrada em mV.
pub trait AnalogFrontEnd {
    /// `None` quando a leitura ou a calibração do ADC falhou.
    fn read_mv(&mut self, probe: Probe) -> Option<f32>;
}

/// Amostrador do nó transmissor.
pub struct Sampler<L, D, A> {
    sensor: Ds18b20<L, D>,
    front_end: A,
    calibration: Calibration,
    fallback_celsius: f32,
    last_good: Option<f32>,
}

impl<L: BusLine, D: DelayNs, A: AnalogFrontEnd> Sampler<L, D, A> {
    pub fn new(
        sensor: Ds18b20<L, D>,
        front_end: A,
        calibration: Calibration,
        fallback_celsius: f32,
    ) -> Self {
        Self {
            sensor,
            front_end,
            calibration,
            fallback_celsius,
            last_good: None,
        }
    }

    /// Lê todas as sondas e converte em grandezas físicas.
    pub fn sample(&mut self) -> Measurement {
        let temperature = self.temperature();
        let volts = ProbeVoltages {
            ec_mv: self.voltage(Probe::Ec),
            ph_mv: self.voltage(Probe::Ph),
            tds_mv: self.voltage(Probe::Tds),
        };
        debug!(
            "Tensões: EC {:.2} mV | pH {:.2} mV | TDS {:.2} mV",
            volts.ec_mv, volts.ph_mv, volts.tds_mv
        );
        self.calibration.convert(temperature, &volts)
    }

    fn temperature(&mut self) -> f32 {
        match self.sensor.read_celsius() {
            Ok(celsius) => {
                self.last_good = Some(celsius);
                celsius
            }
            Err(e) => {
                let fallback = self.last_good.unwrap_or(self.fallback_celsius);
                warn!("{e}; usando {fallback:.2} °C");
                fallback
            }
        }
    }

    fn voltage(&mut self, probe: Probe) -> f32 {
        self.front_end.read_mv(probe).unwrap_or_else(|| {
            warn!("Erro lendo ADC da sonda {probe}; usando 0 mV");
            0.0
        })
    }

    #[cfg(test)]
    pub fn sensor_mut(&mut self) -> &mut Ds18b20<L, D> {
        &mut self.sensor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::{SimulatedProbe, VirtualClock};
    use crate::onewire::OneWireBus;

    struct FixedFrontEnd {
        ec_mv: Option<f32>,
        ph_mv: Option<f32>,
        tds_mv: Option<f32>,
    }

    impl AnalogFrontEnd for FixedFrontEnd {
        fn read_mv(&mut self, probe: Probe) -> Option<f32> {
            match probe {
                Probe::Ec => self.ec_mv,
                Probe::Ph => self.ph_mv,
                Probe::Tds => self.tds_mv,
            }
        }
    }

    fn sampler(
        water_celsius: f32,
        connected: bool,
        front_end: FixedFrontEnd,
    ) -> Sampler<SimulatedProbe, VirtualClock, FixedFrontEnd> {
        let clock = VirtualClock::new();
        let probe = SimulatedProbe::new(clock.clone(), water_celsius, connected);
        let sensor = Ds18b20::new(OneWireBus::new(probe, clock));
        Sampler::new(sensor, front_end, Calibration::default(), 25.0)
    }

    fn nominal_front_end() -> FixedFrontEnd {
        FixedFrontEnd {
            ec_mv: Some(244.0),
            ph_mv: Some(1500.0),
            tds_mv: Some(0.0),
        }
    }

    #[test]
    fn sample_converts_all_probes() {
        let mut sampler = sampler(25.0, true, nominal_front_end());
        let m = sampler.sample();
        assert_eq!(m.temperature, 25.0);
        assert_eq!(m.conductivity, 1548.0);
        assert_eq!(m.tds, 0.0);
        assert!((m.ph - 7.0268).abs() < 1e-3);
    }

    #[test]
    fn never_seen_sensor_uses_configured_fallback() {
        let mut sampler = sampler(18.0, false, nominal_front_end());
        assert_eq!(sampler.sample().temperature, 25.0);
    }

    #[test]
    fn lost_sensor_keeps_last_good_value() {
        let mut sampler = sampler(18.5, true, nominal_front_end());
        assert_eq!(sampler.sample().temperature, 18.5);

        sampler.sensor_mut().bus_mut().line_mut().set_connected(false);
        assert_eq!(sampler.sample().temperature, 18.5);
    }

    #[test]
    fn sensor_lost_after_conversion_falls_back() {
        let mut sampler = sampler(19.25, true, nominal_front_end());
        assert_eq!(sampler.sample().temperature, 19.25);

        sampler
            .sensor_mut()
            .bus_mut()
            .line_mut()
            .set_drop_after_convert(true);
        assert_eq!(sampler.sample().temperature, 19.25);

        let mut fresh = self::sampler(19.25, true, nominal_front_end());
        fresh
            .sensor_mut()
            .bus_mut()
            .line_mut()
            .set_drop_after_convert(true);
        assert_eq!(fresh.sample().temperature, 25.0);
    }

    #[test]
    fn failed_adc_reads_as_zero_millivolts() {
        let mut sampler = sampler(
            25.0,
            true,
            FixedFrontEnd {
                ec_mv: None,
                ph_mv: Some(1500.0),
                tds_mv: None,
            },
        );
        let m = sampler.sample();
        let expected_ec = hydrolink_core::conversion::ec(0.0, 25.0, &Calibration::default().ec);
        assert_eq!(m.conductivity, expected_ec);
        assert_eq!(m.tds, 0.0);
    }
}
