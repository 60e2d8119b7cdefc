//! Conversão de tensão calibrada em grandezas físicas.
//!
//! Funções puras e totais: aceitam qualquer entrada finita, não têm efeitos
//! colaterais e recebem a calibração explicitamente.

use crate::config::{Calibration, EcCalibration, PhCalibration, TdsCalibration};
use crate::types::{Measurement, ProbeVoltages};

/// Temperatura de referência das compensações (°C).
pub const REFERENCE_CELSIUS: f32 = 25.0;

/// Condutividade elétrica (µS/cm) a partir da tensão da sonda (mV).
///
/// Interpola a reta entre os dois pontos de calibração, normaliza para
/// 25 °C e reaplica o mesmo fator para reportar a EC na temperatura atual.
/// O resultado é, por construção, o valor linear cru.
pub fn ec(voltage_mv: f32, temperature_c: f32, cal: &EcCalibration) -> f32 {
    let slope = (cal.ref2_us - cal.ref1_us) / (cal.ref2_mv - cal.ref1_mv);
    let raw = cal.ref1_us + slope * (voltage_mv - cal.ref1_mv);

    let factor = 1.0 + cal.temp_coefficient * (temperature_c - REFERENCE_CELSIUS);
    if factor == 0.0 || !factor.is_finite() {
        return raw;
    }
    let ec25 = raw / factor;
    ec25 * factor
}

/// pH a partir da tensão da sonda (mV).
///
/// A temperatura é aceita mas não entra na fórmula.
pub fn ph(voltage_mv: f32, _temperature_c: f32, cal: &PhCalibration) -> f32 {
    let voltage = voltage_mv / 1000.0;
    cal.slope * voltage + cal.intercept
}

/// Sólidos dissolvidos totais (ppm) a partir da tensão da sonda (mV).
///
/// Nunca negativo: ruído que leva a curva abaixo de zero é truncado.
pub fn tds(voltage_mv: f32, temperature_c: f32, cal: &TdsCalibration) -> f32 {
    let voltage = voltage_mv / 1000.0;

    let coefficient = 1.0 + cal.temp_coefficient * (temperature_c - REFERENCE_CELSIUS);
    let compensated = voltage / coefficient;
    let v = if compensated.is_finite() {
        compensated
    } else {
        voltage
    };

    let value = (cal.cubic * v * v * v + cal.square * v * v + cal.linear * v) * cal.scale;

    // Também cobre NaN
    if value > 0.0 { value } else { 0.0 }
}

impl Calibration {
    /// Monta uma [`Measurement`] a partir da temperatura e das tensões.
    pub fn convert(&self, temperature_c: f32, volts: &ProbeVoltages) -> Measurement {
        Measurement {
            temperature: temperature_c,
            ph: ph(volts.ph_mv, temperature_c, &self.ph),
            conductivity: ec(volts.ec_mv, temperature_c, &self.ec),
            tds: tds(volts.tds_mv, temperature_c, &self.tds),
        }
    }
}
