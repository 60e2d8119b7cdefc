//! Definição dos tipos de medição trafegados pelo enlace.

use serde::{Deserialize, Serialize};

// ──────────────────────────────────────────────
// Medição
// ──────────────────────────────────────────────

/// Conjunto de grandezas produzido a cada ciclo de amostragem.
///
/// Tipo de valor: é copiado entre componentes, nunca alterado depois de
/// construído.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Measurement {
    /// Temperatura da água (°C, resolução de 1/16 °C)
    pub temperature: f32,
    /// pH (adimensional)
    pub ph: f32,
    /// Condutividade elétrica (µS/cm)
    pub conductivity: f32,
    /// Sólidos dissolvidos totais (ppm)
    pub tds: f32,
}

impl Measurement {
    pub const fn new(temperature: f32, ph: f32, conductivity: f32, tds: f32) -> Self {
        Self {
            temperature,
            ph,
            conductivity,
            tds,
        }
    }
}

// ──────────────────────────────────────────────
// Tensões das sondas
// ──────────────────────────────────────────────

/// Tensões calibradas (mV) entregues pelo front-end analógico.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProbeVoltages {
    pub ec_mv: f32,
    pub ph_mv: f32,
    pub tds_mv: f32,
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
