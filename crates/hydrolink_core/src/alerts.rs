//! Sistema de alertas – avaliação das faixas ideais da água.

use crate::config::AlertThresholds;
use crate::types::Measurement;
use std::fmt;

/// Grandeza que violou a faixa ideal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertMetric {
    Ph,
    Tds,
    Conductivity,
    Temperature,
}

/// Um alerta disparado.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub metric: AlertMetric,
    pub value: f32,
    /// Limite inferior, quando a faixa tem um
    pub min: Option<f32>,
    pub max: f32,
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let min = self.min.unwrap_or_default();
        match self.metric {
            AlertMetric::Ph => write!(
                f,
                "Alerta pH: {:.2} (ideal {:.1}-{:.1})",
                self.value, min, self.max
            ),
            AlertMetric::Tds => write!(
                f,
                "Alerta TDS: {:.0}ppm (max {:.0}ppm)",
                self.value, self.max
            ),
            AlertMetric::Conductivity => write!(
                f,
                "Alerta EC: {:.0}uS/cm (max {:.0}uS/cm)",
                self.value, self.max
            ),
            AlertMetric::Temperature => write!(
                f,
                "Alerta Temp: {:.1}°C (ideal {:.0}-{:.0}°C)",
                self.value, min, self.max
            ),
        }
    }
}

/// Avalia uma medição contra as faixas ideais e retorna os alertas.
///
/// As quatro verificações são independentes, na ordem pH, TDS, EC e
/// temperatura.
pub fn evaluate_alerts(m: &Measurement, thresholds: &AlertThresholds) -> Vec<Alert> {
    let mut alerts = Vec::new();

    // pH
    check_range(
        &mut alerts,
        AlertMetric::Ph,
        m.ph,
        thresholds.ph_min,
        thresholds.ph_max,
    );

    // TDS
    check_max(&mut alerts, AlertMetric::Tds, m.tds, thresholds.tds_max);

    // Condutividade
    check_max(
        &mut alerts,
        AlertMetric::Conductivity,
        m.conductivity,
        thresholds.conductivity_max,
    );

    // Temperatura
    check_range(
        &mut alerts,
        AlertMetric::Temperature,
        m.temperature,
        thresholds.temperature_min,
        thresholds.temperature_max,
    );

    alerts
}

/// Junta os alertas numa única mensagem; `None` se não houver nenhum.
pub fn alert_message(alerts: &[Alert]) -> Option<String> {
    if alerts.is_empty() {
        return None;
    }
    let clauses: Vec<String> = alerts.iter().map(Alert::to_string).collect();
    Some(clauses.join(" "))
}

/// Avalia a medição e sintetiza a mensagem de alerta.
pub fn evaluate(m: &Measurement, thresholds: &AlertThresholds) -> Option<String> {
    alert_message(&evaluate_alerts(m, thresholds))
}

fn check_range(alerts: &mut Vec<Alert>, metric: AlertMetric, value: f32, min: f32, max: f32) {
    if value < min || value > max {
        alerts.push(Alert {
            metric,
            value,
            min: Some(min),
            max,
        });
    }
}

fn check_max(alerts: &mut Vec<Alert>, metric: AlertMetric, value: f32, max: f32) {
    if value > max {
        alerts.push(Alert {
            metric,
            value,
            min: None,
            max,
        });
    }
}
