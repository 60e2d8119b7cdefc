//! Destino dos dados recebidos.

use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CloudError {
    #[error("Envio recusado: {0}")]
    Rejected(String),
}

/// Serviço de dashboard: métricas por canal e eventos nomeados.
pub trait CloudSink {
    fn post_metric(&mut self, channel_id: &str, value: f32) -> Result<(), CloudError>;
    fn post_event(&mut self, event_id: &str, description: &str) -> Result<(), CloudError>;
}

/// Sink que só registra no log.
#[derive(Debug, Default)]
pub struct LogSink;

impl CloudSink for LogSink {
    fn post_metric(&mut self, channel_id: &str, value: f32) -> Result<(), CloudError> {
        info!("☁ {channel_id} = {value:.2}");
        Ok(())
    }

    fn post_event(&mut self, event_id: &str, description: &str) -> Result<(), CloudError> {
        info!("☁ evento {event_id}: {description}");
        Ok(())
    }
}
