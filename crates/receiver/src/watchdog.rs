//! Detecção de enlace offline.
//!
//! O relógio vem de fora (`now`), então os testes avançam o tempo sem
//! dormir.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Online,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogEvent {
    /// Silêncio acima do limite; emitido uma vez por queda.
    Offline { silent_for: Duration },
    /// Primeiro frame válido depois de uma queda.
    Recovered,
}

#[derive(Debug)]
pub struct OfflineWatchdog {
    timeout: Duration,
    last_valid: Option<Instant>,
    state: LinkState,
}

impl OfflineWatchdog {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            last_valid: None,
            state: LinkState::Online,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Registra um frame de telemetria decodificado com sucesso.
    pub fn record_frame(&mut self, now: Instant) -> Option<WatchdogEvent> {
        self.last_valid = Some(now);
        match self.state {
            LinkState::Offline => {
                self.state = LinkState::Online;
                Some(WatchdogEvent::Recovered)
            }
            LinkState::Online => None,
        }
    }

    /// Verificação periódica. Antes do primeiro frame nunca dispara.
    pub fn tick(&mut self, now: Instant) -> Option<WatchdogEvent> {
        if self.state == LinkState::Offline {
            return None;
        }
        let last = self.last_valid?;
        let silent_for = now.saturating_duration_since(last);
        if silent_for > self.timeout {
            self.state = LinkState::Offline;
            Some(WatchdogEvent::Offline { silent_for })
        } else {
            None
        }
    }
}
