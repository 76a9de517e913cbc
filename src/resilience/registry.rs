//! Circuit Breaker Registry
//!
//! Maps resource names to breakers, creating them on first reference.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::error::{ProtectionError, ProtectionResult};
use crate::monitoring::MonitoringService;
use crate::resilience::{CircuitBreaker, CircuitBreakerOptions, CircuitStats};

/// Process-wide collection of named circuit breakers.
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    breakers: RwLock<HashMap<String, CircuitBreaker>>,
    defaults: CircuitBreakerOptions,
    monitoring: Option<Arc<MonitoringService>>,
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerOptions::default(), None)
    }
}

impl CircuitBreakerRegistry {
    pub fn new(defaults: CircuitBreakerOptions, monitoring: Option<Arc<MonitoringService>>) -> Self {
        Self {
            breakers: RwLock::new(HashMap::new()),
            defaults,
            monitoring,
        }
    }

    /// Returns the breaker for `name`, creating it with `options` (or the
    /// registry defaults) if it does not exist yet. Options passed for an
    /// existing breaker are ignored.
    pub fn get_or_create(
        &self,
        name: &str,
        options: Option<CircuitBreakerOptions>,
    ) -> CircuitBreaker {
        if let Some(breaker) = self.breakers.read().get(name) {
            return breaker.clone();
        }

        let mut breakers = self.breakers.write();
        if let Some(breaker) = breakers.get(name) {
            return breaker.clone();
        }

        let breaker = CircuitBreaker::new(
            name,
            options.unwrap_or_else(|| self.defaults.clone()),
            self.monitoring.clone(),
        );
        breakers.insert(name.to_string(), breaker.clone());
        info!(circuit = %name, "Circuit breaker registered");
        breaker
    }

    pub fn get(&self, name: &str) -> Option<CircuitBreaker> {
        self.breakers.read().get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.breakers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.read().is_empty()
    }

    /// Stats of every breaker, sorted by name.
    pub fn all_stats(&self) -> Vec<CircuitStats> {
        let mut stats: Vec<CircuitStats> =
            self.breakers.read().values().map(CircuitBreaker::stats).collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }

    pub fn reset_all(&self) -> usize {
        let breakers: Vec<CircuitBreaker> = self.breakers.read().values().cloned().collect();
        for breaker in &breakers {
            breaker.reset();
        }
        info!(count = breakers.len(), "All circuit breakers reset");
        breakers.len()
    }

    /// Resets the named breakers; unknown names are skipped.
    pub fn reset_selected<S: AsRef<str>>(&self, names: &[S]) -> usize {
        let mut reset = 0;
        for name in names {
            if let Some(breaker) = self.get(name.as_ref()) {
                breaker.reset();
                reset += 1;
            }
        }
        reset
    }

    /// Cancels every pending half-open timer.
    pub fn shutdown(&self) {
        for breaker in self.breakers.read().values() {
            breaker.shutdown();
        }
    }

    /// Runs `operation` through the breaker named `name`.
    pub async fn with_circuit_breaker<T, E, F, Fut>(
        &self,
        name: &str,
        options: Option<CircuitBreakerOptions>,
        operation: F,
    ) -> ProtectionResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<ProtectionError>,
    {
        self.get_or_create(name, options).execute(operation).await
    }
}
