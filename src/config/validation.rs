//! Configuration validation

use super::RtadvConfig;

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Emit every diagnostic through tracing
    pub fn log_diagnostics(&self) {
        for warning in &self.warnings {
            tracing::warn!("{}", warning);
        }
        for error in &self.errors {
            tracing::error!("{}", error);
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate configuration and return warnings/errors
pub fn validate(config: &RtadvConfig) -> ValidationResult {
    let mut result = ValidationResult::new();

    validate_solicitation(config, &mut result);
    validate_timers(config, &mut result);
    validate_pvd(config, &mut result);
    validate_logging(config, &mut result);

    result
}

fn validate_solicitation(config: &RtadvConfig, result: &mut ValidationResult) {
    let s = &config.solicitation;

    if s.max_solicitations == 0 {
        result.error("solicitation.max_solicitations: must be at least 1");
    } else if s.max_solicitations > 3 {
        result.warn(format!(
            "solicitation.max_solicitations: {} exceeds the RFC 4861 value of 3",
            s.max_solicitations
        ));
    }

    if s.interval_secs == 0 {
        result.error("solicitation.interval_secs: must be nonzero");
    }

    if s.jitter_ms >= s.interval_secs.saturating_mul(1000) && s.interval_secs > 0 {
        result.warn(format!(
            "solicitation.jitter_ms: {} is not smaller than the interval",
            s.jitter_ms
        ));
    }

    if s.acquisition_failure_timeout_secs == 0 {
        result.warn(
            "solicitation.acquisition_failure_timeout_secs: 0 declares failure right after the last solicitation",
        );
    }
}

fn validate_timers(config: &RtadvConfig, result: &mut ValidationResult) {
    if config.socket.close_delay_ms == 0 {
        result.warn("socket.close_delay_ms: 0 closes the receive socket on every reconfiguration");
    }

    if config.restart.max_delay_ms > 60_000 {
        result.warn(format!(
            "restart.max_delay_ms: {} is unusually long",
            config.restart.max_delay_ms
        ));
    }
}

fn validate_pvd(config: &RtadvConfig, result: &mut ValidationResult) {
    let pvd = &config.pvd;
    if !pvd.enabled {
        return;
    }

    if pvd.min_refetch_secs < 10 {
        result.warn(format!(
            "pvd.min_refetch_secs: {} is below the recommended 10 seconds",
            pvd.min_refetch_secs
        ));
    }

    if pvd.default_expiration_secs == 0 {
        result.error("pvd.default_expiration_secs: must be nonzero");
    }
}

fn validate_logging(config: &RtadvConfig, result: &mut ValidationResult) {
    let level = config.logging.level.to_lowercase();
    if !matches!(
        level.as_str(),
        "error" | "warn" | "info" | "debug" | "trace"
    ) {
        result.warn(format!(
            "logging.level: unknown level '{}', using info",
            config.logging.level
        ));
    }

    if !matches!(
        config.logging.format.as_str(),
        "pretty" | "compact" | "json"
    ) {
        result.warn(format!(
            "logging.format: unknown format '{}', using pretty",
            config.logging.format
        ));
    }
}
