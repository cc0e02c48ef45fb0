//! Configuration normalization.
//!
//! Out-of-range knobs never fail construction; they are clamped to the
//! documented valid ranges. A config that parses is a config that runs.

use crate::config::schema::GateConfig;

/// Clamp every out-of-range field to its valid range, warning about each
/// adjustment. Returns the normalized config.
pub fn normalize(mut config: GateConfig) -> GateConfig {
    if !(0.01..=0.99).contains(&config.tracker.alpha) {
        let clamped = config.tracker.alpha.clamp(0.01, 0.99);
        tracing::warn!(
            alpha = config.tracker.alpha as f64,
            clamped = clamped as f64,
            "tracker.alpha out of range, clamping"
        );
        config.tracker.alpha = clamped;
    }

    if config.tracker.window_size < 4 {
        tracing::warn!(
            window_size = config.tracker.window_size,
            "tracker.window_size below minimum, clamping to 4"
        );
        config.tracker.window_size = 4;
    }

    if config.tracker.sample_size > 0 && config.tracker.sample_size < 10 {
        tracing::warn!(
            sample_size = config.tracker.sample_size,
            "tracker.sample_size below minimum, clamping to 10"
        );
        config.tracker.sample_size = 10;
    }

    if config.cache_size == 0 {
        tracing::warn!("cache_size of zero is unusable, clamping to 1");
        config.cache_size = 1;
    }

    if config.dispatcher_buffer_size == 0 {
        tracing::warn!("dispatcher_buffer_size of zero is unusable, clamping to 1");
        config.dispatcher_buffer_size = 1;
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_range_config_passes_through_unchanged() {
        let config = normalize(GateConfig::default());
        let default = GateConfig::default();
        assert_eq!(config.tracker.alpha, default.tracker.alpha);
        assert_eq!(config.tracker.window_size, default.tracker.window_size);
        assert_eq!(config.cache_size, default.cache_size);
    }

    #[test]
    fn out_of_range_knobs_are_clamped() {
        let mut config = GateConfig::default();
        config.tracker.alpha = -3.0;
        config.tracker.window_size = 1;
        config.tracker.sample_size = 3;
        config.cache_size = 0;
        config.dispatcher_buffer_size = 0;

        let config = normalize(config);
        assert_eq!(config.tracker.alpha, 0.01);
        assert_eq!(config.tracker.window_size, 4);
        assert_eq!(config.tracker.sample_size, 10);
        assert_eq!(config.cache_size, 1);
        assert_eq!(config.dispatcher_buffer_size, 1);
    }

    #[test]
    fn zero_sample_size_stays_disabled() {
        let mut config = GateConfig::default();
        config.tracker.sample_size = 0;
        assert_eq!(normalize(config).tracker.sample_size, 0);
    }
}
