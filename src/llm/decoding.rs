use crate::core::config::types::DecodingStrategyConfig;

/// Sampling knobs passed to a backend for one attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodingParams {
    pub do_sample: bool,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub repeat_penalty: Option<f32>,
    pub num_beams: u32,
    pub max_new_tokens: u32,
}

impl DecodingParams {
    /// Sampling disabled, single beam.
    pub fn greedy(max_new_tokens: u32) -> Self {
        Self {
            do_sample: false,
            temperature: None,
            top_p: None,
            top_k: None,
            repeat_penalty: None,
            num_beams: 1,
            max_new_tokens,
        }
    }

    pub fn is_deterministic(&self) -> bool {
        !self.do_sample
    }

    /// Temperature the backend should actually use. Greedy decoding is
    /// temperature zero whatever the configured value.
    pub fn effective_temperature(&self) -> f32 {
        if self.do_sample {
            self.temperature.unwrap_or(0.8)
        } else {
            0.0
        }
    }
}

/// A named entry in the generator's fallback chain.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodingStrategy {
    pub name: String,
    pub params: DecodingParams,
}

impl DecodingStrategy {
    pub fn new(name: impl Into<String>, params: DecodingParams) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    pub fn from_config(config: &DecodingStrategyConfig) -> Self {
        Self {
            name: config.name.clone(),
            params: DecodingParams {
                do_sample: config.do_sample,
                temperature: config.temperature,
                top_p: config.top_p,
                top_k: config.top_k,
                repeat_penalty: config.repeat_penalty,
                num_beams: config.num_beams.max(1),
                max_new_tokens: config.max_new_tokens.max(1),
            },
        }
    }

    /// Same strategy with a different output length cap.
    pub fn with_max_new_tokens(&self, max_new_tokens: u32) -> Self {
        let mut strategy = self.clone();
        strategy.params.max_new_tokens = max_new_tokens.max(1);
        strategy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greedy_ignores_configured_temperature() {
        let mut params = DecodingParams::greedy(64);
        params.temperature = Some(1.3);
        assert!(params.is_deterministic());
        assert_eq!(params.effective_temperature(), 0.0);
    }

    #[test]
    fn from_config_clamps_beams_and_tokens() {
        let config = DecodingStrategyConfig {
            name: "odd".to_string(),
            num_beams: 0,
            max_new_tokens: 0,
            ..DecodingStrategyConfig::default()
        };
        let strategy = DecodingStrategy::from_config(&config);
        assert_eq!(strategy.params.num_beams, 1);
        assert_eq!(strategy.params.max_new_tokens, 1);
        assert_eq!(strategy.with_max_new_tokens(400).params.max_new_tokens, 400);
    }
}
