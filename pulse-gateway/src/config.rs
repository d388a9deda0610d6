//! Model Gateway call configuration.

/// Configuration for a single `generate`/`chat_with_tools` call.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Which model to address (a fake identifier when backed by [`crate::fake::FakeGateway`]).
    pub model_id: String,
    /// Sampling temperature, expected in `[0, 2]`.
    pub temperature: f64,
    /// Upper bound on generated output length.
    pub max_output_tokens: u32,
    /// Whether the caller expects the reply to be parsed as structured JSON.
    pub structured_output: bool,
    /// Names of tools this call is permitted to use.
    pub tools: Vec<String>,
}

impl GatewayConfig {
    /// Build a config with reasonable defaults: temperature 0.7, 1024 output
    /// tokens, unstructured output, no tools.
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            temperature: 0.7,
            max_output_tokens: 1024,
            structured_output: false,
            tools: Vec::new(),
        }
    }

    /// Set the sampling temperature, clamped to `[0, 2]`.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    /// Set the output token ceiling.
    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    /// Mark this call as expecting structured (JSON) output.
    pub fn with_structured_output(mut self, structured_output: bool) -> Self {
        self.structured_output = structured_output;
        self
    }

    /// Attach the set of tool names usable for this call.
    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools = tools;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temperature_is_clamped() {
        let cfg = GatewayConfig::new("m").with_temperature(5.0);
        assert_eq!(cfg.temperature, 2.0);
        let cfg = GatewayConfig::new("m").with_temperature(-1.0);
        assert_eq!(cfg.temperature, 0.0);
    }
}
