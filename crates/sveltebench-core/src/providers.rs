//! Known LLM providers and where their credentials live.

/// How a provider's model listing endpoint expects the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// `x-api-key: <key>` plus `anthropic-version`
    Anthropic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Provider {
    /// Identifier passed to the worker as `DEBUG_PROVIDER`.
    pub id: &'static str,
    pub display_name: &'static str,
    /// Environment variable holding the API key.
    pub env_key: &'static str,
    /// OpenAI-style `GET /models` endpoint, when the provider has one.
    pub models_url: Option<&'static str>,
    pub auth: AuthStyle,
}

pub const PROVIDERS: &[Provider] = &[
    Provider {
        id: "openai",
        display_name: "OpenAI",
        env_key: "OPENAI_API_KEY",
        models_url: Some("https://api.openai.com/v1/models"),
        auth: AuthStyle::Bearer,
    },
    Provider {
        id: "anthropic",
        display_name: "Anthropic",
        env_key: "ANTHROPIC_API_KEY",
        models_url: Some("https://api.anthropic.com/v1/models"),
        auth: AuthStyle::Anthropic,
    },
    Provider {
        id: "google",
        display_name: "Google (Gemini)",
        env_key: "GOOGLE_API_KEY",
        models_url: None,
        auth: AuthStyle::Bearer,
    },
    Provider {
        id: "openrouter",
        display_name: "OpenRouter",
        env_key: "OPENROUTER_API_KEY",
        models_url: Some("https://openrouter.ai/api/v1/models"),
        auth: AuthStyle::Bearer,
    },
    Provider {
        id: "groq",
        display_name: "Groq",
        env_key: "GROQ_API_KEY",
        models_url: Some("https://api.groq.com/openai/v1/models"),
        auth: AuthStyle::Bearer,
    },
    Provider {
        id: "deepseek",
        display_name: "DeepSeek",
        env_key: "DEEPSEEK_API_KEY",
        models_url: Some("https://api.deepseek.com/models"),
        auth: AuthStyle::Bearer,
    },
    Provider {
        id: "xai",
        display_name: "xAI (Grok)",
        env_key: "XAI_API_KEY",
        models_url: Some("https://api.x.ai/v1/models"),
        auth: AuthStyle::Bearer,
    },
    Provider {
        id: "mistral",
        display_name: "Mistral",
        env_key: "MISTRAL_API_KEY",
        models_url: Some("https://api.mistral.ai/v1/models"),
        auth: AuthStyle::Bearer,
    },
    Provider {
        id: "cohere",
        display_name: "Cohere",
        env_key: "COHERE_API_KEY",
        models_url: None,
        auth: AuthStyle::Bearer,
    },
    Provider {
        id: "fireworks",
        display_name: "Fireworks",
        env_key: "FIREWORKS_API_KEY",
        models_url: Some("https://api.fireworks.ai/inference/v1/models"),
        auth: AuthStyle::Bearer,
    },
    Provider {
        id: "moonshot",
        display_name: "Moonshot",
        env_key: "MOONSHOT_API_KEY",
        models_url: Some("https://api.moonshot.ai/v1/models"),
        auth: AuthStyle::Bearer,
    },
    Provider {
        id: "zai",
        display_name: "Z.ai",
        env_key: "Z_AI_API_KEY",
        models_url: None,
        auth: AuthStyle::Bearer,
    },
];

/// Find a provider by id, display name or key variable (case-insensitive).
pub fn lookup(name: &str) -> Option<&'static Provider> {
    let name = name.trim();
    PROVIDERS.iter().find(|p| {
        p.id.eq_ignore_ascii_case(name)
            || p.display_name.eq_ignore_ascii_case(name)
            || p.env_key.eq_ignore_ascii_case(name)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_accepts_every_spelling() {
        assert_eq!(lookup("openai").map(|p| p.env_key), Some("OPENAI_API_KEY"));
        assert_eq!(lookup("Google (Gemini)").map(|p| p.id), Some("google"));
        assert_eq!(lookup("z_ai_api_key").map(|p| p.id), Some("zai"));
        assert_eq!(lookup(" XAI ").map(|p| p.display_name), Some("xAI (Grok)"));
        assert!(lookup("watsonx").is_none());
    }

    #[test]
    fn ids_and_keys_are_unique() {
        for (i, a) in PROVIDERS.iter().enumerate() {
            for b in &PROVIDERS[i + 1..] {
                assert_ne!(a.id, b.id);
                assert_ne!(a.env_key, b.env_key);
            }
        }
    }
}
