//! Cascading prefix / case / format settings.

use crate::output::OutputFormat;
use std::sync::Arc;

/// The values that cascade from outer to inner scopes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextSettings {
    pub prefix: String,
    pub upper_case: bool,
    pub format: OutputFormat,
}

impl ContextSettings {
    pub fn new(prefix: impl Into<String>, upper_case: bool, format: OutputFormat) -> Self {
        Self {
            prefix: prefix.into(),
            upper_case,
            format,
        }
    }
}

/// Settings in effect while processing one specification entry or key.
///
/// A context is never mutated in place; [`ExtractionContext::update`] returns
/// a new one. Every context carries the defaults it was seeded from so that a
/// reset never has to consult global state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionContext {
    current: ContextSettings,
    defaults: Arc<ContextSettings>,
}

impl ExtractionContext {
    pub fn new(defaults: ContextSettings) -> Self {
        Self {
            current: defaults.clone(),
            defaults: Arc::new(defaults),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.current.prefix
    }

    pub fn upper_case(&self) -> bool {
        self.current.upper_case
    }

    pub fn format(&self) -> OutputFormat {
        self.current.format
    }

    pub fn settings(&self) -> &ContextSettings {
        &self.current
    }

    /// Derive a new context.
    ///
    /// For each field an explicit override wins. Otherwise the field falls
    /// back to the default when `reset_to_defaults` is set, and is inherited
    /// from `self` when it is not.
    pub fn update(
        &self,
        prefix: Option<&str>,
        upper_case: Option<bool>,
        format: Option<OutputFormat>,
        reset_to_defaults: bool,
    ) -> Self {
        let base = if reset_to_defaults {
            self.defaults.as_ref()
        } else {
            &self.current
        };

        Self {
            current: ContextSettings {
                prefix: prefix.map_or_else(|| base.prefix.clone(), str::to_string),
                upper_case: upper_case.unwrap_or(base.upper_case),
                format: format.unwrap_or(base.format),
            },
            defaults: Arc::clone(&self.defaults),
        }
    }

    /// Back to the defaults, as at the start of every specification entry.
    pub fn reset(&self) -> Self {
        self.update(None, None, None, true)
    }

    /// Final bucket key for `key`: prefixed, then upper-cased if enabled.
    pub fn key_name(&self, key: &str) -> String {
        let name = format!("{}{}", self.current.prefix, key);
        if self.current.upper_case {
            name.to_uppercase()
        } else {
            name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn base() -> ExtractionContext {
        ExtractionContext::new(ContextSettings::new(
            "global_prefix_",
            false,
            OutputFormat::Json,
        ))
    }

    #[test]
    fn test_new_uses_defaults() {
        let ctx = base();
        assert_eq!(ctx.prefix(), "global_prefix_");
        assert!(!ctx.upper_case());
        assert_eq!(ctx.format(), OutputFormat::Json);
    }

    #[test]
    fn test_all_overrides() {
        let ctx = base().update(Some("override_"), Some(true), Some(OutputFormat::Yaml), false);
        assert_eq!(ctx.settings(), &ContextSettings::new("override_", true, OutputFormat::Yaml));
    }

    #[test]
    fn test_reset_returns_defaults_from_any_source() {
        let path_ctx = base().update(Some("path_"), Some(true), Some(OutputFormat::Env), true);
        let reset = path_ctx.update(None, None, None, true);
        assert_eq!(reset.settings(), base().settings());
    }

    #[test]
    fn test_inherit_returns_copy() {
        let path_ctx = base().update(Some("path_"), Some(true), Some(OutputFormat::Env), true);
        let inherited = path_ctx.update(None, None, None, false);
        assert_eq!(inherited, path_ctx);
    }

    #[test]
    fn test_prefix_override_keeps_inherited_format() {
        let path_ctx = base().update(None, None, Some(OutputFormat::Secret), true);
        let key_ctx = path_ctx.update(Some("KEY_"), None, None, false);

        assert_eq!(key_ctx.prefix(), "KEY_");
        assert_eq!(key_ctx.format(), OutputFormat::Secret);
        assert_eq!(path_ctx.prefix(), "global_prefix_");
    }

    #[test]
    fn test_prefix_override_with_reset_resets_others() {
        let path_ctx = base().update(None, Some(true), Some(OutputFormat::Secret), true);
        let next = path_ctx.update(Some("next_"), None, None, true);

        assert_eq!(next.settings(), &ContextSettings::new("next_", false, OutputFormat::Json));
    }

    #[test]
    fn test_key_name() {
        let ctx = base();
        assert_eq!(ctx.key_name("key1"), "global_prefix_key1");
        assert_eq!(
            ctx.update(None, Some(true), None, false).key_name("key1"),
            "GLOBAL_PREFIX_KEY1"
        );
    }
}
