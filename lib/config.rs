//! Tunable policy for Hamiltonian relabeling and decay-channel extension.

use serde::Deserialize;
use crate::error::{ Error, Result };

/// Options controlling conjugate-symbol naming and the validation performed
/// when new decay channels are added.
///
/// Values can be set directly, with the builder-style setters, or read from a
/// TOML document:
/// ```toml
/// [extension]
/// branching_tolerance = 1e-9
/// allow_unmatched_selectors = false
/// conjugate_suffix = "ᶜ"
/// ```
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtensionConfig {
    /// Slack allowed when checking that added branching fractions into a
    /// single excited level do not exceed 1.
    pub branching_tolerance: f64,
    /// Skip (with a warning) decay channels whose excited-state selector
    /// matches nothing, instead of failing.
    pub allow_unmatched_selectors: bool,
    /// Appended to a Rabi symbol's name to form its conjugate partner.
    pub conjugate_suffix: String,
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            branching_tolerance: 1e-9,
            allow_unmatched_selectors: false,
            conjugate_suffix: "ᶜ".to_string(),
        }
    }
}

/// Top-level layout of a config document; everything outside `[extension]`
/// belongs to other tools and is ignored.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    extension: ExtensionConfig,
}

impl ExtensionConfig {
    /// Create a new config with default values.
    pub fn new() -> Self { Self::default() }

    pub fn with_branching_tolerance(mut self, tol: f64) -> Self {
        self.branching_tolerance = tol;
        self
    }

    pub fn with_unmatched_selectors(mut self, allow: bool) -> Self {
        self.allow_unmatched_selectors = allow;
        self
    }

    pub fn with_conjugate_suffix(mut self, suffix: &str) -> Self {
        self.conjugate_suffix = suffix.to_string();
        self
    }

    /// Parse a config from a TOML document.
    ///
    /// Only the `[extension]` table is read; missing keys keep their default
    /// values and unknown keys are an error. A document without an
    /// `[extension]` table yields the default config.
    pub fn from_toml_str(src: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(src)?;
        file.extension.validate()?;
        Ok(file.extension)
    }

    /// Check the value constraints that the field types alone don't carry.
    pub fn validate(&self) -> Result<()> {
        let tol = self.branching_tolerance;
        if !(tol >= 0.0 && tol.is_finite()) {
            return Err(Error::Config(format!(
                "`branching_tolerance` must be finite and non-negative, got {}",
                tol,
            )));
        }
        if self.conjugate_suffix.is_empty() {
            return Err(Error::Config(
                "`conjugate_suffix` must not be empty".into()));
        }
        Ok(())
    }
}
