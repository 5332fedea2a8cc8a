//! Translator configuration.
//!
//! [`TranslatorConfig`] is a plain struct with defaults. The binary fills it
//! from command line arguments and the filetest runner from `; RUN:` flags
//! via [`TranslatorConfig::from_flags`].

use std::fmt;
use std::str::FromStr;

/// What to do when a use disagrees with the resolved type of its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MismatchPolicy {
    /// Record a diagnostic and reinterpret the bits at the use.
    #[default]
    Coerce,
    /// Fail the unit; it falls back to the un-optimized path.
    Reject,
}

impl FromStr for MismatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "coerce" => Ok(MismatchPolicy::Coerce),
            "reject" => Ok(MismatchPolicy::Reject),
            other => Err(format!("unknown mismatch policy '{}'", other)),
        }
    }
}

impl fmt::Display for MismatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchPolicy::Coerce => f.write_str("coerce"),
            MismatchPolicy::Reject => f.write_str("reject"),
        }
    }
}

/// Which per-unit sections the driver renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrintOptions {
    pub graph: bool,
    pub types: bool,
    pub plan: bool,
    pub stats: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatorConfig {
    pub mismatch_policy: MismatchPolicy,
    pub eliminate_dead_code: bool,
    /// Run the use-set consistency check after every pass.
    pub verify: bool,
    /// Worker threads; 1 translates on the calling thread.
    pub threads: usize,
    /// Name of a built-in analysis client to report tainted values for.
    pub taint: Option<String>,
    pub print: PrintOptions,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            mismatch_policy: MismatchPolicy::Coerce,
            eliminate_dead_code: true,
            verify: cfg!(debug_assertions),
            threads: 1,
            taint: None,
            print: PrintOptions::default(),
        }
    }
}

impl TranslatorConfig {
    /// Build a configuration from command-style flags such as
    /// `--print-graph` or `--mismatch=reject`. Unknown flags are an error.
    pub fn from_flags<'a>(flags: impl IntoIterator<Item = &'a str>) -> Result<Self, String> {
        let mut config = Self::default();
        for flag in flags {
            let (name, value) = match flag.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (flag, None),
            };
            match (name, value) {
                ("--print-graph", None) => config.print.graph = true,
                ("--print-types", None) => config.print.types = true,
                ("--print-plan", None) => config.print.plan = true,
                ("--print-stats", None) => config.print.stats = true,
                ("--no-dce", None) => config.eliminate_dead_code = false,
                ("--verify", None) => config.verify = true,
                ("--mismatch", Some(policy)) => config.mismatch_policy = policy.parse()?,
                ("--threads", Some(n)) => {
                    config.threads = n
                        .parse()
                        .ok()
                        .filter(|&n| n > 0)
                        .ok_or_else(|| format!("invalid thread count '{}'", n))?;
                }
                ("--taint", Some(client)) => config.taint = Some(client.to_string()),
                _ => return Err(format!("unknown flag '{}'", flag)),
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TranslatorConfig::default();
        assert_eq!(config.mismatch_policy, MismatchPolicy::Coerce);
        assert!(config.eliminate_dead_code);
        assert_eq!(config.threads, 1);
    }

    #[test]
    fn test_from_flags() {
        let config = TranslatorConfig::from_flags([
            "--print-graph",
            "--no-dce",
            "--mismatch=reject",
            "--threads=4",
            "--taint=args",
        ])
        .unwrap();
        assert!(config.print.graph);
        assert!(!config.print.plan);
        assert!(!config.eliminate_dead_code);
        assert_eq!(config.mismatch_policy, MismatchPolicy::Reject);
        assert_eq!(config.threads, 4);
        assert_eq!(config.taint.as_deref(), Some("args"));

        assert!(TranslatorConfig::from_flags(["--threads=0"]).is_err());
        assert!(TranslatorConfig::from_flags(["--mismatch=maybe"]).is_err());
        assert!(TranslatorConfig::from_flags(["--print-rpo"]).is_err());
    }
}
