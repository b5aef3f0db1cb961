use serde::Deserialize;

/// Canonical name of a task or pipeline.
pub type TargetName = String;

/// How the members of a pipeline are executed.
///
/// - `Sequential`: members run in listed order, each waiting for the previous
///   one to finish (default).
/// - `Parallel`: all members start at once; the pipeline finishes when the last
///   member does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Also accepts gulp's `series`.
    #[serde(alias = "series")]
    Sequential,
    Parallel,
}

impl Default for ExecutionMode {
    fn default() -> Self {
        ExecutionMode::Sequential
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Sequential => f.write_str("sequential"),
            ExecutionMode::Parallel => f.write_str("parallel"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Holder {
        mode: ExecutionMode,
    }

    fn mode(toml_value: &str) -> Result<ExecutionMode, toml::de::Error> {
        toml::from_str::<Holder>(&format!("mode = {toml_value:?}")).map(|h| h.mode)
    }

    #[test]
    fn series_is_an_alias_for_sequential() {
        assert_eq!(mode("series").unwrap(), ExecutionMode::Sequential);
        assert_eq!(mode("sequential").unwrap(), ExecutionMode::Sequential);
        assert_eq!(mode("parallel").unwrap(), ExecutionMode::Parallel);
        assert!(mode("both").is_err());
    }

    #[test]
    fn display_uses_canonical_names() {
        assert_eq!(ExecutionMode::Sequential.to_string(), "sequential");
        assert_eq!(ExecutionMode::Parallel.to_string(), "parallel");
    }
}
