use std::collections::HashMap;
use std::fmt;

/// API endpoint override, e.g. `http://localhost:3080/api/`
pub const SRC_ENDPOINT: &str = "SRC_ENDPOINT";
/// Numeric user ID; used together with [`SRC_KEY`]
pub const SRC_UID: &str = "SRC_UID";
/// API key for the user named by [`SRC_UID`]
pub const SRC_KEY: &str = "SRC_KEY";
/// Signed permission-grant ticket
pub const SRCLIB_TICKET: &str = "SRCLIB_TICKET";

/// An immutable copy of the environment variables resolution depends on.
///
/// Captured once per client so that endpoint, credential and ticket
/// resolution all observe the same values. Empty values are treated as
/// unset.
#[derive(Clone, Default)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    /// Capture the current process environment.
    ///
    /// Variables whose name or value is not valid UTF-8 are skipped.
    #[must_use]
    pub fn from_process() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Self { vars }
    }

    /// Build a snapshot from explicit pairs, ignoring the process environment.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Return a copy with `name` set to `value`.
    #[must_use]
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Value of `name`, or `None` when it is unset or empty.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

impl fmt::Debug for EnvSnapshot {
    // Values may hold SRC_KEY or SRCLIB_TICKET; only names are printed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.vars.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("EnvSnapshot")
            .field("vars", &names)
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn get_returns_set_values() {
        let env = EnvSnapshot::from_pairs([(SRC_UID, "42")]);
        assert_eq!(env.get(SRC_UID), Some("42"));
        assert_eq!(env.get(SRC_KEY), None);
    }

    #[test]
    fn empty_values_count_as_unset() {
        let env = EnvSnapshot::default().with_var(SRCLIB_TICKET, "");
        assert_eq!(env.get(SRCLIB_TICKET), None);
    }

    #[test]
    fn with_var_overrides() {
        let env = EnvSnapshot::from_pairs([(SRC_ENDPOINT, "https://a/")])
            .with_var(SRC_ENDPOINT, "https://b/");
        assert_eq!(env.get(SRC_ENDPOINT), Some("https://b/"));
    }

    #[test]
    fn debug_lists_names_only() {
        let env = EnvSnapshot::from_pairs([(SRC_KEY, "hunter2"), (SRC_UID, "1")]);
        let dbg = format!("{env:?}");
        assert!(dbg.contains("SRC_KEY"));
        assert!(!dbg.contains("hunter2"), "Debug leaked a value: {dbg}");
    }

    #[test]
    fn from_process_sees_path() {
        // PATH is set in every test environment we run in.
        let env = EnvSnapshot::from_process();
        assert!(env.get("PATH").is_some());
    }
}
