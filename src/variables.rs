// src/variables.rs

//! `${name}` template substitution and the variable store written by
//! variable-assignment nodes.
//!
//! Substitution is a single left-to-right pass: a substituted value is never
//! re-scanned, and placeholders with no matching variable are left verbatim.

use std::collections::{BTreeMap, HashMap};
use std::cmp::Reverse;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use regex::{Captures, Regex};
use tracing::warn;

/// Anything that can be looked up by variable name.
pub trait VariableLookup {
    fn lookup(&self, name: &str) -> Option<&str>;
    fn names(&self) -> Vec<&str>;
}

impl VariableLookup for HashMap<String, String> {
    fn lookup(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }

    fn names(&self) -> Vec<&str> {
        self.keys().map(String::as_str).collect()
    }
}

impl VariableLookup for BTreeMap<String, String> {
    fn lookup(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }

    fn names(&self) -> Vec<&str> {
        self.keys().map(String::as_str).collect()
    }
}

/// Replace every `${key}` whose key is present in `vars` with its value.
///
/// Keys are matched literally, so names may contain `}` or regex
/// metacharacters. At a given position the longest matching key wins.
pub fn resolve(template: &str, vars: &impl VariableLookup) -> String {
    let mut names = vars.names();
    if template.is_empty() || names.is_empty() {
        return template.to_string();
    }

    names.sort_by_key(|name| Reverse(name.len()));
    let alternation = names
        .iter()
        .map(|name| regex::escape(name))
        .collect::<Vec<_>>()
        .join("|");

    let pattern = match Regex::new(&format!(r"\$\{{({alternation})\}}")) {
        Ok(pattern) => pattern,
        Err(e) => {
            warn!(error = %e, "cannot build placeholder pattern; template left as is");
            return template.to_string();
        }
    };

    pattern
        .replace_all(template, |caps: &Captures<'_>| {
            vars.lookup(&caps[1])
                .map_or_else(|| caps[0].to_string(), str::to_string)
        })
        .into_owned()
}

/// Element-wise [`resolve`].
pub fn resolve_all<S: AsRef<str>>(templates: &[S], vars: &impl VariableLookup) -> Vec<String> {
    templates
        .iter()
        .map(|t| resolve(t.as_ref(), vars))
        .collect()
}

/// Dedicated, shareable store of assigned variables.
///
/// Variable nodes write here in addition to the run context's flat map.
/// Clones share the same backing map.
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    inner: Arc<Mutex<BTreeMap<String, String>>>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) {
        self.lock().insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.lock().get(name).cloned()
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn replaces_every_occurrence() {
        let v = vars(&[("x", "2"), ("y", "4")]);
        assert_eq!(resolve("${x} + ${x} = ${y}", &v), "2 + 2 = 4");
    }

    #[test]
    fn unmatched_placeholders_are_left_verbatim() {
        let v = vars(&[("x", "1")]);
        assert_eq!(resolve("${x} ${missing}", &v), "1 ${missing}");
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let v = vars(&[("a", "${b}"), ("b", "deep")]);
        assert_eq!(resolve("${a}", &v), "${b}");
    }

    #[test]
    fn keys_with_pattern_metacharacters_match_literally() {
        let v = vars(&[("a.b*", "ok")]);
        assert_eq!(resolve("${a.b*} ${axb}", &v), "ok ${axb}");
    }

    #[test]
    fn keys_containing_closing_braces_are_substituted() {
        let v = vars(&[("a}b", "X")]);
        assert_eq!(resolve("${a}b}", &v), "X");

        let both = vars(&[("a", "1"), ("a}b", "X")]);
        assert_eq!(resolve("${a}b} ${a}", &both), "X 1");

        let short = vars(&[("a", "1")]);
        assert_eq!(resolve("${a}b}", &short), "1b}");
    }

    #[test]
    fn values_with_dollar_signs_are_inserted_literally() {
        let v = vars(&[("price", "$1")]);
        assert_eq!(resolve("cost: ${price}", &v), "cost: $1");
    }

    #[test]
    fn empty_inputs_pass_through() {
        assert_eq!(resolve("", &vars(&[("x", "1")])), "");
        assert_eq!(resolve("${x}", &HashMap::<String, String>::new()), "${x}");
    }

    #[test]
    fn resolve_all_maps_each_template() {
        let v = vars(&[("t", "orders")]);
        assert_eq!(
            resolve_all(&["a_${t}", "b_${t}"][..], &v),
            vec!["a_orders".to_string(), "b_orders".to_string()]
        );
    }

    #[test]
    fn store_clones_share_values() {
        let store = VariableStore::new();
        let other = store.clone();
        store.set("region", "eu");
        assert_eq!(other.get("region").as_deref(), Some("eu"));
        assert_eq!(other.snapshot().len(), 1);
    }
}
