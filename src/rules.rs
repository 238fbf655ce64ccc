use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One user-configured rewrite, applied to extracted LaTeX after the fact.
/// `from` is a regex pattern; `to` is its replacement string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementRule {
    pub from: String,
    pub to: String,
}

impl ReplacementRule {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> ReplacementRule {
        ReplacementRule {
            from: from.into(),
            to: to.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("invalid replacement pattern `{pattern}`: {source}")]
    BadPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("rule storage failure: {0}")]
    Storage(String),
}

/// Where the rule list persists between sessions. The real host backs this
/// with extension-synced storage; tests use [`MemoryStorage`].
pub trait RuleStorage {
    fn load(&self) -> Result<Vec<ReplacementRule>, RuleError>;
    fn save(&mut self, rules: &[ReplacementRule]) -> Result<(), RuleError>;
}

/// JSON-in-memory storage with the same "missing key means empty list"
/// default the synced storage has.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: Option<String>,
}

impl MemoryStorage {
    pub fn new() -> MemoryStorage {
        MemoryStorage::default()
    }

    pub fn raw(&self) -> Option<&str> {
        self.data.as_deref()
    }
}

impl RuleStorage for MemoryStorage {
    fn load(&self) -> Result<Vec<ReplacementRule>, RuleError> {
        match &self.data {
            Some(data) => {
                serde_json::from_str(data).map_err(|err| RuleError::Storage(err.to_string()))
            }
            None => Ok(Vec::new()),
        }
    }

    fn save(&mut self, rules: &[ReplacementRule]) -> Result<(), RuleError> {
        let data =
            serde_json::to_string(rules).map_err(|err| RuleError::Storage(err.to_string()))?;
        self.data = Some(data);
        Ok(())
    }
}

/// The rule list as the options page edits it: plain CRUD over the stored
/// order, saved back explicitly.
#[derive(Debug)]
pub struct RuleEditor<S: RuleStorage> {
    storage: S,
    rules: Vec<ReplacementRule>,
}

impl<S: RuleStorage> RuleEditor<S> {
    pub fn load(storage: S) -> Result<RuleEditor<S>, RuleError> {
        let rules = storage.load()?;
        Ok(RuleEditor { storage, rules })
    }

    pub fn rules(&self) -> &[ReplacementRule] {
        &self.rules
    }

    pub fn add(&mut self, rule: ReplacementRule) {
        self.rules.push(rule);
    }

    /// Replaces the rule at `index`. Returns whether it existed.
    pub fn update(&mut self, index: usize, rule: ReplacementRule) -> bool {
        match self.rules.get_mut(index) {
            Some(slot) => {
                *slot = rule;
                true
            }
            None => false,
        }
    }

    /// Removes the rule at `index`. Returns whether it existed.
    pub fn remove(&mut self, index: usize) -> bool {
        if index < self.rules.len() {
            self.rules.remove(index);
            true
        } else {
            false
        }
    }

    /// Persists the current list, dropping rules with an empty pattern the
    /// way the options form does on save.
    pub fn save(&mut self) -> Result<(), RuleError> {
        self.rules.retain(|r| !r.from.is_empty());
        self.storage.save(&self.rules)
    }

    /// Compiles the current list for application.
    pub fn compiled(&self) -> Result<RuleSet, RuleError> {
        RuleSet::compile(self.rules.clone())
    }
}

/// An ordered, compiled rule list. Compilation is eager so a bad pattern
/// surfaces when the user edits it, not on every extraction.
#[derive(Debug)]
pub struct RuleSet {
    rules: Vec<(ReplacementRule, Regex)>,
}

impl RuleSet {
    pub fn compile(rules: Vec<ReplacementRule>) -> Result<RuleSet, RuleError> {
        let rules = rules
            .into_iter()
            .map(|rule| {
                let regex = Regex::new(&rule.from).map_err(|source| RuleError::BadPattern {
                    pattern: rule.from.clone(),
                    source,
                })?;
                Ok((rule, regex))
            })
            .collect::<Result<Vec<_>, RuleError>>()?;

        Ok(RuleSet { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Applies every rule, in stored order, to `latex`.
    pub fn apply(&self, latex: &str) -> String {
        let mut out = latex.to_string();
        for (rule, regex) in &self.rules {
            out = regex.replace_all(&out, rule.to.as_str()).into_owned();
        }
        if !self.rules.is_empty() {
            debug!("applied {} replacement rules", self.rules.len());
        }
        out
    }
}
