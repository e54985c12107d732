//! Per-destination flair policies and their evaluation.
//!
//! A [`FlairPolicyTable`] is plain configuration, usually deserialised from the
//! CLI's YAML file or taken from [`FlairPolicyTable::builtin`]. It is compiled
//! once into a [`FlairPolicyEngine`], whose queries are pure functions of the
//! table, the destination and the selection.
//!
//! Destinations without a policy are unrestricted: [`FlairPolicyEngine::evaluate`]
//! accepts anything and [`FlairPolicyEngine::custom_flair_allowed`] reports `true`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PolicyConfigError;
use crate::model::{FlairEntry, FlairSelection};

/// Pure check applied to a custom flair; returns an error message on rejection.
#[derive(Clone)]
pub struct FlairPredicate(Arc<dyn Fn(&FlairSelection) -> Option<String> + Send + Sync>);

impl FlairPredicate {
    pub fn new<F>(check: F) -> Self
    where
        F: Fn(&FlairSelection) -> Option<String> + Send + Sync + 'static,
    {
        Self(Arc::new(check))
    }

    pub fn check(&self, selection: &FlairSelection) -> Option<String> {
        (self.0)(selection)
    }
}

impl fmt::Debug for FlairPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FlairPredicate(..)")
    }
}

/// Extra constraint on custom flairs for one destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum CustomFlairRule {
    MinLength {
        min: usize,
        #[serde(default)]
        message: Option<String>,
    },
    MaxLength {
        max: usize,
        #[serde(default)]
        message: Option<String>,
    },
    Pattern {
        pattern: String,
        message: String,
    },
    #[serde(skip)]
    Predicate(FlairPredicate),
}

/// Flair requirements of one destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlairPolicy {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub allowed_flairs: Vec<FlairEntry>,
    #[serde(default)]
    pub allow_custom: bool,
    #[serde(default)]
    pub custom_rules: Vec<CustomFlairRule>,
    /// Shown when the flair is required but missing.
    pub message: String,
}

/// Destination name to policy. Keys are compared case-insensitively.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, FlairPolicy>",
    into = "BTreeMap<String, FlairPolicy>"
)]
pub struct FlairPolicyTable(BTreeMap<String, FlairPolicy>);

impl From<BTreeMap<String, FlairPolicy>> for FlairPolicyTable {
    fn from(raw: BTreeMap<String, FlairPolicy>) -> Self {
        raw.into_iter()
            .fold(Self::new(), |table, (destination, policy)| table.with(&destination, policy))
    }
}

impl From<FlairPolicyTable> for BTreeMap<String, FlairPolicy> {
    fn from(table: FlairPolicyTable) -> Self {
        table.0
    }
}

impl FlairPolicyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, destination: &str, policy: FlairPolicy) {
        self.0.insert(normalise(destination), policy);
    }

    pub fn with(mut self, destination: &str, policy: FlairPolicy) -> Self {
        self.insert(destination, policy);
        self
    }

    pub fn get(&self, destination: &str) -> Option<&FlairPolicy> {
        self.0.get(&normalise(destination))
    }

    pub fn destinations(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The policies shipped with the application.
    pub fn builtin() -> Self {
        Self::new()
            .with(
                "programming",
                FlairPolicy {
                    required: true,
                    allowed_flairs: vec![
                        FlairEntry::new("1", "Discussion", "#e2e8f0", "#1e293b"),
                        FlairEntry::new("2", "Help", "#fee2e2", "#991b1b"),
                        FlairEntry::new("3", "Project", "#dbeafe", "#1e40af"),
                        FlairEntry::new("4", "Resource", "#f3e8ff", "#6b21a8"),
                    ],
                    allow_custom: false,
                    custom_rules: vec![],
                    message: "r/programming requires a post flair from the approved list".into(),
                },
            )
            .with(
                "webdev",
                FlairPolicy {
                    required: true,
                    allowed_flairs: vec![
                        FlairEntry::new("5", "Showoff", "#f3e8ff", "#6b21a8"),
                        FlairEntry::new("6", "Question", "#ecfccb", "#3f6212"),
                        FlairEntry::new("7", "Guide", "#dbeafe", "#1e40af"),
                    ],
                    allow_custom: true,
                    custom_rules: vec![CustomFlairRule::MinLength {
                        min: 3,
                        message: None,
                    }],
                    message: "r/webdev requires a post flair".into(),
                },
            )
            .with(
                "reactjs",
                FlairPolicy {
                    required: true,
                    allowed_flairs: vec![
                        FlairEntry::new("8", "Help", "#fee2e2", "#991b1b"),
                        FlairEntry::new("9", "Discussion", "#e2e8f0", "#1e293b"),
                    ],
                    allow_custom: false,
                    custom_rules: vec![],
                    message: "r/reactjs requires an approved post flair".into(),
                },
            )
    }
}

fn normalise(destination: &str) -> String {
    destination.trim().to_lowercase()
}

#[derive(Debug, Clone)]
enum CompiledRule {
    MinLength(usize, Option<String>),
    MaxLength(usize, Option<String>),
    Pattern(Regex, String),
    Predicate(FlairPredicate),
}

impl CompiledRule {
    fn check(&self, selection: &FlairSelection) -> Option<String> {
        let len = selection.text.chars().count();
        match self {
            CompiledRule::MinLength(min, message) if len < *min => Some(
                message
                    .clone()
                    .unwrap_or_else(|| format!("Custom flair text must be at least {min} characters long")),
            ),
            CompiledRule::MaxLength(max, message) if len > *max => Some(
                message
                    .clone()
                    .unwrap_or_else(|| format!("Custom flair text must be at most {max} characters long")),
            ),
            CompiledRule::Pattern(regex, message) if !regex.is_match(&selection.text) => {
                Some(message.clone())
            }
            CompiledRule::Predicate(predicate) => predicate.check(selection),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledPolicy {
    policy: FlairPolicy,
    rules: Vec<CompiledRule>,
}

/// Evaluates flair selections against an immutable policy table.
#[derive(Debug, Clone, Default)]
pub struct FlairPolicyEngine {
    policies: BTreeMap<String, CompiledPolicy>,
}

impl FlairPolicyEngine {
    /// Compiles the table; fails if a pattern rule is not a valid regex.
    pub fn new(table: FlairPolicyTable) -> Result<Self, PolicyConfigError> {
        let mut policies = BTreeMap::new();
        for (destination, policy) in table.0 {
            let rules = policy
                .custom_rules
                .iter()
                .map(|rule| {
                    Ok(match rule {
                        CustomFlairRule::MinLength { min, message } => {
                            CompiledRule::MinLength(*min, message.clone())
                        }
                        CustomFlairRule::MaxLength { max, message } => {
                            CompiledRule::MaxLength(*max, message.clone())
                        }
                        CustomFlairRule::Pattern { pattern, message } => {
                            let regex = Regex::new(pattern).map_err(|source| {
                                PolicyConfigError::InvalidPattern {
                                    destination: destination.clone(),
                                    source,
                                }
                            })?;
                            CompiledRule::Pattern(regex, message.clone())
                        }
                        CustomFlairRule::Predicate(predicate) => {
                            CompiledRule::Predicate(predicate.clone())
                        }
                    })
                })
                .collect::<Result<Vec<_>, PolicyConfigError>>()?;
            policies.insert(destination, CompiledPolicy { policy, rules });
        }
        Ok(Self { policies })
    }

    fn policy(&self, destination: &str) -> Option<&CompiledPolicy> {
        self.policies.get(&normalise(destination))
    }

    pub fn has_policy(&self, destination: &str) -> bool {
        self.policy(destination).is_some()
    }

    /// Returns the error message for a disallowed or missing flair, `None` if it passes.
    pub fn evaluate(&self, destination: &str, selection: Option<&FlairSelection>) -> Option<String> {
        let compiled = self.policy(destination)?;
        let policy = &compiled.policy;

        let selection = match selection {
            Some(selection) => selection,
            None if policy.required => return Some(policy.message.clone()),
            None => return None,
        };

        if is_known(policy, selection) {
            return None;
        }

        if !policy.allow_custom {
            debug!(destination, flair = %selection.text, "Custom flair rejected by policy");
            return Some(format!("This flair is not allowed in r/{destination}"));
        }

        compiled.rules.iter().find_map(|rule| rule.check(selection))
    }

    /// The approved flairs for a destination; empty when it has no policy.
    pub fn available_flairs(&self, destination: &str) -> &[FlairEntry] {
        self.policy(destination)
            .map(|compiled| compiled.policy.allowed_flairs.as_slice())
            .unwrap_or(&[])
    }

    /// Whether free-text flairs are accepted; `true` when the destination has no policy.
    pub fn custom_flair_allowed(&self, destination: &str) -> bool {
        self.policy(destination)
            .map(|compiled| compiled.policy.allow_custom)
            .unwrap_or(true)
    }

    /// Turns a flair cell into a selection for `destination`, matching the
    /// approved list by id or text before falling back to a custom flair.
    pub fn resolve(&self, destination: &str, flair: &str) -> FlairSelection {
        self.available_flairs(destination)
            .iter()
            .find(|entry| entry.id == flair || entry.text == flair)
            .map(|entry| FlairSelection::from_entry(destination, entry))
            .unwrap_or_else(|| FlairSelection::custom(destination, flair))
    }
}

fn is_known(policy: &FlairPolicy, selection: &FlairSelection) -> bool {
    policy.allowed_flairs.iter().any(|allowed| {
        selection.id.as_deref() == Some(allowed.id.as_str()) || allowed.text == selection.text
    })
}
