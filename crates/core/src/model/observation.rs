use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Kind of recorded work.
///
/// Unknown strings deserialize to `Unknown` so one odd record never fails a
/// whole trace load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ObservationType {
    #[default]
    Span,
    Generation,
    Tool,
    Agent,
    Event,
    System,
    Unknown,
}

impl ObservationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Span => "SPAN",
            Self::Generation => "GENERATION",
            Self::Tool => "TOOL",
            Self::Agent => "AGENT",
            Self::Event => "EVENT",
            Self::System => "SYSTEM",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl From<String> for ObservationType {
    fn from(s: String) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "SPAN" => Self::Span,
            "GENERATION" => Self::Generation,
            "TOOL" => Self::Tool,
            "AGENT" => Self::Agent,
            "EVENT" => Self::Event,
            "SYSTEM" => Self::System,
            _ => {
                tracing::warn!(observation_type = %s, "unknown observation type");
                Self::Unknown
            }
        }
    }
}

impl From<ObservationType> for String {
    fn from(t: ObservationType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for ObservationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity recorded on an observation. `INFO` and anything unrecognised
/// collapse to `Default`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Level {
    Debug,
    #[default]
    Default,
    Warning,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Default => "DEFAULT",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

impl From<String> for Level {
    fn from(s: String) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "DEBUG" => Self::Debug,
            "WARNING" | "WARN" => Self::Warning,
            "ERROR" => Self::Error,
            _ => Self::Default,
        }
    }
}

impl From<Level> for String {
    fn from(l: Level) -> Self {
        l.as_str().to_string()
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded unit of work, with its nested children.
///
/// Field names are camelCase on the wire; the backend's snake_case spelling
/// is accepted as an alias. Timestamps stay as raw strings and are parsed
/// on use (see [`crate::time::parse_timestamp`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub id: String,
    #[serde(default, alias = "trace_id")]
    pub trace_id: Option<String>,
    #[serde(default, alias = "parent_id", alias = "parent_observation_id")]
    pub parent_id: Option<String>,
    #[serde(default, rename = "type")]
    pub observation_type: ObservationType,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub level: Level,
    #[serde(default, alias = "status_message")]
    pub status_message: Option<String>,
    #[serde(default, alias = "start_time")]
    pub start_time: Option<String>,
    #[serde(default, alias = "end_time")]
    pub end_time: Option<String>,
    #[serde(default, alias = "completion_start_time")]
    pub completion_start_time: Option<String>,
    #[serde(default, alias = "latency_ms")]
    pub latency_ms: Option<f64>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default, alias = "model_parameters")]
    pub model_parameters: Option<serde_json::Value>,
    #[serde(default, alias = "prompt_tokens")]
    pub prompt_tokens: Option<i64>,
    #[serde(default, alias = "completion_tokens")]
    pub completion_tokens: Option<i64>,
    #[serde(default, alias = "total_tokens")]
    pub total_tokens: Option<i64>,
    #[serde(
        default,
        alias = "calculated_total_cost",
        deserialize_with = "decimal_string"
    )]
    pub cost: Option<String>,
    #[serde(
        default,
        alias = "calculated_input_cost",
        deserialize_with = "decimal_string"
    )]
    pub input_cost: Option<String>,
    #[serde(
        default,
        alias = "calculated_output_cost",
        deserialize_with = "decimal_string"
    )]
    pub output_cost: Option<String>,
    #[serde(default)]
    pub input: Option<serde_json::Value>,
    #[serde(default)]
    pub output: Option<serde_json::Value>,
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
    #[serde(default)]
    pub children: Vec<Observation>,
}

impl Observation {
    /// Leaf observation with only the fields every record has.
    pub fn new(id: impl Into<String>, observation_type: ObservationType) -> Self {
        Self {
            id: id.into(),
            observation_type,
            ..Self::default()
        }
    }

    /// Display name, falling back to `"Unknown"`.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }

    /// Cost parsed as a float. Unparseable strings count as absent.
    pub fn cost_value(&self) -> Option<f64> {
        self.cost.as_deref().and_then(|c| c.trim().parse().ok())
    }

    /// Number of observations in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(Observation::subtree_len).sum::<usize>()
    }

    /// Pre-order walk over this subtree.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Observation, u32)) {
        fn go<'a>(node: &'a Observation, depth: u32, f: &mut impl FnMut(&'a Observation, u32)) {
            f(node, depth);
            for child in &node.children {
                go(child, depth + 1, f);
            }
        }
        go(self, 0, f);
    }
}

/// Accept a cost as either a decimal string or a bare JSON number.
fn decimal_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Id → child-index path from the root list, for O(depth) lookup of an
/// observation without cloning the tree.
#[derive(Debug, Clone, Default)]
pub struct ObservationIndex {
    paths: HashMap<String, Vec<usize>>,
}

impl ObservationIndex {
    pub fn build(roots: &[Observation]) -> Self {
        fn go(node: &Observation, path: &mut Vec<usize>, paths: &mut HashMap<String, Vec<usize>>) {
            paths.entry(node.id.clone()).or_insert_with(|| path.clone());
            for (i, child) in node.children.iter().enumerate() {
                path.push(i);
                go(child, path, paths);
                path.pop();
            }
        }

        let mut paths = HashMap::new();
        let mut path = Vec::new();
        for (i, root) in roots.iter().enumerate() {
            path.push(i);
            go(root, &mut path, &mut paths);
            path.pop();
        }
        Self { paths }
    }

    pub fn get<'a>(&self, roots: &'a [Observation], id: &str) -> Option<&'a Observation> {
        let path = self.paths.get(id)?;
        let (first, rest) = path.split_first()?;
        let mut node = roots.get(*first)?;
        for &i in rest {
            node = node.children.get(i)?;
        }
        Some(node)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.paths.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
