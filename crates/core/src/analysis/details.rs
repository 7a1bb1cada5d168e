use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::diff::{DiffResult, diff};
use super::indicators::{IndicatorSet, indicators};
use super::metrics::{format_cost, subtree_cost, subtree_duration};
use crate::model::{Level, Observation, ObservationIndex, ObservationType};
use crate::time::format_bar_duration;

/// Where tool results were found in an observation's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolResultFormat {
    /// `output.tool_results`
    ToolResults,
    /// `output.tool_calls`
    ToolCalls,
    /// `output.tool_operations`
    ToolOperations,
    /// Keys mentioning tool/function/action.
    ToolLikeKeys,
}

impl ToolResultFormat {
    pub fn label(&self) -> &'static str {
        match self {
            Self::ToolResults => "Tool Results",
            Self::ToolCalls => "Tool Calls",
            Self::ToolOperations => "Tool Operations",
            Self::ToolLikeKeys => "Tool Output",
        }
    }
}

/// One panel section for a selected node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DetailSection {
    StateDiff { diff: DiffResult },
    Prompt { prompt: Value },
    Response { response: Value },
    Reasoning { text: String },
    ToolCall { call: Value },
    ToolResponse { format: ToolResultFormat, data: Value },
    ModelParameters { parameters: Value },
}

impl DetailSection {
    pub fn title(&self) -> &'static str {
        match self {
            Self::StateDiff { .. } => "State Changes",
            Self::Prompt { .. } => "Prompt",
            Self::Response { .. } => "Response",
            Self::Reasoning { .. } => "Reasoning",
            Self::ToolCall { .. } => "Tool Call",
            Self::ToolResponse { .. } => "Tool Response",
            Self::ModelParameters { .. } => "Model Parameters",
        }
    }
}

/// Everything the details panel shows for a selected observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDetails {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub observation_type: ObservationType,
    pub level: Level,
    pub latency_ms: Option<f64>,
    pub model: Option<String>,
    pub prompt_tokens: Option<i64>,
    pub completion_tokens: Option<i64>,
    pub total_tokens: Option<i64>,
    pub cost: Option<String>,
    /// Summed over the node and its descendants; only set for nodes with
    /// children.
    pub subtree_latency_ms: Option<f64>,
    pub subtree_cost: Option<f64>,
    /// Only set for error-level observations.
    pub status_message: Option<String>,
    pub indicators: IndicatorSet,
    pub diff: DiffResult,
    pub sections: Vec<DetailSection>,
}

impl NodeDetails {
    pub fn from_observation(node: &Observation) -> Self {
        let diff = diff(node.input.as_ref(), node.output.as_ref());
        let mut sections = vec![DetailSection::StateDiff { diff: diff.clone() }];

        match node.observation_type {
            ObservationType::Generation => {
                if let Some(prompt) = node.input.as_ref().and_then(extract_prompt) {
                    sections.push(DetailSection::Prompt { prompt });
                }
                if let Some(response) = node.output.as_ref().and_then(extract_response) {
                    sections.push(DetailSection::Response { response });
                }
                if let Some(text) = node.output.as_ref().and_then(extract_reasoning) {
                    sections.push(DetailSection::Reasoning { text });
                }
            }
            ObservationType::Tool => {
                if let Some(call) = node.input.as_ref().and_then(extract_tool_call) {
                    sections.push(DetailSection::ToolCall { call });
                }
                if let Some((format, data)) = node.output.as_ref().and_then(extract_tool_response) {
                    sections.push(DetailSection::ToolResponse { format, data });
                }
            }
            _ => {}
        }

        if let Some(parameters) = node.model_parameters.as_ref().filter(|p| !p.is_null()) {
            sections.push(DetailSection::ModelParameters {
                parameters: parameters.clone(),
            });
        }

        let has_children = !node.children.is_empty();
        Self {
            id: node.id.clone(),
            name: node.display_name().to_string(),
            observation_type: node.observation_type,
            level: node.level,
            latency_ms: node.latency_ms,
            model: node.model.clone(),
            prompt_tokens: node.prompt_tokens,
            completion_tokens: node.completion_tokens,
            total_tokens: node.total_tokens,
            cost: node.cost.clone(),
            subtree_latency_ms: has_children.then(|| subtree_duration(node)).flatten(),
            subtree_cost: has_children.then(|| subtree_cost(node)).flatten(),
            status_message: (node.level == Level::Error)
                .then(|| node.status_message.clone())
                .flatten(),
            indicators: indicators(node),
            diff,
            sections,
        }
    }

    /// Header line pairs in display order, skipping absent values.
    pub fn header_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("Type", self.observation_type.to_string()),
            ("Level", self.level.to_string()),
        ];
        if let Some(latency) = self.latency_ms {
            fields.push(("Latency", format_bar_duration(latency)));
        }
        if let Some(model) = &self.model {
            fields.push(("Model", model.clone()));
        }
        let split = self.prompt_tokens.zip(self.completion_tokens);
        if let Some(total) = self.total_tokens.or_else(|| split.map(|(p, c)| p + c)) {
            let split = split.map(|(p, c)| format!(" ({p} in / {c} out)")).unwrap_or_default();
            fields.push(("Tokens", format!("{total}{split}")));
        }
        if let Some(cost) = self.cost.as_deref().and_then(|c| c.trim().parse::<f64>().ok()) {
            fields.push(("Cost", format_cost(cost)));
        }
        if let Some(latency) = self.subtree_latency_ms {
            fields.push(("Total latency", format_bar_duration(latency)));
        }
        if let Some(cost) = self.subtree_cost {
            fields.push(("Total cost", format_cost(cost)));
        }
        fields
    }

    pub fn has_section(&self, title: &str) -> bool {
        self.sections.iter().any(|s| s.title() == title)
    }
}

/// Details for `id`, or `None` when the id is not in the trace.
pub fn node_details(roots: &[Observation], index: &ObservationIndex, id: &str) -> Option<NodeDetails> {
    let found = index.get(roots, id);
    if found.is_none() {
        tracing::debug!(id, "select ignored: unknown node");
    }
    found.map(NodeDetails::from_observation)
}

fn extract_prompt(input: &Value) -> Option<Value> {
    let obj = input.as_object()?;
    let mut prompt = Map::new();
    if let Some(messages) = obj.get("messages").filter(|m| m.is_array()) {
        if let Some(system) = obj.get("system") {
            prompt.insert("system".into(), system.clone());
        }
        prompt.insert("messages".into(), messages.clone());
    } else if let Some(text) = obj.get("prompt") {
        prompt.insert("user".into(), text.clone());
    } else {
        return Some(input.clone());
    }
    Some(Value::Object(prompt))
}

/// `_llm_result` when present, otherwise the output without `_`-prefixed
/// internal keys.
fn extract_response(output: &Value) -> Option<Value> {
    let Some(obj) = output.as_object() else {
        return Some(output.clone());
    };
    if let Some(result) = obj.get("_llm_result").filter(|r| !r.is_null()) {
        return Some(result.clone());
    }
    let public: Map<String, Value> = obj
        .iter()
        .filter(|(k, _)| !k.starts_with('_'))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if public.is_empty() {
        Some(output.clone())
    } else {
        Some(Value::Object(public))
    }
}

fn extract_reasoning(output: &Value) -> Option<String> {
    output
        .get("_llm_reasoning")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(String::from)
}

fn extract_tool_call(input: &Value) -> Option<Value> {
    if let Some(call) = input.get("tool_call") {
        return Some(call.clone());
    }
    let args = input
        .get("arguments")
        .or_else(|| input.get("args"))
        .unwrap_or(input);
    let mut wrapped = Map::new();
    wrapped.insert("arguments".into(), args.clone());
    Some(Value::Object(wrapped))
}

fn extract_tool_response(output: &Value) -> Option<(ToolResultFormat, Value)> {
    let obj = output.as_object()?;
    if let Some(results) = obj.get("tool_results").filter(|r| is_non_empty(r)) {
        return Some((ToolResultFormat::ToolResults, results.clone()));
    }
    if let Some(calls) = obj.get("tool_calls").filter(|c| !c.is_null()) {
        return Some((ToolResultFormat::ToolCalls, calls.clone()));
    }
    if let Some(ops) = obj.get("tool_operations").filter(|o| !o.is_null()) {
        return Some((ToolResultFormat::ToolOperations, ops.clone()));
    }
    let tool_like: Map<String, Value> = obj
        .iter()
        .filter(|(k, _)| {
            let k = k.to_ascii_lowercase();
            k.contains("tool") || k.contains("function") || k.contains("action")
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    (!tool_like.is_empty()).then(|| (ToolResultFormat::ToolLikeKeys, Value::Object(tool_like)))
}

fn is_non_empty(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Object(m) => !m.is_empty(),
        Value::Array(a) => !a.is_empty(),
        _ => true,
    }
}
