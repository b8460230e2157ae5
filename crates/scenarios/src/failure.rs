//! Post-hoc diagnosis of failed agent runs.
//!
//! When a scenario fails in agent mode, the execution log already holds
//! every tool invocation the workflow made. [`classify_failure`] grades
//! that record against the scenario's [`ToolExpectations`] and names
//! what went wrong: tools never called, steps run backwards, resource
//! types outside the task, or engine errors the agent papered over.
//! Classification explains failures; it never turns one into a pass.

use std::collections::BTreeMap;

use agent_client::ToolCall;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tools that name a `resourceType` in their input and can surface
/// engine errors in their output.
const CRUD_TOOLS: [&str; 6] = [
    "createResource",
    "updateResource",
    "deleteResource",
    "getAllResources",
    "getResource",
    "getResourceById",
];

/// Tool usage a correct agent run shows.
#[derive(Clone, Debug, Default)]
pub struct ToolExpectations {
    /// Alternative tool sets; a correct run uses every tool of at least
    /// one set.
    pub required_tools: Vec<Vec<&'static str>>,
    /// Pairs that must run in this order when both appear.
    pub required_order: Vec<(&'static str, &'static str)>,
    /// Resource types the task stays within. Empty means unconstrained.
    pub resource_types: Vec<&'static str>,
    /// Tools a correct run never calls.
    pub prohibited_tools: Vec<&'static str>,
}

impl ToolExpectations {
    pub fn is_empty(&self) -> bool {
        self.required_tools.is_empty()
            && self.required_order.is_empty()
            && self.resource_types.is_empty()
            && self.prohibited_tools.is_empty()
    }
}

/// What a failed agent run did wrong, judged from its tool calls.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FailureMode {
    /// Required tools absent from the run, taken from the closest
    /// alternative set.
    pub missing_tools: Vec<String>,
    /// Ordered pairs the run performed in reverse.
    pub out_of_order: Vec<(String, String)>,
    /// Resource types touched outside the expected set.
    pub unexpected_resource_types: Vec<String>,
    /// Prohibited tools the run called anyway.
    pub prohibited_used: Vec<String>,
    /// Non-JSON tool outputs, usually engine error strings.
    pub error_outputs: Vec<String>,
}

impl FailureMode {
    /// Nothing in the record explains the failure.
    pub fn is_clean(&self) -> bool {
        self.missing_tools.is_empty()
            && self.out_of_order.is_empty()
            && self.unexpected_resource_types.is_empty()
            && self.prohibited_used.is_empty()
            && self.error_outputs.is_empty()
    }
}

/// Grade a run's tool calls against the scenario's expectations.
pub fn classify_failure(
    tool_calls: &BTreeMap<String, Vec<ToolCall>>,
    expectations: &ToolExpectations,
) -> FailureMode {
    let mut mode = FailureMode::default();

    let selection_ok = expectations.required_tools.is_empty()
        || expectations
            .required_tools
            .iter()
            .any(|set| set.iter().all(|tool| tool_calls.contains_key(*tool)));

    if !selection_ok {
        // Report the gaps of whichever alternative came closest.
        let closest = expectations.required_tools.iter().min_by_key(|set| {
            set.iter()
                .filter(|tool| !tool_calls.contains_key(**tool))
                .count()
        });
        if let Some(set) = closest {
            mode.missing_tools = set
                .iter()
                .filter(|tool| !tool_calls.contains_key(**tool))
                .map(|tool| (*tool).to_string())
                .collect();
        }
    } else {
        // Order is judged leniently: the latest start of the second tool
        // must come after the earliest start of the first. Pairs where
        // either tool never ran are covered by selection, not order.
        for (first, second) in &expectations.required_order {
            let (Some(first_calls), Some(second_calls)) =
                (tool_calls.get(*first), tool_calls.get(*second))
            else {
                continue;
            };
            let first_start = first_calls.iter().filter_map(|call| call.start_time).min();
            let second_last = second_calls.iter().filter_map(|call| call.start_time).max();
            if let (Some(first_start), Some(second_last)) = (first_start, second_last) {
                if second_last <= first_start {
                    mode.out_of_order
                        .push(((*first).to_string(), (*second).to_string()));
                }
            }
        }
    }

    // The last call of each CRUD tool carries the resource type it acted
    // on and, when the engine balked, a bare error string as output.
    for (tool, calls) in tool_calls {
        if !CRUD_TOOLS.contains(&tool.as_str()) {
            continue;
        }
        let Some(last) = calls.last() else { continue };

        if let Some(kind) = last
            .input
            .as_ref()
            .and_then(|input| input.get("resourceType"))
            .and_then(Value::as_str)
        {
            if !expectations.resource_types.is_empty()
                && !expectations.resource_types.contains(&kind)
                && !mode.unexpected_resource_types.iter().any(|seen| seen == kind)
            {
                mode.unexpected_resource_types.push(kind.to_string());
            }
        }

        if let Some(output) = last.output.as_ref().and_then(Value::as_str) {
            if serde_json::from_str::<Value>(output).is_err() {
                mode.error_outputs.push(output.to_string());
            }
        }
    }

    for tool in &expectations.prohibited_tools {
        if tool_calls.contains_key(*tool) {
            mode.prohibited_used.push((*tool).to_string());
        }
    }

    mode
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(start: i64) -> ToolCall {
        ToolCall {
            start_time: Some(start),
            execution_ms: None,
            input: None,
            output: None,
        }
    }

    fn call_io(start: i64, input: Value, output: Value) -> ToolCall {
        ToolCall {
            start_time: Some(start),
            execution_ms: None,
            input: Some(input),
            output: Some(output),
        }
    }

    fn calls(entries: Vec<(&str, Vec<ToolCall>)>) -> BTreeMap<String, Vec<ToolCall>> {
        entries
            .into_iter()
            .map(|(tool, calls)| (tool.to_string(), calls))
            .collect()
    }

    #[test]
    fn empty_expectations_flag_nothing() {
        let record = calls(vec![("createResource", vec![call(1)])]);
        assert!(classify_failure(&record, &ToolExpectations::default()).is_clean());
    }

    #[test]
    fn missing_tools_come_from_the_closest_alternative() {
        let expectations = ToolExpectations {
            required_tools: vec![
                vec!["getAllResources", "createResource", "updateResource"],
                vec!["getResourceById", "updateResource"],
            ],
            ..ToolExpectations::default()
        };
        let record = calls(vec![("updateResource", vec![call(1)])]);

        let mode = classify_failure(&record, &expectations);
        assert_eq!(mode.missing_tools, vec!["getResourceById".to_string()]);
    }

    #[test]
    fn any_satisfied_alternative_clears_selection() {
        let expectations = ToolExpectations {
            required_tools: vec![vec!["createResource"], vec!["getResourceById", "updateResource"]],
            ..ToolExpectations::default()
        };
        let record = calls(vec![
            ("getResourceById", vec![call(1)]),
            ("updateResource", vec![call(2)]),
        ]);

        assert!(classify_failure(&record, &expectations).is_clean());
    }

    #[test]
    fn reversed_pairs_are_flagged_and_ordered_ones_are_not() {
        let expectations = ToolExpectations {
            required_tools: vec![vec!["getAllResources", "createResource"]],
            required_order: vec![("getAllResources", "createResource")],
            ..ToolExpectations::default()
        };

        let reversed = calls(vec![
            ("getAllResources", vec![call(200)]),
            ("createResource", vec![call(100)]),
        ]);
        let mode = classify_failure(&reversed, &expectations);
        assert_eq!(
            mode.out_of_order,
            vec![("getAllResources".to_string(), "createResource".to_string())]
        );

        let ordered = calls(vec![
            ("getAllResources", vec![call(100)]),
            ("createResource", vec![call(200)]),
        ]);
        assert!(classify_failure(&ordered, &expectations).is_clean());
    }

    #[test]
    fn order_pairs_with_an_absent_tool_are_skipped() {
        let expectations = ToolExpectations {
            required_tools: vec![vec!["updateResource"]],
            required_order: vec![("getResourceById", "updateResource")],
            ..ToolExpectations::default()
        };
        let record = calls(vec![("updateResource", vec![call(1)])]);

        assert!(classify_failure(&record, &expectations).is_clean());
    }

    #[test]
    fn resource_types_outside_the_task_are_reported_once() {
        let expectations = ToolExpectations {
            resource_types: vec!["Condition"],
            ..ToolExpectations::default()
        };
        let record = calls(vec![
            (
                "createResource",
                vec![call_io(1, json!({"resourceType": "Observation"}), json!({}))],
            ),
            (
                "getAllResources",
                vec![call_io(2, json!({"resourceType": "Observation"}), json!({}))],
            ),
        ]);

        let mode = classify_failure(&record, &expectations);
        assert_eq!(mode.unexpected_resource_types, vec!["Observation".to_string()]);
    }

    #[test]
    fn unconstrained_scenarios_accept_any_resource_type() {
        let record = calls(vec![(
            "createResource",
            vec![call_io(1, json!({"resourceType": "Observation"}), json!({}))],
        )]);

        assert!(classify_failure(&record, &ToolExpectations::default()).is_clean());
    }

    #[test]
    fn bare_string_outputs_are_engine_errors() {
        let record = calls(vec![
            (
                "createResource",
                vec![call_io(
                    1,
                    json!({"resourceType": "Patient"}),
                    json!("Error: 400 Bad Request"),
                )],
            ),
            // A JSON string output decodes cleanly and is not an error.
            (
                "getAllResources",
                vec![call_io(2, json!({"resourceType": "Patient"}), json!("{\"total\":0}"))],
            ),
        ]);

        let mode = classify_failure(&record, &ToolExpectations::default());
        assert_eq!(mode.error_outputs, vec!["Error: 400 Bad Request".to_string()]);
    }

    #[test]
    fn only_the_last_call_of_a_tool_is_graded() {
        let record = calls(vec![(
            "createResource",
            vec![
                call_io(1, json!({"resourceType": "Patient"}), json!("Error: rejected")),
                call_io(2, json!({"resourceType": "Patient"}), json!({"id": "PAT001"})),
            ],
        )]);

        assert!(classify_failure(&record, &ToolExpectations::default()).is_clean());
    }

    #[test]
    fn prohibited_tools_are_called_out() {
        let expectations = ToolExpectations {
            required_tools: vec![vec!["getAllResources"]],
            prohibited_tools: vec!["deleteResource", "updateResource"],
            ..ToolExpectations::default()
        };
        let record = calls(vec![
            ("getAllResources", vec![call(1)]),
            ("deleteResource", vec![call(2)]),
        ]);

        let mode = classify_failure(&record, &expectations);
        assert_eq!(mode.prohibited_used, vec!["deleteResource".to_string()]);
    }
}
