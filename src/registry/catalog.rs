use schemars::schema_for;
use serde::Serialize;
use serde_json::Value;

use crate::error::CommandError;

use super::{Command, CommandCategory, CommandDirectory};

/// A directory entry: metadata + JSON schema for the params.
#[derive(Debug, Clone, Serialize)]
pub struct CommandRegistryEntry {
    pub name: &'static str,
    pub description: &'static str,
    pub category: CommandCategory,
    pub param_schema: Value,
}

/// One parameter as shown by `Help`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSummary {
    pub key: String,
    pub kind: String,
    pub required: bool,
}

pub(super) fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

pub(super) fn schema_value<T: schemars::JsonSchema>() -> Value {
    let root = schema_for!(T);
    serde_json::to_value(root).unwrap_or_else(|_| empty_object_schema())
}

/// Deserialize a parameter payload; `null` reads as an empty object.
pub(crate) fn de<T: serde::de::DeserializeOwned>(input: &Value) -> Result<T, CommandError> {
    let value = if input.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        input.clone()
    };
    Ok(serde_json::from_value(value)?)
}

pub fn entry(command: &dyn Command) -> CommandRegistryEntry {
    let info = command.info();
    CommandRegistryEntry {
        name: info.name,
        description: info.description,
        category: info.category,
        param_schema: command.param_schema(),
    }
}

pub fn command_registry(directory: &CommandDirectory) -> Vec<CommandRegistryEntry> {
    directory.entries().map(|c| entry(c.as_ref())).collect()
}

/// Flatten a params schema into key/type rows, in declaration order.
pub fn param_summaries(schema: &Value) -> Vec<ParamSummary> {
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Vec::new();
    };
    properties
        .iter()
        .map(|(key, prop)| ParamSummary {
            key: key.clone(),
            kind: schema_kind(schema, prop),
            required: required.contains(&key.as_str()),
        })
        .collect()
}

/// Short type name for a property: `number`, `bool`, `string`, or the
/// `A|B|C` choices of an enum.
fn schema_kind(root: &Value, prop: &Value) -> String {
    let prop = resolve_ref(root, prop);
    if let Some(choices) = prop.get("enum").and_then(Value::as_array) {
        let names: Vec<&str> = choices.iter().filter_map(Value::as_str).collect();
        return names.join("|");
    }
    // Enums with documented variants become one single-value schema per variant
    if let Some(variants) = prop.get("oneOf").and_then(Value::as_array) {
        let names: Vec<&str> = variants
            .iter()
            .filter_map(|v| v.get("enum").and_then(Value::as_array))
            .flatten()
            .filter_map(Value::as_str)
            .collect();
        if !names.is_empty() && names.len() == variants.len() {
            return names.join("|");
        }
    }
    // Option<T> shows up as `allOf`/`anyOf` wrappers or a type array
    for key in ["allOf", "anyOf", "oneOf"] {
        if let Some(inner) = prop.get(key).and_then(Value::as_array).and_then(|a| {
            a.iter()
                .find(|s| s.get("type").and_then(Value::as_str) != Some("null"))
        }) {
            return schema_kind(root, inner);
        }
    }
    let ty = match prop.get("type") {
        Some(Value::String(s)) => s.as_str(),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null")
            .unwrap_or("value"),
        _ => "value",
    };
    match ty {
        "boolean" => "bool".to_string(),
        "integer" | "number" => "number".to_string(),
        other => other.to_string(),
    }
}

fn resolve_ref<'a>(root: &'a Value, prop: &'a Value) -> &'a Value {
    let Some(reference) = prop.get("$ref").and_then(Value::as_str) else {
        return prop;
    };
    let name = reference.rsplit('/').next().unwrap_or_default();
    root.get("definitions")
        .and_then(|d| d.get(name))
        .unwrap_or(prop)
}

/// Plain-text help. No topic lists categories; a category lists its
/// commands; a command name shows its parameters.
pub fn help_text(directory: &CommandDirectory, topic: Option<&str>) -> String {
    let registry = command_registry(directory);
    match topic {
        None => {
            let mut lines = vec!["Available command categories:".to_string()];
            for category in CommandCategory::all() {
                let count = registry.iter().filter(|e| e.category == *category).count();
                if count > 0 {
                    lines.push(format!(
                        "  {} ({count}): {}",
                        category.slug(),
                        category.description()
                    ));
                }
            }
            lines.join("\n")
        }
        Some(topic) => {
            if let Some(entry) = registry.iter().find(|e| e.name == topic) {
                let mut lines = vec![
                    format!("{}: {}", entry.name, entry.description),
                    format!("Category: {}", entry.category.slug()),
                ];
                let params = param_summaries(&entry.param_schema);
                if !params.is_empty() {
                    lines.push("Parameters:".to_string());
                    for p in params {
                        let opt = if p.required { "" } else { " (optional)" };
                        lines.push(format!("  {}={}{opt}", p.key, p.kind));
                    }
                }
                return lines.join("\n");
            }

            let wanted = topic.to_lowercase();
            let matching: Vec<&CommandRegistryEntry> = registry
                .iter()
                .filter(|e| e.category.slug() == wanted)
                .collect();
            if matching.is_empty() {
                format!("Unknown topic: \"{topic}\".")
            } else {
                let mut lines = vec![format!("{topic} commands:")];
                for entry in matching {
                    lines.push(format!("  - {}: {}", entry.name, entry.description));
                }
                lines.join("\n")
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn set_track_params_are_summarised() {
        let directory = CommandDirectory::with_builtins();
        let set_track = directory.lookup("SetTrack").unwrap();
        let params = param_summaries(&set_track.param_schema());
        let track = params.iter().find(|p| p.key == "Track").unwrap();
        assert!(track.required);
        assert_eq!(track.kind, "number");
        let mute = params.iter().find(|p| p.key == "Mute").unwrap();
        assert!(!mute.required);
        assert_eq!(mute.kind, "bool");
    }

    #[test]
    fn enum_params_list_their_choices() {
        let directory = CommandDirectory::with_builtins();
        let get_info = directory.lookup("GetInfo").unwrap();
        let params = param_summaries(&get_info.param_schema());
        let ty = params.iter().find(|p| p.key == "Type").unwrap();
        assert_eq!(ty.kind, "Commands|Tracks|Selection|Project|App");
    }

    #[test]
    fn help_text_tiers() {
        let directory = CommandDirectory::with_builtins();
        let overview = help_text(&directory, None);
        assert!(overview.contains("query"));
        assert!(overview.contains("effect (1)"));

        let category = help_text(&directory, Some("selection"));
        assert!(category.contains("- Select:"));

        let command = help_text(&directory, Some("Message"));
        assert!(command.starts_with("Message: "));
        assert!(command.contains("Text=string"));

        assert!(help_text(&directory, Some("nope")).starts_with("Unknown topic"));
    }
}
