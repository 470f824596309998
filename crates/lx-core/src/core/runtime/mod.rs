use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::context::CommandInfo;
use crate::outcome::{CommandStatus, ExecutionOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandGroup {
    Layer,
    Image,
}

impl fmt::Display for CommandGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandGroup::Layer => "layer",
            CommandGroup::Image => "image",
        };
        f.write_str(name)
    }
}

#[must_use]
pub fn to_json_response(info: CommandInfo, outcome: &ExecutionOutcome) -> Value {
    let status = match outcome.status {
        CommandStatus::Ok => "ok",
        CommandStatus::UserError => "user-error",
        CommandStatus::Failure => "error",
    };
    let details = match &outcome.details {
        Value::Object(_) => outcome.details.clone(),
        Value::Null => json!({}),
        other => json!({ "value": other }),
    };
    json!({
        "status": status,
        "message": format_status_message(info, &outcome.message),
        "details": details,
    })
}

#[must_use]
pub fn format_status_message(info: CommandInfo, message: &str) -> String {
    let group_name = info.group.to_string();
    let prefix = if group_name == info.name {
        format!("lx {}", info.name)
    } else {
        format!("lx {} {}", group_name, info.name)
    };
    if message.is_empty() {
        prefix
    } else if message.starts_with(&prefix) {
        message.to_string()
    } else {
        format!("{prefix}: {message}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_message_uses_group_and_name() {
        let layer = CommandInfo::new(CommandGroup::Layer, "layer");
        assert_eq!(format_status_message(layer, "done"), "lx layer: done");
        let modify = CommandInfo::new(CommandGroup::Image, "modify");
        assert_eq!(format_status_message(modify, ""), "lx image modify");
        assert_eq!(
            format_status_message(modify, "lx image modify: already"),
            "lx image modify: already"
        );
    }

    #[test]
    fn json_response_wraps_non_object_details() {
        let info = CommandInfo::new(CommandGroup::Layer, "layer");
        let outcome = ExecutionOutcome::failure("boom", json!("raw"));
        let payload = to_json_response(info, &outcome);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["message"], "lx layer: boom");
        assert_eq!(payload["details"]["value"], "raw");
    }
}
