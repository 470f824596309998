use atty::Stream;
use color_eyre::Result;
use lx_core::{CommandInfo, CommandStatus, ExecutionOutcome};
use serde_json::Value;

use crate::style::Style;

#[derive(Clone, Copy, Debug)]
pub struct OutputOptions {
    pub quiet: bool,
    pub json: bool,
    pub no_color: bool,
    pub verbose: u8,
}

/// Prints the outcome and returns the process exit code.
///
/// Standard output belongs to the archive when it was streamed, so the JSON
/// envelope moves to stderr in that case and status lines are dropped.
pub fn emit_output(opts: &OutputOptions, info: CommandInfo, outcome: &ExecutionOutcome) -> Result<i32> {
    let code = match outcome.status {
        CommandStatus::Ok => 0,
        CommandStatus::UserError => 1,
        CommandStatus::Failure => 2,
    };
    let streamed = outcome.streamed();

    if opts.json {
        let payload = lx_core::to_json_response(info, outcome);
        let rendered = serde_json::to_string_pretty(&payload)?;
        if streamed {
            eprintln!("{rendered}");
        } else {
            println!("{rendered}");
        }
        return Ok(code);
    }

    match outcome.status {
        CommandStatus::Ok => {
            if opts.quiet || streamed || flag(&outcome.details, "quiet") {
                return Ok(code);
            }
            let style = Style::new(opts.no_color, atty::is(Stream::Stdout));
            let message = lx_core::format_status_message(info, &outcome.message);
            println!("{}", style.status(&outcome.status, &message));
        }
        CommandStatus::UserError | CommandStatus::Failure => {
            let style = Style::new(opts.no_color, atty::is(Stream::Stderr));
            let header = format!(
                "{}  {}",
                error_code(&outcome.details),
                lx_core::format_status_message(info, &outcome.message)
            );
            eprintln!("{}", style.error_header(&outcome.status, &header));
            if opts.verbose > 0 {
                if let Some(hint) = text(&outcome.details, "hint") {
                    eprintln!("{}", style.info(&format!("Hint: {hint}")));
                }
            }
        }
    }
    Ok(code)
}

fn error_code(details: &Value) -> &str {
    text(details, "code").unwrap_or(lx_core::diag_codes::GENERIC)
}

fn text<'a>(details: &'a Value, key: &str) -> Option<&'a str> {
    details.get(key).and_then(Value::as_str)
}

fn flag(details: &Value, key: &str) -> bool {
    details.get(key).and_then(Value::as_bool).unwrap_or(false)
}
