use color_eyre::Result;
use lx_core::{
    ArchiveFormat, CommandContext, CommandGroup, CommandInfo, ExecutionOutcome, ExportRequest,
};

use crate::cli::{CommandGroupCli, ImageCommand, LayerArgs};

pub fn dispatch_command(
    ctx: &CommandContext,
    group: &CommandGroupCli,
) -> Result<(CommandInfo, ExecutionOutcome)> {
    match group {
        CommandGroupCli::Layer(args) => {
            let info = CommandInfo::new(CommandGroup::Layer, "layer");
            let request = export_request_from_args(ctx, args);
            core_call(info, || lx_core::export_image(ctx, &request))
        }
        CommandGroupCli::Image(ImageCommand::Modify(args)) => {
            let info = CommandInfo::new(CommandGroup::Image, "modify");
            let request = export_request_from_args(ctx, args);
            core_call(info, || lx_core::export_image(ctx, &request))
        }
    }
}

/// Builds the request once; nothing downstream mutates it.
pub fn export_request_from_args(ctx: &CommandContext, args: &LayerArgs) -> ExportRequest {
    let format: ArchiveFormat = args.format.into();
    ExportRequest {
        output_path: args.output.clone(),
        format,
        compress: args.compress,
        accept_uncompressed_layers: args.uncompressed,
        quiet: args.quiet,
        multi_image_archive: multi_image_archive(
            args.multi_image_archive,
            ctx.config().multi_image_archive(),
            format,
        ),
        image_references: args.images.clone(),
    }
}

/// `-m` always counts; the `LX_MULTI_IMAGE_ARCHIVE` default only applies to
/// formats that can hold several images.
fn multi_image_archive(flag: bool, env_default: bool, format: ArchiveFormat) -> bool {
    flag || (env_default && format.supports_multi_image())
}

fn core_call<F>(info: CommandInfo, action: F) -> Result<(CommandInfo, ExecutionOutcome)>
where
    F: FnOnce() -> anyhow::Result<ExecutionOutcome>,
{
    match action() {
        Ok(outcome) => Ok((info, outcome)),
        Err(err) => {
            tracing::debug!(error = ?err, "command failed unexpectedly");
            let issues: Vec<String> = err.chain().map(ToString::to_string).collect();
            Ok((
                info,
                ExecutionOutcome::failure(
                    err.to_string(),
                    serde_json::json!({
                        "code": lx_core::diag_codes::GENERIC,
                        "reason": "internal_error",
                        "issues": issues,
                        "hint": "re-run with -vv for more detail",
                    }),
                ),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_default_only_applies_to_multi_image_formats() {
        assert!(multi_image_archive(false, true, ArchiveFormat::DockerArchive));
        assert!(!multi_image_archive(false, true, ArchiveFormat::OciArchive));
        assert!(!multi_image_archive(false, true, ArchiveFormat::DockerDir));
        assert!(!multi_image_archive(false, false, ArchiveFormat::DockerArchive));
    }

    #[test]
    fn explicit_flag_is_kept_for_validation() {
        assert!(multi_image_archive(true, false, ArchiveFormat::OciArchive));
    }
}
