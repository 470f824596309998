use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use lx_domain::ArchiveFormat;

pub const LX_HELP_TEMPLATE: &str =
    "{before-help}\nUsage:\n    {usage}\n\n{all-args}\n";

pub const LX_BEFORE_HELP: &str = concat!(
    "lx ",
    env!("CARGO_PKG_VERSION"),
    " - export images from the local layout store\n\n",
    "\x1b[1;36mCommands\x1b[0m\n",
    "  layer            Write an image archive to a file, or stream it to stdout.\n",
    "  image modify     Same as `lx layer`.\n",
);

#[derive(Parser, Debug)]
#[command(
    name = "lx",
    author,
    version,
    propagate_version = false,
    disable_help_subcommand = true,
    before_help = LX_BEFORE_HELP,
    help_template = LX_HELP_TEMPLATE
)]
pub struct LxCli {
    #[arg(
        short,
        long,
        action = ArgAction::Count,
        global = true,
        help = "Increase logging (-vv reaches trace)"
    )]
    pub verbose: u8,
    #[arg(long, help = "Force trace logging regardless of -v", global = true)]
    pub trace: bool,
    #[arg(
        long,
        help = "Emit {status,message,details} JSON envelopes (on stderr when streaming)",
        global = true
    )]
    pub json: bool,
    #[arg(long, help = "Disable colored human output", global = true)]
    pub no_color: bool,
    #[command(subcommand)]
    pub command: CommandGroupCli,
}

#[derive(Subcommand, Debug)]
pub enum CommandGroupCli {
    #[command(about = "Export an image as an archive or directory layout")]
    Layer(LayerArgs),
    /// Image commands
    #[command(subcommand)]
    Image(ImageCommand),
}

#[derive(Subcommand, Debug)]
pub enum ImageCommand {
    #[command(about = "Alias for `lx layer`")]
    Modify(LayerArgs),
}

impl CommandGroupCli {
    pub fn layer_args(&self) -> &LayerArgs {
        match self {
            CommandGroupCli::Layer(args) | CommandGroupCli::Image(ImageCommand::Modify(args)) => {
                args
            }
        }
    }
}

#[derive(Args, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct LayerArgs {
    #[arg(
        value_name = "IMAGE",
        required = true,
        num_args = 1..,
        help = "Image to export; further names become extra tags unless -m is set"
    )]
    pub images: Vec<String>,
    #[arg(long, value_enum, default_value_t = FormatArg::DockerArchive, help = "Archive format")]
    pub format: FormatArg,
    #[arg(long, help = "Compress layers (oci-dir and docker-dir only)")]
    pub compress: bool,
    #[arg(long, help = "Accept uncompressed layers when writing OCI formats")]
    pub uncompressed: bool,
    #[arg(
        short,
        long,
        value_name = "PATH",
        default_value = "",
        hide_default_value = true,
        help = "Write to PATH instead of stdout"
    )]
    pub output: String,
    #[arg(short, long, help = "Suppress status output")]
    pub quiet: bool,
    #[arg(
        short = 'm',
        long,
        help = "Put every IMAGE into one docker-archive (default from LX_MULTI_IMAGE_ARCHIVE)"
    )]
    pub multi_image_archive: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatArg {
    OciArchive,
    OciDir,
    DockerArchive,
    DockerDir,
}

impl From<FormatArg> for ArchiveFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::OciArchive => ArchiveFormat::OciArchive,
            FormatArg::OciDir => ArchiveFormat::OciDir,
            FormatArg::DockerArchive => ArchiveFormat::DockerArchive,
            FormatArg::DockerDir => ArchiveFormat::DockerDir,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_parses_like_layer() {
        let cli = LxCli::try_parse_from([
            "lx", "image", "modify", "--format", "oci-dir", "-o", "out", "alpine",
        ])
        .unwrap();
        let args = cli.command.layer_args();
        assert_eq!(args.format, FormatArg::OciDir);
        assert_eq!(args.output, "out");
        assert_eq!(args.images, vec!["alpine"]);
    }

    #[test]
    fn defaults_to_docker_archive_on_stdout() {
        let cli = LxCli::try_parse_from(["lx", "layer", "alpine:latest"]).unwrap();
        let args = cli.command.layer_args();
        assert_eq!(ArchiveFormat::from(args.format), ArchiveFormat::DockerArchive);
        assert!(args.output.is_empty());
        assert!(!args.quiet);
    }

    #[test]
    fn image_is_required() {
        assert!(LxCli::try_parse_from(["lx", "layer"]).is_err());
    }
}
