use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use patchgeom_core::Framework;

#[derive(Parser, Debug)]
#[command(name = "patchgeom", version, about = "Model bundle inspection and patch geometry")]
pub struct Cli {
    /// Log filter (RUST_LOG syntax)
    #[arg(long, global = true, default_value = "info")]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Find the model artifact in a directory
    Discover {
        dir: PathBuf,

        /// Framework to pick when the directory holds both kinds of model
        #[arg(long, value_enum)]
        framework: Option<FrameworkArg>,

        /// Only accept directories with a model descriptor
        #[arg(long)]
        require_descriptor: bool,
    },

    /// List every model below a models directory
    List { models_dir: PathBuf },

    /// Find the tag a graph bundle opens under and its signatures
    Resolve {
        dir: PathBuf,

        /// Open this tag instead of searching
        #[arg(long)]
        tag: Option<String>,

        /// Describe this signature's tensors
        #[arg(long)]
        signature: Option<String>,

        /// Report tags and signatures by their TensorFlow constant names
        #[arg(long)]
        vendor_names: bool,
    },

    /// Validate output geometry from a JSON plan
    Geometry {
        dir: PathBuf,

        #[arg(long)]
        plan: PathBuf,

        #[arg(long)]
        tag: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum FrameworkArg {
    Tensorflow,
    Pytorch,
}

impl From<FrameworkArg> for Framework {
    fn from(arg: FrameworkArg) -> Self {
        match arg {
            FrameworkArg::Tensorflow => Framework::TensorFlow,
            FrameworkArg::Pytorch => Framework::PyTorch,
        }
    }
}
