//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::comm::{DEFAULT_COMMAND_HOST, DEFAULT_COMMAND_PORT};
use crate::device::{DeckBackend, DeckSelector, DeviceModel};
use crate::logging::LogSettings;

/// DeckPilot - panels, buttons and plugins for Elgato Stream Decks.
///
/// Robot Mode: Use --robot or --format json for machine-parseable output.
#[derive(Parser, Debug)]
#[command(name = "deckpilot", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (text for humans, json for agents/scripts)
    #[arg(
        long,
        short = 'f',
        default_value = "text",
        global = true,
        env = "DECKPILOT_FORMAT"
    )]
    pub format: OutputFormat,

    /// Robot mode: equivalent to --format=json
    #[arg(long, global = true)]
    pub robot: bool,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Log level (DEBUG, INFO, WARNING, ERROR); overrides -v/-q
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Only show log records matching FIELD=REGEX[,FIELD=REGEX] (repeatable, ORed)
    #[arg(long = "log-filter", global = true, value_name = "SPEC")]
    pub log_filters: Vec<String>,

    /// Config file (default: ~/.config/deckpilot/config.toml)
    #[arg(long, short = 'c', global = true, env = "DECKPILOT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Output format selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text with optional color
    #[default]
    Text,
    /// JSON output for scripts and agents
    Json,
    /// Compact JSON (single line)
    JsonCompact,
}

impl Cli {
    /// Returns true if output should be JSON (robot mode or explicit --format=json).
    pub const fn use_json(&self) -> bool {
        self.robot || matches!(self.format, OutputFormat::Json | OutputFormat::JsonCompact)
    }

    pub const fn use_compact_json(&self) -> bool {
        matches!(self.format, OutputFormat::JsonCompact)
    }

    pub fn log_settings(&self) -> LogSettings {
        LogSettings {
            robot_mode: self.use_json(),
            verbose: self.verbose,
            quiet: self.quiet,
            level: self.log_level.clone(),
            filters: self.log_filters.clone(),
        }
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the panel tree on a deck until interrupted
    Start(StartArgs),

    /// List connected decks
    #[command(visible_alias = "list")]
    Devices(DevicesArgs),

    /// Show one deck
    Show(ShowArgs),

    /// List plugins and their load status
    Plugins(PluginsArgs),

    /// Print the panel structure
    Tree(TreeArgs),

    /// Render a panel page to PNG files
    Preview(PreviewArgs),

    /// Print, read or edit the config file
    Config(ConfigArgs),

    /// Talk to a running instance
    Shell(ShellArgs),

    /// Show version and build information
    Version,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Deck source flags shared by device commands.
#[derive(Args, Debug, Clone, Default)]
pub struct BackendArgs {
    /// Use the headless simulator instead of USB hardware
    #[arg(long)]
    pub use_simulator: bool,

    /// Simulator device list (TOML)
    #[arg(long, value_name = "FILE", requires = "use_simulator")]
    pub simulator_config: Option<PathBuf>,
}

impl BackendArgs {
    pub fn backend(&self) -> DeckBackend {
        DeckBackend::from_flags(self.use_simulator, self.simulator_config.clone())
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct SelectorArgs {
    /// Device index as shown by `devices`
    #[arg(long, short = 'i')]
    pub index: Option<usize>,

    /// Device serial number
    #[arg(long, short = 's', env = "DECKPILOT_SERIAL")]
    pub serial: Option<String>,
}

impl SelectorArgs {
    pub fn selector(&self) -> DeckSelector {
        DeckSelector {
            serial: self.serial.clone(),
            index: self.index,
        }
    }
}

#[derive(Args, Debug)]
#[allow(clippy::struct_excessive_bools)] // CLI flags naturally use multiple bools
pub struct StartArgs {
    /// Root panel directory (overrides general.root)
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    #[command(flatten)]
    pub backend: BackendArgs,

    #[command(flatten)]
    pub selector: SelectorArgs,

    /// Do not listen for external commands
    #[arg(long)]
    pub no_command_server: bool,

    /// Do not load plugins
    #[arg(long)]
    pub no_plugins: bool,
}

#[derive(Args, Debug)]
pub struct DevicesArgs {
    #[command(flatten)]
    pub backend: BackendArgs,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    #[command(flatten)]
    pub selector: SelectorArgs,

    #[command(flatten)]
    pub backend: BackendArgs,
}

#[derive(Args, Debug)]
pub struct PluginsArgs {
    /// Plugin directory (overrides plugins.directory)
    #[arg(long, value_name = "DIR")]
    pub path: Option<PathBuf>,
}

/// Simulated deck model used for offline commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ModelArg {
    #[default]
    Original,
    Mini,
    Xl,
    Plus,
    Neo,
    VirtualPad,
}

impl From<ModelArg> for DeviceModel {
    fn from(model: ModelArg) -> Self {
        match model {
            ModelArg::Original => Self::Original,
            ModelArg::Mini => Self::Mini,
            ModelArg::Xl => Self::Xl,
            ModelArg::Plus => Self::Plus,
            ModelArg::Neo => Self::Neo,
            ModelArg::VirtualPad => Self::VirtualPad,
        }
    }
}

#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Root panel directory (overrides general.root)
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Deck model the tree is paginated for
    #[arg(long, default_value = "original")]
    pub model: ModelArg,
}

#[derive(Args, Debug)]
pub struct PreviewArgs {
    /// Root panel directory (overrides general.root)
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    #[arg(long, default_value = "original")]
    pub model: ModelArg,

    /// Panel path such as `/apps`
    #[arg(long, default_value = "/")]
    pub panel: String,

    /// Page number (0-based)
    #[arg(long, default_value = "0")]
    pub page: usize,

    /// Output directory for key-{i}.png files
    #[arg(long, value_name = "DIR")]
    pub out: PathBuf,

    /// Also embed base64 PNGs in robot output
    #[arg(long)]
    pub inline: bool,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the value at a dotted key (e.g. streamdeck.brightness)
    Get { key: String },
    /// Set a dotted key; the value is converted to the current type
    Set { key: String, value: String },
}

#[derive(Args, Debug)]
pub struct ShellArgs {
    /// Instance host
    #[arg(long, global = true, default_value = DEFAULT_COMMAND_HOST)]
    pub host: String,

    /// Instance port
    #[arg(long, global = true, default_value_t = DEFAULT_COMMAND_PORT)]
    pub port: u16,

    /// Seconds to wait for a reply
    #[arg(long, global = true, default_value = "5")]
    pub timeout: f64,

    #[command(subcommand)]
    pub action: ShellAction,
}

#[derive(Subcommand, Debug)]
pub enum ShellAction {
    /// Ping the instance
    Echo {
        #[arg(default_value = "ping")]
        message: String,
    },
    /// Press a key for a while
    Push {
        key: i64,
        /// Seconds to hold the key
        #[arg(long, short = 'd', default_value_t = crate::comm::external::DEFAULT_PUSH_DURATION)]
        duration: f64,
    },
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
