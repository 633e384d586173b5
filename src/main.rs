//! DeckPilot CLI - Stream Deck automation with panels, buttons and plugins.
//!
//! Provides both human-friendly and agent-friendly (robot mode) interfaces.
#![forbid(unsafe_code)]

use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use clap::{CommandFactory, Parser};
use image::ImageFormat;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, instrument, warn};

use deckpilot::cli::{
    Cli, Commands, CompletionsArgs, ConfigAction, ConfigArgs, DevicesArgs, PluginsArgs,
    PreviewArgs, ShellAction, ShellArgs, ShowArgs, StartArgs, TreeArgs,
};
use deckpilot::comm::server::send_command;
use deckpilot::comm::{EventBus, ExternalCommandMessage};
use deckpilot::config::{AppConfig, ConfigDocument, default_config_path};
use deckpilot::deck::{AssetManager, CommandAddr, DeckManager, DeckRenderer, RunOptions};
use deckpilot::device::{DeckDevice, DeviceModel, SimulatedDeck, list_devices, open_deck};
use deckpilot::error::{DpError, Result, ResultExt};
use deckpilot::logging::init_logging;
use deckpilot::output::{Output, OutputMode, PreviewKey, PreviewReport, VersionInfo};
use deckpilot::panel::{ButtonFactory, PanelRegistry};
use deckpilot::plugins::PluginManager;

const DEFAULT_PLUGIN_DIR: &str = "plugins";

fn main() {
    let cli = Cli::parse();
    let mode = OutputMode::from_cli(&cli);
    let output = mode.into_output();

    if let Err(e) = init_logging(&cli.log_settings()) {
        output.error(&e);
        std::process::exit(2);
    }

    if let Err(e) = run(&cli, output.as_ref()) {
        output.error(&e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli, output: &dyn Output) -> Result<()> {
    match &cli.command {
        None => {
            output.quick_start();
            Ok(())
        }
        Some(Commands::Start(args)) => cmd_start(cli, args, output),
        Some(Commands::Devices(args)) => cmd_devices(args, output),
        Some(Commands::Show(args)) => cmd_show(args, output),
        Some(Commands::Plugins(args)) => cmd_plugins(cli, args, output),
        Some(Commands::Tree(args)) => cmd_tree(cli, args, output),
        Some(Commands::Preview(args)) => cmd_preview(cli, args, output),
        Some(Commands::Config(args)) => cmd_config(cli, args, output),
        Some(Commands::Shell(args)) => cmd_shell(args, output),
        Some(Commands::Version) => {
            output.version_info(&VersionInfo::current());
            Ok(())
        }
        Some(Commands::Completions(args)) => {
            cmd_completions(args);
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    AppConfig::load_or_default(cli.config.as_deref())
}

/// Spinner for slow setup steps; hidden in robot mode.
fn spinner(cli: &Cli, message: &str) -> ProgressBar {
    if cli.use_json() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        bar.set_style(style);
    }
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

// === start ===

#[instrument(skip_all)]
fn cmd_start(cli: &Cli, args: &StartArgs, output: &dyn Output) -> Result<()> {
    let config = load_config(cli)?;
    let selector = {
        let from_flags = args.selector.selector();
        if from_flags.is_empty() {
            config.require_selector()?
        } else {
            from_flags
        }
    };

    let progress = spinner(cli, "Opening deck");
    let device = open_deck(&args.backend.backend(), &selector);
    progress.finish_and_clear();
    let device = device?;
    info!(serial = %device.serial(), model = %device.info().kind, "Deck opened");

    let assets = Arc::new(AssetManager::new(&config.assets));
    let renderer = Arc::new(DeckRenderer::new(Arc::clone(&device), assets));
    let bus = EventBus::new();
    let root = args.root.clone().or_else(|| config.general.root.clone());
    let mut registry = PanelRegistry::load(
        root.as_deref(),
        renderer,
        Arc::new(ButtonFactory::with_builtins()),
        bus.clone(),
    )?;

    let mut plugins = PluginManager::default();
    if args.no_plugins || !config.plugins.enabled {
        debug!("Plugins disabled");
    } else {
        let dir = plugin_dir(&config, None);
        let report = plugins.load_all(&dir, &mut registry, &bus, &config);
        for failed in &report.failed {
            output.warning(&format!(
                "Plugin {} failed: {}",
                failed.directory.display(),
                failed.reason
            ));
        }
    }

    let command_server =
        (config.commands.enabled && !args.no_command_server).then(|| CommandAddr {
            host: config.commands.host.clone(),
            port: config.commands.port,
        });
    let options = RunOptions {
        clock_tick_interval: config.clock_tick_interval()?,
        hidden_clock_tick_interval: config.hidden_clock_tick_interval()?,
        command_server,
        ..RunOptions::default()
    };

    output.info(&format!(
        "Running on {} ({}), press Ctrl-C to stop",
        device.info().product_name,
        device.serial()
    ));
    let manager = DeckManager::new(device, bus.clone(), config.streamdeck.brightness);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .with_context(|| "failed to start async runtime")?;
    runtime.block_on(manager.run(registry, options))?;

    plugins.unload_all(&bus);
    output.success("DeckPilot stopped");
    Ok(())
}

// === devices / show ===

fn cmd_devices(args: &DevicesArgs, output: &dyn Output) -> Result<()> {
    let devices = list_devices(&args.backend.backend())?;
    output.device_list(&devices);
    Ok(())
}

fn cmd_show(args: &ShowArgs, output: &dyn Output) -> Result<()> {
    let selector = args.selector.selector();
    if selector.is_empty() {
        return Err(DpError::NoDeviceSelector);
    }
    let devices = list_devices(&args.backend.backend())?;
    let position = selector.select(&devices)?;
    output.device_info(&devices[position]);
    Ok(())
}

// === offline commands ===

fn plugin_dir(config: &AppConfig, flag: Option<&Path>) -> PathBuf {
    flag.map(Path::to_path_buf)
        .or_else(|| config.plugins.directory.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PLUGIN_DIR))
}

/// A panel tree laid out on a simulated deck that nothing reads from.
fn offline_registry(
    config: &AppConfig,
    model: DeviceModel,
    root: Option<&Path>,
) -> Result<(Arc<SimulatedDeck>, PanelRegistry)> {
    let deck = Arc::new(SimulatedDeck::new(model, "PREVIEW"));
    deck.open();
    let assets = Arc::new(AssetManager::new(&config.assets));
    let renderer = Arc::new(DeckRenderer::new(deck.clone(), assets));
    let registry = PanelRegistry::load(
        root,
        renderer,
        Arc::new(ButtonFactory::with_builtins()),
        EventBus::new(),
    )?;
    Ok((deck, registry))
}

fn cmd_plugins(cli: &Cli, args: &PluginsArgs, output: &dyn Output) -> Result<()> {
    let config = load_config(cli)?;
    let dir = plugin_dir(&config, args.path.as_deref());
    let (_deck, mut registry) =
        offline_registry(&config, DeviceModel::Original, config.general.root.as_deref())?;
    let bus = registry.bus().clone();
    let mut plugins = PluginManager::default();
    let report = plugins.load_all(&dir, &mut registry, &bus, &config);
    plugins.unload_all(&bus);
    output.plugin_report(&dir, &report);
    Ok(())
}

fn cmd_tree(cli: &Cli, args: &TreeArgs, output: &dyn Output) -> Result<()> {
    let config = load_config(cli)?;
    let root = args.root.clone().or_else(|| config.general.root.clone());
    let (_deck, registry) = offline_registry(&config, args.model.into(), root.as_deref())?;
    output.panel_tree(&registry.structure());
    Ok(())
}

#[instrument(skip_all, fields(panel = %args.panel, page = args.page))]
fn cmd_preview(cli: &Cli, args: &PreviewArgs, output: &dyn Output) -> Result<()> {
    let config = load_config(cli)?;
    let root = args.root.clone().or_else(|| config.general.root.clone());
    let model: DeviceModel = args.model.into();
    let (deck, mut registry) = offline_registry(&config, model, root.as_deref())?;

    let id = registry.find(&args.panel)?;
    let pages = registry.panel(id)?.pages().len();
    if args.page >= pages {
        return Err(DpError::PanelNotFound {
            path: format!("{} page {} (panel has {pages})", args.panel, args.page),
        });
    }
    registry.activate(id)?;
    registry.set_page(args.page);

    std::fs::create_dir_all(&args.out)?;
    let mut keys = Vec::new();
    for key in 0..deck.key_count() {
        let Some(image) = deck.key_image(usize::from(key))? else {
            continue;
        };
        let path = args.out.join(format!("key-{key}.png"));
        image
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|e| DpError::ImageProcessing(e.to_string()))?;
        let png_base64 = if args.inline {
            let mut bytes = Cursor::new(Vec::new());
            image
                .write_to(&mut bytes, ImageFormat::Png)
                .map_err(|e| DpError::ImageProcessing(e.to_string()))?;
            Some(BASE64.encode(bytes.into_inner()))
        } else {
            None
        };
        keys.push(PreviewKey {
            key,
            path,
            png_base64,
        });
    }

    output.preview_written(&PreviewReport {
        model: model.display_name().to_string(),
        panel: registry.path_of(id),
        page: args.page,
        pages,
        directory: args.out.clone(),
        keys,
    });
    Ok(())
}

// === config ===

fn cmd_config(cli: &Cli, args: &ConfigArgs, output: &dyn Output) -> Result<()> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let mut document = ConfigDocument::load(&path)?;
    match &args.action {
        None => output.config_dump(document.path(), document.table()),
        Some(ConfigAction::Get { key }) => output.config_value(key, document.get(key)?),
        Some(ConfigAction::Set { key, value }) => {
            let stored = document.set(key, value)?;
            // Refuse edits that would make the file unloadable.
            AppConfig::parse(&document.to_pretty_string()?)?;
            document.save()?;
            output.config_updated(key, &stored, document.path());
        }
    }
    Ok(())
}

// === shell ===

fn cmd_shell(args: &ShellArgs, output: &dyn Output) -> Result<()> {
    let timeout = Duration::try_from_secs_f64(args.timeout)
        .ok()
        .filter(|t| !t.is_zero())
        .ok_or_else(|| {
            DpError::CommandMessage(format!(
                "timeout must be a positive number of seconds, got {}",
                args.timeout
            ))
        })?;
    let message = match &args.action {
        ShellAction::Echo { message } => ExternalCommandMessage::echo(message.clone()),
        ShellAction::Push { key, duration } => ExternalCommandMessage::push(*key, *duration)?,
    };
    debug!(host = %args.host, port = args.port, message = %message.to_json(), "Sending command");
    let reply = send_command(
        &args.host,
        args.port,
        &message,
        timeout,
    )?;
    if matches!(
        reply,
        ExternalCommandMessage::PushAck { success: false, .. } | ExternalCommandMessage::Error { .. }
    ) {
        warn!(reply = %reply.to_json(), "Instance rejected the command");
    }
    output.command_response(&reply);
    Ok(())
}

fn cmd_completions(args: &CompletionsArgs) {
    clap_complete::generate(args.shell, &mut Cli::command(), "deckpilot", &mut io::stdout());
}
