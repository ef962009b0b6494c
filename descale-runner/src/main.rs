use clap::Parser;
use descale_config::{load_config, Config, SenderType, SerializerType};
use descale_simulation::ParticleSimulation;
use descale_transport::{BinarySerializer, FileSender, JsonSerializer, Sender, Serializer, StdioSender};
use log::{error, info};
use std::path::PathBuf;
use std::process;

#[cfg(feature = "websocket")]
use descale_transport::WebSocketSender;

mod control;
mod driver;
mod error;

use control::ControlCommand;
use driver::{Driver, DriverSettings};
use error::RunnerError;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a JSON or TOML runner configuration; built-in defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed for the simulation's random source, overriding the config
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many frames, overriding the config
    #[arg(long)]
    frames: Option<u64>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run(Args::parse()) {
        error!("{}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<(), RunnerError> {
    let mut config = match &args.config {
        Some(path) => {
            let config = load_config(path)?;
            info!("Using configuration from {}", path.display());
            config
        }
        None => {
            info!("No configuration given, using defaults");
            Config::default()
        }
    };
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if args.frames.is_some() {
        config.max_frames = args.frames;
    }

    let seed = config.seed.unwrap_or_else(rand::random);
    info!(
        "Simulating a {}x{} pipe at {} FPS (seed {})",
        config.canvas.width, config.canvas.height, config.framerate, seed
    );
    let mut simulation = ParticleSimulation::seeded(config.canvas.width, config.canvas.height, seed);
    if config.start_paused {
        simulation.stop();
        info!("Starting paused; type 'start' to begin");
    }

    let serializer = create_serializer(&config);
    let sender = create_sender(&config)?;

    let (commands, inbox) = crossbeam_channel::unbounded();
    let interrupt = commands.clone();
    ctrlc::set_handler(move || {
        let _ = interrupt.send(ControlCommand::Quit);
    })?;
    control::spawn_stdin_reader(commands)?;
    info!("Control commands on stdin: start, stop, restart, quit");

    let mut driver = Driver::new(simulation, serializer, sender, DriverSettings::from(&config))?;
    let summary = driver.run(&inbox);
    info!("Simulation finished: {}", summary);
    Ok(())
}

fn create_serializer(config: &Config) -> Box<dyn Serializer> {
    match config.transport.serializer.serializer_type {
        SerializerType::Json => Box::new(JsonSerializer),
        SerializerType::Binary => Box::new(BinarySerializer),
    }
}

fn create_sender(config: &Config) -> Result<Box<dyn Sender>, RunnerError> {
    let sender_config = &config.transport.sender;
    match sender_config.sender_type {
        SenderType::Stdio => {
            info!("Sending frames to standard output");
            Ok(Box::new(StdioSender::new()))
        }
        SenderType::File => {
            let options = sender_config.get_file_options()?;
            info!("Appending frames to {}", options.path.display());
            Ok(Box::new(FileSender::create(&options.path)?))
        }
        SenderType::WebSocket => {
            #[cfg(feature = "websocket")]
            {
                let options = sender_config.get_websocket_options();
                let mut ws_sender = WebSocketSender::new(&options.host, options.port);
                ws_sender.start()?;
                info!("Open a frame viewer on ws://{}:{} to watch the simulation", options.host, options.port);
                Ok(Box::new(ws_sender))
            }

            #[cfg(not(feature = "websocket"))]
            {
                Err(RunnerError::UnsupportedSender("websocket"))
            }
        }
    }
}
