use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{error, info, warn};

use gesturehub::app::{Command, GestureApp, HELP};
use gesturehub::config::ConfigManager;
use gesturehub::inference::{run_inference_worker, InferenceWorker, WorkerSettings};
use gesturehub::logger;
use gesturehub::transport::{MqttTransport, Peer, SimulatedTransport, Transport};
use gesturehub::types::ActiveRequest;

const DEFAULT_CONFIG_PATH: &str = "gesturehub.toml";

struct Args {
    config_path: PathBuf,
    simulate: bool,
    init_config: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
        simulate: false,
        init_config: false,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                args.config_path = iter
                    .next()
                    .map(PathBuf::from)
                    .ok_or_else(|| "--config needs a path".to_string())?;
            }
            "--simulate" => args.simulate = true,
            "--init-config" => args.init_config = true,
            "--help" | "-h" => {
                return Err("usage: gesturehub [--config PATH] [--simulate] [--init-config]".to_string())
            }
            other => return Err(format!("unknown argument '{}'", other)),
        }
    }
    Ok(args)
}

fn main() {
    logger::init_logger("info");

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };

    let mut config = match ConfigManager::load_or_default(&args.config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config {}: {}", args.config_path.display(), e);
            std::process::exit(1);
        }
    };
    if let Err(e) = config.get_config_mut().apply_env_overrides() {
        error!("Invalid environment override: {}", e);
        std::process::exit(1);
    }
    if let Err(e) = config.get_config().validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }
    if args.init_config {
        match config.save() {
            Ok(()) => info!("Wrote {}", args.config_path.display()),
            Err(e) => error!("Failed to write config: {}", e),
        }
        return;
    }

    info!("Application starting");
    let shutdown_signal = Arc::new(AtomicBool::new(false));
    let app_config = config.get_config().clone();

    // 推理后台线程
    let (task_sender, task_receiver) = bounded(app_config.channels.task_channel_capacity);
    let worker = InferenceWorker::new(WorkerSettings::from(&app_config));
    let worker_handle = {
        let shutdown = Arc::clone(&shutdown_signal);
        thread::spawn(move || run_inference_worker(worker, task_receiver, shutdown))
    };

    let mut simulator = None;
    let transport: Box<dyn Transport> = if args.simulate {
        let (transport, handle) =
            SimulatedTransport::new(app_config.channels.notification_channel_capacity);
        let transport = transport.with_peer(Peer::new("SIM:00:00:00:00:01", "ESP32_MPU6050 (simulated)"));
        simulator = Some(handle.spawn_motion(60, Arc::clone(&shutdown_signal)));
        Box::new(transport)
    } else {
        match MqttTransport::connect_broker(&app_config.mqtt, &app_config.channels) {
            Ok(transport) => Box::new(transport),
            Err(e) => {
                error!("Failed to start MQTT transport: {}", e);
                std::process::exit(1);
            }
        }
    };

    let active = ActiveRequest::new();
    let mut app = GestureApp::new(config, transport, task_sender, active.clone());
    app.execute(Command::LoadModel);

    let command_receiver = spawn_console(active);
    println!("{}", HELP);

    run_control_loop(&mut app, &command_receiver);

    info!("Shutting down");
    app.shutdown();
    shutdown_signal.store(true, Ordering::Relaxed);
    for message in app.state.drain_messages() {
        println!("{}", message);
    }

    if worker_handle.join().is_err() {
        error!("Inference worker panicked");
    }
    if let Some(handle) = simulator {
        if handle.join().is_err() {
            warn!("Simulator thread panicked");
        }
    }
    info!("Bye");
}

fn run_control_loop(app: &mut GestureApp, commands: &Receiver<Command>) {
    loop {
        match commands.recv_timeout(Duration::from_millis(100)) {
            Ok(command) => {
                if !app.execute(command) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                info!("Console closed");
                break;
            }
        }

        app.update();
        for message in app.state.drain_messages() {
            println!("{}", message);
        }
    }
}

/// Read stdin on its own thread. `cancel` is handled here directly so it
/// reaches a connect the control thread is blocked in.
fn spawn_console(active: ActiveRequest) -> Receiver<Command> {
    let (sender, receiver) = bounded(16);
    thread::spawn(move || read_console(active, sender));
    receiver
}

fn read_console(active: ActiveRequest, sender: Sender<Command>) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to read console: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<Command>() {
            Ok(Command::Cancel) if active.cancel() => println!("Cancelling..."),
            Ok(command) => {
                let quit = command == Command::Quit;
                if sender.send(command).is_err() || quit {
                    break;
                }
            }
            Err(e) => println!("{}", e),
        }
    }
}
