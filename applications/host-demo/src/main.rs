//! Runs the supervisor on a desktop machine.
//!
//! Usage: `host-demo [config.json]`. Pressing Enter stands in for pressing
//! the configured button. Set `RUST_LOG=debug` for more detail.

use std::io::BufRead;
use std::process::ExitCode;
use std::sync::mpsc::{self, Receiver};
use std::{env, fs, io, thread};

use cellmqtt::config::Config;
use cellmqtt::input::{ButtonEvent, EventSource};
use cellmqtt::platform::std::{HostLink, StdClock, StdDelay, SystemDns, TcpConnector};
use cellmqtt::session::MqttSession;
use cellmqtt::supervisor::ConnectionSupervisor;
use log::{error, info};
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Button events fed from the terminal.
struct Keyboard {
    presses: Receiver<ButtonEvent>,
}

impl Keyboard {
    fn spawn(button_index: u8) -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for line in io::stdin().lock().lines() {
                if line.is_err() {
                    break;
                }
                let press = [
                    ButtonEvent::pressed(button_index),
                    ButtonEvent::released(button_index),
                ];
                if press.into_iter().any(|event| tx.send(event).is_err()) {
                    break;
                }
            }
        });
        Self { presses: rx }
    }
}

impl EventSource for Keyboard {
    fn poll_event(&mut self) -> Option<ButtonEvent> {
        self.presses.try_recv().ok()
    }
}

fn load_config() -> Result<Config, String> {
    let Some(path) = env::args().nth(1) else {
        return Ok(Config::default());
    };
    let json = fs::read_to_string(&path).map_err(|e| format!("reading {path}: {e}"))?;
    Config::from_json(&json).map_err(|e| format!("{path}: {e}"))
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match load_config() {
        Ok(config) => config,
        Err(err) => {
            error!("Invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
    };
    info!(
        "Broker {}:{}, press Enter to publish to {}",
        config.broker_hostname, config.broker_port, config.publish_topic
    );

    let keyboard = Keyboard::spawn(config.button_index);
    let session: MqttSession<_, _> = MqttSession::new(TcpConnector, StdClock::new());
    let supervisor = ConnectionSupervisor::new(
        config,
        HostLink,
        SystemDns,
        session,
        StdDelay,
        keyboard,
        StdRng::from_entropy(),
    );
    let mut supervisor = match supervisor {
        Ok(supervisor) => supervisor,
        Err(err) => {
            error!("Invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    match supervisor.run() {
        Ok(never) => match never {},
        Err(err) => {
            error!("Supervisor stopped: {err}");
            ExitCode::FAILURE
        }
    }
}
