//! Runs the full supervisor against a real broker.
//!
//! Ignored by default. Point `TEST_MQTT_ADDRESS` (or a `.env` file) at a
//! broker as `host:port` and run with `--ignored`.

use std::env;

use cellmqtt::config::Config;
use cellmqtt::input::{ButtonEvent, ButtonQueue};
use cellmqtt::platform::std::{HostLink, StdClock, StdDelay, SystemDns, TcpConnector};
use cellmqtt::session::{MqttSession, SessionAdapter, SessionState};
use cellmqtt::supervisor::{ConnectionSupervisor, State};
use dotenvy::dotenv;
use heapless::String;
use rand::SeedableRng;
use rand::rngs::StdRng;

fn broker_config() -> Config {
    dotenv().ok();
    let address = env::var("TEST_MQTT_ADDRESS").unwrap_or("test.mosquitto.org:1883".to_string());
    let (host, port) = address.rsplit_once(':').unwrap_or((address.as_str(), "1883"));

    Config {
        broker_hostname: String::try_from(host).unwrap(),
        broker_port: port.parse().unwrap(),
        client_id: String::try_from("cellmqtt-live-test").unwrap(),
        publish_topic: String::try_from("cellmqtt/test/button").unwrap(),
        tick_interval_ms: 100,
        keepalive_s: 10,
        ..Config::default()
    }
}

#[test]
#[ignore = "needs a reachable MQTT broker"]
fn test_connect_and_publish_on_button() {
    let clock = StdClock::new();
    let session: MqttSession<_, _> = MqttSession::new(TcpConnector, clock);
    let mut supervisor = ConnectionSupervisor::new(
        broker_config(),
        HostLink,
        SystemDns,
        session,
        StdDelay,
        ButtonQueue::<4>::new(),
        StdRng::from_entropy(),
    )
    .expect("valid config");

    while supervisor.state() != State::Connected {
        supervisor.step().expect("startup");
    }
    for _ in 0..50 {
        supervisor.step().expect("tick");
        if supervisor.session().state() == SessionState::Connected {
            break;
        }
    }
    assert_eq!(supervisor.session().state(), SessionState::Connected);

    supervisor.events_mut().push(ButtonEvent::pressed(1)).unwrap();
    assert_eq!(supervisor.step(), Ok(State::Connected));
    assert!(supervisor.gateway().last_message_id().is_some());

    supervisor.session_mut().disconnect().expect("disconnect");
}
