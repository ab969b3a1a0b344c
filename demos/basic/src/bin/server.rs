use std::{
    thread::sleep,
    time::{Duration, Instant},
};

use log::{info, warn};

use easycells_demo_basic::register_fleet;
use easycells_server::{listen, ServerConfig, DEFAULT_PORT};
use easycells_shared::{ConnectEvent, DisconnectEvent, ErrorEvent, NetworkConfig};

const TICK: Duration = Duration::from_micros(16_667);

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "localhost".to_string());
    let port = args
        .next()
        .and_then(|port| port.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let server_config = match ServerConfig::new(&host, port) {
        Ok(config) => config,
        Err(error) => {
            warn!("{}", error);
            return;
        }
    };
    let mut server = match listen(server_config, NetworkConfig::default()) {
        Ok(server) => server,
        Err(error) => {
            warn!("Could not start server: {}", error);
            return;
        }
    };
    let fleet = register_fleet(&mut server);
    info!("Basic demo server running on {}:{}", host, port);

    let mut last_tick = Instant::now();
    loop {
        let now = Instant::now();
        let delta = now.duration_since(last_tick).as_secs_f64();
        last_tick = now;

        let mut events = server.tick(delta);
        for client_id in events.read::<ConnectEvent>() {
            info!("Client {} connected", client_id);
        }
        for client_id in events.read::<DisconnectEvent>() {
            info!(
                "Client {} disconnected, {} ships in play",
                client_id,
                fleet.borrow().len()
            );
        }
        for error in events.read::<ErrorEvent>() {
            warn!("{}", error);
        }

        sleep(TICK);
    }
}
