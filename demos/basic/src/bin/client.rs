use std::{
    thread::sleep,
    time::{Duration, Instant},
};

use log::{info, warn};

use easycells_client::{connect, ClientConfig};
use easycells_demo_basic::{
    new_ship_identifier, register_fleet, SharedFleet, INSTANTIATE, MODELS, TAKE_DAMAGE,
};
use easycells_server::DEFAULT_PORT;
use easycells_shared::{
    ClientId, ConnectEvent, ConnectionState, DisconnectEvent, ErrorEvent, NetworkConfig,
    NetworkContext, NetId,
};

const TICK: Duration = Duration::from_micros(16_667);
const SHOT_INTERVAL: f64 = 2.0;
const SPEED: f64 = 120.0;

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "localhost".to_string());
    let port = args
        .next()
        .and_then(|port| port.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let client_config = match ClientConfig::new(&host, port) {
        Ok(config) => config,
        Err(error) => {
            warn!("{}", error);
            return;
        }
    };
    let mut client = match connect(client_config, NetworkConfig::default()) {
        Ok(client) => client,
        Err(error) => {
            warn!("Could not connect: {}", error);
            return;
        }
    };

    let fleet = register_fleet(&mut client);
    let ship_identifier = new_ship_identifier();
    client.on_connect(move |ctx, client_id| spawn_own_ship(ctx, client_id, ship_identifier));

    let mut last_tick = Instant::now();
    let mut since_shot = 0.0;
    loop {
        let now = Instant::now();
        let delta = now.duration_since(last_tick).as_secs_f64();
        last_tick = now;

        let mut events = client.tick(delta);
        for client_id in events.read::<ConnectEvent>() {
            info!("Connected as client {}", client_id);
        }
        if events.read::<DisconnectEvent>().next().is_some() {
            info!("Disconnected from server");
        }
        for error in events.read::<ErrorEvent>() {
            warn!("{}", error);
        }
        if client.state() == ConnectionState::Closed {
            break;
        }

        fly(&fleet, delta, ship_identifier);
        since_shot += delta;
        if since_shot >= SHOT_INTERVAL {
            since_shot = 0.0;
            shoot(&fleet, &mut client, ship_identifier);
        }

        sleep(TICK);
    }
}

fn spawn_own_ship(ctx: &mut NetworkContext, client_id: ClientId, identifier: NetId) {
    let (model, _) = MODELS[fastrand::usize(..MODELS.len())];
    let name = format!("pilot-{}", client_id);
    let args = (model.to_string(), name, client_id, identifier);
    if let Err(error) = ctx.call_static(INSTANTIATE, args) {
        warn!("Could not instantiate ship: {}", error);
    }
}

/// Drifts our ship to the right; the transform syncs itself.
fn fly(fleet: &SharedFleet, delta: f64, identifier: NetId) {
    let fleet = fleet.borrow();
    let transform = match fleet.ship(identifier) {
        Some(ship) => &ship.transform,
        None => return,
    };
    match transform.transform() {
        Ok(mut current) => {
            current.x += SPEED * delta;
            if let Err(error) = transform.set_transform(current) {
                warn!("{}", error);
            }
        }
        Err(error) => warn!("{}", error),
    }
}

/// Damages a random ship that is not ours.
fn shoot(fleet: &SharedFleet, ctx: &mut NetworkContext, own: NetId) {
    let (handle, damage) = {
        let fleet = fleet.borrow();
        let targets: Vec<NetId> = fleet
            .identifiers()
            .into_iter()
            .filter(|identifier| *identifier != own)
            .collect();
        if targets.is_empty() {
            return;
        }
        let target = targets[fastrand::usize(..targets.len())];
        let damage = match fleet.ship(own) {
            Some(ship) => ship.handle.with_state(|state| state.config.damage),
            None => return,
        };
        match (fleet.ship(target), damage) {
            (Some(ship), Ok(damage)) => (ship.handle.clone(), damage),
            _ => return,
        }
    };
    if let Err(error) = handle.call(ctx, TAKE_DAMAGE, (damage,)) {
        warn!("{}", error);
    }
}
