use std::{cell::RefCell, collections::HashMap, rc::Rc};

use log::{debug, info, warn};

use easycells_shared::{
    random_identifier, ClientId, ComponentHandle, NetId, NetworkContext, NetworkTransform,
    NetworkVariable, RegistryError, RpcDescriptor, RpcError, RpcTable, SendTo, SyncSettings,
    Transform,
};

use crate::models::{ship_config, ShipConfig, WORLD_SIZE};

pub const INSTANTIATE: &str = "SpaceShip_instantiate";
pub const DESTROY: &str = "SpaceShip_destroy";
pub const TAKE_DAMAGE: &str = "take_damage";
/// Seconds the server waits after a connection before replaying ships.
pub const LATE_JOIN_DELAY: f64 = 3.0;

/// `(model, name, owner, identifier)`
pub type ShipArgs = (String, String, ClientId, NetId);

pub struct ShipState {
    pub name: String,
    pub model: String,
    pub config: ShipConfig,
    life: NetworkVariable<i64>,
}

impl ShipState {
    pub fn life(&self) -> i64 {
        self.life.value()
    }
}

thread_local! {
    static SHIP_RPCS: Rc<RpcTable<ShipState>> = RpcTable::<ShipState>::new()
        .rpc(
            TAKE_DAMAGE,
            RpcDescriptor::new(SendTo::Owner).require_owner(false),
            |call, (amount,): (i64,)| {
                // the server runs every accepted call too; only the owner
                // may write the life total
                if call.context().client_id() != Some(call.owner()) {
                    return Ok(());
                }
                let life = call.state().life.clone();
                let remaining = life.value() - amount;
                life.set(call.context(), remaining)?;
                info!("Ship {} hit for {}, {} left", call.identifier(), amount, remaining);

                if remaining <= 0 {
                    let identifier = call.identifier();
                    call.context().call_static(DESTROY, (identifier,))?;
                }
                Ok(())
            },
        )
        .build();
}

/// One instantiated ship and its replicated parts.
pub struct Ship {
    pub handle: ComponentHandle<ShipState>,
    pub transform: NetworkTransform,
    pub life: NetworkVariable<i64>,
}

#[derive(Default)]
pub struct Fleet {
    spawned: Vec<ShipArgs>,
    ships: HashMap<NetId, Ship>,
}

impl Fleet {
    /// Arguments of every live ship, in instantiation order.
    pub fn spawned(&self) -> &[ShipArgs] {
        &self.spawned
    }

    pub fn ship(&self, identifier: NetId) -> Option<&Ship> {
        self.ships.get(&identifier)
    }

    pub fn identifiers(&self) -> Vec<NetId> {
        self.spawned.iter().map(|(_, _, _, identifier)| *identifier).collect()
    }

    pub fn len(&self) -> usize {
        self.ships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ships.is_empty()
    }
}

pub type SharedFleet = Rc<RefCell<Fleet>>;

/// Ship identifiers are even; the ship's transform uses the next odd one.
pub fn new_ship_identifier() -> NetId {
    loop {
        let identifier = random_identifier() & !1;
        if identifier != 0 {
            return identifier;
        }
    }
}

pub fn transform_identifier(ship: NetId) -> NetId {
    ship + 1
}

/// Registers the ship RPCs on `ctx`. On a server it also replays every live
/// ship to each client `LATE_JOIN_DELAY` seconds after it connects.
pub fn register_fleet(ctx: &mut NetworkContext) -> SharedFleet {
    let fleet: SharedFleet = Rc::default();

    let ships = fleet.clone();
    ctx.register_static_rpc(
        INSTANTIATE,
        RpcDescriptor::new(SendTo::All).require_owner(false),
        move |call, args: ShipArgs| instantiate(&ships, call.context(), args),
    );

    let ships = fleet.clone();
    ctx.register_static_rpc(
        DESTROY,
        RpcDescriptor::new(SendTo::All).require_owner(false),
        move |call, (identifier,): (NetId,)| {
            destroy(&ships, call.context(), identifier);
            Ok(())
        },
    );

    if ctx.is_server() {
        let ships = fleet.clone();
        ctx.on_connect(move |ctx, client_id| {
            let ships = ships.clone();
            ctx.schedule(LATE_JOIN_DELAY, move |ctx| replay(&ships, ctx, client_id));
        });
    }

    fleet
}

fn registry_error(error: RegistryError) -> RpcError {
    RpcError::handler(error.to_string())
}

fn instantiate(fleet: &SharedFleet, ctx: &mut NetworkContext, args: ShipArgs) -> Result<(), RpcError> {
    if fleet.borrow().spawned.contains(&args) {
        debug!("Ship {} already instantiated", args.3);
        return Ok(());
    }

    let (model, name, owner, identifier) = args.clone();
    let config = ship_config(&model)
        .ok_or_else(|| RpcError::handler(format!("unknown ship model '{}'", model)))?;

    let life = NetworkVariable::new(ctx, config.life, identifier, owner, true)
        .map_err(registry_error)?;
    let state = ShipState {
        name: name.clone(),
        model,
        config,
        life: life.clone(),
    };
    let rpcs = SHIP_RPCS.with(Rc::clone);
    let handle = ComponentHandle::spawn(ctx, identifier, owner, rpcs, state)
        .map_err(registry_error)?;

    let settings = SyncSettings {
        sync_angle: true,
        ..SyncSettings::default()
    };
    let transform = NetworkTransform::spawn(ctx, transform_identifier(identifier), owner, settings)
        .map_err(registry_error)?;
    transform.set_transform(Transform {
        x: (fastrand::f64() - 0.5) * WORLD_SIZE,
        y: (fastrand::f64() - 0.5) * WORLD_SIZE,
        ..Transform::default()
    })?;
    transform.start_sync(ctx);

    info!("Instantiated ship '{}' ({}) for client {}", name, identifier, owner);
    let mut fleet = fleet.borrow_mut();
    fleet.spawned.push(args);
    fleet.ships.insert(
        identifier,
        Ship {
            handle,
            transform,
            life,
        },
    );
    Ok(())
}

fn destroy(fleet: &SharedFleet, ctx: &mut NetworkContext, identifier: NetId) {
    let ship = {
        let mut fleet = fleet.borrow_mut();
        fleet.spawned.retain(|args| args.3 != identifier);
        fleet.ships.remove(&identifier)
    };

    match ship {
        Some(ship) => {
            ship.transform.destroy(ctx);
            ship.life.destroy(ctx);
            ship.handle.destroy(ctx);
            info!("Destroyed ship {}", identifier);
        }
        None => debug!("Ship {} not found", identifier),
    }
}

fn replay(fleet: &SharedFleet, ctx: &mut NetworkContext, client_id: ClientId) {
    let spawned = fleet.borrow().spawned.clone();
    debug!("Replaying {} ships to client {}", spawned.len(), client_id);
    for args in spawned {
        if let Err(error) = ctx.call_rpc_on_client(client_id, INSTANTIATE, args) {
            warn!("Could not replay ship to client {}: {}", client_id, error);
        }
    }
}
