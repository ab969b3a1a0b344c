use std::{mem, rc::Rc};

use log::{debug, trace, warn};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    error::NetworkError,
    events::NetworkEvents,
    manager::{ConnectionState, NetworkConfig, NetworkManager},
    messages::{
        args::Args,
        packet::{Packet, VarOp},
        wire_message::WireMessage,
    },
    registry::{NetworkObject, ObjectRegistry, RegistryError},
    rpc::{
        error::{DispatchError, RpcError},
        execution_guard::ExecutionGuard,
        routing::{plan_local_call, plan_relay, LocalExecution, Recipients},
        static_rpcs::{StaticCall, StaticRpcEntry, StaticRpcHandler},
        RpcDescriptor,
    },
    time::{GameTime, Scheduler, TaskId},
    transport::{DeliveryMode, Transport},
    types::{ClientId, HostType, NetId, SERVER_ID, STATIC_IDENTIFIER},
};

type ConnectCallback = Box<dyn FnMut(&mut NetworkContext, ClientId)>;

/// Everything one peer needs to take part in a session: the network manager,
/// the object registry with its static RPC table, the clock and the
/// scheduler. All of it lives on the game thread.
pub struct NetworkContext {
    manager: NetworkManager,
    registry: ObjectRegistry,
    config: NetworkConfig,
    time: GameTime,
    scheduler: Scheduler<NetworkContext>,
    connect_callbacks: Vec<ConnectCallback>,
    pending_errors: Vec<NetworkError>,
}

impl NetworkContext {
    pub fn new<T: Transport + 'static>(transport: T, config: NetworkConfig) -> Self {
        let mut manager = NetworkManager::new(Box::new(transport));
        manager.start();

        Self {
            manager,
            registry: ObjectRegistry::new(),
            config,
            time: GameTime::new(),
            scheduler: Scheduler::new(),
            connect_callbacks: Vec::new(),
            pending_errors: Vec::new(),
        }
    }

    /// Advances the clock, applies connection changes, dispatches every
    /// queued message and runs due scheduled callbacks.
    pub fn tick(&mut self, delta_time: f64) -> NetworkEvents {
        let mut events = NetworkEvents::new();
        self.time.advance(delta_time);

        for client_id in self.manager.maintain_connection(&mut events) {
            self.run_connect_callbacks(client_id);
        }

        for (sender, payload) in self.manager.receive_messages() {
            self.process_message(sender, &payload, &mut events);
        }

        for callback in self.scheduler.take_due(self.time.run_time) {
            callback(self);
        }

        for error in self.pending_errors.drain(..) {
            events.push_error(error);
        }
        events
    }

    // Accessors

    pub fn host_type(&self) -> HostType {
        self.manager.host_type()
    }

    pub fn is_server(&self) -> bool {
        self.host_type().is_server()
    }

    /// `SERVER_ID` on a server. `None` on a client until the server has
    /// assigned an id.
    pub fn client_id(&self) -> Option<ClientId> {
        self.manager.client_id()
    }

    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    /// Connected clients on a server, `[SERVER_ID]` on a connected client.
    pub fn peers(&self) -> Vec<ClientId> {
        self.manager.peers()
    }

    pub fn time(&self) -> &GameTime {
        &self.time
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ObjectRegistry {
        &mut self.registry
    }

    // Lifecycle

    /// Registers a callback run inside `tick`. On a client it fires once with
    /// the assigned id; on a server it fires for every accepted client.
    pub fn on_connect(&mut self, callback: impl FnMut(&mut NetworkContext, ClientId) + 'static) {
        self.connect_callbacks.push(Box::new(callback));
    }

    pub fn on_object_registered(&mut self, object: NetworkObject) -> Result<NetId, RegistryError> {
        let identifier = self.registry.register(&object)?;
        debug!("Registered {} {}", object.kind(), identifier);
        Ok(identifier)
    }

    /// Returns whether an entry was removed. An identifier that has since
    /// been taken by another object keeps that object registered.
    pub fn on_object_destroyed(&mut self, identifier: NetId, object: NetworkObject) -> bool {
        let removed = self.registry.unregister(identifier, &object);
        if removed {
            debug!("Unregistered {} {}", object.kind(), identifier);
        } else {
            trace!("{} {} was no longer registered", object.kind(), identifier);
        }
        removed
    }

    /// Runs `callback` on the first tick at least `delay` seconds from now.
    pub fn schedule(
        &mut self,
        delay: f64,
        callback: impl FnOnce(&mut NetworkContext) + 'static,
    ) -> TaskId {
        self.scheduler.add(self.time.run_time, delay, callback)
    }

    pub fn cancel_scheduled(&mut self, task: TaskId) -> bool {
        self.scheduler.cancel(task)
    }

    /// Sends `"close"` to the other side and shuts the transport down.
    /// Also happens when the context is dropped.
    pub fn close(&mut self) {
        self.manager.close();
    }

    // Static RPCs

    pub fn register_static_rpc<A, F>(&mut self, name: &str, descriptor: RpcDescriptor, handler: F)
    where
        A: DeserializeOwned + 'static,
        F: Fn(&mut StaticCall<'_>, A) -> Result<(), RpcError> + 'static,
    {
        let handler: StaticRpcHandler = Rc::new(move |call: &mut StaticCall<'_>, args: &Args| {
            let args: A = args.decode()?;
            handler(call, args)
        });
        self.registry
            .static_rpcs()
            .insert(name, StaticRpcEntry { descriptor, handler });
    }

    /// Invokes a static RPC from game code, routed by its descriptor.
    pub fn call_static<A: Serialize>(&mut self, name: &str, args: A) -> Result<(), RpcError> {
        let args = Args::encode(&args)?;
        self.invoke_static(name, args, SERVER_ID)
    }

    /// Server only: sends a static RPC to exactly one client, bypassing the
    /// descriptor's normal routing.
    pub fn call_rpc_on_client<A: Serialize>(
        &mut self,
        client_id: ClientId,
        name: &str,
        args: A,
    ) -> Result<(), RpcError> {
        if !self.is_server() {
            return Err(RpcError::ServerOnly {
                operation: "call_rpc_on_client",
            });
        }
        let entry = self.static_entry(name)?;
        let packet = Packet::rpc(STATIC_IDENTIFIER, name, Args::encode(&args)?);
        self.route_packet(
            Recipients::Client(client_id),
            &packet,
            entry.descriptor.delivery,
        );
        Ok(())
    }

    pub(crate) fn invoke_static(
        &mut self,
        name: &str,
        args: Args,
        nested_sender: ClientId,
    ) -> Result<(), RpcError> {
        let entry = self.static_entry(name)?;
        let flag = self.registry.static_rpcs().flag();

        if flag.get() {
            return self.run_static(&entry, &args, nested_sender);
        }

        let descriptor = entry.descriptor;
        let plan = plan_local_call(self.host_type(), descriptor.send_to, SERVER_ID);
        let packet = Packet::rpc(STATIC_IDENTIFIER, name, args.clone());
        self.route_packet(plan.recipients, &packet, descriptor.delivery);

        match plan.execution {
            LocalExecution::Skip => Ok(()),
            LocalExecution::Direct => self.run_static(&entry, &args, SERVER_ID),
            LocalExecution::AsInbound => {
                let _guard = ExecutionGuard::enter(&flag);
                self.run_static(&entry, &args, SERVER_ID)
            }
        }
    }

    fn static_entry(&mut self, name: &str) -> Result<StaticRpcEntry, RpcError> {
        self.registry
            .static_rpcs()
            .entry(name)
            .ok_or_else(|| RpcError::UnknownMethod {
                identifier: STATIC_IDENTIFIER,
                method: name.to_string(),
            })
    }

    fn run_static(
        &mut self,
        entry: &StaticRpcEntry,
        args: &Args,
        sender: ClientId,
    ) -> Result<(), RpcError> {
        let mut call = StaticCall { ctx: self, sender };
        (entry.handler)(&mut call, args)
    }

    // Routing

    /// Encodes `packet` once and hands it to the manager. Failures are
    /// logged and reported on the next tick's events.
    pub(crate) fn route_packet(
        &mut self,
        recipients: Recipients,
        packet: &Packet,
        delivery: DeliveryMode,
    ) {
        if recipients == Recipients::Nobody {
            return;
        }

        let payload = match packet.encode() {
            Ok(payload) => payload,
            Err(error) => {
                warn!("Dropping packet for object {}: {}", packet.target(), error);
                return;
            }
        };

        trace!(
            "Routing packet for object {} to {:?} ({:?})",
            packet.target(),
            recipients,
            delivery
        );
        let result = match recipients {
            Recipients::Nobody => Ok(()),
            Recipients::Server => self.manager.send_to_server(&payload, delivery),
            Recipients::AllClients => self.manager.broadcast(&payload, delivery),
            Recipients::AllClientsExcept(except) => {
                self.manager.broadcast_except(except, &payload, delivery)
            }
            Recipients::Client(client_id) => {
                self.manager.send_to_client(client_id, &payload, delivery)
            }
        };

        if let Err(error) = result {
            warn!("Send to {:?} failed: {}", recipients, error);
            self.pending_errors.push(error.into());
        }
    }

    // Inbound

    fn run_connect_callbacks(&mut self, client_id: ClientId) {
        let mut callbacks = mem::take(&mut self.connect_callbacks);
        for callback in callbacks.iter_mut() {
            callback(self, client_id);
        }
        let added = mem::replace(&mut self.connect_callbacks, callbacks);
        self.connect_callbacks.extend(added);
    }

    fn process_message(&mut self, sender: ClientId, payload: &[u8], events: &mut NetworkEvents) {
        let result = match WireMessage::decode(payload) {
            Err(error) => Err(DispatchError::MalformedPacket {
                sender,
                reason: error.to_string(),
            }),
            Ok(WireMessage::Close) => {
                self.manager.handle_close(sender, events);
                Ok(())
            }
            Ok(WireMessage::AssignId(_))
            | Ok(WireMessage::Handshake(_))
            | Ok(WireMessage::DatagramKey(_)) => {
                trace!("Ignoring connection message from {} on the game thread", sender);
                Ok(())
            }
            Ok(WireMessage::Packet(Packet::Rpc {
                target,
                method,
                args,
            })) => self.dispatch_rpc(sender, target, &method, args),
            Ok(WireMessage::Packet(Packet::Var { target, op, args })) => {
                self.dispatch_var(sender, target, op, args)
            }
        };

        if let Err(error) = result {
            warn!("{}", error);
            self.pending_errors.push(error.into());
        }
    }

    fn dispatch_rpc(
        &mut self,
        sender: ClientId,
        target: NetId,
        method: &str,
        args: Args,
    ) -> Result<(), DispatchError> {
        if target == STATIC_IDENTIFIER {
            return self.dispatch_static(sender, method, args);
        }

        let object = self
            .registry
            .component(target)
            .ok_or(DispatchError::UnknownTarget { sender, target })?;

        let (owner, descriptor) = {
            let object = object
                .try_borrow()
                .map_err(|_| DispatchError::TargetBusy { target })?;
            (object.owner(), object.descriptor(method))
        };
        let descriptor = descriptor.ok_or_else(|| DispatchError::UnknownMethod {
            sender,
            target,
            method: method.to_string(),
        })?;

        if self.is_server() && descriptor.require_owner && sender != owner {
            return Err(DispatchError::OwnershipViolation {
                sender,
                target,
                owner,
            });
        }

        {
            let mut object = object
                .try_borrow_mut()
                .map_err(|_| DispatchError::TargetBusy { target })?;
            object
                .execute(self, method, &args, sender)
                .map_err(|error| DispatchError::from_rpc(sender, target, method, error))?;
        }

        if self.is_server() {
            let recipients = plan_relay(descriptor.send_to, owner, sender);
            let packet = Packet::rpc(target, method, args);
            self.route_packet(recipients, &packet, descriptor.delivery);
        }
        Ok(())
    }

    fn dispatch_static(
        &mut self,
        sender: ClientId,
        method: &str,
        args: Args,
    ) -> Result<(), DispatchError> {
        let statics = self.registry.static_rpcs();
        let entry = statics
            .entry(method)
            .ok_or_else(|| DispatchError::UnknownMethod {
                sender,
                target: STATIC_IDENTIFIER,
                method: method.to_string(),
            })?;
        let flag = statics.flag();
        let owner = statics.owner();
        let descriptor = entry.descriptor;

        if self.is_server() && descriptor.require_owner && sender != owner {
            return Err(DispatchError::OwnershipViolation {
                sender,
                target: STATIC_IDENTIFIER,
                owner,
            });
        }

        {
            let _guard = ExecutionGuard::enter(&flag);
            self.run_static(&entry, &args, sender).map_err(|error| {
                DispatchError::from_rpc(sender, STATIC_IDENTIFIER, method, error)
            })?;
        }

        if self.is_server() {
            let recipients = plan_relay(descriptor.send_to, owner, sender);
            let packet = Packet::rpc(STATIC_IDENTIFIER, method, args);
            self.route_packet(recipients, &packet, descriptor.delivery);
        }
        Ok(())
    }

    fn dispatch_var(
        &mut self,
        sender: ClientId,
        target: NetId,
        op: VarOp,
        args: Args,
    ) -> Result<(), DispatchError> {
        let slot = self
            .registry
            .variable(target)
            .ok_or(DispatchError::UnknownTarget { sender, target })?;

        match op {
            VarOp::Set => {
                if self.is_server() {
                    let (owner, require_owner) = {
                        let slot = slot
                            .try_borrow()
                            .map_err(|_| DispatchError::TargetBusy { target })?;
                        (slot.owner(), slot.require_owner())
                    };
                    if require_owner && sender != owner {
                        if self.config.rollback_rejected_writes {
                            self.send_current_value(sender, target)?;
                        }
                        return Err(DispatchError::OwnershipViolation {
                            sender,
                            target,
                            owner,
                        });
                    }
                }

                let changed = slot
                    .try_borrow_mut()
                    .map_err(|_| DispatchError::TargetBusy { target })?
                    .apply(&args)
                    .map_err(|error| DispatchError::MalformedPacket {
                        sender,
                        reason: error.to_string(),
                    })?;

                if self.is_server() && changed {
                    let packet = Packet::var(target, VarOp::Set, args);
                    self.route_packet(
                        Recipients::AllClientsExcept(sender),
                        &packet,
                        DeliveryMode::Reliable,
                    );
                }
                Ok(())
            }
            VarOp::Get => {
                if !self.is_server() {
                    trace!("Ignoring GET for variable {} on a client", target);
                    return Ok(());
                }
                self.send_current_value(sender, target)
            }
        }
    }

    /// Answers `client_id` with a SET carrying the server's value.
    fn send_current_value(&mut self, client_id: ClientId, target: NetId) -> Result<(), DispatchError> {
        let slot = self
            .registry
            .variable(target)
            .ok_or(DispatchError::UnknownTarget {
                sender: client_id,
                target,
            })?;
        let current = slot
            .try_borrow()
            .map_err(|_| DispatchError::TargetBusy { target })?
            .current_args()
            .map_err(|error| DispatchError::Handler {
                target,
                method: "get".to_string(),
                reason: error.to_string(),
            })?;

        let packet = Packet::var(target, VarOp::Set, current);
        self.route_packet(
            Recipients::Client(client_id),
            &packet,
            DeliveryMode::Reliable,
        );
        Ok(())
    }
}
