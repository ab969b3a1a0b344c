use std::rc::Rc;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::{
    context::NetworkContext,
    registry::{ObjectKind, RegistryError},
    rpc::{
        component::{ComponentHandle, WeakComponentHandle},
        error::RpcError,
        rpc_table::RpcTable,
        RpcDescriptor, SendTo,
    },
    types::{ClientId, NetId},
};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub angle: f64,
    pub scale: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            angle: 0.0,
            scale: 1.0,
        }
    }
}

/// Which fields are replicated, and how often the owner sends them.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Seconds between two syncs
    pub sync_frequency: f64,
    pub sync_x: bool,
    pub sync_y: bool,
    pub sync_z: bool,
    pub sync_angle: bool,
    pub sync_scale: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            sync_frequency: 0.015,
            sync_x: true,
            sync_y: true,
            sync_z: false,
            sync_angle: false,
            sync_scale: false,
        }
    }
}

pub struct TransformState {
    pub transform: Transform,
    pub settings: SyncSettings,
}

impl TransformState {
    pub fn new(settings: SyncSettings) -> Self {
        Self {
            transform: Transform::default(),
            settings,
        }
    }

    /// The enabled fields, in x, y, z, angle, scale order.
    pub fn serialize(&self) -> Vec<f64> {
        let mut data = Vec::with_capacity(5);
        for (field, enabled) in self.fields() {
            if enabled {
                data.push(field);
            }
        }
        data
    }

    pub fn apply(&mut self, data: &[f64]) -> Result<(), RpcError> {
        let expected = self.fields().iter().filter(|(_, enabled)| *enabled).count();
        if data.len() != expected {
            return Err(RpcError::handler(format!(
                "expected {} transform fields, got {}",
                expected,
                data.len()
            )));
        }

        let settings = self.settings;
        let mut values = data.iter().copied();
        let transform = &mut self.transform;
        let targets = [
            (&mut transform.x, settings.sync_x),
            (&mut transform.y, settings.sync_y),
            (&mut transform.z, settings.sync_z),
            (&mut transform.angle, settings.sync_angle),
            (&mut transform.scale, settings.sync_scale),
        ];
        for (field, enabled) in targets {
            if enabled {
                if let Some(value) = values.next() {
                    *field = value;
                }
            }
        }
        Ok(())
    }

    fn fields(&self) -> [(f64, bool); 5] {
        let t = &self.transform;
        let s = &self.settings;
        [
            (t.x, s.sync_x),
            (t.y, s.sync_y),
            (t.z, s.sync_z),
            (t.angle, s.sync_angle),
            (t.scale, s.sync_scale),
        ]
    }
}

thread_local! {
    static TRANSFORM_RPCS: Rc<RpcTable<TransformState>> = RpcTable::<TransformState>::new()
        .rpc(
            NetworkTransform::SYNC_TRANSFORM,
            RpcDescriptor::new(SendTo::NotMe).unreliable(),
            |call, (data,): (Vec<f64>,)| call.state_mut().apply(&data),
        )
        .build();
}

/// Replicates a transform from its owner to every other peer.
#[derive(Clone)]
pub struct NetworkTransform {
    handle: ComponentHandle<TransformState>,
}

impl NetworkTransform {
    pub const SYNC_TRANSFORM: &'static str = "sync_transform";

    pub fn rpc_table() -> Rc<RpcTable<TransformState>> {
        TRANSFORM_RPCS.with(Rc::clone)
    }

    pub fn spawn(
        ctx: &mut NetworkContext,
        identifier: NetId,
        owner: ClientId,
        settings: SyncSettings,
    ) -> Result<Self, RegistryError> {
        let handle = ComponentHandle::spawn(
            ctx,
            identifier,
            owner,
            Self::rpc_table(),
            TransformState::new(settings),
        )?;
        Ok(Self { handle })
    }

    pub fn handle(&self) -> &ComponentHandle<TransformState> {
        &self.handle
    }

    pub fn identifier(&self) -> NetId {
        self.handle.identifier()
    }

    pub fn owner(&self) -> ClientId {
        self.handle.owner()
    }

    pub fn transform(&self) -> Result<Transform, RpcError> {
        self.handle.with_state(|state| state.transform)
    }

    pub fn set_transform(&self, transform: Transform) -> Result<(), RpcError> {
        self.handle
            .with_state_mut(|state| state.transform = transform)
    }

    /// Sends the enabled fields once.
    pub fn sync(&self, ctx: &mut NetworkContext) -> Result<(), RpcError> {
        sync_handle(&self.handle, ctx)
    }

    /// On the owning peer, starts syncing every `sync_frequency` seconds
    /// until the component is destroyed. Returns false on other peers.
    pub fn start_sync(&self, ctx: &mut NetworkContext) -> bool {
        if ctx.client_id() != Some(self.owner()) {
            return false;
        }
        let frequency = match self.handle.with_state(|state| state.settings.sync_frequency) {
            Ok(frequency) => frequency,
            Err(_) => return false,
        };
        schedule_sync(ctx, self.handle.downgrade(), frequency);
        true
    }

    pub fn destroy(self, ctx: &mut NetworkContext) {
        self.handle.destroy(ctx);
    }
}

fn sync_handle(
    handle: &ComponentHandle<TransformState>,
    ctx: &mut NetworkContext,
) -> Result<(), RpcError> {
    let data = handle.with_state(TransformState::serialize)?;
    handle.call(ctx, NetworkTransform::SYNC_TRANSFORM, (data,))
}

fn schedule_sync(
    ctx: &mut NetworkContext,
    weak: WeakComponentHandle<TransformState>,
    frequency: f64,
) {
    ctx.schedule(frequency, move |ctx| {
        let handle = match weak.upgrade() {
            Some(handle) => handle,
            None => return,
        };
        if !ctx
            .registry()
            .contains(ObjectKind::Component, handle.identifier())
        {
            return;
        }
        if let Err(error) = sync_handle(&handle, ctx) {
            warn!("Transform {} failed to sync: {}", handle.identifier(), error);
        }
        schedule_sync(ctx, weak, frequency);
    });
}
