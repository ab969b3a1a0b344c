mod network_transform;

pub use network_transform::{NetworkTransform, SyncSettings, Transform, TransformState};
