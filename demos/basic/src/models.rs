/// Handling and durability of one ship model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShipConfig {
    pub max_speed: f64,
    pub acceleration: f64,
    pub deceleration: f64,
    pub shot_cooldown: f64,
    pub damage: i64,
    pub life: i64,
}

const fn config(
    max_speed: f64,
    acceleration: f64,
    deceleration: f64,
    shot_cooldown: f64,
    damage: i64,
    life: i64,
) -> ShipConfig {
    ShipConfig {
        max_speed,
        acceleration,
        deceleration,
        shot_cooldown,
        damage,
        life,
    }
}

pub const MODELS: [(&str, ShipConfig); 9] = [
    ("CamoStellarJet.vox", config(1100.0, 90.0, 70.0, 0.8, 3, 12)),
    ("DualStriker.vox", config(850.0, 60.0, 45.0, 0.3, 2, 20)),
    ("InfraredFurtive.vox", config(1000.0, 100.0, 80.0, 1.2, 2, 10)),
    ("MeteorSlicer.vox", config(700.0, 50.0, 40.0, 0.6, 4, 17)),
    ("MicroRecon.vox", config(1200.0, 120.0, 100.0, 2.0, 1, 2)),
    ("RedFighter.vox", config(950.0, 75.0, 55.0, 0.4, 3, 15)),
    ("Transtellar.vox", config(600.0, 40.0, 30.0, 1.0, 4, 25)),
    ("UltravioletIntruder.vox", config(1000.0, 110.0, 90.0, 0.9, 2, 11)),
    ("Warship.vox", config(500.0, 20.0, 15.0, 0.2, 5, 40)),
];

/// Width and height of the square play area, centered on the origin.
pub const WORLD_SIZE: f64 = 4000.0;

pub fn ship_config(model: &str) -> Option<ShipConfig> {
    MODELS
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, config)| *config)
}
