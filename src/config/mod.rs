use bevy::prelude::*;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_DIR: &str = "config";

pub const MIN_GEAR: i8 = -1;
pub const MAX_GEAR: i8 = 5;

pub struct ConfigPlugin;

impl Plugin for ConfigPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, load_game_config).add_systems(
            Update,
            (reload_game_config_hotkey, sync_fixed_timestep_from_config).chain(),
        );
    }
}

fn load_game_config(mut commands: Commands) {
    let config = GameConfig::load_from_dir(Path::new(CONFIG_DIR)).unwrap_or_else(|error| {
        panic!("failed to load configuration from `{CONFIG_DIR}`: {error}");
    });

    log_config_summary("Loaded", &config);
    info!("Press F5 to hot-reload config files from `{CONFIG_DIR}`.");

    commands.insert_resource(Time::<Fixed>::from_hz(config.game.app.fixed_timestep_hz));
    commands.insert_resource(config);
}

fn reload_game_config_hotkey(
    keyboard: Res<ButtonInput<KeyCode>>,
    game_config: Option<ResMut<GameConfig>>,
) {
    if !keyboard.just_pressed(KeyCode::F5) {
        return;
    }

    let Some(mut current_config) = game_config else {
        warn!("Config hot-reload requested, but `GameConfig` resource is not initialized yet.");
        return;
    };

    match GameConfig::load_from_dir(Path::new(CONFIG_DIR)) {
        Ok(new_config) => {
            *current_config = new_config;
            log_config_summary("Hot-reloaded", &current_config);
        }
        Err(error) => {
            error!("Config hot-reload failed; keeping previous config: {error}");
        }
    }
}

fn sync_fixed_timestep_from_config(
    config: Option<Res<GameConfig>>,
    mut fixed_time: ResMut<Time<Fixed>>,
) {
    let Some(config) = config else {
        return;
    };
    if !config.is_changed() {
        return;
    }

    let hz = config.game.app.fixed_timestep_hz;
    let timestep = Duration::from_secs_f64(1.0 / hz);
    if fixed_time.timestep() != timestep {
        fixed_time.set_timestep(timestep);
        info!("Fixed timestep set to {hz} Hz.");
    }
}

fn log_config_summary(prefix: &str, config: &GameConfig) {
    info!(
        "{prefix} config: {} vehicles, {} models, {} arena obstacles, default vehicle `{}`.",
        config.vehicles_by_id.len(),
        config.model_assets_by_id.len(),
        config.game.arena.obstacles.len(),
        config.game.app.default_vehicle
    );
}

#[derive(Resource, Debug, Clone)]
pub struct GameConfig {
    pub game: GameFile,
    pub assets: AssetsFile,
    pub vehicles: VehiclesFile,
    pub vehicles_by_id: HashMap<String, VehicleConfig>,
    pub model_assets_by_id: HashMap<String, ModelAssetConfig>,
}

impl GameConfig {
    pub fn load_from_dir(config_dir: &Path) -> Result<Self, ConfigError> {
        let game: GameFile = read_toml(&config_dir.join("game.toml"))?;
        let assets: AssetsFile = read_toml(&config_dir.join("assets.toml"))?;
        let vehicles: VehiclesFile = read_toml(&config_dir.join("vehicles.toml"))?;

        let config = Self {
            vehicles_by_id: to_index("vehicles.toml::vehicles", &vehicles.vehicles)?,
            model_assets_by_id: to_index("assets.toml::models", &assets.models)?,
            game,
            assets,
            vehicles,
        };

        config.validate_references()?;
        Ok(config)
    }

    pub fn default_vehicle(&self) -> Option<&VehicleConfig> {
        self.vehicles_by_id.get(&self.game.app.default_vehicle)
    }

    fn validate_references(&self) -> Result<(), ConfigError> {
        if self.game.app.fixed_timestep_hz <= 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::app.fixed_timestep_hz must be > 0".to_string(),
            ));
        }

        if !self
            .vehicles_by_id
            .contains_key(&self.game.app.default_vehicle)
        {
            return Err(ConfigError::Validation(format!(
                "game.toml::app.default_vehicle references unknown vehicle id `{}`",
                self.game.app.default_vehicle
            )));
        }

        let arena = &self.game.arena;
        validate_group_index("game.toml::arena.collision_group", arena.collision_group)?;
        for (index, group) in arena.collision_filter.iter().enumerate() {
            validate_group_index(
                &format!("game.toml::arena.collision_filter[{index}]"),
                *group,
            )?;
        }
        validate_half_extents("game.toml::arena.ground.half_extents", arena.ground.half_extents)?;
        for (index, obstacle) in arena.obstacles.iter().enumerate() {
            validate_half_extents(
                &format!("game.toml::arena.obstacles[{index}].half_extents"),
                obstacle.half_extents,
            )?;
        }

        for (index, vehicle) in self.vehicles.vehicles.iter().enumerate() {
            if !self.model_assets_by_id.contains_key(&vehicle.model_id) {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::vehicles[{index}].model_id references unknown model id `{}`",
                    vehicle.model_id
                )));
            }
            if !(MIN_GEAR..=MAX_GEAR).contains(&vehicle.gearbox.initial_gear) {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::vehicles[{index}].gearbox.initial_gear must be in [{MIN_GEAR}, {MAX_GEAR}]"
                )));
            }

            validate_gear_rows(index, &vehicle.drivetrain)?;

            if !vehicle.drivetrain.coast_stiffness.is_finite()
                || vehicle.drivetrain.coast_stiffness < 0.0
            {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::vehicles[{index}].drivetrain.coast_stiffness must be >= 0"
                )));
            }

            let steering = &vehicle.steering;
            if !(steering.max_angle_rad > 0.0 && steering.max_angle_rad < std::f32::consts::FRAC_PI_2)
            {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::vehicles[{index}].steering.max_angle_rad must be in (0, pi/2)"
                )));
            }
            if steering.stiffness < 0.0 || steering.damping < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::vehicles[{index}].steering stiffness and damping must be >= 0"
                )));
            }

            let rig = &vehicle.rig;
            if rig.chassis.mass <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::vehicles[{index}].rig.chassis.mass must be > 0"
                )));
            }
            validate_half_extents(
                &format!("vehicles.toml::vehicles[{index}].rig.chassis.fallback_half_extents"),
                rig.chassis.fallback_half_extents,
            )?;
            if rig.wheel.radius <= 0.0 || rig.wheel.half_height <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::vehicles[{index}].rig.wheel radius and half_height must be > 0"
                )));
            }
            if rig.axle.half_extent <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::vehicles[{index}].rig.axle.half_extent must be > 0"
                )));
            }
            if rig.chassis.friction < 0.0 || rig.wheel.friction < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::vehicles[{index}].rig friction coefficients must be >= 0"
                )));
            }

            let collision = &rig.collision;
            let label = format!("vehicles.toml::vehicles[{index}].rig.collision");
            validate_group_index(&format!("{label}.chassis_group"), collision.chassis_group)?;
            validate_group_index(&format!("{label}.wheel_group"), collision.wheel_group)?;
            validate_group_index(&format!("{label}.axle_group"), collision.axle_group)?;
            let distinct: HashSet<u8> = [
                collision.chassis_group,
                collision.wheel_group,
                collision.axle_group,
            ]
            .into_iter()
            .collect();
            if distinct.len() != 3 {
                return Err(ConfigError::Validation(format!(
                    "{label}: chassis, wheel and axle groups must be distinct"
                )));
            }
            for (mask_index, group) in collision.ground_mask.iter().enumerate() {
                validate_group_index(&format!("{label}.ground_mask[{mask_index}]"), *group)?;
                if distinct.contains(group) {
                    return Err(ConfigError::Validation(format!(
                        "{label}.ground_mask[{mask_index}] must not include the vehicle's own groups"
                    )));
                }
            }
        }

        for (index, model) in self.assets.models.iter().enumerate() {
            if model.scene_path.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "assets.toml::models[{index}].scene_path cannot be empty"
                )));
            }
            for (part, node) in model.parts.named() {
                if node.trim().is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "assets.toml::models[{index}].parts.{part} cannot be empty"
                    )));
                }
            }
        }

        Ok(())
    }
}

fn validate_gear_rows(index: usize, drivetrain: &DrivetrainConfig) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for (row_index, row) in drivetrain.gears.iter().enumerate() {
        let label = format!("vehicles.toml::vehicles[{index}].drivetrain.gears[{row_index}]");
        if !(MIN_GEAR..=MAX_GEAR).contains(&row.gear) {
            return Err(ConfigError::Validation(format!(
                "{label}.gear {} is outside [{MIN_GEAR}, {MAX_GEAR}]",
                row.gear
            )));
        }
        if !seen.insert(row.gear) {
            return Err(ConfigError::Validation(format!(
                "{label} duplicates gear {}",
                row.gear
            )));
        }
        if !row.forward_velocity.is_finite()
            || !row.forward_stiffness.is_finite()
            || !row.brake_stiffness.is_finite()
        {
            return Err(ConfigError::Validation(format!(
                "{label} values must be finite"
            )));
        }
        if row.forward_stiffness < 0.0 || row.brake_stiffness < 0.0 {
            return Err(ConfigError::Validation(format!(
                "{label} stiffness values must be >= 0"
            )));
        }
    }

    for gear in MIN_GEAR..=MAX_GEAR {
        if !seen.contains(&gear) {
            return Err(ConfigError::Validation(format!(
                "vehicles.toml::vehicles[{index}].drivetrain.gears is missing gear {gear}"
            )));
        }
    }

    Ok(())
}

fn validate_group_index(label: &str, group: u8) -> Result<(), ConfigError> {
    if (1..=32).contains(&group) {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "{label} must be a collision group index in [1, 32], got {group}"
        )))
    }
}

fn validate_half_extents(label: &str, half_extents: [f32; 3]) -> Result<(), ConfigError> {
    if half_extents.iter().all(|value| *value > 0.0) {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "{label} components must all be > 0"
        )))
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: Box<toml::de::Error>,
    },
    Validation(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse `{}`: {source}", path.display())
            }
            Self::Validation(message) => write!(f, "{message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source: Box::new(source),
    })
}

fn to_index<T>(label: &str, rows: &[T]) -> Result<HashMap<String, T>, ConfigError>
where
    T: HasId + Clone,
{
    let mut map = HashMap::new();

    for row in rows {
        let id = row.id();
        if id.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{label} contains an empty id"
            )));
        }

        if map.insert(id.to_string(), row.clone()).is_some() {
            return Err(ConfigError::Validation(format!(
                "{label} contains duplicate id `{id}`"
            )));
        }
    }

    Ok(map)
}

trait HasId {
    fn id(&self) -> &str;
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameFile {
    pub app: AppConfig,
    pub physics: PhysicsConfig,
    pub camera: CameraConfig,
    pub arena: ArenaConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub fixed_timestep_hz: f64,
    pub default_vehicle: String,
    pub debug_overlay: bool,
    pub spawn_position: [f32; 3],
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhysicsConfig {
    pub gravity: [f32; 3],
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    pub follow_offset: [f32; 3],
    pub fov_degrees: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArenaConfig {
    pub collision_group: u8,
    pub collision_filter: Vec<u8>,
    pub ground: ArenaBoxConfig,
    #[serde(default)]
    pub obstacles: Vec<ArenaBoxConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArenaBoxConfig {
    pub position: [f32; 3],
    pub half_extents: [f32; 3],
    pub color: [f32; 3],
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehiclesFile {
    pub vehicles: Vec<VehicleConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehicleConfig {
    pub id: String,
    pub model_id: String,
    pub gearbox: GearboxConfig,
    pub drivetrain: DrivetrainConfig,
    pub steering: SteeringConfig,
    pub rig: RigConfig,
}

impl HasId for VehicleConfig {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GearboxConfig {
    pub shift_cooldown_ms: u64,
    #[serde(default)]
    pub initial_gear: i8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DrivetrainConfig {
    /// Stiffness applied when no pedal is held.
    pub coast_stiffness: f32,
    pub gears: Vec<GearRowConfig>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GearRowConfig {
    pub gear: i8,
    pub forward_velocity: f32,
    pub forward_stiffness: f32,
    /// Used for both the backward and the brake pedal.
    pub brake_stiffness: f32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SteeringConfig {
    pub max_angle_rad: f32,
    pub stiffness: f32,
    pub damping: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RigConfig {
    pub chassis: ChassisConfig,
    pub wheel: WheelConfig,
    pub axle: AxleConfig,
    pub slots: WheelSlotsConfig,
    pub collision: RigCollisionConfig,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ChassisConfig {
    pub mass: f32,
    pub friction: f32,
    pub visual_offset: [f32; 3],
    pub fallback_half_extents: [f32; 3],
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WheelConfig {
    pub radius: f32,
    pub half_height: f32,
    /// Outward offset of the tire collider along the spin axis.
    #[serde(default)]
    pub collider_offset: f32,
    pub friction: f32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AxleConfig {
    pub half_extent: f32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WheelSlotsConfig {
    pub back_left: [f32; 3],
    pub back_right: [f32; 3],
    pub front_left: [f32; 3],
    pub front_right: [f32; 3],
}

#[derive(Debug, Clone, Deserialize)]
pub struct RigCollisionConfig {
    pub chassis_group: u8,
    pub wheel_group: u8,
    pub axle_group: u8,
    pub ground_mask: Vec<u8>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AssetsFile {
    #[serde(default)]
    pub models: Vec<ModelAssetConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelAssetConfig {
    pub id: String,
    pub scene_path: String,
    pub parts: ModelPartsConfig,
}

impl HasId for ModelAssetConfig {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelPartsConfig {
    pub chassis: String,
    pub back_left: String,
    pub back_right: String,
    pub front_left: String,
    pub front_right: String,
}

impl ModelPartsConfig {
    pub fn named(&self) -> [(&'static str, &str); 5] {
        [
            ("chassis", self.chassis.as_str()),
            ("back_left", self.back_left.as_str()),
            ("back_right", self.back_right.as_str()),
            ("front_left", self.front_left.as_str()),
            ("front_right", self.front_right.as_str()),
        ]
    }
}
