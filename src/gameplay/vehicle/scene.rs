use super::rig::{collision_group, collision_mask};
use super::*;
use crate::config::ArenaBoxConfig;
use bevy::math::primitives::Cuboid;

/// Static box the vehicle drives on or into.
#[derive(Component)]
pub(super) struct ArenaBlock;

#[derive(Component)]
pub(super) struct ArenaLight;

/// Scene handle of a vehicle's model, kept on the vehicle root to watch its load state.
#[derive(Component, Debug, Clone)]
pub(super) struct VehicleModelHandle(pub(super) Handle<Scene>);

pub(super) fn spawn_vehicle_scene(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    config: Res<GameConfig>,
    asset_registry: Option<Res<AssetRegistry>>,
    existing_player: Query<Entity, With<PlayerVehicle>>,
    existing_arena: Query<Entity, With<ArenaBlock>>,
) {
    if existing_arena.is_empty() {
        commands.spawn((
            Name::new("ArenaLight"),
            ArenaLight,
            DirectionalLight {
                shadows_enabled: true,
                illuminance: 8_000.0,
                ..default()
            },
            Transform::from_xyz(5.0, 12.0, 4.0).looking_at(Vec3::ZERO, Vec3::Y),
        ));

        let arena = &config.game.arena;
        let memberships = collision_group(arena.collision_group);
        let filters = collision_mask(&arena.collision_filter);
        spawn_arena_block(
            &mut commands,
            &mut meshes,
            &mut materials,
            "ArenaGround",
            &arena.ground,
            CollisionGroups::new(memberships, filters),
        );
        for obstacle in &arena.obstacles {
            spawn_arena_block(
                &mut commands,
                &mut meshes,
                &mut materials,
                "ArenaObstacle",
                obstacle,
                CollisionGroups::new(memberships, filters),
            );
        }
    }

    if !existing_player.is_empty() {
        return;
    }

    let Some(vehicle) = config.default_vehicle() else {
        error!(
            "Default vehicle `{}` is not configured; nothing to drive.",
            config.game.app.default_vehicle
        );
        return;
    };
    let Some(model) = config.model_assets_by_id.get(&vehicle.model_id) else {
        error!(
            "Vehicle `{}` references unknown model `{}`.",
            vehicle.id, vehicle.model_id
        );
        return;
    };

    let mut bundle = match VehicleControlBundle::from_config(vehicle, &model.parts) {
        Ok(bundle) => bundle,
        Err(error) => {
            error!("Vehicle `{}` cannot be spawned: {error}", vehicle.id);
            return;
        }
    };

    let model_handle = asset_registry
        .as_ref()
        .and_then(|registry| registry.model(&vehicle.model_id))
        .and_then(|entry| entry.handle.clone());
    if model_handle.is_none() {
        warn!(
            "Model `{}` for vehicle `{}` is unavailable; the rig will not assemble.",
            vehicle.model_id, vehicle.id
        );
        bundle.diagnostics.model_unavailable = true;
    }

    let vehicle_entity = commands
        .spawn((
            Name::new("PlayerVehicle"),
            PlayerVehicle,
            bundle,
            Transform::from_translation(Vec3::from_array(config.game.app.spawn_position)),
            Visibility::default(),
        ))
        .id();

    if let Some(handle) = model_handle {
        commands
            .entity(vehicle_entity)
            .insert(VehicleModelHandle(handle.clone()));
        commands.spawn((
            Name::new("PlayerVehicleModelScene"),
            SceneRoot(handle),
            Transform::default(),
            ChildOf(vehicle_entity),
        ));
    }

    info!(
        "Spawned vehicle `{}` with model `{}`.",
        vehicle.id, vehicle.model_id
    );
}

fn spawn_arena_block(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    name: &'static str,
    block: &ArenaBoxConfig,
    groups: CollisionGroups,
) {
    let [hx, hy, hz] = block.half_extents;
    let [r, g, b] = block.color;
    commands.spawn((
        Name::new(name),
        ArenaBlock,
        Mesh3d(meshes.add(Cuboid::new(hx * 2.0, hy * 2.0, hz * 2.0))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(r, g, b),
            perceptual_roughness: 0.9,
            ..default()
        })),
        Transform::from_translation(Vec3::from_array(block.position)),
        RigidBody::Fixed,
        Collider::cuboid(hx, hy, hz),
        Restitution::coefficient(0.0),
        groups,
    ));
}

pub(super) fn track_vehicle_model_loads(
    asset_server: Res<AssetServer>,
    mut vehicle_query: Query<(
        &Vehicle,
        &VehicleModelHandle,
        &RigState,
        &mut RigDiagnostics,
    )>,
) {
    for (vehicle, model, state, mut diagnostics) in &mut vehicle_query {
        let load_failed = asset_server.load_state(model.0.id()).is_failed();
        if flag_failed_model_load(state, &mut diagnostics, load_failed) {
            error!(
                "Model scene for vehicle `{}` failed to load; the rig will not assemble.",
                vehicle.config_id
            );
        }
    }
}

/// Returns true when this call marked the model unavailable.
fn flag_failed_model_load(
    state: &RigState,
    diagnostics: &mut RigDiagnostics,
    load_failed: bool,
) -> bool {
    if !load_failed || diagnostics.model_unavailable || *state != RigState::Unbuilt {
        return false;
    }
    diagnostics.model_unavailable = true;
    true
}

pub(super) fn cleanup_vehicle_scene(
    mut commands: Commands,
    vehicle_query: Query<(Entity, &Vehicle)>,
    arena_query: Query<Entity, Or<(With<ArenaBlock>, With<ArenaLight>)>>,
) {
    for (entity, vehicle) in &vehicle_query {
        info!("Despawning vehicle `{}` and its rig.", vehicle.config_id);
        commands.entity(entity).try_despawn();
    }
    for entity in &arena_query {
        commands.entity(entity).try_despawn();
    }
}
