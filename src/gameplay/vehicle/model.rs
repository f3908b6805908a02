use super::*;
use bevy::mesh::VertexAttributeValues;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Scene node names of the five parts the rig wraps.
#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct VehiclePartNames {
    pub chassis: String,
    pub wheels: WheelSet<String>,
}

impl VehiclePartNames {
    pub fn from_config(parts: &ModelPartsConfig) -> Self {
        Self {
            chassis: parts.chassis.clone(),
            wheels: WheelSet {
                back_left: parts.back_left.clone(),
                back_right: parts.back_right.clone(),
                front_left: parts.front_left.clone(),
                front_right: parts.front_right.clone(),
            },
        }
    }
}

/// Scene entities matched for every named part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VehicleParts {
    pub chassis: Entity,
    pub wheels: WheelSet<Entity>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartLookupError {
    pub missing: Vec<String>,
}

impl Display for PartLookupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "model is missing parts: {}", self.missing.join(", "))
    }
}

impl Error for PartLookupError {}

pub(super) type SceneNodeQuery<'w, 's> = Query<
    'w,
    's,
    (
        Option<&'static Name>,
        Option<&'static Mesh3d>,
        Option<&'static Transform>,
    ),
>;

#[derive(Clone, Debug)]
pub(super) struct ModelSceneNodeSnapshot {
    pub(super) entity: Entity,
    pub(super) name: Option<String>,
    pub(super) local_transform: Option<Transform>,
}

pub(super) fn snapshot_nodes(
    entities: &[Entity],
    node_query: &SceneNodeQuery,
) -> Vec<ModelSceneNodeSnapshot> {
    entities
        .iter()
        .filter_map(|entity| {
            let (name, _, local_transform) = node_query.get(*entity).ok()?;
            Some(ModelSceneNodeSnapshot {
                entity: *entity,
                name: Some(name?.as_str().to_string()),
                local_transform: local_transform.copied(),
            })
        })
        .collect()
}

pub(super) fn collect_descendants(
    root: Entity,
    children_query: &Query<&Children>,
    out: &mut Vec<Entity>,
) {
    let mut stack = vec![root];
    while let Some(entity) = stack.pop() {
        let Ok(children) = children_query.get(entity) else {
            continue;
        };
        for child in children.iter() {
            out.push(child);
            stack.push(child);
        }
    }
}

pub(super) fn find_named_node<'a>(
    snapshots: &'a [ModelSceneNodeSnapshot],
    expected_name: &str,
) -> Option<&'a ModelSceneNodeSnapshot> {
    snapshots.iter().find(|node| {
        node.name
            .as_deref()
            .map(|name| model_node_name_matches(name, expected_name))
            .unwrap_or(false)
    })
}

// glTF primitives are spawned as `<node>.<index>` children.
fn model_node_name_matches(actual: &str, expected: &str) -> bool {
    actual == expected || actual.starts_with(format!("{expected}.").as_str())
}

/// Matches every part or none of them.
pub(super) fn resolve_parts(
    snapshots: &[ModelSceneNodeSnapshot],
    names: &VehiclePartNames,
) -> Result<VehicleParts, PartLookupError> {
    let mut missing = Vec::new();
    let mut lookup = |name: &str| {
        let found = find_named_node(snapshots, name).map(|node| node.entity);
        if found.is_none() {
            missing.push(name.to_string());
        }
        found
    };

    let chassis = lookup(&names.chassis);
    let back_left = lookup(&names.wheels.back_left);
    let back_right = lookup(&names.wheels.back_right);
    let front_left = lookup(&names.wheels.front_left);
    let front_right = lookup(&names.wheels.front_right);

    match (chassis, back_left, back_right, front_left, front_right) {
        (
            Some(chassis),
            Some(back_left),
            Some(back_right),
            Some(front_left),
            Some(front_right),
        ) => Ok(VehicleParts {
            chassis,
            wheels: WheelSet {
                back_left,
                back_right,
                front_left,
                front_right,
            },
        }),
        _ => Err(PartLookupError { missing }),
    }
}

/// Vertex positions of a part and every mesh below it, expressed in `part_transform`'s parent space.
pub(super) fn collect_part_points(
    part: Entity,
    part_transform: Transform,
    children_query: &Query<&Children>,
    node_query: &SceneNodeQuery,
    meshes: &Assets<Mesh>,
) -> Vec<Vec3> {
    let mut points = Vec::new();
    let mut stack = vec![(part, part_transform)];
    while let Some((entity, to_parent)) = stack.pop() {
        if let Ok((_, Some(mesh), _)) = node_query.get(entity) {
            if let Some(positions) = meshes.get(&mesh.0).and_then(mesh_positions) {
                points.extend(
                    positions
                        .into_iter()
                        .map(|point| to_parent.transform_point(point)),
                );
            }
        }

        let Ok(children) = children_query.get(entity) else {
            continue;
        };
        for child in children.iter() {
            let local = node_query
                .get(child)
                .ok()
                .and_then(|(_, _, transform)| transform.copied())
                .unwrap_or_default();
            stack.push((child, to_parent * local));
        }
    }
    points
}

fn mesh_positions(mesh: &Mesh) -> Option<Vec<Vec3>> {
    match mesh.attribute(Mesh::ATTRIBUTE_POSITION)? {
        VertexAttributeValues::Float32x3(values) => Some(
            values
                .iter()
                .map(|[x, y, z]| Vec3::new(*x, *y, *z))
                .collect(),
        ),
        VertexAttributeValues::Float32x4(values) => Some(
            values
                .iter()
                .map(|[x, y, z, _w]| Vec3::new(*x, *y, *z))
                .collect(),
        ),
        _ => None,
    }
}

pub(super) fn points_bounds(points: &[Vec3]) -> Option<(Vec3, Vec3)> {
    let mut min = Vec3::splat(f32::INFINITY);
    let mut max = Vec3::splat(f32::NEG_INFINITY);
    for point in points {
        min = min.min(*point);
        max = max.max(*point);
    }

    if min.is_finite() && max.is_finite() {
        Some((min, max))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshots(world: &mut World, names: &[&str]) -> Vec<ModelSceneNodeSnapshot> {
        names
            .iter()
            .map(|name| ModelSceneNodeSnapshot {
                entity: world.spawn_empty().id(),
                name: Some(name.to_string()),
                local_transform: None,
            })
            .collect()
    }

    fn sedan_names() -> VehiclePartNames {
        VehiclePartNames {
            chassis: "body".to_string(),
            wheels: WheelSet {
                back_left: "wheel_backLeft".to_string(),
                back_right: "wheel_backRight".to_string(),
                front_left: "wheel_frontLeft".to_string(),
                front_right: "wheel_frontRight".to_string(),
            },
        }
    }

    #[test]
    fn node_names_match_exactly_or_by_primitive_suffix() {
        assert!(model_node_name_matches("body", "body"));
        assert!(model_node_name_matches("body.001", "body"));
        assert!(!model_node_name_matches("bodywork", "body"));
    }

    #[test]
    fn resolves_all_five_parts() {
        let mut world = World::new();
        let snapshots = snapshots(
            &mut world,
            &[
                "body",
                "wheel_backLeft",
                "wheel_backRight",
                "wheel_frontLeft.001",
                "wheel_frontRight",
            ],
        );

        let parts = resolve_parts(&snapshots, &sedan_names()).expect("all parts present");
        assert_eq!(parts.chassis, snapshots[0].entity);
        assert_eq!(parts.wheels.front_right, snapshots[4].entity);
    }

    #[test]
    fn reports_every_missing_part() {
        let mut world = World::new();
        let snapshots = snapshots(&mut world, &["body", "wheel_backLeft"]);

        let error = resolve_parts(&snapshots, &sedan_names()).expect_err("parts missing");
        assert_eq!(
            error.missing,
            ["wheel_backRight", "wheel_frontLeft", "wheel_frontRight"]
        );
        assert!(error.to_string().contains("wheel_frontLeft"));
    }

    #[test]
    fn bounds_of_empty_point_set_is_none() {
        assert_eq!(points_bounds(&[]), None);
        assert_eq!(
            points_bounds(&[Vec3::new(1.0, -2.0, 0.5), Vec3::new(-1.0, 2.0, 0.0)]),
            Some((Vec3::new(-1.0, -2.0, 0.0), Vec3::new(1.0, 2.0, 0.5)))
        );
    }
}
