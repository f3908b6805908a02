use super::gearbox::Gear;
use crate::config::DrivetrainConfig;
use bevy::prelude::*;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pedal {
    Forward,
    Backward,
    Brake,
    Neutral,
}

impl Pedal {
    /// Forward wins over backward, backward over brake.
    pub fn select(forward: bool, backward: bool, brake: bool) -> Self {
        if forward {
            Self::Forward
        } else if backward {
            Self::Backward
        } else if brake {
            Self::Brake
        } else {
            Self::Neutral
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
            Self::Brake => "brake",
            Self::Neutral => "coast",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveMotorTarget {
    pub target_velocity: f32,
    pub target_stiffness: f32,
}

impl DriveMotorTarget {
    pub const IDLE: Self = Self {
        target_velocity: 0.0,
        target_stiffness: 200.0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GearRow {
    pub forward_velocity: f32,
    pub forward_stiffness: f32,
    pub brake_stiffness: f32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingGearError {
    pub gear: i8,
}

impl Display for MissingGearError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "drivetrain table has no row for gear {}", self.gear)
    }
}

impl std::error::Error for MissingGearError {}

/// Gear → drive motor lookup shared by all four wheels.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct GearTable {
    rows: [GearRow; Gear::COUNT],
    coast_stiffness: f32,
}

impl GearTable {
    pub fn from_config(config: &DrivetrainConfig) -> Result<Self, MissingGearError> {
        let mut rows = [None; Gear::COUNT];
        for row in &config.gears {
            let Some(gear) = Gear::new(row.gear) else {
                continue;
            };
            rows[gear.table_index()] = Some(GearRow {
                forward_velocity: row.forward_velocity,
                forward_stiffness: row.forward_stiffness,
                brake_stiffness: row.brake_stiffness,
            });
        }

        let mut resolved = [GearRow {
            forward_velocity: 0.0,
            forward_stiffness: 0.0,
            brake_stiffness: 0.0,
        }; Gear::COUNT];
        for gear in Gear::all() {
            resolved[gear.table_index()] =
                rows[gear.table_index()].ok_or(MissingGearError { gear: gear.value() })?;
        }

        Ok(Self {
            rows: resolved,
            coast_stiffness: config.coast_stiffness,
        })
    }

    pub fn row(&self, gear: Gear) -> GearRow {
        self.rows[gear.table_index()]
    }

    pub fn command(&self, gear: Gear, pedal: Pedal) -> DriveMotorTarget {
        let row = self.row(gear);
        match pedal {
            Pedal::Forward => DriveMotorTarget {
                target_velocity: row.forward_velocity,
                target_stiffness: row.forward_stiffness,
            },
            Pedal::Backward | Pedal::Brake => DriveMotorTarget {
                target_velocity: 0.0,
                target_stiffness: row.brake_stiffness,
            },
            Pedal::Neutral => DriveMotorTarget {
                target_velocity: 0.0,
                target_stiffness: self.coast_stiffness,
            },
        }
    }
}

impl Default for GearTable {
    fn default() -> Self {
        let row = |forward_velocity, brake_stiffness| GearRow {
            forward_velocity,
            forward_stiffness: 2.0,
            brake_stiffness,
        };
        Self {
            rows: [
                row(-200.0, 200.0),
                row(0.0, 2.0),
                row(50.0, 200.0),
                row(100.0, 200.0),
                row(200.0, 200.0),
                row(350.0, 300.0),
                row(500.0, 400.0),
            ],
            coast_stiffness: 200.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sedan_vehicle_config;

    fn gear(value: i8) -> Gear {
        Gear::new(value).expect("gear in range")
    }

    fn target(velocity: f32, stiffness: f32) -> DriveMotorTarget {
        DriveMotorTarget {
            target_velocity: velocity,
            target_stiffness: stiffness,
        }
    }

    #[test]
    fn pedal_priority_is_forward_backward_brake() {
        assert_eq!(Pedal::select(true, true, true), Pedal::Forward);
        assert_eq!(Pedal::select(false, true, true), Pedal::Backward);
        assert_eq!(Pedal::select(false, false, true), Pedal::Brake);
        assert_eq!(Pedal::select(false, false, false), Pedal::Neutral);
    }

    #[test]
    fn forward_in_neutral_gear_idles_softly() {
        let table = GearTable::default();
        assert_eq!(table.command(gear(0), Pedal::Forward), target(0.0, 2.0));
    }

    #[test]
    fn forward_in_third_gear() {
        let table = GearTable::default();
        assert_eq!(table.command(gear(3), Pedal::Forward), target(200.0, 2.0));
    }

    #[test]
    fn forward_in_reverse_gear_drives_backwards() {
        let table = GearTable::default();
        assert_eq!(table.command(Gear::REVERSE, Pedal::Forward), target(-200.0, 2.0));
    }

    #[test]
    fn backward_in_fourth_gear_brakes_hard() {
        let table = GearTable::default();
        assert_eq!(table.command(gear(4), Pedal::Backward), target(0.0, 300.0));
        assert_eq!(table.command(gear(5), Pedal::Brake), target(0.0, 400.0));
    }

    #[test]
    fn coasting_holds_wheels_in_every_gear() {
        let table = GearTable::default();
        for gear in Gear::all() {
            assert_eq!(table.command(gear, Pedal::Neutral), target(0.0, 200.0));
        }
    }

    #[test]
    fn command_is_deterministic_and_in_range() {
        let table = GearTable::default();
        for gear in Gear::all() {
            for pedal in [Pedal::Forward, Pedal::Backward, Pedal::Brake, Pedal::Neutral] {
                let first = table.command(gear, pedal);
                assert_eq!(first, table.command(gear, pedal));
                assert!((-200.0..=500.0).contains(&first.target_velocity));
                assert!((2.0..=400.0).contains(&first.target_stiffness));
            }
        }
    }

    #[test]
    fn shipped_table_matches_stock_table() {
        let config = sedan_vehicle_config();
        let table = GearTable::from_config(&config.drivetrain).expect("complete table");
        assert_eq!(table, GearTable::default());
    }

    #[test]
    fn missing_row_is_reported() {
        let mut config = sedan_vehicle_config();
        config.drivetrain.gears.retain(|row| row.gear != 2);

        let error = GearTable::from_config(&config.drivetrain).expect_err("gear 2 missing");
        assert_eq!(error, MissingGearError { gear: 2 });
    }
}
