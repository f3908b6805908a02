use crate::config::{GearboxConfig, MAX_GEAR, MIN_GEAR};
use bevy::prelude::*;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Drivetrain gear: -1 is reverse, 0 neutral, 1..=5 forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Gear(i8);

impl Gear {
    pub const REVERSE: Self = Self(MIN_GEAR);
    pub const NEUTRAL: Self = Self(0);
    pub const COUNT: usize = (MAX_GEAR - MIN_GEAR + 1) as usize;

    pub fn new(value: i8) -> Option<Self> {
        (MIN_GEAR..=MAX_GEAR).contains(&value).then_some(Self(value))
    }

    pub fn value(self) -> i8 {
        self.0
    }

    pub fn up(self) -> Option<Self> {
        self.0.checked_add(1).and_then(Self::new)
    }

    pub fn down(self) -> Option<Self> {
        self.0.checked_sub(1).and_then(Self::new)
    }

    pub fn all() -> impl Iterator<Item = Self> {
        (MIN_GEAR..=MAX_GEAR).map(Self)
    }

    pub(super) fn table_index(self) -> usize {
        (self.0 - MIN_GEAR) as usize
    }
}

impl Display for Gear {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            -1 => write!(f, "R"),
            0 => write!(f, "N"),
            value => write!(f, "{value}"),
        }
    }
}

/// Level-sampled shift buttons for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShiftInput {
    pub up: bool,
    pub down: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GearChange {
    pub from: Gear,
    pub to: Gear,
    pub at: Duration,
}

/// Sequential gearbox with rising-edge shifting and a cooldown on the simulation clock.
///
/// An edge that arrives while the cooldown is running is dropped, not queued.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct Gearbox {
    gear: Gear,
    last_shift_at: Option<Duration>,
    cooldown: Duration,
    previous: ShiftInput,
}

impl Gearbox {
    pub fn new(initial: Gear, cooldown: Duration) -> Self {
        Self {
            gear: initial,
            last_shift_at: None,
            cooldown,
            previous: ShiftInput::default(),
        }
    }

    pub fn from_config(config: &GearboxConfig) -> Self {
        let initial = Gear::new(config.initial_gear).unwrap_or(Gear::NEUTRAL);
        Self::new(initial, Duration::from_millis(config.shift_cooldown_ms))
    }

    pub fn gear(&self) -> Gear {
        self.gear
    }

    pub fn last_shift_at(&self) -> Option<Duration> {
        self.last_shift_at
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn set_cooldown(&mut self, cooldown: Duration) {
        self.cooldown = cooldown;
    }

    /// Runs one transition step. Up is evaluated before down.
    pub fn advance(&mut self, input: ShiftInput, now: Duration) -> Option<GearChange> {
        let up_edge = input.up && !self.previous.up;
        let down_edge = input.down && !self.previous.down;
        self.previous = input;

        let mut change = None;
        if up_edge {
            change = self.try_shift(self.gear.up(), now).or(change);
        }
        if down_edge {
            change = self.try_shift(self.gear.down(), now).or(change);
        }
        change
    }

    fn try_shift(&mut self, target: Option<Gear>, now: Duration) -> Option<GearChange> {
        let target = target?;
        if !self.cooled_down(now) {
            return None;
        }

        let change = GearChange {
            from: self.gear,
            to: target,
            at: now,
        };
        self.gear = target;
        self.last_shift_at = Some(now);
        Some(change)
    }

    fn cooled_down(&self, now: Duration) -> bool {
        match self.last_shift_at {
            None => true,
            Some(at) => now.saturating_sub(at) >= self.cooldown,
        }
    }
}

impl Default for Gearbox {
    fn default() -> Self {
        Self::new(Gear::NEUTRAL, Duration::from_millis(500))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOP: Gear = Gear(MAX_GEAR);
    const PRESS_UP: ShiftInput = ShiftInput {
        up: true,
        down: false,
    };
    const PRESS_DOWN: ShiftInput = ShiftInput {
        up: false,
        down: true,
    };
    const RELEASED: ShiftInput = ShiftInput {
        up: false,
        down: false,
    };

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn starts_in_neutral() {
        let gearbox = Gearbox::default();
        assert_eq!(gearbox.gear(), Gear::NEUTRAL);
        assert_eq!(gearbox.last_shift_at(), None);
    }

    #[test]
    fn rising_edge_shifts_once_and_holding_does_not_repeat() {
        let mut gearbox = Gearbox::default();

        let change = gearbox.advance(PRESS_UP, ms(100)).expect("first edge shifts");
        assert_eq!(change.from, Gear::NEUTRAL);
        assert_eq!(change.to.value(), 1);

        for tick in 1..=200 {
            assert!(gearbox.advance(PRESS_UP, ms(100 + tick * 16)).is_none());
        }
        assert_eq!(gearbox.gear().value(), 1);
    }

    #[test]
    fn second_press_inside_cooldown_is_dropped() {
        let mut gearbox = Gearbox::default();

        gearbox.advance(PRESS_UP, ms(0));
        gearbox.advance(RELEASED, ms(80));
        assert!(gearbox.advance(PRESS_UP, ms(180)).is_none());
        gearbox.advance(RELEASED, ms(260));

        assert_eq!(gearbox.gear().value(), 1);
        assert_eq!(gearbox.last_shift_at(), Some(ms(0)));
    }

    #[test]
    fn press_after_cooldown_shifts_again() {
        let mut gearbox = Gearbox::default();

        gearbox.advance(PRESS_UP, ms(0));
        gearbox.advance(RELEASED, ms(100));
        assert!(gearbox.advance(PRESS_UP, ms(500)).is_some());

        assert_eq!(gearbox.gear().value(), 2);
    }

    #[test]
    fn shift_down_reaches_reverse_and_stops() {
        let mut gearbox = Gearbox::default();

        gearbox.advance(PRESS_DOWN, ms(0));
        gearbox.advance(RELEASED, ms(100));
        assert!(gearbox.advance(PRESS_DOWN, ms(1_000)).is_none());

        assert_eq!(gearbox.gear(), Gear::REVERSE);
        assert_eq!(gearbox.last_shift_at(), Some(ms(0)));
    }

    #[test]
    fn shift_up_past_top_gear_is_ignored() {
        let mut gearbox = Gearbox::new(TOP, ms(500));

        assert!(gearbox.advance(PRESS_UP, ms(10_000)).is_none());
        assert_eq!(gearbox.gear(), TOP);
        assert_eq!(gearbox.last_shift_at(), None);
    }

    #[test]
    fn both_edges_in_one_tick_only_shift_up() {
        let mut gearbox = Gearbox::default();
        let both = ShiftInput {
            up: true,
            down: true,
        };

        let change = gearbox.advance(both, ms(0)).expect("up edge shifts");
        assert_eq!(change.to.value(), 1);
        assert_eq!(gearbox.gear().value(), 1);
    }

    #[test]
    fn tapping_at_any_tick_rate_respects_cooldown_and_bounds() {
        for hz in [20_u64, 60, 144, 1_000] {
            let mut gearbox = Gearbox::default();
            let step = Duration::from_secs(1) / hz as u32;
            let mut now = Duration::ZERO;
            let mut shifts = Vec::new();

            for tick in 0..(hz * 4) {
                let input = ShiftInput {
                    up: tick % 2 == 0,
                    down: false,
                };
                if let Some(change) = gearbox.advance(input, now) {
                    shifts.push(change.at);
                }
                assert!((MIN_GEAR..=MAX_GEAR).contains(&gearbox.gear().value()));
                now += step;
            }

            for pair in shifts.windows(2) {
                assert!(pair[1] - pair[0] >= ms(500), "{hz} Hz shifted too fast");
            }
            assert_eq!(gearbox.gear(), TOP, "{hz} Hz should reach top gear");
        }
    }

    #[test]
    fn arbitrary_input_keeps_gear_in_range() {
        let mut gearbox = Gearbox::new(Gear::NEUTRAL, ms(30));
        let mut seed = 0x2545_f491_u32;

        for tick in 0..5_000_u64 {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            let input = ShiftInput {
                up: seed & 1 == 1,
                down: seed & 2 == 2,
            };
            gearbox.advance(input, ms(tick * 7));
            assert!(Gear::new(gearbox.gear().value()).is_some());
        }
    }

    #[test]
    fn gear_labels() {
        let labels: Vec<String> = Gear::all().map(|gear| gear.to_string()).collect();
        assert_eq!(labels, ["R", "N", "1", "2", "3", "4", "5"]);
    }
}
