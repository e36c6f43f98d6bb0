//! # Sensor Catalog
//!
//! Holds the registered sensor definitions together with their mutable state:
//! current value, send priority and the active flag. Lookups go through a
//! 256-entry id table built once at registration.

use heapless::Vec;

use super::protocol::{SensorDefinition, MAX_SENSORS};

/// Value reported for a sensor that was never set
pub const INITIAL_VALUE: i32 = -1;

/// Mutable per-sensor state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorState {
    pub value: i32,
    /// Cycle divisor, never zero
    pub priority: u8,
}

impl Default for SensorState {
    fn default() -> Self {
        Self {
            value: INITIAL_VALUE,
            priority: 1,
        }
    }
}

/// Registered sensors with their state, indexed by catalog position
#[derive(Debug, Clone)]
pub struct SensorCatalog {
    definitions: &'static [SensorDefinition],
    states: Vec<SensorState, MAX_SENSORS>,
    index_by_id: [Option<u8>; 256],
    active: u32,
}

impl SensorCatalog {
    /// Build a catalog from a constant definition table
    ///
    /// Scanning stops at the first sentinel (id 0) or after [`MAX_SENSORS`]
    /// entries. All sensors start active with value -1 and priority 1. When an
    /// id appears twice, lookups resolve to its first entry.
    ///
    /// # Examples
    ///
    /// ```
    /// use jetiex_uplink::ex::catalog::SensorCatalog;
    /// use jetiex_uplink::ex::protocol::{DataType, Precision, SensorDefinition};
    ///
    /// static SENSORS: [SensorDefinition; 3] = [
    ///     SensorDefinition::new(1, "Voltage", "V", DataType::Int14, Precision::One),
    ///     SensorDefinition::new(2, "Current", "A", DataType::Int14, Precision::One),
    ///     SensorDefinition::END,
    /// ];
    ///
    /// let catalog = SensorCatalog::new(&SENSORS);
    /// assert_eq!(catalog.len(), 2);
    /// assert!(catalog.is_active(2));
    /// ```
    pub fn new(definitions: &'static [SensorDefinition]) -> Self {
        let count = definitions
            .iter()
            .take(MAX_SENSORS)
            .take_while(|def| !def.is_end())
            .count();
        let definitions = &definitions[..count];

        let mut index_by_id = [None; 256];
        let mut states = Vec::new();
        for (index, def) in definitions.iter().enumerate() {
            let slot = &mut index_by_id[def.id as usize];
            if slot.is_none() {
                *slot = Some(index as u8);
            }
            // count <= MAX_SENSORS, so this never overflows
            let _ = states.push(SensorState::default());
        }

        let active = if count == MAX_SENSORS {
            u32::MAX
        } else {
            (1u32 << count) - 1
        };

        Self {
            definitions,
            states,
            index_by_id,
            active,
        }
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn definitions(&self) -> &'static [SensorDefinition] {
        self.definitions
    }

    pub fn definition(&self, index: usize) -> Option<&'static SensorDefinition> {
        self.definitions.get(index)
    }

    pub fn state(&self, index: usize) -> Option<&SensorState> {
        self.states.get(index)
    }

    /// Catalog index of a sensor id
    pub fn index_of(&self, id: u8) -> Option<usize> {
        self.index_by_id[id as usize].map(usize::from)
    }

    /// Store a value and its priority; unknown ids are ignored
    ///
    /// A priority of 0 is treated as 1.
    ///
    /// # Returns
    ///
    /// Whether `id` is part of the catalog
    pub fn set_value(&mut self, id: u8, value: i32, priority: u8) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        let state = &mut self.states[index];
        state.value = value;
        state.priority = priority.max(1);
        true
    }

    /// Set the active flag of a sensor; unknown ids are ignored
    ///
    /// # Returns
    ///
    /// Whether `id` is part of the catalog
    pub fn set_active(&mut self, id: u8, enabled: bool) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        let mask = 1u32 << index;
        if enabled {
            self.active |= mask;
        } else {
            self.active &= !mask;
        }
        true
    }

    /// Active flag of a sensor id, `false` for unknown ids
    pub fn is_active(&self, id: u8) -> bool {
        self.index_of(id)
            .map(|index| self.is_index_active(index))
            .unwrap_or(false)
    }

    pub fn is_index_active(&self, index: usize) -> bool {
        index < self.len() && self.active & (1u32 << index) != 0
    }

    pub fn active_count(&self) -> usize {
        self.active.count_ones() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ex::protocol::{DataType, Precision};

    static SENSORS: [SensorDefinition; 4] = [
        SensorDefinition::new(1, "Voltage", "V", DataType::Int14, Precision::One),
        SensorDefinition::new(2, "Altitude", "m", DataType::Int22, Precision::Zero),
        SensorDefinition::new(20, "Climb", "m/s", DataType::Int14, Precision::Two),
        SensorDefinition::END,
    ];

    static UNTERMINATED: [SensorDefinition; 2] = [
        SensorDefinition::new(7, "A", "", DataType::Int6, Precision::Zero),
        SensorDefinition::new(8, "B", "", DataType::Int6, Precision::Zero),
    ];

    static AFTER_END: [SensorDefinition; 3] = [
        SensorDefinition::new(7, "A", "", DataType::Int6, Precision::Zero),
        SensorDefinition::END,
        SensorDefinition::new(8, "B", "", DataType::Int6, Precision::Zero),
    ];

    static FULL: [SensorDefinition; 40] = {
        let mut defs = [SensorDefinition::END; 40];
        let mut i = 0;
        while i < 40 {
            defs[i] = SensorDefinition::new(i as u8 + 1, "S", "", DataType::Int6, Precision::Zero);
            i += 1;
        }
        defs
    };

    #[test]
    fn test_register_defaults() {
        let catalog = SensorCatalog::new(&SENSORS);

        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.active_count(), 3);
        for index in 0..catalog.len() {
            let state = catalog.state(index).unwrap();
            assert_eq!(state.value, -1);
            assert_eq!(state.priority, 1);
        }
        assert_eq!(catalog.index_of(20), Some(2));
        assert_eq!(catalog.index_of(3), None);
    }

    #[test]
    fn test_register_stops_at_sentinel() {
        assert_eq!(SensorCatalog::new(&UNTERMINATED).len(), 2);

        let catalog = SensorCatalog::new(&AFTER_END);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.index_of(8), None);
    }

    #[test]
    fn test_register_caps_at_max_sensors() {
        let catalog = SensorCatalog::new(&FULL);
        assert_eq!(catalog.len(), MAX_SENSORS);
        assert_eq!(catalog.active_count(), MAX_SENSORS);
        assert!(catalog.is_active(32));
        assert!(!catalog.is_active(33));
    }

    #[test]
    fn test_set_value_known_and_unknown() {
        let mut catalog = SensorCatalog::new(&SENSORS);

        assert!(catalog.set_value(2, 1500, 3));
        assert_eq!(catalog.state(1).unwrap(), &SensorState { value: 1500, priority: 3 });

        assert!(!catalog.set_value(99, 5, 1));
        assert!(!catalog.set_value(0, 5, 1));
    }

    #[test]
    fn test_zero_priority_is_clamped() {
        let mut catalog = SensorCatalog::new(&SENSORS);
        catalog.set_value(1, 10, 0);
        assert_eq!(catalog.state(0).unwrap().priority, 1);
    }

    #[test]
    fn test_set_active() {
        let mut catalog = SensorCatalog::new(&SENSORS);

        assert!(catalog.set_active(2, false));
        assert!(!catalog.is_active(2));
        assert!(!catalog.is_index_active(1));
        assert_eq!(catalog.active_count(), 2);

        assert!(catalog.set_active(2, true));
        assert!(catalog.is_active(2));

        assert!(!catalog.set_active(42, false));
        assert!(!catalog.is_active(42));
        assert_eq!(catalog.active_count(), 3);
    }

    #[test]
    fn test_index_out_of_range_is_inactive() {
        let catalog = SensorCatalog::new(&SENSORS);
        assert!(!catalog.is_index_active(3));
        assert!(!catalog.is_index_active(31));
    }
}
