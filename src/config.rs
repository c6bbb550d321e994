//! Validated configuration of a single protocol run.

#[cfg(feature = "with_serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::registers::MAX_REGISTER_WIDTH;

/// Sketch dimensions shared by every node of a network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SketchParams {
    /// Bits per register `l`
    register_width: u32,
    /// Registers per node `m / l`, always a power of two
    registers_per_node: usize,
}

impl SketchParams {
    /// Derive sketch dimensions from a total `bit_budget` (`m`) and `register_width` (`l`).
    pub fn new(bit_budget: usize, register_width: u32) -> Result<Self> {
        if !(1..=MAX_REGISTER_WIDTH).contains(&register_width) {
            return Err(Error::RegisterWidthOutOfRange(register_width));
        }
        let width = register_width as usize;
        if bit_budget % width != 0 {
            return Err(Error::BitBudgetNotDivisible {
                bits: bit_budget,
                width: register_width,
            });
        }
        let registers_per_node = bit_budget / width;
        if !registers_per_node.is_power_of_two() {
            return Err(Error::RegistersNotPowerOfTwo {
                bits: bit_budget,
                width: register_width,
                registers: registers_per_node,
            });
        }
        Ok(Self {
            register_width,
            registers_per_node,
        })
    }

    #[inline]
    pub fn register_width(&self) -> u32 {
        self.register_width
    }

    #[inline]
    pub fn registers_per_node(&self) -> usize {
        self.registers_per_node
    }

    /// Total bits per node sketch (`m`)
    #[inline]
    pub fn bit_budget(&self) -> usize {
        self.registers_per_node * self.register_width as usize
    }

    /// Largest rank a register can hold (`2^l - 1`)
    #[inline]
    pub fn max_rank(&self) -> u32 {
        (1 << self.register_width) - 1
    }
}

/// Parameters of one simulation run
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "with_serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "with_serde", serde(default))]
pub struct SimulationConfig {
    /// Expected number of nodes `N` of the topology
    pub nodes: usize,
    /// Bits per register `l`
    pub register_width: u32,
    /// Total sketch bits per node `m`
    pub bit_budget: usize,
    /// Register propagation rounds, also used as ground-truth radius `R`
    pub rounds: u32,
    /// Probability `p` that a node holds the resource
    pub resource_probability: f64,
    /// Seed of the random source used for resource flags and sketch initialization
    pub seed: u64,
    /// Marker propagation rounds, defaults to `N`
    pub marker_rounds: Option<usize>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            nodes: 0,
            register_width: 5,
            bit_budget: 5 * 64,
            rounds: 3,
            resource_probability: 0.1,
            seed: 0,
            marker_rounds: None,
        }
    }
}

impl SimulationConfig {
    /// Check every field and derive sketch dimensions
    pub fn validate(&self) -> Result<SketchParams> {
        if !(0.0..=1.0).contains(&self.resource_probability) {
            return Err(Error::ResourceProbability(self.resource_probability));
        }
        SketchParams::new(self.bit_budget, self.register_width)
    }

    /// Marker rounds to run on a topology of `nodes` nodes
    pub fn marker_rounds_for(&self, nodes: usize) -> usize {
        self.marker_rounds.unwrap_or(nodes)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(64, 4 => (4, 16))]
    #[test_case(320, 5 => (5, 64))]
    #[test_case(6, 6 => (6, 1))]
    #[test_case(4096 * 6, 6 => (6, 4096))]
    fn test_sketch_params(bits: usize, width: u32) -> (u32, usize) {
        let params = SketchParams::new(bits, width).unwrap();
        assert_eq!(params.bit_budget(), bits);
        (params.register_width(), params.registers_per_node())
    }

    #[test_case(48, 4; "twelve registers")]
    #[test_case(0, 4; "no registers")]
    #[test_case(66, 5; "not divisible")]
    #[test_case(64, 0; "zero width")]
    #[test_case(64, 17; "too wide")]
    fn test_invalid_sketch_params(bits: usize, width: u32) {
        let err = SketchParams::new(bits, width).unwrap_err();
        assert!(err.is_invalid_configuration(), "{err}");
    }

    #[test]
    fn test_max_rank() {
        assert_eq!(SketchParams::new(64, 4).unwrap().max_rank(), 15);
        assert_eq!(SketchParams::new(64, 1).unwrap().max_rank(), 1);
    }

    #[test]
    fn test_config_validate() {
        let config = SimulationConfig::default();
        let params = config.validate().unwrap();
        assert_eq!(params.registers_per_node(), 64);
        assert_eq!(config.marker_rounds_for(10), 10);

        let config = SimulationConfig {
            resource_probability: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::ResourceProbability(_))
        ));

        let config = SimulationConfig {
            bit_budget: 30,
            register_width: 5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::RegistersNotPowerOfTwo { registers: 6, .. })
        ));
    }
}
