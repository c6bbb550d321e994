#![no_main]

use libfuzzer_sys::fuzz_target;
use network_cardinality_estimator::SimulationConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(config) = serde_json::from_slice::<SimulationConfig>(data) {
        if let Ok(params) = config.validate() {
            assert!(params.registers_per_node().is_power_of_two());
            assert_eq!(
                params.registers_per_node() * params.register_width() as usize,
                config.bit_budget
            );
        }
    }
});
