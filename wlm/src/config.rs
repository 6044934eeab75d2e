//! Runtime configuration
//!
//! Every field has a default, so a configuration file only needs to name
//! what it changes.

use serde::Deserialize;
use wlm_decoder::ValidationConfig;
use wlm_format::binary::MAX_PAGES;
use wlm_runtime::InstanceConfig;

/// Bounds on what a [`crate::Runtime`] may hold and do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    /// Loaded modules at any one time
    pub max_modules:        usize,
    /// Live instances at any one time, instantiations in progress included
    pub max_instances:      usize,
    /// Largest size in pages any memory may reach
    pub max_memory_pages:   u32,
    /// Largest initial size of a table
    pub max_table_elements: u32,
    /// Maximum nesting of calls
    pub max_call_depth:     u32,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_modules:        1024,
            max_instances:      1024,
            max_memory_pages:   MAX_PAGES,
            max_table_elements: 100_000,
            max_call_depth:     1024,
        }
    }
}

/// Configuration of a [`crate::Runtime`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Resource limits
    pub limits:     ResourceLimits,
    /// Limits applied while loading modules
    pub validation: ValidationConfig,
    /// Instruction budget per invocation; unlimited when absent
    pub fuel:       Option<u64>,
}

impl RuntimeConfig {
    /// Tight limits and a fuel budget, for untrusted modules.
    pub fn strict() -> Self {
        Self {
            limits:     ResourceLimits {
                max_modules:        64,
                max_instances:      64,
                max_memory_pages:   256,
                max_table_elements: 10_000,
                max_call_depth:     256,
            },
            validation: ValidationConfig::strict(),
            fuel:       Some(10_000_000),
        }
    }

    /// Generous limits and no fuel, for trusted modules.
    pub fn relaxed() -> Self {
        Self {
            limits:     ResourceLimits {
                max_modules:        usize::MAX,
                max_instances:      usize::MAX,
                max_memory_pages:   MAX_PAGES,
                max_table_elements: u32::MAX,
                max_call_depth:     16_384,
            },
            validation: ValidationConfig::relaxed(),
            fuel:       None,
        }
    }

    /// Set the per-invocation fuel budget.
    #[must_use]
    pub fn with_fuel(mut self, fuel: Option<u64>) -> Self {
        self.fuel = fuel;
        self
    }

    /// Limits handed to each new instance
    pub fn instance_config(&self) -> InstanceConfig {
        InstanceConfig {
            max_memory_pages:   self.limits.max_memory_pages,
            max_table_elements: self.limits.max_table_elements,
            max_call_depth:     self.limits.max_call_depth,
            fuel:               self.fuel,
        }
    }
}
