// config.rs — Map options
//
// Options are plain serde data so tooling can keep them next to archived
// maps. Unknown or mistyped fields are `InvalidArgument`; missing fields
// take their defaults.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Tunables for a Map's transformation passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapOptions {
    /// Upper bound on refine passes per `Map::refine`. Must be positive.
    pub max_refine_iterations: usize,
    /// Keep debug sinks whose observed value survives pruning.
    pub keep_connected_debug_sinks: bool,
}

impl Default for MapOptions {
    fn default() -> Self {
        MapOptions {
            max_refine_iterations: 10,
            keep_connected_debug_sinks: true,
        }
    }
}

impl MapOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        let options: MapOptions = serde_json::from_str(json)
            .map_err(|e| ModelError::invalid(format!("invalid map options: {e}")))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_refine_iterations == 0 {
            return Err(ModelError::invalid("max_refine_iterations must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let options = MapOptions::from_json(r#"{"max_refine_iterations": 3}"#).unwrap();
        assert_eq!(options.max_refine_iterations, 3);
        assert!(options.keep_connected_debug_sinks);
    }

    #[test]
    fn zero_iterations_is_rejected() {
        assert!(matches!(
            MapOptions::from_json(r#"{"max_refine_iterations": 0}"#),
            Err(ModelError::InvalidArgument(_))
        ));
    }

    #[test]
    fn unknown_field_is_rejected() {
        assert!(matches!(
            MapOptions::from_json(r#"{"max_iterations": 3}"#),
            Err(ModelError::InvalidArgument(_))
        ));
        assert!(matches!(
            MapOptions::from_json(r#"{"keep_connected_debug_sinks": "yes"}"#),
            Err(ModelError::InvalidArgument(_))
        ));
    }
}
