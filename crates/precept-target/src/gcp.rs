//! GCP asset target: the default domain, reviewed verbatim.

use crate::asset::ANCESTRY_PATH_KEY;
use crate::{MatchKeys, TargetError, TargetHandler};
use precept_core::Target;
use serde_json::{Map, Value};

/// Handler for the GCP asset domain. Assets are reviewed as-is; no shape
/// conversion is performed.
#[derive(Debug, Default, Clone, Copy)]
pub struct GcpTarget;

impl GcpTarget {
    pub fn new() -> Self {
        Self
    }
}

impl TargetHandler for GcpTarget {
    fn target(&self) -> Target {
        Target::Gcp
    }

    fn handle_review(
        &self,
        resource: &Map<String, Value>,
    ) -> Result<Option<Map<String, Value>>, TargetError> {
        Ok(Some(resource.clone()))
    }

    fn match_keys(&self, reviewed: &Map<String, Value>) -> MatchKeys {
        MatchKeys {
            ancestry_path: reviewed
                .get(ANCESTRY_PATH_KEY)
                .and_then(Value::as_str)
                .map(str::to_string),
            reference: None,
        }
    }
}
