//! JSON renderer. Field order follows the model's declaration order:
//! summary → regions → history.

use crate::ReportModel;

/// Pretty-printed JSON for `model`.
pub fn render_json(model: &ReportModel) -> serde_json::Result<String> {
    serde_json::to_string_pretty(model)
}
