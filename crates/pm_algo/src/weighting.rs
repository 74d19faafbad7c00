//! Weighting classifier: source name → credibility multiplier.
//!
//! Categories are checked in a fixed priority order (favorable, lean either
//! side, opposed, unreliable, no data); the first match wins. A name on no
//! list gets the `unclassified` multiplier; an absent or blank name gets
//! `unset` (neutral).

use pm_core::{WeightMultipliers, WeightTable};

/// Category a source was found in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceCategory {
    Favorable,
    Lean,
    Opposed,
    Unreliable,
    NoData,
}

/// First category (in priority order) whose list contains `name`.
pub fn classify(name: &str, table: &WeightTable) -> Option<SourceCategory> {
    if table.favorable.contains(name) {
        Some(SourceCategory::Favorable)
    } else if table.lean_favorable.contains(name) || table.lean_opposed.contains(name) {
        Some(SourceCategory::Lean)
    } else if table.opposed.contains(name) {
        Some(SourceCategory::Opposed)
    } else if table.unreliable.contains(name) {
        Some(SourceCategory::Unreliable)
    } else if table.no_data.contains(name) {
        Some(SourceCategory::NoData)
    } else {
        None
    }
}

/// Credibility multiplier for one source or sponsor name.
pub fn weight(name: Option<&str>, table: &WeightTable, m: &WeightMultipliers) -> f64 {
    let name = match name.map(str::trim) {
        Some(n) if !n.is_empty() => n,
        _ => return m.unset,
    };
    match classify(name, table) {
        Some(SourceCategory::Favorable) => m.favorable,
        Some(SourceCategory::Lean) => m.lean,
        Some(SourceCategory::Opposed) => m.opposed,
        Some(SourceCategory::Unreliable) => m.unreliable,
        Some(SourceCategory::NoData) => m.no_data,
        None => m.unclassified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> WeightTable {
        let mut t = WeightTable::default();
        t.favorable.insert("Blue Research".into());
        t.lean_opposed.insert("Reddish Polls".into());
        t.opposed.insert("Red Analytics".into());
        t.unreliable.insert("Sketchy Co".into());
        t.no_data.insert("New Firm".into());
        // Listed twice: priority order decides.
        t.unreliable.insert("Blue Research".into());
        t
    }

    #[test]
    fn unset_name_is_neutral() {
        let m = WeightMultipliers::default();
        assert_eq!(weight(None, &table(), &m), 1.0);
        assert_eq!(weight(Some("   "), &table(), &m), 1.0);
    }

    #[test]
    fn categories_map_to_multipliers() {
        let m = WeightMultipliers::default();
        let t = table();
        assert_eq!(weight(Some("Sketchy Co"), &t, &m), 0.1);
        assert_eq!(weight(Some("Reddish Polls"), &t, &m), 0.5);
        assert_eq!(weight(Some("Red Analytics"), &t, &m), 0.3);
        assert_eq!(weight(Some("New Firm"), &t, &m), 1.2);
        assert_eq!(weight(Some("Unknown Pollster"), &t, &m), m.unclassified);
    }

    #[test]
    fn priority_order_first_match_wins() {
        assert_eq!(classify("Blue Research", &table()), Some(SourceCategory::Favorable));
    }

    #[test]
    fn configured_unreliable_multiplier_is_used() {
        let m = WeightMultipliers { unreliable: 0.2, ..WeightMultipliers::default() };
        assert_eq!(weight(Some("Sketchy Co"), &table(), &m), 0.2);
    }
}
