//! Margin → confidence tier, and the representative margin of a tier.

use pm_core::{Tier, TierCutpoints};

/// Eight-band classification with strictly-greater comparisons:
/// `margin > c[0]` is solid-favorable, …, `margin <= c[6]` is solid-opposed.
pub fn classify(margin: f64, cutpoints: &TierCutpoints) -> Tier {
    let c = cutpoints.as_array();
    c.iter()
        .position(|&cut| margin > cut)
        .map_or(Tier::SolidOpposed, |i| Tier::ALL[i])
}

/// A margin that sits inside `tier`'s band: the band midpoint, or two points
/// beyond the outermost cutpoint for the solid tiers.
pub fn representative_margin(tier: Tier, cutpoints: &TierCutpoints) -> f64 {
    let c = cutpoints.as_array();
    match tier.index() {
        0 => c[0] + 2.0,
        7 => c[6] - 2.0,
        i => (c[i - 1] + c[i]) / 2.0,
    }
}
