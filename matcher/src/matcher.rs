//! Ranking of items by the closeness of their forms to a target.

use serde::{Deserialize, Serialize};
use strsim::osa_distance;
use tracing::debug;

/// Which additional forms to include beyond the closest ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOptions {
    /// Only the forms at the smallest edit distance.
    #[default]
    None,

    /// Also forms that start with the target.
    IncludePrefixedForms,

    /// Also the forms at the second smallest edit distance.
    IncludeNextClosest,

    /// Both prefixed forms and the next-closest band.
    IncludePrefixedAndNextClosestForms,
}

impl MatchOptions {
    /// Whether forms starting with the target are included.
    pub fn includes_prefixed(self) -> bool {
        matches!(
            self,
            Self::IncludePrefixedForms | Self::IncludePrefixedAndNextClosestForms
        )
    }

    /// Whether the second-closest band is included.
    pub fn includes_next_closest(self) -> bool {
        matches!(
            self,
            Self::IncludeNextClosest | Self::IncludePrefixedAndNextClosestForms
        )
    }
}

/// Find the items whose form is closest to `target`.
///
/// `key` extracts the form of an item; items without a form never match.
/// The result lists prefixed forms first (when requested), then the closest
/// band, then the next-closest band (when requested). Within a band the input
/// order is preserved.
pub fn find_closest_forms<T, I, F>(items: I, key: F, target: &str, options: MatchOptions) -> Vec<T>
where
    I: IntoIterator<Item = T>,
    F: Fn(&T) -> Option<&str>,
{
    let mut prefixed = Vec::new();
    let mut scored: Vec<(usize, T)> = Vec::new();

    for item in items {
        let Some(form) = key(&item) else {
            continue;
        };
        if options.includes_prefixed() && !target.is_empty() && form.starts_with(target) {
            prefixed.push(item);
            continue;
        }
        let distance = osa_distance(form, target);
        scored.push((distance, item));
    }

    let best = scored.iter().map(|(d, _)| *d).min();
    let next_best = best.and_then(|best| {
        scored
            .iter()
            .map(|(d, _)| *d)
            .filter(|d| *d > best)
            .min()
    });

    let mut closest = Vec::new();
    let mut next_closest = Vec::new();
    for (distance, item) in scored {
        if Some(distance) == best {
            closest.push(item);
        } else if options.includes_next_closest() && Some(distance) == next_best {
            next_closest.push(item);
        }
    }

    debug!(
        "Matched {target:?}: {} prefixed, {} closest (distance {best:?}), {} next closest",
        prefixed.len(),
        closest.len(),
        next_closest.len()
    );

    prefixed.extend(closest);
    prefixed.extend(next_closest);
    prefixed
}
