//! GPO precedence
//!
//! Enforced links win over non-enforced ones. Among enforced links the most
//! distant container wins; among the rest the closest one does. Remaining ties
//! go to the most recently created link.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A GPO link as seen from one target container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedGpo {
    pub guid: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Container the link sits on
    pub linked_to: String,
    pub enforced: bool,
    /// Levels between the target container and `linked_to`
    pub distance: usize,
    /// Creation order of the link on its container
    pub link_order: u32,
}

fn precedence(a: &OrderedGpo, b: &OrderedGpo) -> Ordering {
    b.enforced
        .cmp(&a.enforced)
        .then_with(|| {
            if a.enforced {
                b.distance.cmp(&a.distance)
            } else {
                a.distance.cmp(&b.distance)
            }
        })
        .then_with(|| b.link_order.cmp(&a.link_order))
}

/// Sort links so the first one has the highest precedence
pub fn sort_by_precedence(links: &mut [OrderedGpo]) {
    links.sort_by(precedence);
}
