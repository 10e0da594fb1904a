//! Routes on which background music is forced off

use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct RouteMutePolicy {
    muted: HashSet<String>,
}

impl RouteMutePolicy {
    pub fn from_routes<I, S>(routes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            muted: routes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_muted(&self, route: &str) -> bool {
        self.muted.contains(route)
    }
}
