//! Focus/visibility gate
//!
//! Folds raw signals (route focus, the music switch, the selected track, and
//! the visible page of a paged-media route) into one desired track, and
//! forwards each change of that value to the [`SessionManager`].
//!
//! Priority, highest first:
//! 1. Focused route is muted → nothing
//! 2. Focused paged-media route with an in-range visible page → that page's track
//! 3. Preferences loaded, music enabled, a track selected → the selected track
//! 4. Otherwise nothing

mod mute_policy;

pub use mute_policy::RouteMutePolicy;

use lumia_common::TrackId;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::preferences::Preference;
use crate::session::SessionManager;

/// Derived view of the signals the gate has seen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveContext {
    pub route_id: Option<String>,
    pub is_route_focused: bool,
    pub visible_item_track_id: Option<TrackId>,
}

pub struct FocusGate {
    manager: SessionManager,
    catalog: Arc<Catalog>,
    mute_policy: RouteMutePolicy,

    route: Option<String>,
    route_focused: bool,
    /// Last visible page per paged route
    visible_index: HashMap<String, usize>,

    preferences_ready: bool,
    enabled: bool,
    selected: Option<TrackId>,
    /// User choices made before preferences finished loading
    user_set_enabled: bool,
    user_set_selected: bool,

    desired: Option<TrackId>,
}

impl FocusGate {
    pub fn new(manager: SessionManager, catalog: Arc<Catalog>, mute_policy: RouteMutePolicy) -> Self {
        Self {
            manager,
            catalog,
            mute_policy,
            route: None,
            route_focused: false,
            visible_index: HashMap::new(),
            preferences_ready: false,
            enabled: false,
            selected: None,
            user_set_enabled: false,
            user_set_selected: false,
            desired: None,
        }
    }

    pub fn on_route_change(&mut self, route: &str, focused: bool) {
        if focused {
            self.route = Some(route.to_string());
            self.route_focused = true;
        } else if self.route.as_deref() == Some(route) {
            self.route_focused = false;
        } else {
            debug!("Ignoring blur of {} (current route {:?})", route, self.route);
            return;
        }
        self.sync();
    }

    pub fn on_visible_index(&mut self, index: usize) {
        let Some(route) = self.focused_paged_route().map(str::to_string) else {
            debug!("Ignoring visible index {} outside a paged route", index);
            return;
        };
        self.visible_index.insert(route, index);
        self.sync();
    }

    /// Music switch; `false` always silences the session first
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.user_set_enabled = true;

        if enabled {
            self.reassert();
        } else {
            self.manager.deactivate();
            self.desired = None;
            self.sync();
        }
    }

    /// Caller is responsible for checking `track` against the catalog
    pub fn select_track(&mut self, track: TrackId) {
        self.selected = Some(track);
        self.user_set_selected = true;
        self.reassert();
    }

    /// Apply the initial preference load; earlier user choices win
    pub fn preferences_loaded(&mut self, loaded: Preference) {
        if !self.user_set_enabled {
            self.enabled = loaded.enabled;
        }
        if !self.user_set_selected {
            self.selected = match loaded.selected_track {
                Some(id) if !self.catalog.contains(id) => {
                    warn!("Stored track {} is not in the catalog, ignoring", id);
                    None
                }
                other => other,
            };
        }
        self.preferences_ready = true;
        self.sync();
    }

    pub fn preferences_ready(&self) -> bool {
        self.preferences_ready
    }

    /// Effective music switch and selected track
    pub fn preference(&self) -> Preference {
        Preference {
            enabled: self.enabled,
            selected_track: self.selected,
        }
    }

    pub fn active_context(&self) -> ActiveContext {
        ActiveContext {
            route_id: self.route.clone(),
            is_route_focused: self.route_focused,
            visible_item_track_id: self.visible_item(),
        }
    }

    /// Track the gate currently asks the session to play
    pub fn desired_track(&self) -> Option<TrackId> {
        self.desired
    }

    fn focused_route(&self) -> Option<&str> {
        self.route.as_deref().filter(|_| self.route_focused)
    }

    fn focused_paged_route(&self) -> Option<&str> {
        self.focused_route()
            .filter(|route| self.catalog.is_paged_route(route))
    }

    fn visible_item(&self) -> Option<TrackId> {
        let route = self.focused_paged_route()?;
        let index = self.visible_index.get(route).copied().unwrap_or(0);
        self.catalog.page_track(route, index).map(|track| track.id)
    }

    fn compute(&self) -> Option<TrackId> {
        if let Some(route) = self.focused_route() {
            if self.mute_policy.is_muted(route) {
                return None;
            }
        }
        if let Some(track) = self.visible_item() {
            return Some(track);
        }
        if self.preferences_ready && self.enabled {
            return self.selected;
        }
        None
    }

    fn sync(&mut self) {
        self.apply(false);
    }

    /// Also re-sends an unchanged desired track, restarting a session that
    /// fell back to idle after a failed create or play
    fn reassert(&mut self) {
        self.apply(true);
    }

    fn apply(&mut self, reassert: bool) {
        let desired = self.compute();
        if desired == self.desired {
            if reassert {
                if let Some(track) = desired.and_then(|id| self.catalog.track(id)) {
                    self.manager.activate(track.clone());
                }
            }
            return;
        }
        debug!("Desired track {:?} -> {:?}", self.desired, desired);
        self.desired = desired;

        match desired.and_then(|id| self.catalog.track(id)) {
            Some(track) => self.manager.activate(track.clone()),
            None => {
                if let Some(id) = desired {
                    warn!("Track {} missing from catalog, silencing", id);
                    self.desired = None;
                }
                self.manager.deactivate();
            }
        }
    }
}
