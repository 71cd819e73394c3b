#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Feed,
    Create,
    Profile,
    Map,
}

impl View {
    pub const ALL: [View; 4] = [View::Feed, View::Create, View::Profile, View::Map];

    pub fn title(&self) -> &'static str {
        match self {
            View::Feed => "Feed",
            View::Create => "Create",
            View::Profile => "Profile",
            View::Map => "Map",
        }
    }

    pub fn from_index(index: usize) -> Option<View> {
        Self::ALL.get(index).copied()
    }

    pub fn index(&self) -> usize {
        match self {
            View::Feed => 0,
            View::Create => 1,
            View::Profile => 2,
            View::Map => 3,
        }
    }
}

/// One visible view at a time. The profile view may carry a target user;
/// `None` means the viewer's own profile.
#[derive(Debug, Clone, Default)]
pub struct Router {
    view: View,
    profile_target: Option<String>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn profile_target(&self) -> Option<&str> {
        self.profile_target.as_deref()
    }

    pub fn select(&mut self, view: View) {
        if view != View::Profile {
            self.profile_target = None;
        }
        self.view = view;
    }

    pub fn view_profile(&mut self, user: Option<String>) {
        self.profile_target = user;
        self.view = View::Profile;
    }

    pub fn close(&mut self) {
        self.select(View::Feed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_on_feed() {
        let router = Router::new();
        assert_eq!(router.view(), View::Feed);
        assert!(router.profile_target().is_none());
    }

    #[test]
    fn leaving_profile_clears_target() {
        let mut router = Router::new();
        router.view_profile(Some("DJ Harmony".into()));
        assert_eq!(router.view(), View::Profile);
        assert_eq!(router.profile_target(), Some("DJ Harmony"));
        router.select(View::Map);
        assert!(router.profile_target().is_none());
        router.select(View::Profile);
        assert!(router.profile_target().is_none());
    }

    #[test]
    fn close_returns_to_feed() {
        let mut router = Router::new();
        router.select(View::Create);
        router.close();
        assert_eq!(router.view(), View::Feed);
    }

    #[test]
    fn index_round_trips_through_tab_order() {
        for view in View::ALL {
            assert_eq!(View::from_index(view.index()), Some(view));
        }
        assert_eq!(View::from_index(4), None);
    }
}
