use crate::model::{Coordinate, Post, PostId};

pub const USER_MARKER_LABEL: &str = "You are here (approximately)";

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub post: Option<PostId>,
    pub position: Coordinate,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MapMarkers {
    pub user: Option<Marker>,
    pub posts: Vec<Marker>,
}

impl MapMarkers {
    /// One marker per post in feed order, plus the viewer when located.
    pub fn build<'a>(posts: impl IntoIterator<Item = &'a Post>, user: Option<Coordinate>) -> Self {
        let posts = posts
            .into_iter()
            .map(|post| Marker {
                post: Some(post.id),
                position: post.location,
                label: format!("{}: {}", post.artist, post.content),
            })
            .collect();
        let user = user.map(|position| Marker {
            post: None,
            position,
            label: USER_MARKER_LABEL.to_string(),
        });
        Self { user, posts }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Marker> {
        self.user.iter().chain(self.posts.iter())
    }
}

/// Longitude/latitude window drawn by the map surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
}

impl Viewport {
    pub const WORLD: Viewport = Viewport {
        x_bounds: [-180.0, 180.0],
        y_bounds: [-90.0, 90.0],
    };

    /// A window `span` degrees wide centred on `center`, kept on the globe.
    pub fn around(center: Coordinate, span: f64) -> Self {
        let half_x = (span / 2.0).clamp(0.5, 180.0);
        let half_y = (span / 4.0).clamp(0.25, 90.0);
        let cx = center.lng.clamp(-180.0 + half_x, 180.0 - half_x);
        let cy = center.lat.clamp(-90.0 + half_y, 90.0 - half_y);
        Self {
            x_bounds: [cx - half_x, cx + half_x],
            y_bounds: [cy - half_y, cy + half_y],
        }
    }

    pub fn contains(&self, point: Coordinate) -> bool {
        (self.x_bounds[0]..=self.x_bounds[1]).contains(&point.lng)
            && (self.y_bounds[0]..=self.y_bounds[1]).contains(&point.lat)
    }
}
