/// Interactive map canvas
///
/// Draws find markers over a flat lat/lng projection with drag-to-pan and
/// wheel zoom. The canvas owns the live marker set and implements
/// MapWidget, so the marker synchronizer drives what is displayed without
/// knowing how it is drawn.
///
/// A flat projection with a cos(latitude) correction on longitude is
/// accurate enough at regional zoom levels; there are no map tiles.

use std::collections::HashMap;

use iced::mouse::{self, Cursor};
use iced::widget::canvas::{self, Path, Program, Stroke};
use iced::{Color, Point, Rectangle, Renderer, Size, Theme};
use uuid::Uuid;

use crate::finds::{pin_color, Coordinates, Find};
use crate::map::{MapWidget, MARKER_RADIUS, MARKER_STROKE_WIDTH};
use crate::Message;

const MIN_ZOOM: f32 = 2.0;
const MAX_ZOOM: f32 = 15.0;

/// Drag distance below which a press/release pair counts as a click
const CLICK_SLOP: f32 = 4.0;

const WATER: Color = Color::from_rgb(0.85, 0.92, 0.97);
const GRID: Color = Color::from_rgba(0.55, 0.65, 0.75, 0.35);
const MARKER_STROKE: Color = Color::WHITE;

/// One drawn marker: the find it represents plus its derived fill color.
/// Visual attributes are derived purely from the find and never mutated.
#[derive(Debug, Clone)]
struct CanvasMarker {
    find: Find,
    fill: Color,
}

/// The map view: center, zoom, and the live marker set
#[derive(Debug, Clone)]
pub struct MapView {
    center: Coordinates,
    zoom: f32,
    markers: HashMap<Uuid, CanvasMarker>,
}

impl MapView {
    pub fn new(center: Coordinates, zoom: f32) -> Self {
        MapView {
            center,
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            markers: HashMap::new(),
        }
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    /// Pixels per degree of latitude at the current zoom
    fn pixels_per_degree(&self) -> f32 {
        256.0 * 2f32.powf(self.zoom) / 360.0
    }

    /// Longitude shrink factor at the view's center latitude
    fn lng_scale(&self) -> f32 {
        (self.center.lat.to_radians().cos() as f32).max(0.01)
    }

    /// Map coordinates to a point in the canvas, centered on the view
    fn project(&self, lat: f64, lng: f64, size: Size) -> Point {
        let ppd = self.pixels_per_degree();
        let x = size.width / 2.0 + ((lng - self.center.lng) as f32) * ppd * self.lng_scale();
        let y = size.height / 2.0 - ((lat - self.center.lat) as f32) * ppd;
        Point::new(x, y)
    }

    /// Inverse of `project`
    fn unproject(&self, point: Point, size: Size) -> Coordinates {
        let ppd = self.pixels_per_degree();
        Coordinates {
            lat: self.center.lat + ((size.height / 2.0 - point.y) / ppd) as f64,
            lng: self.center.lng + ((point.x - size.width / 2.0) / (ppd * self.lng_scale())) as f64,
        }
    }

    /// Shift the view by a drag of (dx, dy) pixels
    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        let ppd = self.pixels_per_degree();
        self.center.lng -= (dx / (ppd * self.lng_scale())) as f64;
        self.center.lat += (dy / ppd) as f64;
        self.center.lat = self.center.lat.clamp(-85.0, 85.0);
        self.center.lng = self.center.lng.clamp(-180.0, 180.0);
    }

    pub fn zoom_by(&mut self, delta: f32) {
        self.zoom = (self.zoom + delta).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// The topmost marker under `point`, if any
    fn hit_test(&self, point: Point, size: Size) -> Option<&Find> {
        let reach = MARKER_RADIUS + MARKER_STROKE_WIDTH;
        self.markers
            .values()
            .filter_map(|marker| {
                let at = self.project(marker.find.lat, marker.find.lng, size);
                let distance = point.distance(at);
                (distance <= reach).then_some((marker, distance))
            })
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(marker, _)| &marker.find)
    }
}

impl MapWidget for MapView {
    type Handle = Uuid;

    fn add_marker(&mut self, find: &Find) -> Uuid {
        self.markers.insert(
            find.id,
            CanvasMarker {
                find: find.clone(),
                fill: color_from_hex(pin_color(find.rock_type)),
            },
        );
        find.id
    }

    fn remove_marker(&mut self, handle: Uuid) {
        self.markers.remove(&handle);
    }
}

/// Pan gesture state between canvas events
#[derive(Debug, Clone, Copy, Default)]
pub struct DragState {
    is_dragging: bool,
    last_position: Option<Point>,
    /// Total distance moved since the press; decides click vs drag
    moved: f32,
}

impl Program<Message> for MapView {
    type State = DragState;

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: Cursor,
    ) -> Vec<canvas::Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());
        let size = bounds.size();

        frame.fill_rectangle(Point::ORIGIN, size, WATER);

        // Graticule: one line per whole degree across the visible span
        let north_west = self.unproject(Point::ORIGIN, size);
        let south_east = self.unproject(Point::new(size.width, size.height), size);
        let grid_stroke = Stroke::default().with_color(GRID).with_width(1.0);

        let mut lng = south_east.lng.min(north_west.lng).ceil();
        while lng <= north_west.lng.max(south_east.lng) {
            let x = self.project(self.center.lat, lng, size).x;
            frame.stroke(
                &Path::line(Point::new(x, 0.0), Point::new(x, size.height)),
                grid_stroke.clone(),
            );
            lng += 1.0;
        }

        let mut lat = south_east.lat.ceil();
        while lat <= north_west.lat {
            let y = self.project(lat, self.center.lng, size).y;
            frame.stroke(
                &Path::line(Point::new(0.0, y), Point::new(size.width, y)),
                grid_stroke.clone(),
            );
            lat += 1.0;
        }

        // Markers: filled circle with a white outline
        for marker in self.markers.values() {
            let at = self.project(marker.find.lat, marker.find.lng, size);
            if at.x < -MARKER_RADIUS
                || at.y < -MARKER_RADIUS
                || at.x > size.width + MARKER_RADIUS
                || at.y > size.height + MARKER_RADIUS
            {
                continue;
            }

            let circle = Path::circle(at, MARKER_RADIUS);
            frame.fill(&circle, marker.fill);
            frame.stroke(
                &circle,
                Stroke::default()
                    .with_color(MARKER_STROKE)
                    .with_width(MARKER_STROKE_WIDTH),
            );
        }

        vec![frame.into_geometry()]
    }

    fn update(
        &self,
        state: &mut Self::State,
        event: canvas::Event,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> (canvas::event::Status, Option<Message>) {
        match event {
            // Mouse wheel for zooming
            canvas::Event::Mouse(mouse::Event::WheelScrolled { delta }) => {
                if cursor.position_in(bounds).is_none() {
                    return (canvas::event::Status::Ignored, None);
                }
                let zoom_delta = match delta {
                    mouse::ScrollDelta::Lines { y, .. } => y * 0.5,
                    mouse::ScrollDelta::Pixels { y, .. } => y * 0.01,
                };
                (
                    canvas::event::Status::Captured,
                    Some(Message::MapZoomed(zoom_delta)),
                )
            }

            // Mouse button press - start a potential drag
            canvas::Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)) => {
                if let Some(position) = cursor.position_in(bounds) {
                    state.is_dragging = true;
                    state.last_position = Some(position);
                    state.moved = 0.0;
                    return (canvas::event::Status::Captured, None);
                }
                (canvas::event::Status::Ignored, None)
            }

            // Mouse move - pan if dragging
            canvas::Event::Mouse(mouse::Event::CursorMoved { .. }) => {
                if !state.is_dragging {
                    return (canvas::event::Status::Ignored, None);
                }
                if let (Some(position), Some(last)) =
                    (cursor.position_in(bounds), state.last_position)
                {
                    let dx = position.x - last.x;
                    let dy = position.y - last.y;
                    state.last_position = Some(position);
                    state.moved += dx.abs() + dy.abs();
                    if state.moved > CLICK_SLOP {
                        return (
                            canvas::event::Status::Captured,
                            Some(Message::MapPanned { dx, dy }),
                        );
                    }
                }
                (canvas::event::Status::Captured, None)
            }

            // Mouse button release - a short press is a marker click
            canvas::Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left)) => {
                let was_click = state.is_dragging && state.moved <= CLICK_SLOP;
                state.is_dragging = false;
                state.last_position = None;

                if was_click {
                    if let Some(position) = cursor.position_in(bounds) {
                        if let Some(find) = self.hit_test(position, bounds.size()) {
                            return (
                                canvas::event::Status::Captured,
                                Some(Message::FindSelected(find.clone())),
                            );
                        }
                    }
                }
                (canvas::event::Status::Captured, None)
            }

            _ => (canvas::event::Status::Ignored, None),
        }
    }

    fn mouse_interaction(
        &self,
        state: &Self::State,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> mouse::Interaction {
        if state.is_dragging {
            mouse::Interaction::Grabbing
        } else if cursor
            .position_in(bounds)
            .is_some_and(|p| self.hit_test(p, bounds.size()).is_some())
        {
            mouse::Interaction::Pointer
        } else {
            mouse::Interaction::default()
        }
    }
}

/// Parse a "#RRGGBB" color. Falls back to gray on anything malformed,
/// which cannot happen for the fixed pin color table.
pub fn color_from_hex(hex: &str) -> Color {
    fn channel(hex: &str, range: std::ops::Range<usize>) -> Option<u8> {
        u8::from_str_radix(hex.get(range)?, 16).ok()
    }

    let stripped = hex.strip_prefix('#').unwrap_or(hex);
    match (
        channel(stripped, 0..2),
        channel(stripped, 2..4),
        channel(stripped, 4..6),
    ) {
        (Some(r), Some(g), Some(b)) => Color::from_rgb8(r, g, b),
        _ => Color::from_rgb8(0x6B, 0x72, 0x80),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finds::RockType;
    use chrono::Utc;

    fn find(rock_type: RockType, lat: f64, lng: f64) -> Find {
        Find {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            rock_type,
            note: None,
            photo_path: "test/photo.jpg".to_string(),
            lat,
            lng,
            created_at: Utc::now(),
        }
    }

    fn view() -> MapView {
        MapView::new(Coordinates { lat: 44.8, lng: -85.5 }, 7.0)
    }

    #[test]
    fn test_copper_marker_fill_color() {
        let mut map = view();
        let copper = find(RockType::Copper, 44.8, -85.5);
        map.add_marker(&copper);

        let marker = map.markers.get(&copper.id).unwrap();
        assert_eq!(marker.fill, Color::from_rgb8(0xD9, 0x77, 0x06));
    }

    #[test]
    fn test_color_from_hex() {
        assert_eq!(color_from_hex("#FFFFFF"), Color::from_rgb8(255, 255, 255));
        assert_eq!(color_from_hex("#2563EB"), Color::from_rgb8(0x25, 0x63, 0xEB));
        // Malformed input falls back to gray
        assert_eq!(color_from_hex("#XYZ"), Color::from_rgb8(0x6B, 0x72, 0x80));
    }

    #[test]
    fn test_add_and_remove_marker() {
        let mut map = view();
        let f = find(RockType::Quartz, 45.0, -85.0);

        let handle = map.add_marker(&f);
        assert_eq!(handle, f.id);
        assert_eq!(map.marker_count(), 1);

        map.remove_marker(handle);
        assert_eq!(map.marker_count(), 0);
    }

    #[test]
    fn test_projection_round_trip() {
        let map = view();
        let size = Size::new(800.0, 600.0);

        // The view center lands in the middle of the canvas
        let center = map.project(44.8, -85.5, size);
        assert!((center.x - 400.0).abs() < 0.01);
        assert!((center.y - 300.0).abs() < 0.01);

        let back = map.unproject(Point::new(520.0, 210.0), size);
        let again = map.project(back.lat, back.lng, size);
        assert!((again.x - 520.0).abs() < 0.01);
        assert!((again.y - 210.0).abs() < 0.01);
    }

    #[test]
    fn test_hit_test_finds_nearest_marker() {
        let mut map = view();
        let size = Size::new(800.0, 600.0);

        let near = find(RockType::Agate, 44.8, -85.5);
        let far = find(RockType::Other, 45.5, -84.0);
        map.add_marker(&near);
        map.add_marker(&far);

        let at_center = map.hit_test(Point::new(400.0, 300.0), size).unwrap();
        assert_eq!(at_center.id, near.id);

        // Just outside the marker's reach
        let outside = Point::new(400.0 + MARKER_RADIUS + MARKER_STROKE_WIDTH + 1.0, 300.0);
        assert!(map.hit_test(outside, size).is_none());
        assert!(map.hit_test(Point::new(700.0, 50.0), size).is_none());
    }

    #[test]
    fn test_pan_moves_center() {
        let mut map = view();
        // Drag content to the right: the view center moves west
        map.pan_by(100.0, 0.0);
        assert!(map.center.lng < -85.5);

        // Drag down: the view center moves north
        let lat_before = map.center.lat;
        map.pan_by(0.0, 50.0);
        assert!(map.center.lat > lat_before);
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut map = view();
        map.zoom_by(100.0);
        assert_eq!(map.zoom, MAX_ZOOM);
        map.zoom_by(-100.0);
        assert_eq!(map.zoom, MIN_ZOOM);
    }
}
