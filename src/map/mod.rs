/// Map marker management
///
/// This module handles:
/// - The MapWidget trait: the seam between find records and whichever
///   widget actually draws markers (sync.rs only sees this trait)
/// - The MarkerSynchronizer: reconciles the current find set against the
///   widget's live marker set (sync.rs)

pub mod sync;

use crate::finds::Find;

/// Marker circle radius in pixels
pub const MARKER_RADIUS: f32 = 9.0;

/// Marker stroke width in pixels (white outline around the fill)
pub const MARKER_STROKE_WIDTH: f32 = 2.0;

/// Marker primitives exposed by a live map widget.
///
/// `Handle` is the widget's native reference to one drawn marker. The
/// synchronizer owns handles and returns them to the widget for removal;
/// it never inspects them.
///
/// The widget receives the full `Find` at marker creation so that marker
/// selection can hand the record back to the application.
pub trait MapWidget {
    type Handle;

    /// Draw a marker at the find's coordinates, filled per its rock type.
    fn add_marker(&mut self, find: &Find) -> Self::Handle;

    /// Remove a previously added marker from the display.
    fn remove_marker(&mut self, handle: Self::Handle);
}
