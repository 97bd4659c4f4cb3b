/// UI widgets
///
/// - map.rs: the interactive map canvas (markers, pan, zoom, selection)
/// - feed.rs: the recent-finds list

pub mod feed;
pub mod map;
