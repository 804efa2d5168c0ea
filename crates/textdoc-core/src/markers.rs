//! Highlight markers and watchdog marker patterns.

use crate::ranges::{RangeCollection, TextRange, normalize_range};
use regex::Regex;
use std::collections::BTreeMap;

/// Well-known marker ids.
pub struct MarkerIds;

impl MarkerIds {
    /// Markers set by the host.
    pub const DEFAULT: i32 = 0;
    /// URL markers produced by URL marking.
    pub const URL: i32 = 1;
    /// IME composition markers.
    pub const IME: i32 = -1;
}

/// How a marker is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HilightType {
    /// Not drawn.
    #[default]
    None,
    /// Drawn like a selection.
    Select,
    /// Drawn as a link.
    Url,
    /// Solid underline.
    Sold,
    /// Dashed underline.
    Dash,
    /// Dash-dot underline.
    DashDot,
    /// Dash-dot-dot underline.
    DashDotDot,
    /// Dotted underline.
    Dot,
    /// Wavy underline.
    Squiggle,
}

/// ARGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    /// Alpha.
    pub a: u8,
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
}

impl Color {
    /// Create a color.
    pub const fn new(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self { a, r, g, b }
    }
}

/// A highlighted range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Marker {
    /// First character.
    pub start: usize,
    /// Length in characters.
    pub length: usize,
    /// Drawing style.
    pub hilight: HilightType,
    /// Color, transparent black meaning "renderer default".
    pub color: Color,
    /// Draw the line bold.
    pub bold: bool,
}

impl Marker {
    /// A marker with default color; a negative `length` extends backwards from `start`.
    pub fn new(start: usize, length: isize, hilight: HilightType) -> Self {
        Self::with_color(start, length, hilight, Color::default(), false)
    }

    /// A marker with explicit color and weight.
    pub fn with_color(start: usize, length: isize, hilight: HilightType, color: Color, bold: bool) -> Self {
        let (start, length) = normalize_range(start, length);
        Self {
            start,
            length,
            hilight,
            color,
            bold,
        }
    }
}

impl TextRange for Marker {
    fn start(&self) -> usize {
        self.start
    }

    fn length(&self) -> usize {
        self.length
    }

    fn set_start(&mut self, start: usize) {
        self.start = start;
    }

    fn set_length(&mut self, length: usize) {
        self.length = length;
    }
}

/// Markers grouped by id.
#[derive(Debug, Clone, Default)]
pub struct MarkerCollection {
    by_id: BTreeMap<i32, RangeCollection<Marker>>,
}

impl MarkerCollection {
    /// Empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a marker under `id`, replacing the markers it overlaps.
    pub fn add(&mut self, id: i32, marker: Marker) {
        let markers = self.by_id.entry(id).or_default();
        markers.remove_nearest(marker.start, marker.length);
        markers.add(marker);
    }

    /// Add several markers under `id`.
    pub fn add_range<I: IntoIterator<Item = Marker>>(&mut self, id: i32, markers: I) {
        for marker in markers {
            self.add(id, marker);
        }
    }

    /// Registered ids.
    pub fn ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.by_id.keys().copied()
    }

    /// All markers under `id`.
    pub fn get(&self, id: i32) -> impl Iterator<Item = &Marker> + '_ {
        self.by_id.get(&id).into_iter().flat_map(|c| c.iter())
    }

    /// The marker under `id` containing `index`.
    pub fn get_at(&self, id: i32, index: usize) -> Option<&Marker> {
        self.by_id.get(&id).and_then(|c| c.get_at(index))
    }

    /// Markers under `id` overlapping `[start, start + length)`.
    pub fn get_range(&self, id: i32, start: usize, length: usize) -> Vec<Marker> {
        self.by_id
            .get(&id)
            .map(|c| c.get(start, length).copied().collect())
            .unwrap_or_default()
    }

    /// Markers of every id overlapping `[start, start + length)`.
    pub fn get_all_in(&self, start: usize, length: usize) -> Vec<Marker> {
        self.by_id
            .values()
            .flat_map(|c| c.get(start, length).copied())
            .collect()
    }

    /// Drop the markers under `id` touching `[start, start + length)`.
    pub fn remove_all_in(&mut self, id: i32, start: usize, length: usize) {
        if let Some(markers) = self.by_id.get_mut(&id) {
            markers.remove(start, length);
        }
    }

    /// Drop the markers under `id` drawn as `hilight`.
    pub fn remove_all_of_type(&mut self, id: i32, hilight: HilightType) {
        if let Some(markers) = self.by_id.get_mut(&id) {
            markers.retain(|m| m.hilight != hilight);
        }
    }

    /// Drop every marker under `id`.
    pub fn clear_id(&mut self, id: i32) {
        if let Some(markers) = self.by_id.get_mut(&id) {
            markers.clear();
        }
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.by_id.clear();
    }

    /// Shift markers after an edit at `start_index`.
    pub fn update_markers(&mut self, start_index: usize, inserted: usize, removed: usize) {
        for markers in self.by_id.values_mut() {
            markers.shift(start_index, removed, inserted);
        }
    }
}

/// Produces markers for one row of text at layout time.
pub trait MarkerPattern: Send + Sync {
    /// Markers (absolute offsets) for `text`, which starts at `line_head`.
    fn markers(&self, line_head: usize, text: &str) -> Vec<Marker>;
}

/// A [`MarkerPattern`] backed by a regex.
#[derive(Debug, Clone)]
pub struct RegexMarkerPattern {
    regex: Regex,
    hilight: HilightType,
    color: Color,
}

impl RegexMarkerPattern {
    /// Mark every match of `regex`.
    pub fn new(regex: Regex, hilight: HilightType, color: Color) -> Self {
        Self {
            regex,
            hilight,
            color,
        }
    }

    /// The pattern used for URL marking.
    pub fn url(color: Color) -> Result<Self, regex::Error> {
        let regex = Regex::new(r#"(https?|ftp)://[A-Za-z0-9\-._~:/?#\[\]@!$&'()*+,;=%]+"#)?;
        Ok(Self::new(regex, HilightType::Url, color))
    }
}

impl MarkerPattern for RegexMarkerPattern {
    fn markers(&self, line_head: usize, text: &str) -> Vec<Marker> {
        self.regex
            .find_iter(text)
            .map(|m| {
                let start = text[..m.start()].chars().count();
                let len = m.as_str().chars().count();
                Marker::with_color(line_head + start, len as isize, self.hilight, self.color, false)
            })
            .collect()
    }
}

/// Watchdog patterns keyed by marker id.
#[derive(Default)]
pub struct MarkerPatternSet {
    patterns: BTreeMap<i32, Box<dyn MarkerPattern>>,
}

impl MarkerPatternSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `pattern` under `id`, replacing any previous one.
    pub fn add<P: MarkerPattern + 'static>(&mut self, id: i32, pattern: P) {
        self.patterns.insert(id, Box::new(pattern));
    }

    /// Returns `true` if a pattern is installed under `id`.
    pub fn contains(&self, id: i32) -> bool {
        self.patterns.contains_key(&id)
    }

    /// Remove the pattern under `id`.
    pub fn remove(&mut self, id: i32) -> bool {
        self.patterns.remove(&id).is_some()
    }

    /// Returns `true` when no pattern is installed.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Markers every pattern produces for one row.
    pub fn markers(&self, line_head: usize, text: &str) -> Vec<Marker> {
        self.patterns
            .values()
            .flat_map(|p| p.markers(line_head, text))
            .collect()
    }
}

impl std::fmt::Debug for MarkerPatternSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkerPatternSet")
            .field("ids", &self.patterns.keys().collect::<Vec<_>>())
            .finish()
    }
}
