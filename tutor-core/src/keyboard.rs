//! # Keyboard Geometry Module
//!
//! The virtual piano overlaid on the camera image. Every key is a
//! quadrilateral in video pixel space; white keys are wide trapezoids that
//! narrow toward the far edge, black keys are narrow trapezoids sitting on
//! the seams between white keys.
//!
//! ## Features
//! - Ray-casting point-in-polygon hit testing
//! - Black keys always win over the white keys they overlap
//! - Perspective layout generator for a receding keyboard
//! - Reversed key order for mirrored (selfie view) video

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::hand::Keypoint;
use crate::note::NoteName;

/// A 2D point in video pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<Keypoint> for Point {
    fn from(k: Keypoint) -> Self {
        Self { x: k.x, y: k.y }
    }
}

/// One playable key: its note and the four corners of its region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyRegion {
    pub note: NoteName,
    pub polygon: [Point; 4],
}

impl KeyRegion {
    pub fn is_black(&self) -> bool {
        self.note.is_black()
    }

    pub fn contains(&self, point: Point) -> bool {
        point_in_polygon(point, &self.polygon)
    }

    /// Average of the four corners. Always inside a convex key.
    pub fn centroid(&self) -> Point {
        let (sx, sy) = self
            .polygon
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Point::new(sx / 4.0, sy / 4.0)
    }
}

/// Even-odd ray casting test.
///
/// A horizontal ray is cast from `point` towards +x and edge crossings are
/// counted. Points exactly on an edge may land on either side, but the
/// answer is always the same for the same input.
pub fn point_in_polygon(point: Point, polygon: &[Point]) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (pi, pj) = (polygon[i], polygon[j]);
        if (pi.y > point.y) != (pj.y > point.y) {
            let crossing_x = (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x;
            if point.x < crossing_x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// The fixed set of key regions, stored with black keys first.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyboardLayout {
    regions: Vec<KeyRegion>,
}

impl KeyboardLayout {
    /// Builds a layout from static region data.
    ///
    /// Regions are reordered so that every black key is tested before any
    /// white key; relative order within each colour is preserved.
    pub fn new(regions: Vec<KeyRegion>) -> Self {
        let (mut ordered, white): (Vec<_>, Vec<_>) =
            regions.into_iter().partition(|r| r.is_black());
        ordered.extend(white);
        Self { regions: ordered }
    }

    /// Generates the perspective layout described by `spec`.
    pub fn from_spec(spec: &LayoutSpec) -> Result<Self, ConfigError> {
        spec.validate()?;

        let mut whites = Vec::with_capacity(spec.white_key_count);
        let mut note = Some(spec.lowest_white);
        while whites.len() < spec.white_key_count {
            let current = note.ok_or_else(|| {
                ConfigError::Invalid("keyboard runs past the highest MIDI note".to_string())
            })?;
            if !current.is_black() {
                whites.push(current);
            }
            note = current.next();
        }

        let n = spec.white_key_count as f32;
        let mut regions = Vec::with_capacity(spec.white_key_count * 2);

        for (i, white) in whites.iter().enumerate() {
            let u0 = i as f32 / n;
            let u1 = (i + 1) as f32 / n;
            regions.push(KeyRegion {
                note: *white,
                polygon: spec.quad(u0, u1, 1.0),
            });

            // A black key sits on the seam after this white key if the next
            // semitone up is black and another white key follows it.
            if i + 1 < whites.len() {
                if let Some(black) = white.next().filter(|b| b.is_black()) {
                    let half = spec.black_key_width / (2.0 * n);
                    let seam = u1;
                    regions.push(KeyRegion {
                        note: black,
                        polygon: spec.quad(seam - half, seam + half, spec.black_key_length),
                    });
                }
            }
        }

        if spec.reversed {
            regions.reverse();
        }

        Ok(Self::new(regions))
    }

    /// Finds the key containing `point`. Black keys take precedence.
    pub fn locate(&self, point: Point) -> Option<&KeyRegion> {
        self.regions.iter().find(|region| region.contains(point))
    }

    /// All regions, black keys first.
    pub fn regions(&self) -> &[KeyRegion] {
        &self.regions
    }

    pub fn region(&self, note: NoteName) -> Option<&KeyRegion> {
        self.regions.iter().find(|region| region.note == note)
    }
}

/// Parameters of the generated perspective keyboard.
///
/// The keyboard is described in normalised coordinates: `u` runs across the
/// keys (0 = lowest note), `v` runs from the far edge (0) to the near edge
/// (1). The far edge is drawn narrower than the near edge to suggest a
/// keyboard receding from the viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSpec {
    /// Lowest white key.
    pub lowest_white: NoteName,
    /// Number of white keys; black keys are added between them.
    pub white_key_count: usize,
    /// Video frame size in pixels.
    pub frame_width: f32,
    pub frame_height: f32,
    /// Pixel row of the far (top) edge of the keyboard.
    pub far_y: f32,
    /// Pixel row of the near (bottom) edge of the keyboard.
    pub near_y: f32,
    /// Share of the frame width spanned by the near edge.
    pub near_width: f32,
    /// Far edge width relative to the near edge.
    pub far_scale: f32,
    /// Black key width relative to a white key.
    pub black_key_width: f32,
    /// Black key length relative to a white key.
    pub black_key_length: f32,
    /// Lay keys out high-to-low across the raw frame, so that they read
    /// low-to-high once the video is shown mirrored.
    pub reversed: bool,
}

impl Default for LayoutSpec {
    /// Two octaves from C3 on a 640x480 frame, drawn in the lower part of
    /// the picture where the hands rest.
    fn default() -> Self {
        Self {
            lowest_white: NoteName::C3,
            white_key_count: 14,
            frame_width: 640.0,
            frame_height: 480.0,
            far_y: 300.0,
            near_y: 470.0,
            near_width: 0.95,
            far_scale: 0.75,
            black_key_width: 0.6,
            black_key_length: 0.62,
            reversed: true,
        }
    }
}

impl LayoutSpec {
    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));
        if self.white_key_count == 0 {
            return invalid("white_key_count must be at least 1");
        }
        if self.lowest_white.is_black() {
            return invalid("lowest_white must be a white key");
        }
        if !(self.near_y > self.far_y) {
            return invalid("near_y must be below far_y");
        }
        if !(self.far_scale > 0.0 && self.far_scale <= 1.0) {
            return invalid("far_scale must be in (0, 1]");
        }
        if !(self.near_width > 0.0) || !(self.black_key_width > 0.0 && self.black_key_width < 1.0) {
            return invalid("key widths must be positive and black keys narrower than white");
        }
        if !(self.black_key_length > 0.0 && self.black_key_length <= 1.0) {
            return invalid("black_key_length must be in (0, 1]");
        }
        Ok(())
    }

    /// Maps normalised keyboard coordinates to video pixels.
    fn project(&self, u: f32, v: f32) -> Point {
        let u = if self.reversed { 1.0 - u } else { u };
        let scale = self.far_scale + (1.0 - self.far_scale) * v;
        let centre = self.frame_width / 2.0;
        let span = self.frame_width * self.near_width;
        Point::new(
            centre + (u - 0.5) * span * scale,
            self.far_y + (self.near_y - self.far_y) * v,
        )
    }

    /// Key outline from the far edge down to `length`.
    fn quad(&self, u0: f32, u1: f32, length: f32) -> [Point; 4] {
        [
            self.project(u0, 0.0),
            self.project(u1, 0.0),
            self.project(u1, length),
            self.project(u0, length),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(s: &str) -> NoteName {
        s.parse().unwrap()
    }

    fn square(note: &str, x0: f32, y0: f32, x1: f32, y1: f32) -> KeyRegion {
        KeyRegion {
            note: n(note),
            polygon: [
                Point::new(x0, y0),
                Point::new(x1, y0),
                Point::new(x1, y1),
                Point::new(x0, y1),
            ],
        }
    }

    #[test]
    fn ray_casting_inside_and_outside() {
        let key = square("C4", 0.0, 0.0, 10.0, 10.0);
        assert!(key.contains(Point::new(5.0, 5.0)));
        assert!(!key.contains(Point::new(15.0, 5.0)));
        assert!(!key.contains(Point::new(5.0, -1.0)));
        assert!(!point_in_polygon(Point::new(0.0, 0.0), &[Point::new(0.0, 0.0)]));
    }

    #[test]
    fn black_key_wins_overlap_regardless_of_input_order() {
        let layout = KeyboardLayout::new(vec![
            square("C4", 0.0, 0.0, 10.0, 20.0),
            square("Db4", 7.0, 0.0, 13.0, 12.0),
            square("D4", 10.0, 0.0, 20.0, 20.0),
        ]);
        assert!(layout.regions()[0].is_black());
        assert_eq!(layout.locate(Point::new(8.0, 5.0)).unwrap().note, n("Db4"));
        assert_eq!(layout.locate(Point::new(8.0, 15.0)).unwrap().note, n("C4"));
        assert_eq!(layout.locate(Point::new(18.0, 5.0)).unwrap().note, n("D4"));
        assert!(layout.locate(Point::new(50.0, 5.0)).is_none());
    }

    #[test]
    fn locate_is_deterministic_on_edges() {
        let layout = KeyboardLayout::from_spec(&LayoutSpec::default()).unwrap();
        let seam = layout.regions()[0].polygon[0];
        let first = layout.locate(seam).map(|r| r.note);
        for _ in 0..10 {
            assert_eq!(layout.locate(seam).map(|r| r.note), first);
        }
    }

    #[test]
    fn default_layout_has_two_octaves() {
        let layout = KeyboardLayout::from_spec(&LayoutSpec::default()).unwrap();
        let whites = layout.regions().iter().filter(|r| !r.is_black()).count();
        let blacks = layout.regions().iter().filter(|r| r.is_black()).count();
        assert_eq!(whites, 14);
        assert_eq!(blacks, 10);
        assert!(layout.region(n("C3")).is_some());
        assert!(layout.region(n("B4")).is_some());
        assert!(layout.region(n("C5")).is_none());
    }

    #[test]
    fn every_key_resolves_to_itself_at_its_centroid() {
        let layout = KeyboardLayout::from_spec(&LayoutSpec::default()).unwrap();
        for region in layout.regions() {
            let hit = layout.locate(region.centroid()).unwrap();
            assert_eq!(hit.note, region.note);
        }
    }

    #[test]
    fn reversed_layout_puts_low_notes_on_the_right_of_the_raw_frame() {
        let layout = KeyboardLayout::from_spec(&LayoutSpec::default()).unwrap();
        let c3 = layout.region(n("C3")).unwrap().centroid();
        let b4 = layout.region(n("B4")).unwrap().centroid();
        assert!(c3.x > b4.x);

        let plain = KeyboardLayout::from_spec(&LayoutSpec {
            reversed: false,
            ..LayoutSpec::default()
        })
        .unwrap();
        let c3 = plain.region(n("C3")).unwrap().centroid();
        let b4 = plain.region(n("B4")).unwrap().centroid();
        assert!(c3.x < b4.x);
    }

    #[test]
    fn far_edge_is_narrower_than_near_edge() {
        let layout = KeyboardLayout::from_spec(&LayoutSpec::default()).unwrap();
        let e4 = layout.region(n("E4")).unwrap();
        let far = (e4.polygon[1].x - e4.polygon[0].x).abs();
        let near = (e4.polygon[2].x - e4.polygon[3].x).abs();
        assert!(far < near);
    }

    #[test]
    fn rejects_invalid_specs() {
        let black_start = LayoutSpec {
            lowest_white: n("Db3"),
            ..LayoutSpec::default()
        };
        assert!(KeyboardLayout::from_spec(&black_start).is_err());

        let empty = LayoutSpec {
            white_key_count: 0,
            ..LayoutSpec::default()
        };
        assert!(KeyboardLayout::from_spec(&empty).is_err());

        let upside_down = LayoutSpec {
            far_y: 470.0,
            near_y: 300.0,
            ..LayoutSpec::default()
        };
        assert!(KeyboardLayout::from_spec(&upside_down).is_err());
    }
}
