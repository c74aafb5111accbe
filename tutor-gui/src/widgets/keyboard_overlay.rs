//! # Keyboard Overlay Widget
//!
//! Draws the virtual keyboard the way it sits over the camera image: one
//! trapezoid per key in video pixel space, scaled to the canvas. Sounding
//! keys light up and the tracked fingertips are drawn as dots.
//!
//! ## Features
//! - Perspective key outlines, black keys on top
//! - Highlight for every sounding note
//! - Fingertip markers, filled while pressing
//! - Pointer input standing in for the hand tracker

use iced::widget::canvas::{self, event, Event, Frame, Geometry, Path, Stroke, Text};
use iced::widget::container;
use iced::{mouse, Color, Element, Length, Pixels, Point, Rectangle, Renderer, Size, Theme};
use tutor_core::keyboard::{self, KeyRegion};
use tutor_core::note::NoteName;

use crate::Message;

const SOUNDING_COLOR: Color = Color::from_rgb(0.204, 0.859, 0.596);
const FINGERTIP_RADIUS: f32 = 5.0;

/// A fingertip to draw, in video pixel space.
#[derive(Debug, Clone, Copy)]
pub struct FingertipMarker {
    pub position: keyboard::Point,
    pub pressing: bool,
}

/// Canvas program showing the keyboard overlay.
#[derive(Debug, Clone)]
pub struct KeyboardOverlay {
    regions: Vec<KeyRegion>,
    sounding: Vec<NoteName>,
    fingertips: Vec<FingertipMarker>,
    /// Size of the video frame the regions are expressed in.
    frame_size: Size,
    /// Flip horizontally so the user sees themselves as in a mirror.
    mirrored: bool,
}

impl KeyboardOverlay {
    pub fn new(
        regions: Vec<KeyRegion>,
        sounding: Vec<NoteName>,
        fingertips: Vec<FingertipMarker>,
        frame_size: Size,
        mirrored: bool,
    ) -> Self {
        Self {
            regions,
            sounding,
            fingertips,
            frame_size,
            mirrored,
        }
    }

    // Consumes `self` so the canvas can own it.
    pub fn view(self) -> Element<'static, Message> {
        container(
            canvas::Canvas::new(self)
                .width(Length::Fill)
                .height(Length::Fill),
        )
        .into()
    }

    fn scale(&self, bounds: Size) -> (f32, f32) {
        (
            bounds.width / self.frame_size.width.max(1.0),
            bounds.height / self.frame_size.height.max(1.0),
        )
    }

    /// Canvas position to video pixel space.
    fn to_video(&self, bounds: Size, position: Point) -> keyboard::Point {
        let (sx, sy) = self.scale(bounds);
        let x = position.x / sx;
        let x = if self.mirrored { self.frame_size.width - x } else { x };
        keyboard::Point::new(x, position.y / sy)
    }

    /// Video pixel space to canvas position.
    fn to_canvas(&self, bounds: Size, point: keyboard::Point) -> Point {
        let (sx, sy) = self.scale(bounds);
        let x = if self.mirrored { self.frame_size.width - point.x } else { point.x };
        Point::new(x * sx, point.y * sy)
    }

    fn key_path(&self, bounds: Size, region: &KeyRegion) -> Path {
        Path::new(|builder| {
            let mut corners = region.polygon.iter().map(|p| self.to_canvas(bounds, *p));
            if let Some(first) = corners.next() {
                builder.move_to(first);
                for corner in corners {
                    builder.line_to(corner);
                }
                builder.close();
            }
        })
    }

    fn draw_key(&self, frame: &mut Frame, bounds: Size, region: &KeyRegion) {
        let sounding = self.sounding.contains(&region.note);
        let fill = match (sounding, region.is_black()) {
            (true, _) => SOUNDING_COLOR,
            (false, true) => Color::from_rgba(0.05, 0.05, 0.05, 0.85),
            (false, false) => Color::from_rgba(1.0, 1.0, 1.0, 0.35),
        };

        let path = self.key_path(bounds, region);
        frame.fill(&path, fill);
        frame.stroke(
            &path,
            Stroke::default().with_color(Color::BLACK).with_width(1.0),
        );

        if !region.is_black() {
            let label_at = self.to_canvas(bounds, region.centroid());
            frame.fill_text(Text {
                content: region.note.to_string(),
                position: Point::new(label_at.x - 8.0, label_at.y + 20.0),
                color: Color::from_rgb(0.2, 0.2, 0.2),
                size: Pixels(11.0),
                ..Text::default()
            });
        }
    }
}

impl canvas::Program<Message> for KeyboardOverlay {
    type State = ();

    fn update(
        &self,
        _state: &mut Self::State,
        event: Event,
        bounds: Rectangle,
        cursor: mouse::Cursor,
    ) -> (event::Status, Option<Message>) {
        match event {
            Event::Mouse(mouse::Event::CursorMoved { .. }) => {
                let position = cursor
                    .position_in(bounds)
                    .map(|p| self.to_video(bounds.size(), p));
                (event::Status::Ignored, Some(Message::PointerMoved(position)))
            }
            Event::Mouse(mouse::Event::CursorLeft) => {
                (event::Status::Ignored, Some(Message::PointerMoved(None)))
            }
            Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left))
                if cursor.is_over(bounds) =>
            {
                (event::Status::Captured, Some(Message::PointerPressed(true)))
            }
            Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left)) => {
                (event::Status::Captured, Some(Message::PointerPressed(false)))
            }
            _ => (event::Status::Ignored, None),
        }
    }

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());
        let size = bounds.size();

        frame.fill_rectangle(Point::ORIGIN, size, Color::from_rgb(0.12, 0.13, 0.15));

        // White keys first so black keys paint over the seams.
        for region in self.regions.iter().filter(|r| !r.is_black()) {
            self.draw_key(&mut frame, size, region);
        }
        for region in self.regions.iter().filter(|r| r.is_black()) {
            self.draw_key(&mut frame, size, region);
        }

        for tip in &self.fingertips {
            let center = self.to_canvas(size, tip.position);
            let dot = Path::circle(center, FINGERTIP_RADIUS);
            if tip.pressing {
                frame.fill(&dot, Color::from_rgb(0.9, 0.3, 0.2));
            } else {
                frame.stroke(
                    &dot,
                    Stroke::default()
                        .with_color(Color::from_rgb(0.9, 0.9, 0.2))
                        .with_width(2.0),
                );
            }
        }

        vec![frame.into_geometry()]
    }
}
