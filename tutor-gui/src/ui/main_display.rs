//! # Main Display Module
//!
//! This module contains the main display components and layout logic
//! for the piano tutor: the keyboard overlay, a status panel and the
//! settings sidebar.

use iced::widget::{button, column, container, row, text, Space};
use iced::{Alignment, Color, Element, Length, Size};
use tutor_core::detection::DetectorStatus;
use tutor_core::session::PracticeMode;

use crate::widgets::keyboard_overlay::{FingertipMarker, KeyboardOverlay};
use crate::{AppDisplayData, Message};

/// Configuration for a single button in the settings sidebar
#[derive(Debug, Clone)]
struct ButtonConfig {
    label: &'static str,
    message: Message,
}

const SETTINGS_CONFIG: &[(&str, &[ButtonConfig])] = &[
    ("Practice", &[
        ButtonConfig { label: "Left hand", message: Message::SetPracticeMode(PracticeMode::Left) },
        ButtonConfig { label: "Right hand", message: Message::SetPracticeMode(PracticeMode::Right) },
        ButtonConfig { label: "Both hands", message: Message::SetPracticeMode(PracticeMode::Both) },
        ButtonConfig { label: "Reset session", message: Message::ResetSession },
    ]),
    ("Program", &[
        ButtonConfig { label: "Export session", message: Message::ExportSession },
        ButtonConfig { label: "Save config", message: Message::SaveConfig },
        ButtonConfig { label: "Load config", message: Message::LoadConfig },
        ButtonConfig { label: "Exit", message: Message::Exit },
    ]),
];

/// Creates the complete main application view
pub fn create_main_view(data: &AppDisplayData) -> Element<'static, Message> {
    let title = text("Piano Tutor").size(28);

    let main_content = row![
        column![
            title,
            Space::with_height(10),
            create_overlay_panel(data),
            create_status_panel(data),
        ]
        .width(Length::Fill)
        .spacing(10),
        Space::with_width(10),
        create_sidebar(data.practice_mode),
    ]
    .align_y(Alignment::Start)
    .padding(20);

    container(main_content)
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}

fn create_overlay_panel(data: &AppDisplayData) -> Element<'static, Message> {
    let (sounding, fingertips) = match &data.last_report {
        Some(report) => (
            report.sounding.iter().map(|n| n.note).collect(),
            report
                .hands
                .iter()
                .flat_map(tutor_core::press::fingertips)
                .map(|tip| FingertipMarker {
                    position: tip.position,
                    pressing: data.press.is_pressing(&tip),
                })
                .collect(),
        ),
        None => (Vec::new(), Vec::new()),
    };

    let overlay = KeyboardOverlay::new(
        data.regions.clone(),
        sounding,
        fingertips,
        Size::new(data.frame_size.0, data.frame_size.1),
        data.mirrored_video,
    );

    container(overlay.view())
        .width(Length::Fill)
        .height(Length::FillPortion(4))
        .into()
}

fn status_line(status: &DetectorStatus) -> (String, Color) {
    match status {
        DetectorStatus::Loading => ("Loading hand tracker...".to_string(), Color::from_rgb(1.0, 0.84, 0.0)),
        DetectorStatus::Ready => ("Hand tracking ready".to_string(), Color::from_rgb(0.2, 0.8, 0.2)),
        DetectorStatus::Unavailable(reason) => (
            format!("Hand tracking unavailable: {}", reason),
            Color::from_rgb(0.9, 0.3, 0.3),
        ),
    }
}

fn create_status_panel(data: &AppDisplayData) -> Element<'static, Message> {
    let (status_text, status_color) = status_line(&data.detector_status);
    let current_note = data
        .current_note
        .map(|n| format!("{}  {:.2} Hz", n, n.frequency()))
        .unwrap_or_else(|| "--".to_string());

    let events = data
        .event_log
        .iter()
        .fold(column![].spacing(2), |col, line| col.push(text(line.clone()).size(13)));

    container(
        column![
            text(status_text).size(14).color(status_color),
            row![
                text("Note").size(14),
                Space::with_width(10),
                text(current_note).size(24),
            ]
            .align_y(Alignment::Center),
            text(format!(
                "Played {}  |  Mode {:?}",
                data.played_count, data.practice_mode
            ))
            .size(13),
            events,
        ]
        .spacing(6)
        .padding(15),
    )
    .width(Length::Fill)
    .height(Length::FillPortion(2))
    .into()
}

fn create_sidebar(practice_mode: PracticeMode) -> Element<'static, Message> {
    let mut sections = column![].spacing(10);
    for (title, buttons) in SETTINGS_CONFIG {
        sections = sections.push(make_settings_section(title, buttons, practice_mode));
    }

    container(sections.padding(15))
        .width(Length::Fixed(220.0))
        .height(Length::Fill)
        .into()
}

/// Creates a button, highlighted when it selects the active practice mode.
fn make_button(config: &ButtonConfig, practice_mode: PracticeMode) -> Element<'static, Message> {
    let mut widget = button(text(config.label).size(14).width(Length::Fill)).padding([6, 10]);

    if matches!(&config.message, Message::SetPracticeMode(mode) if *mode == practice_mode) {
        widget = widget.style(|_theme, _status| button::Style {
            background: Some(iced::Background::Color(Color::from_rgb(0.2, 0.6, 0.4))),
            text_color: Color::WHITE,
            ..button::Style::default()
        });
    }

    widget.on_press(config.message.clone()).into()
}

fn make_settings_section(
    title: &'static str,
    buttons: &[ButtonConfig],
    practice_mode: PracticeMode,
) -> Element<'static, Message> {
    let items = buttons
        .iter()
        .fold(column![].spacing(8), |col, config| col.push(make_button(config, practice_mode)));

    column![text(title).size(18), Space::with_height(10), items]
        .spacing(5)
        .into()
}
