/// Recent-finds feed
///
/// Passive list presentation of find records, newest first. Expects rows
/// already sorted descending by created_at; shows the photo, rock type,
/// timestamp, note, and coordinates.

use std::path::PathBuf;

use iced::widget::{column, container, image, row, scrollable, text, Column};
use iced::{Element, Length};

use crate::finds::Find;
use crate::Message;

/// One find as a card: thumbnail on the left, details on the right.
/// `photo_url` resolves an object-store key to a displayable location.
pub fn find_card<'a>(
    find: &'a Find,
    photo_url: &dyn Fn(&str) -> PathBuf,
) -> Element<'a, Message> {
    let thumbnail = image(image::Handle::from_path(photo_url(&find.photo_path)))
        .width(80)
        .height(80);

    let mut details = column![
        text(find.rock_type.as_str()).size(16),
        text(
            find.created_at
                .with_timezone(&chrono::Local)
                .format("%b %e, %Y %l:%M %p")
                .to_string()
        )
        .size(12),
    ]
    .spacing(2);

    if let Some(note) = &find.note {
        details = details.push(text(note.as_str()).size(14));
    }

    details = details.push(text(format!("{:.4}, {:.4}", find.lat, find.lng)).size(12));

    container(row![thumbnail, details].spacing(12))
        .padding(12)
        .width(Length::Fill)
        .style(container::rounded_box)
        .into()
}

/// The scrollable feed pane
pub fn feed<'a>(
    finds: &'a [Find],
    photo_url: &dyn Fn(&str) -> PathBuf,
) -> Element<'a, Message> {
    let mut cards: Column<Message> = column![text("Recent Finds").size(18)].spacing(10);

    if finds.is_empty() {
        cards = cards.push(text("No finds yet.").size(14));
    } else {
        for find in finds {
            cards = cards.push(find_card(find, photo_url));
        }
    }

    scrollable(container(cards).padding(12))
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}
