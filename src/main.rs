use iced::alignment::{Horizontal, Vertical};
use iced::widget::{
    button, canvas, column, container, horizontal_space, pick_list, row, stack, text, text_input,
};
use iced::{Alignment, Element, Length, Task, Theme};
use std::sync::Arc;

// Declare the application modules
mod capture;
mod config;
mod finds;
mod location;
mod map;
mod remote;
mod session;
mod ui;

use capture::{load_photo, save_find, CaptureError, CaptureState, FindForm, PhotoInput};
use config::AppConfig;
use finds::{Coordinates, Find, RockType, ROCK_TYPES};
use location::{locate_once, HomeLocation, LocationError};
use map::sync::MarkerSynchronizer;
use remote::local::LocalService;
use remote::{FindStore, Identity, ObjectStore, RemoteError, User};
use session::Session;
use ui::map::MapView;

/// How many recent finds the map and feed show
const FEED_LIMIT: usize = 200;

/// Main application state
struct Rockhound {
    /// The backend: find records, photo objects, identity
    service: Arc<LocalService>,
    /// Source of one-shot location fixes
    location: HomeLocation,
    /// Signed-in-user state; None until startup initialization finishes
    session: Option<Session>,
    /// Current find collection, newest first
    finds: Vec<Find>,
    /// The map canvas (owns the drawn markers)
    map: MapView,
    /// Keeps the map's markers in step with `finds`
    markers: MarkerSynchronizer<uuid::Uuid>,
    /// The add-find workflow
    capture: CaptureState,
    /// Find shown in the detail card after a marker click
    selected: Option<Find>,
    email_input: String,
    /// Sign-in failure shown inline on the sign-in screen
    auth_error: Option<String>,
    /// Dismissable status message
    notice: Option<String>,
}

/// Application messages (events)
#[derive(Debug, Clone)]
enum Message {
    /// Startup session initialization finished
    SessionReady(Result<Session, RemoteError>),
    /// The identity collaborator reported a session change (None when
    /// the subscription has closed)
    SessionEvent(Option<Option<User>>),
    EmailChanged(String),
    SignIn,
    SignedIn(Result<User, RemoteError>),
    SignOut,
    SignedOut(Result<(), RemoteError>),
    FindsLoaded(Result<Vec<Find>, RemoteError>),
    /// User tapped the floating + button
    AddFind,
    LocationFixed(Result<Coordinates, LocationError>),
    PickPhoto,
    PhotoLoaded(Result<PhotoInput, String>),
    RockTypePicked(RockType),
    NoteChanged(String),
    CancelCapture,
    SubmitCapture,
    SaveFinished(Result<Find, CaptureError>),
    /// User clicked a marker
    FindSelected(Find),
    CloseSelected,
    MapPanned { dx: f32, dy: f32 },
    MapZoomed(f32),
    DismissNotice,
}

impl Rockhound {
    /// Create a new instance of the application
    fn new() -> (Self, Task<Message>) {
        let data_dir = dirs::data_dir()
            .or_else(dirs::home_dir)
            .expect("Could not determine user data directory")
            .join("rockhound");

        // If this fails, we panic because the app cannot function without
        // its local storage
        let service = Arc::new(
            LocalService::new(data_dir.clone())
                .expect("Failed to initialize local storage. Check permissions and disk space."),
        );

        let config = AppConfig::load(&data_dir.join("config.json"));
        println!("🪨 Rockhound initialized");

        let app = Rockhound {
            service: service.clone(),
            location: HomeLocation::new(config.home_location),
            session: None,
            finds: Vec::new(),
            map: MapView::new(config.map_center, config.map_zoom),
            markers: MarkerSynchronizer::new(),
            capture: CaptureState::Idle,
            selected: None,
            email_input: String::new(),
            auth_error: None,
            notice: None,
        };

        let init = Task::perform(
            async move { Session::initialize(service.as_ref()).await },
            Message::SessionReady,
        );

        (app, init)
    }

    /// Wait for the next session change notification
    fn watch_session_task(&self) -> Task<Message> {
        match self.session.as_ref().and_then(Session::watcher) {
            Some(rx) => Task::perform(session::next_change(rx), Message::SessionEvent),
            None => Task::none(),
        }
    }

    /// Refresh the find collection from the backend
    fn load_finds_task(&self) -> Task<Message> {
        let service = self.service.clone();
        Task::perform(
            async move { service.recent_finds(FEED_LIMIT).await },
            Message::FindsLoaded,
        )
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::SessionReady(Ok(session)) => {
                let signed_in = session.is_signed_in();
                if let Some(user) = session.user() {
                    println!("🔑 Restored session for {}", user.email);
                }
                self.session = Some(session);

                let mut tasks = vec![self.watch_session_task()];
                if signed_in {
                    tasks.push(self.load_finds_task());
                }
                Task::batch(tasks)
            }
            Message::SessionReady(Err(e)) => {
                eprintln!("⚠️  Could not restore session: {e}");
                self.session = Some(Session::disconnected());
                Task::none()
            }

            Message::SessionEvent(None) => {
                // The identity collaborator went away; stop watching
                if let Some(session) = self.session.as_mut() {
                    session.shutdown();
                }
                Task::none()
            }
            Message::SessionEvent(Some(user)) => {
                if let Some(session) = self.session.as_mut() {
                    session.apply(user);
                }
                // apply marks the change seen, so this watcher waits for
                // the next one instead of re-observing it
                let rearm = self.watch_session_task();
                if self.session.as_ref().is_some_and(Session::is_signed_in) {
                    Task::batch(vec![rearm, self.load_finds_task()])
                } else {
                    // Signed out: clear everything user-visible
                    self.finds.clear();
                    self.markers.clear(&mut self.map);
                    self.selected = None;
                    self.capture = CaptureState::Idle;
                    self.notice = None;
                    rearm
                }
            }

            Message::EmailChanged(email) => {
                self.email_input = email;
                Task::none()
            }
            Message::SignIn => {
                let email = self.email_input.trim().to_string();
                if email.is_empty() {
                    return Task::none();
                }
                self.auth_error = None;
                let service = self.service.clone();
                Task::perform(
                    async move { service.sign_in(email).await },
                    Message::SignedIn,
                )
            }
            Message::SignedIn(Ok(_)) => {
                // The session itself updates via the change subscription
                self.email_input.clear();
                Task::none()
            }
            Message::SignedIn(Err(e)) => {
                self.auth_error = Some(e.to_string());
                Task::none()
            }
            Message::SignOut => {
                let service = self.service.clone();
                Task::perform(async move { service.sign_out().await }, Message::SignedOut)
            }
            Message::SignedOut(Ok(())) => Task::none(),
            Message::SignedOut(Err(e)) => {
                self.notice = Some(e.to_string());
                Task::none()
            }

            Message::FindsLoaded(Ok(finds)) => {
                println!("🪨 Loaded {} finds", finds.len());
                self.finds = finds;
                self.markers.reconcile(&self.finds, &mut self.map);
                Task::none()
            }
            Message::FindsLoaded(Err(e)) => {
                self.notice = Some(e.to_string());
                Task::none()
            }

            Message::AddFind => {
                if self.capture.request_location() {
                    let provider = self.location.clone();
                    Task::perform(
                        async move { locate_once(&provider).await },
                        Message::LocationFixed,
                    )
                } else {
                    Task::none()
                }
            }
            Message::LocationFixed(Ok(location)) => {
                self.capture.location_acquired(location);
                Task::none()
            }
            Message::LocationFixed(Err(e)) => {
                eprintln!("⚠️  Location fix failed: {e}");
                self.capture.location_failed();
                self.notice = Some(CaptureError::PermissionDenied.to_string());
                Task::none()
            }

            Message::PickPhoto => {
                if self.capture.form_mut().is_none() {
                    return Task::none();
                }
                // Show the native file picker dialog
                let picked = rfd::FileDialog::new()
                    .set_title("Choose a Photo")
                    .add_filter("Photos", &["jpg", "jpeg", "png", "webp"])
                    .pick_file();

                match picked {
                    Some(path) => Task::perform(load_photo(path), Message::PhotoLoaded),
                    None => Task::none(),
                }
            }
            Message::PhotoLoaded(Ok(photo)) => {
                if let Some(form) = self.capture.form_mut() {
                    form.photo = Some(photo);
                }
                Task::none()
            }
            Message::PhotoLoaded(Err(message)) => {
                self.notice = Some(message);
                Task::none()
            }
            Message::RockTypePicked(rock_type) => {
                if let Some(form) = self.capture.form_mut() {
                    form.rock_type = rock_type;
                }
                Task::none()
            }
            Message::NoteChanged(note) => {
                if let Some(form) = self.capture.form_mut() {
                    form.note = note;
                }
                Task::none()
            }
            Message::CancelCapture => {
                self.capture.cancel();
                Task::none()
            }
            Message::SubmitCapture => {
                let Some(user_id) = self
                    .session
                    .as_ref()
                    .and_then(Session::user)
                    .map(|user| user.id)
                else {
                    return Task::none();
                };

                match self.capture.begin_save() {
                    Some(request) => {
                        let service = self.service.clone();
                        Task::perform(save_find(service, user_id, request), Message::SaveFinished)
                    }
                    None => Task::none(),
                }
            }
            Message::SaveFinished(Ok(find)) => {
                println!("📍 Saved find {} ({})", find.id, find.rock_type);
                self.capture.save_complete();
                self.notice = Some("Saved!".to_string());
                // Show the new find immediately; its marker follows from
                // the reconcile pass
                self.finds.insert(0, find);
                self.markers.reconcile(&self.finds, &mut self.map);
                Task::none()
            }
            Message::SaveFinished(Err(e)) => {
                eprintln!("⚠️  Save failed: {e}");
                self.capture.save_failed();
                self.notice = Some(e.to_string());
                Task::none()
            }

            Message::FindSelected(find) => {
                self.selected = Some(find);
                Task::none()
            }
            Message::CloseSelected => {
                self.selected = None;
                Task::none()
            }
            Message::MapPanned { dx, dy } => {
                self.map.pan_by(dx, dy);
                Task::none()
            }
            Message::MapZoomed(delta) => {
                self.map.zoom_by(delta);
                Task::none()
            }
            Message::DismissNotice => {
                self.notice = None;
                Task::none()
            }
        }
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        let Some(session) = &self.session else {
            return container(text("Starting up…").size(16))
                .width(Length::Fill)
                .height(Length::Fill)
                .center_x(Length::Fill)
                .center_y(Length::Fill)
                .into();
        };

        match session.user() {
            None => self.view_sign_in(),
            Some(user) => self.view_main(user),
        }
    }

    /// Sign-in screen shown while no session exists
    fn view_sign_in(&self) -> Element<Message> {
        let mut form = column![
            text("Rockhound").size(32),
            text("Find and share rocks on Michigan beaches.").size(14),
            text_input("you@email.com", &self.email_input)
                .on_input(Message::EmailChanged)
                .on_submit(Message::SignIn)
                .padding(10),
            button(text("Send magic link").size(14))
                .on_press_maybe((!self.email_input.trim().is_empty()).then_some(Message::SignIn))
                .padding(10),
        ]
        .spacing(16)
        .align_x(Alignment::Center);

        if let Some(error) = &self.auth_error {
            form = form.push(text(error).size(14).style(text::danger));
        }

        container(
            container(form)
                .padding(32)
                .width(360)
                .style(container::rounded_box),
        )
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x(Length::Fill)
        .center_y(Length::Fill)
        .into()
    }

    /// Map + feed layout shown once signed in
    fn view_main<'a>(&'a self, user: &'a User) -> Element<'a, Message> {
        let header = row![
            text("Rockhound").size(22),
            horizontal_space(),
            text(&user.email).size(14),
            button(text("Sign out").size(14))
                .on_press(Message::SignOut)
                .padding(8),
        ]
        .spacing(12)
        .align_y(Alignment::Center)
        .padding(12);

        let mut page = column![header];

        if let Some(notice) = &self.notice {
            page = page.push(
                container(
                    row![
                        text(notice).size(14),
                        horizontal_space(),
                        button(text("Dismiss").size(12)).on_press(Message::DismissNotice),
                    ]
                    .align_y(Alignment::Center),
                )
                .padding(8)
                .width(Length::Fill)
                .style(container::rounded_box),
            );
        }

        let feed = ui::feed::feed(&self.finds, &|key| self.service.object_url(key));

        page.push(
            row![
                container(self.view_map())
                    .width(Length::FillPortion(3))
                    .height(Length::Fill),
                container(feed)
                    .width(Length::FillPortion(2))
                    .height(Length::Fill),
            ]
            .height(Length::Fill),
        )
        .into()
    }

    /// The map pane: canvas plus floating overlays
    fn view_map(&self) -> Element<Message> {
        let mut layers = stack![canvas(&self.map).width(Length::Fill).height(Length::Fill)];

        // Floating + button; shows a pin while the location fix is in flight
        let add_label = if self.capture.is_awaiting_location() {
            "📍"
        } else {
            "+"
        };
        layers = layers.push(
            container(
                button(text(add_label).size(24))
                    .padding(12)
                    .style(button::success)
                    .on_press_maybe(
                        matches!(self.capture, CaptureState::Idle).then_some(Message::AddFind),
                    ),
            )
            .width(Length::Fill)
            .height(Length::Fill)
            .align_x(Horizontal::Right)
            .align_y(Vertical::Bottom)
            .padding(16),
        );

        // Detail card for the clicked marker
        if let Some(find) = &self.selected {
            let card = column![
                ui::feed::find_card(find, &|key| self.service.object_url(key)),
                button(text("Close").size(14))
                    .padding(8)
                    .on_press(Message::CloseSelected),
            ]
            .spacing(8)
            .align_x(Alignment::End);

            layers = layers.push(
                container(container(card).width(380))
                    .width(Length::Fill)
                    .height(Length::Fill)
                    .align_x(Horizontal::Left)
                    .align_y(Vertical::Bottom)
                    .padding(16),
            );
        }

        // Add-find form (open or saving)
        if let Some(form) = self.capture.form() {
            layers = layers.push(
                container(self.view_capture_form(form, self.capture.is_saving()))
                    .width(Length::Fill)
                    .height(Length::Fill)
                    .center_x(Length::Fill)
                    .align_y(Vertical::Bottom)
                    .padding(24),
            );
        }

        layers.into()
    }

    /// The new-find form. Inputs are disabled while a save is in flight;
    /// resubmission is impossible until the save finishes.
    fn view_capture_form<'a>(&'a self, form: &'a FindForm, saving: bool) -> Element<'a, Message> {
        let photo_label = match &form.photo {
            Some(photo) => photo.file_name.as_str(),
            None => "No photo yet",
        };

        let mut note_input = text_input("Short note…", &form.note).padding(8);
        if !saving {
            note_input = note_input.on_input(Message::NoteChanged);
        }

        let save_label = if saving { "Saving…" } else { "Save" };

        let content = column![
            text("New Find").size(20),
            text("Photo + rock type + optional note.").size(12),
            row![
                button(text("Choose photo…").size(14))
                    .padding(8)
                    .on_press_maybe((!saving).then_some(Message::PickPhoto)),
                text(photo_label).size(12),
            ]
            .spacing(10)
            .align_y(Alignment::Center),
            pick_list(&ROCK_TYPES[..], Some(form.rock_type), Message::RockTypePicked).padding(8),
            note_input,
            text(format!(
                "Pin location: {:.4}, {:.4}",
                form.location.lat, form.location.lng
            ))
            .size(12),
            row![
                button(text("Cancel").size(14))
                    .padding(10)
                    .style(button::secondary)
                    .on_press_maybe((!saving).then_some(Message::CancelCapture)),
                button(text(save_label).size(14))
                    .padding(10)
                    .style(button::success)
                    .on_press_maybe(
                        (!saving && form.can_submit()).then_some(Message::SubmitCapture),
                    ),
            ]
            .spacing(10),
        ]
        .spacing(12);

        container(content)
            .padding(20)
            .width(380)
            .style(container::rounded_box)
            .into()
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Light
    }
}

fn main() -> iced::Result {
    iced::application("Rockhound", Rockhound::update, Rockhound::view)
        .theme(Rockhound::theme)
        .centered()
        .run_with(Rockhound::new)
}
