/// Find capture workflow
///
/// Drives the end-to-end "add a find" action: one-shot location fix,
/// photo + rock type + note form, then an upload-then-insert save that
/// looks atomic to the user.
///
/// States: Idle -> AwaitingLocation -> FormOpen -> Saving -> Idle.
/// A failed save returns to FormOpen with every input preserved so the
/// user can retry without re-entering data or re-requesting location.
/// There is no cancellation once Saving has begun, and no automatic
/// retry anywhere.

use std::path::Path;
use std::sync::Arc;

use uuid::Uuid;

use crate::finds::{Coordinates, Find, NewFind, RockType, ROCK_TYPES};
use crate::remote::{FindStore, ObjectStore, RemoteError};

/// Failures surfaced to the user by the workflow
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    /// Location access refused or never arrived
    #[error("Need location permission to drop a pin.")]
    PermissionDenied,
    /// Photo upload failed; the record was not inserted
    #[error("Photo upload failed: {0}")]
    UploadFailure(RemoteError),
    /// Record insert failed after a successful upload. The uploaded
    /// photo is left behind; no compensating delete is attempted.
    #[error("Could not save the find: {0}")]
    InsertFailure(RemoteError),
}

/// A picked photo: original file name plus its bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoInput {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Form input held while the capture form is open
#[derive(Debug, Clone, PartialEq)]
pub struct FindForm {
    /// Captured once when the form opens; kept across failed saves
    pub location: Coordinates,
    /// Required before submit is enabled
    pub photo: Option<PhotoInput>,
    pub rock_type: RockType,
    pub note: String,
}

impl FindForm {
    fn new(location: Coordinates) -> Self {
        FindForm {
            location,
            photo: None,
            rock_type: ROCK_TYPES[0],
            note: String::new(),
        }
    }

    /// Submit is only enabled once a photo is present
    pub fn can_submit(&self) -> bool {
        self.photo.is_some()
    }
}

/// Everything the save sequence needs, snapshotted at submit
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    pub location: Coordinates,
    pub photo: PhotoInput,
    pub rock_type: RockType,
    pub note: String,
}

/// The capture state machine. One per application; captures by different
/// users live in different processes and share nothing.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    /// A one-shot location fix is in flight
    AwaitingLocation,
    /// Location captured, form visible
    FormOpen(FindForm),
    /// Upload-then-insert in flight; resubmission is disabled
    Saving(FindForm),
}

impl CaptureState {
    /// User intent to add a find. Returns true when a location fix
    /// should be started.
    pub fn request_location(&mut self) -> bool {
        if matches!(self, CaptureState::Idle) {
            *self = CaptureState::AwaitingLocation;
            true
        } else {
            false
        }
    }

    /// Location fix arrived; open the form
    pub fn location_acquired(&mut self, location: Coordinates) {
        if matches!(self, CaptureState::AwaitingLocation) {
            *self = CaptureState::FormOpen(FindForm::new(location));
        }
    }

    /// Location fix failed or timed out
    pub fn location_failed(&mut self) {
        if matches!(self, CaptureState::AwaitingLocation) {
            *self = CaptureState::Idle;
        }
    }

    /// User cancelled the form; all input is discarded.
    /// Not possible once Saving has begun.
    pub fn cancel(&mut self) {
        if matches!(self, CaptureState::FormOpen(_)) {
            *self = CaptureState::Idle;
        }
    }

    /// Submit. Moves to Saving and returns the save request, or None
    /// when the form is not open or has no photo yet (single-flight:
    /// a second submit while Saving returns None).
    pub fn begin_save(&mut self) -> Option<SaveRequest> {
        match std::mem::take(self) {
            CaptureState::FormOpen(form) => match form.photo.clone() {
                Some(photo) => {
                    let request = SaveRequest {
                        location: form.location,
                        photo,
                        rock_type: form.rock_type,
                        note: form.note.clone(),
                    };
                    *self = CaptureState::Saving(form);
                    Some(request)
                }
                None => {
                    *self = CaptureState::FormOpen(form);
                    None
                }
            },
            other => {
                *self = other;
                None
            }
        }
    }

    /// Save failed; reopen the form with the user's input intact
    pub fn save_failed(&mut self) {
        if let CaptureState::Saving(form) = std::mem::take(self) {
            *self = CaptureState::FormOpen(form);
        }
    }

    /// Save succeeded; reset the form
    pub fn save_complete(&mut self) {
        if matches!(self, CaptureState::Saving(_)) {
            *self = CaptureState::Idle;
        }
    }

    /// The held form, when the form is visible (open or saving)
    pub fn form(&self) -> Option<&FindForm> {
        match self {
            CaptureState::FormOpen(form) | CaptureState::Saving(form) => Some(form),
            _ => None,
        }
    }

    /// Mutable form access for input edits; only while open, never
    /// while a save is in flight
    pub fn form_mut(&mut self) -> Option<&mut FindForm> {
        match self {
            CaptureState::FormOpen(form) => Some(form),
            _ => None,
        }
    }

    pub fn is_saving(&self) -> bool {
        matches!(self, CaptureState::Saving(_))
    }

    pub fn is_awaiting_location(&self) -> bool {
        matches!(self, CaptureState::AwaitingLocation)
    }
}

/// Perform the save sequence: upload the photo under a fresh
/// user-scoped key, then insert the record referencing it.
///
/// Upload strictly precedes insert. A photo uploaded for a failed
/// insert is accepted orphaned state.
pub async fn save_find<S>(
    service: Arc<S>,
    user_id: Uuid,
    request: SaveRequest,
) -> Result<Find, CaptureError>
where
    S: FindStore + ObjectStore + Send + Sync,
{
    let key = photo_key(user_id, &request.photo.file_name);
    let content_type = photo_content_type(&request.photo.file_name);

    service
        .upload(key.clone(), request.photo.bytes, content_type)
        .await
        .map_err(CaptureError::UploadFailure)?;

    let trimmed = request.note.trim();
    let note = (!trimmed.is_empty()).then(|| trimmed.to_string());

    let created = service
        .insert_find(NewFind {
            user_id,
            rock_type: request.rock_type,
            note,
            photo_path: key,
            lat: request.location.lat,
            lng: request.location.lng,
        })
        .await
        .map_err(CaptureError::InsertFailure)?;

    Ok(created)
}

/// Fresh object-store key for one upload attempt, namespaced by user id
fn photo_key(user_id: Uuid, file_name: &str) -> String {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_else(|| "jpg".to_string());
    format!("{user_id}/{}.{ext}", Uuid::new_v4())
}

/// Content type from the picked file's extension
fn photo_content_type(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Read a picked photo from disk and check it decodes as an image
pub async fn load_photo(path: std::path::PathBuf) -> Result<PhotoInput, String> {
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| format!("Could not read photo: {e}"))?;

    image::guess_format(&bytes).map_err(|_| "That file is not a supported image.".to_string())?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "photo.jpg".to_string());

    Ok(PhotoInput { file_name, bytes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Records uploads and inserts; either step can be made to fail
    #[derive(Default)]
    struct FakeService {
        fail_upload: bool,
        fail_insert: bool,
        uploads: Mutex<Vec<(String, Vec<u8>, &'static str)>>,
        inserts: Mutex<Vec<NewFind>>,
    }

    impl FindStore for FakeService {
        async fn recent_finds(&self, _limit: usize) -> Result<Vec<Find>, RemoteError> {
            Ok(Vec::new())
        }

        async fn insert_find(&self, find: NewFind) -> Result<Find, RemoteError> {
            if self.fail_insert {
                return Err(RemoteError::Storage("insert refused".to_string()));
            }
            self.inserts.lock().unwrap().push(find.clone());
            Ok(Find {
                id: Uuid::new_v4(),
                user_id: find.user_id,
                rock_type: find.rock_type,
                note: find.note,
                photo_path: find.photo_path,
                lat: find.lat,
                lng: find.lng,
                created_at: chrono::Utc::now(),
            })
        }
    }

    impl ObjectStore for FakeService {
        async fn upload(
            &self,
            key: String,
            bytes: Vec<u8>,
            content_type: &'static str,
        ) -> Result<(), RemoteError> {
            if self.fail_upload {
                return Err(RemoteError::ObjectStore("network error".to_string()));
            }
            self.uploads.lock().unwrap().push((key, bytes, content_type));
            Ok(())
        }

        fn object_url(&self, key: &str) -> PathBuf {
            PathBuf::from(key)
        }
    }

    fn open_form() -> CaptureState {
        let mut state = CaptureState::Idle;
        assert!(state.request_location());
        state.location_acquired(Coordinates { lat: 44.8, lng: -85.5 });
        state
    }

    fn photo() -> PhotoInput {
        PhotoInput {
            file_name: "IMG_0042.JPG".to_string(),
            bytes: vec![0xFF, 0xD8, 0xFF],
        }
    }

    #[test]
    fn test_location_failure_returns_to_idle() {
        let mut state = CaptureState::Idle;
        assert!(state.request_location());
        assert!(state.is_awaiting_location());
        // Only one fix at a time
        assert!(!state.request_location());

        state.location_failed();
        assert_eq!(state, CaptureState::Idle);
    }

    #[test]
    fn test_cancel_discards_input() {
        let mut state = open_form();
        let form = state.form_mut().unwrap();
        form.photo = Some(photo());
        form.note = "lost note".to_string();

        state.cancel();
        assert_eq!(state, CaptureState::Idle);
    }

    #[test]
    fn test_submit_requires_photo() {
        let mut state = open_form();
        assert!(!state.form().unwrap().can_submit());
        // Rejected before any remote call is made
        assert_eq!(state.begin_save(), None);
        assert!(matches!(state, CaptureState::FormOpen(_)));
    }

    #[test]
    fn test_saving_is_single_flight() {
        let mut state = open_form();
        state.form_mut().unwrap().photo = Some(photo());

        assert!(state.begin_save().is_some());
        assert!(state.is_saving());
        // A second tap while saving does nothing
        assert_eq!(state.begin_save(), None);
        assert!(state.is_saving());
        // Inputs are not editable while saving
        assert!(state.form_mut().is_none());
    }

    #[test]
    fn test_save_failed_preserves_input() {
        let mut state = open_form();
        {
            let form = state.form_mut().unwrap();
            form.photo = Some(photo());
            form.rock_type = RockType::Copper;
            form.note = "by the lighthouse".to_string();
        }
        let before = state.form().unwrap().clone();

        state.begin_save().unwrap();
        state.save_failed();

        assert_eq!(state, CaptureState::FormOpen(before));
    }

    #[tokio::test]
    async fn test_upload_failure_means_no_insert() {
        let service = Arc::new(FakeService {
            fail_upload: true,
            ..Default::default()
        });

        let request = SaveRequest {
            location: Coordinates { lat: 44.8, lng: -85.5 },
            photo: photo(),
            rock_type: RockType::Quartz,
            note: String::new(),
        };

        let err = save_find(service.clone(), Uuid::new_v4(), request)
            .await
            .unwrap_err();

        assert!(matches!(err, CaptureError::UploadFailure(_)));
        // Zero records exist for this attempt
        assert!(service.inserts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_failure_leaves_orphaned_photo() {
        let service = Arc::new(FakeService {
            fail_insert: true,
            ..Default::default()
        });

        let request = SaveRequest {
            location: Coordinates { lat: 44.8, lng: -85.5 },
            photo: photo(),
            rock_type: RockType::Agate,
            note: String::new(),
        };

        let err = save_find(service.clone(), Uuid::new_v4(), request)
            .await
            .unwrap_err();

        assert!(matches!(err, CaptureError::InsertFailure(_)));
        // The upload happened and is not rolled back
        assert_eq!(service.uploads.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_successful_save_links_record_to_upload() {
        let service = Arc::new(FakeService::default());
        let user_id = Uuid::new_v4();

        let request = SaveRequest {
            location: Coordinates { lat: 45.1, lng: -86.2 },
            photo: photo(),
            rock_type: RockType::Petoskey,
            note: "  shiny  ".to_string(),
        };

        let created = save_find(service.clone(), user_id, request).await.unwrap();

        let uploads = service.uploads.lock().unwrap();
        let inserts = service.inserts.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(inserts.len(), 1);

        let (key, _, content_type) = &uploads[0];
        // Key is namespaced by user id and keeps the photo's extension
        assert!(key.starts_with(&format!("{user_id}/")));
        assert!(key.ends_with(".jpg"));
        assert_eq!(*content_type, "image/jpeg");

        // The record references the uploaded key, with the note trimmed
        assert_eq!(inserts[0].photo_path, *key);
        assert_eq!(inserts[0].note.as_deref(), Some("shiny"));
        assert_eq!(created.photo_path, *key);
        assert_eq!((created.lat, created.lng), (45.1, -86.2));
    }

    #[test]
    fn test_photo_key_defaults_extension() {
        let user_id = Uuid::new_v4();
        let key = photo_key(user_id, "photo-without-extension");
        assert!(key.ends_with(".jpg"));
        assert_eq!(photo_content_type("photo-without-extension"), "application/octet-stream");
        assert_eq!(photo_content_type("rock.PNG"), "image/png");
    }
}
