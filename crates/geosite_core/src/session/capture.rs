//! Placement interaction state machine.
//!
//! # Responsibility
//! - Track the "place a new item" flow: arm tool, click, fill form, submit.
//! - Validate forms locally before any persistence call is made.
//! - Apply submission results to the item store.
//!
//! # Invariants
//! - Map clicks are ignored unless a tool is armed.
//! - Re-selecting the active tool returns to `Idle`.
//! - A failed submission returns the session to `Positioned` with the same
//!   bundle so the user can retry.
//! - Cancelling never cancels an in-flight request; its result is still
//!   applied to the store when it belongs to the same project.

use crate::geodesy::bundle::BundleBuilder;
use crate::model::geo::{CoordinateBundle, GeoPoint, GeoPointError, ProjectOrigin};
use crate::model::item::{FileRef, IncidentDetails, ItemId, ItemKind, MapItem, ProjectId};
use crate::persistence::{PersistenceClient, PersistenceError, PersistenceResult};
use crate::store::item_store::MapItemStore;
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Input rejected locally; no request is issued.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Submit attempted before a map position was chosen.
    MissingPosition,
    /// Media capture without a file.
    MissingFile,
    /// Incident capture with a blank title.
    MissingTitle,
    /// Form kind does not match the armed tool.
    FormMismatch { mode: ItemKind },
    /// Raw map input outside the WGS84 range.
    InvalidPoint(GeoPointError),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingPosition => write!(f, "select a position on the map first"),
            Self::MissingFile => write!(f, "select a file to upload"),
            Self::MissingTitle => write!(f, "incident title is required"),
            Self::FormMismatch { mode } => {
                write!(f, "form does not match capture mode `{}`", mode.as_str())
            }
            Self::InvalidPoint(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ValidationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidPoint(err) => Some(err),
            _ => None,
        }
    }
}

impl From<GeoPointError> for ValidationError {
    fn from(value: GeoPointError) -> Self {
        Self::InvalidPoint(value)
    }
}

/// Capture flow error.
#[derive(Debug)]
pub enum CaptureError {
    Validation(ValidationError),
    Transport(PersistenceError),
    /// Action not allowed in the current state.
    InvalidState {
        action: &'static str,
        state: &'static str,
    },
}

impl Display for CaptureError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Transport(err) => write!(f, "{err}"),
            Self::InvalidState { action, state } => {
                write!(f, "cannot {action} while capture session is {state}")
            }
        }
    }
}

impl Error for CaptureError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Transport(err) => Some(err),
            Self::InvalidState { .. } => None,
        }
    }
}

impl From<ValidationError> for CaptureError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Form content entered for the positioned item.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureForm {
    Media { file: Option<FileRef>, z: f64 },
    Incident { details: IncidentDetails, z: f64 },
}

impl CaptureForm {
    pub fn height(&self) -> f64 {
        match self {
            Self::Media { z, .. } | Self::Incident { z, .. } => *z,
        }
    }
}

/// Session states.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureState {
    Idle,
    Armed(ItemKind),
    Positioned {
        mode: ItemKind,
        bundle: CoordinateBundle,
    },
    Submitting {
        mode: ItemKind,
        bundle: CoordinateBundle,
        ticket: u64,
    },
}

impl CaptureState {
    fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Armed(_) => "armed",
            Self::Positioned { .. } => "positioned",
            Self::Submitting { .. } => "submitting",
        }
    }
}

/// Validated, ready-to-send submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitRequest {
    pub ticket: u64,
    pub mode: ItemKind,
    /// Placement with the form height applied.
    pub bundle: CoordinateBundle,
    pub z: f64,
    pub payload: SubmitPayload,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitPayload {
    File(FileRef),
    Incident(IncidentDetails),
}

impl SubmitRequest {
    /// Issues the persistence call matching the capture mode.
    pub fn send<C: PersistenceClient + ?Sized>(
        &self,
        client: &C,
        project: ProjectId,
    ) -> PersistenceResult<MapItem> {
        match (&self.payload, self.mode) {
            (SubmitPayload::File(file), ItemKind::Photo360) => {
                client.upload_photo360(project, file, &self.bundle, self.z)
            }
            (SubmitPayload::File(file), _) => {
                client.upload_gallery_image(project, file, &self.bundle, self.z)
            }
            (SubmitPayload::Incident(details), _) => {
                client.create_incident(project, details, &self.bundle, self.z)
            }
        }
    }
}

/// Result of applying a submission response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Item stored; `attached` tells whether the session was still waiting.
    Created { id: ItemId, attached: bool },
    /// Item belongs to a project no longer shown; not stored.
    Discarded { id: ItemId },
}

/// One placement interaction.
#[derive(Debug, Clone)]
pub struct CaptureSession {
    state: CaptureState,
    next_ticket: u64,
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSession {
    pub fn new() -> Self {
        Self {
            state: CaptureState::Idle,
            next_ticket: 1,
        }
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    /// Capture mode currently advertised to the map surface.
    pub fn mode(&self) -> Option<ItemKind> {
        match &self.state {
            CaptureState::Idle => None,
            CaptureState::Armed(mode)
            | CaptureState::Positioned { mode, .. }
            | CaptureState::Submitting { mode, .. } => Some(*mode),
        }
    }

    /// Bundle of the temporary marker, if one is placed.
    pub fn pending_bundle(&self) -> Option<&CoordinateBundle> {
        match &self.state {
            CaptureState::Positioned { bundle, .. } | CaptureState::Submitting { bundle, .. } => {
                Some(bundle)
            }
            _ => None,
        }
    }

    /// Selects a placement tool with toggle semantics.
    ///
    /// Selecting the active tool resets to `Idle`; selecting another tool
    /// discards any temporary marker and arms the new one.
    pub fn select_tool(&mut self, mode: ItemKind) -> &CaptureState {
        self.state = if self.mode() == Some(mode) {
            CaptureState::Idle
        } else {
            CaptureState::Armed(mode)
        };
        debug!(
            "event=capture_select_tool module=session status=ok mode={} state={}",
            mode.as_str(),
            self.state.name()
        );
        &self.state
    }

    /// Places the temporary marker; ignored unless armed or positioned.
    pub fn click(
        &mut self,
        point: GeoPoint,
        builder: &BundleBuilder,
        origin: Option<&ProjectOrigin>,
    ) -> Option<&CoordinateBundle> {
        let mode = match &self.state {
            CaptureState::Armed(mode) | CaptureState::Positioned { mode, .. } => *mode,
            CaptureState::Idle | CaptureState::Submitting { .. } => {
                debug!(
                    "event=capture_click module=session status=ignored state={}",
                    self.state.name()
                );
                return None;
            }
        };
        self.state = CaptureState::Positioned {
            mode,
            bundle: builder.build(point, origin),
        };
        self.pending_bundle()
    }

    /// Re-binds the temporary marker after a drag; only while positioned.
    pub fn move_temporary(
        &mut self,
        point: GeoPoint,
        builder: &BundleBuilder,
        origin: Option<&ProjectOrigin>,
    ) -> Option<&CoordinateBundle> {
        match &mut self.state {
            CaptureState::Positioned { bundle, .. } => {
                *bundle = builder.build(point, origin);
                Some(&*bundle)
            }
            _ => None,
        }
    }

    /// Resets to `Idle`; returns the detached ticket if a submit was in flight.
    pub fn cancel(&mut self) -> Option<u64> {
        let detached = match &self.state {
            CaptureState::Submitting { ticket, .. } => Some(*ticket),
            _ => None,
        };
        self.state = CaptureState::Idle;
        if let Some(ticket) = detached {
            info!(
                "event=capture_cancel module=session status=detached ticket={}",
                ticket
            );
        }
        detached
    }

    /// Validates the form and moves to `Submitting`.
    ///
    /// # Errors
    /// - `Validation` when the position or required fields are missing; the
    ///   state is left unchanged.
    /// - `InvalidState` when idle or already submitting.
    pub fn begin_submit(&mut self, form: CaptureForm) -> Result<SubmitRequest, CaptureError> {
        let (mode, bundle) = match &self.state {
            CaptureState::Positioned { mode, bundle } => (*mode, *bundle),
            CaptureState::Armed(_) => return Err(ValidationError::MissingPosition.into()),
            other => {
                return Err(CaptureError::InvalidState {
                    action: "submit",
                    state: other.name(),
                })
            }
        };

        let z = form.height();
        let payload = validate_form(mode, form)?;
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.state = CaptureState::Submitting {
            mode,
            bundle,
            ticket,
        };

        Ok(SubmitRequest {
            ticket,
            mode,
            bundle: bundle.with_height(z),
            z,
            payload,
        })
    }

    /// Applies the response of a submission started by `begin_submit`.
    ///
    /// # Errors
    /// Returns `Transport` when persistence failed; an attached session goes
    /// back to `Positioned` for retry.
    pub fn finish_submit(
        &mut self,
        ticket: u64,
        result: PersistenceResult<MapItem>,
        store: &mut MapItemStore,
    ) -> Result<SubmitOutcome, CaptureError> {
        let attached = matches!(
            &self.state,
            CaptureState::Submitting { ticket: current, .. } if *current == ticket
        );

        match result {
            Ok(item) => {
                if attached {
                    self.state = CaptureState::Idle;
                }
                let id = item.id;
                if !store.insert(item) {
                    warn!(
                        "event=capture_submit module=session status=discarded item_id={} ticket={}",
                        id, ticket
                    );
                    return Ok(SubmitOutcome::Discarded { id });
                }
                info!(
                    "event=capture_submit module=session status=ok item_id={} ticket={} attached={}",
                    id, ticket, attached
                );
                Ok(SubmitOutcome::Created { id, attached })
            }
            Err(err) => {
                if attached {
                    if let CaptureState::Submitting { mode, bundle, .. } = self.state {
                        self.state = CaptureState::Positioned { mode, bundle };
                    }
                }
                warn!(
                    "event=capture_submit module=session status=error ticket={} attached={} error={}",
                    ticket, attached, err
                );
                Err(CaptureError::Transport(err))
            }
        }
    }

    /// Validates, sends and applies a submission in one step.
    pub fn submit<C: PersistenceClient + ?Sized>(
        &mut self,
        form: CaptureForm,
        client: &C,
        store: &mut MapItemStore,
    ) -> Result<SubmitOutcome, CaptureError> {
        let request = self.begin_submit(form)?;
        let result = request.send(client, store.project_id());
        self.finish_submit(request.ticket, result, store)
    }
}

fn validate_form(mode: ItemKind, form: CaptureForm) -> Result<SubmitPayload, ValidationError> {
    match (mode, form) {
        (ItemKind::Photo360 | ItemKind::GalleryImage, CaptureForm::Media { file, .. }) => {
            match file {
                Some(file) if !file.file_name.trim().is_empty() => Ok(SubmitPayload::File(file)),
                _ => Err(ValidationError::MissingFile),
            }
        }
        (ItemKind::Incident, CaptureForm::Incident { details, .. }) => {
            if details.title.trim().is_empty() {
                return Err(ValidationError::MissingTitle);
            }
            Ok(SubmitPayload::Incident(details))
        }
        (mode, _) => Err(ValidationError::FormMismatch { mode }),
    }
}
