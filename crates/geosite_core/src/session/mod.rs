pub mod capture;

pub use capture::{
    CaptureError, CaptureForm, CaptureSession, CaptureState, SubmitOutcome, SubmitPayload,
    SubmitRequest, ValidationError,
};
