//! UI-facing state of the upload → convert → download workflow.
//!
//! The workflow never touches the network. `begin_conversion` hands out a
//! [`ConversionRequest`] which the coordinator turns into a stream of
//! [`ConversionEvent`]s, and those are fed back through [`ConversionWorkflow::apply`].
//! A request can only be obtained through `begin_conversion`, so input errors
//! never reach the service.

use std::path::Path;

use url::Url;

use super::conversion_coordinator::{ConversionEvent, DownloadEvent};
use crate::domain::{AppError, ConversionResult, OutputFormat, SelectedFile, WorkflowState};

pub const CONVERT_LABEL: &str = "✨ Convert File";
pub const CONVERTING_LABEL: &str = "Converting...";
pub const NO_FILE_LABEL: &str = "Click to choose a PDF file";

const PROGRESS_STARTED: u8 = 10;
const PROGRESS_UPLOAD_ANSWERED: u8 = 30;
const PROGRESS_UPLOADED: u8 = 50;
const PROGRESS_CONVERT_ANSWERED: u8 = 75;
const PROGRESS_DONE: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusTone {
    #[default]
    Neutral,
    Error,
    Success,
}

/// Everything a single conversion run needs
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    file: SelectedFile,
    format: OutputFormat,
}

impl ConversionRequest {
    pub fn file(&self) -> &SelectedFile {
        &self.file
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }
}

/// Identifies one download so replies from an earlier one can be told apart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadTicket(u64);

#[derive(Debug)]
pub struct ConversionWorkflow {
    state: WorkflowState,
    selected_file: Option<SelectedFile>,
    output_format: Option<OutputFormat>,
    result: Option<ConversionResult>,
    progress: u8,
    status: String,
    tone: StatusTone,
    in_flight: bool,
    active_download: Option<DownloadTicket>,
    downloads_issued: u64,
}

impl Default for ConversionWorkflow {
    fn default() -> Self {
        Self {
            state: WorkflowState::Idle,
            selected_file: None,
            output_format: None,
            result: None,
            progress: 0,
            status: "Choose a PDF file to convert".to_string(),
            tone: StatusTone::Neutral,
            in_flight: false,
            active_download: None,
            downloads_issued: 0,
        }
    }
}

impl ConversionWorkflow {
    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn tone(&self) -> StatusTone {
        self.tone
    }

    pub fn output_format(&self) -> Option<OutputFormat> {
        self.output_format
    }

    pub fn file_label(&self) -> &str {
        self.selected_file
            .as_ref()
            .map_or(NO_FILE_LABEL, |file| file.name.as_str())
    }

    /// The picker is locked while a run is in flight.
    pub fn file_selection_enabled(&self) -> bool {
        !self.in_flight
    }

    pub fn convert_enabled(&self) -> bool {
        !self.in_flight
    }

    pub fn convert_label(&self) -> &'static str {
        if self.in_flight {
            CONVERTING_LABEL
        } else {
            CONVERT_LABEL
        }
    }

    /// Download link: only while Ready with a result in hand.
    pub fn download_target(&self) -> Option<(&Url, &str)> {
        if self.state != WorkflowState::Ready {
            return None;
        }
        self.result
            .as_ref()
            .map(|result| (&result.download_url, result.output_file.as_str()))
    }

    pub fn download_enabled(&self) -> bool {
        self.active_download.is_none() && self.download_target().is_some()
    }

    pub fn download_label(&self) -> String {
        match self.download_target() {
            Some((_, name)) => format!("Download {}", name),
            None => "Download".to_string(),
        }
    }

    fn set_status(&mut self, message: impl Into<String>, tone: StatusTone) {
        self.status = message.into();
        self.tone = tone;
    }

    /// Dropping the result also orphans any download still running for it.
    fn clear_result(&mut self) {
        self.result = None;
        self.active_download = None;
    }

    /// Picker replies can arrive after a run has started; they are dropped
    /// until it ends.
    fn selection_locked(&self) -> bool {
        if self.in_flight {
            tracing::warn!("file selection ignored while a conversion is running");
        }
        self.in_flight
    }

    pub fn select_file(&mut self, file: SelectedFile) {
        if self.selection_locked() {
            return;
        }
        self.set_status(
            format!("File \"{}\" selected. Ready to convert.", file.name),
            StatusTone::Neutral,
        );
        self.selected_file = Some(file);
        self.clear_result();
        self.progress = 0;
        self.state = WorkflowState::FileSelected;
    }

    /// The picker closed without a file. A finished result and its download
    /// link stay available.
    pub fn clear_selection(&mut self) {
        if self.selection_locked() {
            return;
        }
        self.selected_file = None;
        if self.state == WorkflowState::FileSelected {
            self.state = WorkflowState::Idle;
        }
    }

    /// The picked file could not be read.
    pub fn file_read_failed(&mut self, e: &AppError) {
        if self.selection_locked() {
            return;
        }
        self.clear_selection();
        self.set_status(format!("Error: {}", e), StatusTone::Error);
    }

    pub fn select_format(&mut self, format: OutputFormat) {
        self.output_format = Some(format);
    }

    /// Validates input and locks the convert control before any request is
    /// issued. Input errors are shown in the status line; a run already in
    /// flight is refused without touching it.
    pub fn begin_conversion(&mut self) -> Result<ConversionRequest, AppError> {
        if self.in_flight {
            return Err(AppError::Busy);
        }

        let request = match (&self.selected_file, self.output_format) {
            (None, _) => Err(AppError::NoFileSelected),
            (Some(_), None) => Err(AppError::NoFormatSelected),
            (Some(file), Some(format)) => Ok(ConversionRequest {
                file: file.clone(),
                format,
            }),
        };

        let request = match request {
            Ok(request) => request,
            Err(e) => {
                self.set_status(e.to_string(), StatusTone::Error);
                return Err(e);
            }
        };

        self.in_flight = true;
        self.clear_result();
        self.state = WorkflowState::Uploading;
        self.progress = PROGRESS_STARTED;
        self.set_status(
            format!("Uploading {}...", request.file.name),
            StatusTone::Neutral,
        );

        Ok(request)
    }

    pub fn apply(&mut self, event: ConversionEvent) {
        match event {
            ConversionEvent::UploadAnswered => {
                self.progress = PROGRESS_UPLOAD_ANSWERED;
            }
            ConversionEvent::Uploaded { filename, format } => {
                tracing::debug!(%filename, "server accepted upload");
                self.state = WorkflowState::Converting;
                self.progress = PROGRESS_UPLOADED;
                self.set_status(
                    format!("File uploaded. Now converting to {}...", format),
                    StatusTone::Neutral,
                );
            }
            ConversionEvent::ConvertAnswered => {
                self.progress = PROGRESS_CONVERT_ANSWERED;
            }
            ConversionEvent::Converted(result) => {
                self.progress = PROGRESS_DONE;
                let message = result
                    .message
                    .clone()
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "File converted successfully!".to_string());
                self.set_status(message, StatusTone::Success);
                self.result = Some(result);
                self.state = WorkflowState::Ready;
                self.finish();
            }
            ConversionEvent::Failed(e) => {
                self.state = WorkflowState::Failed;
                self.clear_result();
                self.progress = 0;
                self.set_status(format!("Error: {}", e), StatusTone::Error);
                self.finish();
            }
        }
    }

    /// Runs after every terminal outcome.
    fn finish(&mut self) {
        self.in_flight = false;
    }

    /// Hands out the download URL and suggested name, locking the control
    /// until the download ends. Every later reply must carry the ticket.
    pub fn begin_download(&mut self) -> Option<(DownloadTicket, Url, String)> {
        if !self.download_enabled() {
            return None;
        }
        let (url, name) = self.download_target()?;
        let (url, name) = (url.clone(), name.to_string());

        self.downloads_issued += 1;
        let ticket = DownloadTicket(self.downloads_issued);
        self.active_download = Some(ticket);
        self.set_status("Please select save location...", StatusTone::Neutral);
        Some((ticket, url, name))
    }

    fn is_current(&self, ticket: DownloadTicket) -> bool {
        let current = self.active_download == Some(ticket);
        if !current {
            tracing::debug!(?ticket, "dropping reply from a superseded download");
        }
        current
    }

    pub fn download_cancelled(&mut self, ticket: DownloadTicket) {
        if !self.is_current(ticket) {
            return;
        }
        self.active_download = None;
        self.set_status("Download cancelled", StatusTone::Neutral);
    }

    /// Returns false when the download no longer belongs to the current
    /// result and should not be started.
    pub fn download_started(&mut self, ticket: DownloadTicket, path: &Path) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.set_status(
            format!("Downloading to: {}", path.display()),
            StatusTone::Neutral,
        );
        true
    }

    pub fn apply_download(&mut self, ticket: DownloadTicket, event: DownloadEvent) {
        if !self.is_current(ticket) {
            return;
        }
        match event {
            DownloadEvent::Progress(progress) if progress >= 1.0 => {
                self.set_status("Download complete, finalizing...", StatusTone::Neutral);
            }
            DownloadEvent::Progress(progress) if progress > 0.0 => {
                self.set_status(
                    format!("Downloading: {:.1}%", progress * 100.0),
                    StatusTone::Neutral,
                );
            }
            DownloadEvent::Progress(_) => {}
            DownloadEvent::Completed(path) => {
                self.active_download = None;
                self.set_status(format!("Saved: {}", path.display()), StatusTone::Success);
            }
            DownloadEvent::Failed(e) => {
                self.active_download = None;
                self.set_status(format!("Download failed: {}", e), StatusTone::Error);
            }
        }
    }
}
