use std::path::PathBuf;

use iced::Task;
use url::Url;

use crate::api::{ApiClient, ApiConfig};
use crate::application::{
    ConversionCoordinator, ConversionEvent, ConversionWorkflow, DownloadEvent, DownloadTicket,
};
use crate::domain::{AppError, SelectedFile};
use crate::ui::{self, ConverterMessage};

pub struct ConverterApp {
    workflow: ConversionWorkflow,
    coordinator: ConversionCoordinator,
}

impl Default for ConverterApp {
    fn default() -> Self {
        Self::new(ApiConfig::from_env())
    }
}

impl ConverterApp {
    pub fn new(config: ApiConfig) -> Self {
        tracing::info!(base_url = %config.base_url, "using conversion service");

        Self {
            workflow: ConversionWorkflow::default(),
            coordinator: ConversionCoordinator::new(ApiClient::new(config)),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    UiMessage(ConverterMessage),
    /// Result of the open dialog; `None` when the user closed it
    FileChosen(Result<Option<SelectedFile>, AppError>),
    Conversion(ConversionEvent),
    /// (Ticket, Selected Path, Download URL)
    SavePathSelected(DownloadTicket, Option<PathBuf>, Url),
    Download(DownloadTicket, DownloadEvent),
}

pub fn update(app: &mut ConverterApp, message: Message) -> Task<Message> {
    match message {
        Message::UiMessage(ConverterMessage::ChooseFilePressed) => {
            let coordinator = app.coordinator.clone();
            return Task::perform(
                async move { coordinator.choose_pdf().await },
                Message::FileChosen,
            );
        }
        Message::UiMessage(ConverterMessage::FormatSelected(format)) => {
            app.workflow.select_format(format);
        }
        Message::UiMessage(ConverterMessage::ConvertPressed) => {
            match app.workflow.begin_conversion() {
                Ok(request) => {
                    return Task::stream(app.coordinator.run(request)).map(Message::Conversion);
                }
                Err(e) => tracing::warn!(error = %e, "conversion not started"),
            }
        }
        Message::UiMessage(ConverterMessage::DownloadPressed) => {
            if let Some((ticket, url, name)) = app.workflow.begin_download() {
                let coordinator = app.coordinator.clone();
                return Task::perform(
                    async move { (coordinator.choose_save_path(name).await, url) },
                    move |(path, url)| Message::SavePathSelected(ticket, path, url),
                );
            }
        }
        Message::FileChosen(result) => match result {
            Ok(Some(file)) => app.workflow.select_file(file),
            Ok(None) => app.workflow.clear_selection(),
            Err(e) => {
                tracing::error!(error = %e, "could not read selected file");
                app.workflow.file_read_failed(&e);
            }
        },
        Message::Conversion(event) => {
            app.workflow.apply(event);
            tracing::debug!(state = ?app.workflow.state(), progress = app.workflow.progress(), "workflow updated");
        }
        Message::SavePathSelected(ticket, path_opt, url) => match path_opt {
            Some(path) => {
                if app.workflow.download_started(ticket, &path) {
                    return Task::stream(app.coordinator.download_stream(url, path))
                        .map(move |event| Message::Download(ticket, event));
                }
            }
            None => app.workflow.download_cancelled(ticket),
        },
        Message::Download(ticket, event) => {
            if let DownloadEvent::Failed(e) = &event {
                tracing::error!(error = %e, "download failed");
            }
            app.workflow.apply_download(ticket, event);
        }
    }
    Task::none()
}

pub fn view(app: &ConverterApp) -> iced::Element<'_, Message> {
    ui::view(&app.workflow).map(Message::UiMessage)
}
