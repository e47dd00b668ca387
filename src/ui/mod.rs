use iced::{
    widget::{button, column, progress_bar, radio, row, text, Space},
    Element, Length,
};

use crate::application::{ConversionWorkflow, StatusTone};
use crate::domain::OutputFormat;

#[derive(Debug, Clone)]
pub enum ConverterMessage {
    ChooseFilePressed,
    FormatSelected(OutputFormat),
    ConvertPressed,
    DownloadPressed,
}

/// Renders the workflow; every enabled/disabled decision comes from it.
pub fn view(workflow: &ConversionWorkflow) -> Element<'_, ConverterMessage> {
    let formats = column(OutputFormat::ALL.into_iter().map(|format| {
        radio(
            format.label(),
            format,
            workflow.output_format(),
            ConverterMessage::FormatSelected,
        )
        .into()
    }))
    .spacing(6);

    let tone = workflow.tone();
    let status = text(workflow.status()).size(14).style(move |theme| match tone {
        StatusTone::Error => text::danger(theme),
        StatusTone::Success => text::success(theme),
        StatusTone::Neutral => text::Style::default(),
    });

    let progress = workflow.progress();

    column![
        text("PDF Converter").size(32),
        Space::new().height(Length::Fixed(20.0)),
        row![
            button("Choose PDF")
                .on_press_maybe(
                    workflow
                        .file_selection_enabled()
                        .then_some(ConverterMessage::ChooseFilePressed)
                )
                .padding([10, 20]),
            text(workflow.file_label()).size(16),
        ]
        .spacing(12),
        Space::new().height(Length::Fixed(10.0)),
        text("Output format:").size(16),
        formats,
        Space::new().height(Length::Fixed(10.0)),
        button(workflow.convert_label())
            .on_press_maybe(
                workflow
                    .convert_enabled()
                    .then_some(ConverterMessage::ConvertPressed)
            )
            .padding([10, 20]),
        progress_bar(0.0..=100.0, f32::from(progress)),
        text(format!("{}%", progress)).size(12),
        status,
        Space::new().height(Length::Fixed(20.0)),
        button(text(workflow.download_label()))
            .on_press_maybe(
                workflow
                    .download_enabled()
                    .then_some(ConverterMessage::DownloadPressed)
            )
            .padding([10, 20]),
    ]
    .padding(20)
    .spacing(10)
    .into()
}
