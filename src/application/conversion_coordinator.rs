use std::path::PathBuf;

use bytes::Bytes;
use futures::{stream::BoxStream, StreamExt};
use tokio::io::AsyncWriteExt;
use url::Url;

use super::conversion_workflow::ConversionRequest;
use crate::{
    api::{
        self,
        models::{ConvertResponse, UploadResponse},
        ApiClient,
    },
    domain::{AppError, ConversionResult, OutputFormat, SelectedFile},
    utils::sanitize_filename,
};

/// Network milestones of one conversion run, in the order they happen
#[derive(Debug, Clone)]
pub enum ConversionEvent {
    /// The upload endpoint responded (successfully or not)
    UploadAnswered,
    Uploaded {
        filename: String,
        format: OutputFormat,
    },
    /// The convert endpoint responded (successfully or not)
    ConvertAnswered,
    Converted(ConversionResult),
    Failed(AppError),
}

#[derive(Debug, Clone)]
pub enum DownloadEvent {
    Progress(f32),
    Completed(PathBuf),
    Failed(AppError),
}

#[derive(Clone)]
pub struct ConversionCoordinator {
    api_client: ApiClient,
}

impl ConversionCoordinator {
    pub fn new(api_client: ApiClient) -> Self {
        Self { api_client }
    }

    pub async fn choose_pdf(&self) -> Result<Option<SelectedFile>, AppError> {
        let Some(handle) = rfd::AsyncFileDialog::new()
            .add_filter("PDF", &["pdf"])
            .pick_file()
            .await
        else {
            return Ok(None);
        };

        let name = handle.file_name();
        let contents = tokio::fs::read(handle.path())
            .await
            .map_err(|e| AppError::Io(format!("Failed to read {}: {}", name, e)))?;

        tracing::debug!(file = %name, size = contents.len(), "file selected");
        Ok(Some(SelectedFile::new(name, contents)))
    }

    pub async fn choose_save_path(&self, suggested_filename: String) -> Option<PathBuf> {
        rfd::AsyncFileDialog::new()
            .set_file_name(sanitize_filename(&suggested_filename))
            .save_file()
            .await
            .map(|handle| handle.path().to_path_buf())
    }

    /// Runs upload then convert, strictly in order, never retrying.
    pub fn run(&self, request: ConversionRequest) -> BoxStream<'static, ConversionEvent> {
        futures::stream::unfold(
            ConversionRuntimeState::Upload {
                client: self.api_client.clone(),
                request,
            },
            |state| async move {
                match state {
                    ConversionRuntimeState::Upload { client, request } => {
                        tracing::info!(file = %request.file().name, "uploading");
                        let result = client.upload(request.file()).await;
                        Some((
                            ConversionEvent::UploadAnswered,
                            ConversionRuntimeState::UploadAnswered {
                                client,
                                format: request.format(),
                                result,
                            },
                        ))
                    }
                    ConversionRuntimeState::UploadAnswered {
                        client,
                        format,
                        result,
                    } => match result {
                        Ok(uploaded) => Some((
                            ConversionEvent::Uploaded {
                                filename: uploaded.filename.clone(),
                                format,
                            },
                            ConversionRuntimeState::Convert {
                                client,
                                filename: uploaded.filename,
                                format,
                            },
                        )),
                        Err(e) => Some(fail(e)),
                    },
                    ConversionRuntimeState::Convert {
                        client,
                        filename,
                        format,
                    } => {
                        tracing::info!(%filename, %format, "converting");
                        let result = client.convert(&filename, format).await;
                        Some((
                            ConversionEvent::ConvertAnswered,
                            ConversionRuntimeState::ConvertAnswered { client, result },
                        ))
                    }
                    ConversionRuntimeState::ConvertAnswered { client, result } => {
                        let outcome = result.and_then(|converted| {
                            let download_url = client.download_url(&converted.output_file)?;
                            Ok(ConversionResult {
                                output_file: converted.output_file,
                                message: converted.message,
                                download_url,
                            })
                        });

                        match outcome {
                            Ok(result) => {
                                tracing::info!(output = %result.output_file, "conversion finished");
                                Some((
                                    ConversionEvent::Converted(result),
                                    ConversionRuntimeState::Finished,
                                ))
                            }
                            Err(e) => Some(fail(e)),
                        }
                    }
                    ConversionRuntimeState::Finished => None,
                }
            },
        )
        .boxed()
    }

    /// Streams a converted file to `path`. The file is only created once the
    /// service has answered successfully.
    pub fn download_stream(&self, url: Url, path: PathBuf) -> BoxStream<'static, DownloadEvent> {
        futures::stream::unfold(
            DownloadRuntimeState::Start {
                client: self.api_client.clone(),
                url,
                path,
            },
            download_step,
        )
        .boxed()
    }
}

fn fail(e: api::ApiError) -> (ConversionEvent, ConversionRuntimeState) {
    tracing::error!(error = %e, "conversion process error");
    (
        ConversionEvent::Failed(e.into()),
        ConversionRuntimeState::Finished,
    )
}

enum ConversionRuntimeState {
    Upload {
        client: ApiClient,
        request: ConversionRequest,
    },
    UploadAnswered {
        client: ApiClient,
        format: OutputFormat,
        result: api::Result<UploadResponse>,
    },
    Convert {
        client: ApiClient,
        filename: String,
        format: OutputFormat,
    },
    ConvertAnswered {
        client: ApiClient,
        result: api::Result<ConvertResponse>,
    },
    Finished,
}

enum DownloadRuntimeState {
    Start {
        client: ApiClient,
        url: Url,
        path: PathBuf,
    },
    Receiving {
        sink: DownloadSink,
        body: BoxStream<'static, api::Result<Bytes>>,
    },
    Finished,
}

async fn download_step(
    state: DownloadRuntimeState,
) -> Option<(DownloadEvent, DownloadRuntimeState)> {
    let outcome = match state {
        DownloadRuntimeState::Start { client, url, path } => {
            tracing::info!(%url, path = %path.display(), "downloading");
            open_download(&client, &url, path).await.map(|(sink, body)| {
                (
                    DownloadEvent::Progress(0.0),
                    DownloadRuntimeState::Receiving { sink, body },
                )
            })
        }
        DownloadRuntimeState::Receiving { mut sink, mut body } => match body.next().await {
            Some(Ok(chunk)) => {
                let written = sink.write(&chunk).await;
                written.map(|fraction| {
                    (
                        DownloadEvent::Progress(fraction),
                        DownloadRuntimeState::Receiving { sink, body },
                    )
                })
            }
            Some(Err(e)) => Err(e.into()),
            None => sink
                .finish()
                .await
                .map(|path| (DownloadEvent::Completed(path), DownloadRuntimeState::Finished)),
        },
        DownloadRuntimeState::Finished => return None,
    };

    Some(outcome.unwrap_or_else(|e| (DownloadEvent::Failed(e), DownloadRuntimeState::Finished)))
}

async fn open_download(
    client: &ApiClient,
    url: &Url,
    path: PathBuf,
) -> Result<(DownloadSink, BoxStream<'static, api::Result<Bytes>>), AppError> {
    let (expected, body) = client.download_file_stream(url).await?;
    let sink = DownloadSink::create(path, expected).await?;
    Ok((sink, body.boxed()))
}

/// Destination file of a download, tracking how much of the body arrived
struct DownloadSink {
    file: tokio::fs::File,
    path: PathBuf,
    written: u64,
    expected: Option<u64>,
}

impl DownloadSink {
    async fn create(path: PathBuf, expected: Option<u64>) -> Result<Self, AppError> {
        let file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| AppError::Io(format!("Failed to create file: {}", e)))?;

        Ok(Self {
            file,
            path,
            written: 0,
            expected,
        })
    }

    /// Appends a chunk and returns the fraction received so far
    async fn write(&mut self, chunk: &[u8]) -> Result<f32, AppError> {
        self.file
            .write_all(chunk)
            .await
            .map_err(|e| AppError::Io(format!("Write error: {}", e)))?;
        self.written += chunk.len() as u64;
        Ok(self.fraction())
    }

    /// 0.0 while the length is unknown
    fn fraction(&self) -> f32 {
        match self.expected {
            Some(total) if total > 0 => (self.written as f32 / total as f32).min(1.0),
            _ => 0.0,
        }
    }

    async fn finish(mut self) -> Result<PathBuf, AppError> {
        self.file
            .flush()
            .await
            .map_err(|e| AppError::Io(format!("Failed to flush file: {}", e)))?;
        self.file
            .sync_all()
            .await
            .map_err(|e| AppError::Io(format!("Failed to sync file: {}", e)))?;
        tracing::debug!(path = %self.path.display(), bytes = self.written, "download saved");
        Ok(self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiConfig;
    use crate::application::ConversionWorkflow;
    use mockito::{Matcher, Server};

    fn coordinator_for(server: &Server) -> ConversionCoordinator {
        ConversionCoordinator::new(ApiClient::new(
            ApiConfig::from_base_url(&server.url()).unwrap(),
        ))
    }

    fn ready_workflow() -> ConversionWorkflow {
        let mut workflow = ConversionWorkflow::default();
        workflow.select_file(SelectedFile::new("report.pdf", b"%PDF-1.4".to_vec()));
        workflow.select_format(OutputFormat::Docx);
        workflow
    }

    #[tokio::test]
    async fn test_successful_run() {
        let mut server = Server::new_async().await;
        let upload = server
            .mock("POST", "/upload/")
            .with_status(200)
            .with_body(r#"{"filename": "abc.pdf"}"#)
            .create_async()
            .await;
        let convert = server
            .mock("POST", "/convert/")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("filename".into(), "abc.pdf".into()),
                Matcher::UrlEncoded("output_format".into(), "docx".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"output_file": "abc.docx", "message": "Done"}"#)
            .create_async()
            .await;

        let mut workflow = ready_workflow();
        let request = workflow.begin_conversion().unwrap();
        let events: Vec<_> = coordinator_for(&server).run(request).collect().await;

        assert!(matches!(events[0], ConversionEvent::UploadAnswered));
        assert!(matches!(&events[1], ConversionEvent::Uploaded { filename, .. } if filename == "abc.pdf"));
        assert!(matches!(events[2], ConversionEvent::ConvertAnswered));
        assert!(matches!(events[3], ConversionEvent::Converted(_)));
        assert_eq!(events.len(), 4);

        for event in events {
            workflow.apply(event);
        }

        assert_eq!(workflow.progress(), 100);
        assert_eq!(workflow.status(), "Done");
        let (url, name) = workflow.download_target().unwrap();
        assert!(url.as_str().ends_with("/download/abc.docx"));
        assert_eq!(name, "abc.docx");
        assert!(workflow.convert_enabled());
        assert_eq!(workflow.convert_label(), "✨ Convert File");

        upload.assert_async().await;
        convert.assert_async().await;
    }

    #[tokio::test]
    async fn test_upload_failure_stops_before_convert() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/upload/")
            .with_status(500)
            .with_body(r#"{"detail": "disk full"}"#)
            .create_async()
            .await;
        let convert = server
            .mock("POST", "/convert/")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let mut workflow = ready_workflow();
        let request = workflow.begin_conversion().unwrap();
        let events: Vec<_> = coordinator_for(&server).run(request).collect().await;
        assert_eq!(events.len(), 2);

        for event in events {
            workflow.apply(event);
        }

        assert_eq!(workflow.status(), "Error: Upload failed: 500 disk full");
        assert_eq!(workflow.progress(), 0);
        assert!(workflow.download_target().is_none());
        assert!(workflow.convert_enabled());
        assert_eq!(workflow.convert_label(), "✨ Convert File");
        convert.assert_async().await;
    }

    #[tokio::test]
    async fn test_convert_failure_without_body() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/upload/")
            .with_status(200)
            .with_body(r#"{"filename": "abc.pdf"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/convert/")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let mut workflow = ready_workflow();
        let request = workflow.begin_conversion().unwrap();
        let events: Vec<_> = coordinator_for(&server).run(request).collect().await;

        for event in events {
            workflow.apply(event);
        }

        assert!(workflow
            .status()
            .contains("Conversion failed with no specific error message."));
        assert!(workflow.status().starts_with("Error: Conversion failed: 500"));
        assert_eq!(workflow.progress(), 0);
        assert!(workflow.convert_enabled());
    }

    #[tokio::test]
    async fn test_unreachable_service_fails() {
        // Reserve a free port, then release it so connections are refused.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let coordinator = ConversionCoordinator::new(ApiClient::new(
            ApiConfig::from_base_url(&format!("http://127.0.0.1:{}", port)).unwrap(),
        ));

        let mut workflow = ready_workflow();
        let request = workflow.begin_conversion().unwrap();
        let events: Vec<_> = coordinator.run(request).collect().await;
        assert!(matches!(events.last(), Some(ConversionEvent::Failed(_))));

        for event in events {
            workflow.apply(event);
        }
        assert!(workflow.status().starts_with("Error: HTTP request failed"));
    }

    #[tokio::test]
    async fn test_download_stream_writes_file() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/download/abc.md")
            .with_status(200)
            .with_body("# Converted")
            .create_async()
            .await;

        let coordinator = coordinator_for(&server);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.md");
        let url = coordinator.api_client.download_url("abc.md").unwrap();

        let events: Vec<_> = coordinator
            .download_stream(url, path.clone())
            .collect()
            .await;

        assert!(matches!(events.first(), Some(DownloadEvent::Progress(p)) if *p == 0.0));
        assert!(matches!(events.last(), Some(DownloadEvent::Completed(p)) if *p == path));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Converted");
    }

    #[tokio::test]
    async fn test_download_stream_reports_http_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/download/gone.md")
            .with_status(404)
            .create_async()
            .await;

        let coordinator = coordinator_for(&server);
        let dir = tempfile::tempdir().unwrap();
        let url = coordinator.api_client.download_url("gone.md").unwrap();

        let target = dir.path().join("gone.md");
        let events: Vec<_> = coordinator
            .download_stream(url, target.clone())
            .collect()
            .await;

        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], DownloadEvent::Failed(AppError::Api(_))));
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_download_sink_tracks_fraction() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("part.txt");

        let mut sink = DownloadSink::create(path.clone(), Some(10)).await.unwrap();
        assert_eq!(sink.write(b"hello").await.unwrap(), 0.5);
        assert_eq!(sink.write(b"world").await.unwrap(), 1.0);
        assert_eq!(sink.finish().await.unwrap(), path);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "helloworld");

        let mut unknown = DownloadSink::create(dir.path().join("other.txt"), None)
            .await
            .unwrap();
        assert_eq!(unknown.write(b"abc").await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_download_into_missing_directory_fails() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/download/abc.md")
            .with_status(200)
            .with_body("# Converted")
            .create_async()
            .await;

        let coordinator = coordinator_for(&server);
        let dir = tempfile::tempdir().unwrap();
        let url = coordinator.api_client.download_url("abc.md").unwrap();

        let events: Vec<_> = coordinator
            .download_stream(url, dir.path().join("missing").join("abc.md"))
            .collect()
            .await;

        assert!(matches!(
            events.as_slice(),
            [DownloadEvent::Failed(AppError::Io(msg))] if msg.starts_with("Failed to create file")
        ));
    }
}
