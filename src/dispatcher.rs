use std::path::{Path, PathBuf};
use std::sync::Arc;

use http::{Method, Request, Response};
use tracing::{debug, info, warn};

use crate::helpers::traits::zero_copy::load_file;
use crate::{pages, responses, Body, Mode, Payload, RequestUtils, ServerConfig, TransferError};

/// Routes a parsed request to its response. Holds nothing but the config.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    config: Arc<ServerConfig>,
}

impl Dispatcher {
    pub fn new(config: Arc<ServerConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Always yields a response; failures become error pages.
    pub async fn route(&self, request: &Request<Body>) -> Response<Payload> {
        match self.try_route(request).await {
            Ok(response) => response,
            Err(e) => {
                match &e {
                    TransferError::Io(_) | TransferError::Http(_) => {
                        warn!(uri = %request.uri(), "request failed: {e}")
                    }
                    _ => debug!(uri = %request.uri(), "request rejected: {e}"),
                }
                responses::for_error(&e)
            }
        }
    }

    async fn try_route(&self, request: &Request<Body>) -> Result<Response<Payload>, TransferError> {
        if let Some(secret) = &self.config.auth_token {
            if !request.is_authorized(secret) {
                return Err(TransferError::Unauthenticated);
            }
        }

        let path = request.uri().path();
        match *request.method() {
            Method::GET => match path {
                "/" => self.interface(request).await,
                "/download" if self.config.mode.serves_downloads() => {
                    self.download(request).await
                }
                _ => Err(TransferError::RouteNotFound(path.to_owned())),
            },
            Method::POST => match path {
                "/" | "" if self.config.mode.accepts_uploads() => self.upload(request).await,
                "/" | "" => Ok(responses::method_not_allowed()),
                // unknown POST targets just get the page again
                _ => self.interface(request).await,
            },
            _ => Ok(responses::method_not_allowed()),
        }
    }

    fn gzip_for(&self, request: &Request<Body>) -> bool {
        self.config.gzip && request.accepts_gzip()
    }

    async fn interface(&self, request: &Request<Body>) -> Result<Response<Payload>, TransferError> {
        let files = match self.config.mode {
            Mode::Both(_) => list_files(&self.config.download_dir).await,
            _ => Vec::new(),
        };
        let page = pages::interface(&self.config.mode, &files);
        responses::interface_page(page, self.gzip_for(request))
    }

    async fn download(&self, request: &Request<Body>) -> Result<Response<Payload>, TransferError> {
        let path = match request.query_params().get("archivo") {
            Some(name) => resolve_under(&self.config.download_dir, name)?,
            None => self
                .config
                .mode
                .target()
                .map(Path::to_path_buf)
                .ok_or_else(|| TransferError::RouteNotFound("/download".into()))?,
        };

        let contents = load_file(&path, self.config.zero_copy_threshold).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "download".to_owned());

        info!(
            client = ?request.body().ip,
            file = %path.display(),
            bytes = contents.len(),
            "serving download"
        );
        responses::file_download(&file_name, contents.as_bytes(), self.gzip_for(request))
    }

    async fn upload(&self, request: &Request<Body>) -> Result<Response<Payload>, TransferError> {
        if request.boundary().is_none() {
            return Err(TransferError::MalformedRequest(
                "missing multipart boundary".into(),
            ));
        }
        if request.body().is_empty() {
            return Err(TransferError::MalformedRequest("empty upload body".into()));
        }

        let file = request.get_multi_part().ok_or(TransferError::DecodeFailure)?;
        let file_name = sanitize_file_name(&file.file_name)?;

        tokio::fs::create_dir_all(&self.config.upload_dir).await?;
        let destination = self.config.upload_dir.join(&file_name);
        tokio::fs::write(&destination, &file.body).await?;

        info!(
            client = ?request.body().ip,
            file = %destination.display(),
            bytes = file.body.len(),
            "upload stored"
        );
        Ok(responses::upload_success(&file_name, file.body.len()))
    }
}

/// Joins a client-supplied name onto `dir`, refusing anything but a bare file name.
pub fn resolve_under(dir: &Path, name: &str) -> Result<PathBuf, TransferError> {
    let is_bare = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\');
    if !is_bare {
        return Err(TransferError::InvalidFileName(name.to_owned()));
    }
    Ok(dir.join(name))
}

/// Keeps only the last path component of an uploaded file name.
pub fn sanitize_file_name(raw: &str) -> Result<String, TransferError> {
    let name = raw.rsplit(&['/', '\\'][..]).next().unwrap_or_default().trim();
    if name.is_empty() || name == "." || name == ".." {
        return Err(TransferError::InvalidFileName(raw.to_owned()));
    }
    Ok(name.to_owned())
}

async fn list_files(dir: &Path) -> Vec<String> {
    let mut names = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), "cannot list directory: {e}");
            return names;
        }
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let is_file = entry
            .file_type()
            .await
            .map(|kind| kind.is_file())
            .unwrap_or(false);
        if is_file {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    names
}
