//! One constructor per outcome the endpoint can produce.
//!
//! Nothing here sets `Content-Length`: the serializer derives it from the
//! payload, after any compression.

use http::header::{HeaderValue, ALLOW, CONTENT_DISPOSITION, CONTENT_TYPE, WWW_AUTHENTICATE};
use http::{Response, StatusCode};

use crate::helpers::traits::http_response::get_content_type;
use crate::{pages, ContentCoding, Payload, TransferError};

const HTML: &str = "text/html; charset=utf-8";

fn html(status: StatusCode, page: String) -> Response<Payload> {
    let mut response = Response::new(Payload::new(page.into_bytes()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(HTML));
    response
}

fn payload(bytes: &[u8], gzip: bool) -> std::io::Result<Payload> {
    if gzip {
        Payload::encoded(bytes, ContentCoding::Gzip)
    } else {
        Ok(Payload::new(bytes.to_vec()))
    }
}

pub fn interface_page(page: String, gzip: bool) -> Result<Response<Payload>, TransferError> {
    let mut response = Response::new(payload(page.as_bytes(), gzip)?);
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(HTML));
    Ok(response)
}

pub fn file_download(
    file_name: &str,
    contents: &[u8],
    gzip: bool,
) -> Result<Response<Payload>, TransferError> {
    let disposition = format!(
        "attachment; filename=\"{}\"",
        file_name.replace('\\', "\\\\").replace('"', "\\\"")
    );

    let mut response = Response::new(payload(contents, gzip)?);
    let headers = response.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_str(&get_content_type(file_name))
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        CONTENT_DISPOSITION,
        HeaderValue::from_bytes(disposition.as_bytes()).map_err(http::Error::from)?,
    );
    Ok(response)
}

pub fn upload_success(file_name: &str, size: usize) -> Response<Payload> {
    html(StatusCode::OK, pages::upload_success(file_name, size))
}

pub fn not_found(message: &str) -> Response<Payload> {
    html(
        StatusCode::NOT_FOUND,
        pages::error("404 No encontrado", message),
    )
}

pub fn bad_request(message: &str) -> Response<Payload> {
    html(
        StatusCode::BAD_REQUEST,
        pages::error("400 Solicitud incorrecta", message),
    )
}

pub fn server_error(message: &str) -> Response<Payload> {
    html(
        StatusCode::INTERNAL_SERVER_ERROR,
        pages::error("500 Error interno", message),
    )
}

pub fn unauthorized() -> Response<Payload> {
    let mut response = html(
        StatusCode::UNAUTHORIZED,
        pages::error(
            "401 No autorizado",
            "Se requiere un token válido en la cabecera Authorization: Bearer <token>.",
        ),
    );
    response
        .headers_mut()
        .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    response
}

pub fn method_not_allowed() -> Response<Payload> {
    let mut response = html(
        StatusCode::METHOD_NOT_ALLOWED,
        pages::error("405 Método no permitido", "Solo se admiten GET y POST."),
    );
    response
        .headers_mut()
        .insert(ALLOW, HeaderValue::from_static("GET, POST"));
    response
}

/// Best-effort page for an error that ended a request.
pub fn for_error(error: &TransferError) -> Response<Payload> {
    match error {
        TransferError::Unauthenticated => unauthorized(),
        TransferError::ResourceNotFound(path) => {
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            not_found(&format!("El archivo \"{name}\" no existe."))
        }
        TransferError::RouteNotFound(path) => not_found(&format!("No existe la ruta {path}.")),
        TransferError::DecodeFailure => {
            bad_request("No se encontró ningún archivo en el formulario enviado.")
        }
        TransferError::Io(_) | TransferError::Http(_) => {
            server_error("No se pudo completar la operación con el archivo.")
        }
        other => bad_request(&other.to_string()),
    }
}
