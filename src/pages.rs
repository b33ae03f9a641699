//! HTML served by the endpoint.

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

use crate::Mode;

const STYLE: &str = r#"
      body { font-family: sans-serif; max-width: 500px; margin: 50px auto; }
      a.button { display: inline-block; padding: 10px 20px; background: #007bff; color: white; text-decoration: none; border-radius: 5px; }
      form { border: 2px dashed #ccc; padding: 20px; border-radius: 5px; }
      input[type="submit"] { padding: 10px 20px; background: #28a745; color: white; border: none; border-radius: 5px; cursor: pointer; }
      li { margin: 4px 0; }"#;

pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn document(title: &str, content: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n  <head>\n    <meta charset=\"utf-8\">\n    <title>{title}</title>\n    <style>{STYLE}\n    </style>\n  </head>\n  <body>\n{content}  </body>\n</html>\n",
        title = escape(title),
    )
}

fn download_section() -> &'static str {
    "    <h1>Descargar archivo</h1>\n    <p>Haz click en el botón para descargar:</p>\n    <a class=\"button\" href=\"/download\">Descargar archivo</a>\n"
}

fn upload_section() -> &'static str {
    "    <h1>Subir archivo</h1>\n    <form method=\"POST\" action=\"/\" enctype=\"multipart/form-data\">\n      <input type=\"file\" name=\"file\" required>\n      <input type=\"submit\" value=\"Subir\">\n    </form>\n"
}

fn listing_section(files: &[String]) -> String {
    let mut section = String::from("    <h2>Archivos disponibles</h2>\n");
    if files.is_empty() {
        section.push_str("    <p>No hay archivos para descargar.</p>\n");
        return section;
    }

    section.push_str("    <ul>\n");
    for name in files {
        section.push_str(&format!(
            "      <li><a href=\"/download?archivo={}\">{}</a></li>\n",
            utf8_percent_encode(name, NON_ALPHANUMERIC),
            escape(name)
        ));
    }
    section.push_str("    </ul>\n");
    section
}

/// Main page for `mode`; `files` is the download directory listing, only shown in `Both`.
pub fn interface(mode: &Mode, files: &[String]) -> String {
    match mode {
        Mode::Download(_) => document("Descargar archivo", download_section()),
        Mode::Upload => document("Subir archivo", upload_section()),
        Mode::Both(target) => {
            let mut content = String::from(upload_section());
            if target.is_some() {
                content.push_str(download_section());
            }
            content.push_str(&listing_section(files));
            document("Compartir archivos", &content)
        }
    }
}

pub fn upload_success(file_name: &str, size: usize) -> String {
    document(
        "Archivo recibido",
        &format!(
            "    <h1>Archivo recibido</h1>\n    <p>Se guardó <strong>{}</strong> ({} bytes).</p>\n    <a class=\"button\" href=\"/\">Volver</a>\n",
            escape(file_name),
            size
        ),
    )
}

pub fn error(title: &str, message: &str) -> String {
    document(
        title,
        &format!(
            "    <h1>{}</h1>\n    <p>{}</p>\n",
            escape(title),
            escape(message)
        ),
    )
}
