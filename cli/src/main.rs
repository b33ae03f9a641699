use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::path::PathBuf;
use std::process::ExitCode;

use atomic_share::{Mode, Server, ServerConfig};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use qrcode::render::unicode::Dense1x2;
use qrcode::QrCode;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "atomic-share", version, about = "Share one file over HTTP, or receive one")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Port to listen on; 0 lets the OS pick one
    #[arg(long, global = true, env = "ATOMIC_SHARE_PORT", default_value_t = 0)]
    port: u16,

    #[arg(long, global = true, env = "ATOMIC_SHARE_BIND", default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Compress pages and downloads for clients that accept gzip
    #[arg(long, global = true, env = "ATOMIC_SHARE_GZIP")]
    gzip: bool,

    /// Require `Authorization: Bearer <TOKEN>` on every request
    #[arg(long, global = true, env = "ATOMIC_SHARE_TOKEN")]
    token: Option<String>,

    /// Log how long each request took
    #[arg(long, global = true, env = "ATOMIC_SHARE_TIMING")]
    timing: bool,

    #[arg(long, global = true, env = "ATOMIC_SHARE_DOWNLOAD_DIR", default_value = "archivos_servidor")]
    download_dir: PathBuf,

    #[arg(long, global = true, env = "ATOMIC_SHARE_UPLOAD_DIR", default_value = "archivos_subidos")]
    upload_dir: PathBuf,

    /// Skip the QR code under the URL
    #[arg(long, global = true, env = "ATOMIC_SHARE_NO_QR")]
    no_qr: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Accept a file upload
    Upload,
    /// Serve FILE from the download directory
    Download { file: PathBuf },
    /// Accept uploads and list the download directory
    Both { file: Option<PathBuf> },
}

impl Cli {
    fn into_config(self) -> ServerConfig {
        let mode = match self.command {
            Command::Upload => Mode::Upload,
            Command::Download { file } => Mode::Download(self.download_dir.join(file)),
            Command::Both { file } => Mode::Both(file.map(|file| self.download_dir.join(file))),
        };

        ServerConfig::new(mode)
            .gzip(self.gzip)
            .auth_token(self.token)
            .timing(self.timing)
            .download_dir(self.download_dir)
            .upload_dir(self.upload_dir)
    }
}

/// Address other machines on the LAN can reach us at.
fn get_wifi_ip() -> IpAddr {
    let probe = || -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect(("8.8.8.8", 80))?;
        Ok(socket.local_addr()?.ip())
    };
    probe().unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

fn render_qr(url: &str) -> qrcode::types::QrResult<String> {
    let code = QrCode::new(url.as_bytes())?;
    Ok(code
        .render::<Dense1x2>()
        .dark_color(Dense1x2::Light)
        .light_color(Dense1x2::Dark)
        .quiet_zone(true)
        .build())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let address = format!("{}:{}", cli.bind, cli.port);
    let show_qr = !cli.no_qr;
    let config = cli.into_config();
    let mode = config.mode.clone();

    let mut server = match Server::new(&address, config).await {
        Ok(server) => server,
        Err(e) => {
            error!("failed to bind {address}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let port = match server.local_addr() {
        Ok(addr) => addr.port(),
        Err(e) => {
            error!("failed to read local address: {e}");
            return ExitCode::FAILURE;
        }
    };

    let url = format!("http://{}:{}", get_wifi_ip(), port);
    println!("Servidor en {url}");
    if show_qr {
        match render_qr(&url) {
            Ok(qr) => println!("{qr}"),
            Err(e) => warn!("cannot render QR code for {url}: {e}"),
        }
    }
    match &mode {
        Mode::Download(target) => println!("Modo: download ({})", target.display()),
        Mode::Upload => println!("Modo: upload"),
        Mode::Both(_) => println!("Modo: upload + download"),
    }

    if let Err(e) = server.run().await {
        error!("server stopped: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_target_lands_in_the_download_dir() {
        let cli = Cli::parse_from(["atomic-share", "download", "notes.txt", "--gzip"]);
        let config = cli.into_config();
        assert_eq!(
            config.mode,
            Mode::Download(PathBuf::from("archivos_servidor").join("notes.txt"))
        );
        assert!(config.gzip);
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn global_options_after_the_subcommand() {
        let cli = Cli::parse_from([
            "atomic-share",
            "upload",
            "--token",
            "s3cret",
            "--upload-dir",
            "/tmp/in",
            "--port",
            "8080",
        ]);
        assert_eq!(cli.port, 8080);
        let config = cli.into_config();
        assert_eq!(config.mode, Mode::Upload);
        assert_eq!(config.auth_token.as_deref(), Some("s3cret"));
        assert_eq!(config.upload_dir, PathBuf::from("/tmp/in"));
    }

    #[test]
    fn both_without_a_file() {
        let config = Cli::parse_from(["atomic-share", "both"]).into_config();
        assert_eq!(config.mode, Mode::Both(None));
    }

    #[test]
    fn qr_code_covers_the_url() {
        let qr = render_qr("http://192.168.1.20:8080").unwrap();
        let rows: Vec<&str> = qr.lines().collect();
        assert!(rows.len() > 10);
        let width = rows[0].chars().count();
        assert!(rows.iter().all(|row| row.chars().count() == width));

        let cli = Cli::parse_from(["atomic-share", "upload", "--no-qr"]);
        assert!(cli.no_qr);
    }

    #[test]
    fn command_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
