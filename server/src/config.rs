use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use greetcard_core::config::{LogArgs, SiteArgs};

#[derive(Parser, Debug)]
#[command(name = "greetcard-server", version, about = "Serves greeting pages and the page update API")]
pub struct ServerArgs {
    #[command(flatten)]
    pub site: SiteArgs,

    #[command(flatten)]
    pub log: LogArgs,

    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "GREETCARD_HOST")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(short = 'p', long, default_value_t = 443, env = "GREETCARD_PORT")]
    pub port: u16,

    /// PEM certificate chain
    #[arg(long, value_name = "FILE", default_value = "certs/fullchain.pem", env = "GREETCARD_TLS_CERT")]
    pub tls_cert: PathBuf,

    /// PEM private key
    #[arg(long, value_name = "FILE", default_value = "certs/privkey.pem", env = "GREETCARD_TLS_KEY")]
    pub tls_key: PathBuf,

    /// Serve plain HTTP (local testing only)
    #[arg(long, env = "GREETCARD_NO_TLS")]
    pub no_tls: bool,
}

pub struct Tls {
    pub cert: PathBuf,
    pub key: PathBuf,
}

impl ServerArgs {
    pub fn address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Certificate material, checked up front since warp panics on unreadable files at bind time.
    pub fn tls(&self) -> anyhow::Result<Option<Tls>> {
        if self.no_tls {
            return Ok(None);
        }
        for path in [&self.tls_cert, &self.tls_key] {
            let metadata = std::fs::metadata(path).with_context(|| format!("Cannot read TLS file {:?}", path))?;
            if !metadata.is_file() {
                bail!("TLS file {:?} is not a regular file", path);
            }
        }
        Ok(Some(Tls { cert: self.tls_cert.clone(), key: self.tls_key.clone() }))
    }
}

#[test]
fn test_missing_certificate_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let cert = dir.path().join("fullchain.pem");
    let key = dir.path().join("privkey.pem");
    std::fs::write(&cert, "cert").unwrap();
    let args = ServerArgs::parse_from([
        "greetcard-server",
        "--tls-cert",
        cert.to_str().unwrap(),
        "--tls-key",
        key.to_str().unwrap(),
    ]);
    assert!(args.tls().is_err());
    std::fs::write(&key, "key").unwrap();
    assert!(args.tls().unwrap().is_some());
    assert_eq!(443, args.address().port());
}

#[test]
fn test_no_tls() {
    let args = ServerArgs::parse_from(["greetcard-server", "--no-tls", "--port", "8080", "--host", "127.0.0.1"]);
    assert!(args.tls().unwrap().is_none());
    assert_eq!("127.0.0.1:8080".parse::<SocketAddr>().unwrap(), args.address());
}
