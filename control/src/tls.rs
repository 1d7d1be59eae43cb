use anyhow::{Context, Result};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use rustls_pemfile::{certs, private_key};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use crate::config::TlsSettings;

/// Build the panel's HTTPS server configuration.
///
/// With a client CA configured, only clients presenting a certificate signed
/// by that CA are accepted.
pub fn load_server_config(settings: &TlsSettings) -> Result<ServerConfig> {
    // Several rustls backends can be linked in; pin one for the process.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let cert_chain = load_certs(&settings.cert)?;
    let key = load_private_key(&settings.key)?;

    let builder = ServerConfig::builder();
    let builder = match &settings.client_ca {
        Some(ca_path) => {
            let mut roots = rustls::RootCertStore::empty();
            for cert in load_certs(ca_path)? {
                roots
                    .add(cert)
                    .context("Failed to add client CA certificate")?;
            }
            let verifier = rustls::server::WebPkiClientVerifier::builder(Arc::new(roots))
                .build()
                .context("Failed to build client certificate verifier")?;
            builder.with_client_cert_verifier(verifier)
        }
        None => builder.with_no_client_auth(),
    };

    builder
        .with_single_cert(cert_chain, key)
        .context("Failed to create TLS server config")
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path).with_context(|| format!("Failed to open cert file: {:?}", path))?;
    let certs = certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to parse certificates from {:?}", path))?;

    if certs.is_empty() {
        anyhow::bail!("No certificates found in {:?}", path);
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let file = File::open(path).with_context(|| format!("Failed to open key file: {:?}", path))?;
    private_key(&mut BufReader::new(file))
        .with_context(|| format!("Failed to parse private key from {:?}", path))?
        .with_context(|| format!("No private key found in {:?}", path))
}
