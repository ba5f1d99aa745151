//! TLS acceptor setup with rustls.

use std::path::Path;
use std::sync::Arc;

use rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

use crate::error::Error;

/// Loads a PEM certificate chain and private key from disk and builds an
/// acceptor that offers HTTP/2 and HTTP/1.1 over ALPN.
pub(crate) async fn load_acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor, Error> {
    let cert_pem = tokio::fs::read(cert_path).await?;
    let key_pem = tokio::fs::read(key_path).await?;
    let config = server_config(&cert_pem, &key_pem, key_path)?;
    Ok(TlsAcceptor::from(config))
}

/// Builds a [`rustls::ServerConfig`] from PEM-encoded certificate and key bytes.
fn server_config(cert_pem: &[u8], key_pem: &[u8], key_path: &Path) -> Result<Arc<ServerConfig>, Error> {
    let certs = rustls_pemfile::certs(&mut &cert_pem[..]).collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(Error::Tls(rustls::Error::NoCertificatesPresented));
    }

    let key = rustls_pemfile::private_key(&mut &key_pem[..])?
        .ok_or_else(|| Error::NoPrivateKey(key_path.to_path_buf()))?;

    let mut config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}
