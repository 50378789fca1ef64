//! TLS certificate material handed to a connector.
//!
//! The controller does not perform the handshake itself; it loads the CA
//! material from disk, checks that it holds at least one certificate and
//! passes it to the [`P4RuntimeConnector`](crate::P4RuntimeConnector).

use std::fs;
use std::io;
use std::path::Path;

/// CA certificates parsed from a PEM file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsMaterial {
    certificates: Vec<Vec<u8>>,
}

impl TlsMaterial {
    /// Loads certificate material from a PEM file.
    pub fn load(path: impl AsRef<Path>) -> io::Result<Self> {
        let pem = fs::read(path)?;
        Self::from_pem(&pem)
    }

    /// Parses certificate material from PEM bytes.
    ///
    /// Fails with `InvalidData` when the input holds no certificate.
    pub fn from_pem(mut pem: &[u8]) -> io::Result<Self> {
        let certificates = rustls_pemfile::certs(&mut pem)
            .map(|cert| cert.map(|der| der.as_ref().to_vec()))
            .collect::<io::Result<Vec<_>>>()?;

        if certificates.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "no certificate found in PEM input",
            ));
        }

        Ok(Self { certificates })
    }

    /// Returns the DER-encoded certificates in file order.
    pub fn certificates(&self) -> &[Vec<u8>] {
        &self.certificates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal PEM block; `certs` only checks the armor and base64 body.
    const TEST_PEM: &str = "-----BEGIN CERTIFICATE-----\n\
        MIIBszCCAVmgAwIBAgIUJ9Q2\n\
        -----END CERTIFICATE-----\n";

    #[test]
    fn test_from_pem_single_certificate() {
        let material = TlsMaterial::from_pem(TEST_PEM.as_bytes()).unwrap();
        assert_eq!(material.certificates().len(), 1);
    }

    #[test]
    fn test_from_pem_without_certificate() {
        let err = TlsMaterial::from_pem(b"not a certificate").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_load_missing_file() {
        let err = TlsMaterial::load("/nonexistent/cert.pem").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
