/*
 * trust.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of mjpegtls, a TLS MJPEG stream client.
 *
 * mjpegtls is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * mjpegtls is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with mjpegtls.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Pluggable TLS trust: a certificate-chain decision and a hostname decision.
//!
//! `PolicyVerifier` adapts a `TrustPolicy` to rustls' `ServerCertVerifier`. Handshake
//! signatures are always checked with the provider's algorithms; only chain and name
//! acceptance are delegated to the policy.
//!
//! Built-in policies:
//! - `WebPkiTrust`: platform roots (Mozilla roots as fallback) and RFC 6125 name matching.
//! - `AcceptAnyCertificate`: any chain, any name. For cameras with self-signed certificates.
//! - `PinnedCertificate`: one known end-entity certificate, name not checked.

use std::fmt;
use std::sync::{Arc, OnceLock};

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::{verify_server_cert_signed_by_trust_anchor, verify_server_name};
use rustls::crypto::WebPkiSupportedAlgorithms;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::server::ParsedCertificate;
use rustls::{DigitallySignedStruct, Error as TlsError, RootCertStore, SignatureScheme};

/// Certificate-chain and hostname acceptance for one TLS peer.
pub trait TrustPolicy: fmt::Debug + Send + Sync {
    /// Accept or reject the presented chain.
    fn verify_chain(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        now: UnixTime,
    ) -> Result<(), TlsError>;

    /// Accept or reject the end-entity certificate for the name we connected to.
    fn verify_hostname(
        &self,
        end_entity: &CertificateDer<'_>,
        server_name: &ServerName<'_>,
    ) -> Result<(), TlsError>;
}

/// Signature algorithms of the ring provider, shared by verifier and policies.
pub(crate) fn ring_signature_algorithms() -> WebPkiSupportedAlgorithms {
    static ALGORITHMS: OnceLock<WebPkiSupportedAlgorithms> = OnceLock::new();
    *ALGORITHMS.get_or_init(|| rustls::crypto::ring::default_provider().signature_verification_algorithms)
}

/// Build a root certificate store: platform native certs first, then webpki-roots as fallback.
fn build_root_store() -> RootCertStore {
    let mut root_store = RootCertStore::empty();
    if let Ok(certs) = rustls_native_certs::load_native_certs() {
        let (added, ignored) = root_store.add_parsable_certificates(certs);
        tracing::debug!(added, ignored, "loaded platform root certificates");
    }
    if root_store.is_empty() {
        root_store.roots = webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();
    }
    root_store
}

fn default_roots() -> Arc<RootCertStore> {
    static ROOTS: OnceLock<Arc<RootCertStore>> = OnceLock::new();
    ROOTS.get_or_init(|| Arc::new(build_root_store())).clone()
}

/// Standard web PKI validation.
#[derive(Debug, Clone)]
pub struct WebPkiTrust {
    roots: Arc<RootCertStore>,
}

impl WebPkiTrust {
    /// Platform roots, or the bundled Mozilla roots when the platform has none.
    pub fn new() -> Self {
        Self {
            roots: default_roots(),
        }
    }

    /// Validate against a caller-supplied root store (e.g. a private camera CA).
    pub fn with_roots(roots: RootCertStore) -> Self {
        Self {
            roots: Arc::new(roots),
        }
    }
}

impl Default for WebPkiTrust {
    fn default() -> Self {
        Self::new()
    }
}

impl TrustPolicy for WebPkiTrust {
    fn verify_chain(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        now: UnixTime,
    ) -> Result<(), TlsError> {
        let cert = ParsedCertificate::try_from(end_entity)?;
        verify_server_cert_signed_by_trust_anchor(
            &cert,
            &self.roots,
            intermediates,
            now,
            ring_signature_algorithms().all,
        )
    }

    fn verify_hostname(
        &self,
        end_entity: &CertificateDer<'_>,
        server_name: &ServerName<'_>,
    ) -> Result<(), TlsError> {
        let cert = ParsedCertificate::try_from(end_entity)?;
        verify_server_name(&cert, server_name)
    }
}

/// Accepts every certificate and every host name. The connection is still encrypted, but
/// the peer is not authenticated.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAnyCertificate;

impl TrustPolicy for AcceptAnyCertificate {
    fn verify_chain(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> Result<(), TlsError> {
        Ok(())
    }

    fn verify_hostname(
        &self,
        _end_entity: &CertificateDer<'_>,
        _server_name: &ServerName<'_>,
    ) -> Result<(), TlsError> {
        Ok(())
    }
}

/// Accepts exactly one end-entity certificate (DER bytes), whatever host it is served from.
#[derive(Clone)]
pub struct PinnedCertificate {
    der: CertificateDer<'static>,
}

impl PinnedCertificate {
    pub fn new(der: impl Into<Vec<u8>>) -> Self {
        Self {
            der: CertificateDer::from(der.into()),
        }
    }
}

impl fmt::Debug for PinnedCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PinnedCertificate({} bytes)", self.der.len())
    }
}

impl TrustPolicy for PinnedCertificate {
    fn verify_chain(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> Result<(), TlsError> {
        if end_entity.as_ref() == self.der.as_ref() {
            Ok(())
        } else {
            Err(TlsError::General("certificate does not match pinned certificate".into()))
        }
    }

    fn verify_hostname(
        &self,
        _end_entity: &CertificateDer<'_>,
        _server_name: &ServerName<'_>,
    ) -> Result<(), TlsError> {
        Ok(())
    }
}

/// rustls verifier that asks a `TrustPolicy` for both decisions.
#[derive(Debug)]
pub struct PolicyVerifier {
    policy: Arc<dyn TrustPolicy>,
    algorithms: WebPkiSupportedAlgorithms,
}

impl PolicyVerifier {
    pub fn new(policy: Arc<dyn TrustPolicy>) -> Self {
        Self {
            policy,
            algorithms: ring_signature_algorithms(),
        }
    }
}

impl ServerCertVerifier for PolicyVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        self.policy.verify_chain(end_entity, intermediates, now)?;
        self.policy.verify_hostname(end_entity, server_name)?;
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}
