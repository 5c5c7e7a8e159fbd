use cfcert_common::{DomainName, KeyAlgorithm, ProvisionError, Result};
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair, PKCS_ECDSA_P256_SHA256, PublicKeyData};
use std::fmt;

/// Private key for one provisioning attempt. Lives until the store import
/// consumes it and is never rendered by `Debug`.
pub struct GeneratedKey {
    inner: KeyPair,
    algorithm: KeyAlgorithm,
}

impl GeneratedKey {
    pub(crate) fn new(inner: KeyPair, algorithm: KeyAlgorithm) -> Self {
        Self { inner, algorithm }
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    /// DER-encoded SubjectPublicKeyInfo.
    pub fn public_key_der(&self) -> Vec<u8> {
        self.inner.subject_public_key_info()
    }

    pub(crate) fn private_key_pem(&self) -> String {
        self.inner.serialize_pem()
    }

    #[cfg(test)]
    pub(crate) fn key_pair(&self) -> &KeyPair {
        &self.inner
    }
}

impl fmt::Debug for GeneratedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedKey")
            .field("algorithm", &self.algorithm)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct SigningRequest {
    pem: String,
}

impl SigningRequest {
    pub fn pem(&self) -> &str {
        &self.pem
    }
}

pub trait KeyGenerator: Send + Sync {
    /// Algorithm of every key this generator produces; drives the reuse policy.
    fn key_algorithm(&self) -> KeyAlgorithm;

    fn generate(&self, domain: &DomainName) -> Result<(GeneratedKey, SigningRequest)>;
}

/// P-256 keys with a CSR whose CN and only SAN are the domain.
#[derive(Debug, Clone, Copy, Default)]
pub struct EcdsaP256Generator;

impl KeyGenerator for EcdsaP256Generator {
    fn key_algorithm(&self) -> KeyAlgorithm {
        KeyAlgorithm::EcPrime256v1
    }

    fn generate(&self, domain: &DomainName) -> Result<(GeneratedKey, SigningRequest)> {
        let key_pair = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256)
            .map_err(|err| ProvisionError::key_gen(err.to_string()))?;

        let mut params = CertificateParams::new(vec![domain.as_str().to_string()])
            .map_err(|err| ProvisionError::key_gen(format!("failed to create CSR: {}", err)))?;
        let mut subject = DistinguishedName::new();
        subject.push(DnType::CommonName, domain.as_str());
        params.distinguished_name = subject;

        let csr = params
            .serialize_request(&key_pair)
            .map_err(|err| ProvisionError::key_gen(format!("failed to create CSR: {}", err)))?;
        let pem = csr
            .pem()
            .map_err(|err| ProvisionError::key_gen(format!("failed to encode CSR: {}", err)))?;
        Ok((
            GeneratedKey::new(key_pair, self.key_algorithm()),
            SigningRequest { pem },
        ))
    }
}
