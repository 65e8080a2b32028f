//! Scheme manager probe.
//!
//! A scheme manager publishes an `index` of `<sha256> <scheme>/<path>`
//! lines, its signature `index.sig`, its public key `pk.pem`, and every
//! file the index lists. [`HttpSchemeSource`] downloads all of it,
//! checks file hashes and issuer public key expiry, and compares the
//! published key with the one pinned in configuration. Verifying the
//! index signature itself belongs to an external verifier.
//!
//! Everything a [`SchemeSource`] reports becomes a `Warning` issue.

use std::collections::BTreeMap;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use watchdog_core::Issue;

use crate::error::SchemeError;
use crate::expiry::{Expiry, classify_expiry, unix_now};
use crate::probe::{Probe, ProbeCategory, ProbeOutcome, until_cancelled};

/// Source of a scheme manager's published files.
#[async_trait]
pub trait SchemeSource: Send + Sync {
    fn url(&self) -> &str;

    /// Refresh the local view of the scheme; returns human-readable
    /// warnings for anything that looked wrong.
    async fn update(&self) -> Vec<String>;

    /// Validate the keys obtained by the last `update()`.
    async fn validate_keys(&self) -> Result<(), SchemeError>;
}

/// Checks one scheme manager through its source.
pub struct SchemeProbe<S> {
    source: S,
}

impl<S: SchemeSource> SchemeProbe<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    async fn check(&self) -> Vec<Issue> {
        let url = self.source.url();
        debug!(%url, "checking scheme manager");

        let mut issues: Vec<Issue> = self
            .source
            .update()
            .await
            .into_iter()
            .map(|warning| Issue::warning(format!("{url}: {warning}")))
            .collect();
        if let Err(e) = self.source.validate_keys().await {
            issues.push(Issue::warning(format!("{url}: key validation failed: {e}")));
        }
        issues
    }
}

#[async_trait]
impl<S: SchemeSource + 'static> Probe for SchemeProbe<S> {
    fn category(&self) -> ProbeCategory {
        ProbeCategory::SchemeManager
    }

    fn target(&self) -> &str {
        self.source.url()
    }

    async fn run(&self, cancel: &CancellationToken) -> ProbeOutcome {
        until_cancelled(cancel, self.check()).await
    }
}

/// One `index` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub sha256: Vec<u8>,
    /// Path including the leading scheme name, e.g. `pbdf/description.xml`.
    pub path: String,
}

#[derive(Debug, Default)]
struct Downloaded {
    public_key: Option<String>,
    index_signature: Option<Vec<u8>>,
}

/// Downloads a scheme manager over HTTP.
pub struct HttpSchemeSource {
    url: String,
    pinned_key: String,
    client: Client,
    downloaded: Mutex<Option<Downloaded>>,
}

impl HttpSchemeSource {
    pub fn new(url: impl Into<String>, pinned_key: impl Into<String>, client: Client) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            pinned_key: pinned_key.into(),
            client,
            downloaded: Mutex::new(None),
        }
    }

    async fn download(&self, file: &str) -> Result<Vec<u8>, SchemeError> {
        let response = self
            .client
            .get(format!("{}/{file}", self.url))
            .send()
            .await?;
        if response.status() != StatusCode::OK {
            return Err(SchemeError::Status(response.status().as_u16()));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl SchemeSource for HttpSchemeSource {
    fn url(&self) -> &str {
        &self.url
    }

    async fn update(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let mut downloaded = Downloaded::default();

        match self.download("index.sig").await {
            Ok(sig) => downloaded.index_signature = Some(sig),
            Err(e) => warnings.push(format!("failed to download index signature: {e}")),
        }
        match self.download("pk.pem").await {
            Ok(pk) => downloaded.public_key = Some(String::from_utf8_lossy(&pk).into_owned()),
            Err(e) => warnings.push(format!("failed to download pk.pem: {e}")),
        }
        *self.downloaded.lock().await = Some(downloaded);

        let index = match self.download("index").await {
            Ok(index) => index,
            Err(e) => {
                warnings.push(format!("failed to download index: {e}"));
                return warnings;
            }
        };
        let entries = match parse_index(&String::from_utf8_lossy(&index)) {
            Ok(entries) => entries,
            Err(e) => {
                warnings.push(format!("failed to parse index: {e}"));
                return warnings;
            }
        };

        let mut files = BTreeMap::new();
        let mut complete = true;
        for entry in entries {
            let Some((_, relative)) = entry.path.split_once('/') else {
                warnings.push(format!("unexpected index entry: {}", entry.path));
                continue;
            };
            match self.download(relative).await {
                Ok(bytes) => {
                    if Sha256::digest(&bytes).as_slice() != entry.sha256.as_slice() {
                        warnings.push(format!("hash mismatch for {relative}"));
                    }
                    files.insert(entry.path, bytes);
                }
                Err(e) => {
                    complete = false;
                    warnings.push(format!("failed to download {relative}: {e}"));
                }
            }
        }
        if !complete {
            return warnings;
        }

        match public_key_expiry_warnings(&files, unix_now()) {
            Ok(expiry) => warnings.extend(expiry),
            Err(e) => warnings.push(e.to_string()),
        }
        warnings
    }

    async fn validate_keys(&self) -> Result<(), SchemeError> {
        let downloaded = self.downloaded.lock().await;
        let downloaded = downloaded.as_ref().ok_or(SchemeError::NotUpdated)?;

        let published = downloaded
            .public_key
            .as_deref()
            .ok_or(SchemeError::MissingPublicKey)?;
        if normalize_pem(published) != normalize_pem(&self.pinned_key) {
            return Err(SchemeError::KeyMismatch);
        }
        match &downloaded.index_signature {
            Some(sig) if !sig.is_empty() => Ok(()),
            _ => Err(SchemeError::MissingSignature),
        }
    }
}

/// Parse an `index` file into its entries.
pub fn parse_index(index: &str) -> Result<Vec<IndexEntry>, SchemeError> {
    let mut entries = Vec::new();
    for (n, line) in index.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let malformed = |reason: &str| SchemeError::Index {
            line: n + 1,
            reason: reason.to_string(),
        };
        let (hash, path) = line
            .split_once(char::is_whitespace)
            .ok_or_else(|| malformed("expected `<hash> <path>`"))?;
        let sha256 = hex::decode(hash).map_err(|e| malformed(&e.to_string()))?;
        if sha256.len() != 32 {
            return Err(malformed("hash is not a sha256 digest"));
        }
        entries.push(IndexEntry {
            sha256,
            path: path.trim().to_string(),
        });
    }
    Ok(entries)
}

/// Expiry warnings for issuer public keys among downloaded files.
///
/// Keys live at `<scheme>/<issuer>/PublicKeys/<n>.xml`; the latest
/// `<ExpiryDate>` (unix seconds) per issuer decides.
pub fn public_key_expiry_warnings(
    files: &BTreeMap<String, Vec<u8>>,
    now: i64,
) -> Result<Vec<String>, SchemeError> {
    let key_path = Regex::new(r"^([^/]+)/([^/]+)/PublicKeys/[^/]+\.xml$")?;
    let expiry_date = Regex::new(r"<ExpiryDate>\s*(\d+)\s*</ExpiryDate>")?;

    let mut warnings = Vec::new();
    let mut latest: BTreeMap<(String, String), i64> = BTreeMap::new();
    for (path, bytes) in files {
        let Some(caps) = key_path.captures(path) else {
            continue;
        };
        let xml = String::from_utf8_lossy(bytes);
        let Some(expiry) = expiry_date
            .captures(&xml)
            .and_then(|c| c[1].parse::<i64>().ok())
        else {
            warnings.push(format!("failed to parse {path}: no ExpiryDate"));
            continue;
        };
        let max = latest
            .entry((caps[1].to_string(), caps[2].to_string()))
            .or_insert(expiry);
        *max = (*max).max(expiry);
    }

    for ((scheme, issuer), expiry) in latest {
        if expiry < now {
            let days = (now - expiry) / 86_400;
            warnings.push(format!("publickey for {scheme}.{issuer} has expired {days} days"));
            continue;
        }
        match classify_expiry(expiry, now) {
            Some(Expiry::Expired { days }) => warnings.push(format!(
                "publickey for {scheme}.{issuer} has expired {days} days"
            )),
            Some(Expiry::ExpiresSoon { days }) => warnings.push(format!(
                "publickey for {scheme}.{issuer} will expire in {days} days"
            )),
            None => {}
        }
    }
    Ok(warnings)
}

fn normalize_pem(pem: &str) -> String {
    pem.split_whitespace().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::Arc;

    use axum::Router;
    use axum::extract::{Path, State};
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::get;
    use watchdog_core::Severity;

    const PINNED: &str = "-----BEGIN PUBLIC KEY-----\nAAAA\n-----END PUBLIC KEY-----\n";
    const DAY: i64 = 86_400;

    fn sha(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    fn key_xml(expiry: i64) -> Vec<u8> {
        format!("<IssuerPublicKey><ExpiryDate>{expiry}</ExpiryDate></IssuerPublicKey>").into_bytes()
    }

    async fn serve_files(files: HashMap<String, Vec<u8>>) -> String {
        async fn file(
            State(files): State<Arc<HashMap<String, Vec<u8>>>>,
            Path(path): Path<String>,
        ) -> Result<Vec<u8>, AxumStatus> {
            files.get(&path).cloned().ok_or(AxumStatus::NOT_FOUND)
        }

        let router = Router::new()
            .route("/scheme/{*path}", get(file))
            .with_state(Arc::new(files));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/scheme")
    }

    /// A well-formed scheme whose single issuer key expires far ahead.
    fn healthy_scheme() -> HashMap<String, Vec<u8>> {
        let description = b"<SchemeManager/>".to_vec();
        let key = key_xml(unix_now() + 365 * DAY);
        let index = format!(
            "{} test/description.xml\n{} test/issuer/PublicKeys/0.xml\n",
            sha(&description),
            sha(&key)
        );
        HashMap::from([
            ("index".to_string(), index.into_bytes()),
            ("index.sig".to_string(), b"signature".to_vec()),
            ("pk.pem".to_string(), PINNED.as_bytes().to_vec()),
            ("description.xml".to_string(), description),
            ("issuer/PublicKeys/0.xml".to_string(), key),
        ])
    }

    #[tokio::test]
    async fn healthy_scheme_is_clean() {
        let url = serve_files(healthy_scheme()).await;
        let probe = SchemeProbe::new(HttpSchemeSource::new(&url, PINNED, Client::new()));
        assert_eq!(probe.run(&CancellationToken::new()).await, Ok(vec![]));
    }

    #[tokio::test]
    async fn tampered_file_and_missing_signature_warn() {
        let mut files = healthy_scheme();
        files.insert("description.xml".to_string(), b"<Tampered/>".to_vec());
        files.remove("index.sig");
        let url = serve_files(files).await;

        let probe = SchemeProbe::new(HttpSchemeSource::new(&url, PINNED, Client::new()));
        let issues = probe.run(&CancellationToken::new()).await.unwrap();

        assert!(issues.iter().all(|i| i.severity() == Severity::Warning));
        assert_eq!(
            issues.iter().map(|i| i.message().to_string()).collect::<Vec<_>>(),
            vec![
                format!("{url}: failed to download index signature: HTTP Code 404"),
                format!("{url}: hash mismatch for description.xml"),
                format!("{url}: key validation failed: index signature is missing or empty"),
            ]
        );
    }

    #[tokio::test]
    async fn rotated_public_key_fails_validation() {
        let url = serve_files(healthy_scheme()).await;
        let source = HttpSchemeSource::new(
            &url,
            "-----BEGIN PUBLIC KEY-----\nBBBB\n-----END PUBLIC KEY-----",
            Client::new(),
        );
        assert!(source.update().await.is_empty());
        assert!(matches!(
            source.validate_keys().await,
            Err(SchemeError::KeyMismatch)
        ));
    }

    #[tokio::test]
    async fn missing_index_stops_update() {
        let mut files = healthy_scheme();
        files.remove("index");
        let url = serve_files(files).await;

        let source = HttpSchemeSource::new(&url, PINNED, Client::new());
        assert_eq!(
            source.update().await,
            vec!["failed to download index: HTTP Code 404".to_string()]
        );
        // The key and signature were still fetched.
        assert!(source.validate_keys().await.is_ok());
    }

    #[tokio::test]
    async fn validate_before_update_fails() {
        let source = HttpSchemeSource::new("http://127.0.0.1:1", PINNED, Client::new());
        assert!(matches!(
            source.validate_keys().await,
            Err(SchemeError::NotUpdated)
        ));
    }

    #[test]
    fn parse_index_entries() {
        let hash = "ab".repeat(32);
        let entries = parse_index(&format!("{hash} pbdf/description.xml\n\n{hash}  pbdf/pk.pem\n")).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, "pbdf/description.xml");
        assert_eq!(entries[1].path, "pbdf/pk.pem");
        assert_eq!(entries[0].sha256, vec![0xab; 32]);
    }

    #[test]
    fn parse_index_rejects_bad_hash() {
        let err = parse_index("nothex pbdf/description.xml").unwrap_err();
        assert!(matches!(err, SchemeError::Index { line: 1, .. }));

        let err = parse_index("abcd pbdf/description.xml").unwrap_err();
        assert!(matches!(err, SchemeError::Index { line: 1, .. }));

        let err = parse_index("lonely").unwrap_err();
        assert!(matches!(err, SchemeError::Index { line: 1, .. }));
    }

    #[test]
    fn key_expiry_uses_latest_key_per_issuer() {
        let now = 1_700_000_000;
        let files = BTreeMap::from([
            ("pbdf/alpha/PublicKeys/0.xml".to_string(), key_xml(now - 400 * DAY)),
            ("pbdf/alpha/PublicKeys/1.xml".to_string(), key_xml(now + 10 * DAY)),
            ("pbdf/beta/PublicKeys/0.xml".to_string(), key_xml(now - 10 * DAY)),
            ("pbdf/gamma/PublicKeys/0.xml".to_string(), key_xml(now + 45 * DAY)),
            ("pbdf/delta/PublicKeys/0.xml".to_string(), b"<Broken/>".to_vec()),
            ("pbdf/description.xml".to_string(), b"<ExpiryDate>1</ExpiryDate>".to_vec()),
        ]);

        let warnings = public_key_expiry_warnings(&files, now).unwrap();
        assert_eq!(
            warnings,
            vec![
                "failed to parse pbdf/delta/PublicKeys/0.xml: no ExpiryDate".to_string(),
                "publickey for pbdf.alpha will expire in 10 days".to_string(),
                "publickey for pbdf.beta has expired 10 days".to_string(),
            ]
        );
    }

    #[test]
    fn key_expired_hours_ago_is_reported_as_expired() {
        let now = 1_700_000_000;
        let files = BTreeMap::from([(
            "pbdf/alpha/PublicKeys/0.xml".to_string(),
            key_xml(now - 12 * 3600),
        )]);

        let warnings = public_key_expiry_warnings(&files, now).unwrap();
        assert_eq!(warnings, vec!["publickey for pbdf.alpha has expired 0 days".to_string()]);
    }
}
