//! Signature verification through an external gpg-compatible program
//!
//! The verifier reads the message body on stdin. Its verdict comes from
//! the exit status plus a few well-known lines on stderr. When the only
//! problem is a missing public key, the key is fetched once and the
//! verification repeated.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::LazyLock;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

static KEY_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^gpg: Signature made (.+) using \w+ key ID (\w+)$").expect("valid regex")
});
static KEY_FINGERPRINT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^gpg:\s+using \w+ key (\w+)$").expect("valid regex"));
static ERROR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^gpg: ((?:Can't check signature|BAD ).*)$").expect("valid regex")
});
static UNTRUSTED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^gpg: WARNING: This key is not certified with a trusted signature")
        .expect("valid regex")
});

/// Exit status gpg uses for a bad signature.
const BAD_SIGNATURE_STATUS: i32 = 1;

/// How a verification ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Success,
    /// Good signature from a key without a trust path.
    SuccessUntrusted,
    SignatureBad,
    Inconclusive,
    /// The verifier could not be run at all.
    ExecutionError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationOutcome {
    pub verdict: Verdict,
    pub key_id: Option<String>,
    pub diagnostic: Option<String>,
}

impl VerificationOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.verdict, Verdict::Success | Verdict::SuccessUntrusted)
    }

    fn execution_error(diagnostic: String) -> Self {
        Self {
            verdict: Verdict::ExecutionError,
            key_id: None,
            diagnostic: Some(diagnostic),
        }
    }

    /// Whether the verifier only failed for lack of the signer's key.
    fn missing_key(&self) -> bool {
        self.verdict != Verdict::ExecutionError
            && self.diagnostic.as_deref().is_some_and(|d| {
                d == "Can't check signature: public key not found"
                    || d == "Can't check signature: No public key"
            })
    }
}

impl fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.verdict {
            Verdict::Success => f.write_str("Verify succeeded"),
            Verdict::SuccessUntrusted => f.write_str("Verify succeeded, but with untrusted key"),
            Verdict::SignatureBad => f.write_str("Signature found, but BAD"),
            Verdict::Inconclusive => write!(
                f,
                "Unable to verify anything. Key ID: {}. Error: {}",
                self.key_id.as_deref().unwrap_or("Unknown"),
                self.diagnostic.as_deref().unwrap_or("Unknown"),
            ),
            Verdict::ExecutionError => write!(
                f,
                "Verify failed to execute: {}",
                self.diagnostic.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

/// Classify a finished verifier run from its exit code and stderr.
///
/// `code` is `None` when the process was killed by a signal.
#[must_use]
pub fn classify(code: Option<i32>, stderr: &str) -> VerificationOutcome {
    let key_id = KEY_ID_RE
        .captures(stderr)
        .map(|c| c[2].to_string())
        .or_else(|| KEY_FINGERPRINT_RE.captures(stderr).map(|c| c[1].to_string()));
    let diagnostic = ERROR_RE.captures(stderr).map(|c| c[1].to_string());

    let verdict = match code {
        None => {
            return VerificationOutcome::execution_error(format!(
                "terminated by signal. Stderr: {stderr:?}"
            ));
        }
        Some(0) if UNTRUSTED_RE.is_match(stderr) => Verdict::SuccessUntrusted,
        Some(0) => Verdict::Success,
        Some(BAD_SIGNATURE_STATUS) => Verdict::SignatureBad,
        Some(_) => Verdict::Inconclusive,
    };
    VerificationOutcome {
        verdict,
        key_id,
        diagnostic,
    }
}

/// Drives the external verifier.
#[derive(Debug, Clone)]
pub struct Verifier {
    program: PathBuf,
    leading_args: Vec<String>,
}

impl Verifier {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Arguments passed before every invocation's own arguments.
    #[must_use]
    pub fn with_leading_args(mut self, args: Vec<String>) -> Self {
        self.leading_args = args;
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args);
        cmd
    }

    /// Verify the signature carried by `body`.
    ///
    /// A missing public key triggers one key download and one more
    /// attempt; the second attempt never downloads again.
    pub async fn verify(&self, body: &str) -> VerificationOutcome {
        let first = self.attempt(body).await;
        if !first.missing_key() {
            return first;
        }
        match first.key_id.as_deref() {
            Some(key_id) => self.fetch_key(key_id).await,
            None => warn!("Public key missing but no key ID found"),
        }
        self.attempt(body).await
    }

    async fn attempt(&self, body: &str) -> VerificationOutcome {
        match self.run(body).await {
            Ok((status, stderr)) => classify(status.code(), &stderr),
            Err(e) => VerificationOutcome::execution_error(e),
        }
    }

    async fn run(&self, body: &str) -> Result<(ExitStatus, String), String> {
        let mut child = self
            .command()
            .args(["-v", "--batch", "--no-tty"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("{}: {e}", self.program.display()))?;

        let stdin = child.stdin.take();
        let input = body.as_bytes().to_vec();
        let writer = tokio::spawn(async move {
            if let Some(mut stdin) = stdin
                && let Err(e) = stdin.write_all(&input).await
            {
                debug!("Verifier stopped reading input: {}", e);
            }
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| format!("failed to run: {e}"))?;
        writer.await.ok();

        Ok((
            output.status,
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ))
    }

    /// Best-effort download of a public key.
    async fn fetch_key(&self, key_id: &str) {
        info!("Fetching public key {}", key_id);
        let status = self
            .command()
            .args(["--batch", "--no-tty", "--recv-keys", key_id])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        match status {
            Ok(status) if status.success() => debug!("Fetched public key {}", key_id),
            Ok(status) => warn!("Failed to download key {:?}: {}", key_id, status),
            Err(e) => warn!("Failed to download key {:?}: {}", key_id, e),
        }
    }
}
