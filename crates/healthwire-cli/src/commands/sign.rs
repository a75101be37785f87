use anyhow::Context;
use std::path::Path;

use healthwire_security::sign;

/// Header lines a client must send with `body` at `timestamp`
pub fn signing_headers(secret: &str, body: &[u8], timestamp: i64) -> anyhow::Result<[(String, String); 2]> {
    let ts = timestamp.to_string();
    let signature = sign(secret.as_bytes(), &ts, body)?;
    Ok([
        ("X-Timestamp".to_string(), ts),
        ("X-Signature".to_string(), signature),
    ])
}

pub fn run(secret: &str, body_file: &Path, timestamp: Option<i64>) -> anyhow::Result<()> {
    let body = std::fs::read(body_file)
        .with_context(|| format!("failed to read {}", body_file.display()))?;
    let timestamp = timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp());

    for (name, value) in signing_headers(secret, &body, timestamp)? {
        println!("{}: {}", name, value);
    }
    Ok(())
}
