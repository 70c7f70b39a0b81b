//! Headless office suite invocation

use crate::error::ConvertError;
use crate::strategy::OfficeSuite;
use crate::ConversionKind;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Convert `input` with the office suite, working entirely inside `scratch`
///
/// The suite gets its own user profile under `scratch` so concurrent
/// conversions never share state. The child is killed if the timeout fires.
pub async fn convert_with_office(
    suite: &OfficeSuite,
    kind: ConversionKind,
    input: &[u8],
    scratch: &Path,
    timeout: Duration,
) -> Result<Vec<u8>, ConvertError> {
    let scratch = tokio::fs::canonicalize(scratch).await?;
    let input_path = scratch.join(format!("input.{}", kind.source_extension()));
    let out_dir = scratch.join("out");
    let profile = scratch.join("profile");

    tokio::fs::write(&input_path, input).await?;
    tokio::fs::create_dir_all(&out_dir).await?;

    let mut command = Command::new(&suite.binary);
    command
        .arg("--headless")
        .arg("--norestore")
        .arg(format!("-env:UserInstallation=file://{}", profile.display()));
    if kind == ConversionKind::PdfToWord {
        command.arg("--infilter=writer_pdf_import");
    }
    command
        .arg("--convert-to")
        .arg(kind.office_filter())
        .arg("--outdir")
        .arg(&out_dir)
        .arg(&input_path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!("Running {:?}", command);
    let child = command.spawn()?;

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| ConvertError::Timeout(timeout.as_secs()))??;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ConvertError::Office(format!(
            "exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    let produced = out_dir.join(format!("input.{}", kind.target_extension()));
    match tokio::fs::read(&produced).await {
        Ok(data) if !data.is_empty() => Ok(data),
        Ok(_) => Err(ConvertError::Office("produced an empty file".into())),
        Err(e) => Err(ConvertError::Office(format!(
            "no output at {}: {}",
            produced.display(),
            e
        ))),
    }
}
