use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use super::Transcoder;
use crate::error::{EncoderError, EncoderResult, TranscodeStage};

/// Runs `mp4fragment` and `mp4dash` from a Bento4 installation.
#[derive(Clone, Debug)]
pub struct Bento4Transcoder {
    exec_dir: String,
    timeout: Option<Duration>,
}

impl Bento4Transcoder {
    pub fn new(exec_dir: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            exec_dir: exec_dir.into(),
            timeout,
        }
    }

    pub fn package_args(&self, input: &Path, output_dir: &Path, extra_args: &[String]) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            input.into(),
            "--use-segment-timeline".into(),
            "-o".into(),
            output_dir.into(),
            "-f".into(),
            "--exec-dir".into(),
            self.exec_dir.clone().into(),
        ];
        args.extend(extra_args.iter().map(OsString::from));
        args
    }

    async fn run(&self, stage: TranscodeStage, program: &str, args: Vec<OsString>) -> EncoderResult<String> {
        let mut command = Command::new(program);
        command.args(&args).kill_on_drop(true);

        let pending = command.output();
        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, pending).await {
                Ok(output) => output,
                Err(_) => {
                    warn!("{} exceeded {:?}, killed", program, limit);
                    return Err(EncoderError::transcode(
                        stage,
                        format!("{} timed out after {:?}", program, limit),
                    ));
                }
            },
            None => pending.await,
        }
        .map_err(|e| EncoderError::transcode(stage, format!("failed to launch {}: {}", program, e)))?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(EncoderError::transcode(
                stage,
                format!("{} exited with {}: {}", program, output.status, combined.trim()),
            ));
        }

        if !combined.is_empty() {
            debug!("=====> {} output: {}", program, combined.trim());
        }
        Ok(combined)
    }
}

#[async_trait]
impl Transcoder for Bento4Transcoder {
    async fn fragment(&self, input: &Path, output: &Path) -> EncoderResult<String> {
        self.run(
            TranscodeStage::Fragment,
            "mp4fragment",
            vec![input.into(), output.into()],
        )
        .await
    }

    async fn package(&self, input: &Path, output_dir: &Path, extra_args: &[String]) -> EncoderResult<String> {
        let args = self.package_args(input, output_dir, extra_args);
        self.run(TranscodeStage::Package, "mp4dash", args).await
    }
}
