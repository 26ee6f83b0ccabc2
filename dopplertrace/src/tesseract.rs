// Tesseract adapter
// Runs the tesseract command line tool as a TextRecognizer

use std::io::{self, Cursor, Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use image::{GrayImage, ImageFormat};

use crate::text::{OcrProfile, PageLayout, TextRecognizer};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Recognizer backed by an external `tesseract` executable.
///
/// Each call is bounded by `timeout`; a call that runs over is killed
/// and treated as "no text".
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    executable: PathBuf,
    timeout: Duration,
}

impl TesseractRecognizer {
    pub fn new(executable: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            executable: executable.into(),
            timeout,
        }
    }

    fn run(&self, image: &GrayImage, profile: &OcrProfile) -> io::Result<String> {
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(io::Error::other)?;

        let deadline = Instant::now() + self.timeout;
        let mut child = Command::new(&self.executable)
            .args(tesseract_args(profile))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        // Pipes are serviced off-thread; the deadline holds even if stdin is never read
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("tesseract stdin not captured"))?;
        let writer = thread::spawn(move || stdin.write_all(&png));

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("tesseract stdout not captured"))?;
        let reader = thread::spawn(move || {
            let mut text = String::new();
            stdout.read_to_string(&mut text).map(|_| text)
        });

        loop {
            if let Some(status) = child.try_wait()? {
                if !status.success() {
                    log::debug!("tesseract exited with {}", status);
                }
                break;
            }
            if Instant::now() >= deadline {
                log::warn!(
                    "tesseract timed out after {:?} on a '{}' crop",
                    self.timeout,
                    profile.name
                );
                let _ = child.kill();
                let _ = child.wait();
                return Ok(String::new());
            }
            thread::sleep(POLL_INTERVAL);
        }

        match writer.join() {
            Ok(Err(e)) => log::debug!("tesseract did not take the whole image: {}", e),
            Err(_) => return Err(io::Error::other("tesseract writer thread panicked")),
            Ok(Ok(())) => {}
        }
        reader
            .join()
            .map_err(|_| io::Error::other("tesseract reader thread panicked"))?
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&mut self, image: &GrayImage, profile: &OcrProfile) -> String {
        match self.run(image, profile) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("tesseract failed on a '{}' crop: {}", profile.name, e);
                String::new()
            }
        }
    }
}

/// Command line for one recognition: PNG on stdin, text on stdout
pub fn tesseract_args(profile: &OcrProfile) -> Vec<String> {
    let psm = match profile.layout {
        PageLayout::Block => "6",
        PageLayout::SingleLine => "7",
        PageLayout::SingleWord => "8",
    };

    let mut args = vec![
        "stdin".to_string(),
        "stdout".to_string(),
        "--psm".to_string(),
        psm.to_string(),
        "--oem".to_string(),
        "3".to_string(),
    ];
    if let Some(whitelist) = profile.whitelist {
        args.push("-c".to_string());
        args.push(format!("tessedit_char_whitelist={}", whitelist));
    }
    args
}
