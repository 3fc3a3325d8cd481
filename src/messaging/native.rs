//! Chrome Native Messaging framing.
//!
//! Each message is a 32-bit length in native byte order followed by that
//! many bytes of UTF-8 JSON.

use crate::display::{MetadataView, PanelView};
use crate::messaging::ExtensionMessage;
use serde::Serialize;
use std::io::{self, Read, Write};
use tracing::{debug, trace, warn};

/// Largest message the browser will send to a native host
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Read one frame body. Returns `None` on a clean end of stream.
///
/// Errors here leave the stream out of step and end the session.
pub fn read_frame<R: Read>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut length_bytes = [0u8; 4];

    match reader.read_exact(&mut length_bytes) {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let length = u32::from_ne_bytes(length_bytes) as usize;
    if length > MAX_MESSAGE_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "Message too large",
        ));
    }

    let mut buffer = vec![0u8; length];
    reader.read_exact(&mut buffer)?;

    Ok(Some(buffer))
}

/// Decode frames into extension messages until the stream ends or `deliver`
/// returns false. Frames that are not JSON, or carry an unknown action, are
/// skipped; the next frame is still in step.
pub fn read_messages<R: Read>(
    reader: &mut R,
    mut deliver: impl FnMut(ExtensionMessage) -> bool,
) -> io::Result<()> {
    while let Some(frame) = read_frame(reader)? {
        let value: serde_json::Value = match serde_json::from_slice(&frame) {
            Ok(value) => value,
            Err(e) => {
                warn!("Skipping malformed message: {}", e);
                continue;
            }
        };

        match serde_json::from_value::<ExtensionMessage>(value) {
            Ok(message) => {
                if !deliver(message) {
                    return Ok(());
                }
            }
            Err(e) => trace!("Ignoring unrecognized message: {}", e),
        }
    }

    debug!("stdin closed");
    Ok(())
}

/// Write one framed message and flush
pub fn write_message<W: Write, T: Serialize>(writer: &mut W, message: &T) -> io::Result<()> {
    let json = serde_json::to_vec(message)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

    let length = (json.len() as u32).to_ne_bytes();

    writer.write_all(&length)?;
    writer.write_all(&json)?;
    writer.flush()?;

    Ok(())
}

/// Message sent from the host back to the extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action")]
pub enum HostMessage {
    /// Finished panel contents for one song. `lyrics` is ready-to-insert HTML.
    #[serde(rename = "render")]
    Render {
        metadata: MetadataView,
        lyrics: String,
    },
}

impl From<&PanelView> for HostMessage {
    fn from(view: &PanelView) -> Self {
        HostMessage::Render {
            metadata: view.metadata.clone(),
            lyrics: view.lyrics.to_html(),
        }
    }
}
