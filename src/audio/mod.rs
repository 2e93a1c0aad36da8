//! Audio decoding and single-slot speech playback.

mod decode;
mod output;
mod playback;

pub use decode::{AudioClip, decode_clip};
pub use output::CpalOutput;
pub use playback::{PlaybackController, PlaybackState};

use crate::error::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Sink that plays one decoded clip to completion.
///
/// `play` resolves when the clip has been fully played, on a playback
/// error, or promptly after `cancel` fires. Implementations must tolerate a
/// token that is already cancelled on entry.
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Play a clip, honouring cancellation.
    async fn play(&self, clip: AudioClip, cancel: CancellationToken) -> Result<()>;
}
