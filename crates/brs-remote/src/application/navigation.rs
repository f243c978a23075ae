//! Navigation use cases: key sequences and literal text entry.
//!
//! Both use cases send keys through a [`KeySender`] trait object so they can
//! be driven against the real ECP client or a recording mock.

use std::time::Duration;

use async_trait::async_trait;
use brs_core::{literal_key, KeyAction};
use tracing::debug;

use crate::error::ClientError;

/// Anything that can deliver a remote-control key event.
#[async_trait]
pub trait KeySender: Send + Sync {
    /// Sends `key` (e.g. `Select`, `Lit_a`) with the given action.
    async fn send_key(&self, key: &str, action: KeyAction) -> Result<(), ClientError>;
}

/// Presses every key in `keys` in order, sleeping `delay` between presses.
///
/// There is no delay after the last key.  Stops at the first failure; keys
/// already sent stay sent.
///
/// # Errors
///
/// The first error returned by `sender`.
pub async fn press_sequence<S, K>(sender: &S, keys: &[K], delay: Duration) -> Result<(), ClientError>
where
    S: KeySender + ?Sized,
    K: AsRef<str>,
{
    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(delay).await;
        }
        sender.send_key(key.as_ref(), KeyAction::Press).await?;
    }
    debug!("pressed {} keys", keys.len());
    Ok(())
}

/// Types `text` one character at a time as `Lit_<char>` key presses.
///
/// Characters are separated by `delay`.  With `submit`, `Enter` is pressed
/// after one more `delay`.
///
/// # Errors
///
/// The first error returned by `sender`.
pub async fn type_text<S>(
    sender: &S,
    text: &str,
    delay: Duration,
    submit: bool,
) -> Result<(), ClientError>
where
    S: KeySender + ?Sized,
{
    for (i, c) in text.chars().enumerate() {
        if i > 0 {
            tokio::time::sleep(delay).await;
        }
        sender.send_key(&literal_key(c), KeyAction::Press).await?;
    }
    if submit {
        tokio::time::sleep(delay).await;
        sender.send_key("Enter", KeyAction::Press).await?;
    }
    debug!(chars = text.chars().count(), submit, "typed text");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
