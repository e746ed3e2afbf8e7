use crate::canvas::Tile;
use fusion_protocol::GeneratedName;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

pub type NameFuture<'a> = Pin<Box<dyn Future<Output = Result<String, NamingError>> + Send + 'a>>;

/// The external capability that invents a discipline name for two labels.
///
/// Implementations receive the full labels and are expected to reduce them
/// with [`topic`] before building their prompt. The returned string is the raw
/// response text, which should parse as `{"name": "..."}`.
pub trait Namer: Send + Sync {
    fn name<'a>(&'a self, first: &'a str, second: &'a str) -> NameFuture<'a>;
}

#[derive(Debug, Error)]
pub enum NamingError {
    #[error("naming service is not configured: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("prediction {status}: {message}")]
    Upstream { status: String, message: String },

    #[error("empty response from naming service")]
    Empty,
}

/// Drops the decorative leading token of a label (`"🎨 Art"` -> `"Art"`).
/// Labels without a separable token come back unchanged.
pub fn topic(label: &str) -> &str {
    match label.split_once(' ') {
        Some((_, rest)) if !rest.trim().is_empty() => rest.trim(),
        _ => label,
    }
}

/// Output of [`combine`]: the new tile plus the raw collaborator response it
/// was derived from, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub tile: Tile,
    pub response: Option<String>,
}

/// Names the combination of `resting` (the tile already on the canvas) and
/// `dragged`, and builds the tile that replaces them at `resting`'s position.
///
/// Never fails. When the collaborator is unreachable the name is
/// `"<resting> + <dragged>"`; when it answers with something that is not a
/// usable `{"name": ...}` object the name joins the two topics instead.
pub async fn combine<N: Namer + ?Sized>(
    namer: &N,
    resting: &Tile,
    dragged: &Tile,
) -> Resolution {
    let (text, response) = match namer.name(&resting.text, &dragged.text).await {
        Ok(raw) if raw.trim().is_empty() => {
            tracing::warn!(
                a = %resting.text,
                b = %dragged.text,
                "naming service returned nothing"
            );
            (fallback_name(resting, dragged), None)
        }
        Ok(raw) => match GeneratedName::parse(&raw) {
            Some(name) => (name, Some(raw)),
            None => {
                tracing::debug!(raw = %raw, "unusable naming response");
                let name = format!("{} + {}", topic(&resting.text), topic(&dragged.text));
                (name, Some(raw))
            }
        },
        Err(err) => {
            tracing::warn!(error = %err, a = %resting.text, b = %dragged.text, "naming failed");
            (fallback_name(resting, dragged), None)
        }
    };

    Resolution {
        tile: Tile::new(text, resting.position),
        response,
    }
}

fn fallback_name(a: &Tile, b: &Tile) -> String {
    format!("{} + {}", a.text, b.text)
}
