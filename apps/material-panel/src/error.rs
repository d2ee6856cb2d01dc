use host_bridge::BridgeError;
use panel_proto::Method;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PanelError {
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    #[error("failed to encode {method} args: {source}")]
    Encode {
        method: Method,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to decode {method} result: {source}")]
    Decode {
        method: Method,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode panel frame: {0}")]
    FrameEncode(#[source] serde_json::Error),
    #[error("render failed: {0}")]
    Render(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PanelResult<T> = Result<T, PanelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_encode_error_names_the_outbound_direction() {
        let source = serde_json::from_str::<serde_json::Value>("{").expect_err("truncated");
        let err = PanelError::FrameEncode(source);
        assert!(err.to_string().starts_with("failed to encode panel frame"));
    }
}
