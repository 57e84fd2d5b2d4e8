//! Stream definitions for the two pipeline stages.

use stream_worker::StreamDef;

/// Stage 1: story generation.
pub struct StoryStream;

impl StreamDef for StoryStream {
    const STREAM_NAME: &'static str = "pipeline:story";
    const CONSUMER_GROUP: &'static str = "story_workers";
    const DLQ_STREAM: &'static str = "pipeline:story:dlq";
}

/// Stage 2: email notification.
pub struct EmailStream;

impl StreamDef for EmailStream {
    const STREAM_NAME: &'static str = "pipeline:email";
    const CONSUMER_GROUP: &'static str = "email_workers";
    const DLQ_STREAM: &'static str = "pipeline:email:dlq";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_defs_have_distinct_names() {
        assert_ne!(StoryStream::STREAM_NAME, EmailStream::STREAM_NAME);
        assert_eq!(StoryStream::retry_set_name(), "pipeline:story:retry");
        assert_eq!(EmailStream::retry_set_name(), "pipeline:email:retry");
    }
}
