/// The type of publish request being made
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishRequestType {
    /// The published stream should be sent out without recording it in a file
    Live,

    /// The published stream should be recorded to a new file, replacing any existing one
    Record,

    /// The stream is published and the data should be appended to a file
    Append,
}

impl PublishRequestType {
    pub(super) fn as_str(self) -> &'static str {
        match self {
            PublishRequestType::Live => "live",
            PublishRequestType::Record => "record",
            PublishRequestType::Append => "append",
        }
    }
}
