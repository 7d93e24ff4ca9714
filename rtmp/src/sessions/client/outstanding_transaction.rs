use super::PublishRequestType;

pub enum TransactionPurpose {
    PlayRequest {
        stream_key: String,
    },

    PublishRequest {
        stream_key: String,
        request_type: PublishRequestType,
    },
}

pub enum OutstandingTransaction {
    ConnectionRequested {
        app_name: String,
    },

    CreateStream {
        purpose: TransactionPurpose,
    },

    /// `releaseStream` and `FCPublish`, whose answers are only logged
    Courtesy {
        command_name: &'static str,
    },
}
