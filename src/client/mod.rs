pub mod controller;
pub mod transport;

pub use controller::{
    ErrorSink, LinkSink, ProgressSink, SelectedFile, TransferController, TransferSinks,
    TransferState,
};
pub use transport::{HttpTransport, TransferError, UploadReply, UploadTransport};
