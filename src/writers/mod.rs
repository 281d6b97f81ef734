//! Output of command processing: log records and client responses.

pub mod log;
pub mod response;

pub use log::{LogStream, LogWriter, RecordDraft};
pub use response::{ClientResponse, ResponseWriter};

/// Both outputs of a processor, handed in per partition.
#[derive(Debug)]
pub struct Writers {
    pub log: LogWriter,
    pub response: ResponseWriter,
}

impl Writers {
    pub fn new(log: LogStream) -> Self {
        Self {
            log: LogWriter::new(log),
            response: ResponseWriter::new(),
        }
    }
}
