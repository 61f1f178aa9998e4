pub mod uploader;

pub use uploader::{
    BatchReport, FileResult, FileStatus, HttpUploadTransport, MultipartUploader, PendingFile,
    UploadTransport,
};
