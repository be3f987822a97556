//! Object storage for crop images

mod s3_client;

pub use s3_client::{derive_object_key, S3Client, UploadedObject};
