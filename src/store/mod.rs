//! Storage layer: backing object store and the byte cache in front of it.

mod cache;
mod object_store;

pub use cache::{ByteCache, DEFAULT_BYTE_CACHE_CAPACITY};
pub use object_store::{create_s3_client, ObjectStore, S3ObjectStore};

#[cfg(test)]
pub(crate) use object_store::test_support;
